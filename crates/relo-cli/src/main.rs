use std::path::PathBuf;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use relo_config::ReloConfig;
use relo_core::FqName;
use relo_move::{
    generate_preview, ConflictHandler, ConflictPolicy, FilePreview, InMemoryHost, MoveSession,
    MoveSettings, MoveSource, MoveTarget, SearchOptions,
};
use relo_syntax::{parse_file, render_file, DeclId, FileKind, SourceTree};
use serde::Serialize;

mod project;

use project::{load_project, write_changes};

#[derive(Parser)]
#[command(name = "relo", version, about = "Move declarations between packages, files and classes")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Move declarations and update every reference to them
    Move(MoveArgs),
    /// Report the conflicts a move would run into, without changing anything
    Check(CheckArgs),
    /// Print the canonical rendering of a single source file
    Parse(ParseArgs),
}

#[derive(Args)]
struct RequestArgs {
    /// Project directory
    project: PathBuf,
    /// Fully qualified name of a declaration to move (repeatable)
    #[arg(long = "decl", value_name = "FQ_NAME", required = true)]
    decls: Vec<String>,
    #[command(flatten)]
    destination: Destination,
    /// Module of the destination package (defaults to the module of the first declaration)
    #[arg(long, requires = "to_package")]
    module: Option<String>,
    /// File name inside the destination package
    #[arg(long, requires = "to_package")]
    file: Option<String>,
    /// Also update qualified names in doc comments
    #[arg(long)]
    search_in_comments: bool,
    /// Also update qualified names in string literals
    #[arg(long)]
    search_for_text: bool,
}

#[derive(Args)]
#[group(required = true, multiple = false)]
struct Destination {
    /// Destination package
    #[arg(long, value_name = "PACKAGE")]
    to_package: Option<String>,
    /// Destination file, relative to the project directory
    #[arg(long, value_name = "PATH")]
    to_file: Option<String>,
    /// Destination class, interface or object
    #[arg(long, value_name = "FQ_NAME")]
    to_container: Option<String>,
}

#[derive(Args)]
struct MoveArgs {
    #[command(flatten)]
    request: RequestArgs,
    /// Show the resulting diffs without writing anything
    #[arg(long)]
    dry_run: bool,
    /// Move even when conflicts were found
    #[arg(long)]
    proceed_on_conflicts: bool,
    /// Emit JSON suitable for CI
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct CheckArgs {
    #[command(flatten)]
    request: RequestArgs,
    /// Emit JSON suitable for CI
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct ParseArgs {
    /// File to parse
    file: PathBuf,
    /// Emit JSON suitable for CI
    #[arg(long)]
    json: bool,
}

fn main() {
    let cli = Cli::parse();
    let exit_code = match run(cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{:#}", err);
            2
        }
    };

    std::process::exit(exit_code);
}

fn run(cli: Cli) -> Result<i32> {
    match cli.command {
        Command::Move(args) => run_move(args),
        Command::Check(args) => run_check(args),
        Command::Parse(args) => run_parse(args),
    }
}

#[derive(Serialize)]
struct ConflictEntry {
    location: String,
    messages: Vec<String>,
}

#[derive(Serialize)]
struct MoveReport {
    status: &'static str,
    declarations: Vec<String>,
    destination: String,
    conflicts: Vec<ConflictEntry>,
    usages: usize,
    skipped_usages: usize,
    unresolved_usages: usize,
    files: Vec<FilePreview>,
}

struct Request {
    config: ReloConfig,
    root: PathBuf,
    host: InMemoryHost,
    source: MoveSource,
    target: MoveTarget,
}

impl Request {
    fn session(&self, policy: ConflictPolicy) -> MoveSession<'_> {
        MoveSession::new(&self.host)
            .with_settings(MoveSettings {
                synthesize_outer_instance: self.config.r#move.synthesize_outer_instance,
                outer_instance_name_attempts: self.config.r#move.outer_instance_name_attempts,
            })
            .with_conflict_handler(ConflictHandler::Batch(policy))
    }
}

fn prepare(args: &RequestArgs) -> Result<Request> {
    let (config, config_path) = relo_config::load_for_workspace(&args.project)
        .with_context(|| format!("failed to load config for {}", args.project.display()))?;
    relo_config::init_tracing(&config.logging);
    if let Some(path) = &config_path {
        tracing::debug!(target = "relo.cli", path = %path.display(), "using config file");
    }

    let project = load_project(&args.project)?;
    let tree = &project.tree;

    let decls = args
        .decls
        .iter()
        .map(|name| find_decl(tree, name))
        .collect::<Result<Vec<_>>>()?;
    let options = SearchOptions {
        search_references: config.r#move.search_references,
        search_in_comments: config.r#move.search_in_comments || args.search_in_comments,
        search_for_text: config.r#move.search_for_text || args.search_for_text,
    };
    let source = MoveSource::declarations(tree, decls.iter().copied(), options)?;

    let destination = &args.destination;
    let target = if let Some(package) = &destination.to_package {
        let module = match &args.module {
            Some(name) => tree
                .find_module(name)
                .ok_or_else(|| anyhow!("unknown module `{name}`"))?,
            None => tree.module_of_decl(decls[0]),
        };
        let package: FqName = package
            .parse()
            .with_context(|| format!("invalid package name `{package}`"))?;
        MoveTarget::Package {
            module,
            package,
            file_name: args.file.clone(),
        }
    } else if let Some(path) = &destination.to_file {
        let file = tree
            .find_file(path)
            .ok_or_else(|| anyhow!("no source file `{path}` in the project"))?;
        MoveTarget::File(file)
    } else if let Some(name) = &destination.to_container {
        MoveTarget::Container(find_decl(tree, name)?)
    } else {
        bail!("no destination given");
    };

    Ok(Request {
        config,
        root: project.root,
        host: InMemoryHost::new(project.tree),
        source,
        target,
    })
}

fn find_decl(tree: &SourceTree, name: &str) -> Result<DeclId> {
    let fq: FqName = name
        .parse()
        .with_context(|| format!("invalid declaration name `{name}`"))?;
    match tree.find_decls(&fq).as_slice() {
        [decl] => Ok(*decl),
        [] => bail!("no declaration named `{name}`"),
        _ => bail!("declaration name `{name}` is ambiguous"),
    }
}

fn run_check(args: CheckArgs) -> Result<i32> {
    let request = prepare(&args.request)?;
    let session = request.session(ConflictPolicy::Abort);
    let analysis = session.analyze(&request.source, &request.target)?;

    let tree = request.host.read();
    let conflicts = conflict_entries(&tree, &analysis.conflicts.conflicts);
    let report = MoveReport {
        status: if conflicts.is_empty() { "clean" } else { "conflicts" },
        declarations: declaration_names(&tree, &request.source),
        destination: analysis.target.describe(&tree),
        usages: analysis.usages.len(),
        skipped_usages: 0,
        unresolved_usages: 0,
        files: Vec::new(),
        conflicts,
    };
    print_report(&report, args.json, false)?;
    Ok(if report.conflicts.is_empty() { 0 } else { 1 })
}

fn run_move(args: MoveArgs) -> Result<i32> {
    let request = prepare(&args.request)?;
    let policy = if args.proceed_on_conflicts {
        ConflictPolicy::Proceed
    } else {
        request.config.r#move.conflict_policy
    };
    let proceed = policy == ConflictPolicy::Proceed;
    let mut session = request.session(policy);

    let analysis = session.analyze(&request.source, &request.target)?;
    let (declarations, destination, conflicts) = {
        let tree = request.host.read();
        (
            declaration_names(&tree, &request.source),
            analysis.target.describe(&tree),
            conflict_entries(&tree, &analysis.conflicts.conflicts),
        )
    };
    if !conflicts.is_empty() && !proceed {
        let report = MoveReport {
            status: "aborted",
            declarations,
            destination,
            conflicts,
            usages: analysis.usages.len(),
            skipped_usages: 0,
            unresolved_usages: 0,
            files: Vec::new(),
        };
        print_report(&report, args.json, false)?;
        return Ok(1);
    }

    let before = request.host.snapshot();
    let report = if args.dry_run {
        let preview = session.preview(&request.source, &request.target)?;
        MoveReport {
            status: "preview",
            declarations,
            destination,
            conflicts,
            usages: analysis.usages.len(),
            skipped_usages: 0,
            unresolved_usages: 0,
            files: preview.files,
        }
    } else {
        let outcome = session.run(&request.source, &request.target)?;
        let preview = generate_preview(&before, &request.host.read());
        write_changes(&request.root, &preview)?;
        MoveReport {
            status: "moved",
            declarations,
            destination,
            conflicts,
            usages: outcome.usages.len(),
            skipped_usages: outcome.skipped_usages,
            unresolved_usages: outcome.unresolved_usages,
            files: preview.files,
        }
    };
    print_report(&report, args.json, args.dry_run)?;
    Ok(0)
}

fn run_parse(args: ParseArgs) -> Result<i32> {
    let path = args.file.to_string_lossy().into_owned();
    let kind = FileKind::from_path(&path).ok_or_else(|| anyhow!("{path} is not a source file"))?;
    let text = std::fs::read_to_string(&args.file)
        .with_context(|| format!("failed to read {}", args.file.display()))?;

    let mut tree = SourceTree::new();
    let module = tree.add_module("main", "", "jvm");
    let file =
        parse_file(&mut tree, module, &path, kind, &text).map_err(|err| anyhow!("{path}: {err}"))?;
    let rendered = render_file(&tree, file).text;

    if args.json {
        #[derive(Serialize)]
        struct ParseReport {
            path: String,
            package: String,
            declarations: Vec<String>,
            text: String,
        }
        let data = tree.file(file);
        let report = ParseReport {
            path,
            package: data.package.to_string(),
            declarations: data
                .items
                .iter()
                .map(|&item| tree.fq_name(item).to_string())
                .collect(),
            text: rendered,
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{rendered}");
    }
    Ok(0)
}

fn declaration_names(tree: &SourceTree, source: &MoveSource) -> Vec<String> {
    source
        .decls()
        .iter()
        .map(|&decl| tree.fq_name(decl).to_string())
        .collect()
}

fn conflict_entries(tree: &SourceTree, conflicts: &relo_move::ConflictMap) -> Vec<ConflictEntry> {
    conflicts
        .describe(tree)
        .into_iter()
        .map(|(location, messages)| ConflictEntry { location, messages })
        .collect()
}

fn print_report(report: &MoveReport, json: bool, diffs: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }

    println!(
        "{}: {} -> {}",
        report.status,
        report.declarations.join(", "),
        report.destination
    );
    for conflict in &report.conflicts {
        for message in &conflict.messages {
            println!("conflict: {}: {message}", conflict.location);
        }
    }
    for file in &report.files {
        let change = match file.change {
            relo_move::FileChangeKind::Created => "created",
            relo_move::FileChangeKind::Deleted => "deleted",
            relo_move::FileChangeKind::Modified => "modified",
        };
        println!("  {change} {}", file.path);
        if diffs {
            print!("{}", file.unified_diff);
        }
    }
    if report.unresolved_usages > 0 {
        println!("warning: {} references no longer resolve", report.unresolved_usages);
    }
    Ok(())
}
