use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use relo_core::FqName;
use relo_syntax::{parse_file, render_file, DeclId, FileId, FileKind, ModuleId, SourceTree};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixtureFile {
    pub path: String,
    pub module: String,
    pub platform: String,
    pub deps: Vec<String>,
    pub text: String,
}

impl FixtureFile {
    /// Split a multi-file fixture into its files.
    pub fn split(fixture: &str) -> Vec<FixtureFile> {
        let mut out: Vec<FixtureFile> = Vec::new();
        for line in fixture.lines() {
            if let Some(header) = line.trim_start().strip_prefix("//-") {
                let mut parts = header.split_whitespace();
                let path = parts
                    .next()
                    .expect("fixture header needs a path")
                    .trim_start_matches('/')
                    .to_string();
                let mut file = FixtureFile {
                    path,
                    module: "main".to_string(),
                    platform: "jvm".to_string(),
                    deps: Vec::new(),
                    text: String::new(),
                };
                for part in parts {
                    let (key, value) = part
                        .split_once('=')
                        .unwrap_or_else(|| panic!("malformed fixture attribute `{part}`"));
                    match key {
                        "module" => file.module = value.to_string(),
                        "platform" => file.platform = value.to_string(),
                        "deps" => {
                            file.deps = value.split(',').map(str::to_string).collect();
                        }
                        other => panic!("unknown fixture attribute `{other}`"),
                    }
                }
                out.push(file);
                continue;
            }
            if out.is_empty() && line.trim().is_empty() {
                continue;
            }
            let current = out
                .last_mut()
                .expect("fixture text must start with a `//-` header");
            current.text.push_str(line);
            current.text.push('\n');
        }
        out
    }
}

/// A parsed multi-file fixture. References are left unbound.
#[derive(Debug)]
pub struct Project {
    pub tree: SourceTree,
    pub files: BTreeMap<String, FileId>,
}

impl Project {
    #[must_use]
    pub fn parse(fixture: &str) -> Self {
        let mut tree = SourceTree::new();
        let mut modules: BTreeMap<String, ModuleId> = BTreeMap::new();
        let mut files = BTreeMap::new();
        let fixture_files = FixtureFile::split(fixture);

        for file in &fixture_files {
            if !modules.contains_key(&file.module) {
                let id = tree.add_module(&file.module, "", &file.platform);
                modules.insert(file.module.clone(), id);
            }
        }
        for file in &fixture_files {
            let module = modules[&file.module];
            for dep in &file.deps {
                let dep = *modules
                    .get(dep)
                    .unwrap_or_else(|| panic!("unknown dependency module `{dep}`"));
                tree.add_dependency(module, dep);
            }
            let kind = FileKind::from_path(&file.path)
                .unwrap_or_else(|| panic!("not a source file: {}", file.path));
            let id = parse_file(&mut tree, module, &file.path, kind, &file.text)
                .unwrap_or_else(|err| panic!("failed to parse {}: {err}", file.path));
            files.insert(file.path.clone(), id);
        }
        tracing::trace!(files = files.len(), "loaded fixture project");
        Project { tree, files }
    }

    pub fn file(&self, path: &str) -> FileId {
        *self
            .files
            .get(path)
            .unwrap_or_else(|| panic!("no fixture file {path}"))
    }

    pub fn decl(&self, fq: &str) -> DeclId {
        decl(&self.tree, fq)
    }

    pub fn render(&self) -> BTreeMap<String, String> {
        render_project(&self.tree)
    }

    pub fn text(&self, path: &str) -> String {
        self.render()
            .remove(path)
            .unwrap_or_else(|| panic!("no live file {path}"))
    }
}

/// The single live declaration named `fq`.
pub fn decl(tree: &SourceTree, fq: &str) -> DeclId {
    let name: FqName = fq.parse().unwrap_or_else(|err| panic!("bad name {fq}: {err}"));
    let found = tree.find_decls(&name);
    match found.as_slice() {
        [decl] => *decl,
        [] => panic!("no declaration named {fq}"),
        _ => panic!("ambiguous declaration name {fq}"),
    }
}

/// Canonical text of every live file, keyed by path.
pub fn render_project(tree: &SourceTree) -> BTreeMap<String, String> {
    tree.files()
        .map(|(id, file)| (file.path.clone(), render_file(tree, id).text))
        .collect()
}

/// Load a fixture directory into a `(relative_path -> text)` map.
pub fn load_fixture_dir(dir: &Path) -> BTreeMap<PathBuf, String> {
    fn visit_dir(
        root: &Path,
        dir: &Path,
        out: &mut BTreeMap<PathBuf, String>,
    ) -> std::io::Result<()> {
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            if path.is_dir() {
                visit_dir(root, &path, out)?;
            } else {
                let rel = path
                    .strip_prefix(root)
                    .expect("walked path is below the root")
                    .to_path_buf();
                out.insert(rel, fs::read_to_string(&path)?);
            }
        }
        Ok(())
    }

    let mut out = BTreeMap::new();
    visit_dir(dir, dir, &mut out).expect("fixture dir readable");
    out
}

/// Run `transform` over the files of `before` and compare with `after`.
///
/// With `BLESS=1` the expected directory is (re)written instead of failing.
pub fn assert_fixture_transformed(
    before: &Path,
    after: &Path,
    mut transform: impl FnMut(&mut BTreeMap<PathBuf, String>),
) {
    let mut files = load_fixture_dir(before);
    transform(&mut files);

    if !after.exists() {
        if bless_enabled() {
            bless_fixture_dir(after, &files);
            return;
        }
        panic!(
            "missing expected fixture dir {} (run with `BLESS=1` to write it)",
            after.display()
        );
    }

    let expected = load_fixture_dir(after);
    if files != expected {
        if bless_enabled() {
            bless_fixture_dir(after, &files);
            return;
        }
        pretty_assertions::assert_eq!(files, expected);
    }
}

fn bless_enabled() -> bool {
    let Ok(val) = env::var("BLESS") else {
        return false;
    };
    let val = val.trim().to_ascii_lowercase();
    !(val.is_empty() || val == "0" || val == "false")
}

fn bless_fixture_dir(dir: &Path, files: &BTreeMap<PathBuf, String>) {
    if dir.exists() {
        fs::remove_dir_all(dir)
            .unwrap_or_else(|err| panic!("failed to remove {}: {err}", dir.display()));
    }
    for (rel, text) in files {
        let path = dir.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .unwrap_or_else(|err| panic!("failed to create {}: {err}", parent.display()));
        }
        fs::write(&path, text)
            .unwrap_or_else(|err| panic!("failed to write {}: {err}", path.display()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_headers_and_attributes() {
        let files = FixtureFile::split(
            "//- /a/A.kt module=app deps=lib\npackage a\n//- /b/B.kt module=lib platform=common\npackage b\n",
        );
        assert_eq!(files.len(), 2);
        assert_eq!(files[0].path, "a/A.kt");
        assert_eq!(files[0].deps, vec!["lib".to_string()]);
        assert_eq!(files[0].text, "package a\n");
        assert_eq!(files[1].platform, "common");
    }
}
