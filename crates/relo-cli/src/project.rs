use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use relo_move::{FileChangeKind, RefactoringPreview};
use relo_resolve::bind_all;
use relo_syntax::{parse_file, FileKind, ModuleId, SourceTree};
use serde::Deserialize;
use walkdir::WalkDir;

/// Marks a first-level directory of a project as a module.
pub(crate) const MODULE_MANIFEST: &str = "module.toml";

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ModuleManifest {
    name: Option<String>,
    #[serde(default = "default_platform")]
    platform: String,
    #[serde(default)]
    dependencies: Vec<String>,
}

fn default_platform() -> String {
    "jvm".to_owned()
}

struct ModuleDir {
    name: String,
    /// Relative to the project root; empty for a single-module project.
    root: String,
    platform: String,
    dependencies: Vec<String>,
}

pub(crate) struct LoadedProject {
    pub(crate) root: PathBuf,
    pub(crate) tree: SourceTree,
}

/// Read every source file under `root` into a bound [`SourceTree`].
pub(crate) fn load_project(root: &Path) -> Result<LoadedProject> {
    if !root.is_dir() {
        bail!("{} is not a directory", root.display());
    }
    let modules = discover_modules(root)?;

    let mut tree = SourceTree::new();
    let mut ids: HashMap<String, ModuleId> = HashMap::new();
    for module in &modules {
        if ids.contains_key(&module.name) {
            bail!("module `{}` is declared twice", module.name);
        }
        let id = tree.add_module(&module.name, &module.root, &module.platform);
        ids.insert(module.name.clone(), id);
    }
    for module in &modules {
        let id = ids[&module.name];
        for dep in &module.dependencies {
            let dep_id = *ids.get(dep).ok_or_else(|| {
                anyhow!("module `{}` depends on unknown module `{dep}`", module.name)
            })?;
            tree.add_dependency(id, dep_id);
        }
    }

    let mut files = 0usize;
    for module in &modules {
        let id = ids[&module.name];
        let dir = root.join(&module.root);
        let walker = WalkDir::new(&dir)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| entry.depth() == 0 || !is_hidden(entry.file_name()));
        for entry in walker {
            let entry = entry.with_context(|| format!("failed to walk {}", dir.display()))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let Some(rel) = relative_path(root, entry.path()) else {
                continue;
            };
            let Some(kind) = FileKind::from_path(&rel) else {
                continue;
            };
            let text = fs::read_to_string(entry.path())
                .with_context(|| format!("failed to read {}", entry.path().display()))?;
            parse_file(&mut tree, id, &rel, kind, &text).map_err(|err| anyhow!("{rel}: {err}"))?;
            files += 1;
        }
    }

    let unresolved = bind_all(&mut tree);
    tracing::debug!(
        target = "relo.cli",
        root = %root.display(),
        modules = modules.len(),
        files,
        unresolved,
        "loaded project"
    );
    Ok(LoadedProject {
        root: root.to_path_buf(),
        tree,
    })
}

fn discover_modules(root: &Path) -> Result<Vec<ModuleDir>> {
    let mut dirs: Vec<PathBuf> = fs::read_dir(root)
        .with_context(|| format!("failed to read {}", root.display()))?
        .filter_map(|entry| entry.ok().map(|entry| entry.path()))
        .filter(|path| path.join(MODULE_MANIFEST).is_file())
        .collect();
    dirs.sort();

    let mut modules = Vec::new();
    for dir in dirs {
        let manifest_path = dir.join(MODULE_MANIFEST);
        let text = fs::read_to_string(&manifest_path)
            .with_context(|| format!("failed to read {}", manifest_path.display()))?;
        let manifest: ModuleManifest = toml::from_str(&text)
            .with_context(|| format!("invalid {}", manifest_path.display()))?;
        let dir_name = dir
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        modules.push(ModuleDir {
            name: manifest.name.unwrap_or_else(|| dir_name.clone()),
            root: dir_name,
            platform: manifest.platform,
            dependencies: manifest.dependencies,
        });
    }

    if modules.is_empty() {
        let name = root
            .canonicalize()
            .ok()
            .and_then(|path| path.file_name().map(|name| name.to_string_lossy().into_owned()))
            .unwrap_or_else(|| "main".to_owned());
        modules.push(ModuleDir {
            name,
            root: String::new(),
            platform: default_platform(),
            dependencies: Vec::new(),
        });
    }
    Ok(modules)
}

fn is_hidden(name: &std::ffi::OsStr) -> bool {
    name.to_str().is_some_and(|name| name.starts_with('.'))
}

/// `/`-separated path of `path` below `root`.
pub(crate) fn relative_path(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    let parts: Vec<String> = rel
        .components()
        .map(|part| part.as_os_str().to_string_lossy().into_owned())
        .collect();
    (!parts.is_empty()).then(|| parts.join("/"))
}

/// Apply the file changes of `preview` below `root`.
pub(crate) fn write_changes(root: &Path, preview: &RefactoringPreview) -> Result<()> {
    for file in &preview.files {
        let path = root.join(&file.path);
        match file.change {
            FileChangeKind::Deleted => {
                fs::remove_file(&path)
                    .with_context(|| format!("failed to delete {}", path.display()))?;
            }
            FileChangeKind::Created | FileChangeKind::Modified => {
                if let Some(parent) = path.parent() {
                    fs::create_dir_all(parent)
                        .with_context(|| format!("failed to create {}", parent.display()))?;
                }
                fs::write(&path, &file.modified)
                    .with_context(|| format!("failed to write {}", path.display()))?;
            }
        }
        tracing::debug!(target = "relo.cli", path = %file.path, change = ?file.change, "wrote change");
    }
    Ok(())
}
