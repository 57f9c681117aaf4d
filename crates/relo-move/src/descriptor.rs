//! What to move and where to: the request types, validated against the tree before any
//! mutation happens.

use relo_core::{is_valid_identifier, validate_package_name, FqName};
use relo_syntax::{
    Container, DeclId, DeclKind, FileId, FileKind, ModuleId, SourceTree, PRIMARY_EXTENSION,
};
use serde::{Deserialize, Serialize};

use crate::error::TargetError;

/// Default bound on `outer`, `outer1`, `outer2`, ... candidates for a synthesized parameter.
pub const DEFAULT_NAME_ATTEMPTS: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchOptions {
    /// Look for code references outside the moved declarations.
    pub search_references: bool,
    /// Update fully qualified mentions inside doc comments.
    pub search_in_comments: bool,
    /// Update fully qualified mentions inside string literals.
    pub search_for_text: bool,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            search_references: true,
            search_in_comments: false,
            search_for_text: false,
        }
    }
}

/// Knobs of the engine itself, independent of a particular request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveSettings {
    /// Pass the enclosing instance explicitly when a nested class that uses it leaves its
    /// outer class. When off, such usages are reported as conflicts.
    pub synthesize_outer_instance: bool,
    pub outer_instance_name_attempts: usize,
}

impl Default for MoveSettings {
    fn default() -> Self {
        Self {
            synthesize_outer_instance: true,
            outer_instance_name_attempts: DEFAULT_NAME_ATTEMPTS,
        }
    }
}

/// One logical move unit: declarations sharing a single container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveSource {
    decls: Vec<DeclId>,
    container: Container,
    options: SearchOptions,
}

impl MoveSource {
    pub fn declarations(
        tree: &SourceTree,
        decls: impl IntoIterator<Item = DeclId>,
        options: SearchOptions,
    ) -> Result<Self, TargetError> {
        let mut unique: Vec<DeclId> = Vec::new();
        for decl in decls {
            if !unique.contains(&decl) {
                unique.push(decl);
            }
        }
        let Some(&first) = unique.first() else {
            return Err(TargetError::EmptySource);
        };
        for &decl in &unique {
            let data = tree.decl(decl);
            if !data.alive {
                return Err(TargetError::StaleDeclaration {
                    name: data.name.clone(),
                });
            }
            if !is_relocatable(tree, decl) {
                return Err(TargetError::NotRelocatable {
                    name: data.name.clone(),
                    kind: data.kind.describe(),
                });
            }
        }
        let container = tree.decl(first).container;
        if unique
            .iter()
            .any(|&decl| tree.decl(decl).container != container)
        {
            return Err(TargetError::MixedContainers);
        }
        Ok(Self {
            decls: unique,
            container,
            options,
        })
    }

    /// Every top-level declaration of `file`.
    pub fn file(tree: &SourceTree, file: FileId, options: SearchOptions) -> Result<Self, TargetError> {
        if !tree.is_file_alive(file) {
            return Err(TargetError::MissingFile {
                path: tree.file(file).path.clone(),
            });
        }
        let items = tree.file(file).items.clone();
        Self::declarations(tree, items, options)
    }

    pub fn decls(&self) -> &[DeclId] {
        &self.decls
    }

    pub fn container(&self) -> Container {
        self.container
    }

    pub fn options(&self) -> SearchOptions {
        self.options
    }
}

/// Class-likes anywhere, plus functions and properties that are top-level or object members.
pub fn is_relocatable(tree: &SourceTree, decl: DeclId) -> bool {
    let data = tree.decl(decl);
    match data.kind {
        DeclKind::Class | DeclKind::Interface | DeclKind::Object => true,
        DeclKind::Function | DeclKind::Property { .. } => match data.container {
            Container::File(_) => true,
            Container::Decl(container) => tree.decl(container).is_object(),
        },
        DeclKind::Parameter { .. } | DeclKind::TypeParameter | DeclKind::Local { .. } => false,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MoveTarget {
    /// A package of a module. Declarations land in `file_name` (derived from the first moved
    /// declaration when absent), which is created unless it already exists.
    Package {
        module: ModuleId,
        package: FqName,
        file_name: Option<String>,
    },
    File(FileId),
    /// The body of a class, interface or object.
    Container(DeclId),
}

/// A destination that has been checked against the current tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedTarget {
    ExistingFile(FileId),
    NewFile {
        module: ModuleId,
        package: FqName,
        path: String,
    },
    Container(DeclId),
}

impl MoveTarget {
    pub fn resolve(
        &self,
        tree: &SourceTree,
        source: &MoveSource,
    ) -> Result<ResolvedTarget, TargetError> {
        let resolved = match self {
            MoveTarget::Package {
                module,
                package,
                file_name,
            } => {
                if !package.is_root() {
                    let text = package.to_string();
                    validate_package_name(&text).map_err(|source| TargetError::InvalidPackage {
                        package: text,
                        source,
                    })?;
                }
                let file_name = match file_name {
                    Some(name) => name.clone(),
                    None => default_file_name(tree, source),
                };
                if !is_valid_file_name(&file_name) {
                    return Err(TargetError::InvalidFileName { name: file_name });
                }
                let path = file_path(&tree.module(*module).root, package, &file_name);
                match tree.find_file(&path) {
                    Some(existing)
                        if tree.file(existing).package == *package
                            && tree.file(existing).module == *module =>
                    {
                        ResolvedTarget::ExistingFile(existing)
                    }
                    Some(existing) => {
                        return Err(TargetError::PathTaken {
                            path,
                            package: tree.file(existing).package.clone(),
                        })
                    }
                    None => ResolvedTarget::NewFile {
                        module: *module,
                        package: package.clone(),
                        path,
                    },
                }
            }
            MoveTarget::File(file) => {
                let data = tree.file(*file);
                if !data.alive {
                    return Err(TargetError::MissingFile {
                        path: data.path.clone(),
                    });
                }
                if data.kind == FileKind::Foreign {
                    return Err(TargetError::ForeignDestination {
                        path: data.path.clone(),
                    });
                }
                ResolvedTarget::ExistingFile(*file)
            }
            MoveTarget::Container(decl) => {
                let data = tree.decl(*decl);
                if !data.alive {
                    return Err(TargetError::StaleDeclaration {
                        name: data.name.clone(),
                    });
                }
                if !data.is_class_like() {
                    return Err(TargetError::NotAContainer {
                        name: tree.fq_name(*decl).to_string(),
                    });
                }
                let file = tree.file(tree.file_of_decl(*decl));
                if file.kind == FileKind::Foreign {
                    return Err(TargetError::ForeignDestination {
                        path: file.path.clone(),
                    });
                }
                if let Some(&moved) = source
                    .decls()
                    .iter()
                    .find(|&&moved| tree.is_inside(*decl, moved))
                {
                    return Err(TargetError::TargetInsideSource {
                        name: tree.decl(moved).name.clone(),
                    });
                }
                ResolvedTarget::Container(*decl)
            }
        };

        if resolved.container() == Some(source.container()) {
            return Err(TargetError::SameLocation {
                location: resolved.describe(tree),
            });
        }
        Ok(resolved)
    }
}

impl ResolvedTarget {
    /// The container declarations will be inserted into, when it already exists.
    pub fn container(&self) -> Option<Container> {
        match self {
            ResolvedTarget::ExistingFile(file) => Some(Container::File(*file)),
            ResolvedTarget::NewFile { .. } => None,
            ResolvedTarget::Container(decl) => Some(Container::Decl(*decl)),
        }
    }

    pub fn container_decl(&self) -> Option<DeclId> {
        match self {
            ResolvedTarget::Container(decl) => Some(*decl),
            ResolvedTarget::ExistingFile(_) | ResolvedTarget::NewFile { .. } => None,
        }
    }

    /// The existing file that will hold the moved declarations.
    pub fn existing_file(&self, tree: &SourceTree) -> Option<FileId> {
        match self {
            ResolvedTarget::ExistingFile(file) => Some(*file),
            ResolvedTarget::NewFile { .. } => None,
            ResolvedTarget::Container(decl) => Some(tree.file_of_decl(*decl)),
        }
    }

    pub fn module(&self, tree: &SourceTree) -> ModuleId {
        match self {
            ResolvedTarget::ExistingFile(file) => tree.file(*file).module,
            ResolvedTarget::NewFile { module, .. } => *module,
            ResolvedTarget::Container(decl) => tree.module_of_decl(*decl),
        }
    }

    pub fn package(&self, tree: &SourceTree) -> FqName {
        match self {
            ResolvedTarget::ExistingFile(file) => tree.file(*file).package.clone(),
            ResolvedTarget::NewFile { package, .. } => package.clone(),
            ResolvedTarget::Container(decl) => tree.package_of_decl(*decl).clone(),
        }
    }

    /// Qualified name moved declarations will live under.
    pub fn scope_name(&self, tree: &SourceTree) -> FqName {
        match self {
            ResolvedTarget::Container(decl) => tree.fq_name(*decl),
            ResolvedTarget::ExistingFile(_) | ResolvedTarget::NewFile { .. } => self.package(tree),
        }
    }

    /// `true` when the destination is `decl` itself or nested inside it.
    pub fn is_inside(&self, tree: &SourceTree, decl: DeclId) -> bool {
        self.container_decl()
            .is_some_and(|container| tree.is_inside(container, decl))
    }

    pub fn is_object_container(&self, tree: &SourceTree) -> bool {
        self.container_decl()
            .is_some_and(|container| tree.decl(container).is_object())
    }

    pub fn describe(&self, tree: &SourceTree) -> String {
        match self {
            ResolvedTarget::ExistingFile(file) => tree.file(*file).path.clone(),
            ResolvedTarget::NewFile { path, .. } => path.clone(),
            ResolvedTarget::Container(decl) => tree.fq_name(*decl).to_string(),
        }
    }
}

/// Event payload describing a move in terms that survive the move itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MoveDescriptor {
    pub declarations: Vec<FqName>,
    pub destination: String,
}

impl MoveDescriptor {
    pub fn new(tree: &SourceTree, source: &MoveSource, target: &ResolvedTarget) -> Self {
        Self {
            declarations: source.decls().iter().map(|&decl| tree.fq_name(decl)).collect(),
            destination: target.describe(tree),
        }
    }
}

fn default_file_name(tree: &SourceTree, source: &MoveSource) -> String {
    let stem = source
        .decls()
        .first()
        .map_or("Moved", |&decl| tree.decl(decl).name.as_str());
    format!("{stem}.{PRIMARY_EXTENSION}")
}

fn is_valid_file_name(name: &str) -> bool {
    name.strip_suffix(PRIMARY_EXTENSION)
        .and_then(|stem| stem.strip_suffix('.'))
        .is_some_and(is_valid_identifier)
}

/// `<module root>/<package dirs>/<file name>`.
pub fn file_path(root: &str, package: &FqName, file_name: &str) -> String {
    let root = root.trim_end_matches('/');
    let mut parts: Vec<&str> = Vec::new();
    if !root.is_empty() {
        parts.push(root);
    }
    parts.extend(package.segments().iter().map(String::as_str));
    parts.push(file_name);
    parts.join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_paths_follow_the_package() {
        let package: FqName = "a.b".parse().unwrap();
        assert_eq!(file_path("src/", &package, "Foo.kt"), "src/a/b/Foo.kt");
        assert_eq!(file_path("", &FqName::root(), "Foo.kt"), "Foo.kt");
    }

    #[test]
    fn file_names_need_the_primary_extension() {
        assert!(is_valid_file_name("Foo.kt"));
        assert!(!is_valid_file_name("Foo.java"));
        assert!(!is_valid_file_name(".kt"));
        assert!(!is_valid_file_name("a/Foo.kt"));
    }
}
