use std::collections::HashMap;

use relo_syntax::{Container, CopyMap, DeclId, ExprId, FileId, FileKind, SourceTree};

use crate::descriptor::ResolvedTarget;
use crate::error::{MoveError, TargetError};

/// Old-to-new identity of everything that was moved.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MoveMap {
    decls: HashMap<DeclId, DeclId>,
    exprs: HashMap<ExprId, ExprId>,
    roots: Vec<(DeclId, DeclId)>,
}

impl MoveMap {
    fn record(&mut self, root: DeclId, copy: DeclId, map: CopyMap) {
        self.roots.push((root, copy));
        self.decls.extend(map.decls);
        self.exprs.extend(map.exprs);
    }

    pub fn get(&self, old: DeclId) -> Option<DeclId> {
        self.decls.get(&old).copied()
    }

    /// The moved counterpart of `old`, or `old` itself when it did not move.
    pub fn map_decl(&self, old: DeclId) -> DeclId {
        self.get(old).unwrap_or(old)
    }

    pub fn map_expr(&self, old: ExprId) -> ExprId {
        self.exprs.get(&old).copied().unwrap_or(old)
    }

    /// `(original, copy)` for each moved root, in move order.
    pub fn roots(&self) -> &[(DeclId, DeclId)] {
        &self.roots
    }

    pub fn len(&self) -> usize {
        self.decls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.decls.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct MoveResult {
    pub map: MoveMap,
    pub destination: FileId,
    pub created_file: Option<FileId>,
    pub deleted_files: Vec<FileId>,
    /// Files that lost declarations and still exist.
    pub source_files: Vec<FileId>,
}

/// Relocate `roots` to `target`: copy each into the destination, then remove the originals.
///
/// A companion object or file left with nothing in it is deleted, and a class left with no
/// members loses its braces. The destination file is created first when the target names a
/// new one.
pub fn move_declarations(
    tree: &mut SourceTree,
    roots: &[DeclId],
    target: &ResolvedTarget,
) -> Result<MoveResult, MoveError> {
    if let Some(Container::Decl(container)) = target.container() {
        if !tree.is_decl_alive(container) {
            return Err(TargetError::StaleDeclaration {
                name: tree.decl(container).name.clone(),
            }
            .into());
        }
    }

    let (container, created_file) = match target {
        ResolvedTarget::ExistingFile(file) => (Container::File(*file), None),
        ResolvedTarget::NewFile {
            module,
            package,
            path,
        } => {
            let file = tree.add_file(*module, path.clone(), FileKind::Primary, package.clone());
            tracing::debug!(target = "relo.move", path = %path, "created destination file");
            (Container::File(file), Some(file))
        }
        ResolvedTarget::Container(decl) => (Container::Decl(*decl), None),
    };
    let destination = match container {
        Container::File(file) => file,
        Container::Decl(decl) => tree.file_of_decl(decl),
    };

    let mut map = MoveMap::default();
    let mut old_containers: Vec<Container> = Vec::new();
    for &root in roots {
        let (copy, copies) = tree.copy_decl(root, container);
        tree.insert_decl(container, copy);
        map.record(root, copy, copies);
        let old = tree.decl(root).container;
        if !old_containers.contains(&old) {
            old_containers.push(old);
        }
    }
    for &root in roots {
        tree.remove_decl(root);
    }

    let mut deleted_files = Vec::new();
    let mut source_files = Vec::new();
    for old in old_containers {
        let file = match old {
            Container::Decl(decl) => {
                let data = tree.decl(decl);
                let empty = data.members.as_ref().map_or(true, Vec::is_empty);
                if data.is_companion() && empty {
                    tracing::debug!(target = "relo.move", "removing empty companion object");
                    tree.remove_decl(decl);
                    if let Some(class) = tree.container_decl(decl) {
                        drop_empty_body(tree, class);
                    }
                } else {
                    drop_empty_body(tree, decl);
                }
                tree.file_of_decl(decl)
            }
            Container::File(file) => file,
        };
        if file != destination
            && tree.is_file_alive(file)
            && tree.file(file).is_effectively_empty()
        {
            tracing::debug!(target = "relo.move", path = %tree.file(file).path, "deleting emptied file");
            tree.delete_file(file);
            deleted_files.push(file);
        } else if tree.is_file_alive(file) && !source_files.contains(&file) {
            source_files.push(file);
        }
    }

    Ok(MoveResult {
        map,
        destination,
        created_file,
        deleted_files,
        source_files,
    })
}

fn drop_empty_body(tree: &mut SourceTree, decl: DeclId) {
    let members = &mut tree.decl_mut(decl).members;
    if members.as_ref().is_some_and(Vec::is_empty) {
        *members = None;
    }
}
