use std::collections::{HashMap, HashSet};

use relo_core::FqName;
use relo_syntax::{DeclId, ExprId, FileId, SourceTree};

/// Where a name is looked up from: a file, and the innermost declaration owning the
/// expression (`None` for import directives).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeAnchor {
    pub file: FileId,
    pub owner: Option<DeclId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParentSlot {
    Qualifier,
    TypeArgument,
    Argument,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExprContext {
    pub anchor: ScopeAnchor,
    pub parent: Option<(ExprId, ParentSlot)>,
    pub in_import: bool,
    /// Part of a supertype reference of the anchor's owner (`P` in `class C : P()`).
    pub in_supertype: bool,
}

#[derive(Debug, Clone, Copy)]
struct Flags {
    in_import: bool,
    in_supertype: bool,
}

impl Flags {
    const IMPORT: Flags = Flags {
        in_import: true,
        in_supertype: false,
    };
}

/// Positional facts about the live tree that the tree itself does not store.
#[derive(Debug, Default)]
pub struct TreeIndex {
    contexts: HashMap<ExprId, ExprContext>,
    top_level: HashMap<FqName, Vec<DeclId>>,
    packages: HashSet<FqName>,
}

impl TreeIndex {
    pub fn build(tree: &SourceTree) -> Self {
        let mut index = TreeIndex::default();
        for (file_id, file) in tree.files() {
            let mut prefix = file.package.clone();
            loop {
                index.packages.insert(prefix.clone());
                match prefix.parent() {
                    Some(parent) => prefix = parent,
                    None => break,
                }
            }
            index
                .top_level
                .entry(file.package.clone())
                .or_default()
                .extend(file.items.iter().copied());

            let import_anchor = ScopeAnchor {
                file: file_id,
                owner: None,
            };
            for import in &file.imports {
                index.record(tree, import.path, import_anchor, None, Flags::IMPORT);
            }
            for &item in &file.items {
                for decl in tree.subtree_decls(item) {
                    let anchor = ScopeAnchor {
                        file: file_id,
                        owner: Some(decl),
                    };
                    let supertypes = &tree.decl(decl).supertypes;
                    for root in tree.decl_expr_roots(decl) {
                        let flags = Flags {
                            in_import: false,
                            in_supertype: supertypes.iter().any(|entry| entry.ty == root),
                        };
                        index.record(tree, root, anchor, None, flags);
                    }
                }
            }
        }
        index
    }

    fn record(
        &mut self,
        tree: &SourceTree,
        expr: ExprId,
        anchor: ScopeAnchor,
        parent: Option<(ExprId, ParentSlot)>,
        flags: Flags,
    ) {
        self.contexts.insert(
            expr,
            ExprContext {
                anchor,
                parent,
                in_import: flags.in_import,
                in_supertype: flags.in_supertype,
            },
        );
        let Some(name) = tree.name_ref(expr) else {
            return;
        };
        if let Some(qualifier) = name.qualifier {
            self.record(tree, qualifier, anchor, Some((expr, ParentSlot::Qualifier)), flags);
        }
        for &arg in &name.type_args {
            self.record(tree, arg, anchor, Some((expr, ParentSlot::TypeArgument)), flags);
        }
        for &arg in name.args.iter().flatten() {
            self.record(tree, arg, anchor, Some((expr, ParentSlot::Argument)), flags);
        }
    }

    pub fn context(&self, expr: ExprId) -> Option<&ExprContext> {
        self.contexts.get(&expr)
    }

    pub fn anchor(&self, expr: ExprId) -> Option<ScopeAnchor> {
        self.contexts.get(&expr).map(|ctx| ctx.anchor)
    }

    /// The outermost segment of the qualified chain containing `expr`.
    pub fn chain_top(&self, mut expr: ExprId) -> ExprId {
        while let Some(ExprContext {
            parent: Some((parent, ParentSlot::Qualifier)),
            ..
        }) = self.contexts.get(&expr)
        {
            expr = *parent;
        }
        expr
    }

    /// Top-level declarations of `package`, across all modules.
    pub fn top_level(&self, package: &FqName) -> &[DeclId] {
        self.top_level.get(package).map_or(&[], Vec::as_slice)
    }

    /// `true` when some file lives in `package` or in a package below it.
    pub fn has_package(&self, package: &FqName) -> bool {
        self.packages.contains(package)
    }
}
