//! Minimal-qualification rewrites and import cleanup.

use std::collections::HashSet;

use relo_core::FqName;
use relo_syntax::{DeclId, ExprId, FileId, FileKind, RefRole, SourceTree};

use crate::resolver::{NameResolution, Resolver};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShortenOutcome {
    Unchanged,
    /// The qualifier in front of `head` was dropped.
    DroppedQualifier { head: ExprId },
    /// `fq` was imported so that `head` could stand alone.
    Imported { head: ExprId, fq: FqName },
}

enum Plan {
    Drop(ExprId),
    Import(ExprId, FqName, DeclId),
}

/// Rewrite the qualified chain ending in `top` to its shortest form that still binds every
/// remaining segment to the same declaration.
///
/// Only leading package and class qualifiers are candidates; value receivers are never
/// dropped. Chains inside import directives and in foreign files are left alone.
pub fn shorten_reference(tree: &mut SourceTree, top: ExprId) -> ShortenOutcome {
    let Some((plan, file)) = plan_shortening(tree, top) else {
        return ShortenOutcome::Unchanged;
    };
    match plan {
        Plan::Drop(head) => {
            tree.set_qualifier(head, None);
            ShortenOutcome::DroppedQualifier { head }
        }
        Plan::Import(head, fq, binding) => {
            tree.add_import(file, &fq, Some(binding));
            tree.set_qualifier(head, None);
            tracing::trace!(target = "relo.resolve", fq = %fq, "added import while shortening");
            ShortenOutcome::Imported { head, fq }
        }
    }
}

fn plan_shortening(tree: &SourceTree, top: ExprId) -> Option<(Plan, FileId)> {
    let resolver = Resolver::new(tree);
    let ctx = *resolver.index().context(top)?;
    if ctx.in_import || tree.file(ctx.anchor.file).kind == FileKind::Foreign {
        return None;
    }

    let segments = tree.chain_segments(top);
    // Number of leading segments that are package or class qualifiers.
    let mut static_prefix = 0;
    for (idx, &segment) in segments[..segments.len() - 1].iter().enumerate() {
        let Some(name) = tree.name_ref(segment) else {
            break;
        };
        let is_static = match name.binding {
            None => true,
            Some(decl) => {
                tree.decl(decl).is_class_like() && name.role != RefRole::Call
            }
        };
        if !is_static {
            break;
        }
        static_prefix = idx + 1;
    }
    if static_prefix == 0 {
        return None;
    }

    for &candidate in segments[1..=static_prefix].iter().rev() {
        let name = tree.name_ref(candidate)?;
        let Some(binding) = name.binding else {
            continue;
        };
        if resolver.lookup_at(&ctx, &name.name, name.role) == NameResolution::Decl(binding) {
            return Some((Plan::Drop(candidate), ctx.anchor.file));
        }
    }

    // Import the first declaration in the chain; its qualifier is a pure package path.
    let (head_idx, head) = segments[..=static_prefix]
        .iter()
        .copied()
        .enumerate()
        .find(|&(_, segment)| tree.name_ref(segment).is_some_and(|n| n.binding.is_some()))?;
    if head_idx == 0 {
        return None;
    }
    let name = tree.name_ref(head)?;
    let binding = name.binding?;
    if !tree.is_top_level(binding) {
        return None;
    }
    match resolver.lookup_at(&ctx, &name.name, name.role) {
        NameResolution::Decl(other) if other != binding => return None,
        _ => {}
    }
    let file = tree.file(ctx.anchor.file);
    let name_taken = file.imports.iter().any(|import| {
        let visible = import
            .alias
            .clone()
            .or_else(|| tree.name_ref(import.path).map(|path| path.name.clone()));
        visible.as_deref() == Some(name.name.as_str())
    });
    if name_taken {
        return None;
    }
    Some((
        Plan::Import(head, tree.fq_name(binding), binding),
        ctx.anchor.file,
    ))
}

/// Dotted text of a qualified chain (`a.b.C`).
pub fn chain_text(tree: &SourceTree, top: ExprId) -> String {
    tree.chain_segments(top)
        .into_iter()
        .filter_map(|segment| tree.name_ref(segment).map(|name| name.name.clone()))
        .collect::<Vec<_>>()
        .join(".")
}

/// Remove imports of `file` that are redundant: duplicates, imports of declarations from the
/// file's own package, and resolved imports nothing in the file refers to. The remaining
/// imports are sorted by path.
///
/// Returns how many imports were removed.
pub fn remove_redundant_imports(tree: &mut SourceTree, file: FileId) -> usize {
    let redundant: Vec<ExprId> = {
        let resolver = Resolver::new(tree);
        let data = tree.file(file);
        let used: HashSet<DeclId> = data
            .items
            .iter()
            .flat_map(|&item| tree.decl_subtree_exprs(item))
            .filter_map(|expr| tree.name_ref(expr).and_then(|name| name.binding))
            .collect();

        let mut seen = HashSet::new();
        data.imports
            .iter()
            .filter(|import| {
                let key = (chain_text(tree, import.path), import.alias.clone());
                if !seen.insert(key) {
                    return true;
                }
                let Some(target) = resolver.resolve_decl(import.path) else {
                    return false;
                };
                let same_package = import.alias.is_none()
                    && tree.is_top_level(target)
                    && tree.package_of_decl(target) == &data.package;
                same_package || !used.contains(&target)
            })
            .map(|import| import.path)
            .collect()
    };

    for &path in &redundant {
        tree.remove_import(file, path);
    }

    let mut imports = std::mem::take(&mut tree.file_mut(file).imports);
    imports.sort_by_cached_key(|import| (chain_text(tree, import.path), import.alias.clone()));
    tree.file_mut(file).imports = imports;

    if !redundant.is_empty() {
        tracing::debug!(
            target = "relo.resolve",
            path = %tree.file(file).path,
            removed = redundant.len(),
            "removed redundant imports"
        );
    }
    redundant.len()
}
