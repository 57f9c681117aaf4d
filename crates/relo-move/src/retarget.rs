//! Usage retargeting: after the declarations moved, point every recorded usage at the new
//! declaration, then shorten and tidy imports.

use std::cmp::Reverse;
use std::collections::{HashMap, HashSet};

use indexmap::IndexMap;
use relo_core::TextRange;
use relo_resolve::{remove_redundant_imports, set_binding, ShortenOutcome, TextOwner, TreeIndex};
use relo_syntax::{
    render_file, DeclId, ExprId, ExprKind, FileId, FileKind, RefRole, RenderedFile, SourceTree,
};

use crate::conflicts::OuterParamPlan;
use crate::mover::MoveMap;
use crate::services::ReferenceShortener;
use crate::transform::qualifier_for;
use crate::usages::{UsageElement, UsageInfo};

/// Position of each usage in the text as it was before anything changed, as `(path, offset)`.
pub type UsageOffsets = HashMap<UsageElement, (String, usize)>;

pub fn usage_offsets(tree: &SourceTree, usages: &[UsageInfo]) -> UsageOffsets {
    let index = TreeIndex::build(tree);
    let mut rendered: HashMap<FileId, RenderedFile> = HashMap::new();
    let mut out = HashMap::new();
    for usage in usages {
        let (file, offset) = match usage {
            UsageInfo::NonCode { occurrence, .. } => {
                let layout = &rendered_file(&mut rendered, tree, occurrence.file).layout;
                let base = match occurrence.owner {
                    TextOwner::Doc(decl) => layout.docs.get(&decl).map(|range| range.start),
                    TextOwner::Str(expr) => layout.expr_range(expr).map(|range| range.start),
                };
                (occurrence.file, base.map(|base| base + occurrence.range.start))
            }
            _ => {
                let Some(expr) = usage.expr() else {
                    continue;
                };
                let Some(anchor) = index.anchor(expr) else {
                    continue;
                };
                let layout = &rendered_file(&mut rendered, tree, anchor.file).layout;
                (anchor.file, layout.expr_range(expr).map(|range| range.start))
            }
        };
        if let Some(offset) = offset {
            out.insert(usage.element(), (tree.file(file).path.clone(), offset));
        }
    }
    out
}

fn rendered_file<'a>(
    cache: &'a mut HashMap<FileId, RenderedFile>,
    tree: &SourceTree,
    file: FileId,
) -> &'a RenderedFile {
    cache.entry(file).or_insert_with(|| render_file(tree, file))
}

#[derive(Debug, Clone, Default)]
pub struct RetargetReport {
    /// Usages as they stand after the move: expressions and targets mapped to the copies.
    pub applied: Vec<UsageInfo>,
    /// Usages whose element disappeared before it could be rewritten.
    pub skipped: usize,
    pub touched_files: Vec<FileId>,
}

/// Rebind all `usages` to the moved declarations recorded in `map`.
///
/// Usages are processed per file in their original text order. Every reference is first
/// rewritten to a fully qualified form, then each affected chain is shortened once; light
/// usages keep the qualified form. `also_clean` names files whose imports should be tidied
/// even if no usage lives there.
pub fn retarget_usages(
    tree: &mut SourceTree,
    usages: &[UsageInfo],
    map: &MoveMap,
    offsets: &UsageOffsets,
    plans: &IndexMap<DeclId, OuterParamPlan>,
    shortener: &dyn ReferenceShortener,
    also_clean: &[FileId],
) -> RetargetReport {
    let mut ordered: Vec<(&UsageInfo, Option<&(String, usize)>)> = usages
        .iter()
        .map(|usage| (usage, offsets.get(&usage.element())))
        .collect();
    ordered.sort_by(|a, b| match (a.1, b.1) {
        (Some(a), Some(b)) => a.cmp(b),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => std::cmp::Ordering::Equal,
    });

    let index = TreeIndex::build(tree);
    let mut report = RetargetReport::default();
    let mut touched: Vec<FileId> = Vec::new();
    let mut tops: Vec<ExprId> = Vec::new();
    let mut text_edits: IndexMap<TextOwner, Vec<(TextRange, String, String)>> = IndexMap::new();

    for (usage, _) in ordered {
        match usage {
            UsageInfo::Internal {
                expr,
                target,
                updatable,
            }
            | UsageInfo::External {
                expr,
                target,
                updatable,
                ..
            } => {
                let expr = map.map_expr(*expr);
                let target = map.map_decl(*target);
                let refreshed = match usage {
                    UsageInfo::Internal { .. } => UsageInfo::Internal {
                        expr,
                        target,
                        updatable: *updatable,
                    },
                    _ => UsageInfo::External {
                        expr,
                        target,
                        light: usage.is_light(),
                        updatable: *updatable,
                    },
                };
                if !*updatable {
                    report.applied.push(refreshed);
                    continue;
                }
                let Some(ctx) = index.context(expr).filter(|_| tree.is_expr_alive(expr)) else {
                    tracing::debug!(target = "relo.move", ?expr, kind = usage.kind_name(), "usage invalidated; skipping");
                    report.skipped += 1;
                    continue;
                };
                rebind(tree, expr, target);
                push_unique(&mut touched, ctx.anchor.file);
                if !usage.is_light() && !ctx.in_import {
                    push_unique(&mut tops, index.chain_top(expr));
                }
                report.applied.push(refreshed);
            }
            UsageInfo::OuterInstanceCall { expr, class } => {
                let Some(ctx) = index.context(*expr).filter(|_| tree.is_expr_alive(*expr)) else {
                    report.skipped += 1;
                    continue;
                };
                let new_class = map.map_decl(*class);
                let receiver = value_receiver(tree, *expr);
                match plans.get(class) {
                    Some(plan) => {
                        let argument = match receiver {
                            Some(_) => tree.take_qualifier(*expr),
                            None => None,
                        };
                        let argument = argument.unwrap_or_else(|| {
                            let innermost = ctx.anchor.owner.and_then(|owner| {
                                std::iter::once(owner)
                                    .chain(tree.ancestors(owner))
                                    .find(|&decl| tree.decl(decl).is_class_like())
                            });
                            let label = (innermost != Some(plan.outer))
                                .then(|| tree.decl(plan.outer).name.clone());
                            tree.alloc_expr(ExprKind::This {
                                label,
                                binding: Some(plan.outer),
                            })
                        });
                        if let Some(name) = tree.name_ref_mut(*expr) {
                            name.args.get_or_insert_with(Vec::new).insert(0, argument);
                        }
                    }
                    None => {
                        if receiver.is_some() {
                            tree.set_qualifier(*expr, None);
                        }
                    }
                }
                rebind(tree, *expr, new_class);
                push_unique(&mut touched, ctx.anchor.file);
                if tree.file(ctx.anchor.file).kind == FileKind::Primary {
                    push_unique(&mut tops, index.chain_top(*expr));
                }
                report.applied.push(UsageInfo::OuterInstanceCall {
                    expr: *expr,
                    class: new_class,
                });
            }
            UsageInfo::NonCode {
                occurrence,
                target,
                old_name,
                kind,
            } => {
                let owner = match occurrence.owner {
                    TextOwner::Doc(decl) => TextOwner::Doc(map.map_decl(decl)),
                    TextOwner::Str(expr) => TextOwner::Str(map.map_expr(expr)),
                };
                let target = map.map_decl(*target);
                let new_name = tree.fq_name(target);
                text_edits.entry(owner).or_default().push((
                    occurrence.range,
                    old_name.to_string(),
                    new_name.to_string(),
                ));
                let mut occurrence = *occurrence;
                occurrence.owner = owner;
                report.applied.push(UsageInfo::NonCode {
                    occurrence,
                    target,
                    old_name: old_name.clone(),
                    kind: *kind,
                });
            }
            // Rewritten before the copy was made.
            UsageInfo::OuterInstance(_) => report.applied.push(usage.clone()),
        }
    }

    for (owner, edits) in text_edits {
        apply_text_edits(tree, owner, edits);
    }

    let mut shortened = 0;
    for top in tops {
        if tree.is_expr_alive(top) && shortener.shorten(tree, top) != ShortenOutcome::Unchanged {
            shortened += 1;
        }
    }

    for &file in also_clean {
        push_unique(&mut touched, file);
    }
    for &file in &touched {
        if tree.is_file_alive(file) && tree.file(file).kind == FileKind::Primary {
            remove_redundant_imports(tree, file);
        }
    }
    let remapped = remap_stale_bindings(tree, map);

    tracing::debug!(
        target = "relo.move",
        applied = report.applied.len(),
        skipped = report.skipped,
        shortened,
        remapped,
        "retargeted usages"
    );
    report.touched_files = touched;
    report
}

fn push_unique<T: PartialEq>(items: &mut Vec<T>, item: T) {
    if !items.contains(&item) {
        items.push(item);
    }
}

/// Point `expr` at `target` through a fully qualified chain.
fn rebind(tree: &mut SourceTree, expr: ExprId, target: DeclId) {
    let Some(role) = tree.name_ref(expr).map(|name| name.role) else {
        return;
    };
    let qualifier = qualifier_for(tree, target, role);
    tree.set_qualifier(expr, qualifier);
    let name = tree.decl(target).name.clone();
    if let Some(reference) = tree.name_ref_mut(expr) {
        reference.name = name;
        reference.binding = Some(target);
    }
}

/// The qualifier of `expr` when it is a value (`outer.Inner()`), not a package or class path.
fn value_receiver(tree: &SourceTree, expr: ExprId) -> Option<ExprId> {
    let qualifier = tree.name_ref(expr)?.qualifier?;
    match &tree.expr(qualifier).kind {
        ExprKind::Name(name) => match name.binding {
            None => None,
            Some(decl) if tree.decl(decl).is_class_like() && name.role != RefRole::Call => {
                tree.decl(decl).is_object().then_some(qualifier)
            }
            Some(_) => Some(qualifier),
        },
        ExprKind::This { .. } | ExprKind::Str(_) | ExprKind::Literal(_) => Some(qualifier),
    }
}

fn apply_text_edits(tree: &mut SourceTree, owner: TextOwner, mut edits: Vec<(TextRange, String, String)>) {
    edits.sort_by_key(|(range, _, _)| Reverse(range.start));
    let text = match owner {
        TextOwner::Doc(decl) => {
            if !tree.is_decl_alive(decl) {
                return;
            }
            match tree.decl_mut(decl).doc.as_mut() {
                Some(doc) => doc,
                None => return,
            }
        }
        TextOwner::Str(expr) => {
            if !tree.is_expr_alive(expr) {
                return;
            }
            match &mut tree.expr_mut(expr).kind {
                ExprKind::Str(text) => text,
                _ => return,
            }
        }
    };
    let mut last_start = usize::MAX;
    for (range, old, new) in edits {
        if range.end > last_start || text.get(range.start..range.end) != Some(old.as_str()) {
            tracing::debug!(target = "relo.move", "text occurrence changed; skipping");
            continue;
        }
        text.replace_range(range.start..range.end, &new);
        last_start = range.start;
    }
}

/// Repoint any remaining binding to a moved declaration; such references are reached through
/// a receiver and need no text change.
fn remap_stale_bindings(tree: &mut SourceTree, map: &MoveMap) -> usize {
    let stale: Vec<(ExprId, DeclId)> = tree
        .exprs()
        .filter_map(|(id, expr)| Some((id, map.get(expr.binding()?)?)))
        .collect();
    for &(expr, target) in &stale {
        set_binding(tree, expr, Some(target));
    }
    stale.len()
}

/// Outermost chain segment of each expression, without duplicates.
pub fn chain_tops(tree: &SourceTree, exprs: &[ExprId]) -> Vec<ExprId> {
    let index = TreeIndex::build(tree);
    let mut out = Vec::new();
    let mut seen = HashSet::new();
    for &expr in exprs {
        let top = index.chain_top(expr);
        if seen.insert(top) {
            out.push(top);
        }
    }
    out
}
