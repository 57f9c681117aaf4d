//! Usage discovery: every place that has to change, or could break, when declarations move.

use std::collections::HashSet;

use relo_core::{FqName, TextRange};
use relo_resolve::{find_text_occurrences, Resolver, TextOccurrence, TextOwner};
use relo_syntax::{DeclId, ExprId, ExprKind, FileKind, Modifier, RefRole, SourceTree};
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::declarations::needs_reference_tracking;
use crate::descriptor::SearchOptions;
use crate::error::MoveError;
use crate::services::ReferenceSearch;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum NonCodeKind {
    DocComment,
    StringLiteral,
}

/// Identity of the element a usage sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UsageElement {
    Expr(ExprId),
    Text(TextOwner, TextRange),
}

/// A reference from moved code to the instance of a class it is leaving.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OuterInstanceReference {
    /// `this@Outer`, or a `this` that resolves to an enclosing class of the moved declaration.
    ExplicitThis {
        expr: ExprId,
        outer: DeclId,
        moved: DeclId,
    },
    /// An unqualified access to an instance member of an enclosing class.
    ImplicitReceiver {
        expr: ExprId,
        member: DeclId,
        outer: DeclId,
        moved: DeclId,
    },
}

impl OuterInstanceReference {
    pub fn expr(&self) -> ExprId {
        match *self {
            OuterInstanceReference::ExplicitThis { expr, .. }
            | OuterInstanceReference::ImplicitReceiver { expr, .. } => expr,
        }
    }

    pub fn outer(&self) -> DeclId {
        match *self {
            OuterInstanceReference::ExplicitThis { outer, .. }
            | OuterInstanceReference::ImplicitReceiver { outer, .. } => outer,
        }
    }

    /// The moved root declaration the reference sits in.
    pub fn moved(&self) -> DeclId {
        match *self {
            OuterInstanceReference::ExplicitThis { moved, .. }
            | OuterInstanceReference::ImplicitReceiver { moved, .. } => moved,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UsageInfo {
    /// A reference inside the moved code to a tracked declaration, moved or not.
    Internal {
        expr: ExprId,
        target: DeclId,
        updatable: bool,
    },
    /// A reference from outside the moved code. `light` usages live in foreign sources and are
    /// rebound but never shortened.
    External {
        expr: ExprId,
        target: DeclId,
        light: bool,
        updatable: bool,
    },
    OuterInstance(OuterInstanceReference),
    /// A constructor call of a moved `inner` class (`outer.Inner()` or `Inner()`).
    OuterInstanceCall { expr: ExprId, class: DeclId },
    /// A fully qualified mention in a doc comment or string literal.
    NonCode {
        occurrence: TextOccurrence,
        target: DeclId,
        old_name: FqName,
        kind: NonCodeKind,
    },
}

impl UsageInfo {
    pub fn element(&self) -> UsageElement {
        match self {
            UsageInfo::NonCode { occurrence, .. } => {
                UsageElement::Text(occurrence.owner, occurrence.range)
            }
            UsageInfo::Internal { expr, .. }
            | UsageInfo::External { expr, .. }
            | UsageInfo::OuterInstanceCall { expr, .. } => UsageElement::Expr(*expr),
            UsageInfo::OuterInstance(reference) => UsageElement::Expr(reference.expr()),
        }
    }

    pub fn expr(&self) -> Option<ExprId> {
        match self {
            UsageInfo::Internal { expr, .. }
            | UsageInfo::External { expr, .. }
            | UsageInfo::OuterInstanceCall { expr, .. } => Some(*expr),
            UsageInfo::OuterInstance(reference) => Some(reference.expr()),
            UsageInfo::NonCode { .. } => None,
        }
    }

    /// The declaration the usage refers to.
    pub fn target(&self) -> DeclId {
        match self {
            UsageInfo::Internal { target, .. }
            | UsageInfo::External { target, .. }
            | UsageInfo::NonCode { target, .. } => *target,
            UsageInfo::OuterInstanceCall { class, .. } => *class,
            UsageInfo::OuterInstance(reference) => reference.outer(),
        }
    }

    /// `false` when the binding is decided by a qualifier that is itself rewritten.
    pub fn is_updatable(&self) -> bool {
        match self {
            UsageInfo::Internal { updatable, .. } | UsageInfo::External { updatable, .. } => {
                *updatable
            }
            UsageInfo::OuterInstance(_)
            | UsageInfo::OuterInstanceCall { .. }
            | UsageInfo::NonCode { .. } => true,
        }
    }

    pub fn is_light(&self) -> bool {
        matches!(self, UsageInfo::External { light: true, .. })
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            UsageInfo::Internal { .. } => "internal",
            UsageInfo::External { light: true, .. } => "light",
            UsageInfo::External { .. } => "external",
            UsageInfo::OuterInstance(_) => "outer-instance",
            UsageInfo::OuterInstanceCall { .. } => "outer-instance-call",
            UsageInfo::NonCode { .. } => "non-code",
        }
    }
}

/// Find every usage of the declarations being moved. Runs against the unmodified tree;
/// bindings stored in the tree are taken as the resolved targets.
pub fn discover_usages(
    tree: &SourceTree,
    roots: &[DeclId],
    tracked: &[DeclId],
    options: SearchOptions,
    search: &dyn ReferenceSearch,
    cancel: &CancellationToken,
) -> Result<Vec<UsageInfo>, MoveError> {
    let resolver = Resolver::new(tree);
    let moved_decls: HashSet<DeclId> = roots
        .iter()
        .flat_map(|&root| tree.subtree_decls(root))
        .collect();
    let mut moved_exprs: HashSet<ExprId> = HashSet::new();
    let mut out = Vec::new();

    for &root in roots {
        if cancel.is_cancelled() {
            return Err(MoveError::Cancelled);
        }
        for expr in tree.decl_subtree_exprs(root) {
            moved_exprs.insert(expr);
            if let Some(usage) = internal_usage(&resolver, expr, root, &moved_decls) {
                out.push(usage);
            }
        }
    }

    if options.search_references {
        for &decl in tracked {
            if cancel.is_cancelled() {
                return Err(MoveError::Cancelled);
            }
            let inner = tree.decl(decl).has_modifier(Modifier::Inner);
            for expr in search.find_references(tree, decl) {
                if moved_exprs.contains(&expr) {
                    continue;
                }
                let Some(ctx) = resolver.index().context(expr) else {
                    tracing::debug!(target = "relo.move", ?expr, "skipping reference outside live code");
                    continue;
                };
                let Some(name) = tree.name_ref(expr) else {
                    continue;
                };
                if inner && name.role == RefRole::Call && !ctx.in_import {
                    out.push(UsageInfo::OuterInstanceCall { expr, class: decl });
                    continue;
                }
                out.push(UsageInfo::External {
                    expr,
                    target: decl,
                    light: tree.file(ctx.anchor.file).kind == FileKind::Foreign,
                    updatable: is_updatable(tree, expr, &moved_decls),
                });
            }
        }
    }

    if options.search_in_comments || options.search_for_text {
        let mut text_usages = Vec::new();
        for &decl in tracked {
            if cancel.is_cancelled() {
                return Err(MoveError::Cancelled);
            }
            let old_name = tree.fq_name(decl);
            for occurrence in find_text_occurrences(
                tree,
                &old_name.to_string(),
                options.search_in_comments,
                options.search_for_text,
            ) {
                let kind = match occurrence.owner {
                    TextOwner::Doc(_) => NonCodeKind::DocComment,
                    TextOwner::Str(_) => NonCodeKind::StringLiteral,
                };
                text_usages.push(UsageInfo::NonCode {
                    occurrence,
                    target: decl,
                    old_name: old_name.clone(),
                    kind,
                });
            }
        }
        out.extend(drop_nested_occurrences(text_usages));
    }

    tracing::debug!(target = "relo.move", usages = out.len(), "discovered usages");
    Ok(out)
}

fn internal_usage(
    resolver: &Resolver<'_>,
    expr: ExprId,
    root: DeclId,
    moved: &HashSet<DeclId>,
) -> Option<UsageInfo> {
    let tree = resolver.tree();
    match &tree.expr(expr).kind {
        ExprKind::Name(name) => {
            let target = name.binding?;
            if !tree.is_decl_alive(target) {
                return None;
            }
            if name.qualifier.is_none() {
                let owner = resolver.index().anchor(expr)?.owner?;
                if let Some(outer) = outer_receiver(resolver, owner, target, root) {
                    return Some(UsageInfo::OuterInstance(
                        OuterInstanceReference::ImplicitReceiver {
                            expr,
                            member: target,
                            outer,
                            moved: root,
                        },
                    ));
                }
            }
            needs_reference_tracking(tree, target).then(|| UsageInfo::Internal {
                expr,
                target,
                updatable: is_updatable(tree, expr, moved),
            })
        }
        ExprKind::This {
            binding: Some(class),
            ..
        } => (*class != root && tree.is_inside(root, *class)).then_some(UsageInfo::OuterInstance(
            OuterInstanceReference::ExplicitThis {
                expr,
                outer: *class,
                moved: root,
            },
        )),
        ExprKind::This { binding: None, .. } | ExprKind::Str(_) | ExprKind::Literal(_) => None,
    }
}

/// The enclosing class outside `root` whose instance supplies `member` implicitly.
fn outer_receiver(
    resolver: &Resolver<'_>,
    owner: DeclId,
    member: DeclId,
    root: DeclId,
) -> Option<DeclId> {
    let tree = resolver.tree();
    if !resolver.is_instance_member(member) || tree.is_inside(member, root) {
        return None;
    }
    std::iter::once(owner)
        .chain(tree.ancestors(owner))
        .filter(|&decl| tree.decl(decl).is_class_like())
        .find(|&class| resolver.instance_members(class).contains(&member))
        .filter(|&class| !tree.is_inside(class, root))
}

/// Whether rewriting the reference itself is how it gets fixed. A reference whose qualifier
/// is a value, or a declaration that moves too, follows its qualifier instead.
pub fn is_updatable(tree: &SourceTree, expr: ExprId, moved: &HashSet<DeclId>) -> bool {
    let Some(name) = tree.name_ref(expr) else {
        return false;
    };
    let Some(qualifier) = name.qualifier else {
        return true;
    };
    match &tree.expr(qualifier).kind {
        ExprKind::Name(qualifier) => match qualifier.binding {
            None => true,
            Some(decl) => {
                tree.decl(decl).is_class_like()
                    && qualifier.role != RefRole::Call
                    && !moved.contains(&decl)
            }
        },
        ExprKind::This { .. } | ExprKind::Str(_) | ExprKind::Literal(_) => false,
    }
}

/// `a.b.Foo` inside `a.b.Foo.bar` is covered by the longer mention.
fn drop_nested_occurrences(usages: Vec<UsageInfo>) -> Vec<UsageInfo> {
    let ranges: Vec<(TextOwner, TextRange)> = usages
        .iter()
        .filter_map(|usage| match usage {
            UsageInfo::NonCode { occurrence, .. } => Some((occurrence.owner, occurrence.range)),
            _ => None,
        })
        .collect();
    usages
        .into_iter()
        .filter(|usage| {
            let UsageInfo::NonCode { occurrence, .. } = usage else {
                return true;
            };
            !ranges.iter().any(|&(owner, range)| {
                owner == occurrence.owner
                    && range != occurrence.range
                    && range.contains_range(occurrence.range)
            })
        })
        .collect()
}
