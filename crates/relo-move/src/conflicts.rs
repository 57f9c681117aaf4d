//! Conflict detection: everything a move would break, computed against the unmodified tree.
//!
//! Each check is a plain function over a shared context. A check that panics is logged
//! and contributes nothing; the remaining checks still run.

use std::collections::{HashMap, HashSet, VecDeque};
use std::panic::{catch_unwind, AssertUnwindSafe};

use indexmap::IndexMap;
use relo_core::{decapitalize, is_valid_identifier, FqName, LineIndex};
use relo_resolve::{ExprContext, NameResolution, Resolver, ScopeAnchor};
use relo_syntax::{
    render_file, DeclId, DeclKind, ExprId, FileId, Modifier, ModuleId, RefRole,
    RenderedFile, SourceTree, Visibility,
};
use tokio_util::sync::CancellationToken;

use crate::descriptor::{MoveSettings, ResolvedTarget};
use crate::error::MoveError;
use crate::usages::{OuterInstanceReference, UsageElement, UsageInfo};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConflictLocation {
    Declaration(DeclId),
    Usage(ExprId),
}

/// Conflict messages grouped by the element they are about, in detection order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConflictMap {
    entries: IndexMap<ConflictLocation, Vec<String>>,
}

impl ConflictMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, location: ConflictLocation, message: impl Into<String>) {
        let message = message.into();
        let messages = self.entries.entry(location).or_default();
        if !messages.contains(&message) {
            messages.push(message);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of distinct messages.
    pub fn len(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ConflictLocation, &[String])> {
        self.entries
            .iter()
            .map(|(location, messages)| (*location, messages.as_slice()))
    }

    pub fn messages(&self) -> impl Iterator<Item = &str> {
        self.entries.values().flatten().map(String::as_str)
    }

    /// Human-readable locations (`a.b.Foo`, `src/a/B.kt:3:5`) paired with their messages.
    pub fn describe(&self, tree: &SourceTree) -> Vec<(String, Vec<String>)> {
        let resolver = Resolver::new(tree);
        let mut rendered: HashMap<FileId, (RenderedFile, LineIndex)> = HashMap::new();
        self.entries
            .iter()
            .map(|(location, messages)| {
                let label = match *location {
                    ConflictLocation::Declaration(decl) => tree.fq_name(decl).to_string(),
                    ConflictLocation::Usage(expr) => {
                        usage_label(tree, &resolver, &mut rendered, expr)
                    }
                };
                (label, messages.clone())
            })
            .collect()
    }
}

fn usage_label(
    tree: &SourceTree,
    resolver: &Resolver<'_>,
    rendered: &mut HashMap<FileId, (RenderedFile, LineIndex)>,
    expr: ExprId,
) -> String {
    let Some(anchor) = resolver.index().anchor(expr) else {
        return format!("{expr:?}");
    };
    let (file, lines) = rendered.entry(anchor.file).or_insert_with(|| {
        let file = render_file(tree, anchor.file);
        let lines = LineIndex::new(&file.text);
        (file, lines)
    });
    let path = &tree.file(anchor.file).path;
    match file.layout.expr_range(expr) {
        Some(range) => {
            let pos = lines.line_col(range.start);
            format!("{path}:{}:{}", pos.line + 1, pos.col + 1)
        }
        None => path.clone(),
    }
}

/// Parameter to synthesize for a class that leaves the class whose instance it uses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OuterParamPlan {
    pub outer: DeclId,
    pub name: String,
}

#[derive(Debug, Clone, Default)]
pub struct ConflictAnalysis {
    pub conflicts: ConflictMap,
    /// Usages that will be left untouched if the move goes ahead.
    pub blocked: HashSet<UsageElement>,
    /// Keyed by moved root declaration.
    pub outer_params: IndexMap<DeclId, OuterParamPlan>,
}

impl ConflictAnalysis {
    pub fn retain_active(&self, usages: Vec<UsageInfo>) -> Vec<UsageInfo> {
        usages
            .into_iter()
            .filter(|usage| !self.blocked.contains(&usage.element()))
            .collect()
    }
}

struct CheckContext<'a> {
    tree: &'a SourceTree,
    resolver: &'a Resolver<'a>,
    roots: &'a [DeclId],
    target: &'a ResolvedTarget,
    usages: &'a [UsageInfo],
    settings: &'a MoveSettings,
    moved: HashSet<DeclId>,
    target_module: ModuleId,
    target_package: FqName,
}

impl CheckContext<'_> {
    fn name(&self, decl: DeclId) -> String {
        self.tree.fq_name(decl).to_string()
    }

    fn is_moved(&self, decl: DeclId) -> bool {
        self.moved.contains(&decl)
    }

    fn module_name(&self, module: ModuleId) -> &str {
        &self.tree.module(module).name
    }

    fn anchor(&self, expr: ExprId) -> Option<ScopeAnchor> {
        self.resolver.index().anchor(expr)
    }

    /// Where moved code ends up.
    fn destination_site(&self) -> Site {
        Site {
            module: self.target_module,
            file: self.target.existing_file(self.tree),
            within: self.target.container_decl(),
        }
    }

    fn site_of(&self, anchor: ScopeAnchor) -> Site {
        Site {
            module: self.tree.file(anchor.file).module,
            file: Some(anchor.file),
            within: anchor.owner,
        }
    }

    fn placement_of(&self, decl: DeclId) -> Site {
        Site {
            module: self.tree.module_of_decl(decl),
            file: Some(self.tree.file_of_decl(decl)),
            within: self.tree.container_decl(decl),
        }
    }

    /// Can code at `site` see a declaration with `visibility` placed at `placement`?
    fn accessible(&self, visibility: Visibility, placement: Site, site: Site) -> bool {
        let tree = self.tree;
        match visibility {
            Visibility::Public => true,
            Visibility::Internal => site.module == placement.module,
            Visibility::Private => match placement.within {
                Some(container) => site
                    .within
                    .is_some_and(|within| tree.is_inside(within, container)),
                None => site.file.is_some() && site.file == placement.file,
            },
            Visibility::Protected => match placement.within {
                Some(container) => site.within.is_some_and(|within| {
                    std::iter::once(within)
                        .chain(tree.ancestors(within))
                        .any(|decl| {
                            decl == container
                                || (tree.decl(decl).is_class_like()
                                    && self.resolver.all_supertypes(decl).contains(&container))
                        })
                }),
                None => true,
            },
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Site {
    module: ModuleId,
    file: Option<FileId>,
    within: Option<DeclId>,
}

#[derive(Default)]
struct CheckOutput {
    conflicts: Vec<(ConflictLocation, String)>,
    blocked: Vec<UsageElement>,
    plans: Vec<(DeclId, OuterParamPlan)>,
}

impl CheckOutput {
    fn report(&mut self, location: ConflictLocation, message: String) {
        self.conflicts.push((location, message));
    }

    /// Report a conflict on `usage` and drop it from the set that gets rewritten.
    fn block(&mut self, usage: &UsageInfo, message: String) {
        let location = match usage.expr() {
            Some(expr) => ConflictLocation::Usage(expr),
            None => ConflictLocation::Declaration(usage.target()),
        };
        self.report(location, message);
        self.blocked.push(usage.element());
    }
}

type Check = fn(&CheckContext<'_>, &mut CheckOutput);

const CHECKS: &[(&str, Check)] = &[
    ("expect-actual", check_expect_actual),
    ("visibility", check_visibility),
    ("module-dependencies", check_module_dependencies),
    ("sealed-hierarchy", check_sealed_hierarchy),
    ("name-clash", check_name_clash),
    ("type-parameters", check_type_parameters),
    ("overrides", check_overrides),
    ("outer-instance", check_outer_instance),
    ("package-prefix", check_package_prefix),
];

/// Run every conflict check. The result depends only on the tree and the inputs, so running
/// it twice on the same state yields the same map.
pub fn detect_conflicts(
    tree: &SourceTree,
    roots: &[DeclId],
    target: &ResolvedTarget,
    usages: &[UsageInfo],
    settings: &MoveSettings,
    cancel: &CancellationToken,
) -> Result<ConflictAnalysis, MoveError> {
    let resolver = Resolver::new(tree);
    let ctx = CheckContext {
        tree,
        resolver: &resolver,
        roots,
        target,
        usages,
        settings,
        moved: roots
            .iter()
            .flat_map(|&root| tree.subtree_decls(root))
            .collect(),
        target_module: target.module(tree),
        target_package: target.package(tree),
    };

    let mut analysis = ConflictAnalysis::default();
    for &(name, check) in CHECKS {
        if cancel.is_cancelled() {
            return Err(MoveError::Cancelled);
        }
        let result = catch_unwind(AssertUnwindSafe(|| {
            let mut out = CheckOutput::default();
            check(&ctx, &mut out);
            out
        }));
        match result {
            Ok(out) => {
                for (location, message) in out.conflicts {
                    analysis.conflicts.add(location, message);
                }
                analysis.blocked.extend(out.blocked);
                analysis.outer_params.extend(out.plans);
            }
            Err(_) => {
                tracing::error!(target = "relo.move", check = name, "conflict check panicked; ignoring it");
            }
        }
    }
    tracing::debug!(
        target = "relo.move",
        conflicts = analysis.conflicts.len(),
        blocked = analysis.blocked.len(),
        "conflict detection finished"
    );
    Ok(analysis)
}

fn check_expect_actual(ctx: &CheckContext<'_>, out: &mut CheckOutput) {
    for &root in ctx.roots {
        for decl in ctx.tree.subtree_decls(root) {
            let data = ctx.tree.decl(decl);
            let keyword = if data.has_modifier(Modifier::Expect) {
                "expect"
            } else if data.has_modifier(Modifier::Actual) {
                "actual"
            } else {
                continue;
            };
            if ctx.tree.module_of_decl(decl) != ctx.target_module {
                out.report(
                    ConflictLocation::Declaration(decl),
                    format!(
                        "{keyword} declaration `{}` cannot be moved to module `{}`",
                        ctx.name(decl),
                        ctx.module_name(ctx.target_module)
                    ),
                );
            }
        }
    }
}

fn check_visibility(ctx: &CheckContext<'_>, out: &mut CheckOutput) {
    let tree = ctx.tree;
    let destination = ctx.destination_site();
    for usage in ctx.usages {
        match usage {
            UsageInfo::External { expr, target, .. } | UsageInfo::OuterInstanceCall { expr, class: target } => {
                // Nested declarations keep their place relative to their moved container.
                if !ctx.roots.contains(target) {
                    continue;
                }
                let Some(anchor) = ctx.anchor(*expr) else {
                    continue;
                };
                let site = ctx.site_of(anchor);
                let visibility = tree.decl(*target).visibility;
                if ctx.accessible(visibility, ctx.placement_of(*target), site)
                    && !ctx.accessible(visibility, destination, site)
                {
                    out.block(
                        usage,
                        format!(
                            "{} `{}` will not be accessible from `{}`",
                            visibility.keyword(),
                            ctx.name(*target),
                            tree.file(anchor.file).path
                        ),
                    );
                }
            }
            UsageInfo::Internal { expr, target, .. } => {
                if ctx.is_moved(*target) {
                    continue;
                }
                let Some(anchor) = ctx.anchor(*expr) else {
                    continue;
                };
                let visibility = tree.decl(*target).visibility;
                let placement = ctx.placement_of(*target);
                if ctx.accessible(visibility, placement, ctx.site_of(anchor))
                    && !ctx.accessible(visibility, placement, destination)
                {
                    out.block(
                        usage,
                        format!(
                            "{} `{}` will not be accessible from `{}`",
                            visibility.keyword(),
                            ctx.name(*target),
                            ctx.target.describe(tree)
                        ),
                    );
                }
            }
            UsageInfo::OuterInstance(OuterInstanceReference::ImplicitReceiver {
                member,
                outer,
                ..
            }) => {
                let visibility = tree.decl(*member).visibility;
                if tree.decl(*outer).is_object() {
                    continue;
                }
                if !ctx.accessible(visibility, ctx.placement_of(*member), destination) {
                    out.block(
                        usage,
                        format!(
                            "{} `{}` will not be accessible through the enclosing instance",
                            visibility.keyword(),
                            ctx.name(*member)
                        ),
                    );
                }
            }
            UsageInfo::OuterInstance(OuterInstanceReference::ExplicitThis { .. })
            | UsageInfo::NonCode { .. } => {}
        }
    }
}

fn check_module_dependencies(ctx: &CheckContext<'_>, out: &mut CheckOutput) {
    let tree = ctx.tree;
    for usage in ctx.usages {
        match usage {
            UsageInfo::Internal { target, .. } => {
                if ctx.is_moved(*target) {
                    continue;
                }
                let module = tree.module_of_decl(*target);
                if !tree.module_sees(ctx.target_module, module) {
                    out.block(
                        usage,
                        format!(
                            "`{}` from module `{}` is not available in module `{}`",
                            ctx.name(*target),
                            ctx.module_name(module),
                            ctx.module_name(ctx.target_module)
                        ),
                    );
                }
            }
            UsageInfo::External { expr, target, .. }
            | UsageInfo::OuterInstanceCall { expr, class: target } => {
                let Some(anchor) = ctx.anchor(*expr) else {
                    continue;
                };
                let module = tree.file(anchor.file).module;
                if tree.module_of_decl(*target) != ctx.target_module
                    && !tree.module_sees(module, ctx.target_module)
                {
                    out.block(
                        usage,
                        format!(
                            "module `{}` does not depend on module `{}`, where `{}` is moved",
                            ctx.module_name(module),
                            ctx.module_name(ctx.target_module),
                            ctx.name(*target)
                        ),
                    );
                }
            }
            UsageInfo::OuterInstance(_) | UsageInfo::NonCode { .. } => {}
        }
    }
}

fn check_sealed_hierarchy(ctx: &CheckContext<'_>, out: &mut CheckOutput) {
    let tree = ctx.tree;
    let stays_with = |other: DeclId| {
        tree.package_of_decl(other) == &ctx.target_package
            && tree.module_of_decl(other) == ctx.target_module
    };
    for &root in ctx.roots {
        for decl in tree.subtree_decls(root) {
            if !tree.decl(decl).is_class_like() {
                continue;
            }
            for supertype in ctx.resolver.supertypes_of(decl) {
                if tree.decl(supertype).has_modifier(Modifier::Sealed)
                    && !ctx.is_moved(supertype)
                    && !stays_with(supertype)
                {
                    out.report(
                        ConflictLocation::Declaration(decl),
                        format!(
                            "`{}` inherits from sealed `{}` and must stay in package `{}` of module `{}`",
                            ctx.name(decl),
                            ctx.name(supertype),
                            tree.package_of_decl(supertype),
                            ctx.module_name(tree.module_of_decl(supertype))
                        ),
                    );
                }
            }
            if tree.decl(decl).has_modifier(Modifier::Sealed) {
                for subtype in ctx.resolver.direct_subtypes(decl) {
                    if !ctx.is_moved(subtype) && !stays_with(subtype) {
                        out.report(
                            ConflictLocation::Declaration(decl),
                            format!(
                                "sealed `{}` would be separated from its subclass `{}`",
                                ctx.name(decl),
                                ctx.name(subtype)
                            ),
                        );
                    }
                }
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Signature {
    ClassLike,
    Property,
    Function(usize),
    Other,
}

fn signature(tree: &SourceTree, decl: DeclId) -> Signature {
    let data = tree.decl(decl);
    match data.kind {
        DeclKind::Class | DeclKind::Interface | DeclKind::Object => Signature::ClassLike,
        DeclKind::Property { .. } => Signature::Property,
        DeclKind::Function => Signature::Function(data.param_count()),
        DeclKind::Parameter { .. } | DeclKind::TypeParameter | DeclKind::Local { .. } => {
            Signature::Other
        }
    }
}

fn check_name_clash(ctx: &CheckContext<'_>, out: &mut CheckOutput) {
    let tree = ctx.tree;
    let (existing, scope): (Vec<DeclId>, String) = match ctx.target.container_decl() {
        Some(container) => (
            tree.decl(container).members.iter().flatten().copied().collect(),
            format!("`{}`", ctx.name(container)),
        ),
        None => {
            let decls = tree
                .files()
                .filter(|(_, file)| {
                    file.package == ctx.target_package
                        && (tree.module_sees(file.module, ctx.target_module)
                            || tree.module_sees(ctx.target_module, file.module))
                })
                .flat_map(|(_, file)| file.items.iter().copied())
                .collect();
            let scope = if ctx.target_package.is_root() {
                "the root package".to_string()
            } else {
                format!("package `{}`", ctx.target_package)
            };
            (decls, scope)
        }
    };
    for &root in ctx.roots {
        let name = &tree.decl(root).name;
        let sig = signature(tree, root);
        let clash = existing.iter().copied().find(|&other| {
            !ctx.is_moved(other)
                && tree.is_decl_alive(other)
                && &tree.decl(other).name == name
                && signature(tree, other) == sig
        });
        if clash.is_some() {
            out.report(
                ConflictLocation::Declaration(root),
                format!(
                    "{} `{name}` already exists in {scope}",
                    tree.decl(root).kind.describe()
                ),
            );
        }
    }
}

fn check_type_parameters(ctx: &CheckContext<'_>, out: &mut CheckOutput) {
    let tree = ctx.tree;
    for &root in ctx.roots {
        for expr in tree.decl_subtree_exprs(root) {
            let Some(param) = tree.name_ref(expr).and_then(|name| name.binding) else {
                continue;
            };
            if tree.decl(param).kind != DeclKind::TypeParameter || ctx.is_moved(param) {
                continue;
            }
            let owner = tree
                .container_decl(param)
                .map_or_else(String::new, |owner| ctx.name(owner));
            out.report(
                ConflictLocation::Usage(expr),
                format!(
                    "type parameter `{}` of `{owner}` is not available outside `{owner}`",
                    tree.decl(param).name
                ),
            );
        }
    }
}

fn check_overrides(ctx: &CheckContext<'_>, out: &mut CheckOutput) {
    let tree = ctx.tree;
    let same_member = |a: DeclId, b: DeclId| {
        tree.decl(a).name == tree.decl(b).name && signature(tree, a) == signature(tree, b)
    };
    for &root in ctx.roots {
        let data = tree.decl(root);
        if !matches!(data.kind, DeclKind::Function | DeclKind::Property { .. }) {
            continue;
        }
        let Some(container) = tree.container_decl(root) else {
            continue;
        };

        if data.has_modifier(Modifier::Override) {
            let base = ctx.resolver.all_supertypes(container).into_iter().find(|&supertype| {
                tree.decl(supertype)
                    .members
                    .iter()
                    .flatten()
                    .any(|&member| same_member(member, root))
            });
            let still_overrides = match (base, ctx.target.container_decl()) {
                (Some(base), Some(destination)) => {
                    ctx.resolver.all_supertypes(destination).contains(&base)
                }
                _ => false,
            };
            if !still_overrides {
                let base = base.map_or_else(|| "a supertype".to_string(), |b| format!("`{}`", ctx.name(b)));
                out.report(
                    ConflictLocation::Declaration(root),
                    format!(
                        "`{}` overrides a member of {base} and cannot leave `{}`",
                        ctx.name(root),
                        ctx.name(container)
                    ),
                );
            }
        }

        if data.has_modifier(Modifier::Open) || data.has_modifier(Modifier::Abstract) {
            for subtype in transitive_subtypes(ctx.resolver, container) {
                let overriding = tree.decl(subtype).members.iter().flatten().any(|&member| {
                    tree.decl(member).has_modifier(Modifier::Override) && same_member(member, root)
                });
                if overriding {
                    out.report(
                        ConflictLocation::Declaration(root),
                        format!("`{}` is overridden in `{}`", ctx.name(root), ctx.name(subtype)),
                    );
                }
            }
        }
    }
}

fn transitive_subtypes(resolver: &Resolver<'_>, class: DeclId) -> Vec<DeclId> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    let mut queue = VecDeque::from(resolver.direct_subtypes(class));
    while let Some(next) = queue.pop_front() {
        if next == class || !seen.insert(next) {
            continue;
        }
        out.push(next);
        queue.extend(resolver.direct_subtypes(next));
    }
    out
}

fn check_outer_instance(ctx: &CheckContext<'_>, out: &mut CheckOutput) {
    let tree = ctx.tree;
    let mut by_root: IndexMap<DeclId, Vec<&UsageInfo>> = IndexMap::new();
    for usage in ctx.usages {
        if let UsageInfo::OuterInstance(reference) = usage {
            // `this` of an object is rewritten to the object's name.
            if !tree.decl(reference.outer()).is_object() {
                by_root.entry(reference.moved()).or_default().push(usage);
            }
        }
    }

    for (root, refs) in by_root {
        let outer = refs[0].target();
        let (same_outer, other_outer): (Vec<&UsageInfo>, Vec<&UsageInfo>) =
            refs.into_iter().partition(|usage| usage.target() == outer);
        for usage in other_outer {
            out.block(
                usage,
                format!(
                    "`{}` uses instances of both `{}` and `{}`",
                    ctx.name(root),
                    ctx.name(outer),
                    ctx.name(usage.target())
                ),
            );
        }

        let root_decl = tree.decl(root);
        if root_decl.has_modifier(Modifier::Inner) && ctx.target.is_inside(tree, outer) {
            continue;
        }
        let unavailable = format!(
            "`{}` uses the enclosing instance of `{}`, which is not available at `{}`",
            ctx.name(root),
            ctx.name(outer),
            ctx.target.describe(tree)
        );
        if root_decl.kind != DeclKind::Class || !ctx.settings.synthesize_outer_instance {
            for usage in same_outer {
                out.block(usage, unavailable.clone());
            }
            continue;
        }
        match outer_instance_name(tree, root, outer, ctx.settings.outer_instance_name_attempts) {
            Some(name) => out.plans.push((root, OuterParamPlan { outer, name })),
            None => {
                out.report(
                    ConflictLocation::Declaration(root),
                    format!(
                        "no free parameter name for the enclosing `{}` instance after {} attempts",
                        ctx.name(outer),
                        ctx.settings.outer_instance_name_attempts
                    ),
                );
                for usage in same_outer {
                    out.blocked.push(usage.element());
                }
            }
        }
    }
}

/// `outer`, `outer1`, `outer2`, ... : the first candidate no name inside `class` uses.
pub fn outer_instance_name(
    tree: &SourceTree,
    class: DeclId,
    outer: DeclId,
    attempts: usize,
) -> Option<String> {
    let mut taken: HashSet<&str> = tree
        .subtree_decls(class)
        .into_iter()
        .map(|decl| tree.decl(decl).name.as_str())
        .collect();
    for expr in tree.decl_subtree_exprs(class) {
        if let Some(name) = tree.name_ref(expr) {
            taken.insert(name.name.as_str());
        }
    }
    let base = decapitalize(&tree.decl(outer).name);
    (0..attempts)
        .map(|idx| {
            if idx == 0 {
                base.clone()
            } else {
                format!("{base}{idx}")
            }
        })
        .find(|candidate| is_valid_identifier(candidate) && !taken.contains(candidate.as_str()))
}

fn check_package_prefix(ctx: &CheckContext<'_>, out: &mut CheckOutput) {
    let tree = ctx.tree;
    for usage in ctx.usages {
        let (expr, target) = match usage {
            UsageInfo::Internal { expr, target, updatable: true }
            | UsageInfo::External { expr, target, updatable: true, .. }
            | UsageInfo::OuterInstanceCall { expr, class: target } => (*expr, *target),
            _ => continue,
        };
        let package = if ctx.is_moved(target) {
            ctx.target_package.clone()
        } else {
            tree.package_of_decl(target).clone()
        };
        let Some(head) = package.first() else {
            continue;
        };
        let Some(context) = ctx.resolver.index().context(expr) else {
            continue;
        };
        if context.in_import {
            continue;
        }
        if !usage.is_light() && !keeps_package_qualifier(ctx, context, expr, target) {
            continue;
        }
        if let NameResolution::Decl(shadow) =
            ctx.resolver.lookup_at(context, head, RefRole::Value)
        {
            out.block(
                usage,
                format!(
                    "`{head}` refers to `{}` here, hiding package `{package}`",
                    ctx.name(shadow)
                ),
            );
        }
    }
}

/// Whether the rewritten reference to `target` at `expr` stays written through its package,
/// i.e. shortening can neither drop the qualifier nor import the chain head.
fn keeps_package_qualifier(
    ctx: &CheckContext<'_>,
    context: &ExprContext,
    expr: ExprId,
    target: DeclId,
) -> bool {
    let tree = ctx.tree;
    let outermost = |decl: DeclId| tree.ancestors(decl).last().unwrap_or(decl);
    let head = if ctx.is_moved(target) {
        match ctx.target.container_decl() {
            Some(container) => outermost(container),
            None => ctx
                .roots
                .iter()
                .copied()
                .find(|&root| tree.is_inside(target, root))
                .unwrap_or(target),
        }
    } else {
        outermost(target)
    };
    let role = match tree.name_ref(expr) {
        Some(name) if head == target => name.role,
        _ => RefRole::Value,
    };
    match ctx.resolver.lookup_at(context, &tree.decl(head).name, role) {
        NameResolution::Decl(found) => found != head && !ctx.is_moved(found),
        NameResolution::Package(_) | NameResolution::Unresolved => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflict_map_deduplicates_messages() {
        let mut tree = SourceTree::new();
        let module = tree.add_module("main", "", "jvm");
        let file = tree.add_file(module, "A.kt", relo_syntax::FileKind::Primary, FqName::root());
        let decl = tree.alloc_decl(relo_syntax::Decl::new(
            "A",
            DeclKind::Class,
            relo_syntax::Container::File(file),
        ));

        let mut map = ConflictMap::new();
        map.add(ConflictLocation::Declaration(decl), "clash");
        map.add(ConflictLocation::Declaration(decl), "clash");
        map.add(ConflictLocation::Declaration(decl), "other");
        assert_eq!(map.len(), 2);
        assert_eq!(map.messages().collect::<Vec<_>>(), vec!["clash", "other"]);
    }
}
