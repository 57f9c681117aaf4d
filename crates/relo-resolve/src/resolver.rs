use std::cell::RefCell;
use std::collections::{HashMap, HashSet};

use relo_core::FqName;
use relo_syntax::{
    Container, DeclId, DeclKind, ExprId, ExprKind, FileId, RefRole, SourceTree, Stmt,
};

use crate::index::{ExprContext, ScopeAnchor, TreeIndex};

/// Bound on type-of / supertype recursion; source cycles must not hang the resolver.
const MAX_DEPTH: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NameResolution {
    Decl(DeclId),
    Package(FqName),
    Unresolved,
}

impl NameResolution {
    #[must_use]
    pub fn decl(&self) -> Option<DeclId> {
        match self {
            NameResolution::Decl(decl) => Some(*decl),
            NameResolution::Package(_) | NameResolution::Unresolved => None,
        }
    }

    #[must_use]
    pub fn is_resolved(&self) -> bool {
        !matches!(self, NameResolution::Unresolved)
    }
}

/// `true` when a declaration of this kind can stand in a reference of `role`.
pub fn accepts(kind: DeclKind, role: RefRole) -> bool {
    match role {
        RefRole::Type => matches!(
            kind,
            DeclKind::Class | DeclKind::Interface | DeclKind::Object | DeclKind::TypeParameter
        ),
        RefRole::Call => matches!(kind, DeclKind::Function | DeclKind::Class),
        RefRole::Value => !matches!(kind, DeclKind::Function | DeclKind::TypeParameter),
        RefRole::Import => !matches!(
            kind,
            DeclKind::Parameter { .. } | DeclKind::TypeParameter | DeclKind::Local { .. }
        ),
    }
}

/// Scope-based name resolution over a snapshot of the tree.
///
/// Results never consult the bindings stored in the tree: they are recomputed from scopes, so
/// comparing the two tells whether a reference still means what it was bound to.
pub struct Resolver<'a> {
    tree: &'a SourceTree,
    index: TreeIndex,
    cache: RefCell<HashMap<ExprId, NameResolution>>,
    /// References whose resolution is on the stack; re-entering one yields `Unresolved`.
    in_progress: RefCell<HashSet<ExprId>>,
}

impl<'a> Resolver<'a> {
    pub fn new(tree: &'a SourceTree) -> Self {
        Self {
            tree,
            index: TreeIndex::build(tree),
            cache: RefCell::new(HashMap::new()),
            in_progress: RefCell::new(HashSet::new()),
        }
    }

    pub fn tree(&self) -> &'a SourceTree {
        self.tree
    }

    pub fn index(&self) -> &TreeIndex {
        &self.index
    }

    pub fn resolve(&self, expr: ExprId) -> NameResolution {
        if let Some(hit) = self.cache.borrow().get(&expr) {
            return hit.clone();
        }
        if !self.in_progress.borrow_mut().insert(expr) {
            return NameResolution::Unresolved;
        }
        let resolution = self.resolve_uncached(expr, 0);
        self.in_progress.borrow_mut().remove(&expr);
        self.cache.borrow_mut().insert(expr, resolution.clone());
        resolution
    }

    pub fn resolve_decl(&self, expr: ExprId) -> Option<DeclId> {
        self.resolve(expr).decl()
    }

    fn resolve_uncached(&self, expr: ExprId, depth: usize) -> NameResolution {
        let tree = self.tree;
        if depth > MAX_DEPTH || !tree.is_expr_alive(expr) {
            return NameResolution::Unresolved;
        }
        let Some(ctx) = self.index.context(expr).copied() else {
            return NameResolution::Unresolved;
        };
        match &tree.expr(expr).kind {
            ExprKind::This { label, .. } => self
                .enclosing_class(ctx.anchor, label.as_deref())
                .map_or(NameResolution::Unresolved, NameResolution::Decl),
            ExprKind::Name(name) => match name.qualifier {
                None if ctx.in_import => self.resolve_in_package(
                    &FqName::root(),
                    &name.name,
                    name.role,
                    Some(ctx.anchor.file),
                ),
                None => self.lookup_at(&ctx, &name.name, name.role),
                Some(qualifier) => {
                    self.resolve_member(qualifier, &name.name, name.role, ctx.anchor, depth)
                }
            },
            ExprKind::Str(_) | ExprKind::Literal(_) => NameResolution::Unresolved,
        }
    }

    /// Innermost class-like declaration around `anchor`, optionally matching `label`.
    pub fn enclosing_class(&self, anchor: ScopeAnchor, label: Option<&str>) -> Option<DeclId> {
        let owner = anchor.owner?;
        std::iter::once(owner)
            .chain(self.tree.ancestors(owner))
            .filter(|&decl| self.tree.decl(decl).is_class_like())
            .find(|&decl| label.map_or(true, |label| self.tree.decl(decl).name == label))
    }

    /// Unqualified lookup of `name` as seen from `anchor`.
    pub fn lookup_name(&self, anchor: ScopeAnchor, name: &str, role: RefRole) -> NameResolution {
        self.lookup_name_in(anchor, name, role, true)
    }

    /// Unqualified lookup of `name` as seen from the position described by `ctx`.
    pub fn lookup_at(&self, ctx: &ExprContext, name: &str, role: RefRole) -> NameResolution {
        self.lookup_name_in(ctx.anchor, name, role, !ctx.in_supertype)
    }

    /// Like [`Resolver::lookup_name`]; without `inherited` the owner's own supertypes are not
    /// searched, which is how the owner's supertype list itself is resolved.
    fn lookup_name_in(
        &self,
        anchor: ScopeAnchor,
        name: &str,
        role: RefRole,
        inherited: bool,
    ) -> NameResolution {
        if let Some(owner) = anchor.owner {
            if let Some(found) = self.lookup_in_scope(owner, name, role, inherited) {
                return NameResolution::Decl(found);
            }
            for scope in self.tree.ancestors(owner) {
                if let Some(found) = self.lookup_in_scope(scope, name, role, true) {
                    return NameResolution::Decl(found);
                }
            }
        }
        self.lookup_file_level(anchor.file, name, role)
    }

    fn lookup_in_scope(
        &self,
        scope: DeclId,
        name: &str,
        role: RefRole,
        inherited: bool,
    ) -> Option<DeclId> {
        let decl = self.tree.decl(scope);
        let candidates: Vec<DeclId> = match decl.kind {
            DeclKind::Function => {
                let mut out = decl.type_params.clone();
                out.extend(decl.params.iter().flatten().copied());
                out.extend(decl.body.iter().flatten().filter_map(|stmt| match stmt {
                    Stmt::Local(local) => Some(*local),
                    Stmt::Expr(_) => None,
                }));
                out
            }
            DeclKind::Class | DeclKind::Interface | DeclKind::Object => {
                let mut out = decl.type_params.clone();
                out.extend(decl.params.iter().flatten().copied());
                out.extend(decl.members.iter().flatten().copied());
                if let Some(companion) = self.companion_of(scope) {
                    out.extend(self.tree.decl(companion).members.iter().flatten().copied());
                }
                if inherited {
                    for supertype in self.supertypes_of(scope) {
                        out.extend(self.instance_members(supertype));
                    }
                }
                out
            }
            _ => Vec::new(),
        };
        self.first_match(candidates, name, role)
    }

    fn first_match(
        &self,
        candidates: impl IntoIterator<Item = DeclId>,
        name: &str,
        role: RefRole,
    ) -> Option<DeclId> {
        candidates.into_iter().find(|&candidate| {
            let decl = self.tree.decl(candidate);
            decl.alive && decl.name == name && accepts(decl.kind, role)
        })
    }

    fn lookup_file_level(&self, file: FileId, name: &str, role: RefRole) -> NameResolution {
        let tree = self.tree;
        let data = tree.file(file);
        for import in &data.imports {
            let visible_name = match &import.alias {
                Some(alias) => alias.as_str(),
                None => tree
                    .name_ref(import.path)
                    .map_or("", |path| path.name.as_str()),
            };
            if visible_name != name {
                continue;
            }
            if let Some(target) = self.resolve_decl(import.path) {
                if accepts(tree.decl(target).kind, role) {
                    return NameResolution::Decl(target);
                }
            }
        }

        let package = data.package.clone();
        if let NameResolution::Decl(found) = self.resolve_in_package(&package, name, role, Some(file))
        {
            return NameResolution::Decl(found);
        }
        let as_package = FqName::new([name]);
        if role != RefRole::Call && self.index.has_package(&as_package) {
            return NameResolution::Package(as_package);
        }
        NameResolution::Unresolved
    }

    /// Look `name` up directly inside `package`: a top-level declaration, or a subpackage.
    fn resolve_in_package(
        &self,
        package: &FqName,
        name: &str,
        role: RefRole,
        from: Option<FileId>,
    ) -> NameResolution {
        let from_module = from.map(|file| self.tree.file(file).module);
        let visible = self.index.top_level(package).iter().copied().filter(|&decl| {
            from_module.map_or(true, |module| {
                self.tree.module_sees(module, self.tree.module_of_decl(decl))
            })
        });
        if let Some(found) = self.first_match(visible, name, role) {
            return NameResolution::Decl(found);
        }
        let sub = package.child(name);
        if role != RefRole::Call && self.index.has_package(&sub) {
            return NameResolution::Package(sub);
        }
        NameResolution::Unresolved
    }

    fn resolve_member(
        &self,
        qualifier: ExprId,
        name: &str,
        role: RefRole,
        anchor: ScopeAnchor,
        depth: usize,
    ) -> NameResolution {
        let tree = self.tree;
        let qualifier_resolution = self.resolve_uncached(qualifier, depth + 1);
        let static_access = match &tree.expr(qualifier).kind {
            ExprKind::Name(q) => q.role != RefRole::Call,
            _ => false,
        };
        let candidates = match qualifier_resolution {
            NameResolution::Package(package) => {
                return self.resolve_in_package(&package, name, role, Some(anchor.file));
            }
            NameResolution::Unresolved => return NameResolution::Unresolved,
            NameResolution::Decl(decl) if static_access && tree.decl(decl).is_class_like() => {
                self.static_members(decl)
            }
            NameResolution::Decl(_) => match self.type_of_at(qualifier, depth + 1) {
                Some(class) => self.instance_members(class),
                None => return NameResolution::Unresolved,
            },
        };
        self.first_match(candidates, name, role)
            .map_or(NameResolution::Unresolved, NameResolution::Decl)
    }

    /// The class-like type an expression evaluates to, when it can be determined.
    pub fn type_of(&self, expr: ExprId) -> Option<DeclId> {
        self.type_of_at(expr, 0)
    }

    fn type_of_at(&self, expr: ExprId, depth: usize) -> Option<DeclId> {
        if depth > MAX_DEPTH {
            return None;
        }
        let tree = self.tree;
        let resolved = if depth == 0 {
            self.resolve(expr)
        } else {
            self.resolve_uncached(expr, depth)
        };
        let target = resolved.decl()?;
        let target_decl = tree.decl(target);
        match &tree.expr(expr).kind {
            ExprKind::This { .. } => return Some(target),
            ExprKind::Name(name) if target_decl.is_class_like() => {
                return (name.role == RefRole::Call || target_decl.is_object()).then_some(target);
            }
            ExprKind::Name(_) => {}
            ExprKind::Str(_) | ExprKind::Literal(_) => return None,
        }
        match target_decl.kind {
            DeclKind::Function
            | DeclKind::Property { .. }
            | DeclKind::Parameter { .. }
            | DeclKind::Local { .. } => {
                if let Some(ty) = target_decl.ty {
                    let class = self.resolve_uncached(ty, depth + 1).decl()?;
                    return tree.decl(class).is_class_like().then_some(class);
                }
                let init = target_decl.initializer?;
                self.type_of_at(init, depth + 1)
            }
            _ => None,
        }
    }

    pub fn companion_of(&self, class: DeclId) -> Option<DeclId> {
        self.tree
            .decl(class)
            .members
            .iter()
            .flatten()
            .copied()
            .find(|&member| self.tree.decl(member).is_companion() && self.tree.is_decl_alive(member))
    }

    /// Resolved direct supertypes of a class-like declaration.
    pub fn supertypes_of(&self, class: DeclId) -> Vec<DeclId> {
        self.tree
            .decl(class)
            .supertypes
            .iter()
            .filter_map(|entry| self.resolve_decl(entry.ty))
            .filter(|&decl| self.tree.decl(decl).is_class_like())
            .collect()
    }

    /// All transitive supertypes, nearest first.
    pub fn all_supertypes(&self, class: DeclId) -> Vec<DeclId> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        let mut queue = std::collections::VecDeque::from(self.supertypes_of(class));
        while let Some(next) = queue.pop_front() {
            if next == class || !seen.insert(next) {
                continue;
            }
            out.push(next);
            queue.extend(self.supertypes_of(next));
        }
        out
    }

    /// Live class-likes listing `class` among their direct supertypes.
    pub fn direct_subtypes(&self, class: DeclId) -> Vec<DeclId> {
        self.tree
            .decls()
            .filter(|(_, decl)| decl.is_class_like())
            .map(|(id, _)| id)
            .filter(|&id| self.supertypes_of(id).contains(&class))
            .collect()
    }

    /// Members reachable through an instance: own members (minus nested class-likes),
    /// constructor properties, then inherited ones.
    pub fn instance_members(&self, class: DeclId) -> Vec<DeclId> {
        let mut out = Vec::new();
        for owner in std::iter::once(class).chain(self.all_supertypes(class)) {
            let decl = self.tree.decl(owner);
            out.extend(decl.params.iter().flatten().copied().filter(|&param| {
                matches!(
                    self.tree.decl(param).kind,
                    DeclKind::Parameter { property: Some(_) }
                )
            }));
            out.extend(
                decl.members
                    .iter()
                    .flatten()
                    .copied()
                    .filter(|&member| !self.tree.decl(member).is_class_like()),
            );
        }
        out
    }

    /// Members reachable through the declaration name itself (`Outer.Nested`, `Obj.f()`).
    pub fn static_members(&self, class: DeclId) -> Vec<DeclId> {
        let decl = self.tree.decl(class);
        if decl.is_object() {
            let mut out: Vec<DeclId> = decl.members.iter().flatten().copied().collect();
            for supertype in self.all_supertypes(class) {
                out.extend(self.instance_members(supertype));
            }
            return out;
        }
        let mut out: Vec<DeclId> = decl
            .members
            .iter()
            .flatten()
            .copied()
            .filter(|&member| self.tree.decl(member).is_class_like())
            .collect();
        if let Some(companion) = self.companion_of(class) {
            out.extend(self.tree.decl(companion).members.iter().flatten().copied());
        }
        out
    }

    /// `true` when `decl` is an instance member: a function or property declared directly in a
    /// class or interface body, or a constructor property.
    pub fn is_instance_member(&self, decl: DeclId) -> bool {
        let data = self.tree.decl(decl);
        let Container::Decl(container) = data.container else {
            return false;
        };
        let container = self.tree.decl(container);
        match data.kind {
            DeclKind::Function | DeclKind::Property { .. } => container.is_instantiable_type(),
            DeclKind::Parameter { property: Some(_) } => container.kind == DeclKind::Class,
            _ => false,
        }
    }
}

/// Resolve every reference in the tree and store the results as bindings.
///
/// Returns the number of references that stayed unresolved.
pub fn bind_all(tree: &mut SourceTree) -> usize {
    let resolutions: Vec<(ExprId, Option<DeclId>)> = {
        let resolver = Resolver::new(tree);
        tree.exprs()
            .filter(|(_, expr)| matches!(expr.kind, ExprKind::Name(_) | ExprKind::This { .. }))
            .map(|(id, _)| id)
            .filter(|&id| resolver.index().context(id).is_some())
            .map(|id| (id, resolver.resolve(id)))
            .map(|(id, resolution)| (id, resolution.decl()))
            .collect()
    };
    let mut unresolved = 0;
    for (id, binding) in resolutions {
        if binding.is_none() && tree.name_ref(id).is_some() {
            unresolved += 1;
        }
        set_binding(tree, id, binding);
    }
    tracing::debug!(target = "relo.resolve", unresolved, "bound references");
    unresolved
}

pub fn set_binding(tree: &mut SourceTree, expr: ExprId, target: Option<DeclId>) {
    match &mut tree.expr_mut(expr).kind {
        ExprKind::Name(name) => name.binding = target,
        ExprKind::This { binding, .. } => *binding = target,
        ExprKind::Str(_) | ExprKind::Literal(_) => {}
    }
}
