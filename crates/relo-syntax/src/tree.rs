//! Arena-backed source model.
//!
//! Every node lives in a flat arena and is addressed by a stable id. Structural edits never
//! renumber existing nodes: removed declarations and expressions are only marked dead, and
//! copies receive fresh ids recorded in a [`CopyMap`].

use std::collections::HashMap;

use relo_core::FqName;
use serde::{Deserialize, Serialize};

use crate::ids::{Arena, DeclId, ExprId, FileId, ModuleId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Module {
    pub name: String,
    /// Directory of the module relative to the project root (`""` for single-module projects).
    pub root: String,
    /// Platform name (`common`, `jvm`, `js`, ...).
    pub platform: String,
    pub dependencies: Vec<ModuleId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    /// Full-fidelity source.
    Primary,
    /// Cross-language source seen through a reduced representation. References found here are
    /// "light": they can be rebound but never shortened.
    Foreign,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Import {
    /// Qualified name chain; the last segment carries the binding.
    pub path: ExprId,
    pub alias: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub path: String,
    pub module: ModuleId,
    pub kind: FileKind,
    pub package: FqName,
    pub imports: Vec<Import>,
    pub items: Vec<DeclId>,
    pub alive: bool,
}

impl SourceFile {
    /// A file with nothing but package and import directives.
    pub fn is_effectively_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Public,
    Internal,
    Protected,
    Private,
}

impl Visibility {
    pub fn keyword(self) -> &'static str {
        match self {
            Visibility::Public => "public",
            Visibility::Internal => "internal",
            Visibility::Protected => "protected",
            Visibility::Private => "private",
        }
    }

    pub fn from_keyword(text: &str) -> Option<Self> {
        Some(match text {
            "public" => Visibility::Public,
            "internal" => Visibility::Internal,
            "protected" => Visibility::Protected,
            "private" => Visibility::Private,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Modifier {
    Inner,
    Open,
    Final,
    Abstract,
    Sealed,
    Override,
    Expect,
    Actual,
    Companion,
    Data,
}

impl Modifier {
    pub fn keyword(self) -> &'static str {
        match self {
            Modifier::Inner => "inner",
            Modifier::Open => "open",
            Modifier::Final => "final",
            Modifier::Abstract => "abstract",
            Modifier::Sealed => "sealed",
            Modifier::Override => "override",
            Modifier::Expect => "expect",
            Modifier::Actual => "actual",
            Modifier::Companion => "companion",
            Modifier::Data => "data",
        }
    }

    pub fn from_keyword(text: &str) -> Option<Self> {
        Some(match text {
            "inner" => Modifier::Inner,
            "open" => Modifier::Open,
            "final" => Modifier::Final,
            "abstract" => Modifier::Abstract,
            "sealed" => Modifier::Sealed,
            "override" => Modifier::Override,
            "expect" => Modifier::Expect,
            "actual" => Modifier::Actual,
            "companion" => Modifier::Companion,
            "data" => Modifier::Data,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeclKind {
    Class,
    Interface,
    Object,
    Function,
    Property {
        mutable: bool,
    },
    /// Function or primary-constructor parameter. `property` is `Some(mutable)` for `val`/`var`
    /// constructor parameters.
    Parameter {
        property: Option<bool>,
    },
    TypeParameter,
    Local {
        mutable: bool,
    },
}

impl DeclKind {
    pub fn describe(self) -> &'static str {
        match self {
            DeclKind::Class => "class",
            DeclKind::Interface => "interface",
            DeclKind::Object => "object",
            DeclKind::Function => "function",
            DeclKind::Property { .. } => "property",
            DeclKind::Parameter { .. } => "parameter",
            DeclKind::TypeParameter => "type parameter",
            DeclKind::Local { .. } => "variable",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Container {
    File(FileId),
    Decl(DeclId),
}

impl Container {
    pub fn as_decl(self) -> Option<DeclId> {
        match self {
            Container::Decl(decl) => Some(decl),
            Container::File(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuperTypeEntry {
    pub ty: ExprId,
    /// Constructor call arguments (`: Base(x)`); `None` for interfaces.
    pub args: Option<Vec<ExprId>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stmt {
    Expr(ExprId),
    Local(DeclId),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decl {
    pub name: String,
    /// `companion object` declared without a name; `name` then holds `Companion`.
    pub implicit_name: bool,
    pub kind: DeclKind,
    pub container: Container,
    pub visibility: Visibility,
    pub explicit_visibility: bool,
    pub modifiers: Vec<Modifier>,
    pub doc: Option<String>,
    pub type_params: Vec<DeclId>,
    /// `None` for classes without a primary constructor.
    pub params: Option<Vec<DeclId>>,
    pub supertypes: Vec<SuperTypeEntry>,
    pub ty: Option<ExprId>,
    pub initializer: Option<ExprId>,
    pub body: Option<Vec<Stmt>>,
    pub members: Option<Vec<DeclId>>,
    pub alive: bool,
}

impl Decl {
    pub fn new(name: impl Into<String>, kind: DeclKind, container: Container) -> Self {
        Self {
            name: name.into(),
            implicit_name: false,
            kind,
            container,
            visibility: Visibility::Public,
            explicit_visibility: false,
            modifiers: Vec::new(),
            doc: None,
            type_params: Vec::new(),
            params: None,
            supertypes: Vec::new(),
            ty: None,
            initializer: None,
            body: None,
            members: None,
            alive: true,
        }
    }

    pub fn is_class_like(&self) -> bool {
        matches!(
            self.kind,
            DeclKind::Class | DeclKind::Interface | DeclKind::Object
        )
    }

    /// Classes and interfaces, i.e. class-likes that have instances other than themselves.
    pub fn is_instantiable_type(&self) -> bool {
        matches!(self.kind, DeclKind::Class | DeclKind::Interface)
    }

    pub fn is_object(&self) -> bool {
        matches!(self.kind, DeclKind::Object)
    }

    pub fn is_companion(&self) -> bool {
        self.is_object() && self.has_modifier(Modifier::Companion)
    }

    pub fn is_callable(&self) -> bool {
        matches!(self.kind, DeclKind::Function | DeclKind::Property { .. })
    }

    pub fn has_modifier(&self, modifier: Modifier) -> bool {
        self.modifiers.contains(&modifier)
    }

    pub fn param_count(&self) -> usize {
        self.params.as_ref().map_or(0, Vec::len)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RefRole {
    /// A value reference: property, parameter, local, or a class/object used as a qualifier.
    Value,
    /// A call: function invocation or constructor call.
    Call,
    /// A type position (parameter/return/property types, supertypes, type arguments).
    Type,
    /// A segment of an import directive.
    Import,
}

impl RefRole {
    /// Role used by qualifier segments of a chain ending in `self`.
    pub fn qualifier_role(self) -> RefRole {
        match self {
            RefRole::Call => RefRole::Value,
            other => other,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameRef {
    pub name: String,
    pub qualifier: Option<ExprId>,
    /// Call arguments; `Some` exactly when the segment is a call.
    pub args: Option<Vec<ExprId>>,
    pub type_args: Vec<ExprId>,
    pub role: RefRole,
    /// The declaration this reference is meant to denote.
    pub binding: Option<DeclId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExprKind {
    Name(NameRef),
    This {
        label: Option<String>,
        binding: Option<DeclId>,
    },
    Str(String),
    Literal(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expr {
    pub kind: ExprKind,
    pub alive: bool,
}

impl Expr {
    pub fn binding(&self) -> Option<DeclId> {
        match &self.kind {
            ExprKind::Name(name) => name.binding,
            ExprKind::This { binding, .. } => *binding,
            ExprKind::Str(_) | ExprKind::Literal(_) => None,
        }
    }

    pub fn as_name(&self) -> Option<&NameRef> {
        match &self.kind {
            ExprKind::Name(name) => Some(name),
            _ => None,
        }
    }
}

/// Fresh ids handed out by [`SourceTree::copy_decl`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CopyMap {
    pub decls: HashMap<DeclId, DeclId>,
    pub exprs: HashMap<ExprId, ExprId>,
}

impl CopyMap {
    pub fn extend(&mut self, other: CopyMap) {
        self.decls.extend(other.decls);
        self.exprs.extend(other.exprs);
    }
}

/// The whole program: modules, files, declarations and expressions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceTree {
    modules: Arena<Module>,
    files: Arena<SourceFile>,
    decls: Arena<Decl>,
    exprs: Arena<Expr>,
}

impl SourceTree {
    pub fn new() -> Self {
        Self::default()
    }

    // --- modules -------------------------------------------------------------------------

    pub fn add_module(
        &mut self,
        name: impl Into<String>,
        root: impl Into<String>,
        platform: impl Into<String>,
    ) -> ModuleId {
        ModuleId::from_raw(self.modules.alloc(Module {
            name: name.into(),
            root: root.into(),
            platform: platform.into(),
            dependencies: Vec::new(),
        }))
    }

    pub fn add_dependency(&mut self, module: ModuleId, dependency: ModuleId) {
        let deps = &mut self.modules[module].dependencies;
        if !deps.contains(&dependency) {
            deps.push(dependency);
        }
    }

    pub fn module(&self, id: ModuleId) -> &Module {
        &self.modules[id]
    }

    pub fn modules(&self) -> impl Iterator<Item = (ModuleId, &Module)> {
        self.modules
            .iter()
            .map(|(raw, module)| (ModuleId::from_raw(raw), module))
    }

    pub fn find_module(&self, name: &str) -> Option<ModuleId> {
        self.modules()
            .find(|(_, module)| module.name == name)
            .map(|(id, _)| id)
    }

    /// `true` when code in `from` can see declarations of `to` (same module or a direct
    /// dependency).
    pub fn module_sees(&self, from: ModuleId, to: ModuleId) -> bool {
        from == to || self.modules[from].dependencies.contains(&to)
    }

    // --- files ---------------------------------------------------------------------------

    pub fn add_file(
        &mut self,
        module: ModuleId,
        path: impl Into<String>,
        kind: FileKind,
        package: FqName,
    ) -> FileId {
        FileId::from_raw(self.files.alloc(SourceFile {
            path: path.into(),
            module,
            kind,
            package,
            imports: Vec::new(),
            items: Vec::new(),
            alive: true,
        }))
    }

    pub fn file(&self, id: FileId) -> &SourceFile {
        &self.files[id]
    }

    pub fn file_mut(&mut self, id: FileId) -> &mut SourceFile {
        &mut self.files[id]
    }

    /// Live files in creation order.
    pub fn files(&self) -> impl Iterator<Item = (FileId, &SourceFile)> {
        self.files
            .iter()
            .map(|(raw, file)| (FileId::from_raw(raw), file))
            .filter(|(_, file)| file.alive)
    }

    pub fn find_file(&self, path: &str) -> Option<FileId> {
        self.files()
            .find(|(_, file)| file.path == path)
            .map(|(id, _)| id)
    }

    pub fn is_file_alive(&self, id: FileId) -> bool {
        self.files[id].alive
    }

    /// Delete a file and everything declared in it.
    pub fn delete_file(&mut self, id: FileId) {
        let items = std::mem::take(&mut self.files[id].items);
        for item in items {
            self.kill_decl_subtree(item);
        }
        let imports = std::mem::take(&mut self.files[id].imports);
        for import in imports {
            self.kill_expr_subtree(import.path);
        }
        self.files[id].alive = false;
    }

    /// Append `import <fq>` to `file`. Returns `None` for the root name.
    pub fn add_import(
        &mut self,
        file: FileId,
        fq: &FqName,
        binding: Option<DeclId>,
    ) -> Option<ExprId> {
        let segments = fq.segments().to_vec();
        let (last, qualifier) = segments.split_last()?;
        let qualifier = self.package_chain(qualifier, RefRole::Import);
        let path = self.alloc_expr(ExprKind::Name(NameRef {
            name: last.clone(),
            qualifier,
            args: None,
            type_args: Vec::new(),
            role: RefRole::Import,
            binding,
        }));
        self.files[file].imports.push(Import { path, alias: None });
        Some(path)
    }

    pub fn remove_import(&mut self, file: FileId, path: ExprId) -> bool {
        let imports = &mut self.files[file].imports;
        let Some(pos) = imports.iter().position(|import| import.path == path) else {
            return false;
        };
        imports.remove(pos);
        self.kill_expr_subtree(path);
        true
    }

    // --- declarations --------------------------------------------------------------------

    pub fn alloc_decl(&mut self, decl: Decl) -> DeclId {
        DeclId::from_raw(self.decls.alloc(decl))
    }

    pub fn decl(&self, id: DeclId) -> &Decl {
        &self.decls[id]
    }

    pub fn decl_mut(&mut self, id: DeclId) -> &mut Decl {
        &mut self.decls[id]
    }

    pub fn is_decl_alive(&self, id: DeclId) -> bool {
        self.decls[id].alive
    }

    /// Live declarations in allocation order.
    pub fn decls(&self) -> impl Iterator<Item = (DeclId, &Decl)> {
        self.decls
            .iter()
            .map(|(raw, decl)| (DeclId::from_raw(raw), decl))
            .filter(|(_, decl)| decl.alive)
    }

    pub fn file_of_decl(&self, mut id: DeclId) -> FileId {
        loop {
            match self.decls[id].container {
                Container::File(file) => return file,
                Container::Decl(parent) => id = parent,
            }
        }
    }

    pub fn module_of_decl(&self, id: DeclId) -> ModuleId {
        self.files[self.file_of_decl(id)].module
    }

    pub fn package_of_decl(&self, id: DeclId) -> &FqName {
        &self.files[self.file_of_decl(id)].package
    }

    pub fn container_decl(&self, id: DeclId) -> Option<DeclId> {
        self.decls[id].container.as_decl()
    }

    /// Enclosing declarations, innermost first (excluding `id` itself).
    pub fn ancestors(&self, id: DeclId) -> impl Iterator<Item = DeclId> + '_ {
        std::iter::successors(self.container_decl(id), move |&decl| {
            self.container_decl(decl)
        })
    }

    /// `true` when `id` is `ancestor` or nested anywhere inside it.
    pub fn is_inside(&self, id: DeclId, ancestor: DeclId) -> bool {
        id == ancestor || self.ancestors(id).any(|decl| decl == ancestor)
    }

    pub fn is_top_level(&self, id: DeclId) -> bool {
        matches!(self.decls[id].container, Container::File(_))
    }

    /// Package segments followed by container names and the declaration name.
    pub fn fq_name(&self, id: DeclId) -> FqName {
        let mut names: Vec<String> = std::iter::once(id)
            .chain(self.ancestors(id))
            .map(|decl| self.decls[decl].name.clone())
            .collect();
        names.reverse();
        let mut fq = self.package_of_decl(id).clone();
        for name in names {
            fq = fq.child(name);
        }
        fq
    }

    /// Live declarations whose fully qualified name is `fq`.
    pub fn find_decls(&self, fq: &FqName) -> Vec<DeclId> {
        let Some(last) = fq.last() else {
            return Vec::new();
        };
        self.decls()
            .filter(|(_, decl)| decl.name == last)
            .map(|(id, _)| id)
            .filter(|&id| &self.fq_name(id) == fq)
            .collect()
    }

    /// Direct child declarations: type parameters, parameters, members and locals.
    pub fn children(&self, id: DeclId) -> Vec<DeclId> {
        let decl = &self.decls[id];
        let mut out = decl.type_params.clone();
        if let Some(params) = &decl.params {
            out.extend(params.iter().copied());
        }
        if let Some(members) = &decl.members {
            out.extend(members.iter().copied());
        }
        if let Some(body) = &decl.body {
            out.extend(body.iter().filter_map(|stmt| match stmt {
                Stmt::Local(local) => Some(*local),
                Stmt::Expr(_) => None,
            }));
        }
        out
    }

    /// `id` and every declaration nested in it, depth-first in source order.
    pub fn subtree_decls(&self, id: DeclId) -> Vec<DeclId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(decl) = stack.pop() {
            out.push(decl);
            let mut children = self.children(decl);
            children.reverse();
            stack.extend(children);
        }
        out
    }

    /// Expression roots directly owned by `id` (not by its children), in source order.
    pub fn decl_expr_roots(&self, id: DeclId) -> Vec<ExprId> {
        let decl = &self.decls[id];
        let mut out = Vec::new();
        for entry in &decl.supertypes {
            out.push(entry.ty);
            if let Some(args) = &entry.args {
                out.extend(args.iter().copied());
            }
        }
        out.extend(decl.ty);
        out.extend(decl.initializer);
        if let Some(body) = &decl.body {
            out.extend(body.iter().filter_map(|stmt| match stmt {
                Stmt::Expr(expr) => Some(*expr),
                Stmt::Local(_) => None,
            }));
        }
        out
    }

    pub fn insert_decl(&mut self, container: Container, id: DeclId) {
        self.decls[id].container = container;
        match container {
            Container::File(file) => self.files[file].items.push(id),
            Container::Decl(parent) => self.decls[parent]
                .members
                .get_or_insert_with(Vec::new)
                .push(id),
        }
    }

    /// Detach `id` from its container and mark it and everything inside it dead.
    pub fn remove_decl(&mut self, id: DeclId) {
        match self.decls[id].container {
            Container::File(file) => self.files[file].items.retain(|&item| item != id),
            Container::Decl(parent) => {
                let parent = &mut self.decls[parent];
                if let Some(members) = &mut parent.members {
                    members.retain(|&member| member != id);
                }
                if let Some(params) = &mut parent.params {
                    params.retain(|&param| param != id);
                }
                if let Some(body) = &mut parent.body {
                    body.retain(|stmt| *stmt != Stmt::Local(id));
                }
                parent.type_params.retain(|&tp| tp != id);
            }
        }
        self.kill_decl_subtree(id);
    }

    pub fn remove_modifier(&mut self, id: DeclId, modifier: Modifier) -> bool {
        let modifiers = &mut self.decls[id].modifiers;
        let before = modifiers.len();
        modifiers.retain(|&m| m != modifier);
        modifiers.len() != before
    }

    pub fn set_visibility(&mut self, id: DeclId, visibility: Visibility) {
        let decl = &mut self.decls[id];
        decl.visibility = visibility;
        decl.explicit_visibility = visibility != Visibility::Public;
    }

    fn kill_decl_subtree(&mut self, id: DeclId) {
        for decl in self.subtree_decls(id) {
            for root in self.decl_expr_roots(decl) {
                self.kill_expr_subtree(root);
            }
            self.decls[decl].alive = false;
        }
    }

    // --- expressions ---------------------------------------------------------------------

    pub fn alloc_expr(&mut self, kind: ExprKind) -> ExprId {
        ExprId::from_raw(self.exprs.alloc(Expr { kind, alive: true }))
    }

    pub fn expr(&self, id: ExprId) -> &Expr {
        &self.exprs[id]
    }

    pub fn expr_mut(&mut self, id: ExprId) -> &mut Expr {
        &mut self.exprs[id]
    }

    pub fn is_expr_alive(&self, id: ExprId) -> bool {
        self.exprs[id].alive
    }

    pub fn name_ref(&self, id: ExprId) -> Option<&NameRef> {
        self.exprs[id].as_name()
    }

    pub fn name_ref_mut(&mut self, id: ExprId) -> Option<&mut NameRef> {
        match &mut self.exprs[id].kind {
            ExprKind::Name(name) => Some(name),
            _ => None,
        }
    }

    /// Live expressions in allocation order.
    pub fn exprs(&self) -> impl Iterator<Item = (ExprId, &Expr)> {
        self.exprs
            .iter()
            .map(|(raw, expr)| (ExprId::from_raw(raw), expr))
            .filter(|(_, expr)| expr.alive)
    }

    /// Direct sub-expressions: qualifier first, then type arguments, then call arguments.
    pub fn expr_children(&self, id: ExprId) -> Vec<ExprId> {
        match &self.exprs[id].kind {
            ExprKind::Name(name) => name
                .qualifier
                .iter()
                .chain(name.type_args.iter())
                .chain(name.args.iter().flatten())
                .copied()
                .collect(),
            _ => Vec::new(),
        }
    }

    /// `root` and all nested expressions, depth-first in source order.
    pub fn expr_subtree(&self, root: ExprId) -> Vec<ExprId> {
        let mut out = Vec::new();
        let mut stack = vec![root];
        while let Some(expr) = stack.pop() {
            out.push(expr);
            let mut children = self.expr_children(expr);
            children.reverse();
            stack.extend(children);
        }
        out
    }

    /// Every expression inside the subtree of `id`, including nested declarations.
    pub fn decl_subtree_exprs(&self, id: DeclId) -> Vec<ExprId> {
        self.subtree_decls(id)
            .into_iter()
            .flat_map(|decl| self.decl_expr_roots(decl))
            .flat_map(|root| self.expr_subtree(root))
            .collect()
    }

    /// Segments of a qualified chain from the outermost qualifier to `top`.
    pub fn chain_segments(&self, top: ExprId) -> Vec<ExprId> {
        let mut segments = vec![top];
        let mut current = top;
        while let Some(qualifier) = self.name_ref(current).and_then(|name| name.qualifier) {
            segments.push(qualifier);
            current = qualifier;
        }
        segments.reverse();
        segments
    }

    /// Build an unbound qualifier chain such as `a.b.c`; returns the last segment.
    pub fn package_chain(&mut self, segments: &[String], role: RefRole) -> Option<ExprId> {
        let bound: Vec<(String, Option<DeclId>)> =
            segments.iter().map(|s| (s.clone(), None)).collect();
        self.qualifier_chain(&bound, role)
    }

    /// Build a qualifier chain from `(name, binding)` pairs; returns the last segment.
    pub fn qualifier_chain(
        &mut self,
        segments: &[(String, Option<DeclId>)],
        role: RefRole,
    ) -> Option<ExprId> {
        let mut qualifier = None;
        for (name, binding) in segments {
            qualifier = Some(self.alloc_expr(ExprKind::Name(NameRef {
                name: name.clone(),
                qualifier,
                args: None,
                type_args: Vec::new(),
                role: role.qualifier_role(),
                binding: *binding,
            })));
        }
        qualifier
    }

    /// Replace the qualifier of a reference segment, killing the old qualifier chain.
    pub fn set_qualifier(&mut self, id: ExprId, qualifier: Option<ExprId>) {
        let old = match self.name_ref_mut(id) {
            Some(name) => std::mem::replace(&mut name.qualifier, qualifier),
            None => return,
        };
        if let Some(old) = old {
            if Some(old) != qualifier {
                self.kill_expr_subtree(old);
            }
        }
    }

    /// Detach the qualifier of `id` and hand it back alive, e.g. to reuse it as an argument.
    pub fn take_qualifier(&mut self, id: ExprId) -> Option<ExprId> {
        self.name_ref_mut(id)?.qualifier.take()
    }

    /// Replace the node stored at `id` in place; parents keep pointing at the same id.
    pub fn replace_expr(&mut self, id: ExprId, kind: ExprKind) {
        for child in self.expr_children(id) {
            self.kill_expr_subtree(child);
        }
        self.exprs[id].kind = kind;
    }

    fn kill_expr_subtree(&mut self, root: ExprId) {
        for expr in self.expr_subtree(root) {
            self.exprs[expr].alive = false;
        }
    }

    // --- copying -------------------------------------------------------------------------

    /// Deep-copy `id` into `container`, returning the copy and the id remapping.
    ///
    /// Bindings that point into the copied subtree are redirected to their copies; bindings to
    /// anything outside stay as they are.
    pub fn copy_decl(&mut self, id: DeclId, container: Container) -> (DeclId, CopyMap) {
        let mut map = CopyMap::default();
        let copy = self.copy_decl_rec(id, container, &mut map);

        let copied_exprs: Vec<ExprId> = map.exprs.values().copied().collect();
        for expr in copied_exprs {
            match &mut self.exprs[expr].kind {
                ExprKind::Name(name) => {
                    if let Some(target) = name.binding.and_then(|b| map.decls.get(&b)) {
                        name.binding = Some(*target);
                    }
                }
                ExprKind::This { binding, .. } => {
                    if let Some(target) = binding.and_then(|b| map.decls.get(&b)) {
                        *binding = Some(*target);
                    }
                }
                ExprKind::Str(_) | ExprKind::Literal(_) => {}
            }
        }
        (copy, map)
    }

    fn copy_decl_rec(&mut self, id: DeclId, container: Container, map: &mut CopyMap) -> DeclId {
        let original = self.decls[id].clone();
        let mut copy = original.clone();
        copy.container = container;
        copy.type_params = Vec::new();
        copy.params = None;
        copy.members = None;
        copy.body = None;
        let new_id = self.alloc_decl(copy);
        map.decls.insert(id, new_id);

        let type_params = original
            .type_params
            .iter()
            .map(|&tp| self.copy_decl_rec(tp, Container::Decl(new_id), map))
            .collect();
        let params = original.params.as_ref().map(|params| {
            params
                .iter()
                .map(|&param| self.copy_decl_rec(param, Container::Decl(new_id), map))
                .collect()
        });
        let supertypes = original
            .supertypes
            .iter()
            .map(|entry| SuperTypeEntry {
                ty: self.copy_expr(entry.ty, map),
                args: entry
                    .args
                    .as_ref()
                    .map(|args| args.iter().map(|&arg| self.copy_expr(arg, map)).collect()),
            })
            .collect();
        let ty = original.ty.map(|ty| self.copy_expr(ty, map));
        let initializer = original.initializer.map(|init| self.copy_expr(init, map));
        let body = original.body.as_ref().map(|body| {
            body.iter()
                .map(|stmt| match *stmt {
                    Stmt::Expr(expr) => Stmt::Expr(self.copy_expr(expr, map)),
                    Stmt::Local(local) => {
                        Stmt::Local(self.copy_decl_rec(local, Container::Decl(new_id), map))
                    }
                })
                .collect()
        });
        let members = original.members.as_ref().map(|members| {
            members
                .iter()
                .map(|&member| self.copy_decl_rec(member, Container::Decl(new_id), map))
                .collect()
        });

        let decl = &mut self.decls[new_id];
        decl.type_params = type_params;
        decl.params = params;
        decl.supertypes = supertypes;
        decl.ty = ty;
        decl.initializer = initializer;
        decl.body = body;
        decl.members = members;
        new_id
    }

    fn copy_expr(&mut self, id: ExprId, map: &mut CopyMap) -> ExprId {
        let kind = match self.exprs[id].kind.clone() {
            ExprKind::Name(name) => {
                let qualifier = name.qualifier.map(|q| self.copy_expr(q, map));
                let type_args = name
                    .type_args
                    .iter()
                    .map(|&arg| self.copy_expr(arg, map))
                    .collect();
                let args = name
                    .args
                    .as_ref()
                    .map(|args| args.iter().map(|&arg| self.copy_expr(arg, map)).collect());
                ExprKind::Name(NameRef {
                    qualifier,
                    type_args,
                    args,
                    ..name
                })
            }
            other => other,
        };
        let new_id = self.alloc_expr(kind);
        map.exprs.insert(id, new_id);
        new_id
    }
}
