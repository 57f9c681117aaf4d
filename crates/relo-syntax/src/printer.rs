//! Canonical rendering of files.
//!
//! Output is deterministic: four-space indentation, one blank line between top-level blocks,
//! members on consecutive lines. Alongside the text the printer records a [`FileLayout`] so
//! callers can map nodes back to offsets in the rendered file.

use std::collections::HashMap;

use relo_core::TextRange;

use crate::ids::{DeclId, ExprId, FileId};
use crate::tree::{DeclKind, ExprKind, SourceTree, Stmt};

const INDENT: &str = "    ";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileLayout {
    /// Name token of every reference segment, the `this` keyword, or the whole literal.
    pub exprs: HashMap<ExprId, TextRange>,
    pub decl_names: HashMap<DeclId, TextRange>,
    pub docs: HashMap<DeclId, TextRange>,
}

impl FileLayout {
    pub fn expr_range(&self, expr: ExprId) -> Option<TextRange> {
        self.exprs.get(&expr).copied()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedFile {
    pub text: String,
    pub layout: FileLayout,
}

pub fn render_file(tree: &SourceTree, file: FileId) -> RenderedFile {
    let mut printer = Printer::new(tree);
    printer.file(file);
    RenderedFile {
        text: printer.out,
        layout: printer.layout,
    }
}

/// Render a single expression the way it would appear in a file.
pub fn render_expr(tree: &SourceTree, expr: ExprId) -> String {
    let mut printer = Printer::new(tree);
    printer.expr(expr);
    printer.out
}

struct Printer<'a> {
    tree: &'a SourceTree,
    out: String,
    layout: FileLayout,
    depth: usize,
}

impl<'a> Printer<'a> {
    fn new(tree: &'a SourceTree) -> Self {
        Self {
            tree,
            out: String::new(),
            layout: FileLayout::default(),
            depth: 0,
        }
    }

    fn indent(&mut self) {
        for _ in 0..self.depth {
            self.out.push_str(INDENT);
        }
    }

    fn recorded(&mut self, text: &str) -> TextRange {
        let start = self.out.len();
        self.out.push_str(text);
        TextRange::new(start, self.out.len())
    }

    fn file(&mut self, file: FileId) {
        let tree = self.tree;
        let data = tree.file(file);
        if !data.package.is_root() {
            self.out.push_str("package ");
            self.out.push_str(&data.package.to_string());
            self.out.push('\n');
        }
        if !data.imports.is_empty() {
            if !self.out.is_empty() {
                self.out.push('\n');
            }
            for import in &data.imports {
                self.out.push_str("import ");
                self.expr(import.path);
                if let Some(alias) = &import.alias {
                    self.out.push_str(" as ");
                    self.out.push_str(alias);
                }
                self.out.push('\n');
            }
        }
        for &item in &data.items {
            if !self.out.is_empty() {
                self.out.push('\n');
            }
            self.decl(item);
        }
    }

    fn decl(&mut self, id: DeclId) {
        let tree = self.tree;
        let decl = tree.decl(id);
        if let Some(doc) = &decl.doc {
            let start = self.out.len();
            for (idx, line) in doc.lines().enumerate() {
                self.indent();
                if idx > 0 && line.starts_with('*') {
                    self.out.push(' ');
                }
                self.out.push_str(line);
                self.out.push('\n');
            }
            // Exclude the trailing newline.
            self.layout
                .docs
                .insert(id, TextRange::new(start, self.out.len() - 1));
        }

        self.indent();
        if decl.explicit_visibility {
            self.out.push_str(decl.visibility.keyword());
            self.out.push(' ');
        }
        for modifier in &decl.modifiers {
            self.out.push_str(modifier.keyword());
            self.out.push(' ');
        }

        match decl.kind {
            DeclKind::Class | DeclKind::Interface => {
                self.out.push_str(if decl.kind == DeclKind::Class {
                    "class "
                } else {
                    "interface "
                });
                self.name(id);
                self.type_params(id);
                if let Some(params) = &decl.params {
                    self.params(params);
                }
                self.supertypes(id);
                self.members(id);
            }
            DeclKind::Object => {
                self.out.push_str("object");
                if !decl.implicit_name {
                    self.out.push(' ');
                    self.name(id);
                }
                self.supertypes(id);
                self.members(id);
            }
            DeclKind::Function => {
                self.out.push_str("fun ");
                if !decl.type_params.is_empty() {
                    self.type_params(id);
                    self.out.push(' ');
                }
                self.name(id);
                self.params(decl.params.as_deref().unwrap_or_default());
                self.typed_initializer(id);
                if let Some(body) = &decl.body {
                    self.block(body);
                }
            }
            DeclKind::Property { mutable } | DeclKind::Local { mutable } => {
                self.out.push_str(if mutable { "var " } else { "val " });
                self.name(id);
                self.typed_initializer(id);
            }
            DeclKind::Parameter { .. } | DeclKind::TypeParameter => {
                self.name(id);
                self.typed_initializer(id);
            }
        }
        self.out.push('\n');
    }

    fn name(&mut self, id: DeclId) {
        let tree = self.tree;
        let range = self.recorded(&tree.decl(id).name);
        self.layout.decl_names.insert(id, range);
    }

    fn type_params(&mut self, id: DeclId) {
        let tree = self.tree;
        let type_params = &tree.decl(id).type_params;
        if type_params.is_empty() {
            return;
        }
        self.out.push('<');
        for (idx, &tp) in type_params.iter().enumerate() {
            if idx > 0 {
                self.out.push_str(", ");
            }
            self.name(tp);
        }
        self.out.push('>');
    }

    fn params(&mut self, params: &[DeclId]) {
        self.out.push('(');
        for (idx, &param) in params.iter().enumerate() {
            if idx > 0 {
                self.out.push_str(", ");
            }
            self.param(param);
        }
        self.out.push(')');
    }

    fn param(&mut self, id: DeclId) {
        let tree = self.tree;
        let decl = tree.decl(id);
        if decl.explicit_visibility {
            self.out.push_str(decl.visibility.keyword());
            self.out.push(' ');
        }
        if let DeclKind::Parameter {
            property: Some(mutable),
        } = decl.kind
        {
            self.out.push_str(if mutable { "var " } else { "val " });
        }
        self.name(id);
        self.typed_initializer(id);
    }

    fn typed_initializer(&mut self, id: DeclId) {
        let tree = self.tree;
        let decl = tree.decl(id);
        if let Some(ty) = decl.ty {
            self.out.push_str(": ");
            self.expr(ty);
        }
        if let Some(init) = decl.initializer {
            self.out.push_str(" = ");
            self.expr(init);
        }
    }

    fn supertypes(&mut self, id: DeclId) {
        let tree = self.tree;
        let supertypes = &tree.decl(id).supertypes;
        for (idx, entry) in supertypes.iter().enumerate() {
            self.out.push_str(if idx == 0 { " : " } else { ", " });
            self.expr(entry.ty);
            if let Some(args) = &entry.args {
                self.args(args);
            }
        }
    }

    fn members(&mut self, id: DeclId) {
        let tree = self.tree;
        let Some(members) = &tree.decl(id).members else {
            return;
        };
        if members.is_empty() {
            self.out.push_str(" {}");
            return;
        }
        self.out.push_str(" {\n");
        self.depth += 1;
        for &member in members {
            self.decl(member);
        }
        self.depth -= 1;
        self.indent();
        self.out.push('}');
    }

    fn block(&mut self, body: &[Stmt]) {
        if body.is_empty() {
            self.out.push_str(" {}");
            return;
        }
        self.out.push_str(" {\n");
        self.depth += 1;
        for stmt in body {
            match *stmt {
                Stmt::Expr(expr) => {
                    self.indent();
                    self.expr(expr);
                    self.out.push('\n');
                }
                Stmt::Local(local) => self.decl(local),
            }
        }
        self.depth -= 1;
        self.indent();
        self.out.push('}');
    }

    fn args(&mut self, args: &[ExprId]) {
        self.out.push('(');
        for (idx, &arg) in args.iter().enumerate() {
            if idx > 0 {
                self.out.push_str(", ");
            }
            self.expr(arg);
        }
        self.out.push(')');
    }

    fn expr(&mut self, id: ExprId) {
        let tree = self.tree;
        let range = match &tree.expr(id).kind {
            ExprKind::Name(name) => {
                if let Some(qualifier) = name.qualifier {
                    self.expr(qualifier);
                    self.out.push('.');
                }
                let range = self.recorded(&name.name);
                if !name.type_args.is_empty() {
                    self.out.push('<');
                    for (idx, &arg) in name.type_args.iter().enumerate() {
                        if idx > 0 {
                            self.out.push_str(", ");
                        }
                        self.expr(arg);
                    }
                    self.out.push('>');
                }
                if let Some(args) = &name.args {
                    self.args(args);
                }
                range
            }
            ExprKind::This { label, .. } => match label {
                Some(label) => self.recorded(&format!("this@{label}")),
                None => self.recorded("this"),
            },
            ExprKind::Str(text) => self.recorded(&format!("\"{text}\"")),
            ExprKind::Literal(text) => self.recorded(text),
        };
        self.layout.exprs.insert(id, range);
    }
}
