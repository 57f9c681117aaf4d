//! Recursive-descent parser building straight into a [`SourceTree`].
//!
//! References come out unbound; binding is the resolver's job.

use relo_core::{is_valid_identifier, FqName};

use crate::ids::{DeclId, ExprId, FileId, ModuleId};
use crate::lexer::{tokenize, Token, TokenKind};
use crate::tree::{
    Container, Decl, DeclKind, ExprKind, FileKind, Import, Modifier, NameRef, RefRole,
    SourceTree, Stmt, SuperTypeEntry, Visibility,
};
use crate::ParseError;

/// Parse `text` as a new file of `module`.
///
/// On error nothing reachable is left behind: the partially built file is deleted.
pub fn parse_file(
    tree: &mut SourceTree,
    module: ModuleId,
    path: &str,
    kind: FileKind,
    text: &str,
) -> Result<FileId, ParseError> {
    let tokens = tokenize(text)?;
    let file = tree.add_file(module, path, kind, FqName::root());
    let mut parser = Parser {
        tokens,
        pos: 0,
        tree,
        file,
    };
    match parser.parse_file() {
        Ok(()) => {
            tracing::trace!(target = "relo.syntax", path, "parsed file");
            Ok(file)
        }
        Err(err) => {
            parser.tree.delete_file(file);
            Err(err)
        }
    }
}

struct Parser<'t> {
    tokens: Vec<Token>,
    pos: usize,
    tree: &'t mut SourceTree,
    file: FileId,
}

impl Parser<'_> {
    fn cur(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn nth(&self, n: usize) -> &Token {
        &self.tokens[(self.pos + n).min(self.tokens.len() - 1)]
    }

    fn bump(&mut self) -> Token {
        let token = self.cur().clone();
        if token.kind != TokenKind::Eof {
            self.pos += 1;
        }
        token
    }

    fn at(&self, kind: &TokenKind) -> bool {
        &self.cur().kind == kind
    }

    fn at_ident(&self, text: &str) -> bool {
        self.cur().is_ident(text)
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.at(kind) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn error(&self, expected: &str) -> ParseError {
        let token = self.cur();
        ParseError::new(
            format!("expected {expected}, found {}", describe(&token.kind)),
            token.position,
        )
    }

    fn expect(&mut self, kind: &TokenKind, expected: &str) -> Result<Token, ParseError> {
        if self.at(kind) {
            Ok(self.bump())
        } else {
            Err(self.error(expected))
        }
    }

    fn expect_name(&mut self, expected: &str) -> Result<String, ParseError> {
        match &self.cur().kind {
            TokenKind::Ident(name) if is_valid_identifier(name) => {
                let name = name.clone();
                self.bump();
                Ok(name)
            }
            _ => Err(self.error(expected)),
        }
    }

    fn skip_semis(&mut self) {
        while self.eat(&TokenKind::Semi) {}
    }

    /// Dotted identifier sequence as used by `package` and `import`.
    fn parse_dotted(&mut self) -> Result<Vec<String>, ParseError> {
        let mut segments = vec![self.expect_name("a name")?];
        while self.at(&TokenKind::Dot) {
            self.bump();
            segments.push(self.expect_name("a name")?);
        }
        Ok(segments)
    }

    fn parse_file(&mut self) -> Result<(), ParseError> {
        self.skip_semis();
        if self.at_ident("package") {
            self.bump();
            let segments = self.parse_dotted()?;
            self.tree.file_mut(self.file).package = FqName::new(segments);
        }
        self.skip_semis();

        while self.at_ident("import") {
            self.bump();
            let segments = self.parse_dotted()?;
            let alias = if self.at_ident("as") {
                self.bump();
                Some(self.expect_name("an import alias")?)
            } else {
                None
            };
            let (last, qualifier) = segments
                .split_last()
                .ok_or_else(|| self.error("an import path"))?;
            let qualifier = self.tree.package_chain(qualifier, RefRole::Import);
            let path = self.tree.alloc_expr(ExprKind::Name(NameRef {
                name: last.clone(),
                qualifier,
                args: None,
                type_args: Vec::new(),
                role: RefRole::Import,
                binding: None,
            }));
            self.tree
                .file_mut(self.file)
                .imports
                .push(Import { path, alias });
            self.skip_semis();
        }

        loop {
            self.skip_semis();
            if self.at(&TokenKind::Eof) {
                return Ok(());
            }
            let container = Container::File(self.file);
            let decl = self.parse_decl(container)?;
            self.tree.file_mut(self.file).items.push(decl);
        }
    }

    fn parse_decl(&mut self, container: Container) -> Result<DeclId, ParseError> {
        let doc = match &self.cur().kind {
            TokenKind::Doc(text) => {
                let doc = normalize_doc(text);
                self.bump();
                Some(doc)
            }
            _ => None,
        };

        let mut visibility = Visibility::Public;
        let mut explicit_visibility = false;
        let mut modifiers = Vec::new();
        loop {
            let TokenKind::Ident(word) = &self.cur().kind else {
                break;
            };
            if !matches!(self.nth(1).kind, TokenKind::Ident(_)) {
                break;
            }
            if let Some(vis) = Visibility::from_keyword(word) {
                visibility = vis;
                explicit_visibility = true;
            } else if let Some(modifier) = Modifier::from_keyword(word) {
                if !modifiers.contains(&modifier) {
                    modifiers.push(modifier);
                }
            } else {
                break;
            }
            self.bump();
        }

        let keyword = match &self.cur().kind {
            TokenKind::Ident(word) => word.clone(),
            _ => return Err(self.error("a declaration")),
        };
        let id = match keyword.as_str() {
            "class" => self.parse_class_like(container, DeclKind::Class)?,
            "interface" => self.parse_class_like(container, DeclKind::Interface)?,
            "object" => self.parse_object(container, modifiers.contains(&Modifier::Companion))?,
            "fun" => self.parse_function(container)?,
            "val" | "var" => self.parse_property(container)?,
            _ => return Err(self.error("a declaration")),
        };

        let decl = self.tree.decl_mut(id);
        decl.doc = doc;
        decl.visibility = visibility;
        decl.explicit_visibility = explicit_visibility;
        decl.modifiers = modifiers;
        Ok(id)
    }

    fn parse_class_like(&mut self, container: Container, kind: DeclKind) -> Result<DeclId, ParseError> {
        self.bump();
        let name = self.expect_name("a class name")?;
        let id = self.tree.alloc_decl(Decl::new(name, kind, container));

        let type_params = self.parse_type_params(id)?;
        let params = if kind == DeclKind::Class && self.at(&TokenKind::LParen) {
            Some(self.parse_params(id, true)?)
        } else {
            None
        };
        let supertypes = self.parse_supertypes()?;
        let members = self.parse_members(id)?;

        let decl = self.tree.decl_mut(id);
        decl.type_params = type_params;
        decl.params = params;
        decl.supertypes = supertypes;
        decl.members = members;
        Ok(id)
    }

    fn parse_object(&mut self, container: Container, companion: bool) -> Result<DeclId, ParseError> {
        self.bump();
        let (name, implicit_name) = match &self.cur().kind {
            TokenKind::Ident(name) if companion && is_valid_identifier(name) => {
                let name = name.clone();
                self.bump();
                (name, false)
            }
            _ if companion => ("Companion".to_string(), true),
            _ => (self.expect_name("an object name")?, false),
        };
        let mut decl = Decl::new(name, DeclKind::Object, container);
        decl.implicit_name = implicit_name;
        let id = self.tree.alloc_decl(decl);

        let supertypes = self.parse_supertypes()?;
        let members = self.parse_members(id)?;
        let decl = self.tree.decl_mut(id);
        decl.supertypes = supertypes;
        decl.members = members;
        Ok(id)
    }

    fn parse_function(&mut self, container: Container) -> Result<DeclId, ParseError> {
        self.bump();
        let id = self
            .tree
            .alloc_decl(Decl::new(String::new(), DeclKind::Function, container));
        let type_params = self.parse_type_params(id)?;
        let name = self.expect_name("a function name")?;
        let params = self.parse_params(id, false)?;
        let ty = if self.eat(&TokenKind::Colon) {
            Some(self.parse_type()?)
        } else {
            None
        };
        let (initializer, body) = if self.eat(&TokenKind::Eq) {
            (Some(self.parse_expr()?), None)
        } else if self.at(&TokenKind::LBrace) {
            (None, Some(self.parse_block(id)?))
        } else {
            (None, None)
        };

        let decl = self.tree.decl_mut(id);
        decl.name = name;
        decl.type_params = type_params;
        decl.params = Some(params);
        decl.ty = ty;
        decl.initializer = initializer;
        decl.body = body;
        Ok(id)
    }

    fn parse_property(&mut self, container: Container) -> Result<DeclId, ParseError> {
        let mutable = self.bump().is_ident("var");
        let name = self.expect_name("a property name")?;
        let id = self
            .tree
            .alloc_decl(Decl::new(name, DeclKind::Property { mutable }, container));
        let (ty, initializer) = self.parse_typed_initializer()?;
        let decl = self.tree.decl_mut(id);
        decl.ty = ty;
        decl.initializer = initializer;
        Ok(id)
    }

    fn parse_typed_initializer(&mut self) -> Result<(Option<ExprId>, Option<ExprId>), ParseError> {
        let ty = if self.eat(&TokenKind::Colon) {
            Some(self.parse_type()?)
        } else {
            None
        };
        let initializer = if self.eat(&TokenKind::Eq) {
            Some(self.parse_expr()?)
        } else {
            None
        };
        Ok((ty, initializer))
    }

    fn parse_type_params(&mut self, owner: DeclId) -> Result<Vec<DeclId>, ParseError> {
        let mut out = Vec::new();
        if !self.eat(&TokenKind::Lt) {
            return Ok(out);
        }
        loop {
            let name = self.expect_name("a type parameter")?;
            out.push(self.tree.alloc_decl(Decl::new(
                name,
                DeclKind::TypeParameter,
                Container::Decl(owner),
            )));
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(&TokenKind::Gt, "`>`")?;
        Ok(out)
    }

    fn parse_params(&mut self, owner: DeclId, allow_property: bool) -> Result<Vec<DeclId>, ParseError> {
        self.expect(&TokenKind::LParen, "`(`")?;
        let mut out = Vec::new();
        while !self.eat(&TokenKind::RParen) {
            let mut visibility = None;
            if let TokenKind::Ident(word) = &self.cur().kind {
                if allow_property && (self.nth(1).is_ident("val") || self.nth(1).is_ident("var")) {
                    visibility = Visibility::from_keyword(word);
                    if visibility.is_some() {
                        self.bump();
                    }
                }
            }
            let property = if allow_property && (self.at_ident("val") || self.at_ident("var")) {
                Some(self.bump().is_ident("var"))
            } else {
                None
            };
            let name = self.expect_name("a parameter name")?;
            self.expect(&TokenKind::Colon, "`:`")?;
            let ty = self.parse_type()?;
            let default = if self.eat(&TokenKind::Eq) {
                Some(self.parse_expr()?)
            } else {
                None
            };

            let mut param = Decl::new(name, DeclKind::Parameter { property }, Container::Decl(owner));
            if let Some(visibility) = visibility {
                param.visibility = visibility;
                param.explicit_visibility = true;
            }
            param.ty = Some(ty);
            param.initializer = default;
            out.push(self.tree.alloc_decl(param));

            if !self.eat(&TokenKind::Comma) {
                self.expect(&TokenKind::RParen, "`,` or `)`")?;
                break;
            }
        }
        Ok(out)
    }

    fn parse_supertypes(&mut self) -> Result<Vec<SuperTypeEntry>, ParseError> {
        let mut out = Vec::new();
        if !self.eat(&TokenKind::Colon) {
            return Ok(out);
        }
        loop {
            let ty = self.parse_type()?;
            let args = if self.at(&TokenKind::LParen) && !self.cur().newline_before {
                Some(self.parse_args()?)
            } else {
                None
            };
            out.push(SuperTypeEntry { ty, args });
            if !self.eat(&TokenKind::Comma) {
                return Ok(out);
            }
        }
    }

    fn parse_members(&mut self, owner: DeclId) -> Result<Option<Vec<DeclId>>, ParseError> {
        if !self.eat(&TokenKind::LBrace) {
            return Ok(None);
        }
        let mut members = Vec::new();
        loop {
            self.skip_semis();
            if self.eat(&TokenKind::RBrace) {
                return Ok(Some(members));
            }
            if self.at(&TokenKind::Eof) {
                return Err(self.error("`}`"));
            }
            members.push(self.parse_decl(Container::Decl(owner))?);
        }
    }

    fn parse_block(&mut self, owner: DeclId) -> Result<Vec<Stmt>, ParseError> {
        self.expect(&TokenKind::LBrace, "`{`")?;
        let mut stmts = Vec::new();
        loop {
            self.skip_semis();
            if self.eat(&TokenKind::RBrace) {
                return Ok(stmts);
            }
            if self.at(&TokenKind::Eof) {
                return Err(self.error("`}`"));
            }
            if self.at_ident("val") || self.at_ident("var") {
                let mutable = self.bump().is_ident("var");
                let name = self.expect_name("a variable name")?;
                let local = self.tree.alloc_decl(Decl::new(
                    name,
                    DeclKind::Local { mutable },
                    Container::Decl(owner),
                ));
                let (ty, initializer) = self.parse_typed_initializer()?;
                let decl = self.tree.decl_mut(local);
                decl.ty = ty;
                decl.initializer = initializer;
                stmts.push(Stmt::Local(local));
            } else {
                stmts.push(Stmt::Expr(self.parse_expr()?));
            }
        }
    }

    /// Type reference: `a.b.C<T, U>`.
    fn parse_type(&mut self) -> Result<ExprId, ParseError> {
        let segments = self.parse_dotted()?;
        let type_args = if self.eat(&TokenKind::Lt) {
            let mut args = Vec::new();
            loop {
                args.push(self.parse_type()?);
                if !self.eat(&TokenKind::Comma) {
                    break;
                }
            }
            self.expect(&TokenKind::Gt, "`>`")?;
            args
        } else {
            Vec::new()
        };
        let (last, qualifier) = segments
            .split_last()
            .ok_or_else(|| self.error("a type"))?;
        let qualifier = self.tree.package_chain(qualifier, RefRole::Type);
        Ok(self.tree.alloc_expr(ExprKind::Name(NameRef {
            name: last.clone(),
            qualifier,
            args: None,
            type_args,
            role: RefRole::Type,
            binding: None,
        })))
    }

    fn parse_args(&mut self) -> Result<Vec<ExprId>, ParseError> {
        self.expect(&TokenKind::LParen, "`(`")?;
        let mut args = Vec::new();
        while !self.eat(&TokenKind::RParen) {
            args.push(self.parse_expr()?);
            if !self.eat(&TokenKind::Comma) {
                self.expect(&TokenKind::RParen, "`,` or `)`")?;
                break;
            }
        }
        Ok(args)
    }

    fn call_args(&mut self) -> Result<Option<Vec<ExprId>>, ParseError> {
        if self.at(&TokenKind::LParen) && !self.cur().newline_before {
            Ok(Some(self.parse_args()?))
        } else {
            Ok(None)
        }
    }

    fn parse_expr(&mut self) -> Result<ExprId, ParseError> {
        let mut expr = self.parse_primary()?;
        while self.at(&TokenKind::Dot) {
            self.bump();
            let name = self.expect_name("a member name")?;
            let args = self.call_args()?;
            expr = self.tree.alloc_expr(ExprKind::Name(NameRef {
                name,
                qualifier: Some(expr),
                role: if args.is_some() { RefRole::Call } else { RefRole::Value },
                args,
                type_args: Vec::new(),
                binding: None,
            }));
        }
        Ok(expr)
    }

    fn parse_primary(&mut self) -> Result<ExprId, ParseError> {
        let token = self.cur().clone();
        let kind = match token.kind {
            TokenKind::Str(text) => {
                self.bump();
                ExprKind::Str(text)
            }
            TokenKind::Number(text) => {
                self.bump();
                ExprKind::Literal(text)
            }
            TokenKind::Ident(word) if matches!(word.as_str(), "true" | "false" | "null") => {
                self.bump();
                ExprKind::Literal(word)
            }
            TokenKind::Ident(word) if word == "this" => {
                self.bump();
                let label = if self.at(&TokenKind::At) && !self.cur().newline_before {
                    self.bump();
                    Some(self.expect_name("a label")?)
                } else {
                    None
                };
                ExprKind::This {
                    label,
                    binding: None,
                }
            }
            TokenKind::Ident(_) => {
                let name = self.expect_name("an expression")?;
                let args = self.call_args()?;
                ExprKind::Name(NameRef {
                    name,
                    qualifier: None,
                    role: if args.is_some() { RefRole::Call } else { RefRole::Value },
                    args,
                    type_args: Vec::new(),
                    binding: None,
                })
            }
            _ => return Err(self.error("an expression")),
        };
        Ok(self.tree.alloc_expr(kind))
    }
}

/// Trim every line of a doc comment; the printer re-indents it.
fn normalize_doc(raw: &str) -> String {
    raw.lines().map(str::trim).collect::<Vec<_>>().join("\n")
}

fn describe(kind: &TokenKind) -> String {
    match kind {
        TokenKind::Ident(name) => format!("`{name}`"),
        TokenKind::Str(_) => "string literal".to_string(),
        TokenKind::Number(text) => format!("`{text}`"),
        TokenKind::Doc(_) => "doc comment".to_string(),
        TokenKind::LParen => "`(`".to_string(),
        TokenKind::RParen => "`)`".to_string(),
        TokenKind::LBrace => "`{`".to_string(),
        TokenKind::RBrace => "`}`".to_string(),
        TokenKind::Lt => "`<`".to_string(),
        TokenKind::Gt => "`>`".to_string(),
        TokenKind::Comma => "`,`".to_string(),
        TokenKind::Dot => "`.`".to_string(),
        TokenKind::Colon => "`:`".to_string(),
        TokenKind::Semi => "`;`".to_string(),
        TokenKind::Eq => "`=`".to_string(),
        TokenKind::At => "`@`".to_string(),
        TokenKind::Eof => "end of file".to_string(),
    }
}
