//! Source model for relo: a small Kotlin-like language parsed into an arena-backed
//! [`SourceTree`], plus a canonical printer.

mod ids;
mod lexer;
mod parser;
mod printer;
mod tree;

use thiserror::Error;

pub use ids::{DeclId, ExprId, FileId, ModuleId};
pub use parser::parse_file;
pub use printer::{render_expr, render_file, FileLayout, RenderedFile};
pub use tree::{
    Container, CopyMap, Decl, DeclKind, Expr, ExprKind, FileKind, Import, Module, Modifier,
    NameRef, RefRole, SourceFile, SourceTree, Stmt, SuperTypeEntry, Visibility,
};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{message} at byte {position}")]
pub struct ParseError {
    message: String,
    position: usize,
}

impl ParseError {
    pub(crate) fn new(message: impl Into<String>, position: usize) -> Self {
        Self {
            message: message.into(),
            position,
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn position(&self) -> usize {
        self.position
    }
}

/// File extension of primary sources.
pub const PRIMARY_EXTENSION: &str = "kt";
/// File extension of foreign sources.
pub const FOREIGN_EXTENSION: &str = "java";

impl FileKind {
    /// Classify a path by extension; `None` for files that are not sources.
    pub fn from_path(path: &str) -> Option<FileKind> {
        let ext = path.rsplit_once('.')?.1;
        match ext {
            PRIMARY_EXTENSION => Some(FileKind::Primary),
            FOREIGN_EXTENSION => Some(FileKind::Foreign),
            _ => None,
        }
    }
}
