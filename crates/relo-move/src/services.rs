//! Host services the engine is written against. [`TreeServices`] backs all of them with the
//! resolver crate; hosts with their own indexes can plug in alternatives.
//!
//! Structural edits go through the [`SourceTree`] mutation API directly.

use relo_resolve::{find_references, shorten_reference, Resolver, ShortenOutcome};
use relo_syntax::{DeclId, ExprId, SourceTree};

pub trait ReferenceSearch: Send + Sync {
    /// Live references bound to `decl`, in a stable order.
    fn find_references(&self, tree: &SourceTree, decl: DeclId) -> Vec<ExprId>;
}

pub trait SymbolResolver: Send + Sync {
    /// Resolve each expression from scratch, ignoring stored bindings.
    fn resolve_all(&self, tree: &SourceTree, exprs: &[ExprId]) -> Vec<Option<DeclId>>;

    fn resolve(&self, tree: &SourceTree, expr: ExprId) -> Option<DeclId> {
        self.resolve_all(tree, &[expr]).pop().flatten()
    }
}

pub trait ReferenceShortener: Send + Sync {
    /// Shorten the qualified chain ending in `top` as far as it still binds the same way.
    fn shorten(&self, tree: &mut SourceTree, top: ExprId) -> ShortenOutcome;
}

/// All-or-nothing scope around the mutating phase of a move.
pub trait Transaction {
    fn begin(&mut self);
    fn commit(&mut self);
    fn rollback(&mut self);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TreeServices;

impl ReferenceSearch for TreeServices {
    fn find_references(&self, tree: &SourceTree, decl: DeclId) -> Vec<ExprId> {
        find_references(tree, decl)
    }
}

impl SymbolResolver for TreeServices {
    fn resolve_all(&self, tree: &SourceTree, exprs: &[ExprId]) -> Vec<Option<DeclId>> {
        let resolver = Resolver::new(tree);
        exprs.iter().map(|&expr| resolver.resolve_decl(expr)).collect()
    }
}

impl ReferenceShortener for TreeServices {
    fn shorten(&self, tree: &mut SourceTree, top: ExprId) -> ShortenOutcome {
        shorten_reference(tree, top)
    }
}

/// The set of services a move session runs against.
pub struct MoveServices {
    pub search: Box<dyn ReferenceSearch>,
    pub resolver: Box<dyn SymbolResolver>,
    pub shortener: Box<dyn ReferenceShortener>,
}

impl Default for MoveServices {
    fn default() -> Self {
        Self {
            search: Box::new(TreeServices),
            resolver: Box::new(TreeServices),
            shortener: Box::new(TreeServices),
        }
    }
}

impl std::fmt::Debug for MoveServices {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MoveServices").finish_non_exhaustive()
    }
}
