//! Name resolution for the relo source model.
//!
//! The resolver answers "what does this reference denote right now", independent of the
//! bindings stored in the tree. The move engine uses it to bind freshly parsed code, to decide
//! how far a rewritten reference can be shortened, and to verify that rebinding held.

mod index;
mod resolver;
mod search;
mod shorten;

pub use index::{ExprContext, ParentSlot, ScopeAnchor, TreeIndex};
pub use resolver::{accepts, bind_all, set_binding, NameResolution, Resolver};
pub use search::{
    find_references, find_text_occurrences, match_ranges, ReferenceIndex, TextOccurrence,
    TextOwner,
};
pub use shorten::{chain_text, remove_redundant_imports, shorten_reference, ShortenOutcome};
