//! Move refactoring for the relo source model.
//!
//! A move relocates top-level declarations, object members or nested classes to another
//! package, file or container and keeps every reference to them valid. The pipeline is:
//!
//! 1. collect the declarations whose references must be tracked ([`collect_declarations_to_track`]),
//! 2. discover usages inside and outside the moved code ([`discover_usages`]),
//! 3. detect conflicts and let a [`ConflictHandler`] decide whether to go on ([`detect_conflicts`]),
//! 4. inside a single write action: adjust the declarations ([`preprocess_declaration`]),
//!    copy them to the destination and remove the originals ([`move_declarations`]),
//!    rebind and shorten every usage ([`retarget_usages`]), then finish the moved
//!    declarations ([`postprocess_declaration`]).
//!
//! [`MoveSession`] drives the whole pipeline against an [`InMemoryHost`]; any failure during
//! step 4 rolls the tree back to its state before the move.

mod conflicts;
mod declarations;
mod descriptor;
mod error;
mod host;
mod mover;
mod preview;
mod retarget;
mod services;
mod session;
mod transform;
mod usages;

pub use conflicts::{
    detect_conflicts, outer_instance_name, ConflictAnalysis, ConflictLocation, ConflictMap,
    OuterParamPlan,
};
pub use declarations::{collect_declarations_to_track, needs_reference_tracking};
pub use descriptor::{
    file_path, is_relocatable, MoveDescriptor, MoveSettings, MoveSource, MoveTarget,
    ResolvedTarget, SearchOptions, DEFAULT_NAME_ATTEMPTS,
};
pub use error::{MoveError, TargetError};
pub use host::{InMemoryHost, WriteAction};
pub use mover::{move_declarations, MoveMap, MoveResult};
pub use preview::{generate_preview, render_all, FileChangeKind, FilePreview, RefactoringPreview};
pub use retarget::{chain_tops, retarget_usages, usage_offsets, RetargetReport, UsageOffsets};
pub use services::{
    MoveServices, ReferenceSearch, ReferenceShortener, SymbolResolver, Transaction, TreeServices,
};
pub use session::{
    ConflictHandler, ConflictPolicy, MoveAnalysis, MoveListener, MoveOutcome, MoveSession,
};
pub use transform::{
    postprocess_declaration, preprocess_declaration, preprocess_usages, qualified_reference,
    qualifier_for,
};
pub use tokio_util::sync::CancellationToken;
pub use usages::{
    discover_usages, is_updatable, NonCodeKind, OuterInstanceReference, UsageElement, UsageInfo,
};
