use relo_core::{FqName, PackageNameError};
use thiserror::Error;

use crate::conflicts::ConflictMap;

/// A move request that cannot be carried out as described. Reported before anything in the
/// tree is touched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TargetError {
    #[error("nothing selected to move")]
    EmptySource,
    #[error("declaration `{name}` no longer exists")]
    StaleDeclaration { name: String },
    #[error("selected declarations do not share a container")]
    MixedContainers,
    #[error("{kind} `{name}` cannot be moved on its own")]
    NotRelocatable { name: String, kind: &'static str },
    #[error("invalid package name `{package}`: {source}")]
    InvalidPackage {
        package: String,
        #[source]
        source: PackageNameError,
    },
    #[error("invalid file name `{name}`")]
    InvalidFileName { name: String },
    #[error("file `{path}` does not exist")]
    MissingFile { path: String },
    #[error("cannot move declarations into non-primary source `{path}`")]
    ForeignDestination { path: String },
    #[error("`{name}` cannot contain declarations")]
    NotAContainer { name: String },
    #[error("declarations are already located in `{location}`")]
    SameLocation { location: String },
    #[error("cannot move `{name}` into itself")]
    TargetInsideSource { name: String },
    #[error("file `{path}` already exists with package `{package}`")]
    PathTaken { path: String, package: FqName },
}

#[derive(Debug, Error)]
pub enum MoveError {
    #[error(transparent)]
    Target(#[from] TargetError),
    #[error("move cancelled")]
    Cancelled,
    #[error("move aborted: {} conflict(s) were not accepted", .conflicts.len())]
    ConflictsRejected { conflicts: ConflictMap },
    #[error("moved declaration `{name}` has no counterpart at the destination")]
    IncompleteMoveMap { name: String },
}

impl MoveError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, MoveError::Cancelled)
    }
}
