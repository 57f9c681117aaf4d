use std::ops::{Deref, DerefMut};

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use relo_syntax::SourceTree;

use crate::services::Transaction;

/// A source tree shared between readers and one writer at a time.
///
/// Analysis runs under a read lock; a move holds the write lock for its whole mutating phase,
/// so no reader ever observes a half-moved tree.
#[derive(Debug, Default)]
pub struct InMemoryHost {
    tree: RwLock<SourceTree>,
}

impl InMemoryHost {
    pub fn new(tree: SourceTree) -> Self {
        Self {
            tree: RwLock::new(tree),
        }
    }

    pub fn read(&self) -> RwLockReadGuard<'_, SourceTree> {
        self.tree.read()
    }

    pub fn write_action(&self) -> WriteAction<'_> {
        WriteAction {
            guard: self.tree.write(),
            checkpoint: None,
        }
    }

    pub fn snapshot(&self) -> SourceTree {
        self.tree.read().clone()
    }

    pub fn into_inner(self) -> SourceTree {
        self.tree.into_inner()
    }
}

/// Exclusive access to the tree with checkpoint-based rollback.
pub struct WriteAction<'a> {
    guard: RwLockWriteGuard<'a, SourceTree>,
    checkpoint: Option<SourceTree>,
}

impl Transaction for WriteAction<'_> {
    fn begin(&mut self) {
        self.checkpoint = Some(self.guard.clone());
    }

    fn commit(&mut self) {
        self.checkpoint = None;
    }

    fn rollback(&mut self) {
        if let Some(checkpoint) = self.checkpoint.take() {
            *self.guard = checkpoint;
            tracing::debug!(target = "relo.move", "rolled back write action");
        }
    }
}

impl Deref for WriteAction<'_> {
    type Target = SourceTree;

    fn deref(&self) -> &SourceTree {
        &self.guard
    }
}

impl DerefMut for WriteAction<'_> {
    fn deref_mut(&mut self) -> &mut SourceTree {
        &mut self.guard
    }
}

impl Drop for WriteAction<'_> {
    fn drop(&mut self) {
        if self.checkpoint.is_some() {
            tracing::warn!(target = "relo.move", "write action dropped while open; rolling back");
            self.rollback();
        }
    }
}

#[cfg(test)]
mod tests {
    use relo_core::FqName;
    use relo_syntax::FileKind;

    use super::*;

    #[test]
    fn rollback_restores_the_checkpoint() {
        let host = InMemoryHost::default();
        {
            let mut action = host.write_action();
            let module = action.add_module("main", "", "jvm");
            action.add_file(module, "A.kt", FileKind::Primary, FqName::root());
        }
        let before = host.snapshot();

        {
            let mut action = host.write_action();
            action.begin();
            let module = action.find_module("main").unwrap();
            action.add_file(module, "B.kt", FileKind::Primary, FqName::root());
            action.rollback();
        }
        assert_eq!(host.snapshot(), before);

        {
            let mut action = host.write_action();
            action.begin();
            let module = action.find_module("main").unwrap();
            action.add_file(module, "B.kt", FileKind::Primary, FqName::root());
            // Dropped without commit.
        }
        assert_eq!(host.snapshot(), before);
    }
}
