use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! arena_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(u32);

        impl $name {
            pub(crate) fn from_raw(raw: u32) -> Self {
                $name(raw)
            }

            #[must_use]
            pub fn idx(self) -> usize {
                self.0 as usize
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!(stringify!($name), "({})"), self.0)
            }
        }

        impl<T> std::ops::Index<$name> for Arena<T> {
            type Output = T;

            fn index(&self, index: $name) -> &Self::Output {
                &self.data[index.idx()]
            }
        }

        impl<T> std::ops::IndexMut<$name> for Arena<T> {
            fn index_mut(&mut self, index: $name) -> &mut Self::Output {
                &mut self.data[index.idx()]
            }
        }
    };
}

arena_id!(
    /// A module: the unit of dependency and platform configuration.
    ModuleId
);
arena_id!(
    /// A source file within a module.
    FileId
);
arena_id!(
    /// A declaration (class, function, property, parameter, ...).
    DeclId
);
arena_id!(
    /// An expression node; reference segments, `this` expressions and literals.
    ExprId
);

/// Append-only storage. Removed entries stay allocated and are marked dead by their owners so
/// ids handed out earlier never alias a different node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Arena<T> {
    data: Vec<T>,
}

impl<T> Arena<T> {
    pub fn alloc(&mut self, value: T) -> u32 {
        let idx = self.data.len() as u32;
        self.data.push(value);
        idx
    }

    #[must_use]
    pub fn iter(&self) -> impl Iterator<Item = (u32, &T)> {
        self.data.iter().enumerate().map(|(i, v)| (i as u32, v))
    }
}

impl<T> Default for Arena<T> {
    fn default() -> Self {
        Arena { data: Vec::new() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_stay_valid_as_the_arena_grows() {
        let mut arena = Arena::default();
        let first = DeclId::from_raw(arena.alloc("a"));
        let second = DeclId::from_raw(arena.alloc("b"));
        arena[first] = "c";

        assert_eq!(arena[second], "b");
        assert_eq!(arena.iter().collect::<Vec<_>>(), vec![(0, &"c"), (1, &"b")]);
        assert_eq!(format!("{second:?}"), "DeclId(1)");
    }
}
