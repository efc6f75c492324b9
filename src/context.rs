//! Locality scopes of conditions and actions.
//!
//! A context bounds how far a read or a write can reach: the own node only,
//! the node and its neighbours, or the whole environment. Variants are
//! declared in order of increasing scope, so the derived `Ord` sorts from the
//! narrowest to the widest.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Locality scope of a condition, an action or a whole reaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Context {
    /// Own node only.
    Local,
    /// Own node and the nodes linked to it.
    Neighborhood,
    /// The whole environment.
    Global,
}

impl Context {
    /// Returns true if `self` constrains the scope more than `other`.
    ///
    /// `Local` is the strictest context, `Global` the least strict.
    #[must_use]
    pub const fn is_stricter_than(self, other: Self) -> bool {
        (self as u8) < (other as u8)
    }

    /// Merges component contexts into the context of their aggregate.
    ///
    /// Starts from `Local` and widens the accumulator every time it is
    /// stricter than the next component. The result is the least strict
    /// context among `Local` and every component.
    pub fn widest<I>(contexts: I) -> Self
    where
        I: IntoIterator<Item = Self>,
    {
        contexts.into_iter().fold(Self::Local, |acc, c| {
            if acc.is_stricter_than(c) {
                c
            } else {
                acc
            }
        })
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::Local
    }
}

impl fmt::Display for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local => write!(f, "local"),
            Self::Neighborhood => write!(f, "neighborhood"),
            Self::Global => write!(f, "global"),
        }
    }
}
