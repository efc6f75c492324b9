//! Dependency tokens and the dependency-set algebra.
//!
//! Conditions declare which pieces of shared state they read, actions which
//! pieces they write. Both declarations are a `DependencySet`: either a
//! bounded set of tokens, or `Everything`, the wildcard meaning "reads or
//! writes the whole system". `Everything` is absorbing under union and
//! intersects every set, which forces the scheduler to fall back to a
//! conservative full update.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexSet;

use crate::molecule::Molecule;

/// An identifier of a readable or writable piece of shared state.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Dependency {
    /// The concentration of a chemical species.
    Molecule(Molecule),
    /// Any other named quantity (e.g. a position or a custom property).
    Custom(Arc<str>),
}

impl Dependency {
    /// Creates a custom dependency token.
    #[must_use]
    pub fn custom(name: impl AsRef<str>) -> Self {
        Self::Custom(Arc::from(name.as_ref()))
    }
}

impl From<Molecule> for Dependency {
    fn from(molecule: Molecule) -> Self {
        Self::Molecule(molecule)
    }
}

impl fmt::Display for Dependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Molecule(m) => write!(f, "{m}"),
            Self::Custom(name) => write!(f, "#{name}"),
        }
    }
}

/// The set of dependencies read or written by a component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DependencySet {
    /// A known, finite set of tokens, in declaration order.
    Bounded(IndexSet<Dependency>),
    /// The wildcard: depends on, or affects, everything.
    Everything,
}

impl DependencySet {
    /// The empty bounded set.
    #[must_use]
    pub fn empty() -> Self {
        Self::Bounded(IndexSet::new())
    }

    /// The wildcard set.
    #[must_use]
    pub const fn everything() -> Self {
        Self::Everything
    }

    /// A bounded set holding a single token.
    #[must_use]
    pub fn single(dependency: impl Into<Dependency>) -> Self {
        let mut set = IndexSet::with_capacity(1);
        set.insert(dependency.into());
        Self::Bounded(set)
    }

    /// Returns true for the wildcard.
    #[must_use]
    pub const fn is_everything(&self) -> bool {
        matches!(self, Self::Everything)
    }

    /// Returns true for a bounded set with no tokens.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Bounded(set) => set.is_empty(),
            Self::Everything => false,
        }
    }

    /// Number of tokens, or `None` for the wildcard.
    #[must_use]
    pub fn len(&self) -> Option<usize> {
        match self {
            Self::Bounded(set) => Some(set.len()),
            Self::Everything => None,
        }
    }

    /// Returns true if the set covers `dependency`.
    #[must_use]
    pub fn contains(&self, dependency: &Dependency) -> bool {
        match self {
            Self::Bounded(set) => set.contains(dependency),
            Self::Everything => true,
        }
    }

    /// Iterates the tokens of a bounded set. The wildcard yields nothing.
    pub fn iter(&self) -> impl Iterator<Item = &Dependency> {
        let tokens = match self {
            Self::Bounded(set) => Some(set.iter()),
            Self::Everything => None,
        };
        tokens.into_iter().flatten()
    }

    /// Adds every token of `other` to `self`. `Everything` is absorbing.
    pub fn union_with(&mut self, other: &Self) {
        match other {
            Self::Everything => *self = Self::Everything,
            Self::Bounded(theirs) => {
                if let Self::Bounded(mine) = self {
                    mine.extend(theirs.iter().cloned());
                }
            }
        }
    }

    /// Returns the union of two sets.
    #[must_use]
    pub fn union(mut self, other: &Self) -> Self {
        self.union_with(other);
        self
    }

    /// Returns true if a change to `self` may affect a reader of `other`.
    ///
    /// The wildcard intersects every set, the empty one included.
    #[must_use]
    pub fn intersects(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Everything, _) | (_, Self::Everything) => true,
            (Self::Bounded(a), Self::Bounded(b)) => {
                let (small, large) = if a.len() <= b.len() { (a, b) } else { (b, a) };
                small.iter().any(|d| large.contains(d))
            }
        }
    }

    /// Folds the declared sets of a list of components into one set.
    ///
    /// Stops scanning at the first wildcard.
    pub fn aggregate<'a, I>(sets: I) -> Self
    where
        I: IntoIterator<Item = &'a Self>,
    {
        let mut acc = IndexSet::new();
        for set in sets {
            match set {
                Self::Everything => return Self::Everything,
                Self::Bounded(tokens) => acc.extend(tokens.iter().cloned()),
            }
        }
        Self::Bounded(acc)
    }
}

impl Default for DependencySet {
    fn default() -> Self {
        Self::empty()
    }
}

impl FromIterator<Dependency> for DependencySet {
    fn from_iter<I: IntoIterator<Item = Dependency>>(iter: I) -> Self {
        Self::Bounded(iter.into_iter().collect())
    }
}

impl fmt::Display for DependencySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Everything => write!(f, "*"),
            Self::Bounded(set) => {
                write!(f, "{{")?;
                for (i, d) in set.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{d}")?;
                }
                write!(f, "}}")
            }
        }
    }
}
