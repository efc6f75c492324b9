//! Simulation nodes and their chemical state.

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::molecule::Molecule;

/// Stable handle of a node inside an `Environment`.
///
/// Reactions, conditions and actions refer to their node through this
/// handle; the node itself is owned by the environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(u64);

impl NodeId {
    /// Wraps a raw handle value.
    #[must_use]
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw handle value.
    #[must_use]
    pub const fn as_raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node#{}", self.0)
    }
}

/// A simulation entity with a mutable chemical composition.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    id: NodeId,
    species: IndexMap<Molecule, f64>,
}

impl Node {
    pub(crate) fn new(id: NodeId) -> Self {
        Self {
            id,
            species: IndexMap::new(),
        }
    }

    /// Returns the handle of this node.
    #[must_use]
    pub const fn id(&self) -> NodeId {
        self.id
    }

    /// Concentration of `molecule`, zero when absent.
    #[must_use]
    pub fn concentration(&self, molecule: &Molecule) -> f64 {
        self.species.get(molecule).copied().unwrap_or(0.0)
    }

    /// Returns true if the node holds `molecule`, at any concentration.
    #[must_use]
    pub fn contains(&self, molecule: &Molecule) -> bool {
        self.species.contains_key(molecule)
    }

    /// Sets the concentration of `molecule`.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::InvalidConcentration` for negative or
    /// non-finite values.
    pub fn set_concentration(&mut self, molecule: Molecule, value: f64) -> Result<(), ValidationError> {
        if !value.is_finite() || value < 0.0 {
            return Err(ValidationError::InvalidConcentration {
                molecule: molecule.to_string(),
                value,
            });
        }
        self.species.insert(molecule, value);
        Ok(())
    }

    /// Removes `molecule`, returning its previous concentration.
    pub fn remove_concentration(&mut self, molecule: &Molecule) -> Option<f64> {
        self.species.shift_remove(molecule)
    }

    /// Removes every species.
    pub fn clear(&mut self) {
        self.species.clear();
    }

    /// Iterates species in insertion order.
    pub fn species(&self) -> impl Iterator<Item = (&Molecule, f64)> {
        self.species.iter().map(|(m, c)| (m, *c))
    }

    /// Number of distinct species held.
    #[must_use]
    pub fn species_count(&self) -> usize {
        self.species.len()
    }
}
