//! Chemical species names.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// The name of a chemical species hosted by nodes.
///
/// Molecules are compared by name and are cheap to clone, since the same
/// molecule is referenced by many conditions, actions and nodes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Molecule(Arc<str>);

impl Molecule {
    /// Creates a molecule.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::EmptyMoleculeName` if the trimmed name is empty.
    pub fn new(name: impl AsRef<str>) -> Result<Self, ValidationError> {
        let name = name.as_ref().trim();
        if name.is_empty() {
            return Err(ValidationError::EmptyMoleculeName);
        }
        Ok(Self(Arc::from(name)))
    }

    /// Returns the molecule name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Molecule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Molecule {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Molecule> for String {
    fn from(molecule: Molecule) -> Self {
        molecule.0.to_string()
    }
}
