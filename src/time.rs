//! Simulation time.
//!
//! Simulated time is continuous and unrelated to the wall clock. A `Time` is
//! an `f64` that is never NaN and never negative, which makes it totally
//! ordered. `Time::INFINITY` marks a reaction that will never fire again.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// An instant of simulated time.
///
/// # Examples
///
/// ```
/// use alembic::Time;
///
/// let t = Time::new(1.5).unwrap();
/// assert!(t < Time::INFINITY);
/// assert!(Time::new(f64::NAN).is_err());
/// ```
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct Time(f64);

impl Time {
    /// The start of every simulation.
    pub const ZERO: Self = Self(0.0);

    /// An instant that is never reached.
    pub const INFINITY: Self = Self(f64::INFINITY);

    /// Creates a time from a raw value.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::InvalidTime` if `value` is NaN or negative.
    /// Negative zero is accepted and stored as zero.
    pub fn new(value: f64) -> Result<Self, ValidationError> {
        if value.is_nan() || value < 0.0 {
            return Err(ValidationError::InvalidTime { value });
        }
        // `total_cmp` orders -0.0 before 0.0.
        Ok(Self(value + 0.0))
    }

    /// Returns the raw value.
    #[must_use]
    pub const fn as_f64(self) -> f64 {
        self.0
    }

    /// Returns true if this instant is never reached.
    #[must_use]
    pub fn is_infinite(self) -> bool {
        self.0.is_infinite()
    }

    /// Returns this instant shifted forward by `delta`.
    ///
    /// Non-finite or negative deltas saturate to `Time::INFINITY` and to
    /// `self` respectively, so the result is always a valid time.
    #[must_use]
    pub fn plus(self, delta: f64) -> Self {
        if delta.is_nan() {
            return Self::INFINITY;
        }
        if delta <= 0.0 {
            return self;
        }
        Self(self.0 + delta)
    }

    /// Returns the span between `earlier` and this instant, or zero if
    /// `earlier` is not actually earlier.
    #[must_use]
    pub fn since(self, earlier: Self) -> f64 {
        if self.0 <= earlier.0 {
            return 0.0;
        }
        self.0 - earlier.0
    }
}

impl Default for Time {
    fn default() -> Self {
        Self::ZERO
    }
}

impl PartialEq for Time {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Time {}

impl PartialOrd for Time {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Time {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

impl fmt::Display for Time {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<f64> for Time {
    type Error = ValidationError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Time> for f64 {
    fn from(time: Time) -> Self {
        time.0
    }
}
