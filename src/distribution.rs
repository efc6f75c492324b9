//! Time distributions.
//!
//! A time distribution owns the next occurrence of one reaction. The reaction
//! asks it to recompute that instant after every update, passing the rate it
//! has just refreshed. How the rate itself is obtained is not the
//! distribution's business.

use std::fmt;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::environment::Environment;
use crate::error::{KernelResult, ValidationError};
use crate::time::Time;

/// Produces the next occurrence of a reaction.
pub trait TimeDistribution: fmt::Debug {
    /// The instant at which the reaction is next expected to fire.
    fn next_occurrence(&self) -> Time;

    /// Recomputes the next occurrence.
    ///
    /// `executed` is true when the owning reaction has just fired, false
    /// when the update is due to a dependency change.
    fn update(&mut self, now: Time, executed: bool, rate: f64, env: &Environment) -> KernelResult<()>;

    /// The configured base rate.
    fn rate(&self) -> f64;

    /// Builds an independent distribution with the same parameters.
    ///
    /// Takes `&mut self` so random distributions can derive a fresh stream
    /// from their own.
    fn clone_distribution(&mut self) -> Box<dyn TimeDistribution>;
}

fn validate_rate(rate: f64) -> Result<(), ValidationError> {
    if !rate.is_finite() || rate < 0.0 {
        return Err(ValidationError::InvalidRate { value: rate });
    }
    Ok(())
}

/// Negative-exponential waiting times: the reaction is a Poisson process.
///
/// The first update draws a fresh waiting time. Later updates draw again
/// when the reaction fired or was disabled, and otherwise rescale the
/// residual waiting time by `old_rate / new_rate`, which keeps the process
/// statistically exact without consuming random numbers.
#[derive(Debug, Clone)]
pub struct ExponentialTime {
    rate: f64,
    tau: Time,
    last_rate: Option<f64>,
    rng: ChaCha8Rng,
}

impl ExponentialTime {
    /// Creates a distribution with the given base rate and random seed.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::InvalidRate` for negative or non-finite rates.
    pub fn new(rate: f64, seed: u64) -> Result<Self, ValidationError> {
        validate_rate(rate)?;
        Ok(Self {
            rate,
            tau: Time::INFINITY,
            last_rate: None,
            rng: ChaCha8Rng::seed_from_u64(seed),
        })
    }

    fn draw(&mut self, now: Time, rate: f64) {
        let u: f64 = self.rng.gen();
        self.tau = now.plus(-(1.0 - u).ln() / rate);
    }
}

impl TimeDistribution for ExponentialTime {
    fn next_occurrence(&self) -> Time {
        self.tau
    }

    fn update(&mut self, now: Time, executed: bool, rate: f64, _env: &Environment) -> KernelResult<()> {
        validate_rate(rate)?;
        if rate == 0.0 {
            self.tau = Time::INFINITY;
        } else {
            match self.last_rate {
                Some(old) if old > 0.0 && !executed && !self.tau.is_infinite() => {
                    if (old - rate).abs() > f64::EPSILON * old.max(rate) {
                        let residual = self.tau.since(now) * old / rate;
                        self.tau = now.plus(residual);
                    }
                }
                _ => self.draw(now, rate),
            }
        }
        self.last_rate = Some(rate);
        Ok(())
    }

    fn rate(&self) -> f64 {
        self.rate
    }

    fn clone_distribution(&mut self) -> Box<dyn TimeDistribution> {
        let seed: u64 = self.rng.gen();
        Box::new(Self {
            rate: self.rate,
            tau: Time::INFINITY,
            last_rate: None,
            rng: ChaCha8Rng::seed_from_u64(seed),
        })
    }
}

/// Deterministic, evenly spaced occurrences.
///
/// The teeth sit at `start + k * period`. An update at a `now` past the
/// pending tooth moves it to the first tooth at or after `now`, so a comb
/// cloned into a running simulation joins the schedule where it stands
/// instead of replaying the missed teeth.
#[derive(Debug, Clone)]
pub struct DiracComb {
    period: f64,
    start: Time,
    tau: Time,
}

impl DiracComb {
    /// Fires at `start`, then every `1 / rate`.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::InvalidRate` unless `rate` is finite and
    /// strictly positive.
    pub fn new(rate: f64, start: Time) -> Result<Self, ValidationError> {
        if !rate.is_finite() || rate <= 0.0 {
            return Err(ValidationError::InvalidRate { value: rate });
        }
        Ok(Self {
            period: 1.0 / rate,
            start,
            tau: start,
        })
    }

    /// Fires at `start`, then every `period`.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::InvalidPeriod` unless `period` is finite and
    /// strictly positive.
    pub fn with_period(period: f64, start: Time) -> Result<Self, ValidationError> {
        if !period.is_finite() || period <= 0.0 {
            return Err(ValidationError::InvalidPeriod { value: period });
        }
        Ok(Self {
            period,
            start,
            tau: start,
        })
    }
}

impl TimeDistribution for DiracComb {
    fn next_occurrence(&self) -> Time {
        self.tau
    }

    fn update(&mut self, now: Time, executed: bool, _rate: f64, _env: &Environment) -> KernelResult<()> {
        if executed {
            self.tau = self.tau.plus(self.period);
        }
        if self.tau < now {
            let missed = (now.since(self.tau) / self.period).ceil();
            self.tau = self.tau.plus(missed * self.period);
            // Rounding may leave the tooth a hair short of `now`.
            if self.tau < now {
                self.tau = self.tau.plus(self.period);
            }
        }
        Ok(())
    }

    fn rate(&self) -> f64 {
        1.0 / self.period
    }

    fn clone_distribution(&mut self) -> Box<dyn TimeDistribution> {
        Box::new(Self {
            period: self.period,
            start: self.start,
            tau: self.start,
        })
    }
}

/// A single occurrence at a fixed instant.
///
/// The rate is meaningless for a one-shot event and reported as zero. A
/// trigger updated after its instant has passed never fires.
#[derive(Debug, Clone)]
pub struct Trigger {
    at: Time,
    fired: bool,
}

impl Trigger {
    /// Fires once at `at`.
    #[must_use]
    pub const fn new(at: Time) -> Self {
        Self { at, fired: false }
    }
}

impl TimeDistribution for Trigger {
    fn next_occurrence(&self) -> Time {
        if self.fired {
            Time::INFINITY
        } else {
            self.at
        }
    }

    fn update(&mut self, now: Time, executed: bool, _rate: f64, _env: &Environment) -> KernelResult<()> {
        if executed || self.at < now {
            self.fired = true;
        }
        Ok(())
    }

    fn rate(&self) -> f64 {
        0.0
    }

    fn clone_distribution(&mut self) -> Box<dyn TimeDistribution> {
        Box::new(Self::new(self.at))
    }
}
