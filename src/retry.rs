//! Repeat-until-success driver for postselected algorithms.
//!
//! A failed attempt leaves the registers in a state that cannot be cheaply
//! repaired, so every attempt runs on a fresh [`Engine`] and failure discards
//! the whole thing.

use tracing::{debug, trace};

use crate::engine::{Engine, EngineConfig};
use crate::error::{Result, SimError};

pub struct RetryController {
    max_attempts: Option<u64>,
    attempts: u64,
}

impl RetryController {
    /// `None` retries without bound; `Some(n)` fails with
    /// [`SimError::RetryExhausted`] after `n` unsuccessful attempts.
    pub fn new(max_attempts: Option<u64>) -> Self {
        Self {
            max_attempts,
            attempts: 0,
        }
    }

    /// Attempts taken by the most recent [`RetryController::run_until_success`].
    pub fn attempts(&self) -> u64 {
        self.attempts
    }

    /// Runs `attempt` on fresh engines until it reports success.
    ///
    /// The closure allocates its own registers, runs the circuit (compute
    /// scope, rotations, uncompute, ancilla measurement) and returns
    /// `Ok(Some(value))` on success or `Ok(None)` to discard and retry. The
    /// successful engine is returned alongside the value so the caller can
    /// inspect the postselected state. When the config carries a seed, each
    /// attempt derives its own so retries are deterministic yet distinct.
    pub fn run_until_success<T, F>(&mut self, config: &EngineConfig, mut attempt: F) -> Result<(Engine, T)>
    where
        F: FnMut(&mut Engine) -> Result<Option<T>>,
    {
        self.attempts = 0;
        loop {
            if let Some(max) = self.max_attempts {
                if self.attempts >= max {
                    debug!(attempts = self.attempts, "retry budget exhausted");
                    return Err(SimError::RetryExhausted {
                        attempts: self.attempts,
                    });
                }
            }

            let mut attempt_config = config.clone();
            if let Some(seed) = attempt_config.seed {
                attempt_config.seed = Some(seed.wrapping_add(self.attempts));
            }
            let mut engine = Engine::new(attempt_config);
            self.attempts += 1;

            match attempt(&mut engine)? {
                Some(value) => {
                    debug!(attempts = self.attempts, "postselection succeeded");
                    return Ok((engine, value));
                }
                None => {
                    trace!(attempt = self.attempts, "postselection failed, discarding");
                }
            }
        }
    }
}
