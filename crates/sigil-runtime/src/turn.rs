//! Turn controller — counts model round-trips against the configured limit.
//!
//! A *turn* is one full model round-trip. A single response may emit many
//! think/respond/call events and still count as one turn: the counter
//! advances exactly once per completed tool-result-to-next-request
//! transition, never per event.

use crate::errors::EngineError;
use crate::types::Mode;

/// Iteration accounting for one run.
#[derive(Clone, Copy, Debug)]
pub struct IterationState {
    mode: Mode,
    turn_count: u32,
    max_iterations: u32,
}

impl IterationState {
    /// Create state for a fresh run.
    #[must_use]
    pub fn new(mode: Mode, max_iterations: u32) -> Self {
        Self {
            mode,
            turn_count: 0,
            max_iterations,
        }
    }

    /// Record a tool-result-to-next-request transition.
    ///
    /// With `max_iterations = N`, a flow needing exactly N round-trips
    /// completes (N - 1 transitions all pass); one needing N + 1 fails
    /// here on its Nth transition. Exceeding the limit is fatal, not a
    /// recoverable result.
    pub fn begin_round_trip(&mut self) -> Result<(), EngineError> {
        self.turn_count += 1;
        if self.turn_count >= self.max_iterations {
            Err(EngineError::IterationLimit {
                limit: self.max_iterations,
            })
        } else {
            Ok(())
        }
    }

    /// Completed transitions so far.
    #[must_use]
    pub fn turn_count(&self) -> u32 {
        self.turn_count
    }

    /// The configured limit.
    #[must_use]
    pub fn max_iterations(&self) -> u32 {
        self.max_iterations
    }

    /// The run's operating mode.
    #[must_use]
    pub fn mode(&self) -> Mode {
        self.mode
    }
}
