//! Request lifecycle state machine.
//!
//! ```text
//!                      ┌──▶ Validated ──▶ Describing ──▶ Generating ──┐
//!  Received ──┤                                                       ├──▶ Complete
//!                      └──▶ Extracting ──▶ Decoding ──▶ Transcribing ─┘
//!
//!  (any non-terminal state) ──▶ Failed(reason)
//! ```
//!
//! [`StateMachine`] enforces the table: every advance is checked, so a stage
//! can never be skipped or revisited.  `Complete` and `Failed` are terminal.

use thiserror::Error;

// ---------------------------------------------------------------------------
// RequestState
// ---------------------------------------------------------------------------

/// Where a request currently is in the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestState {
    Received,
    /// Passed the safety gate (music path only).
    Validated,
    Describing,
    Generating,
    Extracting,
    Decoding,
    Transcribing,
    Complete,
    /// Terminal failure with a human-readable reason.
    Failed(String),
}

impl RequestState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RequestState::Complete | RequestState::Failed(_))
    }

    /// Stable lowercase label for logs.
    pub fn label(&self) -> &'static str {
        match self {
            RequestState::Received => "received",
            RequestState::Validated => "validated",
            RequestState::Describing => "describing",
            RequestState::Generating => "generating",
            RequestState::Extracting => "extracting",
            RequestState::Decoding => "decoding",
            RequestState::Transcribing => "transcribing",
            RequestState::Complete => "complete",
            RequestState::Failed(_) => "failed",
        }
    }
}

// ---------------------------------------------------------------------------
// StateMachine
// ---------------------------------------------------------------------------

#[derive(Debug, Error, PartialEq)]
#[error("invalid state transition: {from} -> {to}")]
pub struct InvalidTransition {
    pub from: &'static str,
    pub to: &'static str,
}

/// Tracks one request's state and rejects illegal advances.
#[derive(Debug)]
pub struct StateMachine {
    state: RequestState,
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl StateMachine {
    pub fn new() -> Self {
        Self {
            state: RequestState::Received,
        }
    }

    pub fn state(&self) -> &RequestState {
        &self.state
    }

    /// Move to `next` if the table allows it.
    pub fn advance(&mut self, next: RequestState) -> Result<(), InvalidTransition> {
        if !Self::allowed(&self.state, &next) {
            return Err(InvalidTransition {
                from: self.state.label(),
                to: next.label(),
            });
        }
        log::debug!("state {} -> {}", self.state.label(), next.label());
        self.state = next;
        Ok(())
    }

    fn allowed(from: &RequestState, to: &RequestState) -> bool {
        use RequestState::*;

        // Any non-terminal state may fail.
        if matches!(to, Failed(_)) {
            return !from.is_terminal();
        }

        matches!(
            (from, to),
            (Received, Validated)
                | (Received, Extracting)
                | (Validated, Describing)
                | (Describing, Generating)
                | (Generating, Complete)
                | (Extracting, Decoding)
                | (Decoding, Transcribing)
                | (Transcribing, Complete)
        )
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
