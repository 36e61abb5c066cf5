//! Error types for the relay.
//!
//! Capability errors (`CollectorError`, `ClassifyError`, `SynthesisError`)
//! are recovered inside a run; only [`PipelineError`] reaches callers.
//! Config loading and the binary use `anyhow` on top of these.

use crate::pipeline::RunReport;

/// A collector could not produce a result list.
#[derive(Debug, thiserror::Error)]
pub enum CollectorError {
    #[error("no collector registered for source '{0}'")]
    UnknownSource(String),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("upstream returned status {0}")]
    Status(u16),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("timed out after {0:?}")]
    Timeout(std::time::Duration),
}

impl CollectorError {
    pub fn parse(msg: impl std::fmt::Display) -> Self {
        Self::Parse(msg.to_string())
    }
}

/// Chat backend failure (transport, status, payload or disabled provider).
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("llm backend disabled")]
    Disabled,

    #[error("llm http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("llm returned status {0}")]
    Status(u16),

    #[error("llm returned an empty completion")]
    Empty,
}

/// The classifier could not name a source.
#[derive(Debug, thiserror::Error)]
pub enum ClassifyError {
    #[error(transparent)]
    Llm(#[from] LlmError),

    #[error("malformed classifier response: {0}")]
    Malformed(String),

    #[error("classifier timed out after {0:?}")]
    Timeout(std::time::Duration),
}

/// The synthesis capability failed after items were collected.
#[derive(Debug, thiserror::Error)]
pub enum SynthesisError {
    #[error(transparent)]
    Llm(#[from] LlmError),

    #[error("synthesis timed out after {0:?}")]
    Timeout(std::time::Duration),
}

/// Misuse of the controller state machine.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StateError {
    #[error("run has not started attempting a source")]
    NotStarted,

    #[error("run already reached a terminal state")]
    Terminal,

    #[error("run has not reached a terminal state")]
    NotTerminal,
}

/// Errors surfaced by [`crate::pipeline::Pipeline::run`].
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Items were collected but could not be synthesized. `degraded`
    /// carries the raw items and an unsynthesized listing.
    #[error("synthesis failed: {error}")]
    Synthesis {
        error: SynthesisError,
        degraded: Box<RunReport>,
    },

    #[error("run cancelled")]
    Cancelled,

    #[error(transparent)]
    State(#[from] StateError),
}
