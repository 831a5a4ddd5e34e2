//! Engine error kinds.
//!
//! Routine rejections (`SchemaInvalid`, `Unauthorized`, `IllegalInPhase`,
//! `UnknownAction`, `GameOver`) leave the engine exactly as it was and go
//! back to the submitting player. `ReducerFault` and `ReplayDivergence` are
//! fatal: the instance halts and later input is refused with `Halted`.
//!
//! A resubmitted idempotency token is not an error at all; see
//! [`Outcome::Duplicate`](crate::engine::Outcome::Duplicate).

use thiserror::Error;

use super::player::PlayerId;
use crate::schema::SchemaError;

/// Errors surfaced by the engine.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum EngineError {
    #[error("payload for `{action}` is invalid: {source}")]
    SchemaInvalid {
        action: String,
        #[source]
        source: SchemaError,
    },

    #[error("{player} may not perform `{action}` in phase `{phase}`")]
    Unauthorized {
        action: String,
        player: PlayerId,
        phase: String,
    },

    #[error("action `{action}` is not allowed in phase `{phase}`")]
    IllegalInPhase { action: String, phase: String },

    #[error("unknown action `{0}`")]
    UnknownAction(String),

    #[error("unknown phase `{0}`")]
    UnknownPhase(String),

    #[error("game is over")]
    GameOver,

    #[error("reducer for `{action}` faulted: {reason}")]
    ReducerFault { action: String, reason: String },

    #[error("replay diverged at version {version}: {reason}")]
    ReplayDivergence { version: u64, reason: String },

    #[error("engine halted after a fatal error")]
    Halted,
}

impl EngineError {
    /// Fatal errors halt the instance and must reach an operator.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            EngineError::ReducerFault { .. } | EngineError::ReplayDivergence { .. }
        )
    }

    /// Routine rejections are expected outcomes reported to the submitter.
    #[must_use]
    pub fn is_rejection(&self) -> bool {
        !self.is_fatal() && !matches!(self, EngineError::Halted)
    }
}

/// A logic fault raised by a reducer.
///
/// Returning one aborts the transition; the engine rolls back and halts.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct Fault(pub String);

impl Fault {
    /// Create a fault with a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        let fault = EngineError::ReducerFault {
            action: "play".into(),
            reason: "boom".into(),
        };
        let divergence = EngineError::ReplayDivergence {
            version: 3,
            reason: "fingerprint".into(),
        };

        assert!(fault.is_fatal());
        assert!(divergence.is_fatal());
        assert!(!EngineError::GameOver.is_fatal());
        assert!(EngineError::GameOver.is_rejection());
        assert!(!EngineError::Halted.is_rejection());
    }

    #[test]
    fn test_display() {
        let err = EngineError::IllegalInPhase {
            action: "draw".into(),
            phase: "discard".into(),
        };
        assert_eq!(err.to_string(), "action `draw` is not allowed in phase `discard`");

        let err = EngineError::Unauthorized {
            action: "play".into(),
            player: PlayerId::new(1),
            phase: "main".into(),
        };
        assert_eq!(err.to_string(), "Player 1 may not perform `play` in phase `main`");
    }
}
