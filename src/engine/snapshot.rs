//! Point-in-time snapshots of an engine.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::executor::GameStatus;
use crate::phases::PhaseStack;

/// Snapshot encoding failures.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum SnapshotError {
    #[error("failed to encode snapshot: {0}")]
    Encode(String),

    #[error("failed to decode snapshot: {0}")]
    Decode(String),
}

/// State, phase stack and status at one version.
///
/// Canonical when taken with [`Engine::snapshot`], masked when taken with
/// [`Engine::view_snapshot`].
///
/// [`Engine::snapshot`]: super::Engine::snapshot
/// [`Engine::view_snapshot`]: super::Engine::view_snapshot
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Snapshot<S> {
    pub version: u64,
    pub status: GameStatus,
    pub phases: PhaseStack,
    pub state: S,
}

impl<S: Serialize> Snapshot<S> {
    /// Encode with `bincode`.
    pub fn to_bytes(&self) -> Result<Vec<u8>, SnapshotError> {
        bincode::serialize(self).map_err(|e| SnapshotError::Encode(e.to_string()))
    }
}

impl<S: serde::de::DeserializeOwned> Snapshot<S> {
    /// Decode a snapshot produced by [`to_bytes`](Self::to_bytes).
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SnapshotError> {
        bincode::deserialize(bytes).map_err(|e| SnapshotError::Decode(e.to_string()))
    }
}
