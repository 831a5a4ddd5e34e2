//! Masked patch streams for individual players.
//!
//! An [`ObserverFeed`] remembers the last masked view it sent to one player
//! and turns each engine advance into a patch over that masked view. The
//! first sync (or a sync after [`reset`](ObserverFeed::reset)) sends a full
//! snapshot. Patches are computed from masked trees only, so they never
//! carry anything the mask stripped.

use serde_json::Value;

use crate::core::{GameState, PlayerId};
use crate::engine::{Engine, Snapshot};
use crate::patch::{Patch, PatchEnvelope, PatchError};

/// What a feed has for its player.
#[derive(Clone, Debug, PartialEq)]
pub enum Update<S> {
    /// Full masked snapshot; the player's baseline.
    Snapshot(Snapshot<S>),
    /// Changes since the last update.
    Patch(PatchEnvelope),
    UpToDate,
}

/// Tracks what one player has been sent.
#[derive(Clone, Debug)]
pub struct ObserverFeed {
    player: PlayerId,
    sent: Option<(u64, Value)>,
}

impl ObserverFeed {
    #[must_use]
    pub fn new(player: PlayerId) -> Self {
        Self { player, sent: None }
    }

    #[must_use]
    pub fn player(&self) -> PlayerId {
        self.player
    }

    /// Version of the last update sent, if any.
    #[must_use]
    pub fn version(&self) -> Option<u64> {
        self.sent.as_ref().map(|(version, _)| *version)
    }

    /// Bring the player up to the engine's current version.
    pub fn sync<S: GameState>(&mut self, engine: &Engine<S>) -> Result<Update<S>, PatchError> {
        let version = engine.version();
        match self.sent.take() {
            None => {
                let snapshot = engine.view_snapshot(self.player);
                let tree = serde_json::to_value(&snapshot.state)?;
                self.sent = Some((version, tree));
                Ok(Update::Snapshot(snapshot))
            }
            Some((sent, tree)) if sent == version => {
                self.sent = Some((sent, tree));
                Ok(Update::UpToDate)
            }
            Some((sent, tree)) => {
                let next = serde_json::to_value(engine.view(self.player))?;
                let patch = Patch::diff(&tree, &next);
                self.sent = Some((version, next));
                Ok(Update::Patch(PatchEnvelope::new(sent, version, patch)))
            }
        }
    }

    /// Forget what was sent; the next sync sends a snapshot.
    pub fn reset(&mut self) {
        self.sent = None;
    }
}
