//! Live phase frames.
//!
//! A `PhaseFrame` is one entry on the phase stack: a phase definition
//! instantiated with its participants and per-entry progress. Frames are
//! plain data so the whole stack can be snapshotted and serialized.

use im::{OrdSet, Vector};
use serde::{Deserialize, Serialize};

use crate::core::PlayerId;

/// Unique identifier for a frame within one game instance.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FrameId(pub u32);

impl FrameId {
    /// Create a new frame ID.
    #[must_use]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for FrameId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Frame({})", self.0)
    }
}

/// A live instance of a phase on the stack.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseFrame {
    pub id: FrameId,

    /// Name of the phase definition this frame instantiates.
    pub phase: String,

    /// Whether participants act independently of one another.
    pub simultaneous: bool,

    /// Players admitted to the frame, in turn order.
    pub participants: Vector<PlayerId>,

    /// Whose turn it is (sequential frames only).
    pub active: Option<PlayerId>,

    /// Participants that have committed an action (simultaneous frames).
    pub acted: OrdSet<PlayerId>,

    /// Effective allowed actions, fixed at entry.
    pub allowed: OrdSet<String>,

    /// Turn counter within this frame, starting at 1.
    pub turn: u32,

    /// Engine version at which the frame was entered.
    pub entered_at: u64,
}

impl PhaseFrame {
    /// Check if an action name is legal in this frame.
    #[must_use]
    pub fn allows(&self, action: &str) -> bool {
        self.allowed.contains(action)
    }

    /// Check if a player was admitted to this frame.
    #[must_use]
    pub fn is_participant(&self, player: PlayerId) -> bool {
        self.participants.contains(&player)
    }

    /// Check if a participant has already acted.
    #[must_use]
    pub fn has_acted(&self, player: PlayerId) -> bool {
        self.acted.contains(&player)
    }

    /// Participants that still owe an action.
    pub fn pending(&self) -> impl Iterator<Item = PlayerId> + '_ {
        self.participants
            .iter()
            .copied()
            .filter(move |p| !self.acted.contains(p))
    }

    /// True once every participant has acted.
    #[must_use]
    pub fn all_acted(&self) -> bool {
        self.pending().next().is_none()
    }

    /// Whether `player` may act here under the default policy.
    ///
    /// Sequential: only the active player. Simultaneous: any participant
    /// that has not acted yet.
    #[must_use]
    pub fn may_act(&self, player: PlayerId) -> bool {
        if self.simultaneous {
            self.is_participant(player) && !self.has_acted(player)
        } else {
            self.active == Some(player)
        }
    }
}
