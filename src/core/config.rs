//! Engine configuration.
//!
//! Game *rules* live in a [`GameDef`](crate::engine::GameDef); this is the
//! per-instance knob set: how many seats, which seed, and how much history
//! the engine keeps around.

use serde::{Deserialize, Serialize};

/// Default bound on phase pushes/pops triggered by a single transition.
pub const DEFAULT_MAX_PHASE_TRANSITIONS: usize = 64;

/// Default number of versions between recorded state fingerprints.
pub const DEFAULT_CHECKPOINT_INTERVAL: u64 = 16;

/// Seats are addressed by a `u8`.
pub const MAX_PLAYERS: usize = 255;

/// Per-instance engine configuration.
///
/// ## Example
///
/// ```
/// use turnkit::core::EngineConfig;
///
/// let config = EngineConfig::new(4)
///     .with_seed(7)
///     .with_checkpoint_interval(8);
///
/// assert_eq!(config.player_count, 4);
/// assert_eq!(config.seed, 7);
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Number of players (1-255).
    pub player_count: usize,

    /// Seed for the instance's RNG.
    pub seed: u64,

    /// Maximum phase transitions settled after one log entry.
    ///
    /// Exceeding it means the game's end conditions keep firing, which is
    /// treated as a reducer fault.
    pub max_phase_transitions: usize,

    /// Record a state fingerprint every N versions (0 disables).
    pub checkpoint_interval: u64,

    /// Keep every canonical patch so observers can catch up by version.
    pub record_patches: bool,
}

impl EngineConfig {
    /// Create a configuration with defaults for the given player count.
    pub fn new(player_count: usize) -> Self {
        assert!(Self::supports(player_count), "Player count must be 1-{}", MAX_PLAYERS);

        Self {
            player_count,
            seed: 0,
            max_phase_transitions: DEFAULT_MAX_PHASE_TRANSITIONS,
            checkpoint_interval: DEFAULT_CHECKPOINT_INTERVAL,
            record_patches: true,
        }
    }

    /// Whether `player_count` seats can be addressed.
    #[must_use]
    pub fn supports(player_count: usize) -> bool {
        (1..=MAX_PLAYERS).contains(&player_count)
    }

    /// Set the RNG seed.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Set the phase transition bound.
    #[must_use]
    pub fn with_max_phase_transitions(mut self, max: usize) -> Self {
        self.max_phase_transitions = max;
        self
    }

    /// Set the checkpoint interval (0 disables periodic checkpoints).
    #[must_use]
    pub fn with_checkpoint_interval(mut self, interval: u64) -> Self {
        self.checkpoint_interval = interval;
        self
    }

    /// Enable or disable the in-memory patch history.
    #[must_use]
    pub fn with_patch_history(mut self, enabled: bool) -> Self {
        self.record_patches = enabled;
        self
    }

    /// Whether a checkpoint is due at `version`.
    #[must_use]
    pub fn checkpoint_due(&self, version: u64) -> bool {
        self.checkpoint_interval > 0 && version % self.checkpoint_interval == 0
    }
}
