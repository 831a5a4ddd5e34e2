//! Rebuilding engines from exported logs.
//!
//! The replayer reruns setup from the recorded seed, then every log entry
//! with its recorded random words, checking each recorded checkpoint along
//! the way. Any mismatch surfaces as `EngineError::ReplayDivergence`.

use std::sync::Arc;

use super::log::ReplayExport;
use crate::core::{EngineConfig, EngineError, GameState, Result};
use crate::engine::{Engine, GameDef, Snapshot};

/// Replays exported logs against a game definition.
pub struct Replayer<S> {
    game: Arc<GameDef<S>>,
    config: Option<EngineConfig>,
}

impl<S: GameState> Replayer<S> {
    pub fn new(game: impl Into<Arc<GameDef<S>>>) -> Self {
        Self {
            game: game.into(),
            config: None,
        }
    }

    /// Use these engine settings for rebuilt engines.
    ///
    /// Seed and player count always come from the export.
    #[must_use]
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Rebuild the engine at the export's final version.
    pub fn replay(&self, export: &ReplayExport) -> Result<Engine<S>> {
        self.replay_to(export, export.last_version())
    }

    /// Rebuild the engine as it stood at `version`.
    pub fn replay_to(&self, export: &ReplayExport, version: u64) -> Result<Engine<S>> {
        if export.game != self.game.name() {
            return Err(EngineError::ReplayDivergence {
                version: 0,
                reason: format!("log was recorded for game `{}`", export.game),
            });
        }
        if !EngineConfig::supports(export.player_count) {
            return Err(EngineError::ReplayDivergence {
                version: 0,
                reason: format!("log has unsupported player count {}", export.player_count),
            });
        }
        if version > export.last_version() {
            return Err(EngineError::ReplayDivergence {
                version,
                reason: format!("log ends at version {}", export.last_version()),
            });
        }

        let config = match &self.config {
            Some(config) => EngineConfig {
                player_count: export.player_count,
                seed: export.seed,
                ..config.clone()
            },
            None => EngineConfig::new(export.player_count).with_seed(export.seed),
        };

        let mut engine = Engine::new(Arc::clone(&self.game), config, export.setup.clone())?;
        verify_checkpoint(&engine, export)?;

        for entry in export.entries.iter().take_while(|e| e.sequence <= version) {
            engine.replay_entry(entry)?;
            verify_checkpoint(&engine, export)?;
        }

        tracing::debug!(game = %export.game, version = engine.version(), "replay complete");
        Ok(engine)
    }

    /// Replay up to the snapshot's version and compare.
    ///
    /// Returns the rebuilt engine when state, phase stack and status match.
    pub fn verify(&self, export: &ReplayExport, snapshot: &Snapshot<S>) -> Result<Engine<S>> {
        let engine = self.replay_to(export, snapshot.version)?;
        let rebuilt = engine.snapshot();

        let mismatch = if rebuilt.state != snapshot.state {
            Some("state")
        } else if rebuilt.phases != snapshot.phases {
            Some("phase stack")
        } else if rebuilt.status != snapshot.status {
            Some("status")
        } else {
            None
        };

        match mismatch {
            Some(what) => {
                tracing::error!(version = snapshot.version, mismatch = what, "snapshot does not match replay");
                Err(EngineError::ReplayDivergence {
                    version: snapshot.version,
                    reason: format!("{} differs from snapshot", what),
                })
            }
            None => Ok(engine),
        }
    }
}

fn verify_checkpoint<S: GameState>(engine: &Engine<S>, export: &ReplayExport) -> Result<()> {
    let Some(expected) = export.checkpoint_at(engine.version()) else {
        return Ok(());
    };
    let actual = engine.fingerprint().map_err(|e| EngineError::ReplayDivergence {
        version: engine.version(),
        reason: e.to_string(),
    })?;
    if actual != expected {
        tracing::error!(version = engine.version(), expected, actual, "checkpoint mismatch");
        return Err(EngineError::ReplayDivergence {
            version: engine.version(),
            reason: format!("fingerprint {:016x} != recorded {:016x}", actual, expected),
        });
    }
    Ok(())
}
