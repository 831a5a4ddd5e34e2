//! Per-version cache of masked views.

use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::core::{GameState, PlayerId};
use crate::engine::Engine;

/// Masked views of one engine, valid for a single version.
///
/// Moving to a new version drops every cached view.
#[derive(Debug)]
pub struct ViewCache<S> {
    version: Option<u64>,
    views: FxHashMap<PlayerId, Arc<S>>,
}

impl<S> Default for ViewCache<S> {
    fn default() -> Self {
        Self {
            version: None,
            views: FxHashMap::default(),
        }
    }
}

impl<S: GameState> ViewCache<S> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// `player`'s view of the engine's current version.
    pub fn view(&mut self, engine: &Engine<S>, player: PlayerId) -> Arc<S> {
        if self.version != Some(engine.version()) {
            self.views.clear();
            self.version = Some(engine.version());
        }
        Arc::clone(
            self.views
                .entry(player)
                .or_insert_with(|| Arc::new(engine.view(player))),
        )
    }

    /// Version the cached views belong to.
    #[must_use]
    pub fn version(&self) -> Option<u64> {
        self.version
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.views.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.views.is_empty()
    }

    pub fn clear(&mut self) {
        self.version = None;
        self.views.clear();
    }
}
