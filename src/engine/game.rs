//! Game definitions.
//!
//! A `GameDef` is everything game-specific: how to build the initial state,
//! which actions exist, the phase structure and the mask. It is immutable
//! once built and shared (behind an `Arc`) by every engine and replayer
//! running that game.

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::actions::{ActionDef, ActionRegistry};
use crate::core::{DrawSource, Fault, PlayerId};
use crate::phases::{PhaseDef, PhaseRegistry};
use crate::view::Projector;

/// What a setup function sees.
pub struct SetupContext<'a> {
    /// Randomness for dealing, shuffling and so on.
    pub rng: DrawSource<'a>,
    player_count: usize,
    descriptor: &'a Value,
}

impl<'a> SetupContext<'a> {
    pub(crate) fn new(rng: DrawSource<'a>, player_count: usize, descriptor: &'a Value) -> Self {
        Self {
            rng,
            player_count,
            descriptor,
        }
    }

    #[must_use]
    pub fn player_count(&self) -> usize {
        self.player_count
    }

    /// Every seat, in order.
    pub fn players(&self) -> impl Iterator<Item = PlayerId> {
        PlayerId::all(self.player_count)
    }

    /// The opaque initial-state descriptor.
    #[must_use]
    pub fn descriptor(&self) -> &'a Value {
        self.descriptor
    }

    /// Deserialize the descriptor into a typed value.
    pub fn parse_descriptor<T: DeserializeOwned>(&self) -> Result<T, Fault> {
        serde_json::from_value(self.descriptor.clone())
            .map_err(|e| Fault::new(format!("invalid setup descriptor: {}", e)))
    }
}

type SetupFn<S> = Box<dyn Fn(&mut SetupContext<'_>) -> Result<S, Fault> + Send + Sync>;

/// Complete declaration of one game.
///
/// The first registered phase is the root unless
/// [`with_root_phase`](Self::with_root_phase) picks another.
pub struct GameDef<S> {
    name: String,
    setup: SetupFn<S>,
    actions: ActionRegistry<S>,
    phases: PhaseRegistry<S>,
    root: Option<String>,
    projector: Projector<S>,
}

impl<S: Clone + 'static> GameDef<S> {
    pub fn new(
        name: impl Into<String>,
        setup: impl Fn(&mut SetupContext<'_>) -> Result<S, Fault> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            setup: Box::new(setup),
            actions: ActionRegistry::new(),
            phases: PhaseRegistry::new(),
            root: None,
            projector: Projector::identity(),
        }
    }

    /// Register an action. Panics on a duplicate name.
    #[must_use]
    pub fn with_action<P>(mut self, action: ActionDef<S, P>) -> Self
    where
        P: DeserializeOwned + 'static,
    {
        self.actions.register(action);
        self
    }

    /// Register a phase. Panics on a duplicate name.
    #[must_use]
    pub fn with_phase(mut self, phase: PhaseDef<S>) -> Self {
        if self.root.is_none() {
            self.root = Some(phase.name().to_string());
        }
        self.phases.register(phase);
        self
    }

    /// Enter `name` at game start instead of the first registered phase.
    #[must_use]
    pub fn with_root_phase(mut self, name: impl Into<String>) -> Self {
        self.root = Some(name.into());
        self
    }

    /// Install the per-player masking function.
    #[must_use]
    pub fn with_mask(mut self, mask: impl Fn(&S, PlayerId) -> S + Send + Sync + 'static) -> Self {
        self.projector = Projector::new(mask);
        self
    }
}

impl<S> GameDef<S> {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn actions(&self) -> &ActionRegistry<S> {
        &self.actions
    }

    #[must_use]
    pub fn phases(&self) -> &PhaseRegistry<S> {
        &self.phases
    }

    #[must_use]
    pub fn root_phase(&self) -> Option<&str> {
        self.root.as_deref()
    }

    #[must_use]
    pub fn projector(&self) -> &Projector<S> {
        &self.projector
    }

    pub(crate) fn setup(&self, ctx: &mut SetupContext<'_>) -> Result<S, Fault> {
        (self.setup)(ctx)
    }
}

impl<S> std::fmt::Debug for GameDef<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GameDef")
            .field("name", &self.name)
            .field("actions", &self.actions.len())
            .field("phases", &self.phases.len())
            .field("root", &self.root)
            .finish_non_exhaustive()
    }
}
