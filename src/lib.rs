//! # turnkit
//!
//! A deterministic, authoritative state-transition engine for
//! turn-structured multiplayer games.
//!
//! ## Design Principles
//!
//! 1. **Actions Are the Only Writers**: Canonical state changes only by
//!    committing a validated, authorized action through its reducer.
//!
//! 2. **Deterministic Replay**: Every random word a reducer consumes is
//!    recorded in the log, so seed plus log rebuilds any version exactly.
//!
//! 3. **Players See Masked State**: Views and patches are computed from the
//!    game's mask, never from canonical state.
//!
//! ## Architecture
//!
//! - **Phase Stack**: Nested sub-phases push onto a persistent `im::Vector`
//!   and pop back to the exact parent frame.
//!
//! - **Draft Reduction**: Reducers run against a clone of the state; the
//!   clone replaces canonical state only when the whole transition succeeds.
//!
//! - **Structural Patches**: Each commit yields a JSON patch between
//!   consecutive versions; patches compose across version gaps.
//!
//! ## Modules
//!
//! - `core`: Players, RNG, configuration, errors, the state bound
//! - `schema`: Payload shapes and validation
//! - `actions`: Action definitions, contexts and the registry
//! - `phases`: Phase templates, frames and the phase stack
//! - `patch`: Structural diffs between versions
//! - `view`: Masks, cached views, per-player observer feeds
//! - `replay`: Action log, exports and the replayer
//! - `engine`: Game definitions and the engine itself

pub mod actions;
pub mod core;
pub mod engine;
pub mod patch;
pub mod phases;
pub mod replay;
pub mod schema;
pub mod view;

// `DrawSource` implements `rand::RngCore`; games sample through this version.
pub use rand;

// Re-export commonly used types
pub use crate::core::{
    ActionId, DrawSource, EngineConfig, EngineError, Fault, GameRng, GameState, PlayerId,
    PlayerMap, Submission,
};

pub use crate::schema::{Schema, SchemaError};

pub use crate::actions::{ActionContext, ActionDef, AuthContext};

pub use crate::phases::{PhaseDef, PhaseFrame, PhaseRequest, PhaseTransition};

pub use crate::patch::{Patch, PatchEnvelope, PatchOp};

pub use crate::view::{conceal, conceal_unless, ObserverFeed, Projector, Redact, Visibility};

pub use crate::replay::{ActionLog, ReplayExport, Replayer};

pub use crate::engine::{Commit, Engine, GameDef, GameStatus, Outcome, SetupContext, Snapshot};
