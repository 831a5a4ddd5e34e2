//! Core engine types: players, RNG, configuration, state bound, errors.
//!
//! Everything here is game-agnostic. Games describe themselves through a
//! [`GameDef`](crate::engine::GameDef) rather than modifying the core.

pub mod action;
pub mod config;
pub mod error;
pub mod player;
pub mod rng;
pub mod state;

pub use action::{ActionId, Submission};
pub use config::EngineConfig;
pub use error::{EngineError, Fault, Result};
pub use player::{PlayerId, PlayerMap};
pub use rng::{DrawMismatch, DrawSource, Draws, GameRng, GameRngState};
pub use state::{fingerprint, GameState};
