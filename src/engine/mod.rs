//! The engine and its game definitions.
//!
//! - `GameDef`: setup function, action and phase registries, mask
//! - `Engine`: one authoritative instance running a `GameDef`
//! - `Snapshot`: state, phase stack and status at one version

mod executor;
mod game;
mod snapshot;

pub use executor::{Commit, Engine, GameStatus, Outcome};
pub use game::{GameDef, SetupContext};
pub use snapshot::{Snapshot, SnapshotError};
