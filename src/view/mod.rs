//! What each player is allowed to see.
//!
//! - `Projector`: applies the game's mask to canonical state
//! - `ViewCache`: masked views shared per version
//! - `ObserverFeed`: per-player snapshots and patches over masked views

mod cache;
mod mask;
mod observer;

pub use cache::ViewCache;
pub use mask::{conceal, conceal_unless, Projector, Redact, Visibility};
pub use observer::{ObserverFeed, Update};
