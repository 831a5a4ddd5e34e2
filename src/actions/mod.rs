//! Actions: the only way canonical state changes.
//!
//! - `ActionDef`: name, payload schema, optional authorize predicate, reducer
//! - `ActionContext`: what a reducer sees (draft state, RNG, phase info)
//! - `AuthContext`: what an authorization predicate sees
//! - `ActionRegistry`: name to `ActionId` resolution and type erasure

mod definition;
mod registry;

pub use definition::{ActionContext, ActionDef, AuthContext};
pub use registry::{ActionRegistry, Decoded, RegisteredAction};
