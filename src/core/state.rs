//! Canonical state bound and fingerprinting.
//!
//! The engine is generic over the game's state type. Anything cloneable,
//! comparable and serde-serializable qualifies; games that clone large
//! states often should build them from `im` collections so the draft copy
//! taken for each reduction is O(1).

use std::hash::Hasher;

use rustc_hash::FxHasher;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Bound satisfied by every canonical game state.
///
/// Patches and exports go through `serde_json`, so a state must also
/// survive a JSON round trip unchanged. Map keys must serialize as strings:
/// a `BTreeMap<(u8, u8), _>` satisfies the bound but cannot be encoded.
/// `Engine::new` checks the initial state and fails setup otherwise.
pub trait GameState:
    Clone + PartialEq + std::fmt::Debug + Serialize + DeserializeOwned + Send + Sync + 'static
{
}

impl<T> GameState for T where
    T: Clone + PartialEq + std::fmt::Debug + Serialize + DeserializeOwned + Send + Sync + 'static
{
}

/// Stable 64-bit fingerprint of a state's binary encoding.
///
/// `FxHasher` is unseeded, so the value is identical across processes.
/// States holding hash maps should use ordered maps (or `im::OrdMap`) so
/// equal states encode identically.
pub fn fingerprint<S: Serialize>(state: &S) -> Result<u64, bincode::Error> {
    let bytes = bincode::serialize(state)?;
    let mut hasher = FxHasher::default();
    hasher.write(&bytes);
    Ok(hasher.finish())
}
