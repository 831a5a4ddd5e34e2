//! Structural patches between state versions.
//!
//! States are compared through their `serde_json` tree. A [`Patch`] is an
//! ordered list of `add` / `remove` / `replace` operations addressed by
//! pointer-style paths; applying it to the serialized prior state yields the
//! serialized new state. Patches compose by concatenation.
//!
//! ## Example
//!
//! ```
//! use serde_json::json;
//! use turnkit::patch::Patch;
//!
//! let before = json!({ "hand": ["A", "B"], "score": 1 });
//! let after = json!({ "hand": ["A"], "score": 2 });
//!
//! let patch = Patch::diff(&before, &after);
//! let mut value = before.clone();
//! patch.apply(&mut value).unwrap();
//! assert_eq!(value, after);
//! ```

mod apply;
mod diff;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use smallvec::SmallVec;
use thiserror::Error;

/// One step in a patch path.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PathSegment {
    Index(usize),
    Key(String),
}

impl std::fmt::Display for PathSegment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PathSegment::Index(i) => write!(f, "{}", i),
            PathSegment::Key(k) => f.write_str(&escape_key(k)),
        }
    }
}

/// Escape an object key as one pointer token (`~` is `~0`, `/` is `~1`).
pub(crate) fn escape_key(key: &str) -> String {
    key.replace('~', "~0").replace('/', "~1")
}

/// Location inside a serialized state. Empty is the root.
pub type Path = SmallVec<[PathSegment; 4]>;

/// Render a path as a pointer string (`/hands/1/0`).
pub fn pointer(path: &[PathSegment]) -> String {
    path.iter().map(|s| format!("/{}", s)).collect()
}

/// A single patch operation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum PatchOp {
    /// Insert a key, or insert into an array at an index (`len` appends).
    Add { path: Path, value: Value },
    Remove { path: Path },
    Replace { path: Path, value: Value },
}

impl PatchOp {
    #[must_use]
    pub fn path(&self) -> &[PathSegment] {
        match self {
            PatchOp::Add { path, .. } | PatchOp::Remove { path } | PatchOp::Replace { path, .. } => path,
        }
    }
}

/// Patch application failures.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum PatchError {
    #[error("path {0} does not exist")]
    PathNotFound(String),

    #[error("path {path} expected {expected}")]
    TypeMismatch { path: String, expected: &'static str },

    #[error("index {index} out of bounds at {path} (len {len})")]
    IndexOutOfBounds { path: String, index: usize, len: usize },

    #[error("cannot remove the document root")]
    RemoveRoot,

    #[error("envelopes are not contiguous: expected version {expected}, found {found}")]
    NotContiguous { expected: u64, found: u64 },

    #[error("serialization error: {0}")]
    Serde(String),
}

impl From<serde_json::Error> for PatchError {
    fn from(err: serde_json::Error) -> Self {
        PatchError::Serde(err.to_string())
    }
}

/// Ordered list of operations turning one tree into another.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Patch {
    pub ops: Vec<PatchOp>,
}

impl Patch {
    /// Create an empty patch.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Diff two serializable states.
    pub fn between<S: Serialize>(before: &S, after: &S) -> Result<Self, PatchError> {
        let before = serde_json::to_value(before)?;
        let after = serde_json::to_value(after)?;
        Ok(Self::diff(&before, &after))
    }

    /// Apply to a typed state, returning the patched copy.
    pub fn apply_to<S>(&self, state: &S) -> Result<S, PatchError>
    where
        S: Serialize + DeserializeOwned,
    {
        let mut value = serde_json::to_value(state)?;
        self.apply(&mut value)?;
        Ok(serde_json::from_value(value)?)
    }

    /// Concatenate: applying the result equals applying `self` then `next`.
    #[must_use]
    pub fn compose(mut self, next: Patch) -> Self {
        self.ops.extend(next.ops);
        self
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.ops.len()
    }
}

/// A patch tagged with the versions it connects.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PatchEnvelope {
    pub from_version: u64,
    pub to_version: u64,
    pub patch: Patch,
}

impl PatchEnvelope {
    #[must_use]
    pub fn new(from_version: u64, to_version: u64, patch: Patch) -> Self {
        Self {
            from_version,
            to_version,
            patch,
        }
    }

    /// Merge with the envelope that directly follows this one.
    pub fn compose(self, next: PatchEnvelope) -> Result<Self, PatchError> {
        if next.from_version != self.to_version {
            return Err(PatchError::NotContiguous {
                expected: self.to_version,
                found: next.from_version,
            });
        }
        Ok(Self {
            from_version: self.from_version,
            to_version: next.to_version,
            patch: self.patch.compose(next.patch),
        })
    }
}
