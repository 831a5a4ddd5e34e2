//! Action identifiers and the submission message.
//!
//! Games name their actions with strings; the registry resolves each name
//! once to a dense `ActionId`. A `Submission` is what arrives from the
//! transport: the action name, its raw JSON payload, the acting player and
//! an optional idempotency token.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::player::PlayerId;

/// Dense action identifier assigned at registration.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActionId(pub u16);

impl ActionId {
    /// Create a new action ID.
    #[must_use]
    pub const fn new(id: u16) -> Self {
        Self(id)
    }

    /// Get the raw ID value.
    #[must_use]
    pub const fn raw(self) -> u16 {
        self.0
    }
}

impl std::fmt::Display for ActionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Action({})", self.0)
    }
}

/// An action submitted by (or on behalf of) a player.
///
/// ## Example
///
/// ```
/// use serde_json::json;
/// use turnkit::core::{PlayerId, Submission};
///
/// let submission = Submission::new("playCard", json!({ "card": "A" }), PlayerId::new(0))
///     .with_client_id("c-17");
///
/// assert_eq!(submission.client_action_id.as_deref(), Some("c-17"));
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Submission {
    /// Registered action name.
    pub action: String,

    /// Raw payload, validated against the action's schema.
    pub payload: Value,

    /// The acting player.
    pub player: PlayerId,

    /// Idempotency token; a repeat for the same player is a no-op.
    pub client_action_id: Option<String>,
}

impl Submission {
    /// Create a submission without an idempotency token.
    pub fn new(action: impl Into<String>, payload: Value, player: PlayerId) -> Self {
        Self {
            action: action.into(),
            payload,
            player,
            client_action_id: None,
        }
    }

    /// Attach an idempotency token.
    #[must_use]
    pub fn with_client_id(mut self, id: impl Into<String>) -> Self {
        self.client_action_id = Some(id.into());
        self
    }
}
