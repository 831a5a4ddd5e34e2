//! The ordered action log and its export format.
//!
//! Every committed transition appends exactly one [`LogEntry`], including
//! operator hooks. Together with the seed and the setup descriptor the log
//! fully determines the canonical-state history.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::{Draws, PlayerId};

/// What a log entry did.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EntryKind {
    /// A submitted (or injected) action.
    Action {
        action: String,
        payload: Value,
        client_action_id: Option<String>,
        injected: bool,
    },
    /// Operator hook: the top frame was popped.
    ForceEndPhase,
    /// Operator hook: the game was ended.
    Terminate,
}

/// One committed transition.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Version produced by this entry (the first entry is 1).
    pub sequence: u64,

    /// Acting player; `None` for operator hooks.
    pub player: Option<PlayerId>,

    pub kind: EntryKind,

    /// Random words the reducer consumed, in order.
    pub draws: Draws,
}

impl LogEntry {
    /// Action name, if this entry is an action.
    #[must_use]
    pub fn action(&self) -> Option<&str> {
        match &self.kind {
            EntryKind::Action { action, .. } => Some(action),
            _ => None,
        }
    }
}

/// A state fingerprint recorded at a version.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub version: u64,
    pub fingerprint: u64,
}

/// Append-only log with an idempotency index.
#[derive(Clone, Debug, Default)]
pub struct ActionLog {
    entries: Vec<LogEntry>,
    client_ids: FxHashMap<(PlayerId, String), u64>,
}

impl ActionLog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a log (and its index) from exported entries.
    pub fn from_entries(entries: impl IntoIterator<Item = LogEntry>) -> Self {
        let mut log = Self::new();
        for entry in entries {
            log.push(entry);
        }
        log
    }

    pub fn push(&mut self, entry: LogEntry) {
        if let (Some(player), EntryKind::Action { client_action_id: Some(id), .. }) = (entry.player, &entry.kind) {
            self.client_ids.insert((player, id.clone()), entry.sequence);
        }
        self.entries.push(entry);
    }

    /// Sequence of the entry that already carries this token.
    #[must_use]
    pub fn find_client_id(&self, player: PlayerId, id: &str) -> Option<u64> {
        self.client_ids.get(&(player, id.to_string())).copied()
    }

    #[must_use]
    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    /// Entries with a sequence greater than `version`.
    #[must_use]
    pub fn since(&self, version: u64) -> &[LogEntry] {
        let start = self.entries.partition_point(|e| e.sequence <= version);
        &self.entries[start..]
    }

    #[must_use]
    pub fn last_sequence(&self) -> u64 {
        self.entries.last().map_or(0, |e| e.sequence)
    }

    /// Total random words consumed across all entries.
    #[must_use]
    pub fn total_draws(&self) -> usize {
        self.entries.iter().map(|e| e.draws.len()).sum()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Everything needed to reproduce a game.
///
/// Payloads are free-form JSON, so exports travel as JSON.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReplayExport {
    /// Name of the game definition that produced the log.
    pub game: String,
    pub seed: u64,
    pub player_count: usize,
    /// Opaque descriptor passed to the game's setup function.
    pub setup: Value,
    pub entries: Vec<LogEntry>,
    pub checkpoints: Vec<Checkpoint>,
}

impl ReplayExport {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    /// Final version reached by the log.
    #[must_use]
    pub fn last_version(&self) -> u64 {
        self.entries.last().map_or(0, |e| e.sequence)
    }

    /// Recorded fingerprint at `version`, if any.
    #[must_use]
    pub fn checkpoint_at(&self, version: u64) -> Option<u64> {
        self.checkpoints
            .iter()
            .find(|c| c.version == version)
            .map(|c| c.fingerprint)
    }
}
