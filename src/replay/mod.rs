//! Deterministic replay.
//!
//! The engine appends one [`LogEntry`] per committed transition, carrying
//! the random words the reducer consumed. [`ReplayExport`] bundles the log
//! with the seed, the setup descriptor and state fingerprints, and
//! [`Replayer`] turns an export back into an engine at any version.

mod log;
mod replayer;

pub use log::{ActionLog, Checkpoint, EntryKind, LogEntry, ReplayExport};
pub use replayer::Replayer;
