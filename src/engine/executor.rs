//! The engine: one authoritative game instance.
//!
//! Every input runs through the same pipeline:
//!
//! 1. idempotency check on `client_action_id`
//! 2. action lookup and payload schema validation
//! 3. allowed-set check against the top phase frame
//! 4. authorization (custom predicate or default policy)
//! 5. reduction on a draft with recorded randomness
//! 6. phase stack update (turn pass, requested sub-phases, end conditions)
//! 7. patch, log append, checkpoint and commit
//!
//! Steps 1-4 never touch state. Steps 5-6 work on copies of the state, the
//! phase stack and the RNG; nothing is visible until step 7 swaps them in.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::game::{GameDef, SetupContext};
use super::snapshot::{Snapshot, SnapshotError};
use crate::actions::{ActionContext, AuthContext, Decoded, RegisteredAction};
use crate::core::{
    fingerprint, DrawSource, Draws, EngineConfig, EngineError, GameRng, GameRngState, GameState, PlayerId,
    Result, Submission,
};
use crate::patch::{Patch, PatchEnvelope};
use crate::phases::{PhaseEnv, PhaseError, PhaseEvent, PhaseFrame, PhaseRequest, PhaseStack};
use crate::replay::{ActionLog, Checkpoint, EntryKind, LogEntry, ReplayExport};
use crate::schema::SchemaError;

const SETUP: &str = "setup";

/// Lifecycle of an engine instance.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameStatus {
    Running,
    /// The root phase ended or the game was terminated.
    Finished,
    /// A fatal error occurred; all input is refused.
    Halted,
}

/// A committed transition.
#[derive(Clone, Debug, PartialEq)]
pub struct Commit {
    /// Version produced (equals the log entry's sequence).
    pub sequence: u64,
    /// Canonical patch from the previous version.
    pub envelope: PatchEnvelope,
    pub events: Vec<PhaseEvent>,
}

/// Result of a submission that was not rejected.
#[derive(Clone, Debug, PartialEq)]
pub enum Outcome {
    Committed(Commit),
    /// The `client_action_id` was already logged for this player.
    Duplicate { sequence: u64 },
}

impl Outcome {
    #[must_use]
    pub fn commit(&self) -> Option<&Commit> {
        match self {
            Outcome::Committed(commit) => Some(commit),
            Outcome::Duplicate { .. } => None,
        }
    }

    #[must_use]
    pub fn is_duplicate(&self) -> bool {
        matches!(self, Outcome::Duplicate { .. })
    }
}

/// An authoritative game instance.
///
/// ## Example
///
/// ```
/// use serde::{Deserialize, Serialize};
/// use serde_json::json;
/// use turnkit::actions::{ActionContext, ActionDef};
/// use turnkit::core::{EngineConfig, PlayerId, Submission};
/// use turnkit::engine::{Engine, GameDef};
/// use turnkit::phases::PhaseDef;
/// use turnkit::schema::Schema;
///
/// #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
/// struct Counter { total: i64 }
///
/// let game = GameDef::new("counter", |_ctx| Ok(Counter { total: 0 }))
///     .with_phase(PhaseDef::sequential("main").allow(["add"]).pass_turn_always())
///     .with_action(ActionDef::new(
///         "add",
///         Schema::int_range(1, 10),
///         |ctx: &mut ActionContext<'_, Counter>, n: &i64| {
///             ctx.state.total += n;
///             Ok(())
///         },
///     ));
///
/// let mut engine = Engine::new(game, EngineConfig::new(2), json!(null)).unwrap();
/// engine.submit(Submission::new("add", json!(3), PlayerId::new(0))).unwrap();
///
/// assert_eq!(engine.state().total, 3);
/// assert_eq!(engine.active_player(), Some(PlayerId::new(1)));
/// assert!(engine.submit(Submission::new("add", json!(3), PlayerId::new(0))).is_err());
/// ```
pub struct Engine<S> {
    game: Arc<GameDef<S>>,
    config: EngineConfig,
    setup: Value,
    state: Arc<S>,
    phases: PhaseStack,
    rng: GameRng,
    version: u64,
    log: ActionLog,
    checkpoints: Vec<Checkpoint>,
    patches: Vec<PatchEnvelope>,
    status: GameStatus,
}

impl<S: GameState> Engine<S> {
    /// Build the initial state and enter the root phase.
    ///
    /// `setup` is the opaque descriptor handed to the game's setup function
    /// and recorded in exports.
    pub fn new(game: impl Into<Arc<GameDef<S>>>, config: EngineConfig, setup: Value) -> Result<Self> {
        let game = game.into();
        let mut rng = GameRng::new(config.seed);

        let state = {
            let mut ctx = SetupContext::new(DrawSource::live(&mut rng), config.player_count, &setup);
            match panic::catch_unwind(AssertUnwindSafe(|| game.setup(&mut ctx))) {
                Ok(Ok(state)) => state,
                Ok(Err(fault)) => return Err(setup_fault(fault.0)),
                Err(payload) => return Err(setup_fault(panic_message(payload))),
            }
        };
        ensure_json_encodable(&state)?;

        let root = game
            .root_phase()
            .ok_or_else(|| EngineError::UnknownPhase("<root>".to_string()))?;
        let mut phases = PhaseStack::new();
        let env = PhaseEnv {
            phases: game.phases(),
            state: &state,
            player_count: config.player_count,
            version: 0,
            max_transitions: config.max_phase_transitions,
        };
        match panic::catch_unwind(AssertUnwindSafe(|| phases.start(&env, root))) {
            Ok(Ok(_)) => {}
            Ok(Err(PhaseError::UnknownPhase(name))) => return Err(EngineError::UnknownPhase(name)),
            Ok(Err(other)) => return Err(setup_fault(other.to_string())),
            Err(payload) => return Err(setup_fault(panic_message(payload))),
        }

        let mut checkpoints = Vec::new();
        if config.checkpoint_due(0) {
            let fingerprint = fingerprint(&state).map_err(|e| setup_fault(e.to_string()))?;
            checkpoints.push(Checkpoint { version: 0, fingerprint });
        }

        let status = if phases.is_finished() {
            GameStatus::Finished
        } else {
            GameStatus::Running
        };

        tracing::debug!(
            game = %game.name(),
            players = config.player_count,
            seed = config.seed,
            root = %root,
            "engine started"
        );

        Ok(Self {
            game,
            config,
            setup,
            state: Arc::new(state),
            phases,
            rng,
            version: 0,
            log: ActionLog::new(),
            checkpoints,
            patches: Vec::new(),
            status,
        })
    }

    /// Submit an action on behalf of `submission.player`.
    ///
    /// Routine rejections leave the engine untouched. Fatal errors halt it.
    pub fn submit(&mut self, submission: Submission) -> Result<Outcome> {
        self.dispatch(submission, false, None)
    }

    /// Submit on a player's behalf, skipping the authorize predicate.
    ///
    /// Schema and allowed-set checks still apply, and the player must be a
    /// participant of the top frame. Used for timeouts and auto-play.
    pub fn inject(&mut self, submission: Submission) -> Result<Outcome> {
        tracing::info!(player = %submission.player, action = %submission.action, "injecting action");
        self.dispatch(submission, true, None)
    }

    /// Pop the top phase frame regardless of its end condition.
    pub fn force_end_phase(&mut self) -> Result<Commit> {
        self.ensure_accepting()?;
        let game = Arc::clone(&self.game);
        let mut phases = self.phases.clone();
        let env = PhaseEnv {
            phases: game.phases(),
            state: self.state.as_ref(),
            player_count: self.config.player_count,
            version: self.version + 1,
            max_transitions: self.config.max_phase_transitions,
        };
        let events = match guard_phases(|| phases.force_end(&env)) {
            Ok(events) => events,
            Err(reason) => {
                return Err(self.halt(EngineError::ReducerFault {
                    action: "force_end_phase".to_string(),
                    reason,
                }))
            }
        };

        tracing::info!(version = self.version, "forcing phase end");
        let rng = self.rng.clone();
        self.commit(None, phases, rng, None, EntryKind::ForceEndPhase, Draws::new(), events)
    }

    /// End the game immediately.
    pub fn force_terminate(&mut self) -> Result<Commit> {
        self.ensure_accepting()?;
        let mut phases = self.phases.clone();
        let events = phases.terminate();

        tracing::info!(version = self.version, "terminating game");
        let rng = self.rng.clone();
        self.commit(None, phases, rng, None, EntryKind::Terminate, Draws::new(), events)
    }

    /// Re-run one logged entry with its recorded draws.
    ///
    /// Any rejection means the log does not match this game definition and
    /// is reported as `ReplayDivergence`.
    pub(crate) fn replay_entry(&mut self, entry: &LogEntry) -> Result<()> {
        let expected = self.version + 1;
        if entry.sequence != expected {
            return Err(self.halt(EngineError::ReplayDivergence {
                version: expected,
                reason: format!("log entry has sequence {}", entry.sequence),
            }));
        }

        let result = match &entry.kind {
            EntryKind::Action {
                action,
                payload,
                client_action_id,
                injected,
            } => match entry.player {
                Some(player) => {
                    let submission = Submission {
                        action: action.clone(),
                        payload: payload.clone(),
                        player,
                        client_action_id: client_action_id.clone(),
                    };
                    self.dispatch(submission, *injected, Some(entry.draws.as_slice()))
                        .map(|outcome| outcome.commit().is_some())
                }
                None => Ok(false),
            },
            EntryKind::ForceEndPhase => self.force_end_phase().map(|_| true),
            EntryKind::Terminate => self.force_terminate().map(|_| true),
        };

        match result {
            Ok(true) => Ok(()),
            Ok(false) => Err(self.halt(EngineError::ReplayDivergence {
                version: expected,
                reason: "entry did not commit".to_string(),
            })),
            Err(err) if err.is_rejection() => Err(self.halt(EngineError::ReplayDivergence {
                version: expected,
                reason: err.to_string(),
            })),
            Err(err) => Err(err),
        }
    }

    fn dispatch(&mut self, submission: Submission, injected: bool, recorded: Option<&[u64]>) -> Result<Outcome> {
        if self.status == GameStatus::Halted {
            return Err(EngineError::Halted);
        }

        if let Some(id) = &submission.client_action_id {
            if let Some(sequence) = self.log.find_client_id(submission.player, id) {
                tracing::debug!(
                    player = %submission.player,
                    client_action_id = %id,
                    sequence,
                    "duplicate submission"
                );
                return Ok(Outcome::Duplicate { sequence });
            }
        }

        let game = Arc::clone(&self.game);
        let (action, decoded) = match self.check(&game, &submission, injected) {
            Ok(checked) => checked,
            Err(err) => {
                tracing::warn!(
                    player = %submission.player,
                    action = %submission.action,
                    version = self.version,
                    error = %err,
                    "submission rejected"
                );
                return Err(err);
            }
        };

        self.apply(&game, action, &decoded, submission, injected, recorded)
            .map(Outcome::Committed)
    }

    /// Steps 2-4 of the pipeline. Pure.
    fn check<'g>(
        &self,
        game: &'g GameDef<S>,
        submission: &Submission,
        injected: bool,
    ) -> Result<(&'g RegisteredAction<S>, Decoded)> {
        if self.status == GameStatus::Finished {
            return Err(EngineError::GameOver);
        }
        let player_count = self.config.player_count;

        let action = game
            .actions()
            .get(&submission.action)
            .ok_or_else(|| EngineError::UnknownAction(submission.action.clone()))?;

        action
            .schema()
            .validate(&submission.payload, player_count)
            .map_err(|source| EngineError::SchemaInvalid {
                action: submission.action.clone(),
                source,
            })?;
        let decoded = action
            .decode(&submission.payload)
            .map_err(|reason| EngineError::SchemaInvalid {
                action: submission.action.clone(),
                source: SchemaError::root(reason),
            })?;

        let frame = self.phases.top().ok_or(EngineError::GameOver)?;
        if !frame.allows(&submission.action) {
            return Err(EngineError::IllegalInPhase {
                action: submission.action.clone(),
                phase: frame.phase.clone(),
            });
        }

        let player = submission.player;
        let authorized = player.is_valid(player_count)
            && if injected {
                frame.is_participant(player)
            } else {
                let ctx = AuthContext {
                    player,
                    frame,
                    player_count,
                };
                let state = self.state.as_ref();
                // A panicking predicate denies; it never reaches the reducer.
                panic::catch_unwind(AssertUnwindSafe(|| {
                    action.precheck(&ctx, state) && action.authorize(&ctx, &decoded, state)
                }))
                .unwrap_or_else(|payload| {
                    tracing::warn!(
                        action = %submission.action,
                        player = %player,
                        reason = %panic_message(payload),
                        "authorization predicate panicked"
                    );
                    false
                })
            };
        if !authorized {
            return Err(EngineError::Unauthorized {
                action: submission.action.clone(),
                player,
                phase: frame.phase.clone(),
            });
        }

        Ok((action, decoded))
    }

    /// Steps 5-7: reduce on a draft, advance phases, commit.
    fn apply(
        &mut self,
        game: &GameDef<S>,
        action: &RegisteredAction<S>,
        decoded: &Decoded,
        submission: Submission,
        injected: bool,
        recorded: Option<&[u64]>,
    ) -> Result<Commit> {
        let player = submission.player;
        let player_count = self.config.player_count;
        let next_version = self.version + 1;
        let frame: PhaseFrame = self.phases.top().cloned().ok_or(EngineError::GameOver)?;

        let mut draft = S::clone(&self.state);
        let mut rng = self.rng.clone();

        let source = match recorded {
            Some(words) => DrawSource::replay(words),
            None => DrawSource::live(&mut rng),
        };
        let mut ctx = ActionContext::new(&mut draft, source, player, &frame, player_count, injected);
        let reduced = match panic::catch_unwind(AssertUnwindSafe(|| action.reduce(&mut ctx, decoded))) {
            Ok(Ok(())) => Ok(()),
            Ok(Err(fault)) => Err(fault.0),
            Err(payload) => Err(panic_message(payload)),
        };
        let (source, requests) = ctx.into_parts();
        let drawn = source.finish();

        if let Err(reason) = reduced {
            return Err(self.halt(EngineError::ReducerFault {
                action: submission.action,
                reason,
            }));
        }
        let draws = match drawn {
            Ok(draws) => draws,
            Err(mismatch) => {
                return Err(self.halt(EngineError::ReplayDivergence {
                    version: next_version,
                    reason: mismatch.to_string(),
                }))
            }
        };
        if recorded.is_some() {
            rng.skip(draws.len() as u64);
        }

        let mut phases = self.phases.clone();
        let env = PhaseEnv {
            phases: game.phases(),
            state: &draft,
            player_count,
            version: next_version,
            max_transitions: self.config.max_phase_transitions,
        };
        let events = match guard_phases(|| advance(&mut phases, &env, player, action.name(), requests)) {
            Ok(events) => events,
            Err(reason) => {
                return Err(self.halt(EngineError::ReducerFault {
                    action: submission.action,
                    reason,
                }))
            }
        };

        let kind = EntryKind::Action {
            action: submission.action,
            payload: submission.payload,
            client_action_id: submission.client_action_id,
            injected,
        };
        self.commit(Some(draft), phases, rng, Some(player), kind, draws, events)
    }

    fn commit(
        &mut self,
        state: Option<S>,
        phases: PhaseStack,
        rng: GameRng,
        player: Option<PlayerId>,
        kind: EntryKind,
        draws: Draws,
        events: Vec<PhaseEvent>,
    ) -> Result<Commit> {
        let sequence = self.version + 1;
        let label = match &kind {
            EntryKind::Action { action, .. } => action.clone(),
            EntryKind::ForceEndPhase => "force_end_phase".to_string(),
            EntryKind::Terminate => "terminate".to_string(),
        };

        let (patch, checkpoint) = match self.prepare_commit(state.as_ref(), sequence) {
            Ok(prepared) => prepared,
            Err(reason) => return Err(self.halt(EngineError::ReducerFault { action: label, reason })),
        };

        if let Some(state) = state {
            self.state = Arc::new(state);
        }
        self.phases = phases;
        self.rng = rng;
        self.version = sequence;
        if self.phases.is_finished() {
            self.status = GameStatus::Finished;
        }
        if let Some(fingerprint) = checkpoint {
            self.checkpoints.push(Checkpoint {
                version: sequence,
                fingerprint,
            });
        }
        self.log.push(LogEntry {
            sequence,
            player,
            kind,
            draws,
        });

        let envelope = PatchEnvelope::new(sequence - 1, sequence, patch);
        if self.config.record_patches {
            self.patches.push(envelope.clone());
        }

        tracing::debug!(
            version = sequence,
            player = ?player,
            entry = %label,
            ops = envelope.patch.len(),
            events = events.len(),
            "committed"
        );
        if self.status == GameStatus::Finished {
            tracing::debug!(version = sequence, "game finished");
        }

        Ok(Commit {
            sequence,
            envelope,
            events,
        })
    }

    fn prepare_commit(&self, next: Option<&S>, sequence: u64) -> std::result::Result<(Patch, Option<u64>), String> {
        let patch = match next {
            Some(next) => Patch::between(self.state.as_ref(), next).map_err(|e| e.to_string())?,
            None => Patch::new(),
        };
        let checkpoint = if self.config.checkpoint_due(sequence) {
            let target = next.unwrap_or(self.state.as_ref());
            Some(fingerprint(target).map_err(|e| e.to_string())?)
        } else {
            None
        };
        Ok((patch, checkpoint))
    }

    fn ensure_accepting(&self) -> Result<()> {
        match self.status {
            GameStatus::Running => Ok(()),
            GameStatus::Finished => Err(EngineError::GameOver),
            GameStatus::Halted => Err(EngineError::Halted),
        }
    }

    fn halt(&mut self, err: EngineError) -> EngineError {
        tracing::error!(version = self.version, error = %err, "engine halted");
        self.status = GameStatus::Halted;
        err
    }

    // === Queries ===

    #[must_use]
    pub fn game(&self) -> &Arc<GameDef<S>> {
        &self.game
    }

    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Canonical state at the current version.
    #[must_use]
    pub fn state(&self) -> &S {
        &self.state
    }

    /// Shared handle to the canonical state.
    #[must_use]
    pub fn state_arc(&self) -> Arc<S> {
        Arc::clone(&self.state)
    }

    #[must_use]
    pub fn version(&self) -> u64 {
        self.version
    }

    #[must_use]
    pub fn status(&self) -> GameStatus {
        self.status
    }

    #[must_use]
    pub fn phases(&self) -> &PhaseStack {
        &self.phases
    }

    /// Whose turn it is in the top frame (sequential frames only).
    #[must_use]
    pub fn active_player(&self) -> Option<PlayerId> {
        self.phases.top().and_then(|f| f.active)
    }

    #[must_use]
    pub fn current_phase(&self) -> Option<&str> {
        self.phases.top().map(|f| f.phase.as_str())
    }

    #[must_use]
    pub fn log(&self) -> &ActionLog {
        &self.log
    }

    #[must_use]
    pub fn checkpoints(&self) -> &[Checkpoint] {
        &self.checkpoints
    }

    #[must_use]
    pub fn rng_state(&self) -> GameRngState {
        self.rng.state()
    }

    /// Actions `player` could submit now.
    ///
    /// Each allowed action is filtered by its payload-free precheck, or by
    /// the default policy when it has no predicate at all. An action with a
    /// payload predicate but no precheck is listed whenever the top frame
    /// allows it; give it [`ActionDef::with_precheck`] to keep it off other
    /// seats' lists.
    ///
    /// [`ActionDef::with_precheck`]: crate::actions::ActionDef::with_precheck
    #[must_use]
    pub fn legal_actions(&self, player: PlayerId) -> Vec<String> {
        if self.status != GameStatus::Running || !player.is_valid(self.config.player_count) {
            return Vec::new();
        }
        let Some(frame) = self.phases.top() else {
            return Vec::new();
        };
        let ctx = AuthContext {
            player,
            frame,
            player_count: self.config.player_count,
        };
        let state = self.state.as_ref();
        frame
            .allowed
            .iter()
            .filter(|name| {
                self.game.actions().get(name.as_str()).map_or(false, |a| {
                    panic::catch_unwind(AssertUnwindSafe(|| a.may_submit(&ctx, state))).unwrap_or(false)
                })
            })
            .cloned()
            .collect()
    }

    /// Masked view of the current state for `player`.
    #[must_use]
    pub fn view(&self, player: PlayerId) -> S {
        self.game.projector().project(&self.state, player)
    }

    #[must_use]
    pub fn snapshot(&self) -> Snapshot<S> {
        Snapshot {
            version: self.version,
            status: self.status,
            phases: self.phases.clone(),
            state: S::clone(&self.state),
        }
    }

    /// Snapshot carrying `player`'s masked view instead of canonical state.
    #[must_use]
    pub fn view_snapshot(&self, player: PlayerId) -> Snapshot<S> {
        Snapshot {
            version: self.version,
            status: self.status,
            phases: self.phases.clone(),
            state: self.view(player),
        }
    }

    /// Fingerprint of the current canonical state.
    pub fn fingerprint(&self) -> std::result::Result<u64, SnapshotError> {
        fingerprint(self.state.as_ref()).map_err(|e| SnapshotError::Encode(e.to_string()))
    }

    /// Canonical changes from `version` to now, from the patch history.
    ///
    /// `None` when history is disabled or `version` is in the future.
    #[must_use]
    pub fn patches_since(&self, version: u64) -> Option<PatchEnvelope> {
        if !self.config.record_patches || version > self.version {
            return None;
        }
        let start = usize::try_from(version).ok()?;
        let ops = self
            .patches
            .get(start..)?
            .iter()
            .flat_map(|envelope| envelope.patch.ops.iter().cloned())
            .collect();
        Some(PatchEnvelope::new(version, self.version, Patch { ops }))
    }

    /// Export the log for replay, with a checkpoint at the current version.
    pub fn export(&self) -> std::result::Result<ReplayExport, SnapshotError> {
        let mut checkpoints = self.checkpoints.clone();
        if checkpoints.last().map_or(true, |c| c.version != self.version) {
            checkpoints.push(Checkpoint {
                version: self.version,
                fingerprint: self.fingerprint()?,
            });
        }
        Ok(ReplayExport {
            game: self.game.name().to_string(),
            seed: self.config.seed,
            player_count: self.config.player_count,
            setup: self.setup.clone(),
            entries: self.log.entries().to_vec(),
            checkpoints,
        })
    }
}

impl<S> std::fmt::Debug for Engine<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("game", &self.game.name())
            .field("version", &self.version)
            .field("status", &self.status)
            .field("depth", &self.phases.depth())
            .finish_non_exhaustive()
    }
}

fn advance<S>(
    phases: &mut PhaseStack,
    env: &PhaseEnv<'_, S>,
    player: PlayerId,
    action: &str,
    requests: Vec<PhaseRequest>,
) -> std::result::Result<Vec<PhaseEvent>, PhaseError> {
    let mut events: Vec<PhaseEvent> = phases.record_action(env, player, action)?.into_iter().collect();
    for request in requests {
        let frame = phases.enter(env, &request)?;
        events.push(PhaseEvent::Entered {
            frame,
            phase: request.phase,
        });
    }
    events.extend(phases.settle(env)?);
    Ok(events)
}

/// Run phase-machine work, turning errors and panics from game callbacks
/// into a fault reason.
fn guard_phases<T>(
    f: impl FnOnce() -> std::result::Result<T, PhaseError>,
) -> std::result::Result<T, String> {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(err)) => Err(err.to_string()),
        Err(payload) => Err(panic_message(payload)),
    }
}

/// Patches and exports are JSON, so the state must survive a JSON round
/// trip. Checked once, on the initial state.
fn ensure_json_encodable<S: GameState>(state: &S) -> Result<()> {
    let value = serde_json::to_value(state)
        .map_err(|e| setup_fault(format!("state is not JSON-encodable: {}", e)))?;
    let decoded: S = serde_json::from_value(value)
        .map_err(|e| setup_fault(format!("state does not decode from its JSON form: {}", e)))?;
    if &decoded != state {
        return Err(setup_fault("state changes across a JSON round trip".to_string()));
    }
    Ok(())
}

fn setup_fault(reason: String) -> EngineError {
    EngineError::ReducerFault {
        action: SETUP.to_string(),
        reason,
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("panicked: {}", message)
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("panicked: {}", message)
    } else {
        "panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::ActionDef;
    use crate::core::Fault;
    use crate::phases::{PhaseDef, PhaseTransition};
    use crate::schema::Schema;
    use rand::Rng;
    use serde_json::json;
    use std::collections::BTreeMap;

    #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
    struct Tally {
        total: i64,
        rolls: Vec<u64>,
    }

    fn game() -> GameDef<Tally> {
        GameDef::new("tally", |_| {
            Ok(Tally {
                total: 0,
                rolls: Vec::new(),
            })
        })
        .with_phase(
            PhaseDef::sequential("main")
                .allow(["add", "roll", "boom", "panic"])
                .pass_turn_after(["add"])
                .ends_when(|t: &Tally, _| t.total >= 100),
        )
        .with_action(ActionDef::new(
            "add",
            Schema::integer(),
            |ctx: &mut ActionContext<'_, Tally>, n: &i64| {
                ctx.state.total += n;
                Ok(())
            },
        ))
        .with_action(ActionDef::new(
            "roll",
            Schema::Null,
            |ctx: &mut ActionContext<'_, Tally>, _: &()| {
                let roll = ctx.rng.gen_range(1..7);
                ctx.state.rolls.push(roll);
                Ok(())
            },
        ))
        .with_action(ActionDef::new(
            "boom",
            Schema::Null,
            |ctx: &mut ActionContext<'_, Tally>, _: &()| {
                ctx.state.total = -1;
                Err(Fault::new("boom"))
            },
        ))
        .with_action(ActionDef::new(
            "panic",
            Schema::Null,
            |_: &mut ActionContext<'_, Tally>, _: &()| -> std::result::Result<(), Fault> {
                panic!("reducer bug")
            },
        ))
    }

    fn engine() -> Engine<Tally> {
        Engine::new(game(), EngineConfig::new(2).with_seed(9), json!(null)).unwrap()
    }

    fn p(n: u8) -> PlayerId {
        PlayerId::new(n)
    }

    #[test]
    fn test_commit_advances_version_and_turn() {
        let mut engine = engine();
        let outcome = engine.submit(Submission::new("add", json!(5), p(0))).unwrap();

        let commit = outcome.commit().unwrap();
        assert_eq!(commit.sequence, 1);
        assert_eq!(commit.envelope.from_version, 0);
        assert_eq!(engine.version(), 1);
        assert_eq!(engine.state().total, 5);
        assert_eq!(engine.active_player(), Some(p(1)));
        assert_eq!(engine.log().len(), 1);
    }

    #[test]
    fn test_rejections_leave_engine_untouched() {
        let mut engine = engine();
        let before = engine.snapshot();

        let unknown = engine.submit(Submission::new("nope", json!(null), p(0)));
        assert_eq!(unknown, Err(EngineError::UnknownAction("nope".into())));

        let invalid = engine.submit(Submission::new("add", json!("x"), p(0)));
        assert!(matches!(invalid, Err(EngineError::SchemaInvalid { .. })));

        let wrong_turn = engine.submit(Submission::new("add", json!(1), p(1)));
        assert!(matches!(wrong_turn, Err(EngineError::Unauthorized { .. })));

        let out_of_range = engine.submit(Submission::new("add", json!(1), p(7)));
        assert!(matches!(out_of_range, Err(EngineError::Unauthorized { .. })));

        assert_eq!(engine.snapshot(), before);
        assert!(engine.log().is_empty());
        assert_eq!(engine.status(), GameStatus::Running);
    }

    #[test]
    fn test_fault_rolls_back_and_halts() {
        let mut engine = engine();
        engine.submit(Submission::new("roll", json!(null), p(0))).unwrap();
        let before = engine.snapshot();
        let rng_before = engine.rng_state();

        let err = engine.submit(Submission::new("boom", json!(null), p(0))).unwrap_err();
        assert!(err.is_fatal());
        assert_eq!(engine.state(), &before.state);
        assert_eq!(engine.rng_state(), rng_before);
        assert_eq!(engine.log().len(), 1);
        assert_eq!(engine.status(), GameStatus::Halted);

        let after = engine.submit(Submission::new("add", json!(1), p(0)));
        assert_eq!(after, Err(EngineError::Halted));
    }

    #[test]
    fn test_panic_is_fault() {
        let mut engine = engine();
        let err = engine.submit(Submission::new("panic", json!(null), p(0))).unwrap_err();

        match err {
            EngineError::ReducerFault { action, reason } => {
                assert_eq!(action, "panic");
                assert!(reason.contains("reducer bug"));
            }
            other => panic!("unexpected error {:?}", other),
        }
        assert_eq!(engine.status(), GameStatus::Halted);
    }

    #[test]
    fn test_draws_are_logged() {
        let mut engine = engine();
        engine.submit(Submission::new("roll", json!(null), p(0))).unwrap();

        let entry = &engine.log().entries()[0];
        assert!(!entry.draws.is_empty());
        assert_eq!(entry.action(), Some("roll"));
        assert_eq!(engine.state().rolls.len(), 1);
    }

    #[test]
    fn test_duplicate_client_id() {
        let mut engine = engine();
        let first = Submission::new("add", json!(2), p(0)).with_client_id("c-1");
        engine.submit(first.clone()).unwrap();

        let again = engine.submit(first).unwrap();
        assert_eq!(again, Outcome::Duplicate { sequence: 1 });
        assert_eq!(engine.version(), 1);
        assert_eq!(engine.state().total, 2);
    }

    #[test]
    fn test_root_end_finishes_game() {
        let mut engine = engine();
        let commit = engine.submit(Submission::new("add", json!(100), p(0))).unwrap();

        assert!(commit.commit().unwrap().events.contains(&PhaseEvent::Finished));
        assert_eq!(engine.status(), GameStatus::Finished);
        assert_eq!(
            engine.submit(Submission::new("add", json!(1), p(1))),
            Err(EngineError::GameOver)
        );
        assert!(engine.legal_actions(p(1)).is_empty());
    }

    #[test]
    fn test_debug_names_game() {
        let engine = engine();
        let rendered = format!("{:?}", engine);
        assert!(rendered.contains("tally"));
        assert!(format!("{:?}", engine.game()).contains("tally"));
    }

    #[test]
    fn test_legal_actions() {
        let engine = engine();
        assert_eq!(engine.legal_actions(p(0)), vec!["add", "boom", "panic", "roll"]);
        assert!(engine.legal_actions(p(1)).is_empty());
    }

    #[test]
    fn test_hooks_are_logged() {
        let mut engine = engine();
        engine.force_end_phase().unwrap();
        assert_eq!(engine.status(), GameStatus::Finished);
        assert_eq!(engine.log().entries()[0].kind, EntryKind::ForceEndPhase);
        assert_eq!(engine.force_terminate(), Err(EngineError::GameOver));

        let mut engine = self::engine();
        let commit = engine.force_terminate().unwrap();
        assert!(commit.envelope.patch.is_empty());
        assert_eq!(engine.log().entries()[0].kind, EntryKind::Terminate);
    }

    #[test]
    fn test_inject_skips_turn_check() {
        let mut engine = engine();
        engine.inject(Submission::new("add", json!(1), p(1))).unwrap();

        assert_eq!(engine.state().total, 1);
        assert!(matches!(
            &engine.log().entries()[0].kind,
            EntryKind::Action { injected: true, .. }
        ));
    }

    #[test]
    fn test_patches_since() {
        let mut engine = engine();
        engine.submit(Submission::new("add", json!(1), p(0))).unwrap();
        engine.submit(Submission::new("add", json!(2), p(1))).unwrap();

        let envelope = engine.patches_since(0).unwrap();
        assert_eq!((envelope.from_version, envelope.to_version), (0, 2));
        let rebuilt: Tally = envelope
            .patch
            .apply_to(&Tally {
                total: 0,
                rolls: Vec::new(),
            })
            .unwrap();
        assert_eq!(&rebuilt, engine.state());

        assert!(engine.patches_since(2).unwrap().patch.is_empty());
        assert!(engine.patches_since(3).is_none());
    }

    #[test]
    fn test_transition_loop_is_fault() {
        let game = GameDef::new("loop", |_| Ok(0u8))
            .with_phase(PhaseDef::sequential("a").allow(["go"]).end_when(|n: &u8, _| {
                if *n > 0 {
                    PhaseTransition::Push(crate::phases::PhaseRequest::new("a"))
                } else {
                    PhaseTransition::Continue
                }
            }))
            .with_action(ActionDef::new(
                "go",
                Schema::Null,
                |ctx: &mut ActionContext<'_, u8>, _: &()| {
                    *ctx.state = 1;
                    Ok(())
                },
            ));
        let mut engine = Engine::new(game, EngineConfig::new(1).with_max_phase_transitions(4), json!(null)).unwrap();

        let err = engine.submit(Submission::new("go", json!(null), p(0))).unwrap_err();
        assert!(matches!(err, EngineError::ReducerFault { .. }));
        assert_eq!(*engine.state(), 0);
    }

    #[test]
    fn test_missing_root_phase() {
        let game = GameDef::new("empty", |_| Ok(0u8));
        let err = Engine::new(game, EngineConfig::new(1), json!(null)).unwrap_err();
        assert!(matches!(err, EngineError::UnknownPhase(_)));
    }

    /// Main ends badly at 13; entering `side` fails at 7.
    fn fragile() -> Engine<u8> {
        let game = GameDef::new("fragile", |_| Ok(0u8))
            .with_phase(
                PhaseDef::sequential("main")
                    .allow(["set", "open", "guarded"])
                    .ends_when(|n: &u8, _| {
                        assert!(*n != 13, "end condition bug");
                        false
                    }),
            )
            .with_phase(
                PhaseDef::simultaneous("side")
                    .inherit_actions()
                    .available_when(|n: &u8, _| {
                        assert!(*n != 7, "availability bug");
                        true
                    }),
            )
            .with_action(ActionDef::new(
                "set",
                Schema::int_range(0, 255),
                |ctx: &mut ActionContext<'_, u8>, n: &u8| {
                    *ctx.state = *n;
                    Ok(())
                },
            ))
            .with_action(ActionDef::new(
                "open",
                Schema::Null,
                |ctx: &mut ActionContext<'_, u8>, _: &()| {
                    ctx.push_phase(PhaseRequest::new("side"));
                    Ok(())
                },
            ))
            .with_action(
                ActionDef::new("guarded", Schema::Null, |_: &mut ActionContext<'_, u8>, _: &()| Ok(()))
                    .with_authorize(|_, _, _| -> bool { panic!("predicate bug") }),
            );
        Engine::new(game, EngineConfig::new(2), json!(null)).unwrap()
    }

    #[test]
    fn test_authorize_panic_is_rejection() {
        let mut engine = fragile();
        let err = engine.submit(Submission::new("guarded", json!(null), p(0))).unwrap_err();

        assert!(matches!(err, EngineError::Unauthorized { ref action, .. } if action == "guarded"));
        assert!(err.is_rejection());
        assert_eq!(engine.status(), GameStatus::Running);
        assert!(engine.log().is_empty());

        engine.submit(Submission::new("set", json!(1), p(0))).unwrap();
        assert_eq!(*engine.state(), 1);
    }

    #[test]
    fn test_end_condition_panic_halts() {
        let mut engine = fragile();
        let before = engine.snapshot();

        let err = engine.submit(Submission::new("set", json!(13), p(0))).unwrap_err();
        match err {
            EngineError::ReducerFault { action, reason } => {
                assert_eq!(action, "set");
                assert!(reason.contains("end condition bug"));
            }
            other => panic!("unexpected error {:?}", other),
        }
        assert_eq!(engine.status(), GameStatus::Halted);
        assert_eq!(engine.state(), &before.state);
        assert_eq!(engine.phases(), &before.phases);
        assert_eq!(engine.version(), 0);
        assert_eq!(engine.submit(Submission::new("set", json!(1), p(0))), Err(EngineError::Halted));
    }

    #[test]
    fn test_availability_panic_halts() {
        let mut engine = fragile();
        engine.submit(Submission::new("set", json!(7), p(0))).unwrap();
        let before = engine.snapshot();

        let err = engine.submit(Submission::new("open", json!(null), p(0))).unwrap_err();
        assert!(matches!(err, EngineError::ReducerFault { ref reason, .. } if reason.contains("availability bug")));
        assert_eq!(engine.status(), GameStatus::Halted);
        assert_eq!(engine.phases().depth(), 1);
        assert_eq!(engine.snapshot().phases, before.phases);
        assert_eq!(engine.log().len(), 1);
    }

    #[test]
    fn test_force_end_panic_halts() {
        let mut engine = fragile();
        engine.submit(Submission::new("open", json!(null), p(0))).unwrap();
        engine.submit(Submission::new("set", json!(13), p(0))).unwrap();
        assert_eq!(engine.current_phase(), Some("side"));

        let err = engine.force_end_phase().unwrap_err();
        assert!(matches!(err, EngineError::ReducerFault { ref action, .. } if action == "force_end_phase"));
        assert_eq!(engine.status(), GameStatus::Halted);
        assert_eq!(engine.current_phase(), Some("side"));
        assert_eq!(engine.version(), 2);
    }

    #[test]
    fn test_state_must_encode_as_json() {
        let game = GameDef::new("grid", |_| {
            let mut cells = BTreeMap::new();
            cells.insert((0u8, 1u8), 5u8);
            Ok(cells)
        })
        .with_phase(PhaseDef::sequential("main"));

        let err = Engine::new(game, EngineConfig::new(1), json!(null)).unwrap_err();
        match err {
            EngineError::ReducerFault { action, reason } => {
                assert_eq!(action, "setup");
                assert!(reason.contains("JSON"));
            }
            other => panic!("unexpected error {:?}", other),
        }
    }
}
