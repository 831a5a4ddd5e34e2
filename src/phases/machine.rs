//! The phase stack machine.
//!
//! Frames live in an `im::Vector` (bottom first), so cloning the stack for a
//! transaction is O(1). Only the top frame is ever consulted for
//! authorization; lower frames are dormant and are never touched until they
//! become top again.
//!
//! After every committed log entry the engine calls, in order:
//! 1. [`PhaseStack::record_action`]: mark the actor as having acted
//!    (simultaneous) or advance the turn pointer (sequential).
//! 2. [`PhaseStack::enter`] for each sub-phase the reducer requested.
//! 3. [`PhaseStack::settle`]: evaluate end conditions from the top down
//!    until a frame wants to continue.

use im::{OrdSet, Vector};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::definition::{ActionSetPolicy, PhaseRequest, PhaseTransition};
use super::frame::{FrameId, PhaseFrame};
use super::registry::PhaseRegistry;
use crate::core::PlayerId;

/// Something the phase stack did while settling.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PhaseEvent {
    Entered { frame: FrameId, phase: String },
    Exited { frame: FrameId, phase: String },
    TurnPassed { frame: FrameId, to: PlayerId },
    /// The root frame popped; the game is over.
    Finished,
}

/// Phase machine failures. All of them are game-definition bugs.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum PhaseError {
    #[error("unknown phase `{0}`")]
    UnknownPhase(String),

    #[error("phase transitions did not settle within {0} steps")]
    Unsettled(usize),
}

/// Everything the machine reads while moving frames.
pub struct PhaseEnv<'a, S> {
    pub phases: &'a PhaseRegistry<S>,
    /// Canonical state the transition produced.
    pub state: &'a S,
    pub player_count: usize,
    /// Version being committed; stamped on entered frames.
    pub version: u64,
    pub max_transitions: usize,
}

/// Ordered stack of live phase frames.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseStack {
    frames: Vector<PhaseFrame>,
    next_id: u32,
    finished: bool,
}

impl PhaseStack {
    /// Create an empty stack. Call [`start`](Self::start) to enter the root.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The frame that currently decides who may act.
    #[must_use]
    pub fn top(&self) -> Option<&PhaseFrame> {
        self.frames.back()
    }

    /// Number of live frames.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Frames from bottom (root) to top.
    pub fn frames(&self) -> impl Iterator<Item = &PhaseFrame> {
        self.frames.iter()
    }

    /// Look up a live frame by ID.
    #[must_use]
    pub fn find(&self, id: FrameId) -> Option<&PhaseFrame> {
        self.frames.iter().find(|f| f.id == id)
    }

    /// True once the root frame has popped or the game was terminated.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Enter the root phase and settle.
    pub fn start<S>(&mut self, env: &PhaseEnv<'_, S>, root: &str) -> Result<Vec<PhaseEvent>, PhaseError> {
        let request = PhaseRequest::new(root);
        let frame = self.enter(env, &request)?;
        let mut events = vec![PhaseEvent::Entered {
            frame,
            phase: request.phase,
        }];
        events.extend(self.settle(env)?);
        Ok(events)
    }

    /// Push a frame for `request` on top of the stack.
    ///
    /// Candidates default to every seat; the phase's availability predicate
    /// filters them into the participant list. Duplicates and out-of-range
    /// seats are dropped.
    pub fn enter<S>(&mut self, env: &PhaseEnv<'_, S>, request: &PhaseRequest) -> Result<FrameId, PhaseError> {
        let def = env
            .phases
            .get(&request.phase)
            .ok_or_else(|| PhaseError::UnknownPhase(request.phase.clone()))?;

        let candidates: Vec<PlayerId> = match &request.participants {
            Some(players) => players.clone(),
            None => PlayerId::all(env.player_count).collect(),
        };
        let mut participants = Vector::new();
        for player in candidates {
            if player.is_valid(env.player_count)
                && !participants.contains(&player)
                && def.is_available(env.state, player)
            {
                participants.push_back(player);
            }
        }

        let mut allowed: OrdSet<String> = def.allowed().iter().cloned().collect();
        if def.action_set() == ActionSetPolicy::Inherit {
            if let Some(parent) = self.top() {
                allowed = allowed.union(parent.allowed.clone());
            }
        }

        let active = if def.is_simultaneous() {
            None
        } else {
            request
                .first
                .filter(|p| participants.contains(p))
                .or_else(|| participants.front().copied())
        };

        let id = FrameId::new(self.next_id);
        self.next_id += 1;
        self.frames.push_back(PhaseFrame {
            id,
            phase: request.phase.clone(),
            simultaneous: def.is_simultaneous(),
            participants,
            active,
            acted: OrdSet::new(),
            allowed,
            turn: 1,
            entered_at: env.version,
        });

        tracing::debug!(frame = %id, phase = %request.phase, depth = self.frames.len(), "entered phase");
        Ok(id)
    }

    /// Update the top frame after `player` committed `action`.
    pub fn record_action<S>(
        &mut self,
        env: &PhaseEnv<'_, S>,
        player: PlayerId,
        action: &str,
    ) -> Result<Option<PhaseEvent>, PhaseError> {
        let Some(frame) = self.frames.back_mut() else {
            return Ok(None);
        };
        let def = env
            .phases
            .get(&frame.phase)
            .ok_or_else(|| PhaseError::UnknownPhase(frame.phase.clone()))?;

        if frame.simultaneous {
            if frame.is_participant(player) {
                frame.acted.insert(player);
            }
            return Ok(None);
        }

        if !def.turn_passing_policy().passes(env.state, action) {
            return Ok(None);
        }

        let current = frame.active.unwrap_or(player);
        let next = def.turn_order_policy().next(env.state, frame, current);
        frame.active = Some(next);
        frame.turn += 1;

        tracing::debug!(frame = %frame.id, phase = %frame.phase, to = %next, "turn passed");
        Ok(Some(PhaseEvent::TurnPassed {
            frame: frame.id,
            to: next,
        }))
    }

    /// Evaluate end conditions until the top frame continues.
    pub fn settle<S>(&mut self, env: &PhaseEnv<'_, S>) -> Result<Vec<PhaseEvent>, PhaseError> {
        let mut events = Vec::new();
        let mut steps = 0usize;

        while !self.finished {
            let Some(top) = self.frames.back() else {
                break;
            };
            let def = env
                .phases
                .get(&top.phase)
                .ok_or_else(|| PhaseError::UnknownPhase(top.phase.clone()))?;

            match def.evaluate_end(env.state, top) {
                PhaseTransition::Continue => break,
                PhaseTransition::End => self.end_top(&mut events),
                PhaseTransition::Push(request) => {
                    let frame = self.enter(env, &request)?;
                    events.push(PhaseEvent::Entered {
                        frame,
                        phase: request.phase,
                    });
                }
                PhaseTransition::Replace(request) => {
                    self.pop_top(&mut events);
                    let frame = self.enter(env, &request)?;
                    events.push(PhaseEvent::Entered {
                        frame,
                        phase: request.phase,
                    });
                }
            }

            steps += 1;
            if steps > env.max_transitions {
                return Err(PhaseError::Unsettled(env.max_transitions));
            }
        }

        Ok(events)
    }

    /// Pop the top frame regardless of its end condition, then settle.
    pub fn force_end<S>(&mut self, env: &PhaseEnv<'_, S>) -> Result<Vec<PhaseEvent>, PhaseError> {
        let mut events = Vec::new();
        self.end_top(&mut events);
        events.extend(self.settle(env)?);
        Ok(events)
    }

    /// End the game immediately, discarding every frame.
    pub fn terminate(&mut self) -> Vec<PhaseEvent> {
        let mut events = Vec::new();
        while !self.frames.is_empty() {
            self.pop_top(&mut events);
        }
        if !self.finished {
            self.finished = true;
            events.push(PhaseEvent::Finished);
        }
        events
    }

    fn pop_top(&mut self, events: &mut Vec<PhaseEvent>) {
        if let Some(frame) = self.frames.pop_back() {
            tracing::debug!(frame = %frame.id, phase = %frame.phase, "exited phase");
            events.push(PhaseEvent::Exited {
                frame: frame.id,
                phase: frame.phase,
            });
        }
    }

    fn end_top(&mut self, events: &mut Vec<PhaseEvent>) {
        self.pop_top(events);
        if self.frames.is_empty() && !self.finished {
            self.finished = true;
            events.push(PhaseEvent::Finished);
        }
    }
}
