//! Phase definitions: declarative templates for stack frames.
//!
//! A `PhaseDef` names the actions legal in the phase, whether participants
//! act in turn or simultaneously, who may take part, how the turn moves, and
//! when the phase ends. End conditions return a [`PhaseTransition`] so a
//! phase can end, hand over to a sibling, or open a nested sub-phase.
//!
//! ## Example
//!
//! ```
//! use turnkit::phases::{PhaseDef, PhaseTransition};
//!
//! #[derive(Clone)]
//! struct Table { rounds_left: u32 }
//!
//! let main = PhaseDef::<Table>::sequential("main")
//!     .allow(["play", "pass"])
//!     .pass_turn_after(["pass"])
//!     .end_when(|table, _frame| {
//!         if table.rounds_left == 0 { PhaseTransition::End } else { PhaseTransition::Continue }
//!     });
//!
//! assert_eq!(main.name(), "main");
//! assert!(!main.is_simultaneous());
//! ```

use serde::{Deserialize, Serialize};

use super::frame::PhaseFrame;
use crate::core::PlayerId;

/// What happens to the top frame after a transition settles.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PhaseTransition {
    /// Stay in the current frame.
    Continue,
    /// Pop the frame; its parent resumes.
    End,
    /// Enter a nested sub-phase on top of the current frame.
    Push(PhaseRequest),
    /// Pop the frame and enter a sibling phase in its place.
    Replace(PhaseRequest),
}

/// Request to enter a phase.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseRequest {
    /// Registered phase name.
    pub phase: String,

    /// Candidate participants; `None` means every player.
    pub participants: Option<Vec<PlayerId>>,

    /// First active player of a sequential frame.
    pub first: Option<PlayerId>,
}

impl PhaseRequest {
    /// Enter `phase` with every player as a candidate.
    pub fn new(phase: impl Into<String>) -> Self {
        Self {
            phase: phase.into(),
            participants: None,
            first: None,
        }
    }

    /// Restrict the candidate participants.
    #[must_use]
    pub fn with_participants(mut self, players: impl IntoIterator<Item = PlayerId>) -> Self {
        self.participants = Some(players.into_iter().collect());
        self
    }

    /// Choose who acts first in a sequential frame.
    #[must_use]
    pub fn starting_with(mut self, player: PlayerId) -> Self {
        self.first = Some(player);
        self
    }
}

/// How a sub-phase's allowed actions relate to its parent's.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionSetPolicy {
    /// Exactly the phase's own list.
    #[default]
    Replace,
    /// The phase's own list plus the parent frame's effective set.
    Inherit,
}

type OrderFn<S> = Box<dyn Fn(&S, &PhaseFrame, PlayerId) -> PlayerId + Send + Sync>;
type PassFn<S> = Box<dyn Fn(&S, &str) -> bool + Send + Sync>;
type AvailableFn<S> = Box<dyn Fn(&S, PlayerId) -> bool + Send + Sync>;
type EndFn<S> = Box<dyn Fn(&S, &PhaseFrame) -> PhaseTransition + Send + Sync>;

/// Turn order policy of a sequential phase.
pub enum TurnOrder<S> {
    /// Next participant in seat order, wrapping around.
    RoundRobin,
    /// Game-supplied: `(state, frame, current) -> next`.
    Custom(OrderFn<S>),
}

impl<S> TurnOrder<S> {
    /// The player after `current` in `frame`.
    pub fn next(&self, state: &S, frame: &PhaseFrame, current: PlayerId) -> PlayerId {
        match self {
            TurnOrder::RoundRobin => {
                let seats = &frame.participants;
                match seats.index_of(&current) {
                    Some(i) => seats.get((i + 1) % seats.len()).copied().unwrap_or(current),
                    None => seats.front().copied().unwrap_or(current),
                }
            }
            TurnOrder::Custom(f) => f(state, frame, current),
        }
    }
}

/// When a committed action passes the turn in a sequential phase.
pub enum TurnPassing<S> {
    Never,
    AfterEveryAction,
    /// After any of the named actions.
    After(Vec<String>),
    /// Game-supplied: `(state after commit, action name) -> passes`.
    Custom(PassFn<S>),
}

impl<S> TurnPassing<S> {
    /// Does committing `action` pass the turn?
    pub fn passes(&self, state: &S, action: &str) -> bool {
        match self {
            TurnPassing::Never => false,
            TurnPassing::AfterEveryAction => true,
            TurnPassing::After(names) => names.iter().any(|n| n == action),
            TurnPassing::Custom(f) => f(state, action),
        }
    }
}

/// Declarative phase template.
pub struct PhaseDef<S> {
    name: String,
    allowed: Vec<String>,
    simultaneous: bool,
    action_set: ActionSetPolicy,
    available: Option<AvailableFn<S>>,
    end: Option<EndFn<S>>,
    turn_order: TurnOrder<S>,
    turn_passing: TurnPassing<S>,
}

impl<S> PhaseDef<S> {
    fn new(name: String, simultaneous: bool) -> Self {
        Self {
            name,
            allowed: Vec::new(),
            simultaneous,
            action_set: ActionSetPolicy::Replace,
            available: None,
            end: None,
            turn_order: TurnOrder::RoundRobin,
            turn_passing: TurnPassing::Never,
        }
    }

    /// A phase where participants act one at a time.
    pub fn sequential(name: impl Into<String>) -> Self {
        Self::new(name.into(), false)
    }

    /// A phase where every participant acts independently.
    ///
    /// Without a custom end condition it ends once all participants acted.
    pub fn simultaneous(name: impl Into<String>) -> Self {
        Self::new(name.into(), true)
    }

    /// Add legal action names.
    #[must_use]
    pub fn allow<I, T>(mut self, actions: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.allowed.extend(actions.into_iter().map(Into::into));
        self
    }

    /// Also allow whatever the parent frame allows.
    #[must_use]
    pub fn inherit_actions(mut self) -> Self {
        self.action_set = ActionSetPolicy::Inherit;
        self
    }

    /// Filter candidate participants at entry.
    #[must_use]
    pub fn available_when(
        mut self,
        f: impl Fn(&S, PlayerId) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.available = Some(Box::new(f));
        self
    }

    /// Full end condition returning a transition.
    #[must_use]
    pub fn end_when(
        mut self,
        f: impl Fn(&S, &PhaseFrame) -> PhaseTransition + Send + Sync + 'static,
    ) -> Self {
        self.end = Some(Box::new(f));
        self
    }

    /// Boolean end condition: the frame pops when `f` holds.
    #[must_use]
    pub fn ends_when(self, f: impl Fn(&S, &PhaseFrame) -> bool + Send + Sync + 'static) -> Self {
        self.end_when(move |state, frame| {
            if f(state, frame) {
                PhaseTransition::End
            } else {
                PhaseTransition::Continue
            }
        })
    }

    /// Replace round-robin with a custom order function.
    #[must_use]
    pub fn turn_order(
        mut self,
        f: impl Fn(&S, &PhaseFrame, PlayerId) -> PlayerId + Send + Sync + 'static,
    ) -> Self {
        self.turn_order = TurnOrder::Custom(Box::new(f));
        self
    }

    /// Pass the turn after any of the named actions.
    #[must_use]
    pub fn pass_turn_after<I, T>(mut self, actions: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.turn_passing = TurnPassing::After(actions.into_iter().map(Into::into).collect());
        self
    }

    /// Pass the turn after every committed action.
    #[must_use]
    pub fn pass_turn_always(mut self) -> Self {
        self.turn_passing = TurnPassing::AfterEveryAction;
        self
    }

    /// Decide turn passing with a custom predicate.
    #[must_use]
    pub fn pass_turn_when(mut self, f: impl Fn(&S, &str) -> bool + Send + Sync + 'static) -> Self {
        self.turn_passing = TurnPassing::Custom(Box::new(f));
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn allowed(&self) -> &[String] {
        &self.allowed
    }

    #[must_use]
    pub fn is_simultaneous(&self) -> bool {
        self.simultaneous
    }

    #[must_use]
    pub fn action_set(&self) -> ActionSetPolicy {
        self.action_set
    }

    pub(crate) fn turn_order_policy(&self) -> &TurnOrder<S> {
        &self.turn_order
    }

    pub(crate) fn turn_passing_policy(&self) -> &TurnPassing<S> {
        &self.turn_passing
    }

    /// Is `player` admitted when the phase is entered against `state`?
    pub fn is_available(&self, state: &S, player: PlayerId) -> bool {
        self.available.as_ref().map_or(true, |f| f(state, player))
    }

    /// Evaluate the end condition for `frame`.
    pub fn evaluate_end(&self, state: &S, frame: &PhaseFrame) -> PhaseTransition {
        match &self.end {
            Some(f) => f(state, frame),
            None if self.simultaneous && frame.all_acted() => PhaseTransition::End,
            None => PhaseTransition::Continue,
        }
    }
}

impl<S> std::fmt::Debug for PhaseDef<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PhaseDef")
            .field("name", &self.name)
            .field("allowed", &self.allowed)
            .field("simultaneous", &self.simultaneous)
            .field("action_set", &self.action_set)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::phases::FrameId;
    use im::{OrdSet, Vector};

    fn frame(participants: &[u8], acted: &[u8]) -> PhaseFrame {
        PhaseFrame {
            id: FrameId::new(1),
            phase: "p".into(),
            simultaneous: false,
            participants: participants.iter().copied().map(PlayerId::new).collect::<Vector<_>>(),
            active: participants.first().copied().map(PlayerId::new),
            acted: acted.iter().copied().map(PlayerId::new).collect::<OrdSet<_>>(),
            allowed: OrdSet::new(),
            turn: 1,
            entered_at: 0,
        }
    }

    #[test]
    fn test_round_robin_wraps() {
        let order: TurnOrder<()> = TurnOrder::RoundRobin;
        let f = frame(&[0, 2, 3], &[]);

        assert_eq!(order.next(&(), &f, PlayerId::new(0)), PlayerId::new(2));
        assert_eq!(order.next(&(), &f, PlayerId::new(3)), PlayerId::new(0));
        // Unknown current seat restarts at the front.
        assert_eq!(order.next(&(), &f, PlayerId::new(1)), PlayerId::new(0));
    }

    #[test]
    fn test_custom_order() {
        let def = PhaseDef::<u8>::sequential("reverse")
            .turn_order(|_, frame, current| {
                let i = frame.participants.index_of(&current).unwrap_or(0);
                let n = frame.participants.len();
                frame.participants[(i + n - 1) % n]
            });
        let f = frame(&[0, 1, 2], &[]);

        assert_eq!(
            def.turn_order_policy().next(&0, &f, PlayerId::new(0)),
            PlayerId::new(2)
        );
    }

    #[test]
    fn test_turn_passing() {
        let after: TurnPassing<()> = TurnPassing::After(vec!["pass".into()]);
        assert!(after.passes(&(), "pass"));
        assert!(!after.passes(&(), "play"));
        assert!(TurnPassing::<()>::AfterEveryAction.passes(&(), "play"));
        assert!(!TurnPassing::<()>::Never.passes(&(), "pass"));

        let custom: TurnPassing<u32> = TurnPassing::Custom(Box::new(|s, _| *s > 3));
        assert!(custom.passes(&4, "x"));
    }

    #[test]
    fn test_default_simultaneous_end() {
        let def = PhaseDef::<()>::simultaneous("reveal");
        let mut f = frame(&[0, 1], &[0]);
        f.simultaneous = true;
        assert_eq!(def.evaluate_end(&(), &f), PhaseTransition::Continue);

        f.acted.insert(PlayerId::new(1));
        assert_eq!(def.evaluate_end(&(), &f), PhaseTransition::End);
    }

    #[test]
    fn test_sequential_without_end_continues() {
        let def = PhaseDef::<()>::sequential("main");
        assert_eq!(def.evaluate_end(&(), &frame(&[0], &[])), PhaseTransition::Continue);
    }

    #[test]
    fn test_ends_when() {
        let def = PhaseDef::<u32>::sequential("count").ends_when(|n, _| *n >= 3);
        let f = frame(&[0], &[]);
        assert_eq!(def.evaluate_end(&2, &f), PhaseTransition::Continue);
        assert_eq!(def.evaluate_end(&3, &f), PhaseTransition::End);
    }

    #[test]
    fn test_availability() {
        let def = PhaseDef::<Vec<bool>>::sequential("alive").available_when(|alive, p| alive[p.index()]);
        let state = vec![true, false];
        assert!(def.is_available(&state, PlayerId::new(0)));
        assert!(!def.is_available(&state, PlayerId::new(1)));

        let open = PhaseDef::<Vec<bool>>::sequential("open");
        assert!(open.is_available(&state, PlayerId::new(1)));
    }

    #[test]
    fn test_request_builder() {
        let req = PhaseRequest::new("discard")
            .with_participants([PlayerId::new(1)])
            .starting_with(PlayerId::new(1));
        assert_eq!(req.participants, Some(vec![PlayerId::new(1)]));
        assert_eq!(req.first, Some(PlayerId::new(1)));
    }
}
