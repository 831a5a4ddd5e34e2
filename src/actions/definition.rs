//! Action definitions: schema, authorization predicate and reducer.
//!
//! ## Example
//!
//! ```
//! use serde::Deserialize;
//! use turnkit::actions::{ActionContext, ActionDef};
//! use turnkit::core::Fault;
//! use turnkit::schema::Schema;
//!
//! #[derive(Deserialize)]
//! struct Bid { amount: i64 }
//!
//! #[derive(Clone)]
//! struct Auction { high: i64 }
//!
//! let bid = ActionDef::new(
//!     "bid",
//!     Schema::object().field("amount", Schema::int_range(1, 100)),
//!     |ctx: &mut ActionContext<'_, Auction>, bid: &Bid| {
//!         if bid.amount <= ctx.state.high {
//!             return Err(Fault::new("bid must raise"));
//!         }
//!         ctx.state.high = bid.amount;
//!         Ok(())
//!     },
//! );
//!
//! assert_eq!(bid.name(), "bid");
//! ```

use crate::core::{DrawSource, Fault, PlayerId};
use crate::phases::{FrameId, PhaseFrame, PhaseRequest};
use crate::schema::Schema;

/// What an authorization predicate may look at.
#[derive(Clone, Copy, Debug)]
pub struct AuthContext<'a> {
    /// The player submitting the action.
    pub player: PlayerId,

    /// The top frame of the phase stack.
    pub frame: &'a PhaseFrame,

    pub player_count: usize,
}

impl<'a> AuthContext<'a> {
    #[must_use]
    pub fn phase(&self) -> &'a str {
        &self.frame.phase
    }

    #[must_use]
    pub fn active_player(&self) -> Option<PlayerId> {
        self.frame.active
    }

    /// The policy used when an action has no predicate of its own.
    #[must_use]
    pub fn default_policy(&self) -> bool {
        self.frame.may_act(self.player)
    }
}

/// Everything a reducer sees while applying one action.
///
/// `state` is a private draft; nothing a reducer does is visible outside
/// the transition unless it returns `Ok`.
pub struct ActionContext<'a, S> {
    /// Mutable draft of the canonical state.
    pub state: &'a mut S,

    /// The only randomness a reducer may use.
    pub rng: DrawSource<'a>,

    player: PlayerId,
    frame: &'a PhaseFrame,
    player_count: usize,
    injected: bool,
    requests: Vec<PhaseRequest>,
}

impl<'a, S> ActionContext<'a, S> {
    pub(crate) fn new(
        state: &'a mut S,
        rng: DrawSource<'a>,
        player: PlayerId,
        frame: &'a PhaseFrame,
        player_count: usize,
        injected: bool,
    ) -> Self {
        Self {
            state,
            rng,
            player,
            frame,
            player_count,
            injected,
            requests: Vec::new(),
        }
    }

    /// The acting player.
    #[must_use]
    pub fn player(&self) -> PlayerId {
        self.player
    }

    /// Whose turn it is in the current frame (sequential frames).
    #[must_use]
    pub fn active_player(&self) -> Option<PlayerId> {
        self.frame.active
    }

    #[must_use]
    pub fn phase(&self) -> &str {
        &self.frame.phase
    }

    #[must_use]
    pub fn frame_id(&self) -> FrameId {
        self.frame.id
    }

    #[must_use]
    pub fn frame(&self) -> &PhaseFrame {
        self.frame
    }

    #[must_use]
    pub fn player_count(&self) -> usize {
        self.player_count
    }

    /// True when an operator hook submitted the action for the player.
    #[must_use]
    pub fn is_injected(&self) -> bool {
        self.injected
    }

    /// Enter a sub-phase once this action commits.
    ///
    /// Requests are applied in order, on top of the current frame, before
    /// end conditions are evaluated.
    pub fn push_phase(&mut self, request: PhaseRequest) {
        self.requests.push(request);
    }

    pub(crate) fn into_parts(self) -> (DrawSource<'a>, Vec<PhaseRequest>) {
        (self.rng, self.requests)
    }
}

pub(crate) type ReduceFn<S, P> =
    Box<dyn Fn(&mut ActionContext<'_, S>, &P) -> Result<(), Fault> + Send + Sync>;
pub(crate) type AuthorizeFn<S, P> = Box<dyn Fn(&AuthContext<'_>, &P, &S) -> bool + Send + Sync>;
pub(crate) type PrecheckFn<S> = Box<dyn Fn(&AuthContext<'_>, &S) -> bool + Send + Sync>;

/// Declarative action: name, payload shape, optional predicate, reducer.
///
/// `P` is the typed payload; it is deserialized from the JSON payload once
/// the schema check passes.
///
/// A submission is authorized when the precheck (if any) and then the
/// payload predicate (or the default policy) both pass.
pub struct ActionDef<S, P> {
    pub(crate) name: String,
    pub(crate) schema: Schema,
    pub(crate) precheck: Option<PrecheckFn<S>>,
    pub(crate) authorize: Option<AuthorizeFn<S, P>>,
    pub(crate) reduce: ReduceFn<S, P>,
}

impl<S, P> ActionDef<S, P> {
    /// Define an action with the default authorization policy.
    pub fn new(
        name: impl Into<String>,
        schema: Schema,
        reduce: impl Fn(&mut ActionContext<'_, S>, &P) -> Result<(), Fault> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            schema,
            precheck: None,
            authorize: None,
            reduce: Box::new(reduce),
        }
    }

    /// Replace the default policy with a custom predicate.
    #[must_use]
    pub fn with_authorize(
        mut self,
        authorize: impl Fn(&AuthContext<'_>, &P, &S) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.authorize = Some(Box::new(authorize));
        self
    }

    /// Add a payload-free gate, checked before the payload predicate.
    ///
    /// `legal_actions` has no payload to offer, so it consults only this
    /// gate. Typically the seat half of a custom predicate, e.g.
    /// `|auth, _| auth.default_policy()`.
    #[must_use]
    pub fn with_precheck(mut self, precheck: impl Fn(&AuthContext<'_>, &S) -> bool + Send + Sync + 'static) -> Self {
        self.precheck = Some(Box::new(precheck));
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Whether a custom predicate replaces the default policy.
    #[must_use]
    pub fn has_custom_authorize(&self) -> bool {
        self.authorize.is_some()
    }
}

impl<S, P> std::fmt::Debug for ActionDef<S, P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionDef")
            .field("name", &self.name)
            .field("schema", &self.schema)
            .field("precheck", &self.precheck.is_some())
            .field("custom_authorize", &self.authorize.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::GameRng;
    use im::{OrdSet, Vector};
    use rand::RngCore;

    fn frame(simultaneous: bool) -> PhaseFrame {
        PhaseFrame {
            id: FrameId::new(4),
            phase: "main".into(),
            simultaneous,
            participants: Vector::from(vec![PlayerId::new(0), PlayerId::new(1)]),
            active: (!simultaneous).then_some(PlayerId::new(0)),
            acted: OrdSet::new(),
            allowed: OrdSet::new(),
            turn: 1,
            entered_at: 0,
        }
    }

    #[test]
    fn test_auth_context_default_policy() {
        let f = frame(false);
        let active = AuthContext {
            player: PlayerId::new(0),
            frame: &f,
            player_count: 2,
        };
        let waiting = AuthContext {
            player: PlayerId::new(1),
            ..active
        };

        assert!(active.default_policy());
        assert!(!waiting.default_policy());
        assert_eq!(waiting.phase(), "main");
        assert_eq!(waiting.active_player(), Some(PlayerId::new(0)));
    }

    #[test]
    fn test_context_accessors_and_requests() {
        let f = frame(false);
        let mut state = 0u32;
        let mut rng = GameRng::new(1);
        let mut ctx = ActionContext::new(
            &mut state,
            DrawSource::live(&mut rng),
            PlayerId::new(1),
            &f,
            2,
            true,
        );

        assert_eq!(ctx.player(), PlayerId::new(1));
        assert_eq!(ctx.active_player(), Some(PlayerId::new(0)));
        assert_eq!(ctx.frame_id(), FrameId::new(4));
        assert!(ctx.is_injected());

        *ctx.state += 1;
        ctx.rng.next_u64();
        ctx.push_phase(PhaseRequest::new("discard"));

        let (rng, requests) = ctx.into_parts();
        assert_eq!(rng.draw_count(), 1);
        assert_eq!(requests, vec![PhaseRequest::new("discard")]);
        assert_eq!(state, 1);
    }

    #[test]
    fn test_custom_authorize() {
        let def = ActionDef::new("pass", Schema::Null, |_: &mut ActionContext<'_, ()>, _: &()| Ok(()))
            .with_authorize(|_, _, _| true);
        assert!(def.has_custom_authorize());
        assert!(def.precheck.is_none());
        assert_eq!(def.schema(), &Schema::Null);
    }
}
