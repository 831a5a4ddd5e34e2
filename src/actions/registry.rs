//! Action registry.
//!
//! Each action is registered once and resolved by name to a dense
//! [`ActionId`]. The typed payload parameter is erased at registration so
//! one registry can hold actions with different payload types.

use std::any::Any;

use rustc_hash::FxHashMap;
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::definition::{ActionContext, ActionDef, AuthContext, PrecheckFn};
use crate::core::{ActionId, Fault};
use crate::schema::Schema;

/// Payload type erasure over [`ActionDef`].
trait ErasedAction<S>: Send + Sync {
    fn decode(&self, payload: &Value) -> Result<Box<dyn Any>, String>;
    fn authorize(&self, ctx: &AuthContext<'_>, payload: &dyn Any, state: &S) -> Option<bool>;
    fn reduce(&self, ctx: &mut ActionContext<'_, S>, payload: &dyn Any) -> Result<(), Fault>;
}

impl<S, P> ErasedAction<S> for ActionDef<S, P>
where
    P: DeserializeOwned + 'static,
{
    fn decode(&self, payload: &Value) -> Result<Box<dyn Any>, String> {
        serde_json::from_value::<P>(payload.clone())
            .map(|p| Box::new(p) as Box<dyn Any>)
            .map_err(|e| e.to_string())
    }

    fn authorize(&self, ctx: &AuthContext<'_>, payload: &dyn Any, state: &S) -> Option<bool> {
        let f = self.authorize.as_ref()?;
        let payload = payload.downcast_ref::<P>()?;
        Some(f(ctx, payload, state))
    }

    fn reduce(&self, ctx: &mut ActionContext<'_, S>, payload: &dyn Any) -> Result<(), Fault> {
        let payload = payload
            .downcast_ref::<P>()
            .ok_or_else(|| Fault::new(format!("payload type mismatch for `{}`", self.name)))?;
        (self.reduce)(ctx, payload)
    }
}

/// A decoded payload, ready for authorization and reduction.
pub struct Decoded(Box<dyn Any>);

impl std::fmt::Debug for Decoded {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Decoded(..)")
    }
}

/// A registered action.
pub struct RegisteredAction<S> {
    id: ActionId,
    name: String,
    schema: Schema,
    custom_authorize: bool,
    precheck: Option<PrecheckFn<S>>,
    handler: Box<dyn ErasedAction<S>>,
}

impl<S> RegisteredAction<S> {
    #[must_use]
    pub fn id(&self) -> ActionId {
        self.id
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    #[must_use]
    pub fn has_custom_authorize(&self) -> bool {
        self.custom_authorize
    }

    /// Deserialize a schema-valid payload into the action's payload type.
    pub fn decode(&self, payload: &Value) -> Result<Decoded, String> {
        self.handler.decode(payload).map(Decoded)
    }

    /// Run the payload-free gate; passes when none was given.
    pub fn precheck(&self, ctx: &AuthContext<'_>, state: &S) -> bool {
        self.precheck.as_ref().map_or(true, |f| f(ctx, state))
    }

    /// Whether the action belongs in `ctx.player`'s legal list.
    ///
    /// Without a precheck, an action with a payload predicate cannot be
    /// judged and is listed.
    pub fn may_submit(&self, ctx: &AuthContext<'_>, state: &S) -> bool {
        match &self.precheck {
            Some(f) => f(ctx, state),
            None if self.custom_authorize => true,
            None => ctx.default_policy(),
        }
    }

    /// Run the authorization gate.
    ///
    /// A custom predicate replaces the default policy entirely.
    pub fn authorize(&self, ctx: &AuthContext<'_>, payload: &Decoded, state: &S) -> bool {
        self.handler
            .authorize(ctx, payload.0.as_ref(), state)
            .unwrap_or_else(|| ctx.default_policy())
    }

    /// Apply the reducer to the context's draft.
    pub fn reduce(&self, ctx: &mut ActionContext<'_, S>, payload: &Decoded) -> Result<(), Fault> {
        self.handler.reduce(ctx, payload.0.as_ref())
    }
}

impl<S> std::fmt::Debug for RegisteredAction<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisteredAction")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("custom_authorize", &self.custom_authorize)
            .field("precheck", &self.precheck.is_some())
            .finish_non_exhaustive()
    }
}

/// Registry of action definitions.
pub struct ActionRegistry<S> {
    actions: Vec<RegisteredAction<S>>,
    by_name: FxHashMap<String, ActionId>,
}

impl<S> Default for ActionRegistry<S> {
    fn default() -> Self {
        Self {
            actions: Vec::new(),
            by_name: FxHashMap::default(),
        }
    }
}

impl<S: 'static> ActionRegistry<S> {
    /// Create a new empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an action definition and return its ID.
    ///
    /// Panics if an action with the same name already exists.
    pub fn register<P>(&mut self, mut def: ActionDef<S, P>) -> ActionId
    where
        P: DeserializeOwned + 'static,
    {
        if self.by_name.contains_key(def.name()) {
            panic!("Action `{}` already registered", def.name());
        }
        let id = ActionId::new(
            u16::try_from(self.actions.len()).unwrap_or_else(|_| panic!("Too many actions registered")),
        );
        let name = def.name().to_string();
        self.actions.push(RegisteredAction {
            id,
            name: name.clone(),
            schema: def.schema().clone(),
            custom_authorize: def.has_custom_authorize(),
            precheck: def.precheck.take(),
            handler: Box::new(def),
        });
        self.by_name.insert(name, id);
        id
    }
}

impl<S> ActionRegistry<S> {
    /// Resolve an action name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&RegisteredAction<S>> {
        self.by_name.get(name).and_then(|id| self.by_id(*id))
    }

    #[must_use]
    pub fn by_id(&self, id: ActionId) -> Option<&RegisteredAction<S>> {
        self.actions.get(id.raw() as usize)
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// Iterate over actions in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &RegisteredAction<S>> {
        self.actions.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}
