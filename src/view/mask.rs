//! Per-player projection of canonical state.
//!
//! A mask is a pure, total function `(state, viewer) -> state` that strips
//! whatever `viewer` may not see. Games write masks with the helpers here:
//! [`Visibility`] decides who sees a collection, [`conceal`] swaps every
//! element for a placeholder while keeping the length (so hand sizes stay
//! public), and [`Redact`] supplies the placeholder.
//!
//! ## Example
//!
//! ```
//! use turnkit::core::PlayerId;
//! use turnkit::view::{conceal_unless, Projector, Visibility};
//!
//! #[derive(Clone, Debug, PartialEq)]
//! struct Table { hands: Vec<Vec<Option<u8>>> }
//!
//! let projector = Projector::new(|table: &Table, viewer: PlayerId| {
//!     let mut view = table.clone();
//!     for (seat, hand) in view.hands.iter_mut().enumerate() {
//!         let owner = PlayerId::new(seat as u8);
//!         conceal_unless(Visibility::OwnerOnly, Some(owner), viewer, hand.iter_mut());
//!     }
//!     view
//! });
//!
//! let table = Table { hands: vec![vec![Some(3)], vec![Some(7), Some(9)]] };
//! let seen = projector.project(&table, PlayerId::new(0));
//! assert_eq!(seen.hands, vec![vec![Some(3)], vec![None, None]]);
//! ```

use serde::{Deserialize, Serialize};

use crate::core::PlayerId;

/// Who may see a piece of state.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Visibility {
    /// Everyone (a face-up discard pile).
    #[default]
    Public,
    /// Only the owner (a hand).
    OwnerOnly,
    /// Nobody (a face-down deck).
    Hidden,
}

impl Visibility {
    /// Can `viewer` see something owned by `owner` under this rule?
    #[must_use]
    pub fn visible_to(self, owner: Option<PlayerId>, viewer: PlayerId) -> bool {
        match self {
            Visibility::Public => true,
            Visibility::OwnerOnly => owner == Some(viewer),
            Visibility::Hidden => false,
        }
    }
}

/// Types with an opaque placeholder value.
pub trait Redact {
    /// The placeholder shown in place of a concealed value.
    fn redacted() -> Self;
}

impl<T> Redact for Option<T> {
    fn redacted() -> Self {
        None
    }
}

impl Redact for String {
    fn redacted() -> Self {
        String::new()
    }
}

/// Replace every element with its placeholder, keeping the count.
pub fn conceal<'a, T, I>(items: I)
where
    T: Redact + 'a,
    I: IntoIterator<Item = &'a mut T>,
{
    for item in items {
        *item = T::redacted();
    }
}

/// Conceal `items` unless `viewer` may see them.
pub fn conceal_unless<'a, T, I>(visibility: Visibility, owner: Option<PlayerId>, viewer: PlayerId, items: I)
where
    T: Redact + 'a,
    I: IntoIterator<Item = &'a mut T>,
{
    if !visibility.visible_to(owner, viewer) {
        conceal(items);
    }
}

type MaskFn<S> = Box<dyn Fn(&S, PlayerId) -> S + Send + Sync>;

/// The game's masking function, identity when none is given.
pub struct Projector<S> {
    mask: Option<MaskFn<S>>,
}

impl<S> Default for Projector<S> {
    fn default() -> Self {
        Self { mask: None }
    }
}

impl<S: Clone> Projector<S> {
    /// Every player sees the full state.
    #[must_use]
    pub fn identity() -> Self {
        Self::default()
    }

    pub fn new(mask: impl Fn(&S, PlayerId) -> S + Send + Sync + 'static) -> Self {
        Self {
            mask: Some(Box::new(mask)),
        }
    }

    #[must_use]
    pub fn is_identity(&self) -> bool {
        self.mask.is_none()
    }

    /// The view of `state` for `viewer`.
    pub fn project(&self, state: &S, viewer: PlayerId) -> S {
        match &self.mask {
            Some(mask) => mask(state, viewer),
            None => state.clone(),
        }
    }
}

impl<S> std::fmt::Debug for Projector<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Projector")
            .field("identity", &self.mask.is_none())
            .finish()
    }
}
