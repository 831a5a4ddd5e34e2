//! Phases and the phase stack.
//!
//! A game is structured as a stack of phase frames. The top frame decides
//! which actions are legal and who may submit them; nested sub-phases
//! (interrupts, forced discards, bidding rounds) are pushed on top and pop
//! back to the exact parent state when they end.

pub mod definition;
pub mod frame;
pub mod machine;
pub mod registry;

pub use definition::{ActionSetPolicy, PhaseDef, PhaseRequest, PhaseTransition, TurnOrder, TurnPassing};
pub use frame::{FrameId, PhaseFrame};
pub use machine::{PhaseEnv, PhaseError, PhaseEvent, PhaseStack};
pub use registry::PhaseRegistry;
