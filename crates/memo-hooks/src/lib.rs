//! memo-hooks: Ordered listener/middleware chains for the turn loop.
//!
//! A session exposes four extension points (turn start, action dispatch,
//! observation receipt, final answer). Each point owns an immutable
//! [`HookChain`] built once through [`HookRegistry`].

pub mod chain;
pub mod events;
pub mod registry;

pub use chain::{HookChain, HookEntry, HookResult, Next};
pub use events::{ActionPayload, FinalPayload, HookPoint, ObservationPayload, TurnStartPayload};
pub use registry::{HookRegistry, SessionHooks};
