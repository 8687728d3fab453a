//! Hook registry: collects entries per extension point and freezes them
//! into the chains a session runs.

use crate::chain::{HookChain, HookEntry};
use crate::events::{ActionPayload, FinalPayload, ObservationPayload, TurnStartPayload};

/// The four hook chains of a session. Immutable once built.
#[derive(Debug, Clone, Default)]
pub struct SessionHooks {
    pub on_turn_start: HookChain<TurnStartPayload>,
    pub on_action: HookChain<ActionPayload>,
    pub on_observation: HookChain<ObservationPayload>,
    pub on_final: HookChain<FinalPayload>,
}

/// Builder for [`SessionHooks`]. Entries keep their registration order.
#[derive(Default)]
pub struct HookRegistry {
    turn_start: Vec<HookEntry<TurnStartPayload>>,
    action: Vec<HookEntry<ActionPayload>>,
    observation: Vec<HookEntry<ObservationPayload>>,
    final_answer: Vec<HookEntry<FinalPayload>>,
}

impl HookRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an entry for the turn-start point.
    pub fn on_turn_start(mut self, entry: HookEntry<TurnStartPayload>) -> Self {
        self.turn_start.push(entry);
        self
    }

    /// Register an entry for the action point.
    pub fn on_action(mut self, entry: HookEntry<ActionPayload>) -> Self {
        self.action.push(entry);
        self
    }

    /// Register an entry for the observation point.
    pub fn on_observation(mut self, entry: HookEntry<ObservationPayload>) -> Self {
        self.observation.push(entry);
        self
    }

    /// Register an entry for the final-answer point.
    pub fn on_final(mut self, entry: HookEntry<FinalPayload>) -> Self {
        self.final_answer.push(entry);
        self
    }

    /// Freeze the registered entries into chains.
    pub fn build(self) -> SessionHooks {
        tracing::debug!(
            turn_start = self.turn_start.len(),
            action = self.action.len(),
            observation = self.observation.len(),
            final_answer = self.final_answer.len(),
            "Built session hooks"
        );
        SessionHooks {
            on_turn_start: HookChain::new(self.turn_start),
            on_action: HookChain::new(self.action),
            on_observation: HookChain::new(self.observation),
            on_final: HookChain::new(self.final_answer),
        }
    }
}
