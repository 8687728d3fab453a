use thiserror::Error;

use memo_hooks::HookPoint;

/// Why a turn ended without a final answer. Reported inside the turn
/// outcome; the session stays usable.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TurnFailure {
    #[error("model reply contained neither an action nor a final answer")]
    MalformedReply { reply: String },

    #[error("turn exceeded the limit of {limit} tool action(s)")]
    IterationLimitExceeded { limit: usize },
}

/// Errors that abort a turn.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("model call failed: {0}")]
    ModelCall(#[source] anyhow::Error),

    #[error("{point} hook failed: {source}")]
    Hook {
        point: HookPoint,
        #[source]
        source: anyhow::Error,
    },

    #[error("history sink failed: {0}")]
    History(#[source] anyhow::Error),

    #[error(transparent)]
    Turn(#[from] TurnFailure),
}

impl AgentError {
    pub(crate) fn hook(point: HookPoint) -> impl FnOnce(anyhow::Error) -> Self {
        move |source| AgentError::Hook { point, source }
    }
}
