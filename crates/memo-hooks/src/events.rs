//! Hook payload types.

use std::fmt;

use serde::{Deserialize, Serialize};

use memo_types::TurnStatus;

/// The four extension points of a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HookPoint {
    /// Fired once at the start of every turn.
    TurnStart,
    /// Fired once per tool dispatch.
    Action,
    /// Fired once per tool result.
    Observation,
    /// Fired once when a turn completes.
    Final,
}

impl HookPoint {
    pub fn as_str(&self) -> &'static str {
        match self {
            HookPoint::TurnStart => "on_turn_start",
            HookPoint::Action => "on_action",
            HookPoint::Observation => "on_observation",
            HookPoint::Final => "on_final",
        }
    }
}

impl fmt::Display for HookPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payload of [`HookPoint::TurnStart`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnStartPayload {
    /// Turn number, starting at 1.
    pub turn: u64,
    /// Raw user input for this turn.
    pub input: String,
}

/// Payload of [`HookPoint::Action`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionPayload {
    pub tool: String,
    /// Validated tool input. When validation failed this is the raw input
    /// decoded as JSON (or a JSON string).
    pub input: serde_json::Value,
}

/// Payload of [`HookPoint::Observation`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservationPayload {
    pub tool: String,
    /// Text returned to the model: tool content, or an error description.
    pub observation: String,
    pub is_error: bool,
}

/// Payload of [`HookPoint::Final`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalPayload {
    /// Final answer, `None` when the turn failed.
    pub final_text: Option<String>,
    pub status: TurnStatus,
}
