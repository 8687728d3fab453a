//! memo-core: The agent turn loop.
//!
//! Provides:
//! - `AgentSession`, which alternates model calls and tool actions until the
//!   model gives a final answer
//! - Reply parsing for the XML and JSON action formats
//! - The `ModelClient`, `HistorySink` and `TokenCounter` seams
//! - `XmlHistoryFile`, a history sink writing an XML transcript

pub mod error;
pub mod history;
pub mod model;
pub mod parser;
pub mod session;
pub mod tokens;

pub use error::{AgentError, TurnFailure};
pub use history::{HistorySink, XmlHistoryFile, escape_cdata};
pub use model::{FnModel, ModelClient, model_fn};
pub use parser::{ParsedReply, parse_reply, render_observation};
pub use session::{
    AgentDeps, AgentSession, DEFAULT_MAX_ACTIONS_PER_TURN, SessionOptions, TurnOutcome,
};
pub use tokens::{ApproxTokenCounter, TokenCounter, TokenUsage};
