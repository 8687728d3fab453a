//! memo-tools: Tool registry and the built-in toolkit.
//!
//! Provides:
//! - `ToolDescriptor` with pluggable input validation and execution
//! - `ToolRegistry` lookup and failure-contained invocation
//! - Built-in tools (bash, read, write, edit, glob, grep, fetch)
//! - Tool context shared by the built-in tools

pub mod context;
pub mod registry;
pub mod tool;
pub mod tools;

pub use context::ToolContext;
pub use registry::{PreparedCall, ToolRegistry};
pub use tool::{
    FnExecutor, InputValidator, ToolDescriptor, ToolError, ToolExecutor, ToolOutput,
    TypedValidator, ValidationError, decode_raw_input,
};
pub use tools::{builtin_tools, create_toolkit};
