//! Tool descriptor, validator/executor capabilities and error types.

use std::fmt;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use thiserror::Error;

use memo_types::ContentBlock;

/// Failure of a tool invocation. The session turns every variant into an
/// error observation instead of aborting the turn.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ToolError {
    #[error("unknown tool `{name}`")]
    UnknownTool { name: String },

    #[error("invalid input for `{tool}`: {diagnostics}")]
    InvalidInput { tool: String, diagnostics: String },

    #[error("`{tool}` failed: {message}")]
    ExecutionFailed { tool: String, message: String },
}

/// Diagnostics produced by an [`InputValidator`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{diagnostics}")]
pub struct ValidationError {
    pub diagnostics: String,
}

impl ValidationError {
    pub fn new(diagnostics: impl Into<String>) -> Self {
        Self {
            diagnostics: diagnostics.into(),
        }
    }
}

/// Content returned by a successful tool execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolOutput {
    pub content: Vec<ContentBlock>,
}

impl ToolOutput {
    /// A single text block.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![ContentBlock::text(text)],
        }
    }

    /// All text blocks joined by newlines.
    pub fn to_text(&self) -> String {
        self.content
            .iter()
            .filter_map(ContentBlock::as_text)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Turns raw model-provided input into validated, structured input.
pub trait InputValidator: Send + Sync {
    fn validate(&self, raw: &str) -> Result<Value, ValidationError>;
}

/// Consumes validated input and produces content.
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    async fn execute(&self, input: Value) -> anyhow::Result<ToolOutput>;
}

/// Decode raw input text: JSON when it parses, otherwise a JSON string.
pub fn decode_raw_input(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

/// Validator backed by a serde input type.
///
/// The raw text is decoded with [`decode_raw_input`]; if the decoded value is
/// not a string and does not fit `T`, the raw text is tried again as a plain
/// string so string-shaped inputs such as `42` still validate.
pub struct TypedValidator<T> {
    _input: PhantomData<fn() -> T>,
}

impl<T> TypedValidator<T> {
    pub fn new() -> Self {
        Self {
            _input: PhantomData,
        }
    }
}

impl<T> Default for TypedValidator<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> InputValidator for TypedValidator<T>
where
    T: DeserializeOwned + Serialize,
{
    fn validate(&self, raw: &str) -> Result<Value, ValidationError> {
        let decoded = decode_raw_input(raw);
        let typed: T = match serde_json::from_value(decoded.clone()) {
            Ok(typed) => typed,
            Err(e) if !decoded.is_string() => {
                serde_json::from_value(Value::String(raw.to_string()))
                    .map_err(|_| ValidationError::new(e.to_string()))?
            }
            Err(e) => return Err(ValidationError::new(e.to_string())),
        };
        serde_json::to_value(&typed).map_err(|e| ValidationError::new(e.to_string()))
    }
}

/// Executor wrapping an async closure over a serde input type.
pub struct FnExecutor<T, F> {
    handler: F,
    _input: PhantomData<fn() -> T>,
}

impl<T, F> FnExecutor<T, F> {
    pub fn new(handler: F) -> Self {
        Self {
            handler,
            _input: PhantomData,
        }
    }
}

#[async_trait]
impl<T, F, Fut> ToolExecutor for FnExecutor<T, F>
where
    T: DeserializeOwned + Send + 'static,
    F: Fn(T) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<ToolOutput>> + Send,
{
    async fn execute(&self, input: Value) -> anyhow::Result<ToolOutput> {
        let typed: T = serde_json::from_value(input)?;
        (self.handler)(typed).await
    }
}

/// A registered tool. Immutable once handed to a registry.
#[derive(Clone)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    /// JSON schema of the input, shown to the model.
    pub parameters: Value,
    pub validator: Arc<dyn InputValidator>,
    pub executor: Arc<dyn ToolExecutor>,
}

impl ToolDescriptor {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        validator: Arc<dyn InputValidator>,
        executor: Arc<dyn ToolExecutor>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters: json!({ "type": "object", "properties": {} }),
            validator,
            executor,
        }
    }

    /// A tool whose input is the serde type `T`, validated by [`TypedValidator`].
    pub fn typed<T, F, Fut>(
        name: impl Into<String>,
        description: impl Into<String>,
        handler: F,
    ) -> Self
    where
        T: DeserializeOwned + Serialize + Send + 'static,
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<ToolOutput>> + Send + 'static,
    {
        Self::new(
            name,
            description,
            Arc::new(TypedValidator::<T>::new()),
            Arc::new(FnExecutor::<T, F>::new(handler)),
        )
    }

    pub fn with_parameters(mut self, parameters: Value) -> Self {
        self.parameters = parameters;
        self
    }
}

impl fmt::Debug for ToolDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolDescriptor")
            .field("name", &self.name)
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}
