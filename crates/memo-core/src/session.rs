//! Agent session: drives model ↔ tool iterations for each user turn.

use std::sync::Arc;

use tracing::{debug, info, warn};
use uuid::Uuid;

use memo_hooks::{
    ActionPayload, FinalPayload, HookPoint, ObservationPayload, SessionHooks, TurnStartPayload,
};
use memo_tools::{ToolRegistry, decode_raw_input};
use memo_types::{ChatMessage, ReplyFormat, Role, TranscriptEntry, TurnStatus};

use crate::error::{AgentError, TurnFailure};
use crate::history::HistorySink;
use crate::model::ModelClient;
use crate::parser::{ParsedReply, parse_reply, render_observation};
use crate::tokens::{ApproxTokenCounter, TokenCounter, TokenUsage};

/// Default bound on tool actions within one turn.
pub const DEFAULT_MAX_ACTIONS_PER_TURN: usize = 20;

/// Longest reply excerpt kept in [`TurnFailure::MalformedReply`].
const REPLY_PREVIEW_CHARS: usize = 500;

/// Per-session behaviour.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOptions {
    /// Sent as the first message of every model call; skipped when empty.
    pub system_prompt: String,
    pub reply_format: ReplyFormat,
    /// Tool actions allowed per turn before it fails.
    pub max_actions_per_turn: usize,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            system_prompt: String::new(),
            reply_format: ReplyFormat::default(),
            max_actions_per_turn: DEFAULT_MAX_ACTIONS_PER_TURN,
        }
    }
}

impl SessionOptions {
    /// At most one tool action per turn.
    pub fn once() -> Self {
        Self {
            max_actions_per_turn: 1,
            ..Self::default()
        }
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    pub fn with_reply_format(mut self, format: ReplyFormat) -> Self {
        self.reply_format = format;
        self
    }

    pub fn with_max_actions(mut self, max: usize) -> Self {
        self.max_actions_per_turn = max;
        self
    }
}

/// Everything a session borrows from its host.
pub struct AgentDeps {
    pub tools: ToolRegistry,
    pub model: Arc<dyn ModelClient>,
    pub hooks: SessionHooks,
    pub history_sinks: Vec<Arc<dyn HistorySink>>,
    pub token_counter: Arc<dyn TokenCounter>,
}

impl AgentDeps {
    pub fn new(tools: ToolRegistry, model: Arc<dyn ModelClient>) -> Self {
        Self {
            tools,
            model,
            hooks: SessionHooks::default(),
            history_sinks: Vec::new(),
            token_counter: Arc::new(ApproxTokenCounter),
        }
    }

    pub fn with_hooks(mut self, hooks: SessionHooks) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn with_history_sink(mut self, sink: Arc<dyn HistorySink>) -> Self {
        self.history_sinks.push(sink);
        self
    }

    pub fn with_token_counter(mut self, counter: Arc<dyn TokenCounter>) -> Self {
        self.token_counter = counter;
        self
    }
}

/// Result of one completed turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnOutcome {
    pub turn: u64,
    pub status: TurnStatus,
    /// Set when `status` is ok.
    pub final_text: Option<String>,
    /// Set when `status` is error.
    pub failure: Option<TurnFailure>,
    /// Tool actions dispatched.
    pub actions: usize,
    pub model_calls: usize,
    pub usage: TokenUsage,
}

impl TurnOutcome {
    pub fn is_ok(&self) -> bool {
        self.status == TurnStatus::Ok
    }

    /// The final answer, or the failure as an error.
    pub fn into_result(self) -> Result<String, AgentError> {
        match (self.final_text, self.failure) {
            (_, Some(failure)) => Err(AgentError::Turn(failure)),
            (Some(text), None) => Ok(text),
            (None, None) => Ok(String::new()),
        }
    }
}

/// Bookkeeping for the turn in progress.
#[derive(Debug, Default)]
struct TurnState {
    turn: u64,
    /// Entries produced this turn, committed to the transcript when it ends.
    entries: Vec<TranscriptEntry>,
    actions: usize,
    model_calls: usize,
    usage: TokenUsage,
}

impl TurnState {
    fn new(turn: u64) -> Self {
        Self {
            turn,
            ..Self::default()
        }
    }

    fn outcome(&self, final_text: Option<String>, failure: Option<TurnFailure>) -> TurnOutcome {
        let status = if failure.is_some() {
            TurnStatus::Error
        } else {
            TurnStatus::Ok
        };
        TurnOutcome {
            turn: self.turn,
            status,
            final_text,
            failure,
            actions: self.actions,
            model_calls: self.model_calls,
            usage: self.usage,
        }
    }
}

struct Observation {
    text: String,
    is_error: bool,
}

/// A conversation with one model and one tool registry.
///
/// Turns are serialized by `&mut self`; the transcript only grows.
pub struct AgentSession {
    id: Uuid,
    deps: AgentDeps,
    options: SessionOptions,
    transcript: Vec<TranscriptEntry>,
    turn: u64,
}

impl AgentSession {
    pub fn new(deps: AgentDeps, options: SessionOptions) -> Self {
        let id = Uuid::new_v4();
        info!(
            session_id = %id,
            tools = deps.tools.len(),
            format = ?options.reply_format,
            max_actions = options.max_actions_per_turn,
            "Session created"
        );
        Self {
            id,
            deps,
            options,
            transcript: Vec::new(),
            turn: 0,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Number of turns started so far.
    pub fn turn(&self) -> u64 {
        self.turn
    }

    pub fn transcript(&self) -> &[TranscriptEntry] {
        &self.transcript
    }

    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.deps.tools
    }

    /// Run one user turn to completion.
    ///
    /// Malformed replies and the action limit end the turn with an error
    /// status in the returned outcome. Model and hook failures are returned
    /// as `Err`; the session remains usable in both cases.
    pub async fn run_turn(&mut self, input: &str) -> Result<TurnOutcome, AgentError> {
        self.turn += 1;
        let mut state = TurnState::new(self.turn);
        info!(session_id = %self.id, turn = state.turn, "Turn started");

        let result = self.drive(&mut state, input).await;
        self.transcript.append(&mut state.entries);
        result
    }

    async fn drive(&self, state: &mut TurnState, input: &str) -> Result<TurnOutcome, AgentError> {
        self.deps
            .hooks
            .on_turn_start
            .run(TurnStartPayload {
                turn: state.turn,
                input: input.to_string(),
            })
            .await
            .map_err(AgentError::hook(HookPoint::TurnStart))?;

        self.record(state, Role::User, input).await;

        loop {
            let messages = self.messages(state);
            state.usage.prompt += messages
                .iter()
                .map(|m| self.deps.token_counter.count(&m.content))
                .sum::<usize>();
            state.model_calls += 1;
            debug!(
                turn = state.turn,
                call = state.model_calls,
                messages = messages.len(),
                "Calling model"
            );

            let reply = self
                .deps
                .model
                .complete(&messages)
                .await
                .map_err(AgentError::ModelCall)?;
            state.usage.completion += self.deps.token_counter.count(&reply);
            self.record(state, Role::Assistant, &reply).await;

            match parse_reply(self.options.reply_format, &reply) {
                ParsedReply::Action { tool, input: raw } => {
                    if state.actions >= self.options.max_actions_per_turn {
                        let failure = TurnFailure::IterationLimitExceeded {
                            limit: self.options.max_actions_per_turn,
                        };
                        return self.fail(state, failure).await;
                    }
                    state.actions += 1;
                    let observation = self.dispatch(&tool, &raw).await?;
                    let message = render_observation(
                        self.options.reply_format,
                        &tool,
                        &observation.text,
                        observation.is_error,
                    );
                    self.record(state, Role::User, &message).await;
                }
                ParsedReply::Final { text } => {
                    self.deps
                        .hooks
                        .on_final
                        .run(FinalPayload {
                            final_text: Some(text.clone()),
                            status: TurnStatus::Ok,
                        })
                        .await
                        .map_err(AgentError::hook(HookPoint::Final))?;
                    info!(
                        session_id = %self.id,
                        turn = state.turn,
                        actions = state.actions,
                        model_calls = state.model_calls,
                        tokens = state.usage.total(),
                        "Turn completed"
                    );
                    return Ok(state.outcome(Some(text), None));
                }
                ParsedReply::Malformed => {
                    let failure = TurnFailure::MalformedReply {
                        reply: preview(&reply),
                    };
                    return self.fail(state, failure).await;
                }
            }
        }
    }

    /// Flush every history sink and end the session.
    ///
    /// All sinks are flushed even if one fails; the first failure is
    /// returned.
    pub async fn close(self) -> Result<(), AgentError> {
        let mut first_error = None;
        for sink in &self.deps.history_sinks {
            if let Err(e) = sink.flush().await {
                warn!(session_id = %self.id, "History flush failed: {e:#}");
                first_error.get_or_insert(e);
            }
        }
        info!(session_id = %self.id, turns = self.turn, "Session closed");
        match first_error {
            Some(e) => Err(AgentError::History(e)),
            None => Ok(()),
        }
    }

    /// Validate, announce and execute one tool action.
    async fn dispatch(&self, tool: &str, raw: &str) -> Result<Observation, AgentError> {
        let prepared = self.deps.tools.prepare(tool, raw);
        let action_input = match &prepared {
            Ok(call) => call.input.clone(),
            Err(_) => decode_raw_input(raw),
        };
        self.deps
            .hooks
            .on_action
            .run(ActionPayload {
                tool: tool.to_string(),
                input: action_input,
            })
            .await
            .map_err(AgentError::hook(HookPoint::Action))?;

        debug!(tool, "Dispatching tool");
        let result = match prepared {
            Ok(call) => call.execute().await,
            Err(e) => Err(e),
        };
        let observation = match result {
            Ok(output) => Observation {
                text: output.to_text(),
                is_error: false,
            },
            Err(e) => {
                warn!(tool, "Tool failed: {e}");
                Observation {
                    text: format!("Error: {e}"),
                    is_error: true,
                }
            }
        };

        self.deps
            .hooks
            .on_observation
            .run(ObservationPayload {
                tool: tool.to_string(),
                observation: observation.text.clone(),
                is_error: observation.is_error,
            })
            .await
            .map_err(AgentError::hook(HookPoint::Observation))?;
        Ok(observation)
    }

    async fn fail(
        &self,
        state: &TurnState,
        failure: TurnFailure,
    ) -> Result<TurnOutcome, AgentError> {
        warn!(session_id = %self.id, turn = state.turn, "Turn failed: {failure}");
        self.deps
            .hooks
            .on_final
            .run(FinalPayload {
                final_text: None,
                status: TurnStatus::Error,
            })
            .await
            .map_err(AgentError::hook(HookPoint::Final))?;
        Ok(state.outcome(None, Some(failure)))
    }

    /// Add an entry to the turn and forward it to every history sink.
    async fn record(&self, state: &mut TurnState, role: Role, content: &str) {
        let entry = TranscriptEntry::new(state.turn, role, content);
        for sink in &self.deps.history_sinks {
            if let Err(e) = sink.record(&entry).await {
                warn!(session_id = %self.id, "History sink failed: {e:#}");
            }
        }
        state.entries.push(entry);
    }

    fn messages(&self, state: &TurnState) -> Vec<ChatMessage> {
        let mut messages = Vec::with_capacity(self.transcript.len() + state.entries.len() + 1);
        if !self.options.system_prompt.is_empty() {
            messages.push(ChatMessage::system(self.options.system_prompt.clone()));
        }
        messages.extend(
            self.transcript
                .iter()
                .chain(&state.entries)
                .map(TranscriptEntry::to_message),
        );
        messages
    }
}

fn preview(reply: &str) -> String {
    match reply.char_indices().nth(REPLY_PREVIEW_CHARS) {
        Some((idx, _)) => format!("{}...", &reply[..idx]),
        None => reply.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use serde::{Deserialize, Serialize};

    use memo_hooks::{HookEntry, HookRegistry};
    use memo_tools::{ToolDescriptor, ToolOutput};

    use crate::history::XmlHistoryFile;

    /// Replies from a fixed script, recording every conversation it sees.
    struct ScriptedModel {
        replies: Mutex<VecDeque<anyhow::Result<String>>>,
        seen: Mutex<Vec<Vec<ChatMessage>>>,
    }

    impl ScriptedModel {
        fn new<I, S>(replies: I) -> Arc<Self>
        where
            I: IntoIterator<Item = S>,
            S: Into<String>,
        {
            Arc::new(Self {
                replies: Mutex::new(replies.into_iter().map(|r| Ok(r.into())).collect()),
                seen: Mutex::new(Vec::new()),
            })
        }

        fn push_error(&self, message: &str) {
            self.replies
                .lock()
                .unwrap()
                .push_front(Err(anyhow::anyhow!(message.to_string())));
        }

        fn calls(&self) -> usize {
            self.seen.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl ModelClient for ScriptedModel {
        async fn complete(&self, messages: &[ChatMessage]) -> anyhow::Result<String> {
            self.seen.lock().unwrap().push(messages.to_vec());
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok("<final>script exhausted</final>".to_string()))
        }
    }

    #[derive(Serialize, Deserialize)]
    struct EchoInput {
        text: String,
    }

    fn echo_tool(calls: Arc<AtomicUsize>) -> ToolDescriptor {
        ToolDescriptor::typed("echo", "Echo text back.", move |input: EchoInput| {
            let calls = calls.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(ToolOutput::text(format!("echo:{}", input.text)))
            }
        })
    }

    fn failing_tool() -> ToolDescriptor {
        ToolDescriptor::typed("explode", "Always fails.", |_input: String| async move {
            anyhow::bail!("kaboom")
        })
    }

    fn registry(calls: &Arc<AtomicUsize>) -> ToolRegistry {
        ToolRegistry::new()
            .with(echo_tool(calls.clone()))
            .with(failing_tool())
    }

    type Log = Arc<Mutex<Vec<String>>>;

    fn push(log: &Log, line: impl Into<String>) {
        log.lock().unwrap().push(line.into());
    }

    #[tokio::test]
    async fn test_hook_order_across_a_turn() {
        let log: Log = Arc::default();
        let calls = Arc::new(AtomicUsize::new(0));
        let model = ScriptedModel::new([
            r#"{"tool":"echo","input":{"text":"hello"}}"#,
            r#"{"final":"done"}"#,
        ]);

        let hooks = HookRegistry::new()
            .on_turn_start(HookEntry::sync_listener({
                let log = log.clone();
                move |p: &TurnStartPayload| {
                    push(&log, format!("start:{}:{}", p.turn, p.input));
                    Ok(())
                }
            }))
            .on_turn_start(HookEntry::middleware({
                let log = log.clone();
                move |next: memo_hooks::Next<TurnStartPayload>, _p| {
                    let log = log.clone();
                    async move {
                        push(&log, "start-mw-before");
                        next.run().await?;
                        push(&log, "start-mw-after");
                        Ok(())
                    }
                }
            }))
            .on_action(HookEntry::sync_listener({
                let log = log.clone();
                move |p: &ActionPayload| {
                    push(
                        &log,
                        format!("action:{}:{}", p.tool, serde_json::to_string(&p.input)?),
                    );
                    Ok(())
                }
            }))
            .on_observation(HookEntry::sync_listener({
                let log = log.clone();
                move |p: &ObservationPayload| {
                    push(&log, format!("ob:{}", p.observation));
                    Ok(())
                }
            }))
            .on_observation(HookEntry::middleware({
                let log = log.clone();
                move |next: memo_hooks::Next<ObservationPayload>, _p| {
                    let log = log.clone();
                    async move {
                        push(&log, "ob-mw-before");
                        next.run().await?;
                        push(&log, "ob-mw-after");
                        Ok(())
                    }
                }
            }))
            .on_final(HookEntry::sync_listener({
                let log = log.clone();
                move |p: &FinalPayload| {
                    let text = p.final_text.clone().unwrap_or_default();
                    push(&log, format!("final:{text}:{}", p.status));
                    Ok(())
                }
            }))
            .build();

        let deps = AgentDeps::new(registry(&calls), model.clone()).with_hooks(hooks);
        let options = SessionOptions::once().with_reply_format(ReplyFormat::Json);
        let mut session = AgentSession::new(deps, options);

        let outcome = session.run_turn("hi").await.unwrap();
        assert_eq!(outcome.final_text.as_deref(), Some("done"));
        assert_eq!(outcome.status, TurnStatus::Ok);
        assert_eq!(outcome.actions, 1);
        assert_eq!(outcome.model_calls, 2);
        assert_eq!(model.calls(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        assert_eq!(
            *log.lock().unwrap(),
            vec![
                "start:1:hi",
                "start-mw-before",
                "start-mw-after",
                r#"action:echo:{"text":"hello"}"#,
                "ob:echo:hello",
                "ob-mw-before",
                "ob-mw-after",
                "final:done:ok",
            ]
        );
    }

    #[tokio::test]
    async fn test_observation_is_fed_back_to_model() {
        let calls = Arc::new(AtomicUsize::new(0));
        let model = ScriptedModel::new([
            r#"<action tool="echo">{"text":"ping"}</action>"#,
            "<final>pong</final>",
        ]);
        let deps = AgentDeps::new(registry(&calls), model.clone());
        let mut session =
            AgentSession::new(deps, SessionOptions::default().with_system_prompt("be brief"));

        let outcome = session.run_turn("go").await.unwrap();
        assert_eq!(outcome.into_result().unwrap(), "pong");

        let seen = model.seen.lock().unwrap();
        let second = &seen[1];
        assert_eq!(second[0], ChatMessage::system("be brief"));
        assert_eq!(second[1], ChatMessage::user("go"));
        assert_eq!(
            second.last().unwrap().content,
            "<observation tool=\"echo\" status=\"ok\">\necho:ping\n</observation>"
        );
    }

    #[tokio::test]
    async fn test_tool_failures_become_observations() {
        let calls = Arc::new(AtomicUsize::new(0));
        let model = ScriptedModel::new([
            r#"<action tool="nope">x</action>"#,
            r#"<action tool="echo">[1, 2]</action>"#,
            r#"<action tool="explode">now</action>"#,
            "<final>recovered</final>",
        ]);
        let observations: Arc<Mutex<Vec<(String, bool)>>> = Arc::default();
        let actions: Arc<Mutex<Vec<serde_json::Value>>> = Arc::default();
        let hooks = HookRegistry::new()
            .on_action(HookEntry::sync_listener({
                let actions = actions.clone();
                move |p: &ActionPayload| {
                    actions.lock().unwrap().push(p.input.clone());
                    Ok(())
                }
            }))
            .on_observation(HookEntry::sync_listener({
                let observations = observations.clone();
                move |p: &ObservationPayload| {
                    observations
                        .lock()
                        .unwrap()
                        .push((p.observation.clone(), p.is_error));
                    Ok(())
                }
            }))
            .build();
        let deps = AgentDeps::new(registry(&calls), model).with_hooks(hooks);
        let mut session = AgentSession::new(deps, SessionOptions::default());

        let outcome = session.run_turn("try things").await.unwrap();
        assert!(outcome.is_ok());
        assert_eq!(outcome.actions, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        let observations = observations.lock().unwrap();
        assert_eq!(observations[0], ("Error: unknown tool `nope`".to_string(), true));
        assert!(observations[1].0.starts_with("Error: invalid input for `echo`"));
        assert_eq!(observations[2], ("Error: `explode` failed: kaboom".to_string(), true));
        assert!(observations.iter().all(|(_, is_error)| *is_error));

        let actions = actions.lock().unwrap();
        assert_eq!(actions[0], serde_json::json!("x"));
        assert_eq!(actions[1], serde_json::json!([1, 2]));
    }

    #[tokio::test]
    async fn test_turn_numbers_and_transcript_grow() {
        let calls = Arc::new(AtomicUsize::new(0));
        let model = ScriptedModel::new(["<final>a</final>", "<final>b</final>"]);
        let starts: Arc<Mutex<Vec<u64>>> = Arc::default();
        let hooks = HookRegistry::new()
            .on_turn_start(HookEntry::sync_listener({
                let starts = starts.clone();
                move |p: &TurnStartPayload| {
                    starts.lock().unwrap().push(p.turn);
                    Ok(())
                }
            }))
            .build();
        let deps = AgentDeps::new(registry(&calls), model.clone()).with_hooks(hooks);
        let mut session = AgentSession::new(deps, SessionOptions::default());

        assert_eq!(session.run_turn("one").await.unwrap().turn, 1);
        assert_eq!(session.run_turn("two").await.unwrap().turn, 2);
        assert_eq!(*starts.lock().unwrap(), vec![1, 2]);
        assert_eq!(session.turn(), 2);

        let transcript = session.transcript();
        assert_eq!(transcript.len(), 4);
        assert_eq!(transcript[2], TranscriptEntry::new(2, Role::User, "two"));

        // The second call sees the whole first turn.
        assert_eq!(model.seen.lock().unwrap()[1].len(), 3);
    }

    #[tokio::test]
    async fn test_malformed_reply_fails_turn() {
        let calls = Arc::new(AtomicUsize::new(0));
        let model = ScriptedModel::new(["I am not following the format", "<final>ok</final>"]);
        let finals: Arc<Mutex<Vec<FinalPayload>>> = Arc::default();
        let hooks = HookRegistry::new()
            .on_final(HookEntry::sync_listener({
                let finals = finals.clone();
                move |p: &FinalPayload| {
                    finals.lock().unwrap().push(p.clone());
                    Ok(())
                }
            }))
            .build();
        let deps = AgentDeps::new(registry(&calls), model).with_hooks(hooks);
        let mut session = AgentSession::new(deps, SessionOptions::default());

        let outcome = session.run_turn("hello").await.unwrap();
        assert_eq!(outcome.status, TurnStatus::Error);
        assert_eq!(
            outcome.failure,
            Some(TurnFailure::MalformedReply {
                reply: "I am not following the format".into()
            })
        );
        assert!(matches!(
            outcome.into_result(),
            Err(AgentError::Turn(TurnFailure::MalformedReply { .. }))
        ));
        assert_eq!(
            finals.lock().unwrap()[0],
            FinalPayload {
                final_text: None,
                status: TurnStatus::Error
            }
        );

        // The session keeps going.
        let outcome = session.run_turn("again").await.unwrap();
        assert_eq!(outcome.turn, 2);
        assert_eq!(outcome.status, TurnStatus::Ok);
        assert_eq!(outcome.final_text.as_deref(), Some("ok"));
        assert_eq!(session.turn(), 2);
    }

    #[tokio::test]
    async fn test_iteration_limit() {
        let calls = Arc::new(AtomicUsize::new(0));
        let action = r#"<action tool="echo">{"text":"again"}</action>"#;
        let model = ScriptedModel::new([action, action, action]);
        let deps = AgentDeps::new(registry(&calls), model.clone());
        let mut session = AgentSession::new(deps, SessionOptions::once());

        let outcome = session.run_turn("loop").await.unwrap();
        assert_eq!(
            outcome.failure,
            Some(TurnFailure::IterationLimitExceeded { limit: 1 })
        );
        assert_eq!(outcome.actions, 1);
        assert_eq!(outcome.model_calls, 2);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_model_failure_is_returned_and_session_survives() {
        let calls = Arc::new(AtomicUsize::new(0));
        let model = ScriptedModel::new(["<final>fine</final>"]);
        model.push_error("upstream 503");
        let deps = AgentDeps::new(registry(&calls), model.clone());
        let mut session = AgentSession::new(deps, SessionOptions::default());

        let err = session.run_turn("first").await.unwrap_err();
        assert!(matches!(err, AgentError::ModelCall(_)));
        assert!(err.to_string().contains("upstream 503"));
        assert_eq!(
            session.transcript(),
            &[TranscriptEntry::new(1, Role::User, "first")]
        );

        let outcome = session.run_turn("second").await.unwrap();
        assert_eq!(outcome.turn, 2);
        assert_eq!(outcome.final_text.as_deref(), Some("fine"));
    }

    #[tokio::test]
    async fn test_hook_error_aborts_turn() {
        let calls = Arc::new(AtomicUsize::new(0));
        let model = ScriptedModel::new(["<final>never</final>"]);
        let hooks = HookRegistry::new()
            .on_turn_start(HookEntry::sync_listener(|_: &TurnStartPayload| {
                anyhow::bail!("denied")
            }))
            .build();
        let deps = AgentDeps::new(registry(&calls), model.clone()).with_hooks(hooks);
        let mut session = AgentSession::new(deps, SessionOptions::default());

        let err = session.run_turn("hi").await.unwrap_err();
        assert!(matches!(
            err,
            AgentError::Hook {
                point: HookPoint::TurnStart,
                ..
            }
        ));
        assert_eq!(model.calls(), 0);
    }

    #[tokio::test]
    async fn test_usage_is_counted() {
        let calls = Arc::new(AtomicUsize::new(0));
        let model = ScriptedModel::new(["<final>the answer is forty two</final>"]);
        let deps = AgentDeps::new(registry(&calls), model);
        let mut session = AgentSession::new(deps, SessionOptions::default());

        let outcome = session.run_turn("what is the answer").await.unwrap();
        assert_eq!(outcome.usage.prompt, 4);
        assert!(outcome.usage.completion > 0);
        assert_eq!(
            outcome.usage.total(),
            outcome.usage.prompt + outcome.usage.completion
        );
    }

    struct BrokenSink;

    #[async_trait]
    impl HistorySink for BrokenSink {
        async fn record(&self, _entry: &TranscriptEntry) -> anyhow::Result<()> {
            anyhow::bail!("disk full")
        }

        async fn flush(&self) -> anyhow::Result<()> {
            anyhow::bail!("disk full")
        }
    }

    #[tokio::test]
    async fn test_history_sinks() {
        let dir = tempfile::tempdir().unwrap();
        let calls = Arc::new(AtomicUsize::new(0));
        let model = ScriptedModel::new(["<final>saved</final>"]);
        let xml = Arc::new(XmlHistoryFile::new(dir.path().join("history.xml")));
        let deps = AgentDeps::new(registry(&calls), model)
            .with_history_sink(Arc::new(BrokenSink))
            .with_history_sink(xml.clone());
        let mut session = AgentSession::new(deps, SessionOptions::default());

        let outcome = session.run_turn("remember me").await.unwrap();
        assert!(outcome.is_ok());

        let err = session.close().await.unwrap_err();
        assert!(matches!(err, AgentError::History(_)));

        let written = std::fs::read_to_string(xml.path()).unwrap();
        assert!(written.contains("remember me"));
        assert!(written.contains("<final>saved</final>"));
    }

    #[test]
    fn test_preview_truncates_on_char_boundary() {
        let long = "é".repeat(REPLY_PREVIEW_CHARS + 10);
        let short = preview(&long);
        assert!(short.ends_with("..."));
        assert_eq!(short.chars().count(), REPLY_PREVIEW_CHARS + 3);
        assert_eq!(preview("tiny"), "tiny");
    }
}
