use tracing::{debug, info, warn};

use crate::conversation::Conversation;
use crate::errors::{AgentError, AgentResult, TurnPhase};
use crate::providers::base::{CompletionRequest, Provider};
use crate::providers::types::content::{ToolResult, ToolUse};
use crate::providers::types::message::Message;
use crate::providers::types::tool::{ToolChoice, ToolSpec};
use crate::reasoning::ReasoningParser;
use crate::tools::ToolRegistry;

pub const DEFAULT_MODEL: &str = "deepseek-r1-distill-llama-70b";
pub const DEFAULT_TEMPERATURE: f32 = 0.7;
pub const DEFAULT_MAX_TOKENS: i32 = 4096;

/// Per-session model settings, sent with every call.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentConfig {
    pub model: String,
    pub system: Option<String>,
    pub temperature: f32,
    pub max_tokens: i32,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            system: None,
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }
}

/// Presentation hooks for a turn. Every method defaults to doing nothing.
pub trait TurnObserver {
    fn model_call_started(&mut self, _phase: TurnPhase) {}
    fn model_call_finished(&mut self, _phase: TurnPhase) {}
    fn tool_started(&mut self, _call: &ToolUse) {}
    fn tool_finished(&mut self, _result: &ToolResult) {}
    /// The reasoning segment of the final answer, possibly empty.
    fn reasoning(&mut self, _reasoning: &str) {}
}

impl TurnObserver for () {}

/// Agent integrates a model provider with the local tools it may call
pub struct Agent {
    provider: Box<dyn Provider>,
    tools: ToolRegistry,
    conversation: Conversation,
    config: AgentConfig,
    parser: ReasoningParser,
}

impl Agent {
    pub fn new(provider: Box<dyn Provider>, tools: ToolRegistry, config: AgentConfig) -> Self {
        Self {
            provider,
            tools,
            conversation: Conversation::new(),
            config,
            parser: ReasoningParser::default(),
        }
    }

    /// Use different reasoning delimiters than `<think>` / `</think>`.
    pub fn with_parser(mut self, parser: ReasoningParser) -> Self {
        self.parser = parser;
        self
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    /// Run one turn and return the visible answer.
    ///
    /// The model is called once with the tools offered. If it asks for tools,
    /// every call is dispatched in order and answered, then the model is
    /// called once more without tools and that answer is final. Tool failures
    /// go back to the model as data; only model-call failures and protocol
    /// violations end the turn with an error.
    pub fn reply(&mut self, input: &str, observer: &mut dyn TurnObserver) -> AgentResult<String> {
        self.conversation.append_user(input).map_err(internal)?;

        let response = self.call_model(TurnPhase::Initial, observer)?;
        let calls = response.tool_use();

        let answer = if calls.is_empty() {
            response
        } else {
            self.conversation.append_assistant(response).map_err(internal)?;
            self.run_tool_round(&calls, observer)?;

            let follow_up = self.call_model(TurnPhase::FollowUp, observer)?;
            if follow_up.has_tool_use() {
                warn!(
                    requested = follow_up.tool_use().len(),
                    "ignoring tool calls requested after the tool round"
                );
                Message::assistant(&follow_up.text()).map_err(internal)?
            } else {
                follow_up
            }
        };

        let raw = answer.text();
        self.conversation.append_assistant(answer).map_err(internal)?;

        let parsed = self.parser.parse(&raw);
        if let Some(reasoning) = &parsed.reasoning {
            observer.reasoning(reasoning);
        }
        Ok(parsed.visible)
    }

    fn run_tool_round(
        &mut self,
        calls: &[ToolUse],
        observer: &mut dyn TurnObserver,
    ) -> AgentResult<()> {
        for call in calls {
            observer.tool_started(call);
            debug!(id = %call.id, tool = %call.name, "dispatching tool call");
            let payload = self.tools.dispatch(&call.name, &call.arguments);
            let result = ToolResult::from_payload(call, &payload);
            observer.tool_finished(&result);
            self.conversation
                .append_tool_result(result)
                .map_err(internal)?;
        }
        Ok(())
    }

    fn call_model(
        &self,
        phase: TurnPhase,
        observer: &mut dyn TurnObserver,
    ) -> AgentResult<Message> {
        let tools: &[ToolSpec] = match phase {
            TurnPhase::Initial => self.tools.specs(),
            TurnPhase::FollowUp => &[],
        };
        let request = CompletionRequest {
            model: &self.config.model,
            system: self.config.system.as_deref().unwrap_or(""),
            messages: self.conversation.snapshot(),
            tools,
            tool_choice: (!tools.is_empty()).then_some(ToolChoice::Auto),
            temperature: Some(self.config.temperature),
            max_tokens: Some(self.config.max_tokens),
        };

        observer.model_call_started(phase);
        let result = self.provider.complete(&request);
        observer.model_call_finished(phase);

        let (message, usage) = result.map_err(|source| AgentError::Provider { phase, source })?;
        info!(
            %phase,
            id = %message.id,
            tool_calls = message.tool_use().len(),
            input_tokens = ?usage.input_tokens,
            output_tokens = ?usage.output_tokens,
            "model call finished"
        );
        Ok(message)
    }
}

fn internal(err: anyhow::Error) -> AgentError {
    AgentError::Internal(format!("{:#}", err))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ToolError;
    use crate::providers::mock::MockProvider;
    use crate::providers::types::message::Role;
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn echo_registry(calls: Arc<AtomicUsize>) -> ToolRegistry {
        let mut registry = ToolRegistry::new();
        registry
            .register(
                ToolSpec::new(
                    "echo",
                    "Echoes back the input",
                    json!({
                        "type": "object",
                        "properties": {"message": {"type": "string"}},
                        "required": ["message"]
                    }),
                ),
                move |args: &Value| {
                    calls.fetch_add(1, Ordering::SeqCst);
                    match args["message"].as_str() {
                        Some("fail") => Err(ToolError::ExecutionError("Error echoing: fail".to_string())),
                        _ => Ok(json!({ "echo": args["message"] })),
                    }
                },
            )
            .unwrap();
        registry
    }

    fn agent(provider: &Arc<MockProvider>, calls: &Arc<AtomicUsize>) -> Agent {
        Agent::new(
            Box::new(provider.clone()),
            echo_registry(calls.clone()),
            AgentConfig::default(),
        )
    }

    fn tool_calls(calls: &[(&str, &str, &str)]) -> Message {
        Message::assistant_with_tool_calls(
            "",
            calls
                .iter()
                .map(|(id, name, args)| ToolUse::new(*id, *name, *args))
                .collect(),
        )
        .unwrap()
    }

    #[derive(Default)]
    struct Recorder {
        events: Vec<String>,
    }

    impl TurnObserver for Recorder {
        fn model_call_started(&mut self, phase: TurnPhase) {
            self.events.push(format!("start {:?}", phase));
        }
        fn model_call_finished(&mut self, phase: TurnPhase) {
            self.events.push(format!("finish {:?}", phase));
        }
        fn tool_started(&mut self, call: &ToolUse) {
            self.events.push(format!("tool {}", call.name));
        }
        fn tool_finished(&mut self, result: &ToolResult) {
            self.events.push(format!("done {} error={}", result.tool_name, result.is_error));
        }
        fn reasoning(&mut self, reasoning: &str) {
            self.events.push(format!("reasoning {}", reasoning));
        }
    }

    #[test]
    fn test_direct_answer() {
        let provider = Arc::new(MockProvider::new(vec![Message::assistant(
            "<think>easy one</think>Hello there!",
        )
        .unwrap()]));
        let calls = Arc::new(AtomicUsize::new(0));
        let mut agent = agent(&provider, &calls);
        let mut recorder = Recorder::default();

        let answer = agent.reply("hi", &mut recorder).unwrap();
        assert_eq!(answer, "Hello there!");
        assert_eq!(
            recorder.events,
            vec!["start Initial", "finish Initial", "reasoning easy one"]
        );

        let messages = agent.conversation().snapshot();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::User);
        assert_eq!(messages[1].text(), "<think>easy one</think>Hello there!");

        let requests = provider.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].tool_names, vec!["echo"]);
        assert_eq!(requests[0].tool_choice, Some(ToolChoice::Auto));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_tool_round_pairs_every_call() {
        let provider = Arc::new(MockProvider::new(vec![
            tool_calls(&[
                ("call_1", "echo", r#"{"message": "hi"}"#),
                ("call_2", "not_a_tool", "{}"),
                ("call_3", "echo", r#"{"message": "fail"}"#),
            ]),
            Message::assistant("All done.").unwrap(),
        ]));
        let calls = Arc::new(AtomicUsize::new(0));
        let mut agent = agent(&provider, &calls);
        let mut recorder = Recorder::default();

        let answer = agent.reply("use the tools", &mut recorder).unwrap();
        assert_eq!(answer, "All done.");
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        let messages = agent.conversation().snapshot();
        let roles: Vec<Role> = messages.iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            vec![Role::User, Role::Assistant, Role::Tool, Role::Tool, Role::Tool, Role::Assistant]
        );
        assert_eq!(messages[1].tool_use().len(), 3);
        assert_eq!(messages[1].tool_use()[0].arguments, r#"{"message": "hi"}"#);

        let results: Vec<&ToolResult> = messages[2..5]
            .iter()
            .map(|m| m.tool_result().unwrap())
            .collect();
        let ids: Vec<&str> = results.iter().map(|r| r.tool_call_id.as_str()).collect();
        assert_eq!(ids, vec!["call_1", "call_2", "call_3"]);
        assert_eq!(results[0].output, r#"{"echo":"hi"}"#);
        assert!(!results[0].is_error);
        assert_eq!(results[1].output, r#"{"error":"unknown tool not_a_tool"}"#);
        assert!(results[1].is_error);
        assert_eq!(results[2].output, r#"{"error":"Error echoing: fail"}"#);
        assert!(agent.conversation().pending_tool_calls().is_empty());

        assert_eq!(
            recorder.events,
            vec![
                "start Initial",
                "finish Initial",
                "tool echo",
                "done echo error=false",
                "tool not_a_tool",
                "done not_a_tool error=true",
                "tool echo",
                "done echo error=true",
                "start FollowUp",
                "finish FollowUp",
            ]
        );
    }

    #[test]
    fn test_follow_up_offers_no_tools() {
        let provider = Arc::new(MockProvider::new(vec![
            tool_calls(&[("call_1", "echo", r#"{"message": "hi"}"#)]),
            Message::assistant("ok").unwrap(),
        ]));
        let calls = Arc::new(AtomicUsize::new(0));
        agent(&provider, &calls).reply("go", &mut ()).unwrap();

        let requests = provider.requests();
        assert_eq!(requests.len(), 2);
        assert!(requests[1].tool_names.is_empty());
        assert_eq!(requests[1].tool_choice, None);
        assert_eq!(requests[1].messages.len(), 3);
        assert_eq!(requests[1].messages[2].role, Role::Tool);
    }

    #[test]
    fn test_follow_up_tool_requests_are_not_serviced() {
        let follow_up = Message::assistant_with_tool_calls(
            "<think></think>Here you go.",
            vec![ToolUse::new("call_9", "echo", r#"{"message": "again"}"#)],
        )
        .unwrap();
        let provider = Arc::new(MockProvider::new(vec![
            tool_calls(&[("call_1", "echo", r#"{"message": "hi"}"#)]),
            follow_up,
        ]));
        let calls = Arc::new(AtomicUsize::new(0));
        let mut agent = agent(&provider, &calls);
        let mut recorder = Recorder::default();

        let answer = agent.reply("go", &mut recorder).unwrap();
        assert_eq!(answer, "Here you go.");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(provider.requests().len(), 2);

        let last = agent.conversation().snapshot().last().unwrap();
        assert_eq!(last.role, Role::Assistant);
        assert!(!last.has_tool_use());
        assert!(agent.conversation().pending_tool_calls().is_empty());
        assert_eq!(recorder.events.last().unwrap(), "reasoning ");

        // The next turn starts cleanly
        agent.reply("thanks", &mut ()).unwrap();
    }

    #[test]
    fn test_follow_up_failure_keeps_tool_round() {
        let provider = Arc::new(MockProvider::scripted(vec![
            Ok(tool_calls(&[("call_1", "echo", r#"{"message": "hi"}"#)])),
            Err("Server error: 503".to_string()),
            Ok(Message::assistant("Recovered.").unwrap()),
        ]));
        let calls = Arc::new(AtomicUsize::new(0));
        let mut agent = agent(&provider, &calls);

        let err = agent.reply("go", &mut ()).unwrap_err();
        assert!(matches!(
            err,
            AgentError::Provider {
                phase: TurnPhase::FollowUp,
                ..
            }
        ));
        assert_eq!(err.to_string(), "follow-up model call failed: Server error: 503");

        let roles: Vec<Role> = agent.conversation().snapshot().iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::User, Role::Assistant, Role::Tool]);

        assert_eq!(agent.reply("try again", &mut ()).unwrap(), "Recovered.");
        assert_eq!(agent.conversation().len(), 5);
    }

    #[test]
    fn test_initial_failure() {
        let provider = Arc::new(MockProvider::scripted(vec![Err("connection refused".to_string())]));
        let calls = Arc::new(AtomicUsize::new(0));
        let mut agent = agent(&provider, &calls);
        let mut recorder = Recorder::default();

        let err = agent.reply("hello", &mut recorder).unwrap_err();
        assert_eq!(err.to_string(), "initial model call failed: connection refused");
        assert_eq!(recorder.events, vec!["start Initial", "finish Initial"]);
        assert_eq!(agent.conversation().len(), 1);
    }

    #[test]
    fn test_duplicate_tool_call_ids_are_internal_errors() {
        let provider = Arc::new(MockProvider::new(vec![tool_calls(&[
            ("call_1", "echo", r#"{"message": "a"}"#),
            ("call_1", "echo", r#"{"message": "b"}"#),
        ])]));
        let calls = Arc::new(AtomicUsize::new(0));
        let mut agent = agent(&provider, &calls);

        let err = agent.reply("go", &mut ()).unwrap_err();
        assert!(matches!(err, AgentError::Internal(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(agent.conversation().len(), 1);
    }

    #[test]
    fn test_custom_reasoning_markers() {
        let provider = Arc::new(MockProvider::new(vec![
            Message::assistant("<r>thinking</r>answer").unwrap()
        ]));
        let calls = Arc::new(AtomicUsize::new(0));
        let mut agent = agent(&provider, &calls)
            .with_parser(ReasoningParser::new("<r>", "</r>").unwrap());
        let mut recorder = Recorder::default();

        assert_eq!(agent.reply("q", &mut recorder).unwrap(), "answer");
        assert_eq!(recorder.events.last().unwrap(), "reasoning thinking");
    }
}
