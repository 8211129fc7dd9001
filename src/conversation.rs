//! The append-only transcript a session sends to the model.
//!
//! Besides keeping order, the conversation guards the tool-call protocol: once
//! an assistant message requests tool calls, the only thing that may follow is
//! one tool result per requested id. Everything else is refused until the round
//! is answered.

use anyhow::{bail, Result};
use std::collections::HashSet;
use tracing::{debug, trace};

use crate::providers::types::content::ToolResult;
use crate::providers::types::message::{Message, Role};

#[derive(Debug, Default)]
pub struct Conversation {
    messages: Vec<Message>,
    pending_tool_calls: Vec<String>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append_user(&mut self, text: &str) -> Result<()> {
        self.ensure_no_pending("user message")?;
        self.push(Message::user(text)?);
        Ok(())
    }

    /// Append a model response, keeping its tool-call requests exactly as issued.
    pub fn append_assistant(&mut self, message: Message) -> Result<()> {
        if message.role != Role::Assistant {
            bail!("expected an assistant message, got {:?}", message.role);
        }
        self.ensure_no_pending("assistant message")?;

        let mut seen = HashSet::new();
        let ids: Vec<String> = message.tool_use().into_iter().map(|t| t.id).collect();
        for id in &ids {
            if !seen.insert(id.as_str()) {
                bail!("tool call id '{}' is requested more than once", id);
            }
        }

        self.pending_tool_calls = ids;
        self.push(message);
        Ok(())
    }

    pub fn append_tool_result(&mut self, result: ToolResult) -> Result<()> {
        let Some(position) = self
            .pending_tool_calls
            .iter()
            .position(|id| *id == result.tool_call_id)
        else {
            bail!(
                "tool result for '{}' does not answer an outstanding tool call",
                result.tool_call_id
            );
        };
        self.pending_tool_calls.remove(position);
        self.push(Message::tool(result)?);
        Ok(())
    }

    /// The transcript in append order.
    pub fn snapshot(&self) -> &[Message] {
        &self.messages
    }

    /// Tool call ids still waiting for a result.
    pub fn pending_tool_calls(&self) -> &[String] {
        &self.pending_tool_calls
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    fn ensure_no_pending(&self, what: &str) -> Result<()> {
        if !self.pending_tool_calls.is_empty() {
            bail!(
                "cannot append a {} while tool calls are unanswered: {}",
                what,
                self.pending_tool_calls.join(", ")
            );
        }
        Ok(())
    }

    fn push(&mut self, message: Message) {
        debug!(id = %message.id, role = ?message.role, "appending message");
        trace!(summary = %message.summary(), created = message.created, "message content");
        self.messages.push(message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::types::content::ToolUse;

    fn request(id: &str) -> ToolUse {
        ToolUse::new(id, "read_file", r#"{"file_path":"a.txt"}"#)
    }

    fn result(id: &str) -> ToolResult {
        ToolResult {
            tool_call_id: id.to_string(),
            tool_name: "read_file".to_string(),
            output: r#"{"content":""}"#.to_string(),
            is_error: false,
        }
    }

    #[test]
    fn test_snapshot_keeps_append_order() -> Result<()> {
        let mut conversation = Conversation::new();
        conversation.append_user("one")?;
        conversation.append_assistant(Message::assistant("two")?)?;
        conversation.append_user("three")?;
        conversation.append_assistant(Message::assistant_with_tool_calls(
            "",
            vec![request("a"), request("b")],
        )?)?;
        conversation.append_tool_result(result("b"))?;
        conversation.append_tool_result(result("a"))?;
        conversation.append_assistant(Message::assistant("four")?)?;

        let roles: Vec<Role> = conversation.snapshot().iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            vec![
                Role::User,
                Role::Assistant,
                Role::User,
                Role::Assistant,
                Role::Tool,
                Role::Tool,
                Role::Assistant
            ]
        );
        assert_eq!(conversation.snapshot()[0].text(), "one");
        assert_eq!(conversation.snapshot()[2].text(), "three");
        assert_eq!(
            conversation.snapshot()[4].tool_result().map(|r| r.tool_call_id.as_str()),
            Some("b")
        );
        assert_eq!(conversation.snapshot()[6].text(), "four");
        assert_eq!(conversation.len(), 7);
        Ok(())
    }

    #[test]
    fn test_tool_calls_are_stored_verbatim() -> Result<()> {
        let mut conversation = Conversation::new();
        conversation.append_user("read it")?;
        let call = ToolUse::new("call_xyz", "read_file", "{ \"file_path\" :\"a.txt\" }");
        conversation.append_assistant(Message::assistant_with_tool_calls("", vec![call.clone()])?)?;

        assert_eq!(conversation.snapshot()[1].tool_use(), vec![call]);
        assert_eq!(conversation.pending_tool_calls(), ["call_xyz".to_string()]);
        Ok(())
    }

    #[test]
    fn test_rejects_unknown_and_repeated_results() -> Result<()> {
        let mut conversation = Conversation::new();
        conversation.append_user("go")?;
        conversation
            .append_assistant(Message::assistant_with_tool_calls("", vec![request("a")])?)?;

        assert!(conversation.append_tool_result(result("zzz")).is_err());
        conversation.append_tool_result(result("a"))?;
        assert!(conversation.append_tool_result(result("a")).is_err());
        assert_eq!(conversation.len(), 3);
        Ok(())
    }

    #[test]
    fn test_rejects_messages_while_round_is_open() -> Result<()> {
        let mut conversation = Conversation::new();
        conversation.append_user("go")?;
        conversation.append_assistant(Message::assistant_with_tool_calls(
            "",
            vec![request("a"), request("b")],
        )?)?;
        conversation.append_tool_result(result("a"))?;

        assert!(conversation.append_user("next").is_err());
        assert!(conversation
            .append_assistant(Message::assistant("done")?)
            .is_err());
        assert_eq!(conversation.pending_tool_calls(), ["b".to_string()]);

        conversation.append_tool_result(result("b"))?;
        assert!(conversation.pending_tool_calls().is_empty());
        conversation.append_user("next")?;
        Ok(())
    }

    #[test]
    fn test_rejects_duplicate_request_ids() -> Result<()> {
        let mut conversation = Conversation::new();
        conversation.append_user("go")?;
        let duplicated = Message::assistant_with_tool_calls("", vec![request("a"), request("a")])?;

        assert!(conversation.append_assistant(duplicated).is_err());
        assert_eq!(conversation.len(), 1);
        Ok(())
    }

    #[test]
    fn test_rejects_wrong_role() -> Result<()> {
        let mut conversation = Conversation::new();
        assert!(conversation.append_assistant(Message::user("hi")?).is_err());
        assert!(conversation.is_empty());
        Ok(())
    }
}
