//! The conversation loop: model replies, tool dispatch, result feedback.
//!
//! Each user turn runs at most one tool invocation. A model reply that
//! parses as a tool-invocation payload is dispatched and its result (or
//! the error description) is folded back into the history as a
//! system-role message before one follow-up model call produces the
//! final answer. Everything else is a direct reply. Model failures never
//! crash the session; they show up as error-shaped assistant messages.

mod payload;

pub use payload::{parse_reply, ParsedReply};

use std::sync::Arc;
use tracing::{info, warn};

use crate::mcp::{CallOptions, ToolInvoker};
use crate::model::{ChatMessage, ModelClient};

/// One conversation against the tool catalog.
///
/// The history is append-only for the life of the session and discarded
/// with it; nothing is persisted.
pub struct ChatSession {
    model: Arc<dyn ModelClient>,
    invoker: ToolInvoker,
    history: Vec<ChatMessage>,
}

impl ChatSession {
    /// Start a session, embedding the current aggregated tool catalog
    /// into the system prompt.
    pub async fn new(model: Arc<dyn ModelClient>, invoker: ToolInvoker) -> Self {
        let catalog = invoker.registry().list_tools().await;
        let prompt = build_system_prompt(&catalog);
        Self {
            model,
            invoker,
            history: vec![ChatMessage::system(prompt)],
        }
    }

    /// Full message history, system prompt included.
    pub fn history(&self) -> &[ChatMessage] {
        &self.history
    }

    /// Run one user turn, returning the messages it appended (the user
    /// message included).
    pub async fn turn(&mut self, user_input: &str, opts: &CallOptions) -> Vec<ChatMessage> {
        let turn_start = self.history.len();
        self.push(ChatMessage::user(user_input));

        let reply = match self.model.complete(&self.history, opts).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!(error = %e, "model call failed");
                self.push(ChatMessage::assistant(format!("[model error: {e}]")));
                return self.history[turn_start..].to_vec();
            }
        };

        match parse_reply(&reply) {
            ParsedReply::Direct => {
                self.push(ChatMessage::assistant(reply));
            }
            ParsedReply::ToolCall(request) => {
                info!(server = %request.server, tool = %request.tool, "model requested a tool");
                self.push(ChatMessage::assistant(reply));

                let feedback = match self.invoker.dispatch(&request, opts).await {
                    Ok(result) => format!(
                        "Tool '{}' on server '{}' returned: {}",
                        request.tool, request.server, result
                    ),
                    Err(e) => format!(
                        "Tool '{}' on server '{}' failed: {}",
                        request.tool, request.server, e
                    ),
                };
                self.push(ChatMessage::system(feedback));

                // One follow-up model turn turns the raw result (or the
                // error) into a user-facing answer; the follow-up is never
                // reinterpreted as another tool call.
                match self.model.complete(&self.history, opts).await {
                    Ok(summary) => self.push(ChatMessage::assistant(summary)),
                    Err(e) => {
                        warn!(error = %e, "follow-up model call failed");
                        self.push(ChatMessage::assistant(format!("[model error: {e}]")));
                    }
                }
            }
        }

        self.history[turn_start..].to_vec()
    }

    fn push(&mut self, message: ChatMessage) {
        self.history.push(message);
    }
}

/// Render the aggregated tool catalog into the system prompt.
fn build_system_prompt(catalog: &[(String, crate::mcp::ToolDescriptor)]) -> String {
    let mut prompt = String::from(
        "You are a helpful assistant with access to the following tools, \
         each hosted on a named server.\n\n",
    );

    if catalog.is_empty() {
        prompt.push_str("(no tools are currently available)\n");
    }

    let mut current_server = None;
    for (server, tool) in catalog {
        if current_server != Some(server) {
            prompt.push_str(&format!("Server '{server}':\n"));
            current_server = Some(server);
        }
        prompt.push_str(&format!("  - {}: {}\n", tool.name, tool.description));
        for param in &tool.params {
            let required = if param.required { ", required" } else { "" };
            prompt.push_str(&format!(
                "      {} ({}{}): {}\n",
                param.name,
                param.kind.label(),
                required,
                param.description
            ));
        }
    }

    prompt.push_str(
        "\nTo use a tool, reply with ONLY a JSON object of exactly this shape \
         and nothing else:\n\
         {\"server\": \"<server name>\", \"tool\": \"<tool name>\", \
         \"arguments\": {\"<param>\": <value>}}\n\n\
         Any other reply is shown to the user as your answer. After a tool \
         result is provided to you, explain it to the user in plain language.",
    );

    prompt
}
