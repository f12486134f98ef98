//! Strict detection of tool-invocation payloads in model output.

use serde::Deserialize;
use serde_json::Value;

use crate::mcp::InvocationRequest;

/// The only reply shape treated as a tool call: a JSON object with
/// exactly the fields `server`, `tool`, and `arguments`.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ToolCallPayload {
    server: String,
    tool: String,
    arguments: serde_json::Map<String, Value>,
}

/// Classification of one model reply.
#[derive(Debug)]
pub enum ParsedReply {
    /// The reply is exactly a tool-invocation payload.
    ToolCall(InvocationRequest),
    /// Anything else: a direct conversational answer.
    Direct,
}

/// Classify a model reply.
///
/// The match is a strict typed parse of the whole (trimmed) reply:
/// missing fields, extra fields, non-object arguments, or any surrounding
/// prose all land on the direct-reply path. A reply that happens to match
/// the shape by coincidence (say, a user asked the model to print such
/// JSON verbatim) is indistinguishable from an intended call; that
/// ambiguity is inherent to the protocol and deliberately left in place.
pub fn parse_reply(text: &str) -> ParsedReply {
    match serde_json::from_str::<ToolCallPayload>(text.trim()) {
        Ok(payload) => ParsedReply::ToolCall(InvocationRequest::new(
            payload.server,
            payload.tool,
            payload.arguments,
        )),
        Err(_) => ParsedReply::Direct,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text_is_direct() {
        assert!(matches!(
            parse_reply("The weather is nice."),
            ParsedReply::Direct
        ));
    }

    #[test]
    fn test_exact_payload_is_tool_call() {
        let reply = r#"{"server":"calc","tool":"add","arguments":{"a":2,"b":2}}"#;
        match parse_reply(reply) {
            ParsedReply::ToolCall(request) => {
                assert_eq!(request.server, "calc");
                assert_eq!(request.tool, "add");
                assert_eq!(request.arguments.len(), 2);
            }
            ParsedReply::Direct => panic!("expected tool call"),
        }
    }

    #[test]
    fn test_surrounding_whitespace_tolerated() {
        let reply = "\n  {\"server\":\"calc\",\"tool\":\"add\",\"arguments\":{}}  \n";
        assert!(matches!(parse_reply(reply), ParsedReply::ToolCall(_)));
    }

    #[test]
    fn test_missing_field_is_direct() {
        let reply = r#"{"server":"calc","tool":"add"}"#;
        assert!(matches!(parse_reply(reply), ParsedReply::Direct));
    }

    #[test]
    fn test_extra_field_is_direct() {
        let reply = r#"{"server":"calc","tool":"add","arguments":{},"reason":"because"}"#;
        assert!(matches!(parse_reply(reply), ParsedReply::Direct));
    }

    #[test]
    fn test_payload_embedded_in_prose_is_direct() {
        let reply = r#"Sure! I'll call {"server":"calc","tool":"add","arguments":{}} now."#;
        assert!(matches!(parse_reply(reply), ParsedReply::Direct));
    }

    #[test]
    fn test_non_object_arguments_is_direct() {
        let reply = r#"{"server":"calc","tool":"add","arguments":[1,2]}"#;
        assert!(matches!(parse_reply(reply), ParsedReply::Direct));
    }

    #[test]
    fn test_json_array_is_direct() {
        assert!(matches!(parse_reply(r#"[1,2,3]"#), ParsedReply::Direct));
    }
}
