//! Memory context injection.
//!
//! Turns retrieved memories into one additional system message inside an
//! outbound OpenAI-compatible chat request body, leaving every other field
//! and message untouched. Parse failures return the body unchanged; a
//! request without memory context is always better than a broken request.

use crate::models::RetrieveResult;
use serde_json::Value;

/// Header line of the injected context block.
const CONTEXT_HEADER: &str = "## Relevant Context from Memory";

/// Formats retrieved memories into a deterministic context string.
///
/// The given ordering is preserved; callers pass results already sorted by
/// similarity. Returns an empty string for an empty list.
#[must_use]
pub fn format_memories_as_context(memories: &[RetrieveResult]) -> String {
    if memories.is_empty() {
        return String::new();
    }

    let mut context = String::new();
    context.push_str(CONTEXT_HEADER);
    context.push_str("\n\n");
    context.push_str("The following information was retrieved from the user's memory:\n\n");

    for (i, memory) in memories.iter().enumerate() {
        context.push_str(&format!(
            "{}. [{}] {}\n",
            i + 1,
            memory.memory_type(),
            memory.content()
        ));
    }

    context.push_str("\nUse this context to provide a more personalized and informed response.\n");
    context
}

/// Inserts the memory context into a chat-completion request body as a
/// system message.
///
/// The message lands immediately after the last existing system message,
/// or at index 0 when there is none. An empty context, a body that does not
/// parse as JSON, or a missing/malformed `messages` array all return the
/// body unchanged.
#[must_use]
pub fn inject_system_message(body: &[u8], context: &str) -> Vec<u8> {
    if context.is_empty() {
        return body.to_vec();
    }

    let Ok(mut request) = serde_json::from_slice::<Value>(body) else {
        tracing::warn!("Memory injection skipped: request body is not valid JSON");
        return body.to_vec();
    };

    let Some(messages) = request.get_mut("messages").and_then(Value::as_array_mut) else {
        tracing::debug!("Memory injection skipped: no messages array in request");
        return body.to_vec();
    };

    // After the last system message, or first when there is none
    let insert_index = messages
        .iter()
        .rposition(|message| {
            message.get("role").and_then(Value::as_str) == Some("system")
        })
        .map_or(0, |index| index + 1);

    messages.insert(
        insert_index,
        serde_json::json!({
            "role": "system",
            "content": context,
        }),
    );

    serde_json::to_vec(&request).unwrap_or_else(|_| body.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Memory, MemoryType};

    fn result(memory_type: MemoryType, content: &str, similarity: f32) -> RetrieveResult {
        RetrieveResult::new(Memory::new(memory_type, content, "u1"), similarity)
    }

    fn messages_of(body: &[u8]) -> Vec<(String, String)> {
        let request: Value = serde_json::from_slice(body).unwrap();
        request["messages"]
            .as_array()
            .unwrap()
            .iter()
            .map(|message| {
                (
                    message["role"].as_str().unwrap().to_string(),
                    message["content"].as_str().unwrap().to_string(),
                )
            })
            .collect()
    }

    #[test]
    fn test_format_context_shape() {
        let memories = vec![
            result(MemoryType::Semantic, "User prefers window seats", 0.9),
            result(MemoryType::Episodic, "User booked a trip in March", 0.7),
        ];
        let context = format_memories_as_context(&memories);

        assert!(context.starts_with("## Relevant Context from Memory"));
        assert!(context.contains("1. [semantic] User prefers window seats"));
        assert!(context.contains("2. [episodic] User booked a trip in March"));
        assert!(context.ends_with(
            "Use this context to provide a more personalized and informed response.\n"
        ));
    }

    #[test]
    fn test_format_context_preserves_given_order() {
        // Callers pass results sorted; the formatter must not re-sort
        let memories = vec![
            result(MemoryType::Semantic, "lower score listed first", 0.6),
            result(MemoryType::Semantic, "higher score listed second", 0.9),
        ];
        let context = format_memories_as_context(&memories);
        let first = context.find("lower score").unwrap();
        let second = context.find("higher score").unwrap();
        assert!(first < second);
    }

    #[test]
    fn test_format_empty_list() {
        assert!(format_memories_as_context(&[]).is_empty());
    }

    #[test]
    fn test_inject_without_system_message_inserts_first() {
        let body = br#"{"model":"gpt-4o","messages":[{"role":"user","content":"hi"}]}"#;
        let injected = inject_system_message(body, "memory context");

        let messages = messages_of(&injected);
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0], ("system".to_string(), "memory context".to_string()));
        assert_eq!(messages[1].0, "user");
    }

    #[test]
    fn test_inject_after_last_system_message() {
        let body = br#"{"messages":[
            {"role":"system","content":"first system"},
            {"role":"system","content":"second system"},
            {"role":"user","content":"hi"}
        ]}"#;
        let injected = inject_system_message(body, "memory context");

        let messages = messages_of(&injected);
        assert_eq!(messages.len(), 4);
        assert_eq!(messages[1].1, "second system");
        assert_eq!(messages[2], ("system".to_string(), "memory context".to_string()));
        assert_eq!(messages[3].0, "user");
    }

    #[test]
    fn test_inject_preserves_other_fields() {
        let body = br#"{"model":"gpt-4o","temperature":0.7,"messages":[{"role":"user","content":"hi"}],"stream":false}"#;
        let injected = inject_system_message(body, "ctx");

        let request: Value = serde_json::from_slice(&injected).unwrap();
        assert_eq!(request["model"], "gpt-4o");
        assert_eq!(request["temperature"], 0.7);
        assert_eq!(request["stream"], false);
    }

    #[test]
    fn test_inject_empty_context_unchanged() {
        let body = br#"{"messages":[{"role":"user","content":"hi"}]}"#;
        assert_eq!(inject_system_message(body, ""), body.to_vec());
    }

    #[test]
    fn test_inject_invalid_json_unchanged() {
        let body = b"this is not json";
        assert_eq!(inject_system_message(body, "ctx"), body.to_vec());
    }

    #[test]
    fn test_inject_missing_messages_unchanged() {
        let body = br#"{"model":"gpt-4o"}"#;
        assert_eq!(inject_system_message(body, "ctx"), body.to_vec());
    }

    #[test]
    fn test_inject_non_array_messages_unchanged() {
        let body = br#"{"messages":"oops"}"#;
        assert_eq!(inject_system_message(body, "ctx"), body.to_vec());
    }
}
