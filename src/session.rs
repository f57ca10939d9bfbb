//! Session identity for turn batching.
//!
//! Turn counters are partitioned by session id. API surfaces that maintain
//! multi-turn state supply their conversation id directly; stateless chat
//! completions derive a stable id from the user and the conversation's
//! opening message.

use crate::models::Message;
use sha2::{Digest, Sha256};

/// Prefix length of the first user message included in the hash. Keeps the
/// id stable when long opening messages are re-sent truncated.
const FIRST_MESSAGE_PREFIX: usize = 100;

/// Hex characters kept from the digest.
const SESSION_HASH_LEN: usize = 16;

/// Derives a stable session id for a stateless chat-completion
/// conversation.
///
/// The id is `sha256(user_id ‖ ":" ‖ first-user-message-prefix)` truncated
/// to a short hex string with a `cc-` prefix; identical conversations map
/// to the same id across calls.
#[must_use]
pub fn derive_session_id(user_id: &str, messages: &[Message]) -> String {
    let mut seed = String::new();
    seed.push_str(user_id);
    seed.push(':');

    if let Some(first_user) = messages.iter().find(|message| message.role == "user") {
        let content = &first_user.content;
        let mut end = content.len().min(FIRST_MESSAGE_PREFIX);
        while !content.is_char_boundary(end) {
            end -= 1;
        }
        seed.push_str(&content[..end]);
    }

    let digest = Sha256::digest(seed.as_bytes());
    let hex: String = digest
        .iter()
        .map(|byte| format!("{byte:02x}"))
        .collect();
    format!("cc-{}", &hex[..SESSION_HASH_LEN])
}
