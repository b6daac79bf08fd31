//! Token estimation and reasoning-window pruning.
//!
//! Estimation uses the character heuristic: ~4 characters per token, plus
//! a per-message overhead for role markers and wire framing. Accurate
//! within ~10% for BPE tokenizers on English text, which is enough for
//! budget gating.
//!
//! Pruning is a pure function of (messages, max_messages, budget). It
//! never evicts the system prompt or the original user task.

use ironmind_core::message::{Message, Role};

/// Estimate the token count for a string. Rounds up.
pub fn estimate_tokens(text: &str) -> usize {
    if text.is_empty() {
        return 0;
    }
    text.len().div_ceil(4)
}

/// Per-message overhead for role name and framing.
const MESSAGE_OVERHEAD: usize = 4;

/// Rough cost of one serialized tool call in a message.
const TOOL_CALL_OVERHEAD: usize = 50;

/// Estimate tokens for one message.
pub fn estimate_message_tokens(message: &Message) -> usize {
    MESSAGE_OVERHEAD
        + estimate_tokens(&message.content)
        + message.tool_calls.len() * TOOL_CALL_OVERHEAD
}

/// Estimate tokens for the whole window.
pub fn estimate_window_tokens(messages: &[Message]) -> usize {
    messages.iter().map(estimate_message_tokens).sum()
}

/// Prune the window when it exceeds the message cap or 70% of the token
/// budget. The first two messages (system prompt, original task) always
/// survive; the most recent turns are kept intact. Orphaned tool
/// observations at the cut boundary are dropped so the wire format stays
/// valid.
pub fn prune_window(messages: Vec<Message>, max_messages: usize, token_budget: u64) -> Vec<Message> {
    if messages.len() <= 2 {
        return messages;
    }

    let estimated = estimate_window_tokens(&messages) as u64;
    let over_count = messages.len() > max_messages;
    let over_tokens = estimated > token_budget * 7 / 10;
    if !over_count && !over_tokens {
        return messages;
    }

    let keep_tail = max_messages.saturating_sub(2).max(2);
    let mut iter = messages.into_iter();
    let system = iter.next().expect("window has a system message");
    let task = iter.next().expect("window has the original task");

    let conversation: Vec<Message> = iter.collect();
    let start = conversation.len().saturating_sub(keep_tail);
    let mut tail: Vec<Message> = conversation.into_iter().skip(start).collect();

    // Token pressure: keep dropping the oldest turns until under the
    // threshold, always retaining the two most recent.
    let threshold = token_budget * 7 / 10;
    let base = estimate_message_tokens(&system) + estimate_message_tokens(&task);
    while tail.len() > 2 && (base + estimate_window_tokens(&tail)) as u64 > threshold {
        tail.remove(0);
    }

    // A tool observation must follow the assistant message that requested
    // it; drop any that lost their parent at the cut.
    while tail.first().is_some_and(|m| m.role == Role::Tool) {
        tail.remove(0);
    }

    let mut pruned = vec![system, task];
    pruned.extend(tail);
    pruned
}
