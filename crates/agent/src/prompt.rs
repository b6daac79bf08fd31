//! System prompt assembly.
//!
//! The base prompt sets the agent's operating rules for function calling;
//! retrieved memory is appended per task by the reasoner.

/// Build the base system prompt for a function-calling session.
pub fn base_system_prompt(tool_names: &[&str]) -> String {
    format!(
        "You are an autonomous assistant that completes tasks by calling tools.\n\
         \n\
         Operating rules:\n\
         - Act through function calls. Never describe an action you could perform; call the tool instead.\n\
         - Never paste file contents or code into your reply when a tool call can produce them.\n\
         - After tool observations arrive, decide the next step or answer in plain text.\n\
         - When the task is complete, reply with a short final answer in the user's language.\n\
         \n\
         Available tools: {}.",
        tool_names.join(", ")
    )
}

/// Compose the full system prompt: base plus the rendered memory block.
pub fn compose_system_prompt(base: &str, memory_block: &str) -> String {
    if memory_block.is_empty() {
        base.to_string()
    } else {
        format!("{base}{memory_block}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_prompt_lists_tools() {
        let prompt = base_system_prompt(&["filesystem", "shell"]);
        assert!(prompt.contains("filesystem, shell"));
        assert!(prompt.contains("function calls"));
    }

    #[test]
    fn compose_appends_memory() {
        let full = compose_system_prompt("base", "\n\n## Retrieved Memory\nfacts");
        assert!(full.starts_with("base"));
        assert!(full.contains("Retrieved Memory"));

        assert_eq!(compose_system_prompt("base", ""), "base");
    }
}
