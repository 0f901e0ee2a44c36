//! Context sanitization applied before every backend call.
//!
//! Some backends reject assistant turns with empty text. An assistant
//! message that carries tool calls but no text gets a placeholder; its
//! tool calls are left untouched.

use wikiagent_core::message::{Message, Role};

pub const TOOL_PLACEHOLDER: &str = "Processing information with tools...";

/// Rewrite empty assistant tool-call messages in place. Returns how many
/// messages changed. Idempotent.
pub fn sanitize_context(context: &mut [Message]) -> usize {
    let mut rewritten = 0;
    for message in context.iter_mut().filter(|m| needs_placeholder(m)) {
        message.content = TOOL_PLACEHOLDER.to_string();
        rewritten += 1;
    }
    rewritten
}

fn needs_placeholder(message: &Message) -> bool {
    message.role == Role::Assistant && message.has_tool_calls() && message.content.trim().is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;
    use wikiagent_core::tool::{ToolArguments, ToolCall};

    fn sample() -> Vec<Message> {
        let calls = vec![
            ToolCall::new("c1", "lookup", ToolArguments::new().with("a", 1)),
            ToolCall::new("c2", "lookup", ToolArguments::new().with("a", 2)),
        ];
        vec![
            Message::user("question"),
            Message::assistant_with_tool_calls("  ", calls),
            Message::tool_result("c1", "result"),
            Message::assistant(""),
        ]
    }

    #[test]
    fn placeholder_keeps_tool_calls() {
        let original = sample();
        let mut context = original.clone();

        assert_eq!(sanitize_context(&mut context), 1);
        assert_eq!(context[1].content, TOOL_PLACEHOLDER);
        assert_eq!(context[1].tool_calls, original[1].tool_calls);
        assert_eq!(context[1].id, original[1].id);
    }

    #[test]
    fn plain_assistant_and_other_roles_untouched() {
        let mut context = sample();
        sanitize_context(&mut context);
        assert_eq!(context[0].content, "question");
        assert_eq!(context[3].content, "");
    }

    #[test]
    fn idempotent() {
        let mut once = sample();
        sanitize_context(&mut once);
        let mut twice = once.clone();
        assert_eq!(sanitize_context(&mut twice), 0);
        assert_eq!(once, twice);
    }
}
