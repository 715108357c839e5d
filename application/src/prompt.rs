use chrono::Utc;
use domain::models::{CallerContext, ChatMessage};

/// Built-in persona. Deployments override it through configuration; the
/// text is data, not pipeline logic.
pub const DEFAULT_PERSONA: &str = "You are the Asycd voice assistant. You answer \
briefly and conversationally, in phrasing that sounds natural when spoken aloud. \
Never use markdown, bullet points, or emojis. When reference material is supplied \
with the question, draw on it naturally without mentioning that it was provided \
to you. If you do not know something, say so plainly.";

/// Persona system message with the advisory caller context appended.
/// City and timezone come from request headers and default to "unknown";
/// they are hints for the model, never control flow.
pub fn persona_message(persona: &str, caller: &CallerContext) -> ChatMessage {
    let now = Utc::now().format("%Y-%m-%d %H:%M UTC");
    ChatMessage::system(format!(
        "{persona}\n\nThe caller is in {city} (timezone {timezone}). The current time is {now}.",
        city = caller.city,
        timezone = caller.timezone,
    ))
}

/// Final user message: the transcript, followed by the retrieved context
/// when there is any.
pub fn user_message(transcript: &str, context: Option<&str>) -> ChatMessage {
    match context {
        Some(ctx) if !ctx.trim().is_empty() => {
            ChatMessage::user(format!("{transcript}\n\nRelevant context:\n{ctx}"))
        }
        _ => ChatMessage::user(transcript),
    }
}
