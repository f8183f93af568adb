pub const MAX_PREVIEW_LENGTH: usize = 200;
pub const MAX_MESSAGE_LENGTH: usize = 500;

const ELLIPSIS: &str = "...";

/// Cut `text` to at most `max_chars` characters, marking the cut with `...`.
/// Counts characters, not bytes, so multi-byte text never splits mid-codepoint.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max_chars).collect();
    out.push_str(ELLIPSIS);
    out
}

/// Collapse an agent's output to a single bounded line.
pub fn truncate_preview(output: &str) -> String {
    let single_line = output.split_whitespace().collect::<Vec<_>>().join(" ");
    truncate_chars(&single_line, MAX_PREVIEW_LENGTH)
}

pub fn truncate_message(message: &str) -> String {
    truncate_chars(message.trim(), MAX_MESSAGE_LENGTH)
}
