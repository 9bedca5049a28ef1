/// Shorten `s` to at most `max_chars` characters, appending `...` when cut.
///
/// Counts Unicode scalar values so log lines never split a multi-byte char.
pub fn truncate_with_ellipsis(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &s[..idx]),
        None => s.to_string(),
    }
}
