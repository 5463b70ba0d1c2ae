//! Text helpers shared by the ledger, the gate and the lessons store.

/// Longest prefix of `s` that fits in `max_bytes` without splitting a
/// UTF-8 character.
pub fn clip(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let mut end = max_bytes;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

/// Clip `s` to `max_bytes` and mark the cut with `...`.
///
/// The marker counts toward the limit, so the result never exceeds
/// `max_bytes` (for `max_bytes >= 3`).
pub fn clip_with_marker(s: &str, max_bytes: usize) -> String {
    if s.len() <= max_bytes {
        return s.to_string();
    }
    format!("{}...", clip(s, max_bytes.saturating_sub(3)))
}

/// Collapse runs of whitespace to single spaces.
pub fn squash_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}
