//! Helpers for pulling JSON out of model output.
//!
//! Models wrap JSON in code fences, add prose around it, or stop mid-object
//! when they hit their token limit. These helpers locate the JSON payload and
//! close truncated structures so a second decode attempt has a chance.

/// Locate the JSON payload in a model response.
///
/// Prefers a ```` ```json ```` fence, then any fence, then the span from the
/// first `{` to the last `}`. Falls back to the trimmed input.
pub fn extract_block(raw: &str) -> &str {
    let content = raw.trim();

    if let Some(start) = content.find("```json") {
        let body = &content[start + "```json".len()..];
        return body.split("```").next().unwrap_or(body).trim();
    }
    if let Some(start) = content.find("```") {
        let body = &content[start + 3..];
        // Skip a language tag on the fence line.
        let body = match body.find('\n') {
            Some(nl) if !body[..nl].trim().starts_with('{') => &body[nl + 1..],
            _ => body,
        };
        return body.split("```").next().unwrap_or(body).trim();
    }
    match (content.find('{'), content.rfind('}')) {
        (Some(start), Some(end)) if end > start => &content[start..=end],
        (Some(start), None) => &content[start..],
        _ => content,
    }
}

/// Close unterminated strings, arrays and objects in truncated JSON.
///
/// A dangling string value is closed in place. A dangling key, or a key
/// with no value yet, is dropped before the brackets are closed.
pub fn repair_truncated(content: &str) -> String {
    let mut out = content.trim_end().to_string();

    let state = scan(&out);
    if let Some(start) = state.open_string {
        let is_value = out[..start].trim_end().ends_with(':') || state.stack.last() == Some(&']');
        if is_value {
            if state.escaped {
                out.pop();
            }
            out.push('"');
        } else {
            out.truncate(start);
        }
    }

    // Drop trailing separators and keys that never got a value.
    loop {
        let len = out.trim_end().len();
        out.truncate(len);
        if out.ends_with(',') {
            out.pop();
        } else if out.ends_with(':') {
            out.pop();
            let key_end = out.trim_end().len();
            out.truncate(key_end);
            if out.ends_with('"') {
                out.pop();
                match out.rfind('"') {
                    Some(q) => out.truncate(q),
                    None => out.clear(),
                }
            }
        } else {
            break;
        }
    }

    for close in scan(&out).stack.into_iter().rev() {
        out.push(close);
    }
    out
}

struct ScanState {
    /// Closers for every bracket still open, innermost last.
    stack: Vec<char>,
    /// Byte offset of the opening quote if the text ends inside a string.
    open_string: Option<usize>,
    /// Text ends right after a backslash inside a string.
    escaped: bool,
}

fn scan(content: &str) -> ScanState {
    let mut stack = Vec::new();
    let mut open_string = None;
    let mut escaped = false;
    for (i, c) in content.char_indices() {
        if open_string.is_some() {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => open_string = None,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => open_string = Some(i),
            '{' => stack.push('}'),
            '[' => stack.push(']'),
            '}' | ']' => {
                stack.pop();
            }
            _ => {}
        }
    }
    ScanState {
        stack,
        open_string,
        escaped,
    }
}
