//! Make untrusted text safe to put in a log line.

use std::borrow::Cow;

/// Longest logged payload, in characters.
pub const MAX_LOG_CHARS: usize = 200;

/// Escape CR/LF and cap the length at [`MAX_LOG_CHARS`] characters.
///
/// Content from model responses must never be able to forge extra log lines.
pub fn sanitize_for_log(text: &str) -> Cow<'_, str> {
    let needs_escape = text.contains(['\n', '\r']);
    let too_long = text.chars().nth(MAX_LOG_CHARS).is_some();
    if !needs_escape && !too_long {
        return Cow::Borrowed(text);
    }

    let mut out = String::with_capacity(text.len().min(MAX_LOG_CHARS * 2) + 3);
    for c in text.chars().take(MAX_LOG_CHARS) {
        match c {
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            other => out.push(other),
        }
    }
    if too_long {
        out.push_str("...");
    }
    Cow::Owned(out)
}
