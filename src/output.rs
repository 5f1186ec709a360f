//! Display shaping for captured command output.
//!
//! Remote commands print whatever they like. Before it reaches the
//! terminal, stdout is decoded lossily, stripped down to printable
//! ASCII and cut to its last [`MAX_DISPLAY_LINES`] lines.

/// Lines of stdout shown per command before truncation kicks in.
pub const MAX_DISPLAY_LINES: usize = 50;

/// Decode bytes as UTF-8, replacing invalid sequences, and keep
/// only printable ASCII plus newline, carriage return and tab.
///
/// Anything else, including the replacement character produced
/// for undecodable bytes, is dropped rather than escaped.
///
/// ```
/// use provisio::output::sanitize;
///
/// assert_eq!(sanitize("caf\u{e9}\n".as_bytes()), "caf\n");
/// assert_eq!(sanitize(b"ok\xff\x1b[0m"), "ok[0m");
/// ```
#[must_use]
pub fn sanitize(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes)
        .chars()
        .filter(|&c| is_displayable(c))
        .collect()
}

const fn is_displayable(c: char) -> bool {
    matches!(c, ' '..='~' | '\n' | '\r' | '\t')
}

/// The last lines of a block of text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tail<'a> {
    /// Leading lines that did not fit.
    pub omitted: usize,
    pub lines: Vec<&'a str>,
}

/// Split `text` on `\n` and keep at most `max_lines` from the end.
#[must_use]
pub fn tail(text: &str, max_lines: usize) -> Tail<'_> {
    let mut lines: Vec<&str> = text.split('\n').collect();
    let omitted = lines.len().saturating_sub(max_lines);
    let kept = lines.split_off(omitted);
    Tail {
        omitted,
        lines: kept,
    }
}

/// Shape captured stdout for the terminal.
///
/// Returns `None` when nothing printable is left after
/// sanitizing and trimming. Otherwise the result holds the last
/// [`MAX_DISPLAY_LINES`] lines, preceded by a
/// `... [N lines truncated] ...` marker when lines were dropped.
#[must_use]
pub fn render(stdout: &[u8]) -> Option<String> {
    let clean = sanitize(stdout);
    let trimmed = clean.trim();
    if trimmed.is_empty() {
        return None;
    }

    let tail = tail(trimmed, MAX_DISPLAY_LINES);
    let body = tail.lines.join("\n");
    if tail.omitted > 0 {
        Some(format!(
            "... [{} lines truncated] ...\n{body}",
            tail.omitted
        ))
    } else {
        Some(body)
    }
}

/// Decode captured stderr for an error report.
///
/// Unlike stdout, stderr is shown unfiltered; `None` means it
/// was blank.
#[must_use]
pub fn render_stderr(stderr: &[u8]) -> Option<String> {
    let text = String::from_utf8_lossy(stderr);
    if text.trim().is_empty() {
        None
    } else {
        Some(text.into_owned())
    }
}
