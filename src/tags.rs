//! Helpers for picking structured pieces out of generated text.

use crate::error::ResearchError;

/// Return the trimmed text between the first `<tag>` and the `</tag>` that
/// follows it.
///
/// Fails with [`ResearchError::Parse`] when either marker is missing or the
/// span is blank. That is the only failure mode.
pub fn extract_tag<'a>(text: &'a str, tag: &str) -> Result<&'a str, ResearchError> {
    let open = format!("<{}>", tag);
    let close = format!("</{}>", tag);

    let start = text
        .find(&open)
        .map(|i| i + open.len())
        .ok_or_else(|| ResearchError::parse(tag))?;
    let len = text[start..]
        .find(&close)
        .ok_or_else(|| ResearchError::parse(tag))?;

    let inner = text[start..start + len].trim();
    if inner.is_empty() {
        return Err(ResearchError::parse(tag));
    }
    Ok(inner)
}

/// Remove a surrounding triple-backtick fence, including an optional
/// language tag on the opening line. Text without a leading fence is
/// returned unchanged.
pub fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return text;
    };

    // Drop the info string ("markdown", "md", ...) on the fence line.
    let body = match rest.find('\n') {
        Some(i) => &rest[i + 1..],
        None => rest,
    };
    let body = body.trim_end();
    body.strip_suffix("```").unwrap_or(body).trim()
}
