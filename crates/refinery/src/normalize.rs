//! Text normalization for raw model output.
//!
//! Generative models frequently wrap a JSON payload in a markdown code fence
//! even when asked not to. [`strip_code_fence`] removes one such wrapper
//! without touching the payload. The function is total: input with no fence
//! (or with a fence too malformed to interpret) is returned unchanged, and
//! normalizing already-normalized text is a no-op.

/// Strip a leading/trailing markdown code fence from `text`.
///
/// Handles both the inline form (```` ```{...}``` ````) and the multi-line
/// form with an optional `json` language tag. Payload content inside the
/// fence is returned exactly as written.
///
/// # Example
///
/// ```
/// use refinery::normalize::strip_code_fence;
///
/// let fenced = "```json\n{\"x\":1}\n```";
/// assert_eq!(strip_code_fence(fenced), "{\"x\":1}");
///
/// // No fence: unchanged.
/// assert_eq!(strip_code_fence("plain text"), "plain text");
/// ```
#[must_use]
pub fn strip_code_fence(text: &str) -> String {
    let trimmed = text.trim();

    if !trimmed.starts_with("```") {
        return text.to_string();
    }

    // Inline case: ```{...}``` on one line.
    if !trimmed.contains('\n') {
        let inner = trimmed
            .strip_prefix("```json")
            .or_else(|| trimmed.strip_prefix("```"))
            .and_then(|rest| rest.strip_suffix("```"));
        return match inner {
            Some(payload) if !payload.is_empty() => payload.trim().to_string(),
            // A bare "```" or "``````" carries no payload to recover.
            _ => text.to_string(),
        };
    }

    // Multi-line case: drop the opening fence line and a closing fence line.
    let lines: Vec<&str> = trimmed.lines().collect();
    let end = if lines
        .last()
        .is_some_and(|last| last.trim() == "```")
    {
        lines.len() - 1
    } else {
        lines.len()
    };

    if end <= 1 {
        return text.to_string();
    }

    lines[1..end].join("\n")
}
