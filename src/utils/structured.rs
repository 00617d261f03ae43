//! Pulls a JSON payload out of free-form generator output.
//!
//! Backends wrap JSON in Markdown fences, prepend chatter, or trail off with
//! commentary. Every stage goes through [`parse_payload`] so the cleanup
//! rules live in one place.

use serde::de::DeserializeOwned;

const FENCE: &str = "```";

/// Remove a surrounding Markdown code fence (with or without a language tag).
///
/// Text without a fence is returned trimmed.
pub fn strip_code_fences(raw: &str) -> &str {
    let trimmed = raw.trim();

    let Some(open) = trimmed.find(FENCE) else {
        return trimmed;
    };

    let after_open = &trimmed[open + FENCE.len()..];
    // Skip the info string (`json`, `JSON`, ...) up to the end of the line.
    let body_start = match after_open.find('\n') {
        Some(newline) if !after_open[..newline].contains('{') && !after_open[..newline].contains('[') => {
            newline + 1
        }
        _ => 0,
    };
    let body = &after_open[body_start..];

    match body.rfind(FENCE) {
        Some(close) => body[..close].trim(),
        None => body.trim(),
    }
}

/// Parse `raw` as JSON of type `T` after fence stripping.
///
/// Falls back to the outermost `{...}` or `[...]` span when the stripped text
/// still carries prose around the payload.
pub fn parse_payload<T: DeserializeOwned>(raw: &str) -> Result<T, serde_json::Error> {
    let stripped = strip_code_fences(raw);

    match serde_json::from_str::<T>(stripped) {
        Ok(value) => Ok(value),
        Err(first_err) => match outermost_json_span(stripped) {
            Some(span) if span.len() < stripped.len() => serde_json::from_str::<T>(span),
            _ => Err(first_err),
        },
    }
}

fn outermost_json_span(text: &str) -> Option<&str> {
    let start = text.find(|c: char| c == '{' || c == '[')?;
    let closing = if text[start..].starts_with('{') { '}' } else { ']' };
    let end = text.rfind(closing)?;
    (end > start).then(|| &text[start..=end])
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Verdict {
        combine: bool,
        reason: String,
    }

    #[test]
    fn strips_tagged_fence() {
        let raw = "```json\n{\"combine\": true, \"reason\": \"same task\"}\n```";
        assert_eq!(
            strip_code_fences(raw),
            "{\"combine\": true, \"reason\": \"same task\"}"
        );
    }

    #[test]
    fn strips_bare_fence_and_whitespace() {
        let raw = "  ```\n[1, 2, 3]\n```  \n";
        assert_eq!(strip_code_fences(raw), "[1, 2, 3]");
    }

    #[test]
    fn leaves_unfenced_text_alone() {
        assert_eq!(strip_code_fences("  {\"a\": 1} "), "{\"a\": 1}");
    }

    #[test]
    fn parses_fenced_object() {
        let raw = "```JSON\n{\"combine\": false, \"reason\": \"different apps\"}\n```";
        let verdict: Verdict = parse_payload(raw).unwrap();
        assert_eq!(
            verdict,
            Verdict {
                combine: false,
                reason: "different apps".into()
            }
        );
    }

    #[test]
    fn parses_payload_surrounded_by_prose() {
        let raw = "Sure! Here is the result: {\"combine\": true, \"reason\": \"x\"} Hope it helps.";
        let verdict: Verdict = parse_payload(raw).unwrap();
        assert!(verdict.combine);
    }

    #[test]
    fn parses_array_after_chatter() {
        let raw = "Segments:\n```json\n[{\"a\": 1}, {\"a\": 2}]\n```";
        let values: Vec<serde_json::Value> = parse_payload(raw).unwrap();
        assert_eq!(values.len(), 2);
    }

    #[test]
    fn rejects_non_json() {
        assert!(parse_payload::<Verdict>("the user was coding").is_err());
        assert!(parse_payload::<Verdict>("").is_err());
    }
}
