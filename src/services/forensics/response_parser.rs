// Response Parser
// Recovers a single JSON object from the model's free-form reply, tolerating
// markdown code fences and leading/trailing prose. No partial-object
// recovery: a malformed reply is an all-or-nothing failure for that item.

use super::AnalysisError;
use regex::Regex;
use serde_json::Value;
use tracing::warn;

/// Strip fences, trim everything before the first `{` and after the last
/// `}`, then parse. Any failure surfaces as `MalformedResponse` so the UI
/// can show a meaningful message instead of a raw parse error.
pub fn extract_json(raw: &str) -> Result<Value, AnalysisError> {
    let fence = Regex::new(r"```(?:json)?").expect("static fence pattern");
    let cleaned = fence.replace_all(raw, "");

    let start = cleaned.find('{');
    let end = cleaned.rfind('}');
    let body = match (start, end) {
        (Some(s), Some(e)) if s < e => &cleaned[s..=e],
        _ => {
            warn!("[PARSER] no JSON object in model reply ({} bytes)", raw.len());
            return Err(AnalysisError::MalformedResponse);
        }
    };

    serde_json::from_str::<Value>(body.trim()).map_err(|e| {
        warn!("[PARSER] model reply failed to parse as JSON: {}", e);
        AnalysisError::MalformedResponse
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fenced_json() {
        let value = extract_json("```json\n{\"a\":1}\n```").unwrap();
        assert_eq!(value["a"], 1);
    }

    #[test]
    fn test_bare_fence() {
        let value = extract_json("```\n{\"a\": true}\n```").unwrap();
        assert_eq!(value["a"], true);
    }

    #[test]
    fn test_surrounding_prose() {
        let raw = "Here is my verdict:\n{\"verdict\":\"REAL\"}\nLet me know if you need more.";
        let value = extract_json(raw).unwrap();
        assert_eq!(value["verdict"], "REAL");
    }

    #[test]
    fn test_nested_braces_survive_trimming() {
        let raw = "noise {\"outer\": {\"inner\": 2}} trailing";
        let value = extract_json(raw).unwrap();
        assert_eq!(value["outer"]["inner"], 2);
    }

    #[test]
    fn test_non_json_is_malformed() {
        let err = extract_json("I am unable to analyze this file.").unwrap_err();
        assert!(matches!(err, AnalysisError::MalformedResponse));
        assert_eq!(err.category(), "MALFORMED_RESPONSE");
    }

    #[test]
    fn test_truncated_object_is_malformed_not_partial() {
        let err = extract_json("{\"verdict\": \"REAL\", \"deepfakeProb").unwrap_err();
        assert!(matches!(err, AnalysisError::MalformedResponse));
    }

    #[test]
    fn test_empty_reply_is_malformed() {
        assert!(matches!(
            extract_json("").unwrap_err(),
            AnalysisError::MalformedResponse
        ));
    }
}
