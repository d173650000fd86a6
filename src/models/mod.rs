// Proofy Data Models
// Wire forms shared by the Tauri command layer, the forensics pipeline,
// exports, and persisted history.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ============ Verdict & Confidence ============

/// Binary output classification. The canonical value is computed in exactly
/// one place (the verdict normalizer); nothing else may derive or override it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Verdict {
    #[serde(rename = "REAL")]
    Real,
    #[serde(rename = "LIKELY_FAKE")]
    LikelyFake,
}

impl Verdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Real => "REAL",
            Verdict::LikelyFake => "LIKELY_FAKE",
        }
    }
}

/// Qualitative band derived from the model's 0-100 self-assessed confidence,
/// independent of the verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfidenceLevel {
    Low,
    Medium,
    High,
}

impl ConfidenceLevel {
    pub fn from_confidence(confidence: i64) -> Self {
        if confidence > 85 {
            ConfidenceLevel::High
        } else if confidence < 50 {
            ConfidenceLevel::Low
        } else {
            ConfidenceLevel::Medium
        }
    }

    /// Lenient parse for model-reported qualifiers; anything unrecognized
    /// falls back to Medium instead of failing the item.
    pub fn parse_lenient(value: Option<&str>) -> Self {
        match value.map(|v| v.trim().to_ascii_lowercase()).as_deref() {
            Some("low") => ConfidenceLevel::Low,
            Some("high") => ConfidenceLevel::High,
            _ => ConfidenceLevel::Medium,
        }
    }
}

// ============ File Metadata ============

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileMetadata {
    pub name: String,
    /// Human-readable size string ("2.41 MB"), fixed at ingest time.
    pub size: String,
    pub mime_type: String,
    /// Locally-resolvable handle to a copy of the submitted bytes, kept under
    /// the app previews directory. Disposed when the result is evicted from
    /// history.
    #[serde(default)]
    pub preview_path: Option<String>,
}

impl FileMetadata {
    pub fn from_upload(
        name: &str,
        byte_len: usize,
        mime_type: &str,
        preview_path: Option<String>,
    ) -> Self {
        Self {
            name: name.to_string(),
            size: human_size(byte_len),
            mime_type: mime_type.to_string(),
            preview_path,
        }
    }
}

/// Format a byte count the way the results screen displays it.
pub fn human_size(bytes: usize) -> String {
    format!("{:.2} MB", bytes as f64 / 1024.0 / 1024.0)
}

// ============ Forensic Analysis Result ============

/// One forensic dimension (integrity, consistency, aiPatterns, temporal).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisStep {
    pub score: i64,
    pub explanation: String,
    pub confidence_qualifier: ConfidenceLevel,
}

impl Default for AnalysisStep {
    fn default() -> Self {
        Self {
            score: 50,
            explanation: "No findings reported for this dimension.".to_string(),
            confidence_qualifier: ConfidenceLevel::Medium,
        }
    }
}

/// One specific finding. `category` and `timestamp` are model-reported and
/// kept as-is; timestamp ("MM:SS") is only meaningful for time-based media.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ExplanationItem {
    #[serde(default)]
    pub point: String,
    #[serde(default)]
    pub detail: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub timestamp: Option<String>,
}

/// The unit of record. Fully populated at creation; immutable afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub id: String,
    /// RFC 3339 creation instant.
    pub timestamp: String,
    pub verdict: Verdict,
    pub deepfake_probability: i64,
    pub confidence: i64,
    pub confidence_level: ConfidenceLevel,
    pub summary: String,
    pub user_recommendation: String,
    pub manipulation_type: String,
    pub analysis_steps: HashMap<String, AnalysisStep>,
    pub explanations: Vec<ExplanationItem>,
    pub file_metadata: FileMetadata,
}

// ============ Grounded Results (text & reverse search) ============

/// Source link returned alongside a model reply when search grounding is on.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct GroundingSource {
    pub title: String,
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ClaimCheck {
    #[serde(default)]
    pub claim: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub source_url: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextAnalysisResult {
    pub ai_probability: i64,
    pub likelihood_range: String,
    pub verdict_label: String,
    pub summary: String,
    #[serde(default)]
    pub ai_signals: Vec<String>,
    #[serde(default)]
    pub human_signals: Vec<String>,
    #[serde(default)]
    pub linguistic_markers: Vec<String>,
    #[serde(default)]
    pub claims: Vec<ClaimCheck>,
    #[serde(default)]
    pub sources: Vec<GroundingSource>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ReverseFinding {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub detail: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReverseSearchResult {
    pub summary: String,
    pub original_event: Option<String>,
    pub manipulation_detected: bool,
    pub confidence: i64,
    #[serde(default)]
    pub findings: Vec<ReverseFinding>,
    #[serde(default)]
    pub sources: Vec<GroundingSource>,
}

// ============ Batch Triage ============

/// Read-only snapshot the orchestrator exposes after every attempted item.
/// `completed` holds successes only, in submission order.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchSnapshot {
    pub completed: Vec<AnalysisResult>,
    pub current_index: usize,
    pub total: usize,
    pub failed: usize,
    pub done: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_confidence_level_bands() {
        assert_eq!(ConfidenceLevel::from_confidence(86), ConfidenceLevel::High);
        assert_eq!(ConfidenceLevel::from_confidence(85), ConfidenceLevel::Medium);
        assert_eq!(ConfidenceLevel::from_confidence(50), ConfidenceLevel::Medium);
        assert_eq!(ConfidenceLevel::from_confidence(49), ConfidenceLevel::Low);
        assert_eq!(ConfidenceLevel::from_confidence(0), ConfidenceLevel::Low);
    }

    #[test]
    fn test_confidence_qualifier_lenient_parse() {
        assert_eq!(ConfidenceLevel::parse_lenient(Some("High")), ConfidenceLevel::High);
        assert_eq!(ConfidenceLevel::parse_lenient(Some("low")), ConfidenceLevel::Low);
        assert_eq!(ConfidenceLevel::parse_lenient(Some("weird")), ConfidenceLevel::Medium);
        assert_eq!(ConfidenceLevel::parse_lenient(None), ConfidenceLevel::Medium);
    }

    #[test]
    fn test_human_size() {
        assert_eq!(human_size(2 * 1024 * 1024), "2.00 MB");
        assert_eq!(human_size(1_572_864), "1.50 MB");
    }

    #[test]
    fn test_verdict_wire_form() {
        let json = serde_json::to_string(&Verdict::LikelyFake).unwrap();
        assert_eq!(json, "\"LIKELY_FAKE\"");
        let back: Verdict = serde_json::from_str("\"REAL\"").unwrap();
        assert_eq!(back, Verdict::Real);
    }
}
