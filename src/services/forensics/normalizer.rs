// Verdict Normalizer
// The single place verdict truth is computed. Applies the safety-biased
// decision policy to the parsed model reply and fills every optional field
// with a documented default, so downstream components can assume a fully
// populated record.

use crate::models::{
    AnalysisResult, AnalysisStep, ConfidenceLevel, ExplanationItem, FileMetadata, Verdict,
};
use serde::Deserialize;
use std::collections::HashMap;

/// Final verdict is REAL only when the model-reported probability is
/// strictly below this ceiling AND the model itself claimed REAL. The policy
/// prefers false positives over false negatives; it never under-reports risk.
pub const REAL_PROBABILITY_CEILING: i64 = 20;

/// Default for every missing numeric field.
pub const NEUTRAL_MIDPOINT: i64 = 50;

/// The four forensic dimensions every result carries.
pub const DIMENSIONS: [&str; 4] = ["integrity", "consistency", "aiPatterns", "temporal"];

/// Model reply as parsed, before policy is applied. Every field is optional;
/// the normalizer supplies defaults rather than failing the item.
#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct RawForensicReply {
    #[serde(default)]
    pub verdict: Option<String>,
    #[serde(default)]
    pub deepfake_probability: Option<i64>,
    #[serde(default)]
    pub confidence: Option<i64>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub user_recommendation: Option<String>,
    #[serde(default)]
    pub manipulation_type: Option<String>,
    #[serde(default)]
    pub analysis_steps: HashMap<String, RawAnalysisStep>,
    #[serde(default)]
    pub explanations: Vec<ExplanationItem>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct RawAnalysisStep {
    #[serde(default)]
    pub score: Option<i64>,
    #[serde(default)]
    pub explanation: Option<String>,
    #[serde(default)]
    pub confidence_qualifier: Option<String>,
}

/// Convert a parsed reply into the canonical result record.
pub fn normalize(raw: RawForensicReply, file_metadata: FileMetadata) -> AnalysisResult {
    let probability = raw
        .deepfake_probability
        .unwrap_or(NEUTRAL_MIDPOINT)
        .clamp(0, 100);
    let model_claimed_real = raw.verdict.as_deref() == Some("REAL");

    let verdict = if probability < REAL_PROBABILITY_CEILING && model_claimed_real {
        Verdict::Real
    } else {
        Verdict::LikelyFake
    };

    let confidence = raw.confidence.unwrap_or(NEUTRAL_MIDPOINT).clamp(0, 100);

    let mut analysis_steps = HashMap::with_capacity(DIMENSIONS.len());
    for dimension in DIMENSIONS {
        let step = raw
            .analysis_steps
            .get(dimension)
            .map(|s| AnalysisStep {
                score: s.score.unwrap_or(NEUTRAL_MIDPOINT).clamp(0, 100),
                explanation: s
                    .explanation
                    .clone()
                    .unwrap_or_else(|| AnalysisStep::default().explanation),
                confidence_qualifier: ConfidenceLevel::parse_lenient(
                    s.confidence_qualifier.as_deref(),
                ),
            })
            .unwrap_or_default();
        analysis_steps.insert(dimension.to_string(), step);
    }

    let manipulation_type = raw.manipulation_type.unwrap_or_else(|| {
        if probability >= REAL_PROBABILITY_CEILING {
            "Neural Synthesis".to_string()
        } else {
            "N/A".to_string()
        }
    });

    AnalysisResult {
        id: uuid::Uuid::new_v4().to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        verdict,
        deepfake_probability: probability,
        confidence,
        confidence_level: ConfidenceLevel::from_confidence(confidence),
        summary: raw
            .summary
            .unwrap_or_else(|| "Forensic analysis complete.".to_string()),
        user_recommendation: raw
            .user_recommendation
            .unwrap_or_else(|| "Verify manually.".to_string()),
        manipulation_type,
        analysis_steps,
        explanations: raw.explanations,
        file_metadata,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata() -> FileMetadata {
        FileMetadata::from_upload("photo.png", 1024 * 1024, "image/png", None)
    }

    fn reply(verdict: Option<&str>, probability: Option<i64>) -> RawForensicReply {
        RawForensicReply {
            verdict: verdict.map(|v| v.to_string()),
            deepfake_probability: probability,
            ..Default::default()
        }
    }

    #[test]
    fn test_real_requires_low_probability_and_model_agreement() {
        let r = normalize(reply(Some("REAL"), Some(15)), metadata());
        assert_eq!(r.verdict, Verdict::Real);

        // Model claims REAL but probability at/above the ceiling.
        let r = normalize(reply(Some("REAL"), Some(25)), metadata());
        assert_eq!(r.verdict, Verdict::LikelyFake);
        let r = normalize(reply(Some("REAL"), Some(20)), metadata());
        assert_eq!(r.verdict, Verdict::LikelyFake);

        // Low probability but model itself claims fake.
        let r = normalize(reply(Some("LIKELY_FAKE"), Some(5)), metadata());
        assert_eq!(r.verdict, Verdict::LikelyFake);
    }

    #[test]
    fn test_missing_probability_defaults_to_midpoint_and_fake() {
        let r = normalize(reply(Some("REAL"), None), metadata());
        assert_eq!(r.deepfake_probability, NEUTRAL_MIDPOINT);
        assert_eq!(r.verdict, Verdict::LikelyFake);
    }

    #[test]
    fn test_missing_verdict_is_fake() {
        let r = normalize(reply(None, Some(3)), metadata());
        assert_eq!(r.verdict, Verdict::LikelyFake);
    }

    #[test]
    fn test_probability_is_clamped() {
        let r = normalize(reply(Some("LIKELY_FAKE"), Some(250)), metadata());
        assert_eq!(r.deepfake_probability, 100);
        let r = normalize(reply(Some("REAL"), Some(-5)), metadata());
        assert_eq!(r.deepfake_probability, 0);
        assert_eq!(r.verdict, Verdict::Real);
    }

    #[test]
    fn test_confidence_level_is_independent_of_verdict() {
        let mut raw = reply(Some("LIKELY_FAKE"), Some(95));
        raw.confidence = Some(90);
        let r = normalize(raw, metadata());
        assert_eq!(r.verdict, Verdict::LikelyFake);
        assert_eq!(r.confidence_level, ConfidenceLevel::High);

        let mut raw = reply(Some("REAL"), Some(5));
        raw.confidence = Some(30);
        let r = normalize(raw, metadata());
        assert_eq!(r.verdict, Verdict::Real);
        assert_eq!(r.confidence_level, ConfidenceLevel::Low);
    }

    #[test]
    fn test_empty_reply_is_fully_populated() {
        let r = normalize(RawForensicReply::default(), metadata());
        assert_eq!(r.deepfake_probability, NEUTRAL_MIDPOINT);
        assert_eq!(r.confidence, NEUTRAL_MIDPOINT);
        assert_eq!(r.confidence_level, ConfidenceLevel::Medium);
        assert_eq!(r.analysis_steps.len(), 4);
        for dimension in DIMENSIONS {
            let step = &r.analysis_steps[dimension];
            assert_eq!(step.score, 50);
            assert_eq!(step.confidence_qualifier, ConfidenceLevel::Medium);
        }
        assert!(!r.summary.is_empty());
        assert!(!r.user_recommendation.is_empty());
        assert!(r.explanations.is_empty());
        assert!(!r.id.is_empty());
    }

    #[test]
    fn test_partial_steps_are_backfilled() {
        let json = serde_json::json!({
            "verdict": "LIKELY_FAKE",
            "deepfakeProbability": 80,
            "analysisSteps": {
                "integrity": { "score": 30, "explanation": "container rewritten", "confidenceQualifier": "High" }
            }
        });
        let raw: RawForensicReply = serde_json::from_value(json).unwrap();
        let r = normalize(raw, metadata());
        assert_eq!(r.analysis_steps["integrity"].score, 30);
        assert_eq!(
            r.analysis_steps["integrity"].confidence_qualifier,
            ConfidenceLevel::High
        );
        assert_eq!(r.analysis_steps["temporal"].score, 50);
    }

    #[test]
    fn test_manipulation_type_default_tracks_probability() {
        let r = normalize(reply(Some("LIKELY_FAKE"), Some(80)), metadata());
        assert_eq!(r.manipulation_type, "Neural Synthesis");
        let r = normalize(reply(Some("REAL"), Some(5)), metadata());
        assert_eq!(r.manipulation_type, "N/A");
    }
}
