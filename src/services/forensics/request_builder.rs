// Request Builder
// Pure construction of model request descriptors per task mode. The
// instruction text enumerates the exact JSON keys and allowed enum values
// the model must return; the rest of the pipeline depends on that contract,
// so keep the schema blocks and the parser/normalizer in sync.

use crate::models::AnalysisResult;
use crate::services::gateway::{ModelRequest, RequestPart};

pub const FORENSIC_MODEL: &str = "gemini-3-pro-preview";
pub const FAST_MODEL: &str = "gemini-3-flash-preview";
pub const IMAGE_MODEL: &str = "gemini-2.5-flash-image";
pub const VIDEO_MODEL: &str = "veo-3.1-fast-generate-preview";

/// Highest reasoning effort for the primary forensic call.
pub const FORENSIC_THINKING_BUDGET: i64 = 32768;

const FORENSIC_SYSTEM_INSTRUCTION: &str = "You are the world's most advanced deepfake \
detection engine. You have a paranoid level of skepticism. You never miss 'plasticky' \
skin textures, asymmetric pupils, or background warping. You are highly technical and precise.";

const TEXT_DETECT_SYSTEM_INSTRUCTION: &str = "Detect AI text. Return JSON: \
{aiProbability, verdictLabel, aiSignals, humanSignals, summary, linguisticMarkers}";

const FACT_CHECK_SYSTEM_INSTRUCTION: &str = "Verify claims using Google Search. Return JSON: \
{claims: [{claim, status, sourceUrl, category}], summary}";

fn media_forensics_instruction(is_video: bool) -> String {
    let artifact_check = if is_video {
        "Identify temporal flickering, facial mask 'tearing' during fast movement, \
and motion-blur inconsistencies."
    } else {
        "Look for GAN checkerboard artifacts and dithering patterns in shadows."
    };

    format!(
        r#"YOU ARE A HIGH-LEVEL NEURAL FORENSIC INVESTIGATOR.
Your task is to detect if this media is AI-GENERATED or MANIPULATED.

CRITICAL INVESTIGATION PARAMETERS:
1. SKEPTICISM: Assume the media is a deepfake until proven otherwise.
2. ANATOMICAL CHECK: Count fingers, check eye pupil symmetry, hair-to-background blending, and ear complexity. AI often fails here.
3. PHYSICS & LIGHTING: Check for subsurface scattering on skin. Does light bounce realistically? Check for "ai-sheen" (over-smoothed, plasticky textures).
4. BACKGROUNDS: Look for impossible geometry, warped text in the background, or inconsistent depth-of-field blur patterns.
5. VIDEO ARTIFACTS: {artifact_check}

JSON STRUCTURE REQUIRED:
{{
  "verdict": "REAL" | "LIKELY_FAKE",
  "deepfakeProbability": 0-100,
  "confidence": 0-100,
  "summary": "Detailed forensic summary of why you reached this conclusion.",
  "userRecommendation": "Actionable advice for the user.",
  "analysisSteps": {{
    "integrity": {{"score": 0-100, "explanation": "Metadata and container scan result", "confidenceQualifier": "Low" | "Medium" | "High"}},
    "consistency": {{"score": 0-100, "explanation": "Lighting and shadow consistency audit", "confidenceQualifier": "Low" | "Medium" | "High"}},
    "aiPatterns": {{"score": 0-100, "explanation": "Presence of neural network generation fingerprints", "confidenceQualifier": "Low" | "Medium" | "High"}},
    "temporal": {{"score": 0-100, "explanation": "Motion and frame-to-frame stability", "confidenceQualifier": "Low" | "Medium" | "High"}}
  }},
  "explanations": [
    {{
      "point": "Specific finding title",
      "detail": "Detailed technical explanation of the specific anomaly found.",
      "category": "visual" | "audio" | "temporal" | "integrity",
      "timestamp": "MM:SS"
    }}
  ]
}}"#
    )
}

/// Primary forensic request: inline media payload plus the investigation
/// instruction, JSON response mode, maximum thinking budget.
pub fn media_forensics_request(mime_type: &str, base64_payload: String) -> ModelRequest {
    let is_video = mime_type.contains("video");
    ModelRequest {
        model: FORENSIC_MODEL.to_string(),
        parts: vec![
            RequestPart::InlineData {
                mime_type: mime_type.to_string(),
                data: base64_payload,
            },
            RequestPart::Text(media_forensics_instruction(is_video)),
        ],
        system_instruction: Some(FORENSIC_SYSTEM_INSTRUCTION.to_string()),
        response_mime_type: Some("application/json".to_string()),
        use_search_grounding: false,
        thinking_budget: Some(FORENSIC_THINKING_BUDGET),
    }
}

/// Text analysis request. Fact-check mode uses the stronger model and the
/// search-grounding tool; plain AI detection uses the fast model.
pub fn text_analysis_request(text: &str, fact_check: bool) -> ModelRequest {
    ModelRequest {
        model: if fact_check { FORENSIC_MODEL } else { FAST_MODEL }.to_string(),
        parts: vec![RequestPart::Text(text.to_string())],
        system_instruction: Some(
            if fact_check {
                FACT_CHECK_SYSTEM_INSTRUCTION
            } else {
                TEXT_DETECT_SYSTEM_INSTRUCTION
            }
            .to_string(),
        ),
        response_mime_type: Some("application/json".to_string()),
        use_search_grounding: fact_check,
        thinking_budget: None,
    }
}

pub fn transcription_request(mime_type: &str, base64_payload: String) -> ModelRequest {
    ModelRequest {
        model: FAST_MODEL.to_string(),
        parts: vec![
            RequestPart::InlineData {
                mime_type: mime_type.to_string(),
                data: base64_payload,
            },
            RequestPart::Text("Transcribe this audio precisely.".to_string()),
        ],
        system_instruction: None,
        response_mime_type: None,
        use_search_grounding: false,
        thinking_budget: None,
    }
}

/// Reverse source search: search-grounded lookup of the media's origin.
pub fn reverse_search_request(mime_type: &str, base64_payload: String) -> ModelRequest {
    ModelRequest {
        model: FORENSIC_MODEL.to_string(),
        parts: vec![
            RequestPart::InlineData {
                mime_type: mime_type.to_string(),
                data: base64_payload,
            },
            RequestPart::Text(
                "Locate the primary source of this image using Google Search. Return JSON: \
{summary, originalEvent, manipulationDetected, confidence, findings: [{type, detail}]}"
                    .to_string(),
            ),
        ],
        system_instruction: None,
        response_mime_type: Some("application/json".to_string()),
        use_search_grounding: true,
        thinking_budget: None,
    }
}

/// Secondary human-readable generation call for the forensic certificate.
/// Independent of the original analysis; may fail without invalidating the
/// stored result.
pub fn certificate_request(result: &AnalysisResult) -> ModelRequest {
    let findings =
        serde_json::to_string(&result.explanations).unwrap_or_else(|_| "[]".to_string());
    let prompt = format!(
        "Generate a detailed forensic certificate for Case ID {}.\n\
Verdict: {}.\n\
AI Probability: {}%.\n\
Include detailed findings: {}.\n\
Format with professional headers and ASCII borders.",
        result.id,
        result.verdict.as_str(),
        result.deepfake_probability,
        findings
    );

    ModelRequest {
        model: FAST_MODEL.to_string(),
        parts: vec![RequestPart::Text(prompt)],
        system_instruction: None,
        response_mime_type: None,
        use_search_grounding: false,
        thinking_budget: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FileMetadata, Verdict};
    use std::collections::HashMap;

    fn instruction_text(request: &ModelRequest) -> String {
        request
            .parts
            .iter()
            .filter_map(|p| match p {
                RequestPart::Text(t) => Some(t.clone()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_forensic_instruction_enumerates_contract() {
        let request = media_forensics_request("image/png", "QUJD".to_string());
        let text = instruction_text(&request);
        for key in [
            "\"verdict\"",
            "\"deepfakeProbability\"",
            "\"confidence\"",
            "\"summary\"",
            "\"userRecommendation\"",
            "\"analysisSteps\"",
            "\"integrity\"",
            "\"consistency\"",
            "\"aiPatterns\"",
            "\"temporal\"",
            "\"explanations\"",
        ] {
            assert!(text.contains(key), "instruction missing {}", key);
        }
        assert!(text.contains("\"REAL\" | \"LIKELY_FAKE\""));
        assert!(text.contains("\"Low\" | \"Medium\" | \"High\""));
        assert_eq!(request.thinking_budget, Some(FORENSIC_THINKING_BUDGET));
        assert_eq!(request.response_mime_type.as_deref(), Some("application/json"));
        assert!(!request.use_search_grounding);
    }

    #[test]
    fn test_forensic_instruction_varies_by_media_kind() {
        let video = media_forensics_request("video/mp4", "QUJD".to_string());
        assert!(instruction_text(&video).contains("temporal flickering"));

        let still = media_forensics_request("image/jpeg", "QUJD".to_string());
        assert!(instruction_text(&still).contains("GAN checkerboard"));
    }

    #[test]
    fn test_forensic_request_carries_payload() {
        let request = media_forensics_request("image/png", "QUJD".to_string());
        assert!(request.parts.iter().any(|p| matches!(
            p,
            RequestPart::InlineData { mime_type, data }
                if mime_type == "image/png" && data == "QUJD"
        )));
    }

    #[test]
    fn test_text_modes_pick_model_and_tools() {
        let detect = text_analysis_request("some text", false);
        assert_eq!(detect.model, FAST_MODEL);
        assert!(!detect.use_search_grounding);

        let fact = text_analysis_request("some claim", true);
        assert_eq!(fact.model, FORENSIC_MODEL);
        assert!(fact.use_search_grounding);
    }

    #[test]
    fn test_reverse_search_is_grounded() {
        let request = reverse_search_request("image/png", "QUJD".to_string());
        assert!(request.use_search_grounding);
        assert!(instruction_text(&request).contains("originalEvent"));
    }

    #[test]
    fn test_certificate_prompt_embeds_result_fields() {
        let result = AnalysisResult {
            id: "CASE42".to_string(),
            timestamp: "2026-08-23T10:00:00+00:00".to_string(),
            verdict: Verdict::LikelyFake,
            deepfake_probability: 88,
            confidence: 70,
            confidence_level: crate::models::ConfidenceLevel::Medium,
            summary: "s".to_string(),
            user_recommendation: "r".to_string(),
            manipulation_type: "Neural Synthesis".to_string(),
            analysis_steps: HashMap::new(),
            explanations: Vec::new(),
            file_metadata: FileMetadata {
                name: "clip.mp4".to_string(),
                size: "1.00 MB".to_string(),
                mime_type: "video/mp4".to_string(),
                preview_path: None,
            },
        };
        let request = certificate_request(&result);
        let text = instruction_text(&request);
        assert!(text.contains("CASE42"));
        assert!(text.contains("LIKELY_FAKE"));
        assert!(text.contains("88%"));
    }
}
