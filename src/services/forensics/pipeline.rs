// Analysis Pipeline
// Per-item flow: ingest -> build request -> call gateway -> parse ->
// normalize -> result. Steps are strictly ordered; the first error is
// terminal for the item and no partial result is produced.

use super::normalizer::{self, RawForensicReply, NEUTRAL_MIDPOINT};
use super::request_builder;
use super::response_parser::extract_json;
use super::AnalysisError;
use crate::models::{
    AnalysisResult, ClaimCheck, FileMetadata, ReverseFinding, ReverseSearchResult,
    TextAnalysisResult,
};
use crate::services::gateway::ModelGateway;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Instant;
use tracing::{info, warn};

/// A submitted file: raw bytes plus the declared name and mime type. The
/// pipeline only ever consumes this shape, regardless of whether the bytes
/// came from an upload, a camera frame, or a microphone capture.
#[derive(Debug, Clone)]
pub struct MediaUpload {
    pub name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl MediaUpload {
    pub fn from_path(path: &str) -> Result<Self, AnalysisError> {
        let bytes = fs::read(path)
            .map_err(|e| AnalysisError::IngestFailed(format!("{}: {}", path, e)))?;
        let name = Path::new(path)
            .file_name()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| path.to_string());
        let mime_type = guess_mime_type(&name);
        Ok(Self { name, mime_type, bytes })
    }
}

/// Extension-based mime guess for paths coming from the CLI or file dialogs.
/// The frontend passes the browser-declared type instead when it has one.
pub fn guess_mime_type(name: &str) -> String {
    let ext = Path::new(name)
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "mp4" => "video/mp4",
        "mov" => "video/quicktime",
        "webm" => "video/webm",
        "avi" => "video/x-msvideo",
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        "m4a" => "audio/mp4",
        "ogg" => "audio/ogg",
        "flac" => "audio/flac",
        _ => "application/octet-stream",
    }
    .to_string()
}

/// Ingest step: build immutable file metadata and keep a preview copy of the
/// bytes so the original stays resolvable for the lifetime of the result.
fn ingest(upload: &MediaUpload, previews_dir: Option<&Path>) -> FileMetadata {
    let preview_path = previews_dir.and_then(|dir| write_preview(dir, &upload.name, &upload.bytes));
    FileMetadata::from_upload(&upload.name, upload.bytes.len(), &upload.mime_type, preview_path)
}

fn write_preview(dir: &Path, name: &str, bytes: &[u8]) -> Option<String> {
    if let Err(e) = fs::create_dir_all(dir) {
        warn!("[PIPELINE] could not create previews dir: {}", e);
        return None;
    }
    let ext = Path::new(name)
        .extension()
        .map(|e| e.to_string_lossy().to_string())
        .unwrap_or_else(|| "bin".to_string());
    let path = dir.join(format!("{}.{}", uuid::Uuid::new_v4(), ext));
    match fs::write(&path, bytes) {
        Ok(()) => Some(path.to_string_lossy().to_string()),
        Err(e) => {
            warn!("[PIPELINE] could not write preview for {}: {}", name, e);
            None
        }
    }
}

/// Run the full forensic pipeline for one file.
pub async fn analyze_media<G: ModelGateway>(
    gateway: &G,
    upload: &MediaUpload,
    previews_dir: Option<&Path>,
) -> Result<AnalysisResult, AnalysisError> {
    let started = Instant::now();
    info!(
        "[PIPELINE] ingesting {} ({} bytes, {})",
        upload.name,
        upload.bytes.len(),
        upload.mime_type
    );
    let metadata = ingest(upload, previews_dir);
    let payload = BASE64.encode(&upload.bytes);

    let request = request_builder::media_forensics_request(&upload.mime_type, payload);
    let reply = gateway.generate(&request).await?;

    let value = extract_json(&reply.text)?;
    let raw: RawForensicReply =
        serde_json::from_value(value).map_err(|e| {
            warn!("[PIPELINE] reply did not match the forensic schema: {}", e);
            AnalysisError::MalformedResponse
        })?;

    let result = normalizer::normalize(raw, metadata);
    info!(
        "[PIPELINE] {} -> {} (probability={}, confidence={}) elapsed_ms={}",
        upload.name,
        result.verdict.as_str(),
        result.deepfake_probability,
        result.confidence,
        started.elapsed().as_millis()
    );
    Ok(result)
}

// ============ Text analysis ============

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextMode {
    AiDetect,
    FactCheck,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct RawTextReply {
    #[serde(default)]
    ai_probability: Option<i64>,
    #[serde(default)]
    verdict_label: Option<String>,
    #[serde(default)]
    summary: Option<String>,
    #[serde(default)]
    ai_signals: Vec<String>,
    #[serde(default)]
    human_signals: Vec<String>,
    #[serde(default)]
    linguistic_markers: Vec<String>,
    #[serde(default)]
    claims: Vec<ClaimCheck>,
}

/// AI-text detection or search-grounded fact checking over a text string.
pub async fn analyze_text<G: ModelGateway>(
    gateway: &G,
    text: &str,
    mode: TextMode,
) -> Result<TextAnalysisResult, AnalysisError> {
    let fact_check = mode == TextMode::FactCheck;
    let request = request_builder::text_analysis_request(text, fact_check);
    let reply = gateway.generate(&request).await?;

    let value = extract_json(&reply.text)?;
    let raw: RawTextReply = serde_json::from_value(value).map_err(|e| {
        warn!("[PIPELINE] text reply did not match schema: {}", e);
        AnalysisError::MalformedResponse
    })?;

    let ai_probability = raw.ai_probability.unwrap_or(0).clamp(0, 100);
    Ok(TextAnalysisResult {
        ai_probability,
        likelihood_range: format!("{}%", ai_probability),
        verdict_label: raw.verdict_label.unwrap_or_else(|| "STRICT".to_string()),
        summary: raw.summary.unwrap_or_else(|| "Analysis complete.".to_string()),
        ai_signals: raw.ai_signals,
        human_signals: raw.human_signals,
        linguistic_markers: raw.linguistic_markers,
        claims: raw.claims,
        sources: reply.sources,
    })
}

// ============ Transcription ============

/// Plain-text transcription of an audio capture; no JSON contract involved.
pub async fn transcribe_audio<G: ModelGateway>(
    gateway: &G,
    upload: &MediaUpload,
) -> Result<String, AnalysisError> {
    let payload = BASE64.encode(&upload.bytes);
    let request = request_builder::transcription_request(&upload.mime_type, payload);
    let reply = gateway.generate(&request).await?;
    Ok(reply.text)
}

// ============ Reverse source search ============

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct RawReverseReply {
    #[serde(default)]
    summary: Option<String>,
    #[serde(default)]
    original_event: Option<String>,
    #[serde(default)]
    manipulation_detected: Option<bool>,
    #[serde(default)]
    confidence: Option<i64>,
    #[serde(default)]
    findings: Vec<ReverseFinding>,
}

/// Search-grounded lookup of the media's primary source; merges the model's
/// findings with the grounding citations returned alongside the reply.
pub async fn reverse_search<G: ModelGateway>(
    gateway: &G,
    upload: &MediaUpload,
) -> Result<ReverseSearchResult, AnalysisError> {
    let payload = BASE64.encode(&upload.bytes);
    let request = request_builder::reverse_search_request(&upload.mime_type, payload);
    let reply = gateway.generate(&request).await?;

    let value = extract_json(&reply.text)?;
    let raw: RawReverseReply = serde_json::from_value(value).map_err(|e| {
        warn!("[PIPELINE] reverse-search reply did not match schema: {}", e);
        AnalysisError::MalformedResponse
    })?;

    Ok(ReverseSearchResult {
        summary: raw
            .summary
            .unwrap_or_else(|| "No source information recovered.".to_string()),
        original_event: raw.original_event,
        manipulation_detected: raw.manipulation_detected.unwrap_or(false),
        confidence: raw.confidence.unwrap_or(NEUTRAL_MIDPOINT).clamp(0, 100),
        findings: raw.findings,
        sources: reply.sources,
    })
}
