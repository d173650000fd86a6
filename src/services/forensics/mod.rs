// Forensics Module
// Analysis orchestration and verdict normalization, organized into
// specialized submodules:
// - request_builder: Packages files/text into model request descriptors
// - response_parser: Recovers a JSON object from free-form model output
// - normalizer: Safety-biased verdict policy and defaults filling
// - pipeline: Per-item ingest -> request -> parse -> normalize flow
// - batch: Strictly sequential multi-file triage with failure isolation

pub mod batch;
pub mod normalizer;
pub mod pipeline;
pub mod request_builder;
pub mod response_parser;

pub use batch::{run_batch, BatchItem};
pub use normalizer::{normalize, RawForensicReply, NEUTRAL_MIDPOINT, REAL_PROBABILITY_CEILING};
pub use pipeline::{
    analyze_media, analyze_text, guess_mime_type, reverse_search, transcribe_audio, MediaUpload,
    TextMode,
};
pub use request_builder::{
    certificate_request, media_forensics_request, reverse_search_request, text_analysis_request,
    transcription_request, FAST_MODEL, FORENSIC_MODEL, IMAGE_MODEL, VIDEO_MODEL,
};
pub use response_parser::extract_json;

use crate::services::gateway::GatewayError;
use thiserror::Error;

/// Per-item analysis failure. Terminal for that item; no partial result is
/// ever produced. Nothing in this module retries automatically.
#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("API key not configured")]
    CredentialMissing,
    #[error("content blocked by safety policy: {0}")]
    SafetyBlocked(String),
    #[error("the forensic engine returned an unreadable response format")]
    MalformedResponse,
    #[error("remote analysis failed: {0}")]
    RemoteFailure(String),
    #[error("could not ingest input: {0}")]
    IngestFailed(String),
}

impl AnalysisError {
    /// Stable category string the UI keys on.
    pub fn category(&self) -> &'static str {
        match self {
            AnalysisError::CredentialMissing => "CREDENTIAL_MISSING",
            AnalysisError::SafetyBlocked(_) => "CONTENT_SAFETY_BLOCKED",
            AnalysisError::MalformedResponse => "MALFORMED_RESPONSE",
            AnalysisError::RemoteFailure(_) => "REMOTE_ERROR",
            AnalysisError::IngestFailed(_) => "INGEST_ERROR",
        }
    }
}

impl From<GatewayError> for AnalysisError {
    fn from(e: GatewayError) -> Self {
        match e {
            GatewayError::MissingApiKey => AnalysisError::CredentialMissing,
            GatewayError::SafetyBlocked(reason) => AnalysisError::SafetyBlocked(reason),
            other => AnalysisError::RemoteFailure(other.to_string()),
        }
    }
}
