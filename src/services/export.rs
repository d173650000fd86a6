// Export Engine
// Renders aggregate (CSV table) and per-item (forensic certificate) exports
// from stored results. Certificates come from a secondary, human-readable
// model call that can fail without invalidating the stored result.

use crate::models::AnalysisResult;
use crate::services::forensics::{certificate_request, AnalysisError};
use crate::services::gateway::ModelGateway;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub const CSV_HEADER: &str = "ID,Filename,Verdict,Probability,Confidence,Summary,Date";

/// Triggering many near-simultaneous file writes/downloads is unreliable on
/// the consumer side; certificates are spaced out instead of parallelized.
const CERTIFICATE_EXPORT_DELAY_MS: u64 = 200;

/// Quote a field when it contains the delimiter, a quote, or a newline;
/// embedded quotes are doubled per standard CSV quoting.
fn csv_field(value: &str) -> String {
    if value.contains(',') || value.contains('"') || value.contains('\n') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// Render the aggregate table: fixed header plus one row per result.
pub fn to_csv(results: &[AnalysisResult]) -> String {
    let mut lines = Vec::with_capacity(results.len() + 1);
    lines.push(CSV_HEADER.to_string());
    for r in results {
        lines.push(
            [
                csv_field(&r.id),
                csv_field(&r.file_metadata.name),
                r.verdict.as_str().to_string(),
                r.deepfake_probability.to_string(),
                r.confidence.to_string(),
                // Summary is always quote-wrapped; it is the free-text column.
                format!("\"{}\"", r.summary.replace('"', "\"\"")),
                csv_field(&r.timestamp),
            ]
            .join(","),
        );
    }
    lines.join("\n")
}

pub fn csv_export_filename() -> String {
    format!("PROOFY_BATCH_EXPORT_{}.csv", chrono::Utc::now().timestamp_millis())
}

pub fn write_csv(results: &[AnalysisResult], path: &Path) -> Result<(), String> {
    fs::write(path, to_csv(results)).map_err(|e| format!("Failed to write CSV: {}", e))
}

/// Per-item certificate filename, embedding the result id and original name.
pub fn certificate_filename(result: &AnalysisResult) -> String {
    format!("PROOFY_LOG_{}_{}.txt", result.id, result.file_metadata.name)
}

/// Ask the model for a narrative report of one stored result.
pub async fn generate_certificate<G: ModelGateway>(
    gateway: &G,
    result: &AnalysisResult,
) -> Result<String, AnalysisError> {
    let request = certificate_request(result);
    let reply = gateway.generate(&request).await?;
    Ok(reply.text)
}

/// Write one certificate file per result into `out_dir`, sequentially with a
/// short fixed delay between items. A failed certificate is skipped; the
/// remaining items still export. Returns the paths written.
pub async fn export_batch_certificates<G: ModelGateway>(
    gateway: &G,
    results: &[AnalysisResult],
    out_dir: &Path,
) -> Result<Vec<PathBuf>, String> {
    fs::create_dir_all(out_dir).map_err(|e| format!("Failed to create export dir: {}", e))?;

    let mut written = Vec::new();
    for (index, result) in results.iter().enumerate() {
        match generate_certificate(gateway, result).await {
            Ok(certificate) => {
                let path = out_dir.join(certificate_filename(result));
                match fs::write(&path, certificate) {
                    Ok(()) => {
                        info!("[EXPORT] wrote certificate {}", path.display());
                        written.push(path);
                    }
                    Err(e) => warn!("[EXPORT] could not write {}: {}", path.display(), e),
                }
            }
            Err(e) => warn!(
                "[EXPORT] certificate for {} failed [{}]: {}",
                result.id,
                e.category(),
                e
            ),
        }

        if index + 1 < results.len() {
            tokio::time::sleep(std::time::Duration::from_millis(CERTIFICATE_EXPORT_DELAY_MS))
                .await;
        }
    }

    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ConfidenceLevel, FileMetadata, Verdict};
    use crate::services::gateway::{GatewayError, ModelReply, ModelRequest};
    use std::collections::HashMap;
    use std::sync::Mutex;

    fn result(id: &str, name: &str, summary: &str) -> AnalysisResult {
        AnalysisResult {
            id: id.to_string(),
            timestamp: "2026-08-23T10:00:00+00:00".to_string(),
            verdict: Verdict::LikelyFake,
            deepfake_probability: 81,
            confidence: 64,
            confidence_level: ConfidenceLevel::Medium,
            summary: summary.to_string(),
            user_recommendation: "r".to_string(),
            manipulation_type: "Neural Synthesis".to_string(),
            analysis_steps: HashMap::new(),
            explanations: Vec::new(),
            file_metadata: FileMetadata {
                name: name.to_string(),
                size: "1.00 MB".to_string(),
                mime_type: "image/png".to_string(),
                preview_path: None,
            },
        }
    }

    #[test]
    fn test_csv_header_and_row() {
        let csv = to_csv(&[result("A1", "photo.png", "plain summary")]);
        let mut lines = csv.lines();
        assert_eq!(lines.next().unwrap(), CSV_HEADER);
        assert_eq!(
            lines.next().unwrap(),
            "A1,photo.png,LIKELY_FAKE,81,64,\"plain summary\",2026-08-23T10:00:00+00:00"
        );
        assert!(lines.next().is_none());
    }

    #[test]
    fn test_csv_doubles_embedded_quotes() {
        let csv = to_csv(&[result("A1", "photo.png", r#"He said "fake""#)]);
        assert!(csv.contains(r#""He said ""fake""""#));
    }

    #[test]
    fn test_csv_quotes_filename_with_comma() {
        let csv = to_csv(&[result("A1", "a,b.png", "s")]);
        assert!(csv.contains("\"a,b.png\""));
    }

    #[test]
    fn test_certificate_filename_pattern() {
        assert_eq!(
            certificate_filename(&result("C9", "clip.mp4", "s")),
            "PROOFY_LOG_C9_clip.mp4.txt"
        );
    }

    struct ScriptedGateway {
        replies: Mutex<Vec<Result<ModelReply, GatewayError>>>,
    }

    impl ModelGateway for ScriptedGateway {
        async fn generate(&self, _request: &ModelRequest) -> Result<ModelReply, GatewayError> {
            self.replies.lock().unwrap().remove(0)
        }
    }

    #[tokio::test]
    async fn test_batch_certificate_export_skips_failures() {
        let gateway = ScriptedGateway {
            replies: Mutex::new(vec![
                Ok(ModelReply { text: "CERT ONE".to_string(), sources: Vec::new() }),
                Err(GatewayError::Remote { status: 503, message: "overloaded".to_string() }),
                Ok(ModelReply { text: "CERT THREE".to_string(), sources: Vec::new() }),
            ]),
        };
        let results = vec![
            result("R1", "a.png", "s"),
            result("R2", "b.png", "s"),
            result("R3", "c.png", "s"),
        ];

        let dir = tempfile::tempdir().unwrap();
        let written = export_batch_certificates(&gateway, &results, dir.path())
            .await
            .unwrap();

        assert_eq!(written.len(), 2);
        assert_eq!(fs::read_to_string(&written[0]).unwrap(), "CERT ONE");
        assert!(written[1].ends_with("PROOFY_LOG_R3_c.png.txt"));
    }
}
