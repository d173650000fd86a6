// Tauri Command Layer
// Thin boundary between the frontend and the services. Errors cross this
// boundary as "CATEGORY: message" strings so the UI can branch on the
// category (credential prompt vs. safety notice vs. generic failure).

use crate::models::{AnalysisResult, BatchSnapshot, ReverseSearchResult, TextAnalysisResult};
use crate::services::config_store::ConfigStore;
use crate::services::export;
use crate::services::forensics::{
    self, AnalysisError, BatchItem, MediaUpload, TextMode, FAST_MODEL, IMAGE_MODEL, VIDEO_MODEL,
};
use crate::services::gateway::{GatewayError, GeminiGateway, ModelRequest, RequestPart};
use crate::services::history_store::HistoryStore;
use std::path::PathBuf;
use tauri::Emitter;
use tracing::warn;

fn analysis_err(e: AnalysisError) -> String {
    format!("{}: {}", e.category(), e)
}

fn gateway_err(e: GatewayError) -> String {
    format!("{}: {}", e.category(), e)
}

/// Build the gateway, honoring the configured proxy when one is enabled.
fn build_gateway() -> Result<GeminiGateway, String> {
    let proxy = ConfigStore::default_config_dir()
        .map(ConfigStore::new)
        .and_then(|store| store.load().ok())
        .and_then(|config| config.proxy)
        .filter(|p| p.enabled)
        .and_then(|p| p.https.or(p.http));

    match proxy {
        Some(url) => GeminiGateway::with_proxy(&url).map_err(gateway_err),
        None => GeminiGateway::new().map_err(gateway_err),
    }
}

fn history_store() -> Result<HistoryStore, String> {
    HistoryStore::default_data_dir()
        .map(HistoryStore::new)
        .ok_or_else(|| "No data directory available".to_string())
}

fn upload_from(path: &str, mime_type: Option<String>) -> Result<MediaUpload, String> {
    let mut upload = MediaUpload::from_path(path).map_err(analysis_err)?;
    if let Some(mime) = mime_type {
        upload.mime_type = mime;
    }
    Ok(upload)
}

fn export_dir(explicit: Option<String>) -> PathBuf {
    if let Some(dir) = explicit {
        return PathBuf::from(dir);
    }
    let configured = ConfigStore::default_config_dir()
        .map(ConfigStore::new)
        .and_then(|store| store.load().ok())
        .and_then(|config| config.export.output_dir)
        .map(PathBuf::from);
    configured
        .or_else(dirs::download_dir)
        .unwrap_or_else(std::env::temp_dir)
}

// ============ Analysis ============

#[tauri::command]
pub async fn analyze_media_file(
    path: String,
    mime_type: Option<String>,
) -> Result<AnalysisResult, String> {
    let upload = upload_from(&path, mime_type)?;
    let gateway = build_gateway()?;
    let store = history_store()?;

    let result = forensics::analyze_media(&gateway, &upload, Some(&store.previews_dir()))
        .await
        .map_err(analysis_err)?;

    if let Err(e) = store.record(result.clone()) {
        warn!("[API] could not record result {}: {}", result.id, e);
    }
    Ok(result)
}

#[tauri::command]
pub async fn analyze_text_input(
    text: String,
    fact_check: bool,
) -> Result<TextAnalysisResult, String> {
    let gateway = build_gateway()?;
    let mode = if fact_check { TextMode::FactCheck } else { TextMode::AiDetect };
    forensics::analyze_text(&gateway, &text, mode)
        .await
        .map_err(analysis_err)
}

#[tauri::command]
pub async fn transcribe_audio_file(
    path: String,
    mime_type: Option<String>,
) -> Result<String, String> {
    let upload = upload_from(&path, mime_type)?;
    let gateway = build_gateway()?;
    forensics::transcribe_audio(&gateway, &upload)
        .await
        .map_err(analysis_err)
}

#[tauri::command]
pub async fn reverse_search_file(
    path: String,
    mime_type: Option<String>,
) -> Result<ReverseSearchResult, String> {
    let upload = upload_from(&path, mime_type)?;
    let gateway = build_gateway()?;
    forensics::reverse_search(&gateway, &upload)
        .await
        .map_err(analysis_err)
}

/// Run the batch triage. Progress snapshots are emitted as `batch://progress`
/// events after every attempted item. Files are read one at a time inside
/// the orchestrator; an unreadable path counts as a failed item there, it
/// never aborts the queue.
#[tauri::command]
pub async fn run_batch_triage(
    window: tauri::Window,
    paths: Vec<String>,
) -> Result<Vec<AnalysisResult>, String> {
    let gateway = build_gateway()?;
    let store = history_store()?;

    let items: Vec<BatchItem> = paths.into_iter().map(BatchItem::Path).collect();

    let previews_dir = store.previews_dir();
    let completed = forensics::run_batch(
        &gateway,
        &items,
        Some(&previews_dir),
        |snapshot: &BatchSnapshot| {
            if let Err(e) = window.emit("batch://progress", snapshot.clone()) {
                warn!("[API] could not emit batch progress: {}", e);
            }
        },
    )
    .await;

    Ok(completed)
}

// ============ History ============

#[tauri::command]
pub fn list_history() -> Result<Vec<AnalysisResult>, String> {
    Ok(history_store()?.load())
}

#[tauri::command]
pub fn save_to_history(result: AnalysisResult) -> Result<usize, String> {
    let items = history_store()?.record(result)?;
    Ok(items.len())
}

// ============ Exports ============

#[tauri::command]
pub fn export_batch_csv(
    results: Vec<AnalysisResult>,
    out_dir: Option<String>,
) -> Result<String, String> {
    let dir = export_dir(out_dir);
    std::fs::create_dir_all(&dir).map_err(|e| format!("Failed to create export dir: {}", e))?;
    let path = dir.join(export::csv_export_filename());
    export::write_csv(&results, &path)?;
    Ok(path.to_string_lossy().to_string())
}

#[tauri::command]
pub async fn generate_certificate_text(result: AnalysisResult) -> Result<String, String> {
    let gateway = build_gateway()?;
    export::generate_certificate(&gateway, &result)
        .await
        .map_err(analysis_err)
}

#[tauri::command]
pub async fn export_certificates(
    results: Vec<AnalysisResult>,
    out_dir: Option<String>,
) -> Result<Vec<String>, String> {
    let gateway = build_gateway()?;
    let dir = export_dir(out_dir);
    let written = export::export_batch_certificates(&gateway, &results, &dir).await?;
    Ok(written
        .into_iter()
        .map(|p| p.to_string_lossy().to_string())
        .collect())
}

// ============ Synthesis (red-team lab) ============

#[tauri::command]
pub async fn generate_synthetic_image(
    prompt: String,
    aspect_ratio: Option<String>,
) -> Result<String, String> {
    let gateway = build_gateway()?;
    let aspect = aspect_ratio.unwrap_or_else(|| "1:1".to_string());
    gateway
        .generate_image(IMAGE_MODEL, &prompt, &aspect)
        .await
        .map_err(gateway_err)
}

#[tauri::command]
pub async fn generate_synthetic_video(prompt: String) -> Result<String, String> {
    let gateway = build_gateway()?;
    gateway
        .generate_video(VIDEO_MODEL, &prompt)
        .await
        .map_err(gateway_err)
}

// ============ Credential management ============

#[tauri::command]
pub fn store_api_key(key: String) -> Result<(), String> {
    let dir = ConfigStore::default_config_dir().ok_or("No config directory available")?;
    ConfigStore::new(dir).set_api_key(&key)
}

#[tauri::command]
pub fn has_api_key() -> bool {
    crate::services::gateway::resolve_api_key().is_some()
}

#[tauri::command]
pub fn delete_api_key() -> Result<(), String> {
    let dir = ConfigStore::default_config_dir().ok_or("No config directory available")?;
    ConfigStore::new(dir).delete_api_key()
}

/// Cheap round trip to verify the configured credential actually works.
#[tauri::command]
pub async fn test_api_connection() -> Result<bool, String> {
    let gateway = build_gateway()?;
    let request = ModelRequest {
        model: FAST_MODEL.to_string(),
        parts: vec![RequestPart::Text("Reply with the single word OK.".to_string())],
        system_instruction: None,
        response_mime_type: None,
        use_search_grounding: false,
        thinking_budget: None,
    };
    crate::services::gateway::ModelGateway::generate(&gateway, &request)
        .await
        .map(|_| true)
        .map_err(gateway_err)
}
