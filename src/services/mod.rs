// Proofy Core Services

pub mod config_store;
pub mod export;
pub mod forensics;
pub mod gateway;
pub mod history_store;

pub use config_store::*;
pub use gateway::{
    resolve_api_key, GatewayError, GeminiGateway, ModelGateway, ModelReply, ModelRequest,
    RequestPart,
};
pub use history_store::{HistoryStore, HISTORY_CAP};

// Re-export forensics module functions
pub use forensics::{
    analyze_media,
    analyze_text,
    extract_json,
    guess_mime_type,
    normalize,
    reverse_search,
    run_batch,
    transcribe_audio,
    AnalysisError,
    BatchItem,
    MediaUpload,
    TextMode,
};
pub use export::{
    certificate_filename,
    csv_export_filename,
    export_batch_certificates,
    generate_certificate,
    to_csv,
    write_csv,
    CSV_HEADER,
};
