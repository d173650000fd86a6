use proofy_lib::services::export::{csv_export_filename, write_csv};
use proofy_lib::services::forensics::{run_batch, BatchItem};
use proofy_lib::services::gateway::GeminiGateway;
use serde::Serialize;
use std::path::PathBuf;

fn parse_arg_value(args: &[String], key: &str) -> Option<String> {
    args.iter()
        .position(|a| a == key)
        .and_then(|i| args.get(i + 1))
        .cloned()
}

fn has_flag(args: &[String], key: &str) -> bool {
    args.iter().any(|a| a == key)
}

#[tokio::main]
async fn main() -> Result<(), String> {
    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        eprintln!(
            "Usage:\n  cargo run --bin triage_cli -- <file> [<file> ...] [--out <dir>] [--json <json_path>] [--quiet]\n\nNotes:\n  - The API key is read from GEMINI_API_KEY / PROOFY_GEMINI_API_KEY or the config file.\n  - Files run strictly one at a time; a failed file is skipped, not fatal.\n  - A CSV table is written to --out (or the current directory) after the run."
        );
        return Ok(());
    }

    let out_dir = parse_arg_value(&args, "--out").map(PathBuf::from);
    let json_path = parse_arg_value(&args, "--json");
    let quiet = has_flag(&args, "--quiet");

    let mut paths: Vec<String> = Vec::new();
    let mut skip_next = false;
    for arg in args.iter().skip(1) {
        if skip_next {
            skip_next = false;
            continue;
        }
        match arg.as_str() {
            "--out" | "--json" => skip_next = true,
            "--quiet" => {}
            other => paths.push(other.to_string()),
        }
    }

    if paths.is_empty() {
        return Err("no input files".to_string());
    }
    let items: Vec<BatchItem> = paths.into_iter().map(BatchItem::Path).collect();

    let gateway = GeminiGateway::new().map_err(|e| e.to_string())?;

    println!("Queued: {} files", items.len());
    let results = run_batch(&gateway, &items, None, |snapshot| {
        if !quiet {
            println!(
                "[{}/{}] ok={} failed={}{}",
                snapshot.current_index,
                snapshot.total,
                snapshot.completed.len(),
                snapshot.failed,
                if snapshot.done { "  done" } else { "" }
            );
        }
    })
    .await;

    println!();
    for r in &results {
        println!(
            "{}  {}  probability={} confidence={}  {}",
            r.file_metadata.name,
            r.verdict.as_str(),
            r.deepfake_probability,
            r.confidence,
            r.summary
        );
    }

    let dir = out_dir.unwrap_or_else(|| PathBuf::from("."));
    std::fs::create_dir_all(&dir).map_err(|e| format!("create out dir failed: {}", e))?;
    let csv_path = dir.join(csv_export_filename());
    write_csv(&results, &csv_path)?;
    println!();
    println!("Wrote CSV: {}", csv_path.display());

    if let Some(json_path) = json_path {
        #[derive(Serialize)]
        #[serde(rename_all = "camelCase")]
        struct Output {
            total: usize,
            completed: usize,
            results: Vec<proofy_lib::models::AnalysisResult>,
        }

        let out = Output {
            total: items.len(),
            completed: results.len(),
            results,
        };
        let json = serde_json::to_string_pretty(&out).map_err(|e| e.to_string())?;
        std::fs::write(&json_path, json).map_err(|e| format!("write out failed: {}", e))?;
        println!("Wrote JSON: {}", json_path);
    }

    Ok(())
}
