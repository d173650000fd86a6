// Batch Orchestrator
// Drives the analysis pipeline over a queue of files strictly sequentially.
// Sequential processing bounds load on the external service and keeps
// progress reporting deterministic; a per-item failure is logged, the item
// is skipped, and the batch continues. There is no cancellation primitive.

use super::pipeline::{analyze_media, MediaUpload};
use super::AnalysisError;
use crate::models::BatchSnapshot;
use crate::services::gateway::ModelGateway;
use std::borrow::Cow;
use std::path::Path;
use std::time::Instant;
use tracing::{info, warn};

/// One queued entry: a path materialized at its turn, or bytes already in
/// hand (camera frames, clipboard drops).
#[derive(Debug, Clone)]
pub enum BatchItem {
    Path(String),
    Upload(MediaUpload),
}

impl BatchItem {
    pub fn label(&self) -> &str {
        match self {
            BatchItem::Path(p) => p,
            BatchItem::Upload(u) => &u.name,
        }
    }

    /// Materialize the upload. Paths are read here, inside the loop, so a
    /// queue of large videos never holds more than one file's bytes at a
    /// time, and a read failure is an item failure like any other.
    fn load(&self) -> Result<Cow<'_, MediaUpload>, AnalysisError> {
        match self {
            BatchItem::Path(p) => MediaUpload::from_path(p).map(Cow::Owned),
            BatchItem::Upload(u) => Ok(Cow::Borrowed(u)),
        }
    }
}

/// Run every item through the pipeline in submission order. `on_progress`
/// is invoked with a fresh snapshot after each item completes or fails, and
/// once more with `done` set after the last item. Returns the successful
/// results in submission order.
pub async fn run_batch<G, F>(
    gateway: &G,
    items: &[BatchItem],
    previews_dir: Option<&Path>,
    mut on_progress: F,
) -> Vec<crate::models::AnalysisResult>
where
    G: ModelGateway,
    F: FnMut(&BatchSnapshot),
{
    let started = Instant::now();
    let total = items.len();
    info!("[BATCH] starting triage of {} files", total);

    let mut completed = Vec::new();
    let mut failed = 0usize;

    for (index, item) in items.iter().enumerate() {
        let outcome = match item.load() {
            Ok(upload) => analyze_media(gateway, &upload, previews_dir).await,
            Err(e) => Err(e),
        };
        match outcome {
            Ok(result) => completed.push(result),
            Err(e) => {
                failed += 1;
                warn!(
                    "[BATCH] item {} ({}) failed [{}]: {}",
                    index,
                    item.label(),
                    e.category(),
                    e
                );
            }
        }

        on_progress(&BatchSnapshot {
            completed: completed.clone(),
            current_index: index + 1,
            total,
            failed,
            done: false,
        });
    }

    on_progress(&BatchSnapshot {
        completed: completed.clone(),
        current_index: total,
        total,
        failed,
        done: true,
    });

    info!(
        "[BATCH] done: {} ok, {} failed, elapsed_ms={}",
        completed.len(),
        failed,
        started.elapsed().as_millis()
    );
    completed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::gateway::{GatewayError, ModelGateway, ModelReply, ModelRequest};
    use std::sync::Mutex;

    struct ScriptedGateway {
        replies: Mutex<Vec<Result<ModelReply, GatewayError>>>,
    }

    impl ScriptedGateway {
        fn new(replies: Vec<Result<ModelReply, GatewayError>>) -> Self {
            Self { replies: Mutex::new(replies) }
        }
    }

    impl ModelGateway for ScriptedGateway {
        async fn generate(&self, _request: &ModelRequest) -> Result<ModelReply, GatewayError> {
            self.replies.lock().unwrap().remove(0)
        }
    }

    fn ok_reply(probability: i64) -> Result<ModelReply, GatewayError> {
        Ok(ModelReply {
            text: format!(
                "{{\"verdict\":\"LIKELY_FAKE\",\"deepfakeProbability\":{}}}",
                probability
            ),
            sources: Vec::new(),
        })
    }

    fn items(n: usize) -> Vec<BatchItem> {
        (0..n)
            .map(|i| {
                BatchItem::Upload(MediaUpload {
                    name: format!("file{}.png", i),
                    mime_type: "image/png".to_string(),
                    bytes: vec![i as u8],
                })
            })
            .collect()
    }

    #[tokio::test]
    async fn test_one_failure_does_not_abort_the_batch() {
        let gateway = ScriptedGateway::new(vec![
            ok_reply(80),
            Err(GatewayError::Remote { status: 500, message: "boom".to_string() }),
            ok_reply(60),
        ]);

        let mut snapshots = Vec::new();
        let completed = run_batch(&gateway, &items(3), None, |s| snapshots.push(s.clone())).await;

        assert_eq!(completed.len(), 2);
        assert_eq!(completed[0].file_metadata.name, "file0.png");
        assert_eq!(completed[1].file_metadata.name, "file2.png");

        let last = snapshots.last().unwrap();
        assert!(last.done);
        assert_eq!(last.total, 3);
        assert_eq!(last.failed, 1);
        assert_eq!(last.completed.len(), 2);
    }

    #[tokio::test]
    async fn test_unreadable_path_counts_as_failed_item() {
        // One reply per readable item; the bad path must not consume one.
        let gateway = ScriptedGateway::new(vec![ok_reply(75), ok_reply(40)]);

        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("frame.png");
        std::fs::write(&good, [1u8, 2, 3]).unwrap();
        let missing = dir.path().join("not-there.png");

        let queue = vec![
            BatchItem::Path(good.to_string_lossy().to_string()),
            BatchItem::Path(missing.to_string_lossy().to_string()),
            items(1).remove(0),
        ];

        let mut snapshots = Vec::new();
        let completed = run_batch(&gateway, &queue, None, |s| snapshots.push(s.clone())).await;

        assert_eq!(completed.len(), 2);
        assert_eq!(completed[0].file_metadata.name, "frame.png");

        let last = snapshots.last().unwrap();
        assert_eq!(last.total, 3);
        assert_eq!(last.failed, 1);
        assert!(last.done);
        // The failed read shows up in the snapshot for the second attempt.
        assert_eq!(snapshots[1].failed, 1);
        assert_eq!(snapshots[1].current_index, 2);
    }

    #[tokio::test]
    async fn test_snapshot_after_every_item() {
        let gateway = ScriptedGateway::new(vec![ok_reply(70), ok_reply(30)]);

        let mut indices = Vec::new();
        run_batch(&gateway, &items(2), None, |s| {
            indices.push((s.current_index, s.done))
        })
        .await;

        assert_eq!(indices, vec![(1, false), (2, false), (2, true)]);
    }

    #[tokio::test]
    async fn test_all_failures_still_reach_done() {
        let gateway = ScriptedGateway::new(vec![
            Err(GatewayError::MissingContent),
            Err(GatewayError::SafetyBlocked("SAFETY".to_string())),
        ]);

        let mut done = false;
        let completed = run_batch(&gateway, &items(2), None, |s| done = s.done).await;
        assert!(completed.is_empty());
        assert!(done);
    }

    #[tokio::test]
    async fn test_empty_batch_signals_done_immediately() {
        let gateway = ScriptedGateway::new(Vec::new());
        let mut snapshots = 0;
        let completed = run_batch(&gateway, &[], None, |s| {
            snapshots += 1;
            assert!(s.done);
        })
        .await;
        assert!(completed.is_empty());
        assert_eq!(snapshots, 1);
    }
}
