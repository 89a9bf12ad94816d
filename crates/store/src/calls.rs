//! Call records and conversation frame persistence
//!
//! Frames are written by the recorder task at call end and read back by the
//! shadow evaluator, so the store trait is async and backends are swappable:
//! in-memory for tests, JSON files on disk for the running service.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use receptionist_core::{ConversationFrame, EvaluationResult};
use serde::{Deserialize, Serialize};

use crate::StoreError;

/// Lifecycle status of a call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallStatus {
    InProgress,
    Completed,
    Failed,
}

/// Per-call summary persisted beside the conversation frame
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallRecord {
    pub call_sid: String,
    pub business_id: String,
    pub caller_number: String,
    pub status: CallStatus,
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub ended_at: Option<DateTime<Utc>>,
    /// Overall intent inferred from the frame, not asked of the AI
    #[serde(default)]
    pub intent: Option<String>,
}

impl CallRecord {
    pub fn started(call_sid: &str, business_id: &str, caller_number: &str) -> Self {
        Self {
            call_sid: call_sid.to_string(),
            business_id: business_id.to_string(),
            caller_number: caller_number.to_string(),
            status: CallStatus::InProgress,
            started_at: Utc::now(),
            ended_at: None,
            intent: None,
        }
    }

    /// Call duration from the two wall-clock timestamps. `None` while the
    /// call is still in progress.
    pub fn duration_seconds(&self) -> Option<i64> {
        self.ended_at
            .map(|end| (end - self.started_at).num_seconds())
    }
}

/// Storage backend for call records and conversation frames
#[async_trait]
pub trait FrameStore: Send + Sync {
    async fn save_record(&self, record: &CallRecord) -> Result<(), StoreError>;

    async fn load_record(&self, call_sid: &str) -> Result<CallRecord, StoreError>;

    async fn save_frame(&self, frame: &ConversationFrame) -> Result<(), StoreError>;

    async fn load_frame(&self, call_sid: &str) -> Result<ConversationFrame, StoreError>;

    /// Call sids with a persisted frame, oldest write order not guaranteed
    async fn list_frames(&self) -> Result<Vec<String>, StoreError>;

    async fn save_result(&self, result: &EvaluationResult) -> Result<(), StoreError>;

    async fn load_result(&self, call_sid: &str) -> Result<EvaluationResult, StoreError>;
}

/// In-memory backend, used by tests and as an eval-disabled fallback
#[derive(Default)]
pub struct MemoryFrameStore {
    records: RwLock<HashMap<String, CallRecord>>,
    frames: RwLock<HashMap<String, ConversationFrame>>,
    results: RwLock<HashMap<String, EvaluationResult>>,
}

impl MemoryFrameStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl FrameStore for MemoryFrameStore {
    async fn save_record(&self, record: &CallRecord) -> Result<(), StoreError> {
        self.records
            .write()
            .insert(record.call_sid.clone(), record.clone());
        Ok(())
    }

    async fn load_record(&self, call_sid: &str) -> Result<CallRecord, StoreError> {
        self.records
            .read()
            .get(call_sid)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("record {call_sid}")))
    }

    async fn save_frame(&self, frame: &ConversationFrame) -> Result<(), StoreError> {
        self.frames
            .write()
            .insert(frame.call_sid.clone(), frame.clone());
        Ok(())
    }

    async fn load_frame(&self, call_sid: &str) -> Result<ConversationFrame, StoreError> {
        self.frames
            .read()
            .get(call_sid)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("frame {call_sid}")))
    }

    async fn list_frames(&self) -> Result<Vec<String>, StoreError> {
        Ok(self.frames.read().keys().cloned().collect())
    }

    async fn save_result(&self, result: &EvaluationResult) -> Result<(), StoreError> {
        self.results
            .write()
            .insert(result.call_sid.clone(), result.clone());
        Ok(())
    }

    async fn load_result(&self, call_sid: &str) -> Result<EvaluationResult, StoreError> {
        self.results
            .read()
            .get(call_sid)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("result {call_sid}")))
    }
}

/// JSON-file backend: one `<call_sid>.frame.json` and `<call_sid>.record.json`
/// per call under the data directory.
pub struct JsonFrameStore {
    dir: PathBuf,
}

impl JsonFrameStore {
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir).await?;
        Ok(Self { dir })
    }

    fn frame_path(&self, call_sid: &str) -> PathBuf {
        self.dir.join(format!("{}.frame.json", sanitize(call_sid)))
    }

    fn record_path(&self, call_sid: &str) -> PathBuf {
        self.dir.join(format!("{}.record.json", sanitize(call_sid)))
    }

    fn result_path(&self, call_sid: &str) -> PathBuf {
        self.dir.join(format!("{}.eval.json", sanitize(call_sid)))
    }

    async fn write_json<T: Serialize>(&self, path: &Path, value: &T) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec_pretty(value)?;
        // Write-then-rename so a crashed write never leaves a torn file.
        let tmp = path.with_extension("tmp");
        tokio::fs::write(&tmp, &bytes).await?;
        tokio::fs::rename(&tmp, path).await?;
        Ok(())
    }

    async fn read_json<T: for<'de> Deserialize<'de>>(
        &self,
        path: &Path,
        what: &str,
    ) -> Result<T, StoreError> {
        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StoreError::NotFound(what.to_string()));
            }
            Err(e) => return Err(e.into()),
        };
        Ok(serde_json::from_slice(&bytes)?)
    }
}

fn sanitize(call_sid: &str) -> String {
    call_sid
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

#[async_trait]
impl FrameStore for JsonFrameStore {
    async fn save_record(&self, record: &CallRecord) -> Result<(), StoreError> {
        self.write_json(&self.record_path(&record.call_sid), record)
            .await
    }

    async fn load_record(&self, call_sid: &str) -> Result<CallRecord, StoreError> {
        self.read_json(&self.record_path(call_sid), &format!("record {call_sid}"))
            .await
    }

    async fn save_frame(&self, frame: &ConversationFrame) -> Result<(), StoreError> {
        self.write_json(&self.frame_path(&frame.call_sid), frame)
            .await
    }

    async fn load_frame(&self, call_sid: &str) -> Result<ConversationFrame, StoreError> {
        self.read_json(&self.frame_path(call_sid), &format!("frame {call_sid}"))
            .await
    }

    async fn list_frames(&self) -> Result<Vec<String>, StoreError> {
        let mut out = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if let Some(sid) = name.strip_suffix(".frame.json") {
                out.push(sid.to_string());
            }
        }
        Ok(out)
    }

    async fn save_result(&self, result: &EvaluationResult) -> Result<(), StoreError> {
        self.write_json(&self.result_path(&result.call_sid), result)
            .await
    }

    async fn load_result(&self, call_sid: &str) -> Result<EvaluationResult, StoreError> {
        self.read_json(&self.result_path(call_sid), &format!("result {call_sid}"))
            .await
    }
}

/// Shared handle type used across the server and evaluation pipeline
pub type SharedFrameStore = Arc<dyn FrameStore>;
