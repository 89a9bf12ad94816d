//! Conversation frame recorder
//!
//! Fire-and-forget relative to the audio path: the relay pushes turns into
//! an unbounded channel and a background task owns the frame. Persistence
//! happens once at finalize, with a single delayed retry; a store failure
//! is logged and never reaches the live call.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, oneshot};

use receptionist_core::{ConversationFrame, Turn};
use receptionist_store::{CallRecord, CallStatus, FrameStore};

const RETRY_DELAY: Duration = Duration::from_millis(500);

/// Result of the finalize pass, mostly for tests and logging
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FinalizeOutcome {
    pub persisted: bool,
    pub turns: usize,
}

enum RecorderMsg {
    Record(Turn),
    Finalize {
        ended_at: Option<DateTime<Utc>>,
        ack: oneshot::Sender<FinalizeOutcome>,
    },
}

/// Handle the relay uses to feed the recorder task
#[derive(Clone)]
pub struct RecorderHandle {
    tx: mpsc::UnboundedSender<RecorderMsg>,
}

impl RecorderHandle {
    /// Non-blocking append. A closed recorder is logged, not an error.
    pub fn record(&self, turn: Turn) {
        if self.tx.send(RecorderMsg::Record(turn)).is_err() {
            tracing::warn!("Recorder task gone, dropping turn");
        }
    }

    /// Persist the frame and publish the call to the evaluation queue.
    /// The returned receiver resolves once persistence has been attempted.
    pub fn finalize(&self, ended_at: Option<DateTime<Utc>>) -> oneshot::Receiver<FinalizeOutcome> {
        let (ack, rx) = oneshot::channel();
        if self
            .tx
            .send(RecorderMsg::Finalize { ended_at, ack })
            .is_err()
        {
            tracing::warn!("Recorder task gone, frame not finalized");
        }
        rx
    }
}

/// Spawn the recorder task for one call.
pub fn spawn_recorder(
    call_sid: &str,
    business_id: &str,
    caller_number: &str,
    timezone: &str,
    store: Arc<dyn FrameStore>,
    eval_tx: Option<mpsc::UnboundedSender<String>>,
) -> RecorderHandle {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut frame = ConversationFrame::new(call_sid, caller_number, timezone);
    let mut record = CallRecord::started(call_sid, business_id, caller_number);
    let call_sid = call_sid.to_string();

    tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            match msg {
                RecorderMsg::Record(turn) => frame.turns.push(turn),
                RecorderMsg::Finalize { ended_at, ack } => {
                    record.ended_at = ended_at.or_else(|| Some(Utc::now()));
                    record.status = CallStatus::Completed;
                    record.intent = Some(frame.overall_intent().to_string());

                    let persisted = persist(&*store, &frame, &record).await;
                    if persisted {
                        if let Some(eval_tx) = &eval_tx {
                            if eval_tx.send(call_sid.clone()).is_err() {
                                tracing::warn!(call_sid = %call_sid, "Evaluation queue closed");
                            }
                        }
                    }
                    let _ = ack.send(FinalizeOutcome {
                        persisted,
                        turns: frame.turns.len(),
                    });
                    break;
                }
            }
        }
    });

    RecorderHandle { tx }
}

/// Save frame then record, retrying each once after a short delay.
async fn persist(store: &dyn FrameStore, frame: &ConversationFrame, record: &CallRecord) -> bool {
    for attempt in 0..2 {
        let result = async {
            store.save_frame(frame).await?;
            store.save_record(record).await
        }
        .await;

        match result {
            Ok(()) => {
                tracing::info!(
                    call_sid = %frame.call_sid,
                    turns = frame.turns.len(),
                    intent = record.intent.as_deref().unwrap_or(""),
                    "Conversation frame persisted"
                );
                return true;
            }
            Err(e) if attempt == 0 => {
                tracing::warn!(call_sid = %frame.call_sid, error = %e, "Frame save failed, retrying");
                tokio::time::sleep(RETRY_DELAY).await;
            }
            Err(e) => {
                tracing::error!(call_sid = %frame.call_sid, error = %e, "Frame save failed twice, giving up");
            }
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use receptionist_store::{MemoryFrameStore, StoreError};
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn test_records_and_publishes_to_eval_queue() {
        let store = Arc::new(MemoryFrameStore::new());
        let (eval_tx, mut eval_rx) = mpsc::unbounded_channel();

        let recorder = spawn_recorder(
            "CA1",
            "default",
            "+15550001111",
            "UTC",
            store.clone(),
            Some(eval_tx),
        );
        recorder.record(Turn::caller("I'd like to book something", Utc::now()));
        recorder.record(Turn::ai("Sure, when works for you?", Utc::now()));

        let outcome = recorder.finalize(Some(Utc::now())).await.unwrap();
        assert!(outcome.persisted);
        assert_eq!(outcome.turns, 2);

        let frame = store.load_frame("CA1").await.unwrap();
        assert_eq!(frame.turns.len(), 2);

        let record = store.load_record("CA1").await.unwrap();
        assert_eq!(record.status, CallStatus::Completed);
        assert_eq!(record.intent.as_deref(), Some("booking_inquiry"));
        assert!(record.duration_seconds().is_some());

        assert_eq!(eval_rx.recv().await.unwrap(), "CA1");
    }

    /// Store that fails its first save_frame, then delegates to memory.
    struct FlakyStore {
        inner: MemoryFrameStore,
        failures_left: AtomicU32,
    }

    #[async_trait]
    impl FrameStore for FlakyStore {
        async fn save_record(&self, record: &CallRecord) -> Result<(), StoreError> {
            self.inner.save_record(record).await
        }

        async fn load_record(&self, call_sid: &str) -> Result<CallRecord, StoreError> {
            self.inner.load_record(call_sid).await
        }

        async fn save_frame(&self, frame: &ConversationFrame) -> Result<(), StoreError> {
            if self.failures_left.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                n.checked_sub(1)
            }).is_ok()
            {
                return Err(StoreError::NotFound("simulated outage".to_string()));
            }
            self.inner.save_frame(frame).await
        }

        async fn load_frame(&self, call_sid: &str) -> Result<ConversationFrame, StoreError> {
            self.inner.load_frame(call_sid).await
        }

        async fn list_frames(&self) -> Result<Vec<String>, StoreError> {
            self.inner.list_frames().await
        }

        async fn save_result(
            &self,
            result: &receptionist_core::EvaluationResult,
        ) -> Result<(), StoreError> {
            self.inner.save_result(result).await
        }

        async fn load_result(
            &self,
            call_sid: &str,
        ) -> Result<receptionist_core::EvaluationResult, StoreError> {
            self.inner.load_result(call_sid).await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_once_on_store_failure() {
        let store = Arc::new(FlakyStore {
            inner: MemoryFrameStore::new(),
            failures_left: AtomicU32::new(1),
        });

        let recorder = spawn_recorder("CA2", "default", "+1555", "UTC", store.clone(), None);
        recorder.record(Turn::caller("hello", Utc::now()));

        let outcome = recorder.finalize(None).await.unwrap();
        assert!(outcome.persisted);
        assert!(store.inner.load_frame("CA2").await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_after_second_failure() {
        let store = Arc::new(FlakyStore {
            inner: MemoryFrameStore::new(),
            failures_left: AtomicU32::new(2),
        });
        let (eval_tx, mut eval_rx) = mpsc::unbounded_channel();

        let recorder = spawn_recorder("CA3", "default", "+1555", "UTC", store, Some(eval_tx));
        let outcome = recorder.finalize(None).await.unwrap();

        assert!(!outcome.persisted);
        // Unpersisted calls are never published for evaluation.
        assert!(eval_rx.try_recv().is_err());
    }
}
