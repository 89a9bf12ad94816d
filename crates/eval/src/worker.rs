//! Background evaluation workers
//!
//! Decoupled from the relay by a queue of call ids: the recorder publishes
//! an id once a frame is persisted, a worker picks it up whenever it gets
//! around to it. Workers share one receiver behind an async mutex and shut
//! down when the queue closes. Every `benchmark_every_calls` completed
//! evaluations, the latest golden set is re-run as a drift check.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;

use receptionist_store::{BusinessStore, FrameStore, GoldenSet};

use crate::golden::run_benchmark;
use crate::shadow::ShadowEvaluator;
use crate::EvalError;

pub struct WorkerPool {
    pub handles: Vec<JoinHandle<()>>,
}

/// Spawn the evaluation worker pool.
pub fn spawn_workers(
    workers: usize,
    benchmark_every_calls: u64,
    rx: mpsc::UnboundedReceiver<String>,
    evaluator: Arc<ShadowEvaluator>,
    store: Arc<dyn FrameStore>,
    business: Arc<BusinessStore>,
    golden_sets: Vec<GoldenSet>,
) -> WorkerPool {
    let rx = Arc::new(Mutex::new(rx));
    let completed = Arc::new(AtomicU64::new(0));
    let latest_golden = Arc::new(golden_sets.into_iter().max_by_key(|s| s.version));

    let handles = (0..workers.max(1))
        .map(|worker_id| {
            let rx = rx.clone();
            let evaluator = evaluator.clone();
            let store = store.clone();
            let business = business.clone();
            let completed = completed.clone();
            let latest_golden = latest_golden.clone();

            tokio::spawn(async move {
                loop {
                    let call_sid = { rx.lock().await.recv().await };
                    let Some(call_sid) = call_sid else {
                        tracing::debug!(worker_id, "Evaluation queue closed, worker exiting");
                        break;
                    };

                    if let Err(e) = evaluate_one(&call_sid, &evaluator, &*store, &business).await {
                        match e {
                            EvalError::UnauthorizedWrite { .. } => {
                                tracing::error!(worker_id, call_sid = %call_sid, error = %e, "Replay write gate tripped");
                            }
                            e => {
                                tracing::warn!(worker_id, call_sid = %call_sid, error = %e, "Shadow evaluation failed");
                            }
                        }
                        continue;
                    }

                    let done = completed.fetch_add(1, Ordering::SeqCst) + 1;
                    if done % benchmark_every_calls == 0 {
                        log_rolling_summary(worker_id, &*store).await;
                        if let Some(set) = latest_golden.as_ref() {
                            let snapshot = business.snapshot();
                            match run_benchmark(&evaluator, set, &snapshot).await {
                                Ok(report) => {
                                    tracing::info!(
                                        worker_id,
                                        version = report.version,
                                        passed = report.passed,
                                        total = report.total,
                                        blocks_promotion = report.blocks_promotion(),
                                        "Rolling golden benchmark completed"
                                    );
                                }
                                Err(e) => {
                                    tracing::warn!(worker_id, error = %e, "Golden benchmark run failed");
                                }
                            }
                        }
                    }
                }
            })
        })
        .collect();

    WorkerPool { handles }
}

/// Aggregate every stored result and log the rolling picture. Calls still
/// waiting in the queue simply don't contribute yet.
async fn log_rolling_summary(worker_id: usize, store: &dyn FrameStore) {
    let sids = match store.list_frames().await {
        Ok(sids) => sids,
        Err(e) => {
            tracing::warn!(worker_id, error = %e, "Could not list frames for summary");
            return;
        }
    };

    let mut results = Vec::new();
    for sid in &sids {
        if let Ok(result) = store.load_result(sid).await {
            results.push(result);
        }
    }

    let summary = crate::summary::summarize(&results);
    tracing::info!(
        worker_id,
        total = summary.total,
        passed = summary.passed,
        avg_match_score = summary.avg_match_score,
        tool_divergences = summary.tool_divergences,
        "Rolling evaluation summary"
    );
}

async fn evaluate_one(
    call_sid: &str,
    evaluator: &ShadowEvaluator,
    store: &dyn FrameStore,
    business: &BusinessStore,
) -> Result<(), EvalError> {
    let frame = store.load_frame(call_sid).await?;
    let snapshot = business.snapshot();

    let result = evaluator.evaluate(&frame, &snapshot).await?;
    tracing::info!(
        call_sid,
        match_score = result.match_score,
        passed = result.passed,
        "Shadow evaluation completed"
    );
    store.save_result(&result).await?;
    Ok(())
}
