//! Application state
//!
//! Shared state across all handlers.

use std::sync::Arc;

use tokio::sync::{mpsc, Semaphore};

use receptionist_config::Settings;
use receptionist_core::BusinessConfig;
use receptionist_relay::RelayContext;
use receptionist_store::{BusinessStore, FrameStore, MemoryFrameStore};
use receptionist_tools::{create_default_registry, SimulatedCalendar, ToolRegistry};

/// Application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Settings>,
    pub business: Arc<BusinessStore>,
    pub frames: Arc<dyn FrameStore>,
    pub tools: Arc<ToolRegistry>,
    /// Publisher side of the evaluation queue; `None` when the shadow
    /// evaluator is disabled
    pub eval_tx: Option<mpsc::UnboundedSender<String>>,
    /// Bounds active relay loops to `server.max_concurrent_calls`;
    /// each stream holds a permit for its lifetime.
    pub call_permits: Arc<Semaphore>,
}

impl AppState {
    pub fn new(
        config: Settings,
        business: Arc<BusinessStore>,
        frames: Arc<dyn FrameStore>,
        eval_tx: Option<mpsc::UnboundedSender<String>>,
    ) -> Self {
        let calendar = Arc::new(SimulatedCalendar::new());
        let call_permits = Arc::new(Semaphore::new(config.server.max_concurrent_calls));
        Self {
            config: Arc::new(config),
            business,
            frames,
            tools: Arc::new(create_default_registry(calendar)),
            eval_tx,
            call_permits,
        }
    }

    /// State with in-memory stores and default config, for tests.
    #[doc(hidden)]
    pub fn for_tests() -> Self {
        let business = BusinessStore::new(BusinessConfig::default())
            .expect("default config is valid");
        Self::new(
            Settings::default(),
            Arc::new(business),
            Arc::new(MemoryFrameStore::new()),
            None,
        )
    }

    /// Per-call relay context from the current snapshots.
    pub fn relay_context(&self) -> RelayContext {
        RelayContext {
            settings: self.config.clone(),
            business: self.business.snapshot(),
            tools: self.tools.clone(),
            store: self.frames.clone(),
            eval_tx: self.eval_tx.clone(),
        }
    }
}
