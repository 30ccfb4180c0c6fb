//! Shared runtime state for rsv-daemon.
//!
//! Handlers receive `State<Arc<AppState<S>>>` from Axum. The store type is
//! a parameter so tests can run the router over the in-memory store.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use rsv_reconcile::{ErrorLedger, IngestOutcome, IngestPipeline, ReservationStore, UploadTracker};
use serde::Serialize;
use tokio::sync::{broadcast, watch};

// ---------------------------------------------------------------------------
// BusMsg: SSE event bus payload
// ---------------------------------------------------------------------------

/// Messages broadcast over the internal event bus and surfaced as SSE events.
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BusMsg {
    Heartbeat { ts_millis: i64 },
    /// New files were handed from the poller to the ingest consumer.
    Discovered { files: usize },
    Ingested(IngestOutcome),
    LogLine { level: String, msg: String },
}

impl BusMsg {
    pub fn event_name(&self) -> &'static str {
        match self {
            BusMsg::Heartbeat { .. } => "heartbeat",
            BusMsg::Discovered { .. } => "discovered",
            BusMsg::Ingested(_) => "ingested",
            BusMsg::LogLine { .. } => "log",
        }
    }
}

/// Static build metadata included in health responses.
#[derive(Clone, Debug, Serialize)]
pub struct BuildInfo {
    pub service: &'static str,
    pub version: &'static str,
}

// ---------------------------------------------------------------------------
// AppState
// ---------------------------------------------------------------------------

pub struct AppState<S> {
    /// Broadcast bus for SSE.
    pub bus: broadcast::Sender<BusMsg>,
    pub build: BuildInfo,
    pub pipeline: IngestPipeline<S>,
    /// Where CSV bodies posted to the API are written before ingestion.
    pub upload_dir: PathBuf,
}

impl<S: ReservationStore> AppState<S> {
    pub fn new(store: Arc<S>, upload_dir: PathBuf, stop: watch::Receiver<bool>) -> Self {
        let (bus, _rx) = broadcast::channel::<BusMsg>(1024);
        Self {
            bus,
            build: BuildInfo {
                service: "rsv-daemon",
                version: env!("CARGO_PKG_VERSION"),
            },
            pipeline: IngestPipeline::new(store, stop, tracing::info_span!("ingest")),
            upload_dir,
        }
    }

    pub fn tracker(&self) -> &UploadTracker<S> {
        self.pipeline.batch().tracker()
    }

    pub fn ledger(&self) -> &ErrorLedger<S> {
        self.pipeline.batch().ledger()
    }

    /// Publish on the bus; no subscribers is not an error.
    pub fn publish(&self, msg: BusMsg) {
        let _ = self.bus.send(msg);
    }
}

/// Spawn a background task that emits a heartbeat SSE every `interval`.
pub fn spawn_heartbeat(bus: broadcast::Sender<BusMsg>, interval: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            let ts = chrono::Utc::now().timestamp_millis();
            let _ = bus.send(BusMsg::Heartbeat { ts_millis: ts });
        }
    });
}
