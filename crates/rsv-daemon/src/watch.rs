//! Poller + ingest consumer wiring.
//!
//! The poller runs in its own task and hands lists of new files to a
//! single consumer. The consumer accepts one list at a time, ingests it
//! oldest file first, and publishes each outcome on the bus. Once stop is
//! requested it finishes the file in progress and takes nothing else; the
//! files it left behind are all newer than the last recorded upload, so the
//! seeded watermark finds them again after restart.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rsv_csv::SiteController;
use rsv_reconcile::{FileBatch, FilePoller, ReservationStore};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{error, info, warn, Instrument};

use crate::state::{AppState, BusMsg};

pub struct WatchHandles {
    pub poller: JoinHandle<Option<DateTime<Utc>>>,
    pub consumer: JoinHandle<()>,
}

pub fn spawn_watch<S: ReservationStore>(
    st: Arc<AppState<S>>,
    poller: FilePoller,
    site_controller: SiteController,
    stop: watch::Receiver<bool>,
) -> WatchHandles {
    let (tx, rx) = mpsc::channel::<FileBatch>(1);
    let poller = tokio::spawn(poller.run(tx, stop));
    let consumer = tokio::spawn(
        consume(st, rx, site_controller).instrument(tracing::info_span!("consumer")),
    );
    WatchHandles { poller, consumer }
}

/// Ingest every handed-off list until the poller closes the channel or
/// stop is requested.
pub async fn consume<S: ReservationStore>(
    st: Arc<AppState<S>>,
    mut rx: mpsc::Receiver<FileBatch>,
    site_controller: SiteController,
) {
    while let Some(batch) = rx.recv().await {
        if st.pipeline.is_stopped() {
            warn!(files = batch.len(), "consumer/stopping; list left for next start");
            break;
        }
        let files = batch.accept();
        st.publish(BusMsg::Discovered { files: files.len() });

        for (done, file) in files.iter().rev().enumerate() {
            match st.pipeline.ingest_discovered(file, site_controller).await {
                Ok(Some(outcome)) => {
                    info!(
                        upload_id = outcome.upload_id,
                        file = %outcome.file_name,
                        status = outcome.status.as_str(),
                        "consumer/ingested"
                    );
                    st.publish(BusMsg::Ingested(outcome));
                }
                Ok(None) => {
                    warn!(
                        remaining = files.len() - done,
                        "consumer/stopping; remaining files left for next start"
                    );
                    info!("consumer/stop");
                    return;
                }
                Err(e) => {
                    error!(file = %file.path.display(), error = %format!("{e:#}"), "consumer/ingest failed");
                    st.publish(BusMsg::LogLine {
                        level: "error".to_string(),
                        msg: format!("ingest {} failed: {e:#}", file.name),
                    });
                }
            }
        }
    }
    info!("consumer/stop");
}
