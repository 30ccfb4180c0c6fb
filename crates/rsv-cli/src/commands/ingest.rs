use std::path::Path;

use anyhow::{bail, Result};
use rsv_config::EngineConfig;
use rsv_csv::SiteController;
use rsv_reconcile::IngestPipeline;
use rsv_schemas::UploadStatus;
use tokio::sync::watch;

/// One-shot ingest. Ctrl-C before the upload starts leaves nothing recorded;
/// once rows are being applied the batch runs to the end.
pub async fn run(cfg: &EngineConfig, file: &Path, sc: &str, token: &str) -> Result<()> {
    // Reject an unknown controller before touching the database.
    SiteController::parse(sc)?;
    if !file.is_file() {
        bail!("not a file: {}", file.display());
    }

    let store = super::connect_store(cfg).await?;
    let (stop_tx, stop_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = stop_tx.send(true);
        }
    });

    let pipeline = IngestPipeline::new(store, stop_rx, tracing::info_span!("ingest"));
    let Some(out) = pipeline.submit_upload(file, token, sc).await? else {
        println!("status=not_started");
        bail!("stopped before the upload started");
    };

    println!(
        "upload_id={} status={} rows={} created={} cancelled={} failed={}",
        out.upload_id,
        out.status.as_str(),
        out.rows_total,
        out.created,
        out.cancelled,
        out.failures.len()
    );
    for f in &out.failures {
        println!("line={} name={} error={}", f.line, f.customer_name, f.error);
    }
    if let Some(e) = &out.parse_error {
        println!("parse_error={e}");
    }

    if out.status == UploadStatus::Error {
        bail!("upload {} ended in ERROR", out.upload_id);
    }
    Ok(())
}
