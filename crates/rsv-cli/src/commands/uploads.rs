use std::sync::Arc;

use anyhow::{bail, Result};
use rsv_db::PgStore;
use rsv_reconcile::UploadTracker;

pub async fn status(store: Arc<PgStore>, token: &str) -> Result<()> {
    let tracker = UploadTracker::new(store, tracing::info_span!("uploads"));
    let rows = tracker.by_token(token).await?;
    match rows.as_slice() {
        [only] => println!(
            "upload_id={} status={} file={} path={}",
            only.id,
            only.status.as_str(),
            only.file_name,
            only.path
        ),
        [] => bail!("no upload with token {token}"),
        many => bail!("{} uploads share token {token}", many.len()),
    }
    Ok(())
}

pub async fn latest(store: Arc<PgStore>) -> Result<()> {
    let tracker = UploadTracker::new(store, tracing::info_span!("uploads"));
    match tracker.latest_by_token().await? {
        Some(u) => println!("token={} upload_id={} status={}", u.token, u.id, u.status.as_str()),
        None => println!("token="),
    }
    Ok(())
}
