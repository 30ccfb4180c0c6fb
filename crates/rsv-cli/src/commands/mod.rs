pub mod ingest;
pub mod ledger;
pub mod uploads;

use std::sync::Arc;

use anyhow::Result;
use rsv_config::EngineConfig;
use rsv_db::PgStore;

pub async fn connect_store(cfg: &EngineConfig) -> Result<Arc<PgStore>> {
    let pool = rsv_db::connect(cfg.require_database_url()?).await?;
    Ok(Arc::new(PgStore::new(pool)))
}
