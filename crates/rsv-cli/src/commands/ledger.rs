use std::sync::Arc;

use anyhow::Result;
use rsv_db::PgStore;
use rsv_reconcile::ErrorLedger;

pub async fn list(store: Arc<PgStore>) -> Result<()> {
    let ledger = ErrorLedger::new(store, tracing::info_span!("ledger"));
    let errors = ledger.list_unresolved().await?;
    println!("{}", serde_json::to_string_pretty(&errors)?);
    Ok(())
}

pub async fn resolve(store: Arc<PgStore>) -> Result<()> {
    let ledger = ErrorLedger::new(store, tracing::info_span!("ledger"));
    let n = ledger.resolve_all().await?;
    println!("resolved={n}");
    Ok(())
}
