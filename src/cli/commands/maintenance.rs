use anyhow::Result;
use loki_core::LokiError;
use loki_storage::{maintenance, settings};

use crate::cli::formatter::success;
use crate::cli::CliContext;

pub fn finalize(ctx: &CliContext) -> Result<()> {
    let mut db = ctx.open_db()?;
    db.ensure_writeable()?;
    if settings::is_finalized(db.connection())? {
        return Err(LokiError::Finalized.into());
    }
    let (conn, schema) = db.parts_mut();
    let tx = conn.transaction()?;
    let emptied = maintenance::finalize(&tx, schema)?;
    tx.commit()?;
    success(&format!("Finalized; emptied {} staging tables", emptied.len()));
    Ok(())
}

pub fn optimize(ctx: &CliContext) -> Result<()> {
    let db = ctx.open_db()?;
    db.ensure_writeable()?;
    maintenance::optimize(db.connection())?;
    success("Database optimized");
    Ok(())
}
