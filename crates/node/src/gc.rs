//! Periodic content-store repo garbage collection.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::debug;

use crate::context::AppContext;

/// Repo GC walks the whole local blockstore; give it plenty of time.
const GC_TIMEOUT: Duration = Duration::from_secs(6 * 3600);

pub async fn gc_tick(ctx: Arc<AppContext>) -> Result<()> {
    debug!("starting content-store repo gc");
    ctx.content.repo_gc(GC_TIMEOUT).await.context("repo gc")?;
    Ok(())
}
