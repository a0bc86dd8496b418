use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use mimalloc::MiMalloc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use volley::report::{append_report, default_report_path};
use volley::{HttpTransport, OutcomeRecord, PacingScheduler};

use crate::plan::RunPlan;
use crate::summary::RunSummary;

mod plan;
mod summary;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("volley=info,volley_cli=info")),
        )
        .init();

    let plan_path = std::env::args()
        .nth(1)
        .map_or_else(|| PathBuf::from("volley.toml"), PathBuf::from);
    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to build runtime")?;
    let _guard = rt.enter();
    rt.block_on(run_from_file(&plan_path)).inspect_err(|e| {
        error!("volley run failed: {e:#}");
    })?;
    Ok(())
}

async fn run_from_file(path: &Path) -> Result<()> {
    info!("Loading run plan from {}", path.display());
    let plan = RunPlan::from_file(path)?;
    let (records, report_path) = run(plan).await?;
    info!(
        "Wrote {} records to {}",
        records.len(),
        report_path.display()
    );
    Ok(())
}

/// Runs the plan once, logs the summary and appends the report.
async fn run(plan: RunPlan) -> Result<(Vec<OutcomeRecord>, PathBuf)> {
    let descriptor = Arc::new(plan.request.descriptor()?);
    let transport = HttpTransport::new(&plan.transport);
    let scheduler = PacingScheduler::new(transport, plan.load);
    let records = scheduler.dispatch(descriptor.clone()).await;

    if let Some(summary) = RunSummary::from_records(&records, plan.report.summary_bucket_ms) {
        summary.log(&descriptor);
    }

    let report_path = match plan.report.path {
        Some(path) => path,
        None => {
            let dir = plan.report.directory.unwrap_or_else(|| PathBuf::from("."));
            default_report_path(&dir, Utc::now())
        }
    };
    append_report(&report_path, &descriptor, &records)
        .with_context(|| format!("Failed to write report {}", report_path.display()))?;
    Ok((records, report_path))
}
