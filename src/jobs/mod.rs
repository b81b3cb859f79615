//! Background job scheduling

pub mod acquisition;

use std::sync::Arc;

use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::info;

use crate::services::remote_fetch::HttpRemoteFetch;

pub use acquisition::{AcquisitionPipeline, ItemOutcome, ScanSummary};

/// Initialize and start the periodic scan scheduler
pub async fn start_scheduler(
    pipeline: Arc<AcquisitionPipeline<HttpRemoteFetch>>,
    interval_mins: u64,
    scan_limit: usize,
) -> anyhow::Result<JobScheduler> {
    let scheduler = JobScheduler::new().await?;

    let cron = format!("0 */{} * * * *", interval_mins.clamp(1, 59));

    let scan_job = Job::new_async(cron.as_str(), move |_uuid, _l| {
        let pipeline = pipeline.clone();
        Box::pin(async move {
            info!("Running scheduled acquisition scan");
            pipeline.scan(scan_limit).await;
        })
    })?;
    scheduler.add(scan_job).await?;

    scheduler.start().await?;
    info!(interval_mins, "Acquisition scheduler started");

    Ok(scheduler)
}
