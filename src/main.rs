//! Curator - automated acquisition pipeline for a movie catalog
//!
//! Scrapes a release forum, fetches the best release through a remote
//! debrid-style service, re-uploads it to file hosts, enriches it with TMDB
//! metadata, and records the watch/download links in the catalog database.

mod cli;
mod config;
mod db;
mod jobs;
mod services;

use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::EnvFilter;

use crate::cli::CliOptions;
use crate::config::Config;
use crate::db::Database;
use crate::jobs::AcquisitionPipeline;
use crate::services::distributor::{Distributor, HostKind, HttpUploadHost, UploadHost};
use crate::services::forum::ForumClient;
use crate::services::metadata::MetadataClient;
use crate::services::notify::Notifier;
use crate::services::poster_store::PosterStore;
use crate::services::remote_fetch::{HttpRemoteFetch, RemoteFetcher};
use crate::services::selection::SelectionPolicy;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env()?;
    let options = CliOptions::from_args();

    let db = Database::connect(&config.database_url).await?;

    let pipeline = Arc::new(build_pipeline(&config, db));

    let limit = options.limit.unwrap_or(config.scan_limit);

    if options.once {
        let summary = pipeline.scan(limit).await;
        println!(
            "Scan finished: scanned={} added={} skipped={} failed={}",
            summary.scanned, summary.added, summary.skipped, summary.failed
        );
        return Ok(());
    }

    // Run once at startup, then on the schedule until interrupted
    pipeline.scan(limit).await;

    let _scheduler =
        jobs::start_scheduler(pipeline.clone(), config.scan_interval_mins, limit).await?;

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down");

    Ok(())
}

/// Wire the pipeline collaborators from configuration
fn build_pipeline(config: &Config, db: Database) -> AcquisitionPipeline<HttpRemoteFetch> {
    let forum = ForumClient::new(
        config.forum_base_url.clone(),
        config.forum_index_path.clone(),
    );

    let remote_api = HttpRemoteFetch::new(
        config.remote_fetch_base_url.clone(),
        config.remote_fetch_email.clone().unwrap_or_default(),
        config.remote_fetch_password.clone().unwrap_or_default(),
    );
    if !remote_api.is_configured() {
        tracing::warn!("Remote fetch credentials not set; fetches will fail");
    }

    let fetcher = RemoteFetcher::new(
        remote_api,
        Duration::from_secs(config.remote_poll_secs),
        Duration::from_secs(config.remote_max_wait_mins * 60),
    );

    let stream_host = config.stream_host_url.clone().map(|url| {
        Box::new(HttpUploadHost::new(
            "stream",
            HostKind::Stream,
            url,
            config.stream_host_key.clone(),
        )) as Box<dyn UploadHost>
    });

    let download_host = config.download_host_url.clone().map(|url| {
        Box::new(HttpUploadHost::new(
            "download",
            HostKind::Download,
            url,
            config.download_host_key.clone(),
        )) as Box<dyn UploadHost>
    });

    let fallback_host = config.fallback_host_url.clone().map(|url| {
        Box::new(HttpUploadHost::new(
            "fallback",
            HostKind::Download,
            url,
            config.fallback_host_key.clone(),
        )) as Box<dyn UploadHost>
    });

    let distributor = Distributor::new(stream_host, download_host, fallback_host);

    let metadata = MetadataClient::new(config.tmdb_api_key.clone().unwrap_or_default());

    let posters = PosterStore::new(config.bot_token.clone(), config.poster_channel_id.clone());

    let notifier = Notifier::new(config.bot_token.clone(), config.admin_chat_id.clone());

    AcquisitionPipeline::new(
        forum,
        fetcher,
        distributor,
        metadata,
        posters,
        notifier,
        db,
        SelectionPolicy::default(),
        "Tamil".to_string(),
        Duration::from_secs(config.item_pause_secs),
    )
}
