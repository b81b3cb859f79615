//! Acquisition pipeline orchestration
//!
//! Per item: remote fetch and metadata enrichment run concurrently, then
//! distribution, poster storage, persistence, and the operator notification.
//! Batches are strictly sequential; the remote fetch quota cannot hold more
//! than one job's data at a time.

use std::time::Duration;

use tracing::{info, warn};

use crate::db::{Database, UpsertMedia};
use crate::services::distributor::Distributor;
use crate::services::forum::ForumClient;
use crate::services::metadata::MetadataClient;
use crate::services::notify::Notifier;
use crate::services::poster_store::PosterStore;
use crate::services::remote_fetch::{RemoteFetchApi, RemoteFetcher};
use crate::services::selection::{SelectionPolicy, select};

/// Outcome of processing one item
#[derive(Debug, Default)]
pub struct ItemOutcome {
    pub success: bool,
    pub media_id: Option<i64>,
    pub errors: Vec<String>,
}

impl ItemOutcome {
    fn failed(reason: &str) -> Self {
        Self {
            success: false,
            media_id: None,
            errors: vec![reason.to_string()],
        }
    }
}

/// Tally of one batch scan
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ScanSummary {
    pub scanned: usize,
    pub added: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// The acquisition pipeline with all collaborators injected
pub struct AcquisitionPipeline<A: RemoteFetchApi> {
    forum: ForumClient,
    fetcher: RemoteFetcher<A>,
    distributor: Distributor,
    metadata: MetadataClient,
    posters: PosterStore,
    notifier: Notifier,
    db: Database,
    policy: SelectionPolicy,
    language: String,
    item_pause: Duration,
}

impl<A: RemoteFetchApi> AcquisitionPipeline<A> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        forum: ForumClient,
        fetcher: RemoteFetcher<A>,
        distributor: Distributor,
        metadata: MetadataClient,
        posters: PosterStore,
        notifier: Notifier,
        db: Database,
        policy: SelectionPolicy,
        language: String,
        item_pause: Duration,
    ) -> Self {
        Self {
            forum,
            fetcher,
            distributor,
            metadata,
            posters,
            notifier,
            db,
            policy,
            language,
            item_pause,
        }
    }

    /// Process one item end to end: fetch + enrich concurrently, then
    /// distribute, store the poster, persist and notify.
    pub async fn process_item(&self, magnet: &str, title: &str, year: Option<i32>) -> ItemOutcome {
        info!(title = %title, "Processing item");

        // The only fan-out in the pipeline: the remote fetch dominates the
        // wall clock, so the metadata lookup rides along with it
        let (direct_url, meta) =
            tokio::join!(self.fetcher.fetch(magnet), self.metadata.enrich(title, year));

        let Some(direct_url) = direct_url else {
            return ItemOutcome::failed("Remote fetch failed or timed out");
        };

        info!(title = %title, "Uploading to file hosts");
        let filename = format!(
            "{}_{}.mkv",
            sanitize_filename::sanitize(title),
            year.map(|y| y.to_string()).unwrap_or_default()
        );

        let Some(links) = self.distributor.distribute(&direct_url, &filename).await else {
            return ItemOutcome::failed("Distribution failed on all hosts");
        };

        // Poster storage is best-effort; a missing poster never fails the item
        let poster_url = match meta.as_ref().and_then(|m| m.poster_url.as_deref()) {
            Some(url) => match self.metadata.download_poster(url).await {
                Some(bytes) => {
                    let caption = meta
                        .as_ref()
                        .and_then(|m| m.overview.as_deref())
                        .unwrap_or("");
                    self.posters.store(bytes, title, caption).await
                }
                None => None,
            },
            None => None,
        };

        info!(title = %title, "Saving catalog entry");
        let upsert = UpsertMedia {
            title: title.to_string(),
            year: year.map(i64::from),
            language: self.language.clone(),
            watch_url: links.watch_url,
            download_url: links.download_url,
            poster_url,
            description: meta.as_ref().and_then(|m| m.overview.clone()),
            rating: meta.as_ref().and_then(|m| m.rating),
        };

        let media_id = match self.db.catalog().upsert(upsert).await {
            Ok(id) => id,
            Err(e) => {
                warn!(title = %title, error = %e, "Catalog write failed");
                return ItemOutcome::failed("Catalog write failed");
            }
        };

        info!(title = %title, media_id, "Item cataloged");

        // Fire-and-forget; cannot affect the outcome
        self.notifier.notify_added(title, media_id).await;

        ItemOutcome {
            success: true,
            media_id: Some(media_id),
            errors: Vec::new(),
        }
    }

    /// Scan the forum index and process new releases one at a time.
    ///
    /// Already-cataloged and no-acceptable-candidate items are skips, not
    /// failures; a short pause follows every item to be gentle on the
    /// source site.
    pub async fn scan(&self, limit: usize) -> ScanSummary {
        info!(limit, "Scanning forum for new releases");

        let mut summary = ScanSummary::default();

        let topics = self.forum.list_latest(limit).await;
        summary.scanned = topics.len();

        for topic in topics {
            let year = topic.year.map(i64::from);
            match self.db.catalog().exists(&topic.title, year).await {
                Ok(true) => {
                    info!(title = %topic.title, "Already cataloged, skipping");
                    summary.skipped += 1;
                    continue;
                }
                Ok(false) => {}
                Err(e) => {
                    warn!(title = %topic.title, error = %e, "Existence check failed");
                    summary.failed += 1;
                    continue;
                }
            }

            let candidates = self.forum.list_candidates(&topic.detail_url).await;
            if candidates.is_empty() {
                warn!(title = %topic.title, "No magnet links found");
                summary.failed += 1;
                continue;
            }

            let Some(best) = select(&candidates, &self.policy) else {
                info!(title = %topic.title, "No acceptable candidate, skipping");
                summary.skipped += 1;
                continue;
            };

            info!(
                title = %topic.title,
                label = %best.label,
                size_bytes = best.size_bytes,
                "Candidate selected"
            );

            let magnet = best.magnet.clone();
            let outcome = self
                .process_item(&magnet, &topic.title, topic.year)
                .await;

            if outcome.success {
                summary.added += 1;
            } else {
                warn!(
                    title = %topic.title,
                    errors = ?outcome.errors,
                    "Item failed"
                );
                summary.failed += 1;
            }

            tokio::time::sleep(self.item_pause).await;
        }

        info!(
            scanned = summary.scanned,
            added = summary.added,
            skipped = summary.skipped,
            failed = summary.failed,
            "Scan complete"
        );

        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use async_trait::async_trait;
    use serde_json::{Value, json};

    use crate::services::distributor::{HostedFile, UploadHost};

    /// Transport that completes immediately with one movie file
    struct InstantApi;

    #[async_trait]
    impl RemoteFetchApi for InstantApi {
        async fn add_magnet(&self, _magnet: &str) -> Result<Value> {
            Ok(json!({"transfers": [{"id": 1}]}))
        }
        async fn transfer_info(&self, _id: i64) -> Result<Value> {
            Ok(json!({"status": "finished", "folder_id": 4}))
        }
        async fn list_folder(&self, _id: i64) -> Result<Value> {
            Ok(json!({
                "files": [{"id": 8, "name": "movie.mkv", "size": 2_000_000_000i64}]
            }))
        }
        async fn file_link(&self, _id: i64) -> Result<Value> {
            Ok(json!({"download_url": "https://cdn.example/movie.mkv"}))
        }
        async fn delete_folder(&self, _id: i64) -> Result<Value> {
            Ok(Value::Null)
        }
        async fn delete_transfer(&self, _id: i64) -> Result<Value> {
            Ok(Value::Null)
        }
    }

    /// Transport whose submission is always rejected
    struct RejectingApi;

    #[async_trait]
    impl RemoteFetchApi for RejectingApi {
        async fn add_magnet(&self, _magnet: &str) -> Result<Value> {
            anyhow::bail!("account over quota")
        }
        async fn transfer_info(&self, _id: i64) -> Result<Value> {
            anyhow::bail!("unused")
        }
        async fn list_folder(&self, _id: i64) -> Result<Value> {
            anyhow::bail!("unused")
        }
        async fn file_link(&self, _id: i64) -> Result<Value> {
            anyhow::bail!("unused")
        }
        async fn delete_folder(&self, _id: i64) -> Result<Value> {
            Ok(Value::Null)
        }
        async fn delete_transfer(&self, _id: i64) -> Result<Value> {
            Ok(Value::Null)
        }
    }

    /// Host that always yields the same download URL
    struct FixedHost(&'static str);

    #[async_trait]
    impl UploadHost for FixedHost {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn upload(&self, _source_url: &str, _filename: &str) -> Option<HostedFile> {
            Some(HostedFile {
                file_id: Some("f1".to_string()),
                url: self.0.to_string(),
            })
        }
    }

    fn pipeline<A: RemoteFetchApi>(
        api: A,
        db: Database,
        distributor: Distributor,
    ) -> AcquisitionPipeline<A> {
        AcquisitionPipeline::new(
            ForumClient::new("https://forum.example".to_string(), "/".to_string()),
            RemoteFetcher::new(api, Duration::from_millis(1), Duration::from_millis(50)),
            distributor,
            // Empty key: every enrichment attempt yields None
            MetadataClient::new(String::new()),
            PosterStore::new(None, None),
            Notifier::disabled(),
            db,
            SelectionPolicy::default(),
            "Tamil".to_string(),
            Duration::from_millis(1),
        )
    }

    async fn test_db() -> Database {
        Database::connect("sqlite::memory:").await.unwrap()
    }

    fn download_only(url: &'static str) -> Distributor {
        Distributor::new(None, Some(Box::new(FixedHost(url)) as Box<dyn UploadHost>), None)
    }

    #[tokio::test]
    async fn test_process_item_catalogs_without_metadata_or_poster() {
        let db = test_db().await;
        let pipeline = pipeline(InstantApi, db.clone(), download_only("https://dl/amaran"));

        let outcome = pipeline
            .process_item("magnet:?xt=urn:btih:abc", "Amaran", Some(2024))
            .await;

        assert!(outcome.success);
        assert!(outcome.media_id.is_some());

        // Enrichment and poster storage both yielded nothing; the record
        // still lands, just without art or description
        let record = db.catalog().get("Amaran", Some(2024)).await.unwrap().unwrap();
        assert_eq!(record.download_url.as_deref(), Some("https://dl/amaran"));
        assert_eq!(record.watch_url, None);
        assert_eq!(record.poster_url, None);
        assert_eq!(record.description, None);
    }

    #[tokio::test]
    async fn test_process_item_distribution_failure_writes_nothing() {
        let db = test_db().await;
        let pipeline = pipeline(InstantApi, db.clone(), Distributor::new(None, None, None));

        let outcome = pipeline
            .process_item("magnet:?xt=urn:btih:abc", "Amaran", Some(2024))
            .await;

        assert!(!outcome.success);
        assert!(!db.catalog().exists("Amaran", Some(2024)).await.unwrap());
    }

    #[tokio::test]
    async fn test_process_item_fetch_failure_writes_nothing() {
        let db = test_db().await;
        let pipeline = pipeline(RejectingApi, db.clone(), download_only("https://dl/amaran"));

        let outcome = pipeline
            .process_item("magnet:?xt=urn:btih:abc", "Amaran", Some(2024))
            .await;

        assert!(!outcome.success);
        assert!(!db.catalog().exists("Amaran", Some(2024)).await.unwrap());
    }

    #[tokio::test]
    async fn test_process_item_persistence_failure_fails_the_item() {
        let db = test_db().await;
        let pipeline = pipeline(InstantApi, db.clone(), download_only("https://dl/amaran"));

        // Closed pool: the upsert itself errors after fetch and
        // distribution succeeded
        db.pool().close().await;

        let outcome = pipeline
            .process_item("magnet:?xt=urn:btih:abc", "Amaran", Some(2024))
            .await;

        assert!(!outcome.success);
        assert!(outcome.media_id.is_none());
    }
}
