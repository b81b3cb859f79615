//! TMDB metadata enrichment
//!
//! Single best-match lookup against the TMDB search API: the first search
//! result's poster, overview and rating are used as-is. Enrichment is
//! best-effort; any failure yields `None` and the pipeline proceeds without
//! metadata.
//!
//! Rate limiting: TMDB allows ~40 requests per 10 seconds.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::rate_limiter::{RateLimitedClient, RetryConfig, retry_async};

/// Poster size used for catalog display
const POSTER_SIZE: &str = "w500";

/// TMDB API client with rate limiting and retry logic
pub struct MetadataClient {
    client: Arc<RateLimitedClient>,
    base_url: String,
    api_key: String,
    retry_config: RetryConfig,
}

/// Movie search result page from TMDB
#[derive(Debug, Clone, Serialize, Deserialize)]
struct SearchPage {
    results: Vec<SearchMovie>,
}

/// One movie from TMDB search results
#[derive(Debug, Clone, Serialize, Deserialize)]
struct SearchMovie {
    title: String,
    release_date: Option<String>,
    poster_path: Option<String>,
    backdrop_path: Option<String>,
    overview: Option<String>,
    vote_average: Option<f64>,
}

/// Metadata extracted for one catalog entry
#[derive(Debug, Clone)]
pub struct MovieMetadata {
    pub title: String,
    pub year: Option<i32>,
    pub poster_url: Option<String>,
    pub backdrop_url: Option<String>,
    pub overview: Option<String>,
    pub rating: Option<f64>,
}

impl MetadataClient {
    /// Create a new client with the given API key
    pub fn new(api_key: String) -> Self {
        Self {
            client: Arc::new(RateLimitedClient::for_tmdb()),
            base_url: "https://api.themoviedb.org/3".to_string(),
            api_key,
            retry_config: RetryConfig {
                max_retries: 3,
                initial_interval: Duration::from_millis(500),
                max_interval: Duration::from_secs(10),
                multiplier: 2.0,
            },
        }
    }

    /// Check if the client has a valid API key configured
    pub fn has_api_key(&self) -> bool {
        !self.api_key.is_empty()
    }

    /// Look up poster/overview/rating for a title.
    ///
    /// Uses the first search result only; `None` on any failure.
    pub async fn enrich(&self, title: &str, year: Option<i32>) -> Option<MovieMetadata> {
        match self.search_first(title, year).await {
            Ok(result) => result,
            Err(e) => {
                warn!(title = %title, error = %e, "Metadata lookup failed");
                None
            }
        }
    }

    /// Download raw poster bytes. `None` on any failure.
    pub async fn download_poster(&self, poster_url: &str) -> Option<Vec<u8>> {
        let response = match self.client.get(poster_url).await {
            Ok(response) => response,
            Err(e) => {
                warn!(url = %poster_url, error = %e, "Poster download failed");
                return None;
            }
        };

        if !response.status().is_success() {
            warn!(
                url = %poster_url,
                status = %response.status(),
                "Poster download rejected"
            );
            return None;
        }

        match response.bytes().await {
            Ok(bytes) => Some(bytes.to_vec()),
            Err(e) => {
                warn!(url = %poster_url, error = %e, "Poster body read failed");
                None
            }
        }
    }

    async fn search_first(&self, title: &str, year: Option<i32>) -> Result<Option<MovieMetadata>> {
        if !self.has_api_key() {
            anyhow::bail!("TMDB API key not configured");
        }

        info!(
            "Searching TMDB for movie '{}'{}",
            title,
            year.map(|y| format!(" ({})", y)).unwrap_or_default()
        );

        let url = format!("{}/search/movie", self.base_url);
        let client = self.client.clone();
        let api_key = self.api_key.clone();
        let query_owned = title.to_string();
        let retry_config = self.retry_config.clone();

        let page = retry_async(
            || {
                let url = url.clone();
                let client = client.clone();
                let q = query_owned.clone();
                let key = api_key.clone();
                async move {
                    let mut query_params: Vec<(&str, String)> = vec![
                        ("api_key", key),
                        ("query", q),
                        ("include_adult", "false".to_string()),
                    ];
                    if let Some(y) = year {
                        query_params.push(("year", y.to_string()));
                    }

                    let response = client.get_with_query(&url, &query_params).await?;

                    if response.status().as_u16() == 429 {
                        warn!("TMDB rate limit hit, will retry");
                        anyhow::bail!("Rate limited (429)");
                    }

                    if response.status().as_u16() == 401 {
                        anyhow::bail!("TMDB API key is invalid");
                    }

                    if !response.status().is_success() {
                        anyhow::bail!("TMDB search failed with status: {}", response.status());
                    }

                    let page: SearchPage = response
                        .json()
                        .await
                        .context("Failed to parse TMDB search results")?;

                    Ok(page)
                }
            },
            &retry_config,
            "tmdb_search_movies",
        )
        .await?;

        debug!(count = page.results.len(), "TMDB search returned results");

        Ok(page.results.into_iter().next().map(|m| self.to_metadata(m)))
    }

    fn to_metadata(&self, movie: SearchMovie) -> MovieMetadata {
        MovieMetadata {
            year: movie.year(),
            poster_url: movie.poster_path.as_deref().map(|p| self.image_url(p)),
            backdrop_url: movie.backdrop_path.as_deref().map(|p| self.image_url(p)),
            title: movie.title,
            overview: movie.overview,
            rating: movie.vote_average,
        }
    }

    /// Get the image URL for a poster/backdrop path
    fn image_url(&self, path: &str) -> String {
        format!("https://image.tmdb.org/t/p/{}{}", POSTER_SIZE, path)
    }
}

impl SearchMovie {
    /// Get the release year from the release_date
    fn year(&self) -> Option<i32> {
        self.release_date
            .as_ref()
            .and_then(|d| d.split('-').next().and_then(|y| y.parse().ok()))
    }
}
