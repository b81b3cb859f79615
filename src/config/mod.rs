//! Application configuration management

use std::env;

use anyhow::{Context, Result};

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// Database URL or path (SQLite)
    pub database_url: String,

    /// Forum base URL to scrape for new releases
    pub forum_base_url: String,

    /// Index page path under the forum base URL
    pub forum_index_path: String,

    /// Remote fetch (debrid) service base URL
    pub remote_fetch_base_url: String,

    /// Remote fetch account email
    pub remote_fetch_email: Option<String>,

    /// Remote fetch account password
    pub remote_fetch_password: Option<String>,

    /// Poll interval for remote fetch jobs, in seconds
    pub remote_poll_secs: u64,

    /// Total wall-clock budget for one remote fetch job, in minutes
    pub remote_max_wait_mins: u64,

    /// Stream host (watch links) API base URL
    pub stream_host_url: Option<String>,

    /// Stream host API key
    pub stream_host_key: Option<String>,

    /// Download host API base URL
    pub download_host_url: Option<String>,

    /// Download host API key
    pub download_host_key: Option<String>,

    /// Generic fallback host API base URL
    pub fallback_host_url: Option<String>,

    /// Generic fallback host API key
    pub fallback_host_key: Option<String>,

    /// TMDB API key
    pub tmdb_api_key: Option<String>,

    /// Telegram bot token (poster uploads and notifications)
    pub bot_token: Option<String>,

    /// Telegram channel id posters are uploaded to
    pub poster_channel_id: Option<String>,

    /// Telegram chat id notified on successful additions
    pub admin_chat_id: Option<String>,

    /// Maximum number of index topics examined per scan
    pub scan_limit: usize,

    /// Minutes between scheduled scans
    pub scan_interval_mins: u64,

    /// Pause between batch items, in seconds
    pub item_pause_secs: u64,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let database_url = env::var("DATABASE_PATH")
            .or_else(|_| env::var("DATABASE_URL"))
            .unwrap_or_else(|_| "./data/curator.db".to_string());

        Ok(Self {
            database_url,

            forum_base_url: env::var("FORUM_BASE_URL")
                .unwrap_or_else(|_| "https://www.1tamilmv.re".to_string()),

            forum_index_path: env::var("FORUM_INDEX_PATH")
                .unwrap_or_else(|_| "/index.php?/forums/forum/8-tamil-dubbed-movies/".to_string()),

            remote_fetch_base_url: env::var("SEEDR_BASE_URL")
                .unwrap_or_else(|_| "https://www.seedr.cc".to_string()),

            remote_fetch_email: env::var("SEEDR_EMAIL").ok(),

            remote_fetch_password: env::var("SEEDR_PASSWORD").ok(),

            remote_poll_secs: env::var("SEEDR_POLL_SECS")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .context("Invalid SEEDR_POLL_SECS")?,

            remote_max_wait_mins: env::var("SEEDR_MAX_WAIT_MINS")
                .unwrap_or_else(|_| "60".to_string())
                .parse()
                .context("Invalid SEEDR_MAX_WAIT_MINS")?,

            stream_host_url: env::var("STREAM_HOST_URL").ok(),
            stream_host_key: env::var("STREAM_HOST_KEY").ok(),

            download_host_url: env::var("DOWNLOAD_HOST_URL").ok(),
            download_host_key: env::var("DOWNLOAD_HOST_KEY").ok(),

            fallback_host_url: env::var("FALLBACK_HOST_URL").ok(),
            fallback_host_key: env::var("FALLBACK_HOST_KEY").ok(),

            tmdb_api_key: env::var("TMDB_API_KEY").ok(),

            bot_token: env::var("BOT_TOKEN").ok(),

            poster_channel_id: env::var("POSTER_CHANNEL_ID").ok(),

            admin_chat_id: env::var("ADMIN_CHAT_ID").ok(),

            scan_limit: env::var("SCAN_LIMIT")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .context("Invalid SCAN_LIMIT")?,

            scan_interval_mins: env::var("SCAN_INTERVAL_MINS")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .context("Invalid SCAN_INTERVAL_MINS")?,

            item_pause_secs: env::var("ITEM_PAUSE_SECS")
                .unwrap_or_else(|_| "5".to_string())
                .parse()
                .context("Invalid ITEM_PAUSE_SECS")?,
        })
    }
}
