//! Forum source lister
//!
//! Scrapes the release forum's index page for recent topics and individual
//! topic pages for magnet candidates. Parsing is best-effort: a malformed
//! topic is skipped, a failed fetch yields an empty list. No retry policy;
//! the caller treats empty results as "nothing found".

use anyhow::{Context, Result};
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, warn};

use super::rate_limiter::RateLimitedClient;
use super::selection::{Candidate, parse_size_bytes};

/// One release topic discovered on the index page
#[derive(Debug, Clone)]
pub struct ForumTopic {
    /// Cleaned title with year and trailing qualifiers stripped
    pub title: String,
    /// Original title text as it appears on the forum
    pub raw_title: String,
    pub year: Option<i32>,
    /// Absolute URL of the topic's detail page
    pub detail_url: String,
}

/// Client for the release forum
pub struct ForumClient {
    client: RateLimitedClient,
    base_url: String,
    index_path: String,
}

impl ForumClient {
    pub fn new(base_url: String, index_path: String) -> Self {
        Self {
            client: RateLimitedClient::for_forum(),
            base_url: base_url.trim_end_matches('/').to_string(),
            index_path,
        }
    }

    /// List the most recent topics from the forum index.
    ///
    /// Returns an empty list if the index could not be fetched.
    pub async fn list_latest(&self, limit: usize) -> Vec<ForumTopic> {
        let url = format!("{}{}", self.base_url, self.index_path);

        let html = match self.fetch_page(&url).await {
            Ok(html) => html,
            Err(e) => {
                warn!(url = %url, error = %e, "Forum index fetch failed");
                return Vec::new();
            }
        };

        let topics = parse_index(&html, limit);
        debug!(count = topics.len(), "Forum index parsed");
        topics
    }

    /// List magnet candidates from a topic's detail page.
    ///
    /// Returns an empty list if the page could not be fetched or holds no
    /// magnet links.
    pub async fn list_candidates(&self, detail_url: &str) -> Vec<Candidate> {
        let html = match self.fetch_page(detail_url).await {
            Ok(html) => html,
            Err(e) => {
                warn!(url = %detail_url, error = %e, "Topic page fetch failed");
                return Vec::new();
            }
        };

        let candidates = parse_candidates(&html);
        debug!(url = %detail_url, count = candidates.len(), "Topic page parsed");
        candidates
    }

    async fn fetch_page(&self, url: &str) -> Result<String> {
        let response = self.client.get(url).await?;

        if !response.status().is_success() {
            anyhow::bail!("Forum fetch failed with status: {}", response.status());
        }

        response.text().await.context("Failed to read forum page")
    }
}

/// Parse the index page markup into topics
fn parse_index(html: &str, limit: usize) -> Vec<ForumTopic> {
    let document = Html::parse_document(html);

    let topic_selector = Selector::parse("li.ipsDataItem").expect("valid topic selector");
    let title_selector = Selector::parse("a.ipsDataItem_title").expect("valid title selector");

    document
        .select(&topic_selector)
        .take(limit)
        .filter_map(|topic| parse_topic(&topic, &title_selector))
        .collect()
}

/// Parse one topic row; `None` skips malformed markup without aborting the
/// listing.
fn parse_topic(topic: &ElementRef<'_>, title_selector: &Selector) -> Option<ForumTopic> {
    let title_el = topic.select(title_selector).next()?;
    let raw_title = title_el.text().collect::<String>().trim().to_string();
    if raw_title.is_empty() {
        return None;
    }

    let detail_url = title_el.value().attr("href")?.to_string();

    let (title, year) = clean_title(&raw_title);
    if title.is_empty() {
        return None;
    }

    Some(ForumTopic {
        title,
        raw_title,
        year,
        detail_url,
    })
}

/// Extract the year from a 4-digit parenthetical and truncate the title at
/// the first dash-like separator after removing it.
fn clean_title(raw: &str) -> (String, Option<i32>) {
    let year_re = Regex::new(r"\((\d{4})\)").expect("valid year regex");

    let year = year_re
        .captures(raw)
        .and_then(|caps| caps[1].parse::<i32>().ok());

    let without_year = year_re.replace(raw, "");
    let title = without_year
        .split(['-', '–'])
        .next()
        .unwrap_or("")
        .trim()
        .to_string();

    (title, year)
}

/// Pull magnet anchors and their surrounding size/quality text from a topic
/// page.
fn parse_candidates(html: &str) -> Vec<Candidate> {
    let document = Html::parse_document(html);
    let magnet_selector = Selector::parse(r#"a[href^="magnet:?"]"#).expect("valid magnet selector");

    let mut candidates = Vec::new();

    for link in document.select(&magnet_selector) {
        let Some(magnet) = link.value().attr("href") else {
            continue;
        };

        // Size and quality usually live in the text around the anchor
        let parent_text = link
            .parent()
            .and_then(ElementRef::wrap)
            .map(|p| p.text().collect::<String>())
            .unwrap_or_default();

        let link_text = link.text().collect::<String>().trim().to_string();
        let label = if link_text.is_empty() {
            parent_text.trim().to_string()
        } else {
            link_text
        };

        candidates.push(Candidate {
            label,
            size_bytes: parse_size_bytes(&parent_text),
            magnet: magnet.to_string(),
        });
    }

    candidates
}

#[cfg(test)]
mod tests {
    use super::*;

    const INDEX_HTML: &str = r#"
        <ol>
            <li class="ipsDataItem">
                <a class="ipsDataItem_title" href="https://forum.example/topic/1">
                    Amaran (2024) - Tamil HQ HDRip - 1080p
                </a>
            </li>
            <li class="ipsDataItem">
                <a class="ipsDataItem_title" href="https://forum.example/topic/2">
                    Plain Title Without Year
                </a>
            </li>
            <li class="ipsDataItem">
                <span>row with no title link</span>
            </li>
        </ol>
    "#;

    #[test]
    fn test_parse_index_extracts_topics() {
        let topics = parse_index(INDEX_HTML, 20);
        assert_eq!(topics.len(), 2);

        assert_eq!(topics[0].title, "Amaran");
        assert_eq!(topics[0].year, Some(2024));
        assert_eq!(topics[0].detail_url, "https://forum.example/topic/1");

        assert_eq!(topics[1].title, "Plain Title Without Year");
        assert_eq!(topics[1].year, None);
    }

    #[test]
    fn test_parse_index_respects_limit() {
        let topics = parse_index(INDEX_HTML, 1);
        assert_eq!(topics.len(), 1);
    }

    #[test]
    fn test_clean_title_year_and_separator() {
        let (title, year) = clean_title("Amaran (2024) - Tamil HQ HDRip - 1080p");
        assert_eq!(title, "Amaran");
        assert_eq!(year, Some(2024));

        let (title, year) = clean_title("Movie Name (2023) – EN-DASH VARIANT");
        assert_eq!(title, "Movie Name");
        assert_eq!(year, Some(2023));
    }

    #[test]
    fn test_parse_candidates_magnets_and_sizes() {
        let html = r#"
            <div>
                <p>
                    <a href="magnet:?xt=urn:btih:aaa">WEB-DL 1080p</a> [2.2 GB]
                </p>
                <p>
                    <a href="magnet:?xt=urn:btih:bbb">HQ HDRip 720p</a> (900MB)
                </p>
                <p>
                    <a href="https://forum.example/elsewhere">not a magnet</a>
                </p>
            </div>
        "#;

        let candidates = parse_candidates(html);
        assert_eq!(candidates.len(), 2);

        assert_eq!(candidates[0].label, "WEB-DL 1080p");
        assert_eq!(candidates[0].magnet, "magnet:?xt=urn:btih:aaa");
        assert!(candidates[0].size_bytes > 2 * 1024 * 1024 * 1024);

        assert_eq!(candidates[1].label, "HQ HDRip 720p");
        assert!(candidates[1].size_bytes < 1024 * 1024 * 1024);
    }

    #[test]
    fn test_parse_candidates_empty_page() {
        assert!(parse_candidates("<html><body>nothing</body></html>").is_empty());
    }
}
