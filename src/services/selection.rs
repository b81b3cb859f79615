//! Tiered candidate selection for discovered releases
//!
//! Given the magnet candidates scraped from one forum topic, pick the single
//! release worth fetching. Tiers are evaluated in priority order; within the
//! first tier that matches anything, the smallest release wins (keeps remote
//! quota and host bandwidth usage down while staying above the quality floor).

use regex::Regex;
use serde::{Deserialize, Serialize};

const GIB: f64 = 1024.0 * 1024.0 * 1024.0;
const MIB: f64 = 1024.0 * 1024.0;

/// One discovered downloadable release
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candidate {
    /// Free-text quality/source label, e.g. "WEB-DL 1080p x264"
    pub label: String,
    /// Size in bytes, parsed from the label's surroundings (0 if unknown)
    pub size_bytes: u64,
    /// Magnet URI
    pub magnet: String,
}

/// One ranked selection rule
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tier {
    pub name: String,
    /// Quality tag that must appear in the label, e.g. "1080p"
    pub quality: String,
    /// Inclusive size range in bytes
    pub min_bytes: u64,
    pub max_bytes: u64,
    /// Extra keywords the label must contain (e.g. "HQ" for the last resort)
    pub required_keywords: Vec<String>,
}

/// Static selection configuration: ordered tiers plus a hard blacklist
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectionPolicy {
    pub tiers: Vec<Tier>,
    /// Labels containing any of these are rejected regardless of size.
    /// Matching is case-sensitive; release labels use conventional casing.
    pub blacklist: Vec<String>,
}

impl Default for SelectionPolicy {
    fn default() -> Self {
        Self {
            tiers: vec![
                Tier {
                    name: "optimal".to_string(),
                    quality: "1080p".to_string(),
                    min_bytes: gb(1.0),
                    max_bytes: gb(3.0),
                    required_keywords: vec![],
                },
                Tier {
                    name: "fallback-1080p".to_string(),
                    quality: "1080p".to_string(),
                    min_bytes: gb(0.5),
                    max_bytes: gb(15.0),
                    required_keywords: vec![],
                },
                Tier {
                    name: "last-resort-720p".to_string(),
                    quality: "720p".to_string(),
                    min_bytes: gb(1.0),
                    max_bytes: gb(5.0),
                    required_keywords: vec!["HQ".to_string()],
                },
            ],
            blacklist: vec![
                "CAM".to_string(),
                "TC".to_string(),
                "Telesync".to_string(),
                "480p".to_string(),
                "4K".to_string(),
                "2160p".to_string(),
                "HDCAM".to_string(),
            ],
        }
    }
}

/// Convert decimal gigabytes to bytes
fn gb(value: f64) -> u64 {
    (value * GIB) as u64
}

impl Tier {
    fn matches(&self, candidate: &Candidate) -> bool {
        if !candidate.label.contains(&self.quality) {
            return false;
        }
        if candidate.size_bytes < self.min_bytes || candidate.size_bytes > self.max_bytes {
            return false;
        }
        self.required_keywords
            .iter()
            .all(|kw| candidate.label.contains(kw))
    }
}

/// Pick the best candidate under the policy, or `None` when nothing
/// acceptable exists. `None` is a normal outcome, not an error; the caller
/// counts it as a skip.
pub fn select<'a>(candidates: &'a [Candidate], policy: &SelectionPolicy) -> Option<&'a Candidate> {
    let valid: Vec<&Candidate> = candidates
        .iter()
        .filter(|c| !policy.blacklist.iter().any(|kw| c.label.contains(kw)))
        .collect();

    if valid.is_empty() {
        return None;
    }

    for tier in &policy.tiers {
        let best = valid
            .iter()
            .filter(|c| tier.matches(c))
            .min_by_key(|c| c.size_bytes);

        if let Some(candidate) = best {
            tracing::debug!(
                tier = %tier.name,
                label = %candidate.label,
                size_bytes = candidate.size_bytes,
                "Selected candidate"
            );
            return Some(candidate);
        }
    }

    None
}

/// Parse a size like "2.1GB", "2.1 GB" or "2100MB" to bytes.
///
/// Unparsable text yields 0, which fails every tier's minimum bound and so
/// self-excludes malformed entries.
pub fn parse_size_bytes(text: &str) -> u64 {
    let re = Regex::new(r"(?i)(\d+(?:\.\d+)?)\s*(GB|MB)").expect("valid size regex");

    let Some(caps) = re.captures(text) else {
        return 0;
    };

    let Ok(value) = caps[1].parse::<f64>() else {
        return 0;
    };

    let unit = caps[2].to_uppercase();
    let bytes = match unit.as_str() {
        "GB" => value * GIB,
        "MB" => value * MIB,
        _ => return 0,
    };

    bytes as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(label: &str, size_gb: f64) -> Candidate {
        Candidate {
            label: label.to_string(),
            size_bytes: gb(size_gb),
            magnet: format!("magnet:?xt=urn:btih:{}", label.replace(' ', "")),
        }
    }

    #[test]
    fn test_optimal_tier_picks_smallest_in_range() {
        let policy = SelectionPolicy::default();
        let candidates = vec![
            candidate("WEB-DL 1080p", 2.2),
            candidate("BluRay 1080p", 2.8),
        ];

        let picked = select(&candidates, &policy).unwrap();
        assert_eq!(picked.label, "WEB-DL 1080p");
    }

    #[test]
    fn test_blacklisted_labels_never_returned() {
        let policy = SelectionPolicy::default();
        let candidates = vec![
            candidate("WEB-DL 1080p", 2.2),
            candidate("BluRay 1080p", 6.0),
            candidate("HDCAM 1080p", 1.0),
        ];

        let picked = select(&candidates, &policy).unwrap();
        assert_eq!(picked.label, "WEB-DL 1080p");
        assert_eq!(picked.size_bytes, gb(2.2));
    }

    #[test]
    fn test_fallback_tier_when_optimal_empty() {
        let policy = SelectionPolicy::default();
        // 6GB is outside the optimal 1-3GB range but inside the wide fallback
        let candidates = vec![candidate("BluRay 1080p", 6.0)];

        let picked = select(&candidates, &policy).unwrap();
        assert_eq!(picked.label, "BluRay 1080p");
    }

    #[test]
    fn test_last_resort_requires_keyword() {
        let policy = SelectionPolicy::default();

        // Plain 720p is not acceptable
        assert!(select(&[candidate("HDRip 720p", 2.0)], &policy).is_none());

        // 720p with the HQ marker is
        let candidates = vec![candidate("HQ HDRip 720p", 2.0)];
        let picked = select(&candidates, &policy).unwrap();
        assert_eq!(picked.label, "HQ HDRip 720p");
    }

    #[test]
    fn test_empty_candidates_return_none() {
        let policy = SelectionPolicy::default();
        assert!(select(&[], &policy).is_none());
    }

    #[test]
    fn test_all_blacklisted_returns_none() {
        let policy = SelectionPolicy::default();
        let candidates = vec![
            candidate("HDCAM 1080p", 2.0),
            candidate("Telesync 1080p", 2.0),
        ];
        assert!(select(&candidates, &policy).is_none());
    }

    #[test]
    fn test_selection_is_deterministic_for_ties() {
        let policy = SelectionPolicy::default();
        let candidates = vec![
            candidate("WEB-DL 1080p A", 2.0),
            candidate("WEB-DL 1080p B", 2.0),
        ];

        let first = select(&candidates, &policy).unwrap().label.clone();
        for _ in 0..10 {
            assert_eq!(select(&candidates, &policy).unwrap().label, first);
        }
    }

    #[test]
    fn test_unparsable_size_self_excludes() {
        let policy = SelectionPolicy::default();
        let candidates = vec![Candidate {
            label: "WEB-DL 1080p".to_string(),
            size_bytes: parse_size_bytes("size unknown"),
            magnet: "magnet:?xt=urn:btih:x".to_string(),
        }];
        assert!(select(&candidates, &policy).is_none());
    }

    #[test]
    fn test_parse_size_gigabytes() {
        assert_eq!(parse_size_bytes("2.1GB"), gb(2.1));
        assert_eq!(parse_size_bytes("2.1 GB"), gb(2.1));
        assert_eq!(parse_size_bytes("movie - 1080p [5.3 gb]"), gb(5.3));
    }

    #[test]
    fn test_parse_size_megabytes() {
        assert_eq!(parse_size_bytes("700MB"), (700.0 * MIB) as u64);
        assert_eq!(parse_size_bytes("2100 MB"), (2100.0 * MIB) as u64);
    }

    #[test]
    fn test_parse_size_unparsable() {
        assert_eq!(parse_size_bytes(""), 0);
        assert_eq!(parse_size_bytes("no size here"), 0);
    }
}
