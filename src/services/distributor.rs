//! Re-upload distribution to third-party file hosts
//!
//! Pushes one direct download URL to up to three remote-upload endpoints: a
//! streaming host (watch link), a download host (download link), and a
//! generic fallback tried only when the download host produced nothing.
//! Hosts disagree on both request field names and response field names, so
//! requests are built from an ordered list of shapes and responses are read
//! through ordered alias lists. An item-level success needs only one of the
//! two link kinds.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tracing::{debug, info, warn};

use super::json_fields::{first_i64, first_string};

/// Accepted aliases for the uploaded file identifier
pub const FILE_ID_ALIASES: &[&str] = &["file_id", "id", "code"];
/// Accepted aliases for a playable URL
pub const WATCH_URL_ALIASES: &[&str] = &["watch_url", "stream_url", "url"];
/// Accepted aliases for a downloadable URL
pub const DOWNLOAD_URL_ALIASES: &[&str] = &["download_url", "url"];

/// Generous timeout: the host is pulling a multi-gigabyte file server-side
const UPLOAD_TIMEOUT: Duration = Duration::from_secs(300);

/// One way of phrasing a remote-upload request.
///
/// Each shape is a pure descriptor of field names; adapters try the shapes
/// in order with uniform success detection instead of per-host branching.
#[derive(Debug, Clone, Copy)]
pub struct RequestShape {
    pub url_field: &'static str,
    pub name_field: &'static str,
    pub key_field: &'static str,
}

/// Ordered request shapes, most common first
pub const REQUEST_SHAPES: &[RequestShape] = &[
    RequestShape {
        url_field: "url",
        name_field: "name",
        key_field: "api_key",
    },
    RequestShape {
        url_field: "url",
        name_field: "filename",
        key_field: "api_key",
    },
    RequestShape {
        url_field: "url",
        name_field: "name",
        key_field: "key",
    },
    RequestShape {
        url_field: "link",
        name_field: "filename",
        key_field: "api_key",
    },
    RequestShape {
        url_field: "src",
        name_field: "title",
        key_field: "api_key",
    },
];

impl RequestShape {
    /// Build the form payload for this shape
    pub fn form(
        &self,
        api_key: Option<&str>,
        source_url: &str,
        filename: &str,
    ) -> Vec<(String, String)> {
        let mut form = vec![
            (self.url_field.to_string(), source_url.to_string()),
            (self.name_field.to_string(), filename.to_string()),
        ];
        if let Some(key) = api_key {
            form.push((self.key_field.to_string(), key.to_string()));
        }
        form
    }
}

/// Which link kind a host is expected to produce
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostKind {
    Stream,
    Download,
}

/// Result of one successful host upload
#[derive(Debug, Clone)]
pub struct HostedFile {
    pub file_id: Option<String>,
    pub url: String,
}

/// An upload host adapter
#[async_trait]
pub trait UploadHost: Send + Sync {
    fn name(&self) -> &str;

    /// Push `source_url` to the host. `None` means "this adapter produced
    /// nothing"; never an error.
    async fn upload(&self, source_url: &str, filename: &str) -> Option<HostedFile>;
}

/// HTTP adapter for a remote-upload endpoint
pub struct HttpUploadHost {
    name: String,
    kind: HostKind,
    base_url: String,
    api_key: Option<String>,
    remote_path: String,
    client: Client,
}

impl HttpUploadHost {
    pub fn new(name: &str, kind: HostKind, base_url: String, api_key: Option<String>) -> Self {
        Self {
            name: name.to_string(),
            kind,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            remote_path: "/api/remote_upload".to_string(),
            client: Client::builder()
                .timeout(UPLOAD_TIMEOUT)
                .build()
                .expect("Failed to create HTTP client"),
        }
    }

    /// A 4xx means the host did not understand this shape's field names;
    /// the next shape may still work. 5xx means the host itself is broken.
    fn status_rejects_shape(status: reqwest::StatusCode) -> bool {
        status.is_client_error()
    }

    /// Uniform success detection across hosts: a JSON object without an
    /// error marker.
    fn response_ok(data: &Value) -> bool {
        if !data.is_object() {
            return false;
        }
        match data.get("error") {
            None | Some(Value::Null) | Some(Value::Bool(false)) => {}
            Some(_) => return false,
        }
        if let Some(status) = data.get("status").and_then(Value::as_str) {
            if status.eq_ignore_ascii_case("error") {
                return false;
            }
        }
        true
    }

    /// Interpret a host response into a hosted file for this host's kind
    fn interpret(&self, data: &Value) -> Option<HostedFile> {
        let file_id = first_string(data, FILE_ID_ALIASES)
            .or_else(|| first_i64(data, FILE_ID_ALIASES).map(|i| i.to_string()));

        let aliases = match self.kind {
            HostKind::Stream => WATCH_URL_ALIASES,
            HostKind::Download => DOWNLOAD_URL_ALIASES,
        };

        let url = first_string(data, aliases).or_else(|| {
            // Hosts that only return an id use predictable link paths
            file_id.as_ref().map(|id| match self.kind {
                HostKind::Stream => format!("{}/watch/{}", self.base_url, id),
                HostKind::Download => format!("{}/download/{}", self.base_url, id),
            })
        })?;

        Some(HostedFile { file_id, url })
    }
}

#[async_trait]
impl UploadHost for HttpUploadHost {
    fn name(&self) -> &str {
        &self.name
    }

    async fn upload(&self, source_url: &str, filename: &str) -> Option<HostedFile> {
        let endpoint = format!("{}{}", self.base_url, self.remote_path);

        for shape in REQUEST_SHAPES {
            let form = shape.form(self.api_key.as_deref(), source_url, filename);

            let response = match self.client.post(&endpoint).form(&form).send().await {
                Ok(response) => response,
                Err(e) => {
                    warn!(host = %self.name, error = %e, "Remote upload request failed");
                    return None;
                }
            };

            if !response.status().is_success() {
                if Self::status_rejects_shape(response.status()) {
                    debug!(
                        host = %self.name,
                        status = %response.status(),
                        url_field = shape.url_field,
                        "Request shape rejected, trying next"
                    );
                    continue;
                }
                warn!(
                    host = %self.name,
                    status = %response.status(),
                    "Remote upload rejected"
                );
                return None;
            }

            let data: Value = match response.json().await {
                Ok(data) => data,
                Err(e) => {
                    warn!(host = %self.name, error = %e, "Remote upload returned non-JSON body");
                    return None;
                }
            };

            if !Self::response_ok(&data) {
                debug!(
                    host = %self.name,
                    url_field = shape.url_field,
                    "Request shape not accepted, trying next"
                );
                continue;
            }

            if let Some(hosted) = self.interpret(&data) {
                info!(host = %self.name, url = %hosted.url, "Remote upload accepted");
                return Some(hosted);
            }

            debug!(host = %self.name, "Accepted response missing a usable URL");
        }

        warn!(host = %self.name, "All request shapes exhausted");
        None
    }
}

/// Watch/download links produced for one item
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DistributedLinks {
    pub watch_url: Option<String>,
    pub download_url: Option<String>,
}

/// Fans one direct URL out to the configured hosts
pub struct Distributor {
    stream: Option<Box<dyn UploadHost>>,
    download: Option<Box<dyn UploadHost>>,
    fallback: Option<Box<dyn UploadHost>>,
}

impl Distributor {
    pub fn new(
        stream: Option<Box<dyn UploadHost>>,
        download: Option<Box<dyn UploadHost>>,
        fallback: Option<Box<dyn UploadHost>>,
    ) -> Self {
        Self {
            stream,
            download,
            fallback,
        }
    }

    /// Upload to every applicable host. Non-null when either link kind was
    /// obtained; `None` (both empty) halts the pipeline for this item.
    pub async fn distribute(&self, direct_url: &str, filename: &str) -> Option<DistributedLinks> {
        let mut watch_url = None;
        let mut download_url = None;

        if let Some(host) = &self.stream {
            if let Some(hosted) = host.upload(direct_url, filename).await {
                watch_url = Some(hosted.url);
            }
        }

        if let Some(host) = &self.download {
            if let Some(hosted) = host.upload(direct_url, filename).await {
                download_url = Some(hosted.url);
            }
        }

        // Fallback only covers a missing download link
        if download_url.is_none() {
            if let Some(host) = &self.fallback {
                if let Some(hosted) = host.upload(direct_url, filename).await {
                    download_url = Some(hosted.url);
                }
            }
        }

        if watch_url.is_none() && download_url.is_none() {
            warn!("Remote upload failed on all configured hosts");
            return None;
        }

        Some(DistributedLinks {
            watch_url,
            download_url,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StubHost {
        name: &'static str,
        result: Option<&'static str>,
        calls: Arc<AtomicUsize>,
    }

    impl StubHost {
        fn yielding(name: &'static str, url: Option<&'static str>) -> Self {
            Self {
                name,
                result: url,
                calls: Arc::new(AtomicUsize::new(0)),
            }
        }

        fn counted(
            name: &'static str,
            url: Option<&'static str>,
            calls: Arc<AtomicUsize>,
        ) -> Self {
            Self {
                name,
                result: url,
                calls,
            }
        }
    }

    #[async_trait]
    impl UploadHost for StubHost {
        fn name(&self) -> &str {
            self.name
        }

        async fn upload(&self, _source_url: &str, _filename: &str) -> Option<HostedFile> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.result.map(|url| HostedFile {
                file_id: Some("f1".to_string()),
                url: url.to_string(),
            })
        }
    }

    fn boxed(host: StubHost) -> Option<Box<dyn UploadHost>> {
        Some(Box::new(host))
    }

    #[tokio::test]
    async fn test_download_only_result_is_non_null() {
        // Stream host times out / yields nothing, download host succeeds
        let distributor = Distributor::new(
            boxed(StubHost::yielding("stream", None)),
            boxed(StubHost::yielding("download", Some("https://x/y"))),
            None,
        );

        let links = distributor.distribute("https://cdn/src", "m.mkv").await.unwrap();
        assert_eq!(links.watch_url, None);
        assert_eq!(links.download_url.as_deref(), Some("https://x/y"));
    }

    #[tokio::test]
    async fn test_total_failure_returns_none() {
        let distributor = Distributor::new(
            boxed(StubHost::yielding("stream", None)),
            boxed(StubHost::yielding("download", None)),
            boxed(StubHost::yielding("fallback", None)),
        );

        assert!(distributor.distribute("https://cdn/src", "m.mkv").await.is_none());
    }

    #[tokio::test]
    async fn test_fallback_not_called_when_download_succeeded() {
        let fallback_calls = Arc::new(AtomicUsize::new(0));
        let distributor = Distributor::new(
            None,
            boxed(StubHost::yielding("download", Some("https://dl/y"))),
            boxed(StubHost::counted(
                "fallback",
                Some("https://fb/z"),
                fallback_calls.clone(),
            )),
        );

        let links = distributor.distribute("https://cdn/src", "m.mkv").await.unwrap();
        assert_eq!(links.download_url.as_deref(), Some("https://dl/y"));
        assert_eq!(fallback_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_fallback_fills_missing_download_link() {
        let distributor = Distributor::new(
            boxed(StubHost::yielding("stream", Some("https://watch/a"))),
            boxed(StubHost::yielding("download", None)),
            boxed(StubHost::yielding("fallback", Some("https://fb/z"))),
        );

        let links = distributor.distribute("https://cdn/src", "m.mkv").await.unwrap();
        assert_eq!(links.watch_url.as_deref(), Some("https://watch/a"));
        assert_eq!(links.download_url.as_deref(), Some("https://fb/z"));
    }

    #[test]
    fn test_interpret_reads_aliases_in_order() {
        let host = HttpUploadHost::new(
            "stream",
            HostKind::Stream,
            "https://host.example".to_string(),
            None,
        );

        let hosted = host
            .interpret(&json!({"code": "abc", "stream_url": "https://s/1", "url": "https://u/1"}))
            .unwrap();
        assert_eq!(hosted.url, "https://s/1");
        assert_eq!(hosted.file_id.as_deref(), Some("abc"));
    }

    #[test]
    fn test_interpret_derives_url_from_id() {
        let host = HttpUploadHost::new(
            "download",
            HostKind::Download,
            "https://host.example".to_string(),
            None,
        );

        let hosted = host.interpret(&json!({"file_id": 99})).unwrap();
        assert_eq!(hosted.url, "https://host.example/download/99");
    }

    #[test]
    fn test_interpret_without_id_or_url_yields_none() {
        let host = HttpUploadHost::new(
            "download",
            HostKind::Download,
            "https://host.example".to_string(),
            None,
        );
        assert!(host.interpret(&json!({"ok": true})).is_none());
    }

    #[test]
    fn test_client_errors_advance_to_next_shape() {
        use reqwest::StatusCode;

        // A host that dislikes one shape's field names answers 4xx; the
        // remaining shapes must still get their turn
        assert!(HttpUploadHost::status_rejects_shape(StatusCode::BAD_REQUEST));
        assert!(HttpUploadHost::status_rejects_shape(StatusCode::NOT_FOUND));
        assert!(HttpUploadHost::status_rejects_shape(
            StatusCode::UNPROCESSABLE_ENTITY
        ));

        // Server-side failures abort the host entirely
        assert!(!HttpUploadHost::status_rejects_shape(
            StatusCode::INTERNAL_SERVER_ERROR
        ));
        assert!(!HttpUploadHost::status_rejects_shape(
            StatusCode::BAD_GATEWAY
        ));
    }

    #[test]
    fn test_response_ok_detection() {
        assert!(HttpUploadHost::response_ok(&json!({"file_id": "a"})));
        assert!(HttpUploadHost::response_ok(&json!({"error": false, "id": 1})));
        assert!(!HttpUploadHost::response_ok(&json!({"error": "bad key"})));
        assert!(!HttpUploadHost::response_ok(&json!({"status": "error"})));
        assert!(!HttpUploadHost::response_ok(&json!("plain string")));
    }

    #[test]
    fn test_request_shapes_build_expected_fields() {
        let shape = REQUEST_SHAPES[0];
        let form = shape.form(Some("k"), "https://cdn/src", "m.mkv");
        assert!(form.contains(&("url".to_string(), "https://cdn/src".to_string())));
        assert!(form.contains(&("name".to_string(), "m.mkv".to_string())));
        assert!(form.contains(&("api_key".to_string(), "k".to_string())));

        // Without a key the key field is omitted entirely
        let form = shape.form(None, "https://cdn/src", "m.mkv");
        assert_eq!(form.len(), 2);
    }
}
