//! On-disk request log.
//!
//! Every request is written as one pretty-printed JSON document to
//! `logsDir/<unix-nanos>`. When two requests land on the same nanosecond the
//! later one probes forward one nanosecond at a time until a free name is found;
//! files are opened with create-new so concurrent writers never share a name.
//! Writes are detached from request dispatch.

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::PathBuf;

use base64::Engine as _;
use http::HeaderMap;
use serde::Serialize;
use tokio::io::AsyncWriteExt;

/// Placeholder written in place of values that must not reach the log.
pub const REDACTED: &str = "[redacted]";

/// One logged request.
#[derive(Debug, Clone, Serialize)]
pub struct RequestRecord {
    pub from_ip: String,
    pub method: String,
    pub host: String,
    pub path: String,
    pub query: BTreeMap<String, Vec<String>>,
    pub headers: BTreeMap<String, Vec<String>>,
    /// Request body, base64 (standard alphabet)
    pub body: String,
}

impl RequestRecord {
    pub fn new(
        from_ip: String,
        method: &http::Method,
        host: String,
        uri: &http::Uri,
        headers: &HeaderMap,
        body: &[u8],
    ) -> Self {
        Self {
            from_ip,
            method: method.to_string(),
            host,
            path: uri.path().to_string(),
            query: parse_query(uri.query().unwrap_or("")),
            headers: header_map(headers),
            body: base64::engine::general_purpose::STANDARD.encode(body),
        }
    }
}

/// Split a query string into a multimap, decoding `+` and percent escapes.
pub fn parse_query(query: &str) -> BTreeMap<String, Vec<String>> {
    let mut params: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for pair in query.split('&').filter(|p| !p.is_empty()) {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        params
            .entry(decode_component(key))
            .or_default()
            .push(decode_component(value));
    }
    params
}

fn decode_component(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    match urlencoding::decode(&spaced) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => spaced,
    }
}

/// Collect headers by name, keeping repeated values in order. Cookie headers
/// carry session tokens and are redacted.
fn header_map(headers: &HeaderMap) -> BTreeMap<String, Vec<String>> {
    let mut map: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (name, value) in headers {
        let value = if *name == http::header::COOKIE {
            REDACTED.to_string()
        } else {
            String::from_utf8_lossy(value.as_bytes()).into_owned()
        };
        map.entry(name.as_str().to_string()).or_default().push(value);
    }
    map
}

#[derive(Debug, Clone)]
pub struct RequestLog {
    dir: PathBuf,
}

impl RequestLog {
    /// Open the log directory, creating it if needed.
    pub async fn open(dir: impl Into<PathBuf>) -> std::io::Result<Self> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir).await?;
        Ok(Self { dir })
    }

    /// Write `record` under the current time and return the path it landed at.
    pub async fn write(&self, record: &RequestRecord) -> std::io::Result<PathBuf> {
        let now = chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default();
        self.write_from(record, now).await
    }

    async fn write_from(&self, record: &RequestRecord, start: i64) -> std::io::Result<PathBuf> {
        let json = serde_json::to_vec_pretty(record)?;
        let mut timestamp = start;

        loop {
            let path = self.dir.join(timestamp.to_string());
            match tokio::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await
            {
                Ok(mut file) => {
                    file.write_all(&json).await?;
                    file.flush().await?;
                    return Ok(path);
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => timestamp += 1,
                Err(e) => return Err(e),
            }
        }
    }

    /// Write `record` in the background. Failures are logged, never surfaced.
    pub fn spawn_write(&self, record: RequestRecord) {
        let log = self.clone();
        tokio::spawn(async move {
            if let Err(e) = log.write(&record).await {
                tracing::warn!(error = %e, dir = %log.dir.display(), "Failed to write request log");
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::{HeaderValue, Method, Uri};

    fn record() -> RequestRecord {
        let mut headers = HeaderMap::new();
        headers.insert("accept", HeaderValue::from_static("text/html"));
        headers.append("x-forwarded-for", HeaderValue::from_static("10.0.0.1"));
        headers.append("x-forwarded-for", HeaderValue::from_static("10.0.0.2"));
        headers.insert("cookie", HeaderValue::from_static("auth=abcdef"));

        let uri: Uri = "/docs/page.html?a=1&a=2&b=hello+world&c=%2Fx&flag"
            .parse()
            .unwrap();
        RequestRecord::new(
            "203.0.113.7:51234".to_string(),
            &Method::POST,
            "example.com".to_string(),
            &uri,
            &headers,
            b"payload",
        )
    }

    #[test]
    fn test_parse_query_multimap() {
        let query = parse_query("a=1&a=2&b=hello+world&c=%2Fx&flag&&");
        assert_eq!(query["a"], vec!["1", "2"]);
        assert_eq!(query["b"], vec!["hello world"]);
        assert_eq!(query["c"], vec!["/x"]);
        assert_eq!(query["flag"], vec![""]);
        assert_eq!(query.len(), 4);
        assert!(parse_query("").is_empty());
    }

    #[test]
    fn test_record_fields() {
        let record = record();
        assert_eq!(record.method, "POST");
        assert_eq!(record.path, "/docs/page.html");
        assert_eq!(record.headers["x-forwarded-for"], vec!["10.0.0.1", "10.0.0.2"]);
        assert_eq!(record.headers["cookie"], vec![REDACTED]);
        assert_eq!(record.body, "cGF5bG9hZA==");

        let json: serde_json::Value = serde_json::to_value(&record).unwrap();
        for field in ["from_ip", "method", "host", "path", "query", "headers", "body"] {
            assert!(json.get(field).is_some(), "missing {}", field);
        }
    }

    #[tokio::test]
    async fn test_write_probes_forward_on_collision() {
        let tmp = tempfile::tempdir().unwrap();
        let log = RequestLog::open(tmp.path()).await.unwrap();

        let start = 1_700_000_000_000_000_000i64;
        std::fs::write(tmp.path().join(start.to_string()), b"taken").unwrap();
        std::fs::write(tmp.path().join((start + 1).to_string()), b"taken").unwrap();

        let path = log.write_from(&record(), start).await.unwrap();
        assert_eq!(path, tmp.path().join((start + 2).to_string()));
        let next = log.write_from(&record(), start).await.unwrap();
        assert_eq!(next, tmp.path().join((start + 3).to_string()));

        assert_eq!(std::fs::read(tmp.path().join(start.to_string())).unwrap(), b"taken");
        let parsed: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(parsed["host"], "example.com");
        assert_eq!(parsed["query"]["a"], serde_json::json!(["1", "2"]));
    }

    #[tokio::test]
    async fn test_concurrent_writes_get_distinct_files() {
        let tmp = tempfile::tempdir().unwrap();
        let log = RequestLog::open(tmp.path().join("logs")).await.unwrap();

        let tasks: Vec<_> = (0..32)
            .map(|_| {
                let log = log.clone();
                tokio::spawn(async move { log.write(&record()).await.unwrap() })
            })
            .collect();
        for task in tasks {
            task.await.unwrap();
        }

        let count = std::fs::read_dir(tmp.path().join("logs")).unwrap().count();
        assert_eq!(count, 32);
    }
}
