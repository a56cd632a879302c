//! Cassette store for recorded exchanges.

use super::interceptor::InterceptError;
use crate::http::{CanonicalRequest, CanonicalResponse, Headers};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordedRequest {
    pub method: String,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordedResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

/// One recorded request/response exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Episode {
    pub request: RecordedRequest,
    pub response: RecordedResponse,
    pub recorded_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
}

impl Episode {
    pub fn new(request: &CanonicalRequest, response: &CanonicalResponse, latency_ms: Option<u64>) -> Self {
        Self {
            request: RecordedRequest {
                method: request.method.clone(),
                url: request.url.clone(),
                headers: flatten(&request.headers),
                body: String::from_utf8_lossy(&request.body).into_owned(),
            },
            response: RecordedResponse {
                status: response.status,
                headers: flatten(&response.headers),
                body: String::from_utf8_lossy(&response.body).into_owned(),
            },
            recorded_at: Utc::now(),
            latency_ms,
        }
    }

    /// The recorded response in canonical form.
    pub fn to_response(&self) -> CanonicalResponse {
        let headers: Headers = self.response.headers.iter().cloned().collect();
        CanonicalResponse {
            status: self.response.status,
            headers,
            body: Bytes::from(self.response.body.clone()),
        }
    }
}

fn flatten(headers: &Headers) -> Vec<(String, String)> {
    headers
        .iter()
        .flat_map(|(name, values)| values.iter().map(move |v| (name.to_string(), v.clone())))
        .collect()
}

/// JSON file `<dir>/<name>.json` holding an ordered list of episodes.
///
/// Loaded when an interceptor is armed, appended while recording and
/// written back when it is disarmed.
#[derive(Debug)]
pub struct Cassette {
    path: PathBuf,
    episodes: RwLock<Vec<Episode>>,
    dirty: AtomicBool,
}

impl Cassette {
    pub fn new(dir: &Path, name: &str) -> Self {
        Self {
            path: dir.join(format!("{name}.json")),
            episodes: RwLock::new(Vec::new()),
            dirty: AtomicBool::new(false),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load episodes from disk. A missing file is an empty cassette.
    pub fn load(&self) -> Result<usize, InterceptError> {
        if !self.path.exists() {
            debug!("Cassette {:?} does not exist, starting fresh", self.path);
            return Ok(0);
        }
        let json = fs::read_to_string(&self.path).map_err(|source| InterceptError::Cassette {
            path: self.path.clone(),
            source,
        })?;
        let loaded: Vec<Episode> =
            serde_json::from_str(&json).map_err(|source| InterceptError::CassetteFormat {
                path: self.path.clone(),
                source,
            })?;

        let count = loaded.len();
        *self.episodes.write() = loaded;
        self.dirty.store(false, Ordering::SeqCst);
        info!("Loaded {} episodes from cassette {:?}", count, self.path);
        Ok(count)
    }

    pub fn record(&self, episode: Episode) {
        debug!(
            "Recording {} {} -> {}",
            episode.request.method, episode.request.url, episode.response.status
        );
        self.episodes.write().push(episode);
        self.dirty.store(true, Ordering::SeqCst);
    }

    /// Write the cassette if anything was recorded since the last load/save.
    pub fn save(&self) -> Result<bool, InterceptError> {
        if !self.dirty.load(Ordering::SeqCst) {
            return Ok(false);
        }
        let to_io = |source: std::io::Error| InterceptError::Cassette {
            path: self.path.clone(),
            source,
        };
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir).map_err(to_io)?;
        }

        let episodes = self.episodes.read();
        let json = serde_json::to_string_pretty(&*episodes).map_err(|source| {
            InterceptError::CassetteFormat {
                path: self.path.clone(),
                source,
            }
        })?;
        fs::write(&self.path, json).map_err(to_io)?;
        self.dirty.store(false, Ordering::SeqCst);
        info!("Saved {} episodes to cassette {:?}", episodes.len(), self.path);
        Ok(true)
    }

    pub fn episodes(&self) -> Vec<Episode> {
        self.episodes.read().clone()
    }

    pub fn len(&self) -> usize {
        self.episodes.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.episodes.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn episode(path: &str) -> Episode {
        let req = CanonicalRequest::new("GET", format!("https://host{path}")).with_header("Accept", "application/json");
        let resp = CanonicalResponse::json(200, &json!({"ok": true}));
        Episode::new(&req, &resp, Some(12))
    }

    #[test]
    fn test_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let cassette = Cassette::new(dir.path(), "recording");
        assert_eq!(cassette.load().unwrap(), 0);
        assert!(cassette.is_empty());
        assert_eq!(cassette.path(), dir.path().join("recording.json"));
    }

    #[test]
    fn test_save_and_reload_keeps_order() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("cassettes");
        let cassette = Cassette::new(&nested, "recording");
        cassette.record(episode("/a"));
        cassette.record(episode("/b"));
        assert!(cassette.save().unwrap());
        assert!(!cassette.save().unwrap(), "clean cassette is not rewritten");

        let reloaded = Cassette::new(&nested, "recording");
        assert_eq!(reloaded.load().unwrap(), 2);
        let urls: Vec<String> = reloaded.episodes().into_iter().map(|e| e.request.url).collect();
        assert_eq!(urls, vec!["https://host/a", "https://host/b"]);
    }

    #[test]
    fn test_episode_response_round_trip() {
        let e = episode("/a");
        let resp = e.to_response();
        assert_eq!(resp.status, 200);
        assert_eq!(resp.body_json().unwrap(), json!({"ok": true}));
        assert_eq!(e.request.headers, vec![("Accept".to_string(), "application/json".to_string())]);
    }

    #[test]
    fn test_corrupt_cassette() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("fake.json"), "not json").unwrap();
        let err = Cassette::new(dir.path(), "fake").load().unwrap_err();
        assert!(matches!(err, InterceptError::CassetteFormat { .. }));
    }
}
