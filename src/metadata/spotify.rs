//! Spotify Web API client using the client-credentials flow.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};
use url::Url;

use super::{EnrichmentError, MetadataProvider, TrackMetadata};
use crate::config::MetadataSettings;
use crate::http_client::{
    RetryConfig, build_agent, is_retryable, read_response_bytes, retry_with_backoff,
};

const MAX_TOKEN_RESPONSE_BYTES: usize = 64 * 1024;
const MAX_API_RESPONSE_BYTES: usize = 2 * 1024 * 1024;
/// Refresh tokens this long before the service says they expire.
const TOKEN_EXPIRY_MARGIN: Duration = Duration::from_secs(30);
const MAX_SEARCH_LIMIT: usize = 50;

struct AccessToken {
    value: String,
    expires_at: Instant,
}

/// Metadata provider backed by the Spotify Web API.
pub struct SpotifyProvider {
    agent: ureq::Agent,
    retry: RetryConfig,
    api_base_url: String,
    auth_url: String,
    credentials: Option<(String, String)>,
    token: Mutex<Option<AccessToken>>,
}

impl SpotifyProvider {
    /// Build a provider from settings, resolving credentials from config or environment.
    pub fn from_settings(settings: &MetadataSettings) -> Self {
        Self::new(settings, settings.credentials())
    }

    /// Build a provider with explicit credentials; `None` makes every call fail with
    /// [`EnrichmentError::MissingCredentials`].
    pub fn new(settings: &MetadataSettings, credentials: Option<(String, String)>) -> Self {
        Self {
            agent: build_agent(settings.timeout()),
            retry: RetryConfig::with_attempts(settings.max_attempts),
            api_base_url: settings.api_base_url.clone(),
            auth_url: settings.auth_url.clone(),
            credentials,
            token: Mutex::new(None),
        }
    }

    pub fn has_credentials(&self) -> bool {
        self.credentials.is_some()
    }

    fn access_token(&self) -> Result<String, EnrichmentError> {
        let mut cached = self
            .token
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(token) = cached.as_ref() {
            if Instant::now() < token.expires_at {
                return Ok(token.value.clone());
            }
        }
        let token = self.request_token()?;
        let value = token.value.clone();
        *cached = Some(token);
        Ok(value)
    }

    fn invalidate_token(&self) {
        let mut cached = self
            .token
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *cached = None;
    }

    fn request_token(&self) -> Result<AccessToken, EnrichmentError> {
        let (client_id, client_secret) = self
            .credentials
            .as_ref()
            .ok_or(EnrichmentError::MissingCredentials)?;
        let basic = STANDARD.encode(format!("{client_id}:{client_secret}"));
        let response = retry_with_backoff(
            self.retry,
            || {
                self.agent
                    .post(&self.auth_url)
                    .set("Authorization", &format!("Basic {basic}"))
                    .send_form(&[("grant_type", "client_credentials")])
            },
            is_retryable,
        )
        .map_err(map_request_error)?;
        let bytes = read_response_bytes(response, MAX_TOKEN_RESPONSE_BYTES)
            .map_err(|err| EnrichmentError::Transport(err.to_string()))?;
        let wire: TokenWire = serde_json::from_slice(&bytes)?;
        let lifetime = Duration::from_secs(wire.expires_in.unwrap_or(3600));
        debug!("Obtained metadata access token");
        Ok(AccessToken {
            value: wire.access_token,
            expires_at: Instant::now() + lifetime.saturating_sub(TOKEN_EXPIRY_MARGIN),
        })
    }

    fn endpoint(&self, segments: &[&str], query: &[(&str, &str)]) -> Result<Url, EnrichmentError> {
        let invalid = |source| EnrichmentError::InvalidUrl {
            url: self.api_base_url.clone(),
            source,
        };
        let mut url = Url::parse(&self.api_base_url).map_err(invalid)?;
        url.path_segments_mut()
            .map_err(|()| invalid(url::ParseError::RelativeUrlWithCannotBeABaseBase))?
            .pop_if_empty()
            .extend(segments);
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        Ok(url)
    }

    fn get_json<T: DeserializeOwned>(&self, url: &Url) -> Result<T, EnrichmentError> {
        let token = self.access_token()?;
        let result = retry_with_backoff(
            self.retry,
            || {
                self.agent
                    .get(url.as_str())
                    .set("Authorization", &format!("Bearer {token}"))
                    .call()
            },
            is_retryable,
        );
        let response = match result {
            Ok(response) => response,
            Err(err) => {
                let err = map_request_error(err);
                if matches!(err, EnrichmentError::Http { status: 401 }) {
                    warn!("Metadata token rejected; refreshing on next request");
                    self.invalidate_token();
                }
                return Err(err);
            }
        };
        let bytes = read_response_bytes(response, MAX_API_RESPONSE_BYTES)
            .map_err(|err| EnrichmentError::Transport(err.to_string()))?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

impl MetadataProvider for SpotifyProvider {
    fn track(&self, id: &str) -> Result<TrackMetadata, EnrichmentError> {
        let url = self.endpoint(&["tracks", id], &[])?;
        let wire: TrackWire = self.get_json(&url)?;
        Ok(wire.into_metadata(id))
    }

    fn search(&self, query: &str, limit: usize) -> Result<Vec<TrackMetadata>, EnrichmentError> {
        let limit = limit.clamp(1, MAX_SEARCH_LIMIT).to_string();
        let url = self.endpoint(
            &["search"],
            &[("q", query), ("type", "track"), ("limit", limit.as_str())],
        )?;
        let wire: SearchWire = self.get_json(&url)?;
        Ok(wire.into_results())
    }
}

fn map_request_error(err: ureq::Error) -> EnrichmentError {
    match err {
        ureq::Error::Status(status, _) => EnrichmentError::Http { status },
        ureq::Error::Transport(err) => EnrichmentError::Transport(err.to_string()),
    }
}

#[derive(Deserialize)]
struct TokenWire {
    access_token: String,
    expires_in: Option<u64>,
}

#[derive(Deserialize)]
struct SearchWire {
    tracks: SearchTracksWire,
}

#[derive(Deserialize)]
struct SearchTracksWire {
    #[serde(default)]
    items: Vec<Option<TrackWire>>,
}

impl SearchWire {
    /// Tracks with an id; `null` items and id-less items are skipped.
    fn into_results(self) -> Vec<TrackMetadata> {
        self.tracks
            .items
            .into_iter()
            .flatten()
            .filter_map(|item| {
                let id = item.id.clone()?;
                Some(item.into_metadata(&id))
            })
            .collect()
    }
}

#[derive(Deserialize)]
struct TrackWire {
    id: Option<String>,
    name: Option<String>,
    #[serde(default)]
    artists: Vec<NamedWire>,
    album: Option<AlbumWire>,
    popularity: Option<u32>,
    preview_url: Option<String>,
    #[serde(default)]
    external_urls: ExternalUrlsWire,
    duration_ms: Option<u64>,
}

#[derive(Deserialize)]
struct NamedWire {
    name: String,
}

#[derive(Deserialize)]
struct AlbumWire {
    name: Option<String>,
    #[serde(default)]
    images: Vec<ImageWire>,
}

#[derive(Deserialize)]
struct ImageWire {
    url: Option<String>,
}

#[derive(Default, Deserialize)]
struct ExternalUrlsWire {
    spotify: Option<String>,
}

impl TrackWire {
    fn into_metadata(self, fallback_id: &str) -> TrackMetadata {
        let artist = (!self.artists.is_empty()).then(|| {
            self.artists
                .iter()
                .map(|artist| artist.name.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        });
        let (album, album_image_url) = match self.album {
            Some(album) => (
                album.name,
                album.images.into_iter().next().and_then(|image| image.url),
            ),
            None => (None, None),
        };
        TrackMetadata {
            id: self.id.unwrap_or_else(|| fallback_id.to_string()),
            name: self.name,
            artist,
            album,
            album_image_url,
            popularity: self.popularity,
            preview_url: self.preview_url,
            external_url: self.external_urls.spotify,
            duration_ms: self.duration_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::sync::Arc;
    use std::thread;

    /// Serve canned responses in order, recording each request head.
    fn serve_sequence(responses: Vec<String>) -> (String, Arc<Mutex<Vec<String>>>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let requests = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&requests);
        thread::spawn(move || {
            for response in responses {
                let Ok((mut stream, _)) = listener.accept() else {
                    return;
                };
                let mut buf = [0u8; 4096];
                let read = stream.read(&mut buf).unwrap_or(0);
                seen.lock()
                    .unwrap()
                    .push(String::from_utf8_lossy(&buf[..read]).into_owned());
                let _ = stream.write_all(response.as_bytes());
            }
        });
        (format!("http://{addr}"), requests)
    }

    fn json_response(body: &str) -> String {
        format!(
            "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nConnection: close\r\nContent-Length: {}\r\n\r\n{}",
            body.len(),
            body
        )
    }

    fn provider(base: &str, credentials: Option<(String, String)>) -> SpotifyProvider {
        let settings = MetadataSettings {
            api_base_url: base.to_string(),
            auth_url: format!("{base}/api/token"),
            timeout_ms: 5_000,
            max_attempts: 1,
            ..MetadataSettings::default()
        };
        SpotifyProvider::new(&settings, credentials)
    }

    const TOKEN: &str = r#"{"access_token":"tok-1","token_type":"Bearer","expires_in":3600}"#;
    const TRACK: &str = r#"{
        "id": "track-9",
        "name": "Night Drive",
        "artists": [{"name": "A"}, {"name": "B"}],
        "album": {"name": "Roads", "images": [{"url": "http://img/1"}, {"url": "http://img/2"}]},
        "popularity": 42,
        "preview_url": null,
        "external_urls": {"spotify": "http://open/track-9"},
        "duration_ms": 181000
    }"#;

    #[test]
    fn missing_credentials_fail_without_network() {
        let provider = provider("http://127.0.0.1:9", None);
        assert!(!provider.has_credentials());
        let err = provider.track("x").unwrap_err();
        assert!(matches!(err, EnrichmentError::MissingCredentials));
    }

    #[test]
    fn track_lookup_maps_fields_and_reuses_token() {
        let (base, requests) = serve_sequence(vec![
            json_response(TOKEN),
            json_response(TRACK),
            json_response(TRACK),
        ]);
        let provider = provider(&base, Some(("id".into(), "secret".into())));

        let metadata = provider.track("track-9").unwrap();
        assert_eq!(metadata.id, "track-9");
        assert_eq!(metadata.name.as_deref(), Some("Night Drive"));
        assert_eq!(metadata.artist.as_deref(), Some("A, B"));
        assert_eq!(metadata.album.as_deref(), Some("Roads"));
        assert_eq!(metadata.album_image_url.as_deref(), Some("http://img/1"));
        assert_eq!(metadata.popularity, Some(42));
        assert_eq!(metadata.preview_url, None);
        assert_eq!(metadata.external_url.as_deref(), Some("http://open/track-9"));
        assert_eq!(metadata.duration_ms, Some(181_000));

        provider.track("track-9").unwrap();
        let requests = requests.lock().unwrap();
        assert_eq!(requests.len(), 3);
        assert!(requests[0].starts_with("POST /api/token"));
        let expected_basic = format!("Basic {}", STANDARD.encode("id:secret"));
        assert!(requests[0].contains(&expected_basic));
        assert!(requests[1].starts_with("GET /tracks/track-9"));
        assert!(requests[1].contains("Bearer tok-1"));
        assert!(requests[2].starts_with("GET /tracks/track-9"));
    }

    #[test]
    fn search_encodes_query_and_skips_items_without_id() {
        let body = format!(r#"{{"tracks": {{"items": [{TRACK}, {{"name": "no id"}}]}}}}"#);
        let (base, requests) = serve_sequence(vec![json_response(TOKEN), json_response(&body)]);
        let provider = provider(&base, Some(("id".into(), "secret".into())));

        let results = provider.search("night drive", 5).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, "track-9");
        let requests = requests.lock().unwrap();
        assert!(requests[1].starts_with("GET /search?q=night+drive&type=track&limit=5"));
    }

    #[test]
    fn null_search_items_are_skipped() {
        let wire: SearchWire =
            serde_json::from_str(r#"{"tracks": {"items": [null, {"id": "a"}, null]}}"#).unwrap();
        let results = wire.into_results();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, "a");
    }

    #[test]
    fn http_status_is_reported() {
        let (base, _) = serve_sequence(vec![
            json_response(TOKEN),
            "HTTP/1.1 404 Not Found\r\nConnection: close\r\nContent-Length: 0\r\n\r\n".into(),
        ]);
        let provider = provider(&base, Some(("id".into(), "secret".into())));
        let err = provider.track("missing").unwrap_err();
        assert!(matches!(err, EnrichmentError::Http { status: 404 }));
    }

    #[test]
    fn sparse_track_payload_maps_to_empty_fields() {
        let wire: TrackWire = serde_json::from_str(r#"{"name": "Solo"}"#).unwrap();
        let metadata = wire.into_metadata("fallback");
        assert_eq!(metadata.id, "fallback");
        assert_eq!(metadata.artist, None);
        assert_eq!(metadata.album_image_url, None);
        assert_eq!(metadata.popularity, None);
    }
}
