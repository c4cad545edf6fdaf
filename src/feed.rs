//! Earthquake feed retrieval and GeoJSON decoding.
//!
//! Feature fields are all optional at the serde layer. A single malformed
//! feature must not sink the whole collection; validation happens per
//! feature in `marker`.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_FEED_URL: &str =
    "https://earthquake.usgs.gov/earthquakes/feed/v1.0/summary/all_week.geojson";

#[derive(Debug, Clone, Deserialize)]
pub struct FeatureCollection {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub metadata: Option<FeedMetadata>,
    pub features: Vec<RawFeature>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FeedMetadata {
    pub title: Option<String>,
    /// Epoch milliseconds at which the feed was generated
    pub generated: Option<i64>,
    pub count: Option<u64>,
}

/// One feed entry. Decoding never fails: an entry whose fields have the
/// wrong shape keeps its `id` (when readable) and the serde message in
/// `decode_error`, and is rejected later.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(from = "Value")]
pub struct RawFeature {
    pub id: Option<String>,
    pub properties: Option<RawProperties>,
    pub geometry: Option<RawGeometry>,
    pub decode_error: Option<String>,
}

#[derive(Deserialize)]
struct FeatureFields {
    id: Option<String>,
    #[serde(default)]
    properties: Option<RawProperties>,
    #[serde(default)]
    geometry: Option<RawGeometry>,
}

impl From<Value> for RawFeature {
    fn from(value: Value) -> Self {
        let id = value.get("id").and_then(Value::as_str).map(str::to_string);
        match serde_json::from_value::<FeatureFields>(value) {
            Ok(f) => Self {
                id: f.id,
                properties: f.properties,
                geometry: f.geometry,
                decode_error: None,
            },
            Err(err) => Self {
                id,
                decode_error: Some(err.to_string()),
                ..Self::default()
            },
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawProperties {
    pub place: Option<String>,
    pub mag: Option<f64>,
    pub time: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawGeometry {
    /// `[lon, lat, depth_km]`
    pub coordinates: Option<Vec<Option<f64>>>,
}

/// A decoded feed plus the digest of the exact bytes it came from.
#[derive(Debug, Clone)]
pub struct FeedPayload {
    pub collection: FeatureCollection,
    pub sha256: String,
    pub bytes: usize,
}

/// Somewhere a GeoJSON document can be read from.
#[async_trait]
pub trait FeedSource {
    async fn fetch_bytes(&self) -> Result<Vec<u8>>;
    fn describe(&self) -> String;
}

pub struct HttpFeed {
    client: Client,
    url: String,
}

impl HttpFeed {
    pub fn new(url: impl Into<String>, timeout: Option<Duration>) -> Result<Self> {
        let mut builder = Client::builder().user_agent(concat!("quakemap/", env!("CARGO_PKG_VERSION")));
        if let Some(t) = timeout {
            builder = builder.timeout(t);
        }
        Ok(Self {
            client: builder.build().context("building http client")?,
            url: url.into(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl FeedSource for HttpFeed {
    async fn fetch_bytes(&self) -> Result<Vec<u8>> {
        let resp = self
            .client
            .get(&self.url)
            .send()
            .await
            .with_context(|| format!("GET {}", self.url))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(anyhow!("GET {} returned {}", self.url, status));
        }

        let body = resp
            .bytes()
            .await
            .with_context(|| format!("reading body of {}", self.url))?;
        Ok(body.to_vec())
    }

    fn describe(&self) -> String {
        self.url.clone()
    }
}

pub struct FileFeed {
    path: PathBuf,
}

impl FileFeed {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl FeedSource for FileFeed {
    async fn fetch_bytes(&self) -> Result<Vec<u8>> {
        std::fs::read(&self.path).with_context(|| format!("reading {}", self.path.display()))
    }

    fn describe(&self) -> String {
        format!("file://{}", self.path.display())
    }
}

pub fn body_sha256(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

pub fn decode_collection(bytes: &[u8]) -> Result<FeedPayload> {
    let collection: FeatureCollection =
        serde_json::from_slice(bytes).context("decoding GeoJSON feature collection")?;
    if collection.kind != "FeatureCollection" {
        return Err(anyhow!(
            "expected a FeatureCollection, got type {:?}",
            collection.kind
        ));
    }
    Ok(FeedPayload {
        collection,
        sha256: body_sha256(bytes),
        bytes: bytes.len(),
    })
}

/// Fetch and decode the earthquake feed. No retry: a failure ends the run.
pub async fn fetch_feed(source: &(dyn FeedSource + Send + Sync)) -> Result<FeedPayload> {
    let bytes = source.fetch_bytes().await?;
    decode_collection(&bytes).with_context(|| format!("feed {}", source.describe()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = r#"{
        "type": "FeatureCollection",
        "metadata": {"generated": 1760000000000, "title": "USGS All Earthquakes, Past Week", "count": 2},
        "features": [
            {"type": "Feature", "id": "us7000abcd",
             "properties": {"mag": 4.6, "place": "95 km SSW of Tonga", "time": 1759990000000},
             "geometry": {"type": "Point", "coordinates": [-175.2, -21.9, 112.4]}},
            {"type": "Feature", "id": "ci40000001",
             "properties": {"mag": null, "place": "5km N of Ridgecrest, CA", "time": 1759991000000},
             "geometry": {"type": "Point", "coordinates": [-117.6, 35.7, 8.1]}}
        ]
    }"#;

    #[test]
    fn test_decode_sample() {
        let payload = decode_collection(SAMPLE.as_bytes()).unwrap();
        let c = &payload.collection;
        assert_eq!(c.features.len(), 2);
        assert_eq!(c.metadata.as_ref().unwrap().count, Some(2));

        let first = &c.features[0];
        assert_eq!(first.id.as_deref(), Some("us7000abcd"));
        let props = first.properties.as_ref().unwrap();
        assert_eq!(props.mag, Some(4.6));
        assert_eq!(props.time, Some(1759990000000));
        let coords = first.geometry.as_ref().unwrap().coordinates.as_ref().unwrap();
        assert_eq!(coords, &vec![Some(-175.2), Some(-21.9), Some(112.4)]);

        // null magnitude survives decoding, rejected later
        assert_eq!(c.features[1].properties.as_ref().unwrap().mag, None);
    }

    #[test]
    fn test_decode_tolerates_missing_geometry() {
        let doc = r#"{"type":"FeatureCollection","features":[{"type":"Feature","properties":{"place":"x"},"geometry":null}]}"#;
        let payload = decode_collection(doc.as_bytes()).unwrap();
        assert!(payload.collection.features[0].geometry.is_none());
    }

    #[test]
    fn test_decode_keeps_mistyped_features() {
        let doc = r#"{"type":"FeatureCollection","features":[
            {"id":"good","properties":{"place":"A","mag":1.0,"time":1700000000000},"geometry":{"coordinates":[1.0,2.0,3.0]}},
            {"id":"strmag","properties":{"place":"B","mag":"4.5","time":1700000000000},"geometry":{"coordinates":[1.0,2.0,3.0]}},
            {"id":"floattime","properties":{"place":"C","mag":1.0,"time":1700000000000.0},"geometry":{"coordinates":[1.0,2.0,3.0]}},
            {"id":"strcoord","properties":{"place":"D","mag":1.0,"time":1700000000000},"geometry":{"coordinates":["1.0",2.0,3.0]}},
            42
        ]}"#;
        let payload = decode_collection(doc.as_bytes()).unwrap();
        let features = &payload.collection.features;
        assert_eq!(features.len(), 5);
        assert!(features[0].decode_error.is_none());
        for f in &features[1..] {
            assert!(f.decode_error.is_some(), "{:?}", f);
        }
        assert_eq!(features[1].id.as_deref(), Some("strmag"));
        assert!(features[1].decode_error.as_ref().unwrap().contains("invalid type"));
        assert!(features[4].id.is_none());
    }

    #[test]
    fn test_decode_rejects_non_collection() {
        let doc = r#"{"type":"Feature","features":[]}"#;
        assert!(decode_collection(doc.as_bytes()).is_err());
        assert!(decode_collection(b"<html>503</html>").is_err());
    }

    #[test]
    fn test_digest_tracks_bytes() {
        let a = decode_collection(SAMPLE.as_bytes()).unwrap();
        let b = decode_collection(SAMPLE.as_bytes()).unwrap();
        assert_eq!(a.sha256, b.sha256);
        assert_eq!(a.sha256.len(), 64);
        assert_eq!(a.bytes, SAMPLE.len());

        let c = decode_collection(SAMPLE.replace("4.6", "4.7").as_bytes()).unwrap();
        assert_ne!(a.sha256, c.sha256);
    }

    #[tokio::test]
    async fn test_file_feed_roundtrip() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        let source = FileFeed::new(file.path());
        assert!(source.describe().starts_with("file://"));
        let payload = fetch_feed(&source).await.unwrap();
        assert_eq!(payload.collection.features.len(), 2);
    }

    #[tokio::test]
    async fn test_file_feed_missing_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let source = FileFeed::new(dir.path().join("nope.geojson"));
        let err = fetch_feed(&source).await.unwrap_err();
        assert!(format!("{:#}", err).contains("nope.geojson"));
    }

    #[test]
    fn test_http_feed_keeps_url() {
        let feed = HttpFeed::new(DEFAULT_FEED_URL, None).unwrap();
        assert_eq!(feed.url(), DEFAULT_FEED_URL);
        assert_eq!(feed.describe(), DEFAULT_FEED_URL);
    }
}
