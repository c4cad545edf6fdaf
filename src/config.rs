//! Runtime configuration read from the environment.

use anyhow::{anyhow, Context, Result};
use std::time::Duration;
use url::Url;

use crate::feed::{FeedSource, FileFeed, HttpFeed, DEFAULT_FEED_URL};
use crate::plates::DEFAULT_PLATES_URL;
use crate::render::MapView;

#[derive(Clone, Debug)]
pub struct Config {
    pub feed_url: String,
    pub feed_file: Option<String>,
    pub mapbox_token: Option<String>,
    pub plates: bool,
    pub plates_url: String,
    /// Abort the run when any feature is rejected
    pub strict: bool,
    pub http_timeout_secs: Option<u64>,
    pub center_lat: f64,
    pub center_lon: f64,
    pub zoom: u8,
    /// Page destination; `-` is stdout
    pub output: String,
}

fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env_opt(key).and_then(|v| v.trim().parse().ok())
}

fn env_flag(key: &str) -> bool {
    matches!(
        env_opt(key).as_deref().map(str::to_ascii_lowercase).as_deref(),
        Some("1" | "true" | "yes" | "on")
    )
}

impl Default for Config {
    fn default() -> Self {
        let view = MapView::default();
        Self {
            feed_url: DEFAULT_FEED_URL.to_string(),
            feed_file: None,
            mapbox_token: None,
            plates: false,
            plates_url: DEFAULT_PLATES_URL.to_string(),
            strict: false,
            http_timeout_secs: None,
            center_lat: view.center.0,
            center_lon: view.center.1,
            zoom: view.zoom,
            output: "earthquakes.html".to_string(),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            feed_url: env_opt("QUAKEMAP_FEED_URL").unwrap_or(d.feed_url),
            feed_file: env_opt("QUAKEMAP_FEED_FILE"),
            mapbox_token: env_opt("MAPBOX_API_KEY").or_else(|| env_opt("API_KEY")),
            plates: env_flag("QUAKEMAP_PLATES"),
            plates_url: env_opt("QUAKEMAP_PLATES_URL").unwrap_or(d.plates_url),
            strict: env_flag("QUAKEMAP_STRICT"),
            http_timeout_secs: env_parse("QUAKEMAP_HTTP_TIMEOUT_SECS"),
            center_lat: env_parse("QUAKEMAP_CENTER_LAT").unwrap_or(d.center_lat),
            center_lon: env_parse("QUAKEMAP_CENTER_LON").unwrap_or(d.center_lon),
            zoom: env_parse("QUAKEMAP_ZOOM").unwrap_or(d.zoom),
            output: env_opt("QUAKEMAP_OUT").unwrap_or(d.output),
        }
    }

    /// Positional `OUTPUT` argument overrides `QUAKEMAP_OUT`.
    pub fn with_args(mut self, args: &[String]) -> Self {
        if let Some(out) = args.get(1) {
            self.output = out.clone();
        }
        self
    }

    pub fn view(&self) -> MapView {
        MapView {
            center: (self.center_lat, self.center_lon),
            zoom: self.zoom,
        }
    }

    fn timeout(&self) -> Option<Duration> {
        self.http_timeout_secs.map(Duration::from_secs)
    }

    pub fn feed_source(&self) -> Result<Box<dyn FeedSource + Send + Sync>> {
        if let Some(path) = &self.feed_file {
            return Ok(Box::new(FileFeed::new(path)));
        }
        let url = parse_http_url(&self.feed_url).context("QUAKEMAP_FEED_URL")?;
        Ok(Box::new(HttpFeed::new(url, self.timeout())?))
    }

    /// `None` unless the plate overlay is enabled. A local path or a
    /// `file://` URL is read from disk; anything else must be http(s).
    pub fn plates_source(&self) -> Result<Option<Box<dyn FeedSource + Send + Sync>>> {
        if !self.plates {
            return Ok(None);
        }
        if !self.plates_url.contains("://") {
            return Ok(Some(Box::new(FileFeed::new(&self.plates_url))));
        }
        if let Ok(url) = Url::parse(&self.plates_url) {
            if url.scheme() == "file" {
                let path = url
                    .to_file_path()
                    .map_err(|_| anyhow!("QUAKEMAP_PLATES_URL: not a local path: {}", url))?;
                return Ok(Some(Box::new(FileFeed::new(path))));
            }
        }
        let url = parse_http_url(&self.plates_url).context("QUAKEMAP_PLATES_URL")?;
        Ok(Some(Box::new(HttpFeed::new(url, self.timeout())?)))
    }
}

pub fn parse_http_url(raw: &str) -> Result<String> {
    let url = Url::parse(raw).with_context(|| format!("invalid url {:?}", raw))?;
    match url.scheme() {
        "http" | "https" => Ok(url.to_string()),
        other => Err(anyhow!("unsupported scheme {:?} in {}", other, raw)),
    }
}
