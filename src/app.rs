//! One run: fetch, transform, render, write.

use anyhow::{anyhow, Context, Result};
use std::io::Write;

use crate::config::Config;
use crate::feed::{fetch_feed, FeedPayload, FeedSource};
use crate::logging::{
    log, log_band_counts, log_config, log_fetch, log_rejected_feature, log_render, obj, v_str,
    Domain, Level, ProfileScope,
};
use crate::marker::{transform_collection, TransformReport};
use crate::plates::{fetch_plates, PlateBoundary};
use crate::render::{default_base_layers, LeafletPage, MapRenderer, MapScene};

#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub features: usize,
    pub markers: usize,
    pub rejected: usize,
    pub plates: usize,
    pub bytes_written: usize,
}

/// Plates are decoration: a failure is logged and the map renders without them.
async fn fetch_optional_plates(
    source: Option<&(dyn FeedSource + Send + Sync)>,
) -> Vec<PlateBoundary> {
    let Some(source) = source else {
        return Vec::new();
    };
    match fetch_plates(source).await {
        Ok(plates) => {
            log(
                Level::Info,
                Domain::Plates,
                "plates_fetched",
                obj(&[
                    ("source", v_str(&source.describe())),
                    ("boundaries", serde_json::json!(plates.len())),
                ]),
            );
            plates
        }
        Err(err) => {
            log(
                Level::Warn,
                Domain::Plates,
                "plates_unavailable",
                obj(&[
                    ("source", v_str(&source.describe())),
                    ("msg", v_str(&format!("{:#}", err))),
                ]),
            );
            Vec::new()
        }
    }
}

pub fn transform_payload(payload: &FeedPayload, strict: bool) -> Result<TransformReport> {
    let _p = ProfileScope::with_context(
        "transform",
        &[("features", serde_json::json!(payload.collection.features.len()))],
    );
    let report = transform_collection(&payload.collection.features);
    for r in &report.rejected {
        log_rejected_feature(r.index, r.id.as_deref(), &r.error.to_string());
    }
    log_band_counts(&report.band_counts(), report.rejected.len());

    if strict && !report.rejected.is_empty() {
        let first = &report.rejected[0];
        return Err(anyhow!(
            "{} of {} features rejected (first at index {}: {})",
            report.rejected.len(),
            report.input_count(),
            first.index,
            first.error
        ));
    }
    Ok(report)
}

pub fn build_scene(
    cfg: &Config,
    payload: &FeedPayload,
    report: TransformReport,
    plates: Vec<PlateBoundary>,
) -> MapScene {
    if cfg.mapbox_token.is_none() {
        log(
            Level::Warn,
            Domain::Render,
            "no_mapbox_token",
            obj(&[("msg", v_str("MAPBOX_API_KEY unset; using OpenStreetMap tiles"))]),
        );
    }
    let mut scene = MapScene::new(report.markers, default_base_layers(cfg.mapbox_token.as_deref()))
        .with_view(cfg.view())
        .with_plates(plates);
    if let Some(title) = payload.collection.metadata.as_ref().and_then(|m| m.title.clone()) {
        scene = scene.with_title(title);
    }
    scene
}

pub fn write_output(output: &str, page: &str) -> Result<()> {
    if output == "-" {
        let stdout = std::io::stdout();
        let mut lock = stdout.lock();
        lock.write_all(page.as_bytes()).context("writing page to stdout")?;
        return lock.flush().context("flushing stdout");
    }
    std::fs::write(output, page).with_context(|| format!("writing {}", output))
}

pub async fn run(cfg: &Config) -> Result<RunSummary> {
    run_with(cfg, &LeafletPage::default()).await
}

pub async fn run_with(cfg: &Config, renderer: &dyn MapRenderer) -> Result<RunSummary> {
    let feed = cfg.feed_source()?;
    let plates_source = cfg.plates_source()?;
    log_config(
        &feed.describe(),
        &cfg.output,
        plates_source.is_some(),
        cfg.strict,
        cfg.mapbox_token.is_some(),
    );

    let (payload, plates) = {
        let _p = ProfileScope::new("fetch");
        tokio::join!(
            fetch_feed(feed.as_ref()),
            fetch_optional_plates(plates_source.as_deref()),
        )
    };
    let payload = payload?;
    log_fetch(
        &feed.describe(),
        payload.collection.features.len(),
        payload.bytes,
        &payload.sha256,
        payload.collection.metadata.as_ref().and_then(|m| m.generated),
    );

    let report = transform_payload(&payload, cfg.strict)?;
    let features = report.input_count();
    let rejected = report.rejected.len();
    let scene = build_scene(cfg, &payload, report, plates);

    let page = {
        let _p = ProfileScope::new("render");
        renderer.render(&scene)?
    };
    write_output(&cfg.output, &page)?;
    log_render(
        &cfg.output,
        scene.markers.len(),
        scene.plates.len(),
        scene.base_layers.len(),
        page.len(),
    );

    Ok(RunSummary {
        features,
        markers: scene.markers.len(),
        rejected,
        plates: scene.plates.len(),
        bytes_written: page.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::decode_collection;

    const DOC: &str = r#"{"type":"FeatureCollection","metadata":{"title":"Past Hour"},"features":[
        {"id":"a","properties":{"place":"A","mag":1.5,"time":1700000000000},"geometry":{"coordinates":[1.0,2.0,5.0]}},
        {"id":"b","properties":{"place":"B","mag":null,"time":1700000000000},"geometry":{"coordinates":[1.0,2.0,5.0]}}
    ]}"#;

    #[test]
    fn test_lenient_mode_keeps_good_features() {
        let payload = decode_collection(DOC.as_bytes()).unwrap();
        let report = transform_payload(&payload, false).unwrap();
        assert_eq!(report.markers.len(), 1);
        assert_eq!(report.rejected.len(), 1);
    }

    #[test]
    fn test_strict_mode_fails_on_rejection() {
        let payload = decode_collection(DOC.as_bytes()).unwrap();
        let err = transform_payload(&payload, true).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("1 of 2"), "{}", msg);
        assert!(msg.contains("properties.mag"), "{}", msg);
    }

    #[test]
    fn test_scene_uses_feed_title_and_view() {
        let payload = decode_collection(DOC.as_bytes()).unwrap();
        let report = transform_payload(&payload, false).unwrap();
        let cfg = Config {
            zoom: 5,
            ..Config::default()
        };
        let scene = build_scene(&cfg, &payload, report, Vec::new());
        assert_eq!(scene.title, "Past Hour");
        assert_eq!(scene.view.zoom, 5);
        assert_eq!(scene.markers.len(), 1);
        assert_eq!(scene.base_layers.len(), 1);
    }

    #[tokio::test]
    async fn test_missing_plates_are_not_fatal() {
        let dir = tempfile::TempDir::new().unwrap();
        let file = crate::feed::FileFeed::new(dir.path().join("missing.json"));
        let source: &(dyn FeedSource + Send + Sync) = &file;
        let plates = fetch_optional_plates(Some(source)).await;
        assert!(plates.is_empty());
        assert!(fetch_optional_plates(None).await.is_empty());
    }
}
