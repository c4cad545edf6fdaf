//! Tectonic plate boundary overlay.
//!
//! Optional second dataset. Only line geometries are drawn; anything else in
//! the document is skipped.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::feed::FeedSource;

pub const DEFAULT_PLATES_URL: &str =
    "https://raw.githubusercontent.com/fraxen/tectonicplates/master/GeoJSON/PB2002_boundaries.json";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlateBoundary {
    pub name: Option<String>,
    /// Each path is a list of `(lat, lon)` vertices.
    pub paths: Vec<Vec<(f64, f64)>>,
}

#[derive(Deserialize)]
struct PlateCollection {
    features: Vec<Value>,
}

fn name_of(feature: &Value) -> Option<String> {
    let props = feature.get("properties")?;
    props
        .get("Name")
        .and_then(Value::as_str)
        .or_else(|| props.get("name").and_then(Value::as_str))
        .map(str::to_string)
}

fn vertex(v: &Value) -> Option<(f64, f64)> {
    let pair = v.as_array()?;
    let lon = pair.first()?.as_f64()?;
    let lat = pair.get(1)?.as_f64()?;
    Some((lat, lon))
}

fn line(v: &Value) -> Vec<(f64, f64)> {
    v.as_array()
        .map(|pts| pts.iter().filter_map(vertex).collect())
        .unwrap_or_default()
}

fn paths_of(geometry: &Value) -> Vec<Vec<(f64, f64)>> {
    let coords = &geometry["coordinates"];
    let paths = match geometry["type"].as_str() {
        Some("LineString") => vec![line(coords)],
        Some("MultiLineString") => coords
            .as_array()
            .map(|ls| ls.iter().map(line).collect())
            .unwrap_or_default(),
        _ => Vec::new(),
    };
    paths.into_iter().filter(|p| p.len() >= 2).collect()
}

pub fn decode_plates(bytes: &[u8]) -> Result<Vec<PlateBoundary>> {
    let doc: PlateCollection =
        serde_json::from_slice(bytes).context("decoding plate boundaries")?;
    Ok(doc
        .features
        .iter()
        .filter_map(|f| {
            let paths = f.get("geometry").map(paths_of).unwrap_or_default();
            if paths.is_empty() {
                return None;
            }
            Some(PlateBoundary {
                name: name_of(f),
                paths,
            })
        })
        .collect())
}

pub async fn fetch_plates(source: &(dyn FeedSource + Send + Sync)) -> Result<Vec<PlateBoundary>> {
    let bytes = source.fetch_bytes().await?;
    decode_plates(&bytes).with_context(|| format!("plates {}", source.describe()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            {"type": "Feature", "properties": {"Name": "AF-AN", "PlateA": "AF"},
             "geometry": {"type": "LineString", "coordinates": [[-0.4379, -54.8518], [-0.038826, -54.6772], [0.443182, -54.4512]]}},
            {"type": "Feature", "properties": {"Name": "SPLIT"},
             "geometry": {"type": "MultiLineString", "coordinates": [[[170.0, -10.0], [179.9, -11.0]], [[-179.9, -11.0], [-170.0, -12.0]]]}},
            {"type": "Feature", "properties": {"Name": "POLY"},
             "geometry": {"type": "Polygon", "coordinates": [[[0, 0], [1, 0], [1, 1], [0, 0]]]}},
            {"type": "Feature", "properties": {}, "geometry": null}
        ]
    }"#;

    #[test]
    fn test_decode_lines_only() {
        let plates = decode_plates(SAMPLE.as_bytes()).unwrap();
        assert_eq!(plates.len(), 2);
        assert_eq!(plates[0].name.as_deref(), Some("AF-AN"));
        assert_eq!(plates[0].paths.len(), 1);
        assert_eq!(plates[0].paths[0][0], (-54.8518, -0.4379));
        assert_eq!(plates[1].paths.len(), 2);
    }

    #[test]
    fn test_degenerate_lines_dropped() {
        let doc = r#"{"features":[{"geometry":{"type":"LineString","coordinates":[[1.0,2.0]]}}]}"#;
        assert!(decode_plates(doc.as_bytes()).unwrap().is_empty());
    }

    #[test]
    fn test_odd_names_do_not_drop_the_overlay() {
        let doc = r#"{"features":[
            {"properties":{"Name":"AF-AN","name":"af-an"},"geometry":{"type":"LineString","coordinates":[[1.0,2.0],[3.0,4.0]]}},
            {"properties":{"Name":17},"geometry":{"type":"LineString","coordinates":[[1.0,2.0],[3.0,4.0]]}},
            {"properties":{"name":"lower"},"geometry":{"type":"LineString","coordinates":[[1.0,2.0],[3.0,4.0]]}},
            "stray"
        ]}"#;
        let plates = decode_plates(doc.as_bytes()).unwrap();
        assert_eq!(plates.len(), 3);
        assert_eq!(plates[0].name.as_deref(), Some("AF-AN"));
        assert_eq!(plates[1].name, None);
        assert_eq!(plates[2].name.as_deref(), Some("lower"));
    }

    #[test]
    fn test_garbage_is_error() {
        assert!(decode_plates(b"not json").is_err());
    }
}
