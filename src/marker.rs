//! Feature → marker transform.

use chrono::{TimeZone, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use thiserror::Error;

use crate::depth::{classify, SeverityBand};
use crate::feed::RawFeature;

/// Circle radius in metres per unit of magnitude.
pub const METERS_PER_MAGNITUDE: f64 = 50_000.0;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FeatureError {
    #[error("missing field {0}")]
    MissingField(&'static str),
    #[error("timestamp {0} ms is out of range")]
    InvalidTimestamp(i64),
    #[error("malformed feature: {0}")]
    Malformed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct EarthquakeFeature {
    pub id: Option<String>,
    pub place: String,
    pub magnitude: f64,
    pub depth_km: f64,
    pub timestamp_ms: i64,
    pub longitude: f64,
    pub latitude: f64,
}

impl TryFrom<&RawFeature> for EarthquakeFeature {
    type Error = FeatureError;

    fn try_from(raw: &RawFeature) -> Result<Self, Self::Error> {
        if let Some(err) = &raw.decode_error {
            return Err(FeatureError::Malformed(err.clone()));
        }
        let props = raw
            .properties
            .as_ref()
            .ok_or(FeatureError::MissingField("properties"))?;
        let place = props
            .place
            .clone()
            .ok_or(FeatureError::MissingField("properties.place"))?;
        let magnitude = props.mag.ok_or(FeatureError::MissingField("properties.mag"))?;
        let timestamp_ms = props.time.ok_or(FeatureError::MissingField("properties.time"))?;

        let coords = raw
            .geometry
            .as_ref()
            .and_then(|g| g.coordinates.as_ref())
            .ok_or(FeatureError::MissingField("geometry.coordinates"))?;
        let coord = |i: usize, name: &'static str| {
            coords
                .get(i)
                .copied()
                .flatten()
                .ok_or(FeatureError::MissingField(name))
        };
        let longitude = coord(0, "geometry.coordinates[0]")?;
        let latitude = coord(1, "geometry.coordinates[1]")?;
        let depth_km = coord(2, "geometry.coordinates[2]")?;

        if Utc.timestamp_millis_opt(timestamp_ms).single().is_none() {
            return Err(FeatureError::InvalidTimestamp(timestamp_ms));
        }

        Ok(Self {
            id: raw.id.clone(),
            place,
            magnitude,
            depth_km,
            timestamp_ms,
            longitude,
            latitude,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Marker {
    /// `(lat, lon)`
    pub position: (f64, f64),
    pub radius_meters: f64,
    pub band: SeverityBand,
    pub popup_text: String,
}

/// Linear in magnitude, unclamped.
pub fn radius_for(magnitude: f64) -> f64 {
    magnitude * METERS_PER_MAGNITUDE
}

pub fn to_marker(feature: &EarthquakeFeature) -> Marker {
    Marker {
        position: (feature.latitude, feature.longitude),
        radius_meters: radius_for(feature.magnitude),
        band: classify(feature.depth_km),
        popup_text: popup_text(feature),
    }
}

/// Place, magnitude, depth, time; in that order.
pub fn popup_text(feature: &EarthquakeFeature) -> String {
    format!(
        "<h3>{}</h3><hr><p>Magnitude: {}</p><hr><p>Depth: {} km</p><hr><p>{}</p>",
        html_escape(&feature.place),
        feature.magnitude,
        feature.depth_km,
        format_timestamp(feature.timestamp_ms),
    )
}

pub fn format_timestamp(ms: i64) -> String {
    match Utc.timestamp_millis_opt(ms).single() {
        Some(dt) => dt.format("%a %b %d %Y %H:%M:%S UTC").to_string(),
        None => format!("{} ms", ms),
    }
}

pub fn html_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

#[derive(Debug, Clone, PartialEq)]
pub struct RejectedFeature {
    pub index: usize,
    pub id: Option<String>,
    pub error: FeatureError,
}

#[derive(Debug, Clone, Default)]
pub struct TransformReport {
    pub markers: Vec<Marker>,
    pub rejected: Vec<RejectedFeature>,
}

impl TransformReport {
    pub fn input_count(&self) -> usize {
        self.markers.len() + self.rejected.len()
    }

    pub fn band_counts(&self) -> BTreeMap<SeverityBand, usize> {
        let mut counts: BTreeMap<SeverityBand, usize> =
            SeverityBand::ALL.iter().map(|b| (*b, 0)).collect();
        for m in &self.markers {
            *counts.entry(m.band).or_insert(0) += 1;
        }
        counts
    }
}

/// Transform every feature, keeping input order. Malformed features are
/// reported, never rendered.
pub fn transform_collection(features: &[RawFeature]) -> TransformReport {
    let mut report = TransformReport::default();
    for (index, raw) in features.iter().enumerate() {
        match EarthquakeFeature::try_from(raw) {
            Ok(feature) => report.markers.push(to_marker(&feature)),
            Err(error) => report.rejected.push(RejectedFeature {
                index,
                id: raw.id.clone(),
                error,
            }),
        }
    }
    report
}
