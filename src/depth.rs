//! Depth classification.
//!
//! Hypocenter depth (km) maps onto six discrete bands used for marker color
//! and for the legend. The band table is the single source for both, so the
//! legend can never drift from what the markers show.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SeverityBand {
    VeryShallow,
    Shallow,
    Moderate,
    Deep,
    VeryDeep,
    /// Deeper than 90 km, exactly 90 km, or a depth that is not a number.
    ExtremeOrUnknown,
}

impl SeverityBand {
    /// Bands in increasing depth order.
    pub const ALL: [SeverityBand; 6] = [
        SeverityBand::VeryShallow,
        SeverityBand::Shallow,
        SeverityBand::Moderate,
        SeverityBand::Deep,
        SeverityBand::VeryDeep,
        SeverityBand::ExtremeOrUnknown,
    ];

    pub fn index(&self) -> usize {
        match self {
            SeverityBand::VeryShallow => 0,
            SeverityBand::Shallow => 1,
            SeverityBand::Moderate => 2,
            SeverityBand::Deep => 3,
            SeverityBand::VeryDeep => 4,
            SeverityBand::ExtremeOrUnknown => 5,
        }
    }

    pub fn color(&self) -> &'static str {
        match self {
            SeverityBand::VeryShallow => "purple",
            SeverityBand::Shallow => "blue",
            SeverityBand::Moderate => "green",
            SeverityBand::Deep => "yellow",
            SeverityBand::VeryDeep => "orange",
            SeverityBand::ExtremeOrUnknown => "red",
        }
    }

    /// Depth range shown in the legend.
    pub fn label(&self) -> &'static str {
        match self {
            SeverityBand::VeryShallow => "<10",
            SeverityBand::Shallow => "10-30",
            SeverityBand::Moderate => "30-50",
            SeverityBand::Deep => "50-70",
            SeverityBand::VeryDeep => "70-90",
            SeverityBand::ExtremeOrUnknown => "90+",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SeverityBand::VeryShallow => "very_shallow",
            SeverityBand::Shallow => "shallow",
            SeverityBand::Moderate => "moderate",
            SeverityBand::Deep => "deep",
            SeverityBand::VeryDeep => "very_deep",
            SeverityBand::ExtremeOrUnknown => "extreme_or_unknown",
        }
    }
}

/// Classify a depth in kilometres.
///
/// Lower bounds are inclusive. Exactly 90 km and NaN both land in
/// `ExtremeOrUnknown`.
pub fn classify(depth_km: f64) -> SeverityBand {
    if depth_km < 10.0 {
        SeverityBand::VeryShallow
    } else if depth_km < 30.0 {
        SeverityBand::Shallow
    } else if depth_km < 50.0 {
        SeverityBand::Moderate
    } else if depth_km < 70.0 {
        SeverityBand::Deep
    } else if depth_km < 90.0 {
        SeverityBand::VeryDeep
    } else {
        SeverityBand::ExtremeOrUnknown
    }
}
