//! Map rendering.
//!
//! `MapScene` is the complete renderer-agnostic description of one map.
//! `LeafletPage` turns it into a standalone HTML document with the scene
//! embedded as JSON.

use anyhow::{Context, Result};
use serde::Serialize;

use crate::depth::SeverityBand;
use crate::marker::Marker;
use crate::plates::PlateBoundary;

const MAPBOX_TEMPLATE: &str =
    "https://api.mapbox.com/styles/v1/{id}/tiles/{z}/{x}/{y}?access_token={accessToken}";
const MAPBOX_ATTRIBUTION: &str = "© <a href='https://www.mapbox.com/about/maps/'>Mapbox</a> © <a href='http://www.openstreetmap.org/copyright'>OpenStreetMap</a> <strong><a href='https://www.mapbox.com/map-feedback/' target='_blank'>Improve this map</a></strong>";
const OSM_TEMPLATE: &str = "https://tile.openstreetmap.org/{z}/{x}/{y}.png";
const OSM_ATTRIBUTION: &str =
    "© <a href='http://www.openstreetmap.org/copyright'>OpenStreetMap</a> contributors";

pub const DEFAULT_BASE_LAYER: &str = "Street Map";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BaseLayer {
    pub name: String,
    pub url_template: String,
    /// Mapbox style id, substituted for `{id}`
    pub style_id: Option<String>,
    pub access_token: Option<String>,
    pub min_zoom: u8,
    pub max_zoom: u8,
    pub tile_size: u16,
    pub zoom_offset: i8,
    pub attribution: String,
}

fn mapbox_layer(name: &str, style_id: &str, token: &str) -> BaseLayer {
    BaseLayer {
        name: name.to_string(),
        url_template: MAPBOX_TEMPLATE.to_string(),
        style_id: Some(style_id.to_string()),
        access_token: Some(token.to_string()),
        min_zoom: 0,
        max_zoom: 18,
        tile_size: 512,
        zoom_offset: -1,
        attribution: MAPBOX_ATTRIBUTION.to_string(),
    }
}

/// Light, dark and street styles with a Mapbox token; a single
/// OpenStreetMap layer without one.
pub fn default_base_layers(mapbox_token: Option<&str>) -> Vec<BaseLayer> {
    match mapbox_token {
        Some(token) => vec![
            mapbox_layer("Light Map", "mapbox/light-v10", token),
            mapbox_layer("Dark Map", "mapbox/dark-v10", token),
            mapbox_layer(DEFAULT_BASE_LAYER, "mapbox/streets-v11", token),
        ],
        None => vec![BaseLayer {
            name: DEFAULT_BASE_LAYER.to_string(),
            url_template: OSM_TEMPLATE.to_string(),
            style_id: None,
            access_token: None,
            min_zoom: 0,
            max_zoom: 19,
            tile_size: 256,
            zoom_offset: 0,
            attribution: OSM_ATTRIBUTION.to_string(),
        }],
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LegendEntry {
    pub color: &'static str,
    pub label: &'static str,
}

pub fn depth_legend() -> Vec<LegendEntry> {
    SeverityBand::ALL
        .iter()
        .map(|b| LegendEntry {
            color: b.color(),
            label: b.label(),
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MapView {
    /// `(lat, lon)`
    pub center: (f64, f64),
    pub zoom: u8,
}

impl Default for MapView {
    fn default() -> Self {
        Self {
            center: (37.09, -95.71),
            zoom: 3,
        }
    }
}

#[derive(Debug, Clone)]
pub struct MapScene {
    pub title: String,
    pub view: MapView,
    pub base_layers: Vec<BaseLayer>,
    pub default_layer: String,
    pub markers: Vec<Marker>,
    pub plates: Vec<PlateBoundary>,
    pub legend: Vec<LegendEntry>,
}

impl MapScene {
    pub fn new(markers: Vec<Marker>, base_layers: Vec<BaseLayer>) -> Self {
        Self {
            title: "Earthquakes".to_string(),
            view: MapView::default(),
            base_layers,
            default_layer: DEFAULT_BASE_LAYER.to_string(),
            markers,
            plates: Vec::new(),
            legend: depth_legend(),
        }
    }

    pub fn with_view(mut self, view: MapView) -> Self {
        self.view = view;
        self
    }

    pub fn with_plates(mut self, plates: Vec<PlateBoundary>) -> Self {
        self.plates = plates;
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }
}

pub trait MapRenderer {
    fn render(&self, scene: &MapScene) -> Result<String>;
}

#[derive(Serialize)]
struct MarkerJs<'a> {
    lat: f64,
    lon: f64,
    radius: f64,
    color: &'static str,
    popup: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SceneJs<'a> {
    view: &'a MapView,
    base_layers: &'a [BaseLayer],
    default_layer: &'a str,
    markers: Vec<MarkerJs<'a>>,
    plates: &'a [PlateBoundary],
    legend: &'a [LegendEntry],
}

/// JSON that is safe inside a `<script>` element. `<`, `>` and `&` only
/// occur inside JSON strings, where the `\u` escapes are equivalent.
pub fn script_safe_json<T: Serialize>(value: &T) -> Result<String> {
    let raw = serde_json::to_string(value).context("serializing map scene")?;
    Ok(raw
        .replace('<', "\\u003c")
        .replace('>', "\\u003e")
        .replace('&', "\\u0026"))
}

#[derive(Debug, Clone)]
pub struct LeafletPage {
    pub leaflet_version: String,
}

impl Default for LeafletPage {
    fn default() -> Self {
        Self {
            leaflet_version: "1.9.4".to_string(),
        }
    }
}

impl MapRenderer for LeafletPage {
    fn render(&self, scene: &MapScene) -> Result<String> {
        let data = SceneJs {
            view: &scene.view,
            base_layers: &scene.base_layers,
            default_layer: &scene.default_layer,
            markers: scene
                .markers
                .iter()
                .map(|m| MarkerJs {
                    lat: m.position.0,
                    lon: m.position.1,
                    radius: m.radius_meters,
                    color: m.band.color(),
                    popup: &m.popup_text,
                })
                .collect(),
            plates: &scene.plates,
            legend: &scene.legend,
        };
        let json = script_safe_json(&data)?;

        Ok(PAGE_TEMPLATE
            .replace("{{TITLE}}", &crate::marker::html_escape(&scene.title))
            .replace("{{LEAFLET}}", &self.leaflet_version)
            .replace("{{SCENE}}", &json))
    }
}

const PAGE_TEMPLATE: &str = r#"<!doctype html>
<html lang="en">
<head>
  <meta charset="UTF-8" />
  <meta name="viewport" content="width=device-width, initial-scale=1.0" />
  <title>{{TITLE}}</title>
  <link rel="stylesheet" href="https://unpkg.com/leaflet@{{LEAFLET}}/dist/leaflet.css" />
  <script src="https://unpkg.com/leaflet@{{LEAFLET}}/dist/leaflet.js"></script>
  <style>
    html, body { height: 100%; margin: 0; padding: 0; }
    #map { position: absolute; inset: 0; }
    .legend { background: white; padding: 6px 10px; border-radius: 4px; box-shadow: 0 0 12px rgba(0, 0, 0, 0.35); }
    .legend h3 { margin: 0 0 4px 0; cursor: pointer; user-select: none; }
    .legend ul { list-style: none; margin: 0; padding: 0; }
    .legend li { padding: 2px 8px; margin: 2px 0; color: black; }
    .legend.collapsed ul { display: none; }
  </style>
</head>
<body>
  <div id="map"></div>
  <script type="application/json" id="scene">{{SCENE}}</script>
  <script>
    const scene = JSON.parse(document.getElementById("scene").textContent);

    const baseMaps = {};
    for (const layer of scene.baseLayers) {
      baseMaps[layer.name] = L.tileLayer(layer.urlTemplate, {
        attribution: layer.attribution,
        tileSize: layer.tileSize,
        zoomOffset: layer.zoomOffset,
        minZoom: layer.minZoom,
        maxZoom: layer.maxZoom,
        id: layer.styleId || undefined,
        accessToken: layer.accessToken || undefined
      });
    }

    const earthquakes = L.layerGroup(scene.markers.map(m =>
      L.circle([m.lat, m.lon], {
        radius: m.radius,
        fillColor: m.color,
        stroke: true,
        fillOpacity: 0.5
      }).bindPopup(m.popup)
    ));

    const overlayMaps = { Earthquakes: earthquakes };
    if (scene.plates.length > 0) {
      overlayMaps["Tectonic Plates"] = L.layerGroup(scene.plates.map(p =>
        L.polyline(p.paths, { color: "orange", weight: 2 })
      ));
    }

    const initial = baseMaps[scene.defaultLayer] || Object.values(baseMaps)[0];
    const myMap = L.map("map", {
      center: scene.view.center,
      zoom: scene.view.zoom,
      layers: [initial, earthquakes]
    });

    L.control.layers(baseMaps, overlayMaps, { collapsed: false }).addTo(myMap);

    const legend = L.control({ position: "bottomleft" });
    legend.onAdd = function () {
      const div = L.DomUtil.create("div", "info legend");
      const title = L.DomUtil.create("h3", "", div);
      title.textContent = "Depth";
      const list = L.DomUtil.create("ul", "", div);
      for (const entry of scene.legend) {
        const li = L.DomUtil.create("li", "", list);
        li.style.backgroundColor = entry.color;
        li.textContent = entry.label;
      }
      L.DomEvent.on(title, "click", () => div.classList.toggle("collapsed"));
      L.DomEvent.disableClickPropagation(div);
      return div;
    };
    legend.addTo(myMap);
  </script>
</body>
</html>
"#;
