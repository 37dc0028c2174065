use crate::conversion::ConversionRecord;
use anyhow::{Context, Result};
use maud::{html, Markup, PreEscaped, DOCTYPE};
use serde::Serialize;
use std::fs;
use std::path::Path;

const LEAFLET_CSS_URL: &str = "https://cdnjs.cloudflare.com/ajax/libs/leaflet/1.4.0/leaflet.css";
const LEAFLET_CSS_SHA512: &str =
    "sha512-puBpdR0798OZvTTbP4A8Ix/l+A4dHDD0DGqYW6RQ+9jxkRFclaxxQb/SJAWZfWAkuyeQUytO7+7N4QKrDh+drA==";
const LEAFLET_JS_URL: &str = "https://cdnjs.cloudflare.com/ajax/libs/leaflet/1.4.0/leaflet.js";
const LEAFLET_JS_SHA512: &str =
    "sha512-QVftwZFqvtRNi0ZyCtsznlKSWOStnDORoefr1enyq5mVL4tmKB3S/EnC3rRJcxCPavG10IcrVGSmPh6Qw5lwrg==";
const MAP_JS: &str = include_str!("map.js");

const MAP_CSS: &str = "html,body,#map{height:100%;margin:0;}\
.geoconv-control{background:#fff;padding:2px 6px;border-radius:4px;\
box-shadow:0 1px 5px rgba(0,0,0,.4);font:12px/1.5 sans-serif;}\
.geoconv-fullscreen{display:block;font-size:18px;text-decoration:none;color:#333;}";

pub const MAP_TITLE: &str = "Interactive Geospatial Converter";
const DEFAULT_ZOOM: u8 = 5;

#[derive(Serialize)]
struct MapData {
    center: [f64; 2],
    zoom: u8,
    markers: Vec<MapMarker>,
}

#[derive(Serialize)]
struct MapMarker {
    lat: f64,
    lng: f64,
    address: String,
    original: String,
    projected: String,
    reversed: String,
}

impl From<&ConversionRecord> for MapMarker {
    fn from(r: &ConversionRecord) -> Self {
        Self {
            lat: r.coordinate.latitude(),
            lng: r.coordinate.longitude(),
            address: r.address.to_string(),
            original: format!(
                "{:.6}°, {:.6}°",
                r.coordinate.latitude(),
                r.coordinate.longitude()
            ),
            projected: format!("X={:.2}, Y={:.2}", r.projected.x, r.projected.y),
            reversed: format!(
                "{:.6}°, {:.6}°",
                r.reversed.latitude(),
                r.reversed.longitude()
            ),
        }
    }
}

impl MapData {
    fn new(records: &[ConversionRecord]) -> Self {
        let n = records.len() as f64;
        let avg_lat = records.iter().map(|r| r.coordinate.latitude()).sum::<f64>() / n;
        let avg_lon = records.iter().map(|r| r.coordinate.longitude()).sum::<f64>() / n;

        Self {
            center: [avg_lat, avg_lon],
            zoom: DEFAULT_ZOOM,
            markers: records.iter().map(MapMarker::from).collect(),
        }
    }

    /// Script assigning the data to `window.GEOCONV_MAP`
    fn to_script(&self) -> Result<String> {
        let json = serde_json::to_string(self)?;
        // Keep "</script>" inside strings from closing the tag
        Ok(format!(
            "window.GEOCONV_MAP={};",
            json.replace('<', "\\u003c")
        ))
    }
}

/// Render a standalone Leaflet page with one marker per record
pub fn render_map(records: &[ConversionRecord]) -> Result<String> {
    if records.is_empty() {
        anyhow::bail!("No valid coordinates to plot");
    }

    let data = MapData::new(records).to_script()?;
    Ok(page(MAP_TITLE, &data).into_string())
}

pub fn write_map(path: &Path, records: &[ConversionRecord]) -> Result<()> {
    let html = render_map(records)?;
    fs::write(path, html).with_context(|| format!("Failed to write map to {}", path.display()))?;
    log::debug!("Wrote map with {} markers to {}", records.len(), path.display());
    Ok(())
}

fn page(title: &str, data_script: &str) -> Markup {
    html! {
        (DOCTYPE)
        html {
            head {
                meta charset="utf-8";
                meta name="viewport" content="width=device-width, initial-scale=1, shrink-to-fit=no";
                title { (title) }
                link
                    rel="stylesheet"
                    href=(LEAFLET_CSS_URL)
                    integrity=(LEAFLET_CSS_SHA512)
                    crossorigin="anonymous";
                style { (PreEscaped(MAP_CSS)) }
            }
            body {
                div id="map" {}
                script { (PreEscaped(data_script)) }
                script
                    src=(LEAFLET_JS_URL)
                    integrity=(LEAFLET_JS_SHA512)
                    crossorigin="anonymous" {}
                script { (PreEscaped(MAP_JS)) }
            }
        }
    }
}
