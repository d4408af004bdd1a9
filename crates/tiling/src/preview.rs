//! Static Leaflet preview page for a finished pyramid.

use std::fs;
use std::path::{Path, PathBuf};

use geo_common::{BoundingBox, GeomosaicError, GeomosaicResult};
use tracing::info;

/// File name of the preview page in the output directory.
pub const PREVIEW_FILE_NAME: &str = "index.html";

const LEAFLET_VERSION: &str = "1.9.4";
const TILE_URL_TEMPLATE: &str = "./{z}/{x}/{y}.png";

/// Preview page contents.
#[derive(Debug, Clone, PartialEq)]
pub struct PreviewPage {
    pub title: String,
    pub min_zoom: u32,
    pub max_zoom: u32,
    /// Geographic bounds of the pyramid, degrees.
    pub bounds: BoundingBox,
}

impl PreviewPage {
    pub fn new(title: impl Into<String>, min_zoom: u32, max_zoom: u32, bounds: BoundingBox) -> Self {
        Self {
            title: title.into(),
            min_zoom,
            max_zoom,
            bounds,
        }
    }

    /// Zoom the map opens at before fitting the bounds.
    pub fn initial_zoom(&self) -> u32 {
        (self.min_zoom + 2).min(self.max_zoom).max(self.min_zoom)
    }

    pub fn render(&self) -> String {
        let (center_lng, center_lat) = self.bounds.center();
        let b = &self.bounds;
        format!(
            r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>{title}</title>
    <link rel="stylesheet" href="https://unpkg.com/leaflet@{leaflet}/dist/leaflet.css" />
    <style>
        body {{ margin: 0; padding: 0; }}
        #map {{ width: 100%; height: 100vh; }}
    </style>
</head>
<body>
    <div id="map"></div>

    <script src="https://unpkg.com/leaflet@{leaflet}/dist/leaflet.js"></script>
    <script>
        var osm = L.tileLayer('https://tile.openstreetmap.org/{{z}}/{{x}}/{{y}}.png', {{
            maxZoom: 19,
            attribution: '&copy; OpenStreetMap contributors'
        }});

        var tiles = L.tileLayer('{template}', {{
            minZoom: {min_zoom},
            maxZoom: {max_zoom},
            tms: false,
            attribution: {title_js}
        }});

        var map = L.map('map', {{
            center: [{center_lat}, {center_lng}],
            zoom: {zoom},
            layers: [osm, tiles]
        }});

        L.control.layers({{ "OpenStreetMap": osm }}, {{ {title_js}: tiles }}).addTo(map);

        var bounds = L.latLngBounds(
            L.latLng({south}, {west}),
            L.latLng({north}, {east})
        );
        if (bounds.isValid()) {{
            map.fitBounds(bounds, {{ padding: [20, 20] }});
        }}
    </script>
</body>
</html>
"#,
            title = escape_html(&self.title),
            title_js = js_string(&escape_html(&self.title)),
            leaflet = LEAFLET_VERSION,
            template = TILE_URL_TEMPLATE,
            min_zoom = self.min_zoom,
            max_zoom = self.max_zoom,
            center_lat = center_lat,
            center_lng = center_lng,
            zoom = self.initial_zoom(),
            south = b.min_y,
            west = b.min_x,
            north = b.max_y,
            east = b.max_x,
        )
    }

    /// Write `index.html` into `output_dir`.
    pub fn write(&self, output_dir: &Path) -> GeomosaicResult<PathBuf> {
        let path = output_dir.join(PREVIEW_FILE_NAME);
        fs::write(&path, self.render()).map_err(|e| GeomosaicError::tile_write(&path, e))?;
        info!(path = %path.display(), "Preview page written");
        Ok(path)
    }
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// A double-quoted JavaScript string literal.
fn js_string(text: &str) -> String {
    serde_json::to_string(text).unwrap_or_else(|_| "\"\"".to_string())
}
