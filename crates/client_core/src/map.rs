//! Rendering surface abstraction and map defaults.

use serde::{Deserialize, Serialize};
use shared::domain::Point;

/// Opaque handle for anything drawn on a [`MapSurface`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LayerId(pub u64);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolygonStyle {
    pub color: String,
}

impl Default for PolygonStyle {
    fn default() -> Self {
        Self {
            color: "red".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TileLayer {
    pub url_template: String,
    pub max_zoom: u8,
    pub attribution: String,
}

impl Default for TileLayer {
    fn default() -> Self {
        Self {
            url_template: "https://tile.openstreetmap.org/{z}/{x}/{y}.png".to_string(),
            max_zoom: 19,
            attribution:
                "&copy; <a href=\"http://www.openstreetmap.org/copyright\">OpenStreetMap</a>"
                    .to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapConfig {
    pub center: Point,
    pub zoom: u8,
    /// Zoom used when a search result re-centers the map.
    pub search_zoom: u8,
    pub tiles: TileLayer,
    pub polygon: PolygonStyle,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            center: Point::new(-6.200000, 106.816666),
            zoom: 15,
            search_zoom: 15,
            tiles: TileLayer::default(),
            polygon: PolygonStyle::default(),
        }
    }
}

/// Primitives of the map library the view draws on.
pub trait MapSurface: Send {
    fn set_view(&mut self, center: Point, zoom: u8);
    fn add_tile_layer(&mut self, tiles: &TileLayer) -> LayerId;
    fn add_marker(&mut self, at: Point) -> LayerId;
    fn add_polygon(&mut self, vertices: &[Point], style: &PolygonStyle) -> LayerId;
    fn remove_layer(&mut self, layer: LayerId);

    fn remove_marker(&mut self, marker: LayerId) {
        self.remove_layer(marker);
    }
}
