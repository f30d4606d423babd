use std::collections::BTreeMap;

use client_core::{LayerId, MapSurface, PolygonStyle, TileLayer};
use shared::domain::Point;

#[derive(Debug, Clone)]
enum Layer {
    Tiles(String),
    Marker(Point),
    Polygon(Vec<Point>, String),
}

/// Prints every map operation and keeps the live layers for `show`.
#[derive(Default)]
pub struct TerminalMap {
    next_id: u64,
    layers: BTreeMap<u64, Layer>,
    view: Option<(Point, u8)>,
}

impl TerminalMap {
    fn insert(&mut self, layer: Layer) -> LayerId {
        self.next_id += 1;
        self.layers.insert(self.next_id, layer);
        LayerId(self.next_id)
    }

    pub fn describe(&self) -> Vec<String> {
        let mut lines = Vec::new();
        if let Some((center, zoom)) = self.view {
            lines.push(format!("view {center} zoom {zoom}"));
        }
        for (id, layer) in &self.layers {
            lines.push(match layer {
                Layer::Tiles(url) => format!("#{id} tiles {url}"),
                Layer::Marker(at) => format!("#{id} marker {at}"),
                Layer::Polygon(vertices, color) => {
                    let vertices: Vec<String> = vertices.iter().map(Point::to_string).collect();
                    format!("#{id} polygon [{color}] {}", vertices.join(" -> "))
                }
            });
        }
        lines
    }
}

impl MapSurface for TerminalMap {
    fn set_view(&mut self, center: Point, zoom: u8) {
        println!("map: view {center} zoom {zoom}");
        self.view = Some((center, zoom));
    }

    fn add_tile_layer(&mut self, tiles: &TileLayer) -> LayerId {
        self.insert(Layer::Tiles(tiles.url_template.clone()))
    }

    fn add_marker(&mut self, at: Point) -> LayerId {
        println!("map: marker {at}");
        self.insert(Layer::Marker(at))
    }

    fn add_polygon(&mut self, vertices: &[Point], style: &PolygonStyle) -> LayerId {
        println!("map: polygon with {} vertices", vertices.len());
        self.insert(Layer::Polygon(vertices.to_vec(), style.color.clone()))
    }

    fn remove_layer(&mut self, layer: LayerId) {
        self.layers.remove(&layer.0);
    }
}
