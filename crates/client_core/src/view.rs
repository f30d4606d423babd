//! Map-side mirror of a point session.
//!
//! The view never mutates its cached points on its own: the cache changes only
//! through [`MapView::load`] and [`MapView::apply`]. User input is turned into
//! [`ClientRequest`]s and sent to the session.

use std::sync::Arc;

use anyhow::Result;
use shared::{
    domain::{Point, PointList},
    protocol::{ClientRequest, PointsSnapshot, ServerEvent},
};
use tracing::{debug, info, warn};

use crate::{
    geocode::Geocoder,
    map::{LayerId, MapConfig, MapSurface},
    PointCommands,
};

/// Key that submits the search box.
pub const SUBMIT_KEY: &str = "Enter";

#[derive(Debug, Clone, PartialEq)]
pub enum SearchOutcome {
    /// Not the submit key, or an empty query.
    NotSubmitted,
    /// Lookup failed or returned nothing.
    NotFound,
    /// Map re-centered; the add guard refused the point.
    Centered { point: Point },
    /// Map re-centered and an add request was sent.
    PointRequested { point: Point },
}

pub struct MapView<M: MapSurface> {
    map: M,
    config: MapConfig,
    commands: Arc<dyn PointCommands>,
    geocoder: Arc<dyn Geocoder>,
    points: PointList,
    adding_points: bool,
    markers: Vec<LayerId>,
    polygon: Option<LayerId>,
}

impl<M: MapSurface> MapView<M> {
    pub fn new(
        map: M,
        config: MapConfig,
        commands: Arc<dyn PointCommands>,
        geocoder: Arc<dyn Geocoder>,
    ) -> Self {
        Self {
            map,
            config,
            commands,
            geocoder,
            points: PointList::new(),
            adding_points: false,
            markers: Vec::new(),
            polygon: None,
        }
    }

    /// Centers the map on the configured default and adds the tile layer.
    pub fn mount(&mut self) {
        self.map.set_view(self.config.center, self.config.zoom);
        self.map.add_tile_layer(&self.config.tiles);
    }

    /// Initial page load with the server-provided state.
    pub fn load(&mut self, snapshot: PointsSnapshot) {
        self.adding_points = snapshot.adding_points;
        self.replace_points(snapshot.points);
    }

    pub fn points(&self) -> &PointList {
        &self.points
    }

    pub fn adding_points(&self) -> bool {
        self.adding_points
    }

    pub fn map(&self) -> &M {
        &self.map
    }

    pub fn map_mut(&mut self) -> &mut M {
        &mut self.map
    }

    /// Redraws markers, plus the polygon when the triangle is complete.
    pub fn render(&mut self) {
        for marker in self.markers.drain(..) {
            self.map.remove_marker(marker);
        }
        if let Some(polygon) = self.polygon.take() {
            self.map.remove_layer(polygon);
        }

        for point in self.points.iter() {
            self.markers.push(self.map.add_marker(*point));
        }
        if let Some(triangle) = self.points.triangle() {
            self.polygon = Some(self.map.add_polygon(&triangle, &self.config.polygon));
        }
    }

    pub fn apply(&mut self, event: &ServerEvent) {
        match event {
            ServerEvent::CollectionStarted => {
                info!("view: start adding points");
                self.adding_points = true;
                self.replace_points(PointList::new());
            }
            ServerEvent::PointAdded { points } => {
                info!(points = points.len(), "view: point added");
                self.replace_points(points.clone());
            }
            ServerEvent::CollectionComplete { points } => {
                info!(points = points.len(), "view: polygon drawn");
                self.adding_points = false;
                self.replace_points(points.clone());
            }
            ServerEvent::PointsCleared => {
                info!("view: points cleared");
                self.adding_points = false;
                self.replace_points(PointList::new());
            }
            ServerEvent::Error(err) => {
                warn!(code = ?err.code, message = %err.message, "view: server rejected request");
            }
        }
    }

    /// Whether the local cache would accept another point.
    pub fn accepts_points(&self) -> bool {
        self.adding_points && !self.points.is_full()
    }

    /// Returns `true` when an add request was sent.
    pub async fn on_map_click(&self, point: Point) -> Result<bool> {
        if !self.accepts_points() {
            debug!(%point, "view: click ignored");
            return Ok(false);
        }
        self.commands
            .send_request(ClientRequest::add_point(point))
            .await?;
        Ok(true)
    }

    pub async fn on_search_submit(&mut self, key: &str, query: &str) -> Result<SearchOutcome> {
        if key != SUBMIT_KEY || query.trim().is_empty() {
            return Ok(SearchOutcome::NotSubmitted);
        }

        let found = match self.geocoder.lookup(query).await {
            Ok(Some(found)) => found,
            Ok(None) => {
                info!(query, "view: no search result");
                return Ok(SearchOutcome::NotFound);
            }
            Err(err) => {
                warn!(query, error = %err, "view: search failed");
                return Ok(SearchOutcome::NotFound);
            }
        };

        let point = found.point;
        self.map.set_view(point, self.config.search_zoom);
        if self.on_map_click(point).await? {
            Ok(SearchOutcome::PointRequested { point })
        } else {
            Ok(SearchOutcome::Centered { point })
        }
    }

    /// Requests a fresh collection round.
    pub async fn start_adding(&self) -> Result<()> {
        self.commands.send_request(ClientRequest::StartAdding).await
    }

    pub async fn clear_points(&self) -> Result<()> {
        self.commands.send_request(ClientRequest::ClearPoints).await
    }

    fn replace_points(&mut self, points: PointList) {
        self.points = points;
        self.render();
    }
}

#[cfg(test)]
#[path = "tests/view_tests.rs"]
mod tests;
