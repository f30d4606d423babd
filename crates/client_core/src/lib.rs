use anyhow::Result;
use async_trait::async_trait;
use shared::protocol::{ClientRequest, ServerEvent};

pub mod error;
pub mod geocode;
pub mod map;
mod realtime;
pub mod view;

pub use geocode::{GeocodeMatch, Geocoder, NominatimGeocoder, DEFAULT_GEOCODER_URL};
pub use map::{LayerId, MapConfig, MapSurface, PolygonStyle, TileLayer};
pub use realtime::RealtimeClient;
pub use view::{MapView, SearchOutcome, SUBMIT_KEY};

#[derive(Debug, Clone)]
pub enum ClientEvent {
    Server(ServerEvent),
    Disconnected,
    Error(String),
}

/// Outbound side of the event channel.
#[async_trait]
pub trait PointCommands: Send + Sync {
    async fn send_request(&self, request: ClientRequest) -> Result<()>;
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
