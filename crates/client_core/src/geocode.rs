//! Address lookup against a Nominatim-compatible search endpoint.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use shared::domain::Point;
use url::Url;

use crate::error::GeocodeError;

pub const DEFAULT_GEOCODER_URL: &str = "https://nominatim.openstreetmap.org";
const USER_AGENT: &str = concat!("tripoint-client/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone, PartialEq)]
pub struct GeocodeMatch {
    pub point: Point,
    pub display_name: Option<String>,
}

#[async_trait]
pub trait Geocoder: Send + Sync {
    /// Best match for `query`, if any.
    async fn lookup(&self, query: &str) -> Result<Option<GeocodeMatch>, GeocodeError>;
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Coordinate {
    Text(String),
    Number(f64),
}

impl Coordinate {
    fn value(self) -> Result<f64, GeocodeError> {
        match self {
            Coordinate::Number(value) => Ok(value),
            Coordinate::Text(text) => text
                .trim()
                .parse::<f64>()
                .map_err(|_| GeocodeError::InvalidCoordinate { value: text }),
        }
    }
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    lat: Coordinate,
    lon: Coordinate,
    #[serde(default)]
    display_name: Option<String>,
}

pub struct NominatimGeocoder {
    http: Client,
    search_url: Url,
}

impl NominatimGeocoder {
    pub fn new(base_url: &str) -> Result<Self, GeocodeError> {
        let http = Client::builder().user_agent(USER_AGENT).build()?;
        Self::with_client(http, base_url)
    }

    pub fn with_client(http: Client, base_url: &str) -> Result<Self, GeocodeError> {
        let search_url = Url::parse(&format!("{}/", base_url.trim_end_matches('/')))
            .and_then(|base| base.join("search"))
            .map_err(|_| GeocodeError::InvalidBaseUrl(base_url.to_string()))?;
        Ok(Self { http, search_url })
    }
}

#[async_trait]
impl Geocoder for NominatimGeocoder {
    async fn lookup(&self, query: &str) -> Result<Option<GeocodeMatch>, GeocodeError> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(None);
        }

        let response = self
            .http
            .get(self.search_url.clone())
            .query(&[("format", "json"), ("q", query)])
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(GeocodeError::Status {
                status: response.status().as_u16(),
            });
        }

        let hits: Vec<SearchHit> = response.json().await?;
        let Some(first) = hits.into_iter().next() else {
            return Ok(None);
        };
        Ok(Some(GeocodeMatch {
            point: Point::new(first.lat.value()?, first.lon.value()?),
            display_name: first.display_name,
        }))
    }
}
