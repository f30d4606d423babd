use thiserror::Error;

#[derive(Debug, Error)]
pub enum GeocodeError {
    #[error("geocoding request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("geocoding service returned status {status}")]
    Status { status: u16 },
    #[error("invalid coordinate '{value}' in geocoding result")]
    InvalidCoordinate { value: String },
    #[error("invalid geocoder base url '{0}'")]
    InvalidBaseUrl(String),
}
