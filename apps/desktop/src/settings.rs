use std::path::Path;

use anyhow::{Context, Result};
use client_core::{MapConfig, DEFAULT_GEOCODER_URL};
use config::{Config, ConfigBuilder, Environment, File};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClientSettings {
    pub server_url: String,
    pub username: Option<String>,
    pub geocoder_url: String,
    pub map: MapConfig,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            server_url: "http://127.0.0.1:8080".to_string(),
            username: None,
            geocoder_url: DEFAULT_GEOCODER_URL.to_string(),
            map: MapConfig::default(),
        }
    }
}

/// Reads `client.toml` (or `explicit`), then `POINTS__*` environment overrides.
pub fn load_settings(explicit: Option<&Path>) -> Result<ClientSettings> {
    let mut builder = Config::builder();
    builder = match explicit {
        Some(path) => builder.add_source(File::from(path).required(true)),
        None => builder.add_source(File::with_name("client").required(false)),
    };
    builder = builder.add_source(
        Environment::with_prefix("POINTS")
            .prefix_separator("__")
            .separator("__"),
    );
    build(builder)
}

fn build(builder: ConfigBuilder<config::builder::DefaultState>) -> Result<ClientSettings> {
    builder
        .build()
        .context("failed to read client settings")?
        .try_deserialize()
        .context("invalid client settings")
}
