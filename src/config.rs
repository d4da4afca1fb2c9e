use std::fs;
use std::path::PathBuf;

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};

use crate::error::LoaderError;
use crate::geo::DEFAULT_COORDINATE_TOLERANCE;

pub const DEFAULT_CONFIG_FILE: &str = "pm-load.json";
pub const DEFAULT_UNIT_CONVERSIONS: &str = "unit_conversions.tsv";
pub const DEFAULT_OUTPUT_DIR: &str = ".pm-load";

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub unit_conversions: Option<String>,
    #[serde(default)]
    pub output_dir: Option<String>,
    #[serde(default)]
    pub coordinate_tolerance: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedConfig {
    pub unit_conversions: Utf8PathBuf,
    pub unit_conversions_required: bool,
    pub output_dir: Utf8PathBuf,
    pub coordinate_tolerance: f64,
}

pub struct ConfigLoader;

impl ConfigLoader {
    pub fn resolve(path: Option<&str>) -> Result<ResolvedConfig, LoaderError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from(DEFAULT_CONFIG_FILE),
        };

        if path.is_none() && !config_path.exists() {
            return Self::resolve_config(Config::default());
        }

        let content = fs::read_to_string(&config_path)
            .map_err(|_| LoaderError::ConfigRead(config_path.clone()))?;
        let config: Config = serde_json::from_str(&content)
            .map_err(|err| LoaderError::ConfigParse(err.to_string()))?;

        Self::resolve_config(config)
    }

    pub fn resolve_config(config: Config) -> Result<ResolvedConfig, LoaderError> {
        let coordinate_tolerance = config
            .coordinate_tolerance
            .unwrap_or(DEFAULT_COORDINATE_TOLERANCE);
        if !coordinate_tolerance.is_finite() || coordinate_tolerance < 0.0 {
            return Err(LoaderError::ConfigParse(format!(
                "coordinate_tolerance must be a non-negative number of degrees, got {coordinate_tolerance}"
            )));
        }

        let unit_conversions_required = config.unit_conversions.is_some();
        Ok(ResolvedConfig {
            unit_conversions: Utf8PathBuf::from(
                config
                    .unit_conversions
                    .unwrap_or_else(|| DEFAULT_UNIT_CONVERSIONS.to_string()),
            ),
            unit_conversions_required,
            output_dir: Utf8PathBuf::from(
                config
                    .output_dir
                    .unwrap_or_else(|| DEFAULT_OUTPUT_DIR.to_string()),
            ),
            coordinate_tolerance,
        })
    }
}
