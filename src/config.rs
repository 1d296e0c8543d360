use crate::fit::{FitTuning, AUTO_MIN_RADIUS_NM, AUTO_PADDING_NM};
use crate::map::StyleOptions;
use crate::pipeline::default_workers;
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Thumbnail settings; every field has a default so partial files load
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThumbnailConfig {
    pub tile_width: u32,
    pub tile_height: u32,
    /// GeoJSON coastline polygons; without one every map is a placeholder
    pub coastline: Option<PathBuf>,
    /// Render slots; defaults to half the processing units, at least two
    pub workers: Option<usize>,
    /// Auto-fit used for the default (non-hover) scenario tile
    pub auto_min_radius_nm: f64,
    pub auto_padding_nm: f64,
    pub style: StyleOptions,
    pub tuning: FitTuning,
}

impl Default for ThumbnailConfig {
    fn default() -> Self {
        Self {
            tile_width: 220,
            tile_height: 124,
            coastline: None,
            workers: None,
            auto_min_radius_nm: AUTO_MIN_RADIUS_NM,
            auto_padding_nm: AUTO_PADDING_NM,
            style: StyleOptions::default(),
            tuning: FitTuning::default(),
        }
    }
}

impl ThumbnailConfig {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        if config.tile_width == 0 || config.tile_height == 0 {
            bail!("tile size must be non-zero, got {}x{}", config.tile_width, config.tile_height);
        }
        Ok(config)
    }

    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let content =
            fs::read_to_string(path).with_context(|| format!("cannot read config {}", path.display()))?;
        Self::from_toml_str(&content).with_context(|| format!("invalid config {}", path.display()))
    }

    pub fn workers(&self) -> usize {
        self.workers.filter(|&n| n > 0).unwrap_or_else(default_workers)
    }
}
