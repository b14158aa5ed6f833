// src/config.rs
//! Runtime configuration for the material core.
//!
//! Replaces the engine's compile-time switches (sketch support, material
//! editing, leak tracing) and the streaming console variables with plain
//! fields so tools and tests can flip them per instance.

use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

// ---------- Config ----------
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MaterialConfig {
    /// Sketch and texel-density debug views may swap shaders.
    pub support_material_sketch: bool,
    /// User data and material link names are retained.
    pub support_material_editing: bool,
    /// Record the loading call stack on every new material.
    pub trace_material_leaks: bool,
    /// Running inside an editor; enables sector invalidation on flag changes.
    pub editing: bool,
    /// Distances below this are clamped up unless the object is drawn near.
    pub stream_prediction_min_report_distance: f32,
    /// Scale mip factors by each chunk's texel area density.
    pub stream_prediction_texel_density: bool,
    /// Ask the backend to precache synchronously.
    pub shaders_sync_load: bool,
    /// Project folder stripped by material name unification.
    pub game_folder: String,
}

impl Default for MaterialConfig {
    fn default() -> Self {
        Self {
            support_material_sketch: true,
            support_material_editing: true,
            trace_material_leaks: false,
            editing: false,
            stream_prediction_min_report_distance: 0.75,
            stream_prediction_texel_density: true,
            shaders_sync_load: false,
            game_folder: "SamplesProject".to_string(),
        }
    }
}

impl MaterialConfig {
    /// Parse from JSON; missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let cfg: Self = serde_json::from_str(json)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Read and parse a JSON config file.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading material config {}", path.display()))?;
        let cfg = Self::from_json_str(&text)
            .with_context(|| format!("parsing material config {}", path.display()))?;
        log::info!("Loaded material config from {}", path.display());
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        let d = self.stream_prediction_min_report_distance;
        if !d.is_finite() || d < 0.0 {
            return Err(Error::InvalidConfig(format!(
                "stream_prediction_min_report_distance must be a non-negative finite number, got {}",
                d
            )));
        }
        Ok(())
    }
}
