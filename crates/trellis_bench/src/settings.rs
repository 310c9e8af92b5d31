// SPDX-License-Identifier: MIT OR Apache-2.0
//! Bench settings stored as RON.

use serde::{Deserialize, Serialize};
use std::path::Path;
use trellis_slab::{FieldDesc, FieldType};

/// Current settings format version
pub const SETTINGS_FORMAT_VERSION: u32 = 1;

/// Allocation churn parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChurnSettings {
    /// Blocks allocated before releasing starts
    pub blocks: usize,
    /// Smallest block size in records
    pub min_block: usize,
    /// Largest block size in records
    pub max_block: usize,
    /// Records allocated up front
    pub initial_capacity: usize,
    /// Share of the blocks released, in random order
    pub release_fraction: f32,
    /// Seed for block sizes and release order
    pub seed: u64,
}

impl Default for ChurnSettings {
    fn default() -> Self {
        Self {
            blocks: 20_000,
            min_block: 1,
            max_block: 16,
            initial_capacity: 1024,
            release_fraction: 0.5,
            seed: 0x5EED,
        }
    }
}

/// Demo pipeline parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DemoSettings {
    /// Quads generated by the graph
    pub shapes: usize,
    /// Frames rendered before one quad is removed
    pub frames: usize,
    /// Horizontal distance between quads
    pub spacing: f32,
    /// Records allocated up front in each slab
    pub initial_capacity: usize,
    /// Vertex record layout; needs `position` and `color` as 4 x f32
    pub vertex_fields: Vec<FieldDesc>,
}

impl Default for DemoSettings {
    fn default() -> Self {
        Self {
            shapes: 8,
            frames: 4,
            spacing: 1.5,
            initial_capacity: 16,
            vertex_fields: vec![
                FieldDesc::new("position", FieldType::F32, 4),
                FieldDesc::new("color", FieldType::F32, 4),
            ],
        }
    }
}

/// Complete bench settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchSettings {
    /// Settings format version
    pub version: u32,
    /// Churn benchmark
    #[serde(default)]
    pub churn: ChurnSettings,
    /// Demo pipeline
    #[serde(default)]
    pub demo: DemoSettings,
}

impl Default for BenchSettings {
    fn default() -> Self {
        Self {
            version: SETTINGS_FORMAT_VERSION,
            churn: ChurnSettings::default(),
            demo: DemoSettings::default(),
        }
    }
}

impl BenchSettings {
    /// Load settings from a file
    pub fn load(path: &Path) -> std::io::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let settings: BenchSettings = ron::from_str(&content).map_err(|e| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())
        })?;

        // Version check
        if settings.version > SETTINGS_FORMAT_VERSION {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!(
                    "Settings version {} is newer than supported version {}",
                    settings.version, SETTINGS_FORMAT_VERSION
                ),
            ));
        }

        Ok(settings)
    }

    /// Save settings to a file
    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        let config = ron::ser::PrettyConfig::default()
            .struct_names(true)
            .enumerate_arrays(false);

        let content = ron::ser::to_string_pretty(self, config).map_err(|e| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())
        })?;

        std::fs::write(path, content)
    }

    /// Load settings from `path`, writing the defaults there first if the file is missing
    pub fn load_or_create(path: &Path) -> std::io::Result<Self> {
        if path.exists() {
            return Self::load(path);
        }
        let settings = Self::default();
        settings.save(path)?;
        tracing::info!("Wrote default settings to {}", path.display());
        Ok(settings)
    }
}
