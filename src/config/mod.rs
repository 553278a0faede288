//! Application configuration
//!
//! Scanner settings, OCR profile, cloud fallback and the region table,
//! stored in TOML format.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::cloud::CloudConfig;
use crate::region::RegionDescriptor;
use crate::scan::ScanSettings;
use crate::vision::OcrProfile;

/// Top-level settings file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Orchestrator tuning
    pub scan: ScanSettings,
    /// Recognizer tuning profile (applied at engine initialization)
    pub ocr: OcrProfile,
    /// Cloud vision fallback
    pub cloud: CloudConfig,
    /// Display regions to recognize, in fractional frame coordinates
    pub regions: Vec<RegionDescriptor>,
}

impl AppConfig {
    /// Regions used when the config file does not define any: a tight crop
    /// around a centered display and a wider variant that tolerates camera
    /// framing drift.
    pub fn default_regions() -> Vec<RegionDescriptor> {
        vec![
            RegionDescriptor {
                name: "counter-main".to_string(),
                x: 0.25,
                y: 0.35,
                width: 0.5,
                height: 0.3,
            },
            RegionDescriptor {
                name: "counter-wide".to_string(),
                x: 0.15,
                y: 0.3,
                width: 0.7,
                height: 0.4,
            },
        ]
    }

    /// Effective region table: configured regions, or the defaults.
    pub fn regions(&self) -> Vec<RegionDescriptor> {
        if self.regions.is_empty() {
            Self::default_regions()
        } else {
            self.regions.clone()
        }
    }
}

/// Default location of the settings file in the platform config dir.
pub fn default_config_path() -> Option<std::path::PathBuf> {
    directories::ProjectDirs::from("", "", "meterscan")
        .map(|dirs| dirs.config_dir().join("config.toml"))
}

/// Load configuration from file
pub fn load_config(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path)?;
    let config: AppConfig = toml::from_str(&content)?;
    Ok(config)
}

/// Save configuration to file
pub fn save_config(config: &AppConfig, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content)?;
    Ok(())
}
