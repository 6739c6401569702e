//! Settings bag
//!
//! Loaded from a JSON file. Every key is optional; unknown keys are ignored.

use super::network::DEFAULT_PROVIDER_MARKERS;
use crate::utils::ConfigError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Recognised station settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Metadata poll interval in milliseconds
    pub metadata_poll_ms: u64,

    /// Network/live caching handed to the player, in milliseconds
    pub network_cache_ms: u64,

    /// Try passthrough copy before re-encoding
    pub prefer_stream_copy: bool,

    /// Ask the transcoder for low-latency decoding
    pub low_latency_mode: bool,

    /// Recording directory, relative paths resolve against the app root
    pub output_dir: String,

    /// Container extension of recordings
    pub record_container_ext: String,

    /// Configured transcoder executable
    pub ffmpeg_path: String,

    /// Channel selected on start
    pub default_channel: Option<String>,

    /// URL markers of sources whose passthrough copy is unplayable
    pub force_reencode_markers: Vec<String>,

    /// URL markers of sources that need a browser-like User-Agent
    pub user_agent_markers: Vec<String>,

    /// Application root used to resolve relative paths
    #[serde(skip)]
    pub app_root: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        let markers: Vec<String> = DEFAULT_PROVIDER_MARKERS.iter().map(|m| m.to_string()).collect();
        Self {
            metadata_poll_ms: 1000,
            network_cache_ms: 1500,
            prefer_stream_copy: true,
            low_latency_mode: true,
            output_dir: "recordings".to_string(),
            record_container_ext: "aac".to_string(),
            ffmpeg_path: "ffmpeg".to_string(),
            default_channel: None,
            force_reencode_markers: markers.clone(),
            user_agent_markers: markers,
            app_root: app_root_or_empty(std::env::current_dir()),
        }
    }
}

impl Settings {
    /// Load settings from a JSON file
    ///
    /// The application root becomes the directory holding the file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        let mut settings: Settings = serde_json::from_str(&content)?;
        if let Some(parent) = path.parent() {
            settings.app_root = parent.to_path_buf();
        }
        settings.validate()?;

        tracing::debug!("Loaded settings from {:?}", path);
        Ok(settings)
    }

    /// Load settings, falling back to defaults when the file is unusable
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(settings) => settings,
            Err(e) => {
                tracing::warn!("Settings load failed ({}), using defaults", e);
                Self::default()
            }
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.metadata_poll_ms == 0 {
            return Err(ConfigError::Invalid("metadata_poll_ms must be positive".to_string()));
        }
        if self.record_container_ext.trim().is_empty() {
            return Err(ConfigError::Invalid("record_container_ext is empty".to_string()));
        }
        Ok(())
    }

    /// Metadata poll interval
    pub fn metadata_poll_interval(&self) -> Duration {
        Duration::from_millis(self.metadata_poll_ms.max(1))
    }

    /// Absolute recording directory
    pub fn resolved_output_dir(&self) -> PathBuf {
        let dir = Path::new(&self.output_dir);
        if dir.is_absolute() {
            dir.to_path_buf()
        } else {
            self.app_root.join(dir)
        }
    }

    /// Container extension without a leading dot
    pub fn container_ext(&self) -> &str {
        self.record_container_ext.trim().trim_start_matches('.')
    }
}

/// Working directory as the default application root
fn app_root_or_empty(current_dir: std::io::Result<PathBuf>) -> PathBuf {
    current_dir.unwrap_or_else(|e| {
        tracing::warn!(
            "Cannot read the working directory ({}); relative paths resolve against \"\"",
            e
        );
        PathBuf::new()
    })
}
