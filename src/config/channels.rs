//! Channel list
//!
//! An ordered, read-only list of stations keyed by name.

use crate::utils::ConfigError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// A station the user can tune to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    /// Unique display name
    pub name: String,

    /// Stream URL
    #[serde(default)]
    pub url: String,

    /// Name of the metadata fallback provider, if the stream lacks tags
    #[serde(default)]
    pub meta_provider: Option<String>,

    /// Page queried by the fallback provider
    #[serde(default)]
    pub meta_url: Option<String>,
}

impl Channel {
    /// Create a channel without a metadata fallback
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            meta_provider: None,
            meta_url: None,
        }
    }

    /// Stream URL, or None when the channel has none configured
    pub fn stream_url(&self) -> Option<&str> {
        let url = self.url.trim();
        (!url.is_empty()).then_some(url)
    }
}

/// On-disk shape of the channel file
#[derive(Debug, Default, Serialize, Deserialize)]
struct ChannelFile {
    #[serde(default)]
    channels: Vec<Channel>,
}

/// Ordered name → channel lookup
#[derive(Debug, Clone, Default)]
pub struct ChannelRegistry {
    channels: Vec<Channel>,
}

impl ChannelRegistry {
    /// Build a registry, dropping later duplicates of a name
    pub fn new(channels: Vec<Channel>) -> Self {
        let mut unique: Vec<Channel> = Vec::with_capacity(channels.len());
        for channel in channels {
            if unique.iter().any(|c| c.name == channel.name) {
                tracing::warn!("Duplicate channel '{}' ignored", channel.name);
                continue;
            }
            unique.push(channel);
        }
        Self { channels: unique }
    }

    /// Load the channel list from a JSON file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        let file: ChannelFile = serde_json::from_str(&content)?;
        tracing::debug!("Loaded {} channels from {:?}", file.channels.len(), path);
        Ok(Self::new(file.channels))
    }

    /// Look a channel up by name
    pub fn get(&self, name: &str) -> Option<&Channel> {
        self.channels.iter().find(|c| c.name == name)
    }

    /// First channel in list order
    pub fn first(&self) -> Option<&Channel> {
        self.channels.first()
    }

    /// All channels in list order
    pub fn iter(&self) -> impl Iterator<Item = &Channel> {
        self.channels.iter()
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }
}
