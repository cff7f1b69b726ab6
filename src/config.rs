//! Configuration to acknowledge developer preferences as well as set defaults.
//!
//! We look for a linemark.toml in the working directory, and if present load settings from
//! there. This provides the save delay, the repository polling interval and the store location.

use facet::Facet;
use std::fs;
use std::path::Path;
use std::time::Duration;

/// File name looked up in the working directory.
pub const CONFIG_FILE: &str = "linemark.toml";

#[derive(Facet, Clone)]
/// User preferences loaded from linemark.toml or falling back to defaults.
pub struct Config {
    #[facet(default = 1000)]
    /// Milliseconds between a correcting pass and the save it triggers.
    pub save_delay_ms: u64,
    #[facet(default = 500)]
    /// Milliseconds between repository polls in watch mode.
    pub poll_interval_ms: u64,
    #[facet(default = ".linemark/bookmarks.json".to_string())]
    /// JSON file the bookmark tree is stored in.
    pub store_path: String,
}

impl Config {
    #[must_use]
    /// Load configuration from linemark.toml if present.
    ///
    /// # Panics
    ///
    /// Panics if the default configuration cannot be parsed.
    pub fn load() -> Self {
        Self::load_from(Path::new(CONFIG_FILE))
    }

    #[must_use]
    /// Load configuration from `path`, using defaults if it is missing or malformed.
    ///
    /// # Panics
    ///
    /// Panics if the default configuration cannot be parsed.
    pub fn load_from(path: &Path) -> Self {
        if let Ok(contents) = fs::read_to_string(path) {
            if let Ok(config) = facet_toml::from_str::<Self>(&contents) {
                return config;
            }
            tracing::warn!(
                target: "linemark.config",
                path = %path.display(),
                "ignoring malformed configuration"
            );
        }
        facet_toml::from_str::<Self>("").unwrap()
    }

    #[must_use]
    /// Save delay as a duration.
    pub fn save_delay(&self) -> Duration {
        Duration::from_millis(self.save_delay_ms)
    }

    #[must_use]
    /// Poll interval as a duration.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

#[cfg(test)]
#[path = "tests/config.rs"]
mod tests;
