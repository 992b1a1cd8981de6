//! Curriculum configuration.
//!
//! Two settings have no defensible default and must be supplied by the
//! operator: whether meaning collisions compare case-sensitively, and the
//! width of the recency window. The first is required at load time; the
//! second only when a recent-frontier query asks for it.
//!
//! ```toml
//! [collision]
//! case_sensitive = false
//!
//! [frontier]
//! recent_window = 10
//!
//! [tiling]
//! mode = "spaced"
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config: {path}: {source}")]
    ReadFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config toml at {path}: {source}")]
    ParseToml {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("recent window is not configured; set [frontier] recent_window or pass a window")]
    MissingRecentWindow,

    #[error("recent window must be at least 1 sentence")]
    ZeroRecentWindow,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CurriculumConfig {
    pub collision: CollisionConfig,
    #[serde(default)]
    pub frontier: FrontierConfig,
    #[serde(default)]
    pub tiling: TilingConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CollisionConfig {
    pub case_sensitive: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FrontierConfig {
    #[serde(default)]
    pub recent_window: Option<u32>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TilingConfig {
    #[serde(default)]
    pub mode: TilingMode,
}

/// How occurrence texts are joined before comparison with the sentence.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TilingMode {
    /// Join with a single space; for space-delimited scripts.
    #[default]
    Spaced,
    /// Join with nothing and compare with all spaces removed.
    Unspaced,
}

impl CurriculumConfig {
    pub fn new(case_sensitive: bool) -> Self {
        Self {
            collision: CollisionConfig { case_sensitive },
            frontier: FrontierConfig::default(),
            tiling: TilingConfig::default(),
        }
    }

    pub fn with_recent_window(mut self, window: u32) -> Self {
        self.frontier.recent_window = Some(window);
        self
    }

    pub fn with_tiling_mode(mut self, mode: TilingMode) -> Self {
        self.tiling.mode = mode;
        self
    }

    pub fn from_toml_str(text: &str, origin: &str) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|source| ConfigError::ParseToml {
            path: origin.to_string(),
            source,
        })
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFile {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&text, &path.display().to_string())
    }

    /// Resolve the recency window, letting an explicit request win over the
    /// configured value.
    pub fn recent_window(&self, requested: Option<u32>) -> Result<u32, ConfigError> {
        let window = requested
            .or(self.frontier.recent_window)
            .ok_or(ConfigError::MissingRecentWindow)?;
        if window == 0 {
            return Err(ConfigError::ZeroRecentWindow);
        }
        Ok(window)
    }
}
