//! Configuration - vault layout and timeline settings, read from
//! `overlay.toml`.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Default configuration file name looked up in the vault root.
pub const CONFIG_FILE_NAME: &str = "overlay.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config `{}`: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Settings of the generated timeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TimelineConfig {
    /// Timeline document name inside each campaign directory.
    pub document: String,
    /// Append-only event store name inside each campaign directory.
    pub event_log: String,
    /// Line opening the generated region.
    pub begin_marker: String,
    /// Line closing the generated region.
    pub end_marker: String,
}

impl Default for TimelineConfig {
    fn default() -> Self {
        Self {
            document: "_events.md".to_string(),
            event_log: "_events.jsonl".to_string(),
            begin_marker: "<!-- timeline:begin -->".to_string(),
            end_marker: "<!-- timeline:end -->".to_string(),
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Directory holding canon pages.
    pub canon_root: PathBuf,
    /// Directory holding one subdirectory per campaign.
    pub campaigns_root: PathBuf,
    /// Default log filter when `RUST_LOG` is unset.
    pub log_level: String,
    pub timeline: TimelineConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            canon_root: PathBuf::from("canon"),
            campaigns_root: PathBuf::from("campaigns"),
            log_level: "info".to_string(),
            timeline: TimelineConfig::default(),
        }
    }
}

impl Config {
    /// Parse configuration text and validate it.
    pub fn from_toml_str(text: &str) -> ConfigResult<Self> {
        let config: Config = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read a config file; relative roots resolve against its directory.
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let base = path.parent().unwrap_or_else(|| Path::new(""));
        Ok(Self::from_toml_str(&text)?.rooted_at(base))
    }

    /// Use `root/overlay.toml` when it exists, defaults otherwise, with
    /// relative roots resolved against `root`.
    pub fn discover(root: impl AsRef<Path>) -> ConfigResult<Self> {
        let root = root.as_ref();
        let candidate = root.join(CONFIG_FILE_NAME);
        if candidate.is_file() {
            Self::load(candidate)
        } else {
            Ok(Self::default().rooted_at(root))
        }
    }

    /// Resolve relative roots against `base`. Absolute roots are kept.
    pub fn rooted_at(mut self, base: &Path) -> Self {
        if self.canon_root.is_relative() {
            self.canon_root = base.join(&self.canon_root);
        }
        if self.campaigns_root.is_relative() {
            self.campaigns_root = base.join(&self.campaigns_root);
        }
        self
    }

    fn validate(&self) -> ConfigResult<()> {
        let t = &self.timeline;
        for (name, value) in [("timeline.document", &t.document), ("timeline.event_log", &t.event_log)] {
            if !is_plain_file_name(value) {
                return Err(ConfigError::Invalid(format!(
                    "`{name}` must be a plain file name, got `{value}`"
                )));
            }
            // Overlays are every `.md` file not starting with `_`; the
            // generated files must never be picked up as overlays.
            if value.ends_with(".md") && !value.starts_with('_') {
                return Err(ConfigError::Invalid(format!(
                    "`{name}` must start with `_` to stay out of overlay scans, got `{value}`"
                )));
            }
        }
        if t.document == t.event_log {
            return Err(ConfigError::Invalid(
                "`timeline.document` and `timeline.event_log` must differ".to_string(),
            ));
        }
        if t.begin_marker.trim().is_empty() || t.end_marker.trim().is_empty() {
            return Err(ConfigError::Invalid("timeline markers must not be empty".to_string()));
        }
        if t.begin_marker.contains('\n') || t.end_marker.contains('\n') {
            return Err(ConfigError::Invalid("timeline markers must be single lines".to_string()));
        }
        if t.begin_marker == t.end_marker
            || t.begin_marker.contains(t.end_marker.as_str())
            || t.end_marker.contains(t.begin_marker.as_str())
        {
            return Err(ConfigError::Invalid(
                "timeline begin and end markers must be distinct".to_string(),
            ));
        }
        Ok(())
    }
}

fn is_plain_file_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\'])
}
