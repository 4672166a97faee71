//! Engine configuration

use crate::error::{EngineError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Engine configuration
///
/// Every field has a default, so an empty file or no file at all is valid.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub rates: RateSettings,

    #[serde(default)]
    pub pitch: PitchSettings,

    #[serde(default)]
    pub export: ExportSettings,
}

/// Rate control settings
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct RateSettings {
    /// Start with speed and pitch locked together (default: true)
    #[serde(default = "default_locked")]
    pub locked_by_default: bool,

    /// Initial speed ratio (default: 1.0)
    #[serde(default = "default_ratio")]
    pub default_speed: f64,

    /// Initial pitch ratio (default: 1.0)
    #[serde(default = "default_ratio")]
    pub default_pitch: f64,

    /// Lower bound of the rate sliders, a UI hint (default: 0.5)
    #[serde(default = "default_min_ratio")]
    pub min_ratio: f64,

    /// Upper bound of the rate sliders, a UI hint (default: 2.0)
    #[serde(default = "default_max_ratio")]
    pub max_ratio: f64,
}

/// Pitch-shift node settings
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct PitchSettings {
    /// Analysis window of the pitch shifter in seconds (default: 0.1)
    #[serde(default = "default_window_size")]
    pub window_size_secs: f64,
}

/// Export settings
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ExportSettings {
    /// MIME type requested from the recorder (default: `audio/webm`)
    #[serde(default = "default_mime_type")]
    pub mime_type: String,

    /// Extension used when the recorder's MIME type is not recognised (default: `webm`)
    #[serde(default = "default_extension")]
    pub fallback_extension: String,

    /// Appended to the source basename (default: `remix`)
    #[serde(default = "default_suffix")]
    pub suffix: String,

    /// Basename used when the source name is empty (default: `output`)
    #[serde(default = "default_basename")]
    pub fallback_basename: String,

    /// Label attached to the downloadable artifact
    #[serde(default = "default_download_label")]
    pub download_label: String,
}

impl EngineConfig {
    /// Load configuration from `remix.toml` (if present) and `REMIX_*` environment variables
    pub fn load() -> Result<Self> {
        Self::load_from(Path::new("remix.toml"))
    }

    /// Load configuration from a specific file (if present) and `REMIX_*` environment variables
    pub fn load_from(path: &Path) -> Result<Self> {
        let mut settings = config::Config::builder();

        if path.exists() {
            settings = settings.add_source(config::File::from(path));
        }

        // REMIX_EXPORT__SUFFIX=mix -> export.suffix
        settings = settings.add_source(
            config::Environment::with_prefix("REMIX")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config = settings
            .build()
            .map_err(|e| EngineError::Config(e.to_string()))?;

        let loaded: Self = config
            .try_deserialize()
            .map_err(|e| EngineError::Config(e.to_string()))?;

        loaded.validate()?;
        Ok(loaded)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        let positive = |v: f64| v.is_finite() && v > 0.0;

        if !positive(self.pitch.window_size_secs) {
            return Err(EngineError::Config(format!(
                "pitch.window_size_secs must be positive, got {}",
                self.pitch.window_size_secs
            )));
        }

        for (name, value) in [
            ("rates.default_speed", self.rates.default_speed),
            ("rates.default_pitch", self.rates.default_pitch),
            ("rates.min_ratio", self.rates.min_ratio),
            ("rates.max_ratio", self.rates.max_ratio),
        ] {
            if !positive(value) {
                return Err(EngineError::Config(format!(
                    "{name} must be positive, got {value}"
                )));
            }
        }

        if self.rates.min_ratio > self.rates.max_ratio {
            return Err(EngineError::Config(format!(
                "rates.min_ratio ({}) exceeds rates.max_ratio ({})",
                self.rates.min_ratio, self.rates.max_ratio
            )));
        }

        if self.export.fallback_extension.is_empty() {
            return Err(EngineError::Config(
                "export.fallback_extension must not be empty".to_string(),
            ));
        }

        Ok(())
    }
}

impl Default for RateSettings {
    fn default() -> Self {
        Self {
            locked_by_default: default_locked(),
            default_speed: default_ratio(),
            default_pitch: default_ratio(),
            min_ratio: default_min_ratio(),
            max_ratio: default_max_ratio(),
        }
    }
}

impl Default for PitchSettings {
    fn default() -> Self {
        Self {
            window_size_secs: default_window_size(),
        }
    }
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            mime_type: default_mime_type(),
            fallback_extension: default_extension(),
            suffix: default_suffix(),
            fallback_basename: default_basename(),
            download_label: default_download_label(),
        }
    }
}

// Default values
fn default_locked() -> bool {
    true
}

fn default_ratio() -> f64 {
    1.0
}

fn default_min_ratio() -> f64 {
    0.5
}

fn default_max_ratio() -> f64 {
    2.0
}

fn default_window_size() -> f64 {
    0.1
}

fn default_mime_type() -> String {
    "audio/webm".to_string()
}

fn default_extension() -> String {
    "webm".to_string()
}

fn default_suffix() -> String {
    "remix".to_string()
}

fn default_basename() -> String {
    "output".to_string()
}

fn default_download_label() -> String {
    "Download remixed file".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn default_config() {
        let config = EngineConfig::default();
        assert!(config.rates.locked_by_default);
        assert_eq!(config.rates.default_speed, 1.0);
        assert_eq!(config.pitch.window_size_secs, 0.1);
        assert_eq!(config.export.suffix, "remix");
        assert_eq!(config.export.fallback_extension, "webm");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_non_positive_window() {
        let mut config = EngineConfig::default();
        config.pitch.window_size_secs = 0.0;
        assert!(matches!(config.validate(), Err(EngineError::Config(_))));
    }

    #[test]
    fn rejects_inverted_slider_range() {
        let mut config = EngineConfig::default();
        config.rates.min_ratio = 3.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn load_partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("remix.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "[export]\nsuffix = \"mix\"\n\n[rates]\nlocked_by_default = false").unwrap();

        let config = EngineConfig::load_from(&path).unwrap();
        assert_eq!(config.export.suffix, "mix");
        assert_eq!(config.export.fallback_basename, "output");
        assert!(!config.rates.locked_by_default);
        assert_eq!(config.pitch.window_size_secs, 0.1);
    }

    #[test]
    fn load_missing_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = EngineConfig::load_from(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.export.suffix, "remix");
    }
}
