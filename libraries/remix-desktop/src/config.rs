//! Desktop binding configuration

use crate::error::{DesktopError, Result};
use serde::{Deserialize, Serialize};

/// Render and timing hints for the native binding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DesktopConfig {
    /// Output sample rate used until a device reports its own
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,

    /// Frames rendered per block when driving the graph manually
    #[serde(default = "default_block_frames")]
    pub block_frames: usize,

    /// Media time between time-update notifications (milliseconds)
    #[serde(default = "default_time_update_ms")]
    pub time_update_ms: u64,
}

fn default_sample_rate() -> u32 {
    48000
}

fn default_block_frames() -> usize {
    512
}

fn default_time_update_ms() -> u64 {
    250
}

impl Default for DesktopConfig {
    fn default() -> Self {
        Self {
            sample_rate: default_sample_rate(),
            block_frames: default_block_frames(),
            time_update_ms: default_time_update_ms(),
        }
    }
}

impl DesktopConfig {
    pub fn validate(&self) -> Result<()> {
        if self.sample_rate == 0 {
            return Err(DesktopError::Config("sample_rate must be positive".to_string()));
        }
        if self.block_frames == 0 {
            return Err(DesktopError::Config("block_frames must be positive".to_string()));
        }
        if self.time_update_ms == 0 {
            return Err(DesktopError::Config("time_update_ms must be positive".to_string()));
        }
        Ok(())
    }

    /// Output frames between time updates at `sample_rate`
    pub(crate) fn time_update_frames(&self, sample_rate: u32) -> usize {
        ((sample_rate as u64 * self.time_update_ms) / 1000).max(1) as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = DesktopConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.time_update_frames(48000), 12000);
    }

    #[test]
    fn partial_json_uses_defaults() {
        let config: DesktopConfig = serde_json::from_str(r#"{"block_frames": 128}"#).unwrap();
        assert_eq!(config.block_frames, 128);
        assert_eq!(config.sample_rate, 48000);
    }

    #[test]
    fn zero_block_is_rejected() {
        let config = DesktopConfig {
            block_frames: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(DesktopError::Config(_))));
    }
}
