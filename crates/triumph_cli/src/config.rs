//! Gate configuration file handling
//!
//! `gate.toml` selects a timing preset and may override either mode's
//! timeline wholesale:
//!
//! ```toml
//! [gate]
//! preset = "optimized"
//! frame_rate = 120
//!
//! [gate.minimal]
//! peak_ms = 150
//! reveal_ms = 300
//! complete_ms = 800
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use triumph_gate::{FullTimeline, MinimalTimeline, Preset, TimingProfiles, DEFAULT_FRAME_RATE};

/// Name of the config file looked up in the working directory
pub const CONFIG_FILE_NAME: &str = "gate.toml";

/// Top-level `gate.toml`
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct GateFile {
    #[serde(default)]
    pub gate: GateConfig,
}

/// The `[gate]` table
#[derive(Debug, Deserialize, Serialize)]
pub struct GateConfig {
    /// Base timing table
    #[serde(default)]
    pub preset: Preset,
    /// Runtime tick rate for `play`
    #[serde(default = "default_frame_rate")]
    pub frame_rate: u32,
    /// Replaces the preset's full timeline
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full: Option<FullTimeline>,
    /// Replaces the preset's minimal timeline
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minimal: Option<MinimalTimeline>,
}

fn default_frame_rate() -> u32 {
    DEFAULT_FRAME_RATE
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            preset: Preset::default(),
            frame_rate: default_frame_rate(),
            full: None,
            minimal: None,
        }
    }
}

impl GateConfig {
    /// Resolve the timing table: preset first, then overrides, then validation
    pub fn profiles(&self) -> Result<TimingProfiles> {
        let base = TimingProfiles::preset(self.preset);
        let full = self.full.unwrap_or(base.full);
        let minimal = self.minimal.unwrap_or(base.minimal);

        TimingProfiles::new(full, minimal).context("Invalid timing table in [gate]")
    }
}

impl GateFile {
    /// Load and parse a config file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;

        Self::parse(&content).with_context(|| format!("Failed to parse {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Load `path` if given, else `gate.toml` in the working directory, else defaults
    pub fn resolve(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::load(path);
        }

        let local = Path::new(CONFIG_FILE_NAME);
        if local.exists() {
            tracing::debug!("Using {}", local.display());
            return Self::load(local);
        }

        Ok(Self::default())
    }

    /// Serialize to TOML string
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize gate config")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_uses_defaults() {
        let file = GateFile::parse("").unwrap();
        assert_eq!(file.gate.preset, Preset::Optimized);
        assert_eq!(file.gate.frame_rate, DEFAULT_FRAME_RATE);
        assert_eq!(file.gate.profiles().unwrap(), TimingProfiles::optimized());
    }

    #[test]
    fn test_preset_selection() {
        let file = GateFile::parse("[gate]\npreset = \"ceremonial\"\n").unwrap();
        assert_eq!(file.gate.profiles().unwrap(), TimingProfiles::ceremonial());
    }

    #[test]
    fn test_minimal_override() {
        let file = GateFile::parse(
            r#"
[gate]
frame_rate = 60

[gate.minimal]
peak_ms = 150
reveal_ms = 300
complete_ms = 800
"#,
        )
        .unwrap();

        let profiles = file.gate.profiles().unwrap();
        assert_eq!(file.gate.frame_rate, 60);
        assert_eq!(profiles.full, TimingProfiles::optimized().full);
        assert_eq!(profiles.minimal.complete_ms, 800);
    }

    #[test]
    fn test_invalid_table_is_rejected() {
        let file = GateFile::parse(
            r#"
[gate.full]
peak_ms = 800
logo_ms = 700
thread_ms = 1400
reveal_ms = 1800
complete_ms = 3400
"#,
        )
        .unwrap();

        let err = file.gate.profiles().unwrap_err();
        assert!(format!("{:#}", err).contains("logo"));
    }

    #[test]
    fn test_unknown_preset_fails_to_parse() {
        assert!(GateFile::parse("[gate]\npreset = \"glacial\"\n").is_err());
    }

    #[test]
    fn test_incomplete_override_fails_to_parse() {
        assert!(GateFile::parse("[gate.minimal]\npeak_ms = 100\n").is_err());
    }

    #[test]
    fn test_example_file_is_valid() {
        let file = GateFile::parse(include_str!("../gate.example.toml")).unwrap();
        assert_eq!(file.gate.profiles().unwrap(), TimingProfiles::optimized());
    }

    #[test]
    fn test_round_trip() {
        let mut file = GateFile::default();
        file.gate.minimal = Some(TimingProfiles::ceremonial().minimal);

        let text = file.to_toml().unwrap();
        let parsed = GateFile::parse(&text).unwrap();
        assert_eq!(parsed.gate.minimal, file.gate.minimal);
        assert_eq!(parsed.gate.full, None);
    }
}
