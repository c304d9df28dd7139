//! Timing profiles
//!
//! Each gate mode has one timeline: an ordered list of (stage, offset) marks
//! measured from cycle start, ending with the completion offset. The table is
//! immutable once built and is looked up by mode; there is no global timing
//! state.
//!
//! The per-mode timeline types fix the stage set structurally: a full
//! timeline always carries `logo` and `thread`, a minimal one never does.

use crate::stage::{AnimationStage, GateMode};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::str::FromStr;
use thiserror::Error;

/// Timing validation errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProfileError {
    /// A stage does not fire strictly after the one before it
    #[error("{mode} timeline: {stage} at {at_ms}ms must come after {previous}ms")]
    NotIncreasing {
        mode: GateMode,
        stage: AnimationStage,
        at_ms: u32,
        previous: u32,
    },

    /// A minimal delay is not shorter than the matching full delay
    #[error("minimal {stage} at {minimal_ms}ms must be shorter than full {stage} at {full_ms}ms")]
    MinimalNotShorter {
        stage: AnimationStage,
        minimal_ms: u32,
        full_ms: u32,
    },

    /// Preset name not recognised
    #[error("Unknown preset '{0}'. Valid presets: optimized, ceremonial")]
    UnknownPreset(String),
}

/// A stage and its offset from cycle start
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StageMark {
    pub stage: AnimationStage,
    pub offset_ms: u32,
}

impl StageMark {
    const fn new(stage: AnimationStage, offset_ms: u32) -> Self {
        Self { stage, offset_ms }
    }
}

/// Timeline of a full-mode cycle
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FullTimeline {
    pub peak_ms: u32,
    pub logo_ms: u32,
    pub thread_ms: u32,
    pub reveal_ms: u32,
    pub complete_ms: u32,
}

/// Timeline of a minimal-mode cycle
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MinimalTimeline {
    pub peak_ms: u32,
    pub reveal_ms: u32,
    pub complete_ms: u32,
}

/// Named built-in timing tables
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Preset {
    /// The fast timeline the site ships with
    #[default]
    Optimized,
    /// The slower launch timeline
    Ceremonial,
}

impl Preset {
    pub fn as_str(self) -> &'static str {
        match self {
            Preset::Optimized => "optimized",
            Preset::Ceremonial => "ceremonial",
        }
    }
}

impl FromStr for Preset {
    type Err = ProfileError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "optimized" => Ok(Preset::Optimized),
            "ceremonial" => Ok(Preset::Ceremonial),
            _ => Err(ProfileError::UnknownPreset(s.to_string())),
        }
    }
}

/// Timing table keyed by gate mode
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimingProfiles {
    pub full: FullTimeline,
    pub minimal: MinimalTimeline,
}

impl TimingProfiles {
    /// Build a validated table
    pub fn new(full: FullTimeline, minimal: MinimalTimeline) -> Result<Self, ProfileError> {
        let profiles = Self { full, minimal };
        profiles.validate()?;
        Ok(profiles)
    }

    pub fn optimized() -> Self {
        Self {
            full: FullTimeline {
                peak_ms: 800,
                logo_ms: 1200,
                thread_ms: 1400,
                reveal_ms: 1800,
                complete_ms: 3400,
            },
            minimal: MinimalTimeline {
                peak_ms: 200,
                reveal_ms: 400,
                complete_ms: 1000,
            },
        }
    }

    pub fn ceremonial() -> Self {
        Self {
            full: FullTimeline {
                peak_ms: 1200,
                logo_ms: 1800,
                thread_ms: 2200,
                reveal_ms: 2800,
                complete_ms: 5200,
            },
            minimal: MinimalTimeline {
                peak_ms: 400,
                reveal_ms: 800,
                complete_ms: 1800,
            },
        }
    }

    pub fn preset(preset: Preset) -> Self {
        match preset {
            Preset::Optimized => Self::optimized(),
            Preset::Ceremonial => Self::ceremonial(),
        }
    }

    /// Ordered marks for `mode`, starting with `ecg` at 0 and ending with `complete`
    pub fn timeline(&self, mode: GateMode) -> SmallVec<[StageMark; 6]> {
        use AnimationStage::*;

        let mut marks = SmallVec::new();
        marks.push(StageMark::new(Ecg, 0));
        match mode {
            GateMode::Full => {
                let t = &self.full;
                marks.push(StageMark::new(Peak, t.peak_ms));
                marks.push(StageMark::new(Logo, t.logo_ms));
                marks.push(StageMark::new(Thread, t.thread_ms));
                marks.push(StageMark::new(Reveal, t.reveal_ms));
                marks.push(StageMark::new(Complete, t.complete_ms));
            }
            GateMode::Minimal => {
                let t = &self.minimal;
                marks.push(StageMark::new(Peak, t.peak_ms));
                marks.push(StageMark::new(Reveal, t.reveal_ms));
                marks.push(StageMark::new(Complete, t.complete_ms));
            }
        }
        marks
    }

    /// Offset of the completion signal for `mode`
    pub fn complete_ms(&self, mode: GateMode) -> u32 {
        match mode {
            GateMode::Full => self.full.complete_ms,
            GateMode::Minimal => self.minimal.complete_ms,
        }
    }

    /// Check ordering within each mode and that minimal is the shorter pulse
    pub fn validate(&self) -> Result<(), ProfileError> {
        for mode in [GateMode::Full, GateMode::Minimal] {
            let marks = self.timeline(mode);
            for pair in marks.windows(2) {
                if pair[1].offset_ms <= pair[0].offset_ms {
                    return Err(ProfileError::NotIncreasing {
                        mode,
                        stage: pair[1].stage,
                        at_ms: pair[1].offset_ms,
                        previous: pair[0].offset_ms,
                    });
                }
            }
        }

        let shared = [
            (AnimationStage::Peak, self.minimal.peak_ms, self.full.peak_ms),
            (AnimationStage::Reveal, self.minimal.reveal_ms, self.full.reveal_ms),
            (
                AnimationStage::Complete,
                self.minimal.complete_ms,
                self.full.complete_ms,
            ),
        ];
        for (stage, minimal_ms, full_ms) in shared {
            if minimal_ms >= full_ms {
                return Err(ProfileError::MinimalNotShorter {
                    stage,
                    minimal_ms,
                    full_ms,
                });
            }
        }

        Ok(())
    }
}

impl Default for TimingProfiles {
    fn default() -> Self {
        Self::optimized()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets_validate() {
        assert!(TimingProfiles::optimized().validate().is_ok());
        assert!(TimingProfiles::ceremonial().validate().is_ok());
        assert_eq!(TimingProfiles::default(), TimingProfiles::optimized());
    }

    #[test]
    fn test_full_timeline_order() {
        let profiles = TimingProfiles::optimized();
        let marks = profiles.timeline(GateMode::Full);
        let stages: Vec<_> = marks.iter().map(|m| m.stage).collect();
        assert_eq!(
            stages,
            vec![
                AnimationStage::Ecg,
                AnimationStage::Peak,
                AnimationStage::Logo,
                AnimationStage::Thread,
                AnimationStage::Reveal,
                AnimationStage::Complete,
            ]
        );
        let offsets: Vec<_> = marks.iter().map(|m| m.offset_ms).collect();
        assert_eq!(offsets, vec![0, 800, 1200, 1400, 1800, 3400]);
    }

    #[test]
    fn test_minimal_timeline_order() {
        let profiles = TimingProfiles::optimized();
        let marks = profiles.timeline(GateMode::Minimal);
        let stages: Vec<_> = marks.iter().map(|m| m.stage).collect();
        assert_eq!(
            stages,
            vec![
                AnimationStage::Ecg,
                AnimationStage::Peak,
                AnimationStage::Reveal,
                AnimationStage::Complete,
            ]
        );
        assert_eq!(profiles.complete_ms(GateMode::Minimal), 1000);
    }

    #[test]
    fn test_offsets_strictly_increase() {
        for preset in [Preset::Optimized, Preset::Ceremonial] {
            let profiles = TimingProfiles::preset(preset);
            for mode in [GateMode::Full, GateMode::Minimal] {
                let marks = profiles.timeline(mode);
                assert!(marks.windows(2).all(|w| w[0].offset_ms < w[1].offset_ms));
            }
        }
    }

    #[test]
    fn test_rejects_non_increasing() {
        let mut full = TimingProfiles::optimized().full;
        full.thread_ms = full.logo_ms;

        let err = TimingProfiles::new(full, TimingProfiles::optimized().minimal).unwrap_err();
        assert_eq!(
            err,
            ProfileError::NotIncreasing {
                mode: GateMode::Full,
                stage: AnimationStage::Thread,
                at_ms: 1200,
                previous: 1200,
            }
        );
    }

    #[test]
    fn test_rejects_zero_first_delay() {
        let mut minimal = TimingProfiles::optimized().minimal;
        minimal.peak_ms = 0;

        let err = TimingProfiles::new(TimingProfiles::optimized().full, minimal).unwrap_err();
        assert!(matches!(
            err,
            ProfileError::NotIncreasing {
                stage: AnimationStage::Peak,
                ..
            }
        ));
    }

    #[test]
    fn test_rejects_minimal_longer_than_full() {
        let mut minimal = TimingProfiles::optimized().minimal;
        minimal.complete_ms = 4000;

        let err = TimingProfiles::new(TimingProfiles::optimized().full, minimal).unwrap_err();
        assert_eq!(
            err,
            ProfileError::MinimalNotShorter {
                stage: AnimationStage::Complete,
                minimal_ms: 4000,
                full_ms: 3400,
            }
        );
    }

    #[test]
    fn test_preset_from_str() {
        assert_eq!("optimized".parse::<Preset>(), Ok(Preset::Optimized));
        assert_eq!(" Ceremonial ".parse::<Preset>(), Ok(Preset::Ceremonial));
        assert!(matches!(
            "slow".parse::<Preset>(),
            Err(ProfileError::UnknownPreset(_))
        ));
    }

    #[test]
    fn test_toml_round_trip() {
        let profiles = TimingProfiles::ceremonial();
        let text = toml::to_string_pretty(&profiles).unwrap();
        assert!(text.contains("[full]"));
        assert!(text.contains("logo_ms = 1800"));

        let parsed: TimingProfiles = toml::from_str(&text).unwrap();
        assert_eq!(parsed, profiles);
    }
}
