//! Gate modes, animation stages, and the presentation flags derived from them

use serde::{Deserialize, Serialize};
use std::fmt;

/// Which timing profile and stage subset a gate cycle runs
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GateMode {
    /// First application load - the full ceremony
    Full,
    /// In-app navigation - a short pulse
    Minimal,
}

impl GateMode {
    pub fn as_str(self) -> &'static str {
        match self {
            GateMode::Full => "full",
            GateMode::Minimal => "minimal",
        }
    }

    /// Stages visited by a cycle of this mode, in order, excluding `Complete`
    pub fn stages(self) -> &'static [AnimationStage] {
        match self {
            GateMode::Full => &[
                AnimationStage::Ecg,
                AnimationStage::Peak,
                AnimationStage::Logo,
                AnimationStage::Thread,
                AnimationStage::Reveal,
            ],
            GateMode::Minimal => &[
                AnimationStage::Ecg,
                AnimationStage::Peak,
                AnimationStage::Reveal,
            ],
        }
    }

    /// Whether a cycle of this mode ever enters `stage`
    pub fn visits(self, stage: AnimationStage) -> bool {
        stage == AnimationStage::Complete || self.stages().contains(&stage)
    }
}

impl fmt::Display for GateMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// A named step within a gate cycle
///
/// Declaration order is the forward order of a cycle; the derived `Ord`
/// is what the sequencer checks transitions against.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnimationStage {
    Ecg,
    Peak,
    Logo,
    Thread,
    Reveal,
    Complete,
}

impl AnimationStage {
    pub fn as_str(self) -> &'static str {
        match self {
            AnimationStage::Ecg => "ecg",
            AnimationStage::Peak => "peak",
            AnimationStage::Logo => "logo",
            AnimationStage::Thread => "thread",
            AnimationStage::Reveal => "reveal",
            AnimationStage::Complete => "complete",
        }
    }
}

impl fmt::Display for AnimationStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Presentation flags for a (mode, stage) pair
///
/// Pure derivation for the drawing side; never feeds back into timing.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StageVisuals {
    /// The logo mark is on screen (full mode only, `peak` through `reveal`)
    pub show_logo: bool,
    /// The thread is extended (`thread` or `reveal`)
    pub thread_active: bool,
    /// The banner is lifting away (`reveal`)
    pub reveal_active: bool,
}

impl StageVisuals {
    pub fn derive(mode: GateMode, stage: AnimationStage) -> Self {
        use AnimationStage::*;

        Self {
            show_logo: mode == GateMode::Full && matches!(stage, Peak | Logo | Thread | Reveal),
            thread_active: matches!(stage, Thread | Reveal),
            reveal_active: stage == Reveal,
        }
    }
}

/// Re-mount key of the gate view
///
/// A full cycle is always keyed `"full"`; a minimal cycle is keyed by the
/// route path that started it, so consecutive navigations restart the view.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct GateKey(String);

impl GateKey {
    pub fn for_cycle(mode: GateMode, path: Option<&str>) -> Self {
        match (mode, path) {
            (GateMode::Full, _) | (GateMode::Minimal, None) => GateKey(mode.as_str().to_string()),
            (GateMode::Minimal, Some(path)) => GateKey(path.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_order_is_forward() {
        let full = GateMode::Full.stages();
        assert!(full.windows(2).all(|w| w[0] < w[1]));

        let minimal = GateMode::Minimal.stages();
        assert!(minimal.windows(2).all(|w| w[0] < w[1]));
        assert!(AnimationStage::Reveal < AnimationStage::Complete);
    }

    #[test]
    fn test_minimal_skips_logo_and_thread() {
        assert!(!GateMode::Minimal.visits(AnimationStage::Logo));
        assert!(!GateMode::Minimal.visits(AnimationStage::Thread));
        assert!(GateMode::Minimal.visits(AnimationStage::Complete));
        assert!(GateMode::Full.visits(AnimationStage::Thread));
    }

    #[test]
    fn test_visuals_full_mode() {
        let ecg = StageVisuals::derive(GateMode::Full, AnimationStage::Ecg);
        assert_eq!(ecg, StageVisuals::default());

        let logo = StageVisuals::derive(GateMode::Full, AnimationStage::Logo);
        assert!(logo.show_logo);
        assert!(!logo.thread_active);

        let reveal = StageVisuals::derive(GateMode::Full, AnimationStage::Reveal);
        assert!(reveal.show_logo && reveal.thread_active && reveal.reveal_active);

        let complete = StageVisuals::derive(GateMode::Full, AnimationStage::Complete);
        assert!(!complete.show_logo);
    }

    #[test]
    fn test_visuals_minimal_never_shows_logo() {
        for &stage in GateMode::Minimal.stages() {
            assert!(!StageVisuals::derive(GateMode::Minimal, stage).show_logo);
        }
        assert!(StageVisuals::derive(GateMode::Minimal, AnimationStage::Reveal).reveal_active);
    }

    #[test]
    fn test_gate_key() {
        assert_eq!(GateKey::for_cycle(GateMode::Full, Some("/about")).as_str(), "full");
        assert_eq!(GateKey::for_cycle(GateMode::Minimal, Some("/about")).as_str(), "/about");
        assert_eq!(GateKey::for_cycle(GateMode::Minimal, None).as_str(), "minimal");
    }
}
