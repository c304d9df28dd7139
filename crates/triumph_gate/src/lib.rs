//! Triumph Entrance Gate
//!
//! Timed stage sequencing for the full-screen entrance gate shown before
//! page content is revealed.
//!
//! # Features
//!
//! - **Timing Profiles**: Immutable per-mode stage timelines with built-in presets
//! - **Timer Queue**: Virtual-time scheduling with generational cancellation handles
//! - **Stage Sequencer**: Ordered stage notifications ending in exactly one completion
//! - **Gate Controller**: Route- and mount-driven cycle lifecycle (`Idle` / `Gating`)
//! - **Presentation Surface**: Trait seam for whatever draws the gate
//! - **Gate Runtime**: Wall-clock driver on a background thread
//!
//! # Example
//!
//! ```rust
//! use triumph_gate::{AnimationStage, EventRecorder, GateController, GateMode, TimingProfiles};
//!
//! let recorder = EventRecorder::shared();
//! let mut gate = GateController::new(TimingProfiles::optimized(), recorder.clone()).unwrap();
//!
//! gate.on_route_changed("/");
//! gate.on_application_mounted();
//! assert_eq!(gate.gate_mode(), Some(GateMode::Full));
//!
//! gate.advance_to(3400).unwrap();
//! assert!(gate.is_idle());
//!
//! let stages = recorder.stages();
//! assert_eq!(stages.first(), Some(&AnimationStage::Ecg));
//! assert_eq!(recorder.clear_count(), 1);
//! ```

pub mod controller;
pub mod error;
pub mod profile;
pub mod runtime;
pub mod sequencer;
pub mod stage;
pub mod surface;
pub mod timer;

pub use controller::{ControllerStats, GateController, GateCycle, GateState};
pub use error::{GateError, Result};
pub use profile::{
    FullTimeline, MinimalTimeline, Preset, ProfileError, StageMark, TimingProfiles,
};
pub use runtime::{GateHandle, GateRuntime, DEFAULT_FRAME_RATE};
pub use sequencer::{CycleId, GateTimer, SequencerEvent, SequencerStep, StageSequencer};
pub use stage::{AnimationStage, GateKey, GateMode, StageVisuals};
pub use surface::{
    EventKind, EventRecorder, NullSurface, PresentationSurface, RecordedEvent, SharedRecorder,
};
pub use timer::{TimerId, TimerQueue};
