//! Presentation surface seam
//!
//! Whatever draws the gate implements [`PresentationSurface`]. It is told
//! when a cycle starts, each stage it enters, and when the gate clears. It
//! never influences timing.
//!
//! [`EventRecorder`] is a surface that keeps a timestamped log, used by
//! tests and by the CLI to print a run.

use crate::controller::GateCycle;
use crate::sequencer::CycleId;
use crate::stage::{AnimationStage, GateMode};
use serde::Serialize;
use std::sync::{Arc, Mutex};

/// Receiver of gate notifications
///
/// Callbacks run while the controller is borrowed; under a
/// [`GateRuntime`](crate::runtime::GateRuntime) that means with the runtime
/// lock held, so a surface must not post back through a
/// [`GateHandle`](crate::runtime::GateHandle) or it will deadlock.
pub trait PresentationSurface {
    /// A new cycle began; `cycle.current_stage` is `Ecg`
    fn gate_started(&mut self, cycle: &GateCycle, at_ms: u64) {
        let _ = (cycle, at_ms);
    }

    /// The cycle entered `stage`
    fn stage_changed(&mut self, cycle: &GateCycle, stage: AnimationStage, at_ms: u64);

    /// The cycle completed; page content may be shown
    fn gate_cleared(&mut self, cycle: &GateCycle, at_ms: u64);
}

impl<S: PresentationSurface + ?Sized> PresentationSurface for Box<S> {
    fn gate_started(&mut self, cycle: &GateCycle, at_ms: u64) {
        (**self).gate_started(cycle, at_ms)
    }

    fn stage_changed(&mut self, cycle: &GateCycle, stage: AnimationStage, at_ms: u64) {
        (**self).stage_changed(cycle, stage, at_ms)
    }

    fn gate_cleared(&mut self, cycle: &GateCycle, at_ms: u64) {
        (**self).gate_cleared(cycle, at_ms)
    }
}

/// Surface that ignores everything
#[derive(Clone, Copy, Debug, Default)]
pub struct NullSurface;

impl PresentationSurface for NullSurface {
    fn stage_changed(&mut self, _cycle: &GateCycle, _stage: AnimationStage, _at_ms: u64) {}

    fn gate_cleared(&mut self, _cycle: &GateCycle, _at_ms: u64) {}
}

/// Kind of a recorded notification
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum EventKind {
    GateStarted {
        cycle: CycleId,
        mode: GateMode,
        key: String,
    },
    StageChanged {
        cycle: CycleId,
        mode: GateMode,
        stage: AnimationStage,
    },
    GateCleared {
        cycle: CycleId,
        mode: GateMode,
    },
}

impl EventKind {
    pub fn cycle(&self) -> CycleId {
        match self {
            EventKind::GateStarted { cycle, .. }
            | EventKind::StageChanged { cycle, .. }
            | EventKind::GateCleared { cycle, .. } => *cycle,
        }
    }
}

/// A notification with the virtual time it was delivered at
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RecordedEvent {
    pub at_ms: u64,
    #[serde(flatten)]
    pub kind: EventKind,
}

/// Surface that records every notification
#[derive(Clone, Debug, Default)]
pub struct EventRecorder {
    events: Vec<RecordedEvent>,
}

impl EventRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// A recorder that can be handed to a controller and inspected afterwards
    pub fn shared() -> SharedRecorder {
        SharedRecorder(Arc::new(Mutex::new(Self::new())))
    }

    pub fn events(&self) -> &[RecordedEvent] {
        &self.events
    }

    /// Every stage notification, in delivery order
    pub fn stages(&self) -> Vec<AnimationStage> {
        self.stage_times().into_iter().map(|(stage, _)| stage).collect()
    }

    /// Every stage notification with its time
    pub fn stage_times(&self) -> Vec<(AnimationStage, u64)> {
        self.events
            .iter()
            .filter_map(|e| match e.kind {
                EventKind::StageChanged { stage, .. } => Some((stage, e.at_ms)),
                _ => None,
            })
            .collect()
    }

    /// Stage notifications of one cycle with their times
    pub fn cycle_stage_times(&self, cycle: CycleId) -> Vec<(AnimationStage, u64)> {
        self.events
            .iter()
            .filter_map(|e| match e.kind {
                EventKind::StageChanged {
                    cycle: c, stage, ..
                } if c == cycle => Some((stage, e.at_ms)),
                _ => None,
            })
            .collect()
    }

    /// Modes of started cycles, in order
    pub fn started_modes(&self) -> Vec<GateMode> {
        self.events
            .iter()
            .filter_map(|e| match e.kind {
                EventKind::GateStarted { mode, .. } => Some(mode),
                _ => None,
            })
            .collect()
    }

    /// Started cycle ids, in order
    pub fn started_cycles(&self) -> Vec<CycleId> {
        self.events
            .iter()
            .filter_map(|e| match e.kind {
                EventKind::GateStarted { cycle, .. } => Some(cycle),
                _ => None,
            })
            .collect()
    }

    /// Times at which the gate cleared
    pub fn clear_times(&self) -> Vec<u64> {
        self.events
            .iter()
            .filter(|e| matches!(e.kind, EventKind::GateCleared { .. }))
            .map(|e| e.at_ms)
            .collect()
    }

    pub fn clear_count(&self) -> usize {
        self.clear_times().len()
    }

    /// Take the log, leaving the recorder empty
    pub fn take(&mut self) -> Vec<RecordedEvent> {
        std::mem::take(&mut self.events)
    }

    fn push(&mut self, at_ms: u64, kind: EventKind) {
        self.events.push(RecordedEvent { at_ms, kind });
    }
}

impl PresentationSurface for EventRecorder {
    fn gate_started(&mut self, cycle: &GateCycle, at_ms: u64) {
        self.push(
            at_ms,
            EventKind::GateStarted {
                cycle: cycle.id,
                mode: cycle.mode,
                key: cycle.key.as_str().to_string(),
            },
        );
    }

    fn stage_changed(&mut self, cycle: &GateCycle, stage: AnimationStage, at_ms: u64) {
        self.push(
            at_ms,
            EventKind::StageChanged {
                cycle: cycle.id,
                mode: cycle.mode,
                stage,
            },
        );
    }

    fn gate_cleared(&mut self, cycle: &GateCycle, at_ms: u64) {
        self.push(
            at_ms,
            EventKind::GateCleared {
                cycle: cycle.id,
                mode: cycle.mode,
            },
        );
    }
}

/// Shared, thread-safe [`EventRecorder`]
///
/// Clones share one log, so a clone can be given to a controller (or a
/// runtime thread) while the original is inspected.
#[derive(Clone, Debug, Default)]
pub struct SharedRecorder(Arc<Mutex<EventRecorder>>);

impl SharedRecorder {
    /// Run `f` against the recorder
    pub fn with<R>(&self, f: impl FnOnce(&mut EventRecorder) -> R) -> R {
        f(&mut self.0.lock().unwrap())
    }

    pub fn events(&self) -> Vec<RecordedEvent> {
        self.with(|r| r.events().to_vec())
    }

    pub fn stages(&self) -> Vec<AnimationStage> {
        self.with(|r| r.stages())
    }

    pub fn stage_times(&self) -> Vec<(AnimationStage, u64)> {
        self.with(|r| r.stage_times())
    }

    pub fn cycle_stage_times(&self, cycle: CycleId) -> Vec<(AnimationStage, u64)> {
        self.with(|r| r.cycle_stage_times(cycle))
    }

    pub fn started_modes(&self) -> Vec<GateMode> {
        self.with(|r| r.started_modes())
    }

    pub fn started_cycles(&self) -> Vec<CycleId> {
        self.with(|r| r.started_cycles())
    }

    pub fn clear_times(&self) -> Vec<u64> {
        self.with(|r| r.clear_times())
    }

    pub fn clear_count(&self) -> usize {
        self.with(|r| r.clear_count())
    }

    pub fn take(&self) -> Vec<RecordedEvent> {
        self.with(|r| r.take())
    }
}

impl PresentationSurface for SharedRecorder {
    fn gate_started(&mut self, cycle: &GateCycle, at_ms: u64) {
        self.with(|r| r.gate_started(cycle, at_ms))
    }

    fn stage_changed(&mut self, cycle: &GateCycle, stage: AnimationStage, at_ms: u64) {
        self.with(|r| r.stage_changed(cycle, stage, at_ms))
    }

    fn gate_cleared(&mut self, cycle: &GateCycle, at_ms: u64) {
        self.with(|r| r.gate_cleared(cycle, at_ms))
    }
}
