//! Gate visibility controller
//!
//! Owns the single gate-cycle slot and decides, from the first application
//! mount and later route changes, when a cycle starts and in which mode:
//!
//! - first mount: `Gating(full)`, once per controller lifetime
//! - route change while `Idle` after mount: `Gating(minimal)`
//! - route change while `Gating`: ignored, never queued
//! - completion of the current cycle: back to `Idle`
//!
//! Time is virtual. The owner feeds it in through [`GateController::advance_to`]
//! (the [`GateRuntime`](crate::runtime::GateRuntime) does so from the wall clock).

use crate::error::{GateError, Result};
use crate::profile::TimingProfiles;
use crate::sequencer::{CycleId, GateTimer, SequencerEvent, StageSequencer};
use crate::stage::{AnimationStage, GateKey, GateMode, StageVisuals};
use crate::surface::PresentationSurface;
use crate::timer::{TimerId, TimerQueue};
use serde::Serialize;
use tracing::{debug, info, trace, warn};

/// Visibility state of the gate
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GateState {
    /// No gate on screen; page content is visible
    Idle,
    /// A cycle of the given mode is in progress
    Gating(GateMode),
}

/// Snapshot of the in-flight cycle
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GateCycle {
    pub id: CycleId,
    pub mode: GateMode,
    pub current_stage: AnimationStage,
    pub started_at_ms: u64,
    /// Re-mount key for the gate view
    pub key: GateKey,
}

impl GateCycle {
    pub fn visuals(&self) -> StageVisuals {
        StageVisuals::derive(self.mode, self.current_stage)
    }
}

/// Counters over the controller's lifetime
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ControllerStats {
    pub cycles_started: u64,
    pub cycles_completed: u64,
    pub cycles_cancelled: u64,
    /// Route changes dropped because a cycle was in flight
    pub routes_ignored: u64,
    /// Timers drained from the queue
    pub timers_fired: u64,
}

struct ActiveCycle {
    key: GateKey,
    sequencer: StageSequencer,
}

impl ActiveCycle {
    fn snapshot(&self) -> GateCycle {
        GateCycle {
            id: self.sequencer.cycle(),
            mode: self.sequencer.mode(),
            current_stage: self.sequencer.current_stage(),
            started_at_ms: self.sequencer.started_at_ms(),
            key: self.key.clone(),
        }
    }
}

/// Route- and mount-driven gate lifecycle
pub struct GateController<S: PresentationSurface> {
    profiles: TimingProfiles,
    surface: S,
    timers: TimerQueue<GateTimer>,
    active: Option<ActiveCycle>,
    mounted: bool,
    current_path: Option<String>,
    next_cycle: u64,
    stats: ControllerStats,
}

impl<S: PresentationSurface> GateController<S> {
    /// Create a controller in `Idle`, not yet mounted
    ///
    /// `profiles` is validated first; a table whose delays do not strictly
    /// increase would drop stage notifications.
    pub fn new(profiles: TimingProfiles, surface: S) -> Result<Self> {
        profiles.validate()?;
        Ok(Self {
            profiles,
            surface,
            timers: TimerQueue::new(),
            active: None,
            mounted: false,
            current_path: None,
            next_cycle: 1,
            stats: ControllerStats::default(),
        })
    }

    // =========================================================================
    // Input events
    // =========================================================================

    /// The application mounted
    ///
    /// The first call starts a full cycle. Nothing can be in flight yet,
    /// since routes seen before mount are only recorded. Later calls are
    /// ignored. Returns whether a cycle started.
    pub fn on_application_mounted(&mut self) -> bool {
        if self.mounted {
            debug!("Gate: application already mounted, ignoring");
            return false;
        }
        self.mounted = true;

        debug_assert!(self.active.is_none(), "cycle started before mount");
        self.start_cycle(GateMode::Full);
        true
    }

    /// The route observer reported `path`
    ///
    /// Only an actual change counts. Before mount the path is remembered;
    /// while a cycle is in flight it is remembered but starts nothing.
    /// Returns whether a minimal cycle started.
    pub fn on_route_changed(&mut self, path: impl Into<String>) -> bool {
        let path = path.into();
        if self.current_path.as_deref() == Some(path.as_str()) {
            trace!("Gate: route unchanged ({})", path);
            return false;
        }
        self.current_path = Some(path);

        if !self.mounted {
            debug!(
                "Gate: route {:?} recorded before mount",
                self.current_path.as_deref()
            );
            return false;
        }

        if let Some(active) = &self.active {
            self.stats.routes_ignored += 1;
            debug!(
                "Gate: route {:?} ignored, cycle {} ({}) in flight",
                self.current_path.as_deref(),
                active.sequencer.cycle(),
                active.sequencer.mode()
            );
            return false;
        }

        self.start_cycle(GateMode::Minimal);
        true
    }

    /// The owning view is going away
    ///
    /// Cancels the cycle in flight without clearing it through the surface.
    /// Returns whether a cycle was cancelled.
    pub fn teardown(&mut self) -> bool {
        if self.active.is_none() {
            return false;
        }
        self.cancel_active();
        true
    }

    // =========================================================================
    // Time
    // =========================================================================

    /// Current virtual time
    pub fn now_ms(&self) -> u64 {
        self.timers.now_ms()
    }

    /// Advance virtual time to `now_ms`, firing every due transition in order
    ///
    /// Returns the number of timers fired.
    pub fn advance_to(&mut self, now_ms: u64) -> Result<usize> {
        let current = self.timers.now_ms();
        if now_ms < current {
            return Err(GateError::ClockRegression {
                now_ms: current,
                requested_ms: now_ms,
            });
        }

        let mut fired = 0;
        while let Some((id, at_ms, timer)) = self.timers.pop_due(now_ms) {
            fired += 1;
            self.dispatch(id, at_ms, timer);
        }
        self.timers.advance_clock(now_ms);
        self.stats.timers_fired += fired as u64;
        Ok(fired)
    }

    /// Advance virtual time by `dt_ms`
    pub fn advance_by(&mut self, dt_ms: u64) -> Result<usize> {
        self.advance_to(self.now_ms().saturating_add(dt_ms))
    }

    /// When the next transition is due, if any
    pub fn next_deadline(&self) -> Option<u64> {
        self.timers.next_deadline()
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub fn state(&self) -> GateState {
        match &self.active {
            Some(active) => GateState::Gating(active.sequencer.mode()),
            None => GateState::Idle,
        }
    }

    pub fn is_idle(&self) -> bool {
        self.active.is_none()
    }

    /// Mode of the cycle in flight (`None` when idle)
    pub fn gate_mode(&self) -> Option<GateMode> {
        self.active.as_ref().map(|a| a.sequencer.mode())
    }

    pub fn current_cycle(&self) -> Option<GateCycle> {
        self.active.as_ref().map(ActiveCycle::snapshot)
    }

    pub fn stage_visuals(&self) -> Option<StageVisuals> {
        self.current_cycle().map(|cycle| cycle.visuals())
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted
    }

    pub fn current_path(&self) -> Option<&str> {
        self.current_path.as_deref()
    }

    pub fn profiles(&self) -> &TimingProfiles {
        &self.profiles
    }

    pub fn stats(&self) -> ControllerStats {
        self.stats
    }

    /// Number of scheduled transitions not yet fired
    pub fn pending_timers(&self) -> usize {
        self.timers.len()
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn start_cycle(&mut self, mode: GateMode) {
        let id = CycleId(self.next_cycle);
        self.next_cycle += 1;

        let key = GateKey::for_cycle(mode, self.current_path.as_deref());
        let sequencer = StageSequencer::start(id, mode, &self.profiles, &mut self.timers);
        let active = ActiveCycle { key, sequencer };
        let cycle = active.snapshot();
        self.active = Some(active);
        self.stats.cycles_started += 1;

        let now = self.timers.now_ms();
        info!(
            "Gate: cycle {} started ({} mode, key {}) at {}ms",
            id, mode, cycle.key, now
        );
        self.surface.gate_started(&cycle, now);
        self.surface.stage_changed(&cycle, AnimationStage::Ecg, now);
    }

    fn cancel_active(&mut self) {
        if let Some(mut active) = self.active.take() {
            let cancelled = active.sequencer.cancel(&mut self.timers);
            self.stats.cycles_cancelled += 1;
            info!(
                "Gate: cycle {} cancelled at {}ms ({} pending timers dropped)",
                active.sequencer.cycle(),
                self.timers.now_ms(),
                cancelled
            );
        }
    }

    fn dispatch(&mut self, id: TimerId, at_ms: u64, timer: GateTimer) {
        let Some(active) = self.active.as_mut() else {
            warn!("Gate: timer for cycle {} fired with no cycle active", timer.cycle);
            return;
        };

        match active.sequencer.on_timer(id, timer) {
            Some(SequencerEvent::StageChanged(stage)) => {
                let cycle = active.snapshot();
                debug!("Gate: cycle {} -> {} at {}ms", cycle.id, stage, at_ms);
                self.surface.stage_changed(&cycle, stage, at_ms);
            }
            Some(SequencerEvent::Completed) => {
                let cycle = active.snapshot();
                self.active = None;
                self.stats.cycles_completed += 1;
                info!(
                    "Gate: cycle {} ({} mode) cleared at {}ms",
                    cycle.id, cycle.mode, at_ms
                );
                self.surface.gate_cleared(&cycle, at_ms);
            }
            None => {}
        }
    }
}
