//! Stage sequencer
//!
//! Turns a [`GateMode`] into a cancellable series of delayed stage
//! transitions on a [`TimerQueue`], ending in exactly one completion.
//!
//! A sequencer lives for one cycle. It keeps the handle of every timer it
//! scheduled; [`StageSequencer::cancel`] drops them all, after which nothing
//! belonging to the cycle can fire. Completion moves the sequencer into a
//! terminal state first, so a second completion is unreachable.

use crate::profile::TimingProfiles;
use crate::stage::{AnimationStage, GateMode};
use crate::timer::{TimerId, TimerQueue};
use serde::Serialize;
use smallvec::SmallVec;
use std::fmt;

/// Identity of one gate cycle
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct CycleId(pub u64);

impl fmt::Display for CycleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// What a scheduled timer does when it fires
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SequencerStep {
    Stage(AnimationStage),
    Complete,
}

/// Timer payload: the step plus the cycle that owns it
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GateTimer {
    pub cycle: CycleId,
    pub step: SequencerStep,
}

/// Notification produced by a fired step
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SequencerEvent {
    StageChanged(AnimationStage),
    Completed,
}

/// Drives one gate cycle
#[derive(Debug)]
pub struct StageSequencer {
    cycle: CycleId,
    mode: GateMode,
    current: AnimationStage,
    started_at_ms: u64,
    /// Handles of timers not yet fired
    pending: SmallVec<[TimerId; 6]>,
    completed: bool,
    cancelled: bool,
}

impl StageSequencer {
    /// Steps of a `mode` cycle with their offsets from cycle start
    ///
    /// The first entry is `ecg` at 0, entered immediately on start; the last
    /// is the completion signal.
    pub fn schedule_plan(
        mode: GateMode,
        profiles: &TimingProfiles,
    ) -> SmallVec<[(SequencerStep, u32); 6]> {
        profiles
            .timeline(mode)
            .into_iter()
            .map(|mark| {
                let step = match mark.stage {
                    AnimationStage::Complete => SequencerStep::Complete,
                    stage => SequencerStep::Stage(stage),
                };
                (step, mark.offset_ms)
            })
            .collect()
    }

    /// Start a cycle at the queue's current time
    ///
    /// The sequencer begins in `ecg`; every later step is scheduled on
    /// `timers` and tracked for cancellation.
    pub fn start(
        cycle: CycleId,
        mode: GateMode,
        profiles: &TimingProfiles,
        timers: &mut TimerQueue<GateTimer>,
    ) -> Self {
        let started_at_ms = timers.now_ms();
        let mut pending = SmallVec::new();

        for (step, offset_ms) in Self::schedule_plan(mode, profiles) {
            if step == SequencerStep::Stage(AnimationStage::Ecg) {
                continue;
            }
            let id = timers.schedule_after(u64::from(offset_ms), GateTimer { cycle, step });
            pending.push(id);
        }

        tracing::trace!(
            "Sequencer {}: scheduled {} steps for {} mode at {}ms",
            cycle,
            pending.len(),
            mode,
            started_at_ms
        );

        Self {
            cycle,
            mode,
            current: AnimationStage::Ecg,
            started_at_ms,
            pending,
            completed: false,
            cancelled: false,
        }
    }

    /// Apply a fired timer
    ///
    /// Returns `None` for timers that do not belong to this cycle, arrive
    /// after completion or cancellation, or would move the stage backwards.
    pub fn on_timer(&mut self, id: TimerId, timer: GateTimer) -> Option<SequencerEvent> {
        if timer.cycle != self.cycle {
            tracing::warn!(
                "Sequencer {}: dropping timer for cycle {}",
                self.cycle,
                timer.cycle
            );
            return None;
        }
        self.pending.retain(|pending| *pending != id);

        if self.completed || self.cancelled {
            tracing::warn!("Sequencer {}: timer fired after cycle ended", self.cycle);
            return None;
        }

        match timer.step {
            SequencerStep::Stage(stage) => {
                if stage <= self.current {
                    tracing::warn!(
                        "Sequencer {}: refusing {} -> {}",
                        self.cycle,
                        self.current,
                        stage
                    );
                    return None;
                }
                self.current = stage;
                Some(SequencerEvent::StageChanged(stage))
            }
            SequencerStep::Complete => {
                self.completed = true;
                self.current = AnimationStage::Complete;
                Some(SequencerEvent::Completed)
            }
        }
    }

    /// Cancel every pending timer of this cycle
    ///
    /// Returns how many timers were still pending.
    pub fn cancel(&mut self, timers: &mut TimerQueue<GateTimer>) -> usize {
        self.cancelled = true;
        self.pending
            .drain(..)
            .filter(|id| timers.cancel(*id).is_some())
            .count()
    }

    pub fn cycle(&self) -> CycleId {
        self.cycle
    }

    pub fn mode(&self) -> GateMode {
        self.mode
    }

    pub fn current_stage(&self) -> AnimationStage {
        self.current
    }

    pub fn started_at_ms(&self) -> u64 {
        self.started_at_ms
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn is_completed(&self) -> bool {
        self.completed
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Drain `timers` up to `until`, collecting (time, event) pairs
    fn run(
        seq: &mut StageSequencer,
        timers: &mut TimerQueue<GateTimer>,
        until: u64,
    ) -> Vec<(u64, SequencerEvent)> {
        let mut out = Vec::new();
        while let Some((id, at, timer)) = timers.pop_due(until) {
            if let Some(event) = seq.on_timer(id, timer) {
                out.push((at, event));
            }
        }
        timers.advance_clock(until);
        out
    }

    #[test]
    fn test_full_sequence() {
        let profiles = TimingProfiles::optimized();
        let mut timers = TimerQueue::new();
        let mut seq = StageSequencer::start(CycleId(1), GateMode::Full, &profiles, &mut timers);

        assert_eq!(seq.current_stage(), AnimationStage::Ecg);
        assert_eq!(seq.pending_count(), 5);

        let events = run(&mut seq, &mut timers, 10_000);
        assert_eq!(
            events,
            vec![
                (800, SequencerEvent::StageChanged(AnimationStage::Peak)),
                (1200, SequencerEvent::StageChanged(AnimationStage::Logo)),
                (1400, SequencerEvent::StageChanged(AnimationStage::Thread)),
                (1800, SequencerEvent::StageChanged(AnimationStage::Reveal)),
                (3400, SequencerEvent::Completed),
            ]
        );
        assert!(seq.is_completed());
        assert_eq!(seq.pending_count(), 0);
    }

    #[test]
    fn test_minimal_sequence_skips_logo_and_thread() {
        let profiles = TimingProfiles::optimized();
        let mut timers = TimerQueue::new();
        let mut seq = StageSequencer::start(CycleId(2), GateMode::Minimal, &profiles, &mut timers);

        let events = run(&mut seq, &mut timers, 10_000);
        assert_eq!(
            events,
            vec![
                (200, SequencerEvent::StageChanged(AnimationStage::Peak)),
                (400, SequencerEvent::StageChanged(AnimationStage::Reveal)),
                (1000, SequencerEvent::Completed),
            ]
        );
    }

    #[test]
    fn test_start_offsets_from_current_time() {
        let profiles = TimingProfiles::optimized();
        let mut timers = TimerQueue::new();
        timers.advance_clock(5000);

        let mut seq = StageSequencer::start(CycleId(3), GateMode::Minimal, &profiles, &mut timers);
        assert_eq!(seq.started_at_ms(), 5000);
        assert_eq!(timers.next_deadline(), Some(5200));

        let events = run(&mut seq, &mut timers, 6000);
        assert_eq!(events.last(), Some(&(6000, SequencerEvent::Completed)));
    }

    #[test]
    fn test_cancel_stops_everything() {
        let profiles = TimingProfiles::optimized();
        let mut timers = TimerQueue::new();
        let mut seq = StageSequencer::start(CycleId(4), GateMode::Full, &profiles, &mut timers);

        let before = run(&mut seq, &mut timers, 1300);
        assert_eq!(before.len(), 2);

        assert_eq!(seq.cancel(&mut timers), 3);
        assert!(timers.is_empty());
        assert!(run(&mut seq, &mut timers, 10_000).is_empty());
        assert!(!seq.is_completed());
    }

    #[test]
    fn test_completion_fires_once() {
        let profiles = TimingProfiles::optimized();
        let mut timers = TimerQueue::new();
        let mut seq = StageSequencer::start(CycleId(5), GateMode::Minimal, &profiles, &mut timers);
        run(&mut seq, &mut timers, 1000);

        // A replayed completion is rejected
        let replay = GateTimer {
            cycle: CycleId(5),
            step: SequencerStep::Complete,
        };
        let id = timers.schedule_at(1000, replay);
        assert_eq!(seq.on_timer(id, replay), None);
    }

    #[test]
    fn test_rejects_foreign_and_backward_steps() {
        let profiles = TimingProfiles::optimized();
        let mut timers = TimerQueue::new();
        let mut seq = StageSequencer::start(CycleId(6), GateMode::Full, &profiles, &mut timers);
        run(&mut seq, &mut timers, 1200);
        assert_eq!(seq.current_stage(), AnimationStage::Logo);

        let backward = GateTimer {
            cycle: CycleId(6),
            step: SequencerStep::Stage(AnimationStage::Peak),
        };
        let id = timers.schedule_at(1200, backward);
        assert_eq!(seq.on_timer(id, backward), None);

        let foreign = GateTimer {
            cycle: CycleId(99),
            step: SequencerStep::Stage(AnimationStage::Thread),
        };
        let id = timers.schedule_at(1200, foreign);
        assert_eq!(seq.on_timer(id, foreign), None);
        assert_eq!(seq.current_stage(), AnimationStage::Logo);
    }

    #[test]
    fn test_schedule_plan() {
        let plan = StageSequencer::schedule_plan(GateMode::Minimal, &TimingProfiles::ceremonial());
        assert_eq!(
            plan.as_slice(),
            &[
                (SequencerStep::Stage(AnimationStage::Ecg), 0),
                (SequencerStep::Stage(AnimationStage::Peak), 400),
                (SequencerStep::Stage(AnimationStage::Reveal), 800),
                (SequencerStep::Complete, 1800),
            ]
        );
    }
}
