//! Event scripts
//!
//! A script is a comma-separated list of timed inputs:
//!
//! ```text
//! route:/@0, mount@0, route:/about@5000, route:/contact@5300
//! ```
//!
//! `mount@MS` delivers the application mount, `route:PATH@MS` a route change,
//! and `teardown@MS` cancels the cycle in flight. Times must not decrease.

use anyhow::{bail, Context, Result};
use serde::Serialize;
use triumph_gate::{
    ControllerStats, EventKind, EventRecorder, GateController, RecordedEvent, TimingProfiles,
};

/// Initial load, then a navigation, then a second navigation mid-pulse
pub const DEFAULT_SCRIPT: &str = "route:/@0,mount@0,route:/about@5000,route:/contact@5300";

/// Input delivered to the controller
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ScriptEvent {
    Mount,
    Route(String),
    Teardown,
}

/// An input and the time it is delivered
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScriptStep {
    pub at_ms: u64,
    pub event: ScriptEvent,
}

/// Parse a script
pub fn parse_script(script: &str) -> Result<Vec<ScriptStep>> {
    let mut steps: Vec<ScriptStep> = Vec::new();

    for token in script.split(',').map(str::trim).filter(|t| !t.is_empty()) {
        let (head, at) = token
            .rsplit_once('@')
            .with_context(|| format!("Missing '@time' in script step '{}'", token))?;
        let at_ms: u64 = at
            .trim()
            .parse()
            .with_context(|| format!("Invalid time in script step '{}'", token))?;

        let head = head.trim();
        let event = if head == "mount" {
            ScriptEvent::Mount
        } else if head == "teardown" {
            ScriptEvent::Teardown
        } else if let Some(path) = head.strip_prefix("route:") {
            if path.is_empty() {
                bail!("Empty route path in script step '{}'", token);
            }
            ScriptEvent::Route(path.to_string())
        } else {
            bail!(
                "Unknown script event '{}'. Expected mount, teardown, or route:PATH",
                head
            );
        };

        if let Some(prev) = steps.last() {
            if at_ms < prev.at_ms {
                bail!(
                    "Script step '{}' at {}ms comes before the previous step at {}ms",
                    token,
                    at_ms,
                    prev.at_ms
                );
            }
        }
        steps.push(ScriptStep { at_ms, event });
    }

    if steps.is_empty() {
        bail!("Script is empty");
    }
    Ok(steps)
}

/// Outcome of a deterministic run
#[derive(Debug, Serialize)]
pub struct SimulationReport {
    pub events: Vec<RecordedEvent>,
    pub stats: ControllerStats,
    pub end_ms: u64,
}

/// Run `steps` against a fresh controller in virtual time
///
/// With `until`, time stops there; otherwise the run continues until no
/// transition is pending after the last step.
pub fn simulate(
    profiles: TimingProfiles,
    steps: &[ScriptStep],
    until: Option<u64>,
) -> Result<SimulationReport> {
    let recorder = EventRecorder::shared();
    let mut gate = GateController::new(profiles, recorder.clone())?;

    for step in steps {
        if until.is_some_and(|end| step.at_ms > end) {
            break;
        }
        gate.advance_to(step.at_ms)?;
        let accepted = match &step.event {
            ScriptEvent::Mount => gate.on_application_mounted(),
            ScriptEvent::Route(path) => gate.on_route_changed(path.as_str()),
            ScriptEvent::Teardown => gate.teardown(),
        };
        tracing::debug!(
            "{:>6}ms {:?} -> {}",
            step.at_ms,
            step.event,
            if accepted { "accepted" } else { "no-op" }
        );
    }

    match until {
        Some(end) => {
            let end = end.max(gate.now_ms());
            gate.advance_to(end)?;
        }
        None => {
            while let Some(deadline) = gate.next_deadline() {
                gate.advance_to(deadline)?;
            }
        }
    }

    Ok(SimulationReport {
        events: recorder.take(),
        stats: gate.stats(),
        end_ms: gate.now_ms(),
    })
}

/// One line of the text report
pub fn format_event(event: &RecordedEvent) -> String {
    let detail = match &event.kind {
        EventKind::GateStarted { mode, key, .. } => format!("{:<8} gate started (key {})", mode, key),
        EventKind::StageChanged { mode, stage, .. } => format!("{:<8} stage {}", mode, stage),
        EventKind::GateCleared { mode, .. } => format!("{:<8} gate cleared", mode),
    };
    format!(
        "{:>7}ms  {:<4} {}",
        event.at_ms,
        event.kind.cycle().to_string(),
        detail
    )
}
