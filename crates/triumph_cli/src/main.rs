//! Triumph gate CLI
//!
//! Simulate, replay, and validate entrance-gate timing.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use triumph_gate::{
    AnimationStage, GateController, GateCycle, GateMode, GateRuntime, Preset, PresentationSurface,
    SequencerStep, StageSequencer, StageVisuals,
};

mod config;
mod script;

use config::GateFile;
use script::{ScriptEvent, DEFAULT_SCRIPT};

#[derive(Parser)]
#[command(name = "triumph-gate")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Entrance gate timing tool", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run an event script in virtual time and print every notification
    Simulate {
        /// Config file (defaults to ./gate.toml when present)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Timing preset, overriding the config file (optimized, ceremonial)
        #[arg(short, long)]
        preset: Option<Preset>,

        /// Comma-separated script: mount@MS, route:PATH@MS, teardown@MS
        #[arg(short, long, default_value = DEFAULT_SCRIPT)]
        script: String,

        /// Stop virtual time here instead of running until idle
        #[arg(short, long)]
        until: Option<u64>,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Replay an event script against the real-time runtime
    Play {
        #[arg(short, long)]
        config: Option<PathBuf>,

        #[arg(short, long)]
        preset: Option<Preset>,

        #[arg(short, long, default_value = DEFAULT_SCRIPT)]
        script: String,
    },

    /// Print the resolved timing table
    Profiles {
        #[arg(short, long)]
        config: Option<PathBuf>,

        #[arg(short, long)]
        preset: Option<Preset>,
    },

    /// Validate a config file
    Check {
        /// Config file
        #[arg(default_value = "gate.toml")]
        file: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    match cli.command {
        Commands::Simulate {
            config,
            preset,
            script,
            until,
            json,
        } => cmd_simulate(config.as_deref(), preset, &script, until, json),

        Commands::Play {
            config,
            preset,
            script,
        } => cmd_play(config.as_deref(), preset, &script),

        Commands::Profiles { config, preset } => cmd_profiles(config.as_deref(), preset),

        Commands::Check { file } => cmd_check(&file),
    }
}

/// Load the config file and apply a command-line preset
fn load_config(path: Option<&Path>, preset: Option<Preset>) -> Result<GateFile> {
    let mut file = GateFile::resolve(path)?;
    if let Some(preset) = preset {
        file.gate.preset = preset;
    }
    Ok(file)
}

fn cmd_simulate(
    config: Option<&Path>,
    preset: Option<Preset>,
    script: &str,
    until: Option<u64>,
    json: bool,
) -> Result<()> {
    let file = load_config(config, preset)?;
    let profiles = file.gate.profiles()?;
    let steps = script::parse_script(script)?;

    info!(
        "Simulating {} steps with the {} preset",
        steps.len(),
        file.gate.preset.as_str()
    );
    let report = script::simulate(profiles, &steps, until)?;

    if json {
        let out = serde_json::to_string_pretty(&report).context("Failed to serialize report")?;
        println!("{}", out);
        return Ok(());
    }

    for event in &report.events {
        println!("{}", script::format_event(event));
    }
    println!();
    println!(
        "cycles: {} started, {} completed, {} cancelled; routes ignored: {}; ended at {}ms",
        report.stats.cycles_started,
        report.stats.cycles_completed,
        report.stats.cycles_cancelled,
        report.stats.routes_ignored,
        report.end_ms
    );

    Ok(())
}

/// Surface that logs each notification
struct LogSurface;

impl PresentationSurface for LogSurface {
    fn gate_started(&mut self, cycle: &GateCycle, at_ms: u64) {
        info!(
            "{:>6}ms {} {} gate started (key {})",
            at_ms, cycle.id, cycle.mode, cycle.key
        );
    }

    fn stage_changed(&mut self, cycle: &GateCycle, stage: AnimationStage, at_ms: u64) {
        let visuals = StageVisuals::derive(cycle.mode, stage);
        info!(
            "{:>6}ms {} {} stage {} (logo={}, thread={}, reveal={})",
            at_ms,
            cycle.id,
            cycle.mode,
            stage,
            visuals.show_logo,
            visuals.thread_active,
            visuals.reveal_active
        );
    }

    fn gate_cleared(&mut self, cycle: &GateCycle, at_ms: u64) {
        info!("{:>6}ms {} {} gate cleared", at_ms, cycle.id, cycle.mode);
    }
}

fn cmd_play(config: Option<&Path>, preset: Option<Preset>, script: &str) -> Result<()> {
    let file = load_config(config, preset)?;
    let profiles = file.gate.profiles()?;
    let steps = script::parse_script(script)?;

    let mut runtime = GateRuntime::new(GateController::new(profiles, LogSurface)?);
    runtime.set_frame_rate(file.gate.frame_rate);
    runtime.start_background();
    let gate = runtime.handle();

    for step in &steps {
        let now = runtime.elapsed_ms();
        if step.at_ms > now {
            thread::sleep(Duration::from_millis(step.at_ms - now));
        }

        let accepted = match &step.event {
            ScriptEvent::Mount => gate.mounted()?,
            ScriptEvent::Route(path) => gate.route_changed(path.as_str())?,
            ScriptEvent::Teardown => gate.teardown()?,
        };
        if !accepted {
            info!("{:>6}ms {:?} had no effect", step.at_ms, step.event);
        }
    }

    // Let the last cycle finish
    let longest = u64::from(profiles.complete_ms(GateMode::Full));
    let mut waited = 0;
    while !runtime.with_controller(|c| c.is_idle()) {
        if waited > longest * 2 {
            warn!("Gate still active after {}ms, stopping", waited);
            break;
        }
        thread::sleep(Duration::from_millis(10));
        waited += 10;
    }

    runtime.stop_background();
    let stats = runtime.with_controller(|c| c.stats());
    info!(
        "Done: {} cycles started, {} completed, {} routes ignored",
        stats.cycles_started, stats.cycles_completed, stats.routes_ignored
    );

    Ok(())
}

fn cmd_profiles(config: Option<&Path>, preset: Option<Preset>) -> Result<()> {
    let file = load_config(config, preset)?;
    let profiles = file.gate.profiles()?;

    println!("# preset: {}", file.gate.preset.as_str());
    let table = toml::to_string_pretty(&profiles).context("Failed to serialize profiles")?;
    println!("{}", table);

    for mode in [GateMode::Full, GateMode::Minimal] {
        let plan = StageSequencer::schedule_plan(mode, &profiles);
        let line: Vec<String> = plan
            .iter()
            .map(|(step, offset)| match step {
                SequencerStep::Stage(stage) => format!("{}@{}", stage, offset),
                SequencerStep::Complete => format!("complete@{}", offset),
            })
            .collect();
        println!("# {:<8} {}", mode, line.join(" -> "));
    }

    Ok(())
}

fn cmd_check(file: &Path) -> Result<()> {
    let config = GateFile::load(file)?;
    let profiles = config
        .gate
        .profiles()
        .with_context(|| format!("{} failed validation", file.display()))?;
    tracing::debug!("Resolved config:\n{}", config.to_toml()?);

    info!(
        "{} is valid: {} preset, full completes at {}ms, minimal at {}ms",
        file.display(),
        config.gate.preset.as_str(),
        profiles.complete_ms(GateMode::Full),
        profiles.complete_ms(GateMode::Minimal)
    );

    Ok(())
}
