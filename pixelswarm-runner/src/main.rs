//! Host loop for the pixel swarm.
//!
//! Loads the configuration and source image, builds the particle system and
//! drives it at a fixed frame rate, streaming every frame to the configured
//! renderer until Ctrl+C or the frame limit.

mod setup;
mod stats;

use clap::Parser;
use log::{debug, error, info, trace, warn};
use pixelswarm_config::{load_config, Config, ConfigError};
use pixelswarm_core::{FrameScheduler, PointerSource, Renderer};
use pixelswarm_simulation::{ParticleSystem, ScriptedPointer, SystemError};
use pixelswarm_transport::TransportError;
use std::path::PathBuf;
use std::process;
use thiserror::Error;

use stats::FrameStats;

/// Frames between periodic status lines.
const STATUS_INTERVAL: u64 = 600;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the swarm configuration file (JSON, or TOML by extension)
    #[arg(short, long, default_value = "config.json")]
    config: PathBuf,

    /// Source image, overriding the configured path
    #[arg(short, long)]
    image: Option<PathBuf>,

    /// Stop after this many frames
    #[arg(short, long, value_parser = clap::value_parser!(u64).range(1..))]
    frames: Option<u64>,

    /// Seed for the particle population
    #[arg(short, long)]
    seed: Option<u64>,
}

#[derive(Error, Debug)]
pub enum RunnerError {
    #[error("Failed to load config: {0}")]
    Config(#[from] ConfigError),

    #[error("Failed to decode image: {0}")]
    Image(#[from] image::ImageError),

    #[error("Invalid pixel data: {0}")]
    Pixels(#[from] pixelswarm_core::ImageError),

    #[error("Failed to build particle system: {0}")]
    System(#[from] SystemError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Failed to install Ctrl+C handler: {0}")]
    Signal(#[from] ctrlc::Error),

    #[error("Failed to set up frame statistics: {0}")]
    Stats(#[from] hdrhistogram::CreationError),
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    if let Err(e) = run(args) {
        error!("{}", e);
        process::exit(1);
    }
}

fn run(args: Args) -> Result<(), RunnerError> {
    info!("Loading configuration from {}", args.config.display());
    let mut config = load_config(&args.config)?;
    apply_overrides(&mut config, &args);

    let image = setup::load_image(&config.image.path)?;
    let mut rng = setup::create_rng(config.simulation.seed);
    let mut system = ParticleSystem::with_settings(
        &image,
        setup::viewport(&config),
        setup::system_settings(&config),
        &mut rng,
    )?;

    let mut renderer = setup::create_renderer(&config.transport)?;
    renderer.build_scene(&system.scene())?;

    let mut pointer = ScriptedPointer::new(setup::pointer_path(&config.pointer));
    let mut scheduler = FrameScheduler::new(config.simulation.frame_rate)
        .with_fixed_timestep(config.simulation.fixed_timestep);
    let mut stats = FrameStats::new()?;

    let (stop_tx, stop_rx) = crossbeam_channel::bounded::<()>(1);
    ctrlc::set_handler(move || {
        let _ = stop_tx.try_send(());
    })?;

    info!(
        "Running {} particles at {} FPS{}",
        system.len(),
        config.simulation.frame_rate,
        config
            .simulation
            .max_frames
            .map(|n| format!(" for {} frames", n))
            .unwrap_or_default()
    );

    loop {
        if stop_rx.try_recv().is_ok() {
            info!("Stop requested");
            break;
        }
        if config.simulation.max_frames.map_or(false, |max| scheduler.frames_elapsed() >= max) {
            break;
        }

        let timing = scheduler.begin_frame();
        let state = pointer.poll(timing.frame);
        system.tick(state.position, state.moved, timing.dt_frames);

        if let Err(e) = system.render(&mut renderer) {
            error!("Error sending frame {}: {}", timing.frame, e);
        }

        let report = scheduler.end_frame(&timing);
        stats.record(report.elapsed, report.overrun.is_some());
        if let Some(lag) = report.overrun {
            warn!(
                "Frame {} over budget by {:?} (target {:?})",
                timing.frame,
                lag,
                scheduler.frame_duration()
            );
        }

        if timing.frame > 0 && timing.frame % STATUS_INTERVAL == 0 {
            debug!(
                "frame {}: falloff {:.1}, {} frames sent, clients {:?}",
                timing.frame,
                system.repulsion_change_distance(),
                renderer.frames_sent(),
                renderer.client_count()
            );
            for (index, transform) in system.transforms().iter().take(5).enumerate() {
                trace!("particle {} at {:?} scale {:.3}", index, transform.position, transform.scale);
            }
        }
    }

    renderer.flush()?;
    stats.log_summary();
    info!("Simulation finished after {} frames", scheduler.frames_elapsed());
    Ok(())
}

fn apply_overrides(config: &mut Config, args: &Args) {
    if let Some(image) = &args.image {
        config.image.path = image.clone();
    }
    if let Some(frames) = args.frames {
        config.simulation.max_frames = Some(frames);
    }
    if let Some(seed) = args.seed {
        config.simulation.seed = Some(seed);
    }
}
