use clap::Parser;
use log::info;
use presence_sensor::config::Config;
use presence_sensor::engine::OccupancyEngine;
use presence_sensor::engine::edge::EdgeSource;
use presence_sensor::hal::MotionLine;
use presence_sensor::hal::sim::{SimulatedIndicator, SimulatedLine};
use presence_sensor::indicator::{LedSequencer, LedSettings};
use presence_sensor::input::simulation::run_motion_simulation;
use presence_sensor::notify::{LogPublisher, SharedDelay};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio_util::sync::CancellationToken;

#[derive(Parser, Debug)]
#[command(name = "presence-sensor", about = "Occupancy sensing and LED feedback engine")]
struct Args {
    /// Path to a JSON config file (defaults to the platform config dir).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Disable the periodic simulated motion bursts.
    #[arg(long)]
    no_simulation: bool,
}

fn init_logger() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();
}

#[tokio::main]
async fn main() {
    init_logger();
    let args = Args::parse();
    info!("Starting presence sensor");

    let config = match Config::load(args.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            log::error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };
    info!("Configuration loaded:");
    info!("  Motion line: {}", config.sensor.line);
    info!("  Edge queue depth: {}", config.sensor.queue_depth);
    info!(
        "  Unoccupied delay: {}s",
        config.sensor.unoccupied_delay_secs
    );
    info!("  LED line: {}", config.led.line);

    // Simulated HAL; a hardware build swaps these two at the trait seam.
    let line = Arc::new(SimulatedLine::new(config.sensor.line));
    let indicator = Arc::new(SimulatedIndicator::new());

    let sequencer = Arc::new(LedSequencer::new(
        indicator,
        LedSettings {
            dim_duty: config.led.dim_duty,
            bright_duty: config.led.bright_duty,
            blink_period: Duration::from_millis(config.led.blink_period_ms),
            blink_cycles: config.led.blink_cycles,
        },
    ));

    // Stand-ins for the device framework: a logging publisher, and a delay
    // holder the controller side could write at any time.
    let publisher = Arc::new(LogPublisher);
    let delay = Arc::new(SharedDelay::new(config.sensor.unoccupied_delay_secs));

    let (source, edges) = match EdgeSource::attach(
        line.clone() as Arc<dyn MotionLine>,
        config.sensor.queue_depth,
    ) {
        Ok(pair) => pair,
        Err(e) => {
            log::error!("Failed to initialize motion input: {}", e);
            std::process::exit(1);
        }
    };

    let shutdown = CancellationToken::new();
    let engine = OccupancyEngine::new(
        source.line(),
        edges,
        publisher,
        delay,
        sequencer.clone(),
    )
    .spawn(shutdown.clone());

    let simulation = if args.no_simulation {
        None
    } else {
        Some(run_motion_simulation(
            line.clone(),
            config.simulation.clone(),
        ))
    };

    info!("Presence sensor is running");
    info!("  - Press Ctrl+C to exit");

    match signal::ctrl_c().await {
        Ok(()) => info!("Received shutdown signal"),
        Err(e) => log::error!("Failed to listen for shutdown signal: {}", e),
    }

    if let Some(simulation) = simulation {
        simulation.abort();
    }
    shutdown.cancel();
    if let Err(e) = engine.await {
        log::error!("Engine task failed: {}", e);
    }
    sequencer.shutdown();

    if source.dropped_edges() > 0 {
        info!(
            "Edges lost to queue overflow this run: {}",
            source.dropped_edges()
        );
    }
    info!("Presence sensor stopped");
}
