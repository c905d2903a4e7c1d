//! Run command - drive the press pipeline until Ctrl+C.
//!
//! Builds the service from configuration, feeds it presses from stdin
//! (one per line), and prints a periodic status line from the metrics
//! snapshot. Ctrl+C triggers a graceful shutdown that lets the in-flight
//! job finish and the final state reach disk.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;

use onepress::coalescer::CoalesceDecision;
use onepress::config::config_file_path;
use onepress::metrics::SharedMetricsState;
use onepress::service::OnePressService;

use crate::error::CliError;
use crate::panic_handler;
use crate::runner::CliRunner;

/// Arguments for the run command.
#[derive(Default)]
pub struct RunArgs {
    pub config: Option<PathBuf>,
    pub status_interval: u64,
    pub debug: bool,
}

/// Run the run command.
pub fn run(args: RunArgs) -> Result<(), CliError> {
    let runner = CliRunner::with_options(args.config.as_deref(), args.debug)?;
    runner.log_startup("run");

    // Logging is live now, so panics from here on reach the log file.
    panic_handler::init();

    let config = runner.config().clone();

    let runtime = tokio::runtime::Runtime::new().map_err(CliError::Runtime)?;

    // Service creation needs the runtime context for its daemons.
    let service = {
        let _guard = runtime.enter();
        OnePressService::new(config.clone())?
    };

    let trigger = service.trigger();
    let metrics = service.metrics();
    let backend_line = if service.backend_ids().is_empty() {
        "none (every job will fail)".to_string()
    } else {
        service
            .backend_ids()
            .iter()
            .map(|id| id.as_str())
            .collect::<Vec<_>>()
            .join(" -> ")
    };

    // Print banner
    let config_path = args
        .config
        .clone()
        .unwrap_or_else(config_file_path);
    println!("OnePress v{}", onepress::VERSION);
    println!("{}", "=".repeat(40));
    println!();
    if config_path.exists() {
        println!("Config:     {}", config_path.display());
    } else {
        println!("Config:     {} (not created, using defaults)", config_path.display());
    }
    println!("State:      {}", config.state.directory.display());
    println!("Log file:   {}", config.logging.file.display());
    println!("Backends:   {}", backend_line);
    println!(
        "Coalescing: {}s idle window, {}s processing window",
        config.coalescer.idle_window_secs, config.coalescer.processing_window_secs
    );
    println!();
    println!("Each line on stdin fires one press.");
    println!("Press Ctrl+C to stop.");
    println!();

    // Set up signal handler for graceful shutdown
    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_clone = shutdown.clone();

    ctrlc::set_handler(move || {
        shutdown_clone.store(true, Ordering::SeqCst);
    })
    .map_err(|e| CliError::Config(format!("Failed to set signal handler: {}", e)))?;

    let cancellation = CancellationToken::new();
    let service_task = runtime.spawn(service.run(cancellation.clone()));

    // Stdin is a trigger source: one press per line. The thread parks on
    // read_line and dies with the process.
    let stdin_trigger = trigger.clone();
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        let mut line = String::new();
        loop {
            line.clear();
            match stdin.read_line(&mut line) {
                Ok(0) | Err(_) => break,
                Ok(_) => match stdin_trigger.press() {
                    CoalesceDecision::NewJob { job_id } => {
                        println!("press -> new {}", job_id);
                    }
                    CoalesceDecision::MergedInto { job_id } => {
                        println!("press -> merged into {}", job_id);
                    }
                },
            }
        }
    });

    // Status line loop until Ctrl+C
    let status_interval = Duration::from_secs(args.status_interval);
    let mut last_status = Instant::now();

    while !shutdown.load(Ordering::SeqCst) {
        std::thread::sleep(Duration::from_millis(100));

        if !status_interval.is_zero() && last_status.elapsed() >= status_interval {
            print_status_line(&metrics);
            last_status = Instant::now();
        }
    }

    println!();
    println!("Shutting down...");
    cancellation.cancel();
    let _ = runtime.block_on(service_task);

    print_status_line(&metrics);
    println!("Pipeline stopped.");

    Ok(())
}

/// Prints one compact line from the current metrics snapshot.
fn print_status_line(metrics: &SharedMetricsState) {
    let snapshot = metrics.read().unwrap().clone();
    let c = &snapshot.counters;

    println!(
        "[status] events {} | jobs {} ({} merged) | ok {} / failed {} | success {} | worker {}",
        c.events_total,
        c.jobs_emitted,
        c.jobs_coalesced,
        c.jobs_succeeded,
        c.jobs_failed_total(),
        format_rate(c.success_rate()),
        snapshot.worker_state,
    );
}

/// Formats a rate as a percentage, or "n/a" before any data exists.
fn format_rate(rate: Option<f64>) -> String {
    match rate {
        Some(r) => format!("{:.1}%", r * 100.0),
        None => "n/a".to_string(),
    }
}
