//! Status command - read-only view of the persisted pipeline state.
//!
//! Loads the state file directly and prints counters, rates, and the last
//! outcome without starting the service, so it is safe to run while a
//! `onepress run` instance is active.

use std::path::Path;

use chrono::{DateTime, Local};

use onepress::config::ConfigFile;
use onepress::persist::{PersistedOutcome, PersistedState, StateStore};

use crate::error::CliError;

/// Run the status command.
pub fn run(config_path: Option<&Path>) -> Result<(), CliError> {
    let config = match config_path {
        Some(path) => ConfigFile::load_from(path)
            .map_err(|e| CliError::Config(format!("{}: {}", path.display(), e)))?,
        None => ConfigFile::load().unwrap_or_default(),
    };

    let store = StateStore::in_directory(&config.state.directory);

    println!("OnePress Status");
    println!("===============");
    println!();
    println!("State file: {}", store.path().display());

    if !store.path().exists() {
        println!();
        println!("No state recorded yet. Run 'onepress run' to start the pipeline.");
        return Ok(());
    }

    let state = store.load();
    if !state.saved_at.is_empty() {
        println!("Saved at:   {}", humanize_timestamp(&state.saved_at));
    }
    println!();

    print_counters(&state);
    println!();
    print_rates(&state);

    if let Some(outcome) = &state.last_outcome {
        println!();
        print_last_outcome(outcome);
    }

    Ok(())
}

fn print_counters(state: &PersistedState) {
    let c = &state.counters;

    println!("Counters");
    println!("  events observed:  {}", c.events_total);
    println!("  jobs emitted:     {}", c.jobs_emitted);
    println!("  triggers merged:  {}", c.jobs_coalesced);
    println!("  jobs succeeded:   {}", c.jobs_succeeded);
    println!("  jobs failed:      {}", c.jobs_failed_total());
    for (backend, count) in &c.jobs_failed_by_backend {
        println!("    {}: {}", backend, count);
    }
    if c.worker_faults > 0 {
        println!("    worker faults: {}", c.worker_faults);
    }
}

fn print_rates(state: &PersistedState) {
    let c = &state.counters;

    println!("Rates");
    println!("  success rate:   {}", format_rate(c.success_rate()));
    println!("  coalesce rate:  {}", format_rate(c.coalesce_rate()));
}

fn print_last_outcome(outcome: &PersistedOutcome) {
    println!("Last outcome");
    println!("  job:       #{}", outcome.job_id);

    let result = match (outcome.success, outcome.degraded) {
        (true, true) => "success (degraded)".to_string(),
        (true, false) => "success".to_string(),
        (false, _) => match outcome.error_kind {
            Some(kind) => format!("failed ({})", kind),
            None => "failed".to_string(),
        },
    };
    println!("  result:    {}", result);

    if let Some(backend) = outcome.backend_used {
        println!("  backend:   {}", backend);
    }
    println!("  duration:  {} ms", outcome.duration_ms);
    println!("  completed: {}", humanize_timestamp(&outcome.completed_at));
}

/// Formats a rate as a percentage, or "n/a" before any data exists.
fn format_rate(rate: Option<f64>) -> String {
    match rate {
        Some(r) => format!("{:.1}%", r * 100.0),
        None => "n/a".to_string(),
    }
}

/// Renders an RFC 3339 timestamp in local time, falling back to the raw
/// string if it does not parse.
fn humanize_timestamp(raw: &str) -> String {
    match DateTime::parse_from_rfc3339(raw) {
        Ok(ts) => ts
            .with_timezone(&Local)
            .format("%Y-%m-%d %H:%M:%S")
            .to_string(),
        Err(_) => raw.to_string(),
    }
}
