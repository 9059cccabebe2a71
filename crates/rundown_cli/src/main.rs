//! CLI smoke entry point.
//!
//! # Responsibility
//! - Provide a minimal executable to verify `rundown_core` linkage.
//! - Exercise the storage bootstrap against an in-memory database.
//! - Start file logging when `RUNDOWN_LOG_DIR` names an absolute directory.

use rundown_core::db::open_db_in_memory;
use rundown_core::{
    default_log_level, init_logging, LogTimer, PlaybackCursor, RundownConfig, RundownService,
    SqliteRundownRepository,
};
use std::process::ExitCode;

const LOG_DIR_ENV: &str = "RUNDOWN_LOG_DIR";

fn main() -> ExitCode {
    if let Ok(log_dir) = std::env::var(LOG_DIR_ENV) {
        if let Err(err) = init_logging(default_log_level().as_str(), &log_dir) {
            eprintln!("rundown_core logging disabled: {err}");
        }
    }

    println!("rundown_core ping={}", rundown_core::ping());
    println!("rundown_core version={}", rundown_core::core_version());

    match probe_rundown() {
        Ok(len) => {
            println!("rundown_core rundown_len={len}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("rundown_core probe failed: {err}");
            ExitCode::FAILURE
        }
    }
}

fn probe_rundown() -> Result<usize, Box<dyn std::error::Error>> {
    let config = RundownConfig::from_env()?;
    let repo = SqliteRundownRepository::try_new(open_db_in_memory()?)?;
    let service = RundownService::load(repo, PlaybackCursor::idle(), LogTimer, &config)?;
    Ok(service.len())
}
