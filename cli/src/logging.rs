//! Tracing setup for the chat binary
//!
//! Logs go to the log file under the data directory (see
//! [`config::PathManager::log_file_path`]) so they never interleave with the
//! REPL on stdout. `RUST_LOG` overrides the default filter.

use config::PathManager;
use std::sync::OnceLock;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

const DEFAULT_FILTER: &str = "info,llm=debug,conversation=debug";

static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

/// Install the global subscriber. Later calls are no-ops.
pub fn init_logging(to_stderr: bool) {
    if LOG_GUARD.get().is_some() {
        return;
    }

    if to_stderr {
        init_stderr_logging();
        return;
    }

    let Some(path) = PathManager::log_file_path() else {
        init_stderr_logging();
        return;
    };

    if let Some(parent) = path.parent()
        && let Err(e) = std::fs::create_dir_all(parent)
    {
        eprintln!("[chat] Failed to create log directory {:?}: {}", parent, e);
    }

    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path);

    match file {
        Ok(file) => {
            let (non_blocking, guard) = tracing_appender::non_blocking(file);
            let _ = LOG_GUARD.set(guard);

            let subscriber = tracing_subscriber::registry().with(filter()).with(
                fmt::layer()
                    .with_writer(non_blocking)
                    .with_ansi(false)
                    .with_target(true)
                    .with_file(true)
                    .with_line_number(true),
            );

            match tracing::subscriber::set_global_default(subscriber) {
                Ok(()) => tracing::info!("Logging initialized, writing to {:?}", path),
                Err(e) => eprintln!("[chat] Failed to set tracing subscriber: {}", e),
            }
        }
        Err(e) => {
            eprintln!("[chat] Failed to open log file {:?}: {}", path, e);
            init_stderr_logging();
        }
    }
}

fn filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

fn init_stderr_logging() {
    let subscriber = tracing_subscriber::registry().with(filter()).with(
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_ansi(true)
            .with_target(true),
    );

    let _ = tracing::subscriber::set_global_default(subscriber);
}
