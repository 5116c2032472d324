//! Logging Module
//!
//! Structured logging with file output for diagnostics.

use std::path::Path;

use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const LOG_FILE_PREFIX: &str = "ignitionlab";
const KEEP_LOG_FILES: usize = 7;

/// Initialize logging with file output and, in debug builds or when
/// `verbose`, console output on stderr.
pub fn init(log_dir: &Path, verbose: bool) {
    // Create rolling file appender (daily rotation, keep 7 days)
    let file_layer = match RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(LOG_FILE_PREFIX)
        .filename_suffix("log")
        .max_log_files(KEEP_LOG_FILES)
        .build(log_dir)
    {
        Ok(appender) => Some(
            fmt::layer()
                .with_ansi(false)
                .with_target(true)
                .with_writer(appender),
        ),
        Err(e) => {
            eprintln!("File logging disabled: {}", e);
            None
        }
    };

    // stdout carries command output
    let console_layer = (cfg!(debug_assertions) || verbose).then(|| {
        fmt::layer()
            .with_target(true)
            .with_writer(std::io::stderr)
    });

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(verbose)));

    let subscriber = tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(console_layer);

    // Set global subscriber
    let _ = tracing::subscriber::set_global_default(subscriber);
}

fn default_directives(verbose: bool) -> &'static str {
    if verbose || cfg!(debug_assertions) {
        "debug,hyper=warn,reqwest=warn"
    } else {
        "info,hyper=warn,reqwest=warn"
    }
}
