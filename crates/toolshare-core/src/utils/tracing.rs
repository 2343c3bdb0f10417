use chrono::Local;
use std::io;
use tracing_appender::rolling;
use tracing_subscriber::{
    EnvFilter,
    fmt::{self, format::FmtSpan},
    prelude::*,
};

use super::paths::AppPaths;

const DEFAULT_FILTER: &str = "info,toolshare=debug,toolshare_core=debug,toolshare_tools=debug";

/// Initialize tracing with a file logger named after the start time.
///
/// The filter comes from `RUST_LOG` when set. Without a data directory the
/// output goes to stderr instead.
pub fn init_tracing() -> io::Result<()> {
    let timestamp = Local::now().format("%Y%m%d_%H%M%S");
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    if let Some(log_dir) = AppPaths::log_dir() {
        std::fs::create_dir_all(&log_dir)?;

        // Synchronous writer so nothing is lost when the shell exits.
        let file_name = format!("{timestamp}.log");
        let file_appender = rolling::never(&log_dir, &file_name);

        let subscriber = tracing_subscriber::registry()
            .with(
                fmt::Layer::new()
                    .with_writer(file_appender)
                    .with_ansi(false)
                    .with_span_events(FmtSpan::CLOSE)
                    .with_file(true)
                    .with_line_number(true),
            )
            .with(filter);

        tracing::subscriber::set_global_default(subscriber).map_err(io::Error::other)?;

        tracing::debug!(
            target: "toolshare_core::utils::tracing",
            path = %log_dir.join(file_name).display(),
            "Tracing initialized with file output"
        );
    } else {
        let subscriber = tracing_subscriber::registry()
            .with(
                fmt::Layer::default()
                    .with_writer(io::stderr)
                    .with_ansi(true)
                    .with_target(true),
            )
            .with(filter);

        tracing::subscriber::set_global_default(subscriber).map_err(io::Error::other)?;

        tracing::debug!(
            target: "toolshare_core::utils::tracing",
            "Tracing initialized with stderr output"
        );
    }

    Ok(())
}
