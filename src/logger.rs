//! Logging setup for symopt binaries and tests.
//!
//! Lines look like `[LEVEL YYYY-MM-DD HH:MM:SS location] message`, where the location is the
//! module path for INFO/WARN/ERROR and `file:line` for DEBUG/TRACE.

use chrono::Local;
use tracing::Level;
use tracing_subscriber::{
    EnvFilter,
    fmt::{FmtContext, FormatEvent, FormatFields, format::Writer},
    registry::LookupSpan,
};

/// Initialize the global subscriber at INFO (overridable via `RUST_LOG`).
///
/// # Example
/// ```no_run
/// use symopt::init_logger;
///
/// init_logger();
/// tracing::info!("Application started");
/// ```
///
/// ```bash
/// RUST_LOG=debug cargo run --bin optimize_pose_chain
/// RUST_LOG=symopt::optimizer=debug cargo test
/// ```
pub fn init_logger() -> bool {
    init_logger_with_level(Level::INFO)
}

/// Initialize the global subscriber with a custom default level.
///
/// Returns `false` if a global subscriber was already installed, which makes it safe to call
/// from several tests.
pub fn init_logger_with_level(default_level: Level) -> bool {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(default_level.into())
                .from_env_lossy(),
        )
        .event_format(BracketFormatter)
        .try_init()
        .is_ok()
}

/// Colored, fixed-width-free level label.
fn level_label(level: &Level) -> &'static str {
    match *level {
        Level::ERROR => "\x1b[31mERROR\x1b[0m",
        Level::WARN => "\x1b[33mWARN\x1b[0m",
        Level::INFO => "\x1b[32mINFO\x1b[0m",
        Level::DEBUG => "\x1b[34mDEBUG\x1b[0m",
        Level::TRACE => "\x1b[35mTRACE\x1b[0m",
    }
}

/// File name without its directories.
fn short_file(file: &str) -> &str {
    file.rsplit(['/', '\\']).next().unwrap_or(file)
}

struct BracketFormatter;

impl<S, N> FormatEvent<S, N> for BracketFormatter
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &tracing::Event<'_>,
    ) -> std::fmt::Result {
        let metadata = event.metadata();
        let level = metadata.level();

        write!(
            writer,
            "[{} {} ",
            level_label(level),
            Local::now().format("%Y-%m-%d %H:%M:%S")
        )?;

        let verbose = *level == Level::DEBUG || *level == Level::TRACE;
        match (verbose, metadata.file()) {
            (true, Some(file)) => {
                write!(writer, "{}", short_file(file))?;
                if let Some(line) = metadata.line() {
                    write!(writer, ":{line}")?;
                }
            }
            _ => write!(writer, "{}", metadata.target())?,
        }

        write!(writer, "] ")?;
        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}
