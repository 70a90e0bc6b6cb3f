use std::fmt;
use std::fmt::Write;
use std::path::Path;

use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_appender::{
    non_blocking::WorkerGuard,
    rolling::{RollingFileAppender, Rotation},
};
use tracing_subscriber::{
    filter::EnvFilter,
    fmt::{
        format::{self, FormatEvent, FormatFields},
        time::{FormatTime, SystemTime},
        FmtContext,
    },
    layer::SubscriberExt,
    registry::LookupSpan,
    util::SubscriberInitExt,
    Layer,
};

// Log targets
pub const MATCHER: &str = "tagfill::matcher";
pub const FILL: &str = "tagfill::fill";
pub const BATCH: &str = "tagfill::batch";
pub const STORE: &str = "tagfill::store";
pub const TABLE: &str = "tagfill::table";
pub const EXPORT: &str = "tagfill::export";

pub const LOG_FILE_NAME: &str = "tagfill.log";

fn default_filter(verbose: bool) -> EnvFilter {
    let level = if verbose { "debug" } else { "info" };
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(format!("tagfill={level}")))
}

/// Writes `[timestamp] [LEVEL] message (key: value | key: value)`.
struct ContextLineFormatter;

impl<S, N> FormatEvent<S, N> for ContextLineFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        _ctx: &FmtContext<'_, S, N>,
        mut writer: format::Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        write!(writer, "[")?;
        SystemTime.format_time(&mut writer)?;
        write!(writer, "] [{}] ", event.metadata().level())?;

        let mut visitor = ContextVisitor::default();
        event.record(&mut visitor);
        write!(writer, "{}", visitor.message)?;
        if !visitor.context.is_empty() {
            write!(writer, " ({})", visitor.context.join(" | "))?;
        }
        writeln!(writer)
    }
}

#[derive(Default)]
struct ContextVisitor {
    message: String,
    context: Vec<String>,
}

impl Visit for ContextVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message.push_str(value);
        } else {
            self.context.push(format!("{}: {}", field.name(), value));
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            let _ = write!(self.message, "{:?}", value);
        } else {
            self.context.push(format!("{}: {:?}", field.name(), value));
        }
    }
}

/// Console logging only. Safe to call more than once; later calls are no-ops.
pub fn init_logging(verbose: bool) {
    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_writer(std::io::stderr)
                .with_filter(default_filter(verbose)),
        )
        .try_init();
}

/// Console logging plus a daily-rolling `tagfill.log` inside `log_dir`.
///
/// The returned guard flushes the non-blocking file writer on drop, so the
/// caller keeps it alive for the life of the process.
pub fn init_logging_with_dir(verbose: bool, log_dir: &Path) -> std::io::Result<WorkerGuard> {
    std::fs::create_dir_all(log_dir)?;

    let file_appender = RollingFileAppender::new(Rotation::DAILY, log_dir, LOG_FILE_NAME);
    let (non_blocking_appender, guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = tracing_subscriber::fmt::layer()
        .event_format(ContextLineFormatter)
        .with_ansi(false)
        .with_writer(non_blocking_appender)
        .with_filter(default_filter(verbose));

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_writer(std::io::stderr)
        .with_filter(default_filter(verbose));

    let _ = tracing_subscriber::registry()
        .with(file_layer)
        .with(stderr_layer)
        .try_init();

    Ok(guard)
}
