use std::fmt;
use std::fs;
use std::path::Path;
use tracing::{Event, Level, Subscriber};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{fmt as tfmt, prelude::*, EnvFilter};

use crate::constants::{EXPERIMENT_LOG_FILE, PHASE1_LOG_FILE, PHASE_RAW_INSPECTION};
use crate::error::{Result, StudyError};

/// Renders `<timestamp><sep><LEVEL><sep><message>` lines for the audit logs.
#[derive(Debug, Clone, Copy)]
pub struct AuditLineFormat {
    separator: &'static str,
}

impl AuditLineFormat {
    pub fn new(separator: &'static str) -> Self {
        Self { separator }
    }
}

fn level_name(level: &Level) -> &'static str {
    match *level {
        Level::ERROR => "ERROR",
        Level::WARN => "WARNING",
        Level::INFO => "INFO",
        Level::DEBUG => "DEBUG",
        Level::TRACE => "TRACE",
    }
}

impl<S, N> FormatEvent<S, N> for AuditLineFormat
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let timestamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S,%3f");
        write!(
            writer,
            "{}{}{}{}",
            timestamp,
            self.separator,
            level_name(event.metadata().level()),
            self.separator
        )?;
        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

/// Keeps the background log writers alive; dropping it flushes them.
pub struct LoggingGuard {
    _guards: Vec<WorkerGuard>,
}

/// Initializes console output plus the append-only audit log files.
///
/// `experiment.log` always receives every line. When the raw inspection
/// phase is selected its own log file is attached as well.
pub fn init_logging(logs_dir: &Path, phases: &[u8]) -> Result<LoggingGuard> {
    fs::create_dir_all(logs_dir)?;

    let mut guards = Vec::new();

    // `never` opens the file in append mode and does not rotate
    let experiment_appender = tracing_appender::rolling::never(logs_dir, EXPERIMENT_LOG_FILE);
    let (experiment_writer, guard) = tracing_appender::non_blocking(experiment_appender);
    guards.push(guard);
    let experiment_layer = tfmt::layer()
        .with_ansi(false)
        .event_format(AuditLineFormat::new(" - "))
        .with_writer(experiment_writer);

    let phase1_layer = if phases.contains(&PHASE_RAW_INSPECTION) {
        let appender = tracing_appender::rolling::never(logs_dir, PHASE1_LOG_FILE);
        let (writer, guard) = tracing_appender::non_blocking(appender);
        guards.push(guard);
        Some(
            tfmt::layer()
                .with_ansi(false)
                .event_format(AuditLineFormat::new(" | "))
                .with_writer(writer),
        )
    } else {
        None
    };

    let console_layer = tfmt::layer().with_target(false).with_writer(std::io::stdout);

    // Respect RUST_LOG if set; otherwise INFO and above
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(experiment_layer)
        .with(phase1_layer)
        .with(console_layer)
        .try_init()
        .map_err(|e| StudyError::Config(format!("Failed to initialise logging: {}", e)))?;

    Ok(LoggingGuard { _guards: guards })
}

#[cfg(test)]
pub(crate) mod capture {
    use super::*;
    use std::io;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct Capture(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Capture {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    /// Runs `emit` under a subscriber that formats with `AuditLineFormat`
    /// and returns the captured lines.
    pub fn capture_lines(separator: &'static str, emit: impl FnOnce()) -> Vec<String> {
        let capture = Capture::default();
        let writer = capture.clone();
        let subscriber = tracing_subscriber::registry().with(
            tfmt::layer()
                .with_ansi(false)
                .event_format(AuditLineFormat::new(separator))
                .with_writer(move || writer.clone()),
        );
        tracing::subscriber::with_default(subscriber, emit);
        let bytes = capture.0.lock().unwrap().clone();
        String::from_utf8(bytes)
            .unwrap()
            .lines()
            .map(|l| l.to_string())
            .collect()
    }
}
