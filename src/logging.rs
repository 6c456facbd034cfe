use std::fmt;
use std::io::IsTerminal;

use tracing::{Event, Subscriber};
use tracing_subscriber::fmt::format::{FormatEvent, FormatFields, Writer};
use tracing_subscriber::fmt::FmtContext;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::EnvFilter;

use crate::config::types::LogFormat;

/// Session lifecycle tag derived from an event's message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tag {
    Open,
    Close,
    Fail,
}

impl Tag {
    fn label(self) -> &'static str {
        match self {
            Tag::Open => "[OPEN]",
            Tag::Close => "[CLOSE]",
            Tag::Fail => "[FAIL]",
        }
    }

    fn color(self) -> &'static str {
        match self {
            Tag::Open => "32",
            Tag::Close => "34",
            Tag::Fail => "31",
        }
    }
}

/// Tracing formatter that prepends [OPEN]/[CLOSE]/[FAIL] tags to session
/// lifecycle events and colorizes known field names.
pub struct PrefixedFormatter<E> {
    inner: E,
    ansi: bool,
}

impl<E> PrefixedFormatter<E> {
    pub fn new(inner: E, ansi: bool) -> Self {
        Self { inner, ansi }
    }
}

impl<S, N, E> FormatEvent<S, N> for PrefixedFormatter<E>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
    E: FormatEvent<S, N>,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let mut visitor = MessageVisitor {
            message: String::new(),
        };
        event.record(&mut visitor);

        if let Some(tag) = classify(&visitor.message.to_lowercase()) {
            if self.ansi {
                write!(writer, "\x1b[{}m{}\x1b[0m ", tag.color(), tag.label())?;
            } else {
                write!(writer, "{} ", tag.label())?;
            }
        }

        if self.ansi {
            let mut buf = String::new();
            self.inner.format_event(ctx, Writer::new(&mut buf), event)?;
            write!(writer, "{}", colorize_fields(&buf))
        } else {
            self.inner.format_event(ctx, writer, event)
        }
    }
}

fn colorize_fields(line: &str) -> String {
    let mut result = line.to_string();
    for (field, color) in FIELD_COLORS {
        let pattern = format!("{}=", field);
        if result.contains(&pattern) {
            let colored = format!("\x1b[{}m{}=\x1b[0m", color, field);
            result = result.replace(&pattern, &colored);
        }
    }
    result
}

/// Field name → ANSI color code mapping.
const FIELD_COLORS: &[(&str, &str)] = &[
    ("user", "36"),
    ("host", "33"),
    ("generation", "2"),
    ("command", "35"),
    ("error", "31"),
];

struct MessageVisitor {
    message: String,
}

impl tracing::field::Visit for MessageVisitor {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{:?}", value);
        }
    }

    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        }
    }
}

fn classify(msg: &str) -> Option<Tag> {
    if msg.contains("failed") || msg.contains("timed out") || msg.contains("rejected") {
        Some(Tag::Fail)
    } else if msg.contains("session established") {
        Some(Tag::Open)
    } else if msg.contains("session closed") {
        Some(Tag::Close)
    } else {
        None
    }
}

/// Initialize the global tracing subscriber.
///
/// `level` is an `EnvFilter` directive; invalid directives fall back to
/// `info`. Pretty mode tags lifecycle events and colorizes fields when
/// stdout is a terminal. JSON mode is unchanged.
pub fn setup_logging(level: &str, format: LogFormat) {
    let filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));

    match format {
        LogFormat::Json => {
            tracing_subscriber::fmt()
                .json()
                .with_env_filter(filter)
                .init();
        }
        LogFormat::Pretty => {
            let ansi = std::io::stdout().is_terminal();
            let default_format = tracing_subscriber::fmt::format::Format::default();
            tracing_subscriber::fmt()
                .event_format(PrefixedFormatter::new(default_format, ansi))
                .with_env_filter(filter)
                .init();
        }
    }
}
