// Copyright (c) The gallio-junit Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use clap::{Args, ValueEnum};
use owo_colors::{OwoColorize, Style, style};
use std::fmt::{self, Write as _};
use tracing::{
    Event, Level, Subscriber,
    field::{Field, Visit},
    level_filters::LevelFilter,
    warn,
};
use tracing_subscriber::{
    Layer,
    filter::Targets,
    fmt::{FmtContext, FormatEvent, FormatFields, format},
    layer::SubscriberExt,
    registry::LookupSpan,
    util::SubscriberInitExt,
};

/// The environment variable that overrides the log filter.
pub static LOG_ENV: &str = "GALLIO_JUNIT_LOG";

pub(crate) mod clap_styles {
    use clap::builder::{
        Styles,
        styling::{AnsiColor, Effects, Style},
    };

    const HEADING: Style = AnsiColor::Green.on_default().effects(Effects::BOLD);
    const LITERAL: Style = AnsiColor::Cyan.on_default().effects(Effects::BOLD);

    pub(crate) const fn style() -> Styles {
        Styles::styled()
            .header(HEADING)
            .usage(HEADING)
            .literal(LITERAL)
            .placeholder(AnsiColor::Cyan.on_default())
            .error(AnsiColor::Red.on_default().effects(Effects::BOLD))
            .valid(LITERAL)
            .invalid(AnsiColor::Yellow.on_default().effects(Effects::BOLD))
    }
}

#[derive(Copy, Clone, Debug, Args)]
#[must_use]
pub(crate) struct OutputOpts {
    /// Verbose output
    #[arg(long, short, global = true, env = "GALLIO_JUNIT_VERBOSE")]
    pub(crate) verbose: bool,

    /// Produce color output: auto, always, never
    #[arg(
        long,
        value_enum,
        default_value_t,
        hide_possible_values = true,
        global = true,
        value_name = "WHEN"
    )]
    pub(crate) color: Color,
}

impl OutputOpts {
    pub(crate) fn init(self) -> OutputContext {
        let OutputOpts { verbose, color } = self;

        color.init(verbose);

        OutputContext { color }
    }
}

/// Output settings resolved from the command line.
#[derive(Copy, Clone, Debug)]
#[must_use]
pub struct OutputContext {
    pub(crate) color: Color,
}

impl OutputContext {
    /// Returns general stderr styles for the current output context.
    pub fn stderr_styles(&self) -> StderrStyles {
        let mut styles = StderrStyles::default();

        if self.color.should_colorize(supports_color::Stream::Stderr) {
            styles.colorize();
        }

        styles
    }
}

/// When to produce color output.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, ValueEnum)]
#[must_use]
pub enum Color {
    /// Colorize if stderr supports it.
    #[default]
    Auto,
    /// Always colorize.
    Always,
    /// Never colorize.
    Never,
}

static INIT_LOGGER: std::sync::Once = std::sync::Once::new();

struct SimpleFormatter {
    styles: LogStyles,
}

impl<S, N> FormatEvent<S, N> for SimpleFormatter
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
        let metadata = event.metadata();

        if metadata.target() != NO_HEADING_TARGET {
            let (label, style) = self.styles.heading(*metadata.level());
            write!(writer, "{}: ", label.style(style))?;
        }

        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);

        write!(writer, "{}", visitor.message)?;
        for (name, value) in &visitor.fields {
            write!(writer, " {}={value}", name.style(self.styles.field))?;
        }
        writeln!(writer)
    }
}

/// Events logged to this target are printed without a level heading.
pub(crate) const NO_HEADING_TARGET: &str = "gallio_junit_cli::no_heading";

static MESSAGE_FIELD: &str = "message";

/// Collects the message and the structured fields of an event.
#[derive(Default)]
struct MessageVisitor {
    message: String,
    fields: Vec<(&'static str, String)>,
}

impl Visit for MessageVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == MESSAGE_FIELD {
            self.message.push_str(value);
        } else {
            self.fields.push((field.name(), value.to_owned()));
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == MESSAGE_FIELD {
            // Writing to a String is infallible.
            let _ = write!(self.message, "{value:?}");
        } else {
            self.fields.push((field.name(), format!("{value:?}")));
        }
    }
}

impl Color {
    pub(crate) fn init(self, verbose: bool) {
        let mut log_styles = LogStyles::default();
        if self.should_colorize(supports_color::Stream::Stderr) {
            log_styles.colorize();
        }

        INIT_LOGGER.call_once(|| {
            let default_level = if verbose {
                LevelFilter::DEBUG
            } else {
                LevelFilter::INFO
            };
            let (targets, invalid) = log_targets(std::env::var_os(LOG_ENV), default_level);

            let layer = tracing_subscriber::fmt::layer()
                .event_format(SimpleFormatter { styles: log_styles })
                .with_writer(std::io::stderr)
                .with_filter(targets);

            tracing_subscriber::registry().with(layer).init();

            if let Some(invalid) = invalid {
                warn!("ignoring invalid {LOG_ENV} value `{invalid}`");
            }
        });
    }

    pub(crate) fn should_colorize(self, stream: supports_color::Stream) -> bool {
        match self {
            Color::Auto => supports_color::on_cached(stream).is_some(),
            Color::Always => true,
            Color::Never => false,
        }
    }
}

/// Builds the log filter from the environment, falling back to `default_level`.
///
/// Returns the rejected value alongside the fallback if the environment variable doesn't parse.
fn log_targets(
    value: Option<std::ffi::OsString>,
    default_level: LevelFilter,
) -> (Targets, Option<String>) {
    let fallback = || Targets::new().with_default(default_level);
    let Some(value) = value else {
        return (fallback(), None);
    };
    let value = value.to_string_lossy();

    // If the level string is empty, use the standard level filter instead.
    if value.is_empty() {
        return (fallback(), None);
    }
    match value.parse() {
        Ok(targets) => (targets, None),
        Err(_) => (fallback(), Some(value.into_owned())),
    }
}

/// Styles for log headings and structured fields. Info and debug headings share one style.
#[derive(Debug, Default)]
struct LogStyles {
    error: Style,
    warning: Style,
    detail: Style,
    field: Style,
}

impl LogStyles {
    fn colorize(&mut self) {
        self.error = style().red().bold();
        self.warning = style().yellow().bold();
        self.detail = style().bold();
        self.field = style().dimmed();
    }

    fn heading(&self, level: Level) -> (&'static str, Style) {
        match level {
            Level::ERROR => ("error", self.error),
            Level::WARN => ("warning", self.warning),
            Level::INFO => ("info", self.detail),
            Level::DEBUG => ("debug", self.detail),
            Level::TRACE => ("trace", self.field),
        }
    }
}

/// Styles for messages printed to stderr.
#[derive(Debug, Default)]
pub struct StderrStyles {
    pub(crate) bold: Style,
}

impl StderrStyles {
    fn colorize(&mut self) {
        self.bold = style().bold();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn headings_by_level() {
        let mut styles = LogStyles::default();
        styles.colorize();
        assert_eq!(styles.heading(Level::ERROR), ("error", style().red().bold()));
        assert_eq!(styles.heading(Level::WARN), ("warning", style().yellow().bold()));
        assert_eq!(styles.heading(Level::INFO).1, styles.heading(Level::DEBUG).1);
        assert_eq!(styles.heading(Level::TRACE), ("trace", style().dimmed()));
    }

    #[test]
    fn log_targets_default() {
        let (targets, invalid) = log_targets(None, LevelFilter::INFO);
        assert!(invalid.is_none());
        assert!(targets.would_enable("gallio_junit", &Level::INFO));
        assert!(!targets.would_enable("gallio_junit", &Level::DEBUG));

        let (targets, invalid) = log_targets(Some("".into()), LevelFilter::DEBUG);
        assert!(invalid.is_none());
        assert!(targets.would_enable("gallio_junit::split", &Level::DEBUG));
    }

    #[test]
    fn log_targets_from_env() {
        let (targets, invalid) = log_targets(
            Some("warn,gallio_junit::split=trace".into()),
            LevelFilter::INFO,
        );
        assert!(invalid.is_none());
        assert!(targets.would_enable("gallio_junit::split", &Level::TRACE));
        assert!(!targets.would_enable("gallio_junit::converter", &Level::INFO));
    }

    #[test]
    fn log_targets_invalid() {
        let (targets, invalid) = log_targets(Some("gallio=loud".into()), LevelFilter::INFO);
        assert_eq!(invalid.as_deref(), Some("gallio=loud"));
        assert!(targets.would_enable("gallio_junit", &Level::INFO));
    }
}
