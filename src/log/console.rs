//! # ConsoleLog: colored console writer
//!
//! Writes entries to the terminal with per-severity colors and a message
//! template. The template has four slots: `{source}`, `{message}`,
//! `{severity}` and `{timestamp}`.
//!
//! ## Example output (default style)
//! ```text
//! [2026-10-19 09:12:44|feeds]
//! Worker (quotes) started successfully.
//! ```
//!
//! ## Rules
//! - Every write holds one process-wide console lock, so colored lines from
//!   different workers never interleave.
//! - Colors are reset by a drop guard, including when the write fails.
//! - By default Information goes to stdout, Warning and Error to stderr.

use std::io::{self, IsTerminal, Write};
use std::sync::{Mutex, PoisonError};

use crossterm::queue;
use crossterm::style::{Color, ResetColor, SetBackgroundColor, SetForegroundColor};

use super::entry::{LogEntry, Severity};
use super::sink::LogSink;

/// Guards the shared console stream and its color state.
static CONSOLE_LOCK: Mutex<()> = Mutex::new(());

/// Placeholders understood by [`EntryStyle::render`].
const SLOTS: [&str; 4] = ["{source}", "{message}", "{severity}", "{timestamp}"];

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Colors and message template for one severity.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EntryStyle {
    /// Background color (`None` keeps the terminal's).
    pub background: Option<Color>,
    /// Foreground color (`None` keeps the terminal's).
    pub foreground: Option<Color>,
    /// Message template (`None` renders `source: message`).
    pub format: Option<String>,
}

impl EntryStyle {
    /// Template used by the default style.
    pub const DEFAULT_FORMAT: &'static str = "[{timestamp}|{source}]\n{message}";

    /// Creates a style with the given colors and template.
    pub fn new(background: Option<Color>, foreground: Option<Color>, format: Option<String>) -> Self {
        Self {
            background,
            foreground,
            format,
        }
    }

    /// Foreground-only style with the default template.
    pub fn colored(foreground: Color) -> Self {
        Self::new(None, Some(foreground), Some(Self::DEFAULT_FORMAT.to_string()))
    }

    /// Renders `entry` through the template.
    ///
    /// The template is scanned once; substituted values are never expanded
    /// again, whatever braces they contain.
    pub fn render(&self, entry: &LogEntry) -> String {
        let Some(fmt) = &self.format else {
            return format!("{}: {}", entry.source, entry.message);
        };

        let mut out = String::with_capacity(fmt.len() + entry.message.len());
        let mut rest = fmt.as_str();
        while let Some(at) = rest.find('{') {
            out.push_str(&rest[..at]);
            rest = &rest[at..];
            match SLOTS.iter().find(|slot| rest.starts_with(*slot)) {
                Some(slot) => {
                    match *slot {
                        "{source}" => out.push_str(&entry.source),
                        "{message}" => out.push_str(&entry.message),
                        "{severity}" => out.push_str(entry.severity.as_str()),
                        _ => out.push_str(&entry.timestamp.format(TIMESTAMP_FORMAT).to_string()),
                    }
                    rest = &rest[slot.len()..];
                }
                None => {
                    out.push('{');
                    rest = &rest[1..];
                }
            }
        }
        out.push_str(rest);
        out
    }

    fn has_colors(&self) -> bool {
        self.background.is_some() || self.foreground.is_some()
    }
}

impl Default for EntryStyle {
    /// No colors, default template.
    fn default() -> Self {
        Self::new(None, None, Some(Self::DEFAULT_FORMAT.to_string()))
    }
}

/// One [`EntryStyle`] per severity.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConsoleStyle {
    /// Style for [`Severity::Information`].
    pub information: EntryStyle,
    /// Style for [`Severity::Warning`].
    pub warning: EntryStyle,
    /// Style for [`Severity::Error`].
    pub error: EntryStyle,
}

impl ConsoleStyle {
    /// Uses the same style for all severities.
    pub fn uniform(style: EntryStyle) -> Self {
        Self {
            information: style.clone(),
            warning: style.clone(),
            error: style,
        }
    }

    /// Returns the style for `severity`.
    pub fn for_severity(&self, severity: Severity) -> &EntryStyle {
        match severity {
            Severity::Information => &self.information,
            Severity::Warning => &self.warning,
            Severity::Error => &self.error,
        }
    }
}

impl Default for ConsoleStyle {
    /// Green information, yellow warnings, red errors.
    fn default() -> Self {
        Self {
            information: EntryStyle::colored(Color::Green),
            warning: EntryStyle::colored(Color::Yellow),
            error: EntryStyle::colored(Color::Red),
        }
    }
}

/// Which standard stream a [`ConsoleLog`] writes to.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ConsoleTarget {
    /// Information to stdout, Warning and Error to stderr.
    #[default]
    BySeverity,
    /// Everything to stdout.
    Out,
    /// Everything to stderr.
    Error,
    /// Discard output.
    None,
}

enum Stream {
    Out,
    Err,
    Null,
}

/// Console log sink.
#[derive(Clone, Debug)]
pub struct ConsoleLog {
    target: ConsoleTarget,
    style: ConsoleStyle,
    colors: bool,
}

impl ConsoleLog {
    /// Creates a console log with the given style; colors are enabled when a
    /// standard stream is a terminal.
    #[must_use]
    pub fn new(style: ConsoleStyle) -> Self {
        Self {
            target: ConsoleTarget::default(),
            style,
            colors: io::stdout().is_terminal() || io::stderr().is_terminal(),
        }
    }

    /// Overrides the output stream.
    #[must_use]
    pub fn with_target(mut self, target: ConsoleTarget) -> Self {
        self.target = target;
        self
    }

    /// Forces colors on or off.
    #[must_use]
    pub fn with_colors(mut self, colors: bool) -> Self {
        self.colors = colors;
        self
    }

    /// The style in use.
    pub fn style(&self) -> &ConsoleStyle {
        &self.style
    }

    fn stream_for(&self, severity: Severity) -> Stream {
        match (self.target, severity) {
            (ConsoleTarget::None, _) => Stream::Null,
            (ConsoleTarget::Out, _) => Stream::Out,
            (ConsoleTarget::Error, _) => Stream::Err,
            (ConsoleTarget::BySeverity, Severity::Information) => Stream::Out,
            (ConsoleTarget::BySeverity, _) => Stream::Err,
        }
    }

    fn emit<W: Write>(&self, w: &mut W, style: &EntryStyle, text: &str) -> io::Result<()> {
        let mut guard = ColorGuard {
            w,
            active: self.colors && style.has_colors(),
        };
        if guard.active {
            if let Some(bg) = style.background {
                queue!(guard.w, SetBackgroundColor(bg))?;
            }
            if let Some(fg) = style.foreground {
                queue!(guard.w, SetForegroundColor(fg))?;
            }
        }
        writeln!(guard.w, "{text}")?;
        guard.w.flush()
    }
}

impl Default for ConsoleLog {
    fn default() -> Self {
        Self::new(ConsoleStyle::default())
    }
}

impl LogSink for ConsoleLog {
    fn write(&self, e: &LogEntry) {
        let style = self.style.for_severity(e.severity);
        let text = style.render(e);

        let _console = CONSOLE_LOCK.lock().unwrap_or_else(PoisonError::into_inner);
        // console failures have nowhere to be reported
        let _ = match self.stream_for(e.severity) {
            Stream::Out => self.emit(&mut io::stdout().lock(), style, &text),
            Stream::Err => self.emit(&mut io::stderr().lock(), style, &text),
            Stream::Null => Ok(()),
        };
    }

    fn name(&self) -> &'static str {
        "ConsoleLog"
    }
}

/// Resets terminal colors when dropped.
struct ColorGuard<'a, W: Write> {
    w: &'a mut W,
    active: bool,
}

impl<W: Write> Drop for ColorGuard<'_, W> {
    fn drop(&mut self) {
        if self.active {
            let _ = queue!(self.w, ResetColor);
            let _ = self.w.flush();
        }
    }
}
