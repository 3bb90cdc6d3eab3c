//! # Host and worker configuration.
//!
//! - [`Intervals`] - per-worker success/failure waits;
//! - [`HostMode`] - OS service vs. interactive console hosting;
//! - [`HostConfig`] - settings consumed by [`ControlManager`](crate::ControlManager).
//!
//! ## Sentinel values
//! - `success = 0s` → poll continuously
//! - `instrumentation_key = None` or blank → no telemetry mirror

use std::fmt;
use std::io::IsTerminal;
use std::str::FromStr;
use std::time::Duration;

use crate::error::HostError;
use crate::log::ConsoleStyle;

/// Waits applied between polling cycles.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Intervals {
    /// Wait after a clean cycle.
    pub success: Duration,
    /// Wait after a handled recoverable failure.
    pub failure: Duration,
}

impl Intervals {
    /// Creates intervals from explicit durations.
    pub const fn new(success: Duration, failure: Duration) -> Self {
        Self { success, failure }
    }

    /// Creates intervals from millisecond counts.
    pub const fn from_millis(success: u64, failure: u64) -> Self {
        Self::new(
            Duration::from_millis(success),
            Duration::from_millis(failure),
        )
    }
}

impl Default for Intervals {
    /// Returns `success = 0s` (continuous polling) and `failure = 60s`.
    fn default() -> Self {
        Self::from_millis(0, 60_000)
    }
}

/// How the process is hosted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HostMode {
    /// Managed by the OS service subsystem; logs go to the host log.
    Service,
    /// Attached to a console; logs go to the terminal.
    Interactive,
}

impl HostMode {
    /// Picks `Interactive` when both stdin and stdout are terminals, `Service` otherwise.
    pub fn detect() -> Self {
        if std::io::stdin().is_terminal() && std::io::stdout().is_terminal() {
            HostMode::Interactive
        } else {
            HostMode::Service
        }
    }

    /// Stable lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            HostMode::Service => "service",
            HostMode::Interactive => "interactive",
        }
    }
}

impl fmt::Display for HostMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HostMode {
    type Err = HostError;

    /// Accepts `service`, `interactive` and `console` (case-insensitive).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "service" => Ok(HostMode::Service),
            "interactive" | "console" => Ok(HostMode::Interactive),
            _ => Err(HostError::InvalidMode {
                value: s.to_string(),
            }),
        }
    }
}

/// Settings for a [`ControlManager`](crate::ControlManager).
///
/// ## Field semantics
/// - `mode`: hosting mode (`None` = [`HostMode::detect`])
/// - `args`: forwarded verbatim to every worker's start hook
/// - `redirect_log`: in interactive mode, write to the console instead of the host log
/// - `console`: colors and message template of the console log
/// - `instrumentation_key`: enables the telemetry mirror in service mode
#[derive(Clone, Debug)]
pub struct HostConfig {
    /// Hosting mode; detected when unset.
    pub mode: Option<HostMode>,
    /// Start arguments for the workers.
    pub args: Vec<String>,
    /// Route interactive logging to the console.
    pub redirect_log: bool,
    /// Console styling used when `redirect_log` is set.
    pub console: ConsoleStyle,
    /// Telemetry instrumentation key.
    pub instrumentation_key: Option<String>,
}

impl HostConfig {
    /// Returns the configured mode, detecting it when unset.
    #[inline]
    pub fn resolved_mode(&self) -> HostMode {
        self.mode.unwrap_or_else(HostMode::detect)
    }

    /// Returns the instrumentation key when it is set and not blank.
    #[inline]
    pub fn telemetry_key(&self) -> Option<&str> {
        self.instrumentation_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
    }
}

impl Default for HostConfig {
    /// Default configuration:
    ///
    /// - `mode = None` (detect)
    /// - `args = []`
    /// - `redirect_log = true`
    /// - `console = ConsoleStyle::default()` (green / yellow / red)
    /// - `instrumentation_key = None`
    fn default() -> Self {
        Self {
            mode: None,
            args: Vec::new(),
            redirect_log: true,
            console: ConsoleStyle::default(),
            instrumentation_key: None,
        }
    }
}
