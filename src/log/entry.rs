//! # Log entry data model.
//!
//! [`Severity`] is a closed set of three levels. Text or numeric input that
//! names anything else is rejected with [`HostError::InvalidSeverity`].

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Local};

use crate::error::HostError;

/// Severity of a status message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Severity {
    /// Routine lifecycle messages.
    Information,
    /// Handled failures; the worker keeps running.
    Warning,
    /// Fatal failures and escalations.
    Error,
}

impl Severity {
    /// Stable name, as rendered by the `{severity}` template slot.
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Information => "Information",
            Severity::Warning => "Warning",
            Severity::Error => "Error",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = HostError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "information" | "info" => Ok(Severity::Information),
            "warning" | "warn" => Ok(Severity::Warning),
            "error" => Ok(Severity::Error),
            _ => Err(HostError::InvalidSeverity {
                value: s.to_string(),
            }),
        }
    }
}

impl TryFrom<u8> for Severity {
    type Error = HostError;

    /// `1` = Information, `2` = Warning, `3` = Error.
    fn try_from(value: u8) -> Result<Self, HostError> {
        match value {
            1 => Ok(Severity::Information),
            2 => Ok(Severity::Warning),
            3 => Ok(Severity::Error),
            n => Err(HostError::InvalidSeverity {
                value: n.to_string(),
            }),
        }
    }
}

/// One status message.
#[derive(Clone, Debug)]
pub struct LogEntry {
    /// Name of the group the message is attributed to.
    pub source: Arc<str>,
    /// Message text.
    pub message: String,
    /// Severity.
    pub severity: Severity,
    /// Local wall-clock time of creation.
    pub timestamp: DateTime<Local>,
}

impl LogEntry {
    /// Creates an entry stamped with the current local time.
    pub fn new(source: impl Into<Arc<str>>, message: impl Into<String>, severity: Severity) -> Self {
        Self {
            source: source.into(),
            message: message.into(),
            severity,
            timestamp: Local::now(),
        }
    }

    /// Replaces the timestamp.
    #[inline]
    pub fn with_timestamp(mut self, at: DateTime<Local>) -> Self {
        self.timestamp = at;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_parsing_is_closed() {
        assert_eq!("WARN".parse::<Severity>().unwrap(), Severity::Warning);
        assert_eq!(Severity::try_from(3).unwrap(), Severity::Error);
        assert!("fatal".parse::<Severity>().is_err());
        assert!(Severity::try_from(0).is_err());
        assert!(Severity::try_from(4).is_err());
    }

    #[test]
    fn test_entry_keeps_source() {
        let e = LogEntry::new("feeds", "hello", Severity::Information);
        assert_eq!(&*e.source, "feeds");
        assert_eq!(e.severity.to_string(), "Information");
    }
}
