use std::fmt;
use std::io;
use std::time::Duration;

use thiserror::Error;

use super::types::ProbeStage;

/// Why a mail exchanger was abandoned before it answered `RCPT TO`.
#[cfg_attr(feature = "with-serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SmtpError {
    #[error("connection to {host} failed: {detail}")]
    ConnectionFailed { host: String, detail: String },
    #[error("{host} timed out during {stage} (budget {budget:?})")]
    Timeout {
        host: String,
        stage: ProbeStage,
        budget: Duration,
    },
    #[error("protocol error with {host} during {stage}: {detail}")]
    Protocol {
        host: String,
        stage: ProbeStage,
        detail: String,
    },
}

#[cfg_attr(feature = "with-serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SmtpErrorKind {
    ConnectionFailed,
    Timeout,
    ProtocolError,
}

impl SmtpError {
    pub fn kind(&self) -> SmtpErrorKind {
        match self {
            Self::ConnectionFailed { .. } => SmtpErrorKind::ConnectionFailed,
            Self::Timeout { .. } => SmtpErrorKind::Timeout,
            Self::Protocol { .. } => SmtpErrorKind::ProtocolError,
        }
    }

    pub fn host(&self) -> &str {
        match self {
            Self::ConnectionFailed { host, .. }
            | Self::Timeout { host, .. }
            | Self::Protocol { host, .. } => host,
        }
    }

    pub(crate) fn protocol(host: &str, stage: ProbeStage, detail: impl fmt::Display) -> Self {
        Self::Protocol {
            host: host.to_string(),
            stage,
            detail: detail.to_string(),
        }
    }

    /// Maps a socket error observed during `stage` onto the probe taxonomy.
    pub(crate) fn from_io(host: &str, stage: ProbeStage, budget: Duration, err: &io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => Self::Timeout {
                host: host.to_string(),
                stage,
                budget,
            },
            io::ErrorKind::InvalidData => Self::protocol(host, stage, err),
            _ => Self::ConnectionFailed {
                host: host.to_string(),
                detail: err.to_string(),
            },
        }
    }
}

impl fmt::Display for SmtpErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConnectionFailed => f.write_str("connection failed"),
            Self::Timeout => f.write_str("timeout"),
            Self::ProtocolError => f.write_str("protocol error"),
        }
    }
}
