use std::fmt;

use super::error::SmtpError;

#[cfg_attr(feature = "with-serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeStage {
    Connect,
    Greeting,
    Helo,
    MailFrom,
    RcptTo,
    Quit,
}

impl fmt::Display for ProbeStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Connect => "connect",
            Self::Greeting => "greeting",
            Self::Helo => "HELO",
            Self::MailFrom => "MAIL FROM",
            Self::RcptTo => "RCPT TO",
            Self::Quit => "QUIT",
        })
    }
}

/// A raw SMTP reply, preserving the numeric status code and message text.
#[cfg_attr(feature = "with-serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmtpReply {
    pub code: u16,
    pub message: String,
}

impl SmtpReply {
    pub fn new(code: u16, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn is_positive_completion(&self) -> bool {
        (200..300).contains(&self.code)
    }

    pub fn is_transient_failure(&self) -> bool {
        (400..500).contains(&self.code)
    }

    pub fn is_permanent_failure(&self) -> bool {
        (500..600).contains(&self.code)
    }
}

impl fmt::Display for SmtpReply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = self.message.lines().collect::<Vec<_>>().join(" ");
        if text.is_empty() {
            write!(f, "{}", self.code)
        } else {
            write!(f, "{} {}", self.code, text)
        }
    }
}

/// A recorded SMTP transcript event used for diagnostics.
#[cfg_attr(feature = "with-serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SmtpEvent {
    Sent { stage: ProbeStage, command: String },
    Received { stage: ProbeStage, reply: SmtpReply },
    Error { stage: ProbeStage, message: String },
}

/// How a mail exchanger answered `RCPT TO`.
#[cfg_attr(feature = "with-serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecipientStatus {
    /// 250 / 251.
    Accepted,
    /// Any 5xx: the mailbox is unknown or refused.
    Rejected,
    /// Any 4xx (greylisting, rate limits, full mailbox).
    TemporaryFailure,
    /// Anything else, e.g. 252 or a stray 3xx.
    Unexpected,
}

impl RecipientStatus {
    pub fn classify(reply: &SmtpReply) -> Self {
        match reply.code {
            250 | 251 => Self::Accepted,
            _ if reply.is_permanent_failure() => Self::Rejected,
            _ if reply.is_transient_failure() => Self::TemporaryFailure,
            _ => Self::Unexpected,
        }
    }
}

/// Whether the host loop stops at an attempt or moves to the next exchanger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Terminal,
    TryNextHost,
}

/// Outcome of a dialogue with a single mail exchanger.
#[cfg_attr(feature = "with-serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    Answered {
        status: RecipientStatus,
        reply: SmtpReply,
    },
    Abandoned(SmtpError),
}

impl AttemptOutcome {
    /// A `RCPT TO` reply of any kind is terminal; everything before it
    /// (refused connection, timeout, bad greeting, refused `HELO` or
    /// `MAIL FROM`) sends the probe to the next exchanger.
    pub fn disposition(&self) -> Disposition {
        match self {
            Self::Answered { .. } => Disposition::Terminal,
            Self::Abandoned(_) => Disposition::TryNextHost,
        }
    }
}

/// Detailed record of one mail exchanger interrogation.
#[cfg_attr(feature = "with-serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostAttempt {
    pub host: String,
    pub address: Option<String>,
    pub events: Vec<SmtpEvent>,
    pub outcome: AttemptOutcome,
}

impl HostAttempt {
    pub fn new(host: impl Into<String>, outcome: AttemptOutcome) -> Self {
        Self {
            host: host.into(),
            address: None,
            events: Vec::new(),
            outcome,
        }
    }
}

/// Final SMTP verdict for one recipient across its exchanger list.
#[cfg_attr(feature = "with-serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SmtpOutcome {
    Accepted {
        host: String,
        reply: SmtpReply,
    },
    /// Definitive rejection (5xx).
    Rejected {
        host: String,
        reply: SmtpReply,
    },
    /// Indeterminate: the server deferred the recipient (4xx).
    TemporaryFailure {
        host: String,
        reply: SmtpReply,
    },
    /// Indeterminate: a reply code outside the accept / reject families.
    Unexpected {
        host: String,
        reply: SmtpReply,
    },
    /// Every candidate was abandoned before answering `RCPT TO`.
    NoReachableHost {
        tried: usize,
        last_error: Option<SmtpError>,
    },
}

impl SmtpOutcome {
    pub(crate) fn answered(host: &str, status: RecipientStatus, reply: SmtpReply) -> Self {
        let host = host.to_string();
        match status {
            RecipientStatus::Accepted => Self::Accepted { host, reply },
            RecipientStatus::Rejected => Self::Rejected { host, reply },
            RecipientStatus::TemporaryFailure => Self::TemporaryFailure { host, reply },
            RecipientStatus::Unexpected => Self::Unexpected { host, reply },
        }
    }

    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted { .. })
    }

    /// `true` for outcomes that settle the mailbox either way.
    pub fn is_definitive(&self) -> bool {
        matches!(self, Self::Accepted { .. } | Self::Rejected { .. })
    }

    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            Self::NoReachableHost {
                last_error: Some(SmtpError::Timeout { .. }),
                ..
            }
        )
    }
}

impl fmt::Display for SmtpOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Accepted { reply, .. } => {
                write!(f, "email verified successfully ({reply})")
            }
            Self::Rejected { reply, .. } => {
                write!(f, "rejected, definitive ({reply})")
            }
            Self::TemporaryFailure { reply, .. } => {
                write!(f, "indeterminate, temporary failure ({reply})")
            }
            Self::Unexpected { reply, .. } => {
                write!(f, "indeterminate, unexpected reply to RCPT TO ({reply})")
            }
            Self::NoReachableHost { tried, last_error } => {
                write!(f, "no reachable mail exchanger (tried {tried}")?;
                if let Some(err) = last_error {
                    write!(f, "; last error: {err}")?;
                }
                f.write_str(")")
            }
        }
    }
}

/// Everything observed while probing one recipient.
#[cfg_attr(feature = "with-serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeReport {
    pub outcome: SmtpOutcome,
    pub attempts: Vec<HostAttempt>,
}
