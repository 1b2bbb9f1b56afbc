use std::fmt;

use thiserror::Error;

/// Failure to resolve a domain's mail exchangers.
#[cfg_attr(feature = "with-serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DnsError {
    #[error("domain {domain} does not exist")]
    NotFound { domain: String },
    #[error("DNS lookup for {domain} timed out")]
    Timeout { domain: String },
    #[error("DNS lookup for {domain} failed: {detail}")]
    ServerFailure { domain: String, detail: String },
}

#[cfg_attr(feature = "with-serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DnsErrorKind {
    NotFound,
    Timeout,
    ServerFailure,
}

impl DnsError {
    pub fn kind(&self) -> DnsErrorKind {
        match self {
            Self::NotFound { .. } => DnsErrorKind::NotFound,
            Self::Timeout { .. } => DnsErrorKind::Timeout,
            Self::ServerFailure { .. } => DnsErrorKind::ServerFailure,
        }
    }

    pub(crate) fn server_failure(domain: &str, detail: impl fmt::Display) -> Self {
        Self::ServerFailure {
            domain: domain.to_string(),
            detail: detail.to_string(),
        }
    }
}

impl fmt::Display for DnsErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => f.write_str("not found"),
            Self::Timeout => f.write_str("timeout"),
            Self::ServerFailure => f.write_str("server failure"),
        }
    }
}

#[derive(Debug, Error)]
#[error("resolver initialization failed: {detail}")]
pub struct ResolverInitError {
    pub detail: String,
}

impl ResolverInitError {
    pub(crate) fn new(detail: impl fmt::Display) -> Self {
        Self {
            detail: detail.to_string(),
        }
    }
}
