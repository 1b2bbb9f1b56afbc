use std::fmt;

use crate::mx::DnsError;
use crate::smtp::SmtpOutcome;

/// Last stage a validation attempted.
#[cfg_attr(feature = "with-serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "with-serde", serde(rename_all = "UPPERCASE"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stage {
    Format,
    Dns,
    Smtp,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Format => "FORMAT",
            Self::Dns => "DNS",
            Self::Smtp => "SMTP",
        })
    }
}

/// Where a validation stopped and why. One variant per exit point of the
/// format → DNS → SMTP pipeline.
#[cfg_attr(feature = "with-serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    BadFormat,
    NoMailExchanger { domain: String },
    DnsFailure(DnsError),
    Probed(SmtpOutcome),
    /// Synthetic verdict for a validation that faulted internally.
    Internal { detail: String },
}

/// Result of validating one address. Immutable: every flag is derived from
/// the [`Verdict`], so `valid == format_valid && domain_exists && smtp_valid`
/// always holds.
#[cfg_attr(feature = "with-serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationResult {
    email: String,
    verdict: Verdict,
}

impl ValidationResult {
    pub fn new(email: impl Into<String>, verdict: Verdict) -> Self {
        Self {
            email: email.into(),
            verdict,
        }
    }

    pub fn internal_error(email: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::new(
            email,
            Verdict::Internal {
                detail: detail.into(),
            },
        )
    }

    /// The address exactly as it was submitted.
    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn verdict(&self) -> &Verdict {
        &self.verdict
    }

    pub fn format_valid(&self) -> bool {
        !matches!(self.verdict, Verdict::BadFormat | Verdict::Internal { .. })
    }

    pub fn domain_exists(&self) -> bool {
        matches!(self.verdict, Verdict::Probed(_))
    }

    pub fn smtp_valid(&self) -> bool {
        matches!(&self.verdict, Verdict::Probed(outcome) if outcome.is_accepted())
    }

    pub fn valid(&self) -> bool {
        self.format_valid() && self.domain_exists() && self.smtp_valid()
    }

    pub fn stage_reached(&self) -> Stage {
        match self.verdict {
            Verdict::BadFormat | Verdict::Internal { .. } => Stage::Format,
            Verdict::NoMailExchanger { .. } | Verdict::DnsFailure(_) => Stage::Dns,
            Verdict::Probed(_) => Stage::Smtp,
        }
    }

    /// Human-readable explanation, prefixed with the stage it came from.
    pub fn reason(&self) -> String {
        match &self.verdict {
            Verdict::BadFormat => format!("{}: invalid email format", Stage::Format),
            Verdict::NoMailExchanger { domain } => {
                format!("{}: no MX record found for {domain}", Stage::Dns)
            }
            Verdict::DnsFailure(err) => {
                format!("{}: lookup failed ({}): {err}", Stage::Dns, err.kind())
            }
            Verdict::Probed(outcome) => format!("{}: {outcome}", Stage::Smtp),
            Verdict::Internal { detail } => format!("internal error: {detail}"),
        }
    }

    /// Flat view used for report rows.
    pub fn summary(&self) -> ResultSummary {
        ResultSummary {
            email: self.email.clone(),
            format_valid: self.format_valid(),
            domain_exists: self.domain_exists(),
            smtp_valid: self.smtp_valid(),
            valid: self.valid(),
            reason: self.reason(),
            stage_reached: self.stage_reached(),
        }
    }
}

#[cfg_attr(feature = "with-serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultSummary {
    pub email: String,
    pub format_valid: bool,
    pub domain_exists: bool,
    pub smtp_valid: bool,
    pub valid: bool,
    pub reason: String,
    pub stage_reached: Stage,
}
