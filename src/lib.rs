#![forbid(unsafe_code)]
//! mailprobe: e-mail deliverability checks without sending mail
//! (format → MX → SMTP `RCPT TO`), plus a rate-limited batch runner.

pub mod batch;
pub mod mx;
pub mod smtp;
pub mod syntax;
pub mod validator;

pub use batch::{BatchOptions, BatchReport, BatchRunner, CancelFlag, EmailRecord, Row};
pub use mx::{DnsError, DnsErrorKind, LookupMx, MxRecord, ResolverInitError, SystemResolver};
pub use smtp::{
    ProbeHost, ProbeOptions, SmtpError, SmtpErrorKind, SmtpOutcome, SmtpProber, SmtpReply,
};
pub use validator::{
    EmailValidator, ResultSummary, Stage, Validate, ValidationResult, ValidatorOptions, Verdict,
    validate,
};
