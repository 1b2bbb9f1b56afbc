//! Live SMTP recipient probing.
//!
//! [`probe_exchangers`] walks a preference-ordered MX list and runs one
//! greeting / `HELO` / `MAIL FROM` / `RCPT TO` / `QUIT` dialogue per host
//! until a host answers the `RCPT TO`. No message content is ever sent.
//! Connection-level failures move on to the next host; the first `RCPT TO`
//! reply settles the outcome.

mod error;
mod options;
mod probe;
mod session;
mod types;

pub use error::{SmtpError, SmtpErrorKind};
pub use options::ProbeOptions;
pub use probe::{ProbeHost, SmtpProber, probe_exchangers};
pub use session::Transport;
pub use types::{
    AttemptOutcome, Disposition, HostAttempt, ProbeReport, ProbeStage, RecipientStatus,
    SmtpEvent, SmtpOutcome, SmtpReply,
};
