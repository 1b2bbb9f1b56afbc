//! Email validation pipeline.
//!
//! [`EmailValidator`] runs the format check, resolves the domain's mail
//! exchangers and probes them over SMTP, stopping at the first stage that
//! fails. Every call yields exactly one [`ValidationResult`]; stage failures
//! are encoded in the result and never returned as errors.

mod options;
mod types;

pub use options::ValidatorOptions;
pub use types::{ResultSummary, Stage, ValidationResult, Verdict};

use tracing::debug;

use crate::mx::{DnsError, LookupMx, ResolverInitError, SystemResolver, resolve_mx};
use crate::smtp::{ProbeHost, ProbeOptions, SmtpProber, probe_exchangers};
use crate::syntax;

/// Anything that turns an address into a [`ValidationResult`].
pub trait Validate {
    fn validate(&self, email: &str) -> ValidationResult;
}

impl<F> Validate for F
where
    F: Fn(&str) -> ValidationResult,
{
    fn validate(&self, email: &str) -> ValidationResult {
        self(email)
    }
}

pub struct EmailValidator<R = SystemResolver, P = SmtpProber> {
    resolver: R,
    prober: P,
    options: ValidatorOptions,
}

impl EmailValidator {
    /// Validator backed by the system resolver and a TCP prober.
    pub fn system(
        options: ValidatorOptions,
        probe: ProbeOptions,
    ) -> Result<Self, ResolverInitError> {
        let resolver = SystemResolver::new(options.timeout)?;
        Ok(Self::with_parts(resolver, SmtpProber::new(probe), options))
    }
}

impl<R, P> EmailValidator<R, P>
where
    R: LookupMx,
    P: ProbeHost,
{
    pub fn with_parts(resolver: R, prober: P, options: ValidatorOptions) -> Self {
        Self {
            resolver,
            prober,
            options,
        }
    }

    pub fn options(&self) -> &ValidatorOptions {
        &self.options
    }

    fn run_stages(&self, email: &str) -> ValidationResult {
        let normalized = syntax::normalize(email);
        let domain = match syntax::domain_of(&normalized) {
            Some(domain) if syntax::check(&normalized) => domain,
            _ => {
                debug!(email, "format check failed");
                return ValidationResult::new(email, Verdict::BadFormat);
            }
        };

        let records = match resolve_mx(&self.resolver, domain) {
            Ok(records) if records.is_empty() => {
                return ValidationResult::new(
                    email,
                    Verdict::NoMailExchanger {
                        domain: domain.to_string(),
                    },
                );
            }
            Ok(records) => records,
            Err(err) => {
                debug!(email, error = %err, "mx lookup failed");
                return ValidationResult::new(email, Verdict::DnsFailure(err));
            }
        };

        let report = probe_exchangers(
            &self.prober,
            &records,
            &normalized,
            self.options.timeout,
            self.options.max_hosts,
        );
        ValidationResult::new(email, Verdict::Probed(report.outcome))
    }
}

impl<R, P> Validate for EmailValidator<R, P>
where
    R: LookupMx,
    P: ProbeHost,
{
    fn validate(&self, email: &str) -> ValidationResult {
        self.run_stages(email)
    }
}

/// Validates a single address with default options and the system resolver.
pub fn validate(email: &str) -> ValidationResult {
    let normalized = syntax::normalize(email);
    let Some(domain) = syntax::domain_of(&normalized).filter(|_| syntax::check(&normalized))
    else {
        return ValidationResult::new(email, Verdict::BadFormat);
    };
    match EmailValidator::system(ValidatorOptions::default(), ProbeOptions::default()) {
        Ok(validator) => validator.run_stages(email),
        Err(err) => ValidationResult::new(
            email,
            Verdict::DnsFailure(DnsError::server_failure(domain, err)),
        ),
    }
}
