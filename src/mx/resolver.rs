use std::collections::HashSet;
use std::time::Duration;

use tracing::debug;
use trust_dns_resolver::{
    Resolver,
    error::{ResolveError, ResolveErrorKind},
    proto::op::ResponseCode,
    system_conf,
};

use super::{DnsError, MxRecord, ResolverInitError};

/// Source of raw MX records for a domain.
///
/// Implementations report "domain exists but has no MX" as `Ok(vec![])` and
/// keep `Err` for NXDOMAIN, timeouts and server failures.
pub trait LookupMx {
    fn lookup_mx(&self, domain: &str) -> Result<Vec<MxRecord>, DnsError>;
}

impl<T: LookupMx + ?Sized> LookupMx for &T {
    fn lookup_mx(&self, domain: &str) -> Result<Vec<MxRecord>, DnsError> {
        (**self).lookup_mx(domain)
    }
}

/// Resolves `domain` and returns its mail exchangers, lowest preference first.
///
/// Records sharing a preference keep the order the resolver returned them in.
/// Null MX entries (`MX 0 .`) are dropped, so a domain that explicitly refuses
/// mail resolves to an empty list.
pub fn resolve_mx<R>(resolver: &R, domain: &str) -> Result<Vec<MxRecord>, DnsError>
where
    R: LookupMx + ?Sized,
{
    let domain = domain.trim().trim_end_matches('.');
    if domain.is_empty() {
        return Err(DnsError::NotFound {
            domain: String::new(),
        });
    }

    let mut records: Vec<MxRecord> = resolver
        .lookup_mx(domain)?
        .into_iter()
        .map(|record| MxRecord::new(normalize_exchange(&record.host), record.preference))
        .filter(|record| !record.host.is_empty())
        .collect();

    records.sort_by_key(|record| record.preference);
    let mut seen = HashSet::new();
    records.retain(|record| seen.insert(record.clone()));

    debug!(domain, count = records.len(), "mx lookup complete");
    Ok(records)
}

pub(crate) fn normalize_exchange(exchange: &str) -> String {
    let trimmed = exchange.trim().trim_end_matches('.');
    trimmed.to_ascii_lowercase()
}

/// [`LookupMx`] backed by the operating system's resolver configuration.
pub struct SystemResolver {
    inner: Resolver,
}

impl SystemResolver {
    /// Builds a resolver from the system configuration, bounding each query
    /// by `timeout`.
    pub fn new(timeout: Duration) -> Result<Self, ResolverInitError> {
        let (config, mut opts) = system_conf::read_system_conf().map_err(ResolverInitError::new)?;
        opts.timeout = timeout;
        opts.attempts = 1;
        let inner = Resolver::new(config, opts).map_err(ResolverInitError::new)?;
        Ok(Self { inner })
    }
}

impl LookupMx for SystemResolver {
    fn lookup_mx(&self, domain: &str) -> Result<Vec<MxRecord>, DnsError> {
        match self.inner.mx_lookup(domain) {
            Ok(lookup) => Ok(lookup
                .iter()
                .map(|mx| MxRecord::new(mx.exchange().to_utf8(), mx.preference()))
                .collect()),
            Err(err) => classify_failure(domain, &err),
        }
    }
}

fn classify_failure(domain: &str, err: &ResolveError) -> Result<Vec<MxRecord>, DnsError> {
    match err.kind() {
        ResolveErrorKind::NoRecordsFound { response_code, .. } => match response_code {
            ResponseCode::NoError => Ok(Vec::new()),
            ResponseCode::NXDomain => Err(DnsError::NotFound {
                domain: domain.to_string(),
            }),
            other => Err(DnsError::server_failure(domain, other)),
        },
        ResolveErrorKind::Timeout => Err(DnsError::Timeout {
            domain: domain.to_string(),
        }),
        _ => Err(DnsError::server_failure(domain, err)),
    }
}
