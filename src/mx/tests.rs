use super::{DnsError, DnsErrorKind, LookupMx, MxRecord, resolve_mx, resolver};

type LookupResult = Result<Vec<MxRecord>, DnsError>;
type LookupFn = dyn Fn(&str) -> LookupResult + Send + Sync;

pub(crate) struct StubResolver {
    pub on_lookup: Box<LookupFn>,
}

impl StubResolver {
    pub(crate) fn new<F>(f: F) -> Self
    where
        F: Fn(&str) -> LookupResult + Send + Sync + 'static,
    {
        Self {
            on_lookup: Box::new(f),
        }
    }

    pub(crate) fn records(records: Vec<MxRecord>) -> Self {
        Self::new(move |_| Ok(records.clone()))
    }
}

impl LookupMx for StubResolver {
    fn lookup_mx(&self, domain: &str) -> LookupResult {
        (self.on_lookup)(domain)
    }
}

#[test]
fn resolve_sorts_by_preference() {
    let stub = StubResolver::new(|domain| {
        assert_eq!(domain, "example.com");
        Ok(vec![
            MxRecord::new("mx2.example.com", 20),
            MxRecord::new("mx1.example.com", 10),
            MxRecord::new("mx1.example.com", 10),
            MxRecord::new("mx3.example.com", 30),
        ])
    });

    let records = resolve_mx(&stub, "example.com").expect("lookup succeeds");
    assert_eq!(records.len(), 3);
    assert_eq!(records[0], MxRecord::new("mx1.example.com", 10));
    assert_eq!(records[2].preference, 30);
}

#[test]
fn ties_keep_resolver_order() {
    let stub = StubResolver::records(vec![
        MxRecord::new("b.example.com", 10),
        MxRecord::new("backup.example.com", 50),
        MxRecord::new("a.example.com", 10),
    ]);

    let records = resolve_mx(&stub, "example.com").expect("lookup succeeds");
    let hosts: Vec<&str> = records.iter().map(|r| r.host.as_str()).collect();
    assert_eq!(hosts, ["b.example.com", "a.example.com", "backup.example.com"]);
}

#[test]
fn duplicates_are_dropped_within_a_tie() {
    let stub = StubResolver::records(vec![
        MxRecord::new("a.example.com.", 10),
        MxRecord::new("b.example.com", 10),
        MxRecord::new("A.example.com", 10),
    ]);

    let records = resolve_mx(&stub, "example.com").expect("lookup succeeds");
    let hosts: Vec<&str> = records.iter().map(|r| r.host.as_str()).collect();
    assert_eq!(hosts, ["a.example.com", "b.example.com"]);
}

#[test]
fn no_records_is_not_an_error() {
    let stub = StubResolver::records(Vec::new());
    let records = resolve_mx(&stub, "example.com").expect("lookup succeeds");
    assert!(records.is_empty());
}

#[test]
fn null_mx_resolves_to_empty() {
    let stub = StubResolver::records(vec![MxRecord::new(".", 0)]);
    let records = resolve_mx(&stub, "example.com").expect("lookup succeeds");
    assert!(records.is_empty());
}

#[test]
fn lookup_errors_surface_with_kind() {
    let stub = StubResolver::new(|domain| {
        Err(DnsError::Timeout {
            domain: domain.to_string(),
        })
    });
    let err = resolve_mx(&stub, "slow.example").expect_err("timeout surfaces");
    assert_eq!(err.kind(), DnsErrorKind::Timeout);
    assert_eq!(err.to_string(), "DNS lookup for slow.example timed out");
}

#[test]
fn empty_domain_is_not_found() {
    let stub = StubResolver::new(|_| panic!("resolver must not be queried"));
    let err = resolve_mx(&stub, "  ").expect_err("empty domain fails");
    assert_eq!(err.kind(), DnsErrorKind::NotFound);
}

#[test]
fn normalize_exchange_trims_dot_and_lowercases() {
    let out = resolver::normalize_exchange("Mail.EXAMPLE.com.");
    assert_eq!(out, "mail.example.com");
}
