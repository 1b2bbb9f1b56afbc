//! Mail-exchanger resolution.
//!
//! The public entry point is [`resolve_mx`], which queries MX records through a
//! [`LookupMx`] implementation and returns them ordered by preference. The
//! system resolver ([`SystemResolver`]) is the production implementation.

mod error;
mod resolver;
mod types;

pub use error::{DnsError, DnsErrorKind, ResolverInitError};
pub use resolver::{LookupMx, SystemResolver, resolve_mx};
pub use types::MxRecord;

#[cfg(test)]
pub(crate) mod tests;
