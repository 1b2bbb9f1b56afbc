use std::time::Duration;

/// Per-address budget and candidate limits for [`EmailValidator`](super::EmailValidator).
#[cfg_attr(feature = "with-serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatorOptions {
    /// Bounds each DNS query and each mail exchanger dialogue.
    pub timeout: Duration,
    /// How many mail exchangers to try; `None` walks the whole list.
    pub max_hosts: Option<usize>,
}

impl Default for ValidatorOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            max_hosts: None,
        }
    }
}
