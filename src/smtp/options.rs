/// Controls how [`SmtpProber`](crate::smtp::SmtpProber) talks to mail exchangers.
#[cfg_attr(feature = "with-serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeOptions {
    pub port: u16,
    /// Second port tried on the same host when the primary port cannot be
    /// reached (typically 587). Disabled by default.
    pub fallback_port: Option<u16>,
    pub helo_domain: String,
    pub mail_from: String,
}

impl Default for ProbeOptions {
    fn default() -> Self {
        Self {
            port: 25,
            fallback_port: None,
            helo_domain: "gmail.com".to_string(),
            mail_from: "test@gmail.com".to_string(),
        }
    }
}

impl ProbeOptions {
    /// Ports to try, in order.
    pub fn ports(&self) -> Vec<u16> {
        let mut ports = vec![self.port];
        if let Some(fallback) = self.fallback_port.filter(|port| *port != self.port) {
            ports.push(fallback);
        }
        ports
    }
}
