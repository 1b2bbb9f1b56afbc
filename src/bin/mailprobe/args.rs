use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use mailprobe::{BatchOptions, ProbeOptions, ValidatorOptions};

#[derive(Parser, Debug)]
#[command(
    name = "mailprobe",
    version,
    about = "Nettoie une liste d'e-mails (format, MX, sonde SMTP RCPT TO) sans envoyer de message"
)]
pub struct Cli {
    /// fichier CSV d'entrée (doit contenir une colonne `email`)
    pub input: PathBuf,

    /// base des fichiers de sortie (<base>_valid.csv, <base>_invalid.csv, <base>_results.csv)
    #[arg(default_value = "cleaned_emails.csv")]
    pub output: PathBuf,

    /// pause entre deux adresses ayant atteint l'étape SMTP (secondes)
    #[arg(default_value = "1.5", value_parser = parse_delay)]
    pub delay: Duration,

    /// budget DNS + SMTP par adresse (secondes)
    #[arg(long, default_value = "10", value_parser = parse_timeout)]
    pub timeout: Duration,

    /// port SMTP sondé
    #[arg(long, default_value_t = 25)]
    pub port: u16,

    /// port de repli si le port principal est injoignable (ex. 587)
    #[arg(long = "fallback-port")]
    pub fallback_port: Option<u16>,

    /// nombre de vérifications en parallèle (1 = séquentiel)
    #[arg(long, default_value_t = 1, value_parser = parse_workers)]
    pub workers: usize,

    /// nom annoncé dans HELO
    #[arg(long)]
    pub helo: Option<String>,

    /// enveloppe MAIL FROM
    #[arg(long = "from")]
    pub mail_from: Option<String>,

    /// nombre maximum d'MX interrogés (défaut: tous)
    #[arg(long = "max-mx")]
    pub max_hosts: Option<usize>,

    /// écrit aussi chaque résultat en NDJSON sur stdout
    #[arg(long)]
    pub ndjson: bool,
}

impl Cli {
    pub fn validator_options(&self) -> ValidatorOptions {
        ValidatorOptions {
            timeout: self.timeout,
            max_hosts: self.max_hosts,
        }
    }

    pub fn probe_options(&self) -> ProbeOptions {
        let mut options = ProbeOptions {
            port: self.port,
            fallback_port: self.fallback_port,
            ..ProbeOptions::default()
        };
        if let Some(helo) = self.helo.as_deref().filter(|h| !h.trim().is_empty()) {
            options.helo_domain = helo.trim().to_string();
        }
        if let Some(from) = self.mail_from.as_deref().filter(|f| !f.trim().is_empty()) {
            options.mail_from = from.trim().to_string();
        }
        options
    }

    pub fn batch_options(&self) -> BatchOptions {
        BatchOptions {
            delay: self.delay,
            workers: self.workers,
        }
    }
}

fn parse_seconds(raw: &str) -> Result<Duration, String> {
    let secs: f64 = raw
        .trim()
        .parse()
        .map_err(|_| format!("'{raw}' is not a number of seconds"))?;
    if !secs.is_finite() || secs < 0.0 {
        return Err(format!("'{raw}' must be a non-negative number of seconds"));
    }
    Duration::try_from_secs_f64(secs).map_err(|_| format!("'{raw}' is too many seconds"))
}

fn parse_delay(raw: &str) -> Result<Duration, String> {
    parse_seconds(raw)
}

fn parse_timeout(raw: &str) -> Result<Duration, String> {
    let timeout = parse_seconds(raw)?;
    if timeout.is_zero() {
        return Err("timeout must be greater than zero".to_string());
    }
    Ok(timeout)
}

fn parse_workers(raw: &str) -> Result<usize, String> {
    match raw.trim().parse::<usize>() {
        Ok(n) if (1..=32).contains(&n) => Ok(n),
        _ => Err(format!("'{raw}' is not a worker count between 1 and 32")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Cli, clap::Error> {
        <Cli as Parser>::try_parse_from(std::iter::once("mailprobe").chain(args.iter().copied()))
    }

    #[test]
    fn input_only_uses_defaults() {
        let cli = parse(&["emails.csv"]).expect("parse");
        assert_eq!(cli.input, PathBuf::from("emails.csv"));
        assert_eq!(cli.output, PathBuf::from("cleaned_emails.csv"));
        assert_eq!(cli.delay, Duration::from_millis(1_500));
        assert_eq!(cli.timeout, Duration::from_secs(10));
        assert_eq!(cli.probe_options(), ProbeOptions::default());
        assert_eq!(cli.batch_options(), BatchOptions::default());
    }

    #[test]
    fn positional_output_and_delay() {
        let cli = parse(&["emails.csv", "custom.csv", "2.0"]).expect("parse");
        assert_eq!(cli.output, PathBuf::from("custom.csv"));
        assert_eq!(cli.delay, Duration::from_secs(2));
    }

    #[test]
    fn rejects_bad_delay() {
        assert!(parse(&["emails.csv", "out.csv", "soon"]).is_err());
        assert!(parse(&["emails.csv", "out.csv", "-1"]).is_err());
    }

    #[test]
    fn oversized_seconds_are_usage_errors() {
        assert!(parse_delay("1e30").is_err());
        assert!(parse_timeout("1e30").is_err());
        assert!(parse(&["emails.csv", "out.csv", "1e30"]).is_err());
        assert!(parse(&["emails.csv", "--timeout", "1e300"]).is_err());
    }

    #[test]
    fn missing_input_is_usage_error() {
        assert!(parse(&[]).is_err());
    }

    #[test]
    fn probe_flags_override_identity() {
        let cli = parse(&[
            "emails.csv",
            "--helo",
            "probe.example",
            "--from",
            "bounce@probe.example",
            "--fallback-port",
            "587",
        ])
        .expect("parse");
        let options = cli.probe_options();
        assert_eq!(options.helo_domain, "probe.example");
        assert_eq!(options.mail_from, "bounce@probe.example");
        assert_eq!(options.ports(), vec![25, 587]);
    }

    #[test]
    fn workers_are_bounded() {
        assert!(parse(&["emails.csv", "--workers", "0"]).is_err());
        assert!(parse(&["emails.csv", "--workers", "100"]).is_err());
        let cli = parse(&["emails.csv", "--workers", "4"]).expect("parse");
        assert_eq!(cli.batch_options().workers, 4);
    }
}
