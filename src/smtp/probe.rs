use std::io;
use std::net::{IpAddr, SocketAddr, TcpStream, ToSocketAddrs};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use tracing::{debug, warn};

use crate::mx::MxRecord;

use super::error::SmtpError;
use super::options::ProbeOptions;
use super::session::{Deadline, SmtpSession, Transport};
use super::types::{
    AttemptOutcome, Disposition, HostAttempt, ProbeReport, ProbeStage as Stage, RecipientStatus,
    SmtpEvent as Event, SmtpOutcome, SmtpReply,
};

/// Budget for the closing `QUIT`, granted even when the exchange itself ran
/// out of time.
const QUIT_GRACE: Duration = Duration::from_secs(2);

/// Runs the recipient dialogue against one mail exchanger.
pub trait ProbeHost {
    fn probe_host(&self, host: &str, recipient: &str, timeout: Duration) -> HostAttempt;
}

impl<T: ProbeHost + ?Sized> ProbeHost for &T {
    fn probe_host(&self, host: &str, recipient: &str, timeout: Duration) -> HostAttempt {
        (**self).probe_host(host, recipient, timeout)
    }
}

/// Probes `recipient` against `records` (already sorted by preference),
/// moving to the next exchanger whenever one is abandoned before answering
/// `RCPT TO`. `max_hosts` caps how many exchangers are tried.
pub fn probe_exchangers<P>(
    prober: &P,
    records: &[MxRecord],
    recipient: &str,
    timeout: Duration,
    max_hosts: Option<usize>,
) -> ProbeReport
where
    P: ProbeHost + ?Sized,
{
    let limit = max_hosts.unwrap_or(records.len()).max(1);
    let mut attempts: Vec<HostAttempt> = Vec::new();

    for record in records.iter().take(limit) {
        let attempt = prober.probe_host(&record.host, recipient, timeout);
        for event in &attempt.events {
            debug!(host = %attempt.host, ?event, "smtp");
        }
        if let AttemptOutcome::Abandoned(err) = &attempt.outcome {
            warn!(host = %attempt.host, error = %err, "mail exchanger abandoned");
        }
        let settled = match (&attempt.outcome, attempt.outcome.disposition()) {
            (AttemptOutcome::Answered { status, reply }, Disposition::Terminal) => {
                Some(SmtpOutcome::answered(&attempt.host, *status, reply.clone()))
            }
            _ => None,
        };
        attempts.push(attempt);
        if let Some(outcome) = settled {
            return ProbeReport { outcome, attempts };
        }
    }

    let last_error = attempts.last().and_then(|attempt| match &attempt.outcome {
        AttemptOutcome::Abandoned(err) => Some(err.clone()),
        AttemptOutcome::Answered { .. } => None,
    });
    ProbeReport {
        outcome: SmtpOutcome::NoReachableHost {
            tried: attempts.len(),
            last_error,
        },
        attempts,
    }
}

/// [`ProbeHost`] over plain TCP.
#[derive(Debug, Clone, Default)]
pub struct SmtpProber {
    options: ProbeOptions,
}

impl SmtpProber {
    pub fn new(options: ProbeOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &ProbeOptions {
        &self.options
    }

    fn connect(
        &self,
        host: &str,
        deadline: &Deadline,
        events: &mut Vec<Event>,
    ) -> Result<(TcpStream, SocketAddr), SmtpError> {
        dial_ports(host, &self.options.ports(), deadline, events, connect_port)
    }
}

/// Tries `ports` in order until one connects. Each port gets an even share of
/// what is left of the exchange budget, so a port that hangs leaves time for
/// the next one.
fn dial_ports<S, F>(
    host: &str,
    ports: &[u16],
    deadline: &Deadline,
    events: &mut Vec<Event>,
    mut dial: F,
) -> Result<S, SmtpError>
where
    F: FnMut(&str, u16, &Deadline) -> io::Result<S>,
{
    let mut last_err = None;
    for (tried, &port) in ports.iter().enumerate() {
        let result = deadline
            .share(ports.len() - tried)
            .and_then(|slot| dial(host, port, &slot));
        match result {
            Ok(connected) => return Ok(connected),
            Err(err) => {
                events.push(Event::Error {
                    stage: Stage::Connect,
                    message: format!("port {port}: {err}"),
                });
                last_err = Some(SmtpError::from_io(
                    host,
                    Stage::Connect,
                    deadline.budget(),
                    &err,
                ));
            }
        }
    }
    Err(last_err.unwrap_or_else(|| SmtpError::ConnectionFailed {
        host: host.to_string(),
        detail: "no port configured".to_string(),
    }))
}

impl ProbeHost for SmtpProber {
    fn probe_host(&self, host: &str, recipient: &str, timeout: Duration) -> HostAttempt {
        let deadline = Deadline::after(timeout);
        let mut events = Vec::new();

        let (stream, peer) = match self.connect(host, &deadline, &mut events) {
            Ok(pair) => pair,
            Err(err) => {
                let mut attempt = HostAttempt::new(host, AttemptOutcome::Abandoned(err));
                attempt.events = events;
                return attempt;
            }
        };

        let mut session = SmtpSession::new(stream);
        let outcome = converse(
            &mut session,
            host,
            recipient,
            &self.options,
            &deadline,
            &mut events,
        );
        HostAttempt {
            host: host.to_string(),
            address: Some(peer.to_string()),
            events,
            outcome,
        }
    }
}

fn connect_port(
    host: &str,
    port: u16,
    deadline: &Deadline,
) -> io::Result<(TcpStream, SocketAddr)> {
    let addrs = lookup_addrs(host, port, deadline)?;
    let mut last_err = None;
    for (tried, addr) in addrs.iter().enumerate() {
        let slot = deadline.share(addrs.len() - tried)?;
        match TcpStream::connect_timeout(addr, slot.remaining()?) {
            Ok(stream) => return Ok((stream, *addr)),
            Err(err) => last_err = Some(err),
        }
    }
    Err(last_err.unwrap_or_else(|| {
        io::Error::new(
            io::ErrorKind::AddrNotAvailable,
            "no socket address available",
        )
    }))
}

/// Resolves `host:port`, giving up once `deadline` passes. The system lookup
/// cannot be interrupted, so it runs on its own thread.
fn lookup_addrs(host: &str, port: u16, deadline: &Deadline) -> io::Result<Vec<SocketAddr>> {
    if let Ok(ip) = host.parse::<IpAddr>() {
        return Ok(vec![SocketAddr::new(ip, port)]);
    }
    let (tx, rx) = mpsc::channel();
    let target = (host.to_string(), port);
    thread::spawn(move || {
        let resolved = target.to_socket_addrs().map(Iterator::collect::<Vec<_>>);
        let _ = tx.send(resolved);
    });
    match rx.recv_timeout(deadline.remaining()?) {
        Ok(resolved) => resolved,
        Err(RecvTimeoutError::Timeout) => Err(io::Error::new(
            io::ErrorKind::TimedOut,
            "address lookup timed out",
        )),
        Err(RecvTimeoutError::Disconnected) => Err(io::Error::other("address lookup aborted")),
    }
}

/// Greeting through `RCPT TO` on an open session, then `QUIT` whatever
/// happened along the way.
pub(crate) fn converse<T: Transport>(
    session: &mut SmtpSession<T>,
    host: &str,
    recipient: &str,
    options: &ProbeOptions,
    deadline: &Deadline,
    events: &mut Vec<Event>,
) -> AttemptOutcome {
    let outcome = match dialogue(session, host, recipient, options, deadline, events) {
        Ok((status, reply)) => AttemptOutcome::Answered { status, reply },
        Err(err) => AttemptOutcome::Abandoned(err),
    };
    send_quit(session, events);
    outcome
}

fn dialogue<T: Transport>(
    session: &mut SmtpSession<T>,
    host: &str,
    recipient: &str,
    options: &ProbeOptions,
    deadline: &Deadline,
    events: &mut Vec<Event>,
) -> Result<(RecipientStatus, SmtpReply), SmtpError> {
    let greeting = session
        .read_reply(deadline)
        .map_err(|err| failed(host, Stage::Greeting, deadline, err, events))?;
    events.push(Event::Received {
        stage: Stage::Greeting,
        reply: greeting.clone(),
    });
    require_positive(host, Stage::Greeting, &greeting)?;

    let helo_cmd = format!("HELO {}", options.helo_domain);
    let helo = step(session, host, Stage::Helo, &helo_cmd, deadline, events)?;
    require_positive(host, Stage::Helo, &helo)?;

    let mail_from = format!("MAIL FROM:<{}>", options.mail_from);
    let mail = step(session, host, Stage::MailFrom, &mail_from, deadline, events)?;
    require_positive(host, Stage::MailFrom, &mail)?;

    let rcpt_cmd = format!("RCPT TO:<{recipient}>");
    let rcpt = step(session, host, Stage::RcptTo, &rcpt_cmd, deadline, events)?;
    Ok((RecipientStatus::classify(&rcpt), rcpt))
}

fn step<T: Transport>(
    session: &mut SmtpSession<T>,
    host: &str,
    stage: Stage,
    command: &str,
    deadline: &Deadline,
    events: &mut Vec<Event>,
) -> Result<SmtpReply, SmtpError> {
    events.push(Event::Sent {
        stage,
        command: command.to_string(),
    });
    let reply = session
        .command(command, deadline)
        .map_err(|err| failed(host, stage, deadline, err, events))?;
    events.push(Event::Received {
        stage,
        reply: reply.clone(),
    });
    Ok(reply)
}

fn failed(
    host: &str,
    stage: Stage,
    deadline: &Deadline,
    err: io::Error,
    events: &mut Vec<Event>,
) -> SmtpError {
    events.push(Event::Error {
        stage,
        message: err.to_string(),
    });
    SmtpError::from_io(host, stage, deadline.budget(), &err)
}

fn require_positive(host: &str, stage: Stage, reply: &SmtpReply) -> Result<(), SmtpError> {
    if reply.is_positive_completion() {
        Ok(())
    } else {
        Err(SmtpError::protocol(host, stage, format!("unexpected reply {reply}")))
    }
}

fn send_quit<T: Transport>(session: &mut SmtpSession<T>, events: &mut Vec<Event>) {
    const QUIT_CMD: &str = "QUIT";
    let grace = Deadline::after(QUIT_GRACE);
    events.push(Event::Sent {
        stage: Stage::Quit,
        command: QUIT_CMD.to_string(),
    });
    match session.command(QUIT_CMD, &grace) {
        Ok(reply) => events.push(Event::Received {
            stage: Stage::Quit,
            reply,
        }),
        Err(err) => events.push(Event::Error {
            stage: Stage::Quit,
            message: err.to_string(),
        }),
    }
}
