use std::io::{self, BufRead, BufReader, Read, Write};
use std::net::TcpStream;
use std::time::{Duration, Instant};

use super::types::SmtpReply;

/// Upper bound on one reply line; RFC 5321 allows 512 octets.
const MAX_REPLY_LINE: usize = 4096;

/// Byte stream an SMTP dialogue runs over.
///
/// `set_io_timeout` bounds the next read or write; the session refreshes it
/// before every operation from the remaining exchange budget.
pub trait Transport: Read + Write {
    fn set_io_timeout(&mut self, timeout: Duration) -> io::Result<()>;
}

impl Transport for TcpStream {
    fn set_io_timeout(&mut self, timeout: Duration) -> io::Result<()> {
        self.set_read_timeout(Some(timeout))?;
        self.set_write_timeout(Some(timeout))
    }
}

/// Wall-clock budget shared by every step of one exchange.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Deadline {
    started: Instant,
    budget: Duration,
}

impl Deadline {
    pub(crate) fn after(budget: Duration) -> Self {
        Self {
            started: Instant::now(),
            budget,
        }
    }

    pub(crate) fn budget(&self) -> Duration {
        self.budget
    }

    /// A sub-deadline holding `1/parts` of what is left, for the first of
    /// `parts` attempts that must all fit in this budget.
    pub(crate) fn share(&self, parts: usize) -> io::Result<Deadline> {
        let parts = u32::try_from(parts.max(1)).unwrap_or(u32::MAX);
        Ok(Deadline::after(self.remaining()? / parts))
    }

    pub(crate) fn remaining(&self) -> io::Result<Duration> {
        self.budget
            .checked_sub(self.started.elapsed())
            .filter(|left| !left.is_zero())
            .ok_or_else(|| io::Error::new(io::ErrorKind::TimedOut, "exchange deadline exceeded"))
    }
}

pub(crate) struct SmtpSession<T: Transport> {
    reader: BufReader<T>,
}

impl<T: Transport> SmtpSession<T> {
    pub(crate) fn new(transport: T) -> Self {
        Self {
            reader: BufReader::new(transport),
        }
    }

    pub(crate) fn send_command(&mut self, command: &str, deadline: &Deadline) -> io::Result<()> {
        let stream = self.reader.get_mut();
        stream.set_io_timeout(deadline.remaining()?)?;
        let mut line = command.as_bytes().to_vec();
        line.extend_from_slice(b"\r\n");
        stream.write_all(&line)?;
        stream.flush()
    }

    pub(crate) fn read_reply(&mut self, deadline: &Deadline) -> io::Result<SmtpReply> {
        let mut code = None;
        let mut message_lines = Vec::new();
        loop {
            let mut raw = self.read_line(deadline)?;
            if raw.ends_with('\n') {
                raw.pop();
                if raw.ends_with('\r') {
                    raw.pop();
                }
            }

            if raw.len() < 3 || !raw.is_char_boundary(3) {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("invalid SMTP reply: '{raw}'"),
                ));
            }
            let code_part = &raw[..3];
            let parsed_code = code_part.parse::<u16>().map_err(|_| {
                io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("invalid SMTP status code: '{code_part}'"),
                )
            })?;
            match code {
                Some(existing) if existing != parsed_code => {
                    return Err(io::Error::new(
                        io::ErrorKind::InvalidData,
                        format!("inconsistent SMTP reply codes: {existing} vs {parsed_code}"),
                    ));
                }
                Some(_) => {}
                None => code = Some(parsed_code),
            }
            let continuation = raw.as_bytes().get(3).copied() == Some(b'-');
            message_lines.push(raw.get(4..).unwrap_or_default().to_string());
            if !continuation {
                break;
            }
        }
        Ok(SmtpReply {
            code: code.ok_or_else(|| {
                io::Error::new(io::ErrorKind::InvalidData, "SMTP reply missing status code")
            })?,
            message: message_lines.join("\n"),
        })
    }

    /// One reply line, newline included. The deadline is checked before
    /// every read from the transport and the line length is capped.
    fn read_line(&mut self, deadline: &Deadline) -> io::Result<String> {
        let mut line = Vec::new();
        loop {
            let remaining = deadline.remaining()?;
            if self.reader.buffer().is_empty() {
                self.reader.get_mut().set_io_timeout(remaining)?;
            }
            let available = self.reader.fill_buf()?;
            if available.is_empty() {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "connection closed while reading reply",
                ));
            }
            let (take, complete) = match available.iter().position(|b| *b == b'\n') {
                Some(end) => (end + 1, true),
                None => (available.len(), false),
            };
            line.extend_from_slice(&available[..take]);
            self.reader.consume(take);
            if line.len() > MAX_REPLY_LINE {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("SMTP reply line exceeds {MAX_REPLY_LINE} bytes"),
                ));
            }
            if complete {
                break;
            }
        }
        String::from_utf8(line).map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))
    }

    pub(crate) fn command(&mut self, command: &str, deadline: &Deadline) -> io::Result<SmtpReply> {
        self.send_command(command, deadline)?;
        self.read_reply(deadline)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io::Cursor;

    /// In-memory peer: replays canned server bytes and captures what the
    /// client writes.
    pub(crate) struct ScriptedTransport {
        server: Cursor<Vec<u8>>,
        pub(crate) written: Vec<u8>,
    }

    impl ScriptedTransport {
        pub(crate) fn new(server: &str) -> Self {
            Self {
                server: Cursor::new(server.as_bytes().to_vec()),
                written: Vec::new(),
            }
        }

        pub(crate) fn commands(&self) -> Vec<String> {
            String::from_utf8_lossy(&self.written)
                .split("\r\n")
                .filter(|line| !line.is_empty())
                .map(str::to_string)
                .collect()
        }
    }

    impl Read for ScriptedTransport {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.server.read(buf)
        }
    }

    impl Write for ScriptedTransport {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.written.write(buf)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Transport for ScriptedTransport {
        fn set_io_timeout(&mut self, _timeout: Duration) -> io::Result<()> {
            Ok(())
        }
    }

    impl SmtpSession<ScriptedTransport> {
        pub(crate) fn transport(&self) -> &ScriptedTransport {
            self.reader.get_ref()
        }
    }

    /// Hands out one byte per read after a fixed pause.
    struct DripTransport {
        server: Cursor<Vec<u8>>,
        pause: Duration,
    }

    impl Read for DripTransport {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            std::thread::sleep(self.pause);
            let end = buf.len().min(1);
            self.server.read(&mut buf[..end])
        }
    }

    impl Write for DripTransport {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Transport for DripTransport {
        fn set_io_timeout(&mut self, _timeout: Duration) -> io::Result<()> {
            Ok(())
        }
    }

    fn deadline() -> Deadline {
        Deadline::after(Duration::from_secs(5))
    }

    #[test]
    fn reads_multiline_reply() {
        let mut session =
            SmtpSession::new(ScriptedTransport::new("250-mx.example\r\n250-SIZE 1000\r\n250 OK\r\n"));
        let reply = session.read_reply(&deadline()).expect("reply");
        assert_eq!(reply.code, 250);
        assert_eq!(reply.message, "mx.example\nSIZE 1000\nOK");
    }

    #[test]
    fn rejects_inconsistent_codes() {
        let mut session = SmtpSession::new(ScriptedTransport::new("250-one\r\n251 two\r\n"));
        let err = session.read_reply(&deadline()).expect_err("inconsistent");
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn rejects_malformed_banner() {
        let mut session = SmtpSession::new(ScriptedTransport::new("hello there\r\n"));
        let err = session.read_reply(&deadline()).expect_err("malformed");
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn eof_is_reported() {
        let mut session = SmtpSession::new(ScriptedTransport::new(""));
        let err = session.read_reply(&deadline()).expect_err("eof");
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn commands_are_crlf_terminated() {
        let mut session = SmtpSession::new(ScriptedTransport::new("250 ok\r\n"));
        let reply = session.command("HELO gmail.com", &deadline()).expect("reply");
        assert_eq!(reply.code, 250);
        assert_eq!(session.transport().written, b"HELO gmail.com\r\n");
    }

    #[test]
    fn slow_reply_cannot_outlive_deadline() {
        let banner = format!("220 {}\r\n", "x".repeat(60));
        let mut session = SmtpSession::new(DripTransport {
            server: Cursor::new(banner.into_bytes()),
            pause: Duration::from_millis(20),
        });
        let started = Instant::now();
        let err = session
            .read_reply(&Deadline::after(Duration::from_millis(100)))
            .expect_err("deadline passed mid-line");
        assert_eq!(err.kind(), io::ErrorKind::TimedOut);
        assert!(started.elapsed() < Duration::from_millis(500));
    }

    #[test]
    fn overlong_line_is_rejected() {
        let flood = format!("220 {}", "x".repeat(MAX_REPLY_LINE + 10));
        let mut session = SmtpSession::new(ScriptedTransport::new(&flood));
        let err = session.read_reply(&deadline()).expect_err("line too long");
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn share_splits_what_is_left() {
        let whole = Deadline::after(Duration::from_secs(10));
        let half = whole.share(2).expect("budget left");
        assert!(half.budget() <= Duration::from_secs(5));
        assert!(half.budget() > Duration::from_secs(4));
        assert!(Deadline::after(Duration::ZERO).share(2).is_err());
    }

    #[test]
    fn expired_deadline_times_out() {
        let expired = Deadline::after(Duration::ZERO);
        let mut session = SmtpSession::new(ScriptedTransport::new("220 hi\r\n"));
        let err = session.read_reply(&expired).expect_err("deadline passed");
        assert_eq!(err.kind(), io::ErrorKind::TimedOut);
    }
}
