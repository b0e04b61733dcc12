//! Persistent telnet session to the engine
//!
//! Owns one reconnect-on-demand socket. Exchanges are strictly sequential:
//! the connector holds a single lock around every call, so at most one
//! command is ever in flight on the wire.

use std::io::{Read, Write};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::codec::{decode_lines, strip_negotiation};
use crate::errors::{Error, Result};

/// Every response ends with this marker, preceded by its own line break.
const TERMINATOR: &[u8] = b"END";

/// Sent by the engine right before it closes an idle session.
const INACTIVITY_SENTINEL: &str = "Bye!";

pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Request/response seam between the session and the layers above it.
///
/// The catalog, the active-source probe and the snapshot assembler only need
/// this, which keeps them testable against scripted fakes.
pub trait Transport {
    /// Send one command line, return the response lines, or `None` when the
    /// engine gave no answer. Callers treat `None` as "no data", never as an
    /// error to propagate.
    fn command(&mut self, command: &str) -> Option<Vec<String>>;
}

/// Blocking telnet session with one automatic reconnect-and-retry.
#[derive(Debug)]
pub struct TelnetSession {
    host: String,
    port: u16,
    timeout: Duration,
    stream: Option<TcpStream>,
}

impl TelnetSession {
    pub fn new(host: impl Into<String>, port: u16, timeout: Duration) -> Self {
        Self {
            host: host.into(),
            port,
            timeout,
            stream: None,
        }
    }

    fn address(&self) -> String {
        if self.host.contains(':') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }

    /// Open (or reopen) the socket. A refused attempt leaves the session
    /// disconnected; the next command will trigger another try.
    pub fn connect(&mut self) -> Result<()> {
        self.disconnect();
        let address = self.address();
        info!("Contacting the engine over telnet @{}", address);

        let addrs = address
            .to_socket_addrs()
            .map_err(|err| Error::Connect(address.clone(), err))?;
        let mut last_err = None;
        for addr in addrs {
            match TcpStream::connect_timeout(&addr, self.timeout) {
                Ok(stream) => {
                    stream
                        .set_read_timeout(Some(self.timeout))
                        .and_then(|_| stream.set_write_timeout(Some(self.timeout)))?;
                    info!("Connected to {}", address);
                    self.stream = Some(stream);
                    return Ok(());
                }
                Err(err) => last_err = Some(err),
            }
        }
        Err(match last_err {
            Some(err) => Error::Connect(address, err),
            None => Error::Connect(
                address,
                std::io::Error::new(std::io::ErrorKind::NotFound, "no address resolved"),
            ),
        })
    }

    pub fn disconnect(&mut self) {
        if let Some(stream) = self.stream.take() {
            let _ = stream.shutdown(Shutdown::Both);
        }
    }

    pub fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    /// One write/read round trip, no retry.
    fn exchange(&mut self, command: &str) -> Result<Vec<String>> {
        if self.stream.is_none() {
            self.connect()?;
        }
        let address = self.address();
        let stream = self
            .stream
            .as_mut()
            .ok_or_else(|| Error::NotConnected(address))?;

        debug!("Telnet command: {}", command);
        stream.write_all(command.as_bytes())?;
        stream.write_all(b"\n")?;
        stream.flush()?;

        let raw = read_response(stream)?;
        let body = strip_negotiation(&raw);
        let mut lines = decode_lines(&body);
        while lines.first().is_some_and(|line| line.is_empty()) {
            lines.remove(0);
        }
        while lines.last().is_some_and(|line| line.is_empty()) {
            lines.pop();
        }
        if lines.iter().any(|line| line == INACTIVITY_SENTINEL) {
            return Err(Error::SessionClosed(INACTIVITY_SENTINEL.to_string()));
        }
        debug!("Telnet response: {:?}", lines);
        Ok(lines)
    }
}

impl Transport for TelnetSession {
    /// Send a command, retrying exactly once after a transient failure
    /// (inactivity close, broken pipe, reset, EOF). Degrades to `None` when
    /// the retry also fails, never panics or escapes an error.
    fn command(&mut self, command: &str) -> Option<Vec<String>> {
        let mut remaining_attempts = 2;
        while remaining_attempts > 0 {
            remaining_attempts -= 1;
            match self.exchange(command) {
                Ok(lines) => return Some(lines),
                Err(Error::Connect(address, err)) => {
                    warn!("Cannot reach the engine at {}: {}", address, err);
                    return None;
                }
                Err(err) if err.is_transient() && remaining_attempts > 0 => {
                    info!("Session lost ({}), reconnecting once", err);
                    if let Err(err) = self.connect() {
                        warn!("Reconnection failed: {}", err);
                        return None;
                    }
                }
                Err(err) => {
                    error!(
                        "Giving up on telnet command {:?} after retry: {}",
                        command, err
                    );
                    self.disconnect();
                    return None;
                }
            }
        }
        None
    }
}

/// Read until the `END` terminator, immediately preceded by its own line
/// break (or found at the very start of the response). Returns the response
/// body without the terminator.
fn read_response(stream: &mut TcpStream) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        let read = stream.read(&mut chunk)?;
        if read == 0 {
            let partial = String::from_utf8_lossy(&buffer);
            if partial.contains(INACTIVITY_SENTINEL) {
                return Err(Error::SessionClosed(partial.trim().to_string()));
            }
            return Err(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "connection closed before the response terminator",
            )
            .into());
        }
        buffer.extend_from_slice(&chunk[..read]);
        if let Some(end) = find_terminator(&buffer) {
            buffer.truncate(end);
            return Ok(buffer);
        }
    }
}

/// Position where the response body ends, if the terminator is present.
fn find_terminator(buffer: &[u8]) -> Option<usize> {
    let mut pos = 0;
    while pos + TERMINATOR.len() <= buffer.len() {
        let at_line_start = pos == 0 || buffer[pos - 1] == b'\n';
        let whole_line = matches!(
            buffer.get(pos + TERMINATOR.len()),
            None | Some(b'\r') | Some(b'\n')
        );
        if at_line_start && whole_line && &buffer[pos..pos + TERMINATOR.len()] == TERMINATOR {
            let mut end = pos;
            if end > 0 && buffer[end - 1] == b'\n' {
                end -= 1;
                if end > 0 && buffer[end - 1] == b'\r' {
                    end -= 1;
                }
            }
            return Some(end);
        }
        pos += 1;
    }
    None
}
