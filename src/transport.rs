//! TCP transport for lock server requests.
//!
//! Each request gets a fresh connection: connect, write the request,
//! half-close the write side, read the reply until the server closes,
//! close. There is no pooling and no retrying here; the retry loop lives in
//! [`crate::client`].

use crate::error::{Result, SafelockError};
use std::io::{self, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::time::{Duration, Instant};

/// Smallest timeout handed to the socket layer. A zero timeout means
/// "block forever" (or is rejected) in `std::net`.
const MIN_SOCKET_TIMEOUT: Duration = Duration::from_millis(1);

/// Per-request limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransportLimits {
    /// Largest reply accepted, in bytes.
    pub max_response_size: usize,

    /// Upper bound on establishing the connection.
    pub connect_timeout: Duration,

    /// Upper bound on each blocking write, and on reading the whole reply.
    pub io_timeout: Duration,
}

impl TransportLimits {
    /// Shrink both timeouts so a single request cannot outlive `remaining`.
    pub fn clamped_to(self, remaining: Option<Duration>) -> Self {
        match remaining {
            Some(remaining) => Self {
                connect_timeout: self.connect_timeout.min(remaining),
                io_timeout: self.io_timeout.min(remaining),
                ..self
            },
            None => self,
        }
    }
}

/// Send one request and return the raw reply.
///
/// # Returns
///
/// * `Ok(Vec<u8>)` - The reply bytes (possibly empty if the server closed without answering)
/// * `Err(SafelockError::ServerUnavailable)` - The connection could not be established
/// * `Err(SafelockError::Transport)` - The connection broke after it was established
/// * `Err(SafelockError::ProtocolError)` - The reply exceeded `max_response_size`
pub fn send_and_receive(
    host: &str,
    port: u16,
    request: &[u8],
    limits: &TransportLimits,
) -> Result<Vec<u8>> {
    let mut stream = connect(host, port, limits.connect_timeout)?;
    stream
        .set_write_timeout(Some(limits.io_timeout.max(MIN_SOCKET_TIMEOUT)))
        .map_err(|e| transport_error(host, port, "configure", e))?;

    stream
        .write_all(request)
        .and_then(|_| stream.flush())
        .map_err(|e| transport_error(host, port, "send request to", e))?;

    // Signal end of request; the server replies and closes.
    if let Err(e) = stream.shutdown(Shutdown::Write)
        && e.kind() != io::ErrorKind::NotConnected
    {
        return Err(transport_error(host, port, "finish request to", e));
    }

    read_response(&mut stream, limits)
        .map_err(|e| transport_error(host, port, "read response from", e))?
        .ok_or_else(|| {
            SafelockError::ProtocolError(format!(
                "response from {}:{} exceeds the {} byte packet limit",
                host, port, limits.max_response_size
            ))
        })
}

/// Read until the server closes, within one `io_timeout` for the whole
/// reply. `None` if the reply grows past `max_response_size`.
fn read_response(
    stream: &mut TcpStream,
    limits: &TransportLimits,
) -> io::Result<Option<Vec<u8>>> {
    let read_deadline = Instant::now().checked_add(limits.io_timeout);
    let mut response = Vec::new();
    let mut chunk = [0u8; 512];

    loop {
        let remaining = match read_deadline {
            Some(at) => at.saturating_duration_since(Instant::now()),
            None => limits.io_timeout,
        };
        if remaining.is_zero() {
            return Err(io::Error::new(
                io::ErrorKind::TimedOut,
                "reply not complete within the I/O timeout",
            ));
        }
        stream.set_read_timeout(Some(remaining.max(MIN_SOCKET_TIMEOUT)))?;

        match stream.read(&mut chunk) {
            Ok(0) => return Ok(Some(response)),
            Ok(n) => {
                response.extend_from_slice(&chunk[..n]);
                if response.len() > limits.max_response_size {
                    return Ok(None);
                }
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
}

/// Check that something is listening at `host:port`.
pub fn probe(host: &str, port: u16, connect_timeout: Duration) -> Result<SocketAddr> {
    let stream = connect(host, port, connect_timeout)?;
    stream
        .peer_addr()
        .map_err(|e| transport_error(host, port, "inspect connection to", e))
}

fn connect(host: &str, port: u16, timeout: Duration) -> Result<TcpStream> {
    let timeout = timeout.max(MIN_SOCKET_TIMEOUT);

    let addrs = (host, port)
        .to_socket_addrs()
        .map_err(|e| SafelockError::ServerUnavailable(format!("{}:{} ({})", host, port, e)))?;

    let mut last_error = None;
    for addr in addrs {
        match TcpStream::connect_timeout(&addr, timeout) {
            Ok(stream) => return Ok(stream),
            Err(e) => last_error = Some(e),
        }
    }

    let cause = last_error
        .map(|e| e.to_string())
        .unwrap_or_else(|| "address did not resolve".to_string());
    Err(SafelockError::ServerUnavailable(format!(
        "{}:{} ({})",
        host, port, cause
    )))
}

fn transport_error(host: &str, port: u16, what: &str, e: io::Error) -> SafelockError {
    SafelockError::Transport(format!("failed to {} {}:{}: {}", what, host, port, e))
}
