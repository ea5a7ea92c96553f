// Transport binding for the session core
//
// The session never performs I/O itself. `connect`, `send`, and `close` are
// non-blocking requests; all real suspension happens in whatever owns the
// transport (the tokio driver, or a test harness), which later feeds the
// matching completion callbacks back into the session.

use std::collections::VecDeque;
use std::io;

/// Non-blocking requests issued by the session toward the transport.
///
/// Completion is reported asynchronously via the session's
/// `on_transport_connected`, `on_transport_send_completed`, and
/// `on_transport_closed` callbacks. Inbound bytes are delivered via
/// `on_transport_received` at arbitrary granularity.
pub trait Transport: Send {
    /// Request an asynchronous connect to `address`.
    fn connect(&mut self, address: &str) -> io::Result<()>;

    /// Queue `buf` for an asynchronous send. Ownership of `buf` transfers to
    /// the transport until the matching send-completion hands it back.
    fn send(&mut self, buf: Vec<u8>) -> io::Result<()>;

    /// Request transport teardown. Completion arrives as the close callback.
    fn close(&mut self);
}

/// A queued transport request, drained and executed by the owning driver.
#[derive(Debug, PartialEq, Eq)]
pub enum TransportRequest {
    Connect(String),
    Send(Vec<u8>),
    Close,
}

/// Request-queue transport: the session's requests accumulate here and the
/// driver (or a test) pops and performs them, then dispatches the completion
/// callbacks. Never fails synchronously.
#[derive(Default)]
pub struct QueuedTransport {
    requests: VecDeque<TransportRequest>,
}

impl QueuedTransport {
    pub fn new() -> Self {
        Self {
            requests: VecDeque::new(),
        }
    }

    /// Pop the oldest pending request, if any.
    pub fn pop_request(&mut self) -> Option<TransportRequest> {
        self.requests.pop_front()
    }

    pub fn pending_requests(&self) -> usize {
        self.requests.len()
    }
}

impl Transport for QueuedTransport {
    fn connect(&mut self, address: &str) -> io::Result<()> {
        self.requests
            .push_back(TransportRequest::Connect(address.to_string()));
        Ok(())
    }

    fn send(&mut self, buf: Vec<u8>) -> io::Result<()> {
        self.requests.push_back(TransportRequest::Send(buf));
        Ok(())
    }

    fn close(&mut self) {
        self.requests.push_back(TransportRequest::Close);
    }
}
