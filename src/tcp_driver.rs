// Tokio TCP event loop for a TLS session
//
// Owns the real socket and turns the session's queued transport requests
// into I/O: connect requests become TcpStream::connect, send requests become
// write_all with the completion callback fed back in, close requests shut
// the stream down. Inbound bytes are pumped into the session at whatever
// granularity the socket delivers them.
//
// Everything runs on one task, so the session sees at most one callback at
// a time.

use std::io;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;

use crate::consumer::SessionConsumer;
use crate::engine::{EngineFactory, HandshakeOptions};
use crate::session::{SessionState, TlsSession};
use crate::transport::{QueuedTransport, TransportRequest};

const READ_BUFFER_SIZE: usize = 16384;

/// Runs one TLS session over a TCP connection.
///
/// Outbound cleartext is accepted from the `outbound` channel once the
/// session reaches `Connected`; data queued earlier waits in the channel.
/// Dropping the sender requests an orderly shutdown.
pub struct TcpSessionDriver<C: SessionConsumer> {
    session: TlsSession<QueuedTransport, C>,
    outbound: mpsc::UnboundedReceiver<Vec<u8>>,
}

impl<C: SessionConsumer> TcpSessionDriver<C> {
    pub fn new(
        engines: Box<dyn EngineFactory>,
        consumer: C,
        outbound: mpsc::UnboundedReceiver<Vec<u8>>,
    ) -> Self {
        Self {
            session: TlsSession::new(QueuedTransport::new(), consumer, engines),
            outbound,
        }
    }

    /// Connect to `address`, run the handshake, and pump the session until
    /// it closes. Returns when the session is torn down, with the error
    /// that caused teardown if there was one.
    pub async fn run(mut self, address: &str, options: HandshakeOptions) -> io::Result<()> {
        self.session.connect(address, options)?;

        // The connect request is the first thing the session queues.
        let mut stream = match self.session.transport_mut().pop_request() {
            Some(TransportRequest::Connect(addr)) => match TcpStream::connect(&addr).await {
                Ok(stream) => {
                    log::debug!("tcp connected to {}", addr);
                    self.session.on_transport_connected();
                    stream
                }
                Err(e) => {
                    log::warn!("tcp connect to {} failed: {}", addr, e);
                    self.session.on_transport_closed();
                    return Err(e);
                }
            },
            _ => unreachable!("session connect did not queue a connect request"),
        };

        let mut read_buf = vec![0u8; READ_BUFFER_SIZE];
        loop {
            // Perform everything the session queued during the last
            // callback before suspending again.
            while let Some(request) = self.session.transport_mut().pop_request() {
                match request {
                    TransportRequest::Connect(addr) => {
                        log::warn!("ignoring connect request to {} on live session", addr);
                    }
                    TransportRequest::Send(buf) => {
                        if let Err(e) = stream.write_all(&buf).await {
                            log::warn!("tcp send failed: {}", e);
                            self.session.on_transport_closed();
                            return Err(e);
                        }
                        self.session.on_transport_send_completed(buf);
                    }
                    TransportRequest::Close => {
                        let _ = stream.shutdown().await;
                        self.session.on_transport_closed();
                        return Ok(());
                    }
                }
            }

            tokio::select! {
                read = stream.read(&mut read_buf) => match read {
                    Ok(0) => {
                        log::debug!("peer closed the connection");
                        self.session.on_transport_closed();
                        return Ok(());
                    }
                    Ok(n) => self.session.on_transport_received(&read_buf[..n]),
                    Err(e) => {
                        log::warn!("tcp receive failed: {}", e);
                        self.session.on_transport_closed();
                        return Err(e);
                    }
                },
                outbound = self.outbound.recv(),
                    if self.session.state() == SessionState::Connected =>
                {
                    match outbound {
                        Some(cleartext) => {
                            if let Err(e) = self.session.send(&cleartext) {
                                log::warn!("session send failed: {}", e);
                            }
                        }
                        None => {
                            // Owner dropped the outbound sender; shut down.
                            self.session.close();
                        }
                    }
                }
            }
        }
    }
}
