// TLS client session state machine
//
// Orchestrates connect -> handshake -> encrypted-record steady state over a
// non-blocking transport. The session never performs I/O or cryptography
// itself: the transport executes its queued requests and feeds completion
// callbacks back in, and the handshake engine / record cipher do all the
// TLS work behind the seam in `engine.rs`.
//
// Exactly one callback is ever in flight: the owning event loop dispatches
// transport completions one at a time, so all session state is mutated
// without locks.

use std::io::{self, Error, ErrorKind};

use crate::consumer::SessionConsumer;
use crate::engine::{EngineFactory, HandshakeOptions, RecordParser};
use crate::record::ContentType;
use crate::staging_buffer::RecvStaging;
use crate::transport::Transport;

/// Connection lifecycle. Exactly one state is active at a time.
///
/// The handshake engine handle exists only in `Connecting` and `Handshaking`;
/// the record cipher only in `Connected`. All teardown paths converge on the
/// transport's close callback, which is the only place that resets to
/// `Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Closed,
    Connecting,
    Handshaking,
    Connected,
}

/// One logical TLS client connection.
pub struct TlsSession<T: Transport, C: SessionConsumer> {
    state: SessionState,
    /// Present iff state is Connecting or Handshaking; dropped the instant
    /// the handshake completes or fails.
    handshake: Option<Box<dyn crate::engine::HandshakeEngine>>,
    /// Present and used iff state is Connected.
    cipher: Option<Box<dyn crate::engine::RecordCipher>>,
    /// Bytes received but not yet consumed into complete records/messages.
    recv_staging: RecvStaging,
    transport: T,
    consumer: C,
    engines: Box<dyn EngineFactory>,
}

impl<T: Transport, C: SessionConsumer> TlsSession<T, C> {
    pub fn new(transport: T, consumer: C, engines: Box<dyn EngineFactory>) -> Self {
        Self {
            state: SessionState::Closed,
            handshake: None,
            cipher: None,
            recv_staging: RecvStaging::new(),
            transport,
            consumer,
            engines,
        }
    }

    #[inline]
    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Allocate a handshake engine and request an asynchronous transport
    /// connect. Valid only from `Closed`.
    ///
    /// Engine allocation failure propagates to the caller; the partially
    /// constructed engine handle is released and no transport request is
    /// issued.
    pub fn connect(&mut self, address: &str, options: HandshakeOptions) -> io::Result<()> {
        if self.state != SessionState::Closed {
            return Err(Error::new(
                ErrorKind::InvalidInput,
                format!("connect while session is {:?}", self.state),
            ));
        }

        let engine = self.engines.create(&options)?;
        self.transport.connect(address)?;

        self.handshake = Some(engine);
        self.state = SessionState::Connecting;
        log::debug!("session connecting to {}", address);
        Ok(())
    }

    /// Transport connect completion. Valid only from `Connecting`.
    pub fn on_transport_connected(&mut self) {
        if self.state != SessionState::Connecting {
            log::warn!(
                "transport connect completion in state {:?} ignored",
                self.state
            );
            return;
        }
        self.state = SessionState::Handshaking;
        log::debug!("transport connected, handshake starting");
        self.handshake_send_step();
    }

    /// Inbound bytes from the transport, at arbitrary granularity: partial
    /// records, multiple records, or zero-length deliveries are all fine.
    ///
    /// This is the single re-entry point that unifies handshake-phase and
    /// data-phase parsing under one buffering discipline: accumulate into
    /// the staging buffer, feed the combined view to whichever layer is
    /// active, retain exactly the unconsumed tail.
    pub fn on_transport_received(&mut self, bytes: &[u8]) {
        if self.state == SessionState::Closed {
            if !bytes.is_empty() {
                log::debug!("dropping {} bytes received while closed", bytes.len());
            }
            return;
        }

        // Combine with any staged leftover. When nothing is staged the
        // delivery is parsed in place without copying.
        let mut staged = self.recv_staging.take();
        let view_is_staged = !staged.is_empty();
        if view_is_staged {
            staged.extend_from_slice(bytes);
        }
        let view: &[u8] = if view_is_staged { &staged } else { bytes };

        let consumed = if self.handshake.is_some() {
            self.handshake_receive_step(view)
        } else {
            self.process_records(view)
        };
        debug_assert!(consumed <= view.len());

        if consumed == 0 && view_is_staged {
            // Nothing consumed: the staged storage is unchanged, put it back
            // without copying.
            self.recv_staging.restore(staged);
        } else {
            self.recv_staging.set(&view[consumed..]);
        }
    }

    /// Ask the engine for its pending outbound flights and queue them on the
    /// transport. Engine errors do not propagate past this boundary; they
    /// convert to a close.
    fn handshake_send_step(&mut self) {
        loop {
            let Some(engine) = self.handshake.as_mut() else {
                return;
            };
            match engine.produce_next_flight() {
                Ok(Some(flight)) => {
                    log::debug!("queueing {}-byte handshake flight", flight.len());
                    if let Err(e) = self.transport.send(flight) {
                        log::warn!("handshake flight send failed: {}", e);
                        self.close();
                        return;
                    }
                }
                Ok(None) => return,
                Err(e) => {
                    log::warn!("handshake engine failed to produce flight: {}", e);
                    self.close();
                    return;
                }
            }
        }
    }

    /// Feed unconsumed bytes to the handshake engine. Returns how many bytes
    /// were consumed. A partial handshake message is not an error: it
    /// reports zero consumed and waits for more data.
    fn handshake_receive_step(&mut self, view: &[u8]) -> usize {
        let Some(engine) = self.handshake.as_mut() else {
            return 0;
        };
        match engine.consume(view) {
            Ok(consumed) => {
                self.check_handshake_complete();
                if self.state == SessionState::Handshaking {
                    // The handshake may require another outbound flight
                    // before it can finish.
                    self.handshake_send_step();
                }
                consumed
            }
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => {
                // Incomplete message; wait for the next delivery.
                0
            }
            Err(e) => {
                log::warn!("handshake engine rejected peer data: {}", e);
                self.close();
                0
            }
        }
    }

    /// If the handshake just completed, swap the engine handle for the
    /// negotiated cipher and notify the consumer. Valid only while
    /// `Handshaking`; a no-op otherwise.
    fn check_handshake_complete(&mut self) {
        if self.state != SessionState::Handshaking {
            return;
        }
        let Some(engine) = self.handshake.as_mut() else {
            return;
        };
        if !engine.is_complete() {
            return;
        }

        let Some(cipher) = engine.negotiated_cipher() else {
            log::error!("handshake engine reported complete without a negotiated cipher");
            self.handshake = None;
            self.close();
            return;
        };

        self.handshake = None;
        self.cipher = Some(cipher);
        self.state = SessionState::Connected;
        log::debug!("handshake complete, session connected");

        if let Err(e) = self.consumer.on_connect() {
            log::warn!("consumer connect notification failed: {}", e);
            self.close();
        }
    }

    /// Walk the accumulated view record by record, dispatching on content
    /// type. Returns how many input bytes were consumed into complete
    /// records; a trailing partial record stays unconsumed for the caller
    /// to retain.
    fn process_records(&mut self, view: &[u8]) -> usize {
        let Some(mut cipher) = self.cipher.take() else {
            log::warn!("received data with no negotiated cipher, closing");
            self.close();
            return 0;
        };

        let mut parser = RecordParser::new(cipher.as_mut(), view);
        let consumed = loop {
            match parser.next_record() {
                Ok(Some((ContentType::ApplicationData, cleartext))) => {
                    if let Err(e) = self.consumer.on_received(&cleartext) {
                        log::warn!("consumer receive notification failed: {}", e);
                        let n = parser.consumed();
                        self.close();
                        break n;
                    }
                }
                Ok(Some((ContentType::Handshake, cleartext))) => {
                    // Post-handshake messages (key update, session tickets)
                    // are consumed but not acted on.
                    log::debug!(
                        "ignoring {}-byte post-handshake handshake message",
                        cleartext.len()
                    );
                }
                Ok(Some((ContentType::Alert, _))) => {
                    log::debug!("received alert record, closing");
                    let n = parser.consumed();
                    self.close();
                    break n;
                }
                Ok(Some((content_type, _))) => {
                    log::warn!(
                        "unexpected record content type 0x{:02x}, closing",
                        content_type.as_u8()
                    );
                    self.close();
                    break 0;
                }
                Ok(None) => break parser.consumed(),
                Err(e) => {
                    log::warn!("record decrypt failed: {}", e);
                    self.close();
                    break 0;
                }
            }
        };

        drop(parser);
        self.cipher = Some(cipher);
        consumed
    }

    /// Encrypt `bytes` as application-data records and queue them on the
    /// transport. Valid only while `Connected`; any other state fails with
    /// an invalid-state error and performs no I/O.
    ///
    /// Encryption or send-request failure tears the session down through the
    /// close path instead of surfacing to the caller; remaining chunks are
    /// abandoned.
    pub fn send(&mut self, bytes: &[u8]) -> io::Result<()> {
        if self.state != SessionState::Connected {
            return Err(Error::new(
                ErrorKind::NotConnected,
                format!("send while session is {:?}", self.state),
            ));
        }
        let Some(mut cipher) = self.cipher.take() else {
            unreachable!("connected session without a cipher")
        };

        let max_chunk = cipher.max_cleartext_chunk_len();
        debug_assert!(max_chunk > 0);

        let mut failed = false;
        for chunk in bytes.chunks(max_chunk) {
            let mut record = Vec::with_capacity(cipher.record_len(chunk.len()));
            match cipher.encrypt(&mut record, ContentType::ApplicationData, chunk) {
                Ok(()) => {
                    if let Err(e) = self.transport.send(record) {
                        log::warn!("transport send failed: {}", e);
                        failed = true;
                        break;
                    }
                }
                Err(e) => {
                    log::warn!("record encryption failed: {}", e);
                    failed = true;
                    break;
                }
            }
        }

        self.cipher = Some(cipher);
        if failed {
            self.close();
        }
        Ok(())
    }

    /// Transport send completion, handing back the buffer whose ownership
    /// was transferred on `send`.
    ///
    /// During the handshake this signals that an outbound flight was fully
    /// flushed, which is what some handshake flows need before they can
    /// finish. In steady state the buffer's lifetime was exactly "queued
    /// for send, not yet acknowledged" and it is simply dropped.
    pub fn on_transport_send_completed(&mut self, buf: Vec<u8>) {
        drop(buf);
        if self.state == SessionState::Handshaking {
            self.check_handshake_complete();
        }
    }

    /// Request transport shutdown. No immediate state change: all teardown
    /// paths go through the close callback so there is exactly one place
    /// that resets the session.
    pub fn close(&mut self) {
        log::debug!("session close requested in state {:?}", self.state);
        self.transport.close();
    }

    /// Transport teardown completion: reset to `Closed` and notify the
    /// consumer, regardless of what triggered the shutdown (explicit close,
    /// fatal error, or peer-initiated close).
    pub fn on_transport_closed(&mut self) {
        if self.state == SessionState::Closed {
            return;
        }
        log::debug!("transport closed, session reset");
        self.state = SessionState::Closed;
        self.handshake = None;
        self.cipher = None;
        self.recv_staging.set(&[]);
        self.consumer.on_close();
    }
}
