//! laces - a callback-driven TLS client session core.
//!
//! This library drives a TLS handshake and steady-state encrypted record
//! exchange on top of an arbitrary asynchronous byte-stream transport. The
//! session itself is a plain state machine: `connect`, `send`, and `close`
//! are non-blocking requests, and all real progress happens when the owning
//! event loop feeds transport completion callbacks back in.
//!
//! The TLS work itself lives behind the engine seam: a handshake engine
//! produces and consumes handshake flights, and the negotiated record cipher
//! seals and opens application-data records. A rustls-backed engine is
//! provided, along with a tokio TCP driver that owns the socket and runs
//! the event loop.
//!
//! ```ignore
//! let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
//! let driver = TcpSessionDriver::new(Box::new(RustlsEngineFactory), consumer, rx);
//! tx.send(b"GET / HTTP/1.1\r\n\r\n".to_vec()).unwrap();
//! driver.run("example.com:443", HandshakeOptions::new("example.com")).await?;
//! ```

pub mod consumer;
pub mod engine;
pub mod record;
pub mod rustls_engine;
pub mod session;
pub mod staging_buffer;
pub mod tcp_driver;
pub mod transport;

pub use consumer::SessionConsumer;
pub use engine::{
    DecodedRecord, EngineFactory, HandshakeEngine, HandshakeOptions, RecordCipher, RecordParser,
};
pub use record::ContentType;
pub use rustls_engine::RustlsEngineFactory;
pub use session::{SessionState, TlsSession};
pub use staging_buffer::RecvStaging;
pub use tcp_driver::TcpSessionDriver;
pub use transport::{QueuedTransport, Transport, TransportRequest};
