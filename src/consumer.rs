// Upper-layer consumer binding
//
// The session delivers decrypted application data and lifecycle
// notifications to a consumer. Data slices are valid only for the duration
// of the callback; a consumer that needs the bytes later must copy them.

use std::io;

/// Callbacks the session invokes on the upper layer.
pub trait SessionConsumer: Send {
    /// The handshake completed and the session is ready for application
    /// data. A returned error is fatal to the session and tears the
    /// transport down.
    fn on_connect(&mut self) -> io::Result<()>;

    /// One decrypted application-data payload, delivered synchronously
    /// within the transport's receive callback. A returned error is fatal
    /// to the session.
    fn on_received(&mut self, cleartext: &[u8]) -> io::Result<()>;

    /// The session reached `Closed`, whatever the cause: explicit close,
    /// fatal error, or peer-initiated shutdown. Pure notification.
    fn on_close(&mut self);
}
