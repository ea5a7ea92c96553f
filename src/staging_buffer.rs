//! Growable staging buffer for partially-received TLS records
//!
//! This module provides the session's receive accumulator: bytes arrive from
//! the transport at arbitrary granularity, get combined with whatever was
//! left over from the previous delivery, and after one parsing pass only the
//! unconsumed tail is retained.
//!
//! # Design Rationale
//!
//! The common case is one or more complete records per delivery, leaving
//! nothing behind. The buffer is therefore empty most of the time, and a
//! delivery that arrives on an empty buffer is processed straight out of the
//! transport's slice without copying. Only when a record straddles two
//! deliveries does the buffer own storage, and `set()` releases that storage
//! again the moment the tail drains to empty.

/// Accumulates received bytes that have not yet been consumed into complete
/// records or handshake messages.
///
/// Usage is a strict take/process/trim cycle per inbound delivery:
///
/// ```ignore
/// let staged = staging.take();
/// let view = if staged.is_empty() { delivery } else { /* staged + delivery */ };
/// let consumed = parse(view);
/// staging.set(&view[consumed..]);
/// ```
///
/// `take()` moves the owned contents out so the combined view can be parsed
/// while the rest of the session is mutably borrowed; `restore()` puts the
/// storage back untouched when nothing was consumed.
#[derive(Default)]
pub struct RecvStaging {
    buf: Vec<u8>,
}

impl RecvStaging {
    pub fn new() -> Self {
        Self { buf: Vec::new() }
    }

    /// Number of staged bytes.
    #[inline]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Get a slice of the staged bytes.
    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }

    /// Move the staged contents out, leaving the buffer empty.
    #[inline]
    pub fn take(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.buf)
    }

    /// Put back storage previously obtained from `take()` without copying.
    ///
    /// Used when a parsing pass consumed nothing, so the retained contents
    /// are exactly what `take()` handed out.
    #[inline]
    pub fn restore(&mut self, buf: Vec<u8>) {
        debug_assert!(
            self.buf.is_empty(),
            "RecvStaging restore over {} staged bytes",
            self.buf.len()
        );
        self.buf = buf;
    }

    /// Replace the retained contents with exactly `remaining`.
    ///
    /// An empty `remaining` releases all storage. Otherwise a fresh owned
    /// copy is made: `remaining` is typically a tail of the combined view
    /// from the current pass, which may alias the transport's delivery
    /// slice and is about to be invalidated.
    pub fn set(&mut self, remaining: &[u8]) {
        if remaining.is_empty() {
            self.buf = Vec::new();
        } else {
            self.buf = remaining.to_vec();
        }
    }
}
