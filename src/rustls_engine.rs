// rustls-backed handshake engine and record cipher
//
// Adapts rustls::ClientConnection to the engine seam: during the handshake
// the connection produces and consumes raw flights; once complete the same
// connection moves into a RustlsRecordCipher for steady-state record
// sealing/opening. TLS 1.3 only.
//
// rustls stages partial records internally, so this engine always consumes
// every byte it is offered; the session's own staging buffer stays empty
// under this binding.

use std::io::{self, Error, ErrorKind, Read, Write};
use std::sync::Arc;
use std::sync::OnceLock;

use crate::engine::{
    DecodedRecord, EngineFactory, HandshakeEngine, HandshakeOptions, RecordCipher,
};
use crate::record::{ContentType, MAX_TLS_PLAINTEXT_LEN, TLS_RECORD_HEADER_LEN};

/// TLS 1.3 per-record overhead: record header, inner content type byte, and
/// the 16-byte AEAD tag (AES-GCM and ChaCha20-Poly1305 both).
const TLS13_RECORD_OVERHEAD: usize = TLS_RECORD_HEADER_LEN + 1 + 16;

/// Builds a TLS 1.3 rustls client connection per connect attempt.
pub struct RustlsEngineFactory;

impl EngineFactory for RustlsEngineFactory {
    fn create(&self, options: &HandshakeOptions) -> io::Result<Box<dyn HandshakeEngine>> {
        let config = Arc::new(create_client_config(options));

        let server_name = rustls::pki_types::ServerName::try_from(options.server_name.clone())
            .map_err(|e| {
                Error::new(
                    ErrorKind::InvalidInput,
                    format!("invalid server name {:?}: {e}", options.server_name),
                )
            })?;

        let conn = rustls::ClientConnection::new(config, server_name).map_err(|e| {
            Error::new(
                ErrorKind::InvalidInput,
                format!("failed to create client connection: {e}"),
            )
        })?;

        Ok(Box::new(RustlsHandshakeEngine { conn: Some(conn) }))
    }
}

fn create_client_config(options: &HandshakeOptions) -> rustls::ClientConfig {
    let builder = rustls::ClientConfig::builder_with_provider(get_crypto_provider())
        .with_protocol_versions(&[&rustls::version::TLS13])
        .unwrap();

    let builder = if options.verify_certificates {
        builder.with_root_certificates(get_root_cert_store())
    } else {
        builder
            .dangerous()
            .with_custom_certificate_verifier(get_disabled_verifier())
    };

    let mut config = builder.with_no_client_auth();

    config.alpn_protocols = options
        .alpn_protocols
        .iter()
        .map(|s| s.as_bytes().to_vec())
        .collect();
    config.enable_sni = options.enable_sni;
    config
}

/// Accepts any server certificate. Used when verification is disabled in
/// the handshake options.
#[derive(Debug)]
struct DisabledVerifier {
    supported_algs: rustls::crypto::WebPkiSupportedAlgorithms,
}

impl rustls::client::danger::ServerCertVerifier for DisabledVerifier {
    fn verify_server_cert(
        &self,
        _end_entity: &rustls::pki_types::CertificateDer<'_>,
        _intermediates: &[rustls::pki_types::CertificateDer<'_>],
        _server_name: &rustls::pki_types::ServerName<'_>,
        _ocsp_response: &[u8],
        _now: rustls::pki_types::UnixTime,
    ) -> std::result::Result<rustls::client::danger::ServerCertVerified, rustls::Error> {
        Ok(rustls::client::danger::ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &rustls::pki_types::CertificateDer<'_>,
        dss: &rustls::DigitallySignedStruct,
    ) -> Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls12_signature(message, cert, dss, &self.supported_algs)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &rustls::pki_types::CertificateDer<'_>,
        dss: &rustls::DigitallySignedStruct,
    ) -> Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls13_signature(message, cert, dss, &self.supported_algs)
    }

    fn supported_verify_schemes(&self) -> Vec<rustls::SignatureScheme> {
        self.supported_algs.supported_schemes()
    }
}

fn get_crypto_provider() -> Arc<rustls::crypto::CryptoProvider> {
    static INSTANCE: OnceLock<Arc<rustls::crypto::CryptoProvider>> = OnceLock::new();
    INSTANCE
        .get_or_init(|| Arc::new(rustls::crypto::aws_lc_rs::default_provider()))
        .clone()
}

fn get_disabled_verifier() -> Arc<DisabledVerifier> {
    static INSTANCE: OnceLock<Arc<DisabledVerifier>> = OnceLock::new();
    INSTANCE
        .get_or_init(|| {
            Arc::new(DisabledVerifier {
                supported_algs: get_crypto_provider().signature_verification_algorithms,
            })
        })
        .clone()
}

fn get_root_cert_store() -> Arc<rustls::RootCertStore> {
    static INSTANCE: OnceLock<Arc<rustls::RootCertStore>> = OnceLock::new();
    INSTANCE
        .get_or_init(|| {
            Arc::new(rustls::RootCertStore {
                roots: webpki_roots::TLS_SERVER_ROOTS.to_vec(),
            })
        })
        .clone()
}

/// Feed all of `data` into the connection. rustls may not consume all bytes
/// in one read_tls() call, so loop until everything is in.
fn feed_client_connection(
    conn: &mut rustls::ClientConnection,
    data: &[u8],
) -> io::Result<()> {
    let mut cursor = io::Cursor::new(data);
    let mut i = 0;
    while i < data.len() {
        let n = conn.read_tls(&mut cursor).map_err(|e| {
            Error::new(
                ErrorKind::InvalidData,
                format!("failed to feed rustls client connection: {e}"),
            )
        })?;
        if n == 0 {
            return Err(Error::new(
                ErrorKind::InvalidData,
                format!(
                    "rustls client connection did not consume all bytes: fed {}/{} bytes",
                    i,
                    data.len()
                ),
            ));
        }
        i += n;
    }
    Ok(())
}

fn process_new_packets(
    conn: &mut rustls::ClientConnection,
) -> io::Result<rustls::IoState> {
    conn.process_new_packets().map_err(|e| {
        Error::new(
            ErrorKind::InvalidData,
            format!("rustls client error processing new packets: {:?}", e),
        )
    })
}

/// Handshake half: drives rustls until the connection stops handshaking and
/// its final flight has been drained.
pub struct RustlsHandshakeEngine {
    conn: Option<rustls::ClientConnection>,
}

impl HandshakeEngine for RustlsHandshakeEngine {
    fn produce_next_flight(&mut self) -> io::Result<Option<Vec<u8>>> {
        let Some(conn) = self.conn.as_mut() else {
            return Ok(None);
        };
        if !conn.wants_write() {
            return Ok(None);
        }
        let mut flight = Vec::new();
        while conn.wants_write() {
            conn.write_tls(&mut flight)?;
        }
        Ok(Some(flight))
    }

    fn consume(&mut self, bytes: &[u8]) -> io::Result<usize> {
        let Some(conn) = self.conn.as_mut() else {
            return Ok(0);
        };
        if bytes.is_empty() {
            return Ok(0);
        }
        feed_client_connection(conn, bytes)?;
        process_new_packets(conn)?;
        Ok(bytes.len())
    }

    fn is_complete(&self) -> bool {
        // Complete only once the final flight (client Finished) has been
        // drained, so the session observes completion from the
        // send-completion callback.
        match &self.conn {
            Some(conn) => !conn.is_handshaking() && !conn.wants_write(),
            None => false,
        }
    }

    fn negotiated_cipher(&mut self) -> Option<Box<dyn RecordCipher>> {
        if !self.is_complete() {
            return None;
        }
        let conn = self.conn.take()?;
        Some(Box::new(RustlsRecordCipher { conn }))
    }
}

/// Steady-state half: the same rustls connection, now sealing and opening
/// application-data records.
pub struct RustlsRecordCipher {
    conn: rustls::ClientConnection,
}

impl RecordCipher for RustlsRecordCipher {
    fn max_cleartext_chunk_len(&self) -> usize {
        MAX_TLS_PLAINTEXT_LEN
    }

    fn record_len(&self, cleartext_len: usize) -> usize {
        cleartext_len + TLS13_RECORD_OVERHEAD
    }

    fn encrypt(
        &mut self,
        dest: &mut Vec<u8>,
        content_type: ContentType,
        cleartext: &[u8],
    ) -> io::Result<()> {
        if content_type != ContentType::ApplicationData {
            return Err(Error::new(
                ErrorKind::InvalidInput,
                format!(
                    "only application data can be sealed, got 0x{:02x}",
                    content_type.as_u8()
                ),
            ));
        }
        self.conn.writer().write_all(cleartext)?;
        while self.conn.wants_write() {
            self.conn.write_tls(dest)?;
        }
        Ok(())
    }

    fn next_record(&mut self, buf: &[u8]) -> io::Result<Option<DecodedRecord>> {
        if !buf.is_empty() {
            feed_client_connection(&mut self.conn, buf)?;
        }
        let io_state = process_new_packets(&mut self.conn)?;

        let available = io_state.plaintext_bytes_to_read();
        if available > 0 {
            let mut cleartext = vec![0u8; available];
            self.conn.reader().read_exact(&mut cleartext)?;
            return Ok(Some(DecodedRecord {
                content_type: ContentType::ApplicationData,
                cleartext,
                consumed: buf.len(),
            }));
        }

        if io_state.peer_has_closed() {
            return Ok(Some(DecodedRecord {
                content_type: ContentType::Alert,
                cleartext: Vec::new(),
                consumed: buf.len(),
            }));
        }

        if !buf.is_empty() {
            // Everything offered is now staged inside rustls awaiting the
            // rest of a record (or was a session ticket rustls handled
            // itself). Surface an empty handshake-type record so the caller
            // marks the bytes consumed without delivering anything.
            return Ok(Some(DecodedRecord {
                content_type: ContentType::Handshake,
                cleartext: Vec::new(),
                consumed: buf.len(),
            }));
        }

        Ok(None)
    }
}
