//! TLS transport over a blocking `TcpStream`, with three certificate
//! acceptance modes in place of a bad-certificate callback (§4.8).

use std::io::{Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

use md5::{Digest, Md5};
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::{ClientConfig, ClientConnection, DigitallySignedStruct, RootCertStore, SignatureScheme, StreamOwned};
use rustls_pki_types::{CertificateDer, ServerName, UnixTime};

use crate::error::{Error, Result};
use crate::io::{ByteReader, ByteWriter};
use crate::net::ip_address::IpAddress;
use crate::transport::tcp::connect_stream;
use crate::transport::{Timeout, Transport};

/// Which of the three acceptance modes governs a peer certificate that
/// the normal chain validation would otherwise need to judge.
#[derive(Debug, Clone)]
pub enum CertAcceptance {
    /// Accept any certificate, after logging that verification was skipped.
    TrustAny,
    /// Accept only a certificate whose MD5 fingerprint (colon-separated
    /// uppercase hex over the DER encoding) matches exactly.
    FingerprintPinned(String),
    /// Defer to the platform root store; surface any validation failure.
    Strict,
}

fn md5_fingerprint(der: &[u8]) -> String {
    let mut hasher = Md5::new();
    hasher.update(der);
    let digest = hasher.finalize();
    digest.iter().map(|b| format!("{b:02X}")).collect::<Vec<_>>().join(":")
}

static CRYPTO_PROVIDER_INIT: OnceLock<()> = OnceLock::new();

fn ensure_crypto_provider_installed() {
    CRYPTO_PROVIDER_INIT.get_or_init(|| {
        let _ = rustls::crypto::ring::default_provider().install_default();
    });
}

fn webpki_root_store() -> RootCertStore {
    let mut roots = RootCertStore::empty();
    roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
    roots
}

struct AcceptanceVerifier {
    mode: CertAcceptance,
    strict_inner: Option<Arc<dyn ServerCertVerifier>>,
}

impl std::fmt::Debug for AcceptanceVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AcceptanceVerifier").field("mode", &self.mode).finish()
    }
}

impl AcceptanceVerifier {
    fn new(mode: CertAcceptance) -> Result<Self> {
        let strict_inner = match mode {
            CertAcceptance::Strict => {
                let verifier = rustls::client::WebPkiServerVerifier::builder(Arc::new(webpki_root_store()))
                    .build()
                    .map_err(|_| Error::SslCertError)?;
                Some(verifier as Arc<dyn ServerCertVerifier>)
            }
            _ => None,
        };
        Ok(Self { mode, strict_inner })
    }
}

impl ServerCertVerifier for AcceptanceVerifier {
    fn verify_server_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        intermediates: &[CertificateDer<'_>],
        server_name: &ServerName<'_>,
        ocsp_response: &[u8],
        now: UnixTime,
    ) -> std::result::Result<ServerCertVerified, rustls::Error> {
        match &self.mode {
            CertAcceptance::TrustAny => {
                log::warn!("accepting peer certificate without verification (trust-any mode)");
                Ok(ServerCertVerified::assertion())
            }
            CertAcceptance::FingerprintPinned(expected) => {
                let actual = md5_fingerprint(end_entity.as_ref());
                if &actual == expected {
                    Ok(ServerCertVerified::assertion())
                } else {
                    Err(rustls::Error::General(format!("certificate fingerprint {actual} does not match configured {expected}")))
                }
            }
            CertAcceptance::Strict => {
                self.strict_inner.as_ref().expect("built for Strict mode").verify_server_cert(end_entity, intermediates, server_name, ocsp_response, now)
            }
        }
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        match &self.mode {
            CertAcceptance::Strict => self.strict_inner.as_ref().expect("built for Strict mode").verify_tls12_signature(message, cert, dss),
            _ => Ok(HandshakeSignatureValid::assertion()),
        }
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        match &self.mode {
            CertAcceptance::Strict => self.strict_inner.as_ref().expect("built for Strict mode").verify_tls13_signature(message, cert, dss),
            _ => Ok(HandshakeSignatureValid::assertion()),
        }
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        match &self.mode {
            CertAcceptance::Strict => self.strict_inner.as_ref().expect("built for Strict mode").supported_verify_schemes(),
            _ => rustls::crypto::ring::default_provider().signature_verification_algorithms.supported_schemes(),
        }
    }
}

fn clamp_positive(d: Duration) -> Duration {
    if d.is_zero() {
        Duration::from_nanos(1)
    } else {
        d
    }
}

/// A TLS session over a blocking `TcpStream`, handshaken eagerly at
/// connect time.
pub struct TlsTransport {
    conn: StreamOwned<ClientConnection, TcpStream>,
    local_addr: SocketAddr,
    closed: bool,
    default_timeout: Timeout,
}

impl TlsTransport {
    pub fn connect(host: &str, port: u16, use_ipv6: bool, connect_timeout: Timeout, cert_acceptance: CertAcceptance) -> Result<Self> {
        ensure_crypto_provider_installed();

        let tcp = connect_stream(host, port, use_ipv6, connect_timeout)?;
        let local_addr = tcp.local_addr().map_err(|_| Error::SocketConnectFailed)?;

        let verifier = Arc::new(AcceptanceVerifier::new(cert_acceptance)?);
        let config = ClientConfig::builder().dangerous().with_custom_certificate_verifier(verifier).with_no_client_auth();

        let server_name = ServerName::try_from(host.to_string()).map_err(|_| Error::SslCertError)?;
        let client_conn = ClientConnection::new(Arc::new(config), server_name).map_err(|_| Error::SslInitError)?;

        let mut conn = StreamOwned::new(client_conn, tcp);
        while conn.conn.is_handshaking() {
            conn.conn.complete_io(&mut conn.sock).map_err(|_| Error::SslInitError)?;
        }

        Ok(Self { conn, local_addr, closed: false, default_timeout: Timeout::WAIT_FOREVER })
    }
}

impl Transport for TlsTransport {
    fn read(&mut self, buf: &mut [u8], timeout: Timeout) -> Result<usize> {
        if self.closed {
            return Err(Error::ConnectionClosed);
        }

        let deadline = timeout.to_duration().map(|d| Instant::now() + d);
        let mut total = 0;

        while total < buf.len() {
            let remaining = match deadline {
                None => None,
                Some(dl) => {
                    let now = Instant::now();
                    if now >= dl {
                        return if total > 0 { Ok(total) } else { Err(Error::TimeoutExpired) };
                    }
                    Some(clamp_positive(dl - now))
                }
            };

            self.conn.sock.set_read_timeout(remaining).map_err(|_| Error::PollError)?;

            match self.conn.read(&mut buf[total..]) {
                Ok(0) => return Err(Error::ConnectionClosed),
                Ok(n) => total += n,
                Err(e) if matches!(e.kind(), std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut) => {
                    return if total > 0 { Ok(total) } else { Err(Error::TimeoutExpired) };
                }
                Err(_) => return Err(Error::SocketReadFailed),
            }
        }

        Ok(total)
    }

    fn write(&mut self, buf: &[u8], timeout: Timeout) -> Result<usize> {
        if self.closed {
            return Err(Error::ConnectionClosed);
        }

        let deadline = timeout.to_duration().map(|d| Instant::now() + d);
        let mut total = 0;

        while total < buf.len() {
            let remaining = match deadline {
                None => None,
                Some(dl) => {
                    let now = Instant::now();
                    if now >= dl {
                        return Err(Error::TimeoutExpired);
                    }
                    Some(clamp_positive(dl - now))
                }
            };

            self.conn.sock.set_write_timeout(remaining).map_err(|_| Error::PollError)?;

            match self.conn.write(&buf[total..]) {
                Ok(0) => return Err(Error::SocketWriteFailed),
                Ok(n) => total += n,
                Err(e) if matches!(e.kind(), std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut) => {
                    return Err(Error::TimeoutExpired);
                }
                Err(_) => return Err(Error::SocketWriteFailed),
            }
        }

        let _ = self.conn.flush();
        Ok(total)
    }

    fn shutdown(&mut self) -> Result<()> {
        self.conn.conn.send_close_notify();
        let _ = self.conn.flush();
        self.conn.sock.shutdown(std::net::Shutdown::Both).map_err(|_| Error::SocketShutdownFailed)?;
        self.closed = true;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.conn.sock.shutdown(std::net::Shutdown::Both).map_err(|_| Error::SocketCloseFailed)?;
        self.closed = true;
        Ok(())
    }

    fn local_port(&self) -> Result<u16> {
        Ok(self.local_addr.port())
    }

    fn local_ip(&self) -> Result<IpAddress> {
        Ok(IpAddress::from_socket_addr(&self.local_addr))
    }

    fn is_closed(&self) -> bool {
        self.closed
    }
}

impl ByteReader for TlsTransport {
    fn read_u8(&mut self) -> Result<u8> {
        let mut out = [0u8; 1];
        self.read_exact(&mut out)?;
        Ok(out[0])
    }

    fn read_u16(&mut self) -> Result<u16> {
        let mut out = [0u8; 2];
        self.read_exact(&mut out)?;
        Ok(u16::from_be_bytes(out))
    }

    fn read_u32(&mut self) -> Result<u32> {
        let mut out = [0u8; 4];
        self.read_exact(&mut out)?;
        Ok(u32::from_be_bytes(out))
    }

    fn read_u64(&mut self) -> Result<u64> {
        let mut out = [0u8; 8];
        self.read_exact(&mut out)?;
        Ok(u64::from_be_bytes(out))
    }

    fn read_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        let timeout = self.default_timeout;
        let n = Transport::read(self, buf, timeout)?;
        if n != buf.len() {
            return Err(Error::TimeoutExpired);
        }
        Ok(())
    }
}

impl ByteWriter for TlsTransport {
    fn write_u8(&mut self, value: u8) -> Result<()> {
        self.write_bytes(&[value])
    }

    fn write_u16(&mut self, value: u16) -> Result<()> {
        self.write_bytes(&value.to_be_bytes())
    }

    fn write_u32(&mut self, value: u32) -> Result<()> {
        self.write_bytes(&value.to_be_bytes())
    }

    fn write_u64(&mut self, value: u64) -> Result<()> {
        self.write_bytes(&value.to_be_bytes())
    }

    fn write_bytes(&mut self, buf: &[u8]) -> Result<()> {
        let timeout = self.default_timeout;
        Transport::write(self, buf, timeout)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_formatting_is_colon_separated_uppercase_hex() {
        let fp = md5_fingerprint(b"hello");
        assert_eq!(fp.len(), 32 + 15);
        assert!(fp.chars().all(|c| c.is_ascii_hexdigit() || c == ':'));
        assert_eq!(fp, fp.to_uppercase());
    }

    #[test]
    fn trust_any_accepts_without_checking_fingerprint() {
        let verifier = AcceptanceVerifier::new(CertAcceptance::TrustAny).unwrap();
        let cert = CertificateDer::from(vec![1, 2, 3]);
        let name = ServerName::try_from("example.com").unwrap();
        let result = verifier.verify_server_cert(&cert, &[], &name, &[], UnixTime::now());
        assert!(result.is_ok());
    }

    #[test]
    fn fingerprint_mismatch_is_rejected() {
        let verifier = AcceptanceVerifier::new(CertAcceptance::FingerprintPinned("00:00:00:00:00:00:00:00:00:00:00:00:00:00:00:00".into())).unwrap();
        let cert = CertificateDer::from(vec![1, 2, 3]);
        let name = ServerName::try_from("example.com").unwrap();
        let result = verifier.verify_server_cert(&cert, &[], &name, &[], UnixTime::now());
        assert!(result.is_err());
    }

    #[test]
    fn fingerprint_exact_match_is_accepted() {
        let expected = md5_fingerprint(&[1, 2, 3]);
        let verifier = AcceptanceVerifier::new(CertAcceptance::FingerprintPinned(expected)).unwrap();
        let cert = CertificateDer::from(vec![1, 2, 3]);
        let name = ServerName::try_from("example.com").unwrap();
        let result = verifier.verify_server_cert(&cert, &[], &name, &[], UnixTime::now());
        assert!(result.is_ok());
    }
}
