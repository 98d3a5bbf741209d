//! Blocking TCP transport built directly on `std::net::TcpStream` (§4.8).

use std::io::{Read, Write};
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::time::{Duration, Instant};

use crate::error::{Error, Result};
use crate::io::{ByteReader, ByteWriter};
use crate::net::ip_address::IpAddress;
use crate::transport::{Timeout, Transport};

fn clamp_positive(d: Duration) -> Duration {
    if d.is_zero() {
        Duration::from_nanos(1)
    } else {
        d
    }
}

/// Resolves `host`, preferring an IPv6 address first when `use_ipv6` is
/// set (else IPv4 first), connects within `connect_timeout`, and enables
/// `TCP_NODELAY`. Shared by the plain TCP transport and the TLS
/// transport, which layers a handshake on top of the same socket.
pub(crate) fn connect_stream(host: &str, port: u16, use_ipv6: bool, connect_timeout: Timeout) -> Result<TcpStream> {
    let mut addrs: Vec<SocketAddr> = (host, port).to_socket_addrs().map_err(|_| Error::SocketConnectFailed)?.collect();
    if addrs.is_empty() {
        return Err(Error::SocketConnectFailed);
    }
    addrs.sort_by_key(|a| if use_ipv6 { !a.is_ipv6() } else { !a.is_ipv4() });
    let addr = addrs[0];

    let stream = match connect_timeout.to_duration() {
        Some(d) => TcpStream::connect_timeout(&addr, d).map_err(|_| Error::SocketConnectFailed)?,
        None => TcpStream::connect(addr).map_err(|_| Error::SocketConnectFailed)?,
    };
    stream.set_nodelay(true).map_err(|_| Error::SocketConnectFailed)?;
    Ok(stream)
}

/// A connected TCP socket, read and written through per-call timeouts
/// derived from `set_read_timeout`/`set_write_timeout` rather than a
/// hand-rolled non-blocking poll loop.
pub struct TcpTransport {
    stream: TcpStream,
    local_addr: SocketAddr,
    closed: bool,
    default_timeout: Timeout,
}

impl TcpTransport {
    pub fn connect(host: &str, port: u16, use_ipv6: bool, connect_timeout: Timeout) -> Result<Self> {
        let stream = connect_stream(host, port, use_ipv6, connect_timeout)?;
        let local_addr = stream.local_addr().map_err(|_| Error::SocketConnectFailed)?;

        Ok(Self { stream, local_addr, closed: false, default_timeout: Timeout::WAIT_FOREVER })
    }

    /// Sets the timeout `ByteReader`/`ByteWriter` calls use, so `Packet`
    /// framing (which only knows exact byte counts, not timeouts) can be
    /// driven straight off this transport.
    pub fn set_default_timeout(&mut self, timeout: Timeout) {
        self.default_timeout = timeout;
    }
}

impl Transport for TcpTransport {
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

            self.stream.set_read_timeout(remaining).map_err(|_| Error::PollError)?;

            match self.stream.read(&mut buf[total..]) {
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

            self.stream.set_write_timeout(remaining).map_err(|_| Error::PollError)?;

            match self.stream.write(&buf[total..]) {
                Ok(0) => return Err(Error::SocketWriteFailed),
                Ok(n) => total += n,
                Err(e) if matches!(e.kind(), std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut) => {
                    return Err(Error::TimeoutExpired);
                }
                Err(_) => return Err(Error::SocketWriteFailed),
            }
        }

        Ok(total)
    }

    fn shutdown(&mut self) -> Result<()> {
        self.stream.shutdown(std::net::Shutdown::Both).map_err(|_| Error::SocketShutdownFailed)?;
        self.closed = true;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.stream.shutdown(std::net::Shutdown::Both).map_err(|_| Error::SocketCloseFailed)?;
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

impl ByteReader for TcpTransport {
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

impl ByteWriter for TcpTransport {
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
    use std::net::TcpListener;
    use std::thread;

    #[test]
    fn connects_reads_and_writes_over_loopback() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let server = thread::spawn(move || {
            let (mut socket, _) = listener.accept().unwrap();
            let mut buf = [0u8; 5];
            socket.read_exact(&mut buf).unwrap();
            socket.write_all(b"world").unwrap();
        });

        let mut client = TcpTransport::connect("127.0.0.1", addr.port(), false, Timeout::WAIT_FOREVER).unwrap();
        client.write(b"hello", Timeout::WAIT_FOREVER).unwrap();

        let mut buf = [0u8; 5];
        let n = client.read(&mut buf, Timeout::WAIT_FOREVER).unwrap();
        assert_eq!(n, 5);
        assert_eq!(&buf, b"world");

        server.join().unwrap();
    }

    #[test]
    fn reading_after_the_peer_closes_is_connection_closed() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let server = thread::spawn(move || {
            let (socket, _) = listener.accept().unwrap();
            drop(socket);
        });

        let mut client = TcpTransport::connect("127.0.0.1", addr.port(), false, Timeout::WAIT_FOREVER).unwrap();
        server.join().unwrap();

        let mut buf = [0u8; 1];
        assert!(matches!(client.read(&mut buf, Timeout::from_micros(50_000)), Err(Error::ConnectionClosed)));
    }

    #[test]
    fn a_read_with_no_data_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let server = thread::spawn(move || {
            let (socket, _) = listener.accept().unwrap();
            thread::sleep(Duration::from_millis(200));
            drop(socket);
        });

        let mut client = TcpTransport::connect("127.0.0.1", addr.port(), false, Timeout::WAIT_FOREVER).unwrap();
        let mut buf = [0u8; 1];
        assert!(matches!(client.read(&mut buf, Timeout::from_micros(1_000)), Err(Error::TimeoutExpired)));
        server.join().unwrap();
    }
}
