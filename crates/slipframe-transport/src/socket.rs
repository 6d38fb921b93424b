use std::io::{Read, Write};
use std::net::{Shutdown, TcpStream};
use std::time::Duration;

use slipframe_driver::{Driver, DriverConfig};
use tracing::debug;

use crate::endpoint::Endpoint;
use crate::error::{Result, TransportError};
use crate::io::{read_chunk, write_packet};
use crate::stream::DEFAULT_CHUNK_SIZE;
use crate::traits::SlipWrapper;

/// A connected socket: TCP or Unix domain.
enum SocketStream {
    Tcp(TcpStream),
    #[cfg(unix)]
    Unix(std::os::unix::net::UnixStream),
}

impl Read for SocketStream {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match self {
            SocketStream::Tcp(stream) => stream.read(buf),
            #[cfg(unix)]
            SocketStream::Unix(stream) => stream.read(buf),
        }
    }
}

impl Write for SocketStream {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match self {
            SocketStream::Tcp(stream) => stream.write(buf),
            #[cfg(unix)]
            SocketStream::Unix(stream) => stream.write(buf),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match self {
            SocketStream::Tcp(stream) => stream.flush(),
            #[cfg(unix)]
            SocketStream::Unix(stream) => stream.flush(),
        }
    }
}

/// SLIP messages over a connected socket.
///
/// Created by [`SlipSocket::connect`], [`SlipListener::accept`](crate::SlipListener::accept)
/// or from an already connected std stream.
pub struct SlipSocket {
    stream: SocketStream,
    driver: Driver,
}

impl SlipSocket {
    fn from_stream(stream: SocketStream, config: DriverConfig) -> Self {
        Self {
            stream,
            driver: Driver::with_config(config),
        }
    }

    /// Wrap a connected TCP stream.
    pub fn from_tcp(stream: TcpStream, config: DriverConfig) -> Self {
        Self::from_stream(SocketStream::Tcp(stream), config)
    }

    /// Wrap a connected Unix domain socket.
    #[cfg(unix)]
    pub fn from_unix(stream: std::os::unix::net::UnixStream, config: DriverConfig) -> Self {
        Self::from_stream(SocketStream::Unix(stream), config)
    }

    /// Connect with the default driver configuration (blocking).
    pub fn connect(endpoint: &Endpoint) -> Result<Self> {
        Self::connect_with_config(endpoint, DriverConfig::default())
    }

    /// Connect with explicit driver configuration (blocking).
    pub fn connect_with_config(endpoint: &Endpoint, config: DriverConfig) -> Result<Self> {
        let connect_err = |source| TransportError::Connect {
            endpoint: endpoint.to_string(),
            source,
        };

        let stream = match endpoint {
            Endpoint::Tcp(addr) => {
                let stream = TcpStream::connect(addr.as_str()).map_err(connect_err)?;
                stream.set_nodelay(true).map_err(connect_err)?;
                SocketStream::Tcp(stream)
            }
            #[cfg(unix)]
            Endpoint::Unix(path) => {
                SocketStream::Unix(std::os::unix::net::UnixStream::connect(path).map_err(connect_err)?)
            }
            #[cfg(not(unix))]
            Endpoint::Unix(_) => {
                return Err(connect_err(std::io::Error::from(
                    std::io::ErrorKind::Unsupported,
                )))
            }
        };

        debug!(%endpoint, "connected");
        Ok(Self::from_stream(stream, config))
    }

    /// Address of the connected peer, for diagnostics.
    pub fn peer_addr(&self) -> Result<String> {
        match &self.stream {
            SocketStream::Tcp(stream) => Ok(stream.peer_addr()?.to_string()),
            #[cfg(unix)]
            SocketStream::Unix(stream) => Ok(unix_addr_name(&stream.peer_addr()?)),
        }
    }

    /// Local address of the socket, for diagnostics.
    pub fn local_addr(&self) -> Result<String> {
        match &self.stream {
            SocketStream::Tcp(stream) => Ok(stream.local_addr()?.to_string()),
            #[cfg(unix)]
            SocketStream::Unix(stream) => Ok(unix_addr_name(&stream.local_addr()?)),
        }
    }

    /// Set read timeout on the underlying socket.
    ///
    /// An expired timeout surfaces from `recv_msg` as an I/O error of kind
    /// `WouldBlock` or `TimedOut`; bytes already received stay buffered.
    pub fn set_read_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        match &self.stream {
            SocketStream::Tcp(stream) => stream.set_read_timeout(timeout)?,
            #[cfg(unix)]
            SocketStream::Unix(stream) => stream.set_read_timeout(timeout)?,
        }
        Ok(())
    }

    /// Set write timeout on the underlying socket.
    pub fn set_write_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        match &self.stream {
            SocketStream::Tcp(stream) => stream.set_write_timeout(timeout)?,
            #[cfg(unix)]
            SocketStream::Unix(stream) => stream.set_write_timeout(timeout)?,
        }
        Ok(())
    }

    /// Shut down the read, write, or both halves of the connection.
    pub fn shutdown(&self, how: Shutdown) -> Result<()> {
        match &self.stream {
            SocketStream::Tcp(stream) => stream.shutdown(how)?,
            #[cfg(unix)]
            SocketStream::Unix(stream) => stream.shutdown(how)?,
        }
        Ok(())
    }

    /// Transport name for diagnostics.
    pub fn transport_name(&self) -> &'static str {
        match &self.stream {
            SocketStream::Tcp(_) => "tcp",
            #[cfg(unix)]
            SocketStream::Unix(_) => "unix-domain-socket",
        }
    }
}

#[cfg(unix)]
fn unix_addr_name(addr: &std::os::unix::net::SocketAddr) -> String {
    match addr.as_pathname() {
        Some(path) => path.display().to_string(),
        None => "(unnamed)".to_string(),
    }
}

impl SlipWrapper for SlipSocket {
    fn driver(&self) -> &Driver {
        &self.driver
    }

    fn send_bytes(&mut self, packet: &[u8]) -> Result<()> {
        write_packet(&mut self.stream, packet)
    }

    fn recv_bytes(&mut self) -> Result<Vec<u8>> {
        read_chunk(&mut self.stream, DEFAULT_CHUNK_SIZE)
    }
}

impl std::fmt::Debug for SlipSocket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlipSocket")
            .field("type", &self.transport_name())
            .field("driver", &self.driver)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::io::ErrorKind;
    use std::net::TcpListener;
    use std::thread;

    use super::*;

    #[test]
    #[cfg(unix)]
    fn roundtrip_over_unix_pair() {
        let (left, right) = std::os::unix::net::UnixStream::pair().unwrap();
        let mut a = SlipSocket::from_unix(left, DriverConfig::default());
        let mut b = SlipSocket::from_unix(right, DriverConfig::default());

        a.send_msg(b"ping").unwrap();
        a.send_msg(b"\xc0\xdb").unwrap();
        assert_eq!(b.recv_msg().unwrap().unwrap().as_ref(), b"ping");
        assert_eq!(b.recv_msg().unwrap().unwrap().as_ref(), b"\xc0\xdb");

        a.shutdown(Shutdown::Write).unwrap();
        assert!(b.recv_msg().unwrap().is_none());
        assert_eq!(a.transport_name(), "unix-domain-socket");
    }

    #[test]
    fn roundtrip_over_tcp() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let endpoint = Endpoint::tcp(listener.local_addr().unwrap().to_string());

        let server = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut socket = SlipSocket::from_tcp(stream, DriverConfig::default());
            let msg = socket.recv_msg().unwrap().unwrap();
            socket.send_msg(&msg).unwrap();
        });

        let mut client = SlipSocket::connect(&endpoint).unwrap();
        assert_eq!(client.transport_name(), "tcp");
        assert!(client.peer_addr().unwrap().starts_with("127.0.0.1:"));

        client.send_msg(b"echo \xc0 me").unwrap();
        assert_eq!(client.recv_msg().unwrap().unwrap().as_ref(), b"echo \xc0 me");
        server.join().unwrap();
    }

    #[test]
    #[cfg(unix)]
    fn read_timeout_keeps_partial_packet() {
        let (left, right) = std::os::unix::net::UnixStream::pair().unwrap();
        let mut writer = left;
        let mut socket = SlipSocket::from_unix(right, DriverConfig::default());
        socket
            .set_read_timeout(Some(Duration::from_millis(20)))
            .unwrap();

        writer.write_all(b"half").unwrap();
        let err = socket.recv_msg().unwrap_err();
        assert!(matches!(
            err,
            TransportError::Io(ref e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut)
        ));

        writer.write_all(b"-done\xc0").unwrap();
        assert_eq!(socket.recv_msg().unwrap().unwrap().as_ref(), b"half-done");
    }

    #[test]
    fn connect_refused_reports_endpoint() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        drop(listener);

        let err = SlipSocket::connect(&Endpoint::tcp(addr.clone())).unwrap_err();
        match err {
            TransportError::Connect { endpoint, .. } => assert_eq!(endpoint, format!("tcp:{addr}")),
            other => panic!("unexpected error {other:?}"),
        }
    }
}
