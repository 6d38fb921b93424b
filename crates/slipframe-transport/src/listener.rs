use std::net::TcpListener;
#[cfg(unix)]
use std::os::unix::fs::{FileTypeExt, MetadataExt, PermissionsExt};
#[cfg(unix)]
use std::os::unix::net::UnixListener;
use std::path::{Path, PathBuf};

use slipframe_driver::DriverConfig;
use tracing::{debug, info};

use crate::endpoint::Endpoint;
use crate::error::{Result, TransportError};
use crate::socket::SlipSocket;

enum ListenerInner {
    Tcp(TcpListener),
    #[cfg(unix)]
    Unix {
        listener: UnixListener,
        path: PathBuf,
        created_inode: (u64, u64),
    },
}

/// Accepts SLIP peers on a TCP address or a Unix domain socket path.
///
/// Unix socket files are created with mode `0o600` and removed on drop, unless
/// the path has since been replaced by something else.
pub struct SlipListener {
    inner: ListenerInner,
    config: DriverConfig,
}

impl SlipListener {
    /// Default permission mode for created socket paths.
    pub const DEFAULT_SOCKET_MODE: u32 = 0o600;
    /// Maximum socket path length.
    /// Unix `sockaddr_un.sun_path` is typically 108 bytes on Linux, 104 on macOS.
    #[cfg(target_os = "linux")]
    const MAX_PATH_LEN: usize = 108;
    #[cfg(not(target_os = "linux"))]
    const MAX_PATH_LEN: usize = 104;

    /// Bind and listen on an endpoint.
    pub fn bind(endpoint: &Endpoint) -> Result<Self> {
        match endpoint {
            Endpoint::Tcp(addr) => Self::bind_tcp(addr),
            #[cfg(unix)]
            Endpoint::Unix(path) => Self::bind_unix(path, Self::DEFAULT_SOCKET_MODE),
            #[cfg(not(unix))]
            Endpoint::Unix(_) => Err(TransportError::Bind {
                endpoint: endpoint.to_string(),
                source: std::io::Error::from(std::io::ErrorKind::Unsupported),
            }),
        }
    }

    fn bind_tcp(addr: &str) -> Result<Self> {
        let listener = TcpListener::bind(addr).map_err(|source| TransportError::Bind {
            endpoint: format!("tcp:{addr}"),
            source,
        })?;
        info!(addr = ?listener.local_addr().ok(), "listening on tcp");
        Ok(Self {
            inner: ListenerInner::Tcp(listener),
            config: DriverConfig::default(),
        })
    }

    /// Bind and listen on a Unix domain socket path with explicit mode.
    ///
    /// A stale socket file at `path` is removed first; any other kind of file
    /// is left alone and the bind fails.
    #[cfg(unix)]
    pub fn bind_unix(path: impl AsRef<Path>, mode: u32) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let bind_err = |source| TransportError::Bind {
            endpoint: format!("unix:{}", path.display()),
            source,
        };

        let path_bytes = path.as_os_str().len();
        if path_bytes >= Self::MAX_PATH_LEN {
            return Err(TransportError::PathTooLong {
                path,
                len: path_bytes,
                max: Self::MAX_PATH_LEN,
            });
        }

        if let Ok(metadata) = std::fs::symlink_metadata(&path) {
            if !metadata.file_type().is_socket() {
                return Err(bind_err(std::io::Error::new(
                    std::io::ErrorKind::AlreadyExists,
                    "existing path is not a unix socket",
                )));
            }
            debug!(?path, "removing stale socket");
            std::fs::remove_file(&path).map_err(bind_err)?;
        }

        let listener = UnixListener::bind(&path).map_err(bind_err)?;
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(mode)).map_err(bind_err)?;
        let created = std::fs::symlink_metadata(&path).map_err(bind_err)?;

        info!(?path, "listening on unix domain socket");

        Ok(Self {
            inner: ListenerInner::Unix {
                listener,
                created_inode: (created.dev(), created.ino()),
                path,
            },
            config: DriverConfig::default(),
        })
    }

    /// Driver configuration applied to every accepted socket.
    pub fn with_driver_config(mut self, config: DriverConfig) -> Self {
        self.config = config;
        self
    }

    pub fn driver_config(&self) -> &DriverConfig {
        &self.config
    }

    /// Accept the next connection (blocking). Returns the socket and a
    /// printable peer address.
    pub fn accept(&self) -> Result<(SlipSocket, String)> {
        match &self.inner {
            ListenerInner::Tcp(listener) => {
                let (stream, addr) = listener.accept().map_err(TransportError::Accept)?;
                stream.set_nodelay(true)?;
                debug!(%addr, "accepted tcp connection");
                Ok((SlipSocket::from_tcp(stream, self.config), addr.to_string()))
            }
            #[cfg(unix)]
            ListenerInner::Unix { listener, .. } => {
                let (stream, _addr) = listener.accept().map_err(TransportError::Accept)?;
                debug!("accepted unix connection");
                Ok((SlipSocket::from_unix(stream, self.config), "unix-peer".to_string()))
            }
        }
    }

    /// The endpoint this listener is bound to, with the actual port for
    /// `:0` TCP binds.
    pub fn local_endpoint(&self) -> Result<Endpoint> {
        match &self.inner {
            ListenerInner::Tcp(listener) => Ok(Endpoint::Tcp(listener.local_addr()?.to_string())),
            #[cfg(unix)]
            ListenerInner::Unix { path, .. } => Ok(Endpoint::Unix(path.clone())),
        }
    }
}

impl Drop for SlipListener {
    fn drop(&mut self) {
        #[cfg(unix)]
        if let ListenerInner::Unix {
            path,
            created_inode: (expected_dev, expected_ino),
            ..
        } = &self.inner
        {
            if let Ok(metadata) = std::fs::symlink_metadata(path) {
                if metadata.file_type().is_socket()
                    && metadata.dev() == *expected_dev
                    && metadata.ino() == *expected_ino
                {
                    debug!(?path, "cleaning up socket file");
                    let _ = std::fs::remove_file(path);
                } else {
                    debug!(?path, "socket path identity changed; skipping cleanup");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use slipframe_driver::ErrorMode;

    use super::*;
    use crate::traits::SlipWrapper;

    fn temp_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "slipframe-{tag}-{}-{}",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .expect("time should be after epoch")
                .as_nanos()
        ));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn tcp_accept_applies_driver_config() {
        let listener = SlipListener::bind(&Endpoint::tcp("127.0.0.1:0"))
            .unwrap()
            .with_driver_config(DriverConfig::default().with_error_mode(ErrorMode::Relaxed));
        let endpoint = listener.local_endpoint().unwrap();

        let client = thread::spawn(move || {
            let mut socket = SlipSocket::connect(&endpoint).unwrap();
            socket.send_bytes(b"\xdb\xc0").unwrap();
        });

        let (mut socket, peer) = listener.accept().unwrap();
        assert!(peer.starts_with("127.0.0.1:"));
        assert_eq!(socket.driver().error_mode(), ErrorMode::Relaxed);
        assert_eq!(socket.recv_msg().unwrap().unwrap().as_ref(), b"\xdb");
        client.join().unwrap();
    }

    #[test]
    #[cfg(unix)]
    fn unix_bind_accept_connect_and_cleanup() {
        let dir = temp_dir("uds");
        let sock_path = dir.join("test.sock");
        let endpoint = Endpoint::unix(&sock_path);

        let listener = SlipListener::bind(&endpoint).unwrap();
        assert!(sock_path.exists());
        let mode = std::fs::metadata(&sock_path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o600);

        let client_endpoint = endpoint.clone();
        let client = thread::spawn(move || {
            let mut socket = SlipSocket::connect(&client_endpoint).unwrap();
            socket.send_msg(b"hello").unwrap();
        });

        let (mut socket, _) = listener.accept().unwrap();
        assert_eq!(socket.recv_msg().unwrap().unwrap().as_ref(), b"hello");
        client.join().unwrap();

        drop(listener);
        assert!(!sock_path.exists(), "socket file should be cleaned up on drop");
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    #[cfg(unix)]
    fn unix_path_too_long() {
        let long_path = "/tmp/".to_string() + &"a".repeat(200) + ".sock";
        let result = SlipListener::bind(&Endpoint::unix(long_path));
        assert!(matches!(result, Err(TransportError::PathTooLong { .. })));
    }

    #[test]
    #[cfg(unix)]
    fn unix_bind_rejects_existing_regular_file() {
        let dir = temp_dir("regular");
        let sock_path = dir.join("not-a-socket.sock");
        std::fs::write(&sock_path, b"regular-file").unwrap();

        let result = SlipListener::bind(&Endpoint::unix(&sock_path));
        assert!(matches!(result, Err(TransportError::Bind { .. })));
        assert!(sock_path.exists());

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    #[cfg(unix)]
    fn drop_leaves_replaced_path() {
        let dir = temp_dir("replaced");
        let sock_path = dir.join("drop.sock");

        let listener = SlipListener::bind(&Endpoint::unix(&sock_path)).unwrap();
        std::fs::remove_file(&sock_path).unwrap();
        std::fs::write(&sock_path, b"replacement-file").unwrap();

        drop(listener);
        assert!(sock_path.exists(), "drop must not remove a replaced path");
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn tcp_bind_failure_is_reported() {
        let first = SlipListener::bind(&Endpoint::tcp("127.0.0.1:0")).unwrap();
        let taken = first.local_endpoint().unwrap();
        let result = SlipListener::bind(&taken);
        assert!(matches!(result, Err(TransportError::Bind { .. })));
    }
}
