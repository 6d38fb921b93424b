use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::TransportError;

/// Address of a SLIP peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    /// `HOST:PORT`, resolved when connecting or binding.
    Tcp(String),
    /// Filesystem path of a Unix domain socket.
    Unix(PathBuf),
}

impl Endpoint {
    pub fn tcp(addr: impl Into<String>) -> Self {
        Endpoint::Tcp(addr.into())
    }

    pub fn unix(path: impl Into<PathBuf>) -> Self {
        Endpoint::Unix(path.into())
    }

    /// Transport name for diagnostics.
    pub fn transport_name(&self) -> &'static str {
        match self {
            Endpoint::Tcp(_) => "tcp",
            Endpoint::Unix(_) => "unix-domain-socket",
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Tcp(addr) => write!(f, "tcp:{addr}"),
            Endpoint::Unix(path) => write!(f, "unix:{}", path.display()),
        }
    }
}

fn is_host_port(s: &str) -> bool {
    match s.rsplit_once(':') {
        Some((host, port)) => !host.is_empty() && port.parse::<u16>().is_ok(),
        None => false,
    }
}

impl FromStr for Endpoint {
    type Err = TransportError;

    /// Accepts `tcp:HOST:PORT`, `tcp://HOST:PORT`, `unix:PATH`, a bare path
    /// containing `/`, or a bare `HOST:PORT`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let invalid = || TransportError::InvalidEndpoint(s.to_string());

        if let Some(addr) = s.strip_prefix("tcp://").or_else(|| s.strip_prefix("tcp:")) {
            return if is_host_port(addr) {
                Ok(Endpoint::Tcp(addr.to_string()))
            } else {
                Err(invalid())
            };
        }
        if let Some(path) = s.strip_prefix("unix:") {
            return if path.is_empty() {
                Err(invalid())
            } else {
                Ok(Endpoint::Unix(PathBuf::from(path)))
            };
        }
        if s.contains('/') {
            return Ok(Endpoint::Unix(PathBuf::from(s)));
        }
        if is_host_port(s) {
            return Ok(Endpoint::Tcp(s.to_string()));
        }
        Err(invalid())
    }
}
