//! Listener acquisition for TCP and Unix domain socket endpoints.
//!
//! A [`Listener`] is the single OS-level resource a network transport owns.
//! Dropping it closes the socket; for Unix sockets the filesystem entry is
//! removed as well, so the endpoint can be bound again immediately.

use std::io;
use std::net::SocketAddr;

use tokio::net::TcpListener;
use tracing::{debug, warn};

use super::{BoundEndpoint, TransportError};
use crate::config::{ListenEndpoint, NetworkFamily};

#[cfg(unix)]
use std::os::unix::fs::FileTypeExt;
#[cfg(unix)]
use std::path::{Path, PathBuf};
#[cfg(unix)]
use tokio::net::UnixListener;

/// An owned, bound listening socket.
#[derive(Debug)]
pub enum Listener {
    /// TCP listening socket.
    Tcp(TcpListener),
    /// Unix domain listening socket and the guard removing its file.
    #[cfg(unix)]
    Unix(UnixListener, SocketFile),
}

impl Listener {
    /// Binds a listener for `endpoint`.
    ///
    /// # Errors
    ///
    /// Returns an error if the address cannot be resolved or bound, or if a
    /// live socket already occupies the Unix socket path.
    pub async fn bind(endpoint: &ListenEndpoint) -> Result<Self, TransportError> {
        match endpoint {
            ListenEndpoint::Tcp { family, host, port } => {
                bind_tcp(*family, host, *port).await.map(Self::Tcp)
            }
            ListenEndpoint::Unix { path } => {
                #[cfg(unix)]
                {
                    let listener = bind_unix(path)?;
                    Ok(Self::Unix(listener, SocketFile::new(path.clone())))
                }

                #[cfg(not(unix))]
                {
                    Err(TransportError::UnsupportedUnix {
                        path: path.display().to_string(),
                    })
                }
            }
        }
    }

    /// Returns the endpoint this listener is actually bound to.
    ///
    /// # Errors
    ///
    /// Returns an error if the TCP socket cannot report its local address.
    pub fn local_endpoint(&self) -> io::Result<BoundEndpoint> {
        match self {
            Self::Tcp(listener) => listener.local_addr().map(BoundEndpoint::Tcp),
            #[cfg(unix)]
            Self::Unix(_, file) => Ok(BoundEndpoint::Unix(file.path().to_path_buf())),
        }
    }
}

/// Resolves `host:port` and binds the first address matching `family`.
///
/// # Errors
///
/// Returns an error if resolution fails, no address of the requested family
/// is found, `family` is not a TCP family, or the bind itself fails.
pub async fn bind_tcp(
    family: NetworkFamily,
    host: &str,
    port: u16,
) -> Result<TcpListener, TransportError> {
    if family == NetworkFamily::Unix {
        return Err(TransportError::NotTcp { family });
    }

    let mut addrs = tokio::net::lookup_host((host, port))
        .await
        .map_err(|source| TransportError::Resolve {
            host: host.to_string(),
            port,
            source,
        })?;
    let addr = addrs
        .find(|addr| matches_family(family, addr))
        .ok_or_else(|| TransportError::ResolveEmpty {
            family,
            host: host.to_string(),
            port,
        })?;

    debug!(%addr, %family, "binding TCP listener");
    TcpListener::bind(addr)
        .await
        .map_err(|source| TransportError::BindTcp { addr, source })
}

fn matches_family(family: NetworkFamily, addr: &SocketAddr) -> bool {
    match family {
        NetworkFamily::Tcp => true,
        NetworkFamily::Tcp4 => addr.is_ipv4(),
        NetworkFamily::Tcp6 => addr.is_ipv6(),
        NetworkFamily::Unix => false,
    }
}

/// Binds a Unix listener, replacing a stale socket file left by a previous
/// process but refusing to steal a live one.
#[cfg(unix)]
fn bind_unix(path: &Path) -> Result<UnixListener, TransportError> {
    if let Ok(metadata) = std::fs::symlink_metadata(path) {
        if !metadata.file_type().is_socket() {
            return Err(TransportError::UnixNotSocket {
                path: path.display().to_string(),
            });
        }
        match std::os::unix::net::UnixStream::connect(path) {
            Ok(_stream) => {
                return Err(TransportError::UnixInUse {
                    path: path.display().to_string(),
                });
            }
            Err(error)
                if error.kind() == io::ErrorKind::ConnectionRefused
                    || error.kind() == io::ErrorKind::NotFound =>
            {
                debug!(path = %path.display(), "removing stale unix socket");
                std::fs::remove_file(path).map_err(|source| TransportError::UnixCleanup {
                    path: path.display().to_string(),
                    source,
                })?;
            }
            Err(source) => {
                return Err(TransportError::BindUnix {
                    path: path.display().to_string(),
                    source,
                });
            }
        }
    }

    UnixListener::bind(path).map_err(|source| TransportError::BindUnix {
        path: path.display().to_string(),
        source,
    })
}

/// Removes a Unix socket file when dropped.
#[cfg(unix)]
#[derive(Debug)]
pub struct SocketFile {
    path: PathBuf,
}

#[cfg(unix)]
impl SocketFile {
    fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Path of the socket file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(unix)]
impl Drop for SocketFile {
    fn drop(&mut self) {
        if let Err(error) = std::fs::remove_file(&self.path) {
            if error.kind() != io::ErrorKind::NotFound {
                warn!(
                    error = %error,
                    path = %self.path.display(),
                    "failed to remove unix socket file"
                );
            }
        }
    }
}
