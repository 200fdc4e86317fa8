use std::os::unix::fs::{FileTypeExt, MetadataExt, PermissionsExt};
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::stream::StreamTransport;

/// Unix domain socket endpoint for serial links.
///
/// Real devices are typically bridged onto a socket (for example with
/// `socat`), and simulators listen on one. The listening side owns the
/// socket file and removes it on drop.
pub struct UnixSerialSocket {
    listener: UnixListener,
    path: PathBuf,
    /// (dev, ino) of the socket file this listener created.
    created_inode: (u64, u64),
}

impl UnixSerialSocket {
    /// Permission mode applied to created socket files.
    pub const DEFAULT_SOCKET_MODE: u32 = 0o600;

    /// `sockaddr_un.sun_path` is 108 bytes on Linux and 104 elsewhere.
    #[cfg(target_os = "linux")]
    const MAX_PATH_LEN: usize = 108;
    #[cfg(not(target_os = "linux"))]
    const MAX_PATH_LEN: usize = 104;

    /// Bind a listening socket at `path`.
    ///
    /// A stale socket file at `path` is replaced; any other kind of file is
    /// left alone and reported as a bind error.
    pub fn bind(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let len = path.as_os_str().len();
        if len >= Self::MAX_PATH_LEN {
            return Err(TransportError::PathTooLong {
                path,
                len,
                max: Self::MAX_PATH_LEN,
            });
        }

        let bind_err = |source: std::io::Error| TransportError::Bind {
            path: path.clone(),
            source,
        };

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
        std::fs::set_permissions(
            &path,
            std::fs::Permissions::from_mode(Self::DEFAULT_SOCKET_MODE),
        )
        .map_err(bind_err)?;
        let created = std::fs::symlink_metadata(&path).map_err(bind_err)?;
        let created_inode = (created.dev(), created.ino());

        info!(?path, "serial socket listening");
        Ok(Self {
            listener,
            path,
            created_inode,
        })
    }

    /// Accept the next link (blocking).
    pub fn accept(&self) -> Result<StreamTransport<UnixStream>> {
        let (stream, _addr) = self.listener.accept().map_err(TransportError::Accept)?;
        debug!(path = ?self.path, "serial link accepted");
        Ok(StreamTransport::new(stream))
    }

    /// Accept a pending link if one is waiting, without blocking.
    pub fn try_accept(&self) -> Result<Option<StreamTransport<UnixStream>>> {
        self.listener
            .set_nonblocking(true)
            .map_err(TransportError::Accept)?;
        let accepted = self.listener.accept();
        self.listener
            .set_nonblocking(false)
            .map_err(TransportError::Accept)?;

        match accepted {
            Ok((stream, _addr)) => {
                // Some platforms hand out accepted streams in the listener's mode.
                stream
                    .set_nonblocking(false)
                    .map_err(TransportError::Accept)?;
                debug!(path = ?self.path, "serial link accepted");
                Ok(Some(StreamTransport::new(stream)))
            }
            Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => Ok(None),
            Err(err) => Err(TransportError::Accept(err)),
        }
    }

    /// Connect to a listening serial socket (blocking).
    pub fn connect(path: impl AsRef<Path>) -> Result<StreamTransport<UnixStream>> {
        let path = path.as_ref();
        let stream = UnixStream::connect(path).map_err(|source| TransportError::Connect {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(?path, "serial link connected");
        Ok(StreamTransport::new(stream))
    }

    /// The path this socket is bound to.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for UnixSerialSocket {
    fn drop(&mut self) {
        let (dev, ino) = self.created_inode;
        let ours = std::fs::symlink_metadata(&self.path)
            .map(|m| m.file_type().is_socket() && m.dev() == dev && m.ino() == ino)
            .unwrap_or(false);
        if ours {
            debug!(path = ?self.path, "removing socket file");
            let _ = std::fs::remove_file(&self.path);
        } else {
            debug!(path = ?self.path, "socket path identity changed; skipping cleanup");
        }
    }
}
