//! Endpoint naming, listening, and connecting.
//!
//! An endpoint is identified by `{ session id, channel name }` and
//! rendered as a socket path `<base>/<name>_<session>.sock`. The
//! display side binds and listens; the service side connects,
//! retrying while the endpoint has not appeared yet.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use tokio::net::{UnixListener, UnixStream};
use tracing::{debug, trace};

use crate::channel::connection::ChannelConnection;
use crate::error::WireError;

/// Pause between connect attempts while waiting for the endpoint.
pub const CONNECT_RETRY_INTERVAL: Duration = Duration::from_millis(50);

/// Base directory for channel sockets unless the caller overrides it.
pub fn default_base_dir() -> PathBuf {
    std::env::temp_dir().join("orderwire")
}

// ── Identity ─────────────────────────────────────────────────────

/// Composite endpoint identity: one logical channel of one session.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChannelId {
    pub session_id: u32,
    pub name: String,
}

impl ChannelId {
    pub fn new(session_id: u32, name: impl Into<String>) -> Self {
        Self {
            session_id,
            name: name.into(),
        }
    }

    /// The socket path for this identity under `base`.
    pub fn socket_path(&self, base: &Path) -> PathBuf {
        base.join(format!("{}_{}.sock", self.name, self.session_id))
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.name, self.session_id)
    }
}

// ── Listener ─────────────────────────────────────────────────────

/// Bound server-side endpoint. Removes its socket file on drop.
#[derive(Debug)]
pub struct ChannelListener {
    inner: UnixListener,
    path: PathBuf,
}

impl ChannelListener {
    /// Binds under the default base directory.
    pub fn bind(id: &ChannelId) -> Result<Self, WireError> {
        Self::bind_at(id, &default_base_dir())
    }

    /// Binds `id` under `base`, creating the directory and removing a
    /// stale socket file left behind by a dead process.
    pub fn bind_at(id: &ChannelId, base: &Path) -> Result<Self, WireError> {
        std::fs::create_dir_all(base).map_err(|source| WireError::Bind {
            path: base.to_path_buf(),
            source,
        })?;

        let path = id.socket_path(base);
        match std::fs::remove_file(&path) {
            Ok(()) => debug!(path = %path.display(), "removed stale endpoint socket"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(source) => return Err(WireError::Bind { path, source }),
        }

        let inner = UnixListener::bind(&path).map_err(|source| WireError::Bind {
            path: path.clone(),
            source,
        })?;
        debug!(channel = %id, path = %path.display(), "endpoint listening");
        Ok(Self { inner, path })
    }

    /// Waits for the next peer. The returned connection owns the
    /// stream; accepting again while one is open replaces the peer
    /// once the caller drops the old connection.
    pub async fn accept(&self) -> Result<ChannelConnection, WireError> {
        let (stream, _) = self.inner.accept().await?;
        debug!(path = %self.path.display(), "peer connected");
        Ok(ChannelConnection::new(stream))
    }

    pub fn local_path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ChannelListener {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

// ── Connecting ───────────────────────────────────────────────────

/// Connects to `id` under the default base directory.
pub async fn connect(id: &ChannelId, timeout: Duration) -> Result<ChannelConnection, WireError> {
    connect_at(id, &default_base_dir(), timeout).await
}

/// Connects to `id` under `base`, retrying an absent or refusing
/// endpoint until `timeout` has elapsed. The peer usually creates the
/// socket moments after we start waiting for it.
///
/// A zero timeout makes a single attempt; failure surfaces as
/// `ConnectRefused`.
pub async fn connect_at(
    id: &ChannelId,
    base: &Path,
    timeout: Duration,
) -> Result<ChannelConnection, WireError> {
    let path = id.socket_path(base);
    let deadline = Instant::now() + timeout;

    loop {
        match UnixStream::connect(&path).await {
            Ok(stream) => {
                debug!(channel = %id, "connected to endpoint");
                return Ok(ChannelConnection::new(stream));
            }
            Err(e) => {
                if timeout.is_zero() {
                    return Err(WireError::ConnectRefused(path));
                }
                if Instant::now() + CONNECT_RETRY_INTERVAL >= deadline {
                    return Err(WireError::ConnectTimeout(timeout));
                }
                trace!(channel = %id, error = %e, "endpoint not ready, retrying");
                tokio::time::sleep(CONNECT_RETRY_INTERVAL).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn test_base() -> PathBuf {
        static SEQ: AtomicU32 = AtomicU32::new(0);
        std::env::temp_dir().join(format!(
            "orderwire-ep-{}-{}",
            std::process::id(),
            SEQ.fetch_add(1, Ordering::Relaxed)
        ))
    }

    #[test]
    fn socket_path_rendering() {
        let id = ChannelId::new(7, "orders");
        assert_eq!(
            id.socket_path(Path::new("/tmp/base")),
            PathBuf::from("/tmp/base/orders_7.sock")
        );
        assert_eq!(id.to_string(), "orders_7");
    }

    #[tokio::test]
    async fn bind_connect_accept() {
        let base = test_base();
        let id = ChannelId::new(1, "events");
        let listener = ChannelListener::bind_at(&id, &base).unwrap();
        assert!(listener.local_path().exists());

        let (client, server) = tokio::join!(
            connect_at(&id, &base, Duration::from_secs(1)),
            listener.accept()
        );
        client.unwrap();
        server.unwrap();
    }

    #[tokio::test]
    async fn stale_socket_is_replaced() {
        let base = test_base();
        let id = ChannelId::new(2, "events");
        std::fs::create_dir_all(&base).unwrap();
        std::fs::write(id.socket_path(&base), b"stale").unwrap();

        let listener = ChannelListener::bind_at(&id, &base).unwrap();
        drop(listener);

        // Drop removed the socket file again.
        assert!(!id.socket_path(&base).exists());
    }

    #[tokio::test]
    async fn rebind_after_drop() {
        let base = test_base();
        let id = ChannelId::new(3, "events");
        drop(ChannelListener::bind_at(&id, &base).unwrap());
        ChannelListener::bind_at(&id, &base).unwrap();
    }

    #[tokio::test]
    async fn zero_timeout_connect_is_single_shot() {
        let base = test_base();
        let id = ChannelId::new(4, "absent");
        let err = connect_at(&id, &base, Duration::ZERO).await.unwrap_err();
        assert!(matches!(err, WireError::ConnectRefused(_)));
    }

    #[tokio::test]
    async fn connect_times_out_when_endpoint_never_appears() {
        let base = test_base();
        let id = ChannelId::new(5, "absent");
        let started = Instant::now();
        let err = connect_at(&id, &base, Duration::from_millis(150))
            .await
            .unwrap_err();
        assert!(matches!(err, WireError::ConnectTimeout(_)));
        assert!(started.elapsed() >= Duration::from_millis(100));
    }
}
