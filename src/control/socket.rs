//! Unix datagram control socket.
//!
//! One datagram carries one control message. The engine binds a well-known
//! path; controllers bind their own path so the engine can address them.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::Bytes;
use tokio::net::UnixDatagram;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::channel::{ChannelError, ControlSink, EndpointId};
use super::dispatcher::Dispatcher;
use crate::core::MAX_CONTROL_MESSAGE_SIZE;
use crate::transport::shutdown_requested;

/// Engine side of the control channel.
#[derive(Debug)]
pub struct ControlSocket {
    socket: UnixDatagram,
    /// Non-blocking handle on the same socket for synchronous sends.
    sender: std::os::unix::net::UnixDatagram,
    path: PathBuf,
}

impl ControlSocket {
    /// Bind at `path`, replacing a stale socket file.
    ///
    /// Must be called within a Tokio runtime.
    pub fn bind(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        match std::fs::remove_file(&path) {
            Ok(()) => debug!(path = %path.display(), "removed stale control socket"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }
        let std_socket = std::os::unix::net::UnixDatagram::bind(&path)?;
        std_socket.set_nonblocking(true)?;
        let sender = std_socket.try_clone()?;
        let socket = UnixDatagram::from_std(std_socket)?;
        info!(path = %path.display(), "control socket bound");
        Ok(Self {
            socket,
            sender,
            path,
        })
    }

    /// Bound path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Receive control messages and dispatch them until `shutdown` turns true.
    pub async fn run(
        self: Arc<Self>,
        dispatcher: Arc<Dispatcher>,
        mut shutdown: watch::Receiver<bool>,
    ) -> io::Result<()> {
        let mut buf = vec![0u8; MAX_CONTROL_MESSAGE_SIZE];
        loop {
            tokio::select! {
                result = self.socket.recv_from(&mut buf) => match result {
                    Ok((len, peer)) => {
                        let from = peer
                            .as_pathname()
                            .map(|p| EndpointId::new(p.display().to_string()))
                            .unwrap_or_else(|| EndpointId::new(""));
                        // Errors are logged by the dispatcher.
                        let _ = dispatcher.handle(&from, &buf[..len]);
                    }
                    Err(e) => warn!(path = %self.path.display(), error = %e, "control receive failed"),
                },
                _ = shutdown_requested(&mut shutdown) => {
                    debug!(path = %self.path.display(), "control loop stopped");
                    return Ok(());
                }
            }
        }
    }
}

impl ControlSink for ControlSocket {
    fn try_send(&self, to: &EndpointId, message: Bytes) -> Result<(), ChannelError> {
        if to.as_str().is_empty() {
            return Err(ChannelError::Closed);
        }
        self.sender
            .send_to(&message, to.as_str())
            .map(|_| ())
            .map_err(map_send_error)
    }
}

impl Drop for ControlSocket {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

pub(super) fn map_send_error(e: io::Error) -> ChannelError {
    match e.kind() {
        io::ErrorKind::WouldBlock => ChannelError::Full,
        io::ErrorKind::NotFound | io::ErrorKind::ConnectionRefused => ChannelError::Closed,
        _ => ChannelError::Io(e),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::control::ControllerClient;
    use crate::engine::GooseEngineBuilder;
    use crate::transport::MemorySegment;
    use crate::wire::{ControlMessage, SetParameters};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    static NEXT: AtomicUsize = AtomicUsize::new(0);

    /// Unique socket path under the temp directory.
    pub(crate) fn socket_path(tag: &str) -> PathBuf {
        let n = NEXT.fetch_add(1, Ordering::Relaxed);
        std::env::temp_dir().join(format!("goose-{}-{tag}-{n}.sock", std::process::id()))
    }

    #[tokio::test]
    async fn test_bind_replaces_stale_file() {
        let path = socket_path("stale");
        std::fs::write(&path, b"stale").unwrap();
        let socket = ControlSocket::bind(&path).unwrap();
        assert_eq!(socket.path(), path.as_path());
        drop(socket);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_sink_reaches_bound_peer() {
        let engine = ControlSocket::bind(socket_path("engine")).unwrap();
        let peer_path = socket_path("peer");
        let peer = UnixDatagram::bind(&peer_path).unwrap();

        let to = EndpointId::new(peer_path.display().to_string());
        engine.try_send(&to, Bytes::from_static(b"hi")).unwrap();

        let mut buf = [0u8; 8];
        let n = peer.recv(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"hi");
        let _ = std::fs::remove_file(&peer_path);
    }

    #[tokio::test]
    async fn test_sink_to_missing_peer_is_closed() {
        let engine = ControlSocket::bind(socket_path("engine")).unwrap();
        let missing = EndpointId::new(socket_path("missing").display().to_string());
        assert!(matches!(
            engine.try_send(&missing, Bytes::from_static(b"x")),
            Err(ChannelError::Closed)
        ));
        assert!(matches!(
            engine.try_send(&EndpointId::new(""), Bytes::from_static(b"x")),
            Err(ChannelError::Closed)
        ));
    }

    #[tokio::test]
    async fn test_unnamed_peer_cannot_register() {
        let control = Arc::new(ControlSocket::bind(socket_path("engine")).unwrap());
        let engine = GooseEngineBuilder::new()
            .segment(Arc::new(MemorySegment::new()))
            .control_sink(control.clone())
            .build()
            .unwrap();
        let task = tokio::spawn(
            control
                .clone()
                .run(engine.dispatcher().clone(), engine.shutdown_signal()),
        );

        let named = ControllerClient::connect(socket_path("ctl"), control.path()).unwrap();
        named.register().await.unwrap();
        let unnamed = UnixDatagram::unbound().unwrap();
        let register = ControlMessage::Register.encode().unwrap();
        unnamed.send_to(&register, control.path()).await.unwrap();
        // Handled after the unnamed register; the queue is FIFO.
        named
            .set_parameters(SetParameters {
                delay_threshold_ms: 200,
                initial_interval_ms: 10,
                max_interval_ms: 10,
                increment_ms: 0,
                default_device: None,
            })
            .await
            .unwrap();
        tokio::time::timeout(Duration::from_secs(2), async {
            while engine.params().delay_threshold_ms() != 200 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();

        let expected = EndpointId::new(named.local_path().display().to_string());
        assert_eq!(engine.controller_slot().controller(), Some(expected));

        engine.shutdown().await;
        task.await.unwrap().unwrap();
    }
}
