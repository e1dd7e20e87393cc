//! Peer-to-peer record transport over Unix datagram sockets.
//!
//! Each participant binds one socket in the runtime directory; a
//! locally produced operation is fanned out by sending one fixed-size
//! wire record per peer socket. Delivery is best-effort and
//! non-blocking: a peer that is not listening, has a full buffer, or
//! has gone away simply misses the record. The receiver treats
//! anything that is not a whole record as "no message yet".

use std::path::{Path, PathBuf};
use tokio::net::UnixDatagram;

use synctext_core::{wire, EditOperation, RECORD_LEN};

/// Transport errors. Bind failures are setup-fatal; send failures are
/// logged by the caller and dropped.
#[derive(Debug)]
pub enum TransportError {
    /// Binding our own socket failed.
    Bind { path: PathBuf, source: String },
    /// Sending a record to a peer failed (peer gone, not listening, or
    /// buffer full).
    Send { peer: PathBuf, source: String },
}

impl std::fmt::Display for TransportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportError::Bind { path, source } => {
                write!(f, "cannot bind socket {}: {source}", path.display())
            }
            TransportError::Send { peer, source } => {
                write!(f, "cannot send to {}: {source}", peer.display())
            }
        }
    }
}

impl std::error::Error for TransportError {}

/// A participant's endpoint: one bound datagram socket used both to
/// receive records from peers and to send records out.
pub struct PeerTransport {
    socket: UnixDatagram,
    path: PathBuf,
}

impl PeerTransport {
    /// Bind the participant socket, replacing any stale file left by a
    /// previous run.
    pub fn bind(path: &Path) -> Result<Self, TransportError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| TransportError::Bind {
                path: path.to_path_buf(),
                source: e.to_string(),
            })?;
        }
        if path.exists() {
            let _ = std::fs::remove_file(path);
        }
        let socket = UnixDatagram::bind(path).map_err(|e| TransportError::Bind {
            path: path.to_path_buf(),
            source: e.to_string(),
        })?;
        Ok(Self {
            socket,
            path: path.to_path_buf(),
        })
    }

    pub fn local_path(&self) -> &Path {
        &self.path
    }

    /// Send one operation to one peer. Non-blocking; never retried.
    pub fn send_op(&self, peer: &Path, op: &EditOperation) -> Result<(), TransportError> {
        let record = wire::encode(op);
        self.socket
            .try_send_to(&record, peer)
            .map_err(|e| TransportError::Send {
                peer: peer.to_path_buf(),
                source: e.to_string(),
            })?;
        Ok(())
    }

    /// Await the next datagram and decode it. Anything that is not a
    /// whole valid record (short read, oversized datagram, unknown
    /// kind) comes back as `None`: an idle condition, not an error.
    pub async fn recv_op(&self) -> Option<EditOperation> {
        // One spare byte so an oversized datagram is detectable instead
        // of silently truncating to a valid record.
        let mut buf = [0u8; RECORD_LEN + 1];
        match self.socket.recv(&mut buf).await {
            Ok(n) => wire::decode(&buf[..n]),
            Err(e) => {
                log::warn!("transport receive failed: {e}");
                None
            }
        }
    }
}

impl Drop for PeerTransport {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use synctext_core::{ColRange, ParticipantId};
    use tokio::time::{timeout, Duration};

    fn sample_op() -> EditOperation {
        EditOperation::replace(
            0,
            ColRange::new(6, 11),
            "World",
            "Mars",
            ParticipantId::new("alice"),
            1_700_000_000,
        )
    }

    #[tokio::test]
    async fn test_send_and_receive_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let alice = PeerTransport::bind(&dir.path().join("alice.sock")).unwrap();
        let bob = PeerTransport::bind(&dir.path().join("bob.sock")).unwrap();

        let op = sample_op();
        alice.send_op(bob.local_path(), &op).unwrap();

        let received = timeout(Duration::from_secs(2), bob.recv_op())
            .await
            .expect("receive timed out");
        assert_eq!(received, Some(op));
    }

    #[tokio::test]
    async fn test_send_to_absent_peer_fails_without_panic() {
        let dir = tempfile::tempdir().unwrap();
        let alice = PeerTransport::bind(&dir.path().join("alice.sock")).unwrap();

        let result = alice.send_op(&dir.path().join("ghost.sock"), &sample_op());
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_short_datagram_is_no_message() {
        let dir = tempfile::tempdir().unwrap();
        let bob = PeerTransport::bind(&dir.path().join("bob.sock")).unwrap();

        let raw = UnixDatagram::unbound().unwrap();
        raw.send_to(&[1, 2, 3], bob.local_path()).await.unwrap();

        let received = timeout(Duration::from_secs(2), bob.recv_op())
            .await
            .expect("receive timed out");
        assert_eq!(received, None);
    }

    #[tokio::test]
    async fn test_stale_socket_file_is_replaced() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("alice.sock");
        {
            let _first = PeerTransport::bind(&path).unwrap();
            assert!(path.exists());
        }
        // Drop removed the file; a leftover file must not block rebinding.
        std::fs::write(&path, b"stale").unwrap();
        let second = PeerTransport::bind(&path).unwrap();
        assert_eq!(second.local_path(), path);
    }

    #[tokio::test]
    async fn test_socket_file_removed_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("alice.sock");
        {
            let _transport = PeerTransport::bind(&path).unwrap();
            assert!(path.exists());
        }
        assert!(!path.exists());
    }
}
