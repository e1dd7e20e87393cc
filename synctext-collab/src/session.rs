//! The synchronization session: listener task plus poll-diff-merge loop.
//!
//! ```text
//!           ┌─────────────────────────────────────────────┐
//!           │ SyncSession (one per participant process)   │
//!           │                                             │
//! document  │  poll loop ── diff ──► store.local ──┐      │
//! file ────►│   (tick)                             │      │
//!           │                              threshold?     │
//! peer      │  listener ──► store.remote ──► merge │      │
//! sockets ─►│   (task)        + notification  signal      │
//!           │                                      ▼      │
//!           │                    drain ──► merge engine   │
//!           │                        write + render + note│
//!           └─────────────────────────────────────────────┘
//! ```
//!
//! Concurrency discipline: the poll loop is the only producer of the
//! local buffer, the listener the only producer of the remote buffer,
//! and every merge runs on the session task. The listener never merges;
//! it signals the session through an mpsc channel, which serializes
//! merges on a single owner without a document lock. Both tasks observe
//! the shutdown signal at every blocking boundary.

use std::io;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use log::{debug, error, info, warn};
use tokio::sync::{mpsc, watch};
use tokio::time::MissedTickBehavior;

use synctext_core::{
    diff, format_display_time, merge, now_epoch_seconds, EditOperation, MergeTrigger,
    ParticipantId, SyncStore,
};

use crate::config::SessionConfig;
use crate::document::{self, ConsoleView, DocumentView};
use crate::registry::{Registry, RegistryError};
use crate::transport::{PeerTransport, TransportError};

/// Session errors. All of these are setup failures; once running, the
/// session logs problems and keeps going.
#[derive(Debug)]
pub enum SessionError {
    /// Empty participant identifier.
    InvalidParticipant,
    Registry(RegistryError),
    Transport(TransportError),
    Document(io::Error),
}

impl std::fmt::Display for SessionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionError::InvalidParticipant => write!(f, "participant identifier is empty"),
            SessionError::Registry(e) => write!(f, "registry setup failed: {e}"),
            SessionError::Transport(e) => write!(f, "transport setup failed: {e}"),
            SessionError::Document(e) => write!(f, "document setup failed: {e}"),
        }
    }
}

impl std::error::Error for SessionError {}

impl From<RegistryError> for SessionError {
    fn from(e: RegistryError) -> Self {
        SessionError::Registry(e)
    }
}

impl From<TransportError> for SessionError {
    fn from(e: TransportError) -> Self {
        SessionError::Transport(e)
    }
}

impl From<io::Error> for SessionError {
    fn from(e: io::Error) -> Self {
        SessionError::Document(e)
    }
}

/// Signals a running session to stop. Cheap to clone and thread-safe.
#[derive(Clone)]
pub struct ShutdownHandle {
    tx: watch::Sender<bool>,
}

impl ShutdownHandle {
    pub fn shutdown(&self) {
        // send_replace updates the value even with no receiver yet, so
        // a shutdown requested before run() is not lost.
        self.tx.send_replace(true);
    }
}

/// One participant's synchronization session.
pub struct SyncSession {
    config: SessionConfig,
    me: ParticipantId,
    store: Arc<SyncStore<EditOperation>>,
    trigger: MergeTrigger,
    registry: Registry,
    view: Box<dyn DocumentView>,
    shutdown_tx: watch::Sender<bool>,
}

impl SyncSession {
    pub fn new(config: SessionConfig) -> Self {
        let me = ParticipantId::new(&config.participant);
        let store = Arc::new(SyncStore::new(config.notification_capacity));
        let trigger = MergeTrigger::new(config.merge_threshold);
        let registry = Registry::new(config.registry_path(), config.max_participants);
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            config,
            me,
            store,
            trigger,
            registry,
            view: Box::new(ConsoleView),
            shutdown_tx,
        }
    }

    /// Replace the console view, e.g. with a silent one.
    pub fn with_view(mut self, view: Box<dyn DocumentView>) -> Self {
        self.view = view;
        self
    }

    /// Handle for stopping the session from another task.
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            tx: self.shutdown_tx.clone(),
        }
    }

    /// The session's snapshot store, shared with the listener. Exposed
    /// for observation; producers stay one-per-buffer.
    pub fn store(&self) -> Arc<SyncStore<EditOperation>> {
        self.store.clone()
    }

    /// Register, bind, seed, then run until shut down.
    pub async fn run(self) -> Result<(), SessionError> {
        if self.me.is_empty() {
            return Err(SessionError::InvalidParticipant);
        }
        if self.me.truncated() {
            warn!(
                "participant identifier truncated to {:?} to fit the wire cap",
                self.me.as_str()
            );
        }

        let roster = self.registry.register(self.me.as_str())?;
        info!(
            "Registered participant {}; active participants: {}",
            self.me,
            roster.join(", ")
        );

        let socket_path = self.config.socket_path(self.me.as_str());
        let transport = Arc::new(PeerTransport::bind(&socket_path)?);
        info!("Listening on {}", socket_path.display());

        let doc_path = self.config.document_path();
        if document::seed_if_missing(&doc_path)? {
            info!("Seeded initial document at {}", doc_path.display());
        }
        let mut baseline = document::read_lines(&doc_path)?;
        let mut last_modified = document::modified(&doc_path)?;
        self.render(&doc_path, &baseline);

        let (merge_tx, mut merge_rx) = mpsc::channel::<()>(64);
        let listener = tokio::spawn(listener_loop(
            transport.clone(),
            self.store.clone(),
            merge_tx,
            self.shutdown_tx.subscribe(),
            self.config.idle_backoff,
        ));

        let mut ticker = tokio::time::interval(self.config.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.poll_document(
                        &doc_path,
                        &transport,
                        &mut baseline,
                        &mut last_modified,
                    ) {
                        warn!("document poll failed: {e}");
                    }
                }
                Some(()) = merge_rx.recv() => {
                    self.maybe_merge(Vec::new(), &doc_path, &mut baseline, &mut last_modified);
                }
                _ = shutdown_rx.wait_for(|stop| *stop) => break,
            }
        }

        let _ = listener.await;
        info!("Session for {} shut down", self.me);
        Ok(())
    }

    /// One poll tick: detect a document modification, diff it against
    /// the baseline, buffer the resulting operations, and broadcast or
    /// merge when the threshold fires.
    fn poll_document(
        &self,
        doc_path: &Path,
        transport: &PeerTransport,
        baseline: &mut Vec<String>,
        last_modified: &mut SystemTime,
    ) -> io::Result<()> {
        let modified = document::modified(doc_path)?;
        if modified == *last_modified {
            return Ok(());
        }
        *last_modified = modified;

        let current = document::read_lines(doc_path)?;
        self.render(doc_path, &current);

        let ops = diff::diff_lines(baseline, &current, &self.me);
        *baseline = current;

        for op in ops {
            if op.truncation_occurred() {
                warn!(
                    "edit on line {} truncated to fit the wire record caps",
                    op.line
                );
            }
            info!(
                "Local change detected: line {}, {:?} -> {:?}",
                op.line,
                op.old_text.as_str(),
                op.new_text.as_str()
            );

            let buffered = self.store.local.append(op);
            if buffered >= self.trigger.threshold() {
                let outgoing = self.broadcast_local(transport);
                self.maybe_merge(outgoing, doc_path, baseline, last_modified);
            } else {
                self.maybe_merge(Vec::new(), doc_path, baseline, last_modified);
            }
        }
        Ok(())
    }

    /// Drain the local buffer and fan its operations out to every
    /// registered peer. Send failures are logged and dropped; delivery
    /// is best-effort with no retry.
    fn broadcast_local(&self, transport: &PeerTransport) -> Vec<EditOperation> {
        let drained = self.store.local.drain();
        if drained.is_empty() {
            return Vec::new();
        }
        info!("Broadcasting {} update(s) to peers", drained.len());

        let peers = self.registry.peers_except(self.me.as_str());
        for op in drained.iter() {
            for peer in &peers {
                let peer_socket = self.config.socket_path(peer);
                if let Err(e) = transport.send_op(&peer_socket, op) {
                    warn!("best-effort send to {peer} failed: {e}");
                }
            }
        }
        drained.to_vec()
    }

    /// Consult the trigger and run a merge when it fires. Operations
    /// already drained by the caller (`incoming`) always take part in
    /// this merge; they are never re-buffered.
    fn maybe_merge(
        &self,
        incoming: Vec<EditOperation>,
        doc_path: &Path,
        baseline: &mut Vec<String>,
        last_modified: &mut SystemTime,
    ) {
        let local = self.store.local.len();
        let remote = self.store.remote.len();
        if incoming.is_empty() && !self.trigger.should_merge(local, remote, 0) {
            return;
        }
        self.run_merge(incoming, doc_path, baseline, last_modified);
    }

    /// Drain both buffers, replay the batch onto the document, commit,
    /// redisplay, and append the completion notification. I/O failures
    /// are logged; the session keeps accepting edits either way.
    fn run_merge(
        &self,
        incoming: Vec<EditOperation>,
        doc_path: &Path,
        baseline: &mut Vec<String>,
        last_modified: &mut SystemTime,
    ) {
        let mut batch = incoming;
        batch.extend(self.store.local.drain().iter().cloned());
        batch.extend(self.store.remote.drain().iter().cloned());
        if batch.is_empty() {
            debug!("merge skipped: empty batch");
            return;
        }

        let lines = match document::read_lines(doc_path) {
            Ok(lines) => lines,
            Err(e) => {
                error!("merge aborted, cannot read document: {e}");
                return;
            }
        };
        let merged = merge::merge(&batch, &lines);
        if let Err(e) = document::write_lines(doc_path, &merged) {
            error!("merge aborted, cannot write document: {e}");
            return;
        }

        // Resync the poll baseline so the committed merge is not
        // re-detected as a fresh local edit.
        *baseline = merged.clone();
        if let Ok(m) = document::modified(doc_path) {
            *last_modified = m;
        }

        self.store
            .notifications
            .push(format!("Merging complete: {} update(s) applied", batch.len()));
        self.render(doc_path, &merged);
        info!(
            "Merging complete: {} update(s) applied to {}",
            batch.len(),
            doc_path.display()
        );
    }

    fn render(&self, doc_path: &Path, lines: &[String]) {
        let stamp = format_display_time(now_epoch_seconds());
        let notifications = self.store.notifications.read();
        self.view.render(doc_path, lines, &stamp, &notifications);
    }
}

/// Receive loop run as its own task: pull records off the transport,
/// buffer them, note them, and signal the session to consider a merge.
async fn listener_loop(
    transport: Arc<PeerTransport>,
    store: Arc<SyncStore<EditOperation>>,
    merge_tx: mpsc::Sender<()>,
    mut shutdown_rx: watch::Receiver<bool>,
    idle_backoff: Duration,
) {
    loop {
        tokio::select! {
            _ = async { shutdown_rx.wait_for(|stop| *stop).await.map(|_| ()) } => break,
            received = transport.recv_op() => match received {
                Some(op) => {
                    let note = format!(
                        "Received update from {}: line {}, cols {}-{}, {:?} -> {:?} @ {}",
                        op.origin,
                        op.line,
                        op.range.start,
                        op.range.end,
                        op.old_text.as_str(),
                        op.new_text.as_str(),
                        op.display_time,
                    );
                    info!("{note}");
                    store.remote.append(op);
                    store.notifications.push(note);
                    if merge_tx.send(()).await.is_err() {
                        break;
                    }
                }
                // Not a whole record: idle, back off briefly.
                None => tokio::time::sleep(idle_backoff).await,
            }
        }
    }
    debug!("listener stopped");
}
