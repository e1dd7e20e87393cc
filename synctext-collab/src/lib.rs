//! # synctext-collab — process-level collaboration layer for SyncText
//!
//! Wraps the pure engine in `synctext-core` with everything a
//! participant process needs: the shared registry, the peer-to-peer
//! record transport, document file access, the console view, and the
//! session that ties them together.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   wire records    ┌─────────────┐
//! │ SyncSession │ ◄───────────────► │ SyncSession │
//! │ (alice)     │   Unix datagram   │ (bob)       │
//! └──────┬──────┘     sockets       └──────┬──────┘
//!        │                                 │
//!        ▼                                 ▼
//! ┌─────────────┐                   ┌─────────────┐
//! │ alice_doc   │    registry.json  │ bob_doc     │
//! │ .txt        │    (shared table) │ .txt        │
//! └─────────────┘                   └─────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`config`] — session configuration and path derivation
//! - [`registry`] — shared capacity-bounded participant table
//! - [`transport`] — best-effort fixed-size record delivery
//! - [`document`] — document file access and console view
//! - [`session`] — listener task + poll-diff-merge loop

pub mod config;
pub mod document;
pub mod registry;
pub mod session;
pub mod transport;

pub use config::SessionConfig;
pub use document::{ConsoleView, DocumentView, NullView, INITIAL_DOCUMENT};
pub use registry::{Registry, RegistryError};
pub use session::{SessionError, ShutdownHandle, SyncSession};
pub use transport::{PeerTransport, TransportError};
