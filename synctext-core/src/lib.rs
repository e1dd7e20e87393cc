//! # synctext-core — the SyncText synchronization engine
//!
//! Pure engine for multi-process collaborative text editing with
//! last-writer-wins conflict resolution. No I/O happens in this crate;
//! the process-level plumbing (transport, registry, document file,
//! console view) lives in `synctext-collab`.
//!
//! ## Architecture
//!
//! ```text
//! file change                     transport
//!     │                              │
//!     ▼                              ▼
//! ┌──────────┐   ops   ┌─────────────────────────┐
//! │ diff     │ ──────► │ SyncStore               │
//! │ engine   │         │  local │ remote │ ring  │
//! └──────────┘         └───────────┬─────────────┘
//!                                  │ drain (threshold)
//!                                  ▼
//!                      ┌─────────────────────────┐
//!                      │ merge engine            │
//!                      │  resolve ──► replay     │
//!                      └─────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`op`] — [`EditOperation`] and its bounded text fields
//! - [`snapshot`] — lock-free copy-on-write snapshot buffers
//! - [`diff`] — minimal per-line diff between document states
//! - [`merge`] — LWW conflict resolution and ordered replay
//! - [`trigger`] — threshold policy driving merge invocation
//! - [`wire`] — fixed-size binary record codec

pub mod diff;
pub mod merge;
pub mod op;
pub mod snapshot;
pub mod trigger;
pub mod wire;

pub use diff::{diff_lines, diff_lines_at};
pub use merge::{merge, replay, resolve};
pub use op::{
    format_display_time, now_epoch_seconds, BoundedText, ColRange, EditOperation, OpKind,
    ParticipantId, MAX_ID_BYTES, MAX_TEXT_BYTES,
};
pub use snapshot::{NotificationRing, SnapshotCell, SyncStore};
pub use trigger::{MergeTrigger, DEFAULT_MERGE_THRESHOLD};
pub use wire::RECORD_LEN;
