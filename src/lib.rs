//! Resource-lifecycle state machine and deletion processor.
//!
//! Applies `DeleteResource` commands against the versioned process/decision/
//! DRG store (C2), distributes each applied command to every peer
//! partition exactly once (C4), and routes incoming records through the
//! processor registered for their `(value_type, intent)` pair (C6). The
//! whole thing runs as a single-threaded, deterministic state machine over
//! a replicated log: one command in, its events/rejection/response out, in
//! strict order, no concurrency within a partition (spec §5).
//!
//! Module map:
//! - [`engine`] / [`kv`] / [`columns`]: the raw byte-key store and the
//!   typed, composite-key column-family layer on top of it (C1).
//! - [`records`]: the wire payloads for processes, decisions, and DRGs.
//! - [`store`]: the versioned resource state store and its read-through
//!   caches (C2).
//! - [`commands`] / [`rejection`] / [`log_writers`]: the inbound record
//!   envelope and the buffered event/rejection/response log writers (C3).
//! - [`distribution`]: peer fan-out and acknowledgement tracking (C4).
//! - [`deletion_processor`]: the classify-and-delete state machine (C5).
//! - [`dispatch`]: `(value_type, intent)` routing and error classification
//!   into rejection-and-continue versus halt (C6).

pub mod columns;
pub mod commands;
pub mod deletion_processor;
pub mod dispatch;
pub mod distribution;
pub mod engine;
pub mod error;
pub mod kv;
pub mod log_writers;
pub mod records;
pub mod rejection;
pub mod store;

pub use error::{CResult, Error};
