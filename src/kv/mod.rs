//! Typed KV bindings (spec §4.1): composite key codecs and foreign-key
//! verification layered over the raw [`crate::engine::Engine`], plus the
//! per-column-family typed wrapper and the command transaction.

pub mod key;
pub mod column_family;
pub mod transaction;

pub use column_family::ColumnFamilyHandle;
pub use key::{ForeignKey, KeyEncode};
pub use transaction::Transaction;
