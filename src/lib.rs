//! chaintable: a single-threaded, separate-chaining hash table over byte
//! keys, with a per-insert choice of how the table owns each value.
//!
//! Internal Design:
//!
//! Summary
//! - Goal: an embeddable associative container with explicit, checked
//!   ownership of values, usable from Rust and through a C ABI.
//! - Layers:
//!   - ChainTable<'v>: bucket array of chain heads over a slot arena of
//!     entries. Owns key copies; holds values per their `Ownership`.
//!   - String keys: `*_str`/`*_text` methods forwarding NUL-terminated
//!     keys (terminator included) to the byte-key operations.
//!   - ffi: `ht_*` C functions with integer status codes over an opaque
//!     handle, guarded against reentrant calls from callbacks.
//!
//! Constraints
//! - Single-threaded: no locking, no atomics; the table is `!Send`/`!Sync`.
//! - Insert-if-absent only; duplicates fail and never overwrite.
//! - Keys are compared by cached hash first, then by full key bytes, so
//!   colliding hashes never merge distinct keys.
//! - No iteration, no shrink-on-delete, no open addressing.
//!
//! Storage and growth
//! - Bucket index is `hash % capacity`, recomputed on every operation.
//! - An insert that would push `len + 1` above `capacity * load_factor`
//!   first grows the bucket array by `growth_factor`. Entries stay where
//!   they are in the arena; only chain links are rewritten, appending to
//!   the tail of each new chain. The old array is dropped only after the
//!   new one is fully linked.
//! - Chains hold entries in arrival order.
//!
//! Ownership and release
//! - `Ownership::Copy`: the table copies the value into its own
//!   allocation.
//! - `Ownership::Borrowed`: the table keeps a `&'v [u8]`.
//! - `Ownership::Custom`: the table keeps a `Release` capability and calls
//!   it exactly once, after the entry has been unlinked (on `remove`) or
//!   when the table is dropped. A failed insert never calls it.
//!
//! Failure semantics
//! - Allocation of key copies, value copies and bucket arrays is fallible
//!   (`try_reserve_exact`) and reported as `TableError::Alloc`; the table
//!   keeps its last consistent state.
//! - Replacing the hash function is only allowed on an empty table.

pub mod config;
pub mod error;
#[cfg(feature = "ffi")]
pub mod ffi;
pub mod hash;
#[cfg(feature = "ffi")]
mod reentrancy;
mod strkey;
mod table;
mod table_proptest;
pub mod value;

// Public surface
pub use config::TableConfig;
pub use error::{ErrorKind, TableError};
pub use hash::{sdbm, KeyHash, Sdbm};
pub use table::ChainTable;
pub use value::{Custom, Ownership, Release};
