//! Persistence layer: profile stores (hosted REST, local libSQL) and the
//! device-local completion marker.

pub mod libsql_backend;
pub mod migrations;
pub mod rest;
pub mod retry;
pub mod traits;
pub mod wire;

pub use libsql_backend::LibSqlBackend;
pub use rest::{RestProfileStore, RestStoreConfig};
pub use retry::{RetryPolicy, RetryingStore};
pub use traits::{LoadOutcome, LocalMarker, LocalSnapshot, PersistedProfile, ProfileStore};
