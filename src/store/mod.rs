//! Persistence layer: the `EntityStore` seam plus its in-memory and
//! libSQL-backed implementations.

pub mod libsql_backend;
pub mod memory;
pub mod migrations;
pub mod traits;

pub use libsql_backend::LibSqlStore;
pub use memory::MemoryStore;
pub use traits::EntityStore;
