// Storage layer for bizdesk-server
// Decision: In-memory only; users and refresh tokens are all a session needs

pub mod memory;
pub mod models;
pub mod password;

pub use memory::{DuplicateUsername, InMemoryDatabase};
pub use models::*;

/// Storage backend used by the server
pub type Database = InMemoryDatabase;
