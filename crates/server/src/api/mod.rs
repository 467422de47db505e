// HTTP API routes
//
// Each submodule handles one surface; all of them share the AuthState.

pub mod common;
pub mod pages;
pub mod users;

// Re-export common types
pub use common::{ErrorResponse, ListResponse};
