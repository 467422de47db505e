// CLI commands

pub mod auth;
pub mod pages;
