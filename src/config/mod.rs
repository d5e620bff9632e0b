//! Configuration module
//!
//! Configuration is read from a TOML file at startup and cached in an
//! `ArcSwap` for lock-free reads.

mod schema;
mod store;

pub use schema::*;
pub use store::ConfigStore;
