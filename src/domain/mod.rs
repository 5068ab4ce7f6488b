//! Domain layer for the fleetcache caching-agent system
//!
//! This module contains the cache data model, agent identities and the port
//! traits that adapters implement.

pub mod errors;
pub mod models;
pub mod ports;

pub use errors::{DomainError, DomainResult};
