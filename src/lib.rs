//! # bucketdeck
//!
//! Client library and console front end for a bucket-style storage service.
//! It lists buckets, tracks which bucket and which files are selected, and
//! issues create/upload/download/delete calls against a JSON-over-HTTP
//! backend.
//!
//! ## Core Components
//!
//! - [`store`]: selection state and change notifications
//! - [`session`]: backend calls applied to the store, stale-response handling
//! - [`transport`]: the backend seam and its HTTP implementation
//! - [`console`]: text renderer and command loop
//! - [`config`]: layered configuration
//! - [`error`]: error taxonomy
//! - [`types`]: names and wire types

pub mod config;
pub mod console;
pub mod error;
pub mod session;
pub mod store;
pub mod transport;
pub mod types;

#[cfg(test)]
mod tests;
