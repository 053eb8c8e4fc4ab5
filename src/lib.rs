//! Trackblock backend library.
//!
//! Exposes the building blocks (config, alert engine, event store, HTTP
//! surface) so integration tests and the binary entrypoint can both access
//! them.

pub mod config;
pub mod engine;
pub mod geo;
pub mod http;
pub mod models;
pub mod notify;
pub mod store;
