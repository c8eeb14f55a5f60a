//! Helyx Backend Library
//!
//! Account registration, session tokens, and password recovery for the Helyx
//! storefront. The binary in `main.rs` wires these into an axum server; tests
//! drive the same router in-process.

pub mod api;
pub mod auth;
pub mod config;
pub mod email;
pub mod middleware;
