//! # greenroom-common
//!
//! Shared types, configuration, error handling, and the wire protocol used
//! across all Greenroom crates. This is the foundation layer: no business
//! logic, just primitives and contracts.

pub mod auth;
pub mod config;
pub mod error;
pub mod events;
pub mod id;
pub mod models;
