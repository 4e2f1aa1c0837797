//! Entity records persisted by the store.

pub mod client;
pub mod room;

pub use client::{Client, ClientKey};
pub use room::Room;
