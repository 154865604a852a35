//! Network module - TLS connection to the game server

mod client;
mod sync;

pub use client::*;
pub use sync::*;
