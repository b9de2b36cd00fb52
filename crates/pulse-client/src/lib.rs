//! Client runtime for the pulse push channel.
//!
//! A [`Session`] keeps one persistent connection to the server, merges live
//! notifications with REST history, fans events out over an
//! [`EventBus`](pulse_core::bus::EventBus), and refreshes the activity feed
//! when new posts are announced.

pub mod config;
pub mod connection;
pub mod error;
pub mod feed;
pub mod notifications;
pub mod rest;
pub mod router;
pub mod session;
pub mod transport;

pub use config::ClientConfig;
pub use connection::{ConnectionManager, ConnectionState, ReconnectPolicy};
pub use error::{Error, Result};
pub use session::{Session, SessionOptions};

#[cfg(test)]
mod testing;
