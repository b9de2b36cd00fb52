//! Core types for the pulse real-time notification subsystem.
//!
//! This crate is deliberately free of HTTP and WebSocket dependencies. It
//! holds the push-frame model and decoder, the notification store, the
//! in-process event bus, and the traits through which the REST collaborators
//! are reached. `pulse-client` and `pulse-server` depend on it.

pub mod api;
pub mod bus;
pub mod decode;
pub mod error;
pub mod event;
pub mod feed;
pub mod notification;
pub mod store;

pub use error::{DecodeError, Result};
