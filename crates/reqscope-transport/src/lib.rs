//! reqscope HTTP transport
//!
//! Serves the controller routes over HTTP. The transport handles:
//! - Binding and graceful shutdown
//! - Request scope population (correlation id, client address)
//! - Request tracing and timeouts
//! - Mapping error kinds to status codes and the JSON envelope
//!
//! The transport is decoupled from controller logic via the `RequestHandler` trait.

pub mod server;

pub use server::{
    REQUEST_ID_HEADER, RequestHandler, TransportConfig, TransportError, TransportServer,
    error_response, error_status, reply_status, router,
};
