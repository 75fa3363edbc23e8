//! reqscope server: the controller behind the HTTP transport.
//!
//! The controller owns the settings and user services, runs the middleware
//! chain, and provides the `RequestHandler` implementation for the transport.

pub mod middleware;
pub mod router;

pub use middleware::{AccessLog, Middleware, MiddlewareChain, MiddlewareResult, ScopeGuard, ScopeMode};
pub use router::Controller;
