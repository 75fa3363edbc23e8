//! reqscope protocol types
//!
//! The request propagation chain and its scope accessors, the sentinel
//! error kinds handlers report, the response envelope, and route names.
//! Every other crate in the workspace builds on these.

pub mod context;
pub mod envelope;
pub mod error;
pub mod routes;
pub mod scope;

pub use context::{Context, Lookup};
pub use envelope::{Envelope, HandlerResult, Reply, ReplyStatus};
pub use error::{ApiError, ErrorKind};
pub use routes::Route;
pub use scope::{RequestScope, ScopeError};
