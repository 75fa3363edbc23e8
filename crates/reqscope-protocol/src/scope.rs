//! Request scope: the aggregate of request-scoped fields bound to a
//! [`Context`] behind a single slot.
//!
//! The slot key is private to this module, so the only way in or out is the
//! accessors below. Field setters read the current scope, copy it, change one
//! field and rebind once, which means updating one field never clobbers the
//! others.
//!
//! Middleware populates the scope when a request arrives:
//!
//! ```
//! use reqscope_protocol::context::Context;
//! use reqscope_protocol::scope::{self, RequestScope};
//!
//! let ctx = scope::set_scope(&Context::background(), RequestScope::new("abc", "1.2.3.4"));
//! let ctx = scope::set_request_id(&ctx, "new-id");
//!
//! assert_eq!(scope::request_id(&ctx), "new-id");
//! assert_eq!(scope::ip_address(&ctx), "1.2.3.4");
//! ```

use serde::{Deserialize, Serialize};

use crate::context::{Context, Lookup};

struct ScopeKey;

/// Metadata every handler can rely on for the current request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestScope {
    /// Opaque correlation identifier.
    #[serde(rename = "requestId")]
    pub request_id: String,
    /// Client network address.
    #[serde(rename = "ipAddress")]
    pub ip_address: String,
}

impl RequestScope {
    pub fn new(request_id: impl Into<String>, ip_address: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            ip_address: ip_address.into(),
        }
    }
}

/// Why a strict scope read failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ScopeError {
    #[error("request scope is not bound on this context")]
    Missing,
    #[error("request scope slot holds an unexpected value")]
    Mismatched,
}

/// Bind `scope` to the chain, replacing any earlier scope for readers of the
/// returned context.
pub fn set_scope(ctx: &Context, scope: RequestScope) -> Context {
    ctx.with_value::<ScopeKey, _>(scope)
}

/// The bound scope, or an empty one when nothing usable is bound.
///
/// This read never fails. Callers that need to tell a missing scope apart
/// from an empty one use [`lookup_scope`] or [`try_scope`].
pub fn scope(ctx: &Context) -> RequestScope {
    lookup_scope(ctx).present().cloned().unwrap_or_default()
}

pub fn lookup_scope(ctx: &Context) -> Lookup<&RequestScope> {
    ctx.lookup::<ScopeKey, RequestScope>()
}

pub fn try_scope(ctx: &Context) -> Result<RequestScope, ScopeError> {
    match lookup_scope(ctx) {
        Lookup::Present(scope) => Ok(scope.clone()),
        Lookup::Mismatched => Err(ScopeError::Mismatched),
        Lookup::Absent => Err(ScopeError::Missing),
    }
}

pub fn set_request_id(ctx: &Context, request_id: impl Into<String>) -> Context {
    let mut data = scope(ctx);
    data.request_id = request_id.into();
    set_scope(ctx, data)
}

pub fn request_id(ctx: &Context) -> String {
    scope(ctx).request_id
}

pub fn set_ip_address(ctx: &Context, ip_address: impl Into<String>) -> Context {
    let mut data = scope(ctx);
    data.ip_address = ip_address.into();
    set_scope(ctx, data)
}

pub fn ip_address(ctx: &Context) -> String {
    scope(ctx).ip_address
}
