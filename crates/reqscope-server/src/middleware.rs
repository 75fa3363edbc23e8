//! Middleware chain for request processing.
//!
//! Middleware can inspect the request context before routing, rebind it or
//! block the request, and observe successful replies afterwards. They run in
//! priority order.

use reqscope_protocol::scope;
use reqscope_protocol::{ApiError, Context, Lookup, Reply, Route};
use tracing::{info, warn};

/// Middleware result: whether to allow or block the request.
pub struct MiddlewareResult {
    /// Whether the request should proceed
    pub allowed: bool,
    /// Context handed to the next middleware (and finally the handler)
    pub context: Context,
    /// Error reported to the client if blocked
    pub error: Option<ApiError>,
}

impl MiddlewareResult {
    pub fn allow(context: Context) -> Self {
        Self {
            allowed: true,
            context,
            error: None,
        }
    }

    pub fn block(context: Context, error: ApiError) -> Self {
        Self {
            allowed: false,
            context,
            error: Some(error),
        }
    }
}

/// Trait for request middleware.
pub trait Middleware: Send + Sync {
    /// Process a request before it reaches the handler.
    fn before(
        &self,
        route: Route,
        ctx: Context,
    ) -> impl std::future::Future<Output = MiddlewareResult> + Send;

    /// Observe a successful reply (optional).
    fn after(
        &self,
        _route: Route,
        _ctx: &Context,
        _reply: &Reply,
    ) -> impl std::future::Future<Output = ()> + Send {
        async {}
    }

    /// Middleware name for debugging.
    fn name(&self) -> &str;

    /// Priority (lower runs first).
    fn priority(&self) -> i32 {
        0
    }
}

/// A chain of middleware executed in priority order.
pub struct MiddlewareChain {
    middlewares: Vec<Box<dyn MiddlewareDyn>>,
}

/// Object-safe version of Middleware trait: all refs share lifetime `'a`.
trait MiddlewareDyn: Send + Sync {
    fn before_dyn<'a>(
        &'a self,
        route: Route,
        ctx: Context,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = MiddlewareResult> + Send + 'a>>;

    fn after_dyn<'a>(
        &'a self,
        route: Route,
        ctx: &'a Context,
        reply: &'a Reply,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = ()> + Send + 'a>>;

    fn name_dyn(&self) -> &str;
    fn priority_dyn(&self) -> i32;
}

impl<T: Middleware> MiddlewareDyn for T {
    fn before_dyn<'a>(
        &'a self,
        route: Route,
        ctx: Context,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = MiddlewareResult> + Send + 'a>> {
        Box::pin(self.before(route, ctx))
    }

    fn after_dyn<'a>(
        &'a self,
        route: Route,
        ctx: &'a Context,
        reply: &'a Reply,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = ()> + Send + 'a>> {
        Box::pin(self.after(route, ctx, reply))
    }

    fn name_dyn(&self) -> &str {
        self.name()
    }

    fn priority_dyn(&self) -> i32 {
        self.priority()
    }
}

impl MiddlewareChain {
    pub fn new() -> Self {
        Self {
            middlewares: Vec::new(),
        }
    }

    pub fn add<M: Middleware + 'static>(&mut self, middleware: M) {
        self.middlewares.push(Box::new(middleware));
        self.middlewares.sort_by_key(|m| m.priority_dyn());
    }

    /// Run the before-chain. Returns the (possibly rebound) context or a block.
    pub async fn run_before(&self, route: Route, mut ctx: Context) -> MiddlewareResult {
        for mw in &self.middlewares {
            let result = mw.before_dyn(route, ctx).await;
            if !result.allowed {
                return result;
            }
            ctx = result.context;
        }
        MiddlewareResult::allow(ctx)
    }

    /// Run the after-chain.
    pub async fn run_after(&self, route: Route, ctx: &Context, reply: &Reply) {
        for mw in &self.middlewares {
            mw.after_dyn(route, ctx, reply).await;
        }
    }

    pub fn names(&self) -> Vec<&str> {
        self.middlewares.iter().map(|m| m.name_dyn()).collect()
    }
}

impl Default for MiddlewareChain {
    fn default() -> Self {
        Self::new()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Built-in middleware
// ─────────────────────────────────────────────────────────────────────────────

/// How [`ScopeGuard`] treats a request whose scope is missing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeMode {
    /// Log a warning and let the request through with an empty scope.
    Lenient,
    /// Refuse the request.
    Strict,
}

/// Checks that the request scope was bound before any handler reads it.
///
/// Handlers read the scope with the non-failing accessor, which hands back
/// an empty scope when nothing is bound. This guard is where a missing
/// scope gets noticed.
#[derive(Debug, Clone, Copy)]
pub struct ScopeGuard {
    mode: ScopeMode,
}

impl ScopeGuard {
    pub fn new(mode: ScopeMode) -> Self {
        Self { mode }
    }

    pub fn lenient() -> Self {
        Self::new(ScopeMode::Lenient)
    }

    pub fn strict() -> Self {
        Self::new(ScopeMode::Strict)
    }
}

impl Middleware for ScopeGuard {
    async fn before(&self, route: Route, ctx: Context) -> MiddlewareResult {
        let problem = match scope::lookup_scope(&ctx) {
            Lookup::Present(_) => None,
            Lookup::Absent => Some("request scope missing"),
            Lookup::Mismatched => Some("request scope has unexpected shape"),
        };
        let Some(problem) = problem else {
            return MiddlewareResult::allow(ctx);
        };

        match self.mode {
            ScopeMode::Lenient => {
                warn!(route = route.name(), "{problem}; continuing with empty scope");
                MiddlewareResult::allow(ctx)
            }
            ScopeMode::Strict => {
                warn!(route = route.name(), "{problem}; rejecting request");
                MiddlewareResult::block(ctx, ApiError::unavailable(problem))
            }
        }
    }

    fn name(&self) -> &str {
        "scope-guard"
    }

    fn priority(&self) -> i32 {
        -100
    }
}

/// Logs every successful reply with its correlation id.
#[derive(Debug, Clone, Copy, Default)]
pub struct AccessLog;

impl Middleware for AccessLog {
    async fn before(&self, _route: Route, ctx: Context) -> MiddlewareResult {
        MiddlewareResult::allow(ctx)
    }

    async fn after(&self, route: Route, ctx: &Context, reply: &Reply) {
        let data = scope::scope(ctx);
        info!(
            handler = route.name(),
            request_id = %data.request_id,
            ip_address = %data.ip_address,
            status = ?reply.status,
            "Request handled"
        );
    }

    fn name(&self) -> &str {
        "access-log"
    }

    fn priority(&self) -> i32 {
        100
    }
}
