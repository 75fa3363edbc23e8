//! HTTP transport server using Axum.
//!
//! Binds the controller routes, populates the request scope for every
//! request, and maps handler outcomes to status codes and the JSON envelope.
//! Requests flow through, outermost first:
//! 1. Scope population (`X-Request-Id`, client address)
//! 2. Request tracing
//! 3. Timeout enforcement
//! 4. Route handler
//!
//! A request that outlives its deadline is answered by the timeout layer
//! with a bare `408 Request Timeout`. No handler reply exists at that point,
//! so the body carries no envelope; the `X-Request-Id` header is still set.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Extension, Router,
    extract::{ConnectInfo, Request, State},
    http::{HeaderValue, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
};
use bytes::Bytes;
use reqscope_protocol::{
    ApiError, Context, Envelope, ErrorKind, HandlerResult, ReplyStatus, RequestScope, Route, scope,
};
use serde_json::json;
use tokio::sync::mpsc;
use tower::ServiceBuilder;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};
use tracing::{Span, debug, info};

/// Header carrying the correlation id, in and out.
pub const REQUEST_ID_HEADER: &str = "x-request-id";
const FORWARDED_FOR_HEADER: &str = "x-forwarded-for";

/// Trait implemented by the controller to handle routed requests.
/// The transport calls this once per request with the populated context.
pub trait RequestHandler: Send + Sync + 'static {
    fn handle_request(
        &self,
        route: Route,
        ctx: Context,
        body: Bytes,
    ) -> impl std::future::Future<Output = HandlerResult> + Send;
}

/// Transport server configuration.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Port to listen on (0 for OS-assigned)
    pub port: u16,
    /// Hostname to bind to
    pub hostname: String,
    /// Per-request deadline
    pub request_timeout: Duration,
    /// Take the client address from the first `X-Forwarded-For` hop
    pub trust_forwarded_for: bool,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            hostname: "127.0.0.1".into(),
            request_timeout: Duration::from_secs(30),
            trust_forwarded_for: false,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to read local address: {0}")]
    LocalAddr(#[source] std::io::Error),
}

struct AppState<H: RequestHandler> {
    handler: Arc<H>,
    config: TransportConfig,
}

/// The running HTTP server.
pub struct TransportServer {
    shutdown_tx: Option<mpsc::Sender<()>>,
    handle: Option<tokio::task::JoinHandle<()>>,
    port: u16,
}

impl TransportServer {
    /// Bind and start serving in a background task.
    pub async fn start<H: RequestHandler>(
        config: TransportConfig,
        handler: Arc<H>,
    ) -> Result<Self, TransportError> {
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel(1);

        let addr = format!("{}:{}", config.hostname, config.port);
        let listener = tokio::net::TcpListener::bind((config.hostname.as_str(), config.port))
            .await
            .map_err(|source| TransportError::Bind { addr, source })?;
        let actual_port = listener.local_addr().map_err(TransportError::LocalAddr)?.port();

        let app = router(handler, config.clone());

        info!("HTTP transport listening on http://{}:{}", config.hostname, actual_port);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
                .with_graceful_shutdown(async move {
                    let _ = shutdown_rx.recv().await;
                })
                .await
                .ok();
        });

        Ok(Self {
            shutdown_tx: Some(shutdown_tx),
            handle: Some(handle),
            port: actual_port,
        })
    }

    /// Get the actual bound port.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Stop accepting connections and wait for in-flight requests.
    pub async fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(()).await;
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
        info!("HTTP transport stopped");
    }
}

/// Build the router without binding, for serving elsewhere or for tests.
pub fn router<H: RequestHandler>(handler: Arc<H>, config: TransportConfig) -> Router {
    let timeout = config.request_timeout;
    let state = Arc::new(AppState { handler, config });

    Router::new()
        .route(Route::CreateUser.path(), post(create_user_handler::<H>))
        .route(Route::UpdateSettings.path(), post(update_settings_handler::<H>))
        .route("/health", get(health_handler))
        .layer(
            ServiceBuilder::new()
                .layer(middleware::from_fn_with_state(state.clone(), scope_middleware::<H>))
                .layer(TraceLayer::new_for_http().make_span_with(request_span))
                .layer(TimeoutLayer::with_status_code(StatusCode::REQUEST_TIMEOUT, timeout)),
        )
        .with_state(state)
}

// ─────────────────────────────────────────────────────────────────────────────
// Middleware
// ─────────────────────────────────────────────────────────────────────────────

/// Bind the request scope once, expose the context to handlers, and echo
/// the correlation id on the response.
async fn scope_middleware<H: RequestHandler>(
    State(state): State<Arc<AppState<H>>>,
    mut req: Request,
    next: Next,
) -> Response {
    let request_id = req
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(String::from)
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    let ip_address = client_ip(&req, state.config.trust_forwarded_for);

    debug!(request_id = %request_id, ip_address = %ip_address, "Request scope bound");

    let ctx = scope::set_scope(
        &Context::background(),
        RequestScope::new(request_id.clone(), ip_address),
    );
    req.extensions_mut().insert(ctx);

    let mut response = next.run(req).await;

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }

    response
}

/// Span for one HTTP request, tagged with the id the scope middleware bound.
fn request_span(req: &Request) -> Span {
    tracing::info_span!(
        "http_request",
        method = %req.method(),
        uri = %req.uri(),
        request_id = %span_request_id(req),
    )
}

pub(crate) fn span_request_id(req: &Request) -> String {
    req.extensions()
        .get::<Context>()
        .map(scope::request_id)
        .unwrap_or_default()
}

/// Client address: first forwarded hop when trusted, then the peer address,
/// else empty.
pub(crate) fn client_ip(req: &Request, trust_forwarded_for: bool) -> String {
    if trust_forwarded_for {
        let forwarded = req
            .headers()
            .get(FORWARDED_FOR_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty());
        if let Some(hop) = forwarded {
            return hop.to_string();
        }
    }

    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_default()
}

// ─────────────────────────────────────────────────────────────────────────────
// HTTP Handlers
// ─────────────────────────────────────────────────────────────────────────────

async fn create_user_handler<H: RequestHandler>(
    State(state): State<Arc<AppState<H>>>,
    Extension(ctx): Extension<Context>,
    body: Bytes,
) -> Response {
    dispatch(&state, Route::CreateUser, ctx, body).await
}

async fn update_settings_handler<H: RequestHandler>(
    State(state): State<Arc<AppState<H>>>,
    Extension(ctx): Extension<Context>,
    body: Bytes,
) -> Response {
    dispatch(&state, Route::UpdateSettings, ctx, body).await
}

async fn health_handler() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

async fn dispatch<H: RequestHandler>(
    state: &AppState<H>,
    route: Route,
    ctx: Context,
    body: Bytes,
) -> Response {
    match state.handler.handle_request(route, ctx, body).await {
        Ok(reply) => (reply_status(reply.status), Json(Envelope::success(reply.data))).into_response(),
        Err(err) => error_response(&err),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Status mapping
// ─────────────────────────────────────────────────────────────────────────────

pub fn reply_status(status: ReplyStatus) -> StatusCode {
    match status {
        ReplyStatus::Ok => StatusCode::OK,
        ReplyStatus::Created => StatusCode::CREATED,
    }
}

pub fn error_status(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::BadRequest => StatusCode::BAD_REQUEST,
        ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        ErrorKind::NotImplemented => StatusCode::NOT_IMPLEMENTED,
        ErrorKind::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
    }
}

pub fn error_response(err: &ApiError) -> Response {
    (error_status(err.kind()), Json(Envelope::from_error(err))).into_response()
}
