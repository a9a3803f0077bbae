//! HTTP surface: the single gateway route and response logging.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use axum::body::Body;
use axum::extract::{Query, State};
use axum::http::{Request, header};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use tracing::{error, warn};

use crate::application::error::{ErrorReport, GatewayError};
use crate::application::gateway::GatewayService;

#[derive(Clone)]
pub struct HttpState {
    pub gateway: Arc<GatewayService>,
}

/// Build the gateway router. The method router rejects non-GET requests with
/// 405 before the handler runs.
pub fn build_router(state: HttpState) -> Router {
    Router::new()
        .route("/", get(lookup))
        .with_state(state)
        .layer(middleware::from_fn(log_responses))
}

async fn lookup(
    State(state): State<HttpState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<impl IntoResponse, GatewayError> {
    let raw = params.get(state.gateway.param_name()).map(String::as_str);
    let outcome = state.gateway.lookup(raw).await?;

    Ok((
        [(header::CONTENT_TYPE, "application/json")],
        outcome.into_body(),
    ))
}

/// Log failed responses with the diagnostics the error path attached.
pub async fn log_responses(request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let start = Instant::now();

    let mut response = next.run(request).await;
    let status = response.status();

    if status.is_client_error() || status.is_server_error() {
        let elapsed_ms = start.elapsed().as_millis();
        let report = response.extensions_mut().remove::<ErrorReport>();
        let (source, messages) = match report {
            Some(report) => (report.source, report.messages),
            None => ("unknown", Vec::new()),
        };
        let detail = messages
            .first()
            .cloned()
            .unwrap_or_else(|| "no diagnostic available".to_string());

        if status.is_server_error() {
            error!(
                target = "varco::http::response",
                status = status.as_u16(),
                method = %method,
                path = %uri.path(),
                query = uri.query().unwrap_or(""),
                elapsed_ms = elapsed_ms,
                source = source,
                detail = %detail,
                chain = ?messages,
                "request failed",
            );
        } else {
            warn!(
                target = "varco::http::response",
                status = status.as_u16(),
                method = %method,
                path = %uri.path(),
                query = uri.query().unwrap_or(""),
                elapsed_ms = elapsed_ms,
                source = source,
                detail = %detail,
                chain = ?messages,
                "client request error",
            );
        }
    }

    response
}
