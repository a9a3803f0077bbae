use std::error::Error as StdError;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::application::repos::{CacheError, ProcedureError};
use crate::config::LoadError;
use crate::domain::action::ValidationError;
use crate::infra::error::InfraError;

/// Diagnostic payload attached to error responses for the logging middleware.
///
/// Clients never see this; the response body stays empty and the report is
/// consumed server-side when the response is logged.
#[derive(Debug, Clone)]
pub struct ErrorReport {
    pub source: &'static str,
    pub status: StatusCode,
    pub messages: Vec<String>,
}

impl ErrorReport {
    pub fn from_error(source: &'static str, status: StatusCode, error: &dyn StdError) -> Self {
        let mut messages = Vec::new();
        messages.push(error.to_string());
        let mut current = error.source();
        while let Some(inner) = current {
            messages.push(inner.to_string());
            current = inner.source();
        }
        Self {
            source,
            status,
            messages,
        }
    }

    pub fn attach(self, response: &mut Response) {
        response.extensions_mut().insert(self);
    }
}

/// Request-path error taxonomy.
///
/// Every variant is terminal for its request: no retry, no partial response.
/// The client receives only the mapped status code; diagnostics travel via
/// [`ErrorReport`] into the server log.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Cache(#[from] CacheError),
    #[error(transparent)]
    Procedure(#[from] ProcedureError),
}

impl GatewayError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            // A broken configured pattern is the operator's fault, not the client's.
            GatewayError::Validation(ValidationError::PatternCompile { .. }) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            GatewayError::Validation(_) => StatusCode::BAD_REQUEST,
            GatewayError::Cache(_) | GatewayError::Procedure(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let report = ErrorReport::from_error("application::gateway", status, &self);
        let mut response = status.into_response();
        report.attach(&mut response);
        response
    }
}

/// Top-level error for process bootstrap and shutdown.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("failed to load configuration: {0}")]
    Config(#[from] LoadError),
    #[error(transparent)]
    Infra(#[from] InfraError),
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl AppError {
    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected(message.into())
    }
}
