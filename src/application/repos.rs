//! Adapter traits the gateway pipeline depends on.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::action::Action;
use crate::domain::result::QueryResult;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache unavailable: {0}")]
    Unavailable(String),
    #[error("cache write failed: {0}")]
    Write(String),
}

impl CacheError {
    pub fn unavailable(err: impl std::fmt::Display) -> Self {
        Self::Unavailable(err.to_string())
    }

    pub fn write(err: impl std::fmt::Display) -> Self {
        Self::Write(err.to_string())
    }
}

#[derive(Debug, Error)]
pub enum ProcedureError {
    #[error("database connect failed: {0}")]
    Connect(String),
    #[error("stored procedure invocation failed: {0}")]
    Query(String),
    #[error("failed to read result set: {0}")]
    ResultSet(String),
}

impl ProcedureError {
    pub fn connect(err: impl std::fmt::Display) -> Self {
        Self::Connect(err.to_string())
    }

    pub fn query(err: impl std::fmt::Display) -> Self {
        Self::Query(err.to_string())
    }

    pub fn result_set(err: impl std::fmt::Display) -> Self {
        Self::ResultSet(err.to_string())
    }
}

/// Key-value cache backend.
///
/// One [`CacheConnection`] is opened per request and serves that request's
/// single GET and optional SET; dropping it releases the underlying
/// connection on every exit path.
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn connect(&self) -> Result<Box<dyn CacheConnection>, CacheError>;
}

#[async_trait]
pub trait CacheConnection: Send {
    async fn get(&mut self, key: &str) -> Result<Option<String>, CacheError>;
    async fn set(&mut self, key: &str, value: &str) -> Result<(), CacheError>;
}

/// Stored-procedure backend.
#[async_trait]
pub trait ProcedureRepo: Send + Sync {
    /// Invoke the named zero-argument stored procedure and materialize its
    /// result set. Implementations open and release their own connection;
    /// at most one invocation occurs per request.
    async fn call(&self, action: &Action) -> Result<QueryResult, ProcedureError>;
}
