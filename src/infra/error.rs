use thiserror::Error;

#[derive(Debug, Error)]
pub enum InfraError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("telemetry initialization failed: {0}")]
    Telemetry(String),
    #[error("invalid cache endpoint: {message}")]
    CacheEndpoint { message: String },
}

impl InfraError {
    pub fn telemetry(message: impl Into<String>) -> Self {
        Self::Telemetry(message.into())
    }

    pub fn cache_endpoint(message: impl Into<String>) -> Self {
        Self::CacheEndpoint {
            message: message.into(),
        }
    }
}
