//! Redis-backed cache adapter over a unix-domain socket.

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, Client};

use crate::application::repos::{CacheConnection, CacheError, CacheStore};
use crate::config::CacheSettings;
use crate::infra::error::InfraError;

/// Hands out one fresh connection per request.
///
/// `Client::open` only parses the endpoint; no I/O happens until
/// [`CacheStore::connect`], so an unreachable cache surfaces per request as
/// `CacheError::Unavailable`, not at startup.
pub struct RedisCacheStore {
    client: Client,
}

impl RedisCacheStore {
    pub fn new(settings: &CacheSettings) -> Result<Self, InfraError> {
        let url = format!("unix://{}", settings.socket.display());
        let client = Client::open(url.as_str())
            .map_err(|err| InfraError::cache_endpoint(format!("{url}: {err}")))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl CacheStore for RedisCacheStore {
    async fn connect(&self) -> Result<Box<dyn CacheConnection>, CacheError> {
        let connection = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(CacheError::unavailable)?;
        Ok(Box::new(RedisCacheConnection { connection }))
    }
}

/// Request-scoped connection; dropping it tears the socket down.
struct RedisCacheConnection {
    connection: MultiplexedConnection,
}

#[async_trait]
impl CacheConnection for RedisCacheConnection {
    async fn get(&mut self, key: &str) -> Result<Option<String>, CacheError> {
        let value: Option<String> = self
            .connection
            .get(key)
            .await
            .map_err(CacheError::unavailable)?;
        Ok(value)
    }

    async fn set(&mut self, key: &str, value: &str) -> Result<(), CacheError> {
        let _: () = self
            .connection
            .set(key, value)
            .await
            .map_err(CacheError::write)?;
        Ok(())
    }
}
