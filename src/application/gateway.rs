//! The request pipeline: validate → cache lookup → database fallback.

use std::sync::Arc;

use metrics::counter;
use tracing::{debug, warn};

use crate::application::error::GatewayError;
use crate::application::repos::{CacheStore, ProcedureRepo};
use crate::application::serialize;
use crate::config::GatewaySettings;
use crate::domain::action;

/// How a successful lookup was answered. The body is the same JSON document
/// either way; the distinction only feeds logging and metrics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupOutcome {
    /// Cached bytes, returned unmodified.
    Hit(String),
    /// Freshly computed from the database on a cache miss.
    Fallback(String),
}

impl LookupOutcome {
    pub fn into_body(self) -> String {
        match self {
            LookupOutcome::Hit(body) | LookupOutcome::Fallback(body) => body,
        }
    }
}

/// Orchestrates one lookup per request over the cache and procedure seams.
///
/// Holds no per-request state; safe to share across handlers behind an `Arc`.
pub struct GatewayService {
    validation_regex: String,
    param_name: String,
    cache: Arc<dyn CacheStore>,
    procedures: Arc<dyn ProcedureRepo>,
}

impl GatewayService {
    pub fn new(
        settings: &GatewaySettings,
        cache: Arc<dyn CacheStore>,
        procedures: Arc<dyn ProcedureRepo>,
    ) -> Self {
        Self {
            validation_regex: settings.validation_regex.clone(),
            param_name: settings.param_name.clone(),
            cache,
            procedures,
        }
    }

    /// Query parameter the HTTP surface should read the action from.
    pub fn param_name(&self) -> &str {
        &self.param_name
    }

    /// Answer one lookup.
    ///
    /// Exactly one of {cache hit, database fallback, error} results. The
    /// cache connection is opened before any database work and dropped when
    /// this call returns, whichever path was taken; the database connection
    /// is scoped inside the procedure repository. A failed cache write after
    /// a successful fallback does not fail the request.
    pub async fn lookup(&self, raw: Option<&str>) -> Result<LookupOutcome, GatewayError> {
        let action = action::validate(raw, &self.validation_regex, &self.param_name)?;

        let mut cache = self.cache.connect().await?;

        if let Some(cached) = cache.get(action.as_str()).await? {
            counter!("varco_cache_hit_total").increment(1);
            debug!(action = %action, "cache hit");
            return Ok(LookupOutcome::Hit(cached));
        }
        counter!("varco_cache_miss_total").increment(1);
        debug!(action = %action, "cache miss");

        let result = self.procedures.call(&action).await?;
        counter!("varco_procedure_call_total").increment(1);

        let body = serialize::to_compact_json(&result);

        if let Err(err) = cache.set(action.as_str(), &body).await {
            warn!(action = %action, error = %err, "cache population failed, serving database result");
        }

        Ok(LookupOutcome::Fallback(body))
    }
}
