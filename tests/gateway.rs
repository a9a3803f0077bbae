use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use http_body_util::BodyExt;
use tokio::sync::Mutex;
use tower::ServiceExt;

use varco::application::gateway::GatewayService;
use varco::application::repos::{
    CacheConnection, CacheError, CacheStore, ProcedureError, ProcedureRepo,
};
use varco::config::GatewaySettings;
use varco::domain::action::Action;
use varco::domain::result::QueryResult;
use varco::infra::http::{HttpState, build_router};

const DEFAULT_PATTERN: &str = "^[a-zA-Z0-9-_]+$";

/// In-memory stand-in for the Redis store. Counts connection attempts so
/// tests can assert the cache was never touched on validation failures.
struct MemoryCache {
    entries: Arc<Mutex<HashMap<String, String>>>,
    connects: AtomicUsize,
    fail_connect: bool,
    fail_set: bool,
}

impl MemoryCache {
    fn new() -> Self {
        Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
            connects: AtomicUsize::new(0),
            fail_connect: false,
            fail_set: false,
        }
    }

    fn unreachable() -> Self {
        Self {
            fail_connect: true,
            ..Self::new()
        }
    }

    fn failing_writes() -> Self {
        Self {
            fail_set: true,
            ..Self::new()
        }
    }

    async fn preload(&self, key: &str, value: &str) {
        self.entries
            .lock()
            .await
            .insert(key.to_string(), value.to_string());
    }

    async fn entry(&self, key: &str) -> Option<String> {
        self.entries.lock().await.get(key).cloned()
    }

    async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CacheStore for MemoryCache {
    async fn connect(&self) -> Result<Box<dyn CacheConnection>, CacheError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        if self.fail_connect {
            return Err(CacheError::unavailable("connection refused"));
        }
        Ok(Box::new(MemoryCacheConnection {
            entries: self.entries.clone(),
            fail_set: self.fail_set,
        }))
    }
}

struct MemoryCacheConnection {
    entries: Arc<Mutex<HashMap<String, String>>>,
    fail_set: bool,
}

#[async_trait]
impl CacheConnection for MemoryCacheConnection {
    async fn get(&mut self, key: &str) -> Result<Option<String>, CacheError> {
        Ok(self.entries.lock().await.get(key).cloned())
    }

    async fn set(&mut self, key: &str, value: &str) -> Result<(), CacheError> {
        if self.fail_set {
            return Err(CacheError::write("read-only replica"));
        }
        self.entries
            .lock()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// In-memory stand-in for the database, with an invocation counter.
struct MemoryProcedures {
    result: Option<QueryResult>,
    calls: AtomicUsize,
}

impl MemoryProcedures {
    fn returning(result: QueryResult) -> Self {
        Self {
            result: Some(result),
            calls: AtomicUsize::new(0),
        }
    }

    fn failing() -> Self {
        Self {
            result: None,
            calls: AtomicUsize::new(0),
        }
    }

    fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProcedureRepo for MemoryProcedures {
    async fn call(&self, _action: &Action) -> Result<QueryResult, ProcedureError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.result.as_ref() {
            Some(result) => Ok(result.clone()),
            None => Err(ProcedureError::query("PROCEDURE does not exist")),
        }
    }
}

fn user_row() -> QueryResult {
    QueryResult {
        columns: vec!["id".to_string(), "name".to_string()],
        rows: vec![vec![Some("1".to_string()), Some("Alice".to_string())]],
    }
}

fn router_with(
    cache: Arc<MemoryCache>,
    procedures: Arc<MemoryProcedures>,
    validation_regex: &str,
) -> Router {
    let settings = GatewaySettings {
        validation_regex: validation_regex.to_string(),
        param_name: "sp".to_string(),
    };
    let gateway = Arc::new(GatewayService::new(&settings, cache, procedures));
    build_router(HttpState { gateway })
}

async fn send(router: &Router, uri: &str) -> (StatusCode, Option<String>, String) {
    let response = router
        .clone()
        .oneshot(
            Request::builder()
                .uri(uri)
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");

    let status = response.status();
    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .map(|value| value.to_str().expect("header").to_string());
    let body = response.into_body().collect().await.expect("body").to_bytes();

    (status, content_type, String::from_utf8(body.to_vec()).expect("utf8"))
}

#[tokio::test]
async fn miss_computes_serializes_and_populates_the_cache() {
    let cache = Arc::new(MemoryCache::new());
    let procedures = Arc::new(MemoryProcedures::returning(user_row()));
    let router = router_with(cache.clone(), procedures.clone(), DEFAULT_PATTERN);

    let (status, content_type, body) = send(&router, "/?sp=get_user").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(content_type.as_deref(), Some("application/json"));
    assert_eq!(body, r#"{"data":[{"id":"1","name":"Alice"}]}"#);
    assert_eq!(procedures.call_count(), 1);
    assert_eq!(cache.entry("get_user").await.as_deref(), Some(body.as_str()));
}

#[tokio::test]
async fn repeat_request_is_served_from_cache_without_database() {
    let cache = Arc::new(MemoryCache::new());
    let procedures = Arc::new(MemoryProcedures::returning(user_row()));
    let router = router_with(cache.clone(), procedures.clone(), DEFAULT_PATTERN);

    let (_, _, first) = send(&router, "/?sp=get_user").await;
    let (status, _, second) = send(&router, "/?sp=get_user").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(second, first);
    assert_eq!(procedures.call_count(), 1, "second request must not hit the database");
}

#[tokio::test]
async fn cache_hit_returns_cached_bytes_unmodified() {
    let cache = Arc::new(MemoryCache::new());
    // Deliberately not what the serializer would produce, to prove the
    // cached value is passed through byte-for-byte.
    cache.preload("report", "{\"data\": [1, 2]}  ").await;
    let procedures = Arc::new(MemoryProcedures::failing());
    let router = router_with(cache.clone(), procedures.clone(), DEFAULT_PATTERN);

    let (status, content_type, body) = send(&router, "/?sp=report").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(content_type.as_deref(), Some("application/json"));
    assert_eq!(body, "{\"data\": [1, 2]}  ");
    assert_eq!(procedures.call_count(), 0);
}

#[tokio::test]
async fn missing_parameter_is_a_client_error_before_any_backend() {
    let cache = Arc::new(MemoryCache::new());
    let procedures = Arc::new(MemoryProcedures::returning(user_row()));
    let router = router_with(cache.clone(), procedures.clone(), DEFAULT_PATTERN);

    let (status, _, body) = send(&router, "/").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.is_empty());
    assert_eq!(cache.connect_count(), 0);
    assert_eq!(procedures.call_count(), 0);
}

#[tokio::test]
async fn action_with_a_space_is_rejected() {
    let cache = Arc::new(MemoryCache::new());
    let procedures = Arc::new(MemoryProcedures::returning(user_row()));
    let router = router_with(cache.clone(), procedures.clone(), DEFAULT_PATTERN);

    let (status, _, _) = send(&router, "/?sp=bad%20name").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(cache.connect_count(), 0);
    assert_eq!(procedures.call_count(), 0);
}

#[tokio::test]
async fn overlong_action_is_rejected() {
    let cache = Arc::new(MemoryCache::new());
    let procedures = Arc::new(MemoryProcedures::returning(user_row()));
    let router = router_with(cache.clone(), procedures.clone(), DEFAULT_PATTERN);

    let uri = format!("/?sp={}", "a".repeat(300));
    let (status, _, _) = send(&router, &uri).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(cache.connect_count(), 0);
    assert_eq!(procedures.call_count(), 0);
}

#[tokio::test]
async fn unreachable_cache_fails_the_request_without_touching_the_database() {
    let cache = Arc::new(MemoryCache::unreachable());
    let procedures = Arc::new(MemoryProcedures::returning(user_row()));
    let router = router_with(cache.clone(), procedures.clone(), DEFAULT_PATTERN);

    let (status, _, body) = send(&router, "/?sp=get_user").await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body.is_empty());
    assert_eq!(procedures.call_count(), 0);
}

#[tokio::test]
async fn procedure_failure_leaves_the_cache_unmodified() {
    let cache = Arc::new(MemoryCache::new());
    let procedures = Arc::new(MemoryProcedures::failing());
    let router = router_with(cache.clone(), procedures.clone(), DEFAULT_PATTERN);

    let (status, _, _) = send(&router, "/?sp=get_user").await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(procedures.call_count(), 1);
    assert_eq!(cache.len().await, 0);
}

#[tokio::test]
async fn failed_cache_write_does_not_fail_the_response() {
    let cache = Arc::new(MemoryCache::failing_writes());
    let procedures = Arc::new(MemoryProcedures::returning(user_row()));
    let router = router_with(cache.clone(), procedures.clone(), DEFAULT_PATTERN);

    let (status, _, body) = send(&router, "/?sp=get_user").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, r#"{"data":[{"id":"1","name":"Alice"}]}"#);
    assert_eq!(cache.len().await, 0, "write failed, nothing stored");
}

#[tokio::test]
async fn invalid_configured_pattern_is_an_internal_error() {
    let cache = Arc::new(MemoryCache::new());
    let procedures = Arc::new(MemoryProcedures::returning(user_row()));
    let router = router_with(cache.clone(), procedures.clone(), "(");

    let (status, _, _) = send(&router, "/?sp=get_user").await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(cache.connect_count(), 0);
    assert_eq!(procedures.call_count(), 0);
}

#[tokio::test]
async fn sql_null_cells_round_trip_as_the_string_null() {
    let cache = Arc::new(MemoryCache::new());
    let procedures = Arc::new(MemoryProcedures::returning(QueryResult {
        columns: vec!["id".to_string(), "email".to_string()],
        rows: vec![vec![Some("1".to_string()), None]],
    }));
    let router = router_with(cache.clone(), procedures.clone(), DEFAULT_PATTERN);

    let (status, _, body) = send(&router, "/?sp=get_user").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, r#"{"data":[{"id":"1","email":"NULL"}]}"#);
}

#[tokio::test]
async fn non_get_methods_are_rejected() {
    let cache = Arc::new(MemoryCache::new());
    let procedures = Arc::new(MemoryProcedures::returning(user_row()));
    let router = router_with(cache.clone(), procedures.clone(), DEFAULT_PATTERN);

    let response = router
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/?sp=get_user")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(procedures.call_count(), 0);
}
