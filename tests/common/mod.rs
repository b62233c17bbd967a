//! Shared harness for the router-level tests: in-memory repositories, local
//! file storage in a temp dir and a bootstrapped tenant with an admin key.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Method, Request, Response, StatusCode, header};
use serde_json::{Value, json};
use tempfile::TempDir;
use tower::ServiceExt;

use erp_server::app::{AppState, build_router};
use erp_server::repositories::Repositories;
use erp_server::services::rate_limit_service::{MemoryRateLimitStore, RateLimiter};
use erp_server::services::storage_service::LocalDiskStorage;
use erp_server::services::{AuditSigner, Context, WebhookDispatcher, auth_service};

pub const ADMIN_KEY: &str = "erp_test_admin_key_0123456789";
pub const UPLOAD_MAX_BYTES: u64 = 1024;

pub struct TestApp {
    pub router: Router,
    pub ctx: Context,
    pub storage_dir: TempDir,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_rate_limit(10_000).await
    }

    pub async fn with_rate_limit(requests: u64) -> Self {
        let repos = Repositories::in_memory();
        let webhooks = WebhookDispatcher::new(repos.webhooks.clone(), 1);
        let ctx = Context::new(
            repos,
            AuditSigner::new("test-signing-secret-0123456789"),
            webhooks,
        );

        auth_service::bootstrap(&ctx, "Acme", "admin@acme.test", ADMIN_KEY)
            .await
            .expect("bootstrap tenant");

        let storage_dir = tempfile::tempdir().expect("temp dir");
        let state = AppState {
            ctx: ctx.clone(),
            storage: Arc::new(LocalDiskStorage::new(storage_dir.path(), "/files")),
            rate_limiter: RateLimiter::new(
                Arc::new(MemoryRateLimitStore::default()),
                requests,
                Duration::from_secs(60),
            ),
            upload_max_bytes: UPLOAD_MAX_BYTES,
        };

        Self {
            router: build_router(state),
            ctx,
            storage_dir,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible")
    }

    /// JSON request with an optional bearer key; returns the status and the
    /// decoded body (`Null` for empty bodies).
    pub async fn call(
        &self,
        method: Method,
        uri: &str,
        key: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(key) = key {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {key}"));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("valid request");

        let response = self.send(request).await;
        let status = response.status();
        (status, json_body(response).await)
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.call(Method::GET, uri, Some(ADMIN_KEY), None).await
    }

    pub async fn post(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.call(Method::POST, uri, Some(ADMIN_KEY), Some(body)).await
    }

    pub async fn put(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.call(Method::PUT, uri, Some(ADMIN_KEY), Some(body)).await
    }

    pub async fn delete(&self, uri: &str) -> (StatusCode, Value) {
        self.call(Method::DELETE, uri, Some(ADMIN_KEY), None).await
    }

    /// Create a role with `permissions`, a user holding it and an API key for
    /// that user. Returns the plaintext key.
    pub async fn restricted_key(&self, email: &str, permissions: &[&str]) -> String {
        let (status, role) = self
            .post(
                "/v1/roles",
                json!({ "name": format!("Role for {email}"), "permissions": permissions }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{role}");

        let (status, user) = self
            .post(
                "/v1/users",
                json!({ "email": email, "full_name": "Restricted User", "role_id": role["id"] }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{user}");

        let (status, key) = self
            .post(
                &format!("/v1/users/{}/api-keys", user["id"].as_str().unwrap()),
                json!({ "label": "integration" }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{key}");
        key["key"].as_str().expect("plaintext key").to_string()
    }

    /// An active employee hired on 2024-01-15.
    pub async fn employee(&self, registration: &str, salary_cents: i64) -> Value {
        let (status, employee) = self
            .post(
                "/v1/employees",
                json!({
                    "registration_number": registration,
                    "full_name": format!("Employee {registration}"),
                    "hire_date": "2024-01-15",
                    "base_salary_cents": salary_cents,
                }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{employee}");
        employee
    }
}

pub async fn json_body(response: Response<Body>) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("readable body");
    if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("JSON body")
    }
}

pub fn id(value: &Value) -> &str {
    value["id"].as_str().expect("id field")
}
