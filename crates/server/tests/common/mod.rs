//! Common test utilities for HTTP tests.
//!
//! This module provides a test fixture that builds the real router over a
//! temporary SQLite database seeded with the default warehouse, and drives
//! it in-process without binding a port.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

use packer_core::config::{AuthConfig, DatabaseConfig, ServerConfig};
use packer_core::stock::Warehouse;
use packer_core::{
    create_audit_system, ensure_default_warehouse, AuditFilter, AuditRecord, AuditStore,
    AuthMethod, Config, PackingService, SqliteAuditStore, SqliteStockStore, StockConfig,
    StockStore,
};
use packer_server::{create_router, AppState};

/// Test fixture driving the router in-process.
///
/// # Example
///
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_form() {
///     let fixture = TestFixture::new().await;
///     let response = fixture.get("/api/v1/wizards/pack-products").await;
///     assert_eq!(response.status, 200);
/// }
/// ```
pub struct TestFixture {
    pub router: Router,
    /// Seeded company, locations and operation types
    pub warehouse: Warehouse,
    pub audit_store: Arc<dyn AuditStore>,
    /// API key sent with every request, if any
    pub api_key: Option<String>,
    /// Temporary directory holding the test database
    pub temp_dir: TempDir,
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
    pub text: String,
}

impl TestFixture {
    /// Create a fixture with authentication disabled.
    pub async fn new() -> Self {
        Self::build(None).await
    }

    /// Create a fixture that requires the given API key.
    pub async fn with_api_key(key: &str) -> Self {
        Self::build(Some(key.to_string())).await
    }

    async fn build(api_key: Option<String>) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db_path = temp_dir.path().join("test.db");

        let config = Config {
            auth: AuthConfig {
                method: if api_key.is_some() {
                    AuthMethod::ApiKey
                } else {
                    AuthMethod::None
                },
                api_key: api_key.clone(),
            },
            server: ServerConfig {
                host: std::net::IpAddr::V4(std::net::Ipv4Addr::LOCALHOST),
                port: 0, // Not used for in-process testing
            },
            database: DatabaseConfig {
                path: db_path.clone(),
            },
            stock: StockConfig::default(),
        };

        let stock_store =
            SqliteStockStore::new(&db_path).expect("Failed to create stock store");
        let warehouse = ensure_default_warehouse(&stock_store)
            .expect("Failed to seed warehouse")
            .expect("Fresh database has no warehouse");
        let stock_store: Arc<dyn StockStore> = Arc::new(stock_store);

        let audit_store: Arc<dyn AuditStore> = Arc::new(
            SqliteAuditStore::new(&db_path).expect("Failed to create audit store"),
        );
        let (audit_handle, audit_writer) = create_audit_system(Arc::clone(&audit_store), 100);
        tokio::spawn(audit_writer.run());

        let packing = PackingService::new(stock_store).with_audit(audit_handle.clone());
        let state = Arc::new(AppState::new(
            config,
            packing,
            audit_handle,
            Arc::clone(&audit_store),
        ));

        Self {
            router: create_router(state),
            warehouse,
            audit_store,
            api_key,
            temp_dir,
        }
    }

    /// Send a GET request to the test server.
    pub async fn get(&self, path: &str) -> TestResponse {
        self.request("GET", path, None).await
    }

    /// Send a POST request with JSON body.
    pub async fn post(&self, path: &str, body: Value) -> TestResponse {
        self.request("POST", path, Some(body.to_string())).await
    }

    /// Send a POST request with raw string body (for testing malformed JSON).
    pub async fn post_raw(&self, path: &str, body: &str) -> TestResponse {
        self.request("POST", path, Some(body.to_string())).await
    }

    /// Send a request without the fixture's API key.
    pub async fn get_unauthenticated(&self, path: &str) -> TestResponse {
        let request = Request::builder()
            .method("GET")
            .uri(path)
            .body(Body::empty())
            .unwrap();
        self.send(request).await
    }

    async fn request(&self, method: &str, path: &str, body: Option<String>) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(path);
        if let Some(ref key) = self.api_key {
            builder = builder.header("X-Api-Key", key);
        }

        let request = match body {
            Some(body) => builder
                .header("Content-Type", "application/json")
                .body(Body::from(body))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        self.send(request).await
    }

    async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let body_bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();

        let text = String::from_utf8_lossy(&body_bytes).to_string();
        let body = serde_json::from_slice(&body_bytes).unwrap_or(Value::Null);

        TestResponse { status, body, text }
    }

    /// Create `count` products through the API, returning their IDs.
    pub async fn create_products(&self, count: usize) -> Vec<i64> {
        let mut ids = Vec::with_capacity(count);
        for i in 1..=count {
            let response = self
                .post(
                    "/api/v1/products",
                    json!({ "name": format!("Product {}", i), "default_code": format!("P{}", i) }),
                )
                .await;
            assert_eq!(response.status, StatusCode::CREATED);
            ids.push(response.body["id"].as_i64().unwrap());
        }
        ids
    }

    /// Poll the audit store until `count` events of the type are written.
    pub async fn wait_for_audit(&self, event_type: &str, count: usize) -> Vec<AuditRecord> {
        let filter = AuditFilter::new().with_event_type(event_type);
        for _ in 0..100 {
            let records = self.audit_store.query(&filter).expect("Failed to query audit");
            if records.len() >= count {
                return records;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("timed out waiting for {} {} audit event(s)", count, event_type);
    }
}
