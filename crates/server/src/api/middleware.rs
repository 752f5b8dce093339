//! Authentication and metrics middleware for API routes.

use axum::{
    body::Body,
    extract::{FromRequestParts, State},
    http::{header, request::Parts, HeaderMap, Request, StatusCode},
    middleware::Next,
    response::Response,
};
use sha2::{Digest, Sha256};
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use packer_core::AuthMethod;

use crate::metrics::{
    normalize_path, AUTH_FAILURES_TOTAL, HTTP_REQUESTS_IN_FLIGHT, HTTP_REQUESTS_TOTAL,
    HTTP_REQUEST_DURATION,
};
use crate::state::AppState;

/// User recorded for requests authenticated with the shared API key.
pub const API_KEY_USER: &str = "api_key_user";

/// User recorded when authentication is disabled.
pub const ANONYMOUS_USER: &str = "anonymous";

/// Metrics middleware that tracks HTTP request duration and counts.
pub async fn metrics_middleware(request: Request<Body>, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().to_string();
    let path = normalize_path(request.uri().path());

    HTTP_REQUESTS_IN_FLIGHT.inc();

    let response = next.run(request).await;

    HTTP_REQUESTS_IN_FLIGHT.dec();

    let duration = start.elapsed().as_secs_f64();
    let status = response.status().as_u16().to_string();

    HTTP_REQUEST_DURATION
        .with_label_values(&[&method, &path, &status])
        .observe(duration);
    HTTP_REQUESTS_TOTAL
        .with_label_values(&[&method, &path, &status])
        .inc();

    response
}

/// Authentication middleware checking the shared API key.
///
/// The key is accepted as `X-Api-Key: <key>` or `Authorization: Bearer <key>`.
/// On success the caller's [`AuthUser`] is stored in the request extensions.
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, StatusCode> {
    let auth = &state.config().auth;

    let user = match auth.method {
        AuthMethod::None => ANONYMOUS_USER,
        AuthMethod::ApiKey => {
            let expected = auth.api_key.as_deref().unwrap_or_default();
            match extract_key(request.headers()) {
                None => {
                    AUTH_FAILURES_TOTAL
                        .with_label_values(&["not_authenticated"])
                        .inc();
                    return Err(StatusCode::UNAUTHORIZED);
                }
                Some(provided) if !keys_match(provided, expected) => {
                    AUTH_FAILURES_TOTAL
                        .with_label_values(&["invalid_credentials"])
                        .inc();
                    return Err(StatusCode::UNAUTHORIZED);
                }
                Some(_) => API_KEY_USER,
            }
        }
    };

    request.extensions_mut().insert(AuthUser(user.to_string()));
    Ok(next.run(request).await)
}

fn extract_key(headers: &HeaderMap) -> Option<&str> {
    if let Some(key) = headers.get("x-api-key").and_then(|v| v.to_str().ok()) {
        return Some(key);
    }

    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    value
        .strip_prefix("Bearer ")
        .or_else(|| value.strip_prefix("bearer "))
}

/// Compare digests so the check takes the same time whatever the key length.
fn keys_match(provided: &str, expected: &str) -> bool {
    if expected.is_empty() {
        return false;
    }

    let a = Sha256::digest(provided.as_bytes());
    let b = Sha256::digest(expected.as_bytes());
    a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Extractor for the authenticated user ID.
///
/// Falls back to "anonymous" if the auth middleware did not run for the route.
#[derive(Debug, Clone)]
pub struct AuthUser(pub String);

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> impl Future<Output = Result<Self, Self::Rejection>> + Send {
        let user = parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .unwrap_or_else(|| AuthUser(ANONYMOUS_USER.to_string()));
        std::future::ready(Ok(user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{middleware, routing::get, Router};
    use http_body_util::BodyExt;
    use packer_core::config::{AuthConfig, DatabaseConfig, ServerConfig};
    use packer_core::{
        create_audit_system, AuditStore, Config, PackingService, SqliteAuditStore,
        SqliteStockStore, StockConfig,
    };
    use tower::ServiceExt;

    async fn user_handler(AuthUser(user_id): AuthUser) -> String {
        user_id
    }

    fn create_test_state(auth: AuthConfig) -> Arc<AppState> {
        let config = Config {
            auth,
            server: ServerConfig::default(),
            database: DatabaseConfig::default(),
            stock: StockConfig::default(),
        };
        let audit_store: Arc<dyn AuditStore> = Arc::new(SqliteAuditStore::in_memory().unwrap());
        let (audit_handle, _writer) = create_audit_system(Arc::clone(&audit_store), 16);
        let packing = PackingService::new(Arc::new(SqliteStockStore::in_memory().unwrap()));

        Arc::new(AppState::new(config, packing, audit_handle, audit_store))
    }

    fn api_key_state() -> Arc<AppState> {
        create_test_state(AuthConfig {
            method: AuthMethod::ApiKey,
            api_key: Some("secret-key".to_string()),
        })
    }

    fn app(state: Arc<AppState>) -> Router {
        Router::new()
            .route("/test", get(user_handler))
            .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
            .with_state(state)
    }

    async fn send(app: Router, headers: &[(&str, &str)]) -> (StatusCode, String) {
        let mut builder = Request::builder().uri("/test");
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        let response = app
            .oneshot(builder.body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn test_none_auth_allows_all() {
        let state = create_test_state(AuthConfig {
            method: AuthMethod::None,
            api_key: None,
        });

        let (status, user) = send(app(state), &[]).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(user, ANONYMOUS_USER);
    }

    #[tokio::test]
    async fn test_x_api_key_header() {
        let (status, user) = send(app(api_key_state()), &[("X-Api-Key", "secret-key")]).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(user, API_KEY_USER);
    }

    #[tokio::test]
    async fn test_bearer_token() {
        let (status, _) = send(
            app(api_key_state()),
            &[("Authorization", "Bearer secret-key")],
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_api_key_invalid() {
        let (status, _) = send(app(api_key_state()), &[("X-Api-Key", "wrong-key")]).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) = send(app(api_key_state()), &[("X-Api-Key", "secret-key-longer")]).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_api_key_missing() {
        let (status, _) = send(app(api_key_state()), &[]).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) = send(app(api_key_state()), &[("Authorization", "Basic abc")]).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_keys_match() {
        assert!(keys_match("abc", "abc"));
        assert!(!keys_match("abc", "abd"));
        assert!(!keys_match("", ""));
    }
}
