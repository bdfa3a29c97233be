//! Test helpers for the HTTP-level integration tests.
//!
//! Every test gets its own router backed by an in-memory store, so tests
//! run without PostgreSQL and never share state.

#![allow(dead_code)]

use axum::{
    body::Body,
    extract::ConnectInfo,
    http::{header, Request, Response, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use service_core::config::Config;
use service_core::middleware::create_ip_rate_limiter;
use shoplist_auth::{
    build_router,
    config::{
        AuthConfig, DatabaseConfig, Environment, JwtConfig, RateLimitConfig, SecurityConfig,
        SwaggerConfig, SwaggerMode, DEFAULT_PUBLIC_ROUTES,
    },
    models::{User, UserRole},
    services::{AuthService, JwtService, MockStore},
    utils::{hash_password, Password, REFRESH_COOKIE_NAME},
    AppState,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower::util::ServiceExt;

pub const TEST_PASSWORD: &str = "correct horse battery";
pub const TEST_ORIGIN: &str = "http://localhost:3000";

pub fn test_config() -> AuthConfig {
    AuthConfig {
        common: Config {
            host: "127.0.0.1".to_string(),
            port: 8080,
        },
        environment: Environment::Dev,
        service_name: "shoplist-auth".to_string(),
        service_version: "test".to_string(),
        log_level: "error".to_string(),
        otlp_endpoint: None,
        database: DatabaseConfig {
            url: "postgres://unused".to_string(),
            max_connections: 1,
            min_connections: 1,
        },
        jwt: JwtConfig {
            access_token_secret: "test-access-secret".to_string(),
            refresh_token_secret: "test-refresh-secret".to_string(),
            access_token_expiry_minutes: 15,
            refresh_token_expiry_days: 7,
        },
        security: SecurityConfig {
            allowed_origins: vec![TEST_ORIGIN.to_string()],
            public_routes: DEFAULT_PUBLIC_ROUTES
                .split(',')
                .map(|s| s.to_string())
                .collect(),
            login_path: "/login".to_string(),
        },
        swagger: SwaggerConfig {
            enabled: SwaggerMode::Public,
        },
        rate_limit: RateLimitConfig {
            login_attempts: 100,
            login_window_seconds: 60,
            register_attempts: 100,
            register_window_seconds: 60,
        },
    }
}

pub struct TestApp {
    pub router: Router,
    pub store: Arc<MockStore>,
    pub jwt: JwtService,
    pub config: AuthConfig,
}

impl TestApp {
    pub fn spawn() -> Self {
        Self::with_config(test_config())
    }

    pub fn with_config(config: AuthConfig) -> Self {
        let store = Arc::new(MockStore::new());
        let jwt = JwtService::new(&config.jwt).expect("Failed to create JWT service");

        let auth_service = AuthService::new(store.clone(), store.clone(), store.clone(), jwt.clone());

        let state = AppState {
            config: config.clone(),
            jwt: jwt.clone(),
            auth_service,
            login_rate_limiter: create_ip_rate_limiter(
                config.rate_limit.login_attempts,
                config.rate_limit.login_window_seconds,
            ),
            register_rate_limiter: create_ip_rate_limiter(
                config.rate_limit.register_attempts,
                config.rate_limit.register_window_seconds,
            ),
        };

        Self {
            router: build_router(state),
            store,
            jwt,
            config,
        }
    }

    /// Inserts an active user with `TEST_PASSWORD`.
    pub fn seed_user(&self, username: &str, email: &str) -> User {
        let hash = hash_password(&Password::new(TEST_PASSWORD.to_string()))
            .expect("Failed to hash password");
        let user = User::new(
            username.to_string(),
            email.to_string(),
            Some(username.to_string()),
            hash.into_string(),
            UserRole::User,
        );
        self.store.insert_user(user.clone()).expect("Failed to seed user");
        user
    }

    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("Router failed")
    }

    pub async fn login(&self, identifier: &str, device_id: &str) -> Response<Body> {
        self.login_with_password(identifier, TEST_PASSWORD, device_id).await
    }

    pub async fn login_with_password(
        &self,
        identifier: &str,
        password: &str,
        device_id: &str,
    ) -> Response<Body> {
        let body = serde_json::json!({
            "identifier": identifier,
            "password": password,
            "deviceId": device_id,
            "platform": "MacIntel",
            "browser": "Firefox",
        });
        self.send(json_request("POST", "/auth/login", &body)).await
    }

    /// Logs in and returns the (access, refresh) token pair.
    pub async fn login_tokens(&self, identifier: &str, device_id: &str) -> (String, String) {
        let response = self.login(identifier, device_id).await;
        assert_eq!(response.status(), StatusCode::OK);
        let access = bearer_from(&response).expect("login did not return an access token");
        let refresh = refresh_cookie_from(&response).expect("login did not set the refresh cookie");
        (access, refresh)
    }

    pub async fn post_with_cookie(&self, uri: &str, refresh: Option<&str>) -> Response<Body> {
        self.send(cookie_request("POST", uri, refresh)).await
    }
}

fn with_peer(builder: axum::http::request::Builder) -> axum::http::request::Builder {
    builder.extension(ConnectInfo(SocketAddr::from(([127, 0, 0, 1], 40000))))
}

pub fn json_request(method: &str, uri: &str, body: &serde_json::Value) -> Request<Body> {
    with_peer(Request::builder())
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::USER_AGENT, "integration-test")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn cookie_request(method: &str, uri: &str, refresh: Option<&str>) -> Request<Body> {
    let mut builder = with_peer(Request::builder())
        .method(method)
        .uri(uri)
        .header(header::USER_AGENT, "integration-test");
    if let Some(token) = refresh {
        builder = builder.header(header::COOKIE, format!("{}={}", REFRESH_COOKIE_NAME, token));
    }
    builder.body(Body::empty()).unwrap()
}

pub fn bearer_from(response: &Response<Body>) -> Option<String> {
    response
        .headers()
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(|s| s.to_string())
}

/// Value of the refresh cookie set by the response, if any. A removal
/// cookie yields `Some("")`.
pub fn refresh_cookie_from(response: &Response<Body>) -> Option<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find_map(|v| {
            let pair = v.split(';').next()?.trim();
            pair.strip_prefix(&format!("{}=", REFRESH_COOKIE_NAME))
                .map(|value| value.to_string())
        })
}

pub fn set_cookie_header(response: &Response<Body>) -> Option<String> {
    response
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("Failed to read body")
        .to_bytes();
    serde_json::from_slice(&bytes).expect("Body is not JSON")
}

pub async fn body_text(response: Response<Body>) -> String {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("Failed to read body")
        .to_bytes();
    String::from_utf8(bytes.to_vec()).expect("Body is not UTF-8")
}
