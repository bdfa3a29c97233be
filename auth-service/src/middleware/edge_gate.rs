//! Stateless access-token gate in front of every route. Public routes pass,
//! everything else needs a valid Bearer access token or is sent to the login
//! page. Sessions are never consulted, so a revoked device keeps access until
//! its current access token expires.

use service_core::axum::{
    extract::{Request, State},
    http::HeaderValue,
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use std::sync::Arc;

use crate::{config::SecurityConfig, handlers::context::bearer_token, services::JwtService};

pub const USER_ID_HEADER: &str = "x-user-id";

#[derive(Clone)]
pub struct EdgeGate {
    jwt: JwtService,
    security: Arc<SecurityConfig>,
}

impl EdgeGate {
    pub fn new(jwt: JwtService, security: SecurityConfig) -> Self {
        Self {
            jwt,
            security: Arc::new(security),
        }
    }
}

pub async fn edge_gate_middleware(
    State(gate): State<EdgeGate>,
    mut req: Request,
    next: Next,
) -> Response {
    // Only the gate may assert who the caller is.
    req.headers_mut().remove(USER_ID_HEADER);

    if gate.security.is_public_route(req.uri().path()) {
        return next.run(req).await;
    }

    let claims = bearer_token(req.headers()).and_then(|token| gate.jwt.verify_access_token(token));

    let Some(claims) = claims else {
        tracing::debug!(path = %req.uri().path(), "Redirecting unauthenticated request to login");
        return Redirect::temporary(&gate.security.login_path).into_response();
    };

    match HeaderValue::from_str(&claims.sub) {
        Ok(value) => {
            req.headers_mut().insert(USER_ID_HEADER, value);
        }
        Err(_) => {
            tracing::warn!("Access token subject is not a valid header value");
            return Redirect::temporary(&gate.security.login_path).into_response();
        }
    }

    req.extensions_mut().insert(claims);
    next.run(req).await
}
