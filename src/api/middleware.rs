//! Security middleware and request identity.

use axum::{
    body::Body,
    extract::{FromRequestParts, State},
    http::{request::Parts, HeaderValue, Request, StatusCode},
    middleware::Next,
    response::Response,
};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

/// Header carrying the caller's user id, set by the upstream gateway.
pub const USER_ID_HEADER: &str = "X-User-Id";

/// Security configuration loaded from environment variables.
#[derive(Clone, Debug, Default)]
pub struct SecurityConfig {
    /// API key for authentication (from TASKBREAK_API_KEY)
    pub api_key: Option<String>,
    /// Allowed CORS origins (from TASKBREAK_CORS_ORIGINS, comma-separated)
    pub cors_origins: Option<Vec<String>>,
}

impl SecurityConfig {
    /// Load security configuration from environment variables.
    pub fn from_env() -> Self {
        let api_key = std::env::var("TASKBREAK_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty());

        let cors_origins = std::env::var("TASKBREAK_CORS_ORIGINS").ok().map(|s| {
            s.split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        });

        Self {
            api_key,
            cors_origins,
        }
    }

    /// No authentication, permissive CORS (local development and tests).
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Authentication enabled with the given key.
    pub fn with_api_key(key: impl Into<String>) -> Self {
        Self {
            api_key: Some(key.into()),
            cors_origins: None,
        }
    }

    /// CORS layer for the configured origins, permissive when none are set.
    pub fn cors_layer(&self) -> CorsLayer {
        let Some(origins) = &self.cors_origins else {
            return CorsLayer::permissive();
        };

        let origins: Vec<HeaderValue> = origins
            .iter()
            .filter_map(|origin| match HeaderValue::from_str(origin) {
                Ok(value) => Some(value),
                Err(_) => {
                    tracing::warn!("Ignoring invalid CORS origin: {}", origin);
                    None
                }
            })
            .collect();

        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods(Any)
            .allow_headers(Any)
    }
}

/// Authentication middleware that checks for valid API key.
pub async fn auth_middleware(
    State(config): State<SecurityConfig>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, StatusCode> {
    let expected_key = match &config.api_key {
        Some(key) => key,
        None => return Ok(next.run(request).await),
    };

    let auth_header = request
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok());

    match auth_header.and_then(|h| h.strip_prefix("Bearer ")) {
        Some(token) if token == expected_key => Ok(next.run(request).await),
        Some(_) => {
            tracing::warn!("Invalid API key provided");
            Err(StatusCode::UNAUTHORIZED)
        }
        None if auth_header.is_some() => {
            tracing::warn!("Invalid Authorization header format");
            Err(StatusCode::UNAUTHORIZED)
        }
        None => {
            tracing::warn!("Missing Authorization header");
            Err(StatusCode::UNAUTHORIZED)
        }
    }
}

/// The user a request acts for, taken from [`USER_ID_HEADER`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentUser(pub String);

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, String);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|h| h.to_str().ok())
            .map(str::trim)
            .filter(|id| !id.is_empty());

        match user_id {
            Some(id) => Ok(CurrentUser(id.to_string())),
            None => Err((
                StatusCode::BAD_REQUEST,
                format!("Missing {} header", USER_ID_HEADER),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn security_config_disabled_has_no_auth() {
        let config = SecurityConfig::disabled();
        assert!(config.api_key.is_none());
        assert!(config.cors_origins.is_none());
    }

    #[test]
    fn security_config_with_api_key_has_auth() {
        let config = SecurityConfig::with_api_key("test-key");
        assert_eq!(config.api_key, Some("test-key".to_string()));
    }

    #[tokio::test]
    async fn current_user_reads_header() {
        let request = Request::builder()
            .header(USER_ID_HEADER, " user-42 ")
            .body(())
            .unwrap();
        let (mut parts, _) = request.into_parts();

        let user = CurrentUser::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(user, CurrentUser("user-42".to_string()));
    }

    #[tokio::test]
    async fn current_user_rejects_missing_header() {
        let request = Request::builder().body(()).unwrap();
        let (mut parts, _) = request.into_parts();

        let err = CurrentUser::from_request_parts(&mut parts, &())
            .await
            .unwrap_err();
        assert_eq!(err.0, StatusCode::BAD_REQUEST);
    }
}
