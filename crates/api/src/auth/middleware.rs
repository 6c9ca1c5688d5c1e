//! Authentication middleware

use axum::{
    extract::{Request, State},
    http::header::{AUTHORIZATION, COOKIE},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

use crate::auth::jwt::SessionVerifier;
use crate::error::ApiError;

/// Cookie the identity provider's browser SDK stores the session token in
const SESSION_COOKIE: &str = "sb-access-token";

/// State subset needed to authenticate a request
#[derive(Clone)]
pub struct AuthState {
    verifier: SessionVerifier,
}

impl AuthState {
    pub fn new(secret: &str) -> Self {
        Self {
            verifier: SessionVerifier::new(secret),
        }
    }
}

/// Authenticated user attached to the request by `require_auth`
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub email: Option<String>,
}

/// Pull the session token from the Authorization header or session cookie
fn extract_token(headers: &HeaderMap) -> Option<String> {
    if let Some(value) = headers.get(AUTHORIZATION).and_then(|h| h.to_str().ok()) {
        if let Some(token) = value.strip_prefix("Bearer ") {
            return Some(token.trim().to_string());
        }
    }

    headers
        .get(COOKIE)
        .and_then(|h| h.to_str().ok())
        .and_then(|cookies| {
            cookies.split(';').find_map(|pair| {
                let (name, value) = pair.trim().split_once('=')?;
                (name == SESSION_COOKIE).then(|| value.to_string())
            })
        })
}

/// Require a valid session; attaches [`AuthUser`] as a request extension
pub async fn require_auth(
    State(auth): State<AuthState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_token(request.headers()).ok_or(ApiError::Unauthorized)?;

    let claims = auth.verifier.verify(&token).map_err(|e| {
        tracing::debug!("Session token rejected: {}", e);
        ApiError::Unauthorized
    })?;

    let user_id = Uuid::parse_str(&claims.sub).map_err(|_| ApiError::Unauthorized)?;

    request.extensions_mut().insert(AuthUser {
        user_id,
        email: claims.email,
    });

    Ok(next.run(request).await)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_bearer_token_preferred() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc.def.ghi"));
        headers.insert(
            COOKIE,
            HeaderValue::from_static("sb-access-token=cookie-token"),
        );
        assert_eq!(extract_token(&headers).as_deref(), Some("abc.def.ghi"));
    }

    #[test]
    fn test_session_cookie_fallback() {
        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            HeaderValue::from_static("theme=dark; sb-access-token=cookie-token; lang=ko"),
        );
        assert_eq!(extract_token(&headers).as_deref(), Some("cookie-token"));
    }

    #[test]
    fn test_no_token_is_none() {
        let headers = HeaderMap::new();
        assert!(extract_token(&headers).is_none());

        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_static("theme=dark"));
        assert!(extract_token(&headers).is_none());
    }
}
