//! Authentication for InnerOS API routes
//!
//! Sessions are issued by the external identity provider; this layer only
//! verifies the HS256 session token it hands the browser.

pub mod jwt;
pub mod middleware;

pub use jwt::{SessionClaims, SessionVerifier};
pub use middleware::{require_auth, AuthState, AuthUser};
