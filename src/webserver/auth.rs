/// Upgrade request authentication
///
/// Token verification happens upstream; the gateway forwards the verified
/// user id in a header. The [`Authenticator`] seam lets the route stay
/// unaware of how identities are established.
use axum::http::{HeaderMap, HeaderName};
use thiserror::Error;

use crate::errors::HubError;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum AuthError {
    #[error("missing {0} header")]
    Missing(String),

    #[error("invalid user id: {0}")]
    Invalid(String),
}

pub trait Authenticator: Send + Sync + 'static {
    /// Resolve the user behind an upgrade request
    fn authenticate(&self, headers: &HeaderMap) -> Result<i64, AuthError>;
}

/// Trusts a user id header set by the auth gateway
#[derive(Debug, Clone)]
pub struct HeaderAuthenticator {
    header: HeaderName,
}

impl HeaderAuthenticator {
    pub fn new(header: &str) -> Result<Self, HubError> {
        let header = HeaderName::from_bytes(header.to_ascii_lowercase().as_bytes())
            .map_err(|e| HubError::Config(format!("Invalid user id header '{}': {}", header, e)))?;
        Ok(Self { header })
    }
}

impl Authenticator for HeaderAuthenticator {
    fn authenticate(&self, headers: &HeaderMap) -> Result<i64, AuthError> {
        let value = headers
            .get(&self.header)
            .ok_or_else(|| AuthError::Missing(self.header.to_string()))?;
        let text = value
            .to_str()
            .map_err(|_| AuthError::Invalid("not visible ASCII".to_string()))?;
        text.trim()
            .parse::<i64>()
            .map_err(|_| AuthError::Invalid(text.to_string()))
    }
}

/// Origin allow-list check; an empty list or a request without `Origin`
/// is accepted
pub fn origin_allowed(allowed: &[String], headers: &HeaderMap) -> bool {
    if allowed.is_empty() {
        return true;
    }
    match headers.get(axum::http::header::ORIGIN) {
        None => true,
        Some(origin) => origin
            .to_str()
            .map(|origin| allowed.iter().any(|a| a == "*" || a.eq_ignore_ascii_case(origin)))
            .unwrap_or(false),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_static(*value));
        }
        map
    }

    #[test]
    fn test_header_authenticator() {
        let auth = HeaderAuthenticator::new("X-User-Id").unwrap();
        assert_eq!(auth.authenticate(&headers(&[("x-user-id", " 42 ")])), Ok(42));
        assert_eq!(
            auth.authenticate(&headers(&[])),
            Err(AuthError::Missing("x-user-id".to_string()))
        );
        assert!(matches!(
            auth.authenticate(&headers(&[("x-user-id", "admin")])),
            Err(AuthError::Invalid(_))
        ));
    }

    #[test]
    fn test_invalid_header_name_is_config_error() {
        assert!(matches!(
            HeaderAuthenticator::new("bad header"),
            Err(HubError::Config(_))
        ));
    }

    #[test]
    fn test_origin_allow_list() {
        let allowed = vec!["https://vault.example".to_string()];
        assert!(origin_allowed(&[], &headers(&[("origin", "https://evil.example")])));
        assert!(origin_allowed(&allowed, &headers(&[])));
        assert!(origin_allowed(&allowed, &headers(&[("origin", "https://vault.example")])));
        assert!(!origin_allowed(&allowed, &headers(&[("origin", "https://evil.example")])));
    }
}
