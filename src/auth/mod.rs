//! Shared-secret gate for the visit log

use axum::{
    extract::{rejection::QueryRejection, Query, Request, State},
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use std::sync::Arc;
use subtle::ConstantTimeEq;
use tracing::warn;

use crate::api::handlers::ErrorResponse;

pub const ADMIN_KEY_HEADER: &str = "x-admin-key";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyCheck {
    Valid,
    Missing,
    Invalid,
}

pub struct AuthService {
    admin_key: Option<String>,
}

impl AuthService {
    pub fn new(admin_key: Option<String>) -> Self {
        Self {
            admin_key: admin_key.filter(|k| !k.is_empty()),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.admin_key.is_some()
    }

    /// Exact comparison against the configured key. With no key configured
    /// every non-empty key is invalid.
    pub fn check(&self, provided: Option<&str>) -> KeyCheck {
        let provided = match provided {
            Some(key) if !key.is_empty() => key,
            _ => return KeyCheck::Missing,
        };

        match self.admin_key {
            Some(ref expected) if bool::from(expected.as_bytes().ct_eq(provided.as_bytes())) => {
                KeyCheck::Valid
            }
            _ => KeyCheck::Invalid,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct AdminKeyQuery {
    pub key: Option<String>,
}

fn header_key(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(ADMIN_KEY_HEADER)
        .and_then(|h| h.to_str().ok())
        .filter(|k| !k.is_empty())
}

/// Admin key from the `x-admin-key` header, else the `key` query parameter
pub fn provided_key<'a>(headers: &'a HeaderMap, query: &'a AdminKeyQuery) -> Option<&'a str> {
    header_key(headers).or(query.key.as_deref())
}

pub async fn admin_key_middleware(
    State(auth_service): State<Arc<AuthService>>,
    headers: HeaderMap,
    query: Result<Query<AdminKeyQuery>, QueryRejection>,
    request: Request,
    next: Next,
) -> Response {
    let check = match query {
        Ok(Query(query)) => auth_service.check(provided_key(&headers, &query)),
        // A query we cannot read (e.g. a repeated `key`) never carries a usable key
        Err(rejection) => match header_key(&headers) {
            Some(key) => auth_service.check(Some(key)),
            None => {
                warn!(error = %rejection, "Unreadable admin key query");
                KeyCheck::Invalid
            }
        },
    };

    match check {
        KeyCheck::Valid => next.run(request).await,
        KeyCheck::Missing => {
            warn!(path = %request.uri().path(), "Rejected log access without admin key");
            (
                StatusCode::UNAUTHORIZED,
                Json(ErrorResponse {
                    error: "Missing admin key".to_string(),
                }),
            )
                .into_response()
        }
        KeyCheck::Invalid => {
            warn!(path = %request.uri().path(), "Rejected log access with invalid admin key");
            (
                StatusCode::FORBIDDEN,
                Json(ErrorResponse {
                    error: "Forbidden".to_string(),
                }),
            )
                .into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_check_exact_match() {
        let auth = AuthService::new(Some("s3cret".to_string()));
        assert_eq!(auth.check(Some("s3cret")), KeyCheck::Valid);
        assert_eq!(auth.check(Some("s3cret ")), KeyCheck::Invalid);
        assert_eq!(auth.check(Some("S3CRET")), KeyCheck::Invalid);
        assert_eq!(auth.check(Some("s3")), KeyCheck::Invalid);
    }

    #[test]
    fn test_check_missing_or_empty() {
        let auth = AuthService::new(Some("s3cret".to_string()));
        assert_eq!(auth.check(None), KeyCheck::Missing);
        assert_eq!(auth.check(Some("")), KeyCheck::Missing);
    }

    #[test]
    fn test_unconfigured_rejects_everything() {
        let auth = AuthService::new(Some(String::new()));
        assert!(!auth.is_configured());
        assert_eq!(auth.check(Some("anything")), KeyCheck::Invalid);
        assert_eq!(auth.check(None), KeyCheck::Missing);
    }

    #[test]
    fn test_header_preferred_over_query() {
        let mut headers = HeaderMap::new();
        headers.insert(ADMIN_KEY_HEADER, HeaderValue::from_static("from-header"));
        let query = AdminKeyQuery {
            key: Some("from-query".to_string()),
        };
        assert_eq!(provided_key(&headers, &query), Some("from-header"));
    }

    #[test]
    fn test_query_used_without_header() {
        let headers = HeaderMap::new();
        let query = AdminKeyQuery {
            key: Some("from-query".to_string()),
        };
        assert_eq!(provided_key(&headers, &query), Some("from-query"));
        assert_eq!(provided_key(&headers, &AdminKeyQuery::default()), None);
    }
}
