//! Caller identity from gateway headers
//!
//! Services behind the gateway trust three request headers describing the
//! authenticated caller. [`auth_required`] guards routes that need them;
//! [`Identity`] extracts the parsed values in handlers.

use axum::{
    extract::{FromRequestParts, Request},
    http::{request::Parts, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::error::ApiError;

/// Header carrying the authenticated user id
pub const HEADER_USER_ID: &str = "x-user-id";
/// Header carrying opaque user metadata
pub const HEADER_USER_META: &str = "x-user-meta";
/// Header carrying the tenant id
pub const HEADER_TENANT_ID: &str = "x-tenant-id";

/// Caller identity parsed from gateway headers
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Identity {
    /// Raw user id header value
    pub user_id: String,
    /// Opaque metadata forwarded by the gateway
    pub user_meta: Option<String>,
    /// Tenant id, when the header parses as an integer
    pub tenant_id: Option<u64>,
}

impl Identity {
    /// User id as an integer, zero when it does not parse
    pub fn user_id_u64(&self) -> u64 {
        self.user_id.parse().unwrap_or(0)
    }

    /// Tenant id, zero when absent
    pub fn tenant_id_u64(&self) -> u64 {
        self.tenant_id.unwrap_or(0)
    }

    fn from_headers(headers: &HeaderMap) -> Option<Self> {
        let user_id = headers.get(HEADER_USER_ID)?.to_str().ok()?.trim();
        if user_id.is_empty() {
            return None;
        }
        let user_meta = headers
            .get(HEADER_USER_META)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let tenant_id = headers
            .get(HEADER_TENANT_ID)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse().ok());
        Some(Self {
            user_id: user_id.to_string(),
            user_meta,
            tenant_id,
        })
    }
}

impl<S> FromRequestParts<S> for Identity
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Identity>()
            .cloned()
            .or_else(|| Identity::from_headers(&parts.headers))
            .ok_or_else(|| ApiError::new(401, "unauthorized"))
    }
}

/// Middleware rejecting requests without a user id header.
///
/// On success the parsed [`Identity`] is stored in request extensions so the
/// extractor does not re-parse the headers.
pub async fn auth_required(mut req: Request, next: Next) -> Response {
    match Identity::from_headers(req.headers()) {
        Some(identity) => {
            req.extensions_mut().insert(identity);
            next.run(req).await
        }
        None => ApiError::new(401, "unauthorized").into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(pairs: &[(&str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(
                axum::http::HeaderName::try_from(*name).unwrap(),
                HeaderValue::from_str(value).unwrap(),
            );
        }
        map
    }

    #[test]
    fn test_full_identity() {
        let identity = Identity::from_headers(&headers(&[
            (HEADER_USER_ID, "42"),
            (HEADER_USER_META, "role=admin"),
            (HEADER_TENANT_ID, "7"),
        ]))
        .unwrap();
        assert_eq!(identity.user_id_u64(), 42);
        assert_eq!(identity.user_meta.as_deref(), Some("role=admin"));
        assert_eq!(identity.tenant_id_u64(), 7);
    }

    #[test]
    fn test_missing_user_id_is_rejected() {
        assert!(Identity::from_headers(&headers(&[(HEADER_TENANT_ID, "7")])).is_none());
        assert!(Identity::from_headers(&headers(&[(HEADER_USER_ID, "  ")])).is_none());
    }

    #[test]
    fn test_non_numeric_ids_default_to_zero() {
        let identity = Identity::from_headers(&headers(&[
            (HEADER_USER_ID, "svc-account"),
            (HEADER_TENANT_ID, "not-a-number"),
        ]))
        .unwrap();
        assert_eq!(identity.user_id, "svc-account");
        assert_eq!(identity.user_id_u64(), 0);
        assert_eq!(identity.tenant_id, None);
        assert_eq!(identity.tenant_id_u64(), 0);
    }
}
