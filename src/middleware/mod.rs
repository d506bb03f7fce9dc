//! Request middleware
//!
//! The lifecycle manager assembles these into a fixed chain; they are also
//! exported individually for services that build their own routers.

mod access_log;
mod identity;
mod recovery;

pub use access_log::access_log;
pub use identity::{
    auth_required, Identity, HEADER_TENANT_ID, HEADER_USER_ID, HEADER_USER_META,
};
pub use recovery::{catch_panic_layer, error_envelope, ErrorStack, PanicEnvelope};

use axum::http::{header, HeaderName, HeaderValue};
use tower_http::request_id::{
    MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer,
};
use tower_http::sensitive_headers::SetSensitiveRequestHeadersLayer;
use uuid::Uuid;

/// Headers redacted from traces and logs
pub const SENSITIVE_HEADERS: [HeaderName; 3] =
    [header::AUTHORIZATION, header::COOKIE, header::SET_COOKIE];

/// Generates a v4 UUID for requests arriving without an `x-request-id`
#[derive(Debug, Clone, Copy, Default)]
pub struct MakeUuidRequestId;

impl MakeRequestId for MakeUuidRequestId {
    fn make_request_id<B>(&mut self, _request: &http::Request<B>) -> Option<RequestId> {
        let id = Uuid::new_v4().to_string();
        HeaderValue::from_str(&id).ok().map(RequestId::new)
    }
}

/// Layer assigning an `x-request-id` to requests missing one
pub fn request_id_layer() -> SetRequestIdLayer<MakeUuidRequestId> {
    SetRequestIdLayer::x_request_id(MakeUuidRequestId)
}

/// Layer copying the request id onto the response
pub fn request_id_propagation_layer() -> PropagateRequestIdLayer {
    PropagateRequestIdLayer::x_request_id()
}

/// Layer marking credential headers as sensitive
pub fn sensitive_headers_layer() -> SetSensitiveRequestHeadersLayer {
    SetSensitiveRequestHeadersLayer::new(SENSITIVE_HEADERS)
}
