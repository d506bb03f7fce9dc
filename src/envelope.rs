//! Standard response envelope
//!
//! Every JSON response produced by the scaffold shares one shape:
//!
//! ```json
//! {"data": ..., "meta": {...}, "error": {...}}
//! ```
//!
//! Absent sections are omitted entirely rather than serialized as null, and
//! an envelope with no populated section renders as a bare status with no
//! body at all.

use axum::{
    http::{HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ApiError;
use crate::pager::Pager;

/// Metadata section of the envelope, a free-form JSON object
pub type BodyMeta = serde_json::Map<String, Value>;

/// Wire shape of the response envelope
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Body {
    /// Response payload
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,

    /// Pagination and other response metadata
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<BodyMeta>,

    /// Error object, mutually exclusive with `data` in practice
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<Value>,
}

impl Body {
    /// Envelope carrying only an error object
    pub fn error(error: Value) -> Self {
        Self {
            error: Some(error),
            ..Self::default()
        }
    }

    /// True when no section is populated
    pub fn is_empty(&self) -> bool {
        self.data.is_none() && self.meta.is_none() && self.error.is_none()
    }
}

/// A buffered response: status code, extra headers, and the envelope body.
///
/// Handlers build one of these and return it; the `IntoResponse` impl takes
/// care of serialization and of suppressing the body when nothing was set.
#[derive(Debug, Default)]
pub struct ApiResponse {
    /// HTTP status code
    pub status: StatusCode,
    /// Headers to merge into the response
    pub headers: HeaderMap,
    /// Envelope body
    pub body: Body,
}

impl ApiResponse {
    /// Empty response with the given status
    #[must_use]
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            ..Self::default()
        }
    }

    /// Response with a data payload.
    ///
    /// A payload that fails to serialize degrades to a 500 envelope rather
    /// than panicking.
    #[must_use]
    pub fn with_data(status: StatusCode, data: impl Serialize) -> Self {
        match serde_json::to_value(data) {
            Ok(value) => Self {
                status,
                headers: HeaderMap::new(),
                body: Body {
                    data: Some(value),
                    ..Body::default()
                },
            },
            Err(err) => {
                tracing::error!(error = %err, "failed to serialize response payload");
                Self::error(&ApiError::unexpected("unexpected error: serialization failed"))
            }
        }
    }

    /// Response with a data payload and pagination metadata derived from the
    /// pager's state after a query has populated its row count
    #[must_use]
    pub fn paginated(status: StatusCode, data: impl Serialize, pager: &Pager) -> Self {
        let mut response = Self::with_data(status, data);
        if response.body.error.is_none() {
            response.body.meta = Some(pager.meta());
        }
        response
    }

    /// Error response in the standard envelope
    #[must_use]
    pub fn error(err: &ApiError) -> Self {
        let error = serde_json::to_value(err)
            .unwrap_or_else(|_| serde_json::json!({"detail": "internal server error"}));
        Self {
            status: err.status(),
            headers: HeaderMap::new(),
            body: Body::error(error),
        }
    }

    /// Attach a response header, silently dropping invalid names or values
    #[must_use]
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        if let (Ok(name), Ok(value)) = (
            HeaderName::try_from(name),
            HeaderValue::try_from(value),
        ) {
            self.headers.insert(name, value);
        }
        self
    }
}

impl IntoResponse for ApiResponse {
    fn into_response(self) -> Response {
        let mut response = if self.body.is_empty() {
            self.status.into_response()
        } else {
            (self.status, Json(self.body)).into_response()
        };
        for (name, value) in self.headers.iter() {
            response.headers_mut().insert(name.clone(), value.clone());
        }
        response
    }
}
