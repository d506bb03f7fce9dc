//! Panic and error recovery
//!
//! Two cooperating layers guarantee that no request escapes without a
//! well-formed envelope:
//!
//! - [`catch_panic_layer`] sits outermost, classifies panic payloads into
//!   [`ApiError`]s and renders them. A panic always wins over anything a
//!   handler produced, because the unwind discards the handler's response.
//! - [`error_envelope`] seeds every request with an [`ErrorStack`] extension.
//!   Handlers and inner middleware push errors onto it; after the handler
//!   returns, the most recent pushed error replaces the response and the
//!   rest are logged at debug level.

use axum::{
    extract::{FromRequestParts, Request},
    http::request::Parts,
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::any::Any;
use std::convert::Infallible;
use std::sync::{Arc, Mutex};
use tower_http::catch_panic::{CatchPanicLayer, ResponseForPanic};

use crate::error::ApiError;

/// Per-request error accumulator, shared through request extensions.
///
/// Cloning is cheap; all clones push into the same stack. Extract it in a
/// handler to report an error without choosing a response shape:
///
/// ```ignore
/// async fn handler(errors: ErrorStack) -> ApiResponse {
///     errors.push(ApiError::new(404, "no such thing"));
///     ApiResponse::new(StatusCode::OK)
/// }
/// ```
#[derive(Debug, Clone, Default)]
pub struct ErrorStack {
    inner: Arc<Mutex<Vec<ApiError>>>,
}

impl ErrorStack {
    /// Record an error against the current request
    pub fn push(&self, err: ApiError) {
        if let Ok(mut stack) = self.inner.lock() {
            stack.push(err);
        }
    }

    /// True when nothing has been pushed
    pub fn is_empty(&self) -> bool {
        self.inner.lock().map(|stack| stack.is_empty()).unwrap_or(true)
    }

    /// Drain all recorded errors in push order
    pub fn take(&self) -> Vec<ApiError> {
        self.inner
            .lock()
            .map(|mut stack| std::mem::take(&mut *stack))
            .unwrap_or_default()
    }
}

impl<S> FromRequestParts<S> for ErrorStack
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> Result<Self, Self::Rejection> {
        // falls back to a detached stack if the middleware is not installed
        Ok(parts.extensions.get::<ErrorStack>().cloned().unwrap_or_default())
    }
}

/// Logs any errors still on the stack when a panic unwinds past the
/// envelope middleware, so the accumulated chain is not lost silently
struct DrainOnPanic(ErrorStack);

impl Drop for DrainOnPanic {
    fn drop(&mut self) {
        if std::thread::panicking() {
            for err in self.0.take() {
                tracing::debug!(error = %err, "request error superseded by panic");
            }
        }
    }
}

/// Middleware that installs the [`ErrorStack`] and rewrites the response
/// when errors were recorded
pub async fn error_envelope(mut req: Request, next: Next) -> Response {
    let stack = ErrorStack::default();
    req.extensions_mut().insert(stack.clone());
    let _guard = DrainOnPanic(stack.clone());

    let response = next.run(req).await;

    let mut errors = stack.take();
    let Some(canonical) = errors.pop() else {
        return response;
    };
    for err in &errors {
        tracing::debug!(error = %err, "superseded request error");
    }
    tracing::debug!(
        status = canonical.status().as_u16(),
        error = %canonical,
        "responding with recorded error"
    );
    canonical.into_response()
}

/// Panic classifier plugged into `CatchPanicLayer`
#[derive(Debug, Clone, Copy, Default)]
pub struct PanicEnvelope;

impl ResponseForPanic for PanicEnvelope {
    type ResponseBody = axum::body::Body;

    fn response_for_panic(
        &mut self,
        err: Box<dyn Any + Send + 'static>,
    ) -> http::Response<Self::ResponseBody> {
        let err = classify_panic(err);
        tracing::warn!(status = err.status().as_u16(), error = %err, "recovered panic");
        err.into_response()
    }
}

/// Outermost recovery layer converting panics into error envelopes
pub fn catch_panic_layer() -> CatchPanicLayer<PanicEnvelope> {
    CatchPanicLayer::custom(PanicEnvelope)
}

fn classify_panic(err: Box<dyn Any + Send>) -> ApiError {
    // a deliberately panicked ApiError keeps its status and message
    let err = match err.downcast::<ApiError>() {
        Ok(api_err) => return *api_err,
        Err(err) => err,
    };
    let err = match err.downcast::<String>() {
        Ok(message) => return ApiError::unexpected(format!("unexpected error: {message}")),
        Err(err) => err,
    };
    match err.downcast::<&'static str>() {
        Ok(message) => ApiError::unexpected(format!("unexpected error: {message}")),
        Err(_) => ApiError::unexpected("unexpected error: unhandled panic"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[test]
    fn test_classify_str_panic() {
        let err = classify_panic(Box::new("boom"));
        assert_eq!(err, ApiError::unexpected("unexpected error: boom"));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_classify_string_panic() {
        let err = classify_panic(Box::new("boom".to_string()));
        assert_eq!(err, ApiError::unexpected("unexpected error: boom"));
    }

    #[test]
    fn test_classify_api_error_panic_keeps_status() {
        let err = classify_panic(Box::new(ApiError::new(400, "bad input")));
        assert_eq!(err, ApiError::new(400, "bad input"));
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_classify_opaque_panic() {
        let err = classify_panic(Box::new(42_u64));
        assert_eq!(err, ApiError::unexpected("unexpected error: unhandled panic"));
    }

    #[test]
    fn test_stack_last_write_wins() {
        let stack = ErrorStack::default();
        stack.push(ApiError::new(404, "first"));
        stack.push(ApiError::new(409, "second"));

        let mut errors = stack.take();
        assert_eq!(errors.pop(), Some(ApiError::new(409, "second")));
        assert_eq!(errors.pop(), Some(ApiError::new(404, "first")));
        assert!(stack.is_empty());
    }

    #[test]
    fn test_stack_drained_when_unwinding() {
        let stack = ErrorStack::default();
        stack.push(ApiError::new(404, "pending"));

        let result = std::panic::catch_unwind({
            let stack = stack.clone();
            move || {
                let _guard = DrainOnPanic(stack);
                panic!("boom");
            }
        });
        assert!(result.is_err());
        // the guard consumed the stacked errors during the unwind
        assert!(stack.is_empty());
    }

    #[test]
    fn test_clones_share_one_stack() {
        let stack = ErrorStack::default();
        let clone = stack.clone();
        clone.push(ApiError::new(400, "via clone"));
        assert!(!stack.is_empty());
    }
}
