//! Validated JSON body extraction
//!
//! [`Payload<T>`] deserializes the request body and runs the type's
//! `validator` rules in one step. Both failure modes reject with an
//! [`ApiError`] in the standard envelope, so handlers only ever see a valid
//! value:
//!
//! ```ignore
//! #[derive(Deserialize, Validate)]
//! struct CreateUser {
//!     #[validate(length(min = 1))]
//!     name: String,
//!     #[validate(range(min = 18))]
//!     age: u32,
//! }
//!
//! async fn create(Payload(body): Payload<CreateUser>) -> ApiResponse { ... }
//! ```

use axum::extract::{FromRequest, Request};
use axum::Json;
use serde::de::DeserializeOwned;
use validator::{Validate, ValidationErrors};

use crate::error::{ApiError, FieldError};

/// JSON body extractor with validation
#[derive(Debug, Clone, Copy)]
pub struct Payload<T>(pub T);

impl<S, T> FromRequest<S> for Payload<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Validate,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(ApiError::from_json_rejection)?;
        value.validate().map_err(validation_error)?;
        Ok(Self(value))
    }
}

/// Flatten `validator` output into the field-map error shape.
///
/// Field names come from the serde-renamed wire names, which the derive
/// honors. Fields are sorted for deterministic output.
pub fn validation_error(errors: ValidationErrors) -> ApiError {
    let mut fields: Vec<FieldError> = errors
        .field_errors()
        .iter()
        .filter_map(|(field, errs)| {
            let err = errs.first()?;
            let message = match &err.message {
                Some(message) => message.to_string(),
                None => describe_rule(err),
            };
            Some(FieldError {
                field: field.to_string(),
                message,
            })
        })
        .collect();
    fields.sort_by(|a, b| a.field.cmp(&b.field));
    ApiError::validation(fields)
}

fn describe_rule(err: &validator::ValidationError) -> String {
    let param = err
        .params
        .iter()
        .find(|(key, _)| *key != "value")
        .map(|(key, value)| (key.clone(), value.clone()));
    let value = err.params.get("value");
    match (param, value) {
        (Some((key, param)), Some(value)) => format!(
            "failed validation on tag {} (param: {}: {}, value: {})",
            err.code, key, param, value
        ),
        _ => format!("failed validation on tag {}", err.code),
    }
}
