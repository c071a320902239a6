//! Shared validation helpers for inbound HTTP adapters.

use serde_json::json;

use crate::domain::Error;

use super::error::ApiError;

/// Build a 422 validation failure attributed to one request field.
pub(crate) fn field_error(field: &'static str, message: impl Into<String>) -> ApiError {
    ApiError::from(Error::validation_failed(message).with_details(json!({ "field": field })))
}

#[cfg(test)]
mod tests {
    use serde_json::Value;

    use crate::domain::ErrorCode;

    use super::*;

    #[test]
    fn field_errors_carry_the_field_in_details() {
        let err = field_error("email", "email must be valid");
        assert_eq!(err.inner().code(), ErrorCode::ValidationFailed);
        assert_eq!(
            err.inner()
                .details()
                .and_then(|d| d.get("field"))
                .and_then(Value::as_str),
            Some("email")
        );
    }
}
