// Common DTOs for public API

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Standard error body. Every rejection (`AuthError`) serializes to this shape.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    /// Error message describing what went wrong.
    pub error: String,
}

/// Response wrapper for list endpoints.
/// All list endpoints return responses wrapped in a `data` field.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ListResponse<T> {
    /// Array of items returned by the list operation.
    pub data: Vec<T>,
}

impl<T> ListResponse<T> {
    pub fn new(data: Vec<T>) -> Self {
        Self { data }
    }
}

impl<T> From<Vec<T>> for ListResponse<T> {
    fn from(data: Vec<T>) -> Self {
        Self { data }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::AuthError;

    #[test]
    fn test_auth_error_matches_error_response_shape() {
        let json = serde_json::to_value(AuthError::forbidden("Insufficient role")).unwrap();
        let parsed: ErrorResponse = serde_json::from_value(json).unwrap();
        assert_eq!(parsed.error, "Insufficient role");
    }

    #[test]
    fn test_list_response_wraps_data() {
        let list: ListResponse<u8> = vec![1, 2].into();
        assert_eq!(
            serde_json::to_value(&list).unwrap(),
            serde_json::json!({ "data": [1, 2] })
        );
    }
}
