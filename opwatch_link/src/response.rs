//! The result half of a link chain.
//!
//! A [`Response`] mirrors the GraphQL response format: optional `data`, an
//! `errors` list that is empty on success, and optional `extensions`.
//!
//! <https://spec.graphql.org/October2021/#sec-Response-Format>

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// An error reported by the GraphQL server inside a response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphQLError {
    /// Human readable description
    pub message: String,
    /// Path to the response field the error belongs to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<Vec<Value>>,
    /// Server specific error details
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<Value>,
}

impl GraphQLError {
    /// Create an error carrying only `message`.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            path: None,
            extensions: None,
        }
    }
}

/// A single result delivered for an operation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Response {
    /// The requested data
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    /// Errors raised while executing the operation
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<GraphQLError>,
    /// Server specific response details
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<Value>,
}

impl Response {
    /// A successful response carrying `data`.
    #[must_use]
    pub fn with_data(data: Value) -> Self {
        Self {
            data: Some(data),
            ..Self::default()
        }
    }

    /// Append `error` to this response.
    #[must_use]
    pub fn with_error(mut self, error: GraphQLError) -> Self {
        self.errors.push(error);
        self
    }

    /// Whether the server reported at least one error.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// The first reported error, the one a summary should quote.
    #[must_use]
    pub fn first_error(&self) -> Option<&GraphQLError> {
        self.errors.first()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_server_response() {
        let response: Response = serde_json::from_value(json!({
            "data": { "booking": null },
            "errors": [
                { "message": "booking not found", "path": ["booking"] },
                { "message": "second" }
            ]
        }))
        .unwrap();
        assert!(response.has_errors());
        assert_eq!(
            response.first_error().map(|e| e.message.as_str()),
            Some("booking not found")
        );
        assert_eq!(response.errors[0].path, Some(vec![json!("booking")]));
    }

    #[test]
    fn successful_response_omits_errors_when_serialized() {
        let response = Response::with_data(json!({ "ok": true }));
        assert!(!response.has_errors());
        assert_eq!(
            serde_json::to_value(&response).unwrap(),
            json!({ "data": { "ok": true } })
        );
    }

    #[test]
    fn with_error_appends_in_order() {
        let response = Response::default()
            .with_error(GraphQLError::new("first"))
            .with_error(GraphQLError::new("second"));
        assert_eq!(response.errors.len(), 2);
        assert_eq!(response.first_error(), Some(&GraphQLError::new("first")));
    }
}
