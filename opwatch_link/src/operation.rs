//! The request half of a link chain.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::document::{self, OperationDefinition, OperationKind};

/// How a client wants an operation answered with respect to its local cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FetchPolicy {
    /// Answer from cache when possible, otherwise go to the network
    CacheFirst,
    /// Answer only from cache, never touch the network
    CacheOnly,
    /// Answer from cache and refresh from the network
    CacheAndNetwork,
    /// Always go to the network, write the result to cache
    NetworkOnly,
    /// Always go to the network, leave the cache alone
    NoCache,
    /// Do not issue the operation until explicitly asked
    Standby,
}

/// Execution context shared between links for a single operation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Context {
    /// The cache policy requested by the caller
    #[serde(default)]
    pub fetch_policy: Option<FetchPolicy>,
    /// Set by a cache link that answered without a network round trip
    #[serde(default)]
    pub from_cache: bool,
    /// Free-form values links attach for each other
    #[serde(default)]
    pub extensions: FxHashMap<String, Value>,
}

/// A single GraphQL query, mutation or subscription request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Operation {
    /// The operation name supplied by the caller, if any
    #[serde(default)]
    pub name: Option<String>,
    /// The GraphQL document text
    pub document: String,
    /// Variables for the operation
    #[serde(default)]
    pub variables: Value,
    /// Execution context
    #[serde(default)]
    pub context: Context,
}

impl Operation {
    /// Create an operation for `document` with no name, variables or context.
    pub fn new(document: impl Into<String>) -> Self {
        Self {
            document: document.into(),
            ..Self::default()
        }
    }

    /// Set the operation name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the operation variables.
    #[must_use]
    pub fn with_variables(mut self, variables: Value) -> Self {
        self.variables = variables;
        self
    }

    /// Set the execution context.
    #[must_use]
    pub fn with_context(mut self, context: Context) -> Self {
        self.context = context;
        self
    }

    /// The definition in the document this operation executes.
    #[must_use]
    pub fn definition(&self) -> Option<OperationDefinition<'_>> {
        document::select(&self.document, self.caller_name())
    }

    /// The kind of the executed definition, [`OperationKind::Query`] when the
    /// document does not say.
    #[must_use]
    pub fn kind(&self) -> OperationKind {
        self.definition().map(|def| def.kind).unwrap_or_default()
    }

    /// The caller supplied name, or the name of the executed definition.
    /// Empty names count as absent.
    #[must_use]
    pub fn resolved_name(&self) -> Option<&str> {
        self.caller_name().or_else(|| {
            self.definition()
                .and_then(|def| def.name)
                .filter(|name| !name.is_empty())
        })
    }

    // Clients send `operationName: ""` for anonymous operations.
    fn caller_name(&self) -> Option<&str> {
        self.name.as_deref().filter(|name| !name.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn kind_and_name_come_from_document() {
        let op = Operation::new("mutation CancelBooking { cancel { id } }");
        assert_eq!(op.kind(), OperationKind::Mutation);
        assert_eq!(op.resolved_name(), Some("CancelBooking"));
    }

    #[test]
    fn caller_name_selects_definition() {
        let op = Operation::new("query List { a } subscription Live { b }").with_name("Live");
        assert_eq!(op.kind(), OperationKind::Subscription);
        assert_eq!(op.resolved_name(), Some("Live"));
    }

    #[test]
    fn empty_caller_name_is_absent() {
        let op = Operation::new("{ me }").with_name("");
        assert_eq!(op.resolved_name(), None);

        let op = Operation::new("query Me { me } mutation Hire { hire }").with_name("");
        assert_eq!(op.kind(), OperationKind::Query);
        assert_eq!(op.resolved_name(), Some("Me"));
    }

    #[test]
    fn unknown_documents_default_to_anonymous_query() {
        let op = Operation::new("not graphql at all");
        assert_eq!(op.kind(), OperationKind::Query);
        assert_eq!(op.resolved_name(), None);
    }

    #[test]
    fn context_deserializes_from_json() {
        let op: Operation = serde_json::from_value(json!({
            "name": "GetMaid",
            "document": "query GetMaid { maid { id } }",
            "variables": { "id": 7 },
            "context": { "fetch_policy": "cache-only", "extensions": { "trace": "abc" } }
        }))
        .unwrap();
        assert_eq!(op.context.fetch_policy, Some(FetchPolicy::CacheOnly));
        assert!(!op.context.from_cache);
        assert_eq!(op.context.extensions.get("trace"), Some(&json!("abc")));
        assert_eq!(op.variables, json!({ "id": 7 }));
    }

    #[test]
    fn builders_set_fields() {
        let context = Context {
            from_cache: true,
            ..Context::default()
        };
        let op = Operation::new("{ me }")
            .with_name("Me")
            .with_variables(json!({ "x": 1 }))
            .with_context(context.clone());
        assert_eq!(op.name.as_deref(), Some("Me"));
        assert_eq!(op.variables, json!({ "x": 1 }));
        assert_eq!(op.context, context);
    }
}
