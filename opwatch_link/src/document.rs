//! Lightweight scanning of GraphQL documents.
//!
//! Links need two facts from a document: the kind of each executable
//! operation and its name. Full parsing and validation belong to the server,
//! so this module only tokenizes enough of the GraphQL grammar to find
//! top-level definitions. Strings, block strings and comments are skipped so
//! that keywords inside them are never mistaken for definitions, and nesting
//! depth is tracked so that only definitions at the document root count.
//! Fragment definitions are recognized and ignored.
//!
//! <https://spec.graphql.org/October2021/#sec-Document>

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

/// The root kind of a GraphQL operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    /// A read, the default when a document does not say otherwise
    #[default]
    Query,
    /// A write
    Mutation,
    /// A long-lived stream of results
    Subscription,
}

impl OperationKind {
    /// The keyword introducing this kind of operation in a document.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Query => "query",
            Self::Mutation => "mutation",
            Self::Subscription => "subscription",
        }
    }

    /// Whether operations of this kind deliver a single result.
    #[must_use]
    pub const fn is_single_result(self) -> bool {
        matches!(self, Self::Query | Self::Mutation)
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a string is not an operation keyword.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown operation kind: {0}")]
pub struct UnknownKind(String);

impl FromStr for OperationKind {
    type Err = UnknownKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "query" => Ok(Self::Query),
            "mutation" => Ok(Self::Mutation),
            "subscription" => Ok(Self::Subscription),
            _ => Err(UnknownKind(s.to_string())),
        }
    }
}

/// An executable operation found at the root of a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OperationDefinition<'a> {
    /// The operation kind
    pub kind: OperationKind,
    /// The operation name, absent for anonymous operations
    pub name: Option<&'a str>,
}

/// Scan `document` and return every operation definition at its root, in
/// document order.
///
/// The scanner is tolerant: malformed input yields whatever definitions could
/// be recognized rather than an error.
#[must_use]
pub fn operations(document: &str) -> Vec<OperationDefinition<'_>> {
    Scanner::new(document).run()
}

/// Select the operation a request executes.
///
/// With a `name`, the definition carrying that name is chosen. Without one,
/// the first definition is chosen, which is the only legal choice for
/// single-operation documents.
#[must_use]
pub fn select<'a>(document: &'a str, name: Option<&str>) -> Option<OperationDefinition<'a>> {
    let definitions = operations(document);
    match name {
        Some(name) => definitions
            .iter()
            .find(|def| def.name == Some(name))
            .or_else(|| definitions.first())
            .copied(),
        None => definitions.first().copied(),
    }
}

/// What the scanner expects after a root-level keyword.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pending {
    None,
    Operation(OperationKind),
    Fragment,
}

struct Scanner<'a> {
    source: &'a str,
    bytes: &'a [u8],
    pos: usize,
    /// Brace nesting, selection sets and object values.
    depth: usize,
    /// Parenthesis and bracket nesting, variable definitions and list values.
    parens: usize,
    pending: Pending,
    pending_name: Option<&'a str>,
    /// The next root-level name token names the pending operation.
    expect_name: bool,
    found: Vec<OperationDefinition<'a>>,
}

impl<'a> Scanner<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            source,
            bytes: source.as_bytes(),
            pos: 0,
            depth: 0,
            parens: 0,
            pending: Pending::None,
            pending_name: None,
            expect_name: false,
            found: Vec::new(),
        }
    }

    fn at_root(&self) -> bool {
        self.depth == 0 && self.parens == 0
    }

    fn run(mut self) -> Vec<OperationDefinition<'a>> {
        while let Some(&byte) = self.bytes.get(self.pos) {
            match byte {
                b'#' => self.skip_comment(),
                b'"' => {
                    self.expect_name = false;
                    self.skip_string();
                }
                b'{' => {
                    self.open_brace();
                    self.pos += 1;
                }
                b'}' => {
                    self.depth = self.depth.saturating_sub(1);
                    self.pos += 1;
                }
                b'(' | b'[' => {
                    self.expect_name = false;
                    self.parens += 1;
                    self.pos += 1;
                }
                b')' | b']' => {
                    self.parens = self.parens.saturating_sub(1);
                    self.pos += 1;
                }
                b if b.is_ascii_alphabetic() || b == b'_' => self.name(),
                b' ' | b'\t' | b'\n' | b'\r' | b',' => self.pos += 1,
                _ => {
                    self.expect_name = false;
                    self.pos += 1;
                }
            }
        }
        self.found
    }

    fn open_brace(&mut self) {
        if self.at_root() {
            match self.pending {
                // `{ ... }` with no keyword is the query shorthand.
                Pending::None => self.found.push(OperationDefinition {
                    kind: OperationKind::Query,
                    name: None,
                }),
                Pending::Operation(kind) => self.found.push(OperationDefinition {
                    kind,
                    name: self.pending_name,
                }),
                Pending::Fragment => {}
            }
            self.pending = Pending::None;
            self.pending_name = None;
        }
        self.expect_name = false;
        self.depth += 1;
    }

    fn name(&mut self) {
        let start = self.pos;
        while self
            .bytes
            .get(self.pos)
            .is_some_and(|b| b.is_ascii_alphanumeric() || *b == b'_')
        {
            self.pos += 1;
        }
        if !self.at_root() {
            return;
        }

        let token = &self.source[start..self.pos];
        if self.expect_name {
            self.expect_name = false;
            self.pending_name = Some(token);
            return;
        }
        if self.pending != Pending::None {
            // Directives and type conditions between the header and the
            // selection set.
            return;
        }
        match token {
            "fragment" => self.pending = Pending::Fragment,
            keyword => {
                if let Ok(kind) = keyword.parse::<OperationKind>() {
                    self.pending = Pending::Operation(kind);
                    self.expect_name = true;
                }
            }
        }
    }

    fn skip_comment(&mut self) {
        while let Some(&byte) = self.bytes.get(self.pos) {
            if byte == b'\n' || byte == b'\r' {
                break;
            }
            self.pos += 1;
        }
    }

    fn skip_string(&mut self) {
        if self.bytes[self.pos..].starts_with(b"\"\"\"") {
            self.pos += 3;
            while self.pos < self.bytes.len() {
                if self.bytes[self.pos..].starts_with(b"\\\"\"\"") {
                    self.pos += 4;
                } else if self.bytes[self.pos..].starts_with(b"\"\"\"") {
                    self.pos += 3;
                    return;
                } else {
                    self.pos += 1;
                }
            }
            return;
        }

        self.pos += 1;
        while let Some(&byte) = self.bytes.get(self.pos) {
            match byte {
                b'\\' => self.pos += 2,
                b'"' => {
                    self.pos += 1;
                    return;
                }
                // Unterminated string, resume scanning on the next line.
                b'\n' | b'\r' => return,
                _ => self.pos += 1,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn def(kind: OperationKind, name: Option<&str>) -> OperationDefinition<'_> {
        OperationDefinition { kind, name }
    }

    #[test]
    fn shorthand_is_anonymous_query() {
        assert_eq!(
            operations("{ me { id } }"),
            vec![def(OperationKind::Query, None)]
        );
    }

    #[test]
    fn named_operations_of_every_kind() {
        let doc = r"
            query GetUser($id: ID!) { user(id: $id) { id name } }
            mutation UpdateBooking($input: BookingInput = {status: CONFIRMED}) {
                updateBooking(input: $input) { id }
            }
            subscription OnMessage { messageAdded { id body } }
        ";
        assert_eq!(
            operations(doc),
            vec![
                def(OperationKind::Query, Some("GetUser")),
                def(OperationKind::Mutation, Some("UpdateBooking")),
                def(OperationKind::Subscription, Some("OnMessage")),
            ]
        );
    }

    #[test]
    fn anonymous_keyword_operation() {
        assert_eq!(
            operations("mutation { logout }"),
            vec![def(OperationKind::Mutation, None)]
        );
    }

    #[test]
    fn directives_do_not_rename_operation() {
        assert_eq!(
            operations("query Feed @cached(ttl: 30) { feed { id } }"),
            vec![def(OperationKind::Query, Some("Feed"))]
        );
        assert_eq!(
            operations("subscription @live { ticks }"),
            vec![def(OperationKind::Subscription, None)]
        );
    }

    #[test]
    fn fragments_are_ignored() {
        let doc = r"
            fragment MaidFields on Maid { id nationality }
            mutation HireMaid { hire { ...MaidFields } }
        ";
        assert_eq!(
            operations(doc),
            vec![def(OperationKind::Mutation, Some("HireMaid"))]
        );
    }

    #[test]
    fn keywords_inside_comments_and_strings_are_ignored() {
        let doc = r#"
            # mutation Hidden { nope }
            """
            subscription AlsoHidden { nope } and an escaped \""" quote
            """
            query Visible($note: String = "mutation { x }") { search(q: "{") { id } }
        "#;
        assert_eq!(
            operations(doc),
            vec![def(OperationKind::Query, Some("Visible"))]
        );
    }

    #[test]
    fn nested_keywords_are_fields_not_definitions() {
        assert_eq!(
            operations("query Q { mutation subscription query { fragment } }"),
            vec![def(OperationKind::Query, Some("Q"))]
        );
    }

    #[test]
    fn empty_or_garbage_yields_nothing() {
        assert!(operations("").is_empty());
        assert!(operations("   # only a comment").is_empty());
        assert!(operations("\"unterminated").is_empty());
        assert!(operations("fragment F on T { id }").is_empty());
    }

    #[test]
    fn select_by_name_or_first() {
        let doc = "query A { a } mutation B { b }";
        assert_eq!(
            select(doc, Some("B")),
            Some(def(OperationKind::Mutation, Some("B")))
        );
        assert_eq!(select(doc, None), Some(def(OperationKind::Query, Some("A"))));
        assert_eq!(
            select(doc, Some("Missing")),
            Some(def(OperationKind::Query, Some("A")))
        );
        assert_eq!(select("", Some("A")), None);
    }

    #[test]
    fn kind_round_trips_through_text() {
        for kind in [
            OperationKind::Query,
            OperationKind::Mutation,
            OperationKind::Subscription,
        ] {
            assert_eq!(kind.as_str().parse::<OperationKind>(), Ok(kind));
        }
        assert!("fragment".parse::<OperationKind>().is_err());
    }

    proptest! {
        #[test]
        fn scanner_never_panics(document in ".{0,256}") {
            let _ = operations(&document);
        }

        #[test]
        fn scanner_never_panics_on_graphql_punctuation(document in "[{}()\\[\\]\"#\\\\a-z \n]{0,128}") {
            let _ = operations(&document);
        }
    }
}
