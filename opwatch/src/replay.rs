//! Scripted replay of GraphQL traffic through a [`Monitor`].
//!
//! A replay script describes operations and how a pretend server answers them:
//! after what latency, with how many results, and whether the answer carries a
//! GraphQL error or fails in transport. [`run`] issues every scripted operation
//! concurrently through a [`MonitorLink`] wrapping a [`ScriptedLink`], so the
//! monitor observes the traffic exactly as it would observe a real transport.
//!
//! ```yaml
//! operations:
//!   - name: GetUser
//!     document: "query GetUser { user { id } }"
//!     latency_ms: 50
//!     repeat: 10
//!   - document: "mutation Hire { hire { id } }"
//!     latency_ms: 1200
//!     outcome:
//!       graphql_error:
//!         message: "maid unavailable"
//!   - document: "subscription Chat { message { body } }"
//!     latency_ms: 100
//!     results: 5
//! ```

use std::{
    fs,
    io,
    num::NonZeroU32,
    path::{Path, PathBuf},
    str::FromStr,
    sync::Arc,
    time::Duration,
};

use futures::{StreamExt, future::join_all, stream};
use opwatch_link::{
    Context, Error as LinkError, FetchPolicy, GraphQLError, Link, Operation, OperationStream,
    Response,
};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, info};

use crate::monitor::{Monitor, MonitorLink};

/// Context extension carrying the index of the scripted entry an operation
/// was issued from.
pub const REPLAY_INDEX: &str = "opwatch.replay_index";

/// Errors produced by [`Script`]
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Error for a serde [`serde_yaml`].
    #[error("Failed to deserialize yaml: {0}")]
    SerdeYaml(#[from] serde_yaml::Error),
    /// Error reading script file
    #[error("Failed to read replay script {path:?}: {source}")]
    ReadFile {
        /// File path
        path: PathBuf,
        /// Underlying IO error
        #[source]
        source: Box<io::Error>,
    },
}

/// How the scripted server answers an operation.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
#[serde(deny_unknown_fields)]
pub enum Outcome {
    /// Every result carries data
    #[default]
    Ok,
    /// Every result carries a GraphQL error with `message`
    GraphqlError {
        /// The error message
        message: String,
    },
    /// The transport fails with `message` instead of answering
    TransportError {
        /// The failure message
        message: String,
    },
}

fn default_one() -> NonZeroU32 {
    NonZeroU32::MIN
}

/// One scripted operation.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ScriptedOperation {
    /// The operation name supplied by the caller
    #[serde(default)]
    pub name: Option<String>,
    /// The GraphQL document
    pub document: String,
    /// Delay before each result, or before the transport failure
    #[serde(default)]
    pub latency_ms: u64,
    /// How the server answers
    #[serde(default, with = "serde_yaml::with::singleton_map")]
    pub outcome: Outcome,
    /// The fetch policy the caller requests
    #[serde(default)]
    pub fetch_policy: Option<FetchPolicy>,
    /// Whether a cache link flags the operation as answered from cache
    #[serde(default)]
    pub from_cache: bool,
    /// Number of results delivered, meaningful for subscriptions
    #[serde(default = "default_one")]
    pub results: NonZeroU32,
    /// Number of times the operation is issued
    #[serde(default = "default_one")]
    pub repeat: NonZeroU32,
}

impl ScriptedOperation {
    /// The operation a client would issue for script entry `index`.
    #[must_use]
    pub fn operation(&self, index: usize) -> Operation {
        let mut context = Context {
            fetch_policy: self.fetch_policy,
            from_cache: self.from_cache,
            ..Context::default()
        };
        context
            .extensions
            .insert(REPLAY_INDEX.to_string(), Value::from(index));

        let operation = Operation::new(self.document.clone()).with_context(context);
        match &self.name {
            Some(name) => operation.with_name(name.clone()),
            None => operation,
        }
    }

    fn respond(&self) -> OperationStream {
        let latency = Duration::from_millis(self.latency_ms);
        match &self.outcome {
            Outcome::TransportError { message } => {
                let message = message.clone();
                stream::once(async move {
                    tokio::time::sleep(latency).await;
                    Err::<Response, _>(LinkError::Network(message))
                })
                .boxed()
            }
            outcome => {
                let outcome = outcome.clone();
                stream::iter(0..self.results.get())
                    .then(move |sequence| {
                        let outcome = outcome.clone();
                        async move {
                            tokio::time::sleep(latency).await;
                            let response = Response::with_data(json!({ "sequence": sequence }));
                            match outcome {
                                Outcome::GraphqlError { message } => {
                                    Ok::<_, LinkError>(response.with_error(GraphQLError::new(message)))
                                }
                                Outcome::Ok | Outcome::TransportError { .. } => Ok(response),
                            }
                        }
                    })
                    .boxed()
            }
        }
    }
}

/// A replay script.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct Script {
    /// The scripted operations
    #[serde(default)]
    pub operations: Vec<ScriptedOperation>,
}

impl Script {
    /// Load a script from the YAML file at `path`.
    ///
    /// # Errors
    ///
    /// Function will error if the file cannot be read or is not a valid
    /// script.
    pub fn from_path(path: &Path) -> Result<Self, Error> {
        let contents = fs::read_to_string(path).map_err(|source| Error::ReadFile {
            path: path.to_path_buf(),
            source: Box::new(source),
        })?;
        contents.parse()
    }

    /// Total number of operations issued when the script runs.
    #[must_use]
    pub fn total_operations(&self) -> usize {
        self.operations
            .iter()
            .map(|op| op.repeat.get() as usize)
            .sum()
    }
}

impl FromStr for Script {
    type Err = Error;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        Ok(serde_yaml::from_str(input)?)
    }
}

/// A terminal [`Link`] answering operations issued from a [`Script`].
///
/// Operations are matched to their script entry through the [`REPLAY_INDEX`]
/// context extension. Operations without one are refused with
/// [`LinkError::Closed`].
#[derive(Debug, Clone)]
pub struct ScriptedLink {
    script: Arc<[ScriptedOperation]>,
}

impl ScriptedLink {
    /// Create a link answering for `script`.
    #[must_use]
    pub fn new(script: &Script) -> Self {
        Self {
            script: script.operations.clone().into(),
        }
    }
}

impl Link for ScriptedLink {
    fn request(&self, operation: Operation) -> OperationStream {
        let entry = operation
            .context
            .extensions
            .get(REPLAY_INDEX)
            .and_then(Value::as_u64)
            .and_then(|index| usize::try_from(index).ok())
            .and_then(|index| self.script.get(index));
        match entry {
            Some(entry) => entry.respond(),
            None => opwatch_link::once(Err(LinkError::Closed)),
        }
    }
}

/// What a caller observed while a script ran.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Summary {
    /// Operations issued
    pub operations: usize,
    /// Results delivered
    pub results: usize,
    /// Results carrying GraphQL errors
    pub graphql_errors: usize,
    /// Transport failures delivered
    pub transport_errors: usize,
}

/// Issue every operation in `script` concurrently through `monitor` and drain
/// their results.
pub async fn run(script: &Script, monitor: &Monitor) -> Summary {
    let link: MonitorLink<ScriptedLink> = monitor.link(ScriptedLink::new(script));

    let streams: Vec<OperationStream> = script
        .operations
        .iter()
        .enumerate()
        .flat_map(|(index, entry)| (0..entry.repeat.get()).map(move |_| entry.operation(index)))
        .map(|operation| link.request(operation))
        .collect();
    info!(operations = streams.len(), "Replaying scripted operations");

    let drained = join_all(streams.into_iter().map(drain)).await;
    drained.into_iter().fold(Summary::default(), |mut acc, observed| {
        acc.operations += 1;
        acc.results += observed.results;
        acc.graphql_errors += observed.graphql_errors;
        acc.transport_errors += observed.transport_errors;
        acc
    })
}

async fn drain(mut stream: OperationStream) -> Summary {
    let mut observed = Summary::default();
    while let Some(item) = stream.next().await {
        match item {
            Ok(response) => {
                observed.results += 1;
                if response.has_errors() {
                    observed.graphql_errors += 1;
                }
            }
            Err(err) => {
                debug!(%err, "Scripted operation failed in transport");
                observed.transport_errors += 1;
            }
        }
    }
    observed
}
