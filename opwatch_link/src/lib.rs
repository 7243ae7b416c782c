//! Link-chain vocabulary for GraphQL clients.
//!
//! A GraphQL client pushes every [`Operation`] through a chain of links before
//! it reaches the network or a cache. Each link receives the operation and
//! returns an [`OperationStream`]: zero or more [`Response`] values followed by
//! completion, or a transport [`Error`]. Queries and mutations typically yield
//! a single response, subscriptions yield responses until the stream ends or
//! the caller drops it. Dropping the stream is how a caller cancels.
//!
//! This crate carries no transport of its own. It defines the types that
//! links agree on so that middleware, like the performance monitor in the
//! `opwatch` crate, can be stacked in front of whatever terminal link an
//! application provides.

#![deny(clippy::all)]
#![deny(clippy::cargo)]
#![deny(clippy::pedantic)]
#![deny(clippy::print_stdout)]
#![deny(clippy::print_stderr)]
#![deny(clippy::dbg_macro)]
#![deny(clippy::unwrap_used)]
#![deny(unused_extern_crates)]
#![deny(unused_allocation)]
#![deny(unused_assignments)]
#![deny(unused_comparisons)]
#![deny(unreachable_pub)]
#![deny(missing_docs)]
#![deny(missing_copy_implementations)]
#![deny(missing_debug_implementations)]
#![allow(clippy::multiple_crate_versions)]

use std::{fmt, sync::Arc};

use futures::{
    StreamExt,
    future,
    stream::{self, BoxStream},
};

pub mod document;
pub mod operation;
pub mod response;

pub use document::{OperationDefinition, OperationKind};
pub use operation::{Context, FetchPolicy, Operation};
pub use response::{GraphQLError, Response};

/// Transport level failures raised by a link chain.
///
/// GraphQL errors returned by a server are not transport failures, they travel
/// inside a [`Response`].
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The request could not reach the server or the connection failed.
    #[error("Network failure: {0}")]
    Network(String),
    /// The server answered with a non-success HTTP status.
    #[error("Unexpected HTTP status: {status}")]
    Http {
        /// The status code returned by the server
        status: u16,
    },
    /// Wrapper for [`serde_json::Error`].
    #[error("Failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),
    /// No link downstream was able to accept the operation.
    #[error("Link chain closed before the operation was forwarded")]
    Closed,
}

/// The stream of results produced for a single operation.
pub type OperationStream = BoxStream<'static, Result<Response, Error>>;

/// A single link in a GraphQL client's link chain.
///
/// Implementations either answer the operation themselves (a terminal link) or
/// forward it to the next link and transform or observe the stream they get
/// back.
pub trait Link: Send + Sync {
    /// Issue `operation`, returning the stream of its results.
    fn request(&self, operation: Operation) -> OperationStream;
}

impl<L> Link for Arc<L>
where
    L: Link + ?Sized,
{
    fn request(&self, operation: Operation) -> OperationStream {
        (**self).request(operation)
    }
}

impl<L> Link for Box<L>
where
    L: Link + ?Sized,
{
    fn request(&self, operation: Operation) -> OperationStream {
        (**self).request(operation)
    }
}

/// A [`Link`] backed by a closure, see [`from_fn`].
#[derive(Clone, Copy)]
pub struct FnLink<F> {
    f: F,
}

impl<F> fmt::Debug for FnLink<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnLink")
            .field("f", &std::any::type_name::<F>())
            .finish()
    }
}

impl<F> Link for FnLink<F>
where
    F: Fn(Operation) -> OperationStream + Send + Sync,
{
    fn request(&self, operation: Operation) -> OperationStream {
        (self.f)(operation)
    }
}

/// Construct a [`Link`] from a closure.
#[must_use]
pub fn from_fn<F>(f: F) -> FnLink<F>
where
    F: Fn(Operation) -> OperationStream + Send + Sync,
{
    FnLink { f }
}

/// A stream that yields `result` and then completes.
#[must_use]
pub fn once(result: Result<Response, Error>) -> OperationStream {
    stream::once(future::ready(result)).boxed()
}

/// A stream that completes without yielding anything.
#[must_use]
pub fn empty() -> OperationStream {
    stream::empty().boxed()
}
