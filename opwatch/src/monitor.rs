//! Operation performance monitoring for GraphQL link chains.
//!
//! [`Monitor`] owns a bounded buffer of [`QueryMetric`] records and hands out
//! [`MonitorLink`] wrappers that fill it. A `MonitorLink` forwards every
//! operation unchanged to the link it wraps and returns an [`Instrumented`]
//! stream that passes every item through untouched while timing it.
//!
//! ## Recording
//!
//! Exactly one metric is appended per operation attempt, at its terminal event:
//!
//! * queries and mutations: the first result, recorded before the result is
//!   handed to the caller,
//! * subscriptions: normal completion of the stream, each result re-stamps the
//!   in-flight metric. The duration runs to the last result, time spent
//!   waiting for the stream to close after it is not counted,
//! * any operation: a transport error, or completion without any result.
//!
//! Dropping the stream before its terminal event cancels the wrapped stream and
//! records nothing.
//!
//! ## Metrics
//!
//! `graphql_operations`: Total operations recorded, labelled by `operation_type`
//! `graphql_operation_errors`: Operations that saw a GraphQL or transport error
//! `graphql_cache_hits`: Operations served from cache
//! `graphql_operation_duration_ms`: Histogram of operation durations
//!

use std::{
    fmt,
    pin::Pin,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    task::{Context, Poll},
};

use futures::Stream;
use metrics::{counter, histogram};
use opwatch_link::{Error, FetchPolicy, Link, Operation, OperationStream, Response};
use tracing::{debug, info, warn};

use crate::{
    buffer::MetricsBuffer,
    clock::{Clock, RealClock},
    config::Config,
    metric::{QueryMetric, UNKNOWN_OPERATION},
    stats::{self, OperationSummary, PerformanceStats},
};

/// Whether `operation` is expected to be answered without a network round
/// trip.
///
/// This is a heuristic: a `cache-only` policy, or a cache link flagging the
/// context. A `cache-first` operation that happened to hit the cache is not
/// detected unless some link sets `from_cache`.
#[must_use]
pub fn is_cache_hit(operation: &Operation) -> bool {
    operation.context.fetch_policy == Some(FetchPolicy::CacheOnly) || operation.context.from_cache
}

#[derive(Debug)]
struct Inner {
    config: Config,
    clock: Box<dyn Clock>,
    buffer: Mutex<MetricsBuffer>,
}

/// Collects and reports operation metrics.
///
/// `Monitor` is a cheap handle, clones share the same buffer.
#[derive(Debug, Clone)]
pub struct Monitor {
    inner: Arc<Inner>,
}

impl Default for Monitor {
    fn default() -> Self {
        Self::new(Config::default())
    }
}

impl Monitor {
    /// Create a monitor timing operations against real-clock time.
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self::with_clock(config, RealClock::default())
    }

    /// Create a monitor timing operations against `clock`.
    #[must_use]
    pub fn with_clock<C>(config: Config, clock: C) -> Self
    where
        C: Clock + 'static,
    {
        Self {
            inner: Arc::new(Inner {
                config,
                clock: Box::new(clock),
                buffer: Mutex::new(MetricsBuffer::new(config.max_metrics)),
            }),
        }
    }

    /// The configuration this monitor was built with.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// Wrap `inner` so that every operation it serves is recorded here.
    #[must_use]
    pub fn link<L>(&self, inner: L) -> MonitorLink<L> {
        MonitorLink {
            inner,
            monitor: self.clone(),
        }
    }

    /// A [`tower::Layer`] producing [`MonitorLink`]s bound to this monitor.
    #[must_use]
    pub fn layer(&self) -> MonitorLayer {
        MonitorLayer {
            monitor: self.clone(),
        }
    }

    /// Statistics over the current buffer contents.
    #[must_use]
    pub fn performance_stats(&self) -> PerformanceStats {
        let buffer = self.buffer();
        PerformanceStats::compute(&*buffer, self.inner.config.slow_query_threshold_ms)
    }

    /// The newest `limit` metrics, oldest first. See
    /// [`crate::buffer::DEFAULT_RECENT_LIMIT`] for the customary limit.
    #[must_use]
    pub fn recent_metrics(&self, limit: usize) -> Vec<QueryMetric> {
        self.buffer().recent(limit)
    }

    /// Per operation name summaries over the current buffer contents.
    #[must_use]
    pub fn operation_summaries(&self) -> Vec<OperationSummary> {
        stats::summarize(&*self.buffer())
    }

    /// Drop every recorded metric.
    pub fn clear_metrics(&self) {
        self.buffer().clear();
    }

    /// Emit the current statistics through `tracing`. The report lists slow
    /// operations itself and is logged at warn level when there are any.
    pub fn log_performance_report(&self) {
        let stats = self.performance_stats();
        if stats.slow_queries.is_empty() {
            info!("{stats}");
        } else {
            warn!(slow_operations = stats.slow_queries.len(), "{stats}");
        }
    }

    fn buffer(&self) -> MutexGuard<'_, MetricsBuffer> {
        // Holders of the lock never leave the buffer half-updated, a poisoned
        // lock still guards a consistent buffer.
        self.inner
            .buffer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn now_ms(&self) -> f64 {
        self.inner.clock.now_ms()
    }

    fn begin(&self, operation: &Operation) -> QueryMetric {
        let start_time = self.now_ms();
        QueryMetric::start(
            operation.resolved_name().unwrap_or(UNKNOWN_OPERATION),
            operation.kind(),
            is_cache_hit(operation),
            start_time,
        )
    }

    fn record(&self, metric: QueryMetric) {
        let duration = metric.duration().unwrap_or_default();
        let operation_type = metric.operation_type.as_str();

        counter!("graphql_operations", "operation_type" => operation_type).increment(1);
        histogram!("graphql_operation_duration_ms", "operation_type" => operation_type)
            .record(duration);
        if metric.error {
            counter!("graphql_operation_errors", "operation_type" => operation_type).increment(1);
        }
        if metric.cache_hit {
            counter!("graphql_cache_hits", "operation_type" => operation_type).increment(1);
        }

        if self.inner.config.verbose {
            let source = if metric.cache_hit { "cache" } else { "network" };
            info!(
                operation = %metric.operation_name,
                operation_type,
                source,
                duration_ms = duration,
                error = metric.error,
                "GraphQL operation completed"
            );
            let threshold_ms = self.inner.config.slow_query_threshold_ms;
            if duration > threshold_ms as f64 {
                warn!(
                    operation = %metric.operation_name,
                    operation_type,
                    duration_ms = duration,
                    threshold_ms,
                    "Slow GraphQL operation"
                );
            }
        }

        self.buffer().append(metric);
    }
}

/// A [`Link`] recording every operation it forwards into a [`Monitor`].
#[derive(Debug, Clone)]
pub struct MonitorLink<L> {
    inner: L,
    monitor: Monitor,
}

impl<L> MonitorLink<L> {
    /// The monitor this link records into.
    #[must_use]
    pub fn monitor(&self) -> &Monitor {
        &self.monitor
    }

    /// The wrapped link.
    #[must_use]
    pub fn get_ref(&self) -> &L {
        &self.inner
    }

    /// Consume the wrapper, returning the wrapped link.
    pub fn into_inner(self) -> L {
        self.inner
    }
}

impl<L> Link for MonitorLink<L>
where
    L: Link,
{
    fn request(&self, operation: Operation) -> OperationStream {
        Box::pin(self.instrument(operation))
    }
}

impl<L> MonitorLink<L>
where
    L: Link,
{
    /// Forward `operation` to the wrapped link, returning the concrete
    /// instrumented stream.
    pub fn instrument(&self, operation: Operation) -> Instrumented {
        let metric = self.monitor.begin(&operation);
        let single_result = metric.operation_type.is_single_result();
        Instrumented {
            inner: self.inner.request(operation),
            monitor: self.monitor.clone(),
            in_flight: Some(metric),
            single_result,
        }
    }
}

/// A [`tower::Layer`] wrapping links in a [`MonitorLink`].
#[derive(Debug, Clone)]
pub struct MonitorLayer {
    monitor: Monitor,
}

impl<L> tower::Layer<L> for MonitorLayer {
    type Service = MonitorLink<L>;

    fn layer(&self, inner: L) -> Self::Service {
        self.monitor.link(inner)
    }
}

/// The stream returned by [`MonitorLink`] for a single operation.
///
/// Every item of the wrapped stream is yielded unchanged. The metric for the
/// attempt lives here until its terminal event, so concurrent operations never
/// share in-flight state.
pub struct Instrumented {
    inner: OperationStream,
    monitor: Monitor,
    in_flight: Option<QueryMetric>,
    single_result: bool,
}

impl fmt::Debug for Instrumented {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instrumented")
            .field("in_flight", &self.in_flight)
            .field("single_result", &self.single_result)
            .finish_non_exhaustive()
    }
}

impl Instrumented {
    /// Whether the attempt has reached its terminal event.
    #[must_use]
    pub fn is_terminated(&self) -> bool {
        self.in_flight.is_none()
    }

    fn observe(&mut self, response: &Response) {
        let now = self.monitor.now_ms();
        let Some(metric) = self.in_flight.as_mut() else {
            return;
        };
        metric.finish(now);
        if response.has_errors() {
            metric.mark_error(response.first_error().map(|e| e.message.clone()));
        }
        if self.single_result {
            self.complete();
        }
    }

    fn fail(&mut self, error: &Error) {
        let now = self.monitor.now_ms();
        if let Some(mut metric) = self.in_flight.take() {
            metric.finish(now);
            metric.mark_transport_failure(error.to_string());
            self.monitor.record(metric);
        }
    }

    fn complete(&mut self) {
        let now = self.monitor.now_ms();
        if let Some(mut metric) = self.in_flight.take() {
            if !metric.is_complete() {
                metric.finish(now);
            }
            self.monitor.record(metric);
        }
    }
}

impl Stream for Instrumented {
    type Item = Result<Response, Error>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        match this.inner.as_mut().poll_next(cx) {
            Poll::Pending => Poll::Pending,
            Poll::Ready(Some(Ok(response))) => {
                this.observe(&response);
                Poll::Ready(Some(Ok(response)))
            }
            Poll::Ready(Some(Err(error))) => {
                this.fail(&error);
                Poll::Ready(Some(Err(error)))
            }
            Poll::Ready(None) => {
                this.complete();
                Poll::Ready(None)
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl Drop for Instrumented {
    fn drop(&mut self) {
        if let Some(metric) = self.in_flight.as_ref() {
            debug!(
                operation = %metric.operation_name,
                operation_type = %metric.operation_type,
                "GraphQL operation dropped before completion, not recorded"
            );
        }
    }
}
