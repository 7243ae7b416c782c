//! Aggregate views over a set of metrics.
//!
//! Everything here is a pure function of the metrics handed in. Nothing is
//! cached, callers recompute from a buffer snapshot whenever they want a fresh
//! view.

use std::fmt;

use opwatch_link::OperationKind;
use rustc_hash::FxHashMap;
use serde::Serialize;

use crate::metric::QueryMetric;

/// Default duration, in milliseconds, above which an operation is slow.
pub const SLOW_QUERY_THRESHOLD_MS: u64 = 1_000;

/// Summary statistics over a set of metrics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PerformanceStats {
    /// Number of query metrics
    pub total_queries: usize,
    /// Number of mutation metrics
    pub total_mutations: usize,
    /// Number of subscription metrics
    pub total_subscriptions: usize,
    /// Mean duration of completed queries, 0 if there are none
    pub avg_query_time: f64,
    /// Mean duration of completed mutations, 0 if there are none
    pub avg_mutation_time: f64,
    /// Fraction of completed metrics served from cache, 0 if there are none
    pub cache_hit_rate: f64,
    /// Completed metrics slower than `slow_threshold_ms`, in buffer order
    pub slow_queries: Vec<QueryMetric>,
    /// Fraction of all metrics that saw an error, 0 if there are none
    pub error_rate: f64,
    /// The threshold `slow_queries` was computed against
    pub slow_threshold_ms: u64,
}

#[derive(Debug, Default, Clone, Copy)]
struct Mean {
    sum: f64,
    count: usize,
}

impl Mean {
    fn add(&mut self, value: f64) {
        self.sum += value;
        self.count += 1;
    }

    fn get(self) -> f64 {
        ratio(self.sum, self.count)
    }
}

fn ratio(numerator: f64, count: usize) -> f64 {
    if count == 0 { 0.0 } else { numerator / count as f64 }
}

impl PerformanceStats {
    /// Compute statistics over `metrics`, flagging completed metrics longer
    /// than `slow_threshold_ms` as slow.
    pub fn compute<'a, I>(metrics: I, slow_threshold_ms: u64) -> Self
    where
        I: IntoIterator<Item = &'a QueryMetric>,
    {
        let threshold = slow_threshold_ms as f64;

        let mut total = 0;
        let mut errors = 0;
        let mut completed = 0;
        let mut cache_hits = 0;
        let mut counts: [usize; 3] = [0; 3];
        let mut query_time = Mean::default();
        let mut mutation_time = Mean::default();
        let mut slow_queries = Vec::new();

        for metric in metrics {
            total += 1;
            if metric.error {
                errors += 1;
            }
            counts[kind_index(metric.operation_type)] += 1;

            let Some(duration) = metric.duration() else {
                continue;
            };
            completed += 1;
            if metric.cache_hit {
                cache_hits += 1;
            }
            match metric.operation_type {
                OperationKind::Query => query_time.add(duration),
                OperationKind::Mutation => mutation_time.add(duration),
                OperationKind::Subscription => {}
            }
            if duration > threshold {
                slow_queries.push(metric.clone());
            }
        }

        Self {
            total_queries: counts[kind_index(OperationKind::Query)],
            total_mutations: counts[kind_index(OperationKind::Mutation)],
            total_subscriptions: counts[kind_index(OperationKind::Subscription)],
            avg_query_time: query_time.get(),
            avg_mutation_time: mutation_time.get(),
            cache_hit_rate: ratio(cache_hits as f64, completed),
            slow_queries,
            error_rate: ratio(errors as f64, total),
            slow_threshold_ms,
        }
    }
}

const fn kind_index(kind: OperationKind) -> usize {
    match kind {
        OperationKind::Query => 0,
        OperationKind::Mutation => 1,
        OperationKind::Subscription => 2,
    }
}

fn fmt_duration(duration: Option<f64>) -> String {
    duration.map_or_else(|| "in flight".to_string(), |d| format!("{d:.2} ms"))
}

impl fmt::Display for PerformanceStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "GraphQL Performance Report:")?;
        writeln!(
            f,
            "  Queries:        {} (avg {:.2} ms)",
            self.total_queries, self.avg_query_time
        )?;
        writeln!(
            f,
            "  Mutations:      {} (avg {:.2} ms)",
            self.total_mutations, self.avg_mutation_time
        )?;
        writeln!(f, "  Subscriptions:  {}", self.total_subscriptions)?;
        writeln!(f, "  Cache hit rate: {:.1}%", self.cache_hit_rate * 100.0)?;
        writeln!(f, "  Error rate:     {:.1}%", self.error_rate * 100.0)?;
        write!(
            f,
            "  Slow operations (> {} ms): {}",
            self.slow_threshold_ms,
            self.slow_queries.len()
        )?;
        for metric in &self.slow_queries {
            write!(
                f,
                "\n    {} ({}): {}",
                metric.operation_name,
                metric.operation_type,
                fmt_duration(metric.duration())
            )?;
        }
        Ok(())
    }
}

/// Per operation name aggregate.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OperationSummary {
    /// The operation name
    pub operation_name: String,
    /// The operation kind of the most recent metric with this name
    pub operation_type: OperationKind,
    /// Number of metrics with this name
    pub count: usize,
    /// Number of those metrics that saw an error
    pub errors: usize,
    /// Mean duration of completed metrics, 0 if there are none
    pub avg_duration: f64,
    /// Longest completed duration, 0 if there are none
    pub max_duration: f64,
}

/// Group `metrics` by operation name, slowest average first. Ties are broken
/// by name so the order is stable.
pub fn summarize<'a, I>(metrics: I) -> Vec<OperationSummary>
where
    I: IntoIterator<Item = &'a QueryMetric>,
{
    let mut groups: FxHashMap<&str, (OperationSummary, Mean)> = FxHashMap::default();
    for metric in metrics {
        let (summary, mean) = groups
            .entry(metric.operation_name.as_str())
            .or_insert_with(|| {
                (
                    OperationSummary {
                        operation_name: metric.operation_name.clone(),
                        operation_type: metric.operation_type,
                        count: 0,
                        errors: 0,
                        avg_duration: 0.0,
                        max_duration: 0.0,
                    },
                    Mean::default(),
                )
            });
        summary.operation_type = metric.operation_type;
        summary.count += 1;
        if metric.error {
            summary.errors += 1;
        }
        if let Some(duration) = metric.duration() {
            mean.add(duration);
            summary.max_duration = summary.max_duration.max(duration);
        }
    }

    let mut summaries: Vec<OperationSummary> = groups
        .into_values()
        .map(|(mut summary, mean)| {
            summary.avg_duration = mean.get();
            summary
        })
        .collect();
    summaries.sort_by(|a, b| {
        b.avg_duration
            .total_cmp(&a.avg_duration)
            .then_with(|| a.operation_name.cmp(&b.operation_name))
    });
    summaries
}

impl fmt::Display for OperationSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}): {} calls, {} errors, avg {:.2} ms, max {:.2} ms",
            self.operation_name,
            self.operation_type,
            self.count,
            self.errors,
            self.avg_duration,
            self.max_duration
        )
    }
}
