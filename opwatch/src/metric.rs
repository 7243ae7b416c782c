//! The record kept for each observed operation attempt.

use opwatch_link::OperationKind;
use serde::Serialize;

/// Name recorded when neither the caller nor the document names an operation.
pub const UNKNOWN_OPERATION: &str = "unknown";

/// Timing, cache and error facts about one operation attempt.
///
/// A metric starts in flight with only a start timestamp. Finishing it sets the
/// end timestamp and the duration together, so a metric either has both or
/// neither.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryMetric {
    /// The operation name, [`UNKNOWN_OPERATION`] if none was available
    pub operation_name: String,
    /// The operation kind
    pub operation_type: OperationKind,
    /// Milliseconds on the monitor's clock when the operation was intercepted
    pub start_time: f64,
    end_time: Option<f64>,
    duration: Option<f64>,
    /// Whether the result was served without a network round trip
    pub cache_hit: bool,
    /// Whether a GraphQL or transport error was observed
    pub error: bool,
    /// The first observed error message
    pub error_message: Option<String>,
}

impl QueryMetric {
    /// Begin an in-flight metric.
    pub fn start(
        operation_name: impl Into<String>,
        operation_type: OperationKind,
        cache_hit: bool,
        start_time: f64,
    ) -> Self {
        Self {
            operation_name: operation_name.into(),
            operation_type,
            start_time,
            end_time: None,
            duration: None,
            cache_hit,
            error: false,
            error_message: None,
        }
    }

    /// Milliseconds on the monitor's clock when the terminal event was seen.
    #[must_use]
    pub fn end_time(&self) -> Option<f64> {
        self.end_time
    }

    /// `end_time - start_time`, once the metric has finished.
    #[must_use]
    pub fn duration(&self) -> Option<f64> {
        self.duration
    }

    /// Whether the metric has a duration.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.duration.is_some()
    }

    /// Stamp the metric with `now` as its end time.
    ///
    /// Calling again re-stamps the metric, subscriptions do this once per
    /// result. An end time earlier than the start is clamped to the start.
    pub fn finish(&mut self, now: f64) {
        let end = now.max(self.start_time);
        self.end_time = Some(end);
        self.duration = Some(end - self.start_time);
    }

    /// Flag a GraphQL error. The first message observed is kept.
    pub fn mark_error(&mut self, message: Option<String>) {
        if !self.error {
            self.error = true;
            self.error_message = message;
        }
    }

    /// Flag a transport failure.
    ///
    /// A failed transport never served anything from cache, and its message
    /// replaces any earlier GraphQL error message.
    pub fn mark_transport_failure(&mut self, message: String) {
        self.error = true;
        self.error_message = Some(message);
        self.cache_hit = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn in_flight_metric_has_no_end() {
        let metric = QueryMetric::start("GetUser", OperationKind::Query, false, 12.5);
        assert_eq!(metric.end_time(), None);
        assert_eq!(metric.duration(), None);
        assert!(!metric.is_complete());
    }

    #[test]
    fn first_error_message_is_kept() {
        let mut metric = QueryMetric::start("Hire", OperationKind::Mutation, false, 0.0);
        metric.mark_error(Some("first".to_string()));
        metric.mark_error(Some("second".to_string()));
        assert!(metric.error);
        assert_eq!(metric.error_message.as_deref(), Some("first"));
    }

    #[test]
    fn transport_failure_overrides_and_clears_cache_hit() {
        let mut metric = QueryMetric::start("Feed", OperationKind::Query, true, 0.0);
        metric.mark_error(Some("partial".to_string()));
        metric.mark_transport_failure("Network failure: reset".to_string());
        assert!(metric.error);
        assert!(!metric.cache_hit);
        assert_eq!(
            metric.error_message.as_deref(),
            Some("Network failure: reset")
        );
    }

    #[test]
    fn serializes_end_and_duration() {
        let mut metric = QueryMetric::start("GetUser", OperationKind::Query, false, 10.0);
        metric.finish(60.0);
        let value = serde_json::to_value(&metric).unwrap();
        assert_eq!(value["operation_type"], "query");
        assert_eq!(value["end_time"], 60.0);
        assert_eq!(value["duration"], 50.0);
    }

    proptest! {
        #[test]
        fn finished_metrics_are_monotonic(start in 0.0f64..1e9, end in 0.0f64..1e9) {
            let mut metric = QueryMetric::start("op", OperationKind::Query, false, start);
            metric.finish(end);

            let end_time = metric.end_time().unwrap();
            let duration = metric.duration().unwrap();
            prop_assert!(end_time >= metric.start_time);
            prop_assert!(duration >= 0.0);
            prop_assert_eq!(duration, end_time - metric.start_time);
        }
    }
}
