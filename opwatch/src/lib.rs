//! Performance instrumentation for GraphQL client link chains.
//!
//! The [`monitor::Monitor`] measures every operation passing through a
//! [`opwatch_link::Link`] chain: latency, operation kind, whether the cache
//! answered and whether an error came back. It keeps a bounded window of the
//! most recent measurements and computes aggregate statistics over it on
//! demand. It never alters requests, results or errors.
//!
//! ```ignore
//! let monitor = Monitor::new(Config::default());
//! let link = monitor.link(transport);
//! let results = link.request(operation).collect::<Vec<_>>().await;
//! monitor.log_performance_report();
//! ```

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
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::multiple_crate_versions)]

pub mod buffer;
pub mod clock;
pub mod config;
pub mod metric;
pub mod monitor;
pub mod replay;
pub mod stats;

pub use config::Config;
pub use metric::QueryMetric;
pub use monitor::{Monitor, MonitorLayer, MonitorLink};
pub use stats::PerformanceStats;
