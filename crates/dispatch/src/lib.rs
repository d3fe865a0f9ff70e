//! Dispatch layer: decides nothing about routing itself; it drives the route
//! engine's decision through the delivery safety gate, the directory, and the
//! notification channel, and owns the at-most-once delivery guarantee.
//!
//! - `gate` - test/production recipient substitution
//! - `dispatcher` - single-record dispatch with bounded retry
//! - `bulk` - bounded worker pool over many records with a wall-clock budget

pub mod bulk;
pub mod dispatcher;
pub mod gate;

pub use bulk::{BulkOrchestrator, DispatchReport};
pub use dispatcher::{BackoffStrategy, DispatchOutcome, Dispatcher, FixedBackoff};
pub use gate::{DeliverySafetyGate, GateConfigError, RecipientRouting};
