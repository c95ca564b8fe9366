//! KPI computation and alerting core.
//!
//! Seven [`formulas::KpiFormula`] implementations turn raw project activity
//! (read through a [`source::MetricSource`]) into classified
//! [`KpiValue`](sitepulse_common::types::KpiValue)s. A calculation cycle
//! persists them through a [`store::SnapshotStore`], and the
//! [`alert::AlertEngine`] raises at most one open alert per degraded KPI.
//!
//! Nothing here holds global state: every service borrows the stores it is
//! given, so tests run the whole pipeline against in-memory fakes.

pub mod alert;
pub mod calculator;
pub mod classify;
pub mod definition;
pub mod error;
pub mod formulas;
pub mod pipeline;
pub mod source;
pub mod store;

#[cfg(test)]
mod tests;

pub use alert::AlertEngine;
pub use calculator::KpiCalculator;
pub use definition::{definition, KpiDefinition, DEFINITIONS};
pub use error::KpiError;
pub use source::MetricSource;
pub use store::{AlertStore, SnapshotStore};
