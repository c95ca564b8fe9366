//! SQLite persistence for the KPI pipeline.
//!
//! [`KpiStore`] wraps one SeaORM connection pool and implements every
//! storage seam of `sitepulse-kpi`: it reads project activity as a
//! [`MetricSource`](sitepulse_kpi::MetricSource), records calculation cycles
//! and history as a [`SnapshotStore`](sitepulse_kpi::SnapshotStore), and
//! keeps dashboard alerts as an [`AlertStore`](sitepulse_kpi::AlertStore).
//! Schema is managed by the `migration` crate and applied on connect.

pub mod entities;
pub mod error;
pub mod store;


pub use store::{
    KpiStore, NewAnalysis, NewDocument, NewRfi, NewTransmittal, ProjectRow, ProjectSummary,
};
