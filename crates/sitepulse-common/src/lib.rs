//! Shared types for the SitePulse KPI pipeline: KPI identifiers, status
//! levels, snapshots, alerts and the cross-crate error taxonomy.

pub mod error;
pub mod id;
pub mod types;
