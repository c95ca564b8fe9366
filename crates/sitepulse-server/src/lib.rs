//! HTTP surface and scheduler of the SitePulse KPI service.

pub mod api;
pub mod app;
pub mod config;
pub mod dashboard;
pub mod logging;
pub mod openapi;
pub mod retry;
pub mod scheduler;
pub mod state;
