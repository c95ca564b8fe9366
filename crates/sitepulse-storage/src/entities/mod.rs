pub mod dashboard_alert;
pub mod document;
pub mod document_analysis;
pub mod kpi_history;
pub mod kpi_metric;
pub mod project;
pub mod rfi;
pub mod transmittal;
