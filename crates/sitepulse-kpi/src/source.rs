//! Read-only access to the project activity the KPIs are derived from.

use anyhow::Result;
use async_trait::async_trait;
use sitepulse_common::types::TimeWindow;

/// Document uploads in a window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UploadCounts {
    pub total: u64,
    pub failed: u64,
}

/// RFIs of a project, all statuses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RfiCounts {
    pub total: u64,
    pub closed: u64,
}

/// Closed RFIs that had a due date, and how many of them closed by it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompletionCounts {
    pub closed: u64,
    pub on_time: u64,
}

/// Queries the KPI formulas need from the document, RFI and transmittal
/// records of a project.
///
/// `window` restricts by creation time of the underlying record; `None`
/// means the whole lifetime of the project. Durations are returned as raw
/// samples so the formulas decide how to aggregate them.
#[async_trait]
pub trait MetricSource: Send + Sync {
    async fn upload_counts(&self, project_id: &str, window: &TimeWindow) -> Result<UploadCounts>;

    /// Processing time in seconds of every completed AI analysis.
    async fn analysis_durations(
        &self,
        project_id: &str,
        window: Option<&TimeWindow>,
    ) -> Result<Vec<f64>>;

    /// Confidence scores in `0.0..=1.0` of every completed AI analysis.
    async fn confidence_scores(
        &self,
        project_id: &str,
        window: Option<&TimeWindow>,
    ) -> Result<Vec<f64>>;

    /// Days from creation to first response for answered or closed RFIs.
    async fn rfi_response_days(
        &self,
        project_id: &str,
        window: Option<&TimeWindow>,
    ) -> Result<Vec<f64>>;

    async fn rfi_counts(&self, project_id: &str, window: Option<&TimeWindow>) -> Result<RfiCounts>;

    /// Days from submission to approval for approved transmittals.
    async fn transmittal_approval_days(
        &self,
        project_id: &str,
        window: Option<&TimeWindow>,
    ) -> Result<Vec<f64>>;

    async fn completion_counts(
        &self,
        project_id: &str,
        window: Option<&TimeWindow>,
    ) -> Result<CompletionCounts>;
}
