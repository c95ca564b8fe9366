use sitepulse_common::types::KpiId;

/// Static metadata of a KPI: display unit, thresholds and rounding.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KpiDefinition {
    pub id: KpiId,
    pub name: &'static str,
    pub unit: &'static str,
    pub target: f64,
    pub threshold_warning: f64,
    /// Reported alongside the value; classification only uses target and
    /// warning threshold.
    pub threshold_critical: f64,
    /// Decimal places the value is rounded to before classification.
    pub precision: u32,
}

/// All seven KPIs, ordered by id.
pub const DEFINITIONS: [KpiDefinition; 7] = [
    KpiDefinition {
        id: KpiId::Kpi001,
        name: "Upload Success Rate",
        unit: "%",
        target: 99.5,
        threshold_warning: 99.0,
        threshold_critical: 98.0,
        precision: 1,
    },
    KpiDefinition {
        id: KpiId::Kpi002,
        name: "AI Analysis Time (P50)",
        unit: "seconds",
        target: 30.0,
        threshold_warning: 35.0,
        threshold_critical: 45.0,
        precision: 2,
    },
    KpiDefinition {
        id: KpiId::Kpi003,
        name: "AI Accuracy",
        unit: "%",
        target: 90.0,
        threshold_warning: 85.0,
        threshold_critical: 80.0,
        precision: 1,
    },
    KpiDefinition {
        id: KpiId::Kpi004,
        name: "RFI Response Time",
        unit: "days",
        target: 3.0,
        threshold_warning: 4.0,
        threshold_critical: 5.0,
        precision: 1,
    },
    KpiDefinition {
        id: KpiId::Kpi005,
        name: "RFI Closure Rate",
        unit: "%",
        target: 95.0,
        threshold_warning: 85.0,
        threshold_critical: 75.0,
        precision: 1,
    },
    KpiDefinition {
        id: KpiId::Kpi006,
        name: "Transmittal Approval Time",
        unit: "days",
        target: 5.0,
        threshold_warning: 6.0,
        threshold_critical: 7.0,
        precision: 1,
    },
    KpiDefinition {
        id: KpiId::Kpi007,
        name: "On-time Completion",
        unit: "%",
        target: 90.0,
        threshold_warning: 80.0,
        threshold_critical: 70.0,
        precision: 1,
    },
];

/// Looks up the definition of `id`.
///
/// # Examples
///
/// ```
/// use sitepulse_common::types::KpiId;
/// use sitepulse_kpi::definition;
///
/// let def = definition(KpiId::Kpi005);
/// assert_eq!(def.target, 95.0);
/// assert_eq!(def.unit, "%");
/// ```
pub fn definition(id: KpiId) -> &'static KpiDefinition {
    // DEFINITIONS follows KpiId declaration order
    &DEFINITIONS[id as usize]
}
