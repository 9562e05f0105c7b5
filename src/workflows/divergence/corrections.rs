use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use tracing::info;

use super::domain::{Divergence, DivergenceKind, FieldValue};
use crate::workflows::bonus::InvoiceId;

/// Whether high-confidence fixes may be applied without review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CorrectionMode {
    #[default]
    Manual,
    Auto,
}

impl FromStr for CorrectionMode {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "manual" => Ok(Self::Manual),
            "auto" => Ok(Self::Auto),
            other => Err(format!("unknown correction mode '{other}' (expected manual or auto)")),
        }
    }
}

impl fmt::Display for CorrectionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CorrectionMode::Manual => f.write_str("manual"),
            CorrectionMode::Auto => f.write_str("auto"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CorrectionStatus {
    AutoApplied,
    PendingApproval,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorrectionEntry {
    pub invoice_id: InvoiceId,
    pub kind: DivergenceKind,
    pub field: &'static str,
    pub status: CorrectionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub applied_value: Option<FieldValue>,
    pub confidence: f32,
}

/// Outcome of routing every divergence to auto-apply or manual approval.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CorrectionPlan {
    pub total: usize,
    pub auto_applied: usize,
    pub pending_approval: usize,
    pub entries: Vec<CorrectionEntry>,
}

pub fn plan_corrections(
    divergences: &[Divergence],
    mode: CorrectionMode,
    auto_apply_confidence: f32,
) -> CorrectionPlan {
    let mut plan = CorrectionPlan {
        total: divergences.len(),
        ..CorrectionPlan::default()
    };

    for divergence in divergences {
        let automatic = mode == CorrectionMode::Auto
            && divergence.confidence >= auto_apply_confidence
            && divergence.kind.auto_correctable()
            && divergence.expected_value.is_some();

        let entry = if automatic {
            plan.auto_applied += 1;
            CorrectionEntry {
                invoice_id: divergence.invoice_id.clone(),
                kind: divergence.kind,
                field: divergence.field,
                status: CorrectionStatus::AutoApplied,
                applied_value: divergence.expected_value.clone(),
                confidence: divergence.confidence,
            }
        } else {
            plan.pending_approval += 1;
            CorrectionEntry {
                invoice_id: divergence.invoice_id.clone(),
                kind: divergence.kind,
                field: divergence.field,
                status: CorrectionStatus::PendingApproval,
                applied_value: None,
                confidence: divergence.confidence,
            }
        };
        plan.entries.push(entry);
    }

    info!(
        %mode,
        total = plan.total,
        auto = plan.auto_applied,
        pending = plan.pending_approval,
        "correction plan ready"
    );

    plan
}
