use std::collections::BTreeMap;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{debug, info};

use super::domain::{BacklogCriticality, BonusViewRow, Divergence, DivergenceKind, FieldValue};
use crate::config::DivergenceConfig;
use crate::workflows::bonus::{BonusStatus, InvoiceId};

const TRADE_MARKETING_CONFIDENCE: f32 = 0.95;
const PENDING_CONFIDENCE: f32 = 0.5;
const VALUE_CONFIDENCE: f32 = 0.7;

/// Inclusive processing-date window and the reference date for ageing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DetectionQuery {
    pub window: Option<(NaiveDate, NaiveDate)>,
    pub as_of: NaiveDate,
}

impl DetectionQuery {
    pub fn as_of(as_of: NaiveDate) -> Self {
        Self {
            window: None,
            as_of,
        }
    }

    pub fn between(from: NaiveDate, to: NaiveDate, as_of: NaiveDate) -> Self {
        Self {
            window: Some((from, to)),
            as_of,
        }
    }

    fn includes(&self, row: &BonusViewRow) -> bool {
        match (self.window, row.processed_on) {
            (None, _) => true,
            (Some((from, to)), Some(date)) => date >= from && date <= to,
            (Some(_), None) => false,
        }
    }
}

/// Detection result, filtered by confidence, plus the pending backlog gauge.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetectionOutcome {
    pub divergences: Vec<Divergence>,
    pub pending_backlog: usize,
    pub criticality: BacklogCriticality,
}

impl DetectionOutcome {
    pub fn count_by_kind(&self) -> BTreeMap<DivergenceKind, usize> {
        let mut counts = BTreeMap::new();
        for divergence in &self.divergences {
            *counts.entry(divergence.kind).or_insert(0) += 1;
        }
        counts
    }
}

/// Rule-based scanner over bonus view rows.
pub struct DivergenceDetector {
    config: DivergenceConfig,
}

impl DivergenceDetector {
    pub fn new(config: DivergenceConfig) -> Self {
        Self { config }
    }

    pub fn detect(&self, rows: &[BonusViewRow], query: &DetectionQuery) -> DetectionOutcome {
        let in_window: Vec<&BonusViewRow> = rows.iter().filter(|row| query.includes(row)).collect();
        info!(
            rows = rows.len(),
            in_window = in_window.len(),
            "starting divergence detection"
        );

        let mut divergences = Vec::new();
        let mut pending_backlog = 0;

        for row in in_window {
            divergences.extend(self.trade_marketing(row));
            if let Some(pending) = pending_verification(row, query.as_of) {
                pending_backlog += 1;
                divergences.push(pending);
            }
            divergences.extend(self.value_validation(row));
        }

        let criticality = BacklogCriticality::from_pending(pending_backlog);
        info!(
            pending = pending_backlog,
            criticality = criticality.label(),
            "pending verification backlog"
        );

        let detected = divergences.len();
        divergences.retain(|divergence| divergence.confidence >= self.config.min_confidence);
        info!(
            detected,
            kept = divergences.len(),
            min_confidence = self.config.min_confidence,
            "divergence detection finished"
        );

        DetectionOutcome {
            divergences,
            pending_backlog,
            criticality,
        }
    }

    fn trade_marketing(&self, row: &BonusViewRow) -> Vec<Divergence> {
        if !row.flagged_for_review() {
            return Vec::new();
        }

        let bonus_amount = amount_or_zero(row.bonus_amount);
        let trade_amount = amount_or_zero(row.trade_amount);
        let bonus_department = amount_or_zero(row.bonus_department);
        let trade_department = amount_or_zero(row.trade_marketing_department);

        let mut context = BTreeMap::new();
        if let Some(model) = &row.model {
            context.insert("model".to_string(), model.clone());
        }
        if let Some(label) = &row.bonus_label {
            context.insert("bonus_label".to_string(), label.clone());
        }
        if let Some(date) = row.processed_on {
            context.insert("processed_on".to_string(), date.to_string());
        }

        let mut found = Vec::new();
        let checks = [
            (
                DivergenceKind::TradeMarketingBonus,
                "bonus_department",
                bonus_department,
                bonus_amount,
                "BONUS_DPTO_DIVERGENTE",
            ),
            (
                DivergenceKind::TradeMarketingTrade,
                "trade_marketing_department",
                trade_department,
                trade_amount,
                "TRADE_MKT_DPTO_DIVERGENTE",
            ),
        ];

        for (kind, field, current, expected, rule) in checks {
            if (current - expected).abs() > self.config.amount_tolerance {
                debug!(invoice = %row.invoice_id, field, %current, %expected, "department mismatch");
                found.push(Divergence {
                    invoice_id: InvoiceId(row.invoice_id.clone()),
                    kind,
                    field,
                    current_value: Some(FieldValue::Amount(current)),
                    expected_value: Some(FieldValue::Amount(expected)),
                    period: row.period.clone(),
                    confidence: TRADE_MARKETING_CONFIDENCE,
                    violated_rules: vec![rule],
                    context: context.clone(),
                });
            }
        }

        found
    }

    fn value_validation(&self, row: &BonusViewRow) -> Option<Divergence> {
        let trade_amount = amount_or_zero(row.trade_amount);
        let bonus_amount = amount_or_zero(row.bonus_amount);
        let bonus_department = amount_or_zero(row.bonus_department);

        let mut rules = Vec::new();
        if trade_amount < Decimal::ZERO {
            rules.push("TRADE_VALOR_NEGATIVO");
        }
        if bonus_amount < Decimal::ZERO {
            rules.push("BONUS_VALOR_NEGATIVO");
        }
        if bonus_department < Decimal::ZERO {
            rules.push("BONUS_DPTO_NEGATIVO");
        }
        if trade_amount > self.config.outlier_limit {
            rules.push("TRADE_VALOR_OUTLIER");
        }
        if bonus_amount > self.config.outlier_limit {
            rules.push("BONUS_VALOR_OUTLIER");
        }

        if rules.is_empty() {
            return None;
        }

        let mut context = BTreeMap::new();
        context.insert("trade_amount".to_string(), trade_amount.to_string());
        context.insert("bonus_amount".to_string(), bonus_amount.to_string());

        Some(Divergence {
            invoice_id: InvoiceId(row.invoice_id.clone()),
            kind: DivergenceKind::ValueValidation,
            field: "bonus_amounts",
            current_value: None,
            expected_value: None,
            period: row.period.clone(),
            confidence: VALUE_CONFIDENCE,
            violated_rules: rules,
            context,
        })
    }
}

fn pending_verification(row: &BonusViewRow, as_of: NaiveDate) -> Option<Divergence> {
    let label = row.bonus_label.as_deref()?.trim();
    if label != BonusStatus::PendingVerification.label() {
        return None;
    }

    let mut context = BTreeMap::new();
    if let Some(date) = row.processed_on {
        context.insert(
            "days_pending".to_string(),
            (as_of - date).num_days().max(0).to_string(),
        );
        context.insert("processed_on".to_string(), date.to_string());
    }

    Some(Divergence {
        invoice_id: InvoiceId(row.invoice_id.clone()),
        kind: DivergenceKind::PendingVerification,
        field: "bonus_label",
        current_value: Some(FieldValue::Text(label.to_string())),
        expected_value: None,
        period: row.period.clone(),
        confidence: PENDING_CONFIDENCE,
        violated_rules: vec!["VERIFICACAO_PENDENTE_PROLONGADA"],
        context,
    })
}

fn amount_or_zero(value: Option<Decimal>) -> Decimal {
    value.unwrap_or(Decimal::ZERO)
}
