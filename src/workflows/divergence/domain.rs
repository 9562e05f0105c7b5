use std::collections::BTreeMap;
use std::fmt;

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};

use crate::workflows::bonus::parser::{empty_string_as_none, optional_amount};
use crate::workflows::bonus::InvoiceId;

/// Review note the bonus view puts on rows whose department figures disagree.
pub const REVIEW_DIVERGENCE_NOTE: &str = "Revisar Divergência!";

/// One row of the bonus view export.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct BonusViewRow {
    pub invoice_id: String,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub model: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub review_note: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub period: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub bonus_label: Option<String>,
    #[serde(default, deserialize_with = "optional_amount")]
    pub bonus_amount: Option<Decimal>,
    #[serde(default, deserialize_with = "optional_amount")]
    pub trade_amount: Option<Decimal>,
    #[serde(default, deserialize_with = "optional_amount")]
    pub bonus_department: Option<Decimal>,
    #[serde(default, deserialize_with = "optional_amount")]
    pub trade_marketing_department: Option<Decimal>,
    #[serde(default, deserialize_with = "optional_date")]
    pub processed_on: Option<NaiveDate>,
}

impl BonusViewRow {
    pub fn flagged_for_review(&self) -> bool {
        self.review_note.as_deref().map(str::trim) == Some(REVIEW_DIVERGENCE_NOTE)
    }
}

fn optional_date<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
where
    D: Deserializer<'de>,
{
    match empty_string_as_none(deserializer)? {
        None => Ok(None),
        Some(raw) => parse_date(&raw)
            .map(Some)
            .ok_or_else(|| D::Error::custom(format!("invalid date '{raw}'"))),
    }
}

/// Accepts plain dates and the timestamp layouts produced by the warehouse.
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    let trimmed = value.trim();
    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return Some(date);
    }

    for layout in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, layout) {
            return Some(dt.date());
        }
    }

    None
}

/// Category of inconsistency found in the bonus view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DivergenceKind {
    TradeMarketingBonus,
    TradeMarketingTrade,
    PendingVerification,
    ValueValidation,
}

impl DivergenceKind {
    pub fn code(&self) -> &'static str {
        match self {
            DivergenceKind::TradeMarketingBonus => "TRADE_MARKETING_BONUS",
            DivergenceKind::TradeMarketingTrade => "TRADE_MARKETING_TRADE",
            DivergenceKind::PendingVerification => "PENDING_VERIFICATION",
            DivergenceKind::ValueValidation => "VALUE_VALIDATION",
        }
    }

    /// Only department amount mismatches have a computable fix.
    pub fn auto_correctable(&self) -> bool {
        matches!(
            self,
            DivergenceKind::TradeMarketingBonus | DivergenceKind::TradeMarketingTrade
        )
    }
}

/// Current or expected value of the affected field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Amount(Decimal),
    Text(String),
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Amount(amount) => write!(f, "{amount}"),
            FieldValue::Text(text) => f.write_str(text),
        }
    }
}

/// A detected inconsistency and what the rules expected instead.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Divergence {
    pub invoice_id: InvoiceId,
    pub kind: DivergenceKind,
    pub field: &'static str,
    pub current_value: Option<FieldValue>,
    pub expected_value: Option<FieldValue>,
    pub period: Option<String>,
    pub confidence: f32,
    pub violated_rules: Vec<&'static str>,
    pub context: BTreeMap<String, String>,
}

/// How alarming the pending-verification backlog is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BacklogCriticality {
    Low,
    Attention,
    Critical,
}

impl BacklogCriticality {
    pub fn from_pending(count: usize) -> Self {
        match count {
            0..=9 => Self::Low,
            10..=20 => Self::Attention,
            _ => Self::Critical,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            BacklogCriticality::Low => "low criticality",
            BacklogCriticality::Attention => "attention: moderate pending volume",
            BacklogCriticality::Critical => "critical: adjust chassis pending verification",
        }
    }
}
