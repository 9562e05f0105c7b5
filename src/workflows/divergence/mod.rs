//! Divergence detection over the bonus view export.
//!
//! Rows flagged for review are checked for department amounts that disagree
//! with the view, pending verifications are counted into a backlog gauge and
//! amounts are screened for negative values and outliers.

mod corrections;
mod detection;
mod domain;
mod report;

pub use corrections::{
    plan_corrections, CorrectionEntry, CorrectionMode, CorrectionPlan, CorrectionStatus,
};
pub use detection::{DetectionOutcome, DetectionQuery, DivergenceDetector};
pub use domain::{
    parse_date, BacklogCriticality, BonusViewRow, Divergence, DivergenceKind, FieldValue,
    REVIEW_DIVERGENCE_NOTE,
};
pub use report::{write_report, write_report_to_path, ReportError};

use crate::workflows::bonus::ImportError;
use std::io::Read;
use std::path::Path;

/// Loads bonus view rows from CSV.
pub struct BonusViewImporter;

impl BonusViewImporter {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Vec<BonusViewRow>, ImportError> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(file)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Vec<BonusViewRow>, ImportError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);

        let mut rows = Vec::new();
        for row in csv_reader.deserialize::<BonusViewRow>() {
            rows.push(row?);
        }
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DivergenceConfig;
    use chrono::NaiveDate;
    use rust_decimal::Decimal;
    use std::io::Cursor;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    fn flagged(invoice: &str, bonus: i64, department: i64) -> BonusViewRow {
        BonusViewRow {
            invoice_id: invoice.to_string(),
            model: Some("DOLPHIN".to_string()),
            review_note: Some(REVIEW_DIVERGENCE_NOTE.to_string()),
            period: Some("2025-09".to_string()),
            bonus_label: Some("Seguro, Trade Marketing".to_string()),
            bonus_amount: Some(Decimal::from(bonus)),
            trade_amount: Some(Decimal::from(1_000)),
            bonus_department: Some(Decimal::from(department)),
            trade_marketing_department: Some(Decimal::from(1_000)),
            processed_on: Some(date(2025, 9, 10)),
        }
    }

    fn pending(invoice: &str, processed_on: NaiveDate) -> BonusViewRow {
        BonusViewRow {
            invoice_id: invoice.to_string(),
            bonus_label: Some("Pending Verification".to_string()),
            processed_on: Some(processed_on),
            ..BonusViewRow::default()
        }
    }

    fn permissive() -> DivergenceDetector {
        DivergenceDetector::new(DivergenceConfig {
            min_confidence: 0.0,
            ..DivergenceConfig::default()
        })
    }

    #[test]
    fn department_mismatch_on_flagged_rows_is_reported() {
        let outcome = permissive().detect(
            &[flagged("NF-1", 5_000, 4_000)],
            &DetectionQuery::as_of(date(2025, 10, 1)),
        );

        assert_eq!(outcome.divergences.len(), 1);
        let divergence = &outcome.divergences[0];
        assert_eq!(divergence.kind, DivergenceKind::TradeMarketingBonus);
        assert_eq!(divergence.field, "bonus_department");
        assert_eq!(
            divergence.expected_value,
            Some(FieldValue::Amount(Decimal::from(5_000)))
        );
        assert_eq!(divergence.violated_rules, vec!["BONUS_DPTO_DIVERGENTE"]);
        assert_eq!(divergence.context.get("model").map(String::as_str), Some("DOLPHIN"));
    }

    #[test]
    fn differences_within_tolerance_are_ignored() {
        let mut row = flagged("NF-2", 5_000, 5_000);
        row.bonus_department = Some(Decimal::new(500_001, 2));

        let outcome = permissive().detect(&[row], &DetectionQuery::as_of(date(2025, 10, 1)));
        assert!(outcome.divergences.is_empty());
    }

    #[test]
    fn unflagged_rows_skip_trade_marketing_checks() {
        let mut row = flagged("NF-3", 5_000, 0);
        row.review_note = Some("OK".to_string());

        let outcome = permissive().detect(&[row], &DetectionQuery::as_of(date(2025, 10, 1)));
        assert!(outcome.divergences.is_empty());
    }

    #[test]
    fn pending_rows_feed_backlog_and_age() {
        let outcome = permissive().detect(
            &[pending("NF-4", date(2025, 9, 1))],
            &DetectionQuery::as_of(date(2025, 9, 21)),
        );

        assert_eq!(outcome.pending_backlog, 1);
        assert_eq!(outcome.criticality, BacklogCriticality::Low);
        let divergence = &outcome.divergences[0];
        assert_eq!(divergence.kind, DivergenceKind::PendingVerification);
        assert_eq!(divergence.confidence, 0.5);
        assert_eq!(
            divergence.context.get("days_pending").map(String::as_str),
            Some("20")
        );
    }

    #[test]
    fn rows_processed_after_reference_date_have_zero_age() {
        let outcome = permissive().detect(
            &[pending("NF-4B", date(2025, 9, 25))],
            &DetectionQuery::as_of(date(2025, 9, 21)),
        );

        assert_eq!(
            outcome.divergences[0]
                .context
                .get("days_pending")
                .map(String::as_str),
            Some("0")
        );
    }

    #[test]
    fn negative_department_amount_alone_is_a_value_divergence() {
        let row = BonusViewRow {
            invoice_id: "NF-7B".to_string(),
            bonus_department: Some(Decimal::from(-300)),
            ..BonusViewRow::default()
        };

        let outcome = permissive().detect(&[row], &DetectionQuery::as_of(date(2025, 9, 30)));
        assert_eq!(outcome.divergences.len(), 1);
        assert_eq!(outcome.divergences[0].violated_rules, vec!["BONUS_DPTO_NEGATIVO"]);
    }

    #[test]
    fn default_confidence_drops_pending_and_value_checks_but_counts_backlog() {
        let detector = DivergenceDetector::new(DivergenceConfig::default());
        let mut negative = pending("NF-5", date(2025, 9, 1));
        negative.bonus_label = Some("No Bonus".to_string());
        negative.trade_amount = Some(Decimal::from(-10));

        let outcome = detector.detect(
            &[pending("NF-6", date(2025, 9, 1)), negative],
            &DetectionQuery::as_of(date(2025, 9, 30)),
        );

        assert!(outcome.divergences.is_empty());
        assert_eq!(outcome.pending_backlog, 1);
    }

    #[test]
    fn value_validation_collects_every_rule() {
        let row = BonusViewRow {
            invoice_id: "NF-7".to_string(),
            trade_amount: Some(Decimal::from(150_000)),
            bonus_amount: Some(Decimal::from(-1)),
            bonus_department: Some(Decimal::from(-1)),
            ..BonusViewRow::default()
        };

        let outcome = permissive().detect(&[row], &DetectionQuery::as_of(date(2025, 9, 30)));
        let divergence = &outcome.divergences[0];
        assert_eq!(divergence.kind, DivergenceKind::ValueValidation);
        assert_eq!(
            divergence.violated_rules,
            vec!["BONUS_VALOR_NEGATIVO", "BONUS_DPTO_NEGATIVO", "TRADE_VALOR_OUTLIER"]
        );
    }

    #[test]
    fn window_excludes_rows_outside_range_or_undated() {
        let mut undated = pending("NF-8", date(2025, 1, 1));
        undated.processed_on = None;
        let rows = [
            pending("NF-9", date(2025, 7, 31)),
            pending("NF-10", date(2025, 8, 1)),
            pending("NF-11", date(2025, 8, 31)),
            undated,
        ];

        let outcome = permissive().detect(
            &rows,
            &DetectionQuery::between(date(2025, 8, 1), date(2025, 8, 31), date(2025, 9, 1)),
        );

        let ids: Vec<&str> = outcome
            .divergences
            .iter()
            .map(|divergence| divergence.invoice_id.0.as_str())
            .collect();
        assert_eq!(ids, vec!["NF-10", "NF-11"]);
    }

    #[test]
    fn backlog_thresholds() {
        assert_eq!(BacklogCriticality::from_pending(0), BacklogCriticality::Low);
        assert_eq!(BacklogCriticality::from_pending(9), BacklogCriticality::Low);
        assert_eq!(BacklogCriticality::from_pending(10), BacklogCriticality::Attention);
        assert_eq!(BacklogCriticality::from_pending(20), BacklogCriticality::Attention);
        assert_eq!(BacklogCriticality::from_pending(21), BacklogCriticality::Critical);
    }

    #[test]
    fn auto_mode_applies_only_trade_marketing_fixes() {
        let outcome = permissive().detect(
            &[flagged("NF-12", 5_000, 4_000), pending("NF-13", date(2025, 9, 1))],
            &DetectionQuery::as_of(date(2025, 9, 30)),
        );

        let plan = plan_corrections(&outcome.divergences, CorrectionMode::Auto, 0.95);
        assert_eq!(plan.total, 2);
        assert_eq!(plan.auto_applied, 1);
        assert_eq!(plan.pending_approval, 1);
        assert_eq!(plan.entries[0].status, CorrectionStatus::AutoApplied);
        assert_eq!(
            plan.entries[0].applied_value,
            Some(FieldValue::Amount(Decimal::from(5_000)))
        );
        assert_eq!(plan.entries[1].status, CorrectionStatus::PendingApproval);

        let manual = plan_corrections(&outcome.divergences, CorrectionMode::Manual, 0.95);
        assert_eq!(manual.auto_applied, 0);
        assert_eq!(manual.pending_approval, 2);
    }

    #[test]
    fn auto_mode_respects_threshold() {
        let outcome = permissive().detect(
            &[flagged("NF-14", 5_000, 4_000)],
            &DetectionQuery::as_of(date(2025, 9, 30)),
        );

        let plan = plan_corrections(&outcome.divergences, CorrectionMode::Auto, 0.99);
        assert_eq!(plan.auto_applied, 0);
        assert_eq!(plan.pending_approval, 1);
    }

    #[test]
    fn correction_mode_parses_case_insensitively() {
        assert_eq!("AUTO".parse::<CorrectionMode>(), Ok(CorrectionMode::Auto));
        assert!("sometimes".parse::<CorrectionMode>().is_err());
    }

    #[test]
    fn report_lists_each_divergence() {
        let outcome = permissive().detect(
            &[flagged("NF-15", 5_000, 4_000)],
            &DetectionQuery::as_of(date(2025, 9, 30)),
        );

        let mut buffer = Vec::new();
        write_report(&outcome.divergences, &mut buffer).expect("report written");
        let text = String::from_utf8(buffer).expect("utf8");
        let mut lines = text.lines();
        assert_eq!(
            lines.next(),
            Some("invoice_id,kind,field,current_value,expected_value,period,confidence,violated_rules")
        );
        assert_eq!(
            lines.next(),
            Some("NF-15,TRADE_MARKETING_BONUS,bonus_department,4000,5000,2025-09,0.95,BONUS_DPTO_DIVERGENTE")
        );
        assert_eq!(lines.next(), None);
    }

    #[test]
    fn importer_reads_bonus_view_export() {
        let csv = "invoice_id,model,review_note,period,bonus_label,bonus_amount,trade_amount,\
bonus_department,trade_marketing_department,processed_on\n\
NF-16,SEAL,Revisar Divergência!,2025-09,Wallbox,1200.00,,1000,,2025-09-12 08:30:00\n";

        let rows = BonusViewImporter::from_reader(Cursor::new(csv)).expect("parse");
        assert_eq!(rows.len(), 1);
        assert!(rows[0].flagged_for_review());
        assert_eq!(rows[0].processed_on, Some(date(2025, 9, 12)));
        assert_eq!(rows[0].trade_amount, None);
        assert_eq!(rows[0].bonus_amount, Some(Decimal::new(120_000, 2)));
    }

    #[test]
    fn importer_rejects_bad_dates() {
        let csv = "invoice_id,processed_on\nNF-17,12/09/2025\n";
        assert!(matches!(
            BonusViewImporter::from_reader(Cursor::new(csv)),
            Err(ImportError::Csv(_))
        ));
    }
}
