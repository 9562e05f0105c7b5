use std::io::Cursor;

use bonus_ledger::config::DivergenceConfig;
use bonus_ledger::workflows::divergence::{
    plan_corrections, write_report, BacklogCriticality, BonusViewImporter, CorrectionMode,
    CorrectionStatus, DetectionQuery, DivergenceDetector, DivergenceKind,
};
use chrono::NaiveDate;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
}

fn export() -> String {
    let mut csv = String::from(
        "invoice_id,model,review_note,period,bonus_label,bonus_amount,trade_amount,bonus_department,trade_marketing_department,processed_on\n",
    );
    csv.push_str("NF-1,DOLPHIN,Revisar Divergência!,2025-09,\"Seguro, Trade Marketing\",5000,1200,4000,1200,2025-09-03\n");
    csv.push_str("NF-2,SEAL,Revisar Divergência!,2025-09,Trade Marketing,0,900,0,600,2025-09-04\n");
    csv.push_str("NF-3,SONG,,2025-09,Wallbox,-50,0,0,0,2025-09-05\n");
    for index in 0..12 {
        csv.push_str(&format!(
            "NF-P{index},YUAN,,2025-09,Pending Verification,,,,,2025-09-{:02}\n",
            index + 1
        ));
    }
    csv.push_str("NF-OLD,YUAN,Revisar Divergência!,2025-06,Wallbox,100,0,0,0,2025-06-30\n");
    csv
}

#[test]
fn detection_over_export_with_default_thresholds() {
    let rows = BonusViewImporter::from_reader(Cursor::new(export())).expect("export parses");
    let detector = DivergenceDetector::new(DivergenceConfig::default());

    let outcome = detector.detect(
        &rows,
        &DetectionQuery::between(date(2025, 9, 1), date(2025, 9, 30), date(2025, 10, 1)),
    );

    assert_eq!(outcome.pending_backlog, 12);
    assert_eq!(outcome.criticality, BacklogCriticality::Attention);

    let counts = outcome.count_by_kind();
    assert_eq!(counts.get(&DivergenceKind::TradeMarketingBonus), Some(&1));
    assert_eq!(counts.get(&DivergenceKind::TradeMarketingTrade), Some(&1));
    assert_eq!(counts.get(&DivergenceKind::PendingVerification), None);
    assert_eq!(counts.get(&DivergenceKind::ValueValidation), None);
    assert!(outcome
        .divergences
        .iter()
        .all(|divergence| divergence.invoice_id.0 != "NF-OLD"));
}

#[test]
fn lowered_threshold_surfaces_value_checks() {
    let rows = BonusViewImporter::from_reader(Cursor::new(export())).expect("export parses");
    let detector = DivergenceDetector::new(DivergenceConfig {
        min_confidence: 0.6,
        ..DivergenceConfig::default()
    });

    let outcome = detector.detect(&rows, &DetectionQuery::as_of(date(2025, 10, 1)));

    let value_check = outcome
        .divergences
        .iter()
        .find(|divergence| divergence.kind == DivergenceKind::ValueValidation)
        .expect("negative bonus reported");
    assert_eq!(value_check.invoice_id.0, "NF-3");
    assert_eq!(value_check.violated_rules, vec!["BONUS_VALOR_NEGATIVO"]);
    assert!(outcome
        .divergences
        .iter()
        .any(|divergence| divergence.invoice_id.0 == "NF-OLD"));
}

#[test]
fn auto_plan_and_report_cover_trade_marketing_fixes() {
    let rows = BonusViewImporter::from_reader(Cursor::new(export())).expect("export parses");
    let detector = DivergenceDetector::new(DivergenceConfig::default());
    let outcome = detector.detect(
        &rows,
        &DetectionQuery::between(date(2025, 9, 1), date(2025, 9, 30), date(2025, 10, 1)),
    );

    let plan = plan_corrections(&outcome.divergences, CorrectionMode::Auto, 0.95);
    assert_eq!(plan.total, 2);
    assert_eq!(plan.auto_applied, 2);
    assert!(plan
        .entries
        .iter()
        .all(|entry| entry.status == CorrectionStatus::AutoApplied));

    let mut buffer = Vec::new();
    write_report(&outcome.divergences, &mut buffer).expect("report written");
    let report = String::from_utf8(buffer).expect("utf8");
    assert_eq!(report.lines().count(), 3);
    assert!(report.contains("NF-2,TRADE_MARKETING_TRADE,trade_marketing_department,600,900"));
}
