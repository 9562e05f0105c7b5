use std::collections::HashSet;
use std::io::{Read, Write};
use std::path::PathBuf;
use std::sync::Arc;

use bonus_ledger::config::{parse_confidence, AppConfig};
use bonus_ledger::error::AppError;
use bonus_ledger::telemetry;
use bonus_ledger::workflows::bonus::{
    BonusLedgerService, InMemorySaleRepository, InvoiceId, LedgerServiceError, RepositoryError,
    SaleImporter,
};
use bonus_ledger::workflows::divergence::{
    parse_date, plan_corrections, write_report_to_path, BonusViewImporter, CorrectionMode,
    CorrectionPlan, DetectionOutcome, DetectionQuery, DivergenceDetector,
};
use chrono::{Local, NaiveDate};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(
    name = "bonus-ledger",
    about = "Classify vehicle sale bonuses and audit the bonus view for divergences",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Label every sale of a controlling export with its bonus utilization
    Classify(ClassifyArgs),
    /// Detect divergences in a bonus view export and plan corrections
    Divergences(DivergenceArgs),
}

#[derive(Args, Debug)]
struct ClassifyArgs {
    /// Sale export (CSV)
    #[arg(long)]
    input: PathBuf,
    /// Write `invoice_id,bonus_label` rows here instead of stdout
    #[arg(long)]
    output: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct DivergenceArgs {
    /// Bonus view export (CSV)
    #[arg(long)]
    input: PathBuf,
    /// First processing date to consider (YYYY-MM-DD)
    #[arg(long, value_parser = parse_cli_date, requires = "to")]
    from: Option<NaiveDate>,
    /// Last processing date to consider (YYYY-MM-DD)
    #[arg(long, value_parser = parse_cli_date, requires = "from")]
    to: Option<NaiveDate>,
    /// Reference date for pending ageing (defaults to today)
    #[arg(long, value_parser = parse_cli_date)]
    as_of: Option<NaiveDate>,
    /// Override BONUS_MIN_CONFIDENCE (0 to 1)
    #[arg(long, value_parser = parse_cli_confidence)]
    min_confidence: Option<f32>,
    /// `manual` only queues corrections, `auto` applies trade marketing fixes
    #[arg(long, default_value_t = CorrectionMode::Manual)]
    mode: CorrectionMode,
    /// Write the divergence CSV report to this path
    #[arg(long)]
    report: Option<PathBuf>,
    /// Print the outcome as JSON instead of text
    #[arg(long)]
    json: bool,
}

/// Totals of one `classify` run.
#[derive(Debug, Default, PartialEq, Eq)]
struct ClassifySummary {
    written: usize,
    rejected: usize,
}

#[derive(Serialize)]
struct DivergenceSummary<'a> {
    outcome: &'a DetectionOutcome,
    corrections: &'a CorrectionPlan,
}

fn main() {
    if let Err(err) = run_cli() {
        eprintln!("application error: {err}");
        std::process::exit(1);
    }
}

fn run_cli() -> Result<(), AppError> {
    let cli = Cli::parse();
    let config = AppConfig::load()?;
    telemetry::init(&config.telemetry)?;
    info!(environment = ?config.environment, "bonus ledger starting");

    match cli.command {
        Command::Classify(args) => run_classify(args),
        Command::Divergences(args) => run_divergences(args, config),
    }
}

fn parse_cli_date(raw: &str) -> Result<NaiveDate, String> {
    parse_date(raw).ok_or_else(|| format!("failed to parse '{raw}' as YYYY-MM-DD"))
}

fn parse_cli_confidence(raw: &str) -> Result<f32, String> {
    parse_confidence(raw).ok_or_else(|| format!("'{raw}' is not a confidence between 0 and 1"))
}

fn run_classify(args: ClassifyArgs) -> Result<(), AppError> {
    let input = std::fs::File::open(&args.input)?;
    let sink: Box<dyn Write> = match &args.output {
        Some(path) => Box::new(std::fs::File::create(path)?),
        None => Box::new(std::io::stdout().lock()),
    };

    let summary = classify_sales(input, sink)?;
    info!(written = summary.written, "classification finished");
    if summary.rejected > 0 {
        warn!(rejected = summary.rejected, "rows rejected");
    }

    Ok(())
}

/// Records every sale row, then writes one `invoice_id,bonus_label` line per invoice
/// in order of first appearance. Rows that fail to parse or carry invalid codes are
/// counted and skipped.
fn classify_sales<R: Read, W: Write>(reader: R, writer: W) -> Result<ClassifySummary, AppError> {
    let service = BonusLedgerService::new(Arc::new(InMemorySaleRepository::new()));
    let mut summary = ClassifySummary::default();
    let mut seen = HashSet::new();
    let mut order: Vec<InvoiceId> = Vec::new();

    for parsed in SaleImporter::rows_from_reader(reader) {
        let row = match parsed {
            Ok(row) => row,
            Err(err) => {
                summary.rejected += 1;
                warn!(error = %err, "row skipped");
                continue;
            }
        };

        // Later rows of the same invoice supersede earlier ones.
        let result = match service.record(row.clone()) {
            Err(LedgerServiceError::Repository(RepositoryError::Conflict)) => service.amend(row),
            other => other,
        };

        match result {
            Ok(entry) => {
                if seen.insert(entry.record.invoice_id.clone()) {
                    order.push(entry.record.invoice_id);
                }
            }
            Err(LedgerServiceError::InvalidRecord(err)) => {
                summary.rejected += 1;
                warn!(error = %err, "row skipped");
            }
            Err(err) => return Err(err.into()),
        }
    }

    let mut csv_writer = csv::Writer::from_writer(writer);
    csv_writer.write_record(["invoice_id", "bonus_label"])?;
    for invoice_id in &order {
        let entry = service.get(invoice_id)?;
        let label = entry.label.to_string();
        csv_writer.write_record([invoice_id.0.as_str(), label.as_str()])?;
        summary.written += 1;
    }
    csv_writer.flush()?;

    for (label, count) in service.label_counts()? {
        info!(%label, count, "label total");
    }

    Ok(summary)
}

fn run_divergences(args: DivergenceArgs, config: AppConfig) -> Result<(), AppError> {
    let mut divergence_config = config.divergence;
    if let Some(min_confidence) = args.min_confidence {
        divergence_config.min_confidence = min_confidence;
    }
    let auto_apply_confidence = divergence_config.auto_apply_confidence;

    let rows = BonusViewImporter::from_path(&args.input)?;
    let as_of = args.as_of.unwrap_or_else(|| Local::now().date_naive());
    let query = match (args.from, args.to) {
        (Some(from), Some(to)) => DetectionQuery::between(from, to, as_of),
        _ => DetectionQuery::as_of(as_of),
    };

    let outcome = DivergenceDetector::new(divergence_config).detect(&rows, &query);
    let plan = plan_corrections(&outcome.divergences, args.mode, auto_apply_confidence);

    if let Some(path) = &args.report {
        write_report_to_path(&outcome.divergences, path)?;
    }

    if args.json {
        let summary = DivergenceSummary {
            outcome: &outcome,
            corrections: &plan,
        };
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        render_divergences(&outcome, &plan, as_of);
    }

    Ok(())
}

fn render_divergences(outcome: &DetectionOutcome, plan: &CorrectionPlan, as_of: NaiveDate) {
    println!("Bonus view divergences (as of {as_of})");
    println!(
        "Pending verification backlog: {} ({})",
        outcome.pending_backlog,
        outcome.criticality.label()
    );

    if outcome.divergences.is_empty() {
        println!("\nDivergences: none");
        return;
    }

    println!("\nDivergences by kind");
    for (kind, count) in outcome.count_by_kind() {
        println!("- {}: {}", kind.code(), count);
    }

    println!("\nDetail");
    for divergence in &outcome.divergences {
        let current = divergence
            .current_value
            .as_ref()
            .map(ToString::to_string)
            .unwrap_or_else(|| "-".to_string());
        let expected = divergence
            .expected_value
            .as_ref()
            .map(ToString::to_string)
            .unwrap_or_else(|| "-".to_string());
        println!(
            "- {} | {} | {}: {} -> {} | confidence {:.2} | {}",
            divergence.invoice_id,
            divergence.kind.code(),
            divergence.field,
            current,
            expected,
            divergence.confidence,
            divergence.violated_rules.join(", ")
        );
    }

    println!(
        "\nCorrections: {} auto-applied, {} pending approval",
        plan.auto_applied, plan.pending_approval
    );
}
