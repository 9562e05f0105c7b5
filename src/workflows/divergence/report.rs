use std::io::Write;
use std::path::Path;

use serde::Serialize;
use tracing::info;

use super::domain::Divergence;

#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("failed to write divergence report: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to encode divergence report: {0}")]
    Csv(#[from] csv::Error),
}

#[derive(Serialize)]
struct ReportRow<'a> {
    invoice_id: &'a str,
    kind: &'static str,
    field: &'static str,
    current_value: String,
    expected_value: String,
    period: &'a str,
    confidence: String,
    violated_rules: String,
}

impl<'a> From<&'a Divergence> for ReportRow<'a> {
    fn from(divergence: &'a Divergence) -> Self {
        Self {
            invoice_id: &divergence.invoice_id.0,
            kind: divergence.kind.code(),
            field: divergence.field,
            current_value: divergence
                .current_value
                .as_ref()
                .map(ToString::to_string)
                .unwrap_or_default(),
            expected_value: divergence
                .expected_value
                .as_ref()
                .map(ToString::to_string)
                .unwrap_or_default(),
            period: divergence.period.as_deref().unwrap_or_default(),
            confidence: format!("{:.2}", divergence.confidence),
            violated_rules: divergence.violated_rules.join(", "),
        }
    }
}

/// Writes one CSV line per divergence, header included even when empty.
pub fn write_report<W: Write>(divergences: &[Divergence], writer: W) -> Result<(), ReportError> {
    let mut csv_writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(writer);

    csv_writer.write_record([
        "invoice_id",
        "kind",
        "field",
        "current_value",
        "expected_value",
        "period",
        "confidence",
        "violated_rules",
    ])?;
    for divergence in divergences {
        csv_writer.serialize(ReportRow::from(divergence))?;
    }
    csv_writer.flush()?;
    Ok(())
}

pub fn write_report_to_path<P: AsRef<Path>>(
    divergences: &[Divergence],
    path: P,
) -> Result<(), ReportError> {
    let file = std::fs::File::create(path.as_ref())?;
    write_report(divergences, file)?;
    info!(path = %path.as_ref().display(), rows = divergences.len(), "divergence report written");
    Ok(())
}
