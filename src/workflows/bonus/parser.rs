use std::io::Read;
use std::path::Path;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer};

use super::domain::SaleRow;

/// Failure while reading a sale export.
#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("failed to read sale export: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid sale CSV data: {0}")]
    Csv(#[from] csv::Error),
}

/// Loads sale rows from the controlling CSV export.
pub struct SaleImporter;

impl SaleImporter {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Vec<SaleRow>, ImportError> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(file)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Vec<SaleRow>, ImportError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);

        let mut rows = Vec::new();
        for row in csv_reader.deserialize::<SaleRow>() {
            rows.push(row?);
        }

        Ok(rows)
    }

    /// Parses every row independently so one malformed cell only costs its own row.
    /// Each error keeps its CSV position for reporting.
    pub fn rows_from_reader<R: Read>(reader: R) -> Vec<Result<SaleRow, csv::Error>> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);

        csv_reader.deserialize::<SaleRow>().collect()
    }
}

pub(crate) fn empty_string_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let opt = Option::<String>::deserialize(deserializer)?;
    Ok(opt
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty()))
}

pub(crate) fn optional_flag<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    match empty_string_as_none(deserializer)? {
        None => Ok(None),
        Some(raw) => parse_flag(&raw)
            .map(Some)
            .ok_or_else(|| D::Error::custom(format!("invalid boolean '{raw}'"))),
    }
}

pub(crate) fn flag_or_false<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(optional_flag(deserializer)?.unwrap_or(false))
}

pub(crate) fn optional_amount<'de, D>(deserializer: D) -> Result<Option<Decimal>, D::Error>
where
    D: Deserializer<'de>,
{
    match empty_string_as_none(deserializer)? {
        None => Ok(None),
        Some(raw) => Decimal::from_str(&raw)
            .map(Some)
            .map_err(|err| D::Error::custom(format!("invalid amount '{raw}': {err}"))),
    }
}

/// Accepts the spellings found in warehouse exports (`t`, `sim`, `1`, ...).
fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "t" | "1" | "yes" | "y" | "sim" | "s" => Some(true),
        "false" | "f" | "0" | "no" | "n" | "nao" | "não" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
pub(crate) fn parse_flag_for_tests(raw: &str) -> Option<bool> {
    parse_flag(raw)
}
