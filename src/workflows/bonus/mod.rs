//! Bonus utilization labels for vehicle sales.
//!
//! A sale is first checked against the dispositions that rule out any bonus
//! (return, reinvoice, direct sale, cancellation). Otherwise its eligibility
//! flags and trade marketing amount are folded into an ordered category list.

pub mod domain;
pub mod parser;
pub mod repository;
pub mod rules;
pub mod service;

#[cfg(test)]
mod tests;

pub use domain::{
    BonusFlag, BonusFlags, InvalidRecordError, InvoiceId, InvoiceStatus, SaleRecord, SaleRow,
    TransactionType,
};
pub use parser::{ImportError, SaleImporter};
pub use repository::{InMemorySaleRepository, LedgerEntry, RepositoryError, SaleRepository};
pub use rules::{
    BonusCategory, BonusLabel, BonusList, BonusStatus, FLAG_PRECEDENCE, TRADE_MARKETING_LABEL,
};
pub use service::{BonusLedgerService, LedgerServiceError};

/// Stateless classifier; safe to share across threads.
#[derive(Debug, Clone, Copy, Default)]
pub struct BonusClassifier;

impl BonusClassifier {
    pub fn classify(&self, record: &SaleRecord) -> BonusLabel {
        rules::classify(record)
    }

    /// Validates the raw codes of `row` before classifying it.
    pub fn classify_row(&self, row: SaleRow) -> Result<BonusLabel, InvalidRecordError> {
        let record = SaleRecord::try_from(row)?;
        Ok(self.classify(&record))
    }
}
