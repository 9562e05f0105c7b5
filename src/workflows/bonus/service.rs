use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{debug, info, warn};

use super::domain::{InvalidRecordError, InvoiceId, SaleRecord, SaleRow};
use super::repository::{LedgerEntry, RepositoryError, SaleRepository};
use super::BonusClassifier;

/// Write path for sales: every insert or amendment recomputes the bonus label.
pub struct BonusLedgerService<R> {
    repository: Arc<R>,
    classifier: BonusClassifier,
}

impl<R> BonusLedgerService<R>
where
    R: SaleRepository + 'static,
{
    pub fn new(repository: Arc<R>) -> Self {
        Self {
            repository,
            classifier: BonusClassifier,
        }
    }

    /// Validate, classify and store a new sale.
    pub fn record(&self, row: SaleRow) -> Result<LedgerEntry, LedgerServiceError> {
        let entry = self.label_row(row)?;
        let stored = self.repository.insert(entry)?;
        info!(invoice = %stored.record.invoice_id, label = %stored.label, "sale recorded");
        Ok(stored)
    }

    /// Replace an existing sale and reclassify it.
    pub fn amend(&self, row: SaleRow) -> Result<LedgerEntry, LedgerServiceError> {
        let entry = self.label_row(row)?;
        let previous = self
            .repository
            .fetch(&entry.record.invoice_id)?
            .ok_or(RepositoryError::NotFound)?;

        self.repository.update(entry.clone())?;

        if previous.label != entry.label {
            info!(
                invoice = %entry.record.invoice_id,
                from = %previous.label,
                to = %entry.label,
                "bonus label changed"
            );
        }
        Ok(entry)
    }

    pub fn get(&self, invoice_id: &InvoiceId) -> Result<LedgerEntry, LedgerServiceError> {
        let entry = self
            .repository
            .fetch(invoice_id)?
            .ok_or(RepositoryError::NotFound)?;
        Ok(entry)
    }

    /// Number of stored sales per rendered label.
    pub fn label_counts(&self) -> Result<BTreeMap<String, usize>, LedgerServiceError> {
        let mut counts = BTreeMap::new();
        for entry in self.repository.all()? {
            *counts.entry(entry.label.to_string()).or_insert(0) += 1;
        }
        Ok(counts)
    }

    fn label_row(&self, row: SaleRow) -> Result<LedgerEntry, LedgerServiceError> {
        let invoice_id = row.invoice_id.clone();
        let record = SaleRecord::try_from(row).map_err(|err| {
            warn!(invoice = %invoice_id, error = %err, "sale rejected");
            err
        })?;
        let label = self.classifier.classify(&record);
        debug!(invoice = %record.invoice_id, label = %label, "sale classified");
        Ok(LedgerEntry { record, label })
    }
}

/// Error raised by the ledger service.
#[derive(Debug, thiserror::Error)]
pub enum LedgerServiceError {
    #[error(transparent)]
    InvalidRecord(#[from] InvalidRecordError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}
