use std::collections::BTreeMap;
use std::sync::Mutex;

use serde::Serialize;

use super::domain::{InvoiceId, SaleRecord};
use super::rules::BonusLabel;

/// Stored sale together with the label derived when it was last written.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LedgerEntry {
    pub record: SaleRecord,
    pub label: BonusLabel,
}

/// Storage abstraction so the write path can be exercised without a database.
pub trait SaleRepository: Send + Sync {
    fn insert(&self, entry: LedgerEntry) -> Result<LedgerEntry, RepositoryError>;
    fn update(&self, entry: LedgerEntry) -> Result<(), RepositoryError>;
    fn fetch(&self, id: &InvoiceId) -> Result<Option<LedgerEntry>, RepositoryError>;
    fn all(&self) -> Result<Vec<LedgerEntry>, RepositoryError>;
}

/// Error enumeration for repository failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("sale already recorded")]
    Conflict,
    #[error("sale not found")]
    NotFound,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

/// Process-local repository, ordered by invoice id.
#[derive(Debug, Default)]
pub struct InMemorySaleRepository {
    entries: Mutex<BTreeMap<InvoiceId, LedgerEntry>>,
}

impl InMemorySaleRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(
        &self,
    ) -> Result<std::sync::MutexGuard<'_, BTreeMap<InvoiceId, LedgerEntry>>, RepositoryError>
    {
        self.entries
            .lock()
            .map_err(|_| RepositoryError::Unavailable("sale store lock poisoned".to_string()))
    }
}

impl SaleRepository for InMemorySaleRepository {
    fn insert(&self, entry: LedgerEntry) -> Result<LedgerEntry, RepositoryError> {
        let mut entries = self.lock()?;
        if entries.contains_key(&entry.record.invoice_id) {
            return Err(RepositoryError::Conflict);
        }
        entries.insert(entry.record.invoice_id.clone(), entry.clone());
        Ok(entry)
    }

    fn update(&self, entry: LedgerEntry) -> Result<(), RepositoryError> {
        let mut entries = self.lock()?;
        match entries.get_mut(&entry.record.invoice_id) {
            Some(existing) => {
                *existing = entry;
                Ok(())
            }
            None => Err(RepositoryError::NotFound),
        }
    }

    fn fetch(&self, id: &InvoiceId) -> Result<Option<LedgerEntry>, RepositoryError> {
        Ok(self.lock()?.get(id).cloned())
    }

    fn all(&self) -> Result<Vec<LedgerEntry>, RepositoryError> {
        Ok(self.lock()?.values().cloned().collect())
    }
}
