use std::sync::Arc;

use rust_decimal::Decimal;

use crate::workflows::bonus::domain::{
    BonusFlag, InvoiceStatus, SaleRecord, SaleRow, TransactionType,
};
use crate::workflows::bonus::repository::InMemorySaleRepository;
use crate::workflows::bonus::rules::FLAG_PRECEDENCE;
use crate::workflows::bonus::service::BonusLedgerService;

/// Ordinary sale with no flags filled in yet.
pub(super) fn sale(suffix: &str) -> SaleRecord {
    let mut record = SaleRecord::new(format!("NF-{suffix}"));
    record.chassis = Some(format!("LGXCE4CB0R{suffix}"));
    record.transaction_type = Some(TransactionType::Sale);
    record.invoice_status = Some(InvoiceStatus::Issued);
    record
}

pub(super) fn with_flags(mut record: SaleRecord, flags: &[BonusFlag]) -> SaleRecord {
    for flag in flags {
        record.flags.set(*flag, Some(true));
    }
    record
}

/// Every flag explicitly set to `false`.
pub(super) fn all_flags_false(mut record: SaleRecord) -> SaleRecord {
    for flag in FLAG_PRECEDENCE {
        record.flags.set(flag, Some(false));
    }
    record
}

/// Every flag explicitly set to `true`, trade marketing included.
pub(super) fn fully_loaded(suffix: &str) -> SaleRecord {
    let mut record = with_flags(sale(suffix), &FLAG_PRECEDENCE);
    record.trade_marketing_amount = Some(Decimal::from(1_500));
    record
}

pub(super) fn amount(value: i64) -> Option<Decimal> {
    Some(Decimal::from(value))
}

pub(super) fn row(invoice_id: &str) -> SaleRow {
    SaleRow {
        invoice_id: invoice_id.to_string(),
        transaction_type: Some("sale".to_string()),
        invoice_status: Some("issued".to_string()),
        ..SaleRow::default()
    }
}

pub(super) fn ledger() -> (Arc<InMemorySaleRepository>, BonusLedgerService<InMemorySaleRepository>)
{
    let repository = Arc::new(InMemorySaleRepository::new());
    let service = BonusLedgerService::new(repository.clone());
    (repository, service)
}
