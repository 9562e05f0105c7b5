use std::fmt;

use rust_decimal::Decimal;
use serde::{Serialize, Serializer};

use super::domain::{BonusFlag, InvoiceStatus, SaleRecord, TransactionType};

/// Order in which active flags are listed in a bonus label.
pub const FLAG_PRECEDENCE: [BonusFlag; 9] = [
    BonusFlag::ZeroRateTax,
    BonusFlag::IpvaRefund,
    BonusFlag::Wallbox,
    BonusFlag::PortableCharger,
    BonusFlag::Insurance,
    BonusFlag::TradeIn,
    BonusFlag::Equalization,
    BonusFlag::Retail,
    BonusFlag::PendingValidation,
];

pub const TRADE_MARKETING_LABEL: &str = "Trade Marketing";

/// Fixed outcomes that replace the bonus list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BonusStatus {
    ReturnVehicle,
    Reinvoiced,
    DirectSale,
    CancelledSale,
    PendingVerification,
    NoBonus,
}

impl BonusStatus {
    pub fn label(&self) -> &'static str {
        match self {
            BonusStatus::ReturnVehicle => "Return Vehicle",
            BonusStatus::Reinvoiced => "Reinvoiced",
            BonusStatus::DirectSale => "Direct Sale",
            BonusStatus::CancelledSale => "Cancelled Sale",
            BonusStatus::PendingVerification => "Pending Verification",
            BonusStatus::NoBonus => "No Bonus",
        }
    }
}

/// One contributor to a bonus list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BonusCategory {
    Flag(BonusFlag),
    TradeMarketing,
}

impl BonusCategory {
    pub fn label(&self) -> &'static str {
        match self {
            BonusCategory::Flag(flag) => flag.label(),
            BonusCategory::TradeMarketing => TRADE_MARKETING_LABEL,
        }
    }
}

/// Non-empty, ordered list of bonus categories.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BonusList(Vec<BonusCategory>);

impl BonusList {
    fn new(categories: Vec<BonusCategory>) -> Option<Self> {
        if categories.is_empty() {
            None
        } else {
            Some(Self(categories))
        }
    }

    pub fn categories(&self) -> &[BonusCategory] {
        &self.0
    }
}

/// Bonus utilization written back onto the sale.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum BonusLabel {
    Status(BonusStatus),
    Bonuses(BonusList),
}

impl BonusLabel {
    /// Contributing categories; empty for status labels.
    pub fn categories(&self) -> &[BonusCategory] {
        match self {
            BonusLabel::Status(_) => &[],
            BonusLabel::Bonuses(list) => list.categories(),
        }
    }

    pub fn status(&self) -> Option<BonusStatus> {
        match self {
            BonusLabel::Status(status) => Some(*status),
            BonusLabel::Bonuses(_) => None,
        }
    }
}

impl fmt::Display for BonusLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BonusLabel::Status(status) => f.write_str(status.label()),
            BonusLabel::Bonuses(list) => {
                for (index, category) in list.categories().iter().enumerate() {
                    if index > 0 {
                        f.write_str(", ")?;
                    }
                    f.write_str(category.label())?;
                }
                Ok(())
            }
        }
    }
}

impl Serialize for BonusLabel {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Sale dispositions that short-circuit bonus computation, in precedence order.
fn disposition(record: &SaleRecord) -> Option<BonusStatus> {
    if record.transaction_type == Some(TransactionType::Return) {
        return Some(BonusStatus::ReturnVehicle);
    }

    if record.is_reinvoiced {
        return Some(BonusStatus::Reinvoiced);
    }

    if record.transaction_type == Some(TransactionType::DirectSale) {
        return Some(BonusStatus::DirectSale);
    }

    if record.invoice_status == Some(InvoiceStatus::Cancelled) {
        return Some(BonusStatus::CancelledSale);
    }

    None
}

pub(crate) fn classify(record: &SaleRecord) -> BonusLabel {
    if let Some(status) = disposition(record) {
        return BonusLabel::Status(status);
    }

    let trade_marketing = record.trade_marketing_amount.unwrap_or(Decimal::ZERO);
    if record.flags.all_unset() && trade_marketing.is_zero() {
        return BonusLabel::Status(BonusStatus::PendingVerification);
    }

    let mut categories: Vec<BonusCategory> = FLAG_PRECEDENCE
        .iter()
        .filter(|flag| record.flags.get(**flag) == Some(true))
        .map(|flag| BonusCategory::Flag(*flag))
        .collect();

    if trade_marketing > Decimal::ZERO {
        categories.push(BonusCategory::TradeMarketing);
    }

    match BonusList::new(categories) {
        Some(list) => BonusLabel::Bonuses(list),
        None => BonusLabel::Status(BonusStatus::NoBonus),
    }
}
