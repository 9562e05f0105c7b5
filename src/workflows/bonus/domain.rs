use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::parser::{empty_string_as_none, flag_or_false, optional_amount, optional_flag};

/// External invoice identifier (`idnfsexterno` in the warehouse).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InvoiceId(pub String);

impl fmt::Display for InvoiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Raised when an enumerated field carries a code outside its domain.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid {field} code '{value}'")]
pub struct InvalidRecordError {
    pub field: &'static str,
    pub value: String,
}

/// Commercial nature of the sale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    Sale,
    Return,
    DirectSale,
    FleetSale,
}

impl TransactionType {
    pub fn code(&self) -> &'static str {
        match self {
            TransactionType::Sale => "sale",
            TransactionType::Return => "return",
            TransactionType::DirectSale => "direct_sale",
            TransactionType::FleetSale => "fleet_sale",
        }
    }
}

impl FromStr for TransactionType {
    type Err = InvalidRecordError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "sale" => Ok(Self::Sale),
            "return" => Ok(Self::Return),
            "direct_sale" => Ok(Self::DirectSale),
            "fleet_sale" => Ok(Self::FleetSale),
            _ => Err(InvalidRecordError {
                field: "transaction_type",
                value: value.to_string(),
            }),
        }
    }
}

/// Fiscal state of the invoice backing the sale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    Issued,
    Pending,
    Cancelled,
}

impl InvoiceStatus {
    pub fn code(&self) -> &'static str {
        match self {
            InvoiceStatus::Issued => "issued",
            InvoiceStatus::Pending => "pending",
            InvoiceStatus::Cancelled => "cancelled",
        }
    }
}

impl FromStr for InvoiceStatus {
    type Err = InvalidRecordError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "issued" => Ok(Self::Issued),
            "pending" => Ok(Self::Pending),
            "cancelled" => Ok(Self::Cancelled),
            _ => Err(InvalidRecordError {
                field: "invoice_status",
                value: value.to_string(),
            }),
        }
    }
}

/// Bonus programs a sale can draw from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BonusFlag {
    ZeroRateTax,
    IpvaRefund,
    Wallbox,
    PortableCharger,
    Insurance,
    TradeIn,
    Equalization,
    Retail,
    PendingValidation,
}

impl BonusFlag {
    pub fn label(&self) -> &'static str {
        match self {
            BonusFlag::ZeroRateTax => "Taxa Zero",
            BonusFlag::IpvaRefund => "IPVA",
            BonusFlag::Wallbox => "Wallbox",
            BonusFlag::PortableCharger => "Carregador Portátil",
            BonusFlag::Insurance => "Seguro",
            BonusFlag::TradeIn => "Troca",
            BonusFlag::Equalization => "Equalização",
            BonusFlag::Retail => "Varejo",
            BonusFlag::PendingValidation => "Pendente Validação",
        }
    }
}

/// Eligibility flags as entered by the controlling team.
///
/// Each flag is tri-state: `None` means nobody has filled it in yet, which is
/// not the same as an explicit `Some(false)`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BonusFlags {
    pub zero_rate_tax: Option<bool>,
    pub ipva_refund: Option<bool>,
    pub wallbox: Option<bool>,
    pub portable_charger: Option<bool>,
    pub insurance: Option<bool>,
    pub trade_in: Option<bool>,
    pub equalization: Option<bool>,
    pub retail: Option<bool>,
    pub pending_validation: Option<bool>,
}

impl BonusFlags {
    pub fn get(&self, flag: BonusFlag) -> Option<bool> {
        match flag {
            BonusFlag::ZeroRateTax => self.zero_rate_tax,
            BonusFlag::IpvaRefund => self.ipva_refund,
            BonusFlag::Wallbox => self.wallbox,
            BonusFlag::PortableCharger => self.portable_charger,
            BonusFlag::Insurance => self.insurance,
            BonusFlag::TradeIn => self.trade_in,
            BonusFlag::Equalization => self.equalization,
            BonusFlag::Retail => self.retail,
            BonusFlag::PendingValidation => self.pending_validation,
        }
    }

    pub fn set(&mut self, flag: BonusFlag, value: Option<bool>) {
        let slot = match flag {
            BonusFlag::ZeroRateTax => &mut self.zero_rate_tax,
            BonusFlag::IpvaRefund => &mut self.ipva_refund,
            BonusFlag::Wallbox => &mut self.wallbox,
            BonusFlag::PortableCharger => &mut self.portable_charger,
            BonusFlag::Insurance => &mut self.insurance,
            BonusFlag::TradeIn => &mut self.trade_in,
            BonusFlag::Equalization => &mut self.equalization,
            BonusFlag::Retail => &mut self.retail,
            BonusFlag::PendingValidation => &mut self.pending_validation,
        };
        *slot = value;
    }

    /// True when no flag has been filled in, whatever its value.
    pub fn all_unset(&self) -> bool {
        [
            self.zero_rate_tax,
            self.ipva_refund,
            self.wallbox,
            self.portable_charger,
            self.insurance,
            self.trade_in,
            self.equalization,
            self.retail,
            self.pending_validation,
        ]
        .iter()
        .all(Option::is_none)
    }
}

/// Validated sale ready for classification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleRecord {
    pub invoice_id: InvoiceId,
    pub chassis: Option<String>,
    pub transaction_type: Option<TransactionType>,
    pub invoice_status: Option<InvoiceStatus>,
    pub is_reinvoiced: bool,
    pub flags: BonusFlags,
    pub trade_marketing_amount: Option<Decimal>,
}

impl SaleRecord {
    pub fn new(invoice_id: impl Into<String>) -> Self {
        Self {
            invoice_id: InvoiceId(invoice_id.into()),
            chassis: None,
            transaction_type: None,
            invoice_status: None,
            is_reinvoiced: false,
            flags: BonusFlags::default(),
            trade_marketing_amount: None,
        }
    }
}

/// Sale row as it arrives from the controlling export, codes still unchecked.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SaleRow {
    pub invoice_id: String,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub chassis: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub transaction_type: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub invoice_status: Option<String>,
    #[serde(default, deserialize_with = "flag_or_false")]
    pub is_reinvoiced: bool,
    #[serde(default, deserialize_with = "optional_flag")]
    pub zero_rate_tax: Option<bool>,
    #[serde(default, deserialize_with = "optional_flag")]
    pub ipva_refund: Option<bool>,
    #[serde(default, deserialize_with = "optional_flag")]
    pub wallbox: Option<bool>,
    #[serde(default, deserialize_with = "optional_flag")]
    pub portable_charger: Option<bool>,
    #[serde(default, deserialize_with = "optional_flag")]
    pub insurance: Option<bool>,
    #[serde(default, deserialize_with = "optional_flag")]
    pub trade_in: Option<bool>,
    #[serde(default, deserialize_with = "optional_flag")]
    pub equalization: Option<bool>,
    #[serde(default, deserialize_with = "optional_flag")]
    pub retail: Option<bool>,
    #[serde(default, deserialize_with = "optional_flag")]
    pub pending_validation: Option<bool>,
    #[serde(default, deserialize_with = "optional_amount")]
    pub trade_marketing_amount: Option<Decimal>,
}

impl TryFrom<SaleRow> for SaleRecord {
    type Error = InvalidRecordError;

    fn try_from(row: SaleRow) -> Result<Self, Self::Error> {
        let transaction_type = blank_as_none(row.transaction_type)
            .map(|code| code.parse::<TransactionType>())
            .transpose()?;
        let invoice_status = blank_as_none(row.invoice_status)
            .map(|code| code.parse::<InvoiceStatus>())
            .transpose()?;

        Ok(Self {
            invoice_id: InvoiceId(row.invoice_id.trim().to_string()),
            chassis: blank_as_none(row.chassis),
            transaction_type,
            invoice_status,
            is_reinvoiced: row.is_reinvoiced,
            flags: BonusFlags {
                zero_rate_tax: row.zero_rate_tax,
                ipva_refund: row.ipva_refund,
                wallbox: row.wallbox,
                portable_charger: row.portable_charger,
                insurance: row.insurance,
                trade_in: row.trade_in,
                equalization: row.equalization,
                retail: row.retail,
                pending_validation: row.pending_validation,
            },
            trade_marketing_amount: row.trade_marketing_amount,
        })
    }
}

fn blank_as_none(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.trim().is_empty())
}
