//! Billing models: fee structures, bills and the payment ledger
//!
//! Money is integer cents throughout. A bill's paid-to-date is always the
//! sum of its payment rows; payments are append-only and never edited.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};

/// Monetary amount in cents
pub type Cents = i64;

/// Canonical `YYYY-MM` billing month key.
///
/// Longer inputs (e.g. full dates) are truncated to their month prefix
/// before validation. Deserialization goes through `parse`, so a wire
/// value is canonical by construction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct MonthKey(String);

impl MonthKey {
    pub fn parse(input: &str) -> Result<Self> {
        let key = if input.len() > 7 {
            input.get(..7).ok_or_else(|| {
                Error::Validation(format!("Invalid month '{}', expected YYYY-MM", input))
            })?
        } else {
            input
        };
        let bytes = key.as_bytes();
        let well_formed = bytes.len() == 7
            && bytes[4] == b'-'
            && bytes[..4].iter().all(|b| b.is_ascii_digit())
            && bytes[5..].iter().all(|b| b.is_ascii_digit());
        if !well_formed {
            return Err(Error::Validation(format!(
                "Invalid month '{}', expected YYYY-MM",
                input
            )));
        }
        let month: u8 = key[5..].parse().unwrap_or(0);
        if !(1..=12).contains(&month) {
            return Err(Error::Validation(format!("Invalid month '{}'", input)));
        }
        Ok(Self(key.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for MonthKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for MonthKey {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        MonthKey::parse(&raw).map_err(serde::de::Error::custom)
    }
}

/// Named template used to batch-generate monthly bills
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeeStructure {
    pub id: Uuid,
    pub name: String,
    pub monthly_amount: Cents,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl FeeStructure {
    pub fn new(name: String, monthly_amount: Cents) -> Self {
        Self {
            id: Uuid::new_v4(),
            name,
            monthly_amount,
            is_active: true,
            created_at: Utc::now(),
        }
    }
}

/// Bill status, derived solely from the cumulative payment sum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BillStatus {
    Unpaid,
    Partial,
    Paid,
}

impl BillStatus {
    /// The state machine of the payment ledger: the boundary paid == total
    /// maps to Paid, and since the ledger only grows Paid never regresses.
    pub fn from_paid(paid: Cents, total: Cents) -> Self {
        if paid <= 0 {
            BillStatus::Unpaid
        } else if paid < total {
            BillStatus::Partial
        } else {
            BillStatus::Paid
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BillStatus::Unpaid => "UNPAID",
            BillStatus::Partial => "PARTIAL",
            BillStatus::Paid => "PAID",
        }
    }
}

impl std::fmt::Display for BillStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One bill per (student, month)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bill {
    pub id: Uuid,
    pub student_id: Uuid,
    pub month: MonthKey,
    pub amount: Cents,
    pub discount: Cents,
    /// max(0, amount - discount), fixed at creation
    pub total: Cents,
    pub status: BillStatus,
    pub created_at: DateTime<Utc>,
}

impl Bill {
    pub fn new(student_id: Uuid, month: MonthKey, amount: Cents, discount: Cents) -> Self {
        Self {
            id: Uuid::new_v4(),
            student_id,
            month,
            amount,
            discount,
            total: (amount - discount).max(0),
            status: BillStatus::Unpaid,
            created_at: Utc::now(),
        }
    }
}

/// Append-only ledger entry against a bill
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    pub id: Uuid,
    pub bill_id: Uuid,
    pub amount: Cents,
    pub method: String,
    pub reference: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Payment {
    pub fn new(bill_id: Uuid, amount: Cents, method: String, reference: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            bill_id,
            amount,
            method,
            reference,
            created_at: Utc::now(),
        }
    }
}

/// Bill joined to its payment aggregate (list views)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BillWithBalance {
    pub bill: Bill,
    pub student_name: String,
    pub paid: Cents,
    /// max(0, total - paid); overpayment is clamped for display
    pub balance: Cents,
}

/// Per-student failure during batch generation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateFailure {
    pub student_id: Uuid,
    pub reason: String,
}

/// Structured result of a monthly batch generation run.
///
/// Expected duplicates and real failures are reported separately.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerateOutcome {
    pub created: u32,
    pub skipped_duplicate: u32,
    pub failed: Vec<GenerateFailure>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_month_key_normalization() {
        assert_eq!(MonthKey::parse("2025-10").unwrap().as_str(), "2025-10");
        assert_eq!(MonthKey::parse("2025-10-15").unwrap().as_str(), "2025-10");
        assert!(MonthKey::parse("2025-13").is_err());
        assert!(MonthKey::parse("2025-00").is_err());
        assert!(MonthKey::parse("202510").is_err());
        assert!(MonthKey::parse("").is_err());
        // Multi-byte input straddling the truncation point must be a
        // Validation error, not a panic
        assert!(MonthKey::parse("2025-0é").is_err());
        assert!(MonthKey::parse("2025-1é-01").is_err());
    }

    #[test]
    fn test_month_key_deserialization_is_canonical() {
        // Wire values go through parse: full dates normalize, junk fails
        let key: MonthKey = serde_json::from_str("\"2025-10-15\"").unwrap();
        assert_eq!(key.as_str(), "2025-10");
        assert!(serde_json::from_str::<MonthKey>("\"definitely-not-a-month\"").is_err());
        assert!(serde_json::from_str::<MonthKey>("\"2025-0é\"").is_err());

        let back = serde_json::to_string(&key).unwrap();
        assert_eq!(back, "\"2025-10\"");
    }

    #[test]
    fn test_bill_total_floored() {
        let month = MonthKey::parse("2025-10").unwrap();
        let bill = Bill::new(Uuid::new_v4(), month, 50_000, 60_000);
        assert_eq!(bill.total, 0);
        assert_eq!(bill.status, BillStatus::Unpaid);
    }

    #[test]
    fn test_status_boundaries() {
        assert_eq!(BillStatus::from_paid(0, 1000), BillStatus::Unpaid);
        assert_eq!(BillStatus::from_paid(-50, 1000), BillStatus::Unpaid);
        assert_eq!(BillStatus::from_paid(1, 1000), BillStatus::Partial);
        assert_eq!(BillStatus::from_paid(999, 1000), BillStatus::Partial);
        // Exact boundary maps to Paid, not Partial
        assert_eq!(BillStatus::from_paid(1000, 1000), BillStatus::Paid);
        assert_eq!(BillStatus::from_paid(1050, 1000), BillStatus::Paid);
    }
}
