//! Billing storage operations: fee structures, bills and the payment ledger

use rusqlite::{params, Connection};
use tracing::instrument;
use uuid::Uuid;

use super::parse::{
    bill_status_from_str, map_constraint, parse_datetime, parse_uuid, OptionalExt,
};
use crate::error::Result;
use crate::models::{
    Bill, BillStatus, BillWithBalance, Cents, FeeStructure, MonthKey, Payment,
};

pub struct BillingStore<'a> {
    conn: &'a Connection,
}

impl<'a> BillingStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Create a fee structure
    #[instrument(skip(self, fee), fields(name = %fee.name))]
    pub fn create_fee_structure(&self, fee: &FeeStructure) -> Result<()> {
        self.conn.execute(
            "INSERT INTO fee_structures (id, name, monthly_amount, is_active, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                fee.id.to_string(),
                fee.name,
                fee.monthly_amount,
                fee.is_active as i32,
                fee.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Find an active fee structure by ID
    #[instrument(skip(self))]
    pub fn find_active_fee_structure(&self, id: Uuid) -> Result<Option<FeeStructure>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, monthly_amount, is_active, created_at \
             FROM fee_structures WHERE id = ?1 AND is_active = 1",
        )?;

        let fee = stmt
            .query_row(params![id.to_string()], |row| {
                Ok(FeeStructure {
                    id: parse_uuid(&row.get::<_, String>(0)?)?,
                    name: row.get(1)?,
                    monthly_amount: row.get(2)?,
                    is_active: row.get::<_, i32>(3)? != 0,
                    created_at: parse_datetime(&row.get::<_, String>(4)?)?,
                })
            })
            .optional()?;

        Ok(fee)
    }

    /// List active fee structures
    pub fn list_active_fee_structures(&self) -> Result<Vec<FeeStructure>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, monthly_amount, is_active, created_at \
             FROM fee_structures WHERE is_active = 1 ORDER BY name",
        )?;

        let fees = stmt
            .query_map([], |row| {
                Ok(FeeStructure {
                    id: parse_uuid(&row.get::<_, String>(0)?)?,
                    name: row.get(1)?,
                    monthly_amount: row.get(2)?,
                    is_active: row.get::<_, i32>(3)? != 0,
                    created_at: parse_datetime(&row.get::<_, String>(4)?)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(fees)
    }

    fn row_to_bill(row: &rusqlite::Row<'_>) -> std::result::Result<Bill, rusqlite::Error> {
        let month = MonthKey::parse(&row.get::<_, String>(2)?).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(
                2,
                rusqlite::types::Type::Text,
                Box::new(std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())),
            )
        })?;
        Ok(Bill {
            id: parse_uuid(&row.get::<_, String>(0)?)?,
            student_id: parse_uuid(&row.get::<_, String>(1)?)?,
            month,
            amount: row.get(3)?,
            discount: row.get(4)?,
            total: row.get(5)?,
            status: bill_status_from_str(&row.get::<_, String>(6)?)?,
            created_at: parse_datetime(&row.get::<_, String>(7)?)?,
        })
    }

    const BILL_COLUMNS: &'static str =
        "id, student_id, month_year, amount, discount, total, status, created_at";

    /// Insert a bill. Duplicate (student, month) fails with Conflict and
    /// leaves the existing bill unmodified.
    #[instrument(skip(self, bill), fields(student_id = %bill.student_id, month = %bill.month))]
    pub fn create_bill(&self, bill: &Bill) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO bills (id, student_id, month_year, amount, discount, total, status, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    bill.id.to_string(),
                    bill.student_id.to_string(),
                    bill.month.as_str(),
                    bill.amount,
                    bill.discount,
                    bill.total,
                    bill.status.as_str(),
                    bill.created_at.to_rfc3339(),
                ],
            )
            .map_err(|e| map_constraint(e, "Bill already exists for this month"))?;
        Ok(())
    }

    /// Find bill by ID
    #[instrument(skip(self))]
    pub fn find_bill(&self, id: Uuid) -> Result<Option<Bill>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM bills WHERE id = ?1",
            Self::BILL_COLUMNS
        ))?;

        let bill = stmt
            .query_row(params![id.to_string()], Self::row_to_bill)
            .optional()?;

        Ok(bill)
    }

    /// Persist a bill's derived status
    #[instrument(skip(self))]
    pub fn set_bill_status(&self, bill_id: Uuid, status: BillStatus) -> Result<()> {
        self.conn.execute(
            "UPDATE bills SET status = ?1 WHERE id = ?2",
            params![status.as_str(), bill_id.to_string()],
        )?;
        Ok(())
    }

    /// Append a payment to the ledger
    #[instrument(skip(self, payment), fields(bill_id = %payment.bill_id, amount = payment.amount))]
    pub fn create_payment(&self, payment: &Payment) -> Result<()> {
        self.conn.execute(
            "INSERT INTO payments (id, bill_id, amount, method, reference, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                payment.id.to_string(),
                payment.bill_id.to_string(),
                payment.amount,
                payment.method,
                payment.reference,
                payment.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Sum of all payments recorded against a bill
    pub fn paid_for_bill(&self, bill_id: Uuid) -> Result<Cents> {
        let paid: Cents = self.conn.query_row(
            "SELECT IFNULL(SUM(amount), 0) FROM payments WHERE bill_id = ?1",
            params![bill_id.to_string()],
            |row| row.get(0),
        )?;
        Ok(paid)
    }

    fn row_to_bill_with_balance(
        row: &rusqlite::Row<'_>,
    ) -> std::result::Result<BillWithBalance, rusqlite::Error> {
        let bill = Self::row_to_bill(row)?;
        let first: Option<String> = row.get(8)?;
        let last: Option<String> = row.get(9)?;
        let paid: Cents = row.get(10)?;
        let balance = (bill.total - paid).max(0);
        let student_name = format!(
            "{} {}",
            first.unwrap_or_default(),
            last.unwrap_or_default()
        )
        .trim()
        .to_string();
        Ok(BillWithBalance {
            bill,
            student_name,
            paid,
            balance,
        })
    }

    const BALANCE_QUERY: &'static str =
        "SELECT b.id, b.student_id, b.month_year, b.amount, b.discount, b.total, b.status,
                b.created_at, u.first_name, u.last_name, IFNULL(paidagg.paid, 0)
         FROM bills b
         INNER JOIN students s ON s.id = b.student_id
         INNER JOIN users u ON u.id = s.user_id
         LEFT JOIN (
             SELECT bill_id, SUM(amount) AS paid
             FROM payments
             GROUP BY bill_id
         ) paidagg ON paidagg.bill_id = b.id";

    /// Every bill joined to its payment aggregate
    #[instrument(skip(self))]
    pub fn list_bills_with_balance(&self) -> Result<Vec<BillWithBalance>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{} ORDER BY b.created_at DESC", Self::BALANCE_QUERY))?;

        let bills = stmt
            .query_map([], Self::row_to_bill_with_balance)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(bills)
    }

    /// One student's bills joined to their payment aggregate
    #[instrument(skip(self))]
    pub fn list_bills_for_student(&self, student_id: Uuid) -> Result<Vec<BillWithBalance>> {
        let mut stmt = self.conn.prepare(&format!(
            "{} WHERE b.student_id = ?1 ORDER BY b.created_at DESC",
            Self::BALANCE_QUERY
        ))?;

        let bills = stmt
            .query_map(params![student_id.to_string()], Self::row_to_bill_with_balance)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(bills)
    }
}
