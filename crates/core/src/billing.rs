//! Billing engine
//!
//! Bills and the append-only payment ledger. A bill's status is never set
//! directly; it is re-derived from the full payment sum inside the same
//! transaction as each ledger insert.

use rusqlite::Connection;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::{
    Actor, Bill, BillStatus, BillWithBalance, Cents, FeeStructure, GenerateFailure,
    GenerateOutcome, MonthKey, Payment, Role,
};
use crate::storage::{BillingStore, StudentStore};

pub struct BillingEngine<'a> {
    conn: &'a Connection,
}

impl<'a> BillingEngine<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Create one bill for a (student, month).
    ///
    /// total is fixed at creation as max(0, amount - discount). A second
    /// bill for the same key fails with Conflict and leaves the first
    /// unmodified.
    #[instrument(skip(self))]
    pub fn create_bill(
        &self,
        student_id: Uuid,
        month: MonthKey,
        amount: Cents,
        discount: Cents,
    ) -> Result<Uuid> {
        if amount < 0 || discount < 0 {
            return Err(Error::Validation(
                "Amount and discount must be non-negative".into(),
            ));
        }

        let tx = self.conn.unchecked_transaction()?;

        StudentStore::new(&tx)
            .find_by_id(student_id)?
            .ok_or_else(|| Error::NotFound("Student not found".into()))?;

        let bill = Bill::new(student_id, month, amount, discount);
        crate::invariants::assert_bill_invariants(&bill);
        BillingStore::new(&tx).create_bill(&bill)?;

        tx.commit()?;
        info!(bill_id = %bill.id, student_id = %student_id, total = bill.total, "bill created");
        Ok(bill.id)
    }

    /// Batch-generate one month's bills from a fee structure.
    ///
    /// Already-billed students are counted as skipped, not failed, so
    /// re-running a month is harmless and creates nothing.
    #[instrument(skip(self))]
    pub fn generate_monthly(
        &self,
        month: MonthKey,
        fee_structure_id: Uuid,
    ) -> Result<GenerateOutcome> {
        let fee = BillingStore::new(self.conn)
            .find_active_fee_structure(fee_structure_id)?
            .ok_or_else(|| Error::NotFound("Fee structure not found".into()))?;

        let students = StudentStore::new(self.conn).list_ids()?;
        let mut outcome = GenerateOutcome::default();

        for student_id in students {
            match self.create_bill(student_id, month.clone(), fee.monthly_amount, 0) {
                Ok(_) => outcome.created += 1,
                Err(e) if e.is_conflict() => outcome.skipped_duplicate += 1,
                Err(e) => {
                    warn!(student_id = %student_id, error = %e, "bill generation failed");
                    outcome.failed.push(GenerateFailure {
                        student_id,
                        reason: e.to_string(),
                    });
                }
            }
        }

        info!(
            month = %month,
            created = outcome.created,
            skipped = outcome.skipped_duplicate,
            failed = outcome.failed.len(),
            "monthly bills generated"
        );
        Ok(outcome)
    }

    /// Append a payment and re-derive the bill's status.
    ///
    /// Students can only pay their own bills. Negative amounts are
    /// rejected; the ledger is append-only and reversals are not
    /// expressible as negative rows.
    #[instrument(skip(self, actor), fields(user_id = %actor.user_id, role = %actor.role))]
    pub fn pay(
        &self,
        bill_id: Uuid,
        amount: Cents,
        method: String,
        reference: Option<String>,
        actor: Actor,
    ) -> Result<BillStatus> {
        if amount < 0 {
            return Err(Error::Validation("Payment amount must be non-negative".into()));
        }

        let tx = self.conn.unchecked_transaction()?;

        let store = BillingStore::new(&tx);
        let bill = store
            .find_bill(bill_id)?
            .ok_or_else(|| Error::NotFound("Bill not found".into()))?;

        if actor.role == Role::Student {
            let own = StudentStore::new(&tx)
                .find_by_user(actor.user_id)?
                .is_some_and(|s| s.id == bill.student_id);
            if !own {
                return Err(Error::Forbidden("Cannot pay another student's bill".into()));
            }
        }

        let payment = Payment::new(bill_id, amount, method, reference);
        store.create_payment(&payment)?;

        let paid = store.paid_for_bill(bill_id)?;
        let status = BillStatus::from_paid(paid, bill.total);
        crate::invariants::assert_ledger_status(bill_id, status, paid, bill.total);
        if status != bill.status {
            store.set_bill_status(bill_id, status)?;
        }

        tx.commit()?;
        info!(bill_id = %bill_id, amount = amount, paid = paid, status = %status, "payment recorded");
        Ok(status)
    }

    /// Every bill joined to its payment aggregate
    pub fn list_bills_with_balance(&self) -> Result<Vec<BillWithBalance>> {
        BillingStore::new(self.conn).list_bills_with_balance()
    }

    /// One student's bills joined to their payment aggregate
    pub fn list_bills_for_student(&self, student_id: Uuid) -> Result<Vec<BillWithBalance>> {
        BillingStore::new(self.conn).list_bills_for_student(student_id)
    }

    /// Create a fee structure
    #[instrument(skip(self))]
    pub fn create_fee_structure(&self, name: String, monthly_amount: Cents) -> Result<Uuid> {
        if monthly_amount < 0 {
            return Err(Error::Validation("Monthly amount must be non-negative".into()));
        }
        let fee = FeeStructure::new(name, monthly_amount);
        BillingStore::new(self.conn).create_fee_structure(&fee)?;
        Ok(fee.id)
    }

    /// List active fee structures
    pub fn list_fee_structures(&self) -> Result<Vec<FeeStructure>> {
        BillingStore::new(self.conn).list_active_fee_structures()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Student, User};
    use crate::storage::Database;

    fn setup() -> (Database, Uuid, Actor) {
        let db = Database::open_in_memory().unwrap();
        let (student_id, actor) = make_student(&db, "s1@dorm.test");
        (db, student_id, actor)
    }

    fn make_student(db: &Database, email: &str) -> (Uuid, Actor) {
        let user = User::new(Role::Student, email.into(), "hash".into());
        db.users().create(&user).unwrap();
        let student = Student::new(user.id);
        db.students().create(&student).unwrap();
        (
            student.id,
            Actor {
                user_id: user.id,
                role: Role::Student,
            },
        )
    }

    fn admin() -> Actor {
        Actor {
            user_id: Uuid::new_v4(),
            role: Role::Admin,
        }
    }

    fn month(s: &str) -> MonthKey {
        MonthKey::parse(s).unwrap()
    }

    #[test]
    fn test_payment_ledger_status_progression() {
        let (db, student_id, _actor) = setup();
        let billing = db.billing();

        // amount 120000, discount 20000 -> total 100000
        let bill_id = billing
            .create_bill(student_id, month("2025-10"), 120_000, 20_000)
            .unwrap();

        let status = billing
            .pay(bill_id, 40_000, "cash".into(), None, admin())
            .unwrap();
        assert_eq!(status, BillStatus::Partial);

        // paid == total maps to Paid, not Partial
        let status = billing
            .pay(bill_id, 60_000, "cash".into(), None, admin())
            .unwrap();
        assert_eq!(status, BillStatus::Paid);

        // Overpayment stays Paid with balance floored at zero
        let status = billing
            .pay(bill_id, 5_000, "cash".into(), None, admin())
            .unwrap();
        assert_eq!(status, BillStatus::Paid);

        let bills = billing.list_bills_for_student(student_id).unwrap();
        assert_eq!(bills.len(), 1);
        assert_eq!(bills[0].paid, 105_000);
        assert_eq!(bills[0].balance, 0);
    }

    #[test]
    fn test_duplicate_bill_rejected_and_original_untouched() {
        let (db, student_id, _actor) = setup();
        let billing = db.billing();

        let first = billing
            .create_bill(student_id, month("2025-10"), 100_000, 0)
            .unwrap();
        let err = billing
            .create_bill(student_id, month("2025-10"), 999_999, 0)
            .unwrap_err();
        assert!(err.is_conflict());

        let bills = billing.list_bills_for_student(student_id).unwrap();
        assert_eq!(bills.len(), 1);
        assert_eq!(bills[0].bill.id, first);
        assert_eq!(bills[0].bill.total, 100_000);

        // A different month is a different bill
        billing
            .create_bill(student_id, month("2025-11"), 100_000, 0)
            .unwrap();
    }

    #[test]
    fn test_wire_month_normalizes_into_monthly_uniqueness() {
        let (db, student_id, _actor) = setup();
        let billing = db.billing();

        // A full date arriving off the wire is the same billing month
        let from_wire: MonthKey = serde_json::from_str("\"2025-10-15\"").unwrap();
        billing
            .create_bill(student_id, from_wire, 100_000, 0)
            .unwrap();

        let err = billing
            .create_bill(student_id, month("2025-10"), 100_000, 0)
            .unwrap_err();
        assert!(err.is_conflict());
        assert_eq!(billing.list_bills_for_student(student_id).unwrap().len(), 1);
    }

    #[test]
    fn test_generate_monthly_skips_existing() {
        let (db, s1, _actor) = setup();
        let (s2, _) = make_student(&db, "s2@dorm.test");
        let billing = db.billing();

        let fee_id = billing
            .create_fee_structure("Standard".into(), 80_000)
            .unwrap();

        // s1 already billed by hand for this month
        billing.create_bill(s1, month("2025-10"), 80_000, 0).unwrap();

        let outcome = billing.generate_monthly(month("2025-10"), fee_id).unwrap();
        assert_eq!(outcome.created, 1);
        assert_eq!(outcome.skipped_duplicate, 1);
        assert!(outcome.failed.is_empty());
        assert_eq!(billing.list_bills_for_student(s2).unwrap().len(), 1);

        // Re-running the month creates nothing
        let outcome = billing.generate_monthly(month("2025-10"), fee_id).unwrap();
        assert_eq!(outcome.created, 0);
        assert_eq!(outcome.skipped_duplicate, 2);
    }

    #[test]
    fn test_student_cannot_pay_another_students_bill() {
        let (db, s1, _a1) = setup();
        let (_s2, other) = make_student(&db, "s2@dorm.test");
        let billing = db.billing();

        let bill_id = billing
            .create_bill(s1, month("2025-10"), 100_000, 0)
            .unwrap();

        let err = billing
            .pay(bill_id, 100_000, "cash".into(), None, other)
            .unwrap_err();
        assert!(matches!(err, Error::Forbidden(_)));

        // The owner can pay it
        let owner = db.students().find_by_id(s1).unwrap().unwrap();
        let actor = Actor {
            user_id: owner.user_id,
            role: Role::Student,
        };
        billing.pay(bill_id, 100_000, "cash".into(), None, actor).unwrap();
    }

    #[test]
    fn test_negative_amounts_rejected() {
        let (db, student_id, _actor) = setup();
        let billing = db.billing();

        let err = billing
            .create_bill(student_id, month("2025-10"), -1, 0)
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));

        let bill_id = billing
            .create_bill(student_id, month("2025-10"), 100_000, 0)
            .unwrap();
        let err = billing
            .pay(bill_id, -500, "cash".into(), None, admin())
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));

        // Zero is accepted and leaves the bill Unpaid
        let status = billing.pay(bill_id, 0, "cash".into(), None, admin()).unwrap();
        assert_eq!(status, BillStatus::Unpaid);
    }

    #[test]
    fn test_unknown_student_and_fee_structure() {
        let (db, _student_id, _actor) = setup();
        let billing = db.billing();

        let err = billing
            .create_bill(Uuid::new_v4(), month("2025-10"), 100_000, 0)
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));

        let err = billing
            .generate_monthly(month("2025-10"), Uuid::new_v4())
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }
}
