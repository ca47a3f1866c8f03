//! Developer guardrails and invariants
//!
//! Debug assertions for detecting impossible states during development.
//! These checks are compiled out in release builds.

use uuid::Uuid;

use crate::models::{Allocation, Bill, BillStatus, Room};

/// Validate that a room's state is internally consistent
pub fn assert_room_invariants(room: &Room) {
    debug_assert!(
        room.capacity > 0,
        "Room {} has non-positive capacity {}",
        room.id,
        room.capacity
    );

    debug_assert!(
        !room.room_number.trim().is_empty(),
        "Room {} has empty room number",
        room.id
    );
}

/// Validate that an allocation row is valid
pub fn assert_allocation_invariants(allocation: &Allocation) {
    debug_assert!(
        allocation.student_id != Uuid::nil(),
        "Allocation {} has nil student_id",
        allocation.id
    );

    debug_assert!(
        allocation.room_id != Uuid::nil(),
        "Allocation {} has nil room_id",
        allocation.id
    );

    // An open allocation has no end date; vacating sets both fields
    debug_assert!(
        !allocation.is_active || allocation.end_date.is_none(),
        "Allocation {} is active but has end_date {:?}",
        allocation.id,
        allocation.end_date
    );
}

/// Validate that a bill's fixed fields are consistent
pub fn assert_bill_invariants(bill: &Bill) {
    debug_assert!(
        bill.amount >= 0 && bill.discount >= 0,
        "Bill {} has negative amount/discount",
        bill.id
    );

    debug_assert!(
        bill.total == (bill.amount - bill.discount).max(0),
        "Bill {} total {} does not match amount {} - discount {}",
        bill.id,
        bill.total,
        bill.amount,
        bill.discount
    );
}

/// Validate that a bill's status matches its payment sum
pub fn assert_ledger_status(bill_id: Uuid, status: BillStatus, paid: i64, total: i64) {
    debug_assert!(
        status == BillStatus::from_paid(paid, total),
        "Bill {} status {:?} inconsistent with paid {} of total {}",
        bill_id,
        status,
        paid,
        total
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MonthKey;
    use chrono::NaiveDate;

    #[test]
    fn test_valid_room() {
        let room = Room::new(Uuid::new_v4(), "101".into(), 2);
        assert_room_invariants(&room);
    }

    #[test]
    fn test_valid_allocation() {
        let date = NaiveDate::from_ymd_opt(2025, 9, 1).unwrap();
        let allocation = Allocation::new(Uuid::new_v4(), Uuid::new_v4(), date);
        assert_allocation_invariants(&allocation);
    }

    #[test]
    fn test_valid_bill() {
        let month = MonthKey::parse("2025-10").unwrap();
        let bill = Bill::new(Uuid::new_v4(), month, 100_000, 20_000);
        assert_bill_invariants(&bill);
        assert_ledger_status(bill.id, BillStatus::Unpaid, 0, bill.total);
    }

    #[test]
    #[should_panic(expected = "non-positive capacity")]
    fn test_zero_capacity_room() {
        let room = Room::new(Uuid::new_v4(), "101".into(), 0);
        assert_room_invariants(&room);
    }
}
