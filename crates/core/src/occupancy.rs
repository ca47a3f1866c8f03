//! Occupancy engine
//!
//! The single writer of derived room status. Every mutation runs inside a
//! SQLite transaction so the count-then-insert sequence in `allocate` and
//! the recompute that follows each change are atomic.

use chrono::NaiveDate;
use rusqlite::Connection;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::{Allocation, Role, RoomGridRow, RoomStatus, RoomUpdate};
use crate::storage::{AllocationStore, RoomStore, StudentStore};

/// Result of one recompute pass over a room.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Recomputed {
    pub status: RoomStatus,
    /// Whether a status write actually happened
    pub changed: bool,
}

pub struct OccupancyEngine<'a> {
    conn: &'a Connection,
}

impl<'a> OccupancyEngine<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Derive and persist a room's status from its active allocations.
    ///
    /// Missing rooms are a silent no-op; Maintenance is an operator
    /// override and is left untouched. The status row is written only
    /// when the derived value differs, so a second call reports
    /// `changed == false`.
    #[instrument(skip(self))]
    pub fn recompute(&self, room_id: Uuid) -> Result<Option<Recomputed>> {
        let rooms = RoomStore::new(self.conn);
        let Some(room) = rooms.find_by_id(room_id)? else {
            return Ok(None);
        };
        crate::invariants::assert_room_invariants(&room);
        if room.status.is_maintenance() {
            return Ok(Some(Recomputed {
                status: RoomStatus::Maintenance,
                changed: false,
            }));
        }

        let count = AllocationStore::new(self.conn).count_active_for_room(room_id)?;
        let derived = if count >= room.capacity {
            RoomStatus::OCCUPIED
        } else {
            RoomStatus::VACANT
        };

        let changed = derived != room.status;
        if changed {
            rooms.set_status(room_id, derived)?;
            info!(room_id = %room_id, status = %derived, "room status recomputed");
        }
        Ok(Some(Recomputed {
            status: derived,
            changed,
        }))
    }

    /// Move a student into a room.
    ///
    /// Any prior active allocation the student holds is closed first, and
    /// both the old and the new room are recomputed. Rooms in Maintenance
    /// or at capacity reject the move with Conflict; the capacity check
    /// and the insert share one transaction.
    #[instrument(skip(self))]
    pub fn allocate(
        &self,
        student_id: Uuid,
        room_id: Uuid,
        start_date: NaiveDate,
    ) -> Result<Uuid> {
        let tx = self.conn.unchecked_transaction()?;

        StudentStore::new(&tx)
            .find_by_id(student_id)?
            .ok_or_else(|| Error::NotFound("Student not found".into()))?;
        let room = RoomStore::new(&tx)
            .find_by_id(room_id)?
            .ok_or_else(|| Error::NotFound("Room not found".into()))?;

        if room.status.is_maintenance() {
            return Err(Error::Conflict("Room is under maintenance".into()));
        }

        let allocations = AllocationStore::new(&tx);
        let active = allocations.count_active_for_room(room_id)?;
        if active >= room.capacity {
            return Err(Error::Conflict("Room is already at capacity".into()));
        }

        let prior_rooms = allocations.deactivate_for_student(student_id)?;

        let allocation = Allocation::new(student_id, room_id, start_date);
        crate::invariants::assert_allocation_invariants(&allocation);
        allocations.create(&allocation)?;

        let engine = OccupancyEngine::new(&tx);
        engine.recompute(room_id)?;
        for prior in prior_rooms {
            if prior != room_id {
                engine.recompute(prior)?;
            }
        }

        tx.commit()?;
        info!(student_id = %student_id, room_id = %room_id, "student allocated");
        Ok(allocation.id)
    }

    /// Close an allocation and recompute its room.
    ///
    /// Vacating an already-inactive allocation is not an error; it still
    /// re-triggers the recompute.
    #[instrument(skip(self))]
    pub fn vacate(&self, allocation_id: Uuid, end_date: NaiveDate) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;

        let allocations = AllocationStore::new(&tx);
        let allocation = allocations
            .find_by_id(allocation_id)?
            .ok_or_else(|| Error::NotFound("Allocation not found".into()))?;

        if allocation.is_active {
            allocations.deactivate(allocation_id, end_date)?;
        }
        OccupancyEngine::new(&tx).recompute(allocation.room_id)?;

        tx.commit()?;
        info!(allocation_id = %allocation_id, room_id = %allocation.room_id, "allocation vacated");
        Ok(())
    }

    /// Partial room update. An explicit status write is accepted but any
    /// non-Maintenance value is immediately re-derived, so Maintenance is
    /// the only status an operator can actually pin.
    #[instrument(skip(self, update))]
    pub fn update_room(&self, room_id: Uuid, update: &RoomUpdate) -> Result<()> {
        if update.is_empty() {
            return Err(Error::Validation("No fields to update".into()));
        }
        if let Some(capacity) = update.capacity {
            if capacity == 0 {
                return Err(Error::Validation("Capacity must be positive".into()));
            }
        }

        let tx = self.conn.unchecked_transaction()?;

        let rooms = RoomStore::new(&tx);
        rooms
            .find_by_id(room_id)?
            .ok_or_else(|| Error::NotFound("Room not found".into()))?;

        rooms.update_fields(
            room_id,
            update.room_number.as_deref(),
            update.capacity,
            update.floor_id,
        )?;
        if let Some(status) = update.status {
            rooms.set_status(room_id, status)?;
        }

        // Capacity and status edits both feed the derived value.
        OccupancyEngine::new(&tx).recompute(room_id)?;

        tx.commit()?;
        Ok(())
    }

    /// The rooms grid view. Pure read; Partial is synthesized here and
    /// occupant names are withheld from Student viewers.
    pub fn rooms_grid(&self, viewer_role: Role) -> Result<Vec<RoomGridRow>> {
        RoomStore::new(self.conn).grid(viewer_role)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Block, Floor, GridStatus, Role, Room, Student, User};
    use crate::storage::Database;

    fn setup() -> (Database, Uuid, Uuid, Uuid) {
        let db = Database::open_in_memory().unwrap();
        let block = Block::new("A".into());
        db.rooms().create_block(&block).unwrap();
        let floor = Floor::new(block.id, "1".into());
        db.rooms().create_floor(&floor).unwrap();
        let room = Room::new(floor.id, "101".into(), 2);
        db.rooms().create_room(&room).unwrap();

        let s1 = make_student(&db, "s1@dorm.test");
        let s2 = make_student(&db, "s2@dorm.test");
        (db, room.id, s1, s2)
    }

    fn make_student(db: &Database, email: &str) -> Uuid {
        let user = User::new(Role::Student, email.into(), "hash".into());
        db.users().create(&user).unwrap();
        let student = Student::new(user.id);
        db.students().create(&student).unwrap();
        student.id
    }

    fn date(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    #[test]
    fn test_allocate_until_full_then_vacate() {
        let (db, room_id, s1, s2) = setup();
        let engine = db.occupancy();

        let a1 = engine.allocate(s1, room_id, date("2025-09-01")).unwrap();
        let room = db.rooms().find_by_id(room_id).unwrap().unwrap();
        assert_eq!(room.status, RoomStatus::VACANT);

        engine.allocate(s2, room_id, date("2025-09-01")).unwrap();
        let room = db.rooms().find_by_id(room_id).unwrap().unwrap();
        assert_eq!(room.status, RoomStatus::OCCUPIED);

        // Room is full now
        let s3 = make_student(&db, "s3@dorm.test");
        let err = engine.allocate(s3, room_id, date("2025-09-02")).unwrap_err();
        assert!(err.is_conflict());

        engine.vacate(a1, date("2025-10-01")).unwrap();
        let room = db.rooms().find_by_id(room_id).unwrap().unwrap();
        assert_eq!(room.status, RoomStatus::VACANT);
        assert_eq!(db.allocations().count_active_for_room(room_id).unwrap(), 1);
    }

    #[test]
    fn test_reallocate_closes_prior_and_recomputes_old_room() {
        let (db, room_a, s1, _s2) = setup();
        let engine = db.occupancy();

        let floor_id = db.rooms().find_by_id(room_a).unwrap().unwrap().floor_id;
        let room_b = Room::new(floor_id, "102".into(), 1);
        db.rooms().create_room(&room_b).unwrap();

        engine.allocate(s1, room_b.id, date("2025-09-01")).unwrap();
        let b = db.rooms().find_by_id(room_b.id).unwrap().unwrap();
        assert_eq!(b.status, RoomStatus::OCCUPIED);

        // Moving to room A must free room B
        engine.allocate(s1, room_a, date("2025-10-01")).unwrap();
        let b = db.rooms().find_by_id(room_b.id).unwrap().unwrap();
        assert_eq!(b.status, RoomStatus::VACANT);
        assert_eq!(db.allocations().count_active_for_room(room_b.id).unwrap(), 0);
        assert_eq!(db.allocations().count_active_for_room(room_a).unwrap(), 1);
    }

    #[test]
    fn test_maintenance_overrides_and_blocks_allocation() {
        let (db, room_id, s1, _s2) = setup();
        let engine = db.occupancy();

        engine
            .update_room(
                room_id,
                &RoomUpdate {
                    status: Some(RoomStatus::Maintenance),
                    ..Default::default()
                },
            )
            .unwrap();

        let err = engine.allocate(s1, room_id, date("2025-09-01")).unwrap_err();
        assert!(err.is_conflict());

        // Recompute must not disturb the override
        let out = engine.recompute(room_id).unwrap().unwrap();
        assert_eq!(out.status, RoomStatus::Maintenance);
        assert!(!out.changed);

        // Clearing the override re-derives immediately
        engine
            .update_room(
                room_id,
                &RoomUpdate {
                    status: Some(RoomStatus::OCCUPIED),
                    ..Default::default()
                },
            )
            .unwrap();
        let room = db.rooms().find_by_id(room_id).unwrap().unwrap();
        assert_eq!(room.status, RoomStatus::VACANT);
    }

    #[test]
    fn test_recompute_is_idempotent() {
        let (db, room_id, s1, _s2) = setup();
        let engine = db.occupancy();

        engine.allocate(s1, room_id, date("2025-09-01")).unwrap();
        let first = engine.recompute(room_id).unwrap().unwrap();
        assert!(!first.changed); // allocate already recomputed
        let second = engine.recompute(room_id).unwrap().unwrap();
        assert_eq!(second.status, first.status);
        assert!(!second.changed);
    }

    #[test]
    fn test_recompute_missing_room_is_noop() {
        let (db, _room_id, _s1, _s2) = setup();
        assert!(db.occupancy().recompute(Uuid::new_v4()).unwrap().is_none());
    }

    #[test]
    fn test_vacate_inactive_allocation_is_not_an_error() {
        let (db, room_id, s1, _s2) = setup();
        let engine = db.occupancy();

        let a1 = engine.allocate(s1, room_id, date("2025-09-01")).unwrap();
        engine.vacate(a1, date("2025-10-01")).unwrap();
        engine.vacate(a1, date("2025-10-02")).unwrap();

        // First end_date wins; the second call only re-triggered recompute
        let allocation = db.allocations().find_by_id(a1).unwrap().unwrap();
        assert_eq!(allocation.end_date, Some(date("2025-10-01")));
    }

    #[test]
    fn test_grid_partial_and_occupant_visibility() {
        let (db, room_id, s1, _s2) = setup();
        db.occupancy()
            .allocate(s1, room_id, date("2025-09-01"))
            .unwrap();

        let grid = db.occupancy().rooms_grid(Role::Warden).unwrap();
        let row = grid.iter().find(|r| r.room_id == room_id).unwrap();
        assert_eq!(row.status, GridStatus::Partial);
        assert_eq!(row.active_count, 1);
        assert!(row.occupant_names.is_some());

        let grid = db.occupancy().rooms_grid(Role::Student).unwrap();
        let row = grid.iter().find(|r| r.room_id == room_id).unwrap();
        assert_eq!(row.status, GridStatus::Partial);
        assert!(row.occupant_names.is_none());
    }

    #[test]
    fn test_update_room_requires_fields() {
        let (db, room_id, _s1, _s2) = setup();
        let err = db
            .occupancy()
            .update_room(room_id, &RoomUpdate::default())
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }
}
