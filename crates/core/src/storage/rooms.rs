//! Room hierarchy storage operations
//!
//! Blocks, floors and rooms, plus the rooms-grid view query that
//! synthesizes the four-valued grid status from live allocation counts.

use rusqlite::{params, Connection};
use tracing::instrument;
use uuid::Uuid;

use super::parse::{
    map_constraint, parse_datetime, parse_uuid, room_status_from_str, OptionalExt,
};
use crate::error::Result;
use crate::models::{
    Block, Floor, GridStatus, Role, Room, RoomDetail, RoomGridRow, RoomStatus,
};

pub struct RoomStore<'a> {
    conn: &'a Connection,
}

impl<'a> RoomStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Create a block. Duplicate name fails with Conflict.
    #[instrument(skip(self, block), fields(name = %block.name))]
    pub fn create_block(&self, block: &Block) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO blocks (id, name) VALUES (?1, ?2)",
                params![block.id.to_string(), block.name],
            )
            .map_err(|e| map_constraint(e, "Block name already exists"))?;
        Ok(())
    }

    /// List all blocks
    pub fn list_blocks(&self) -> Result<Vec<Block>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name FROM blocks ORDER BY name")?;
        let blocks = stmt
            .query_map([], |row| {
                Ok(Block {
                    id: parse_uuid(&row.get::<_, String>(0)?)?,
                    name: row.get(1)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(blocks)
    }

    /// Create a floor within a block
    #[instrument(skip(self, floor), fields(name = %floor.name))]
    pub fn create_floor(&self, floor: &Floor) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO floors (id, block_id, name) VALUES (?1, ?2, ?3)",
                params![
                    floor.id.to_string(),
                    floor.block_id.to_string(),
                    floor.name
                ],
            )
            .map_err(|e| map_constraint(e, "Floor name already exists in this block"))?;
        Ok(())
    }

    /// List floors, optionally scoped to one block
    pub fn list_floors(&self, block_id: Option<Uuid>) -> Result<Vec<Floor>> {
        let mut floors = Vec::new();
        let map_row = |row: &rusqlite::Row<'_>| {
            Ok(Floor {
                id: parse_uuid(&row.get::<_, String>(0)?)?,
                block_id: parse_uuid(&row.get::<_, String>(1)?)?,
                name: row.get(2)?,
            })
        };
        match block_id {
            Some(bid) => {
                let mut stmt = self.conn.prepare(
                    "SELECT id, block_id, name FROM floors WHERE block_id = ?1 ORDER BY name",
                )?;
                let rows = stmt.query_map(params![bid.to_string()], map_row)?;
                for row in rows {
                    floors.push(row?);
                }
            }
            None => {
                let mut stmt = self.conn.prepare(
                    "SELECT f.id, f.block_id, f.name FROM floors f \
                     INNER JOIN blocks b ON b.id = f.block_id \
                     ORDER BY b.name, f.name",
                )?;
                let rows = stmt.query_map([], map_row)?;
                for row in rows {
                    floors.push(row?);
                }
            }
        }
        Ok(floors)
    }

    /// Create a room. Duplicate room number on a floor fails with Conflict.
    #[instrument(skip(self, room), fields(room_number = %room.room_number))]
    pub fn create_room(&self, room: &Room) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO rooms (id, floor_id, room_number, capacity, status, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    room.id.to_string(),
                    room.floor_id.to_string(),
                    room.room_number,
                    room.capacity,
                    room.status.as_str(),
                    room.created_at.to_rfc3339(),
                ],
            )
            .map_err(|e| map_constraint(e, "Duplicate room number on this floor"))?;
        Ok(())
    }

    fn row_to_room(row: &rusqlite::Row<'_>) -> std::result::Result<Room, rusqlite::Error> {
        Ok(Room {
            id: parse_uuid(&row.get::<_, String>(0)?)?,
            floor_id: parse_uuid(&row.get::<_, String>(1)?)?,
            room_number: row.get(2)?,
            capacity: row.get(3)?,
            status: room_status_from_str(&row.get::<_, String>(4)?)?,
            created_at: parse_datetime(&row.get::<_, String>(5)?)?,
        })
    }

    /// Find room by ID
    #[instrument(skip(self))]
    pub fn find_by_id(&self, id: Uuid) -> Result<Option<Room>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, floor_id, room_number, capacity, status, created_at \
             FROM rooms WHERE id = ?1",
        )?;

        let room = stmt
            .query_row(params![id.to_string()], Self::row_to_room)
            .optional()?;

        Ok(room)
    }

    /// Find room with its floor/block context
    #[instrument(skip(self))]
    pub fn find_detail(&self, id: Uuid) -> Result<Option<RoomDetail>> {
        let mut stmt = self.conn.prepare(
            "SELECT r.id, r.floor_id, r.room_number, r.capacity, r.status, r.created_at,
                    f.name, b.id, b.name
             FROM rooms r
             INNER JOIN floors f ON f.id = r.floor_id
             INNER JOIN blocks b ON b.id = f.block_id
             WHERE r.id = ?1",
        )?;

        let detail = stmt
            .query_row(params![id.to_string()], |row| {
                Ok(RoomDetail {
                    room: Self::row_to_room(row)?,
                    floor_name: row.get(6)?,
                    block_id: parse_uuid(&row.get::<_, String>(7)?)?,
                    block_name: row.get(8)?,
                })
            })
            .optional()?;

        Ok(detail)
    }

    /// Persist a room's stored status
    #[instrument(skip(self))]
    pub fn set_status(&self, room_id: Uuid, status: RoomStatus) -> Result<()> {
        self.conn.execute(
            "UPDATE rooms SET status = ?1 WHERE id = ?2",
            params![status.as_str(), room_id.to_string()],
        )?;
        Ok(())
    }

    /// Apply non-status field updates. Status changes go through
    /// `set_status` so the occupancy engine stays the only writer.
    #[instrument(skip(self))]
    pub fn update_fields(
        &self,
        room_id: Uuid,
        room_number: Option<&str>,
        capacity: Option<u32>,
        floor_id: Option<Uuid>,
    ) -> Result<()> {
        if let Some(number) = room_number {
            self.conn
                .execute(
                    "UPDATE rooms SET room_number = ?1 WHERE id = ?2",
                    params![number, room_id.to_string()],
                )
                .map_err(|e| map_constraint(e, "Duplicate room number on this floor"))?;
        }
        if let Some(capacity) = capacity {
            self.conn.execute(
                "UPDATE rooms SET capacity = ?1 WHERE id = ?2",
                params![capacity, room_id.to_string()],
            )?;
        }
        if let Some(floor) = floor_id {
            self.conn
                .execute(
                    "UPDATE rooms SET floor_id = ?1 WHERE id = ?2",
                    params![floor.to_string(), room_id.to_string()],
                )
                .map_err(|e| map_constraint(e, "Duplicate room number on this floor"))?;
        }
        Ok(())
    }

    /// Rooms grid: every room with live occupancy and the synthesized
    /// four-valued status. Occupant names are withheld from students.
    #[instrument(skip(self))]
    pub fn grid(&self, viewer_role: Role) -> Result<Vec<RoomGridRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT r.id, b.name, f.name, r.room_number, r.capacity, r.status,
                    IFNULL(ac.active_count, 0),
                    occ.occupant_names
             FROM rooms r
             INNER JOIN floors f ON f.id = r.floor_id
             INNER JOIN blocks b ON b.id = f.block_id
             LEFT JOIN (
                 SELECT room_id, COUNT(*) AS active_count
                 FROM allocations
                 WHERE is_active = 1
                 GROUP BY room_id
             ) ac ON ac.room_id = r.id
             LEFT JOIN (
                 SELECT a.room_id,
                        GROUP_CONCAT(
                            TRIM(COALESCE(u.first_name, '') || ' ' || COALESCE(u.last_name, '')),
                            ', '
                        ) AS occupant_names
                 FROM allocations a
                 INNER JOIN students s ON s.id = a.student_id
                 INNER JOIN users u ON u.id = s.user_id
                 WHERE a.is_active = 1
                 GROUP BY a.room_id
             ) occ ON occ.room_id = r.id
             ORDER BY b.name, f.name, r.room_number",
        )?;

        let show_occupants = viewer_role >= Role::Warden;
        let rows = stmt
            .query_map([], |row| {
                let status = room_status_from_str(&row.get::<_, String>(5)?)?;
                let capacity: u32 = row.get(4)?;
                let active_count: u32 = row.get(6)?;
                Ok(RoomGridRow {
                    room_id: parse_uuid(&row.get::<_, String>(0)?)?,
                    block: row.get(1)?,
                    floor: row.get(2)?,
                    room_number: row.get(3)?,
                    capacity,
                    status: GridStatus::from_occupancy(status, active_count, capacity),
                    active_count,
                    occupant_names: if show_occupants { row.get(7)? } else { None },
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(rows)
    }
}
