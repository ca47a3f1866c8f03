//! Room hierarchy and status models
//!
//! Rooms belong to a Floor, which belongs to a Block. Room status is a
//! tagged variant: `Maintenance` is an operator override that suppresses
//! derived recomputation; everything else is derived from active
//! allocations vs capacity by the occupancy engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A building block
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Block {
    pub id: Uuid,
    pub name: String,
}

impl Block {
    pub fn new(name: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            name,
        }
    }
}

/// A floor within a block
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Floor {
    pub id: Uuid,
    pub block_id: Uuid,
    pub name: String,
}

impl Floor {
    pub fn new(block_id: Uuid, name: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            block_id,
            name,
        }
    }
}

/// Occupancy-derived status as persisted.
///
/// "Partial" is deliberately absent: the store keeps only the two derived
/// endpoints, and the partial label is synthesized at query time by the
/// rooms grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DerivedStatus {
    Vacant,
    Occupied,
}

/// Stored room status: an explicit operator override, or a derived value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoomStatus {
    /// Operator override; wins over derived state until cleared.
    Maintenance,
    Derived(DerivedStatus),
}

impl RoomStatus {
    pub const VACANT: RoomStatus = RoomStatus::Derived(DerivedStatus::Vacant);
    pub const OCCUPIED: RoomStatus = RoomStatus::Derived(DerivedStatus::Occupied);

    pub fn is_maintenance(&self) -> bool {
        matches!(self, RoomStatus::Maintenance)
    }

    /// Storage encoding (three values, matching the persisted column)
    pub fn as_str(&self) -> &'static str {
        match self {
            RoomStatus::Maintenance => "Maintenance",
            RoomStatus::Derived(DerivedStatus::Vacant) => "Vacant",
            RoomStatus::Derived(DerivedStatus::Occupied) => "Occupied",
        }
    }
}

impl std::fmt::Display for RoomStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Four-valued status reported by the rooms grid. Never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GridStatus {
    Vacant,
    Partial,
    Occupied,
    Maintenance,
}

impl GridStatus {
    /// Synthesize the grid label from stored status and live counts.
    pub fn from_occupancy(status: RoomStatus, active_count: u32, capacity: u32) -> Self {
        if status.is_maintenance() {
            return GridStatus::Maintenance;
        }
        if active_count >= capacity {
            GridStatus::Occupied
        } else if active_count == 0 {
            GridStatus::Vacant
        } else {
            GridStatus::Partial
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            GridStatus::Vacant => "Vacant",
            GridStatus::Partial => "Partial",
            GridStatus::Occupied => "Occupied",
            GridStatus::Maintenance => "Maintenance",
        }
    }
}

/// A room
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Room {
    pub id: Uuid,
    pub floor_id: Uuid,
    pub room_number: String,
    /// Positive, fixed at creation (only editable via explicit room update)
    pub capacity: u32,
    pub status: RoomStatus,
    pub created_at: DateTime<Utc>,
}

impl Room {
    pub fn new(floor_id: Uuid, room_number: String, capacity: u32) -> Self {
        Self {
            id: Uuid::new_v4(),
            floor_id,
            room_number,
            capacity,
            status: RoomStatus::VACANT,
            created_at: Utc::now(),
        }
    }
}

/// Room with hierarchy context (single-room fetch)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomDetail {
    pub room: Room,
    pub floor_name: String,
    pub block_id: Uuid,
    pub block_name: String,
}

/// One row of the rooms grid view
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomGridRow {
    pub room_id: Uuid,
    pub block: String,
    pub floor: String,
    pub room_number: String,
    pub capacity: u32,
    pub status: GridStatus,
    pub active_count: u32,
    /// Populated only for Admin/Warden viewers
    pub occupant_names: Option<String>,
}

/// Partial update of a room. `None` fields are left untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RoomUpdate {
    pub room_number: Option<String>,
    pub capacity: Option<u32>,
    pub status: Option<RoomStatus>,
    pub floor_id: Option<Uuid>,
}

impl RoomUpdate {
    pub fn is_empty(&self) -> bool {
        self.room_number.is_none()
            && self.capacity.is_none()
            && self.status.is_none()
            && self.floor_id.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grid_status_synthesis() {
        assert_eq!(
            GridStatus::from_occupancy(RoomStatus::VACANT, 0, 2),
            GridStatus::Vacant
        );
        assert_eq!(
            GridStatus::from_occupancy(RoomStatus::VACANT, 1, 2),
            GridStatus::Partial
        );
        assert_eq!(
            GridStatus::from_occupancy(RoomStatus::OCCUPIED, 2, 2),
            GridStatus::Occupied
        );
        // Over-capacity data still reads Occupied
        assert_eq!(
            GridStatus::from_occupancy(RoomStatus::OCCUPIED, 3, 2),
            GridStatus::Occupied
        );
        // Override wins regardless of counts
        assert_eq!(
            GridStatus::from_occupancy(RoomStatus::Maintenance, 1, 2),
            GridStatus::Maintenance
        );
    }

    #[test]
    fn test_status_encoding() {
        assert_eq!(RoomStatus::VACANT.as_str(), "Vacant");
        assert_eq!(RoomStatus::OCCUPIED.as_str(), "Occupied");
        assert_eq!(RoomStatus::Maintenance.as_str(), "Maintenance");
    }
}
