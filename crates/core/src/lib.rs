//! Dorma Core Library
//!
//! Core models, permissions, the occupancy and billing engines, and
//! SQLite storage for the Dorma hostel platform.

pub mod billing;
pub mod error;
pub mod invariants;
pub mod models;
pub mod occupancy;
pub mod permissions;
pub mod storage;

pub use billing::BillingEngine;
pub use error::{Error, Result};
pub use models::*;
pub use occupancy::{OccupancyEngine, Recomputed};
pub use permissions::*;
pub use storage::{
    Database, NotificationRepository, Storage, StudentRepository, UserRepository,
};
