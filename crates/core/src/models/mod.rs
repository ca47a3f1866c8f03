//! Core data models

mod allocation;
mod attendance;
mod billing;
mod code;
mod complaint;
mod notification;
mod room;
mod staff;
mod student;
mod user;

pub use allocation::Allocation;
pub use attendance::{AttendanceMark, AttendanceSession, AttendanceStatus, AttendanceSummaryRow};
pub use billing::{
    Bill, BillStatus, BillWithBalance, Cents, FeeStructure, GenerateFailure, GenerateOutcome,
    MonthKey, Payment,
};
pub use code::RegistrationCode;
pub use complaint::{Complaint, ComplaintStatus};
pub use notification::Notification;
pub use room::{
    Block, DerivedStatus, Floor, GridStatus, Room, RoomDetail, RoomGridRow, RoomStatus, RoomUpdate,
};
pub use staff::Staff;
pub use student::{Student, StudentInfo};
pub use user::{Actor, Role, Session, User};
