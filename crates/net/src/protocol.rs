//! Network protocol message types
//!
//! All messages are JSON-serialized and length-prefixed on the wire. A
//! connection starts unauthenticated: the first accepted request is
//! `Login`, `Resume` or `Register`; everything else is gated through the
//! permission matrix after that.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use dorma_core::{
    Action, AttendanceMark, AttendanceSession, AttendanceSummaryRow, BillStatus, BillWithBalance,
    Block, Cents, Complaint, ComplaintStatus, FeeStructure, Floor, GenerateOutcome, MonthKey,
    Notification, RegistrationCode, Role, RoomDetail, RoomGridRow, RoomUpdate, Staff, StudentInfo,
};

/// Client-to-server requests
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Request {
    // Pre-auth
    Login {
        email: String,
        password: String,
    },
    Resume {
        token: Uuid,
    },
    Register {
        code: String,
        email: String,
        password: String,
        first_name: Option<String>,
        last_name: Option<String>,
    },
    Logout,
    Ping,

    // Rooms
    RoomsGrid,
    GetRoom {
        room_id: Uuid,
    },
    CreateBlock {
        name: String,
    },
    ListBlocks,
    CreateFloor {
        block_id: Uuid,
        name: String,
    },
    ListFloors {
        block_id: Option<Uuid>,
    },
    CreateRoom {
        floor_id: Uuid,
        room_number: String,
        capacity: u32,
    },
    UpdateRoom {
        room_id: Uuid,
        update: RoomUpdate,
    },
    Allocate {
        student_id: Uuid,
        room_id: Uuid,
        start_date: NaiveDate,
    },
    Vacate {
        allocation_id: Uuid,
        end_date: NaiveDate,
    },

    // Billing
    CreateBill {
        student_id: Uuid,
        month: MonthKey,
        amount: Cents,
        discount: Cents,
    },
    GenerateBills {
        month: MonthKey,
        fee_structure_id: Uuid,
    },
    ListBills,
    MyBills,
    Pay {
        bill_id: Uuid,
        amount: Cents,
        method: String,
        reference: Option<String>,
    },
    CreateFeeStructure {
        name: String,
        monthly_amount: Cents,
    },
    ListFeeStructures,

    // Attendance
    MarkAttendance {
        date: NaiveDate,
        session: AttendanceSession,
        marks: Vec<AttendanceMark>,
    },
    AttendanceSummary {
        month: String,
    },

    // Complaints
    FileComplaint {
        title: String,
        description: Option<String>,
    },
    ListComplaints,
    UpdateComplaint {
        complaint_id: Uuid,
        status: ComplaintStatus,
        assigned_staff_id: Option<Uuid>,
    },

    // Staff
    CreateStaff {
        name: String,
        role: String,
        phone: Option<String>,
        shift: Option<String>,
    },
    UpdateStaff {
        staff_id: Uuid,
        name: String,
        role: String,
        phone: Option<String>,
        shift: Option<String>,
    },
    DeleteStaff {
        staff_id: Uuid,
    },
    ListStaff,

    // Students
    CreateStudent {
        email: String,
        password: String,
        first_name: Option<String>,
        last_name: Option<String>,
        guardian_name: Option<String>,
        guardian_phone: Option<String>,
        address: Option<String>,
    },
    ListStudents,

    // Notifications
    Notifications {
        limit: u32,
    },
    MarkRead {
        ids: Vec<Uuid>,
    },
    MarkAllRead,

    // Registration codes
    CreateCode {
        role: Role,
    },
    ListCodes,
    DeleteCode {
        code_id: Uuid,
    },
}

impl Request {
    /// The gate this request must pass, if any.
    ///
    /// `None` means the request is pre-auth or open to any authenticated
    /// user without a matrix check.
    pub fn action(&self) -> Option<Action> {
        match self {
            Request::Login { .. }
            | Request::Resume { .. }
            | Request::Register { .. }
            | Request::Logout
            | Request::Ping => None,

            Request::RoomsGrid => Some(Action::ViewRoomsGrid),
            Request::GetRoom { .. } => Some(Action::ViewRoom),
            Request::CreateBlock { .. } => Some(Action::ManageBlocks),
            Request::CreateFloor { .. }
            | Request::ListBlocks
            | Request::ListFloors { .. }
            | Request::CreateRoom { .. }
            | Request::UpdateRoom { .. } => Some(Action::ManageRooms),
            Request::Allocate { .. } => Some(Action::Allocate),
            Request::Vacate { .. } => Some(Action::Vacate),

            Request::CreateBill { .. } => Some(Action::CreateBill),
            Request::GenerateBills { .. } => Some(Action::GenerateBills),
            Request::ListBills => Some(Action::ViewAllBills),
            Request::MyBills => Some(Action::ViewOwnBills),
            Request::Pay { .. } => Some(Action::Pay),
            Request::CreateFeeStructure { .. } => Some(Action::ManageFeeStructures),
            Request::ListFeeStructures => Some(Action::ViewAllBills),

            Request::MarkAttendance { .. } => Some(Action::MarkAttendance),
            Request::AttendanceSummary { .. } => Some(Action::ViewAttendanceSummary),

            Request::FileComplaint { .. } => Some(Action::FileComplaint),
            Request::ListComplaints => Some(Action::ViewComplaints),
            Request::UpdateComplaint { .. } => Some(Action::UpdateComplaint),

            Request::CreateStaff { .. }
            | Request::UpdateStaff { .. }
            | Request::DeleteStaff { .. } => Some(Action::ManageStaff),
            Request::ListStaff => Some(Action::ViewStaff),

            Request::CreateStudent { .. } => Some(Action::ManageStudents),
            Request::ListStudents => Some(Action::ViewStudents),

            Request::Notifications { .. } | Request::MarkRead { .. } | Request::MarkAllRead => {
                Some(Action::ViewNotifications)
            }

            Request::CreateCode { .. } | Request::ListCodes | Request::DeleteCode { .. } => {
                Some(Action::ManageCodes)
            }
        }
    }
}

/// HTTP-style error category carried on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    BadRequest,
    Unauthorized,
    Forbidden,
    NotFound,
    Conflict,
    Internal,
}

impl From<&dorma_core::Error> for ErrorCode {
    fn from(err: &dorma_core::Error) -> Self {
        use dorma_core::Error;
        match err {
            Error::Validation(_) => ErrorCode::BadRequest,
            Error::Authentication(_) => ErrorCode::Unauthorized,
            Error::Forbidden(_) => ErrorCode::Forbidden,
            Error::NotFound(_) => ErrorCode::NotFound,
            Error::Conflict(_) => ErrorCode::Conflict,
            Error::Database(_) | Error::Io(_) | Error::Serialization(_) => ErrorCode::Internal,
        }
    }
}

/// Server-to-client responses and pushes
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Response {
    // Auth
    LoggedIn {
        token: Uuid,
        user_id: Uuid,
        role: Role,
        display_name: String,
    },
    Registered {
        user_id: Uuid,
    },

    // Generic outcomes
    Ok,
    Created {
        id: Uuid,
    },
    Error {
        code: ErrorCode,
        message: String,
    },
    Pong,

    // Rooms
    Grid {
        rooms: Vec<RoomGridRow>,
    },
    Room {
        detail: RoomDetail,
    },
    Blocks {
        blocks: Vec<Block>,
    },
    Floors {
        floors: Vec<Floor>,
    },

    // Billing
    Generated {
        outcome: GenerateOutcome,
    },
    PaymentRecorded {
        status: BillStatus,
    },
    Bills {
        bills: Vec<BillWithBalance>,
    },
    FeeStructures {
        fees: Vec<FeeStructure>,
    },

    // Attendance
    AttendanceMarked {
        written: u32,
    },
    Attendance {
        rows: Vec<AttendanceSummaryRow>,
    },

    // Complaints
    Complaints {
        complaints: Vec<Complaint>,
    },

    // Staff / students
    StaffList {
        staff: Vec<Staff>,
    },
    Students {
        students: Vec<StudentInfo>,
    },

    // Notifications
    NotificationList {
        notifications: Vec<Notification>,
        unread: u64,
    },
    MarkedRead {
        updated: u64,
    },

    // Registration codes
    Codes {
        codes: Vec<RegistrationCode>,
    },

    /// Server-initiated push for a freshly persisted notification
    Notify {
        notification: Notification,
    },

    /// Server is shutting down
    ServerShutdown,
}

impl Response {
    /// Shorthand for an error response derived from a core error
    pub fn from_error(err: &dorma_core::Error) -> Self {
        Response::Error {
            code: ErrorCode::from(err),
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_roundtrip() {
        let req = Request::Pay {
            bill_id: Uuid::new_v4(),
            amount: 40_000,
            method: "cash".into(),
            reference: None,
        };
        let bytes = serde_json::to_vec(&req).unwrap();
        let decoded: Request = serde_json::from_slice(&bytes).unwrap();
        match decoded {
            Request::Pay { amount, .. } => assert_eq!(amount, 40_000),
            _ => panic!("Wrong request type"),
        }
    }

    #[test]
    fn test_error_code_mapping() {
        use dorma_core::Error;
        assert_eq!(
            ErrorCode::from(&Error::Conflict("dup".into())),
            ErrorCode::Conflict
        );
        assert_eq!(
            ErrorCode::from(&Error::Validation("bad".into())),
            ErrorCode::BadRequest
        );
        assert_eq!(
            ErrorCode::from(&Error::NotFound("gone".into())),
            ErrorCode::NotFound
        );
        assert_eq!(
            ErrorCode::from(&Error::Forbidden("no".into())),
            ErrorCode::Forbidden
        );
    }

    #[test]
    fn test_pre_auth_requests_have_no_gate() {
        assert!(Request::Ping.action().is_none());
        assert!(Request::Login {
            email: "a@b.c".into(),
            password: "pw".into()
        }
        .action()
        .is_none());
        assert_eq!(Request::Allocate {
            student_id: Uuid::new_v4(),
            room_id: Uuid::new_v4(),
            start_date: NaiveDate::from_ymd_opt(2025, 9, 1).unwrap(),
        }
        .action(),
        Some(Action::Allocate));
    }
}
