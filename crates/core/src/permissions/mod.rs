//! Role-gate matrix for hostel operations

use crate::models::Role;

/// Operations a request can ask for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    // Rooms
    ViewRoomsGrid,
    ViewRoom,
    ManageRooms,
    ManageBlocks,
    Allocate,
    Vacate,

    // Billing
    CreateBill,
    GenerateBills,
    ViewAllBills,
    ViewOwnBills,
    Pay,
    ManageFeeStructures,

    // Attendance
    MarkAttendance,
    ViewAttendanceSummary,

    // Complaints
    FileComplaint,
    ViewComplaints,
    UpdateComplaint,

    // Reference entities
    ManageStaff,
    ViewStaff,
    ManageStudents,
    ViewStudents,

    // Registration codes
    ManageCodes,

    // Notifications
    ViewNotifications,
}

/// Permission matrix for roles
pub struct PermissionMatrix;

impl PermissionMatrix {
    /// Check if a role may perform an action.
    ///
    /// Ownership checks (a Student paying only their own bill, seeing only
    /// their own rows) are enforced by the engines, not here.
    pub fn can_perform(role: Role, action: Action) -> bool {
        match action {
            // Every authenticated user sees the grid and their notifications
            Action::ViewRoomsGrid => true,
            Action::ViewNotifications => true,

            // Room management - staff roles
            Action::ViewRoom => role >= Role::Warden,
            Action::ManageRooms => role >= Role::Warden,
            Action::Allocate => role >= Role::Warden,
            Action::Vacate => role >= Role::Warden,

            // Blocks are structural - Admin only
            Action::ManageBlocks => role == Role::Admin,

            // Billing
            Action::CreateBill => role >= Role::Warden,
            Action::GenerateBills => role >= Role::Warden,
            Action::ViewAllBills => role >= Role::Warden,
            Action::ViewOwnBills => role == Role::Student,
            Action::Pay => true,
            Action::ManageFeeStructures => role == Role::Admin,

            // Attendance - staff mark, everyone views (own rows for students)
            Action::MarkAttendance => role >= Role::Warden,
            Action::ViewAttendanceSummary => true,

            // Complaints
            Action::FileComplaint => role == Role::Student,
            Action::ViewComplaints => true,
            Action::UpdateComplaint => role >= Role::Warden,

            // Reference entities
            Action::ManageStaff => role == Role::Admin,
            Action::ViewStaff => role >= Role::Warden,
            Action::ManageStudents => role == Role::Admin,
            Action::ViewStudents => role >= Role::Warden,

            // Registration codes
            Action::ManageCodes => role == Role::Admin,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admin_permissions() {
        assert!(PermissionMatrix::can_perform(Role::Admin, Action::ManageBlocks));
        assert!(PermissionMatrix::can_perform(Role::Admin, Action::ManageStaff));
        assert!(PermissionMatrix::can_perform(Role::Admin, Action::GenerateBills));
        assert!(PermissionMatrix::can_perform(Role::Admin, Action::ManageCodes));
    }

    #[test]
    fn test_warden_permissions() {
        assert!(PermissionMatrix::can_perform(Role::Warden, Action::Allocate));
        assert!(PermissionMatrix::can_perform(Role::Warden, Action::CreateBill));
        assert!(PermissionMatrix::can_perform(Role::Warden, Action::MarkAttendance));
        assert!(!PermissionMatrix::can_perform(Role::Warden, Action::ManageBlocks));
        assert!(!PermissionMatrix::can_perform(Role::Warden, Action::ManageStaff));
    }

    #[test]
    fn test_student_permissions() {
        assert!(PermissionMatrix::can_perform(Role::Student, Action::ViewRoomsGrid));
        assert!(PermissionMatrix::can_perform(Role::Student, Action::Pay));
        assert!(PermissionMatrix::can_perform(Role::Student, Action::FileComplaint));
        assert!(PermissionMatrix::can_perform(Role::Student, Action::ViewOwnBills));
        assert!(!PermissionMatrix::can_perform(Role::Student, Action::Allocate));
        assert!(!PermissionMatrix::can_perform(Role::Student, Action::ViewAllBills));
        assert!(!PermissionMatrix::can_perform(Role::Student, Action::MarkAttendance));
    }
}
