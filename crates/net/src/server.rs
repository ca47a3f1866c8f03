//! TCP server for the hostel service
//!
//! Connections speak length-prefixed JSON. A connection must authenticate
//! first; after that every request passes the role gate before it reaches
//! the engines. Server-initiated notification pushes go through a registry
//! of per-user channels and are send-and-ignore: a dead client never fails
//! the request that triggered the push.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use tokio::io::{ReadHalf, WriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc, RwLock};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use dorma_core::{
    Actor, Complaint, Database, MonthKey, Notification, NotificationRepository, PermissionMatrix,
    RegistrationCode, Role, Staff, Student, StudentRepository, User, UserRepository,
};

use crate::auth;
use crate::error::{Error, Result};
use crate::frame::{read_frame, write_frame};
use crate::protocol::{ErrorCode, Request, Response};

/// Per-user registry of live connection senders
type ClientMap = HashMap<Uuid, Vec<mpsc::Sender<Response>>>;

/// Server state shared across tasks
struct ServerState {
    db: Mutex<Database>,
    clients: RwLock<ClientMap>,
    session_hours: i64,
}

/// Hostel server handle
pub struct Server {
    addr: SocketAddr,
    state: Arc<ServerState>,
    shutdown_tx: broadcast::Sender<()>,
}

impl Server {
    /// Start the server on the given port
    pub async fn start(port: u16, db: Database, session_hours: i64) -> Result<Self> {
        let addr = SocketAddr::from(([0, 0, 0, 0], port));
        let listener = TcpListener::bind(addr).await?;
        let bound_addr = listener.local_addr()?;

        info!(addr = %bound_addr, "Server started");

        let (shutdown_tx, _) = broadcast::channel(1);
        let state = Arc::new(ServerState {
            db: Mutex::new(db),
            clients: RwLock::new(HashMap::new()),
            session_hours,
        });

        let state_clone = state.clone();
        let shutdown_rx = shutdown_tx.subscribe();
        tokio::spawn(accept_loop(listener, state_clone, shutdown_rx));

        Ok(Server {
            addr: bound_addr,
            state,
            shutdown_tx,
        })
    }

    /// Get the server's bound address
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Number of live connections, across all users
    pub async fn connection_count(&self) -> usize {
        self.state
            .clients
            .read()
            .await
            .values()
            .map(|v| v.len())
            .sum()
    }

    /// Shutdown the server, telling connected clients first
    pub async fn shutdown(&self) {
        let clients = self.state.clients.read().await;
        for senders in clients.values() {
            for tx in senders {
                let _ = tx.send(Response::ServerShutdown).await;
            }
        }
        drop(clients);
        let _ = self.shutdown_tx.send(());
        info!("Server shutdown initiated");
    }
}

/// Accept incoming connections
async fn accept_loop(
    listener: TcpListener,
    state: Arc<ServerState>,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    loop {
        tokio::select! {
            result = listener.accept() => {
                match result {
                    Ok((stream, addr)) => {
                        debug!(addr = %addr, "New connection");
                        let state = state.clone();
                        tokio::spawn(handle_connection(stream, addr, state));
                    }
                    Err(e) => {
                        error!(error = %e, "Accept failed");
                    }
                }
            }
            _ = shutdown_rx.recv() => {
                info!("Accept loop shutting down");
                break;
            }
        }
    }
}

/// Handle a single client connection
async fn handle_connection(stream: TcpStream, addr: SocketAddr, state: Arc<ServerState>) {
    let (mut reader, mut writer) = tokio::io::split(stream);

    let (actor, session_id) = match handshake(&mut reader, &mut writer, &state).await {
        Ok(authed) => authed,
        Err(e) => {
            debug!(addr = %addr, error = %e, "Handshake ended");
            return;
        }
    };

    info!(addr = %addr, user_id = %actor.user_id, role = %actor.role, "Client authenticated");

    // Per-connection writer task; the sender is also registered for pushes
    let (msg_tx, msg_rx) = mpsc::channel::<Response>(64);
    {
        let mut clients = state.clients.write().await;
        clients.entry(actor.user_id).or_default().push(msg_tx.clone());
    }
    let writer_handle = tokio::spawn(writer_task(writer, msg_rx));

    // Request loop
    loop {
        let request: Request = match read_frame(&mut reader).await {
            Ok(req) => req,
            Err(Error::ConnectionClosed) => {
                debug!(user_id = %actor.user_id, "Connection closed");
                break;
            }
            Err(e) => {
                warn!(user_id = %actor.user_id, error = %e, "Read error");
                break;
            }
        };

        if matches!(request, Request::Logout) {
            {
                let db = state.db.lock().unwrap();
                if let Err(e) = db.users().delete_session(session_id) {
                    warn!(error = %e, "Failed to delete session");
                }
            }
            let _ = msg_tx.send(Response::Ok).await;
            break;
        }

        let (response, pushes) = {
            let db = state.db.lock().unwrap();
            dispatch(request, actor, &db)
        };

        if msg_tx.send(response).await.is_err() {
            break;
        }
        for notification in pushes {
            push_notification(&state, notification).await;
        }
    }

    // Cleanup: drop this connection's sender from the registry
    {
        let mut clients = state.clients.write().await;
        if let Some(senders) = clients.get_mut(&actor.user_id) {
            senders.retain(|tx| !tx.same_channel(&msg_tx));
            if senders.is_empty() {
                clients.remove(&actor.user_id);
            }
        }
    }
    writer_handle.abort();

    info!(user_id = %actor.user_id, "Client disconnected");
}

/// Login-first handshake.
///
/// Keeps answering on the same connection until a Login or Resume
/// succeeds; Register is allowed pre-auth and answered in place.
async fn handshake(
    reader: &mut ReadHalf<TcpStream>,
    writer: &mut WriteHalf<TcpStream>,
    state: &Arc<ServerState>,
) -> Result<(Actor, Uuid)> {
    loop {
        let request: Request = read_frame(reader).await?;

        let attempt = match request {
            Request::Login { email, password } => {
                let db = state.db.lock().unwrap();
                auth::login(&*db, &email, &password, state.session_hours)
            }
            Request::Resume { token } => {
                let db = state.db.lock().unwrap();
                auth::resume(&*db, token)
            }
            Request::Register {
                code,
                email,
                password,
                first_name,
                last_name,
            } => {
                let result = {
                    let db = state.db.lock().unwrap();
                    auth::register(&db, &code, &email, &password, first_name, last_name)
                };
                let response = match result {
                    Ok(user) => Response::Registered { user_id: user.id },
                    Err(e) => Response::from_error(&e),
                };
                write_frame(writer, &response).await?;
                continue;
            }
            Request::Ping => {
                write_frame(writer, &Response::Pong).await?;
                continue;
            }
            _ => {
                let response = Response::Error {
                    code: ErrorCode::Unauthorized,
                    message: "Authentication required".into(),
                };
                write_frame(writer, &response).await?;
                continue;
            }
        };

        match attempt {
            Ok((user, session)) => {
                let response = Response::LoggedIn {
                    token: session.id,
                    user_id: user.id,
                    role: user.role,
                    display_name: user.display_name(),
                };
                write_frame(writer, &response).await?;
                return Ok((
                    Actor {
                        user_id: user.id,
                        role: user.role,
                    },
                    session.id,
                ));
            }
            Err(e) => {
                write_frame(writer, &Response::from_error(&e)).await?;
            }
        }
    }
}

/// Writer task - sends responses and pushes to the client
async fn writer_task(mut writer: WriteHalf<TcpStream>, mut rx: mpsc::Receiver<Response>) {
    while let Some(msg) = rx.recv().await {
        if let Err(e) = write_frame(&mut writer, &msg).await {
            debug!(error = %e, "Write failed");
            break;
        }
    }
}

/// Deliver one persisted notification to every live connection of its user
async fn push_notification(state: &Arc<ServerState>, notification: Notification) {
    let clients = state.clients.read().await;
    if let Some(senders) = clients.get(&notification.user_id) {
        for tx in senders {
            let _ = tx
                .send(Response::Notify {
                    notification: notification.clone(),
                })
                .await;
        }
    }
}

/// Persist notifications for a set of users. Returns the rows so the
/// caller can push them; persistence failures are logged, not fatal.
fn notify_users(
    db: &Database,
    user_ids: &[Uuid],
    title: &str,
    body: Option<String>,
    link: Option<String>,
) -> Vec<Notification> {
    let mut created = Vec::with_capacity(user_ids.len());
    for &user_id in user_ids {
        let notification = Notification::new(user_id, title.to_string(), body.clone(), link.clone());
        match db.create_notification(&notification) {
            Ok(()) => created.push(notification),
            Err(e) => warn!(user_id = %user_id, error = %e, "Failed to persist notification"),
        }
    }
    created
}

/// Resolve the student record behind a Student actor
fn own_student(db: &Database, actor: Actor) -> dorma_core::Result<Student> {
    db.find_student_by_user(actor.user_id)?
        .ok_or_else(|| dorma_core::Error::NotFound("Student record not found".into()))
}

macro_rules! try_respond {
    ($expr:expr) => {
        match $expr {
            Ok(v) => v,
            Err(e) => return (Response::from_error(&e), Vec::new()),
        }
    };
}

/// Execute one authenticated request against the database.
///
/// Runs under the database lock and must stay synchronous. Returns the
/// reply plus any notifications to fan out after the lock is released.
fn dispatch(request: Request, actor: Actor, db: &Database) -> (Response, Vec<Notification>) {
    if let Some(action) = request.action() {
        if !PermissionMatrix::can_perform(actor.role, action) {
            return (
                Response::Error {
                    code: ErrorCode::Forbidden,
                    message: "Not allowed for this role".into(),
                },
                Vec::new(),
            );
        }
    }

    let mut pushes = Vec::new();
    let response = match request {
        // Handled before dispatch / in the handshake
        Request::Login { .. }
        | Request::Resume { .. }
        | Request::Register { .. }
        | Request::Logout => Response::Error {
            code: ErrorCode::BadRequest,
            message: "Already authenticated".into(),
        },
        Request::Ping => Response::Pong,

        // Rooms
        Request::RoomsGrid => {
            let rooms = try_respond!(db.occupancy().rooms_grid(actor.role));
            Response::Grid { rooms }
        }
        Request::GetRoom { room_id } => {
            let detail = try_respond!(db.rooms().find_detail(room_id));
            match detail {
                Some(detail) => Response::Room { detail },
                None => Response::Error {
                    code: ErrorCode::NotFound,
                    message: "Room not found".into(),
                },
            }
        }
        Request::CreateBlock { name } => {
            let block = dorma_core::Block::new(name);
            try_respond!(db.rooms().create_block(&block));
            Response::Created { id: block.id }
        }
        Request::ListBlocks => {
            let blocks = try_respond!(db.rooms().list_blocks());
            Response::Blocks { blocks }
        }
        Request::CreateFloor { block_id, name } => {
            let floor = dorma_core::Floor::new(block_id, name);
            try_respond!(db.rooms().create_floor(&floor));
            Response::Created { id: floor.id }
        }
        Request::ListFloors { block_id } => {
            let floors = try_respond!(db.rooms().list_floors(block_id));
            Response::Floors { floors }
        }
        Request::CreateRoom {
            floor_id,
            room_number,
            capacity,
        } => {
            if capacity == 0 {
                return (
                    Response::Error {
                        code: ErrorCode::BadRequest,
                        message: "Capacity must be positive".into(),
                    },
                    pushes,
                );
            }
            let room = dorma_core::Room::new(floor_id, room_number, capacity);
            try_respond!(db.rooms().create_room(&room));
            Response::Created { id: room.id }
        }
        Request::UpdateRoom { room_id, update } => {
            try_respond!(db.occupancy().update_room(room_id, &update));
            Response::Ok
        }
        Request::Allocate {
            student_id,
            room_id,
            start_date,
        } => {
            let id = try_respond!(db.occupancy().allocate(student_id, room_id, start_date));
            Response::Created { id }
        }
        Request::Vacate {
            allocation_id,
            end_date,
        } => {
            try_respond!(db.occupancy().vacate(allocation_id, end_date));
            Response::Ok
        }

        // Billing
        Request::CreateBill {
            student_id,
            month,
            amount,
            discount,
        } => {
            let id = try_respond!(db.billing().create_bill(student_id, month, amount, discount));
            Response::Created { id }
        }
        Request::GenerateBills {
            month,
            fee_structure_id,
        } => {
            let outcome = try_respond!(db.billing().generate_monthly(month.clone(), fee_structure_id));
            let admins = try_respond!(db.ids_with_roles(&[Role::Admin]));
            pushes = notify_users(
                db,
                &admins,
                "Monthly bills generated",
                Some(format!(
                    "{}: {} created, {} already billed",
                    month, outcome.created, outcome.skipped_duplicate
                )),
                None,
            );
            Response::Generated { outcome }
        }
        Request::ListBills => {
            let bills = try_respond!(db.billing().list_bills_with_balance());
            Response::Bills { bills }
        }
        Request::MyBills => {
            let student = try_respond!(own_student(db, actor));
            let bills = try_respond!(db.billing().list_bills_for_student(student.id));
            Response::Bills { bills }
        }
        Request::Pay {
            bill_id,
            amount,
            method,
            reference,
        } => {
            let status = try_respond!(db.billing().pay(bill_id, amount, method, reference, actor));
            // Tell the bill owner their balance moved
            if let Ok(Some(bill)) = db.bills().find_bill(bill_id) {
                if let Ok(Some(student)) = db.find_student_by_id(bill.student_id) {
                    pushes = notify_users(
                        db,
                        &[student.user_id],
                        "Payment recorded",
                        Some(format!("{} is now {}", bill.month, status)),
                        None,
                    );
                }
            }
            Response::PaymentRecorded { status }
        }
        Request::CreateFeeStructure {
            name,
            monthly_amount,
        } => {
            let id = try_respond!(db.billing().create_fee_structure(name, monthly_amount));
            Response::Created { id }
        }
        Request::ListFeeStructures => {
            let fees = try_respond!(db.billing().list_fee_structures());
            Response::FeeStructures { fees }
        }

        // Attendance
        Request::MarkAttendance {
            date,
            session,
            marks,
        } => {
            let written = try_respond!(db.attendance().mark(date, session, &marks));
            Response::AttendanceMarked { written }
        }
        Request::AttendanceSummary { month } => {
            let month = try_respond!(MonthKey::parse(&month));
            let scope = if actor.role == Role::Student {
                Some(try_respond!(own_student(db, actor)).id)
            } else {
                None
            };
            let rows = try_respond!(db.attendance().summary(month.as_str(), scope));
            Response::Attendance { rows }
        }

        // Complaints
        Request::FileComplaint { title, description } => {
            if title.trim().is_empty() {
                return (
                    Response::Error {
                        code: ErrorCode::BadRequest,
                        message: "Title is required".into(),
                    },
                    pushes,
                );
            }
            let student = try_respond!(own_student(db, actor));
            let complaint = Complaint::new(student.id, title.clone(), description);
            try_respond!(db.complaints().create(&complaint));
            let staff_users = try_respond!(db.ids_with_roles(&[Role::Admin, Role::Warden]));
            pushes = notify_users(db, &staff_users, "New complaint", Some(title), None);
            Response::Created { id: complaint.id }
        }
        Request::ListComplaints => {
            let complaints = if actor.role == Role::Student {
                let student = try_respond!(own_student(db, actor));
                try_respond!(db.complaints().list_for_student(student.id))
            } else {
                try_respond!(db.complaints().list())
            };
            Response::Complaints { complaints }
        }
        Request::UpdateComplaint {
            complaint_id,
            status,
            assigned_staff_id,
        } => {
            let existing = try_respond!(db.complaints().find_by_id(complaint_id));
            if existing.is_none() {
                return (
                    Response::Error {
                        code: ErrorCode::NotFound,
                        message: "Complaint not found".into(),
                    },
                    pushes,
                );
            }
            try_respond!(db.complaints().update(complaint_id, status, assigned_staff_id));
            Response::Ok
        }

        // Staff
        Request::CreateStaff {
            name,
            role,
            phone,
            shift,
        } => {
            let mut staff = Staff::new(name, role);
            staff.phone = phone;
            staff.shift = shift;
            try_respond!(db.staff().create(&staff));
            Response::Created { id: staff.id }
        }
        Request::UpdateStaff {
            staff_id,
            name,
            role,
            phone,
            shift,
        } => {
            let mut staff = match try_respond!(db.staff().find_by_id(staff_id)) {
                Some(s) => s,
                None => {
                    return (
                        Response::Error {
                            code: ErrorCode::NotFound,
                            message: "Staff member not found".into(),
                        },
                        pushes,
                    )
                }
            };
            staff.name = name;
            staff.role = role;
            staff.phone = phone;
            staff.shift = shift;
            try_respond!(db.staff().update(&staff));
            Response::Ok
        }
        Request::DeleteStaff { staff_id } => {
            try_respond!(db.staff().delete(staff_id));
            Response::Ok
        }
        Request::ListStaff => {
            let staff = try_respond!(db.staff().list());
            Response::StaffList { staff }
        }

        // Students
        Request::CreateStudent {
            email,
            password,
            first_name,
            last_name,
            guardian_name,
            guardian_phone,
            address,
        } => {
            let hash = try_respond!(auth::hash_password(&password));
            let mut user = User::new(Role::Student, email, hash);
            user.first_name = first_name;
            user.last_name = last_name;
            try_respond!(db.create_user(&user));
            let mut student = Student::new(user.id);
            student.guardian_name = guardian_name;
            student.guardian_phone = guardian_phone;
            student.address = address;
            try_respond!(db.create_student(&student));
            Response::Created { id: student.id }
        }
        Request::ListStudents => {
            let students = try_respond!(db.list_students());
            Response::Students { students }
        }

        // Notifications
        Request::Notifications { limit } => {
            let notifications = try_respond!(db.list_notifications(actor.user_id, limit));
            let unread = try_respond!(db.unread_count(actor.user_id));
            Response::NotificationList {
                notifications,
                unread,
            }
        }
        Request::MarkRead { ids } => {
            let updated = try_respond!(db.mark_read(actor.user_id, &ids));
            Response::MarkedRead { updated }
        }
        Request::MarkAllRead => {
            let updated = try_respond!(db.mark_all_read(actor.user_id));
            Response::MarkedRead { updated }
        }

        // Registration codes
        Request::CreateCode { role } => {
            // The 6-char suffix can collide; retry with a fresh code
            let mut last_err = None;
            let mut created = None;
            for _ in 0..3 {
                let code = RegistrationCode::new(role);
                match db.codes().create(&code) {
                    Ok(()) => {
                        created = Some(code);
                        break;
                    }
                    Err(e) if e.is_conflict() => last_err = Some(e),
                    Err(e) => return (Response::from_error(&e), pushes),
                }
            }
            match created {
                Some(code) => Response::Codes { codes: vec![code] },
                None => Response::from_error(&last_err.unwrap_or_else(|| {
                    dorma_core::Error::Conflict("Registration code collision".into())
                })),
            }
        }
        Request::ListCodes => {
            let codes = try_respond!(db.codes().list_active());
            Response::Codes { codes }
        }
        Request::DeleteCode { code_id } => {
            try_respond!(db.codes().delete(code_id));
            Response::Ok
        }
    };

    (response, pushes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::Client;
    use dorma_core::{Block, Floor, Room};

    async fn start_seeded() -> (Server, Uuid) {
        let db = Database::open_in_memory().unwrap();

        let admin = User::new(
            Role::Admin,
            "admin@dorm.test".into(),
            auth::hash_password("admin-pw").unwrap(),
        );
        db.create_user(&admin).unwrap();

        let student_user = User::new(
            Role::Student,
            "s1@dorm.test".into(),
            auth::hash_password("student-pw").unwrap(),
        );
        db.create_user(&student_user).unwrap();
        let student = Student::new(student_user.id);
        db.create_student(&student).unwrap();

        let block = Block::new("A".into());
        db.rooms().create_block(&block).unwrap();
        let floor = Floor::new(block.id, "1".into());
        db.rooms().create_floor(&floor).unwrap();
        let room = Room::new(floor.id, "101".into(), 2);
        db.rooms().create_room(&room).unwrap();

        let server = Server::start(0, db, 24).await.unwrap();
        (server, student.id)
    }

    #[tokio::test]
    async fn test_login_and_rooms_grid() {
        let (server, _student_id) = start_seeded().await;
        let mut client = Client::connect(server.addr()).await.unwrap();

        let response = client
            .request(Request::Login {
                email: "admin@dorm.test".into(),
                password: "admin-pw".into(),
            })
            .await
            .unwrap();
        assert!(matches!(
            response,
            Response::LoggedIn {
                role: Role::Admin,
                ..
            }
        ));

        let response = client.request(Request::RoomsGrid).await.unwrap();
        match response {
            Response::Grid { rooms } => assert_eq!(rooms.len(), 1),
            other => panic!("Unexpected response: {:?}", other),
        }

        server.shutdown().await;
    }

    #[tokio::test]
    async fn test_bad_credentials_then_retry() {
        let (server, _student_id) = start_seeded().await;
        let mut client = Client::connect(server.addr()).await.unwrap();

        let response = client
            .request(Request::Login {
                email: "admin@dorm.test".into(),
                password: "wrong".into(),
            })
            .await
            .unwrap();
        assert!(matches!(
            response,
            Response::Error {
                code: ErrorCode::Unauthorized,
                ..
            }
        ));

        // Same connection can retry
        let response = client
            .request(Request::Login {
                email: "admin@dorm.test".into(),
                password: "admin-pw".into(),
            })
            .await
            .unwrap();
        assert!(matches!(response, Response::LoggedIn { .. }));

        server.shutdown().await;
    }

    #[tokio::test]
    async fn test_student_role_gate() {
        let (server, student_id) = start_seeded().await;
        let mut client = Client::connect(server.addr()).await.unwrap();

        client
            .request(Request::Login {
                email: "s1@dorm.test".into(),
                password: "student-pw".into(),
            })
            .await
            .unwrap();

        // Students cannot allocate rooms
        let response = client
            .request(Request::Allocate {
                student_id,
                room_id: Uuid::new_v4(),
                start_date: "2025-09-01".parse().unwrap(),
            })
            .await
            .unwrap();
        assert!(matches!(
            response,
            Response::Error {
                code: ErrorCode::Forbidden,
                ..
            }
        ));

        // But they see the grid, without occupant names
        let response = client.request(Request::RoomsGrid).await.unwrap();
        match response {
            Response::Grid { rooms } => assert!(rooms.iter().all(|r| r.occupant_names.is_none())),
            other => panic!("Unexpected response: {:?}", other),
        }

        server.shutdown().await;
    }

    #[tokio::test]
    async fn test_malformed_month_is_rejected_not_fatal() {
        let (server, _student_id) = start_seeded().await;
        let mut client = Client::connect(server.addr()).await.unwrap();

        client
            .request(Request::Login {
                email: "admin@dorm.test".into(),
                password: "admin-pw".into(),
            })
            .await
            .unwrap();

        // Multi-byte input near the month truncation point
        let response = client
            .request(Request::AttendanceSummary {
                month: "2025-0é".into(),
            })
            .await
            .unwrap();
        assert!(matches!(
            response,
            Response::Error {
                code: ErrorCode::BadRequest,
                ..
            }
        ));

        // The connection and the server both keep working afterwards
        let response = client.request(Request::RoomsGrid).await.unwrap();
        assert!(matches!(response, Response::Grid { .. }));

        let mut second = Client::connect(server.addr()).await.unwrap();
        let response = second
            .request(Request::Login {
                email: "admin@dorm.test".into(),
                password: "admin-pw".into(),
            })
            .await
            .unwrap();
        assert!(matches!(response, Response::LoggedIn { .. }));

        server.shutdown().await;
    }

    #[tokio::test]
    async fn test_unauthenticated_requests_rejected() {
        let (server, _student_id) = start_seeded().await;
        let mut client = Client::connect(server.addr()).await.unwrap();

        let response = client.request(Request::RoomsGrid).await.unwrap();
        assert!(matches!(
            response,
            Response::Error {
                code: ErrorCode::Unauthorized,
                ..
            }
        ));

        server.shutdown().await;
    }
}
