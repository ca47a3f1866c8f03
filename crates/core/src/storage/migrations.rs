//! Database migration system
//!
//! Tracks schema versions and applies migrations in order.

use rusqlite::Connection;
use tracing::{info, instrument};

use crate::error::Result;

/// A database migration
pub struct Migration {
    /// Version number (must be sequential starting from 1)
    pub version: u32,
    /// Description of what this migration does
    pub description: &'static str,
    /// SQL to run for this migration
    pub sql: &'static str,
}

/// All migrations in order
const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        description: "Initial schema",
        sql: r#"
            -- User accounts (Admin / Warden / Student)
            CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                role TEXT NOT NULL,
                email TEXT NOT NULL UNIQUE,
                password_hash TEXT NOT NULL,
                first_name TEXT,
                last_name TEXT,
                phone TEXT,
                is_active INTEGER NOT NULL DEFAULT 1,
                created_at TEXT NOT NULL,
                last_login TEXT
            );

            -- Sessions table
            CREATE TABLE IF NOT EXISTS sessions (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                created_at TEXT NOT NULL,
                expires_at TEXT NOT NULL,
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
            );

            -- Student records, 1:1 with Student users
            CREATE TABLE IF NOT EXISTS students (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL UNIQUE,
                guardian_name TEXT,
                guardian_phone TEXT,
                address TEXT,
                created_at TEXT NOT NULL,
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
            );

            -- Block -> Floor -> Room hierarchy
            CREATE TABLE IF NOT EXISTS blocks (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL UNIQUE
            );

            CREATE TABLE IF NOT EXISTS floors (
                id TEXT PRIMARY KEY,
                block_id TEXT NOT NULL,
                name TEXT NOT NULL,
                FOREIGN KEY (block_id) REFERENCES blocks(id) ON DELETE CASCADE,
                UNIQUE(block_id, name)
            );

            -- status holds exactly three values: Vacant / Occupied / Maintenance.
            -- Partial is synthesized by the grid query, never stored.
            CREATE TABLE IF NOT EXISTS rooms (
                id TEXT PRIMARY KEY,
                floor_id TEXT NOT NULL,
                room_number TEXT NOT NULL,
                capacity INTEGER NOT NULL CHECK (capacity > 0),
                status TEXT NOT NULL DEFAULT 'Vacant',
                created_at TEXT NOT NULL,
                FOREIGN KEY (floor_id) REFERENCES floors(id),
                UNIQUE(floor_id, room_number)
            );

            -- Allocations are deactivated, never deleted
            CREATE TABLE IF NOT EXISTS allocations (
                id TEXT PRIMARY KEY,
                student_id TEXT NOT NULL,
                room_id TEXT NOT NULL,
                start_date TEXT NOT NULL,
                end_date TEXT,
                is_active INTEGER NOT NULL DEFAULT 1,
                created_at TEXT NOT NULL,
                FOREIGN KEY (student_id) REFERENCES students(id),
                FOREIGN KEY (room_id) REFERENCES rooms(id)
            );

            -- Fee structures for batch bill generation
            CREATE TABLE IF NOT EXISTS fee_structures (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                monthly_amount INTEGER NOT NULL,
                is_active INTEGER NOT NULL DEFAULT 1,
                created_at TEXT NOT NULL
            );

            -- One bill per (student, month); amounts are integer cents
            CREATE TABLE IF NOT EXISTS bills (
                id TEXT PRIMARY KEY,
                student_id TEXT NOT NULL,
                month_year TEXT NOT NULL,
                amount INTEGER NOT NULL,
                discount INTEGER NOT NULL DEFAULT 0,
                total INTEGER NOT NULL,
                status TEXT NOT NULL DEFAULT 'UNPAID',
                created_at TEXT NOT NULL,
                FOREIGN KEY (student_id) REFERENCES students(id),
                UNIQUE(student_id, month_year)
            );

            -- Append-only payment ledger
            CREATE TABLE IF NOT EXISTS payments (
                id TEXT PRIMARY KEY,
                bill_id TEXT NOT NULL,
                amount INTEGER NOT NULL,
                method TEXT NOT NULL,
                reference TEXT,
                created_at TEXT NOT NULL,
                FOREIGN KEY (bill_id) REFERENCES bills(id)
            );

            -- Attendance marks; re-marking a session upserts the status
            CREATE TABLE IF NOT EXISTS attendance (
                student_id TEXT NOT NULL,
                date TEXT NOT NULL,
                session TEXT NOT NULL,
                status TEXT NOT NULL,
                PRIMARY KEY (student_id, date, session),
                FOREIGN KEY (student_id) REFERENCES students(id) ON DELETE CASCADE
            );

            -- Staff roster
            CREATE TABLE IF NOT EXISTS staff (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                role TEXT NOT NULL,
                phone TEXT,
                shift TEXT,
                created_at TEXT NOT NULL
            );

            -- Complaints
            CREATE TABLE IF NOT EXISTS complaints (
                id TEXT PRIMARY KEY,
                student_id TEXT NOT NULL,
                title TEXT NOT NULL,
                description TEXT,
                status TEXT NOT NULL DEFAULT 'Open',
                assigned_staff_id TEXT,
                created_at TEXT NOT NULL,
                FOREIGN KEY (student_id) REFERENCES students(id) ON DELETE CASCADE,
                FOREIGN KEY (assigned_staff_id) REFERENCES staff(id) ON DELETE SET NULL
            );

            -- In-app notifications
            CREATE TABLE IF NOT EXISTS notifications (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                title TEXT NOT NULL,
                body TEXT,
                link TEXT,
                is_read INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
            );

            -- Role-based registration codes
            CREATE TABLE IF NOT EXISTS registration_codes (
                id TEXT PRIMARY KEY,
                role TEXT NOT NULL,
                code TEXT NOT NULL UNIQUE,
                is_active INTEGER NOT NULL DEFAULT 1,
                created_at TEXT NOT NULL
            );
        "#,
    },
    Migration {
        version: 2,
        description: "Add indexes for query performance",
        sql: r#"
            -- Session indexes
            CREATE INDEX IF NOT EXISTS idx_sessions_user ON sessions(user_id);
            CREATE INDEX IF NOT EXISTS idx_sessions_expires ON sessions(expires_at);

            -- Allocation indexes (active-per-room is the hot occupancy path)
            CREATE INDEX IF NOT EXISTS idx_allocations_room_active
                ON allocations(room_id, is_active);
            CREATE INDEX IF NOT EXISTS idx_allocations_student_active
                ON allocations(student_id, is_active);

            -- Billing indexes
            CREATE INDEX IF NOT EXISTS idx_bills_student ON bills(student_id);
            CREATE INDEX IF NOT EXISTS idx_bills_month ON bills(month_year);
            CREATE INDEX IF NOT EXISTS idx_payments_bill ON payments(bill_id);

            -- Attendance month scans
            CREATE INDEX IF NOT EXISTS idx_attendance_date ON attendance(date);

            -- Notification fetch path
            CREATE INDEX IF NOT EXISTS idx_notifications_user_read
                ON notifications(user_id, is_read);

            -- Complaint list views
            CREATE INDEX IF NOT EXISTS idx_complaints_student ON complaints(student_id);
            CREATE INDEX IF NOT EXISTS idx_complaints_status ON complaints(status);
        "#,
    },
];

/// Initialize the migrations table
fn init_migrations_table(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            description TEXT NOT NULL,
            applied_at TEXT NOT NULL
        )",
        [],
    )?;
    Ok(())
}

/// Get the current schema version
fn get_current_version(conn: &Connection) -> Result<u32> {
    let version: Option<u32> = conn
        .query_row("SELECT MAX(version) FROM schema_migrations", [], |row| {
            row.get(0)
        })
        .unwrap_or(None);
    Ok(version.unwrap_or(0))
}

/// Record that a migration was applied
fn record_migration(conn: &Connection, migration: &Migration) -> Result<()> {
    conn.execute(
        "INSERT INTO schema_migrations (version, description, applied_at) VALUES (?1, ?2, ?3)",
        rusqlite::params![
            migration.version,
            migration.description,
            chrono::Utc::now().to_rfc3339()
        ],
    )?;
    Ok(())
}

/// Run all pending migrations
#[instrument(skip(conn))]
pub fn run_migrations(conn: &Connection) -> Result<()> {
    init_migrations_table(conn)?;

    let current_version = get_current_version(conn)?;
    info!(current_version, "Checking for pending migrations");

    for migration in MIGRATIONS {
        if migration.version > current_version {
            info!(
                version = migration.version,
                description = migration.description,
                "Applying migration"
            );

            conn.execute_batch(migration.sql)?;
            record_migration(conn, migration)?;

            info!(version = migration.version, "Migration complete");
        }
    }

    let new_version = get_current_version(conn)?;
    if new_version > current_version {
        info!(
            from = current_version,
            to = new_version,
            "Database schema updated"
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Get the latest migration version (test helper)
    fn latest_version() -> u32 {
        MIGRATIONS.last().map(|m| m.version).unwrap_or(0)
    }

    #[test]
    fn test_migrations_run() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();

        let version = get_current_version(&conn).unwrap();
        assert_eq!(version, latest_version());
    }

    #[test]
    fn test_migrations_idempotent() {
        let conn = Connection::open_in_memory().unwrap();

        // Run twice
        run_migrations(&conn).unwrap();
        run_migrations(&conn).unwrap();

        let version = get_current_version(&conn).unwrap();
        assert_eq!(version, latest_version());
    }

    #[test]
    fn test_migrations_sequential() {
        // Verify migrations are numbered sequentially
        for (i, migration) in MIGRATIONS.iter().enumerate() {
            assert_eq!(
                migration.version as usize,
                i + 1,
                "Migration {} should have version {}",
                migration.description,
                i + 1
            );
        }
    }
}
