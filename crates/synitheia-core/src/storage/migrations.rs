//! Database schema migrations for synitheia.
//!
//! Migrations are versioned and applied automatically when opening the database.
//! The `schema_version` table tracks the current migration version. Every
//! migration is additive: existing rows are never dropped.

use rusqlite::{Connection, Result as SqliteResult};

/// Current schema version.
///
/// Increment this when adding new migrations.
pub const SCHEMA_VERSION: i32 = 3;

/// Apply all pending migrations to bring the database to the current schema version.
///
/// # Errors
/// Returns an error if migration fails.
pub fn migrate(conn: &Connection) -> SqliteResult<()> {
    create_schema_version_table(conn)?;

    let current_version = get_schema_version(conn);

    if current_version < 1 {
        migrate_v1(conn)?;
    }
    if current_version < 2 {
        migrate_v2(conn)?;
    }
    if current_version < 3 {
        migrate_v3(conn)?;
    }

    Ok(())
}

fn create_schema_version_table(conn: &Connection) -> SqliteResult<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY
        );",
    )
}

/// Get the current schema version from the database.
///
/// Returns 0 if no version is set (initial database).
pub fn get_schema_version(conn: &Connection) -> i32 {
    conn.query_row("SELECT version FROM schema_version", [], |row| {
        row.get::<_, i32>(0)
    })
    .unwrap_or_else(|e| {
        if !matches!(e, rusqlite::Error::QueryReturnedNoRows) {
            tracing::warn!("failed to read schema_version: {e}");
        }
        0
    })
}

fn set_schema_version(tx: &Connection, version: i32) -> SqliteResult<()> {
    tx.execute("DELETE FROM schema_version", [])?;
    tx.execute("INSERT INTO schema_version (version) VALUES (?1)", [version])?;
    Ok(())
}

/// Migration v1: habits and per-day check-ins.
///
/// The check-in primary key is `(habit_id, date)`, so the storage layer
/// itself refuses a second record for the same habit and day.
fn migrate_v1(conn: &Connection) -> SqliteResult<()> {
    let tx = conn.unchecked_transaction()?;

    tx.execute_batch(
        "CREATE TABLE IF NOT EXISTS habits (
            id            TEXT PRIMARY KEY,
            owner_id      TEXT NOT NULL,
            name          TEXT NOT NULL,
            description   TEXT NOT NULL DEFAULT '',
            habit_type    TEXT NOT NULL DEFAULT 'good',
            times_per_day INTEGER NOT NULL DEFAULT 1 CHECK (times_per_day >= 1),
            difficulty    TEXT NOT NULL DEFAULT 'medium',
            reward_points INTEGER NOT NULL DEFAULT 10,
            period        TEXT NOT NULL,
            label         TEXT NOT NULL DEFAULT '',
            reminder_time TEXT,
            created_at    TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS checkins (
            habit_id               TEXT NOT NULL,
            date                   TEXT NOT NULL,
            owner_id               TEXT NOT NULL,
            daily_completion_count INTEGER NOT NULL DEFAULT 0
                                   CHECK (daily_completion_count >= 0),
            reward_collected       INTEGER NOT NULL DEFAULT 0,
            status                 TEXT NOT NULL DEFAULT 'completed',
            PRIMARY KEY (habit_id, date)
        );

        CREATE INDEX IF NOT EXISTS idx_habits_owner ON habits(owner_id);
        CREATE INDEX IF NOT EXISTS idx_checkins_date ON checkins(date);",
    )?;

    set_schema_version(&tx, 1)?;
    tx.commit()?;
    Ok(())
}

/// Migration v2: per-user point balance.
fn migrate_v2(conn: &Connection) -> SqliteResult<()> {
    let tx = conn.unchecked_transaction()?;

    tx.execute_batch(
        "CREATE TABLE IF NOT EXISTS user_data (
            user_id             TEXT PRIMARY KEY,
            total_reward_points INTEGER NOT NULL DEFAULT 0
                                CHECK (total_reward_points >= 0)
        );",
    )?;

    set_schema_version(&tx, 2)?;
    tx.commit()?;
    Ok(())
}

/// Migration v3: optional time estimate per habit.
fn migrate_v3(conn: &Connection) -> SqliteResult<()> {
    let tx = conn.unchecked_transaction()?;

    let has_column: bool = tx
        .query_row(
            "SELECT COUNT(*) FROM pragma_table_info('habits') WHERE name = 'time_taken_minutes'",
            [],
            |row| row.get::<_, i32>(0),
        )
        .unwrap_or(0)
        > 0;

    if !has_column {
        tx.execute_batch("ALTER TABLE habits ADD COLUMN time_taken_minutes INTEGER;")?;
    }

    set_schema_version(&tx, 3)?;
    tx.commit()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migrate_from_scratch() {
        let conn = Connection::open_in_memory().unwrap();
        migrate(&conn).unwrap();
        assert_eq!(get_schema_version(&conn), SCHEMA_VERSION);

        let stmt = conn
            .prepare("SELECT time_taken_minutes, reward_points FROM habits")
            .unwrap();
        drop(stmt);
        let stmt = conn
            .prepare("SELECT total_reward_points FROM user_data")
            .unwrap();
        drop(stmt);
    }

    #[test]
    fn test_migrate_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        migrate(&conn).unwrap();
        migrate(&conn).unwrap();
        assert_eq!(get_schema_version(&conn), SCHEMA_VERSION);
    }

    /// v1 data survives the later migrations.
    #[test]
    fn test_incremental_migration_keeps_rows() {
        let conn = Connection::open_in_memory().unwrap();
        create_schema_version_table(&conn).unwrap();
        migrate_v1(&conn).unwrap();
        conn.execute(
            "INSERT INTO habits (id, owner_id, name, period, created_at)
             VALUES ('h1', 'u1', 'Read', '{\"type\":\"interval\",\"config\":{\"intervalDays\":1}}',
                     '2024-01-01T00:00:00Z')",
            [],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO checkins (habit_id, date, owner_id, daily_completion_count)
             VALUES ('h1', '2024-01-01', 'u1', 1)",
            [],
        )
        .unwrap();

        migrate(&conn).unwrap();
        assert_eq!(get_schema_version(&conn), 3);

        let count: i32 = conn
            .query_row("SELECT COUNT(*) FROM checkins", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1);
        let minutes: Option<i32> = conn
            .query_row(
                "SELECT time_taken_minutes FROM habits WHERE id = 'h1'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(minutes, None);
    }

    #[test]
    fn test_duplicate_checkin_rejected_by_schema() {
        let conn = Connection::open_in_memory().unwrap();
        migrate(&conn).unwrap();
        let insert = "INSERT INTO checkins (habit_id, date, owner_id, daily_completion_count)
                      VALUES ('h1', '2024-01-01', 'u1', 1)";
        conn.execute(insert, []).unwrap();
        assert!(conn.execute(insert, []).is_err());
    }

    #[test]
    fn test_negative_balance_rejected_by_schema() {
        let conn = Connection::open_in_memory().unwrap();
        migrate(&conn).unwrap();
        let result = conn.execute(
            "INSERT INTO user_data (user_id, total_reward_points) VALUES ('u1', -5)",
            [],
        );
        assert!(result.is_err());
    }
}
