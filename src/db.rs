use crate::error::{AppError, AppResult};
use rusqlite::{params, Connection, OptionalExtension, Result};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

const MIGRATION_INIT_SQL: &str = include_str!("../migrations/0000_init.sql");
const MIGRATION_LOOKUP_INDEXES_SQL: &str = include_str!("../migrations/0001_lookup_indexes.sql");

/// Shared handle to the SQLite database. Cloning is cheap; every clone talks
/// to the same connection.
#[derive(Debug, Clone)]
pub struct Store {
    conn: Arc<Mutex<Connection>>,
}

impl Store {
    pub fn open(path: &Path) -> AppResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|err| {
                    AppError::Internal(format!("failed to create {}: {}", parent.display(), err))
                })?;
            }
        }
        Ok(Self::from_connection(Connection::open(path)?)?)
    }

    pub fn in_memory() -> AppResult<Self> {
        Ok(Self::from_connection(Connection::open_in_memory()?)?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        migrate(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn lock(&self) -> AppResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| AppError::Internal("database lock poisoned".to_string()))
    }
}

pub fn migrate(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            id TEXT PRIMARY KEY NOT NULL,
            applied_at INTEGER NOT NULL
        );",
    )?;

    apply_migration(conn, "0000_init", MIGRATION_INIT_SQL)?;
    apply_migration(conn, "0001_lookup_indexes", MIGRATION_LOOKUP_INDEXES_SQL)?;
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    Ok(())
}

fn apply_migration(conn: &Connection, id: &str, sql: &str) -> Result<()> {
    let existing: Option<String> = conn
        .query_row(
            "SELECT id FROM schema_migrations WHERE id = ?1",
            params![id],
            |row| row.get(0),
        )
        .optional()?;
    if existing.is_some() {
        return Ok(());
    }
    conn.execute_batch(sql)?;
    conn.execute(
        "INSERT INTO schema_migrations (id, applied_at) VALUES (?1, ?2)",
        params![id, chrono::Utc::now().timestamp_millis()],
    )?;
    log::info!("[db] applied migration {}", id);
    Ok(())
}

/// Fills an empty catalog with a few titles so a fresh install has something
/// to browse. Returns how many books were inserted.
pub fn seed_demo_books(conn: &Connection) -> Result<usize> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM books", [], |row| row.get(0))?;
    if count > 0 {
        return Ok(0);
    }

    let mut stmt = conn.prepare(
        "INSERT INTO books
         (title, author, category, year, description, cover_url,
          price_buy, price_rent_2w, price_rent_1m, price_rent_3m, status)
         VALUES (?1, ?2, ?3, ?4, ?5, '', ?6, ?7, ?8, ?9, 'available')",
    )?;
    stmt.execute(params![
        "Три товарища",
        "Эрих Мария Ремарк",
        "Роман",
        1937,
        "История дружбы, любви и надежды в послевоенной Германии.",
        500.0,
        150.0,
        200.0,
        300.0
    ])?;
    stmt.execute(params![
        "Мастер и Маргарита",
        "Михаил Булгаков",
        "Роман",
        1967,
        "Мистика, сатира и любовь на фоне Москвы 30-х.",
        600.0,
        180.0,
        250.0,
        350.0
    ])?;
    stmt.execute(params![
        "1984",
        "Джордж Оруэлл",
        "Антиутопия",
        1949,
        "Классика антиутопии о тоталитарном обществе.",
        450.0,
        130.0,
        180.0,
        260.0
    ])?;
    log::info!("[db] seeded demo catalog");
    Ok(3)
}
