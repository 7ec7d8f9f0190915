//! Database connection pool management.
//!
//! Connection pooling for SQLite using r2d2. Opening a pool runs any
//! pending migrations.

use hlsrelay_common::{Error, Result};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;

use crate::migrations;

/// Type alias for the database connection pool.
pub type DbPool = Pool<SqliteConnectionManager>;

/// Type alias for a pooled database connection.
pub type PooledConnection = r2d2::PooledConnection<SqliteConnectionManager>;

/// Initialize a pool backed by the SQLite file at `db_path`.
///
/// The file is created if it doesn't exist. The pool holds up to 4
/// connections, each with foreign keys enabled and the WAL journal.
///
/// # Example
///
/// ```no_run
/// use hlsrelay_db::pool::init_pool;
///
/// let pool = init_pool("/var/lib/hlsrelay/hlsrelay.db").unwrap();
/// let conn = pool.get().unwrap();
/// ```
pub fn init_pool(db_path: &str) -> Result<DbPool> {
    let manager = SqliteConnectionManager::file(db_path).with_init(|conn| {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        // journal_mode reports the resulting mode as a row
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| {
            row.get::<_, String>(0)
        })
        .map(|_| ())
    });

    let pool = Pool::builder()
        .max_size(4)
        .build(manager)
        .map_err(|e| Error::database(format!("Failed to create connection pool: {}", e)))?;

    migrate(&pool)?;
    Ok(pool)
}

/// Initialize an in-memory pool for testing.
///
/// Every SQLite in-memory connection is its own database, so this pool
/// holds exactly one connection.
///
/// ```
/// use hlsrelay_db::pool::init_memory_pool;
///
/// let pool = init_memory_pool().unwrap();
/// let conn = pool.get().unwrap();
/// ```
pub fn init_memory_pool() -> Result<DbPool> {
    let manager = SqliteConnectionManager::memory()
        .with_init(|conn| conn.execute_batch("PRAGMA foreign_keys = ON;"));

    let pool = Pool::builder()
        .max_size(1)
        .build(manager)
        .map_err(|e| Error::database(format!("Failed to create in-memory pool: {}", e)))?;

    migrate(&pool)?;
    Ok(pool)
}

fn migrate(pool: &DbPool) -> Result<()> {
    let conn = get_conn(pool)?;
    migrations::run_migrations(&conn)
        .map_err(|e| Error::database(format!("Failed to run migrations: {}", e)))?;
    Ok(())
}

/// Get a connection from the pool.
pub fn get_conn(pool: &DbPool) -> Result<PooledConnection> {
    pool.get()
        .map_err(|e| Error::database(format!("Failed to get connection from pool: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_memory_pool() {
        let pool = init_memory_pool().unwrap();
        assert_eq!(pool.max_size(), 1);
    }

    #[test]
    fn test_foreign_keys_enabled() {
        let pool = init_memory_pool().unwrap();
        let conn = get_conn(&pool).unwrap();

        let enabled: i32 = conn
            .query_row("PRAGMA foreign_keys", [], |row| row.get(0))
            .unwrap();
        assert_eq!(enabled, 1);
    }

    #[test]
    fn test_file_pool_persists_across_connections() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hlsrelay.db");
        let pool = init_pool(path.to_str().unwrap()).unwrap();
        assert_eq!(pool.max_size(), 4);

        {
            let conn = get_conn(&pool).unwrap();
            conn.execute(
                "INSERT INTO overlays (id, stream_id, type, content, created_at, updated_at)
                 VALUES ('o1', 's1', 'text', 'hello', '', '')",
                [],
            )
            .unwrap();
        }

        let _held = get_conn(&pool).unwrap();
        let conn = get_conn(&pool).unwrap();
        let content: String = conn
            .query_row("SELECT content FROM overlays WHERE id = 'o1'", [], |row| {
                row.get(0)
            })
            .unwrap();
        assert_eq!(content, "hello");
    }

    #[test]
    fn test_file_pool_uses_wal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hlsrelay.db");
        let pool = init_pool(path.to_str().unwrap()).unwrap();
        let conn = get_conn(&pool).unwrap();

        let mode: String = conn
            .query_row("PRAGMA journal_mode", [], |row| row.get(0))
            .unwrap();
        assert_eq!(mode.to_lowercase(), "wal");
    }

    #[test]
    fn test_reopen_skips_applied_migrations() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hlsrelay.db");
        drop(init_pool(path.to_str().unwrap()).unwrap());

        let pool = init_pool(path.to_str().unwrap()).unwrap();
        let conn = get_conn(&pool).unwrap();
        assert_eq!(
            migrations::current_version(&conn).unwrap(),
            migrations::latest_version()
        );
    }
}
