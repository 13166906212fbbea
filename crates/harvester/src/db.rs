//! Database connection utilities.

use sea_orm::{ConnectOptions, Database, DatabaseConnection, DbErr};

/// Configure SQLite-specific pragmas for better performance and concurrency.
///
/// This sets:
/// - `journal_mode=WAL` - Write-ahead logging for better concurrent access
/// - `busy_timeout=5000` - Wait up to 5 seconds for locks instead of failing immediately
/// - `synchronous=NORMAL` - Good balance of safety and performance with WAL
async fn configure_sqlite(db: &DatabaseConnection) -> Result<(), DbErr> {
    use sea_orm::{ConnectionTrait, Statement};

    // Enable WAL mode for better concurrency (readers don't block writers)
    db.execute(Statement::from_string(
        db.get_database_backend(),
        "PRAGMA journal_mode=WAL".to_string(),
    ))
    .await?;

    // Wait up to 5 seconds for locks instead of failing immediately
    db.execute(Statement::from_string(
        db.get_database_backend(),
        "PRAGMA busy_timeout=5000".to_string(),
    ))
    .await?;

    // NORMAL synchronous is safe with WAL and faster than FULL
    db.execute(Statement::from_string(
        db.get_database_backend(),
        "PRAGMA synchronous=NORMAL".to_string(),
    ))
    .await?;

    Ok(())
}

/// Build connection options for `database_url`.
///
/// An in-memory SQLite database exists once per connection, so such URLs get
/// a single-connection pool; every caller then sees the same schema and data.
fn connect_options(database_url: &str) -> ConnectOptions {
    let mut options = ConnectOptions::new(database_url.to_string());
    options.sqlx_logging(false);
    if is_sqlite_memory(database_url) {
        options.max_connections(1).min_connections(1);
    }
    options
}

fn is_sqlite(database_url: &str) -> bool {
    database_url.starts_with("sqlite:")
}

fn is_sqlite_memory(database_url: &str) -> bool {
    is_sqlite(database_url) && database_url.contains(":memory:")
}

/// Establish a connection to the database.
///
/// For file-backed SQLite databases, this automatically configures:
/// - WAL journal mode for better concurrency
/// - 5 second busy timeout to handle lock contention
/// - NORMAL synchronous mode for better performance
///
/// # Arguments
/// * `database_url` - Database connection string (e.g., `sqlite://harvester.db?mode=rwc` or `postgres:///harvester`)
///
/// # Errors
/// Returns `DbErr` if the connection cannot be established.
pub async fn connect(database_url: &str) -> Result<DatabaseConnection, DbErr> {
    let db = Database::connect(connect_options(database_url)).await?;

    if is_sqlite(database_url) && !is_sqlite_memory(database_url) {
        configure_sqlite(&db).await?;
    }

    Ok(db)
}

/// Establish a connection to the database and run all pending migrations.
///
/// # Errors
/// Returns `DbErr` if the connection cannot be established or migrations fail.
///
/// # Example
/// ```ignore
/// let db = harvester::connect_and_migrate("sqlite::memory:").await?;
/// ```
#[cfg(feature = "migrate")]
pub async fn connect_and_migrate(database_url: &str) -> Result<DatabaseConnection, DbErr> {
    use sea_orm_migration::MigratorTrait;

    let db = connect(database_url).await?;
    crate::migration::Migrator::up(&db, None).await?;
    Ok(db)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn configure_sqlite_sets_busy_timeout() {
        use sea_orm::{ConnectionTrait, Statement};

        let db = Database::connect(connect_options("sqlite::memory:"))
            .await
            .expect("in-memory sqlite should connect");
        configure_sqlite(&db)
            .await
            .expect("sqlite pragmas should apply");

        let row = db
            .query_one(Statement::from_string(
                db.get_database_backend(),
                "PRAGMA busy_timeout".to_string(),
            ))
            .await
            .expect("pragma query should succeed")
            .expect("pragma should return a row");
        let timeout: i32 = row.try_get_by_index(0).expect("timeout column");
        assert_eq!(timeout, 5000);
    }

    #[test]
    fn sqlite_url_detection() {
        assert!(is_sqlite("sqlite://harvester.db?mode=rwc"));
        assert!(is_sqlite_memory("sqlite::memory:"));
        assert!(!is_sqlite_memory("sqlite://harvester.db"));
        assert!(!is_sqlite("postgres:///harvester"));
    }

    #[tokio::test]
    async fn connect_returns_error_for_invalid_database_url() {
        let err = connect("this-is-not-a-db-url")
            .await
            .expect_err("invalid URL should error");
        let msg = err.to_string().to_ascii_lowercase();
        assert!(
            msg.contains("error") || msg.contains("invalid"),
            "unexpected error message: {err}"
        );
    }

    #[cfg(feature = "migrate")]
    #[tokio::test]
    async fn connect_and_migrate_creates_schema_in_memory() {
        use sea_orm::{EntityTrait, PaginatorTrait};

        let db = connect_and_migrate("sqlite::memory:")
            .await
            .expect("in-memory sqlite should migrate");
        let count = crate::entity::prelude::Repository::find()
            .count(&db)
            .await
            .expect("repositories table should exist");
        assert_eq!(count, 0);
    }
}
