use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    Pool, Row, Sqlite, SqliteExecutor, Transaction,
};
use std::{
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};

/// SQLite-backed data store. Cheap to clone; all clones share one pool.
///
/// The engine only ever opens transactions through [`Storage::begin`]; row
/// operations are free functions generic over the executor so the same query
/// runs against the pool (plain reads) or inside a transaction handle.
#[derive(Clone)]
pub struct Storage {
    pool: Pool<Sqlite>,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct Todo {
    pub id: i64,
    pub text: String,
    pub done: bool,
    pub created_at: DateTime<Utc>,
}

impl Storage {
    pub async fn new(database_url: &str) -> Result<Self> {
        ensure_sqlite_parent_dir_exists(database_url)?;

        let connect_options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(connect_options)
            .await?;
        ensure_schema(&pool).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    /// Opens a transaction that must resolve via commit or rollback.
    pub async fn begin(&self) -> Result<Transaction<'static, Sqlite>> {
        self.pool.begin().await.context("begin transaction")
    }

    pub async fn health_check(&self) -> Result<()> {
        let _: i64 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .context("sqlite ping failed")?;
        Ok(())
    }

    pub async fn list_todos(&self) -> Result<Vec<Todo>> {
        list_todos(&self.pool).await
    }
}

async fn ensure_schema(pool: &Pool<Sqlite>) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS todos (
            id         INTEGER PRIMARY KEY AUTOINCREMENT,
            text       TEXT NOT NULL,
            done       INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn list_todos<'e, E>(db: E) -> Result<Vec<Todo>>
where
    E: SqliteExecutor<'e>,
{
    let rows = sqlx::query("SELECT id, text, done, created_at FROM todos ORDER BY id")
        .fetch_all(db)
        .await?;
    rows.iter().map(todo_from_row).collect()
}

pub async fn todo_by_id<'e, E>(db: E, todo_id: i64) -> Result<Option<Todo>>
where
    E: SqliteExecutor<'e>,
{
    let row = sqlx::query("SELECT id, text, done, created_at FROM todos WHERE id = ?")
        .bind(todo_id)
        .fetch_optional(db)
        .await?;
    row.as_ref().map(todo_from_row).transpose()
}

pub async fn insert_todo<'e, E>(db: E, text: &str) -> Result<Todo>
where
    E: SqliteExecutor<'e>,
{
    let created_at = Utc::now();
    let result = sqlx::query("INSERT INTO todos (text, done, created_at) VALUES (?, 0, ?)")
        .bind(text)
        .bind(created_at)
        .execute(db)
        .await?;
    Ok(Todo {
        id: result.last_insert_rowid(),
        text: text.to_string(),
        done: false,
        created_at,
    })
}

pub async fn set_todo_done<'e, E>(db: E, todo_id: i64, done: bool) -> Result<bool>
where
    E: SqliteExecutor<'e>,
{
    let result = sqlx::query("UPDATE todos SET done = ? WHERE id = ?")
        .bind(done)
        .bind(todo_id)
        .execute(db)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn delete_todo<'e, E>(db: E, todo_id: i64) -> Result<bool>
where
    E: SqliteExecutor<'e>,
{
    let result = sqlx::query("DELETE FROM todos WHERE id = ?")
        .bind(todo_id)
        .execute(db)
        .await?;
    Ok(result.rows_affected() > 0)
}

fn todo_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Todo> {
    Ok(Todo {
        id: row.try_get("id")?,
        text: row.try_get("text")?,
        done: row.try_get("done")?,
        created_at: row.try_get("created_at")?,
    })
}

fn ensure_sqlite_parent_dir_exists(database_url: &str) -> Result<()> {
    let Some(path) = sqlite_path(database_url) else {
        return Ok(());
    };

    let Some(parent) = path.parent() else {
        return Ok(());
    };

    fs::create_dir_all(parent).with_context(|| {
        format!(
            "failed to create parent directory '{}' for database url '{database_url}'",
            parent.display()
        )
    })?;

    Ok(())
}

fn sqlite_path(database_url: &str) -> Option<PathBuf> {
    if database_url == "sqlite::memory:" || !database_url.starts_with("sqlite:") {
        return None;
    }

    let path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .split('?')
        .next()
        .unwrap_or_default();

    if path.is_empty() {
        return None;
    }

    Some(Path::new(path).to_path_buf())
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
