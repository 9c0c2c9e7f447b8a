// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use common::{Category, Identity, Priority, Task};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{migrate::MigrateDatabase, Sqlite, SqliteConnection, SqlitePool};
use std::fs;
use std::str::FromStr;
use tracing::{debug, info};

const IDENTITY_COLUMNS: &str = "user_id, username, is_admin, created_at";

/// Establishes the database connection pool.
/// If the database does not exist, it creates it.
/// It also ensures every table has the correct schema.
pub async fn establish_connection_pool(database_url: &str) -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(database_url).context("Invalid database URL")?;
    if let Some(parent) = options
        .get_filename()
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
    {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }

    if !Sqlite::database_exists(database_url).await.unwrap_or(false) {
        info!("Creating database {}", database_url);
        Sqlite::create_database(database_url)
            .await
            .context("Failed to create database")?;
    } else {
        info!("Database already exists.");
    }

    let pool = SqlitePool::connect(database_url)
        .await
        .context("Failed to connect to database")?;

    init_schema(&pool).await?;

    Ok(pool)
}

/// Opens a private in-memory database with the full schema.
///
/// The pool is capped at a single connection so that every caller sees the
/// same database; callers must release a connection before acquiring another.
pub async fn connect_in_memory() -> Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .context("Failed to open in-memory database")?;

    init_schema(&pool).await?;

    Ok(pool)
}

/// Creates the `users`, `categories` and `tasks` tables if they are missing.
pub async fn init_schema(pool: &SqlitePool) -> Result<()> {
    // sqlx turns `foreign_keys` on for every SQLite connection it opens.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            user_id INTEGER PRIMARY KEY AUTOINCREMENT,
            username TEXT NOT NULL UNIQUE,
            is_admin BOOLEAN NOT NULL DEFAULT 0,
            token_hash TEXT NOT NULL UNIQUE,
            created_at TIMESTAMP NOT NULL
        );
        "#,
    )
    .execute(pool)
    .await
    .context("Failed to create 'users' table")?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS categories (
            category_id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE,
            description TEXT NULL,
            created_at TIMESTAMP NOT NULL
        );
        "#,
    )
    .execute(pool)
    .await
    .context("Failed to create 'categories' table")?;

    // AUTOINCREMENT keeps SQLite from handing out the id of a deleted row again.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS tasks (
            task_id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            description TEXT NULL,
            due_date TIMESTAMP NOT NULL,
            priority TEXT NOT NULL,
            category_id INTEGER NOT NULL REFERENCES categories (category_id),
            user_id INTEGER NOT NULL REFERENCES users (user_id),
            created_at TIMESTAMP NOT NULL,
            updated_at TIMESTAMP NOT NULL
        );
        "#,
    )
    .execute(pool)
    .await
    .context("Failed to create 'tasks' table")?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_tasks_owner ON tasks (user_id, created_at);")
        .execute(pool)
        .await
        .context("Failed to create task owner index")?;

    info!("'users', 'categories' and 'tasks' tables are ready.");

    Ok(())
}

// --- Users ---

/// Inserts a new user. Only the digest of its API token is stored.
pub async fn insert_user(
    conn: &mut SqliteConnection,
    username: &str,
    is_admin: bool,
    token_hash: &str,
) -> Result<Identity> {
    debug!("Insert user: username={}, is_admin={}", username, is_admin);

    let identity = sqlx::query_as::<_, Identity>(&format!(
        "INSERT INTO users (username, is_admin, token_hash, created_at) VALUES (?, ?, ?, ?) RETURNING {IDENTITY_COLUMNS}"
    ))
    .bind(username)
    .bind(is_admin)
    .bind(token_hash)
    .bind(Utc::now())
    .fetch_one(&mut *conn)
    .await
    .with_context(|| format!("Failed to insert user '{username}' into DB"))?;

    Ok(identity)
}

pub async fn find_user_by_token_hash(
    conn: &mut SqliteConnection,
    token_hash: &str,
) -> Result<Option<Identity>> {
    let identity = sqlx::query_as::<_, Identity>(&format!(
        "SELECT {IDENTITY_COLUMNS} FROM users WHERE token_hash = ?"
    ))
    .bind(token_hash)
    .fetch_optional(&mut *conn)
    .await
    .context("Failed to look up user by token")?;

    Ok(identity)
}

// --- Categories ---

pub async fn find_category(
    conn: &mut SqliteConnection,
    category_id: i64,
) -> Result<Option<Category>> {
    let category = sqlx::query_as::<_, Category>("SELECT * FROM categories WHERE category_id = ?")
        .bind(category_id)
        .fetch_optional(&mut *conn)
        .await
        .with_context(|| format!("Failed to look up category with ID: {category_id}"))?;

    Ok(category)
}

pub async fn list_categories(conn: &mut SqliteConnection) -> Result<Vec<Category>> {
    let categories = sqlx::query_as::<_, Category>("SELECT * FROM categories ORDER BY category_id ASC")
        .fetch_all(&mut *conn)
        .await
        .context("Failed to retrieve categories from DB")?;

    Ok(categories)
}

pub async fn insert_category(
    conn: &mut SqliteConnection,
    name: &str,
    description: Option<&str>,
) -> Result<Category> {
    debug!("Insert category: name={}, description={:?}", name, description);

    let category = sqlx::query_as::<_, Category>(
        "INSERT INTO categories (name, description, created_at) VALUES (?, ?, ?) RETURNING *",
    )
    .bind(name)
    .bind(description)
    .bind(Utc::now())
    .fetch_one(&mut *conn)
    .await
    .with_context(|| format!("Failed to insert category '{name}' into DB"))?;

    Ok(category)
}

// --- Tasks ---

/// Field values written by [`insert_task`] and [`update_task_for_owner`].
/// Identifier, owner and timestamps are never part of it.
#[derive(Debug, Clone)]
pub struct TaskFields {
    pub name: String,
    pub description: Option<String>,
    pub due_date: DateTime<Utc>,
    pub priority: Priority,
    pub category_id: i64,
}

impl From<&Task> for TaskFields {
    fn from(task: &Task) -> Self {
        Self {
            name: task.name.clone(),
            description: task.description.clone(),
            due_date: task.due_date,
            priority: task.priority,
            category_id: task.category_id,
        }
    }
}

/// Inserts a new task owned by `user_id` and returns the stored row.
pub async fn insert_task(
    conn: &mut SqliteConnection,
    user_id: i64,
    fields: &TaskFields,
) -> Result<Task> {
    let now = Utc::now();

    debug!(
        "Insert values: name={}, due_date={}, priority={:?}, category_id={}, user_id={}, created_at={}",
        fields.name, fields.due_date, fields.priority, fields.category_id, user_id, now
    );

    let task = sqlx::query_as::<_, Task>(
        "INSERT INTO tasks (name, description, due_date, priority, category_id, user_id, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?) RETURNING *",
    )
    .bind(&fields.name)
    .bind(&fields.description)
    .bind(fields.due_date)
    .bind(fields.priority)
    .bind(fields.category_id)
    .bind(user_id)
    .bind(now)
    .bind(now)
    .fetch_one(&mut *conn)
    .await
    .context("Failed to insert task into DB")?;

    Ok(task)
}

/// Every task owned by `user_id`, most recently created first.
pub async fn list_tasks_for_owner(conn: &mut SqliteConnection, user_id: i64) -> Result<Vec<Task>> {
    let tasks = sqlx::query_as::<_, Task>(
        "SELECT * FROM tasks WHERE user_id = ? ORDER BY created_at DESC, task_id DESC",
    )
    .bind(user_id)
    .fetch_all(&mut *conn)
    .await
    .with_context(|| format!("Failed to retrieve tasks of user {user_id} from DB"))?;

    Ok(tasks)
}

/// Fetches a task by id and owner in a single predicate.
/// A task owned by someone else comes back as `None`, like a missing one.
pub async fn find_task_for_owner(
    conn: &mut SqliteConnection,
    task_id: i64,
    user_id: i64,
) -> Result<Option<Task>> {
    let task = sqlx::query_as::<_, Task>("SELECT * FROM tasks WHERE task_id = ? AND user_id = ?")
        .bind(task_id)
        .bind(user_id)
        .fetch_optional(&mut *conn)
        .await
        .with_context(|| format!("Failed to look up task with ID: {task_id}"))?;

    Ok(task)
}

/// Overwrites the mutable fields of an owned task and refreshes `updated_at`.
/// Returns `None` if no task with that id belongs to `user_id`.
pub async fn update_task_for_owner(
    conn: &mut SqliteConnection,
    task_id: i64,
    user_id: i64,
    fields: &TaskFields,
) -> Result<Option<Task>> {
    debug!("Attempting to update task with ID: {}", task_id);

    let task = sqlx::query_as::<_, Task>(
        "UPDATE tasks SET name = ?, description = ?, due_date = ?, priority = ?, category_id = ?, updated_at = ? \
         WHERE task_id = ? AND user_id = ? RETURNING *",
    )
    .bind(&fields.name)
    .bind(&fields.description)
    .bind(fields.due_date)
    .bind(fields.priority)
    .bind(fields.category_id)
    .bind(Utc::now())
    .bind(task_id)
    .bind(user_id)
    .fetch_optional(&mut *conn)
    .await
    .with_context(|| format!("Failed to update task with ID: {task_id}"))?;

    Ok(task)
}

/// Permanently deletes an owned task.
/// Returns true if a row was removed, false if no such task belongs to `user_id`.
pub async fn delete_task_for_owner(
    conn: &mut SqliteConnection,
    task_id: i64,
    user_id: i64,
) -> Result<bool> {
    debug!("Attempting to delete task with ID: {}", task_id);

    let result = sqlx::query("DELETE FROM tasks WHERE task_id = ? AND user_id = ?")
        .bind(task_id)
        .bind(user_id)
        .execute(&mut *conn)
        .await
        .with_context(|| format!("Failed to delete task with ID: {task_id}"))?;

    let rows_affected = result.rows_affected();
    info!("Deleted {} rows for task ID: {}", rows_affected, task_id);

    Ok(rows_affected > 0)
}
