// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.

//! Category lookup and the owner-scoped task service.
//!
//! Every operation receives the caller's identity and the connection (usually
//! an open transaction) explicitly. Task lookups always combine id and owner
//! in one predicate, so a task owned by someone else is reported exactly like
//! a missing one.

use crate::database::{self, TaskFields};
use crate::error::{ServiceError, ServiceResult};
use chrono::{DateTime, Utc};
use common::{Category, CreateCategoryForm, CreateTaskForm, Identity, Priority, Task, UpdateTaskForm};
use sqlx::SqliteConnection;
use tracing::{debug, info};

// --- Category lookup ---

/// Existence gate run before a category reference is written onto a task.
pub async fn find_category(conn: &mut SqliteConnection, category_id: i64) -> ServiceResult<Category> {
    database::find_category(conn, category_id)
        .await?
        .ok_or_else(|| {
            debug!("Category {} does not exist.", category_id);
            ServiceError::category_not_found()
        })
}

pub async fn list_categories(conn: &mut SqliteConnection) -> ServiceResult<Vec<Category>> {
    Ok(database::list_categories(conn).await?)
}

/// Creates a category. Names are unique; the UNIQUE constraint on
/// `categories.name` decides, so concurrent duplicates are rejected too.
pub async fn create_category(
    conn: &mut SqliteConnection,
    form: &CreateCategoryForm,
) -> ServiceResult<Category> {
    let description = form.description.as_deref().filter(|text| !text.is_empty());
    let category = database::insert_category(conn, &form.name, description)
        .await
        .map_err(|err| {
            if is_unique_violation(&err) {
                ServiceError::Validation(format!("Category '{}' already exists.", form.name))
            } else {
                ServiceError::Storage(err)
            }
        })?;
    info!("Category created with ID: {}", category.category_id);
    Ok(category)
}

fn is_unique_violation(err: &anyhow::Error) -> bool {
    err.downcast_ref::<sqlx::Error>()
        .and_then(sqlx::Error::as_database_error)
        .is_some_and(|db_err| db_err.is_unique_violation())
}

// --- Tasks ---

/// A partial update. `None` leaves a field as it is.
///
/// `description` distinguishes "not sent" (`None`) from "cleared"
/// (`Some(None)`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskChanges {
    pub name: Option<String>,
    pub description: Option<Option<String>>,
    pub due_date: Option<DateTime<Utc>>,
    pub priority: Option<Priority>,
    pub category_id: Option<i64>,
}

impl TaskChanges {
    #[cfg(test)]
    fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    fn apply_to(self, fields: &mut TaskFields) {
        if let Some(name) = self.name {
            fields.name = name;
        }
        if let Some(description) = self.description {
            fields.description = description;
        }
        if let Some(due_date) = self.due_date {
            fields.due_date = due_date;
        }
        if let Some(priority) = self.priority {
            fields.priority = priority;
        }
        if let Some(category_id) = self.category_id {
            fields.category_id = category_id;
        }
    }
}

impl From<UpdateTaskForm> for TaskChanges {
    fn from(form: UpdateTaskForm) -> Self {
        let description = form.description_change();
        Self {
            name: form.name,
            description,
            due_date: form.due_date,
            priority: form.priority,
            category_id: form.category_id,
        }
    }
}

/// Creates a task owned by `identity`.
pub async fn create_task(
    conn: &mut SqliteConnection,
    identity: &Identity,
    form: &CreateTaskForm,
) -> ServiceResult<Task> {
    find_category(conn, form.category_id).await?;

    let fields = TaskFields {
        name: form.name.clone(),
        description: form.description.clone().filter(|text| !text.is_empty()),
        due_date: form.due_date,
        priority: form.priority,
        category_id: form.category_id,
    };
    let task = database::insert_task(conn, identity.user_id, &fields).await?;

    info!(
        "Task created successfully with ID: {} for user {}",
        task.task_id, identity.user_id
    );
    Ok(task)
}

/// All tasks owned by `identity`, newest first.
pub async fn list_tasks(conn: &mut SqliteConnection, identity: &Identity) -> ServiceResult<Vec<Task>> {
    let tasks = database::list_tasks_for_owner(conn, identity.user_id).await?;
    debug!("User {} owns {} tasks.", identity.user_id, tasks.len());
    Ok(tasks)
}

pub async fn get_task(
    conn: &mut SqliteConnection,
    identity: &Identity,
    task_id: i64,
) -> ServiceResult<Task> {
    database::find_task_for_owner(conn, task_id, identity.user_id)
        .await?
        .ok_or_else(ServiceError::task_not_found)
}

/// Applies the supplied fields to an owned task and returns the stored result.
///
/// A supplied `category_id` is checked for existence on every call. Owner and
/// identifier cannot change here; `updated_at` is refreshed even when no field
/// was supplied.
pub async fn update_task(
    conn: &mut SqliteConnection,
    identity: &Identity,
    task_id: i64,
    changes: TaskChanges,
) -> ServiceResult<Task> {
    let current = get_task(conn, identity, task_id).await?;

    if let Some(category_id) = changes.category_id {
        find_category(conn, category_id).await?;
    }

    let mut fields = TaskFields::from(&current);
    changes.apply_to(&mut fields);

    let task = database::update_task_for_owner(conn, task_id, identity.user_id, &fields)
        .await?
        .ok_or_else(ServiceError::task_not_found)?;

    info!("Task with ID {} updated successfully.", task.task_id);
    Ok(task)
}

/// Permanently removes an owned task.
pub async fn delete_task(
    conn: &mut SqliteConnection,
    identity: &Identity,
    task_id: i64,
) -> ServiceResult<()> {
    if database::delete_task_for_owner(conn, task_id, identity.user_id).await? {
        info!("Task with ID {} deleted successfully.", task_id);
        Ok(())
    } else {
        Err(ServiceError::task_not_found())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::provision_user;
    use chrono::TimeZone;
    use sqlx::SqlitePool;
    use sqlx::pool::PoolConnection;
    use sqlx::Sqlite;

    struct Fixture {
        _pool: SqlitePool,
        conn: PoolConnection<Sqlite>,
        alice: Identity,
        bob: Identity,
        home: Category,
        work: Category,
    }

    async fn setup() -> Fixture {
        let pool = database::connect_in_memory().await.unwrap();
        let mut conn = pool.acquire().await.unwrap();
        let (alice, _) = provision_user(&mut conn, "alice", false).await.unwrap();
        let (bob, _) = provision_user(&mut conn, "bob", false).await.unwrap();
        let home = database::insert_category(&mut conn, "Home", None).await.unwrap();
        let work = database::insert_category(&mut conn, "Work", Some("Office"))
            .await
            .unwrap();
        Fixture {
            _pool: pool,
            conn,
            alice,
            bob,
            home,
            work,
        }
    }

    fn task_form(name: &str, category_id: i64) -> CreateTaskForm {
        CreateTaskForm {
            name: name.to_string(),
            category_id,
            due_date: Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
            description: None,
            priority: Priority::default(),
        }
    }

    fn is_not_found(result: &ServiceResult<impl std::fmt::Debug>, expected: &str) -> bool {
        matches!(result, Err(ServiceError::NotFound { entity }) if *entity == expected)
    }

    #[tokio::test]
    async fn test_create_binds_owner_and_defaults() {
        let mut fx = setup().await;
        let form = task_form("Buy milk", fx.home.category_id);

        let task = create_task(&mut fx.conn, &fx.alice, &form).await.unwrap();

        assert!(task.task_id > 0);
        assert_eq!(task.user_id, fx.alice.user_id);
        assert_eq!(task.priority, Priority::Priority05);
        assert_eq!(task.description, None);
        assert_eq!(task.due_date, form.due_date);
        assert_eq!(task.created_at, task.updated_at);
    }

    #[tokio::test]
    async fn test_create_then_get_round_trips() {
        let mut fx = setup().await;
        let mut form = task_form("Write report", fx.work.category_id);
        form.description = Some("Quarterly numbers".to_string());
        form.priority = Priority::Priority01;

        let created = create_task(&mut fx.conn, &fx.alice, &form).await.unwrap();
        let fetched = get_task(&mut fx.conn, &fx.alice, created.task_id).await.unwrap();

        assert_eq!(fetched, created);
    }

    #[tokio::test]
    async fn test_create_requires_existing_category() {
        let mut fx = setup().await;
        let result = create_task(&mut fx.conn, &fx.alice, &task_form("Lost task", 999)).await;
        assert!(is_not_found(&result, "Category"));

        let tasks = list_tasks(&mut fx.conn, &fx.alice).await.unwrap();
        assert!(tasks.is_empty());
    }

    #[tokio::test]
    async fn test_list_is_newest_first_and_owner_scoped() {
        let mut fx = setup().await;
        let t1 = create_task(&mut fx.conn, &fx.alice, &task_form("First", fx.home.category_id))
            .await
            .unwrap();
        let t2 = create_task(&mut fx.conn, &fx.alice, &task_form("Second", fx.home.category_id))
            .await
            .unwrap();
        let t3 = create_task(&mut fx.conn, &fx.alice, &task_form("Third", fx.home.category_id))
            .await
            .unwrap();
        create_task(&mut fx.conn, &fx.bob, &task_form("Bob's", fx.home.category_id))
            .await
            .unwrap();

        let ids: Vec<i64> = list_tasks(&mut fx.conn, &fx.alice)
            .await
            .unwrap()
            .into_iter()
            .map(|task| task.task_id)
            .collect();
        assert_eq!(ids, vec![t3.task_id, t2.task_id, t1.task_id]);
    }

    #[tokio::test]
    async fn test_other_owners_see_not_found() {
        let mut fx = setup().await;
        let task = create_task(&mut fx.conn, &fx.alice, &task_form("Private", fx.home.category_id))
            .await
            .unwrap();

        let get = get_task(&mut fx.conn, &fx.bob, task.task_id).await;
        assert!(is_not_found(&get, "Task"));

        let changes = TaskChanges {
            name: Some("Hijacked".to_string()),
            ..Default::default()
        };
        let update = update_task(&mut fx.conn, &fx.bob, task.task_id, changes).await;
        assert!(is_not_found(&update, "Task"));

        let delete = delete_task(&mut fx.conn, &fx.bob, task.task_id).await;
        assert!(is_not_found(&delete, "Task"));

        // The owner's copy is untouched.
        let owned = get_task(&mut fx.conn, &fx.alice, task.task_id).await.unwrap();
        assert_eq!(owned, task);
    }

    #[tokio::test]
    async fn test_foreign_task_and_missing_task_are_indistinguishable() {
        let mut fx = setup().await;
        let task = create_task(&mut fx.conn, &fx.alice, &task_form("Private", fx.home.category_id))
            .await
            .unwrap();

        let foreign = get_task(&mut fx.conn, &fx.bob, task.task_id).await.unwrap_err();
        let missing = get_task(&mut fx.conn, &fx.bob, task.task_id + 100).await.unwrap_err();
        assert_eq!(foreign.to_string(), missing.to_string());
    }

    #[tokio::test]
    async fn test_empty_update_only_refreshes_updated_at() {
        let mut fx = setup().await;
        let before = create_task(&mut fx.conn, &fx.alice, &task_form("Unchanged", fx.home.category_id))
            .await
            .unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;

        let after = update_task(&mut fx.conn, &fx.alice, before.task_id, TaskChanges::default())
            .await
            .unwrap();

        assert!(after.updated_at > before.updated_at);
        assert_eq!(
            Task {
                updated_at: before.updated_at,
                ..after
            },
            before
        );
    }

    #[tokio::test]
    async fn test_update_applies_only_supplied_fields() {
        let mut fx = setup().await;
        let mut form = task_form("Original", fx.home.category_id);
        form.description = Some("Keep me".to_string());
        let before = create_task(&mut fx.conn, &fx.alice, &form).await.unwrap();

        let changes = TaskChanges {
            name: Some("Renamed".to_string()),
            priority: Some(Priority::Priority02),
            category_id: Some(fx.work.category_id),
            ..Default::default()
        };
        let after = update_task(&mut fx.conn, &fx.alice, before.task_id, changes)
            .await
            .unwrap();

        assert_eq!(after.name, "Renamed");
        assert_eq!(after.priority, Priority::Priority02);
        assert_eq!(after.category_id, fx.work.category_id);
        assert_eq!(after.description, Some("Keep me".to_string()));
        assert_eq!(after.due_date, before.due_date);
        assert_eq!(after.task_id, before.task_id);
        assert_eq!(after.user_id, fx.alice.user_id);
        assert_eq!(after.created_at, before.created_at);
    }

    #[tokio::test]
    async fn test_update_can_clear_description() {
        let mut fx = setup().await;
        let mut form = task_form("Described", fx.home.category_id);
        form.description = Some("Soon gone".to_string());
        let task = create_task(&mut fx.conn, &fx.alice, &form).await.unwrap();

        let cleared = TaskChanges::from(UpdateTaskForm {
            description: Some(String::new()),
            ..Default::default()
        });
        let after = update_task(&mut fx.conn, &fx.alice, task.task_id, cleared)
            .await
            .unwrap();
        assert_eq!(after.description, None);
    }

    #[tokio::test]
    async fn test_update_rechecks_category() {
        let mut fx = setup().await;
        let task = create_task(&mut fx.conn, &fx.alice, &task_form("Categorised", fx.home.category_id))
            .await
            .unwrap();

        let changes = TaskChanges {
            name: Some("Should not stick".to_string()),
            category_id: Some(404),
            ..Default::default()
        };
        let result = update_task(&mut fx.conn, &fx.alice, task.task_id, changes).await;
        assert!(is_not_found(&result, "Category"));

        let unchanged = get_task(&mut fx.conn, &fx.alice, task.task_id).await.unwrap();
        assert_eq!(unchanged, task);
    }

    #[tokio::test]
    async fn test_deletion_is_final() {
        let mut fx = setup().await;
        let task = create_task(&mut fx.conn, &fx.alice, &task_form("Short-lived", fx.home.category_id))
            .await
            .unwrap();

        delete_task(&mut fx.conn, &fx.alice, task.task_id).await.unwrap();

        assert!(is_not_found(&get_task(&mut fx.conn, &fx.alice, task.task_id).await, "Task"));
        assert!(is_not_found(
            &update_task(&mut fx.conn, &fx.alice, task.task_id, TaskChanges::default()).await,
            "Task"
        ));
        assert!(is_not_found(&delete_task(&mut fx.conn, &fx.alice, task.task_id).await, "Task"));
    }

    #[tokio::test]
    async fn test_category_lookup_and_creation() {
        let mut fx = setup().await;
        assert_eq!(find_category(&mut fx.conn, fx.home.category_id).await.unwrap(), fx.home);
        assert!(is_not_found(&find_category(&mut fx.conn, 77).await, "Category"));

        let form = CreateCategoryForm {
            name: "Errands".to_string(),
            description: Some(String::new()),
        };
        let created = create_category(&mut fx.conn, &form).await.unwrap();
        assert_eq!(created.description, None);

        let duplicate = create_category(&mut fx.conn, &form).await;
        assert!(
            matches!(&duplicate, Err(ServiceError::Validation(message)) if message.contains("already exists"))
        );

        let names: Vec<String> = list_categories(&mut fx.conn)
            .await
            .unwrap()
            .into_iter()
            .map(|category| category.name)
            .collect();
        assert_eq!(names, vec!["Home", "Work", "Errands"]);
    }

    #[tokio::test]
    async fn test_unique_violation_is_recognised() {
        let mut fx = setup().await;
        let err = database::insert_category(&mut fx.conn, "Home", None)
            .await
            .unwrap_err();
        assert!(is_unique_violation(&err));

        let other = database::insert_task(
            &mut fx.conn,
            fx.alice.user_id,
            &TaskFields::from(&Task {
                task_id: 0,
                name: "Dangling".to_string(),
                description: None,
                due_date: Utc::now(),
                priority: Priority::default(),
                category_id: 999,
                user_id: fx.alice.user_id,
                created_at: Utc::now(),
                updated_at: Utc::now(),
            }),
        )
        .await
        .unwrap_err();
        assert!(!is_unique_violation(&other));
    }

    #[test]
    fn test_task_changes_from_form() {
        assert!(TaskChanges::from(UpdateTaskForm::default()).is_empty());

        let changes = TaskChanges::from(UpdateTaskForm {
            priority: Some(Priority::Priority03),
            ..Default::default()
        });
        assert!(!changes.is_empty());
        assert_eq!(changes.priority, Some(Priority::Priority03));
        assert_eq!(changes.description, None);
    }
}
