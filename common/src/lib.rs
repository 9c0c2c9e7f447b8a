// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const TASK_NAME_MIN_CHARS: usize = 3;
pub const TASK_NAME_MAX_CHARS: usize = 64;
pub const DESCRIPTION_MAX_CHARS: usize = 255;
pub const CATEGORY_NAME_MAX_CHARS: usize = 64;

#[allow(clippy::doc_overindented_list_items)]
/// An authenticated caller.
///
/// Derivation attributes (derive):
/// - `Serialize`, `Deserialize`: Allows conversion to/from JSON.
/// - `sqlx::FromRow`: Built straight from a `users` row. The token digest
///    column is never selected into this structure.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct Identity {
    pub user_id: i64,
    pub username: String,
    pub is_admin: bool,
    pub created_at: DateTime<Utc>,
}

/// A reference entity every task points to.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct Category {
    pub category_id: i64,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Urgency level of a task, `Priority01` being the most urgent.
///
/// Stored in SQLite as its text name (e.g. `PRIORITY03`), which is also
/// the value accepted in forms and emitted in JSON.
#[derive(
    Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, sqlx::Type,
)]
pub enum Priority {
    #[serde(rename = "PRIORITY01")]
    #[sqlx(rename = "PRIORITY01")]
    Priority01,
    #[serde(rename = "PRIORITY02")]
    #[sqlx(rename = "PRIORITY02")]
    Priority02,
    #[serde(rename = "PRIORITY03")]
    #[sqlx(rename = "PRIORITY03")]
    Priority03,
    #[serde(rename = "PRIORITY04")]
    #[sqlx(rename = "PRIORITY04")]
    Priority04,
    #[default]
    #[serde(rename = "PRIORITY05")]
    #[sqlx(rename = "PRIORITY05")]
    Priority05,
}

/// Represents a task within the system.
///
/// `task_id`, `user_id` and the two timestamps are assigned by the server;
/// `user_id` never changes after creation.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct Task {
    pub task_id: i64,
    pub name: String,
    pub description: Option<String>,
    pub due_date: DateTime<Utc>,
    pub priority: Priority,
    pub category_id: i64,
    pub user_id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Form fields accepted by `POST /tasks/`.
/// It's a good practice to separate database models (`Task`)
/// from API models, as the server assigns several fields itself.
#[derive(Deserialize, Debug, Clone)]
pub struct CreateTaskForm {
    pub name: String,
    pub category_id: i64,
    pub due_date: DateTime<Utc>,
    pub description: Option<String>,
    #[serde(default)]
    pub priority: Priority,
}

impl CreateTaskForm {
    /// Checks the length bounds of the free-text fields.
    pub fn validate(&self) -> Result<(), String> {
        validate_task_name(&self.name)?;
        if let Some(description) = &self.description {
            validate_description(description)?;
        }
        Ok(())
    }
}

/// Form fields accepted by `PUT /tasks/{id}`. Every field is optional and
/// an omitted field leaves the stored value untouched.
///
/// `description` is presence-aware: omitted means "keep", an empty value
/// means "clear". See [`UpdateTaskForm::description_change`].
#[derive(Deserialize, Debug, Clone, Default)]
pub struct UpdateTaskForm {
    pub name: Option<String>,
    pub description: Option<String>,
    pub due_date: Option<DateTime<Utc>>,
    pub priority: Option<Priority>,
    pub category_id: Option<i64>,
}

impl UpdateTaskForm {
    pub fn validate(&self) -> Result<(), String> {
        if let Some(name) = &self.name {
            validate_task_name(name)?;
        }
        if let Some(description) = &self.description {
            validate_description(description)?;
        }
        Ok(())
    }

    /// `None` when the field was not sent, `Some(None)` when it was sent
    /// empty, `Some(Some(text))` otherwise.
    pub fn description_change(&self) -> Option<Option<String>> {
        self.description
            .as_ref()
            .map(|text| Some(text.clone()).filter(|text| !text.is_empty()))
    }
}

/// Form fields accepted by the admin-only `POST /categories/`.
#[derive(Deserialize, Debug, Clone)]
pub struct CreateCategoryForm {
    pub name: String,
    pub description: Option<String>,
}

impl CreateCategoryForm {
    pub fn validate(&self) -> Result<(), String> {
        let length = self.name.chars().count();
        if length == 0 || length > CATEGORY_NAME_MAX_CHARS {
            return Err(format!(
                "Category name must be between 1 and {CATEGORY_NAME_MAX_CHARS} characters."
            ));
        }
        if let Some(description) = &self.description {
            validate_description(description)?;
        }
        Ok(())
    }
}

fn validate_task_name(name: &str) -> Result<(), String> {
    let length = name.chars().count();
    if !(TASK_NAME_MIN_CHARS..=TASK_NAME_MAX_CHARS).contains(&length) {
        return Err(format!(
            "Task name must be between {TASK_NAME_MIN_CHARS} and {TASK_NAME_MAX_CHARS} characters."
        ));
    }
    Ok(())
}

fn validate_description(description: &str) -> Result<(), String> {
    if description.chars().count() > DESCRIPTION_MAX_CHARS {
        return Err(format!(
            "Description must be at most {DESCRIPTION_MAX_CHARS} characters."
        ));
    }
    Ok(())
}
