// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.
use crate::auth::{AdminUser, CurrentUser};
use crate::error::ServiceError;
use crate::service::{self, TaskChanges};
use axum::{
    extract::{rejection::FormRejection, Form, Json, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use common::{Category, CreateCategoryForm, CreateTaskForm, Identity, Task, UpdateTaskForm};
use sqlx::SqlitePool;
use tracing::{debug, error, info};

/// Handler for listing the caller's tasks.
pub async fn list_tasks(
    State(pool): State<SqlitePool>, // State injection (DB pool)
    CurrentUser(identity): CurrentUser,
) -> Result<Json<Vec<Task>>, AppError> {
    let mut conn = pool.acquire().await.map_err(ServiceError::from)?;
    let tasks = service::list_tasks(&mut conn, &identity).await?;
    info!("Successfully retrieved {} tasks.", tasks.len());
    Ok(Json(tasks))
}

/// Handler for creating a new task.
pub async fn create_task(
    State(pool): State<SqlitePool>,
    CurrentUser(identity): CurrentUser,
    form: Result<Form<CreateTaskForm>, FormRejection>, // Extracting the request body as form fields
) -> Result<(StatusCode, Json<Task>), AppError> {
    let Form(form) = form?;
    debug!(
        "Received request from user {} to create task '{}'",
        identity.user_id, form.name
    );
    form.validate().map_err(ServiceError::Validation)?;

    let mut tx = pool.begin().await.map_err(ServiceError::from)?;
    let new_task = service::create_task(&mut tx, &identity, &form).await?;
    tx.commit().await.map_err(ServiceError::from)?;

    // Return a 201 Created status with the new task as JSON.
    Ok((StatusCode::CREATED, Json(new_task)))
}

/// Handler for fetching one of the caller's tasks by ID.
pub async fn get_task(
    State(pool): State<SqlitePool>,
    CurrentUser(identity): CurrentUser,
    Path(task_id): Path<i64>, // Extract task ID from the URL path
) -> Result<Json<Task>, AppError> {
    let mut conn = pool.acquire().await.map_err(ServiceError::from)?;
    let task = service::get_task(&mut conn, &identity, task_id).await?;
    Ok(Json(task))
}

/// Handler for partially updating one of the caller's tasks.
pub async fn update_task(
    State(pool): State<SqlitePool>,
    CurrentUser(identity): CurrentUser,
    Path(task_id): Path<i64>,
    form: Result<Form<UpdateTaskForm>, FormRejection>,
) -> Result<Json<Task>, AppError> {
    let Form(form) = form?;
    debug!("Received request to update task with ID: {}", task_id);
    form.validate().map_err(ServiceError::Validation)?;

    let mut tx = pool.begin().await.map_err(ServiceError::from)?;
    let task = service::update_task(&mut tx, &identity, task_id, TaskChanges::from(form)).await?;
    tx.commit().await.map_err(ServiceError::from)?;

    Ok(Json(task))
}

/// Handler for deleting one of the caller's tasks by ID.
pub async fn delete_task(
    State(pool): State<SqlitePool>,
    CurrentUser(identity): CurrentUser,
    Path(task_id): Path<i64>,
) -> Result<StatusCode, AppError> {
    debug!("Attempting to delete task with ID: {}", task_id);

    let mut tx = pool.begin().await.map_err(ServiceError::from)?;
    service::delete_task(&mut tx, &identity, task_id).await?;
    tx.commit().await.map_err(ServiceError::from)?;

    Ok(StatusCode::NO_CONTENT) // 204 No Content for successful deletion
}

pub async fn list_categories(
    State(pool): State<SqlitePool>,
    CurrentUser(_identity): CurrentUser,
) -> Result<Json<Vec<Category>>, AppError> {
    let mut conn = pool.acquire().await.map_err(ServiceError::from)?;
    let categories = service::list_categories(&mut conn).await?;
    Ok(Json(categories))
}

/// Handler for creating a category. Administrators only.
pub async fn create_category(
    State(pool): State<SqlitePool>,
    AdminUser(admin): AdminUser,
    form: Result<Form<CreateCategoryForm>, FormRejection>,
) -> Result<(StatusCode, Json<Category>), AppError> {
    let Form(form) = form?;
    debug!(
        "Admin {} requested category '{}'",
        admin.user_id, form.name
    );
    form.validate().map_err(ServiceError::Validation)?;

    let mut tx = pool.begin().await.map_err(ServiceError::from)?;
    let category = service::create_category(&mut tx, &form).await?;
    tx.commit().await.map_err(ServiceError::from)?;

    Ok((StatusCode::CREATED, Json(category)))
}

/// Handler returning the resolved identity of the caller.
pub async fn current_user(CurrentUser(identity): CurrentUser) -> Json<Identity> {
    Json(identity)
}

// --- Custom Error Handling ---
// Service errors and storage failures become HTTP responses here.

/// Our custom error type for the application.
#[derive(Debug)]
pub struct AppError {
    code: StatusCode,
    message: String,
}

impl AppError {
    fn new(code: StatusCode, message: &str) -> Self {
        Self {
            code,
            message: message.to_string(),
        }
    }
}

/// Allows converting an `anyhow::Error` (coming from `database.rs`)
/// into our `AppError`.
impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        // Log the internal error for debugging.
        error!("Internal server error: {:?}", err);
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "An internal error occurred.",
        )
    }
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        let code = match err {
            ServiceError::Storage(inner) => return Self::from(inner),
            ServiceError::Unauthenticated => StatusCode::UNAUTHORIZED,
            ServiceError::Forbidden => StatusCode::FORBIDDEN,
            ServiceError::NotFound { .. } => StatusCode::NOT_FOUND,
            ServiceError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        };
        Self::new(code, &err.to_string())
    }
}

/// Form bodies that fail to decode (unknown `priority`, missing field,
/// unparsable date) keep axum's status but use our JSON error body.
impl From<FormRejection> for AppError {
    fn from(rejection: FormRejection) -> Self {
        Self::new(rejection.status(), &rejection.body_text())
    }
}

/// Allows Axum to convert our `AppError` into an HTTP `Response`.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.code.is_server_error() {
            error!(
                "Responding with error: status_code={}, message={}",
                self.code.as_u16(),
                self.message
            );
        } else {
            debug!(
                "Responding with error: status_code={}, message={}",
                self.code.as_u16(),
                self.message
            );
        }
        (
            self.code,
            Json(serde_json::json!({ "error": self.message })),
        )
            .into_response()
    }
}
