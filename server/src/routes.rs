// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.
use crate::handlers;
use axum::{routing::get, Router};
use sqlx::SqlitePool;
use tower_http::trace::TraceLayer;

/// Creates and configures the application router.
pub fn create_router(pool: SqlitePool) -> Router {
    Router::new()
        // `GET /tasks/` lists the caller's tasks, `POST /tasks/` creates one
        .route(
            "/tasks/",
            get(handlers::list_tasks).post(handlers::create_task),
        )
        .route(
            "/tasks",
            get(handlers::list_tasks).post(handlers::create_task),
        )
        // Owner-scoped single task access
        .route(
            "/tasks/{id}",
            get(handlers::get_task)
                .put(handlers::update_task)
                .delete(handlers::delete_task),
        )
        // Listing is open to any user, creation is admin-only
        .route(
            "/categories/",
            get(handlers::list_categories).post(handlers::create_category),
        )
        .route(
            "/categories",
            get(handlers::list_categories).post(handlers::create_category),
        )
        .route("/users/me", get(handlers::current_user))
        .layer(TraceLayer::new_for_http())
        // Adds the database pool to the application state
        .with_state(pool)
}
