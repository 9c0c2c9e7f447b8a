// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.
use thiserror::Error;

/// Failures surfaced by identity resolution, the authorization guard and
/// the task service. They are never masked on the way to the transport.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Not authenticated")]
    Unauthenticated,

    #[error("Not authorized")]
    Forbidden,

    /// The resource is absent, or it is owned by another identity.
    #[error("{entity} not found")]
    NotFound { entity: &'static str },

    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

impl ServiceError {
    pub fn task_not_found() -> Self {
        Self::NotFound { entity: "Task" }
    }

    pub fn category_not_found() -> Self {
        Self::NotFound { entity: "Category" }
    }
}

impl From<sqlx::Error> for ServiceError {
    fn from(err: sqlx::Error) -> Self {
        Self::Storage(err.into())
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;
