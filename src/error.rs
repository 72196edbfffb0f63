use std::fmt;

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

/// Kinds of record held by a store, used to name the subject of a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    Competition,
    Team,
    Match,
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Entity::Competition => f.write_str("competition"),
            Entity::Team => f.write_str("team"),
            Entity::Match => f.write_str("match"),
        }
    }
}

/// How a missing record was looked up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup {
    Id(Uuid),
    ExternalId(i64),
}

impl fmt::Display for Lookup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Lookup::Id(id) => write!(f, "id {id}"),
            Lookup::ExternalId(id) => write!(f, "external id {id}"),
        }
    }
}

/// A write rejected because it would break a data-model invariant.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConstraintViolation {
    #[error("{entity} with external id {external_id} already exists")]
    DuplicateExternalId { entity: Entity, external_id: i64 },

    #[error("a match between these teams on this date already exists for the season")]
    DuplicateFixture,

    #[error("invalid value {value:?} for {field}")]
    InvalidValue { field: &'static str, value: String },

    #[error("{field} must not be negative, got {value}")]
    NegativeScore { field: &'static str, value: i32 },

    #[error("home team and away team must differ")]
    SameTeam,

    #[error("{field} must not be blank")]
    Blank { field: &'static str },

    #[error("{field} exceeds {max} characters")]
    TooLong { field: &'static str, max: usize },

    #[error("team {team_id} is still referenced by matches")]
    TeamInUse { team_id: Uuid },
}

impl ConstraintViolation {
    /// The offending field, where the violation is tied to one.
    pub fn field(&self) -> Option<&'static str> {
        match self {
            ConstraintViolation::DuplicateExternalId { .. } => Some("external_id"),
            ConstraintViolation::DuplicateFixture | ConstraintViolation::TeamInUse { .. } => None,
            ConstraintViolation::InvalidValue { field, .. }
            | ConstraintViolation::NegativeScore { field, .. }
            | ConstraintViolation::Blank { field }
            | ConstraintViolation::TooLong { field, .. } => Some(field),
            ConstraintViolation::SameTeam => Some("away_team_id"),
        }
    }

    fn is_conflict(&self) -> bool {
        matches!(
            self,
            ConstraintViolation::DuplicateExternalId { .. }
                | ConstraintViolation::DuplicateFixture
                | ConstraintViolation::TeamInUse { .. }
        )
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("constraint violation: {0}")]
    Constraint(#[from] ConstraintViolation),

    #[error("{entity} with {lookup} not found")]
    NotFound { entity: Entity, lookup: Lookup },

    #[error("{field} references unknown {entity} {id}")]
    Referential {
        field: &'static str,
        entity: Entity,
        id: Uuid,
    },

    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),
}

impl StoreError {
    pub fn not_found(entity: Entity, id: Uuid) -> Self {
        StoreError::NotFound {
            entity,
            lookup: Lookup::Id(id),
        }
    }

    /// Infrastructure failures are worth retrying; the others never succeed unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::Storage(_))
    }
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Error type returned by the HTTP handlers.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The request could not be read: malformed body, path segment or query string.
    #[error("invalid request: {message}")]
    InvalidRequest { status: StatusCode, message: String },

    #[error("service unavailable")]
    Unavailable(#[source] StoreError),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl From<ConstraintViolation> for AppError {
    fn from(violation: ConstraintViolation) -> Self {
        AppError::Store(StoreError::Constraint(violation))
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::InvalidRequest {
            status: rejection.status(),
            message: rejection.body_text(),
        }
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        AppError::InvalidRequest {
            status: rejection.status(),
            message: rejection.body_text(),
        }
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::InvalidRequest {
            status: rejection.status(),
            message: rejection.body_text(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            AppError::Store(StoreError::Constraint(violation)) => {
                let status = if violation.is_conflict() {
                    StatusCode::CONFLICT
                } else {
                    StatusCode::UNPROCESSABLE_ENTITY
                };
                (
                    status,
                    json!({
                        "kind": "constraint_violation",
                        "message": violation.to_string(),
                        "field": violation.field(),
                    }),
                )
            }
            AppError::Store(StoreError::NotFound { entity, lookup }) => (
                StatusCode::NOT_FOUND,
                json!({
                    "kind": "not_found",
                    "message": self.to_string(),
                    "entity": entity.to_string(),
                    "lookup": lookup.to_string(),
                }),
            ),
            AppError::Store(StoreError::Referential { field, id, .. }) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                json!({
                    "kind": "referential",
                    "message": self.to_string(),
                    "field": field,
                    "id": id,
                }),
            ),
            AppError::InvalidRequest { status, message } => (
                *status,
                json!({ "kind": "invalid_request", "message": message }),
            ),
            AppError::Unavailable(err) => {
                tracing::error!(error = %err, "storage unavailable");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    json!({ "kind": "unavailable", "message": "service unavailable" }),
                )
            }
            AppError::Store(StoreError::Storage(err)) => {
                tracing::error!(error = %err, "storage failure");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "kind": "internal", "message": "internal server error" }),
                )
            }
            AppError::Internal(err) => {
                tracing::error!(error = %err, "unhandled error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "kind": "internal", "message": "internal server error" }),
                )
            }
        };

        let mut envelope = json!({ "success": false, "error": body });
        if matches!(self, AppError::Unavailable(_)) {
            envelope["status"] = json!("unhealthy");
        }
        (status, Json(envelope)).into_response()
    }
}
