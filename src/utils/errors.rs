//! Sistema de manejo de errores
//!
//! Este módulo define la taxonomía de errores del núcleo operativo
//! y su conversión a respuestas HTTP apropiadas.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};
use uuid::Uuid;

/// Errores principales de la aplicación
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Vehicle {0} is not available")]
    VehicleNotAvailable(Uuid),

    #[error("Freight order {0} is not assigned to this driver")]
    FreightNotAssigned(Uuid),

    #[error("Invalid transition: {0}")]
    InvalidTransition(String),

    #[error("Ledger inconsistency: {0}")]
    LedgerInconsistency(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    /// Código estable expuesto a los clientes
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Database(_) => "PERSISTENCE_FAILURE",
            AppError::Validation(_) | AppError::BadRequest(_) => "VALIDATION_FAILED",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::VehicleNotAvailable(_) => "VEHICLE_NOT_AVAILABLE",
            AppError::FreightNotAssigned(_) => "FREIGHT_NOT_ASSIGNED",
            AppError::InvalidTransition(_) => "INVALID_TRANSITION",
            AppError::LedgerInconsistency(_) => "PERSISTENCE_FAILURE",
            AppError::Conflict(_) => "CONFLICT",
            AppError::Unauthorized(_) => "UNAUTHORIZED",
            AppError::Forbidden(_) => "FORBIDDEN",
            AppError::Timeout(_) => "TIMEOUT",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Database(_) | AppError::LedgerInconsistency(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            AppError::Validation(_) | AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::VehicleNotAvailable(_)
            | AppError::InvalidTransition(_)
            | AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::FreightNotAssigned(_) | AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
        }
    }
}

/// Respuesta de error para la API
#[derive(Debug, serde::Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<serde_json::Value>,
    code: &'static str,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.code();

        let (error, message, details) = match &self {
            AppError::Database(e) => {
                error!("Database error: {}", e);
                (
                    "Persistence Failure",
                    "An error occurred while accessing the database".to_string(),
                    None,
                )
            }
            AppError::LedgerInconsistency(msg) => {
                error!("Ledger inconsistency: {}", msg);
                (
                    "Persistence Failure",
                    "An error occurred while accessing the database".to_string(),
                    None,
                )
            }
            AppError::Internal(msg) => {
                error!("Internal error: {}", msg);
                ("Internal Server Error", "An unexpected error occurred".to_string(), None)
            }
            AppError::Validation(e) => {
                warn!("Validation error: {}", e);
                (
                    "Validation Error",
                    "The provided data is invalid".to_string(),
                    Some(json!(e)),
                )
            }
            AppError::BadRequest(msg) => ("Validation Error", msg.clone(), None),
            AppError::NotFound(msg) => ("Not Found", msg.clone(), None),
            AppError::VehicleNotAvailable(_) => ("Vehicle Not Available", self.to_string(), None),
            AppError::FreightNotAssigned(_) => ("Freight Not Assigned", self.to_string(), None),
            AppError::InvalidTransition(msg) => ("Invalid Transition", msg.clone(), None),
            AppError::Conflict(msg) => ("Conflict", msg.clone(), None),
            AppError::Unauthorized(msg) => ("Unauthorized", msg.clone(), None),
            AppError::Forbidden(msg) => ("Forbidden", msg.clone(), None),
            AppError::Timeout(msg) => {
                warn!("Timeout: {}", msg);
                ("Timeout", msg.clone(), None)
            }
        };

        let body = ErrorResponse {
            error: error.to_string(),
            message,
            details,
            code,
        };

        (status, Json(body)).into_response()
    }
}

/// Resultado tipado para operaciones que pueden fallar
pub type AppResult<T> = Result<T, AppError>;

/// Función helper para crear errores de validación
pub fn validation_error(field: &'static str, message: &'static str) -> AppError {
    use validator::ValidationError;

    let mut error = ValidationError::new("custom");
    error.message = Some(message.into());

    let mut errors = validator::ValidationErrors::new();
    errors.add(field, error);

    AppError::Validation(errors)
}

/// Función helper para crear errores de recurso no encontrado.
///
/// No distingue entre "no existe" y "pertenece a otra organización".
pub fn not_found_error(resource: &str, id: Uuid) -> AppError {
    AppError::NotFound(format!("{} with id '{}' not found", resource, id))
}

/// Función helper para crear errores de transición inválida
pub fn invalid_transition(entity: &str, from: impl std::fmt::Debug, action: &str) -> AppError {
    AppError::InvalidTransition(format!("{} in state {:?} cannot {}", entity, from, action))
}

/// Función helper para crear errores de acceso prohibido
pub fn forbidden_error(operation: &str, reason: &str) -> AppError {
    AppError::Forbidden(format!("Cannot {}: {}", operation, reason))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_domain_errors_map_to_client_errors() {
        let id = Uuid::new_v4();
        assert_eq!(AppError::VehicleNotAvailable(id).status(), StatusCode::CONFLICT);
        assert_eq!(AppError::FreightNotAssigned(id).status(), StatusCode::FORBIDDEN);
        assert_eq!(not_found_error("Journey", id).status(), StatusCode::NOT_FOUND);
        assert_eq!(
            validation_error("value", "must be positive").status(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_storage_errors_are_generic_failures() {
        let err = AppError::Database(sqlx::Error::RowNotFound);
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.code(), "PERSISTENCE_FAILURE");

        let err = AppError::LedgerInconsistency("fine without cost".to_string());
        assert_eq!(err.code(), "PERSISTENCE_FAILURE");
    }

    #[test]
    fn test_validation_codes_are_shared() {
        assert_eq!(AppError::BadRequest("x".into()).code(), "VALIDATION_FAILED");
        assert_eq!(validation_error("x", "y").code(), "VALIDATION_FAILED");
    }
}
