//! Utilidades de validación

use validator::{Validate, ValidationError};

use crate::utils::errors::AppResult;

/// Valida el cuerpo de la petición antes de tocar el almacenamiento
pub fn validated<T: Validate>(body: T) -> AppResult<T> {
    body.validate()?;
    Ok(body)
}

/// Validar que un string no esté vacío
pub fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("not_blank"));
    }
    Ok(())
}
