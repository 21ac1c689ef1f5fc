//! Utilidades JWT
//!
//! El token lleva usuario, organización y rol; al decodificarlo se obtiene
//! directamente el `Principal` que reciben los servicios.

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};

use crate::models::auth::{Claims, Principal};
use crate::utils::errors::{AppError, AppResult};

/// Generar un token firmado para el principal
pub fn encode_token(principal: &Principal, secret: &str, expires_in_secs: u64) -> AppResult<String> {
    let now = Utc::now();
    let claims = Claims {
        sub: principal.user_id.to_string(),
        org: principal.organization_id.to_string(),
        role: principal.role.as_str().to_string(),
        exp: (now + Duration::seconds(expires_in_secs as i64)).timestamp(),
        iat: now.timestamp(),
    };

    encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_bytes()))
        .map_err(|e| AppError::Internal(format!("could not sign token: {}", e)))
}

/// Verificar firma y expiración, y resolver el principal
pub fn decode_token(token: &str, secret: &str) -> AppResult<Principal> {
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|_| AppError::Unauthorized("Invalid or expired token".to_string()))?;

    Principal::try_from(data.claims)
}

/// Extraer el token del header Authorization
pub fn bearer_token(header: &str) -> AppResult<&str> {
    header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AppError::Unauthorized("Authorization header must be 'Bearer <token>'".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::auth::Role;
    use uuid::Uuid;

    #[test]
    fn test_token_resolves_to_same_principal() {
        let principal = Principal::new(Uuid::new_v4(), Uuid::new_v4(), Role::ClienteAtivo);
        let token = encode_token(&principal, "secret", 60).unwrap();
        assert_eq!(decode_token(&token, "secret").unwrap(), principal);
    }

    #[test]
    fn test_wrong_secret_is_unauthorized() {
        let principal = Principal::new(Uuid::new_v4(), Uuid::new_v4(), Role::Driver);
        let token = encode_token(&principal, "secret", 60).unwrap();
        assert!(matches!(
            decode_token(&token, "other"),
            Err(AppError::Unauthorized(_))
        ));
    }

    #[test]
    fn test_bearer_token() {
        assert_eq!(bearer_token("Bearer abc.def.ghi").unwrap(), "abc.def.ghi");
        assert!(bearer_token("Basic dXNlcg==").is_err());
        assert!(bearer_token("Bearer ").is_err());
    }
}
