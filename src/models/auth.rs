use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::utils::errors::{forbidden_error, AppError, AppResult};

/// Roles del sistema
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    SuperAdmin,
    ClienteAtivo,
    ClienteDemo,
    Driver,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::SuperAdmin => "super_admin",
            Role::ClienteAtivo => "cliente_ativo",
            Role::ClienteDemo => "cliente_demo",
            Role::Driver => "driver",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "super_admin" => Some(Role::SuperAdmin),
            "cliente_ativo" => Some(Role::ClienteAtivo),
            "cliente_demo" => Some(Role::ClienteDemo),
            "driver" => Some(Role::Driver),
            _ => None,
        }
    }
}

/// Identidad resuelta del llamador; toda operación del núcleo la recibe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub user_id: Uuid,
    pub organization_id: Uuid,
    pub role: Role,
}

impl Principal {
    pub fn new(user_id: Uuid, organization_id: Uuid, role: Role) -> Self {
        Self {
            user_id,
            organization_id,
            role,
        }
    }

    pub fn is_manager(&self) -> bool {
        matches!(self.role, Role::ClienteAtivo | Role::ClienteDemo)
    }

    pub fn is_driver(&self) -> bool {
        self.role == Role::Driver
    }

    pub fn is_premium(&self) -> bool {
        self.role == Role::ClienteAtivo
    }

    pub fn require_manager(&self, operation: &str) -> AppResult<()> {
        if self.is_manager() {
            Ok(())
        } else {
            Err(forbidden_error(operation, "manager role required"))
        }
    }

    pub fn require_driver(&self, operation: &str) -> AppResult<()> {
        if self.is_driver() {
            Ok(())
        } else {
            Err(forbidden_error(operation, "driver role required"))
        }
    }
}

/// Claims del JWT
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // user_id
    pub org: String, // organization_id
    pub role: String,
    pub exp: i64,
    pub iat: i64,
}

impl TryFrom<Claims> for Principal {
    type Error = AppError;

    fn try_from(claims: Claims) -> Result<Self, Self::Error> {
        let user_id = Uuid::parse_str(&claims.sub)
            .map_err(|_| AppError::Unauthorized("Invalid subject in token".to_string()))?;
        let organization_id = Uuid::parse_str(&claims.org)
            .map_err(|_| AppError::Unauthorized("Invalid organization in token".to_string()))?;
        let role = Role::parse(&claims.role)
            .ok_or_else(|| AppError::Unauthorized("Unknown role in token".to_string()))?;
        Ok(Principal::new(user_id, organization_id, role))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capabilities() {
        let org = Uuid::new_v4();
        let manager = Principal::new(Uuid::new_v4(), org, Role::ClienteDemo);
        let driver = Principal::new(Uuid::new_v4(), org, Role::Driver);

        assert!(manager.require_manager("create fine").is_ok());
        assert!(matches!(
            driver.require_manager("create fine"),
            Err(AppError::Forbidden(_))
        ));
        assert!(driver.require_driver("claim freight").is_ok());
        assert!(!manager.is_premium());
    }

    #[test]
    fn test_claims_with_unknown_role_are_rejected() {
        let claims = Claims {
            sub: Uuid::new_v4().to_string(),
            org: Uuid::new_v4().to_string(),
            role: "livreur".to_string(),
            exp: 0,
            iat: 0,
        };
        assert!(Principal::try_from(claims).is_err());
    }
}
