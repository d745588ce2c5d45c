// src/models/tenancy.rs

use serde::{Deserialize, Deserializer, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Admin,
    #[default]
    User,
}

impl Role {
    /// Papéis vindos do banco chegam em qualquer caixa; tudo que não é ADMIN vira USER.
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(|r| r.trim().to_uppercase()) {
            Some(r) if r == "ADMIN" => Role::Admin,
            _ => Role::User,
        }
    }
}

impl<'de> Deserialize<'de> for Role {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(Role::parse(raw.as_deref()))
    }
}

/// Resultado da resolução de organização de uma identidade.
/// `organization_id = None` só é possível para ADMIN (visão global).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub struct TenantContext {
    pub organization_id: Option<Uuid>,
    pub role: Role,
}

impl TenantContext {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Organization {
    pub id: Uuid,
    pub nome: Option<String>,
}
