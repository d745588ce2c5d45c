// src/models/profile.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::tenancy::{Role, TenantContext};

// Linha de `profiles` (o id é o mesmo da identidade no serviço de auth)
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Profile {
    pub id: Uuid,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(rename = "nome", default)]
    pub name: Option<String>,
    #[serde(default)]
    pub role: Role,
    #[serde(alias = "org_id", default)]
    pub organization_id: Option<Uuid>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Perfil normalizado devolvido pelo `/api/me`.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct MeResponse {
    pub profile: Profile,
    pub tenant: TenantContext,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ReassignOrganizationPayload {
    pub organization_id: Uuid,
}
