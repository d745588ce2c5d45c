// src/models/site.rs

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::{Validate, ValidationError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum SiteStatus {
    #[serde(rename = "ATIVA", alias = "ACTIVE")]
    Active,
    #[serde(rename = "INATIVA", alias = "INACTIVE")]
    Inactive,
    #[serde(rename = "ARQUIVADA", alias = "ARCHIVED")]
    Archived,
    #[serde(rename = "CONCLUIDA", alias = "COMPLETED")]
    Completed,
}

impl SiteStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SiteStatus::Active => "ATIVA",
            SiteStatus::Inactive => "INATIVA",
            SiteStatus::Archived => "ARQUIVADA",
            SiteStatus::Completed => "CONCLUIDA",
        }
    }
}

impl FromStr for SiteStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "ATIVA" | "ACTIVE" => Ok(SiteStatus::Active),
            "INATIVA" | "INACTIVE" => Ok(SiteStatus::Inactive),
            "ARQUIVADA" | "ARCHIVED" => Ok(SiteStatus::Archived),
            "CONCLUIDA" | "COMPLETED" => Ok(SiteStatus::Completed),
            _ => Err(()),
        }
    }
}

// Linha de `obras`
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Site {
    pub id: Uuid,
    #[serde(rename = "codigo")]
    pub code: String,
    #[serde(rename = "nome")]
    pub name: String,
    #[serde(rename = "local", default)]
    pub location: Option<String>,
    #[serde(rename = "cidade", default)]
    pub city: Option<String>,
    #[serde(rename = "uf", default)]
    pub state: Option<String>,
    pub status: SiteStatus,
    #[serde(default)]
    pub deleted_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(alias = "org_id", default)]
    pub organization_id: Option<Uuid>,
}

pub(crate) fn validate_site_status(value: &str) -> Result<(), ValidationError> {
    SiteStatus::from_str(value).map(|_| ()).map_err(|_| {
        let mut err = ValidationError::new("status");
        err.message = Some("Status de obra inválido.".into());
        err
    })
}

fn default_site_status() -> String {
    SiteStatus::Active.as_str().to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateSitePayload {
    #[serde(rename = "codigo", default)]
    #[validate(length(min = 1, message = "Código e nome da obra são obrigatórios."))]
    pub code: String,

    #[serde(rename = "nome", default)]
    #[validate(length(min = 1, message = "Código e nome da obra são obrigatórios."))]
    pub name: String,

    #[serde(rename = "local", default)]
    pub location: Option<String>,

    #[serde(rename = "cidade", default)]
    pub city: Option<String>,

    #[serde(rename = "uf", default)]
    #[validate(length(equal = 2, message = "UF deve ter 2 letras."))]
    pub state: Option<String>,

    #[serde(default = "default_site_status")]
    #[validate(custom(function = "validate_site_status"))]
    pub status: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, ToSchema)]
pub struct UpdateSitePayload {
    #[serde(rename = "codigo", default, skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 1, message = "Código e nome da obra são obrigatórios."))]
    pub code: Option<String>,

    #[serde(rename = "nome", default, skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 1, message = "Código e nome da obra são obrigatórios."))]
    pub name: Option<String>,

    #[serde(rename = "local", default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,

    #[serde(rename = "cidade", default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,

    #[serde(rename = "uf", default, skip_serializing_if = "Option::is_none")]
    #[validate(length(equal = 2, message = "UF deve ter 2 letras."))]
    pub state: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(custom(function = "validate_site_status"))]
    pub status: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use validator::Validate;

    #[test]
    fn status_is_validated_case_insensitively() {
        let payload = CreateSitePayload {
            code: "OB-1".into(),
            name: "Obra Centro".into(),
            location: None,
            city: None,
            state: Some("SP".into()),
            status: "concluida".into(),
        };
        assert!(payload.validate().is_ok());
        assert_eq!("concluida".parse(), Ok(SiteStatus::Completed));

        let invalid = CreateSitePayload { status: "PARADA".into(), ..payload };
        assert!(invalid.validate().is_err());
    }
}
