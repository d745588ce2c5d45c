// src/models/assignment.rs

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::{Validate, ValidationError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum AssignmentStatus {
    #[serde(rename = "ATIVO", alias = "ACTIVE")]
    Active,
    #[serde(rename = "ENCERRADO", alias = "ENDED")]
    Ended,
}

impl AssignmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssignmentStatus::Active => "ATIVO",
            AssignmentStatus::Ended => "ENCERRADO",
        }
    }
}

impl FromStr for AssignmentStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "ATIVO" | "ACTIVE" => Ok(AssignmentStatus::Active),
            "ENCERRADO" | "ENDED" => Ok(AssignmentStatus::Ended),
            _ => Err(()),
        }
    }
}

// Linha de `vinculos`: custódia de um equipamento por um usuário numa obra.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Assignment {
    pub id: Uuid,
    #[serde(rename = "equipamento_id")]
    pub equipment_id: Uuid,
    #[serde(rename = "obra_id", default)]
    pub site_id: Option<Uuid>,
    pub user_id: Uuid,
    #[serde(rename = "inicio_em", default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(rename = "encerrou_em", default)]
    pub ended_at: Option<DateTime<Utc>>,
    pub status: AssignmentStatus,
    #[serde(rename = "motivo_encerramento", default)]
    pub end_reason: Option<String>,
    #[serde(rename = "encerrado_por", default)]
    pub ended_by: Option<Uuid>,
    #[serde(rename = "termo_url", default)]
    pub document_path: Option<String>,
    #[serde(rename = "termo_nome", default)]
    pub document_name: Option<String>,
    #[serde(default)]
    pub deleted_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(alias = "org_id", default)]
    pub organization_id: Option<Uuid>,
}

impl Assignment {
    pub fn is_active(&self) -> bool {
        self.status == AssignmentStatus::Active && self.deleted_at.is_none()
    }
}

/// Código e nome de equipamento/obra, para a listagem de vínculos.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RefSummary {
    pub id: Uuid,
    pub codigo: String,
    pub nome: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AssignmentView {
    #[serde(flatten)]
    pub assignment: Assignment,
    #[serde(rename = "equipamento")]
    pub equipment: Option<RefSummary>,
    #[serde(rename = "obra")]
    pub site: Option<RefSummary>,
    #[serde(rename = "dias_com_usuario")]
    pub days_with_user: Option<i64>,
}

fn default_assignment_status() -> String {
    AssignmentStatus::Active.as_str().to_string()
}

pub(crate) fn validate_assignment_status(value: &str) -> Result<(), ValidationError> {
    AssignmentStatus::from_str(value).map(|_| ()).map_err(|_| {
        let mut err = ValidationError::new("status");
        err.message = Some("Status de vínculo inválido.".into());
        err
    })
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateAssignmentPayload {
    #[serde(rename = "equipamento_id", default)]
    #[validate(required(message = "equipamento_id, user_id, obra_id e inicio_em são obrigatórios."))]
    pub equipment_id: Option<Uuid>,

    #[serde(rename = "obra_id", default)]
    #[validate(required(message = "equipamento_id, user_id, obra_id e inicio_em são obrigatórios."))]
    pub site_id: Option<Uuid>,

    #[validate(required(message = "equipamento_id, user_id, obra_id e inicio_em são obrigatórios."))]
    pub user_id: Option<Uuid>,

    #[serde(rename = "inicio_em", default)]
    #[validate(required(message = "equipamento_id, user_id, obra_id e inicio_em são obrigatórios."))]
    pub started_at: Option<DateTime<Utc>>,

    #[serde(default = "default_assignment_status")]
    #[validate(custom(function = "validate_assignment_status"))]
    pub status: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, ToSchema)]
pub struct UpdateAssignmentPayload {
    #[serde(rename = "equipamento_id", default, skip_serializing_if = "Option::is_none")]
    pub equipment_id: Option<Uuid>,

    #[serde(rename = "obra_id", default, skip_serializing_if = "Option::is_none")]
    pub site_id: Option<Uuid>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<Uuid>,

    #[serde(rename = "inicio_em", default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(custom(function = "validate_assignment_status"))]
    pub status: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct EndAssignmentPayload {
    #[serde(rename = "motivo_encerramento", default)]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
pub struct AssignmentFilters {
    pub equipamento_id: Option<Uuid>,
    pub obra_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
    #[serde(default)]
    pub include_deleted: bool,
}

#[derive(Debug, Clone, Deserialize, IntoParams)]
pub struct DocumentUploadQuery {
    /// Nome original do arquivo do termo
    pub nome: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DocumentUrl {
    pub url: String,
    pub signed: bool,
}
