// src/models/measurement.rs

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

// Linha de `medicoes`
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Measurement {
    pub id: Uuid,
    #[serde(rename = "equipamento_id")]
    pub equipment_id: Uuid,
    #[serde(rename = "obra_id", default)]
    pub site_id: Option<Uuid>,
    #[serde(default)]
    pub user_id: Option<Uuid>,
    #[serde(rename = "vinculo_id", default)]
    pub assignment_id: Option<Uuid>,
    #[serde(rename = "tipo", default)]
    pub kind: Option<String>,
    #[serde(rename = "valor", default)]
    pub value: Option<Decimal>,
    #[serde(rename = "unidade", default)]
    pub unit: Option<String>,
    #[serde(rename = "conforme", default)]
    pub compliant: Option<bool>,
    #[serde(rename = "data", default)]
    pub date: Option<NaiveDate>,
    #[serde(rename = "medido_em", default)]
    pub measured_at: Option<DateTime<Utc>>,
    #[serde(rename = "observacoes", default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub deleted_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(alias = "org_id", default)]
    pub organization_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateMeasurementPayload {
    #[serde(rename = "equipamento_id", default)]
    #[validate(required(message = "Campos obrigatórios: equipamento_id, obra_id, user_id, tipo, unidade, medido_em e data."))]
    pub equipment_id: Option<Uuid>,

    #[serde(rename = "obra_id", default)]
    #[validate(required(message = "Campos obrigatórios: equipamento_id, obra_id, user_id, tipo, unidade, medido_em e data."))]
    pub site_id: Option<Uuid>,

    // Para USER é sempre o próprio chamador; ADMIN pode registrar em nome de outro.
    #[serde(default)]
    pub user_id: Option<Uuid>,

    #[serde(rename = "vinculo_id", default)]
    pub assignment_id: Option<Uuid>,

    #[serde(rename = "tipo", default)]
    #[validate(length(min = 1, message = "Campos obrigatórios: equipamento_id, obra_id, user_id, tipo, unidade, medido_em e data."))]
    pub kind: String,

    #[serde(rename = "valor", default)]
    #[validate(required(message = "Valor da medição deve ser numérico."))]
    pub value: Option<Decimal>,

    #[serde(rename = "unidade", default)]
    #[validate(length(min = 1, message = "Campos obrigatórios: equipamento_id, obra_id, user_id, tipo, unidade, medido_em e data."))]
    pub unit: String,

    #[serde(rename = "conforme", default)]
    pub compliant: Option<bool>,

    #[serde(rename = "data", default)]
    #[validate(required(message = "Campos obrigatórios: equipamento_id, obra_id, user_id, tipo, unidade, medido_em e data."))]
    pub date: Option<NaiveDate>,

    #[serde(rename = "medido_em", default)]
    #[validate(required(message = "Campos obrigatórios: equipamento_id, obra_id, user_id, tipo, unidade, medido_em e data."))]
    pub measured_at: Option<DateTime<Utc>>,

    #[serde(rename = "observacoes", default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, ToSchema)]
pub struct UpdateMeasurementPayload {
    #[serde(rename = "obra_id", default, skip_serializing_if = "Option::is_none")]
    pub site_id: Option<Uuid>,

    #[serde(rename = "tipo", default, skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 1))]
    pub kind: Option<String>,

    #[serde(rename = "valor", default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Decimal>,

    #[serde(rename = "unidade", default, skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 1))]
    pub unit: Option<String>,

    #[serde(rename = "conforme", default, skip_serializing_if = "Option::is_none")]
    pub compliant: Option<bool>,

    #[serde(rename = "data", default, skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,

    #[serde(rename = "medido_em", default, skip_serializing_if = "Option::is_none")]
    pub measured_at: Option<DateTime<Utc>>,

    #[serde(rename = "observacoes", default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
pub struct MeasurementFilters {
    pub equipamento_id: Option<Uuid>,
    pub obra_id: Option<Uuid>,
    /// Limite inferior (inclusivo) de `medido_em`
    pub from: Option<DateTime<Utc>>,
    /// Limite superior (inclusivo) de `medido_em`
    pub to: Option<DateTime<Utc>>,
    #[serde(default)]
    pub include_deleted: bool,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct PermissionCheckPayload {
    pub equipamento_id: Uuid,
    #[serde(default)]
    pub user_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct MeasurementPermission {
    pub allowed: bool,
    pub vinculo_id: Option<Uuid>,
}
