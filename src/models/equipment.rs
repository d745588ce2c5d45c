// src/models/equipment.rs

use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::{Validate, ValidationError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum EquipmentStatus {
    #[serde(rename = "ATIVO", alias = "ACTIVE")]
    Active,
    #[serde(rename = "INATIVO", alias = "INACTIVE")]
    Inactive,
    #[serde(rename = "ARQUIVADO", alias = "ARCHIVED")]
    Archived,
    #[serde(rename = "MANUTENCAO", alias = "MAINTENANCE")]
    Maintenance,
}

impl EquipmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EquipmentStatus::Active => "ATIVO",
            EquipmentStatus::Inactive => "INATIVO",
            EquipmentStatus::Archived => "ARQUIVADO",
            EquipmentStatus::Maintenance => "MANUTENCAO",
        }
    }
}

impl FromStr for EquipmentStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "ATIVO" | "ACTIVE" => Ok(EquipmentStatus::Active),
            "INATIVO" | "INACTIVE" => Ok(EquipmentStatus::Inactive),
            "ARQUIVADO" | "ARCHIVED" => Ok(EquipmentStatus::Archived),
            "MANUTENCAO" | "MAINTENANCE" => Ok(EquipmentStatus::Maintenance),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum EquipmentType {
    #[serde(rename = "LUXIMETRO", alias = "LUX_METER")]
    LuxMeter,
    #[serde(rename = "TERMOMETRO", alias = "THERMOMETER")]
    Thermometer,
    #[serde(rename = "DECIBELIMETRO", alias = "SOUND_LEVEL_METER")]
    SoundLevelMeter,
    #[serde(rename = "OUTRO", alias = "OTHER")]
    Other,
}

impl EquipmentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EquipmentType::LuxMeter => "LUXIMETRO",
            EquipmentType::Thermometer => "TERMOMETRO",
            EquipmentType::SoundLevelMeter => "DECIBELIMETRO",
            EquipmentType::Other => "OUTRO",
        }
    }
}

impl FromStr for EquipmentType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "LUXIMETRO" | "LUX_METER" => Ok(EquipmentType::LuxMeter),
            "TERMOMETRO" | "THERMOMETER" => Ok(EquipmentType::Thermometer),
            "DECIBELIMETRO" | "SOUND_LEVEL_METER" => Ok(EquipmentType::SoundLevelMeter),
            "OUTRO" | "OTHER" => Ok(EquipmentType::Other),
            _ => Err(()),
        }
    }
}

// Linha de `equipamentos`. Colunas que o schema antigo não tem são opcionais.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Equipment {
    pub id: Uuid,
    #[serde(rename = "codigo")]
    pub code: String,
    #[serde(rename = "nome")]
    pub name: String,
    #[serde(rename = "modelo", default)]
    pub model: Option<String>,
    #[serde(rename = "tipo", default)]
    pub kind: Option<EquipmentType>,
    pub status: EquipmentStatus,
    #[serde(rename = "ultima_calibracao", default)]
    pub last_calibration: Option<NaiveDate>,
    #[serde(rename = "proxima_calibracao", default)]
    pub next_calibration: Option<NaiveDate>,
    #[serde(default)]
    pub deleted_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(alias = "org_id", default)]
    pub organization_id: Option<Uuid>,
}

pub(crate) fn validate_equipment_status(value: &str) -> Result<(), ValidationError> {
    EquipmentStatus::from_str(value).map(|_| ()).map_err(|_| {
        let mut err = ValidationError::new("status");
        err.message = Some("Status de equipamento inválido.".into());
        err
    })
}

pub(crate) fn validate_equipment_type(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Ok(());
    }
    EquipmentType::from_str(value).map(|_| ()).map_err(|_| {
        let mut err = ValidationError::new("tipo");
        err.message = Some("Tipo de equipamento inválido.".into());
        err
    })
}

// ---
// Payloads
// ---
fn default_equipment_status() -> String {
    EquipmentStatus::Active.as_str().to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateEquipmentPayload {
    #[serde(rename = "codigo", default)]
    #[validate(length(min = 1, message = "Código e nome do equipamento são obrigatórios."))]
    pub code: String,

    #[serde(rename = "nome", default)]
    #[validate(length(min = 1, message = "Código e nome do equipamento são obrigatórios."))]
    pub name: String,

    #[serde(rename = "modelo", default)]
    pub model: Option<String>,

    #[serde(rename = "tipo", default)]
    #[validate(custom(function = "validate_equipment_type"))]
    pub kind: Option<String>,

    #[serde(default = "default_equipment_status")]
    #[validate(custom(function = "validate_equipment_status"))]
    pub status: String,

    #[serde(rename = "ultima_calibracao", default)]
    pub last_calibration: Option<NaiveDate>,

    #[serde(rename = "proxima_calibracao", default)]
    pub next_calibration: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, ToSchema)]
pub struct UpdateEquipmentPayload {
    #[serde(rename = "codigo", default, skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 1, message = "Código e nome do equipamento são obrigatórios."))]
    pub code: Option<String>,

    #[serde(rename = "nome", default, skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 1, message = "Código e nome do equipamento são obrigatórios."))]
    pub name: Option<String>,

    #[serde(rename = "modelo", default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    #[serde(rename = "tipo", default, skip_serializing_if = "Option::is_none")]
    #[validate(custom(function = "validate_equipment_type"))]
    pub kind: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(custom(function = "validate_equipment_status"))]
    pub status: Option<String>,

    #[serde(rename = "ultima_calibracao", default, skip_serializing_if = "Option::is_none")]
    pub last_calibration: Option<NaiveDate>,

    #[serde(rename = "proxima_calibracao", default, skip_serializing_if = "Option::is_none")]
    pub next_calibration: Option<NaiveDate>,
}

/// Resultado da verificação de dependências antes de inativar.
#[derive(Debug, Clone, Copy, Serialize, ToSchema)]
pub struct Dependencies {
    pub id: Uuid,
    pub has_dependencies: bool,
}
