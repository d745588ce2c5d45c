// src/services/equipment_service.rs

use std::str::FromStr;

use serde_json::{json, Map, Value};
use uuid::Uuid;

use crate::{
    common::{datetime::now_utc, error::AppError},
    db::{
        assignment_repo::AssignmentRepository,
        equipment_repo::EquipmentRepository,
        guard::QueryGuard,
        measurement_repo::MeasurementRepository,
        query::to_row,
    },
    models::{
        audit::{AuditAction, AuditEvent},
        auth::Caller,
        equipment::{
            CreateEquipmentPayload, Dependencies, Equipment, EquipmentStatus, EquipmentType,
            UpdateEquipmentPayload,
        },
    },
    services::{audit_service::AuditRecorder, tenancy_service::TenantResolver},
};

const ENTITY: &str = "equipamentos";

#[derive(Clone)]
pub struct EquipmentService {
    repo: EquipmentRepository,
    assignments: AssignmentRepository,
    measurements: MeasurementRepository,
    resolver: TenantResolver,
    audit: AuditRecorder,
}

// Status e tipo já foram validados; aqui só viram o valor canônico do banco.
fn canonical_status(raw: &str) -> Option<&'static str> {
    EquipmentStatus::from_str(raw).ok().map(|s| s.as_str())
}

fn canonical_type(raw: &str) -> Option<&'static str> {
    EquipmentType::from_str(raw).ok().map(|t| t.as_str())
}

impl EquipmentService {
    pub fn new(guard: QueryGuard) -> Self {
        Self {
            repo: EquipmentRepository::new(guard.clone()),
            assignments: AssignmentRepository::new(guard.clone()),
            measurements: MeasurementRepository::new(guard.clone()),
            resolver: guard.resolver().clone(),
            audit: guard.audit().clone(),
        }
    }

    // Código único por organização entre os não removidos. ADMIN global grava sem
    // organização e fica fora do índice.
    async fn ensure_code_free(&self, caller: &Caller, code: &str, except: Option<Uuid>) -> Result<(), AppError> {
        let tenant = self.resolver.resolve(Some(&caller.identity)).await?;
        if tenant.organization_id.is_none() {
            return Ok(());
        }
        match self.repo.find_live_by_code(caller, code).await? {
            Some(existing) if Some(existing.id) != except => {
                tracing::warn!(codigo = %code, existing = %existing.id, "código de equipamento já em uso");
                Err(AppError::DuplicateCode { code: code.to_string() })
            }
            _ => Ok(()),
        }
    }

    /// ADMIN vê tudo da organização; USER só o que já esteve vinculado a ele.
    pub async fn list(&self, caller: &Caller, include_deleted: bool) -> Result<Vec<Equipment>, AppError> {
        let tenant = self.resolver.resolve(Some(&caller.identity)).await?;
        if tenant.is_admin() {
            return self.repo.list(caller, include_deleted, None).await;
        }

        let reach = self.assignments.reach(caller, caller.id()).await?;
        if reach.equipment_ids.is_empty() {
            return Ok(Vec::new());
        }
        self.repo.list(caller, false, Some(&reach.equipment_ids)).await
    }

    pub async fn create(&self, caller: &Caller, mut payload: CreateEquipmentPayload) -> Result<Equipment, AppError> {
        payload.code = payload.code.trim().to_string();
        payload.name = payload.name.trim().to_string();
        self.audit.validated(caller, ENTITY, &payload)?;
        self.ensure_code_free(caller, &payload.code, None).await?;

        let now = now_utc();
        let mut row = Map::new();
        row.insert("id".into(), json!(Uuid::new_v4()));
        row.insert("codigo".into(), json!(payload.code));
        row.insert("nome".into(), json!(payload.name));
        row.insert("modelo".into(), json!(payload.model));
        row.insert("tipo".into(), json!(payload.kind.as_deref().and_then(canonical_type)));
        row.insert("status".into(), json!(canonical_status(&payload.status)));
        row.insert("ultima_calibracao".into(), json!(payload.last_calibration));
        row.insert("proxima_calibracao".into(), json!(payload.next_calibration));
        row.insert("created_at".into(), json!(now));
        row.insert("updated_at".into(), json!(now));

        let created = self.repo.create(caller, row).await?;
        tracing::info!(id = %created.id, codigo = %created.code, "equipamento criado");

        let event = AuditEvent::new(AuditAction::Create, ENTITY)
            .entity_id(created.id)
            .after(&created)
            .details(json!({ "codigo": created.code, "status": created.status }));
        self.audit.spawn(Some(caller.id()), &caller.request, event);
        Ok(created)
    }

    pub async fn update(
        &self,
        caller: &Caller,
        id: Uuid,
        mut payload: UpdateEquipmentPayload,
    ) -> Result<Equipment, AppError> {
        payload.code = payload.code.map(|c| c.trim().to_string());
        payload.name = payload.name.map(|n| n.trim().to_string());
        self.audit.validated(caller, ENTITY, &payload)?;

        let before = self
            .repo
            .find_by_id(caller, id)
            .await?
            .ok_or_else(|| AppError::NotFound { entity: ENTITY, id: id.to_string() })?;
        if let Some(code) = payload.code.as_deref() {
            self.ensure_code_free(caller, code, Some(id)).await?;
        }

        let mut patch = to_row(&payload);
        if let Some(status) = payload.status.as_deref().and_then(canonical_status) {
            patch.insert("status".into(), json!(status));
        }
        match payload.kind.as_deref() {
            Some(kind) if kind.trim().is_empty() => {
                patch.insert("tipo".into(), Value::Null);
            }
            Some(kind) => {
                patch.insert("tipo".into(), json!(canonical_type(kind)));
            }
            None => {}
        }
        patch.insert("updated_at".into(), json!(now_utc()));

        let updated = self.repo.update(caller, id, patch).await?;
        let event = AuditEvent::new(AuditAction::Update, ENTITY)
            .entity_id(id)
            .before(&before)
            .after(&updated);
        self.audit.spawn(Some(caller.id()), &caller.request, event);
        Ok(updated)
    }

    /// Medição não removida ou vínculo ATIVO apontando para o equipamento.
    pub async fn has_dependencies(&self, caller: &Caller, id: Uuid) -> Result<bool, AppError> {
        if self.measurements.count_live_by(caller, "equipamento_id", id).await? > 0 {
            return Ok(true);
        }
        Ok(self.assignments.count_active_by(caller, "equipamento_id", id).await? > 0)
    }

    pub async fn dependencies(&self, caller: &Caller, id: Uuid) -> Result<Dependencies, AppError> {
        let has_dependencies = self.has_dependencies(caller, id).await?;
        Ok(Dependencies { id, has_dependencies })
    }

    /// Inativa o equipamento (status INATIVO + deleted_at). Recusado se houver dependências.
    pub async fn soft_delete(&self, caller: &Caller, id: Uuid) -> Result<Equipment, AppError> {
        if self.has_dependencies(caller, id).await? {
            tracing::warn!(%id, "inativação de equipamento bloqueada por dependências");
            return Err(AppError::Integrity { entity: ENTITY, id });
        }

        let now = now_utc();
        let mut patch = Map::new();
        patch.insert("status".into(), json!(EquipmentStatus::Inactive.as_str()));
        patch.insert("deleted_at".into(), json!(now));
        patch.insert("updated_at".into(), json!(now));

        let removed = self.repo.update(caller, id, patch).await?;
        let event = AuditEvent::new(AuditAction::SoftDelete, ENTITY)
            .entity_id(id)
            .details(json!({ "mode": "soft_delete", "codigo": removed.code }));
        self.audit.spawn(Some(caller.id()), &caller.request, event);
        Ok(removed)
    }

    pub async fn count(&self, caller: &Caller) -> Result<i64, AppError> {
        let tenant = self.resolver.resolve(Some(&caller.identity)).await?;
        if tenant.is_admin() {
            return self.repo.count(caller, None).await;
        }
        let reach = self.assignments.reach(caller, caller.id()).await?;
        if reach.equipment_ids.is_empty() {
            return Ok(0);
        }
        self.repo.count(caller, Some(&reach.equipment_ids)).await
    }
}
