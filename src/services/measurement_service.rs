// src/services/measurement_service.rs

use serde_json::{json, Map};
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
        measurement::{
            CreateMeasurementPayload, Measurement, MeasurementFilters, MeasurementPermission,
            UpdateMeasurementPayload,
        },
        tenancy::TenantContext,
    },
    services::{audit_service::AuditRecorder, tenancy_service::TenantResolver},
};

const ENTITY: &str = "medicoes";

#[derive(Clone)]
pub struct MeasurementService {
    repo: MeasurementRepository,
    assignments: AssignmentRepository,
    equipment: EquipmentRepository,
    resolver: TenantResolver,
    audit: AuditRecorder,
}

impl MeasurementService {
    pub fn new(guard: QueryGuard) -> Self {
        Self {
            repo: MeasurementRepository::new(guard.clone()),
            assignments: AssignmentRepository::new(guard.clone()),
            equipment: EquipmentRepository::new(guard.clone()),
            resolver: guard.resolver().clone(),
            audit: guard.audit().clone(),
        }
    }

    // USER sempre mede em nome próprio; ADMIN pode indicar outro usuário.
    fn target_user(tenant: &TenantContext, caller: &Caller, requested: Option<Uuid>) -> Uuid {
        if tenant.is_admin() {
            requested.unwrap_or_else(|| caller.id())
        } else {
            caller.id()
        }
    }

    // Vínculo ligado à medição. USER fica com o vínculo ATIVO achado pelo portão; ADMIN pode
    // indicar outro, desde que seja um vínculo não removido do mesmo equipamento.
    async fn linked_assignment(
        &self,
        caller: &Caller,
        tenant: &TenantContext,
        equipment_id: Uuid,
        requested: Option<Uuid>,
        permission: &MeasurementPermission,
    ) -> Result<Option<Uuid>, AppError> {
        let Some(requested) = requested.filter(|_| tenant.is_admin()) else {
            return Ok(permission.vinculo_id);
        };
        match self.assignments.find_by_id(caller, requested).await? {
            Some(a) if a.equipment_id == equipment_id && a.deleted_at.is_none() => Ok(Some(a.id)),
            _ => {
                tracing::warn!(%equipment_id, vinculo_id = %requested, "vínculo informado não pertence ao equipamento");
                Err(AppError::InvalidInput("vinculo_id não pertence ao equipamento informado.".into()))
            }
        }
    }

    /// Equipamento existe (não removido) e o chamador é ADMIN ou o usuário tem vínculo ATIVO com ele.
    /// O vínculo ATIVO encontrado volta junto, para ser ligado à medição.
    pub async fn can_create_measurement(
        &self,
        caller: &Caller,
        equipment_id: Uuid,
        user_id: Option<Uuid>,
    ) -> Result<MeasurementPermission, AppError> {
        let tenant = self.resolver.resolve(Some(&caller.identity)).await?;
        let user_id = Self::target_user(&tenant, caller, user_id);

        let equipment = self.equipment.find_by_id(caller, equipment_id).await?;
        if !equipment.is_some_and(|e| e.deleted_at.is_none()) {
            return Ok(MeasurementPermission { allowed: false, vinculo_id: None });
        }

        let active = self.assignments.active_for(caller, equipment_id, user_id).await?;
        Ok(MeasurementPermission {
            allowed: tenant.is_admin() || active.is_some(),
            vinculo_id: active.map(|a| a.id),
        })
    }

    pub async fn list(&self, caller: &Caller, filters: &MeasurementFilters) -> Result<Vec<Measurement>, AppError> {
        let tenant = self.resolver.resolve(Some(&caller.identity)).await?;
        if tenant.is_admin() {
            return self.repo.list(caller, filters, filters.include_deleted, None, None).await;
        }

        let reach = self.assignments.reach(caller, caller.id()).await?;
        if reach.equipment_ids.is_empty() {
            return Ok(Vec::new());
        }
        self.repo.list(caller, filters, false, None, Some(&reach.equipment_ids)).await
    }

    pub async fn create(
        &self,
        caller: &Caller,
        mut payload: CreateMeasurementPayload,
    ) -> Result<Measurement, AppError> {
        payload.kind = payload.kind.trim().to_string();
        payload.unit = payload.unit.trim().to_string();
        self.audit.validated(caller, ENTITY, &payload)?;

        let Some(equipment_id) = payload.equipment_id else {
            return Err(AppError::InvalidInput("equipamento_id é obrigatório.".into()));
        };
        let tenant = self.resolver.resolve(Some(&caller.identity)).await?;
        let user_id = Self::target_user(&tenant, caller, payload.user_id);

        let permission = self.can_create_measurement(caller, equipment_id, Some(user_id)).await?;
        if !permission.allowed {
            tracing::warn!(%equipment_id, %user_id, "medição recusada: usuário sem vínculo ativo");
            return Err(AppError::UnauthorizedMeasurement { equipment_id, user_id });
        }
        let vinculo_id = self
            .linked_assignment(caller, &tenant, equipment_id, payload.assignment_id, &permission)
            .await?;

        let now = now_utc();
        let mut row = Map::new();
        row.insert("id".into(), json!(Uuid::new_v4()));
        row.insert("equipamento_id".into(), json!(equipment_id));
        row.insert("obra_id".into(), json!(payload.site_id));
        row.insert("user_id".into(), json!(user_id));
        row.insert("vinculo_id".into(), json!(vinculo_id));
        row.insert("tipo".into(), json!(payload.kind));
        row.insert("valor".into(), json!(payload.value));
        row.insert("unidade".into(), json!(payload.unit));
        row.insert("conforme".into(), json!(payload.compliant));
        row.insert("data".into(), json!(payload.date));
        row.insert("medido_em".into(), json!(payload.measured_at));
        row.insert("observacoes".into(), json!(payload.notes));
        row.insert("created_at".into(), json!(now));
        row.insert("updated_at".into(), json!(now));

        let created = self.repo.create(caller, row).await?;
        let event = AuditEvent::new(AuditAction::Create, ENTITY)
            .entity_id(created.id)
            .after(&created)
            .details(json!({ "equipamento_id": equipment_id, "user_id": user_id }));
        self.audit.spawn(Some(caller.id()), &caller.request, event);
        Ok(created)
    }

    pub async fn update(
        &self,
        caller: &Caller,
        id: Uuid,
        mut payload: UpdateMeasurementPayload,
    ) -> Result<Measurement, AppError> {
        payload.kind = payload.kind.map(|k| k.trim().to_string());
        payload.unit = payload.unit.map(|u| u.trim().to_string());
        self.audit.validated(caller, ENTITY, &payload)?;

        let before = self
            .repo
            .find_by_id(caller, id)
            .await?
            .filter(|m| m.deleted_at.is_none())
            .ok_or_else(|| AppError::NotFound { entity: ENTITY, id: id.to_string() })?;

        let mut patch = to_row(&payload);
        patch.insert("updated_at".into(), json!(now_utc()));

        let updated = self.repo.update(caller, id, patch).await?;
        let event = AuditEvent::new(AuditAction::Update, ENTITY)
            .entity_id(id)
            .before(&before)
            .after(&updated);
        self.audit.spawn(Some(caller.id()), &caller.request, event);
        Ok(updated)
    }

    pub async fn soft_delete(&self, caller: &Caller, id: Uuid) -> Result<(), AppError> {
        let affected = self.repo.soft_delete(caller, id).await?;
        if affected == 0 {
            return Err(AppError::NotFound { entity: ENTITY, id: id.to_string() });
        }

        let event = AuditEvent::new(AuditAction::SoftDelete, ENTITY)
            .entity_id(id)
            .details(json!({ "mode": "soft_delete" }));
        self.audit.spawn(Some(caller.id()), &caller.request, event);
        Ok(())
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
