// src/services/site_service.rs

use std::str::FromStr;

use serde_json::{json, Map};
use uuid::Uuid;

use crate::{
    common::{datetime::now_utc, error::AppError},
    db::{
        assignment_repo::AssignmentRepository,
        guard::QueryGuard,
        measurement_repo::MeasurementRepository,
        query::to_row,
        site_repo::SiteRepository,
    },
    models::{
        audit::{AuditAction, AuditEvent},
        auth::Caller,
        site::{CreateSitePayload, Site, SiteStatus, UpdateSitePayload},
    },
    services::{audit_service::AuditRecorder, tenancy_service::TenantResolver},
};

const ENTITY: &str = "obras";

#[derive(Clone)]
pub struct SiteService {
    repo: SiteRepository,
    assignments: AssignmentRepository,
    measurements: MeasurementRepository,
    resolver: TenantResolver,
    audit: AuditRecorder,
}

fn upper_trimmed(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_uppercase()).filter(|v| !v.is_empty())
}

impl SiteService {
    pub fn new(guard: QueryGuard) -> Self {
        Self {
            repo: SiteRepository::new(guard.clone()),
            assignments: AssignmentRepository::new(guard.clone()),
            measurements: MeasurementRepository::new(guard.clone()),
            resolver: guard.resolver().clone(),
            audit: guard.audit().clone(),
        }
    }

    pub async fn list(&self, caller: &Caller, include_deleted: bool) -> Result<Vec<Site>, AppError> {
        let tenant = self.resolver.resolve(Some(&caller.identity)).await?;
        if tenant.is_admin() {
            return self.repo.list(caller, include_deleted, None).await;
        }

        let reach = self.assignments.reach(caller, caller.id()).await?;
        if reach.site_ids.is_empty() {
            return Ok(Vec::new());
        }
        self.repo.list(caller, false, Some(&reach.site_ids)).await
    }

    pub async fn create(&self, caller: &Caller, mut payload: CreateSitePayload) -> Result<Site, AppError> {
        payload.code = payload.code.trim().to_string();
        payload.name = payload.name.trim().to_string();
        payload.state = upper_trimmed(payload.state);
        self.audit.validated(caller, ENTITY, &payload)?;

        let status = SiteStatus::from_str(&payload.status).unwrap_or(SiteStatus::Active);
        let now = now_utc();
        let mut row = Map::new();
        row.insert("id".into(), json!(Uuid::new_v4()));
        row.insert("codigo".into(), json!(payload.code));
        row.insert("nome".into(), json!(payload.name));
        row.insert("local".into(), json!(payload.location));
        row.insert("cidade".into(), json!(payload.city));
        row.insert("uf".into(), json!(payload.state));
        row.insert("status".into(), json!(status.as_str()));
        row.insert("created_at".into(), json!(now));
        row.insert("updated_at".into(), json!(now));

        let created = self.repo.create(caller, row).await?;
        tracing::info!(id = %created.id, codigo = %created.code, "obra criada");

        let event = AuditEvent::new(AuditAction::Create, ENTITY)
            .entity_id(created.id)
            .after(&created);
        self.audit.spawn(Some(caller.id()), &caller.request, event);
        Ok(created)
    }

    pub async fn update(&self, caller: &Caller, id: Uuid, mut payload: UpdateSitePayload) -> Result<Site, AppError> {
        payload.code = payload.code.map(|c| c.trim().to_string());
        payload.name = payload.name.map(|n| n.trim().to_string());
        payload.state = upper_trimmed(payload.state);
        self.audit.validated(caller, ENTITY, &payload)?;

        let before = self
            .repo
            .find_by_id(caller, id)
            .await?
            .ok_or_else(|| AppError::NotFound { entity: ENTITY, id: id.to_string() })?;

        let mut patch = to_row(&payload);
        if let Some(status) = payload.status.as_deref().and_then(|s| SiteStatus::from_str(s).ok()) {
            patch.insert("status".into(), json!(status.as_str()));
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

    pub async fn has_dependencies(&self, caller: &Caller, id: Uuid) -> Result<bool, AppError> {
        if self.measurements.count_live_by(caller, "obra_id", id).await? > 0 {
            return Ok(true);
        }
        Ok(self.assignments.count_active_by(caller, "obra_id", id).await? > 0)
    }

    /// Inativa a obra (status INATIVA + deleted_at), se nada depender dela.
    pub async fn soft_delete(&self, caller: &Caller, id: Uuid) -> Result<Site, AppError> {
        if self.has_dependencies(caller, id).await? {
            tracing::warn!(%id, "inativação de obra bloqueada por dependências");
            return Err(AppError::Integrity { entity: ENTITY, id });
        }

        let now = now_utc();
        let mut patch = Map::new();
        patch.insert("status".into(), json!(SiteStatus::Inactive.as_str()));
        patch.insert("deleted_at".into(), json!(now));
        patch.insert("updated_at".into(), json!(now));

        let removed = self.repo.update(caller, id, patch).await?;
        let event = AuditEvent::new(AuditAction::Inativar, ENTITY)
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
        if reach.site_ids.is_empty() {
            return Ok(0);
        }
        self.repo.count(caller, Some(&reach.site_ids)).await
    }
}
