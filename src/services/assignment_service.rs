// src/services/assignment_service.rs

use std::{collections::HashMap, str::FromStr, sync::Arc};

use serde_json::{json, Map};
use uuid::Uuid;

use crate::{
    common::{
        datetime::{days_since, now_utc},
        diagnostics::Diagnostics,
        error::AppError,
    },
    db::{
        assignment_repo::AssignmentRepository,
        backend::BlobStorage,
        equipment_repo::EquipmentRepository,
        guard::QueryGuard,
        query::{to_row, Query},
        schema::ASSIGNMENT,
        site_repo::SiteRepository,
    },
    models::{
        assignment::{
            Assignment, AssignmentFilters, AssignmentStatus, AssignmentView, CreateAssignmentPayload,
            DocumentUrl, RefSummary, UpdateAssignmentPayload,
        },
        audit::{AuditAction, AuditEvent},
        auth::Caller,
    },
    services::{audit_service::AuditRecorder, tenancy_service::TenantResolver},
};

const ENTITY: &str = "vinculos";
const SIGNED_URL_TTL_SECS: u64 = 600;

#[derive(Clone)]
pub struct AssignmentService {
    repo: AssignmentRepository,
    equipment: EquipmentRepository,
    sites: SiteRepository,
    guard: QueryGuard,
    resolver: TenantResolver,
    audit: AuditRecorder,
    diagnostics: Arc<Diagnostics>,
    storage: Arc<dyn BlobStorage>,
}

/// Caminho do termo no storage: `termos/{obra}/{equipamento}/{millis}_{nome}`.
pub fn document_path(site_code: &str, equipment_code: &str, millis: i64, file_name: &str) -> String {
    let safe_name = file_name.split_whitespace().collect::<Vec<_>>().join("_");
    format!("termos/{site_code}/{equipment_code}/{millis}_{safe_name}")
}

impl AssignmentService {
    pub fn new(guard: QueryGuard, storage: Arc<dyn BlobStorage>) -> Self {
        Self {
            repo: AssignmentRepository::new(guard.clone()),
            equipment: EquipmentRepository::new(guard.clone()),
            sites: SiteRepository::new(guard.clone()),
            resolver: guard.resolver().clone(),
            audit: guard.audit().clone(),
            diagnostics: guard.diagnostics().clone(),
            guard,
            storage,
        }
    }

    async fn get(&self, caller: &Caller, id: Uuid) -> Result<Assignment, AppError> {
        self.repo
            .find_by_id(caller, id)
            .await?
            .filter(|a| a.deleted_at.is_none())
            .ok_or_else(|| AppError::NotFound { entity: ENTITY, id: id.to_string() })
    }

    // Outro vínculo ATIVO para o mesmo equipamento (excluindo `except`)?
    async fn ensure_no_other_active(
        &self,
        caller: &Caller,
        equipment_id: Uuid,
        except: Option<Uuid>,
    ) -> Result<(), AppError> {
        let active = self.repo.active_for_equipment(caller, equipment_id, except).await?;
        if !active.is_empty() {
            return Err(AppError::DuplicateActiveAssignment { equipment_id });
        }
        Ok(())
    }

    // =========================================================================
    //  LISTAGEM
    // =========================================================================

    /// Vínculos com código/nome de equipamento e obra e os dias com o usuário.
    /// USER só enxerga os próprios.
    pub async fn list(&self, caller: &Caller, filters: &AssignmentFilters) -> Result<Vec<AssignmentView>, AppError> {
        let tenant = self.resolver.resolve(Some(&caller.identity)).await?;
        let include_deleted = filters.include_deleted && tenant.is_admin();
        let only_user = (!tenant.is_admin()).then(|| caller.id());

        let rows = self.repo.list(caller, filters, include_deleted, only_user).await?;
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let mut equipment_ids: Vec<Uuid> = rows.iter().map(|a| a.equipment_id).collect();
        equipment_ids.sort();
        equipment_ids.dedup();
        let mut site_ids: Vec<Uuid> = rows.iter().filter_map(|a| a.site_id).collect();
        site_ids.sort();
        site_ids.dedup();

        let equipment: HashMap<Uuid, RefSummary> = self
            .equipment
            .list(caller, true, Some(&equipment_ids))
            .await?
            .into_iter()
            .map(|e| (e.id, RefSummary { id: e.id, codigo: e.code, nome: e.name }))
            .collect();
        let sites: HashMap<Uuid, RefSummary> = if site_ids.is_empty() {
            HashMap::new()
        } else {
            self.sites
                .list(caller, true, Some(&site_ids))
                .await?
                .into_iter()
                .map(|s| (s.id, RefSummary { id: s.id, codigo: s.code, nome: s.name }))
                .collect()
        };

        let now = now_utc();
        Ok(rows
            .into_iter()
            .map(|assignment| {
                // Entrega: início do vínculo, ou a criação do registro
                let delivered = assignment.started_at.or(assignment.created_at);
                AssignmentView {
                    equipment: equipment.get(&assignment.equipment_id).cloned(),
                    site: assignment.site_id.and_then(|id| sites.get(&id).cloned()),
                    days_with_user: delivered.map(|since| days_since(since, now)),
                    assignment,
                }
            })
            .collect())
    }

    // =========================================================================
    //  ESCRITA
    // =========================================================================

    pub async fn create(&self, caller: &Caller, mut payload: CreateAssignmentPayload) -> Result<Assignment, AppError> {
        payload.status = payload.status.trim().to_uppercase();
        self.audit.validated(caller, ENTITY, &payload)?;

        let status = AssignmentStatus::from_str(&payload.status).unwrap_or(AssignmentStatus::Active);
        let (Some(equipment_id), Some(user_id)) = (payload.equipment_id, payload.user_id) else {
            return Err(AppError::InvalidInput("equipamento_id e user_id são obrigatórios.".into()));
        };

        if status == AssignmentStatus::Active {
            self.ensure_no_other_active(caller, equipment_id, None).await?;
        }

        let now = now_utc();
        let mut row = Map::new();
        row.insert("id".into(), json!(Uuid::new_v4()));
        row.insert("equipamento_id".into(), json!(equipment_id));
        row.insert("obra_id".into(), json!(payload.site_id));
        row.insert("user_id".into(), json!(user_id));
        row.insert("inicio_em".into(), json!(payload.started_at));
        row.insert("status".into(), json!(status.as_str()));
        row.insert("created_at".into(), json!(now));
        row.insert("updated_at".into(), json!(now));

        let created = self.repo.create(caller, equipment_id, row).await?;
        tracing::info!(id = %created.id, %equipment_id, "vínculo criado");

        let event = AuditEvent::new(AuditAction::Create, ENTITY)
            .entity_id(created.id)
            .after(&created)
            .details(json!({ "equipamento_id": equipment_id, "status": status }));
        self.audit.spawn(Some(caller.id()), &caller.request, event);
        Ok(created)
    }

    pub async fn update(
        &self,
        caller: &Caller,
        id: Uuid,
        mut payload: UpdateAssignmentPayload,
    ) -> Result<Assignment, AppError> {
        payload.status = payload.status.map(|s| s.trim().to_uppercase());
        self.audit.validated(caller, ENTITY, &payload)?;

        let before = self.get(caller, id).await?;
        let equipment_id = payload.equipment_id.unwrap_or(before.equipment_id);
        let status = payload
            .status
            .as_deref()
            .and_then(|s| AssignmentStatus::from_str(s).ok())
            .unwrap_or(before.status);

        if before.status == AssignmentStatus::Ended && status == AssignmentStatus::Active {
            return Err(AppError::InvalidState("Vínculo encerrado não pode ser reativado.".into()));
        }
        // Encerrar exige data, autor e motivo: só pelo `end`.
        if before.status == AssignmentStatus::Active && status == AssignmentStatus::Ended {
            return Err(AppError::InvalidState("Use o encerramento do vínculo para encerrá-lo.".into()));
        }
        if status == AssignmentStatus::Active {
            self.ensure_no_other_active(caller, equipment_id, Some(id)).await?;
        }

        let mut patch = to_row(&payload);
        patch.insert("updated_at".into(), json!(now_utc()));

        let updated = self.repo.update(caller, id, equipment_id, patch).await?;
        let event = AuditEvent::new(AuditAction::Update, ENTITY)
            .entity_id(id)
            .before(&before)
            .after(&updated)
            .details(json!({ "equipamento_id": equipment_id, "status": updated.status }));
        self.audit.spawn(Some(caller.id()), &caller.request, event);
        Ok(updated)
    }

    /// Encerra o vínculo: terminal, ATIVO → ENCERRADO uma única vez.
    pub async fn end(&self, caller: &Caller, id: Uuid, reason: Option<String>) -> Result<Assignment, AppError> {
        let before = self.get(caller, id).await?;
        if before.status == AssignmentStatus::Ended {
            return Err(AppError::InvalidState("Vínculo já encerrado.".into()));
        }

        let reason = reason.map(|r| r.trim().to_string()).filter(|r| !r.is_empty());
        let now = now_utc();
        let mut patch = Map::new();
        patch.insert("encerrou_em".into(), json!(now));
        patch.insert("status".into(), json!(AssignmentStatus::Ended.as_str()));
        patch.insert("motivo_encerramento".into(), json!(reason));
        patch.insert("encerrado_por".into(), json!(caller.id()));
        patch.insert("updated_at".into(), json!(now));

        let ended = self.repo.update(caller, id, before.equipment_id, patch).await?;
        let event = AuditEvent::new(AuditAction::Encerrar, ENTITY)
            .entity_id(id)
            .before(&before)
            .after(&ended)
            .details(json!({ "motivo": reason.unwrap_or_default() }));
        self.audit.spawn(Some(caller.id()), &caller.request, event);
        Ok(ended)
    }

    /// Remoção lógica (deleted_at); bancos antigos sem a coluna removem a linha.
    pub async fn soft_delete(&self, caller: &Caller, id: Uuid) -> Result<(), AppError> {
        let before = self.get(caller, id).await?;

        let now = now_utc();
        let mut patch = Map::new();
        patch.insert("deleted_at".into(), json!(now));
        patch.insert("updated_at".into(), json!(now));
        let soft = Query::from_schema(&ASSIGNMENT)
            .select(&["id"])
            .update(patch)
            .eq("id", id.to_string());
        let hard = Query::from_schema(&ASSIGNMENT).delete().eq("id", id.to_string());

        let affected = self
            .guard
            .run(caller, "vinculos.delete", soft)
            .or_fallback(hard)
            .execute()
            .await?;
        if affected == 0 {
            return Err(AppError::NotFound { entity: ENTITY, id: id.to_string() });
        }

        let event = AuditEvent::new(AuditAction::Delete, ENTITY)
            .entity_id(id)
            .before(&before)
            .details(json!({ "mode": "soft_delete" }));
        self.audit.spawn(Some(caller.id()), &caller.request, event);
        Ok(())
    }

    // =========================================================================
    //  TERMO
    // =========================================================================

    pub async fn upload_document(
        &self,
        caller: &Caller,
        id: Uuid,
        file_name: &str,
        bytes: &[u8],
    ) -> Result<Assignment, AppError> {
        let file_name = file_name.trim();
        if file_name.is_empty() || bytes.is_empty() {
            return Err(AppError::InvalidInput("Arquivo do termo vazio ou sem nome.".into()));
        }
        let assignment = self.get(caller, id).await?;

        let equipment_code = self
            .equipment
            .find_by_id(caller, assignment.equipment_id)
            .await?
            .map(|e| e.code)
            .unwrap_or_else(|| "equip".to_string());
        let site_code = match assignment.site_id {
            Some(site_id) => self.sites.find_by_id(caller, site_id).await?.map(|s| s.code),
            None => None,
        }
        .unwrap_or_else(|| "obra".to_string());

        let path = document_path(&site_code, &equipment_code, now_utc().timestamp_millis(), file_name);
        if let Err(e) = self.storage.upload(&path, bytes).await {
            self.diagnostics.add_error(
                "storage.uploadTermo",
                &e.to_string(),
                e.code.as_deref(),
                Some(&caller.request.correlation_id),
            );
            return Err(AppError::from_backend(e));
        }

        let mut patch = Map::new();
        patch.insert("termo_url".into(), json!(path));
        patch.insert("termo_nome".into(), json!(file_name));
        patch.insert("updated_at".into(), json!(now_utc()));
        let updated = self.repo.update(caller, id, assignment.equipment_id, patch).await?;

        let event = AuditEvent::new(AuditAction::Upload, ENTITY)
            .entity_id(id)
            .details(json!({ "termo_url": path, "termo_nome": file_name, "size": bytes.len() }));
        self.audit.spawn(Some(caller.id()), &caller.request, event);
        Ok(updated)
    }

    /// URL assinada (600 s); sem assinatura disponível, a URL pública.
    pub async fn document_url(&self, caller: &Caller, id: Uuid) -> Result<DocumentUrl, AppError> {
        let assignment = self.get(caller, id).await?;
        let path = assignment
            .document_path
            .ok_or_else(|| AppError::NotFound { entity: "termo", id: id.to_string() })?;

        match self.storage.create_signed_url(&path, SIGNED_URL_TTL_SECS).await {
            Ok(url) => Ok(DocumentUrl { url, signed: true }),
            Err(e) => {
                tracing::warn!(%path, "falha ao assinar URL do termo: {}", e);
                self.diagnostics.add_error(
                    &format!("storage.signedUrl:{path}"),
                    &e.to_string(),
                    e.code.as_deref(),
                    Some(&caller.request.correlation_id),
                );
                Ok(DocumentUrl { url: self.storage.public_url(&path), signed: false })
            }
        }
    }

    pub async fn count_active(&self, caller: &Caller) -> Result<i64, AppError> {
        let tenant = self.resolver.resolve(Some(&caller.identity)).await?;
        let only_user = (!tenant.is_admin()).then(|| caller.id());
        self.repo.count_active(caller, only_user).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{
        memory_backend::MemoryBlobStorage,
        test_support::{caller_in, fixture, settle, Fixture},
    };
    use std::time::Duration;

    fn service(f: &Fixture) -> (AssignmentService, Arc<MemoryBlobStorage>) {
        let storage = MemoryBlobStorage::new();
        (AssignmentService::new(f.guard.clone(), storage.clone()), storage)
    }

    fn payload(equipment_id: Uuid, user_id: Uuid) -> CreateAssignmentPayload {
        serde_json::from_value(json!({
            "equipamento_id": equipment_id,
            "obra_id": Uuid::new_v4(),
            "user_id": user_id,
            "inicio_em": "2024-03-01T12:00:00Z"
        }))
        .unwrap()
    }

    #[test]
    fn document_path_replaces_whitespace() {
        assert_eq!(
            document_path("OB-1", "LX-01", 1700000000000, "termo de  entrega.pdf"),
            "termos/OB-1/LX-01/1700000000000_termo_de_entrega.pdf"
        );
    }

    #[tokio::test]
    async fn only_one_active_assignment_per_equipment() {
        let f = fixture(Duration::from_millis(500));
        let admin = caller_in(&f.backend, Some(Uuid::new_v4()), "ADMIN");
        let (service, _) = service(&f);
        let equipment_id = Uuid::new_v4();

        let first = service.create(&admin, payload(equipment_id, Uuid::new_v4())).await.unwrap();
        let second = service.create(&admin, payload(equipment_id, Uuid::new_v4())).await;
        assert!(matches!(second, Err(AppError::DuplicateActiveAssignment { equipment_id: e }) if e == equipment_id));
        assert_eq!(f.backend.rows("vinculos").len(), 1);

        // Atualizar o próprio vínculo ATIVO não conflita consigo mesmo
        let update = UpdateAssignmentPayload { status: Some("ativo".into()), ..Default::default() };
        service.update(&admin, first.id, update).await.unwrap();

        // Depois de encerrado, outro pode ser criado
        let ended = service.end(&admin, first.id, Some("devolvido".into())).await.unwrap();
        assert_eq!(ended.status, AssignmentStatus::Ended);
        assert_eq!(ended.ended_by, Some(admin.id()));
        assert!(ended.ended_at.is_some());
        service.create(&admin, payload(equipment_id, Uuid::new_v4())).await.unwrap();
    }

    #[tokio::test]
    async fn unique_index_violation_is_classified() {
        let f = fixture(Duration::from_millis(500));
        let org = Uuid::new_v4();
        let admin = caller_in(&f.backend, Some(org), "ADMIN");
        let (service, _) = service(&f);
        let equipment_id = Uuid::new_v4();
        let created = service.create(&admin, payload(equipment_id, Uuid::new_v4())).await.unwrap();

        // Simula a corrida: a checagem prévia não vê o vínculo, o índice sim
        let row = json!({ "id": Uuid::new_v4(), "equipamento_id": equipment_id, "user_id": Uuid::new_v4(), "status": "ATIVO" });
        let result = service.repo.create(&admin, equipment_id, to_row(&row)).await;
        assert!(matches!(result, Err(AppError::DuplicateActiveAssignment { .. })));
        assert!(f.backend.row("vinculos", created.id).is_some());
    }

    #[tokio::test]
    async fn ending_twice_is_refused() {
        let f = fixture(Duration::from_millis(500));
        let admin = caller_in(&f.backend, Some(Uuid::new_v4()), "ADMIN");
        let (service, _) = service(&f);
        let created = service.create(&admin, payload(Uuid::new_v4(), Uuid::new_v4())).await.unwrap();

        // Edição não encerra: o status continua ATIVO e sem data de encerramento
        let shortcut = UpdateAssignmentPayload { status: Some("encerrado".into()), ..Default::default() };
        assert!(matches!(service.update(&admin, created.id, shortcut).await, Err(AppError::InvalidState(_))));
        let row = f.backend.row("vinculos", created.id).unwrap();
        assert_eq!(row["status"], "ATIVO");
        assert!(row["encerrou_em"].is_null());

        service.end(&admin, created.id, None).await.unwrap();
        let again = service.end(&admin, created.id, Some("de novo".into())).await;
        assert!(matches!(again, Err(AppError::InvalidState(_))));
        assert_eq!(f.backend.row("vinculos", created.id).unwrap()["status"], "ENCERRADO");

        settle().await;
        let ends: Vec<_> = f
            .backend
            .rows("audit_log")
            .into_iter()
            .filter(|r| r["action"] == "ENCERRAR:vinculos")
            .collect();
        assert_eq!(ends.len(), 1);
        assert_eq!(ends[0]["payload"]["severity"], "WARN");
    }

    #[tokio::test]
    async fn user_lists_only_own_assignments_enriched() {
        let f = fixture(Duration::from_millis(500));
        let org = Uuid::new_v4();
        let admin = caller_in(&f.backend, Some(org), "ADMIN");
        let user = caller_in(&f.backend, Some(org), "USER");
        let (service, _) = service(&f);

        let equipment_id = Uuid::new_v4();
        f.backend.seed("equipamentos", json!({
            "id": equipment_id, "codigo": "LX-01", "nome": "Luxímetro", "status": "ATIVO", "organization_id": org
        }));
        service.create(&admin, payload(equipment_id, user.id())).await.unwrap();
        service.create(&admin, payload(Uuid::new_v4(), Uuid::new_v4())).await.unwrap();

        let mine = service.list(&user, &AssignmentFilters::default()).await.unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].assignment.user_id, user.id());
        assert_eq!(mine[0].equipment.as_ref().map(|e| e.codigo.as_str()), Some("LX-01"));
        assert!(mine[0].days_with_user.unwrap() > 0);

        assert_eq!(service.list(&admin, &AssignmentFilters::default()).await.unwrap().len(), 2);
        assert_eq!(service.count_active(&user).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn soft_delete_hides_and_include_deleted_is_admin_only() {
        let f = fixture(Duration::from_millis(500));
        let org = Uuid::new_v4();
        let admin = caller_in(&f.backend, Some(org), "ADMIN");
        let user = caller_in(&f.backend, Some(org), "USER");
        let (service, _) = service(&f);
        let created = service.create(&admin, payload(Uuid::new_v4(), user.id())).await.unwrap();

        service.soft_delete(&admin, created.id).await.unwrap();
        assert!(f.backend.row("vinculos", created.id).unwrap()["deleted_at"].is_string());

        let all = AssignmentFilters { include_deleted: true, ..Default::default() };
        assert_eq!(service.list(&admin, &all).await.unwrap().len(), 1);
        assert!(service.list(&user, &all).await.unwrap().is_empty());
        assert!(matches!(service.end(&admin, created.id, None).await, Err(AppError::NotFound { .. })));
    }

    #[tokio::test]
    async fn document_upload_and_url_fallback() {
        let f = fixture(Duration::from_millis(500));
        let org = Uuid::new_v4();
        let admin = caller_in(&f.backend, Some(org), "ADMIN");
        let (service, storage) = service(&f);
        let created = service.create(&admin, payload(Uuid::new_v4(), Uuid::new_v4())).await.unwrap();

        let updated = service.upload_document(&admin, created.id, "termo assinado.pdf", b"%PDF").await.unwrap();
        let path = updated.document_path.clone().unwrap();
        assert!(path.starts_with("termos/obra/equip/"));
        assert!(path.ends_with("_termo_assinado.pdf"));
        assert_eq!(updated.document_name.as_deref(), Some("termo assinado.pdf"));
        assert_eq!(storage.paths(), vec![path.clone()]);

        let signed = service.document_url(&admin, created.id).await.unwrap();
        assert!(signed.signed);
        assert!(signed.url.ends_with("expires_in=600"));

        storage.disable_signing();
        let public = service.document_url(&admin, created.id).await.unwrap();
        assert!(!public.signed);
        assert_eq!(public.url, format!("memory://public/{path}"));
        assert!(f.diagnostics.snapshot().errors.iter().any(|e| e.context.starts_with("storage.signedUrl:")));
    }
}
