// src/services/profile_service.rs

use serde_json::{json, Map};
use uuid::Uuid;

use crate::{
    common::{datetime::now_utc, error::AppError},
    db::{guard::QueryGuard, profile_repo::ProfileRepository},
    models::{
        audit::{AuditAction, AuditEvent},
        auth::Caller,
        profile::{MeResponse, Profile},
        tenancy::Role,
    },
    services::{audit_service::AuditRecorder, tenancy_service::TenantResolver},
};

const ENTITY: &str = "profiles";

#[derive(Clone)]
pub struct ProfileService {
    repo: ProfileRepository,
    resolver: TenantResolver,
    audit: AuditRecorder,
    default_org_name: Option<String>,
}

fn email_prefix(email: &str) -> &str {
    email.split('@').next().unwrap_or_default()
}

impl ProfileService {
    pub fn new(guard: QueryGuard, default_org_name: Option<String>) -> Self {
        Self {
            repo: ProfileRepository::new(guard.clone()),
            resolver: guard.resolver().clone(),
            audit: guard.audit().clone(),
            default_org_name: default_org_name.filter(|n| !n.trim().is_empty()),
        }
    }

    async fn require_admin(&self, caller: &Caller) -> Result<(), AppError> {
        let tenant = self.resolver.resolve(Some(&caller.identity)).await?;
        if !tenant.is_admin() {
            return Err(AppError::Forbidden("operação exclusiva de ADMIN".into()));
        }
        Ok(())
    }

    /// Organização padrão para perfis novos: a que casa com o nome configurado, senão a primeira.
    /// Falhas aqui não impedem o login; o perfil só fica sem organização.
    async fn default_organization(&self, caller: &Caller) -> Option<Uuid> {
        let organizations = match self.repo.organizations(caller).await {
            Ok(list) => list,
            Err(e) => {
                tracing::warn!("não foi possível resolver a organização padrão: {}", e);
                return None;
            }
        };

        let preferred = self.default_org_name.as_deref().map(str::to_lowercase);
        let by_name = preferred.and_then(|name| {
            organizations
                .iter()
                .find(|org| org.nome.as_deref().is_some_and(|n| n.to_lowercase().contains(&name)))
        });
        by_name.or(organizations.first()).map(|org| org.id)
    }

    /// Garante o perfil do chamador: cria no primeiro login e completa linhas incompletas.
    pub async fn ensure_profile(&self, caller: &Caller) -> Result<Profile, AppError> {
        let existing = self.repo.find_own(caller).await?;

        let email = existing
            .as_ref()
            .and_then(|p| p.email.clone())
            .or_else(|| caller.identity.email.clone())
            .unwrap_or_default();
        let name = existing
            .as_ref()
            .and_then(|p| p.name.clone())
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| match email_prefix(&email) {
                "" => "Usuário".to_string(),
                prefix => prefix.to_string(),
            });
        let role = existing.as_ref().map(|p| p.role).unwrap_or(Role::User);

        let mut organization_id = existing.as_ref().and_then(|p| p.organization_id);
        if organization_id.is_none() {
            organization_id = self.default_organization(caller).await;
            if organization_id.is_none() {
                tracing::warn!(user_id = %caller.id(), "perfil sem organização; multi-tenant bloqueado para este usuário");
            }
        }

        let incomplete = match &existing {
            None => true,
            Some(p) => {
                p.email.is_none()
                    || p.name.as_deref().is_none_or(|n| n.trim().is_empty())
                    || (p.organization_id.is_none() && organization_id.is_some())
            }
        };
        if let (Some(profile), false) = (&existing, incomplete) {
            return Ok(profile.clone());
        }

        let now = now_utc();
        let mut row = Map::new();
        row.insert("id".into(), json!(caller.id()));
        row.insert("email".into(), json!(email));
        row.insert("nome".into(), json!(name));
        row.insert("role".into(), json!(role));
        row.insert("organization_id".into(), json!(organization_id));
        row.insert("updated_at".into(), json!(now));
        if existing.is_none() {
            row.insert("created_at".into(), json!(now));
        }

        let profile = self.repo.upsert_own(caller, row).await?;
        // A resolução anterior (se houver) pode ter visto o perfil sem organização.
        self.resolver.reset(caller.id());
        if existing.is_none() {
            tracing::info!(user_id = %caller.id(), "perfil criado no primeiro login");
        }
        Ok(profile)
    }

    pub async fn me(&self, caller: &Caller) -> Result<MeResponse, AppError> {
        let profile = self.ensure_profile(caller).await?;
        let tenant = self.resolver.resolve(Some(&caller.identity)).await?;
        Ok(MeResponse { profile, tenant })
    }

    /// Esquece o contexto resolvido do chamador.
    pub async fn sign_out(&self, caller: &Caller) {
        self.audit
            .record(Some(caller.id()), &caller.request, AuditEvent::new(AuditAction::Logout, "auth"))
            .await;
        self.resolver.reset(caller.id());
    }

    pub async fn list(&self, caller: &Caller) -> Result<Vec<Profile>, AppError> {
        self.require_admin(caller).await?;
        self.repo.list(caller).await
    }

    /// Troca explícita de organização (a única forma de alterar uma organização já definida).
    pub async fn reassign_organization(
        &self,
        caller: &Caller,
        id: Uuid,
        organization_id: Uuid,
    ) -> Result<Profile, AppError> {
        self.require_admin(caller).await?;
        let before = self
            .repo
            .find_by_id(caller, id)
            .await?
            .ok_or_else(|| AppError::NotFound { entity: ENTITY, id: id.to_string() })?;

        let updated = self.repo.set_organization(caller, id, organization_id).await?;
        self.resolver.reset(id);

        let event = AuditEvent::new(AuditAction::Reassign, ENTITY)
            .entity_id(id)
            .before(&before)
            .after(&updated)
            .details(json!({ "from": before.organization_id, "to": organization_id }));
        self.audit.spawn(Some(caller.id()), &caller.request, event);
        Ok(updated)
    }

    /// Algum vínculo (qualquer status) referencia o usuário?
    pub async fn has_user_dependencies(&self, caller: &Caller, user_id: Uuid) -> Result<bool, AppError> {
        self.repo.has_assignments(caller, user_id).await
    }
}
