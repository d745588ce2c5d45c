// src/db/profile_repo.rs

use serde_json::{json, Map, Value};
use uuid::Uuid;

use crate::{
    common::{datetime::now_utc, error::AppError},
    db::{
        guard::QueryGuard,
        query::{Direction, Query},
        schema::{ASSIGNMENT, ORGANIZATIONS_TABLE, PROFILE},
    },
    models::{
        auth::Caller,
        profile::Profile,
        tenancy::Organization,
    },
};

#[derive(Clone)]
pub struct ProfileRepository {
    guard: QueryGuard,
}

impl ProfileRepository {
    pub fn new(guard: QueryGuard) -> Self {
        Self { guard }
    }

    /// Perfil do próprio chamador, lido antes de existir contexto de organização.
    pub async fn find_own(&self, caller: &Caller) -> Result<Option<Profile>, AppError> {
        let query = Query::from_schema(&PROFILE).eq("id", caller.id().to_string()).limit(1);
        self.guard.run(caller, "profiles.get_own", query).unscoped().fetch_optional().await
    }

    /// Grava (insere ou completa) o próprio perfil. A organização vem do bootstrap, não do cliente.
    pub async fn upsert_own(&self, caller: &Caller, row: Map<String, Value>) -> Result<Profile, AppError> {
        let query = Query::from_schema(&PROFILE).upsert(row);
        self.guard.run(caller, "profiles.upsert", query).unscoped().fetch_one().await
    }

    pub async fn find_by_id(&self, caller: &Caller, id: Uuid) -> Result<Option<Profile>, AppError> {
        let query = Query::from_schema(&PROFILE).eq("id", id.to_string()).limit(1);
        self.guard.run(caller, "profiles.get", query).fetch_optional().await
    }

    pub async fn list(&self, caller: &Caller) -> Result<Vec<Profile>, AppError> {
        let query = Query::from_schema(&PROFILE).order(PROFILE.recency_column, Direction::Desc);
        self.guard.run(caller, "profiles.list", query).fetch_all().await
    }

    /// Troca explícita de organização. Sem escopo: a coluna de organização é o próprio alvo.
    pub async fn set_organization(
        &self,
        caller: &Caller,
        id: Uuid,
        organization_id: Uuid,
    ) -> Result<Profile, AppError> {
        let mut patch = Map::new();
        patch.insert(PROFILE.tenant_column.into(), json!(organization_id));
        patch.insert("updated_at".into(), json!(now_utc()));
        let query = Query::from_schema(&PROFILE).update(patch).eq("id", id.to_string());
        self.guard.run(caller, "profiles.reassign", query).unscoped().fetch_one().await
    }

    pub async fn organizations(&self, caller: &Caller) -> Result<Vec<Organization>, AppError> {
        let query = Query::table(ORGANIZATIONS_TABLE).select(&["id", "nome"]).limit(20);
        self.guard.run(caller, "organizations.list", query).unscoped().fetch_all().await
    }

    /// Algum vínculo (qualquer status) aponta para o usuário?
    pub async fn has_assignments(&self, caller: &Caller, user_id: Uuid) -> Result<bool, AppError> {
        let query = Query::from_schema(&ASSIGNMENT)
            .select(&["id"])
            .eq("user_id", user_id.to_string())
            .limit(1);
        let rows = self.guard.run(caller, "profiles.dep.vinculos", query).execute().await?;
        Ok(rows > 0)
    }
}
