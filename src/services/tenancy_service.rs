// src/services/tenancy_service.rs

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard},
    time::Duration,
};

use futures::future::{BoxFuture, FutureExt, Shared};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::{
        backend::QueryBackend,
        query::Query,
        schema::PROFILE,
    },
    models::{
        auth::Identity,
        tenancy::{Role, TenantContext},
    },
};

type Lookup = Shared<BoxFuture<'static, Result<TenantContext, AppError>>>;

enum Entry {
    // A geração identifica a consulta; um reset no meio do caminho a invalida.
    Pending { generation: u64, lookup: Lookup },
    Ready(TenantContext),
}

#[derive(Default)]
struct ResolverState {
    entries: HashMap<Uuid, Entry>,
    next_generation: u64,
}

/// Resolve (e guarda) a organização e o papel de cada identidade.
/// Chamadas concorrentes para a mesma identidade compartilham uma única consulta.
#[derive(Clone)]
pub struct TenantResolver {
    backend: Arc<dyn QueryBackend>,
    state: Arc<Mutex<ResolverState>>,
    timeout: Duration,
}

#[derive(Deserialize)]
struct ProfileTenant {
    #[serde(alias = "org_id", default)]
    organization_id: Option<Uuid>,
    #[serde(default)]
    role: Role,
}

impl TenantResolver {
    pub fn new(backend: Arc<dyn QueryBackend>, timeout: Duration) -> Self {
        Self {
            backend,
            state: Arc::new(Mutex::new(ResolverState::default())),
            timeout,
        }
    }

    fn lock(&self) -> MutexGuard<'_, ResolverState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub async fn resolve(&self, identity: Option<&Identity>) -> Result<TenantContext, AppError> {
        let identity_id = identity.ok_or(AppError::Unauthenticated)?.id;

        let (generation, lookup) = {
            let mut state = self.lock();
            match state.entries.get(&identity_id) {
                Some(Entry::Ready(context)) => return Ok(*context),
                Some(Entry::Pending { generation, lookup }) => (*generation, lookup.clone()),
                None => {
                    state.next_generation += 1;
                    let generation = state.next_generation;
                    let lookup = lookup_context(self.backend.clone(), identity_id, self.timeout)
                        .boxed()
                        .shared();
                    state.entries.insert(
                        identity_id,
                        Entry::Pending { generation, lookup: lookup.clone() },
                    );
                    (generation, lookup)
                }
            }
        };

        let result = lookup.await;

        let mut state = self.lock();
        let still_current = matches!(
            state.entries.get(&identity_id),
            Some(Entry::Pending { generation: g, .. }) if *g == generation
        );
        if still_current {
            match &result {
                Ok(context) => {
                    state.entries.insert(identity_id, Entry::Ready(*context));
                }
                Err(e) => {
                    tracing::warn!(%identity_id, "resolução de organização falhou: {}", e);
                    state.entries.remove(&identity_id);
                }
            }
        }
        result
    }

    /// Valor já resolvido, sem I/O.
    pub fn cached(&self, identity_id: Uuid) -> Option<TenantContext> {
        match self.lock().entries.get(&identity_id) {
            Some(Entry::Ready(context)) => Some(*context),
            _ => None,
        }
    }

    // Logout
    pub fn reset(&self, identity_id: Uuid) {
        self.lock().entries.remove(&identity_id);
    }

    pub fn reset_all(&self) {
        self.lock().entries.clear();
    }
}

async fn lookup_context(
    backend: Arc<dyn QueryBackend>,
    identity_id: Uuid,
    timeout: Duration,
) -> Result<TenantContext, AppError> {
    let query = Query::from_schema(&PROFILE)
        .select(&["organization_id", "role"])
        .eq("id", identity_id.to_string())
        .limit(1);

    let rows = match run(backend.as_ref(), &query, timeout).await {
        Err(AppError::SchemaMismatch(e)) => {
            let legacy = query.legacy().ok_or(AppError::SchemaMismatch(e))?;
            tracing::warn!(%identity_id, "profiles sem organization_id, usando org_id");
            run(backend.as_ref(), &legacy, timeout).await?
        }
        other => other?,
    };

    let profile = match rows.into_iter().next() {
        Some(row) => serde_json::from_value::<ProfileTenant>(row)
            .map_err(|e| AppError::InvalidInput(format!("perfil inválido: {e}")))?,
        None => ProfileTenant { organization_id: None, role: Role::User },
    };

    let context = TenantContext {
        organization_id: profile.organization_id,
        role: profile.role,
    };

    match context.organization_id {
        None if !context.is_admin() => return Err(AppError::MissingOrganization),
        None => {}
        Some(org_id) => {
            tokio::time::timeout(timeout, backend.set_current_org(org_id))
                .await
                .map_err(|_| AppError::Timeout {
                    context: "rpc.set_current_org".into(),
                    after_ms: timeout.as_millis() as u64,
                })??;
        }
    }

    Ok(context)
}

async fn run(
    backend: &dyn QueryBackend,
    query: &Query,
    timeout: Duration,
) -> Result<Vec<serde_json::Value>, AppError> {
    match tokio::time::timeout(timeout, backend.execute(query)).await {
        Ok(result) => result.map_err(AppError::from_backend),
        Err(_) => Err(AppError::Timeout {
            context: "profiles.tenant".into(),
            after_ms: timeout.as_millis() as u64,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{memory_backend::MemoryBackend, query::BackendError};
    use serde_json::json;

    fn identity() -> Identity {
        Identity { id: Uuid::new_v4(), email: Some("u@medlux.com.br".into()) }
    }

    fn resolver(backend: &Arc<MemoryBackend>) -> TenantResolver {
        TenantResolver::new(backend.clone(), Duration::from_millis(500))
    }

    #[tokio::test]
    async fn no_identity_is_unauthenticated() {
        let backend = MemoryBackend::new();
        let result = resolver(&backend).resolve(None).await;
        assert!(matches!(result, Err(AppError::Unauthenticated)));
        assert_eq!(backend.calls("profiles"), 0);
    }

    #[tokio::test]
    async fn concurrent_calls_share_one_lookup() {
        let backend = MemoryBackend::new();
        let user = identity();
        let org = Uuid::new_v4();
        backend.seed("profiles", json!({ "id": user.id, "role": "USER", "organization_id": org }));
        backend.set_delay("profiles", Duration::from_millis(50));

        let resolver = resolver(&backend);
        let calls = (0..10).map(|_| {
            let resolver = resolver.clone();
            let user = user.clone();
            async move { resolver.resolve(Some(&user)).await }
        });
        let results = futures::future::join_all(calls).await;

        for result in results {
            assert_eq!(result.unwrap().organization_id, Some(org));
        }
        assert_eq!(backend.calls("profiles"), 1);
        assert_eq!(backend.rpc_calls(), vec![org]);

        // Já em cache: nenhuma consulta nova
        resolver.resolve(Some(&user)).await.unwrap();
        assert_eq!(backend.calls("profiles"), 1);
        assert_eq!(resolver.cached(user.id).and_then(|c| c.organization_id), Some(org));
    }

    #[tokio::test]
    async fn user_without_organization_is_refused_and_not_cached() {
        let backend = MemoryBackend::new();
        let user = identity();
        backend.seed("profiles", json!({ "id": user.id, "role": "USER", "organization_id": null }));

        let resolver = resolver(&backend);
        assert!(matches!(resolver.resolve(Some(&user)).await, Err(AppError::MissingOrganization)));
        assert!(resolver.cached(user.id).is_none());

        // O erro não fica em cache: a próxima chamada consulta de novo
        let _ = resolver.resolve(Some(&user)).await;
        assert_eq!(backend.calls("profiles"), 2);
    }

    #[tokio::test]
    async fn admin_without_organization_gets_global_view() {
        let backend = MemoryBackend::new();
        let admin = identity();
        backend.seed("profiles", json!({ "id": admin.id, "role": "admin" }));

        let context = resolver(&backend).resolve(Some(&admin)).await.unwrap();
        assert!(context.is_admin());
        assert_eq!(context.organization_id, None);
        assert!(backend.rpc_calls().is_empty());
    }

    #[tokio::test]
    async fn missing_profile_row_means_user_without_org() {
        let backend = MemoryBackend::new();
        let result = resolver(&backend).resolve(Some(&identity())).await;
        assert!(matches!(result, Err(AppError::MissingOrganization)));
    }

    #[tokio::test]
    async fn legacy_profiles_resolve_through_org_id() {
        let backend = MemoryBackend::new();
        backend.use_legacy_schema(&PROFILE);
        let user = identity();
        let org = Uuid::new_v4();
        backend.seed("profiles", json!({ "id": user.id, "role": "USER", "org_id": org }));

        let context = resolver(&backend).resolve(Some(&user)).await.unwrap();
        assert_eq!(context.organization_id, Some(org));
        assert_eq!(backend.calls("profiles"), 2);
    }

    #[tokio::test]
    async fn rpc_failure_fails_the_resolution() {
        let backend = MemoryBackend::new();
        let user = identity();
        backend.seed("profiles", json!({ "id": user.id, "role": "USER", "organization_id": Uuid::new_v4() }));
        backend.fail_rpc(BackendError::new(Some("42883"), Some(404), "function set_current_org does not exist"));

        let resolver = resolver(&backend);
        assert!(resolver.resolve(Some(&user)).await.is_err());
        assert!(resolver.cached(user.id).is_none());
    }

    #[tokio::test]
    async fn reset_during_flight_wins() {
        let backend = MemoryBackend::new();
        let user = identity();
        backend.seed("profiles", json!({ "id": user.id, "role": "USER", "organization_id": Uuid::new_v4() }));
        backend.set_delay("profiles", Duration::from_millis(50));

        let resolver = resolver(&backend);
        let in_flight = {
            let resolver = resolver.clone();
            let user = user.clone();
            tokio::spawn(async move { resolver.resolve(Some(&user)).await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        resolver.reset(user.id);

        assert!(in_flight.await.unwrap().is_ok());
        assert!(resolver.cached(user.id).is_none());
    }

    #[tokio::test]
    async fn reset_all_clears_every_identity() {
        let backend = MemoryBackend::new();
        let (a, b) = (identity(), identity());
        for user in [&a, &b] {
            backend.seed("profiles", json!({ "id": user.id, "role": "USER", "organization_id": Uuid::new_v4() }));
        }

        let resolver = resolver(&backend);
        resolver.resolve(Some(&a)).await.unwrap();
        resolver.resolve(Some(&b)).await.unwrap();
        resolver.reset_all();

        assert!(resolver.cached(a.id).is_none());
        assert!(resolver.cached(b.id).is_none());
        resolver.resolve(Some(&a)).await.unwrap();
        assert_eq!(backend.calls("profiles"), 3);
    }

    #[tokio::test]
    async fn lookup_timeout_is_classified() {
        let backend = MemoryBackend::new();
        let user = identity();
        backend.set_delay("profiles", Duration::from_millis(200));

        let resolver = TenantResolver::new(backend.clone(), Duration::from_millis(20));
        assert!(matches!(resolver.resolve(Some(&user)).await, Err(AppError::Timeout { .. })));
    }
}
