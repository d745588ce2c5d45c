// src/db/test_support.rs
//
// Montagem compartilhada pelos testes: backend em memória + resolver + auditoria + guarda.

use std::{sync::Arc, time::Duration};

use serde_json::json;
use uuid::Uuid;

use crate::{
    common::diagnostics::Diagnostics,
    db::{guard::QueryGuard, memory_backend::MemoryBackend},
    models::auth::{Caller, Identity, RequestContext},
    services::{audit_service::AuditRecorder, tenancy_service::TenantResolver},
};

pub struct Fixture {
    pub backend: Arc<MemoryBackend>,
    pub guard: QueryGuard,
    pub diagnostics: Arc<Diagnostics>,
}

pub fn fixture(timeout: Duration) -> Fixture {
    let backend = MemoryBackend::new();
    let diagnostics = Arc::new(Diagnostics::default());
    let resolver = TenantResolver::new(backend.clone(), timeout);
    let audit = AuditRecorder::new(
        backend.clone(),
        resolver.clone(),
        diagnostics.clone(),
        "test".into(),
        timeout,
    );
    let guard = QueryGuard::new(backend.clone(), resolver, audit, diagnostics.clone(), timeout);
    Fixture { backend, guard, diagnostics }
}

/// Cria o perfil e devolve um chamador daquela organização/papel.
pub fn caller_in(backend: &MemoryBackend, org: Option<Uuid>, role: &str) -> Caller {
    let id = Uuid::new_v4();
    backend.seed("profiles", json!({ "id": id, "role": role, "organization_id": org }));
    Caller {
        identity: Identity { id, email: Some(format!("{id}@medlux.com.br")) },
        request: RequestContext {
            correlation_id: Uuid::new_v4().to_string(),
            route: "/test".into(),
        },
    }
}

/// Espera as tasks de auditoria destacadas terminarem.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(20)).await;
}
