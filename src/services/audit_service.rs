// src/services/audit_service.rs

use std::{sync::Arc, time::Duration};

use serde_json::{json, Map, Value};
use uuid::Uuid;
use validator::Validate;

use crate::{
    common::{datetime::now_utc, diagnostics::Diagnostics, error::AppError},
    db::{
        backend::QueryBackend,
        query::Query,
        schema::AUDIT_LOG,
    },
    models::{
        audit::{AuditAction, AuditEvent, Severity},
        auth::{Caller, RequestContext},
    },
    services::tenancy_service::TenantResolver,
};

const SENSITIVE_KEYS: [&str; 4] = ["password", "senha", "token", "secret"];

/// Remove, em qualquer profundidade, as chaves com nome sensível.
pub fn sanitize(value: &Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.iter()
                .filter(|(key, _)| {
                    let key = key.to_lowercase();
                    !SENSITIVE_KEYS.iter().any(|s| key.contains(s))
                })
                .map(|(key, v)| (key.clone(), sanitize(v)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(sanitize).collect()),
        other => other.clone(),
    }
}

/// Grava a trilha de auditoria. Nunca falha: o resultado é só um `bool`.
#[derive(Clone)]
pub struct AuditRecorder {
    backend: Arc<dyn QueryBackend>,
    resolver: TenantResolver,
    diagnostics: Arc<Diagnostics>,
    app_version: String,
    timeout: Duration,
}

impl AuditRecorder {
    pub fn new(
        backend: Arc<dyn QueryBackend>,
        resolver: TenantResolver,
        diagnostics: Arc<Diagnostics>,
        app_version: String,
        timeout: Duration,
    ) -> Self {
        Self { backend, resolver, diagnostics, app_version, timeout }
    }

    pub async fn record(&self, actor: Option<Uuid>, request: &RequestContext, event: AuditEvent) -> bool {
        let organization_id = actor
            .and_then(|id| self.resolver.cached(id))
            .and_then(|context| context.organization_id);
        let severity = event.effective_severity();

        let payload = json!({
            "entity": event.entity,
            "entity_id": event.entity_id,
            "severity": severity,
            "route": request.route,
            "app_version": self.app_version,
            "correlation_id": request.correlation_id,
            "details": event.details.as_ref().map(sanitize).unwrap_or_else(|| json!({})),
            "before": event.before.as_ref().map(sanitize),
            "after": event.after.as_ref().map(sanitize),
        });

        let mut row = Map::new();
        row.insert("id".into(), json!(Uuid::new_v4()));
        row.insert("user_id".into(), json!(actor));
        row.insert("action".into(), json!(format!("{}:{}", event.action.as_str(), event.entity)));
        row.insert("payload".into(), payload);
        row.insert("created_at".into(), json!(now_utc()));

        let mut query = Query::from_schema(&AUDIT_LOG).select(&["id"]).insert(row);
        if let Some(org_id) = organization_id {
            query = query.scoped_to(AUDIT_LOG.tenant_column, org_id);
        }

        // Uma tentativa só, sem retry.
        let outcome = match tokio::time::timeout(self.timeout, self.backend.execute(&query)).await {
            Ok(Ok(_)) => return true,
            Ok(Err(e)) => e.to_string(),
            Err(_) => format!("tempo limite de {}ms excedido", self.timeout.as_millis()),
        };

        tracing::warn!(action = event.action.as_str(), entity = %event.entity, "audit_log insert failed: {}", outcome);
        self.diagnostics.add_error(
            "audit.record",
            &outcome,
            None,
            Some(&request.correlation_id),
        );
        false
    }

    /// Valida o payload; a recusa vira um `ERROR:<entity>.validation` com severidade WARN.
    pub fn validated<T: Validate>(
        &self,
        caller: &Caller,
        entity: &str,
        payload: &T,
    ) -> Result<(), AppError> {
        let Err(errors) = payload.validate() else {
            return Ok(());
        };
        let event = AuditEvent::new(AuditAction::Error, format!("{entity}.validation"))
            .severity(Severity::Warn)
            .details(json!({ "message": errors.to_string() }));
        self.spawn(Some(caller.id()), &caller.request, event);
        Err(AppError::ValidationError(errors))
    }

    /// Dispara `record` numa task separada; quem chama não espera nem falha.
    pub fn spawn(&self, actor: Option<Uuid>, request: &RequestContext, event: AuditEvent) {
        let recorder = self.clone();
        let request = request.clone();
        tokio::spawn(async move {
            let written = recorder.record(actor, &request, event).await;
            tracing::debug!(written, "auditoria processada");
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        db::{memory_backend::MemoryBackend, query::BackendError},
        models::auth::Identity,
    };

    fn request() -> RequestContext {
        RequestContext { correlation_id: "corr-1".into(), route: "/api/equipamentos".into() }
    }

    fn recorder(backend: &Arc<MemoryBackend>) -> AuditRecorder {
        let resolver = TenantResolver::new(backend.clone(), Duration::from_millis(200));
        AuditRecorder::new(
            backend.clone(),
            resolver,
            Arc::new(Diagnostics::default()),
            "1.2.3".into(),
            Duration::from_millis(200),
        )
    }

    #[test]
    fn sanitize_is_recursive() {
        let value = json!({
            "nome": "Luxímetro",
            "Password": "x",
            "access_token": "y",
            "nested": { "senhaAntiga": "z", "ok": [ { "client_secret": 1, "valor": 2 } ] }
        });
        assert_eq!(
            sanitize(&value),
            json!({ "nome": "Luxímetro", "nested": { "ok": [ { "valor": 2 } ] } })
        );
    }

    #[tokio::test]
    async fn writes_stamped_entry() {
        let backend = MemoryBackend::new();
        let recorder = recorder(&backend);
        let actor = Uuid::new_v4();

        let event = AuditEvent::new(AuditAction::SoftDelete, "equipamentos")
            .entity_id("abc")
            .details(json!({ "token": "t", "motivo": "baixa" }));
        assert!(recorder.record(Some(actor), &request(), event).await);

        let rows = backend.rows("audit_log");
        assert_eq!(rows.len(), 1);
        let row = &rows[0];
        assert_eq!(row["action"], "SOFT_DELETE:equipamentos");
        assert_eq!(row["user_id"], json!(actor));
        assert_eq!(row["payload"]["severity"], "WARN");
        assert_eq!(row["payload"]["app_version"], "1.2.3");
        assert_eq!(row["payload"]["correlation_id"], "corr-1");
        assert_eq!(row["payload"]["details"], json!({ "motivo": "baixa" }));
    }

    #[tokio::test]
    async fn stamps_cached_organization() {
        let backend = MemoryBackend::new();
        let user = Identity { id: Uuid::new_v4(), email: None };
        let org = Uuid::new_v4();
        backend.seed("profiles", json!({ "id": user.id, "role": "USER", "organization_id": org }));

        let recorder = recorder(&backend);
        recorder.resolver.resolve(Some(&user)).await.unwrap();
        recorder
            .record(Some(user.id), &request(), AuditEvent::new(AuditAction::Create, "obras"))
            .await;

        assert_eq!(backend.rows("audit_log")[0]["organization_id"], json!(org.to_string()));
    }

    #[tokio::test]
    async fn audit_never_blocks_or_fails() {
        let backend = MemoryBackend::new();
        backend.fail_table("audit_log", BackendError::new(Some("42P01"), Some(404), "relation audit_log does not exist"));
        let recorder = recorder(&backend);

        let event = AuditEvent::new(AuditAction::Error, "medicoes.list").severity(Severity::Error);
        assert!(!recorder.record(None, &request(), event.clone()).await);
        assert_eq!(backend.calls("audit_log"), 1);

        // A versão destacada também não propaga nada
        recorder.spawn(None, &request(), event);
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(backend.calls("audit_log"), 2);
        assert_eq!(recorder.diagnostics.snapshot().errors.len(), 2);
    }
}
