// src/db/guard.rs

use std::{sync::Arc, time::Duration};

use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::{
    common::{diagnostics::Diagnostics, error::AppError},
    db::{
        backend::QueryBackend,
        query::{BackendError, Filter, Query},
    },
    models::{
        audit::{AuditAction, AuditEvent, Severity},
        auth::Caller,
    },
    services::{audit_service::AuditRecorder, tenancy_service::TenantResolver},
};

pub const DEFAULT_TENANT_COLUMN: &str = "organization_id";

/// Ponto único de acesso ao backend: escopo de organização, tempo limite,
/// fallback de schema antigo, diagnóstico e auditoria de falhas.
#[derive(Clone)]
pub struct QueryGuard {
    backend: Arc<dyn QueryBackend>,
    resolver: TenantResolver,
    audit: AuditRecorder,
    diagnostics: Arc<Diagnostics>,
    timeout: Duration,
}

impl QueryGuard {
    pub fn new(
        backend: Arc<dyn QueryBackend>,
        resolver: TenantResolver,
        audit: AuditRecorder,
        diagnostics: Arc<Diagnostics>,
        timeout: Duration,
    ) -> Self {
        Self { backend, resolver, audit, diagnostics, timeout }
    }

    pub fn resolver(&self) -> &TenantResolver {
        &self.resolver
    }

    pub fn audit(&self) -> &AuditRecorder {
        &self.audit
    }

    pub fn diagnostics(&self) -> &Arc<Diagnostics> {
        &self.diagnostics
    }

    pub fn run<'a>(&'a self, caller: &'a Caller, context: &str, query: Query) -> Guarded<'a> {
        Guarded {
            guard: self,
            caller,
            context: context.to_string(),
            query,
            fallback: None,
            scoped: true,
        }
    }
}

pub struct Guarded<'a> {
    guard: &'a QueryGuard,
    caller: &'a Caller,
    context: String,
    query: Query,
    fallback: Option<Query>,
    scoped: bool,
}

fn scope(query: Query, org_id: Uuid) -> Query {
    let column = query.schema.map(|s| s.tenant_column).unwrap_or(DEFAULT_TENANT_COLUMN);
    query.scoped_to(column, org_id)
}

impl Guarded<'_> {
    /// Sem predicado de organização e sem passar pelo resolver: tabelas sem coluna de
    /// organização (`organizations`) e o bootstrap do próprio perfil.
    pub fn unscoped(mut self) -> Self {
        self.scoped = false;
        self
    }

    /// Consulta alternativa para o caso de schema antigo, no lugar do plano legado padrão.
    pub fn or_fallback(mut self, fallback: Query) -> Self {
        self.fallback = Some(fallback);
        self
    }

    async fn attempt(&self, query: &Query) -> Result<Vec<Value>, AppError> {
        let timeout = self.guard.timeout;
        match tokio::time::timeout(timeout, self.guard.backend.execute(query)).await {
            Ok(result) => result.map_err(AppError::from_backend),
            Err(_) => Err(AppError::Timeout {
                context: self.context.clone(),
                after_ms: timeout.as_millis() as u64,
            }),
        }
    }

    async fn org_id(&self) -> Result<Option<Uuid>, AppError> {
        if !self.scoped {
            return Ok(None);
        }
        Ok(self.guard.resolver.resolve(Some(&self.caller.identity)).await?.organization_id)
    }

    async fn scoped_rows(&mut self, org_id: Option<Uuid>) -> Result<Vec<Value>, AppError> {
        let query = std::mem::replace(&mut self.query, Query::table(""));
        let fallback = self.fallback.take();
        let (query, fallback) = match org_id {
            Some(org_id) => (scope(query, org_id), fallback.map(|f| scope(f, org_id))),
            // ADMIN global: sem predicado de organização
            None => (query, fallback),
        };

        let mut result = self.attempt(&query).await;

        if let Err(AppError::SchemaMismatch(e)) = &result {
            let retry = match fallback {
                Some(f) => Some(f.legacy().unwrap_or(f)),
                None => query.legacy(),
            };
            if let Some(retry) = retry {
                tracing::warn!(context = %self.context, "schema antigo detectado ({}), repetindo com colunas legadas", e);
                result = self.attempt(&retry).await;
            }
        }
        result
    }

    // Falhas do resolver passam pelo mesmo registro que as falhas da consulta.
    async fn rows(mut self) -> Result<Vec<Value>, AppError> {
        let operation = self.query.operation.name();
        let result = match self.org_id().await {
            Ok(org_id) => self.scoped_rows(org_id).await,
            Err(e) => Err(e),
        };

        let code = result.as_ref().err().map(|e| match e.code() {
            Some(code) => code.to_string(),
            None => format!("{:?}", e.kind()),
        });
        self.guard.diagnostics.record_query(
            &self.context,
            code.as_deref(),
            Some(&self.caller.request.correlation_id),
        );

        if let Err(e) = &result {
            self.guard.diagnostics.add_error(
                &self.context,
                &e.to_string(),
                code.as_deref(),
                Some(&self.caller.request.correlation_id),
            );
            let event = AuditEvent::new(AuditAction::Error, self.context.clone())
                .severity(Severity::Error)
                .details(json!({
                    "operation": operation,
                    "kind": e.kind(),
                    "code": code,
                    "message": e.to_string(),
                }));
            self.guard.audit.spawn(Some(self.caller.id()), &self.caller.request, event);
        }

        result
    }

    pub async fn fetch_all<T: DeserializeOwned>(self) -> Result<Vec<T>, AppError> {
        let table = self.query.table.clone();
        self.rows().await?.into_iter().map(|row| decode(&table, row)).collect()
    }

    pub async fn fetch_optional<T: DeserializeOwned>(self) -> Result<Option<T>, AppError> {
        let table = self.query.table.clone();
        self.rows().await?.into_iter().next().map(|row| decode(&table, row)).transpose()
    }

    /// Nenhuma linha vira `NotFound` (inclusive quando a linha é de outra organização).
    pub async fn fetch_one<T: DeserializeOwned>(self) -> Result<T, AppError> {
        let entity = self.query.schema.map(|s| s.table).unwrap_or("registro");
        let id = self
            .query
            .filters
            .iter()
            .find_map(|f| match f {
                Filter::Eq(column, Value::String(v)) if column == "id" => Some(v.clone()),
                _ => None,
            })
            .unwrap_or_default();
        let table = self.query.table.clone();

        match self.rows().await?.into_iter().next() {
            Some(row) => decode(&table, row),
            None => Err(AppError::NotFound { entity, id }),
        }
    }

    pub async fn count(self) -> Result<i64, AppError> {
        let rows = self.rows().await?;
        Ok(rows
            .first()
            .and_then(|row| row.get("count"))
            .and_then(Value::as_i64)
            .unwrap_or(0))
    }

    /// Linhas afetadas.
    pub async fn execute(self) -> Result<usize, AppError> {
        Ok(self.rows().await?.len())
    }
}

fn decode<T: DeserializeOwned>(table: &str, row: Value) -> Result<T, AppError> {
    serde_json::from_value(row).map_err(|e| {
        AppError::Backend(BackendError::new(
            None,
            None,
            format!("linha inesperada em {table}: {e}"),
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        db::{
            query::to_row,
            schema::{ASSIGNMENT, EQUIPMENT, MEASUREMENT, SITE},
            test_support::{caller_in, fixture},
        },
        models::{
            auth::{Identity, RequestContext},
            equipment::Equipment,
        },
    };
    use serde_json::json;

    fn equipment_row(org: Uuid, code: &str) -> Value {
        json!({
            "id": Uuid::new_v4(), "codigo": code, "nome": code, "status": "ATIVO",
            "organization_id": org, "created_at": "2024-01-01T00:00:00Z"
        })
    }

    #[tokio::test]
    async fn tenant_isolation_on_reads_and_writes() {
        let f = fixture(Duration::from_millis(500));
        let (org_a, org_b) = (Uuid::new_v4(), Uuid::new_v4());
        f.backend.seed("equipamentos", equipment_row(org_a, "A-1"));
        f.backend.seed("equipamentos", equipment_row(org_b, "B-1"));
        let caller = caller_in(&f.backend, Some(org_a), "USER");

        let visible: Vec<Equipment> = f
            .guard
            .run(&caller, "equipamentos.list", Query::from_schema(&EQUIPMENT))
            .fetch_all()
            .await
            .unwrap();
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].code, "A-1");

        // O cliente tenta gravar em outra organização: o valor resolvido prevalece
        let row = to_row(&json!({ "id": Uuid::new_v4(), "codigo": "X", "nome": "X", "status": "ATIVO", "organization_id": org_b }));
        let created: Equipment = f
            .guard
            .run(&caller, "equipamentos.create", Query::from_schema(&EQUIPMENT).insert(row))
            .fetch_one()
            .await
            .unwrap();
        assert_eq!(created.organization_id, Some(org_a));

        for (schema, context) in [(&SITE, "obras.count"), (&ASSIGNMENT, "vinculos.count"), (&MEASUREMENT, "medicoes.count")] {
            for org in [org_a, org_b] {
                f.backend.seed(schema.table, json!({ "id": Uuid::new_v4(), "organization_id": org }));
            }
            let count = f.guard.run(&caller, context, Query::from_schema(schema).count()).count().await.unwrap();
            assert_eq!(count, 1, "{context}");
        }
    }

    #[tokio::test]
    async fn resolver_failure_is_recorded_like_a_query_failure() {
        let f = fixture(Duration::from_millis(500));
        // Sem linha em profiles: USER sem organização
        let caller = Caller {
            identity: Identity { id: Uuid::new_v4(), email: None },
            request: RequestContext { correlation_id: "corr-1".into(), route: "/test".into() },
        };

        let result = f
            .guard
            .run(&caller, "equipamentos.list", Query::from_schema(&EQUIPMENT))
            .fetch_all::<Equipment>()
            .await;
        assert!(matches!(result, Err(AppError::MissingOrganization)));
        assert!(f.backend.queries("equipamentos").is_empty());

        let snapshot = f.diagnostics.snapshot();
        assert_eq!(snapshot.events.len(), 1);
        assert_eq!(snapshot.events[0].context, "equipamentos.list");
        assert_eq!(snapshot.events[0].code.as_deref(), Some("Forbidden"));
        assert_eq!(snapshot.errors.len(), 1);
    }

    #[tokio::test]
    async fn global_admin_has_no_tenant_predicate() {
        let f = fixture(Duration::from_millis(500));
        f.backend.seed("equipamentos", equipment_row(Uuid::new_v4(), "A-1"));
        f.backend.seed("equipamentos", equipment_row(Uuid::new_v4(), "B-1"));
        let admin = caller_in(&f.backend, None, "ADMIN");

        let count = f
            .guard
            .run(&admin, "equipamentos.count", Query::from_schema(&EQUIPMENT).count())
            .count()
            .await
            .unwrap();
        assert_eq!(count, 2);
    }

    #[tokio::test]
    async fn legacy_fallback_retries_once_without_new_columns() {
        let f = fixture(Duration::from_millis(500));
        f.backend.use_legacy_schema(&EQUIPMENT);
        let org = Uuid::new_v4();
        f.backend.seed("equipamentos", json!({
            "id": Uuid::new_v4(), "codigo": "L-1", "nome": "Legado", "status": "ATIVO", "org_id": org
        }));
        let caller = caller_in(&f.backend, Some(org), "USER");

        let rows: Vec<Equipment> = f
            .guard
            .run(&caller, "equipamentos.list", Query::from_schema(&EQUIPMENT).is_null("deleted_at"))
            .fetch_all()
            .await
            .unwrap();

        assert_eq!(rows.len(), 1);
        assert!(rows[0].deleted_at.is_none());
        let sent = f.backend.queries("equipamentos");
        assert_eq!(sent.len(), 2);
        assert!(sent[1].filters.iter().all(|f| f.column() != "deleted_at"));
        assert!(sent[1].filters.iter().any(|f| f.column() == "org_id"));
    }

    #[tokio::test]
    async fn explicit_fallback_replaces_legacy_plan() {
        let f = fixture(Duration::from_millis(500));
        f.backend.use_legacy_schema(&MEASUREMENT);
        let org = Uuid::new_v4();
        let id = Uuid::new_v4();
        f.backend.seed("medicoes", json!({ "id": id, "equipamento_id": Uuid::new_v4(), "org_id": org }));
        let caller = caller_in(&f.backend, Some(org), "USER");

        let mut patch = serde_json::Map::new();
        patch.insert("deleted_at".into(), json!("2024-05-01T00:00:00Z"));
        let soft = Query::from_schema(&MEASUREMENT).update(patch).eq("id", id.to_string());
        let hard = Query::from_schema(&MEASUREMENT).delete().eq("id", id.to_string());

        let affected = f.guard.run(&caller, "medicoes.delete", soft).or_fallback(hard).execute().await.unwrap();
        assert_eq!(affected, 1);
        assert!(f.backend.rows("medicoes").is_empty());
    }

    #[tokio::test]
    async fn timeout_is_raised_and_audited() {
        let f = fixture(Duration::from_millis(50));
        let caller = caller_in(&f.backend, Some(Uuid::new_v4()), "USER");
        // O perfil já em cache antes de atrasar a tabela de equipamentos
        f.guard.resolver().resolve(Some(&caller.identity)).await.unwrap();
        f.backend.set_delay("equipamentos", Duration::from_millis(300));

        let result = f
            .guard
            .run(&caller, "equipamentos.list", Query::from_schema(&EQUIPMENT))
            .fetch_all::<Equipment>()
            .await;
        assert!(matches!(result, Err(AppError::Timeout { after_ms: 50, .. })));

        tokio::time::sleep(Duration::from_millis(20)).await;
        let audit = f.backend.rows("audit_log");
        assert_eq!(audit.len(), 1);
        assert_eq!(audit[0]["action"], "ERROR:equipamentos.list");
        assert_eq!(audit[0]["payload"]["severity"], "ERROR");
    }

    #[tokio::test]
    async fn every_invocation_leaves_a_diagnostics_event() {
        let f = fixture(Duration::from_millis(500));
        let caller = caller_in(&f.backend, Some(Uuid::new_v4()), "USER");
        f.guard
            .run(&caller, "equipamentos.list", Query::from_schema(&EQUIPMENT))
            .execute()
            .await
            .unwrap();

        f.backend.fail_table("obras", BackendError::new(Some("XX000"), Some(500), "boom"));
        let failed = f
            .guard
            .run(&caller, "obras.list", Query::table("obras"))
            .execute()
            .await;
        assert!(matches!(failed, Err(AppError::Backend(_))));

        let snapshot = f.diagnostics.snapshot();
        assert_eq!(snapshot.events.len(), 2);
        assert_eq!(snapshot.events[0].context, "obras.list");
        assert_eq!(snapshot.events[0].code.as_deref(), Some("XX000"));
        assert_eq!(snapshot.events[1].code, None);
        assert_eq!(snapshot.errors.len(), 1);
    }

    #[tokio::test]
    async fn fetch_one_on_other_tenant_row_is_not_found() {
        let f = fixture(Duration::from_millis(500));
        let foreign = equipment_row(Uuid::new_v4(), "B-1");
        let id = foreign["id"].as_str().unwrap().to_string();
        f.backend.seed("equipamentos", foreign);
        let caller = caller_in(&f.backend, Some(Uuid::new_v4()), "USER");

        let result = f
            .guard
            .run(&caller, "equipamentos.get", Query::from_schema(&EQUIPMENT).eq("id", id.clone()))
            .fetch_one::<Equipment>()
            .await;
        assert!(matches!(result, Err(AppError::NotFound { entity: "equipamentos", id: ref got }) if *got == id));
    }
}
