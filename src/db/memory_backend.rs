// src/db/memory_backend.rs
//
// Dublês em memória dos capabilities do backend, usados pelos testes.

use std::{
    cmp::Ordering,
    collections::HashMap,
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use uuid::Uuid;

use crate::{
    common::datetime::parse_iso_safe,
    db::{
        backend::{BlobStorage, QueryBackend},
        query::{BackendError, Direction, Filter, Operation, Query, UNDEFINED_COLUMN, UNIQUE_VIOLATION},
        schema::EntitySchema,
    },
};

type Row = Map<String, Value>;

#[derive(Default)]
pub struct MemoryBackend {
    tables: Mutex<HashMap<String, Vec<Row>>>,
    // Tabelas "antigas": só aceitam estas colunas (o resto dá 42703).
    legacy: Mutex<HashMap<String, &'static [&'static str]>>,
    failures: Mutex<HashMap<String, BackendError>>,
    rpc_failure: Mutex<Option<BackendError>>,
    delays: Mutex<HashMap<String, Duration>>,
    queries: Mutex<Vec<Query>>,
    rpc_calls: Mutex<Vec<Uuid>>,
}

impl MemoryBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn seed(&self, table: &str, row: Value) {
        if let Value::Object(row) = row {
            self.tables.lock().unwrap().entry(table.to_string()).or_default().push(row);
        }
    }

    pub fn rows(&self, table: &str) -> Vec<Value> {
        self.tables
            .lock()
            .unwrap()
            .get(table)
            .map(|rows| rows.iter().cloned().map(Value::Object).collect())
            .unwrap_or_default()
    }

    pub fn row(&self, table: &str, id: Uuid) -> Option<Value> {
        self.rows(table)
            .into_iter()
            .find(|r| r.get("id") == Some(&Value::String(id.to_string())))
    }

    pub fn use_legacy_schema(&self, schema: &'static EntitySchema) {
        self.legacy.lock().unwrap().insert(schema.table.to_string(), schema.legacy_columns);
    }

    pub fn fail_table(&self, table: &str, error: BackendError) {
        self.failures.lock().unwrap().insert(table.to_string(), error);
    }

    pub fn clear_failures(&self) {
        self.failures.lock().unwrap().clear();
    }

    pub fn fail_rpc(&self, error: BackendError) {
        *self.rpc_failure.lock().unwrap() = Some(error);
    }

    pub fn set_delay(&self, table: &str, delay: Duration) {
        self.delays.lock().unwrap().insert(table.to_string(), delay);
    }

    pub fn calls(&self, table: &str) -> usize {
        self.queries.lock().unwrap().iter().filter(|q| q.table == table).count()
    }

    pub fn queries(&self, table: &str) -> Vec<Query> {
        self.queries.lock().unwrap().iter().filter(|q| q.table == table).cloned().collect()
    }

    pub fn rpc_calls(&self) -> Vec<Uuid> {
        self.rpc_calls.lock().unwrap().clone()
    }

    fn check_columns(&self, query: &Query) -> Result<(), BackendError> {
        let legacy = self.legacy.lock().unwrap();
        let Some(allowed) = legacy.get(&query.table) else {
            return Ok(());
        };

        let mut referenced: Vec<&str> = query.columns.iter().map(String::as_str).collect();
        referenced.extend(query.filters.iter().map(Filter::column));
        if let Some((column, _)) = &query.order {
            referenced.push(column);
        }
        if let Operation::Insert(row) | Operation::Upsert(row) | Operation::Update(row) = &query.operation {
            referenced.extend(row.keys().map(String::as_str));
        }

        match referenced.into_iter().find(|c| !allowed.contains(c)) {
            Some(column) => Err(BackendError::new(
                Some(UNDEFINED_COLUMN),
                Some(400),
                format!("column {}.{} does not exist", query.table, column),
            )),
            None => Ok(()),
        }
    }
}

fn field<'a>(row: &'a Row, column: &str) -> &'a Value {
    row.get(column).unwrap_or(&Value::Null)
}

fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => match (parse_iso_safe(x), parse_iso_safe(y)) {
            (Some(dx), Some(dy)) => Some(dx.cmp(&dy)),
            _ => Some(x.cmp(y)),
        },
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

fn same(a: &Value, b: &Value) -> bool {
    compare(a, b) == Some(Ordering::Equal)
}

fn matches(row: &Row, filters: &[Filter]) -> bool {
    filters.iter().all(|filter| {
        let value = field(row, filter.column());
        match filter {
            Filter::Eq(_, expected) => same(value, expected),
            Filter::Neq(_, expected) => !(same(value, expected) || (value.is_null() && expected.is_null())),
            Filter::IsNull(_) => value.is_null(),
            Filter::In(_, values) => values.iter().any(|v| same(value, v)),
            Filter::Gte(_, bound) => matches!(compare(value, bound), Some(Ordering::Greater | Ordering::Equal)),
            Filter::Lte(_, bound) => matches!(compare(value, bound), Some(Ordering::Less | Ordering::Equal)),
        }
    })
}

fn project(row: &Row, columns: &[String]) -> Value {
    if columns.is_empty() {
        return Value::Object(row.clone());
    }
    Value::Object(
        columns
            .iter()
            .map(|c| (c.clone(), field(row, c).clone()))
            .collect(),
    )
}

// Índices únicos parciais da migração: um vínculo ATIVO não removido por equipamento
// e um código de equipamento não removido por organização.
fn check_unique(rows: &[Row], table: &str, candidate: &Row) -> Result<(), BackendError> {
    let (index, clash): (&str, fn(&Row, &Row) -> bool) = match table {
        "vinculos" => ("vinculos_um_ativo_por_equipamento", same_active_equipment),
        "equipamentos" => ("equipamentos_codigo_por_org", same_live_code),
        _ => return Ok(()),
    };
    if rows.iter().any(|other| field(other, "id") != field(candidate, "id") && clash(candidate, other)) {
        return Err(BackendError::new(
            Some(UNIQUE_VIOLATION),
            Some(409),
            format!("duplicate key value violates unique constraint \"{index}\""),
        ));
    }
    Ok(())
}

fn same_active_equipment(a: &Row, b: &Row) -> bool {
    is_live_active(a) && is_live_active(b) && same(field(a, "equipamento_id"), field(b, "equipamento_id"))
}

fn same_live_code(a: &Row, b: &Row) -> bool {
    field(a, "deleted_at").is_null()
        && field(b, "deleted_at").is_null()
        && !field(a, "organization_id").is_null()
        && same(field(a, "organization_id"), field(b, "organization_id"))
        && same(field(a, "codigo"), field(b, "codigo"))
}

fn is_live_active(row: &Row) -> bool {
    field(row, "status") == &json!("ATIVO") && field(row, "deleted_at").is_null()
}

#[async_trait]
impl QueryBackend for MemoryBackend {
    async fn execute(&self, query: &Query) -> Result<Vec<Value>, BackendError> {
        self.queries.lock().unwrap().push(query.clone());

        let delay = self.delays.lock().unwrap().get(&query.table).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(error) = self.failures.lock().unwrap().get(&query.table).cloned() {
            return Err(error);
        }
        self.check_columns(query)?;

        let mut tables = self.tables.lock().unwrap();
        let rows = tables.entry(query.table.clone()).or_default();

        match &query.operation {
            Operation::Select => {
                let mut selected: Vec<&Row> = rows.iter().filter(|r| matches(r, &query.filters)).collect();
                if let Some((column, direction)) = &query.order {
                    selected.sort_by(|a, b| {
                        let (a, b) = (field(a, column), field(b, column));
                        match (a.is_null(), b.is_null()) {
                            (true, true) => Ordering::Equal,
                            (true, false) => Ordering::Greater,
                            (false, true) => Ordering::Less,
                            _ => {
                                let ord = compare(a, b).unwrap_or(Ordering::Equal);
                                if *direction == Direction::Desc { ord.reverse() } else { ord }
                            }
                        }
                    });
                }
                let limit = query.limit.map(|l| l.max(0) as usize).unwrap_or(usize::MAX);
                Ok(selected
                    .into_iter()
                    .take(limit)
                    .map(|r| project(r, &query.columns))
                    .collect())
            }
            Operation::Count => {
                let count = rows.iter().filter(|r| matches(r, &query.filters)).count();
                Ok(vec![json!({ "count": count })])
            }
            Operation::Insert(row) => {
                check_unique(rows, &query.table, row)?;
                rows.push(row.clone());
                Ok(vec![project(row, &query.columns)])
            }
            Operation::Upsert(row) => {
                let id = field(row, "id").clone();
                match rows.iter().position(|r| !id.is_null() && field(r, "id") == &id) {
                    Some(index) => {
                        let mut merged = rows[index].clone();
                        merged.extend(row.clone());
                        check_unique(rows, &query.table, &merged)?;
                        rows[index] = merged.clone();
                        Ok(vec![project(&merged, &query.columns)])
                    }
                    None => {
                        check_unique(rows, &query.table, row)?;
                        rows.push(row.clone());
                        Ok(vec![project(row, &query.columns)])
                    }
                }
            }
            Operation::Update(patch) => {
                let targets: Vec<usize> = rows
                    .iter()
                    .enumerate()
                    .filter(|(_, r)| matches(r, &query.filters))
                    .map(|(i, _)| i)
                    .collect();
                let mut updated = Vec::with_capacity(targets.len());
                for index in targets {
                    let mut next = rows[index].clone();
                    next.extend(patch.clone());
                    check_unique(rows, &query.table, &next)?;
                    rows[index] = next.clone();
                    updated.push(project(&next, &query.columns));
                }
                Ok(updated)
            }
            Operation::Delete => {
                let mut removed = Vec::new();
                rows.retain(|r| {
                    if matches(r, &query.filters) {
                        removed.push(json!({ "id": field(r, "id") }));
                        false
                    } else {
                        true
                    }
                });
                Ok(removed)
            }
        }
    }

    async fn set_current_org(&self, org_id: Uuid) -> Result<(), BackendError> {
        self.rpc_calls.lock().unwrap().push(org_id);
        match self.rpc_failure.lock().unwrap().clone() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

#[derive(Default)]
pub struct MemoryBlobStorage {
    files: Mutex<HashMap<String, Vec<u8>>>,
    signing_disabled: Mutex<bool>,
}

impl MemoryBlobStorage {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn disable_signing(&self) {
        *self.signing_disabled.lock().unwrap() = true;
    }

    pub fn paths(&self) -> Vec<String> {
        self.files.lock().unwrap().keys().cloned().collect()
    }
}

#[async_trait]
impl BlobStorage for MemoryBlobStorage {
    async fn upload(&self, path: &str, bytes: &[u8]) -> Result<(), BackendError> {
        let mut files = self.files.lock().unwrap();
        if files.contains_key(path) {
            return Err(BackendError::new(Some("409"), Some(409), "The resource already exists"));
        }
        files.insert(path.to_string(), bytes.to_vec());
        Ok(())
    }

    async fn create_signed_url(&self, path: &str, ttl_secs: u64) -> Result<String, BackendError> {
        if *self.signing_disabled.lock().unwrap() {
            return Err(BackendError::new(None, Some(400), "signed urls are not available"));
        }
        Ok(format!("memory://signed/{path}?expires_in={ttl_secs}"))
    }

    fn public_url(&self, path: &str) -> String {
        format!("memory://public/{path}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::schema::EQUIPMENT;

    #[tokio::test]
    async fn legacy_tables_reject_new_columns() {
        let backend = MemoryBackend::new();
        backend.use_legacy_schema(&EQUIPMENT);

        let err = backend.execute(&Query::from_schema(&EQUIPMENT)).await.unwrap_err();
        assert_eq!(err.code.as_deref(), Some(UNDEFINED_COLUMN));

        let legacy = Query::from_schema(&EQUIPMENT).legacy().unwrap();
        assert!(backend.execute(&legacy).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn unique_active_assignment_index() {
        let backend = MemoryBackend::new();
        let equipment = Uuid::new_v4().to_string();
        let mut row = Map::new();
        row.insert("id".into(), json!(Uuid::new_v4().to_string()));
        row.insert("equipamento_id".into(), json!(equipment));
        row.insert("status".into(), json!("ATIVO"));
        backend.execute(&Query::table("vinculos").insert(row.clone())).await.unwrap();

        row.insert("id".into(), json!(Uuid::new_v4().to_string()));
        let err = backend.execute(&Query::table("vinculos").insert(row)).await.unwrap_err();
        assert_eq!(err.code.as_deref(), Some(UNIQUE_VIOLATION));
    }

    #[tokio::test]
    async fn equipment_code_is_unique_per_org() {
        let backend = MemoryBackend::new();
        let org = Uuid::new_v4().to_string();
        let row = |org: &str| {
            let mut row = Map::new();
            row.insert("id".into(), json!(Uuid::new_v4().to_string()));
            row.insert("codigo".into(), json!("EQ1"));
            row.insert("organization_id".into(), json!(org));
            row
        };
        backend.execute(&Query::table("equipamentos").insert(row(&org))).await.unwrap();
        backend.execute(&Query::table("equipamentos").insert(row(&Uuid::new_v4().to_string()))).await.unwrap();

        let err = backend.execute(&Query::table("equipamentos").insert(row(&org))).await.unwrap_err();
        assert!(err.message.contains("equipamentos_codigo_por_org"));
    }
}
