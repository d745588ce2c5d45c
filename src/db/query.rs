// src/db/query.rs

use serde_json::{Map, Value};
use uuid::Uuid;

use crate::db::schema::EntitySchema;

// ---
// Erro "cru" do backend
// ---
/// Erro como o backend o devolve: código (SQLSTATE ou do gateway), status HTTP-like e mensagem.
/// Só é inspecionado uma vez, em `AppError::from_backend`.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct BackendError {
    pub code: Option<String>,
    pub status: Option<u16>,
    pub message: String,
}

impl BackendError {
    pub fn new(code: Option<&str>, status: Option<u16>, message: impl Into<String>) -> Self {
        Self {
            code: code.map(str::to_string),
            status,
            message: message.into(),
        }
    }

    /// Falha de conectividade (classe SQLSTATE 08).
    pub fn network(message: impl Into<String>) -> Self {
        Self::new(Some(CONNECTION_EXCEPTION), None, message)
    }
}

impl std::fmt::Display for BackendError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.code {
            Some(code) => write!(f, "[{}] {}", code, self.message),
            None => write!(f, "{}", self.message),
        }
    }
}

pub const UNDEFINED_COLUMN: &str = "42703";
pub const SCHEMA_CACHE_MISS: &str = "PGRST204";
pub const UNIQUE_VIOLATION: &str = "23505";
pub const CONNECTION_EXCEPTION: &str = "08000";

// ---
// O descritor da consulta
// ---

#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    Select,
    Count,
    Insert(Map<String, Value>),
    Upsert(Map<String, Value>),
    Update(Map<String, Value>),
    Delete,
}

impl Operation {
    pub fn name(&self) -> &'static str {
        match self {
            Operation::Select => "select",
            Operation::Count => "count",
            Operation::Insert(_) => "insert",
            Operation::Upsert(_) => "upsert",
            Operation::Update(_) => "update",
            Operation::Delete => "delete",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Eq(String, Value),
    Neq(String, Value),
    IsNull(String),
    In(String, Vec<Value>),
    Gte(String, Value),
    Lte(String, Value),
}

impl Filter {
    pub fn column(&self) -> &str {
        match self {
            Filter::Eq(c, _)
            | Filter::Neq(c, _)
            | Filter::IsNull(c)
            | Filter::In(c, _)
            | Filter::Gte(c, _)
            | Filter::Lte(c, _) => c,
        }
    }

    fn with_column(&self, column: &str) -> Filter {
        let c = column.to_string();
        match self {
            Filter::Eq(_, v) => Filter::Eq(c, v.clone()),
            Filter::Neq(_, v) => Filter::Neq(c, v.clone()),
            Filter::IsNull(_) => Filter::IsNull(c),
            Filter::In(_, v) => Filter::In(c, v.clone()),
            Filter::Gte(_, v) => Filter::Gte(c, v.clone()),
            Filter::Lte(_, v) => Filter::Lte(c, v.clone()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

/// Consulta filtrada, no estilo `table(..).select(..).eq(..).order(..).limit(..)`.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub table: String,
    pub operation: Operation,
    pub columns: Vec<String>,
    pub filters: Vec<Filter>,
    pub order: Option<(String, Direction)>,
    pub limit: Option<i64>,
    /// Organização fixada na conexão enquanto a instrução roda (RLS).
    pub org_scope: Option<Uuid>,
    pub schema: Option<&'static EntitySchema>,
}

impl Query {
    pub fn table(name: &str) -> Self {
        Self {
            table: name.to_string(),
            operation: Operation::Select,
            columns: Vec::new(),
            filters: Vec::new(),
            order: None,
            limit: None,
            org_scope: None,
            schema: None,
        }
    }

    /// Consulta sobre a tabela de uma entidade conhecida, já com a projeção atual.
    pub fn from_schema(schema: &'static EntitySchema) -> Self {
        let mut query = Self::table(schema.table);
        query.columns = schema.columns.iter().map(|c| c.to_string()).collect();
        query.schema = Some(schema);
        query
    }

    pub fn select(mut self, columns: &[&str]) -> Self {
        self.operation = Operation::Select;
        self.columns = columns.iter().map(|c| c.to_string()).collect();
        self
    }

    pub fn count(mut self) -> Self {
        self.operation = Operation::Count;
        self
    }

    pub fn insert(mut self, row: Map<String, Value>) -> Self {
        self.operation = Operation::Insert(row);
        self
    }

    pub fn upsert(mut self, row: Map<String, Value>) -> Self {
        self.operation = Operation::Upsert(row);
        self
    }

    pub fn update(mut self, patch: Map<String, Value>) -> Self {
        self.operation = Operation::Update(patch);
        self
    }

    pub fn delete(mut self) -> Self {
        self.operation = Operation::Delete;
        self
    }

    pub fn eq(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.filters.push(Filter::Eq(column.to_string(), value.into()));
        self
    }

    pub fn neq(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.filters.push(Filter::Neq(column.to_string(), value.into()));
        self
    }

    pub fn is_null(mut self, column: &str) -> Self {
        self.filters.push(Filter::IsNull(column.to_string()));
        self
    }

    pub fn in_list<V: Into<Value>>(mut self, column: &str, values: impl IntoIterator<Item = V>) -> Self {
        let values = values.into_iter().map(Into::into).collect();
        self.filters.push(Filter::In(column.to_string(), values));
        self
    }

    pub fn gte(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.filters.push(Filter::Gte(column.to_string(), value.into()));
        self
    }

    pub fn lte(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.filters.push(Filter::Lte(column.to_string(), value.into()));
        self
    }

    pub fn order(mut self, column: &str, direction: Direction) -> Self {
        self.order = Some((column.to_string(), direction));
        self
    }

    pub fn limit(mut self, n: i64) -> Self {
        self.limit = Some(n);
        self
    }

    /// Aplica o escopo de organização: predicado de igualdade nas leituras/alterações e
    /// a coluna preenchida nas linhas gravadas (sobrescrevendo o que veio do cliente).
    pub fn scoped_to(mut self, tenant_column: &str, org_id: Uuid) -> Self {
        let value = Value::String(org_id.to_string());
        match &mut self.operation {
            Operation::Insert(row) | Operation::Upsert(row) => {
                row.insert(tenant_column.to_string(), value);
            }
            Operation::Update(patch) => {
                patch.remove(tenant_column);
                self.filters.retain(|f| f.column() != tenant_column);
                self.filters.push(Filter::Eq(tenant_column.to_string(), value));
            }
            Operation::Select | Operation::Count | Operation::Delete => {
                self.filters.retain(|f| f.column() != tenant_column);
                self.filters.push(Filter::Eq(tenant_column.to_string(), value));
            }
        }
        self.org_scope = Some(org_id);
        self
    }

    /// Plano "legado": mesma consulta sobre o conjunto reduzido de colunas da entidade.
    /// A coluna de organização é renomeada; predicados, chaves do payload e ordenação sobre
    /// colunas que o schema antigo não tem são descartados.
    pub fn legacy(&self) -> Option<Query> {
        let schema = self.schema?;
        let rename = |column: &str| -> String {
            if column == schema.tenant_column {
                schema.legacy_tenant_column.to_string()
            } else {
                column.to_string()
            }
        };
        let known = |column: &str| schema.legacy_columns.contains(&column);
        // Sem coluna de organização no schema antigo não há como manter o isolamento.
        if self.org_scope.is_some() && !known(schema.legacy_tenant_column) {
            return None;
        }

        let mut legacy = self.clone();
        legacy.schema = None;
        legacy.columns = schema.legacy_columns.iter().map(|c| c.to_string()).collect();
        legacy.filters = self
            .filters
            .iter()
            .map(|f| f.with_column(&rename(f.column())))
            .filter(|f| known(f.column()))
            .collect();
        legacy.order = self
            .order
            .as_ref()
            .map(|(c, d)| (rename(c), *d))
            .filter(|(c, _)| known(c));
        legacy.operation = match &self.operation {
            Operation::Insert(row) => Operation::Insert(legacy_row(row, &rename, &known)),
            Operation::Upsert(row) => Operation::Upsert(legacy_row(row, &rename, &known)),
            Operation::Update(patch) => {
                let patch = legacy_row(patch, &rename, &known);
                if patch.is_empty() {
                    return None;
                }
                Operation::Update(patch)
            }
            other => other.clone(),
        };
        Some(legacy)
    }
}

fn legacy_row(
    row: &Map<String, Value>,
    rename: &impl Fn(&str) -> String,
    known: &impl Fn(&str) -> bool,
) -> Map<String, Value> {
    row.iter()
        .map(|(k, v)| (rename(k), v.clone()))
        .filter(|(k, _)| known(k))
        .collect()
}

/// Converte um payload serializável em mapa de colunas, descartando os `null` ausentes.
pub fn to_row<T: serde::Serialize>(payload: &T) -> Map<String, Value> {
    match serde_json::to_value(payload) {
        Ok(Value::Object(map)) => map,
        _ => Map::new(),
    }
}
