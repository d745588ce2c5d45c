// src/db/pg_backend.rs

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use sqlx::{types::Json, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::{
    common::db_utils::{map_sqlx_error, quote_ident, set_rls_org},
    db::{
        backend::QueryBackend,
        query::{BackendError, Direction, Filter, Operation, Query},
    },
};

/// Backend Postgres. Os valores chegam como JSON e são tipados pelo próprio banco com
/// `jsonb_populate_record(null::<tabela>, ..)`, e as linhas voltam com `to_jsonb`.
#[derive(Clone)]
pub struct PgBackend {
    pool: PgPool,
}

impl PgBackend {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl QueryBackend for PgBackend {
    async fn execute(&self, query: &Query) -> Result<Vec<Value>, BackendError> {
        let mut builder = build_statement(query)?;

        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;
        if let Some(org_id) = query.org_scope {
            set_rls_org(&mut *tx, org_id).await.map_err(map_sqlx_error)?;
        }

        let rows: Vec<(Json<Value>,)> = builder
            .build_query_as()
            .fetch_all(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;

        tx.commit().await.map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(|(Json(row),)| row).collect())
    }

    async fn set_current_org(&self, org_id: Uuid) -> Result<(), BackendError> {
        sqlx::query("SELECT set_current_org($1)")
            .bind(org_id)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(())
    }
}

fn build_statement(query: &Query) -> Result<QueryBuilder<'static, Postgres>, BackendError> {
    let table = quote_ident(&query.table)?;
    let returning = projection(&query.columns)?;
    let mut qb: QueryBuilder<'static, Postgres> = QueryBuilder::new("");

    match &query.operation {
        Operation::Select => {
            qb.push(format!("SELECT to_jsonb(r) FROM (SELECT {returning} FROM {table}"));
            push_where(&mut qb, query)?;
            push_order_limit(&mut qb, query)?;
            qb.push(") r");
        }
        Operation::Count => {
            qb.push(format!("SELECT jsonb_build_object('count', count(*)) FROM {table}"));
            push_where(&mut qb, query)?;
        }
        Operation::Insert(row) | Operation::Upsert(row) => {
            let keys = quoted_keys(row)?;
            qb.push(format!(
                "WITH r AS (INSERT INTO {table} ({keys}) SELECT {keys} FROM jsonb_populate_record(null::{table}, "
            ));
            qb.push_bind(Json(Value::Object(row.clone())));
            qb.push(")");
            if matches!(query.operation, Operation::Upsert(_)) {
                let updates = row
                    .keys()
                    .filter(|k| k.as_str() != "id")
                    .map(|k| quote_ident(k).map(|q| format!("{q} = EXCLUDED.{q}")))
                    .collect::<Result<Vec<_>, _>>()?;
                if updates.is_empty() {
                    qb.push(" ON CONFLICT (\"id\") DO NOTHING");
                } else {
                    qb.push(format!(" ON CONFLICT (\"id\") DO UPDATE SET {}", updates.join(", ")));
                }
            }
            qb.push(format!(" RETURNING {returning}) SELECT to_jsonb(r) FROM r"));
        }
        Operation::Update(patch) => {
            if query.filters.is_empty() {
                return Err(unfiltered(query));
            }
            let keys = quoted_keys(patch)?;
            let target = if patch.len() == 1 { keys.clone() } else { format!("({keys})") };
            qb.push(format!(
                "WITH r AS (UPDATE {table} SET {target} = (SELECT {keys} FROM jsonb_populate_record(null::{table}, "
            ));
            qb.push_bind(Json(Value::Object(patch.clone())));
            qb.push("))");
            push_where(&mut qb, query)?;
            qb.push(format!(" RETURNING {returning}) SELECT to_jsonb(r) FROM r"));
        }
        Operation::Delete => {
            if query.filters.is_empty() {
                return Err(unfiltered(query));
            }
            qb.push(format!("WITH r AS (DELETE FROM {table}"));
            push_where(&mut qb, query)?;
            qb.push(" RETURNING \"id\") SELECT to_jsonb(r) FROM r");
        }
    }

    Ok(qb)
}

fn projection(columns: &[String]) -> Result<String, BackendError> {
    if columns.is_empty() {
        return Ok("*".to_string());
    }
    Ok(columns
        .iter()
        .map(|c| quote_ident(c))
        .collect::<Result<Vec<_>, _>>()?
        .join(", "))
}

fn quoted_keys(row: &Map<String, Value>) -> Result<String, BackendError> {
    if row.is_empty() {
        return Err(BackendError::new(Some("42601"), Some(400), "payload vazio"));
    }
    Ok(row
        .keys()
        .map(|k| quote_ident(k))
        .collect::<Result<Vec<_>, _>>()?
        .join(", "))
}

fn unfiltered(query: &Query) -> BackendError {
    BackendError::new(
        Some("21000"),
        Some(400),
        format!("{} sem filtro em {} recusado", query.operation.name(), query.table),
    )
}

// Valor tipado pela coluna da própria tabela: (jsonb_populate_record(null::"t", $n))."col"
fn push_typed_value(
    qb: &mut QueryBuilder<'static, Postgres>,
    table: &str,
    column: &str,
    value: &Value,
) {
    qb.push(format!("(jsonb_populate_record(null::{table}, "));
    qb.push_bind(Json(json!({ column: value })));
    qb.push(format!(")).\"{column}\""));
}

fn push_where(qb: &mut QueryBuilder<'static, Postgres>, query: &Query) -> Result<(), BackendError> {
    let table = quote_ident(&query.table)?;

    for (i, filter) in query.filters.iter().enumerate() {
        qb.push(if i == 0 { " WHERE " } else { " AND " });
        let column = quote_ident(filter.column())?;
        let raw = filter.column();

        match filter {
            Filter::Eq(_, value) => {
                qb.push(format!("{column} = "));
                push_typed_value(qb, &table, raw, value);
            }
            Filter::Neq(_, value) => {
                qb.push(format!("{column} IS DISTINCT FROM "));
                push_typed_value(qb, &table, raw, value);
            }
            Filter::Gte(_, value) => {
                qb.push(format!("{column} >= "));
                push_typed_value(qb, &table, raw, value);
            }
            Filter::Lte(_, value) => {
                qb.push(format!("{column} <= "));
                push_typed_value(qb, &table, raw, value);
            }
            Filter::IsNull(_) => {
                qb.push(format!("{column} IS NULL"));
            }
            Filter::In(_, values) if values.is_empty() => {
                qb.push("FALSE");
            }
            Filter::In(_, values) => {
                qb.push(format!(
                    "{column} IN (SELECT (jsonb_populate_record(null::{table}, jsonb_build_object("
                ));
                qb.push_bind(raw.to_string());
                qb.push("::text, e))).");
                qb.push(format!("{column} FROM jsonb_array_elements("));
                qb.push_bind(Json(Value::Array(values.clone())));
                qb.push(") AS e)");
            }
        }
    }
    Ok(())
}

fn push_order_limit(qb: &mut QueryBuilder<'static, Postgres>, query: &Query) -> Result<(), BackendError> {
    if let Some((column, direction)) = &query.order {
        let column = quote_ident(column)?;
        let direction = match direction {
            Direction::Asc => "ASC NULLS LAST",
            Direction::Desc => "DESC NULLS LAST",
        };
        qb.push(format!(" ORDER BY {column} {direction}"));
    }
    if let Some(limit) = query.limit {
        qb.push(" LIMIT ");
        qb.push_bind(limit);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::schema::EQUIPMENT;

    #[test]
    fn select_is_wrapped_in_to_jsonb() {
        let query = Query::from_schema(&EQUIPMENT)
            .is_null("deleted_at")
            .eq("status", "ATIVO")
            .order("created_at", Direction::Desc)
            .limit(10);
        let sql = build_statement(&query).unwrap().sql().to_string();

        assert!(sql.starts_with("SELECT to_jsonb(r) FROM (SELECT \"id\", \"codigo\""));
        assert!(sql.contains("WHERE \"deleted_at\" IS NULL AND \"status\" = (jsonb_populate_record(null::\"equipamentos\", $1)).\"status\""));
        assert!(sql.contains("ORDER BY \"created_at\" DESC NULLS LAST LIMIT $2"));
    }

    #[test]
    fn update_without_filter_is_refused() {
        let mut patch = Map::new();
        patch.insert("nome".into(), json!("x"));
        let query = Query::from_schema(&EQUIPMENT).update(patch);
        assert!(build_statement(&query).is_err());
    }

    #[test]
    fn single_column_update_uses_plain_assignment() {
        let mut patch = Map::new();
        patch.insert("nome".into(), json!("x"));
        let query = Query::from_schema(&EQUIPMENT).update(patch).eq("id", "abc");
        let sql = build_statement(&query).unwrap().sql().to_string();
        assert!(sql.contains("SET \"nome\" = (SELECT \"nome\" FROM jsonb_populate_record"));
    }

    #[test]
    fn empty_in_list_matches_nothing() {
        let query = Query::from_schema(&EQUIPMENT).in_list::<String>("id", Vec::new());
        let sql = build_statement(&query).unwrap().sql().to_string();
        assert!(sql.contains("WHERE FALSE"));
    }
}
