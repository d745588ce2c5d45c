// src/db/equipment_repo.rs

use serde_json::{Map, Value};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::{
        guard::QueryGuard,
        query::{Direction, Query, UNIQUE_VIOLATION},
        schema::EQUIPMENT,
    },
    models::{auth::Caller, equipment::Equipment},
};

// Índice `equipamentos_codigo_por_org`: a checagem prévia do serviço não cobre corrida.
fn unique_code(err: AppError, code: Option<&str>) -> AppError {
    match (err, code) {
        (AppError::Backend(e), Some(code)) if e.code.as_deref() == Some(UNIQUE_VIOLATION) => {
            AppError::DuplicateCode { code: code.to_string() }
        }
        (other, _) => other,
    }
}

fn row_code(row: &Map<String, Value>) -> Option<&str> {
    row.get("codigo").and_then(Value::as_str)
}

#[derive(Clone)]
pub struct EquipmentRepository {
    guard: QueryGuard,
}

impl EquipmentRepository {
    pub fn new(guard: QueryGuard) -> Self {
        Self { guard }
    }

    fn base(include_deleted: bool) -> Query {
        let query = Query::from_schema(&EQUIPMENT).order(EQUIPMENT.recency_column, Direction::Desc);
        if include_deleted { query } else { query.is_null("deleted_at") }
    }

    /// `only_ids = Some(..)` restringe a lista (visão do USER).
    pub async fn list(
        &self,
        caller: &Caller,
        include_deleted: bool,
        only_ids: Option<&[Uuid]>,
    ) -> Result<Vec<Equipment>, AppError> {
        let mut query = Self::base(include_deleted);
        if let Some(ids) = only_ids {
            query = query.in_list("id", ids.iter().map(|id| id.to_string()));
        }
        self.guard.run(caller, "equipamentos.list", query).fetch_all().await
    }

    pub async fn find_by_id(&self, caller: &Caller, id: Uuid) -> Result<Option<Equipment>, AppError> {
        let query = Query::from_schema(&EQUIPMENT).eq("id", id.to_string()).limit(1);
        self.guard.run(caller, "equipamentos.get", query).fetch_optional().await
    }

    /// Equipamento não removido com este código, na organização do chamador.
    pub async fn find_live_by_code(&self, caller: &Caller, code: &str) -> Result<Option<Equipment>, AppError> {
        let query = Query::from_schema(&EQUIPMENT).eq("codigo", code).is_null("deleted_at").limit(1);
        self.guard.run(caller, "equipamentos.by_code", query).fetch_optional().await
    }

    pub async fn create(&self, caller: &Caller, row: Map<String, Value>) -> Result<Equipment, AppError> {
        let code = row_code(&row).map(str::to_string);
        let query = Query::from_schema(&EQUIPMENT).insert(row);
        self.guard
            .run(caller, "equipamentos.create", query)
            .fetch_one()
            .await
            .map_err(|e| unique_code(e, code.as_deref()))
    }

    pub async fn update(
        &self,
        caller: &Caller,
        id: Uuid,
        patch: Map<String, Value>,
    ) -> Result<Equipment, AppError> {
        let code = row_code(&patch).map(str::to_string);
        let query = Query::from_schema(&EQUIPMENT).update(patch).eq("id", id.to_string());
        self.guard
            .run(caller, "equipamentos.update", query)
            .fetch_one()
            .await
            .map_err(|e| unique_code(e, code.as_deref()))
    }

    pub async fn count(&self, caller: &Caller, only_ids: Option<&[Uuid]>) -> Result<i64, AppError> {
        let mut query = Query::from_schema(&EQUIPMENT).count().is_null("deleted_at");
        if let Some(ids) = only_ids {
            query = query.in_list("id", ids.iter().map(|id| id.to_string()));
        }
        self.guard.run(caller, "equipamentos.count", query).count().await
    }
}
