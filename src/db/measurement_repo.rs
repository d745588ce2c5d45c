// src/db/measurement_repo.rs

use serde_json::{json, Map, Value};
use uuid::Uuid;

use crate::{
    common::{datetime::now_utc, error::AppError},
    db::{
        guard::QueryGuard,
        query::{Direction, Query},
        schema::MEASUREMENT,
    },
    models::{
        auth::Caller,
        measurement::{Measurement, MeasurementFilters},
    },
};

#[derive(Clone)]
pub struct MeasurementRepository {
    guard: QueryGuard,
}

impl MeasurementRepository {
    pub fn new(guard: QueryGuard) -> Self {
        Self { guard }
    }

    /// `equipment_ids = Some(..)` é a visão do USER; `user_id` filtra por quem mediu.
    pub async fn list(
        &self,
        caller: &Caller,
        filters: &MeasurementFilters,
        include_deleted: bool,
        user_id: Option<Uuid>,
        equipment_ids: Option<&[Uuid]>,
    ) -> Result<Vec<Measurement>, AppError> {
        let mut query = Query::from_schema(&MEASUREMENT).order(MEASUREMENT.recency_column, Direction::Desc);
        if !include_deleted {
            query = query.is_null("deleted_at");
        }
        if let Some(equipment_id) = filters.equipamento_id {
            query = query.eq("equipamento_id", equipment_id.to_string());
        }
        if let Some(site_id) = filters.obra_id {
            query = query.eq("obra_id", site_id.to_string());
        }
        if let Some(from) = filters.from {
            query = query.gte("medido_em", from.to_rfc3339());
        }
        if let Some(to) = filters.to {
            query = query.lte("medido_em", to.to_rfc3339());
        }
        if let Some(user_id) = user_id {
            query = query.eq("user_id", user_id.to_string());
        }
        if let Some(ids) = equipment_ids {
            query = query.in_list("equipamento_id", ids.iter().map(|id| id.to_string()));
        }
        self.guard.run(caller, "medicoes.list", query).fetch_all().await
    }

    pub async fn find_by_id(&self, caller: &Caller, id: Uuid) -> Result<Option<Measurement>, AppError> {
        let query = Query::from_schema(&MEASUREMENT).eq("id", id.to_string()).limit(1);
        self.guard.run(caller, "medicoes.get", query).fetch_optional().await
    }

    pub async fn create(&self, caller: &Caller, row: Map<String, Value>) -> Result<Measurement, AppError> {
        let query = Query::from_schema(&MEASUREMENT).insert(row);
        self.guard.run(caller, "medicoes.create", query).fetch_one().await
    }

    pub async fn update(
        &self,
        caller: &Caller,
        id: Uuid,
        patch: Map<String, Value>,
    ) -> Result<Measurement, AppError> {
        let query = Query::from_schema(&MEASUREMENT).update(patch).eq("id", id.to_string());
        self.guard.run(caller, "medicoes.update", query).fetch_one().await
    }

    /// Soft delete; bancos sem `deleted_at` caem na remoção física.
    pub async fn soft_delete(&self, caller: &Caller, id: Uuid) -> Result<usize, AppError> {
        let now = now_utc();
        let mut patch = Map::new();
        patch.insert("deleted_at".into(), json!(now));
        patch.insert("updated_at".into(), json!(now));

        let soft = Query::from_schema(&MEASUREMENT)
            .select(&["id"])
            .update(patch)
            .eq("id", id.to_string())
            .is_null("deleted_at");
        let hard = Query::from_schema(&MEASUREMENT).delete().eq("id", id.to_string());

        self.guard
            .run(caller, "medicoes.delete", soft)
            .or_fallback(hard)
            .execute()
            .await
    }

    /// Medições não removidas que apontam para `column = id`.
    pub async fn count_live_by(&self, caller: &Caller, column: &str, id: Uuid) -> Result<i64, AppError> {
        let query = Query::from_schema(&MEASUREMENT)
            .count()
            .eq(column, id.to_string())
            .is_null("deleted_at");
        self.guard.run(caller, "medicoes.count_live", query).count().await
    }

    pub async fn count(&self, caller: &Caller, equipment_ids: Option<&[Uuid]>) -> Result<i64, AppError> {
        let mut query = Query::from_schema(&MEASUREMENT).count().is_null("deleted_at");
        if let Some(ids) = equipment_ids {
            query = query.in_list("equipamento_id", ids.iter().map(|id| id.to_string()));
        }
        self.guard.run(caller, "medicoes.count", query).count().await
    }
}
