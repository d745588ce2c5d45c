// src/db/site_repo.rs

use serde_json::{Map, Value};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::{
        guard::QueryGuard,
        query::{Direction, Query},
        schema::SITE,
    },
    models::{auth::Caller, site::Site},
};

#[derive(Clone)]
pub struct SiteRepository {
    guard: QueryGuard,
}

impl SiteRepository {
    pub fn new(guard: QueryGuard) -> Self {
        Self { guard }
    }

    pub async fn list(
        &self,
        caller: &Caller,
        include_deleted: bool,
        only_ids: Option<&[Uuid]>,
    ) -> Result<Vec<Site>, AppError> {
        let mut query = Query::from_schema(&SITE).order(SITE.recency_column, Direction::Desc);
        if !include_deleted {
            query = query.is_null("deleted_at");
        }
        if let Some(ids) = only_ids {
            query = query.in_list("id", ids.iter().map(|id| id.to_string()));
        }
        self.guard.run(caller, "obras.list", query).fetch_all().await
    }

    pub async fn find_by_id(&self, caller: &Caller, id: Uuid) -> Result<Option<Site>, AppError> {
        let query = Query::from_schema(&SITE).eq("id", id.to_string()).limit(1);
        self.guard.run(caller, "obras.get", query).fetch_optional().await
    }

    pub async fn create(&self, caller: &Caller, row: Map<String, Value>) -> Result<Site, AppError> {
        let query = Query::from_schema(&SITE).insert(row);
        self.guard.run(caller, "obras.create", query).fetch_one().await
    }

    pub async fn update(&self, caller: &Caller, id: Uuid, patch: Map<String, Value>) -> Result<Site, AppError> {
        let query = Query::from_schema(&SITE).update(patch).eq("id", id.to_string());
        self.guard.run(caller, "obras.update", query).fetch_one().await
    }

    pub async fn count(&self, caller: &Caller, only_ids: Option<&[Uuid]>) -> Result<i64, AppError> {
        let mut query = Query::from_schema(&SITE).count().is_null("deleted_at");
        if let Some(ids) = only_ids {
            query = query.in_list("id", ids.iter().map(|id| id.to_string()));
        }
        self.guard.run(caller, "obras.count", query).count().await
    }
}
