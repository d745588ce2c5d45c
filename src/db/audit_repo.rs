// src/db/audit_repo.rs

use crate::{
    common::error::AppError,
    db::{
        guard::QueryGuard,
        query::{Direction, Query},
        schema::AUDIT_LOG,
    },
    models::{audit::AuditLogEntry, auth::Caller},
};

pub const DEFAULT_AUDIT_LIMIT: i64 = 20;
pub const MAX_AUDIT_LIMIT: i64 = 200;

#[derive(Clone)]
pub struct AuditRepository {
    guard: QueryGuard,
}

impl AuditRepository {
    pub fn new(guard: QueryGuard) -> Self {
        Self { guard }
    }

    /// Últimas `limit` entradas, mais recentes primeiro.
    pub async fn recent(&self, caller: &Caller, limit: Option<i64>) -> Result<Vec<AuditLogEntry>, AppError> {
        let limit = limit.unwrap_or(DEFAULT_AUDIT_LIMIT).clamp(1, MAX_AUDIT_LIMIT);
        let query = Query::from_schema(&AUDIT_LOG)
            .order(AUDIT_LOG.recency_column, Direction::Desc)
            .limit(limit);
        self.guard.run(caller, "audit_log.list", query).fetch_all().await
    }
}
