// src/db/assignment_repo.rs

use serde_json::{Map, Value};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::{
        guard::QueryGuard,
        query::{Direction, Query, UNIQUE_VIOLATION},
        schema::ASSIGNMENT,
    },
    models::{
        assignment::{Assignment, AssignmentFilters, AssignmentStatus},
        auth::Caller,
    },
};

#[derive(Debug, Clone, Default)]
pub struct Reach {
    pub equipment_ids: Vec<Uuid>,
    pub site_ids: Vec<Uuid>,
}

#[derive(Clone)]
pub struct AssignmentRepository {
    guard: QueryGuard,
}

// O índice único parcial garante o que a checagem prévia não consegue sob concorrência.
fn unique_active(err: AppError, equipment_id: Uuid) -> AppError {
    match err {
        AppError::Backend(e) if e.code.as_deref() == Some(UNIQUE_VIOLATION) => {
            AppError::DuplicateActiveAssignment { equipment_id }
        }
        other => other,
    }
}

impl AssignmentRepository {
    pub fn new(guard: QueryGuard) -> Self {
        Self { guard }
    }

    /// `only_user` restringe aos vínculos do próprio USER.
    pub async fn list(
        &self,
        caller: &Caller,
        filters: &AssignmentFilters,
        include_deleted: bool,
        only_user: Option<Uuid>,
    ) -> Result<Vec<Assignment>, AppError> {
        let mut query = Query::from_schema(&ASSIGNMENT).order(ASSIGNMENT.recency_column, Direction::Desc);
        if !include_deleted {
            query = query.is_null("deleted_at");
        }
        if let Some(equipment_id) = filters.equipamento_id {
            query = query.eq("equipamento_id", equipment_id.to_string());
        }
        if let Some(site_id) = filters.obra_id {
            query = query.eq("obra_id", site_id.to_string());
        }
        if let Some(user_id) = only_user.or(filters.user_id) {
            query = query.eq("user_id", user_id.to_string());
        }
        self.guard.run(caller, "vinculos.list", query).fetch_all().await
    }

    pub async fn find_by_id(&self, caller: &Caller, id: Uuid) -> Result<Option<Assignment>, AppError> {
        let query = Query::from_schema(&ASSIGNMENT).eq("id", id.to_string()).limit(1);
        self.guard.run(caller, "vinculos.get", query).fetch_optional().await
    }

    /// Vínculos ATIVOS do equipamento, fora `except` (o próprio vínculo numa edição).
    pub async fn active_for_equipment(
        &self,
        caller: &Caller,
        equipment_id: Uuid,
        except: Option<Uuid>,
    ) -> Result<Vec<Assignment>, AppError> {
        let mut query = Query::from_schema(&ASSIGNMENT)
            .eq("equipamento_id", equipment_id.to_string())
            .eq("status", AssignmentStatus::Active.as_str())
            .is_null("deleted_at");
        if let Some(id) = except {
            query = query.neq("id", id.to_string());
        }
        self.guard.run(caller, "vinculos.active_for_equipment", query).fetch_all().await
    }

    pub async fn active_for(
        &self,
        caller: &Caller,
        equipment_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Assignment>, AppError> {
        let query = Query::from_schema(&ASSIGNMENT)
            .eq("equipamento_id", equipment_id.to_string())
            .eq("user_id", user_id.to_string())
            .eq("status", AssignmentStatus::Active.as_str())
            .is_null("deleted_at")
            .order("inicio_em", Direction::Desc)
            .limit(1);
        self.guard.run(caller, "vinculos.active_for", query).fetch_optional().await
    }

    /// Todos os vínculos que o usuário já teve (ativos ou encerrados), sem os removidos.
    pub async fn ever_held(&self, caller: &Caller, user_id: Uuid) -> Result<Vec<Assignment>, AppError> {
        let query = Query::from_schema(&ASSIGNMENT)
            .select(&["id", "equipamento_id", "obra_id", "user_id", "status", "deleted_at", "organization_id"])
            .eq("user_id", user_id.to_string())
            .is_null("deleted_at");
        self.guard.run(caller, "vinculos.ever_held", query).fetch_all().await
    }

    /// Equipamentos e obras alcançáveis pelo usuário através dos vínculos que já teve.
    pub async fn reach(&self, caller: &Caller, user_id: Uuid) -> Result<Reach, AppError> {
        let held = self.ever_held(caller, user_id).await?;
        let mut reach = Reach::default();
        for assignment in held {
            if !reach.equipment_ids.contains(&assignment.equipment_id) {
                reach.equipment_ids.push(assignment.equipment_id);
            }
            if let Some(site_id) = assignment.site_id {
                if !reach.site_ids.contains(&site_id) {
                    reach.site_ids.push(site_id);
                }
            }
        }
        Ok(reach)
    }

    pub async fn create(
        &self,
        caller: &Caller,
        equipment_id: Uuid,
        row: Map<String, Value>,
    ) -> Result<Assignment, AppError> {
        let query = Query::from_schema(&ASSIGNMENT).insert(row);
        self.guard
            .run(caller, "vinculos.create", query)
            .fetch_one()
            .await
            .map_err(|e| unique_active(e, equipment_id))
    }

    pub async fn update(
        &self,
        caller: &Caller,
        id: Uuid,
        equipment_id: Uuid,
        patch: Map<String, Value>,
    ) -> Result<Assignment, AppError> {
        let query = Query::from_schema(&ASSIGNMENT).update(patch).eq("id", id.to_string());
        self.guard
            .run(caller, "vinculos.update", query)
            .fetch_one()
            .await
            .map_err(|e| unique_active(e, equipment_id))
    }

    /// Vínculos ATIVOS não removidos que apontam para `column = id` (equipamento ou obra).
    pub async fn count_active_by(&self, caller: &Caller, column: &str, id: Uuid) -> Result<i64, AppError> {
        let query = Query::from_schema(&ASSIGNMENT)
            .count()
            .eq(column, id.to_string())
            .eq("status", AssignmentStatus::Active.as_str())
            .is_null("deleted_at");
        self.guard.run(caller, "vinculos.count_active", query).count().await
    }

    pub async fn count_active(&self, caller: &Caller, only_user: Option<Uuid>) -> Result<i64, AppError> {
        let mut query = Query::from_schema(&ASSIGNMENT)
            .count()
            .eq("status", AssignmentStatus::Active.as_str())
            .is_null("deleted_at");
        if let Some(user_id) = only_user {
            query = query.eq("user_id", user_id.to_string());
        }
        self.guard.run(caller, "vinculos.count", query).count().await
    }
}
