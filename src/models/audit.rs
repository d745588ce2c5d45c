// src/models/audit.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Info,
    Warn,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    Create,
    Update,
    Delete,
    SoftDelete,
    Encerrar,
    Inativar,
    Upload,
    Logout,
    Reassign,
    Error,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::Create => "CREATE",
            AuditAction::Update => "UPDATE",
            AuditAction::Delete => "DELETE",
            AuditAction::SoftDelete => "SOFT_DELETE",
            AuditAction::Encerrar => "ENCERRAR",
            AuditAction::Inativar => "INATIVAR",
            AuditAction::Upload => "UPLOAD",
            AuditAction::Logout => "LOGOUT",
            AuditAction::Reassign => "REASSIGN",
            AuditAction::Error => "ERROR",
        }
    }

    /// Ações destrutivas são sempre gravadas como WARN, qualquer que seja a severidade pedida.
    pub fn is_destructive(&self) -> bool {
        matches!(
            self,
            AuditAction::Delete | AuditAction::SoftDelete | AuditAction::Encerrar | AuditAction::Inativar
        )
    }
}

/// Evento a ser auditado. `entity` é o nome da tabela ("equipamentos") ou um contexto
/// ("equipamentos.validation").
#[derive(Debug, Clone)]
pub struct AuditEvent {
    pub action: AuditAction,
    pub entity: String,
    pub entity_id: Option<String>,
    pub severity: Option<Severity>,
    pub details: Option<Value>,
    pub before: Option<Value>,
    pub after: Option<Value>,
}

impl AuditEvent {
    pub fn new(action: AuditAction, entity: impl Into<String>) -> Self {
        Self {
            action,
            entity: entity.into(),
            entity_id: None,
            severity: None,
            details: None,
            before: None,
            after: None,
        }
    }

    pub fn entity_id(mut self, id: impl ToString) -> Self {
        self.entity_id = Some(id.to_string());
        self
    }

    pub fn severity(mut self, severity: Severity) -> Self {
        self.severity = Some(severity);
        self
    }

    pub fn details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn before(mut self, before: impl Serialize) -> Self {
        self.before = serde_json::to_value(before).ok();
        self
    }

    pub fn after(mut self, after: impl Serialize) -> Self {
        self.after = serde_json::to_value(after).ok();
        self
    }

    pub fn effective_severity(&self) -> Severity {
        if self.action.is_destructive() {
            Severity::Warn
        } else {
            self.severity.unwrap_or(Severity::Info)
        }
    }
}

// Linha de `audit_log`
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AuditLogEntry {
    pub id: Uuid,
    #[serde(default)]
    pub user_id: Option<Uuid>,
    #[serde(alias = "org_id", default)]
    pub organization_id: Option<Uuid>,
    pub action: String,
    #[serde(default)]
    pub payload: Value,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
pub struct AuditQuery {
    /// Quantidade de linhas (padrão 20, máximo 200)
    pub limit: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn destructive_actions_are_always_warn() {
        let event = AuditEvent::new(AuditAction::SoftDelete, "equipamentos").severity(Severity::Info);
        assert_eq!(event.effective_severity(), Severity::Warn);

        let event = AuditEvent::new(AuditAction::Encerrar, "vinculos").severity(Severity::Error);
        assert_eq!(event.effective_severity(), Severity::Warn);

        let event = AuditEvent::new(AuditAction::Create, "obras");
        assert_eq!(event.effective_severity(), Severity::Info);

        let event = AuditEvent::new(AuditAction::Error, "medicoes.list").severity(Severity::Error);
        assert_eq!(event.effective_severity(), Severity::Error);
    }
}
