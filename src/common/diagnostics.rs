// Ring buffers de erros e eventos recentes, para inspeção pelo ADMIN.

use std::collections::VecDeque;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

pub const DEFAULT_MAX_ERRORS: usize = 50;
pub const DEFAULT_MAX_EVENTS: usize = 100;

#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct DiagnosticError {
    pub at: DateTime<Utc>,
    pub context: String,
    pub message: String,
    pub code: Option<String>,
    pub correlation_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct DiagnosticEvent {
    pub at: DateTime<Utc>,
    pub level: String,
    pub context: String,
    pub message: String,
    pub code: Option<String>,
    pub correlation_id: Option<String>,
    pub details: Option<Value>,
}

#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct DiagnosticsSnapshot {
    pub errors: Vec<DiagnosticError>,
    pub events: Vec<DiagnosticEvent>,
}

/// Mais recente primeiro; o tamanho é limitado a cada inserção.
#[derive(Debug)]
pub struct Diagnostics {
    errors: Mutex<VecDeque<DiagnosticError>>,
    events: Mutex<VecDeque<DiagnosticEvent>>,
    max_errors: usize,
    max_events: usize,
}

impl Default for Diagnostics {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ERRORS, DEFAULT_MAX_EVENTS)
    }
}

impl Diagnostics {
    pub fn new(max_errors: usize, max_events: usize) -> Self {
        Self {
            errors: Mutex::new(VecDeque::with_capacity(max_errors)),
            events: Mutex::new(VecDeque::with_capacity(max_events)),
            max_errors: max_errors.max(1),
            max_events: max_events.max(1),
        }
    }

    pub fn add_error(&self, context: &str, message: &str, code: Option<&str>, correlation_id: Option<&str>) {
        tracing::error!(context, code, correlation_id, "{}", message);
        let entry = DiagnosticError {
            at: Utc::now(),
            context: context.to_string(),
            message: message.to_string(),
            code: code.map(str::to_string),
            correlation_id: correlation_id.map(str::to_string),
        };
        // Um lock envenenado só significa que outra thread entrou em pânico no meio de um push.
        let mut errors = self.errors.lock().unwrap_or_else(|e| e.into_inner());
        errors.push_front(entry);
        errors.truncate(self.max_errors);
    }

    pub fn add_event(&self, event: DiagnosticEvent) {
        let mut events = self.events.lock().unwrap_or_else(|e| e.into_inner());
        events.push_front(event);
        events.truncate(self.max_events);
    }

    /// Registro de uma consulta ao backend: sempre um evento, com o código do erro se houver.
    pub fn record_query(&self, context: &str, code: Option<&str>, correlation_id: Option<&str>) {
        self.add_event(DiagnosticEvent {
            at: Utc::now(),
            level: if code.is_some() { "ERROR" } else { "INFO" }.to_string(),
            context: context.to_string(),
            message: format!("query {}", if code.is_some() { "failed" } else { "ok" }),
            code: code.map(str::to_string),
            correlation_id: correlation_id.map(str::to_string),
            details: None,
        });
    }

    pub fn snapshot(&self) -> DiagnosticsSnapshot {
        let errors = self.errors.lock().unwrap_or_else(|e| e.into_inner());
        let events = self.events.lock().unwrap_or_else(|e| e.into_inner());
        DiagnosticsSnapshot {
            errors: errors.iter().cloned().collect(),
            events: events.iter().cloned().collect(),
        }
    }
}
