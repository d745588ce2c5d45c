// src/models/dashboard.rs

use serde::Serialize;
use utoipa::ToSchema;

// Contadores da tela inicial, já restritos ao que o chamador enxerga
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct DashboardSummary {
    pub equipamentos: i64,
    pub obras: i64,
    pub vinculos_ativos: i64,
    pub medicoes: i64,
}
