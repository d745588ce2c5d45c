// src/config.rs

use std::{env, sync::Arc, time::Duration};

use sqlx::{postgres::PgPoolOptions, PgPool};

use crate::{
    common::{diagnostics::Diagnostics, error::AppError},
    db::{
        backend::{BlobStorage, QueryBackend},
        audit_repo::AuditRepository,
        guard::QueryGuard,
        local_storage::LocalBlobStorage,
        pg_backend::PgBackend,
    },
    services::{
        assignment_service::AssignmentService, audit_service::AuditRecorder, auth::AuthService,
        dashboard_service::DashboardService, equipment_service::EquipmentService,
        measurement_service::MeasurementService, profile_service::ProfileService,
        site_service::SiteService, tenancy_service::TenantResolver,
    },
};

const PLACEHOLDER_MARKERS: [&str; 4] = ["YOUR_", "REPLACE_", "CHANGE_ME", "EXAMPLE"];

/// Configuração lida do ambiente (`.env` incluso).
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub jwt_secret: String,
    pub jwt_audience: String,
    pub query_timeout: Duration,
    pub app_version: String,
    pub default_org_name: Option<String>,
    pub storage_root: String,
    pub storage_public_url: String,
    pub diag_max_errors: usize,
    pub diag_max_events: usize,
    pub bind_addr: String,
}

fn required(name: &str) -> Result<String, AppError> {
    let value = env::var(name).map_err(|_| AppError::Config(format!("{name} deve ser definida")))?;
    let value = value.trim().to_string();
    if value.is_empty() {
        return Err(AppError::Config(format!("{name} está vazia")));
    }
    let upper = value.to_uppercase();
    if PLACEHOLDER_MARKERS.iter().any(|m| upper.contains(m)) {
        return Err(AppError::Config(format!("{name} ainda contém um valor de exemplo")));
    }
    Ok(value)
}

fn optional(name: &str) -> Option<String> {
    env::var(name).ok().map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn number<T: std::str::FromStr>(name: &str, default: T) -> Result<T, AppError> {
    match optional(name) {
        Some(raw) => raw
            .parse()
            .map_err(|_| AppError::Config(format!("{name} deve ser numérica (recebido {raw:?})"))),
        None => Ok(default),
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let database_url = required("DATABASE_URL")?;
        if !(database_url.starts_with("postgres://") || database_url.starts_with("postgresql://")) {
            return Err(AppError::Config("DATABASE_URL deve ser uma URL postgres://".into()));
        }

        let storage_root = optional("STORAGE_ROOT").unwrap_or_else(|| "./storage".to_string());
        Ok(Self {
            database_url,
            jwt_secret: required("JWT_SECRET")?,
            jwt_audience: optional("JWT_AUDIENCE").unwrap_or_else(|| "authenticated".to_string()),
            query_timeout: Duration::from_millis(number("QUERY_TIMEOUT_MS", 12_000u64)?),
            app_version: optional("APP_VERSION").unwrap_or_else(|| env!("CARGO_PKG_VERSION").to_string()),
            default_org_name: optional("DEFAULT_ORG_NAME"),
            // Sem URL pública configurada, o termo é entregue como caminho local.
            storage_public_url: optional("STORAGE_PUBLIC_URL")
                .unwrap_or_else(|| format!("file://{}", storage_root.trim_end_matches('/'))),
            storage_root,
            diag_max_errors: number("DIAG_MAX_ERRORS", 50usize)?,
            diag_max_events: number("DIAG_MAX_EVENTS", 100usize)?,
            bind_addr: optional("BIND_ADDR").unwrap_or_else(|| "0.0.0.0:3000".to_string()),
        })
    }
}

#[derive(Clone)]
pub struct AppState {
    pub db_pool: PgPool,
    pub config: Arc<AppConfig>,
    pub diagnostics: Arc<Diagnostics>,
    pub resolver: TenantResolver,
    pub auth_service: AuthService,
    pub profile_service: ProfileService,
    pub equipment_service: EquipmentService,
    pub site_service: SiteService,
    pub assignment_service: AssignmentService,
    pub measurement_service: MeasurementService,
    pub dashboard_service: DashboardService,
    pub audit_repo: AuditRepository,
}

impl AppState {
    pub async fn new() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        let config = AppConfig::from_env()?;

        // Conecta ao banco de dados, usando '?' para propagar erros
        let db_pool = PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(3))
            .connect(&config.database_url)
            .await?;

        tracing::info!("✅ Conexão com o banco de dados estabelecida com sucesso!");

        // --- Monta o gráfico de dependências ---
        let backend: Arc<dyn QueryBackend> = Arc::new(PgBackend::new(db_pool.clone()));
        let storage: Arc<dyn BlobStorage> = Arc::new(LocalBlobStorage::new(
            config.storage_root.clone(),
            config.storage_public_url.clone(),
        ));
        let diagnostics = Arc::new(Diagnostics::new(config.diag_max_errors, config.diag_max_events));

        let resolver = TenantResolver::new(backend.clone(), config.query_timeout);
        let audit = AuditRecorder::new(
            backend.clone(),
            resolver.clone(),
            diagnostics.clone(),
            config.app_version.clone(),
            config.query_timeout,
        );
        let guard = QueryGuard::new(backend, resolver.clone(), audit, diagnostics.clone(), config.query_timeout);

        let equipment_service = EquipmentService::new(guard.clone());
        let site_service = SiteService::new(guard.clone());
        let assignment_service = AssignmentService::new(guard.clone(), storage);
        let measurement_service = MeasurementService::new(guard.clone());
        let dashboard_service = DashboardService::new(
            equipment_service.clone(),
            site_service.clone(),
            assignment_service.clone(),
            measurement_service.clone(),
        );

        Ok(Self {
            db_pool,
            auth_service: AuthService::new(config.jwt_secret.clone(), config.jwt_audience.clone()),
            profile_service: ProfileService::new(guard.clone(), config.default_org_name.clone()),
            audit_repo: AuditRepository::new(guard),
            equipment_service,
            site_service,
            assignment_service,
            measurement_service,
            dashboard_service,
            resolver,
            diagnostics,
            config: Arc::new(config),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholders_are_rejected() {
        // SAFETY: único teste que mexe nestas variáveis
        unsafe {
            env::set_var("MEDLUX_TEST_PLACEHOLDER", "postgres://YOUR_USER@localhost/db");
            env::set_var("MEDLUX_TEST_EMPTY", "   ");
            env::set_var("MEDLUX_TEST_OK", " segredo ");
        }
        assert!(matches!(required("MEDLUX_TEST_PLACEHOLDER"), Err(AppError::Config(_))));
        assert!(matches!(required("MEDLUX_TEST_EMPTY"), Err(AppError::Config(_))));
        assert!(matches!(required("MEDLUX_TEST_MISSING"), Err(AppError::Config(_))));
        assert_eq!(required("MEDLUX_TEST_OK").unwrap(), "segredo");
        assert_eq!(number("MEDLUX_TEST_MISSING", 12_000u64).unwrap(), 12_000);
        assert!(number::<u64>("MEDLUX_TEST_OK", 1).is_err());
    }
}
