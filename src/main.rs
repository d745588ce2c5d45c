//src/main.rs

use axum::{
    middleware as axum_middleware,
    routing::{get, post, put},
    Router,
};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

mod common;
mod config;
mod db;
mod docs;
mod handlers;
mod middleware;
mod models;
mod services;

use crate::config::AppState;
use crate::docs::ApiDoc;
use crate::middleware::auth::auth_guard;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .compact()
        .init();

    // Se a configuração falhar, a aplicação não deve iniciar.
    let app_state = AppState::new().await?;

    // Faz o app rodar as migrações do SQLx na inicialização
    sqlx::migrate!().run(&app_state.db_pool).await?;
    tracing::info!("✅ Migrações do banco de dados executadas com sucesso!");

    let auth_routes = Router::new()
        .route("/me", get(handlers::auth::get_me))
        .route("/auth/logout", post(handlers::auth::logout));

    let equipment_routes = Router::new()
        .route("/"
               ,get(handlers::equipment::list_equipment)
               .post(handlers::equipment::create_equipment)
        )
        .route("/{id}"
               ,put(handlers::equipment::update_equipment)
               .delete(handlers::equipment::delete_equipment)
        )
        .route("/{id}/dependencies", get(handlers::equipment::get_dependencies));

    let site_routes = Router::new()
        .route("/"
               ,get(handlers::sites::list_sites)
               .post(handlers::sites::create_site)
        )
        .route("/{id}"
               ,put(handlers::sites::update_site)
               .delete(handlers::sites::delete_site)
        );

    let assignment_routes = Router::new()
        .route("/"
               ,get(handlers::assignments::list_assignments)
               .post(handlers::assignments::create_assignment)
        )
        .route("/{id}"
               ,put(handlers::assignments::update_assignment)
               .delete(handlers::assignments::delete_assignment)
        )
        .route("/{id}/encerrar", post(handlers::assignments::end_assignment))
        .route("/{id}/termo"
               ,put(handlers::assignments::upload_document)
               .get(handlers::assignments::get_document_url)
        );

    let measurement_routes = Router::new()
        .route("/"
               ,get(handlers::measurements::list_measurements)
               .post(handlers::measurements::create_measurement)
        )
        .route("/permissao", post(handlers::measurements::check_permission))
        .route("/{id}"
               ,put(handlers::measurements::update_measurement)
               .delete(handlers::measurements::delete_measurement)
        );

    let admin_routes = Router::new()
        .route("/profiles", get(handlers::profiles::list_profiles))
        .route("/profiles/{id}/organization", put(handlers::profiles::reassign_organization))
        .route("/auditoria", get(handlers::audit::list_audit_log))
        .route("/diagnostics", get(handlers::audit::get_diagnostics))
        .route("/dashboard", get(handlers::dashboard::get_summary));

    // Tudo sob /api exige o bearer, exceto o health check
    let api_routes = Router::new()
        .merge(auth_routes)
        .merge(admin_routes)
        .nest("/equipamentos", equipment_routes)
        .nest("/obras", site_routes)
        .nest("/vinculos", assignment_routes)
        .nest("/medicoes", measurement_routes)
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            auth_guard,
        ));

    let bind_addr = app_state.config.bind_addr.clone();
    let app = Router::new()
        .route("/api/health", get(|| async { "OK" }))
        .nest("/api", api_routes)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .with_state(app_state);

    // Inicia o servidor
    let listener = TcpListener::bind(&bind_addr).await?;
    tracing::info!("🚀 Servidor escutando em {}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}
