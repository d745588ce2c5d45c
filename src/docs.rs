// src/docs.rs

use utoipa::OpenApi;
use utoipa::openapi::security::{Http, HttpAuthScheme, SecurityScheme};
use crate::common;
use crate::handlers;
use crate::models;

#[derive(OpenApi)]
#[openapi(
    paths(
        // --- Auth ---
        handlers::auth::get_me,
        handlers::auth::logout,

        // --- Equipamentos ---
        handlers::equipment::list_equipment,
        handlers::equipment::create_equipment,
        handlers::equipment::update_equipment,
        handlers::equipment::delete_equipment,
        handlers::equipment::get_dependencies,

        // --- Obras ---
        handlers::sites::list_sites,
        handlers::sites::create_site,
        handlers::sites::update_site,
        handlers::sites::delete_site,

        // --- Vínculos ---
        handlers::assignments::list_assignments,
        handlers::assignments::create_assignment,
        handlers::assignments::update_assignment,
        handlers::assignments::delete_assignment,
        handlers::assignments::end_assignment,
        handlers::assignments::upload_document,
        handlers::assignments::get_document_url,

        // --- Medições ---
        handlers::measurements::list_measurements,
        handlers::measurements::create_measurement,
        handlers::measurements::update_measurement,
        handlers::measurements::delete_measurement,
        handlers::measurements::check_permission,

        // --- Perfis ---
        handlers::profiles::list_profiles,
        handlers::profiles::reassign_organization,

        // --- Auditoria ---
        handlers::audit::list_audit_log,
        handlers::audit::get_diagnostics,

        // --- Dashboard ---
        handlers::dashboard::get_summary,
    ),
    components(
        schemas(
            // --- Auth / Perfis ---
            models::auth::Identity,
            models::auth::LogoutResponse,
            models::tenancy::Role,
            models::tenancy::TenantContext,
            models::tenancy::Organization,
            models::profile::Profile,
            models::profile::MeResponse,
            models::profile::ReassignOrganizationPayload,

            // --- Equipamentos ---
            models::equipment::EquipmentStatus,
            models::equipment::EquipmentType,
            models::equipment::Equipment,
            models::equipment::CreateEquipmentPayload,
            models::equipment::UpdateEquipmentPayload,
            models::equipment::Dependencies,

            // --- Obras ---
            models::site::SiteStatus,
            models::site::Site,
            models::site::CreateSitePayload,
            models::site::UpdateSitePayload,

            // --- Vínculos ---
            models::assignment::AssignmentStatus,
            models::assignment::Assignment,
            models::assignment::RefSummary,
            models::assignment::AssignmentView,
            models::assignment::CreateAssignmentPayload,
            models::assignment::UpdateAssignmentPayload,
            models::assignment::EndAssignmentPayload,
            models::assignment::DocumentUrl,

            // --- Medições ---
            models::measurement::Measurement,
            models::measurement::CreateMeasurementPayload,
            models::measurement::UpdateMeasurementPayload,
            models::measurement::PermissionCheckPayload,
            models::measurement::MeasurementPermission,

            // --- Auditoria ---
            models::audit::Severity,
            models::audit::AuditLogEntry,
            common::diagnostics::DiagnosticError,
            common::diagnostics::DiagnosticEvent,
            common::diagnostics::DiagnosticsSnapshot,

            // --- Dashboard ---
            models::dashboard::DashboardSummary,
        )
    ),
    tags(
        (name = "Auth", description = "Sessão e Perfil do Usuário"),
        (name = "Equipamentos", description = "Cadastro de Equipamentos de Medição"),
        (name = "Obras", description = "Cadastro de Obras"),
        (name = "Vínculos", description = "Custódia de Equipamentos e Termos"),
        (name = "Medições", description = "Registro de Medições"),
        (name = "Perfis", description = "Administração de Perfis"),
        (name = "Auditoria", description = "Trilha de Auditoria e Diagnóstico"),
        (name = "Dashboard", description = "Indicadores")
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "api_jwt",
            SecurityScheme::Http(
                Http::new(HttpAuthScheme::Bearer)
            ),
        );
    }
}
