pub mod assignment_service;
pub mod audit_service;
pub mod auth;
pub mod dashboard_service;
pub mod equipment_service;
pub mod measurement_service;
pub mod profile_service;
pub mod site_service;
pub mod tenancy_service;
