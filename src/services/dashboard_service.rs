// src/services/dashboard_service.rs

use crate::{
    common::error::AppError,
    models::{auth::Caller, dashboard::DashboardSummary},
    services::{
        assignment_service::AssignmentService, equipment_service::EquipmentService,
        measurement_service::MeasurementService, site_service::SiteService,
    },
};

#[derive(Clone)]
pub struct DashboardService {
    equipment: EquipmentService,
    sites: SiteService,
    assignments: AssignmentService,
    measurements: MeasurementService,
}

impl DashboardService {
    pub fn new(
        equipment: EquipmentService,
        sites: SiteService,
        assignments: AssignmentService,
        measurements: MeasurementService,
    ) -> Self {
        Self { equipment, sites, assignments, measurements }
    }

    /// Contagens visíveis ao chamador (ADMIN: organização inteira; USER: o que os vínculos alcançam).
    pub async fn get_summary(&self, caller: &Caller) -> Result<DashboardSummary, AppError> {
        let (equipamentos, obras, vinculos_ativos, medicoes) = tokio::try_join!(
            self.equipment.count(caller),
            self.sites.count(caller),
            self.assignments.count_active(caller),
            self.measurements.count(caller),
        )?;
        Ok(DashboardSummary { equipamentos, obras, vinculos_ativos, medicoes })
    }
}
