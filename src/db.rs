pub mod backend;
pub mod query;
pub mod schema;
pub mod guard;
pub mod pg_backend;
pub mod local_storage;

pub mod equipment_repo;
pub mod site_repo;
pub mod assignment_repo;
pub mod measurement_repo;
pub mod profile_repo;
pub mod audit_repo;

#[cfg(test)]
pub mod memory_backend;
#[cfg(test)]
pub mod test_support;
