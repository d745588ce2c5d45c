pub mod assignment;
pub mod audit;
pub mod auth;
pub mod dashboard;
pub mod equipment;
pub mod measurement;
pub mod profile;
pub mod site;
pub mod tenancy;
