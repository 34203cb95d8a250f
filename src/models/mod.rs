//! Database models and DTOs for firmware analysis entities.

pub mod cve;
pub mod finding;
pub mod osint;
pub mod project;
