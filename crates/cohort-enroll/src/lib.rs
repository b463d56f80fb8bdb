//! Onboarding intake core: cohort-scoped enrollment identifier allocation plus the
//! configuration, error, and telemetry plumbing shared by the API service.

pub mod config;
pub mod error;
pub mod telemetry;
pub mod workflows;
