//! # Maintenance Jobs + Health Scheduler (C11, C12)
//!
//! [`jobs::HealthMaintenanceJobs`] implements the three housekeeping passes
//! over the memory store; [`scheduler::HealthScheduler`] installs them as
//! `tokio-cron-scheduler` jobs per a persisted [`crate::types::HealthScheduleConfig`]
//! and also exposes synchronous manual triggers.

pub mod jobs;
pub mod scheduler;

pub use jobs::{HealthMaintenanceJobs, JobResult};
pub use scheduler::{load_config_from_file, save_config_to_file, HealthScheduler, ScheduleStatus};
