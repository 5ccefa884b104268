pub mod cleanup;
pub mod registry;
pub mod schedule;

use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;
use registry::{JobOptions, JobRegistry};
use schedule::parse_utc_offset;

/// Builds the process registry and installs the standing jobs from config.
pub fn build_registry(config: &Config) -> Result<Arc<JobRegistry>, registry::JobError> {
    let registry = Arc::new(JobRegistry::new());

    let timezone = parse_utc_offset(&config.job_utc_offset)
        .unwrap_or_else(|| JobOptions::default().timezone);
    let options = JobOptions {
        timezone,
        auto_start: true,
    };

    let temp_dir = config.temp_storage_path.clone();
    let retention = Duration::from_secs(config.temp_retention_days * 24 * 60 * 60);
    registry.register(
        "temp_cleanup",
        &config.cleanup_schedule,
        options,
        registry::task(move || {
            let temp_dir = temp_dir.clone();
            async move {
                cleanup::clean_temp_dir(&temp_dir, retention).await?;
                Ok(())
            }
        }),
    )?;

    Ok(registry)
}
