use dotenvy::dotenv;
use std::env;
use std::path::PathBuf;
use std::sync::{Arc, OnceLock};

/// ✅ Global Config stored in `OnceLock`
static CONFIG: OnceLock<Arc<Config>> = OnceLock::new();

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub auth_disabled: bool,
    /// Final resting place for uploaded document files.
    pub document_storage_path: PathBuf,
    /// Scratch directory swept by the `temp_cleanup` job.
    pub temp_storage_path: PathBuf,
    /// Files in the temp directory older than this many days get removed.
    pub temp_retention_days: u64,
    /// Five-field cron expression for the cleanup job.
    pub cleanup_schedule: String,
    /// Fixed UTC offset applied to job schedules (São Paulo by default).
    pub job_utc_offset: String,
    /// `development` exposes internal error detail in responses.
    pub app_env: String,
}

impl Config {
    /// ✅ Load environment variables and set defaults
    pub fn from_env() -> Self {
        dotenv().ok(); // Load .env only once

        Self {
            database_url: env::var("DATABASE_URL").expect("DATABASE_URL must be set"),
            jwt_secret: env::var("JWT_SECRET").expect("JWT_SECRET must be set"),
            auth_disabled: env::var("AUTH_DISABLED").unwrap_or_else(|_| "false".to_string())
                == "true",
            document_storage_path: PathBuf::from(
                env::var("DOCUMENT_STORAGE_PATH")
                    .unwrap_or_else(|_| "storage/documents".to_string()),
            ),
            temp_storage_path: PathBuf::from(
                env::var("TEMP_STORAGE_PATH").unwrap_or_else(|_| "storage/tmp".to_string()),
            ),
            temp_retention_days: env::var("TEMP_RETENTION_DAYS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(7),
            cleanup_schedule: env::var("CLEANUP_SCHEDULE")
                .unwrap_or_else(|_| "0 3 * * *".to_string()),
            job_utc_offset: env::var("JOB_UTC_OFFSET").unwrap_or_else(|_| "-03:00".to_string()),
            app_env: env::var("APP_ENV").unwrap_or_else(|_| "production".to_string()),
        }
    }

    /// ✅ Initialize the global config
    pub fn init() {
        CONFIG
            .set(Arc::new(Self::from_env()))
            .expect("Config already initialized");
    }

    /// ✅ Safe access to Config
    pub fn get() -> Arc<Config> {
        CONFIG.get().expect("Config not initialized").clone()
    }

    /// ✅ Check if authentication is disabled
    pub fn auth_disabled() -> bool {
        Config::get().auth_disabled
    }

    pub fn is_development(&self) -> bool {
        self.app_env == "development"
    }
}
