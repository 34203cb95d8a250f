use std::env;
use std::path::PathBuf;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub database_max_connections: u32,
    pub host: String,
    pub port: u16,

    /// Directory uploaded firmware images are stored under.
    pub upload_dir: PathBuf,

    /// Optional JSON file overriding the severity keyword tables.
    pub severity_rules_file: Option<PathBuf>,

    pub analyzer: AnalyzerConfig,
    pub worker: WorkerConfig,
}

/// External analyzer invocation settings.
#[derive(Debug, Clone)]
pub struct AnalyzerConfig {
    /// Installation directory containing the analyzer executable.
    pub path: PathBuf,
    /// Parent directory for per-job log directories.
    pub log_dir: PathBuf,
    /// Scan profile filename, resolved relative to `path`/scan-profiles.
    pub scan_profile: String,
    pub threads: u32,
    pub enable_emulation: bool,
    pub enable_cwe_check: bool,
    pub enable_live_testing: bool,
    /// Hard wall-clock limit for one analysis run, in seconds.
    pub timeout_secs: u64,
}

/// Worker polling settings.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub poll_interval_secs: u64,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, env::VarError> {
        Ok(Self {
            database_url: env::var("DATABASE_URL")?,
            database_max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .unwrap_or(10),
            host: env::var("BACKEND_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env::var("BACKEND_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .unwrap_or(3000),
            upload_dir: env::var("UPLOAD_DIR")
                .unwrap_or_else(|_| "/var/lib/firmscope/uploads".to_string())
                .into(),
            severity_rules_file: env::var("SEVERITY_RULES_FILE").ok().map(PathBuf::from),
            analyzer: AnalyzerConfig {
                path: env::var("ANALYZER_PATH")
                    .unwrap_or_else(|_| "/opt/emba".to_string())
                    .into(),
                log_dir: env::var("ANALYZER_LOG_DIR")
                    .unwrap_or_else(|_| "/var/lib/firmscope/logs".to_string())
                    .into(),
                scan_profile: env::var("ANALYZER_SCAN_PROFILE")
                    .unwrap_or_else(|_| "default-scan.emba".to_string()),
                threads: env::var("ANALYZER_THREADS")
                    .unwrap_or_else(|_| "2".to_string())
                    .parse()
                    .unwrap_or(2),
                enable_emulation: env_bool("ANALYZER_ENABLE_EMULATION"),
                enable_cwe_check: env_bool("ANALYZER_ENABLE_CWE_CHECK"),
                enable_live_testing: env_bool("ANALYZER_ENABLE_LIVE_TESTING"),
                timeout_secs: env::var("ANALYZER_TIMEOUT_SECS")
                    .unwrap_or_else(|_| "3600".to_string())
                    .parse()
                    .unwrap_or(3600),
            },
            worker: WorkerConfig {
                poll_interval_secs: env::var("WORKER_POLL_INTERVAL_SECS")
                    .unwrap_or_else(|_| "10".to_string())
                    .parse()
                    .unwrap_or(10),
            },
        })
    }
}

fn env_bool(key: &str) -> bool {
    env::var(key)
        .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(false)
}
