use std::env;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub listen: String,
    /// `None` runs against the in-memory store.
    pub database_url: Option<String>,
    /// Root under which each project's repository is cloned as `<root>/<name>`.
    pub repository_path: PathBuf,
    pub package_path: PathBuf,
    pub git_bin: String,
    /// Branch a fresh clone is assumed to sit on; no checkout is run for it.
    pub default_branch: String,
    pub git_timeout: Duration,
    pub max_upload_bytes: usize,
}

fn parse_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

impl Config {
    pub fn load() -> Self {
        Self {
            listen: env::var("SHIPYARD_LISTEN").unwrap_or_else(|_| "0.0.0.0:8080".into()),
            database_url: env::var("DATABASE_URL").ok().filter(|v| !v.is_empty()),
            repository_path: env::var("SHIPYARD_REPOSITORY_PATH")
                .map_or_else(|_| PathBuf::from("/data/repository"), PathBuf::from),
            package_path: env::var("SHIPYARD_PACKAGE_PATH")
                .map_or_else(|_| PathBuf::from("/data/package"), PathBuf::from),
            git_bin: env::var("SHIPYARD_GIT_BIN").unwrap_or_else(|_| "git".into()),
            default_branch: env::var("SHIPYARD_DEFAULT_BRANCH")
                .unwrap_or_else(|_| "master".into()),
            git_timeout: Duration::from_secs(parse_or("SHIPYARD_GIT_TIMEOUT_SECS", 600)),
            max_upload_bytes: parse_or("SHIPYARD_MAX_UPLOAD_BYTES", 512 * 1024 * 1024),
        }
    }
}
