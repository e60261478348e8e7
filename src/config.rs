use std::{env, path::PathBuf, str::FromStr, time::Duration};

use anyhow::Context;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub jwt_secret: String,
    pub jwt_ttl_hours: i64,
    pub upload_dir: PathBuf,
    pub frontend_dist: Option<PathBuf>,
    pub cors_allowed_hosts: Vec<String>,
    pub max_body_bytes: usize,
    pub installation_fee: i64,
    pub reset_code_ttl: Duration,
    pub expose_reset_code: bool,
    pub detector: DetectorConfig,
}

/// How the external damage detector is launched.
#[derive(Debug, Clone)]
pub struct DetectorConfig {
    pub program: String,
    pub script: PathBuf,
    pub timeout: Duration,
    pub api_key: Option<String>,
    pub scratch_dir: PathBuf,
}

impl AppConfig {
    pub fn with_database_url(database_url: impl Into<String>, jwt_secret: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            host: "127.0.0.1".to_string(),
            port: 3000,
            jwt_secret: jwt_secret.into(),
            jwt_ttl_hours: 24 * 7,
            upload_dir: PathBuf::from("uploads"),
            frontend_dist: None,
            cors_allowed_hosts: ["localhost", "127.0.0.1", "ngrok", "devtunnels.ms", "onrender.com"]
                .into_iter()
                .map(String::from)
                .collect(),
            max_body_bytes: 10 * 1024 * 1024,
            installation_fee: 150_000,
            reset_code_ttl: Duration::from_secs(15 * 60),
            expose_reset_code: true,
            detector: DetectorConfig {
                program: "python3".to_string(),
                script: PathBuf::from("detector.py"),
                timeout: Duration::from_secs(120),
                api_key: None,
                scratch_dir: env::temp_dir().join("autoparts-diagnose"),
            },
        }
    }

    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = env::var("DATABASE_URL").context("DATABASE_URL is not set")?;
        let jwt_secret = env::var("JWT_SECRET").context("JWT_SECRET is not set")?;
        let mut config = Self::with_database_url(database_url, jwt_secret);

        if let Ok(host) = env::var("APP_HOST") {
            config.host = host;
        }
        config.port = parsed("APP_PORT").unwrap_or(config.port);
        config.jwt_ttl_hours = parsed("JWT_TTL_HOURS").unwrap_or(config.jwt_ttl_hours);
        if let Ok(dir) = env::var("UPLOAD_DIR") {
            config.upload_dir = PathBuf::from(dir);
        }
        config.frontend_dist = env::var("FRONTEND_DIST").ok().map(PathBuf::from);
        if let Ok(hosts) = env::var("CORS_ALLOWED_HOSTS") {
            config.cors_allowed_hosts = hosts
                .split(',')
                .map(str::trim)
                .filter(|h| !h.is_empty())
                .map(String::from)
                .collect();
        }
        config.max_body_bytes = parsed("MAX_BODY_BYTES").unwrap_or(config.max_body_bytes);
        config.installation_fee = parsed("INSTALLATION_FEE").unwrap_or(config.installation_fee);
        if let Some(minutes) = parsed::<u64>("RESET_CODE_TTL_MINUTES") {
            config.reset_code_ttl = Duration::from_secs(minutes * 60);
        }
        config.expose_reset_code = parsed("EXPOSE_RESET_CODE").unwrap_or(config.expose_reset_code);

        if let Ok(program) = env::var("DETECTOR_PROGRAM") {
            config.detector.program = program;
        }
        if let Ok(script) = env::var("DETECTOR_SCRIPT") {
            config.detector.script = PathBuf::from(script);
        }
        if let Some(secs) = parsed::<u64>("DETECTOR_TIMEOUT_SECS") {
            config.detector.timeout = Duration::from_secs(secs);
        }
        config.detector.api_key = env::var("DETECTOR_API_KEY")
            .or_else(|_| env::var("GEMINI_API_KEY"))
            .ok();

        Ok(config)
    }
}

fn parsed<T: FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|v| v.trim().parse::<T>().ok())
}
