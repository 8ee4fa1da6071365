use std::path::PathBuf;
use std::time::Duration;

fn string_env(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

fn secs_env(name: &str, default: u64) -> Duration {
    Duration::from_secs(std::env::var(name).ok().and_then(|v| v.parse().ok()).unwrap_or(default))
}

pub const MIN_SECRET_LEN: usize = 32;

/// Backend settings, read from the environment.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind: String,
    pub data_dir: PathBuf,
    pub frontend_url: String,
    pub jwt_secret: Option<String>,
}

impl ServerConfig {
    pub fn from_env() -> Self {
        Self {
            bind: string_env("DISCUSS_BIND", "0.0.0.0:8080"),
            data_dir: PathBuf::from(string_env("DISCUSS_DATA_DIR", "data")),
            frontend_url: string_env("FRONTEND_URL", "http://localhost:5173"),
            jwt_secret: std::env::var("JWT_SECRET").ok(),
        }
    }

    /// Problems that should stop the server from starting.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut problems = Vec::new();
        match &self.jwt_secret {
            None => problems.push("JWT_SECRET is not set".to_string()),
            Some(s) if s.len() < MIN_SECRET_LEN => {
                problems.push(format!("JWT_SECRET must be at least {MIN_SECRET_LEN} characters long"))
            }
            Some(_) => {}
        }
        if problems.is_empty() { Ok(()) } else { Err(problems) }
    }
}

/// Client core settings.
#[derive(Clone, Debug)]
pub struct ClientConfig {
    /// Base URL including the `/api/v1` prefix, no trailing slash.
    pub api_url: String,
    pub token: Option<String>,
    pub timeout: Duration,
}

impl ClientConfig {
    pub fn new(api_url: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into().trim_end_matches('/').to_string(),
            token: None,
            timeout: Duration::from_secs(10),
        }
    }

    pub fn from_env() -> Self {
        let mut cfg = Self::new(string_env("DISCUSS_API_URL", "http://localhost:8080/api/v1"));
        cfg.token = std::env::var("DISCUSS_TOKEN").ok().filter(|t| !t.is_empty());
        cfg.timeout = secs_env("DISCUSS_TIMEOUT_SECS", 10);
        cfg
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }
}
