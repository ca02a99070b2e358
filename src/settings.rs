use std::path::PathBuf;

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),
    #[error("{name} has invalid value '{value}'")]
    Invalid { name: &'static str, value: String },
    #[error("JWT_SECRET must be at least 32 characters long")]
    WeakSecret,
}

/// Process configuration, read once at startup and passed down explicitly.
#[derive(Clone, Debug)]
pub struct Settings {
    /// Master switch for the reset endpoint.
    pub enabled: bool,
    pub bind_addr: String,
    pub database_url: Option<String>,
    pub data_dir: PathBuf,
}

impl Settings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as `from_env` but with an injectable variable source.
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let secret = get("JWT_SECRET").ok_or(ConfigError::Missing("JWT_SECRET"))?;
        if secret.len() < 32 {
            return Err(ConfigError::WeakSecret);
        }
        let enabled = match get("RESET_BUMP_ENABLED") {
            None => true,
            Some(v) => parse_flag(&v).ok_or(ConfigError::Invalid { name: "RESET_BUMP_ENABLED", value: v })?,
        };
        Ok(Self {
            enabled,
            bind_addr: get("BIND_ADDR").unwrap_or_else(|| "0.0.0.0:8080".to_string()),
            database_url: get("DATABASE_URL"),
            data_dir: get("RESET_BUMP_DATA_DIR").map(PathBuf::from).unwrap_or_else(|| PathBuf::from("data")),
        })
    }

    pub fn snapshot_path(&self) -> PathBuf {
        self.data_dir.join("state.json")
    }
}

fn parse_flag(v: &str) -> Option<bool> {
    match v.trim().to_ascii_lowercase().as_str() {
        "1" | "true" => Some(true),
        "0" | "false" => Some(false),
        _ => None,
    }
}
