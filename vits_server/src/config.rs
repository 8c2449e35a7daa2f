// Configuration for the server, read from the environment

use std::{path::PathBuf, time::Duration};

use vits_core::{Language, RELOAD_PERIOD};

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub port: u16,
    pub manifest_path: PathBuf,
    pub sound_dir: PathBuf,
    pub default_language: Language,
    pub reload_period: u64,
    pub rate_limit_per_minute: u32,
    pub request_timeout_secs: u64,
    pub cors_allowed_origins: Option<Vec<String>>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8000,
            manifest_path: PathBuf::from("models.json"),
            sound_dir: PathBuf::from("sounds"),
            default_language: Language::default(),
            reload_period: RELOAD_PERIOD,
            rate_limit_per_minute: 60,
            request_timeout_secs: 120,
            cors_allowed_origins: None,
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

impl ServerConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let manifest_path = std::env::var("MODELS_MANIFEST")
            .map(PathBuf::from)
            .unwrap_or(defaults.manifest_path);

        let sound_dir = std::env::var("SOUND_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.sound_dir);

        let default_language = match std::env::var("DEFAULT_LANGUAGE") {
            Ok(label) => label.parse().unwrap_or_else(|e| {
                tracing::warn!("{e}, falling back to {}", defaults.default_language);
                defaults.default_language
            }),
            Err(_) => defaults.default_language,
        };

        let cors_allowed_origins = std::env::var("CORS_ALLOWED_ORIGINS")
            .ok()
            .map(|origins| {
                origins
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            });

        Self {
            port: env_parse("PORT").unwrap_or(defaults.port),
            manifest_path,
            sound_dir,
            default_language,
            reload_period: env_parse("RELOAD_PERIOD").unwrap_or(defaults.reload_period),
            rate_limit_per_minute: env_parse("RATE_LIMIT_PER_MINUTE")
                .unwrap_or(defaults.rate_limit_per_minute),
            request_timeout_secs: env_parse("REQUEST_TIMEOUT_SECS")
                .unwrap_or(defaults.request_timeout_secs),
            cors_allowed_origins,
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
