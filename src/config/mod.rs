// Configuration module

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub mod image;
pub mod logging;
pub mod server;

pub use image::{
    CacheConfig, FsCacheConfig, FsSourceConfig, ImageConfig, MemoryCacheConfig, ProviderKind,
    SourceConfig, SupportConfig,
};
pub use logging::{LogFormat, LoggingConfig};
pub use server::{AuthConfig, ServerConfig};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub image: ImageConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Parse YAML after replacing `${VAR_NAME}` with environment values
    ///
    /// Every referenced variable must be set. An empty document yields the
    /// defaults.
    pub fn from_yaml_with_env(yaml: &str) -> Result<Self, String> {
        let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}").map_err(|e| e.to_string())?;

        let mut missing = Vec::new();
        let substituted = re.replace_all(yaml, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| {
                missing.push(var_name.to_string());
                String::new()
            })
        });
        if let Some(var_name) = missing.first() {
            return Err(format!(
                "Environment variable '{}' is referenced but not set",
                var_name
            ));
        }

        if substituted.trim().is_empty() {
            return Ok(Config::default());
        }
        serde_yaml::from_str(&substituted).map_err(|e| e.to_string())
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, String> {
        let yaml = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file: {}", e))?;
        Self::from_yaml_with_env(&yaml)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.server.port == 0 {
            return Err("server.port must be greater than 0".to_string());
        }
        if self.server.threads == 0 {
            return Err("server.threads must be greater than 0".to_string());
        }
        if self.server.request_timeout_seconds == 0 {
            return Err("server.request_timeout_seconds must be greater than 0".to_string());
        }
        if self.server.max_body_size == 0 {
            return Err("server.max_body_size must be greater than 0".to_string());
        }

        let policy = self.image.cache.eviction_policy();
        if policy.life_time.is_zero() {
            return Err("image.cache life_time_seconds must be greater than 0".to_string());
        }
        if policy.clean_interval.is_zero() {
            return Err("image.cache clean_interval_seconds must be greater than 0".to_string());
        }
        if self.image.cache.provider == ProviderKind::Memory
            && self.image.cache.memory.memory_limit_mb == 0
        {
            return Err("image.cache.memory.memory_limit_mb must be greater than 0".to_string());
        }

        if self.image.support.extensions.is_empty() {
            return Err("image.support.extensions must not be empty".to_string());
        }
        if let Some(ext) = self
            .image
            .support
            .extensions
            .iter()
            .find(|ext| ext.is_empty() || ext.starts_with('.'))
        {
            return Err(format!(
                "image.support.extensions entry '{}' must be a bare extension",
                ext
            ));
        }
        if self.image.save_data_quality > 100 {
            return Err("image.save_data_quality must be between 0 and 100".to_string());
        }
        if self.image.max_concurrent_transforms == 0 {
            return Err("image.max_concurrent_transforms must be greater than 0".to_string());
        }
        if self.image.max_width == 0 || self.image.max_height == 0 {
            return Err("image.max_width and image.max_height must be greater than 0".to_string());
        }
        if self.image.max_pixels == 0 {
            return Err("image.max_pixels must be greater than 0".to_string());
        }

        if self.auth.secret.is_empty() {
            tracing::warn!("auth.secret is empty, uploads and deletes will be rejected");
        }

        Ok(())
    }
}
