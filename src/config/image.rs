//! Image storage and transform configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::cache::EvictionPolicy;
use crate::image_optimizer::DimensionLimits;
use crate::constants::{
    DEFAULT_CACHE_CLEAN_INTERVAL_SECS, DEFAULT_CACHE_LIFE_TIME_SECS, DEFAULT_CACHE_PATH,
    DEFAULT_MAX_CONCURRENT_TRANSFORMS, DEFAULT_MAX_HEIGHT, DEFAULT_MAX_PIXELS, DEFAULT_MAX_WIDTH,
    DEFAULT_MEMORY_LIMIT_MB, DEFAULT_SAVE_DATA_QUALITY,
    DEFAULT_SOURCE_PATH, DEFAULT_SUPPORTED_EXTENSIONS,
};

fn default_source_path() -> PathBuf {
    PathBuf::from(DEFAULT_SOURCE_PATH)
}

fn default_cache_path() -> PathBuf {
    PathBuf::from(DEFAULT_CACHE_PATH)
}

fn default_life_time() -> u64 {
    DEFAULT_CACHE_LIFE_TIME_SECS
}

fn default_clean_interval() -> u64 {
    DEFAULT_CACHE_CLEAN_INTERVAL_SECS
}

fn default_memory_limit_mb() -> u64 {
    DEFAULT_MEMORY_LIMIT_MB
}

fn default_extensions() -> Vec<String> {
    DEFAULT_SUPPORTED_EXTENSIONS
        .iter()
        .map(|ext| ext.to_string())
        .collect()
}

fn default_save_data_quality() -> u8 {
    DEFAULT_SAVE_DATA_QUALITY
}

fn default_max_concurrent_transforms() -> usize {
    DEFAULT_MAX_CONCURRENT_TRANSFORMS
}

fn default_max_width() -> u32 {
    DEFAULT_MAX_WIDTH
}

fn default_max_height() -> u32 {
    DEFAULT_MAX_HEIGHT
}

fn default_max_pixels() -> u64 {
    DEFAULT_MAX_PIXELS
}

/// Storage backend selector
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    #[default]
    Fs,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FsSourceConfig {
    #[serde(default = "default_source_path")]
    pub path: PathBuf,
}

impl Default for FsSourceConfig {
    fn default() -> Self {
        Self {
            path: default_source_path(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourceConfig {
    #[serde(default)]
    pub provider: ProviderKind,
    #[serde(default)]
    pub fs: FsSourceConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FsCacheConfig {
    #[serde(default = "default_cache_path")]
    pub path: PathBuf,
    #[serde(default = "default_life_time")]
    pub life_time_seconds: u64,
    #[serde(default = "default_clean_interval")]
    pub clean_interval_seconds: u64,
}

impl Default for FsCacheConfig {
    fn default() -> Self {
        Self {
            path: default_cache_path(),
            life_time_seconds: default_life_time(),
            clean_interval_seconds: default_clean_interval(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryCacheConfig {
    #[serde(default = "default_life_time")]
    pub life_time_seconds: u64,
    #[serde(default = "default_clean_interval")]
    pub clean_interval_seconds: u64,
    #[serde(default = "default_memory_limit_mb")]
    pub memory_limit_mb: u64,
}

impl Default for MemoryCacheConfig {
    fn default() -> Self {
        Self {
            life_time_seconds: default_life_time(),
            clean_interval_seconds: default_clean_interval(),
            memory_limit_mb: default_memory_limit_mb(),
        }
    }
}

impl MemoryCacheConfig {
    pub fn limit_bytes(&self) -> u64 {
        self.memory_limit_mb.saturating_mul(1024 * 1024)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default)]
    pub provider: ProviderKind,
    #[serde(default)]
    pub fs: FsCacheConfig,
    #[serde(default)]
    pub memory: MemoryCacheConfig,
}

impl CacheConfig {
    /// Eviction settings of the selected provider
    pub fn eviction_policy(&self) -> EvictionPolicy {
        let (life_time, clean_interval) = match self.provider {
            ProviderKind::Fs => (self.fs.life_time_seconds, self.fs.clean_interval_seconds),
            ProviderKind::Memory => (
                self.memory.life_time_seconds,
                self.memory.clean_interval_seconds,
            ),
        };
        EvictionPolicy {
            life_time: Duration::from_secs(life_time),
            clean_interval: Duration::from_secs(clean_interval),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupportConfig {
    /// Lowercase extensions, without the dot
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
}

impl Default for SupportConfig {
    fn default() -> Self {
        Self {
            extensions: default_extensions(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageConfig {
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub support: SupportConfig,
    /// Quality forced by `Save-Data: on`
    #[serde(default = "default_save_data_quality")]
    pub save_data_quality: u8,
    #[serde(default = "default_max_concurrent_transforms")]
    pub max_concurrent_transforms: usize,
    /// Output width ceiling, DPR included
    #[serde(default = "default_max_width")]
    pub max_width: u32,
    /// Output height ceiling, DPR included
    #[serde(default = "default_max_height")]
    pub max_height: u32,
    /// Pixel ceiling for every intermediate and output image
    #[serde(default = "default_max_pixels")]
    pub max_pixels: u64,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            source: SourceConfig::default(),
            cache: CacheConfig::default(),
            support: SupportConfig::default(),
            save_data_quality: default_save_data_quality(),
            max_concurrent_transforms: default_max_concurrent_transforms(),
            max_width: default_max_width(),
            max_height: default_max_height(),
            max_pixels: default_max_pixels(),
        }
    }
}

impl ImageConfig {
    pub fn dimension_limits(&self) -> DimensionLimits {
        DimensionLimits {
            max_width: self.max_width,
            max_height: self.max_height,
            max_pixels: self.max_pixels,
        }
    }
}
