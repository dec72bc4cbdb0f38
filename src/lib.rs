// Hyperpic image proxy library

pub mod auth;
pub mod cache;
pub mod config;
pub mod constants;
pub mod disk;
pub mod error;
pub mod image_optimizer;
pub mod logging;
pub mod metrics;
pub mod pipeline;
pub mod proxy;
pub mod resource;
pub mod security;
pub mod source;
