//! Runtime configuration.
//!
//! Everything comes from the environment (after loading an optional `.env`
//! file). Only the API key is required.

use crate::error::{AppError, Result};
use dotenvy::dotenv;
use std::env;
use std::path::PathBuf;
use url::Url;

pub const API_KEY_VAR: &str = "OPENAI_API_KEY";
pub const MODEL_VAR: &str = "OPENAI_MODEL";
pub const BASE_URL_VAR: &str = "OPENAI_BASE_URL";
pub const LOG_PATH_VAR: &str = "VISION_SNIP_LOG";
pub const DEBUG_IMAGE_VAR: &str = "VISION_SNIP_DEBUG_IMAGE";

pub const DEFAULT_MODEL: &str = "gpt-4o";
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1/";
pub const DEFAULT_MAX_TOKENS: u32 = 500;
pub const DEFAULT_LOG_PATH: &str = "vision.log";
pub const DEFAULT_DEBUG_IMAGE_PATH: &str = "debug_capture.png";

#[derive(Clone, Debug)]
pub struct Config {
    pub openai_api_key: String,
    pub model_name: String,
    /// Always ends with `/` so endpoint paths can be joined onto it.
    pub base_url: Url,
    pub max_tokens: u32,
    pub log_path: PathBuf,
    /// `None` disables the rolling debug image.
    pub debug_image_path: Option<PathBuf>,
}

impl Config {
    pub fn load() -> Result<Self> {
        // Load .env file if it exists, ignore if it doesn't
        let _ = dotenv();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds a config from any key-value source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let api_key = lookup(API_KEY_VAR)
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty())
            .ok_or_else(|| AppError::MissingEnvVar(API_KEY_VAR.to_string()))?;

        let mut builder = Config::builder().with_api_key(api_key);

        if let Some(model) = lookup(MODEL_VAR).filter(|m| !m.trim().is_empty()) {
            builder = builder.with_model(model.trim());
        }
        if let Some(url) = lookup(BASE_URL_VAR).filter(|u| !u.trim().is_empty()) {
            builder = builder.with_base_url(url.trim());
        }
        if let Some(path) = lookup(LOG_PATH_VAR).filter(|p| !p.trim().is_empty()) {
            builder = builder.with_log_path(path.trim());
        }
        if let Some(path) = lookup(DEBUG_IMAGE_VAR).filter(|p| !p.trim().is_empty()) {
            builder = builder.with_debug_image_path(Some(PathBuf::from(path.trim())));
        }

        builder.build()
    }

    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }
}

/// Programmatic construction, used by the CLI overrides and by tests.
#[derive(Clone, Debug)]
pub struct ConfigBuilder {
    api_key: String,
    model_name: String,
    base_url: String,
    max_tokens: u32,
    log_path: PathBuf,
    debug_image_path: Option<PathBuf>,
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model_name: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            log_path: PathBuf::from(DEFAULT_LOG_PATH),
            debug_image_path: Some(PathBuf::from(DEFAULT_DEBUG_IMAGE_PATH)),
        }
    }
}

impl ConfigBuilder {
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = key.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model_name = model.into();
        self
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_log_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.log_path = path.into();
        self
    }

    pub fn with_debug_image_path(mut self, path: Option<PathBuf>) -> Self {
        self.debug_image_path = path;
        self
    }

    /// The API key is not validated here; a blank key surfaces as an
    /// authentication failure on the first request.
    pub fn build(self) -> Result<Config> {
        let mut raw_url = self.base_url;
        if !raw_url.ends_with('/') {
            raw_url.push('/');
        }
        let base_url = Url::parse(&raw_url)
            .map_err(|e| AppError::config(format!("Invalid base URL '{}': {}", raw_url, e)))?;

        if self.max_tokens == 0 {
            return Err(AppError::config("max_tokens must be greater than zero"));
        }

        Ok(Config {
            openai_api_key: self.api_key,
            model_name: self.model_name,
            base_url,
            max_tokens: self.max_tokens,
            log_path: self.log_path,
            debug_image_path: self.debug_image_path,
        })
    }
}
