//! User settings persistence.
//!
//! Model choice, custom prompt and token limit survive restarts. Stored as
//! JSON in the user's config directory (e.g.
//! `~/.config/vision-snip/settings.json` on Linux).

use crate::error::Result;
use crate::vision::DEFAULT_ANALYSIS_PROMPT;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// Vision-capable models offered in the settings panel.
pub const AVAILABLE_MODELS: &[&str] = &["gpt-4o", "gpt-4o-mini", "gpt-4.1", "gpt-4.1-mini"];

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub model: String,
    /// Replaces the built-in analysis prompt when not blank.
    pub prompt: String,
    pub max_tokens: u32,
}

impl Settings {
    /// Returns the path to the settings file.
    ///
    /// Creates the config directory if it doesn't exist.
    fn config_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "vision-snip").map(|dirs| {
            let config_dir = dirs.config_dir();
            if !config_dir.exists() {
                let _ = fs::create_dir_all(config_dir);
            }
            config_dir.join("settings.json")
        })
    }

    /// Loads settings from disk, falling back to defaults if not found.
    pub fn load(default_model: &str, default_max_tokens: u32) -> Self {
        Self::config_path()
            .and_then(|path| fs::read_to_string(&path).ok())
            .and_then(|content| Self::from_json(&content))
            .unwrap_or_else(|| Self::with_defaults(default_model, default_max_tokens))
    }

    fn from_json(content: &str) -> Option<Self> {
        match serde_json::from_str::<Self>(content) {
            Ok(settings) => Some(settings),
            Err(e) => {
                log::warn!("[SETTINGS] ignoring unreadable settings file: {}", e);
                None
            }
        }
    }

    pub fn with_defaults(model: &str, max_tokens: u32) -> Self {
        Self {
            model: model.to_string(),
            prompt: String::new(),
            max_tokens,
        }
    }

    /// Persists settings to disk.
    ///
    /// # Errors
    /// Returns an error if serialization or file writing fails.
    pub fn save(&self) -> Result<()> {
        if let Some(path) = Self::config_path() {
            let json = serde_json::to_string_pretty(self)?;
            fs::write(path, json)?;
        }
        Ok(())
    }

    /// The prompt actually sent with a capture.
    pub fn effective_prompt(&self) -> &str {
        if self.prompt.trim().is_empty() {
            DEFAULT_ANALYSIS_PROMPT
        } else {
            &self.prompt
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self::with_defaults(
            crate::config::DEFAULT_MODEL,
            crate::config::DEFAULT_MAX_TOKENS,
        )
    }
}
