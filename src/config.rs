//! wxwatch configuration management
//!
//! Two files feed configuration:
//!
//! - an optional TOML settings file (`--config`) describing what to watch and
//!   where to keep local files, see [`WatchConfig`];
//! - an optional `slack.json` credentials file next to the state file, see
//!   [`ChatConfig`]. Its absence disables the chat channel.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default resource watched when no URL is configured
pub const DEFAULT_URL: &str =
    "http://sirocco.accuweather.com/adc_images2/english/feature/400x300/worstwx.jpg";

/// Main wxwatch configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    /// Remote image to poll
    pub url: String,

    /// Base directory that relative paths resolve against
    pub home: PathBuf,

    /// File holding the last seen change token
    pub state_file: PathBuf,

    /// Directory receiving one image per day
    pub images_dir: PathBuf,

    /// Optional chat credentials file
    pub chat_config: PathBuf,

    /// Icon shown on desktop notifications
    pub app_icon: PathBuf,

    /// Notification wording
    pub notification: NotificationText,

    /// Slack API settings
    pub slack: SlackSettings,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_URL.to_string(),
            home: install_dir(),
            state_file: PathBuf::from("last-modified.txt"),
            images_dir: PathBuf::from("images"),
            chat_config: PathBuf::from("slack.json"),
            app_icon: PathBuf::from("accuweather.png"),
            notification: NotificationText::default(),
            slack: SlackSettings::default(),
        }
    }
}

impl WatchConfig {
    /// Parse a TOML settings file
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(e.to_string()))
    }

    /// Load a TOML settings file from disk
    pub async fn load(path: &Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            Error::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
    }

    /// Resolve a configured path against `home`.
    ///
    /// The result is always absolute: a relative `home` is taken relative to
    /// the current directory.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            absolute(&self.home).join(path)
        }
    }

    pub fn state_path(&self) -> PathBuf {
        self.resolve(&self.state_file)
    }

    pub fn images_path(&self) -> PathBuf {
        self.resolve(&self.images_dir)
    }

    pub fn chat_config_path(&self) -> PathBuf {
        self.resolve(&self.chat_config)
    }

    pub fn app_icon_path(&self) -> PathBuf {
        self.resolve(&self.app_icon)
    }
}

/// Title and body used by every notification channel
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationText {
    pub title: String,
    pub message: String,
}

impl Default for NotificationText {
    fn default() -> Self {
        Self {
            title: "AccuWeather".to_string(),
            message: "Today’s Worst Weather".to_string(),
        }
    }
}

/// Slack API settings that are not secrets
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SlackSettings {
    /// Base URL of the Web API, `files.upload` is appended
    pub api_base: String,

    /// Display name of posted messages
    pub username: String,

    /// Emoji used as the message avatar
    pub icon_emoji: String,
}

impl Default for SlackSettings {
    fn default() -> Self {
        Self {
            api_base: "https://slack.com/api".to_string(),
            username: "AccuWeather".to_string(),
            icon_emoji: ":sunny:".to_string(),
        }
    }
}

/// Chat credentials read from `slack.json`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatConfig {
    /// Incoming webhook URL used to post messages
    pub webhook: String,

    /// Bot token enabling file uploads
    #[serde(default)]
    pub token: Option<String>,

    /// Destination channel name
    pub channel: String,
}

impl ChatConfig {
    /// Bot token, if one is configured and non-empty
    pub fn bot_token(&self) -> Option<&str> {
        self.token.as_deref().filter(|t| !t.trim().is_empty())
    }
}

/// Load chat credentials.
///
/// A missing file yields `Ok(None)`: chat is simply not configured. An
/// unreadable or malformed file is a [`Error::Config`]; callers degrade to
/// no chat channel.
pub async fn load_chat_config(path: &Path) -> Result<Option<ChatConfig>> {
    let content = match tokio::fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(Error::Config(format!(
                "Failed to read {}: {}",
                path.display(),
                e
            )))
        }
    };

    let config: ChatConfig = serde_json::from_str(&content)
        .map_err(|e| Error::Config(format!("Invalid {}: {}", path.display(), e)))?;
    Ok(Some(config))
}

/// Anchor a relative path at the current directory
pub fn absolute(path: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    std::env::current_dir()
        .map(|cwd| cwd.join(path))
        .unwrap_or_else(|_| path.to_path_buf())
}

/// Directory holding the running executable, falling back to the cwd
fn install_dir() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
        .unwrap_or_else(|| PathBuf::from("."))
}
