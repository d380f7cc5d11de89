//! Slack notification channel
//!
//! Two modes, picked from the credentials in `slack.json`:
//!
//! - with a bot token the image is uploaded through `files.upload` and the
//!   message links the uploaded file;
//! - webhook-only, the message links the watched remote URL instead.
//!
//! Messages always go out through the incoming webhook.

use super::NotificationChannel;
use crate::config::{ChatConfig, NotificationText, SlackSettings};
use crate::error::{Error, Result};
use crate::store::StoredArtifact;
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// How the channel references the new image
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlackMode {
    /// Upload the file with this bot token, then link it
    Upload { token: String },
    /// Link the remote resource URL
    WebhookOnly,
}

/// Incoming webhook payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub text: String,
    pub channel: String,
    pub username: String,
    pub icon_emoji: String,
    pub unfurl_links: bool,
}

/// Pull a shareable URL for the uploaded file out of a `files.upload` reply
pub fn extract_file_url(response: &serde_json::Value) -> Option<String> {
    let file = response.get("file")?;
    ["url", "permalink_public", "permalink"]
        .iter()
        .find_map(|key| file.get(*key).and_then(|v| v.as_str()))
        .filter(|url| !url.is_empty())
        .map(str::to_string)
}

/// Slack channel
pub struct SlackChannel {
    client: reqwest::Client,
    chat: ChatConfig,
    settings: SlackSettings,
    text: NotificationText,
    /// Watched resource, linked in webhook-only mode
    resource_url: String,
}

impl SlackChannel {
    pub fn new(
        client: reqwest::Client,
        chat: ChatConfig,
        settings: SlackSettings,
        text: NotificationText,
        resource_url: impl Into<String>,
    ) -> Self {
        Self {
            client,
            chat,
            settings,
            text,
            resource_url: resource_url.into(),
        }
    }

    pub fn mode(&self) -> SlackMode {
        match self.chat.bot_token() {
            Some(token) => SlackMode::Upload {
                token: token.to_string(),
            },
            None => SlackMode::WebhookOnly,
        }
    }

    /// Message announcing the image at `url`
    pub fn message_for(&self, url: &str) -> ChatMessage {
        ChatMessage {
            text: format!("{} {}", self.text.message, url),
            channel: self.chat.channel.clone(),
            username: self.settings.username.clone(),
            icon_emoji: self.settings.icon_emoji.clone(),
            unfurl_links: true,
        }
    }

    fn upload_endpoint(&self) -> String {
        format!("{}/files.upload", self.settings.api_base.trim_end_matches('/'))
    }

    /// Upload `path` and return the URL Slack assigns to it
    async fn upload(&self, token: &str, path: &Path) -> Result<String> {
        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "image.jpg".to_string());

        let part = Part::bytes(bytes)
            .file_name(file_name)
            .mime_str("image/jpeg")?;
        let form = Form::new()
            .text("channels", self.chat.channel.clone())
            .text("token", token.to_string())
            .part("file", part);

        let endpoint = self.upload_endpoint();
        tracing::debug!("Uploading {} to {}", path.display(), endpoint);

        let response = self
            .client
            .post(&endpoint)
            .multipart(form)
            .send()
            .await
            .map_err(|e| Error::Network(format!("Slack upload failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Network(format!(
                "Slack upload returned HTTP {}: {}",
                status, body
            )));
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| Error::Network(format!("Slack upload reply unreadable: {}", e)))?;

        if body.get("ok").and_then(|v| v.as_bool()) == Some(false) {
            let reason = body
                .get("error")
                .and_then(|v| v.as_str())
                .unwrap_or("unknown_error");
            return Err(Error::Network(format!("Slack upload rejected: {}", reason)));
        }

        extract_file_url(&body)
            .ok_or_else(|| Error::Network("Slack upload reply carried no file URL".to_string()))
    }

    /// Post `message` through the incoming webhook
    async fn post(&self, message: &ChatMessage) -> Result<()> {
        tracing::debug!("Posting to Slack channel {}: {}", message.channel, message.text);

        let response = self
            .client
            .post(&self.chat.webhook)
            .json(message)
            .send()
            .await
            .map_err(|e| Error::Network(format!("Slack post failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Network(format!(
                "Slack returned HTTP {}: {}",
                status, body
            )));
        }

        Ok(())
    }
}

#[async_trait]
impl NotificationChannel for SlackChannel {
    fn name(&self) -> &str {
        "slack"
    }

    async fn deliver(&self, artifact: &StoredArtifact) -> Result<()> {
        let url = match self.mode() {
            SlackMode::Upload { token } => self.upload(&token, &artifact.path).await?,
            SlackMode::WebhookOnly => self.resource_url.clone(),
        };

        self.post(&self.message_for(&url)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn chat(token: Option<&str>) -> ChatConfig {
        ChatConfig {
            webhook: "https://hooks.slack.com/services/T/B/x".to_string(),
            token: token.map(str::to_string),
            channel: "#weather".to_string(),
        }
    }

    fn channel(token: Option<&str>) -> SlackChannel {
        SlackChannel::new(
            reqwest::Client::new(),
            chat(token),
            SlackSettings::default(),
            NotificationText::default(),
            "http://example.com/worstwx.jpg",
        )
    }

    #[test]
    fn test_mode_selection() {
        assert_eq!(channel(None).mode(), SlackMode::WebhookOnly);
        assert_eq!(channel(Some("")).mode(), SlackMode::WebhookOnly);
        assert_eq!(
            channel(Some("xoxb-1")).mode(),
            SlackMode::Upload {
                token: "xoxb-1".to_string()
            }
        );
    }

    #[test]
    fn test_message_payload() {
        let message = channel(None).message_for("http://example.com/worstwx.jpg");
        let value = serde_json::to_value(&message).unwrap();

        assert_eq!(value["text"], "Today’s Worst Weather http://example.com/worstwx.jpg");
        assert_eq!(value["channel"], "#weather");
        assert_eq!(value["username"], "AccuWeather");
        assert_eq!(value["icon_emoji"], ":sunny:");
        assert_eq!(value["unfurl_links"], true);
    }

    #[test]
    fn test_upload_endpoint_trims_slash() {
        let mut ch = channel(Some("xoxb-1"));
        ch.settings.api_base = "http://127.0.0.1:9000/api/".to_string();
        assert_eq!(ch.upload_endpoint(), "http://127.0.0.1:9000/api/files.upload");
    }

    #[test]
    fn test_extract_file_url() {
        let body = json!({"ok": true, "file": {"url": "https://files.slack.com/a.jpg"}});
        assert_eq!(
            extract_file_url(&body).as_deref(),
            Some("https://files.slack.com/a.jpg")
        );

        let body = json!({
            "ok": true,
            "file": {"permalink_public": "https://slack-files.com/T-F-x"}
        });
        assert_eq!(
            extract_file_url(&body).as_deref(),
            Some("https://slack-files.com/T-F-x")
        );

        assert_eq!(extract_file_url(&json!({"ok": false, "error": "not_authed"})), None);
        assert_eq!(extract_file_url(&json!({"file": {"url": ""}})), None);
    }
}
