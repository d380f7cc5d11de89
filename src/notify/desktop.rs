//! Desktop notification channel
//!
//! Shows a native notification by spawning the platform notifier:
//! `terminal-notifier` on macOS, `notify-send` on other Unix desktops.

use super::NotificationChannel;
use crate::config::{absolute, NotificationText};
use crate::error::{Error, Result};
use crate::store::StoredArtifact;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// Content of one desktop notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DesktopNotification {
    pub title: String,
    pub message: String,
    /// Image previewed inside the notification
    pub content_image: PathBuf,
    pub app_icon: PathBuf,
    /// URL opened when the notification is clicked
    pub open: String,
}

impl DesktopNotification {
    pub fn for_artifact(
        text: &NotificationText,
        app_icon: &Path,
        artifact: &StoredArtifact,
    ) -> Self {
        let image = absolute(&artifact.path);
        Self {
            title: text.title.clone(),
            message: text.message.clone(),
            open: format!("file://{}", image.display()),
            content_image: image,
            app_icon: absolute(app_icon),
        }
    }

    /// `terminal-notifier` arguments
    pub fn terminal_notifier_args(&self) -> Vec<String> {
        vec![
            "-title".to_string(),
            self.title.clone(),
            "-message".to_string(),
            self.message.clone(),
            "-contentImage".to_string(),
            self.content_image.display().to_string(),
            "-appIcon".to_string(),
            self.app_icon.display().to_string(),
            "-open".to_string(),
            self.open.clone(),
        ]
    }

    /// `notify-send` arguments.
    ///
    /// notify-send has no click action, so the open URL goes into the body.
    pub fn notify_send_args(&self) -> Vec<String> {
        vec![
            "--app-name=wxwatch".to_string(),
            format!("--icon={}", self.app_icon.display()),
            format!("--hint=string:image-path:{}", self.content_image.display()),
            self.title.clone(),
            format!("{}\n{}", self.message, self.open),
        ]
    }
}

/// Displays a desktop notification
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn show(&self, notification: &DesktopNotification) -> Result<()>;
}

/// [`Notifier`] backed by the platform's notifier binary
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemNotifier;

impl SystemNotifier {
    fn command(notification: &DesktopNotification) -> Option<(&'static str, Vec<String>)> {
        if cfg!(target_os = "macos") {
            Some(("terminal-notifier", notification.terminal_notifier_args()))
        } else if cfg!(unix) {
            Some(("notify-send", notification.notify_send_args()))
        } else {
            None
        }
    }
}

#[async_trait]
impl Notifier for SystemNotifier {
    async fn show(&self, notification: &DesktopNotification) -> Result<()> {
        let (program, args) = Self::command(notification).ok_or_else(|| {
            Error::Delivery("No desktop notifier available on this platform".to_string())
        })?;

        tracing::debug!("Spawning {} {:?}", program, args);

        let output = tokio::process::Command::new(program)
            .args(&args)
            .output()
            .await
            .map_err(|e| Error::Delivery(format!("Failed to spawn {}: {}", program, e)))?;

        if !output.status.success() {
            return Err(Error::Delivery(format!(
                "{} exited with {}: {}",
                program,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        Ok(())
    }
}

/// Native desktop notification channel
pub struct DesktopChannel {
    text: NotificationText,
    app_icon: PathBuf,
    notifier: Box<dyn Notifier>,
}

impl DesktopChannel {
    pub fn new(text: NotificationText, app_icon: impl Into<PathBuf>) -> Self {
        Self::with_notifier(text, app_icon, SystemNotifier)
    }

    pub fn with_notifier(
        text: NotificationText,
        app_icon: impl Into<PathBuf>,
        notifier: impl Notifier + 'static,
    ) -> Self {
        Self {
            text,
            app_icon: app_icon.into(),
            notifier: Box::new(notifier),
        }
    }
}

#[async_trait]
impl NotificationChannel for DesktopChannel {
    fn name(&self) -> &str {
        "desktop"
    }

    async fn deliver(&self, artifact: &StoredArtifact) -> Result<()> {
        let notification =
            DesktopNotification::for_artifact(&self.text, &self.app_icon, artifact);
        self.notifier.show(&notification).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Local;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct CapturingNotifier {
        shown: Arc<Mutex<Vec<DesktopNotification>>>,
    }

    #[async_trait]
    impl Notifier for CapturingNotifier {
        async fn show(&self, notification: &DesktopNotification) -> Result<()> {
            self.shown.lock().unwrap().push(notification.clone());
            Ok(())
        }
    }

    fn artifact() -> StoredArtifact {
        StoredArtifact {
            path: PathBuf::from("/opt/wx/images/2024_3_7.jpg"),
            created_at: Local::now(),
        }
    }

    #[test]
    fn test_notification_fields() {
        let n = DesktopNotification::for_artifact(
            &NotificationText::default(),
            Path::new("/opt/wx/accuweather.png"),
            &artifact(),
        );

        assert_eq!(n.title, "AccuWeather");
        assert_eq!(n.message, "Today’s Worst Weather");
        assert_eq!(n.content_image, PathBuf::from("/opt/wx/images/2024_3_7.jpg"));
        assert_eq!(n.open, "file:///opt/wx/images/2024_3_7.jpg");
    }

    #[test]
    fn test_relative_artifact_opens_absolute_file_url() {
        let relative = StoredArtifact {
            path: PathBuf::from("rel/images/2024_3_7.jpg"),
            created_at: Local::now(),
        };
        let n = DesktopNotification::for_artifact(
            &NotificationText::default(),
            Path::new("rel/accuweather.png"),
            &relative,
        );

        let cwd = std::env::current_dir().unwrap();
        assert!(n.open.starts_with("file:///"));
        assert_eq!(
            n.open,
            format!("file://{}", cwd.join("rel/images/2024_3_7.jpg").display())
        );
        assert!(n.content_image.is_absolute());
        assert!(n.app_icon.is_absolute());
    }

    #[test]
    fn test_terminal_notifier_args() {
        let n = DesktopNotification::for_artifact(
            &NotificationText::default(),
            Path::new("/opt/wx/accuweather.png"),
            &artifact(),
        );
        let args = n.terminal_notifier_args();

        let pos = args.iter().position(|a| a == "-contentImage").unwrap();
        assert_eq!(args[pos + 1], "/opt/wx/images/2024_3_7.jpg");
        let pos = args.iter().position(|a| a == "-open").unwrap();
        assert_eq!(args[pos + 1], "file:///opt/wx/images/2024_3_7.jpg");
    }

    #[test]
    fn test_notify_send_args() {
        let n = DesktopNotification::for_artifact(
            &NotificationText::default(),
            Path::new("/opt/wx/accuweather.png"),
            &artifact(),
        );
        let args = n.notify_send_args();

        assert!(args.contains(&"--icon=/opt/wx/accuweather.png".to_string()));
        assert!(args.contains(&"--hint=string:image-path:/opt/wx/images/2024_3_7.jpg".to_string()));
        assert_eq!(args[3], "AccuWeather");
        assert!(args[4].ends_with("file:///opt/wx/images/2024_3_7.jpg"));
    }

    #[tokio::test]
    async fn test_channel_hands_notification_to_notifier() {
        let notifier = CapturingNotifier::default();
        let channel = DesktopChannel::with_notifier(
            NotificationText::default(),
            "/opt/wx/accuweather.png",
            notifier.clone(),
        );

        assert_eq!(channel.name(), "desktop");
        channel.deliver(&artifact()).await.unwrap();

        let shown = notifier.shown.lock().unwrap();
        assert_eq!(shown.len(), 1);
        assert_eq!(shown[0].app_icon, PathBuf::from("/opt/wx/accuweather.png"));
    }
}
