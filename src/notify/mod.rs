//! Notification fan-out
//!
//! Announces a newly stored image over every registered channel. Channels
//! are isolated from each other: each is attempted exactly once per call, in
//! registration order, and a failure is logged and recorded without stopping
//! the rest.

mod desktop;
mod slack;

pub use desktop::{DesktopChannel, DesktopNotification, Notifier, SystemNotifier};
pub use slack::{extract_file_url, ChatMessage, SlackChannel, SlackMode};

use crate::error::Result;
use crate::store::StoredArtifact;
use async_trait::async_trait;

/// A delivery channel for new-image announcements
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    /// Short identifier used in logs and reports
    fn name(&self) -> &str;

    /// Announce `artifact`
    async fn deliver(&self, artifact: &StoredArtifact) -> Result<()>;
}

/// Outcome of one channel delivery
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelOutcome {
    pub channel: String,
    /// `None` on success, the error text otherwise
    pub error: Option<String>,
}

impl ChannelOutcome {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Per-channel results of one fan-out
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FanoutReport {
    pub outcomes: Vec<ChannelOutcome>,
}

impl FanoutReport {
    pub fn delivered(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.delivered()
    }
}

/// Ordered set of channels driven together
#[derive(Default)]
pub struct NotificationFanout {
    channels: Vec<Box<dyn NotificationChannel>>,
}

impl NotificationFanout {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a channel
    pub fn with_channel(mut self, channel: impl NotificationChannel + 'static) -> Self {
        self.channels.push(Box::new(channel));
        self
    }

    pub fn push(&mut self, channel: Box<dyn NotificationChannel>) {
        self.channels.push(channel);
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    pub fn channel_names(&self) -> Vec<&str> {
        self.channels.iter().map(|c| c.name()).collect()
    }

    /// Deliver `artifact` over every channel, best effort
    pub async fn notify(&self, artifact: &StoredArtifact) -> FanoutReport {
        let mut report = FanoutReport::default();

        for channel in &self.channels {
            let outcome = match channel.deliver(artifact).await {
                Ok(()) => {
                    tracing::info!("Notified via {}", channel.name());
                    ChannelOutcome {
                        channel: channel.name().to_string(),
                        error: None,
                    }
                }
                Err(e) => {
                    tracing::warn!("{} notification failed: {}", channel.name(), e);
                    ChannelOutcome {
                        channel: channel.name().to_string(),
                        error: Some(e.to_string()),
                    }
                }
            };
            report.outcomes.push(outcome);
        }

        report
    }
}
