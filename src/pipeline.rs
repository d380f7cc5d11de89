//! Change detection and delivery pipeline
//!
//! One run walks a fixed sequence of stages:
//!
//! ```text
//! Idle -> ProbingRemote -> Unchanged
//!                       -> Fetching -> Storing -> UpdatingState -> Notifying
//! ```
//!
//! A failure halts the run at the failing stage with no further side
//! effects. The state file is only written after the image is on disk, and
//! notifications only go out after the state file is written, so a change
//! is announced at most once.

use crate::config::{load_chat_config, WatchConfig};
use crate::error::Error;
use crate::notify::{DesktopChannel, FanoutReport, NotificationFanout, SlackChannel};
use crate::probe::{ChangeToken, HttpProbe, ResourceProbe};
use crate::state::LocalState;
use crate::store::{ImageStore, StoredArtifact};
use chrono::{DateTime, Local};
use std::fmt;

/// Pipeline stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Idle,
    ProbingRemote,
    Unchanged,
    Fetching,
    Storing,
    UpdatingState,
    Notifying,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Idle => "idle",
            Stage::ProbingRemote => "probing remote",
            Stage::Unchanged => "unchanged",
            Stage::Fetching => "fetching",
            Stage::Storing => "storing",
            Stage::UpdatingState => "updating state",
            Stage::Notifying => "notifying",
        };
        f.write_str(name)
    }
}

/// A run that halted before reaching a terminal stage
#[derive(Debug, thiserror::Error)]
#[error("Run failed while {stage}: {source}")]
pub struct PipelineError {
    pub stage: Stage,
    #[source]
    pub source: Error,
}

impl PipelineError {
    fn at(stage: Stage, source: Error) -> Self {
        tracing::error!("Run halted while {}: {}", stage, source);
        Self { stage, source }
    }
}

/// Terminal result of a successful run
#[derive(Debug)]
pub enum RunOutcome {
    /// Remote token matched the stored one
    Unchanged { token: ChangeToken },

    /// New image stored, recorded and announced
    Delivered {
        token: ChangeToken,
        artifact: StoredArtifact,
        report: FanoutReport,
    },
}

impl RunOutcome {
    pub fn stage(&self) -> Stage {
        match self {
            RunOutcome::Unchanged { .. } => Stage::Unchanged,
            RunOutcome::Delivered { .. } => Stage::Notifying,
        }
    }
}

/// Orchestrates probe, store, state and fan-out for one resource
pub struct ChangePipeline {
    url: String,
    probe: Box<dyn ResourceProbe>,
    state: LocalState,
    store: ImageStore,
    fanout: NotificationFanout,
}

impl ChangePipeline {
    pub fn new(
        url: impl Into<String>,
        probe: impl ResourceProbe + 'static,
        state: LocalState,
        store: ImageStore,
        fanout: NotificationFanout,
    ) -> Self {
        Self {
            url: url.into(),
            probe: Box::new(probe),
            state,
            store,
            fanout,
        }
    }

    /// Assemble the production pipeline.
    ///
    /// The desktop channel is always registered. The Slack channel is
    /// registered when the chat config file exists and parses; a malformed
    /// file only disables chat.
    pub async fn from_config(config: &WatchConfig) -> Self {
        let client = reqwest::Client::new();

        let mut fanout = NotificationFanout::new().with_channel(DesktopChannel::new(
            config.notification.clone(),
            config.app_icon_path(),
        ));

        let chat_path = config.chat_config_path();
        match load_chat_config(&chat_path).await {
            Ok(Some(chat)) => {
                tracing::info!("Chat notifications enabled for {}", chat.channel);
                fanout.push(Box::new(SlackChannel::new(
                    client.clone(),
                    chat,
                    config.slack.clone(),
                    config.notification.clone(),
                    config.url.clone(),
                )));
            }
            Ok(None) => {
                tracing::debug!("No chat config at {}, chat disabled", chat_path.display());
            }
            Err(e) => {
                tracing::warn!("Chat disabled: {}", e);
            }
        }

        Self::new(
            config.url.clone(),
            HttpProbe::new(client),
            LocalState::new(config.state_path()),
            ImageStore::new(config.images_path()),
            fanout,
        )
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn fanout(&self) -> &NotificationFanout {
        &self.fanout
    }

    /// Run once against the current local time
    pub async fn run(&self) -> Result<RunOutcome, PipelineError> {
        self.run_at(Local::now()).await
    }

    /// Run once, naming any stored image after `now`
    pub async fn run_at(&self, now: DateTime<Local>) -> Result<RunOutcome, PipelineError> {
        let local = self
            .state
            .read()
            .await
            .map_err(|e| PipelineError::at(Stage::Idle, e))?;

        tracing::info!("Probing {}", self.url);
        let remote = self
            .probe
            .fetch(&self.url)
            .await
            .map_err(|e| PipelineError::at(Stage::ProbingRemote, e))?;

        if local.as_ref() == Some(&remote.token) {
            tracing::info!("Unchanged since {}", remote.token);
            return Ok(RunOutcome::Unchanged {
                token: remote.token,
            });
        }

        match &local {
            Some(previous) => tracing::info!("Changed: {} -> {}", previous, remote.token),
            None => tracing::info!("First check, remote at {}", remote.token),
        }

        let token = remote.token;
        let artifact = self.store.store(remote.body, now).await.map_err(|e| {
            let stage = if e.is_network() {
                Stage::Fetching
            } else {
                Stage::Storing
            };
            PipelineError::at(stage, e)
        })?;

        self.state
            .write(&token)
            .await
            .map_err(|e| PipelineError::at(Stage::UpdatingState, e))?;

        let report = self.fanout.notify(&artifact).await;
        tracing::info!(
            "Announced {} via {} channel(s), {} failed",
            artifact.path.display(),
            report.delivered(),
            report.failed()
        );

        Ok(RunOutcome::Delivered {
            token,
            artifact,
            report,
        })
    }
}
