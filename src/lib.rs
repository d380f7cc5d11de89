//! wxwatch - poll a remote weather image and announce new versions
//!
//! Each invocation checks one remote image for a new version by comparing
//! its `Last-Modified` header with the token recorded on the previous run.
//! When it changed, the image is saved under a dated file name, the new
//! token is recorded, and the image is announced on the desktop and
//! optionally in Slack.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────── ChangePipeline ────────────────────────────┐
//! │                                                                        │
//! │  LocalState ──read──┐                                                  │
//! │                     ▼                                                  │
//! │  ResourceProbe ──► compare ──same──► Unchanged                         │
//! │                     │                                                  │
//! │                  changed                                               │
//! │                     ▼                                                  │
//! │              ImageStore.store ──► LocalState.write ──► Fanout.notify   │
//! │                                                        ├─ desktop      │
//! │                                                        └─ slack        │
//! └────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`pipeline`]: staged orchestration of one run
//! - [`probe`]: remote resource probing
//! - [`state`]: persisted change token
//! - [`store`]: dated image storage
//! - [`notify`]: desktop and Slack notification fan-out
//! - [`config`]: configuration management

pub mod config;
pub mod error;
pub mod notify;
pub mod pipeline;
pub mod probe;
pub mod state;
pub mod store;

pub use config::{ChatConfig, WatchConfig};
pub use error::{Error, Result};
pub use pipeline::{ChangePipeline, PipelineError, RunOutcome, Stage};
