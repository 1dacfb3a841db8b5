//! Race result submission.
//!
//! The race machine hands its result to a [`ResultSink`] and moves on; it
//! never waits for the upload. [`ChannelSink`] queues results on an
//! unbounded channel that [`run_upload_worker`] drains on whatever async
//! runtime the host application runs, calling the injected
//! [`RaceUploader`]. Failures are logged and dropped.

use std::future::Future;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::error::UploadError;

/// One client's race outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RaceResult {
    /// Saved player identity from local preferences, opaque to this crate
    pub player_identity: Option<String>,

    /// Display name in the room
    pub player_name: String,

    /// Best lap time in seconds, `None` when no lap was completed
    pub best_lap_time: Option<f64>,

    pub laps: u32,

    /// Players in the room when the race ended
    pub player_count: u8,

    pub room_name: String,

    /// Configured race length in seconds
    pub race_length: f64,

    pub finished_at: chrono::DateTime<chrono::Utc>,
}

impl RaceResult {
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "identity": self.player_identity,
            "name": self.player_name,
            "best_time": self.best_lap_time,
            "laps": self.laps,
            "players": self.player_count,
            "room": self.room_name,
            "race_length": self.race_length,
            "finished_at": self.finished_at.to_rfc3339()
        })
    }
}

/// Non-blocking destination for race results.
pub trait ResultSink {
    fn dispatch(&mut self, result: RaceResult);
}

/// Collects results in memory. Useful for offline play.
impl ResultSink for Vec<RaceResult> {
    fn dispatch(&mut self, result: RaceResult) {
        self.push(result);
    }
}

/// Queues results for [`run_upload_worker`].
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<RaceResult>,
}

impl ChannelSink {
    pub fn new(tx: mpsc::UnboundedSender<RaceResult>) -> Self {
        Self { tx }
    }
}

impl ResultSink for ChannelSink {
    fn dispatch(&mut self, result: RaceResult) {
        if self.tx.send(result).is_err() {
            warn!("Upload worker has stopped, race result dropped");
        }
    }
}

/// Create a connected sink and receiver pair.
pub fn upload_channel() -> (ChannelSink, mpsc::UnboundedReceiver<RaceResult>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (ChannelSink::new(tx), rx)
}

/// The external result upload call.
pub trait RaceUploader {
    fn upload(&self, result: &RaceResult)
        -> impl Future<Output = Result<(), UploadError>> + Send;
}

/// Outcome counters returned when the worker stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UploadStats {
    pub succeeded: u32,
    pub failed: u32,
}

/// Upload queued results until every sender is dropped. Each result is
/// attempted once.
pub async fn run_upload_worker<U: RaceUploader>(
    mut rx: mpsc::UnboundedReceiver<RaceResult>,
    uploader: U,
) -> UploadStats {
    let mut stats = UploadStats::default();

    while let Some(result) = rx.recv().await {
        match uploader.upload(&result).await {
            Ok(()) => {
                stats.succeeded += 1;
                info!(
                    "Uploaded race result for {} ({} laps, room {})",
                    result.player_name, result.laps, result.room_name
                );
            }
            Err(e) => {
                stats.failed += 1;
                warn!("Race result upload for {} failed: {}", result.player_name, e);
            }
        }
    }

    stats
}
