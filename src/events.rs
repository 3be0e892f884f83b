//! Events emitted by the scan pipeline.
//!
//! Uses a std::sync::mpsc channel: the scene sends events from the tick
//! thread, the caller drains them wherever it likes. A dropped receiver is
//! not an error for the producer.

use log::debug;
use serde::Serialize;
use std::sync::mpsc::{channel, Receiver, Sender};

use crate::result::GameResult;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ScanEvent {
    /// The capture needed correcting; `cause` says how.
    CaptureDiagnostic { cause: String, score: f64 },
    /// A pixel offset was detected and compensated.
    Calibration { offset: (i32, i32) },
    /// An analysis pass ran on the still scoreboard at this tick.
    ScoreboardStill { msec: i64 },
    /// A finished game result.
    ResultReady(Box<GameResult>),
}

impl ScanEvent {
    pub fn name(&self) -> &'static str {
        match self {
            ScanEvent::CaptureDiagnostic { .. } => "capture_diagnostic",
            ScanEvent::Calibration { .. } => "calibration",
            ScanEvent::ScoreboardStill { .. } => "scoreboard_still",
            ScanEvent::ResultReady(_) => "result_ready",
        }
    }
}

/// Creates the event channel as (sender, receiver).
///
/// The channel is unbounded; events queue up if nobody drains them.
pub fn create_event_queue() -> (Sender<ScanEvent>, Receiver<ScanEvent>) {
    channel()
}

/// Sends an event, ignoring a closed channel.
pub fn emit(sender: &Sender<ScanEvent>, event: ScanEvent) {
    let name = event.name();
    if sender.send(event).is_err() {
        debug!("Event '{}' dropped: receiver closed", name);
    }
}
