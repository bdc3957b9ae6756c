//! The tracking session: a reactive task that re-runs the refresh pipeline on
//! every page snapshot.
//!
//! The page glue posts a [`PageSnapshot`] whenever the move-controls
//! container mutates; the session resolves it and publishes the resulting
//! highlight. Each cycle recomputes everything from the snapshot, so a burst
//! of mutations is safe to coalesce down to the newest snapshot. The session
//! stays in Tracking until it is stopped explicitly or the snapshot channel
//! closes; stopping releases the task, so repeated activations never
//! accumulate observers.

use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use wayfarer_protocol::{PageSnapshot, UiUpdate};

use crate::tracker::{Refresh, TrackError, Tracker};

/// Snapshots queued between refresh cycles before the sender is backpressured.
pub const SNAPSHOT_BUFFER: usize = 32;

/// How long activation waits for the page to produce a readout-bearing
/// snapshot before giving up.
pub const FIRST_SNAPSHOT_TIMEOUT: Duration = Duration::from_secs(10);

/// A running tracking session and the channels to talk to it.
pub struct Session {
    pub handle: SessionHandle,
    /// Feed observed page state in here.
    pub snapshots: mpsc::Sender<PageSnapshot>,
    /// Latest published highlight, if any cycle has produced one.
    pub updates: watch::Receiver<Option<UiUpdate>>,
}

pub struct SessionHandle {
    stop: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl SessionHandle {
    /// Stops the session and waits for the task to wind down. Idempotent at
    /// the call site: a finished task just joins immediately.
    pub async fn stop(self) {
        let _ = self.stop.send(true);
        let _ = self.task.await;
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Session {
    /// Activates tracking: transitions Idle → Tracking, waits (bounded) for
    /// the first usable snapshot, performs the initial refresh, then reacts
    /// to every further snapshot until stopped.
    pub fn spawn(tracker: Tracker, first_timeout: Duration) -> Session {
        let (snapshots_tx, snapshots_rx) = mpsc::channel(SNAPSHOT_BUFFER);
        let (updates_tx, updates_rx) = watch::channel(None);
        let (stop_tx, stop_rx) = watch::channel(false);

        let task = tokio::spawn(run(tracker, snapshots_rx, updates_tx, stop_rx, first_timeout));

        Session {
            handle: SessionHandle {
                stop: stop_tx,
                task,
            },
            snapshots: snapshots_tx,
            updates: updates_rx,
        }
    }
}

async fn run(
    tracker: Tracker,
    mut snapshots: mpsc::Receiver<PageSnapshot>,
    updates: watch::Sender<Option<UiUpdate>>,
    mut stop: watch::Receiver<bool>,
    first_timeout: Duration,
) {
    // Activation phase: wait for the readout element to exist at all, but
    // never longer than the timeout.
    let first = tokio::select! {
        _ = stop.changed() => return,
        first = tokio::time::timeout(first_timeout, readout_bearing(&mut snapshots)) => {
            match first {
                Ok(Some(snapshot)) => snapshot,
                Ok(None) => return,
                Err(_) => {
                    warn!(timeout_ms = first_timeout.as_millis() as u64,
                          "no position readout appeared; abandoning activation");
                    return;
                }
            }
        }
    };
    resolve(&tracker, &first, &updates);

    loop {
        tokio::select! {
            _ = stop.changed() => {
                info!("tracking stopped");
                return;
            }
            next = snapshots.recv() => {
                let Some(mut snapshot) = next else {
                    // Page glue dropped its sender; nothing left to observe.
                    return;
                };
                // Coalesce bursts of mutations down to the newest snapshot.
                while let Ok(later) = snapshots.try_recv() {
                    snapshot = later;
                }
                resolve(&tracker, &snapshot, &updates);
            }
        }
    }
}

async fn readout_bearing(snapshots: &mut mpsc::Receiver<PageSnapshot>) -> Option<PageSnapshot> {
    loop {
        match snapshots.recv().await {
            None => return None,
            Some(snapshot) if snapshot.readout.is_some() => return Some(snapshot),
            // Controls rebuilt before the readout rendered; keep waiting.
            Some(_) => continue,
        }
    }
}

/// One refresh cycle. Failures degrade to "no highlight change this cycle"
/// and the next snapshot retries independently.
fn resolve(tracker: &Tracker, snapshot: &PageSnapshot, updates: &watch::Sender<Option<UiUpdate>>) {
    match tracker.refresh(snapshot) {
        Ok(Refresh::Highlight(direction)) => {
            debug!(%direction, "highlighting next move");
            let _ = updates.send(Some(UiUpdate::highlight(direction)));
        }
        Ok(Refresh::OffPath) | Ok(Refresh::Complete) => {
            // Idle: withdraw any earlier highlight, otherwise the page would
            // keep reapplying a stale direction on every re-render.
            debug!("no next movement found");
            let _ = updates.send(Some(UiUpdate::clear()));
        }
        Err(err @ (TrackError::ReadoutMissing | TrackError::ReadoutParse(_))) => {
            error!("failed to extract current coordinates: {err}");
        }
        Err(err) => {
            error!("refresh cycle failed: {err}");
        }
    }
}
