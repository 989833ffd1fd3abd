//! Inactivity watchdog.
//!
//! One task per session. Socket disconnects do not cancel it; only
//! explicit stop or its own auto-stop does. Silence keeps accruing while
//! a client is detached.

use crate::session::orchestrator::{Orchestrator, StopReason};
use std::sync::Weak;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{info, warn};

pub fn spawn(
    orchestrator: Weak<Orchestrator>,
    session_id: String,
    period: Duration,
    timeout: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.tick().await; // first tick completes immediately
        loop {
            ticker.tick().await;

            let Some(orchestrator) = orchestrator.upgrade() else {
                break;
            };
            let Some(state) = orchestrator.registry().get(&session_id).await else {
                break;
            };

            let (silence, stopped) = {
                let state = state.lock().await;
                (state.last_audio_at.elapsed(), state.stopped)
            };
            if stopped {
                break;
            }

            if silence >= timeout {
                info!(
                    "Session {} silent for {:?}, auto-stopping",
                    session_id, silence
                );
                // Stop runs detached: it aborts this watchdog's handle,
                // which must not cancel the stop itself.
                let id = session_id.clone();
                tokio::spawn(async move {
                    if let Err(e) = orchestrator.stop(&id, StopReason::Inactivity).await {
                        warn!("Auto-stop of session {} failed: {}", id, e);
                    }
                });
                break;
            }
        }
    })
}
