// Inactivity auto-stop behavior under a controlled clock.

mod common;

use common::*;
use pitchroom::audio::AudioData;
use pitchroom::model::{SessionStatus, SummaryState};
use pitchroom::session::ServerMessage;
use std::time::Duration;

#[tokio::test(start_paused = true)]
async fn test_auto_stop_after_silence() {
    let orchestrator = default_orchestrator().await;
    let (session, _) = orchestrator
        .start_session(DECK_ID, None, None)
        .await
        .unwrap();

    let (tx, mut rx) = attach_channel();
    orchestrator.attach(&session.id, tx).await.unwrap();

    // 10 seconds of audio, then silence.
    for _ in 0..20 {
        orchestrator
            .handle_audio(&session.id, AudioData::Bytes(half_second_frame()))
            .await
            .unwrap();
    }

    // Within 4.5 minutes of the last frame the watchdog must have fired.
    tokio::time::sleep(Duration::from_secs(270)).await;

    let finalized = wait_for_finalization(&orchestrator, &session.id).await;
    assert_eq!(finalized.status, SessionStatus::Ended);
    assert_eq!(finalized.summary_state, SummaryState::Completed);

    let messages = drain(&mut rx);
    let auto_stopped = messages.iter().find_map(|m| match m {
        ServerMessage::SessionAutoStopped { reason, .. } => Some(reason.clone()),
        _ => None,
    });
    assert!(
        auto_stopped.map(|r| r.contains("inactive")).unwrap_or(false),
        "expected a session-auto-stopped message mentioning inactivity"
    );
}

#[tokio::test(start_paused = true)]
async fn test_watchdog_does_not_fire_while_audio_flows() {
    let orchestrator = default_orchestrator().await;
    let (session, _) = orchestrator
        .start_session(DECK_ID, None, None)
        .await
        .unwrap();

    let (tx, _rx) = attach_channel();
    orchestrator.attach(&session.id, tx).await.unwrap();

    // Six minutes of steady audio, one frame per (virtual) 10 seconds.
    for _ in 0..36 {
        orchestrator
            .handle_audio(&session.id, AudioData::Bytes(half_second_frame()))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_secs(10)).await;
    }

    let session = orchestrator.get_session(&session.id).await.unwrap();
    assert_eq!(session.status, SessionStatus::Active);
}

#[tokio::test(start_paused = true)]
async fn test_watchdog_survives_detach() {
    let orchestrator = default_orchestrator().await;
    let (session, _) = orchestrator
        .start_session(DECK_ID, None, None)
        .await
        .unwrap();

    let (tx, _rx) = attach_channel();
    orchestrator.attach(&session.id, tx.clone()).await.unwrap();
    orchestrator
        .handle_audio(&session.id, AudioData::Bytes(half_second_frame()))
        .await
        .unwrap();

    // Disconnect; silence keeps accruing with nobody attached.
    orchestrator.detach(&session.id, &tx).await;
    tokio::time::sleep(Duration::from_secs(300)).await;

    let finalized = wait_for_finalization(&orchestrator, &session.id).await;
    assert_eq!(finalized.status, SessionStatus::Ended);
}
