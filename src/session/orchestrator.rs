//! The per-session state machine.
//!
//! Owns attach/detach, audio ingest, the suggestion triggers, stop, and
//! the finalization pipeline. All per-session mutations run under the
//! registry entry's mutex; provider and persistence I/O happens with the
//! mutex released, except the short commit writes that linearize the
//! question list.

use crate::audio::{pcm_duration_secs, AudioData, AudioFramer};
use crate::config::{AudioConfig, ProviderConfig, SessionTuning};
use crate::error::{PitchroomError, Result};
use crate::model::{Session, SessionStatus, SuggestedQuestion, SummaryState, Transcript};
use crate::providers::{SpeechToText, TextGenerator};
use crate::session::context::assemble_context;
use crate::session::full_audio::{FullAudioOptions, FullAudioTranscriber};
use crate::session::messages::{QuestionView, ServerMessage, SocketSender};
use crate::session::registry::{SessionRegistry, SharedSessionState};
use crate::session::streaming::{StreamingEvent, StreamingTranscriber};
use crate::session::suggest::{filter_duplicates, SuggestionEngine};
use crate::session::summary::generate_summary;
use crate::session::watchdog;
use chrono::{Duration as ChronoDuration, Utc};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

/// Interval between `recording-status` emissions.
const STATUS_INTERVAL: Duration = Duration::from_secs(5);

/// Placeholder persisted when the full pass hears nothing at all.
const NO_SPEECH_TEXT: &str = "No speech detected";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Explicit,
    Inactivity,
}

impl StopReason {
    fn label(&self) -> &'static str {
        match self {
            StopReason::Explicit => "requested",
            StopReason::Inactivity => "inactive 4m",
        }
    }
}

/// Optimistic response to a stop; finalization continues asynchronously.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StopSnapshot {
    pub ended_at: chrono::DateTime<Utc>,
    pub duration_seconds: f64,
    pub summary_pending: bool,
}

pub struct Orchestrator {
    registry: SessionRegistry,
    repos: crate::store::Repositories,
    stt: Arc<dyn SpeechToText>,
    generator: Arc<dyn TextGenerator>,
    suggestions: SuggestionEngine,
    framer: AudioFramer,
    audio: AudioConfig,
    tuning: SessionTuning,
    providers: ProviderConfig,
    shutting_down: AtomicBool,
}

impl Orchestrator {
    pub fn new(
        repos: crate::store::Repositories,
        stt: Arc<dyn SpeechToText>,
        generator: Arc<dyn TextGenerator>,
        audio: AudioConfig,
        tuning: SessionTuning,
        providers: ProviderConfig,
    ) -> Arc<Self> {
        let framer = AudioFramer::new(audio.max_frame_bytes);
        Arc::new(Self {
            registry: SessionRegistry::new(),
            repos,
            stt,
            generator: Arc::clone(&generator),
            suggestions: SuggestionEngine::new(generator),
            framer,
            audio,
            tuning,
            providers,
            shutting_down: AtomicBool::new(false),
        })
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    pub fn repos(&self) -> &crate::store::Repositories {
        &self.repos
    }

    /// Signal a process shutdown: in-flight finalization chunks complete,
    /// further chunks are skipped.
    pub fn shutdown(&self) {
        self.shutting_down.store(true, Ordering::SeqCst);
    }

    // ------------------------------------------------------------------
    // Control API
    // ------------------------------------------------------------------

    /// Create a session in `Active` for the given deck.
    pub async fn start_session(
        &self,
        deck_id: &str,
        title: Option<String>,
        owner_id: Option<String>,
    ) -> Result<(Session, String)> {
        let deck = self
            .repos
            .decks
            .get(deck_id)
            .await?
            .ok_or_else(|| PitchroomError::InvalidSession {
                message: format!("deck {} not found", deck_id),
            })?;

        let title = title.unwrap_or_else(|| format!("Pitch meeting: {}", deck.title));
        let owner_id = owner_id.unwrap_or_else(|| "unknown".to_string());
        let session = Session::new(deck_id, &deck.tenant_id, &owner_id, &title);
        self.repos.sessions.insert(session.clone()).await?;

        // Opaque attach token; verification happens at the identity seam.
        let attach_token = uuid::Uuid::new_v4().to_string();
        info!("Started session {} for deck {}", session.id, deck_id);
        Ok((session, attach_token))
    }

    pub async fn get_session(&self, session_id: &str) -> Result<Session> {
        self.repos
            .sessions
            .get(session_id)
            .await?
            .ok_or_else(|| PitchroomError::SessionNotFound {
                session_id: session_id.to_string(),
            })
    }

    pub async fn get_transcript(&self, session_id: &str) -> Result<Vec<Transcript>> {
        // Validate existence so unknown ids fail loudly instead of
        // returning an empty list.
        self.get_session(session_id).await?;
        self.repos.transcripts.list_by_session(session_id).await
    }

    // ------------------------------------------------------------------
    // Attach / detach
    // ------------------------------------------------------------------

    /// Idempotent attach. Reconnects preserve the registry entry, its
    /// PCM, and sub-tasks; only the socket handle is swapped.
    pub async fn attach(self: &Arc<Self>, session_id: &str, socket: SocketSender) -> Result<()> {
        let session = self.get_session(session_id).await?;
        if session.status != SessionStatus::Active {
            return Err(PitchroomError::SessionInactive {
                session_id: session_id.to_string(),
                status: format!("{:?}", session.status),
            });
        }

        let state = self.registry.create(session_id).await;
        let schedule_initial = {
            let mut state = state.lock().await;
            state.socket = Some(socket);

            if state.watchdog.is_none() {
                state.watchdog = Some(watchdog::spawn(
                    Arc::downgrade(self),
                    session_id.to_string(),
                    Duration::from_secs(self.tuning.watchdog_period_secs),
                    Duration::from_secs(self.tuning.inactivity_timeout_secs),
                ));
            }

            state.emit(ServerMessage::SessionStatus {
                status: "joined".to_string(),
                message: format!("Joined session {}", session_id),
            });
            state.emit(ServerMessage::SuggestedQuestionsUpdated {
                questions: visible_views(&session),
            });

            // Once per session, also under reconnect races.
            let schedule = !state.initial_suggestions_done;
            state.initial_suggestions_done = true;
            schedule
        };

        if schedule_initial {
            let this = Arc::clone(self);
            let id = session_id.to_string();
            tokio::spawn(async move {
                this.run_initial_suggestions(&id).await;
            });
        }

        info!("Attached socket to session {}", session_id);
        Ok(())
    }

    /// Clear the socket handle if it still belongs to this connection.
    /// Everything else in the entry survives for reconnect; the watchdog
    /// keeps counting silence.
    pub async fn detach(&self, session_id: &str, socket: &SocketSender) {
        if let Some(state) = self.registry.get(session_id).await {
            let mut state = state.lock().await;
            let is_current = state
                .socket
                .as_ref()
                .map(|current| current.same_channel(socket))
                .unwrap_or(false);
            if is_current {
                state.socket = None;
                info!("Detached socket from session {}", session_id);
            }
        }
    }

    // ------------------------------------------------------------------
    // Audio ingest
    // ------------------------------------------------------------------

    pub async fn handle_audio(self: &Arc<Self>, session_id: &str, data: AudioData) -> Result<()> {
        let Some(pcm) = self.framer.normalize(data) else {
            return Ok(()); // rejected frames are dropped silently
        };

        let Some(state_arc) = self.registry.get(session_id).await else {
            return Err(PitchroomError::InvalidSession {
                message: format!("join session {} before sending audio", session_id),
            });
        };

        // Lazy streaming init needs the session document; fetch it with
        // the state mutex released.
        let needs_init = {
            let state = state_arc.lock().await;
            if state.stopped {
                return Ok(());
            }
            state.streaming.is_none()
        };
        let session_doc = if needs_init {
            match self.get_session(session_id).await {
                Ok(doc) if doc.status == SessionStatus::Active => Some(doc),
                Ok(_) => return Ok(()), // stopped elsewhere; drop the frame
                Err(e) => return Err(e),
            }
        } else {
            None
        };

        let mut state = state_arc.lock().await;
        if state.stopped {
            return Ok(());
        }

        if state.streaming.is_none() {
            let Some(doc) = session_doc else {
                return Ok(());
            };
            if !self.stt.is_ready(&doc.tenant_id) {
                if !state.provider_refusal_sent {
                    state.provider_refusal_sent = true;
                    state.emit(ServerMessage::Error {
                        message: "transcription provider key is not configured".to_string(),
                        code: PitchroomError::ProviderKeyMissing.code().to_string(),
                    });
                }
                return Ok(());
            }

            let (events_tx, events_rx) = mpsc::unbounded_channel();
            let transcriber = StreamingTranscriber::new(
                self.audio.sample_rate,
                None,
                &doc.tenant_id,
                &self.providers.stt_model,
                self.tuning.flush_interval_secs,
                self.tuning.min_window_secs,
                Arc::clone(&self.stt),
                events_tx,
            );
            state.streaming = Some(transcriber);
            state.streaming_events_task = Some(self.spawn_streaming_consumer(
                events_rx,
                Arc::clone(&state_arc),
                session_id.to_string(),
                doc.deck_id.clone(),
            ));
            info!("Session {} entered recording", session_id);
        }

        // Append in receive order, then forward to the rolling window.
        state.pcm.extend_from_slice(&pcm);
        state.frames_received += 1;
        state.last_audio_at = tokio::time::Instant::now();
        if let Some(streaming) = &state.streaming {
            streaming.send(&pcm);
        }

        let status_due = state
            .last_status_at
            .map(|at| at.elapsed() >= STATUS_INTERVAL)
            .unwrap_or(true);
        if status_due {
            state.last_status_at = Some(tokio::time::Instant::now());
            let bytes = state.pcm.len();
            state.emit(ServerMessage::RecordingStatus {
                audio_size_mb: bytes as f64 / (1024.0 * 1024.0),
                audio_chunks: state.frames_received,
                estimated_duration_seconds: pcm_duration_secs(bytes, self.audio.sample_rate),
                message: "Recording".to_string(),
            });
        }

        // Rolling suggestion gate.
        let interval = Duration::from_secs(self.tuning.suggestion_interval_secs);
        let interval_elapsed = state
            .suggestion_last_run
            .map(|at| at.elapsed() >= interval)
            .unwrap_or(true);
        if state.initial_suggestions_done && interval_elapsed {
            let words =
                state.recent_final_words(self.tuning.suggestion_window_secs, Utc::now());
            if words >= self.tuning.suggestion_min_words {
                state.suggestion_last_run = Some(tokio::time::Instant::now());
                let this = Arc::clone(self);
                let id = session_id.to_string();
                tokio::spawn(async move {
                    this.run_rolling_suggestions(&id).await;
                });
            }
        }

        Ok(())
    }

    fn spawn_streaming_consumer(
        &self,
        mut events: mpsc::UnboundedReceiver<StreamingEvent>,
        state: SharedSessionState,
        session_id: String,
        deck_id: String,
    ) -> tokio::task::JoinHandle<()> {
        let transcripts = Arc::clone(&self.repos.transcripts);
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                match event {
                    StreamingEvent::Partial {
                        text,
                        language,
                        timestamp,
                    } => {
                        let record = Transcript {
                            session_id: session_id.clone(),
                            deck_id: deck_id.clone(),
                            timestamp,
                            text: text.clone(),
                            speaker: None,
                            speaker_id: None,
                            is_final: false, // the full pass stays authoritative
                            confidence: None,
                            language_code: language.clone(),
                        };
                        if let Err(e) = transcripts.insert(record).await {
                            warn!("Failed to persist partial transcript: {}", e);
                        }

                        let mut state = state.lock().await;
                        state.recent_finals.push((timestamp, text.clone()));
                        state.emit(ServerMessage::Transcription {
                            text,
                            is_final: true,
                            timestamp,
                            speaker: None,
                            speaker_id: None,
                            language_code: language,
                        });
                    }
                    StreamingEvent::Error { message } => {
                        let state = state.lock().await;
                        state.emit(ServerMessage::Error {
                            message,
                            code: "TRANSCRIPTION_ERROR".to_string(),
                        });
                    }
                }
            }
        })
    }

    // ------------------------------------------------------------------
    // Stop and finalization
    // ------------------------------------------------------------------

    /// Idempotent stop. The first call wins and schedules exactly one
    /// finalization run; later calls return the optimistic snapshot.
    pub async fn stop(self: &Arc<Self>, session_id: &str, reason: StopReason) -> Result<StopSnapshot> {
        let mut session = self.get_session(session_id).await?;
        if session.status != SessionStatus::Active {
            return self.stop_snapshot(&session);
        }

        let state = self.registry.create(session_id).await;
        {
            let mut state = state.lock().await;
            if state.stopped {
                drop(state);
                let session = self.get_session(session_id).await?;
                return self.stop_snapshot(&session);
            }
            state.stopped = true;
            state.abort_watchdog();
        }

        let now = Utc::now();
        let duration = duration_secs(session.started_at, now);
        session.status = SessionStatus::Ended;
        session.ended_at = Some(now);
        session.duration_seconds = Some(duration);
        self.repos.sessions.save(session.clone()).await?;

        if reason == StopReason::Inactivity {
            let state = state.lock().await;
            state.emit(ServerMessage::SessionAutoStopped {
                reason: reason.label().to_string(),
                ended_at: now,
                total_duration: duration,
            });
        }

        info!(
            "Session {} stopping ({}), {:.1}s recorded",
            session_id,
            reason.label(),
            duration
        );

        let this = Arc::clone(self);
        let id = session_id.to_string();
        tokio::spawn(async move {
            this.finalize(&id).await;
        });

        self.stop_snapshot(&session)
    }

    fn stop_snapshot(&self, session: &Session) -> Result<StopSnapshot> {
        Ok(StopSnapshot {
            ended_at: session.ended_at.unwrap_or_else(Utc::now),
            duration_seconds: session.duration_seconds.unwrap_or(0.0),
            summary_pending: matches!(
                session.summary_state,
                SummaryState::Pending | SummaryState::Generating
            ),
        })
    }

    /// The finalization pipeline. Runs detached from any socket; socket
    /// disconnects do not cancel it.
    pub async fn finalize(self: &Arc<Self>, session_id: &str) {
        match self.run_finalization(session_id).await {
            Ok(()) => info!("Session {} finalized", session_id),
            Err(e) => {
                error!("Finalization of session {} failed: {}", session_id, e);
                if let Err(save_err) = self.mark_failed(session_id).await {
                    error!(
                        "Could not mark session {} as failed: {}",
                        session_id, save_err
                    );
                }
            }
        }
        // Partial transcripts stay persisted either way; only the live
        // entry goes.
        self.registry.remove(session_id).await;
    }

    async fn run_finalization(self: &Arc<Self>, session_id: &str) -> Result<()> {
        let state = self.registry.get(session_id).await.ok_or_else(|| {
            PitchroomError::Other(format!(
                "registry state missing at finalize for session {}",
                session_id
            ))
        })?;

        // Close the streaming transcriber and let its event consumer
        // drain, so the last window's partial lands before the full pass.
        let (streaming, events_task) = {
            let mut state = state.lock().await;
            (state.streaming.take(), state.streaming_events_task.take())
        };
        if let Some(streaming) = streaming {
            streaming.close().await;
            drop(streaming);
        }
        if let Some(task) = events_task {
            let _ = task.await;
        }

        let pcm = {
            let state = state.lock().await;
            state.pcm.clone()
        };

        let mut session = self.get_session(session_id).await?;
        session.summary_state = SummaryState::Generating;
        self.repos.sessions.save(session.clone()).await?;

        let transcriber = FullAudioTranscriber::new(Arc::clone(&self.stt), self.audio.sample_rate);
        let options = FullAudioOptions {
            tenant_id: session.tenant_id.clone(),
            model: self.providers.diarization_model.clone(),
            language: None,
        };
        let transcript = transcriber
            .transcribe_complete(&pcm, &options, &self.shutting_down)
            .await?;

        // Persist the authoritative segments.
        let mut persisted = 0usize;
        for segment in &transcript.segments {
            let record = Transcript {
                session_id: session_id.to_string(),
                deck_id: session.deck_id.clone(),
                timestamp: session.started_at
                    + ChronoDuration::milliseconds((segment.start * 1000.0) as i64),
                text: segment.text.clone(),
                speaker: segment.speaker_id.map(|id| format!("Speaker {}", id + 1)),
                speaker_id: segment.speaker_id,
                is_final: true,
                confidence: None,
                language_code: transcript.language.clone(),
            };
            self.repos.transcripts.insert(record).await?;
            persisted += 1;
        }
        if persisted == 0 {
            self.repos
                .transcripts
                .insert(Transcript {
                    session_id: session_id.to_string(),
                    deck_id: session.deck_id.clone(),
                    timestamp: session.started_at,
                    text: NO_SPEECH_TEXT.to_string(),
                    speaker: None,
                    speaker_id: None,
                    is_final: true,
                    confidence: None,
                    language_code: None,
                })
                .await?;
        }

        let detected_languages: Vec<String> = transcript.language.clone().into_iter().collect();
        let summary = generate_summary(
            &self.generator,
            &session.tenant_id,
            &transcript,
            &detected_languages,
        )
        .await;

        let mut session = self.get_session(session_id).await?;
        session.detected_languages = detected_languages;
        session.summary = Some(summary);
        session.summary_state = SummaryState::Completed;
        session.transcript_count = self.repos.transcripts.count_final(session_id).await?;
        self.repos.sessions.save(session).await?;

        Ok(())
    }

    async fn mark_failed(&self, session_id: &str) -> Result<()> {
        let mut session = self.get_session(session_id).await?;
        session.status = SessionStatus::Failed;
        session.summary_state = SummaryState::Failed;
        self.repos.sessions.save(session).await
    }

    // ------------------------------------------------------------------
    // Question lifecycle
    // ------------------------------------------------------------------

    /// Mark a question answered (write-once) and generate replacements.
    pub async fn mark_answered(
        self: &Arc<Self>,
        session_id: &str,
        question_id: &str,
    ) -> Result<Session> {
        let state = self.registry.get(session_id).await;
        // Question-list mutations are linearized under the session mutex.
        let guard = match &state {
            Some(state) => Some(state.lock().await),
            None => None,
        };

        let mut session = self.get_session(session_id).await?;
        let question = session
            .suggested_questions
            .iter_mut()
            .find(|q| q.id == question_id && !q.deleted)
            .ok_or_else(|| PitchroomError::QuestionNotFound {
                question_id: question_id.to_string(),
            })?;

        let already_answered = question.answered;
        if !already_answered {
            question.answered = true;
            question.answered_at = Some(Utc::now());
            self.repos.sessions.save(session.clone()).await?;
        }
        drop(guard);

        if !already_answered && session.status == SessionStatus::Active {
            let this = Arc::clone(self);
            let id = session_id.to_string();
            let answered = question_id.to_string();
            tokio::spawn(async move {
                this.run_replacement_suggestions(&id, &answered).await;
            });
        }

        Ok(session)
    }

    /// Soft-delete a question (write-once, idempotent).
    pub async fn delete_question(&self, session_id: &str, question_id: &str) -> Result<Session> {
        let state = self.registry.get(session_id).await;
        let guard = match &state {
            Some(state) => Some(state.lock().await),
            None => None,
        };

        let mut session = self.get_session(session_id).await?;
        let question = session
            .suggested_questions
            .iter_mut()
            .find(|q| q.id == question_id)
            .ok_or_else(|| PitchroomError::QuestionNotFound {
                question_id: question_id.to_string(),
            })?;

        if !question.deleted {
            question.deleted = true;
            self.repos.sessions.save(session.clone()).await?;
        }

        if let Some(guard) = &guard {
            guard.emit(ServerMessage::SuggestedQuestionsUpdated {
                questions: visible_views(&session),
            });
        }

        Ok(session)
    }

    // ------------------------------------------------------------------
    // Suggestion runs
    // ------------------------------------------------------------------

    async fn run_initial_suggestions(self: &Arc<Self>, session_id: &str) {
        let Ok(session) = self.get_session(session_id).await else {
            return;
        };
        if !self.suggestions.is_ready(&session.tenant_id) {
            info!("No generator key; skipping initial suggestions");
            return;
        }

        let kb_context = self.assemble_kb_context(&session).await;
        let existing: Vec<String> = session
            .visible_questions()
            .iter()
            .map(|q| q.text.clone())
            .collect();

        match self
            .suggestions
            .generate(&session.tenant_id, &kb_context, "", &existing)
            .await
        {
            Ok(generated) => {
                let context = generated.context.clone();
                let topics = generated.topics.clone();
                if let Some(session) = self
                    .insert_questions(session_id, generated.questions, None)
                    .await
                {
                    if let Some(state) = self.registry.get(session_id).await {
                        let state = state.lock().await;
                        state.emit(ServerMessage::Suggestion {
                            questions: visible_views(&session),
                            context,
                            topics,
                            timestamp: Utc::now(),
                        });
                    }
                }
            }
            Err(e) => warn!("Initial suggestion generation failed: {}", e),
        }
    }

    async fn run_rolling_suggestions(self: &Arc<Self>, session_id: &str) {
        let Ok(session) = self.get_session(session_id).await else {
            return;
        };
        if session.status != SessionStatus::Active
            || !self.suggestions.is_ready(&session.tenant_id)
        {
            return;
        }

        let recent = match self.registry.get(session_id).await {
            Some(state) => {
                let mut state = state.lock().await;
                let _ = state.recent_final_words(self.tuning.suggestion_window_secs, Utc::now());
                state
                    .recent_finals
                    .iter()
                    .map(|(_, text)| text.as_str())
                    .collect::<Vec<_>>()
                    .join(" ")
            }
            None => return,
        };

        let kb_context = self.assemble_kb_context(&session).await;
        let existing: Vec<String> = session
            .visible_questions()
            .iter()
            .map(|q| q.text.clone())
            .collect();

        match self
            .suggestions
            .generate(&session.tenant_id, &kb_context, &recent, &existing)
            .await
        {
            Ok(generated) => {
                if let Some(session) = self
                    .insert_questions(session_id, generated.questions, None)
                    .await
                {
                    self.emit_questions_updated(session_id, &session).await;
                }
            }
            Err(e) => warn!("Rolling suggestion generation failed: {}", e),
        }
    }

    async fn run_replacement_suggestions(self: &Arc<Self>, session_id: &str, answered_id: &str) {
        let Ok(session) = self.get_session(session_id).await else {
            return;
        };
        if !self.suggestions.is_ready(&session.tenant_id) {
            return;
        }

        let kb_context = self.assemble_kb_context(&session).await;
        let existing: Vec<String> = session
            .visible_questions()
            .iter()
            .map(|q| q.text.clone())
            .collect();

        match self
            .suggestions
            .generate(&session.tenant_id, &kb_context, "", &existing)
            .await
        {
            Ok(generated) => {
                if let Some(session) = self
                    .insert_questions(session_id, generated.questions, Some(answered_id))
                    .await
                {
                    self.emit_questions_updated(session_id, &session).await;
                }
            }
            Err(e) => warn!("Replacement suggestion generation failed: {}", e),
        }
    }

    /// De-duplicate candidates against the visible set and commit them
    /// under the session mutex. The first new question takes the answered
    /// question's slot when one is given; the rest go to the head.
    /// Returns the saved session when anything changed.
    async fn insert_questions(
        self: &Arc<Self>,
        session_id: &str,
        candidates: Vec<String>,
        replace_slot_of: Option<&str>,
    ) -> Option<Session> {
        let state = self.registry.get(session_id).await;
        let guard = match &state {
            Some(state) => Some(state.lock().await),
            None => None,
        };

        let mut session = self.get_session(session_id).await.ok()?;
        let visible: Vec<String> = session
            .visible_questions()
            .iter()
            .map(|q| q.text.clone())
            .collect();

        let kept = filter_duplicates(candidates, &visible);
        if kept.is_empty() {
            return None;
        }

        let mut new_questions: Vec<SuggestedQuestion> =
            kept.iter().map(|text| SuggestedQuestion::new(text)).collect();

        if let Some(answered_id) = replace_slot_of {
            if let Some(position) = session
                .suggested_questions
                .iter()
                .position(|q| q.id == answered_id)
            {
                let replacement = new_questions.remove(0);
                session.suggested_questions.insert(position, replacement);
            }
        }
        // Remaining new questions insert at the head, preserving the tail.
        for question in new_questions.into_iter().rev() {
            session.suggested_questions.insert(0, question);
        }
        session.suggestion_count += kept.len();

        if let Err(e) = self.repos.sessions.save(session.clone()).await {
            warn!("Failed to persist suggestions: {}", e);
            return None;
        }
        Some(session)
    }

    async fn emit_questions_updated(&self, session_id: &str, session: &Session) {
        if let Some(state) = self.registry.get(session_id).await {
            let state = state.lock().await;
            state.emit(ServerMessage::SuggestedQuestionsUpdated {
                questions: visible_views(session),
            });
        }
    }

    async fn assemble_kb_context(&self, session: &Session) -> String {
        let deck = match self.repos.decks.get(&session.deck_id).await {
            Ok(Some(deck)) => deck,
            _ => return "Knowledge base not available".to_string(),
        };
        let thesis = self
            .repos
            .theses
            .for_tenant(&session.tenant_id)
            .await
            .ok()
            .flatten();
        let messages = self
            .repos
            .messages
            .list_for_deck(&session.deck_id)
            .await
            .unwrap_or_default();
        let supporting = self
            .repos
            .decks
            .supporting_documents(&session.deck_id)
            .await
            .unwrap_or_default();
        let data_room = self
            .repos
            .decks
            .data_room_documents(&session.deck_id)
            .await
            .unwrap_or_default();

        assemble_context(&deck, thesis.as_ref(), &messages, &supporting, &data_room)
    }
}

fn duration_secs(from: chrono::DateTime<Utc>, to: chrono::DateTime<Utc>) -> f64 {
    to.signed_duration_since(from).num_milliseconds() as f64 / 1000.0
}

fn visible_views(session: &Session) -> Vec<QuestionView> {
    session
        .visible_questions()
        .into_iter()
        .map(QuestionView::from)
        .collect()
}
