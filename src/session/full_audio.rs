//! End-of-session full-audio transcription.
//!
//! Produces the authoritative diarized transcript from the entire
//! cumulative PCM. Audio over the provider's request cap is split into
//! PCM chunks transcribed sequentially and stitched back on a time base
//! computed from PCM byte counts, which stay exact where
//! provider-reported durations drift on malformed boundaries.

use crate::audio::{pcm_duration_secs, wrap_pcm_as_wav, WAV_HEADER_BYTES};
use crate::error::{PitchroomError, Result};
use crate::providers::{ProviderSegment, SpeechToText, TranscribeOptions};
use std::ops::Range;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

/// The provider rejects uploads beyond this.
const PROVIDER_CAP_BYTES: usize = 25 * 1024 * 1024;

/// Chunk target, leaving safety margin under the provider cap.
const CHUNK_WAV_TARGET_BYTES: usize = 20 * 1024 * 1024;

/// No chunk shorter than this; a smaller trailing residue merges into
/// the previous chunk.
const MIN_CHUNK_SECS: f64 = 1.0;

/// Audio shorter than this fails outright.
const MIN_AUDIO_SECS: f64 = 0.25;

const MAX_RETRIES_PER_CHUNK: u32 = 3;
const BACKOFF_START: std::time::Duration = std::time::Duration::from_secs(1);
const BACKOFF_CAP: std::time::Duration = std::time::Duration::from_secs(10);

/// Stands in for a chunk whose transcription failed, keeping the
/// surrounding chunks time-aligned.
const FAILED_CHUNK_PLACEHOLDER: &str = "[transcription unavailable]";

#[derive(Debug, Clone, Default)]
pub struct CompleteTranscript {
    pub text: String,
    pub language: Option<String>,
    /// Always derived from the PCM byte count, never from the provider.
    pub duration: f64,
    pub segments: Vec<ProviderSegment>,
    pub failed_chunks: usize,
}

#[derive(Debug, Clone)]
pub struct FullAudioOptions {
    pub tenant_id: String,
    pub model: String,
    pub language: Option<String>,
}

pub struct FullAudioTranscriber {
    stt: Arc<dyn SpeechToText>,
    sample_rate: u32,
}

impl FullAudioTranscriber {
    pub fn new(stt: Arc<dyn SpeechToText>, sample_rate: u32) -> Self {
        Self { stt, sample_rate }
    }

    /// Transcribe the whole session. `shutdown` is consulted between
    /// chunks: the in-flight call completes, no further chunks are
    /// submitted, and what finished is returned.
    pub async fn transcribe_complete(
        &self,
        pcm: &[u8],
        opts: &FullAudioOptions,
        shutdown: &AtomicBool,
    ) -> Result<CompleteTranscript> {
        let total_duration = pcm_duration_secs(pcm.len(), self.sample_rate);
        if pcm.is_empty() || total_duration < MIN_AUDIO_SECS {
            return Err(PitchroomError::AudioTooShort {
                duration_secs: total_duration,
            });
        }

        let ranges = split_pcm(pcm.len(), self.sample_rate);
        info!(
            "Full-audio transcription: {:.1}s of PCM in {} chunk(s)",
            total_duration,
            ranges.len()
        );

        let provider_opts = TranscribeOptions {
            tenant_id: opts.tenant_id.clone(),
            model: opts.model.clone(),
            language: opts.language.clone(),
            diarize: true,
        };

        let mut merged = CompleteTranscript {
            duration: total_duration,
            ..Default::default()
        };
        let mut text_parts: Vec<String> = Vec::new();
        let mut offset_secs = 0.0f64;
        let mut succeeded = 0usize;

        for (index, range) in ranges.iter().enumerate() {
            let chunk = &pcm[range.clone()];
            let chunk_duration = pcm_duration_secs(chunk.len(), self.sample_rate);

            if index > 0 && shutdown.load(Ordering::SeqCst) {
                warn!(
                    "Shutdown requested mid-transcription; skipping chunks {}..{}",
                    index,
                    ranges.len()
                );
                for remaining in &ranges[index..] {
                    let skipped = pcm_duration_secs(remaining.len(), self.sample_rate);
                    merged.segments.push(ProviderSegment {
                        start: offset_secs,
                        end: offset_secs + skipped,
                        text: FAILED_CHUNK_PLACEHOLDER.to_string(),
                        speaker_id: None,
                    });
                    text_parts.push(FAILED_CHUNK_PLACEHOLDER.to_string());
                    merged.failed_chunks += 1;
                    offset_secs += skipped;
                }
                break;
            }

            match self.transcribe_chunk(chunk, index, &provider_opts).await {
                Ok(transcript) => {
                    succeeded += 1;
                    if merged.language.is_none() {
                        merged.language = transcript.language.clone();
                    }
                    let trimmed = transcript.text.trim();
                    if !trimmed.is_empty() {
                        text_parts.push(trimmed.to_string());
                    }
                    for segment in transcript.segments {
                        merged.segments.push(ProviderSegment {
                            start: offset_secs + segment.start,
                            end: (offset_secs + segment.end)
                                .min(offset_secs + chunk_duration),
                            text: segment.text,
                            speaker_id: segment.speaker_id,
                        });
                    }
                }
                Err(e) => {
                    warn!("Chunk {} failed after retries: {}", index, e);
                    merged.segments.push(ProviderSegment {
                        start: offset_secs,
                        end: offset_secs + chunk_duration,
                        text: FAILED_CHUNK_PLACEHOLDER.to_string(),
                        speaker_id: None,
                    });
                    text_parts.push(FAILED_CHUNK_PLACEHOLDER.to_string());
                    merged.failed_chunks += 1;
                }
            }

            offset_secs += chunk_duration;
        }

        if succeeded == 0 {
            return Err(PitchroomError::Transcription {
                message: format!("all {} chunk(s) failed", ranges.len()),
            });
        }

        merged.text = text_parts.join(" ");
        Ok(merged)
    }

    /// One chunk with retries: up to 3 on retryable failures, backoff
    /// 1s, 2s, 4s (capped at 10s).
    async fn transcribe_chunk(
        &self,
        chunk: &[u8],
        index: usize,
        opts: &TranscribeOptions,
    ) -> std::result::Result<crate::providers::ProviderTranscript, crate::providers::SttError>
    {
        let wav = wrap_pcm_as_wav(chunk, self.sample_rate);
        let mut backoff = BACKOFF_START;

        let mut attempt = 0u32;
        loop {
            match self.stt.transcribe_wav(wav.clone(), opts).await {
                Ok(transcript) => return Ok(transcript),
                Err(e) if e.is_retryable() && attempt < MAX_RETRIES_PER_CHUNK => {
                    attempt += 1;
                    warn!(
                        "Chunk {} attempt {} failed ({}), retrying in {:?}",
                        index, attempt, e, backoff
                    );
                    tokio::time::sleep(backoff).await;
                    backoff = (backoff * 2).min(BACKOFF_CAP);
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Split a PCM byte length into chunk ranges whose WAV forms fit under
/// the chunk target. Boundaries land on sample boundaries; a trailing
/// residue shorter than the minimum chunk merges into the previous one.
pub fn split_pcm(pcm_len: usize, sample_rate: u32) -> Vec<Range<usize>> {
    // Whole thing fits under the provider cap: one chunk.
    if pcm_len + WAV_HEADER_BYTES <= PROVIDER_CAP_BYTES {
        return vec![0..pcm_len];
    }

    let bytes_per_sec = sample_rate as usize * 2;
    let min_chunk_bytes = (MIN_CHUNK_SECS * bytes_per_sec as f64) as usize;
    // Align the chunk size down to a whole sample.
    let chunk_bytes = (CHUNK_WAV_TARGET_BYTES - WAV_HEADER_BYTES) & !1usize;

    let mut ranges = Vec::new();
    let mut start = 0usize;
    while start < pcm_len {
        let end = (start + chunk_bytes).min(pcm_len);
        ranges.push(start..end);
        start = end;
    }

    if ranges.len() > 1 {
        let last = ranges.last().expect("non-empty ranges").clone();
        if last.len() < min_chunk_bytes {
            ranges.pop();
            let prev = ranges.pop().expect("at least one prior range");
            ranges.push(prev.start..last.end);
        }
    }

    ranges
}
