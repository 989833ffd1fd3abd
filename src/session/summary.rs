//! End-of-session summary generation.
//!
//! One invocation per finalization. The generator is asked for a fixed
//! JSON shape which is rendered into a plain-text `content` field; both
//! are persisted. When generation or parsing fails, a deterministic
//! fallback summary is persisted instead.

use crate::model::{MeetingSummary, SessionSummary};
use crate::providers::TextGenerator;
use crate::session::full_audio::CompleteTranscript;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::warn;

const SUMMARIZER_SYSTEM: &str = "You summarize investor pitch meetings. Respond only with a \
JSON object of the shape {\"executive_summary\": string, \"key_topics\": [string], \
\"important_points\": [string], \"questions_asked\": [string], \
\"concerns_or_red_flags\": [string], \"next_steps\": [string], \
\"overall_assessment\": string}.";

/// Distinct diarization labels in segment order ("Speaker 1", ...).
pub fn participants(transcript: &CompleteTranscript) -> Vec<String> {
    let ids: BTreeSet<i32> = transcript
        .segments
        .iter()
        .filter_map(|s| s.speaker_id)
        .collect();
    if ids.is_empty() {
        vec!["Speaker 1".to_string()]
    } else {
        ids.iter().map(|id| format!("Speaker {}", id + 1)).collect()
    }
}

/// The transcript as the summarizer sees it, with speaker attribution.
fn attributed_transcript(transcript: &CompleteTranscript) -> String {
    transcript
        .segments
        .iter()
        .map(|s| match s.speaker_id {
            Some(id) => format!("Speaker {}: {}", id + 1, s.text),
            None => s.text.clone(),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn format_duration(seconds: f64) -> String {
    let total = seconds.round() as u64;
    format!("{}m {}s", total / 60, total % 60)
}

/// Fixed-layout rendering of the structured summary.
pub fn render_summary(summary: &MeetingSummary) -> String {
    let mut out = String::new();
    out.push_str("EXECUTIVE SUMMARY\n");
    out.push_str(&summary.executive_summary);

    let list_section = |title: &str, items: &[String]| -> String {
        if items.is_empty() {
            return String::new();
        }
        let bullets: Vec<String> = items.iter().map(|i| format!("- {}", i)).collect();
        format!("\n\n{}\n{}", title, bullets.join("\n"))
    };

    out.push_str(&list_section("KEY TOPICS", &summary.key_topics));
    out.push_str(&list_section("IMPORTANT POINTS", &summary.important_points));
    out.push_str(&list_section("QUESTIONS ASKED", &summary.questions_asked));
    out.push_str(&list_section(
        "CONCERNS / RED FLAGS",
        &summary.concerns_or_red_flags,
    ));
    out.push_str(&list_section("NEXT STEPS", &summary.next_steps));

    if !summary.overall_assessment.is_empty() {
        out.push_str("\n\nOVERALL ASSESSMENT\n");
        out.push_str(&summary.overall_assessment);
    }
    out
}

/// Deterministic summary used when AI generation is unavailable or its
/// output does not parse.
pub fn fallback_summary(
    duration_secs: f64,
    participants: &[String],
    word_count: usize,
) -> SessionSummary {
    let content = format!(
        "MEETING SUMMARY\n\
         Duration: {}\n\
         Participants: {}\n\
         Transcript length: {} words\n\n\
         AI summary generation failed; the full transcript remains available.",
        format_duration(duration_secs),
        participants.join(", "),
        word_count,
    );
    SessionSummary {
        content,
        structured: None,
    }
}

/// Generate and render the session summary, falling back deterministically.
pub async fn generate_summary(
    generator: &Arc<dyn TextGenerator>,
    tenant_id: &str,
    transcript: &CompleteTranscript,
    detected_languages: &[String],
) -> SessionSummary {
    let participants = participants(transcript);
    let word_count = transcript.text.split_whitespace().count();

    if !generator.is_ready(tenant_id) {
        return fallback_summary(transcript.duration, &participants, word_count);
    }

    let prompt = format!(
        "Meeting duration: {}\nParticipants: {}\nDetected languages: {}\n\n\
         Diarized transcript (speakers may introduce themselves by name; use \
         such self-introductions to attribute statements):\n{}",
        format_duration(transcript.duration),
        participants.join(", "),
        if detected_languages.is_empty() {
            "unknown".to_string()
        } else {
            detected_languages.join(", ")
        },
        attributed_transcript(transcript),
    );

    match generator
        .generate_json(tenant_id, SUMMARIZER_SYSTEM, &prompt)
        .await
    {
        Ok(value) => match serde_json::from_value::<MeetingSummary>(value) {
            Ok(structured) => SessionSummary {
                content: render_summary(&structured),
                structured: Some(structured),
            },
            Err(e) => {
                warn!("Summary JSON did not match the expected shape: {}", e);
                fallback_summary(transcript.duration, &participants, word_count)
            }
        },
        Err(e) => {
            warn!("Summary generation failed: {}", e);
            fallback_summary(transcript.duration, &participants, word_count)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::{MockTextGenerator, ProviderSegment};

    fn transcript() -> CompleteTranscript {
        CompleteTranscript {
            text: "Hi I'm Dana, founder of Acme. Thanks for meeting us.".to_string(),
            language: Some("english".to_string()),
            duration: 125.0,
            segments: vec![
                ProviderSegment {
                    start: 0.0,
                    end: 60.0,
                    text: "Hi I'm Dana, founder of Acme.".to_string(),
                    speaker_id: Some(0),
                },
                ProviderSegment {
                    start: 60.0,
                    end: 125.0,
                    text: "Thanks for meeting us.".to_string(),
                    speaker_id: Some(1),
                },
            ],
            failed_chunks: 0,
        }
    }

    #[test]
    fn test_participants_from_diarization() {
        assert_eq!(
            participants(&transcript()),
            vec!["Speaker 1".to_string(), "Speaker 2".to_string()]
        );

        let empty = CompleteTranscript::default();
        assert_eq!(participants(&empty), vec!["Speaker 1".to_string()]);
    }

    #[test]
    fn test_render_fixed_layout() {
        let summary = MeetingSummary {
            executive_summary: "Strong seed-stage robotics pitch.".to_string(),
            key_topics: vec!["traction".to_string(), "team".to_string()],
            important_points: vec!["ARR doubled in six months".to_string()],
            questions_asked: vec![],
            concerns_or_red_flags: vec!["Single customer concentration".to_string()],
            next_steps: vec!["Share the data room".to_string()],
            overall_assessment: "Worth a partner meeting.".to_string(),
            extras: Default::default(),
        };

        let content = render_summary(&summary);
        assert!(content.starts_with("EXECUTIVE SUMMARY\nStrong seed-stage"));
        assert!(content.contains("KEY TOPICS\n- traction\n- team"));
        assert!(content.contains("CONCERNS / RED FLAGS\n- Single customer concentration"));
        assert!(content.contains("OVERALL ASSESSMENT\nWorth a partner meeting."));
        // Empty sections are omitted.
        assert!(!content.contains("QUESTIONS ASKED"));
    }

    #[test]
    fn test_fallback_is_deterministic() {
        let a = fallback_summary(125.0, &["Speaker 1".to_string()], 10);
        let b = fallback_summary(125.0, &["Speaker 1".to_string()], 10);
        assert_eq!(a.content, b.content);
        assert!(a.content.contains("Duration: 2m 5s"));
        assert!(a.content.contains("10 words"));
        assert!(a.structured.is_none());
    }

    #[tokio::test]
    async fn test_generate_summary_happy_path() {
        let generator = Arc::new(MockTextGenerator::new());
        generator.push_response(serde_json::json!({
            "executive_summary": "Compelling pitch.",
            "key_topics": ["robotics"],
            "important_points": [],
            "questions_asked": [],
            "concerns_or_red_flags": [],
            "next_steps": [],
            "overall_assessment": "Proceed."
        }));
        let generator: Arc<dyn TextGenerator> = generator;

        let summary =
            generate_summary(&generator, "tenant-1", &transcript(), &["english".to_string()])
                .await;
        assert!(summary.content.contains("Compelling pitch."));
        assert_eq!(
            summary.structured.unwrap().overall_assessment,
            "Proceed."
        );
    }

    #[tokio::test]
    async fn test_generate_summary_falls_back_on_provider_failure() {
        let generator: Arc<dyn TextGenerator> = Arc::new(MockTextGenerator::new().failing());
        let summary = generate_summary(&generator, "tenant-1", &transcript(), &[]).await;
        assert!(summary.content.contains("AI summary generation failed"));
        assert!(summary.structured.is_none());
    }

    #[tokio::test]
    async fn test_generate_summary_falls_back_without_key() {
        let generator: Arc<dyn TextGenerator> = Arc::new(MockTextGenerator::new().not_ready());
        let summary = generate_summary(&generator, "tenant-1", &transcript(), &[]).await;
        assert!(summary.content.contains("AI summary generation failed"));
    }
}
