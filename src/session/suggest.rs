//! "Next question" suggestion generation and de-duplication.
//!
//! The generator is asked for a strict JSON shape; candidates are then
//! de-duplicated against the currently visible questions by word-set
//! Jaccard similarity over normalized text, ignoring stop words.

use crate::providers::{LlmError, TextGenerator};
use serde::Deserialize;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

/// Candidates at or above this similarity to an existing question are
/// dropped.
pub const DUPLICATE_THRESHOLD: f64 = 0.7;

/// Words carrying no signal for similarity purposes.
const STOP_WORDS: [&str; 34] = [
    "a", "an", "the", "and", "or", "but", "of", "to", "in", "on", "for", "with", "about", "is",
    "are", "was", "do", "does", "did", "you", "your", "their", "they", "we", "our", "it", "its",
    "this", "that", "have", "has", "how", "what", "why",
];

/// The strict JSON shape requested from the generator.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GeneratedSuggestions {
    #[serde(default)]
    pub questions: Vec<String>,
    #[serde(default)]
    pub context: String,
    #[serde(default)]
    pub topics: Vec<String>,
}

/// Lowercase, punctuation to spaces, whitespace collapsed.
pub fn normalize_question(text: &str) -> String {
    let lowered: String = text
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();
    lowered.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn significant_words(normalized: &str) -> HashSet<&str> {
    normalized
        .split_whitespace()
        .filter(|w| !STOP_WORDS.contains(w))
        .collect()
}

/// Word-set Jaccard similarity between two already-normalized questions.
pub fn jaccard_similarity(a: &str, b: &str) -> f64 {
    let set_a = significant_words(a);
    let set_b = significant_words(b);

    if set_a.is_empty() && set_b.is_empty() {
        return 1.0;
    }
    if set_a.is_empty() || set_b.is_empty() {
        return 0.0;
    }

    let intersection = set_a.intersection(&set_b).count();
    let union = set_a.union(&set_b).count();
    intersection as f64 / union as f64
}

/// Filter a candidate batch against existing visible questions and
/// against itself (exact normalized match within the batch).
pub fn filter_duplicates(candidates: Vec<String>, existing: &[String]) -> Vec<String> {
    let existing_normalized: Vec<String> =
        existing.iter().map(|q| normalize_question(q)).collect();

    let mut seen_in_batch: HashSet<String> = HashSet::new();
    let mut kept = Vec::new();

    for candidate in candidates {
        let normalized = normalize_question(&candidate);
        if normalized.is_empty() || !seen_in_batch.insert(normalized.clone()) {
            continue;
        }

        let duplicate = existing_normalized
            .iter()
            .any(|e| jaccard_similarity(&normalized, e) >= DUPLICATE_THRESHOLD);
        if duplicate {
            debug!("Dropping duplicate suggestion: {}", candidate);
            continue;
        }

        kept.push(candidate);
    }

    kept
}

const GENERATOR_SYSTEM: &str = "You are an investment analyst assisting a live pitch meeting. \
Respond only with a JSON object of the shape \
{\"questions\": [string], \"context\": string, \"topics\": [string]}.";

pub struct SuggestionEngine {
    generator: Arc<dyn TextGenerator>,
}

impl SuggestionEngine {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self { generator }
    }

    pub fn is_ready(&self, tenant_id: &str) -> bool {
        self.generator.is_ready(tenant_id)
    }

    /// One generator invocation. Returns the raw candidate set; callers
    /// apply [`filter_duplicates`] against the visible list they hold.
    pub async fn generate(
        &self,
        tenant_id: &str,
        kb_context: &str,
        recent_transcript: &str,
        existing: &[String],
    ) -> Result<GeneratedSuggestions, LlmError> {
        let existing_block = if existing.is_empty() {
            "None yet.".to_string()
        } else {
            existing
                .iter()
                .map(|q| format!("- {}", q))
                .collect::<Vec<_>>()
                .join("\n")
        };

        let recent_block = if recent_transcript.is_empty() {
            "The meeting has not produced transcript yet.".to_string()
        } else {
            recent_transcript.to_string()
        };

        let prompt = format!(
            "Knowledge base for this pitch:\n{kb_context}\n\n\
             Recent discussion:\n{recent_block}\n\n\
             Questions already suggested (do not repeat or rephrase):\n{existing_block}\n\n\
             Suggest 3 to 5 incisive next questions the investor should ask, \
             grounded in the knowledge base and the discussion so far."
        );

        let value = self
            .generator
            .generate_json(tenant_id, GENERATOR_SYSTEM, &prompt)
            .await?;

        serde_json::from_value(value).map_err(|e| LlmError::Parse(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::MockTextGenerator;

    #[test]
    fn test_normalize_question() {
        assert_eq!(
            normalize_question("  What's your  CAC/LTV ratio?! "),
            "what s your cac ltv ratio"
        );
        assert_eq!(normalize_question("???"), "");
    }

    #[test]
    fn test_jaccard_identical_and_disjoint() {
        let a = normalize_question("What is your monthly revenue?");
        let b = normalize_question("What is your monthly revenue?");
        assert_eq!(jaccard_similarity(&a, &b), 1.0);

        let c = normalize_question("Which markets come next?");
        assert!(jaccard_similarity(&a, &c) < DUPLICATE_THRESHOLD);
    }

    #[test]
    fn test_jaccard_ignores_stop_words() {
        let a = normalize_question("What is the monthly revenue");
        let b = normalize_question("monthly revenue");
        // Both reduce to {monthly, revenue} once stop words drop out.
        assert_eq!(jaccard_similarity(&a, &b), 1.0);
    }

    #[test]
    fn test_filter_drops_near_duplicates_of_existing() {
        let existing = vec!["What is your monthly recurring revenue?".to_string()];
        let kept = filter_duplicates(
            vec![
                "what is your monthly recurring revenue".to_string(),
                "How do you plan to expand into Europe?".to_string(),
            ],
            &existing,
        );
        assert_eq!(kept, vec!["How do you plan to expand into Europe?".to_string()]);
    }

    #[test]
    fn test_filter_dedupes_within_batch_exactly() {
        let kept = filter_duplicates(
            vec![
                "How big is the team?".to_string(),
                "HOW BIG IS THE TEAM??".to_string(),
                "Who are your main competitors?".to_string(),
            ],
            &[],
        );
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0], "How big is the team?");
    }

    #[test]
    fn test_filter_empty_result_when_all_duplicate() {
        let existing = vec!["How big is the team?".to_string()];
        let kept = filter_duplicates(vec!["how big is the team".to_string()], &existing);
        assert!(kept.is_empty());
    }

    #[test]
    fn test_dedup_soundness_over_visible_set() {
        // After filtering, no kept candidate is >= threshold similar to
        // any existing question.
        let existing = vec![
            "What is your customer acquisition cost?".to_string(),
            "How do you price the enterprise tier?".to_string(),
        ];
        let candidates = vec![
            "What's the customer acquisition cost?".to_string(),
            "What churn are you seeing in enterprise accounts?".to_string(),
            "Enterprise tier pricing: how does it work?".to_string(),
        ];
        let kept = filter_duplicates(candidates, &existing);
        for question in &kept {
            let normalized = normalize_question(question);
            for prior in &existing {
                assert!(
                    jaccard_similarity(&normalized, &normalize_question(prior))
                        < DUPLICATE_THRESHOLD
                );
            }
        }
    }

    #[tokio::test]
    async fn test_engine_parses_strict_json_shape() {
        let generator = Arc::new(MockTextGenerator::new());
        generator.push_response(serde_json::json!({
            "questions": ["What drove last quarter's growth?"],
            "context": "growth discussion",
            "topics": ["growth"]
        }));

        let engine = SuggestionEngine::new(generator);
        let result = engine
            .generate("tenant-1", "deck context", "recent talk", &[])
            .await
            .unwrap();

        assert_eq!(result.questions.len(), 1);
        assert_eq!(result.context, "growth discussion");
        assert_eq!(result.topics, vec!["growth".to_string()]);
    }

    #[tokio::test]
    async fn test_engine_prompt_carries_existing_questions() {
        let generator = Arc::new(MockTextGenerator::new());
        let engine = SuggestionEngine::new(Arc::clone(&generator) as Arc<dyn TextGenerator>);

        engine
            .generate(
                "tenant-1",
                "ctx",
                "talk",
                &["Existing question one?".to_string()],
            )
            .await
            .unwrap();

        let prompts = generator.prompts();
        assert!(prompts[0].contains("Existing question one?"));
    }
}
