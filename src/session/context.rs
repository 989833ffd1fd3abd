//! Knowledge-base context assembly.
//!
//! Formats the deck analysis, firm thesis, prior Q&A turns, and attached
//! documents into the context string fed to the question and summary
//! generators. The formatter is pure: identical inputs produce identical
//! output, with no timestamps or randomness.

use crate::model::{DataRoomDocument, Deck, MessageTurn, MixedContent, SupportingDocument, Thesis};

fn format_mixed(content: &MixedContent) -> String {
    match content {
        MixedContent::Structured(value) => {
            serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
        }
        MixedContent::RawText(text) => text.clone(),
    }
}

pub fn assemble_context(
    deck: &Deck,
    thesis: Option<&Thesis>,
    messages: &[MessageTurn],
    supporting: &[SupportingDocument],
    data_room: &[DataRoomDocument],
) -> String {
    let mut sections: Vec<String> = Vec::new();

    let mut deck_section = format!("## Pitch deck: {}\nStatus: {}", deck.title, deck.status);
    if let Some(version) = deck.analysis_version {
        deck_section.push_str(&format!("\nAnalysis version: {}", version));
    }
    sections.push(deck_section);

    match &deck.analysis {
        Some(analysis) => {
            sections.push(format!("## Deck analysis\n{}", format_mixed(analysis)));
        }
        None => sections.push("## Deck analysis\nNot available".to_string()),
    }

    match thesis {
        Some(thesis) => {
            let mut section = String::from("## Firm thesis");
            if let Some(firm) = &thesis.firm_name {
                section.push_str(&format!("\nFirm: {}", firm));
            }
            match &thesis.profile {
                Some(profile) => section.push_str(&format!("\n{}", format_mixed(profile))),
                None => section.push_str("\nNot available"),
            }
            sections.push(section);
        }
        None => sections.push("## Firm thesis\nNot available".to_string()),
    }

    if !messages.is_empty() {
        let turns: Vec<String> = messages
            .iter()
            .map(|m| format!("Q: {}\nA: {}", m.user_query, m.ai_response))
            .collect();
        sections.push(format!("## Prior discussion\n{}", turns.join("\n\n")));
    }

    if !supporting.is_empty() {
        let docs: Vec<String> = supporting
            .iter()
            .map(|d| match &d.description {
                Some(description) => format!("- {}: {}", d.title, description),
                None => format!("- {}", d.title),
            })
            .collect();
        sections.push(format!("## Supporting documents\n{}", docs.join("\n")));
    }

    if !data_room.is_empty() {
        let docs: Vec<String> = data_room
            .iter()
            .map(|d| {
                let mut line = format!("- {}", d.title);
                if let Some(category) = &d.category {
                    line.push_str(&format!(" [{}]", category));
                }
                if let Some(summary) = &d.ai_summary {
                    line.push_str(&format!(": {}", summary));
                }
                line
            })
            .collect();
        sections.push(format!("## Data room\n{}", docs.join("\n")));
    }

    sections.join("\n\n")
}
