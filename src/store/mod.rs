//! Repository abstractions over the document store.
//!
//! The core never talks to a concrete database; it goes through these
//! traits. The in-memory implementations back single-process deployments
//! and double as test fixtures.
//!
//! Index guidance for real backends: transcripts by
//! `(session_id, timestamp ASC)`, sessions by `(deck_id, status)`.

use crate::error::{PitchroomError, Result};
use crate::model::{
    DataRoomDocument, Deck, MessageTurn, Session, SupportingDocument, Thesis, Transcript,
};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[async_trait]
pub trait SessionRepository: Send + Sync {
    async fn insert(&self, session: Session) -> Result<()>;
    async fn get(&self, id: &str) -> Result<Option<Session>>;
    /// Replace the stored document. The orchestrator serializes writers
    /// per session, so last-write-wins is safe here.
    async fn save(&self, session: Session) -> Result<()>;
}

#[async_trait]
pub trait TranscriptRepository: Send + Sync {
    async fn insert(&self, transcript: Transcript) -> Result<()>;
    /// All entries for a session, ordered by timestamp ascending.
    async fn list_by_session(&self, session_id: &str) -> Result<Vec<Transcript>>;
    async fn count_final(&self, session_id: &str) -> Result<usize>;
}

#[async_trait]
pub trait DeckRepository: Send + Sync {
    async fn get(&self, deck_id: &str) -> Result<Option<Deck>>;
    async fn supporting_documents(&self, deck_id: &str) -> Result<Vec<SupportingDocument>>;
    async fn data_room_documents(&self, deck_id: &str) -> Result<Vec<DataRoomDocument>>;
}

#[async_trait]
pub trait ThesisRepository: Send + Sync {
    async fn for_tenant(&self, tenant_id: &str) -> Result<Option<Thesis>>;
}

#[async_trait]
pub trait MessageRepository: Send + Sync {
    /// Prior Q&A turns for a deck, oldest first.
    async fn list_for_deck(&self, deck_id: &str) -> Result<Vec<MessageTurn>>;
}

/// The repository bundle handed to the orchestrator and HTTP layer.
#[derive(Clone)]
pub struct Repositories {
    pub sessions: Arc<dyn SessionRepository>,
    pub transcripts: Arc<dyn TranscriptRepository>,
    pub decks: Arc<dyn DeckRepository>,
    pub theses: Arc<dyn ThesisRepository>,
    pub messages: Arc<dyn MessageRepository>,
}

impl Repositories {
    pub fn in_memory() -> Self {
        Self {
            sessions: Arc::new(MemorySessionRepository::default()),
            transcripts: Arc::new(MemoryTranscriptRepository::default()),
            decks: Arc::new(MemoryDeckRepository::default()),
            theses: Arc::new(MemoryThesisRepository::default()),
            messages: Arc::new(MemoryMessageRepository::default()),
        }
    }
}

// ============================================================================
// In-memory implementations
// ============================================================================

#[derive(Default)]
pub struct MemorySessionRepository {
    sessions: RwLock<HashMap<String, Session>>,
}

#[async_trait]
impl SessionRepository for MemorySessionRepository {
    async fn insert(&self, session: Session) -> Result<()> {
        let mut sessions = self.sessions.write().await;
        if sessions.contains_key(&session.id) {
            return Err(PitchroomError::Storage {
                message: format!("session {} already exists", session.id),
            });
        }
        sessions.insert(session.id.clone(), session);
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<Session>> {
        Ok(self.sessions.read().await.get(id).cloned())
    }

    async fn save(&self, session: Session) -> Result<()> {
        self.sessions
            .write()
            .await
            .insert(session.id.clone(), session);
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryTranscriptRepository {
    transcripts: RwLock<Vec<Transcript>>,
}

#[async_trait]
impl TranscriptRepository for MemoryTranscriptRepository {
    async fn insert(&self, transcript: Transcript) -> Result<()> {
        self.transcripts.write().await.push(transcript);
        Ok(())
    }

    async fn list_by_session(&self, session_id: &str) -> Result<Vec<Transcript>> {
        let mut entries: Vec<Transcript> = self
            .transcripts
            .read()
            .await
            .iter()
            .filter(|t| t.session_id == session_id)
            .cloned()
            .collect();
        entries.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
        Ok(entries)
    }

    async fn count_final(&self, session_id: &str) -> Result<usize> {
        Ok(self
            .transcripts
            .read()
            .await
            .iter()
            .filter(|t| t.session_id == session_id && t.is_final)
            .count())
    }
}

#[derive(Default)]
pub struct MemoryDeckRepository {
    decks: RwLock<HashMap<String, Deck>>,
    supporting: RwLock<Vec<SupportingDocument>>,
    data_room: RwLock<Vec<DataRoomDocument>>,
}

impl MemoryDeckRepository {
    pub async fn put_deck(&self, deck: Deck) {
        self.decks.write().await.insert(deck.id.clone(), deck);
    }

    pub async fn put_supporting(&self, doc: SupportingDocument) {
        self.supporting.write().await.push(doc);
    }

    pub async fn put_data_room(&self, doc: DataRoomDocument) {
        self.data_room.write().await.push(doc);
    }
}

#[async_trait]
impl DeckRepository for MemoryDeckRepository {
    async fn get(&self, deck_id: &str) -> Result<Option<Deck>> {
        Ok(self.decks.read().await.get(deck_id).cloned())
    }

    async fn supporting_documents(&self, deck_id: &str) -> Result<Vec<SupportingDocument>> {
        Ok(self
            .supporting
            .read()
            .await
            .iter()
            .filter(|d| d.deck_id == deck_id)
            .cloned()
            .collect())
    }

    async fn data_room_documents(&self, deck_id: &str) -> Result<Vec<DataRoomDocument>> {
        Ok(self
            .data_room
            .read()
            .await
            .iter()
            .filter(|d| d.deck_id == deck_id)
            .cloned()
            .collect())
    }
}

#[derive(Default)]
pub struct MemoryThesisRepository {
    theses: RwLock<HashMap<String, Thesis>>,
}

impl MemoryThesisRepository {
    pub async fn put(&self, thesis: Thesis) {
        self.theses
            .write()
            .await
            .insert(thesis.tenant_id.clone(), thesis);
    }
}

#[async_trait]
impl ThesisRepository for MemoryThesisRepository {
    async fn for_tenant(&self, tenant_id: &str) -> Result<Option<Thesis>> {
        Ok(self.theses.read().await.get(tenant_id).cloned())
    }
}

#[derive(Default)]
pub struct MemoryMessageRepository {
    messages: RwLock<Vec<MessageTurn>>,
}

impl MemoryMessageRepository {
    pub async fn put(&self, turn: MessageTurn) {
        self.messages.write().await.push(turn);
    }
}

#[async_trait]
impl MessageRepository for MemoryMessageRepository {
    async fn list_for_deck(&self, deck_id: &str) -> Result<Vec<MessageTurn>> {
        let mut turns: Vec<MessageTurn> = self
            .messages
            .read()
            .await
            .iter()
            .filter(|m| m.deck_id == deck_id)
            .cloned()
            .collect();
        turns.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(turns)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn transcript(session_id: &str, offset_secs: i64, is_final: bool) -> Transcript {
        Transcript {
            session_id: session_id.to_string(),
            deck_id: "deck-1".to_string(),
            timestamp: Utc::now() + Duration::seconds(offset_secs),
            text: format!("utterance at +{}s", offset_secs),
            speaker: None,
            speaker_id: None,
            is_final,
            confidence: None,
            language_code: None,
        }
    }

    #[tokio::test]
    async fn test_session_insert_rejects_duplicates() {
        let repo = MemorySessionRepository::default();
        let session = Session::new("deck-1", "tenant-1", "owner-1", "Pitch");
        let id = session.id.clone();

        repo.insert(session.clone()).await.unwrap();
        assert!(repo.insert(session).await.is_err());
        assert!(repo.get(&id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_transcripts_ordered_by_timestamp() {
        let repo = MemoryTranscriptRepository::default();
        repo.insert(transcript("s1", 30, true)).await.unwrap();
        repo.insert(transcript("s1", 10, true)).await.unwrap();
        repo.insert(transcript("s1", 20, false)).await.unwrap();
        repo.insert(transcript("s2", 0, true)).await.unwrap();

        let entries = repo.list_by_session("s1").await.unwrap();
        assert_eq!(entries.len(), 3);
        assert!(entries.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));

        assert_eq!(repo.count_final("s1").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_deck_documents_filtered_by_deck() {
        let repo = MemoryDeckRepository::default();
        repo.put_supporting(SupportingDocument {
            id: "d1".to_string(),
            deck_id: "deck-1".to_string(),
            title: "Financials".to_string(),
            description: None,
        })
        .await;
        repo.put_supporting(SupportingDocument {
            id: "d2".to_string(),
            deck_id: "deck-2".to_string(),
            title: "Other".to_string(),
            description: None,
        })
        .await;

        let docs = repo.supporting_documents("deck-1").await.unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].title, "Financials");
    }
}
