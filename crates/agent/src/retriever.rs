use std::sync::Arc;

use tracing::warn;

use supportdesk_core::domain::kb::{cosine_similarity, keyword_score, KbEntry};

use crate::llm::EmbeddingClient;

const MAX_MATCHES: usize = 3;

/// The indexed knowledge base. Entries are embedded once at startup; an entry
/// whose embedding fails stays in the index with no vector and scores 0 on
/// the similarity path.
pub struct KnowledgeIndex {
    entries: Vec<KbEntry>,
}

impl KnowledgeIndex {
    pub fn without_embeddings(entries: Vec<KbEntry>) -> Self {
        Self { entries }
    }

    pub async fn build(mut entries: Vec<KbEntry>, embedder: &dyn EmbeddingClient) -> Self {
        for entry in &mut entries {
            let input = format!("{}: {}", entry.title, entry.content);
            match embedder.embed(&input).await {
                Ok(embedding) => entry.embedding = Some(embedding),
                Err(error) => {
                    warn!(
                        event_name = "kb.embedding_failed",
                        entry_id = %entry.id,
                        error = %error,
                        "knowledge entry left unembedded"
                    );
                }
            }
        }

        Self { entries }
    }

    pub fn entries(&self) -> &[KbEntry] {
        &self.entries
    }

    pub fn has_embeddings(&self) -> bool {
        self.entries.iter().any(|entry| entry.embedding.is_some())
    }
}

pub struct KnowledgeRetriever {
    index: Arc<KnowledgeIndex>,
    embedder: Option<Arc<dyn EmbeddingClient>>,
}

impl KnowledgeRetriever {
    pub fn new(index: Arc<KnowledgeIndex>, embedder: Option<Arc<dyn EmbeddingClient>>) -> Self {
        Self { index, embedder }
    }

    /// Rank entries against the query, highest relevance first, at most
    /// three. Embedding failures degrade to keyword scoring for this call
    /// only and never reach the caller.
    pub async fn search(&self, query: &str) -> Vec<KbEntry> {
        if let (Some(embedder), true) = (&self.embedder, self.index.has_embeddings()) {
            match embedder.embed(query).await {
                Ok(query_embedding) => return self.search_by_similarity(&query_embedding),
                Err(error) => {
                    warn!(
                        event_name = "kb.search_degraded",
                        error = %error,
                        "embedding search failed, falling back to keyword search"
                    );
                }
            }
        }

        self.search_by_keyword(query)
    }

    fn search_by_similarity(&self, query_embedding: &[f32]) -> Vec<KbEntry> {
        let mut scored: Vec<(f32, &KbEntry)> = self
            .index
            .entries()
            .iter()
            .map(|entry| {
                let score = entry
                    .embedding
                    .as_deref()
                    .map(|embedding| cosine_similarity(query_embedding, embedding))
                    .unwrap_or(0.0);
                (score, entry)
            })
            .collect();

        // Stable sort keeps the original KB order for ties.
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        scored.into_iter().take(MAX_MATCHES).map(|(_, entry)| entry.clone()).collect()
    }

    fn search_by_keyword(&self, query: &str) -> Vec<KbEntry> {
        let mut scored: Vec<(u32, &KbEntry)> = self
            .index
            .entries()
            .iter()
            .map(|entry| (keyword_score(entry, query), entry))
            .filter(|(score, _)| *score > 0)
            .collect();

        scored.sort_by(|a, b| b.0.cmp(&a.0));
        scored.into_iter().take(MAX_MATCHES).map(|(_, entry)| entry.clone()).collect()
    }
}
