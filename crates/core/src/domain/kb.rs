use serde::{Deserialize, Serialize};

/// A knowledge-base document. Built once at startup; immutable afterward.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct KbEntry {
    pub id: String,
    pub title: String,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

/// Citation form of an entry, safe to return to clients (no embedding).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KbCitation {
    pub id: String,
    pub title: String,
    pub content: String,
}

impl From<&KbEntry> for KbCitation {
    fn from(entry: &KbEntry) -> Self {
        Self { id: entry.id.clone(), title: entry.title.clone(), content: entry.content.clone() }
    }
}

/// Cosine similarity, defined as 0 for absent, empty, or mismatched-length
/// vectors and for zero-magnitude inputs.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.is_empty() || b.is_empty() || a.len() != b.len() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denominator = norm_a.sqrt() * norm_b.sqrt();
    if denominator == 0.0 {
        return 0.0;
    }

    dot / denominator
}

/// Keyword relevance: a title match counts double a content match, both
/// case-insensitive substring checks.
pub fn keyword_score(entry: &KbEntry, query: &str) -> u32 {
    let query = query.to_lowercase();
    let mut score = 0;
    if entry.title.to_lowercase().contains(&query) {
        score += 2;
    }
    if entry.content.to_lowercase().contains(&query) {
        score += 1;
    }
    score
}

/// The built-in policy documents grounding every response.
pub fn builtin_knowledge_base() -> Vec<KbEntry> {
    let documents = [
        (
            "shipping-policy",
            "Shipping Policy",
            "We offer free standard shipping on orders over $50. Standard shipping takes \
             3-5 business days. Express shipping (1-2 business days) costs $9.99. We ship \
             Monday-Friday, excluding holidays.",
        ),
        (
            "return-policy",
            "Return Policy",
            "Items can be returned within 30 days of delivery for a full refund. Items must \
             be unused and in original packaging. Return shipping is free for defective \
             items, $5.99 for other returns.",
        ),
        (
            "refund-policy",
            "Refund Policy",
            "Refunds are processed within 3-5 business days after we receive your return. \
             Refunds go back to the original payment method. Shipping charges are \
             non-refundable unless the item was defective.",
        ),
        (
            "order-cancellation",
            "Order Cancellation",
            "Orders can be cancelled for free if they haven't shipped yet. Once an order \
             has shipped, it cannot be cancelled but can be returned after delivery \
             following our return policy.",
        ),
        (
            "tracking-info",
            "Order Tracking",
            "You'll receive a tracking number via email once your order ships. You can \
             track your package on our website or the carrier's website. Delivery \
             confirmation is available upon request.",
        ),
        (
            "size-exchanges",
            "Size Exchanges",
            "Free size exchanges are available within 30 days. The original item must be \
             returned in new condition. We'll send the new size once we receive the return.",
        ),
    ];

    documents
        .into_iter()
        .map(|(id, title, content)| KbEntry {
            id: id.to_string(),
            title: title.to_string(),
            content: content.to_string(),
            embedding: None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{builtin_knowledge_base, cosine_similarity, keyword_score, KbEntry};

    #[test]
    fn cosine_similarity_of_a_vector_with_itself_is_one() {
        let v = vec![0.3f32, -1.2, 4.5, 0.01];
        let similarity = cosine_similarity(&v, &v);
        assert!((similarity - 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_similarity_degenerate_inputs_are_zero() {
        assert_eq!(cosine_similarity(&[], &[1.0, 2.0]), 0.0);
        assert_eq!(cosine_similarity(&[1.0, 2.0], &[]), 0.0);
        assert_eq!(cosine_similarity(&[1.0, 2.0], &[1.0, 2.0, 3.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[0.0, 0.0]), 0.0);
    }

    #[test]
    fn title_match_outscores_content_match() {
        let title_hit = KbEntry {
            id: "shipping-policy".to_string(),
            title: "Shipping Policy".to_string(),
            content: "Standard delivery times.".to_string(),
            embedding: None,
        };
        let content_hit = KbEntry {
            id: "return-policy".to_string(),
            title: "Return Policy".to_string(),
            content: "Return shipping is free for defective items.".to_string(),
            embedding: None,
        };

        // Title contains the query: 2 (title) + 1 (content also mentions it in
        // the real documents) always beats a content-only 1.
        assert!(keyword_score(&title_hit, "shipping") > keyword_score(&content_hit, "shipping"));
        assert_eq!(keyword_score(&content_hit, "shipping"), 1);
    }

    #[test]
    fn matching_is_case_insensitive() {
        let entry = KbEntry {
            id: "refund-policy".to_string(),
            title: "Refund Policy".to_string(),
            content: "Refunds are processed within 3-5 business days.".to_string(),
            embedding: None,
        };
        assert_eq!(keyword_score(&entry, "REFUND"), 3);
        assert_eq!(keyword_score(&entry, "warranty"), 0);
    }

    #[test]
    fn builtin_knowledge_base_has_the_six_policy_documents() {
        let kb = builtin_knowledge_base();
        assert_eq!(kb.len(), 6);
        assert!(kb.iter().all(|entry| entry.embedding.is_none()));
        assert!(kb.iter().any(|entry| entry.id == "shipping-policy"));
        assert!(kb.iter().any(|entry| entry.id == "size-exchanges"));
    }
}
