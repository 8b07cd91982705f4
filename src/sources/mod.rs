pub mod federal_register;
pub mod feeds;

use crate::types::{RawDocument, Result, SourceType};
use async_trait::async_trait;
use chrono::Utc;
use tracing::debug;

pub use federal_register::FederalRegisterConnector;
pub use feeds::FeedConnector;

/// Vocabulary used to keep feed entries that are plausibly AI-related.
/// Matching is a case-insensitive substring check.
pub const AI_TERMS: [&str; 15] = [
    "artificial intelligence",
    "AI",
    "machine learning",
    "ML",
    "algorithmic",
    "algorithm",
    "neural network",
    "deep learning",
    "automated decision",
    "AI system",
    "AI model",
    "generative AI",
    "large language model",
    "LLM",
    "foundation model",
];

/// Maximum entries taken from a single feed per fetch.
pub const MAX_ENTRIES_PER_FEED: usize = 10;

/// Trait for fetching raw documents from one external source family.
///
/// Implementations absorb their own transient failures (network, HTTP,
/// parse) by logging and yielding fewer documents; callers must treat an
/// `Err` the same way and never let one source abort the others.
#[async_trait]
pub trait FetchDocuments: Send + Sync {
    /// Human-readable name for this source family.
    fn source_name(&self) -> String;

    /// Fetch documents published within the last `days_back` days.
    async fn fetch(&self, days_back: i64) -> Result<Vec<RawDocument>>;
}

/// Check whether a piece of text mentions any AI-relevant term.
pub fn contains_ai_terms(text: &str) -> bool {
    let lower = text.to_lowercase();
    AI_TERMS.iter().any(|term| lower.contains(&term.to_lowercase()))
}

/// Keep only documents whose title or description mentions an AI term.
pub fn filter_ai_relevant(documents: Vec<RawDocument>) -> Vec<RawDocument> {
    documents
        .into_iter()
        .filter(|doc| contains_ai_terms(&doc.title) || contains_ai_terms(&doc.description))
        .collect()
}

/// Parse RSS/Atom feed content and map the entries into raw documents.
///
/// `feed-rs` normalizes `<item>` and `<entry>` shapes (and link-as-text vs
/// link-as-attribute) into one entry model before this mapping runs. Only
/// the first [`MAX_ENTRIES_PER_FEED`] entries are kept, and entries missing
/// a title or URL are dropped.
pub fn documents_from_feed(
    content: &str,
    source_name: &str,
    source_type: SourceType,
) -> Result<Vec<RawDocument>> {
    let feed = feed_rs::parser::parse(content.as_bytes())
        .map_err(|e| crate::types::PolicyError::Parse(format!("failed to parse feed: {}", e)))?;

    let mut documents = Vec::new();

    for entry in feed.entries.into_iter().take(MAX_ENTRIES_PER_FEED) {
        let title = entry
            .title
            .map(|t| t.content.trim().to_string())
            .unwrap_or_default();

        let url = entry
            .links
            .first()
            .map(|link| link.href.clone())
            .filter(|href| !href.is_empty())
            .unwrap_or_else(|| entry.id.clone());

        if title.is_empty() || url.is_empty() {
            debug!("Dropping feed entry without title or URL from {}", source_name);
            continue;
        }

        let description = entry
            .summary
            .map(|s| s.content)
            .unwrap_or_default();

        let content_text = entry
            .content
            .and_then(|c| c.body)
            .unwrap_or_else(|| description.clone());

        let published_at = entry
            .published
            .or(entry.updated)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(Utc::now);

        documents.push(RawDocument {
            title,
            description,
            content: content_text,
            url,
            published_at,
            source_name: source_name.to_string(),
            source_type,
            document_type: None,
            agency: None,
        });
    }

    Ok(documents)
}
