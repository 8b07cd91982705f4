use crate::sources::FetchDocuments;
use crate::types::{RawDocument, Result, SourceType};
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashSet;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};
use url::Url;

/// Search terms issued against the Federal Register article search, one
/// query each per fetch.
const SEARCH_TERMS: [&str; 5] = [
    "artificial intelligence",
    "machine learning",
    "algorithmic",
    "AI",
    "algorithm",
];

const DEFAULT_BASE_URL: &str = "https://www.federalregister.gov";
const PAGE_SIZE: u32 = 20;

/// Connector for the Federal Register structured search API.
pub struct FederalRegisterConnector {
    client: Client,
    base_url: String,
    term_delay: Duration,
}

impl FederalRegisterConnector {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            base_url: DEFAULT_BASE_URL.to_string(),
            // Fixed pause between term queries to respect the API's limits
            term_delay: Duration::from_secs(1),
        }
    }

    /// Point the connector at a different API host (used by tests).
    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url;
        self
    }

    pub fn with_term_delay(mut self, delay: Duration) -> Self {
        self.term_delay = delay;
        self
    }

    fn search_url(&self, term: &str, days_back: i64) -> Result<Url> {
        let since = (Utc::now() - chrono::Duration::days(days_back))
            .date_naive()
            .format("%Y-%m-%d")
            .to_string();

        let mut url = Url::parse(&format!("{}/api/v1/articles.json", self.base_url))?;
        url.query_pairs_mut()
            .append_pair("conditions[term]", term)
            .append_pair("conditions[publication_date][gte]", &since)
            .append_pair("per_page", &PAGE_SIZE.to_string())
            .append_pair("order", "newest");
        Ok(url)
    }

    async fn fetch_term(&self, term: &str, days_back: i64) -> Result<Vec<RawDocument>> {
        let url = self.search_url(term, days_back)?;
        let response = self.client.get(url).send().await?;

        if !response.status().is_success() {
            warn!(
                "Federal Register query for \"{}\" returned HTTP {}",
                term,
                response.status()
            );
            return Ok(Vec::new());
        }

        let payload: ArticlesResponse = response.json().await?;
        let documents = payload
            .results
            .into_iter()
            .filter_map(article_to_document)
            .collect();
        Ok(documents)
    }
}

#[async_trait]
impl FetchDocuments for FederalRegisterConnector {
    fn source_name(&self) -> String {
        "Federal Register".to_string()
    }

    async fn fetch(&self, days_back: i64) -> Result<Vec<RawDocument>> {
        let mut documents = Vec::new();

        for (i, term) in SEARCH_TERMS.iter().enumerate() {
            match self.fetch_term(term, days_back).await {
                Ok(mut found) => {
                    debug!(
                        "Federal Register term \"{}\" yielded {} articles",
                        term,
                        found.len()
                    );
                    documents.append(&mut found);
                }
                Err(e) => {
                    warn!("Federal Register query for \"{}\" failed: {}", term, e);
                }
            }

            if i + 1 < SEARCH_TERMS.len() {
                sleep(self.term_delay).await;
            }
        }

        let documents = dedup_by_title_and_url(documents);
        info!("Federal Register: {} documents", documents.len());
        Ok(documents)
    }
}

/// Drop repeat articles returned by overlapping search terms.
fn dedup_by_title_and_url(documents: Vec<RawDocument>) -> Vec<RawDocument> {
    let mut seen = HashSet::new();
    documents
        .into_iter()
        .filter(|doc| seen.insert((doc.title.clone(), doc.url.clone())))
        .collect()
}

fn article_to_document(article: Article) -> Option<RawDocument> {
    let title = article.title.unwrap_or_default();
    let url = article.html_url.unwrap_or_default();
    if title.is_empty() || url.is_empty() {
        return None;
    }

    let abstract_text = article.abstract_text.unwrap_or_default();
    let summary = article.summary.unwrap_or_default();
    let description = if !abstract_text.is_empty() {
        abstract_text.clone()
    } else {
        summary.clone()
    };

    let published_at = article
        .publication_date
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
        .unwrap_or_else(Utc::now);

    Some(RawDocument {
        title,
        description,
        content: format!("{}\n\n{}", abstract_text, summary),
        url,
        published_at,
        source_name: "Federal Register".to_string(),
        source_type: SourceType::FederalRegister,
        document_type: article.document_type,
        agency: article.agencies.into_iter().next().and_then(|a| a.name),
    })
}

#[derive(Debug, Deserialize)]
struct ArticlesResponse {
    #[serde(default)]
    results: Vec<Article>,
}

#[derive(Debug, Deserialize)]
struct Article {
    title: Option<String>,
    #[serde(rename = "abstract")]
    abstract_text: Option<String>,
    summary: Option<String>,
    html_url: Option<String>,
    publication_date: Option<NaiveDate>,
    #[serde(rename = "type")]
    document_type: Option<String>,
    #[serde(default)]
    agencies: Vec<Agency>,
}

#[derive(Debug, Deserialize)]
struct Agency {
    name: Option<String>,
}
