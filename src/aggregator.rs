use crate::sources::{FeedConnector, FederalRegisterConnector, FetchDocuments};
use crate::types::RawDocument;
use futures::future::join_all;
use reqwest::Client;
use tracing::{error, info};

/// Fans out to every registered connector concurrently and concatenates
/// the successful results. A failure in one source never suppresses the
/// others; record-level deduplication happens downstream.
pub struct SourceAggregator {
    connectors: Vec<Box<dyn FetchDocuments>>,
}

impl SourceAggregator {
    pub fn new() -> Self {
        Self {
            connectors: Vec::new(),
        }
    }

    /// Build an aggregator over the full set of government sources.
    pub fn with_default_sources(client: Client) -> Self {
        let mut aggregator = Self::new();
        aggregator.add_connector(Box::new(FederalRegisterConnector::new(client.clone())));
        aggregator.add_connector(Box::new(FeedConnector::white_house(client.clone())));
        aggregator.add_connector(Box::new(FeedConnector::congress(client.clone())));
        aggregator.add_connector(Box::new(FeedConnector::eu_commission(client.clone())));
        aggregator.add_connector(Box::new(FeedConnector::agencies(client)));
        aggregator
    }

    pub fn add_connector(&mut self, connector: Box<dyn FetchDocuments>) {
        info!("Adding source connector: {}", connector.source_name());
        self.connectors.push(connector);
    }

    /// Fetch from all connectors at once and collect whatever succeeded.
    pub async fn fetch_all(&self, days_back: i64) -> Vec<RawDocument> {
        let fetches = self
            .connectors
            .iter()
            .map(|connector| connector.fetch(days_back));
        let outcomes = join_all(fetches).await;

        let mut documents = Vec::new();
        for (connector, outcome) in self.connectors.iter().zip(outcomes) {
            match outcome {
                Ok(found) => {
                    info!("{}: {} documents", connector.source_name(), found.len());
                    documents.extend(found);
                }
                Err(e) => {
                    error!("Source {} failed: {}", connector.source_name(), e);
                }
            }
        }

        info!(
            "Total collected: {} documents from government sources",
            documents.len()
        );
        documents
    }
}

impl Default for SourceAggregator {
    fn default() -> Self {
        Self::new()
    }
}
