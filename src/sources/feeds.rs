use crate::sources::{documents_from_feed, filter_ai_relevant, FetchDocuments};
use crate::types::{RawDocument, Result, SourceType};
use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, info, warn};

/// RSS/Atom connector over a fixed list of feeds belonging to one source
/// family (White House, Congress, EU Commission, federal agencies).
pub struct FeedConnector {
    name: String,
    source_type: SourceType,
    /// (feed URL, source name attached to its documents)
    feeds: Vec<(String, String)>,
    client: Client,
}

impl FeedConnector {
    pub fn new(
        name: impl Into<String>,
        source_type: SourceType,
        feeds: Vec<(String, String)>,
        client: Client,
    ) -> Self {
        Self {
            name: name.into(),
            source_type,
            feeds,
            client,
        }
    }

    pub fn white_house(client: Client) -> Self {
        let feeds = [
            "https://www.whitehouse.gov/briefing-room/statements-releases/feed/",
            "https://www.whitehouse.gov/briefing-room/presidential-actions/feed/",
            "https://www.whitehouse.gov/briefing-room/press-briefings/feed/",
        ]
        .iter()
        .map(|url| (url.to_string(), "White House".to_string()))
        .collect();

        Self::new("White House", SourceType::WhiteHouse, feeds, client)
    }

    pub fn congress(client: Client) -> Self {
        let feeds = [
            "https://science.house.gov/rss.xml",
            "https://www.commerce.senate.gov/public/index.cfm/rss/feed",
        ]
        .iter()
        .map(|url| (url.to_string(), "Congress".to_string()))
        .collect();

        Self::new("Congress", SourceType::Congress, feeds, client)
    }

    pub fn eu_commission(client: Client) -> Self {
        let feeds = [
            "https://ec.europa.eu/newsroom/dae/rss.cfm?ServiceID=1090",
            "https://digital-strategy.ec.europa.eu/en/rss.xml",
        ]
        .iter()
        .map(|url| (url.to_string(), "European Commission".to_string()))
        .collect();

        Self::new("EU Commission", SourceType::EuCommission, feeds, client)
    }

    pub fn agencies(client: Client) -> Self {
        let feeds = vec![
            (
                "https://www.nist.gov/news-events/news/rss.xml".to_string(),
                "NIST".to_string(),
            ),
            (
                "https://www.ftc.gov/news-events/press-releases/rss.xml".to_string(),
                "FTC".to_string(),
            ),
            (
                "https://www.cisa.gov/news/rss.xml".to_string(),
                "CISA".to_string(),
            ),
        ];

        Self::new("Agency RSS", SourceType::AgencyRss, feeds, client)
    }

    async fn fetch_feed(&self, url: &str, source_name: &str) -> Result<Vec<RawDocument>> {
        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            warn!("Feed {} returned HTTP {}", url, response.status());
            return Ok(Vec::new());
        }

        let body = response.text().await?;
        let documents = documents_from_feed(&body, source_name, self.source_type)?;
        Ok(filter_ai_relevant(documents))
    }
}

#[async_trait]
impl FetchDocuments for FeedConnector {
    fn source_name(&self) -> String {
        self.name.clone()
    }

    async fn fetch(&self, _days_back: i64) -> Result<Vec<RawDocument>> {
        let mut documents = Vec::new();

        for (url, source_name) in &self.feeds {
            match self.fetch_feed(url, source_name).await {
                Ok(mut found) => {
                    debug!("Feed {} yielded {} AI-relevant entries", url, found.len());
                    documents.append(&mut found);
                }
                Err(e) => {
                    warn!("Error fetching {} feed {}: {}", self.name, url, e);
                }
            }
        }

        info!("{}: {} documents", self.name, documents.len());
        Ok(documents)
    }
}
