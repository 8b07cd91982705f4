use crate::aggregator::SourceAggregator;
use crate::extractor::PolicyExtractor;
use crate::normalizer::normalize_record;
use crate::store::PolicyStore;
use crate::types::{
    PolicyRecord, ProcessingResult, ProcessingStats, RawDocument, Result, StoredPolicy,
    DEFAULT_DAYS_BACK,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{error, info, warn};

/// Maximum documents re-extracted per record during a rescan.
const MAX_UPDATE_MATCHES: usize = 3;

enum DocumentOutcome {
    Added,
    Duplicate,
    Skipped,
}

/// Drives the full pipeline: aggregate sources, extract, normalize,
/// deduplicate, persist, and periodically re-check stored records.
pub struct PolicyProcessor {
    aggregator: SourceAggregator,
    extractor: PolicyExtractor,
    store: Arc<dyn PolicyStore>,
    ingest_delay: Duration,
    rescan_delay: Duration,
}

impl PolicyProcessor {
    pub fn new(
        aggregator: SourceAggregator,
        extractor: PolicyExtractor,
        store: Arc<dyn PolicyStore>,
    ) -> Self {
        Self {
            aggregator,
            extractor,
            store,
            // Fixed pauses between model calls to respect rate limits
            ingest_delay: Duration::from_secs(1),
            rescan_delay: Duration::from_secs(2),
        }
    }

    /// Override the fixed inter-call delays (tests run with zero).
    pub fn with_delays(mut self, ingest_delay: Duration, rescan_delay: Duration) -> Self {
        self.ingest_delay = ingest_delay;
        self.rescan_delay = rescan_delay;
        self
    }

    /// Ingest new documents published within the last `days_back` days.
    ///
    /// Per-document failures are absorbed into the returned counters; the
    /// batch always runs to completion once started.
    pub async fn process_latest(&self, days_back: i64) -> Result<ProcessingResult> {
        info!("Starting policy processing ({} days back)", days_back);

        let mut result = ProcessingResult::default();
        let documents = self.aggregator.fetch_all(days_back).await;
        info!("Found {} government documents to process", documents.len());

        for document in &documents {
            result.processed += 1;

            match self.process_document(document).await {
                Ok(DocumentOutcome::Added) => {
                    result.added += 1;
                    sleep(self.ingest_delay).await;
                }
                Ok(DocumentOutcome::Duplicate) => {
                    result.duplicates += 1;
                }
                Ok(DocumentOutcome::Skipped) => {}
                Err(e) => {
                    result.errors += 1;
                    error!("Error processing document \"{}\": {}", document.title, e);
                }
            }
        }

        info!(
            "Policy processing completed: processed={} added={} duplicates={} errors={}",
            result.processed, result.added, result.duplicates, result.errors
        );
        Ok(result)
    }

    async fn process_document(&self, document: &RawDocument) -> Result<DocumentOutcome> {
        let extracted = match self.extractor.extract(&document.content, &document.url).await {
            Some(record) => record,
            None => {
                info!("No policy extracted from: {}", document.title);
                return Ok(DocumentOutcome::Skipped);
            }
        };

        let record = normalize_record(extracted);

        if self.is_duplicate(&record).await {
            info!("Duplicate policy found: {}", record.policy_name);
            return Ok(DocumentOutcome::Duplicate);
        }

        self.store.insert(&record).await?;
        info!("Added new policy: {}", record.policy_name);
        Ok(DocumentOutcome::Added)
    }

    /// Natural-key duplicate check. A failed lookup is treated as "not a
    /// duplicate" so a store hiccup never blocks ingestion.
    async fn is_duplicate(&self, record: &PolicyRecord) -> bool {
        match self.store.find_duplicate(record).await {
            Ok(duplicate) => duplicate,
            Err(e) => {
                warn!(
                    "Duplicate check failed for \"{}\", treating as new: {}",
                    record.policy_name, e
                );
                false
            }
        }
    }

    /// Re-check stored records for material updates. Per-record failures
    /// are logged and never abort the scan.
    pub async fn update_existing(&self) {
        info!("Checking for policy updates...");

        let policies = match self.store.reviewable().await {
            Ok(policies) => policies,
            Err(e) => {
                error!("Error fetching existing policies: {}", e);
                return;
            }
        };

        for (i, existing) in policies.iter().enumerate() {
            if let Err(e) = self.rescan_policy(existing).await {
                error!(
                    "Error updating policy {}: {}",
                    existing.record.policy_name, e
                );
            }

            if i + 1 < policies.len() {
                sleep(self.rescan_delay).await;
            }
        }
    }

    async fn rescan_policy(&self, existing: &StoredPolicy) -> Result<()> {
        let documents = self.aggregator.fetch_all(DEFAULT_DAYS_BACK).await;
        let matches = search_for_updates(&existing.record.policy_name, documents);

        for document in matches {
            let text = format!(
                "{}\n\n{}\n\n{}",
                document.title, document.description, document.content
            );

            let Some(updated) = self.extractor.extract(&text, &document.url).await else {
                continue;
            };

            if has_significant_changes(&existing.record, &updated) {
                let normalized = normalize_record(updated);
                self.store.update(existing.id, &normalized).await?;
                info!("Updated policy: {}", existing.record.policy_name);
            }
        }

        Ok(())
    }

    pub async fn stats(&self) -> Result<ProcessingStats> {
        self.store.stats().await
    }
}

/// Pick documents that plausibly concern an existing policy: its name
/// appears in the title or content, case-insensitively. Common words
/// over-match and renamed policies under-match, but the match mirrors the
/// stored natural key. At most [`MAX_UPDATE_MATCHES`] documents are kept.
pub fn search_for_updates(policy_name: &str, documents: Vec<RawDocument>) -> Vec<RawDocument> {
    let needle = policy_name.to_lowercase();
    documents
        .into_iter()
        .filter(|doc| {
            doc.title.to_lowercase().contains(&needle)
                || doc.content.to_lowercase().contains(&needle)
        })
        .take(MAX_UPDATE_MATCHES)
        .collect()
}

/// A change is significant when any of status, date_enacted,
/// key_provisions, or penalties_fines differs from the stored value and
/// the extracted value is present.
pub fn has_significant_changes(existing: &PolicyRecord, updated: &PolicyRecord) -> bool {
    (updated.status.is_some() && updated.status != existing.status)
        || (updated.date_enacted.is_some() && updated.date_enacted != existing.date_enacted)
        || (updated.key_provisions.is_some() && updated.key_provisions != existing.key_provisions)
        || (updated.penalties_fines.is_some()
            && updated.penalties_fines != existing.penalties_fines)
}
