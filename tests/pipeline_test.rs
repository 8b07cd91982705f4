use async_trait::async_trait;
use chrono::Utc;
use policy_monitor::aggregator::SourceAggregator;
use policy_monitor::extractor::PolicyExtractor;
use policy_monitor::llm::MockLanguageModel;
use policy_monitor::processor::{has_significant_changes, search_for_updates, PolicyProcessor};
use policy_monitor::sources::FetchDocuments;
use policy_monitor::store::{MemoryPolicyStore, PolicyStore};
use policy_monitor::types::{
    PolicyError, PolicyRecord, PolicyStatus, RawDocument, Result, RiskLevel, SourceType,
};
use std::sync::Arc;
use std::time::Duration;

struct StaticConnector {
    documents: Vec<RawDocument>,
}

#[async_trait]
impl FetchDocuments for StaticConnector {
    fn source_name(&self) -> String {
        "static".to_string()
    }

    async fn fetch(&self, _days_back: i64) -> Result<Vec<RawDocument>> {
        Ok(self.documents.clone())
    }
}

struct FailingConnector;

#[async_trait]
impl FetchDocuments for FailingConnector {
    fn source_name(&self) -> String {
        "failing".to_string()
    }

    async fn fetch(&self, _days_back: i64) -> Result<Vec<RawDocument>> {
        Err(PolicyError::General("connection refused".to_string()))
    }
}

fn doc(title: &str, content: &str, url: &str) -> RawDocument {
    RawDocument {
        title: title.to_string(),
        description: String::new(),
        content: content.to_string(),
        url: url.to_string(),
        published_at: Utc::now(),
        source_name: "Test Source".to_string(),
        source_type: SourceType::AgencyRss,
        document_type: None,
        agency: None,
    }
}

fn record(name: &str, link: &str) -> PolicyRecord {
    PolicyRecord {
        policy_name: name.to_string(),
        jurisdiction: None,
        issuing_body: None,
        date_introduced: None,
        date_enacted: None,
        status: None,
        policy_type: None,
        scope_coverage: None,
        key_provisions: None,
        risk_classification: RiskLevel::Medium,
        company_obligations: None,
        penalties_fines: None,
        affected_stakeholders: None,
        implementation_notes: None,
        latest_update: None,
        source_reference_link: link.to_string(),
        monitoring_org: None,
        notes_commentary: None,
        next_review_date: None,
        confidence_score: 80,
    }
}

fn processor_with(
    documents: Vec<RawDocument>,
    model: MockLanguageModel,
    store: Arc<MemoryPolicyStore>,
) -> PolicyProcessor {
    let mut aggregator = SourceAggregator::new();
    aggregator.add_connector(Box::new(StaticConnector { documents }));

    PolicyProcessor::new(aggregator, PolicyExtractor::new(Arc::new(model)), store)
        .with_delays(Duration::ZERO, Duration::ZERO)
}

fn policy_json(name: &str, confidence: i32) -> String {
    format!(
        r#"{{"policy_name": "{name}", "risk_classification": "Medium", "confidence_score": {confidence}}}"#
    )
}

#[tokio::test]
async fn aggregator_tolerates_a_failed_source() {
    let mut aggregator = SourceAggregator::new();
    aggregator.add_connector(Box::new(FailingConnector));
    aggregator.add_connector(Box::new(StaticConnector {
        documents: vec![doc("Notice", "body", "https://example.gov/notice")],
    }));

    let documents = aggregator.fetch_all(7).await;
    assert_eq!(documents.len(), 1);
    assert_eq!(documents[0].title, "Notice");
}

#[tokio::test]
async fn run_counts_failed_rejected_and_added_documents() {
    // Three documents: one the model garbles, one below the confidence
    // gate, one valid and new.
    let documents = vec![
        doc("Garbled", "garbled-doc", "https://example.gov/1"),
        doc("Weak", "weak-doc", "https://example.gov/2"),
        doc("Strong", "strong-doc", "https://example.gov/3"),
    ];
    let model = MockLanguageModel::new()
        .with_response("garbled-doc", "not json at all")
        .with_response("weak-doc", &policy_json("Weak Policy", 35))
        .with_response("strong-doc", &policy_json("Strong Policy", 85));
    let store = Arc::new(MemoryPolicyStore::new());

    let processor = processor_with(documents, model, store.clone());
    let result = processor.process_latest(7).await.unwrap();

    assert_eq!(result.processed, 3);
    assert_eq!(result.added, 1);
    assert_eq!(result.duplicates, 0);
    assert_eq!(result.errors, 0);

    let rows = store.all().await;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].record.policy_name, "Strong Policy");
}

#[tokio::test]
async fn duplicate_policy_name_is_not_reinserted() {
    let store = Arc::new(MemoryPolicyStore::new());
    store
        .seed(record("Existing Policy", "https://example.gov/original"))
        .await;

    let documents = vec![doc("Repeat", "repeat-doc", "https://example.gov/new-link")];
    let model = MockLanguageModel::new()
        .with_response("repeat-doc", &policy_json("Existing Policy", 90));

    let processor = processor_with(documents, model, store.clone());
    let result = processor.process_latest(7).await.unwrap();

    assert_eq!(result.processed, 1);
    assert_eq!(result.added, 0);
    assert_eq!(result.duplicates, 1);
    assert_eq!(result.errors, 0);
    assert_eq!(store.all().await.len(), 1);
}

#[tokio::test]
async fn duplicate_source_link_is_detected_despite_new_name() {
    let store = Arc::new(MemoryPolicyStore::new());
    store
        .seed(record("Old Name", "https://example.gov/shared-link"))
        .await;

    let documents = vec![doc("Renamed", "renamed-doc", "https://example.gov/shared-link")];
    let model = MockLanguageModel::new()
        .with_response("renamed-doc", &policy_json("Completely New Name", 90));

    let processor = processor_with(documents, model, store.clone());
    let result = processor.process_latest(7).await.unwrap();

    assert_eq!(result.duplicates, 1);
    assert_eq!(result.added, 0);
}

#[tokio::test]
async fn insert_failure_counts_as_error_and_batch_continues() {
    let documents = vec![
        doc("First", "first-doc", "https://example.gov/first"),
        doc("Second", "second-doc", "https://example.gov/second"),
    ];
    let model = MockLanguageModel::new()
        .with_response("first-doc", &policy_json("Policy One", 80))
        .with_response("second-doc", &policy_json("Policy Two", 80));
    let store = Arc::new(MemoryPolicyStore::new());
    store.fail_insert_for("Policy One").await;

    let processor = processor_with(documents, model, store.clone());
    let result = processor.process_latest(7).await.unwrap();

    assert_eq!(result.processed, 2);
    assert_eq!(result.added, 1);
    assert_eq!(result.duplicates, 0);
    assert_eq!(result.errors, 1);

    let rows = store.all().await;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].record.policy_name, "Policy Two");
}

#[tokio::test]
async fn duplicate_check_failure_fails_open() {
    let documents = vec![doc("Checked", "checked-doc", "https://example.gov/checked")];
    let model = MockLanguageModel::new()
        .with_response("checked-doc", &policy_json("Checked Policy", 80));
    let store = Arc::new(MemoryPolicyStore::new());
    store.fail_duplicate_checks().await;

    let processor = processor_with(documents, model, store.clone());
    let result = processor.process_latest(7).await.unwrap();

    // Lookup failure is treated as "not a duplicate"; ingestion proceeds.
    assert_eq!(result.added, 1);
    assert_eq!(result.errors, 0);
}

#[tokio::test]
async fn rescan_applies_significant_status_change() {
    let store = Arc::new(MemoryPolicyStore::new());
    let mut existing = record("AI Accountability Act", "https://example.gov/act");
    existing.status = Some(PolicyStatus::Proposed);
    let id = store.seed(existing).await;

    let documents = vec![doc(
        "AI Accountability Act signed into law",
        "The AI Accountability Act was enacted today. rescan-doc",
        "https://example.gov/act-enacted",
    )];
    let model = MockLanguageModel::new().with_response(
        "rescan-doc",
        r#"{"policy_name": "AI Accountability Act", "risk_classification": "Medium",
            "status": "Enacted", "confidence_score": 90}"#,
    );

    let processor = processor_with(documents, model, store.clone());
    processor.update_existing().await;

    let rows = store.all().await;
    let updated = rows.iter().find(|p| p.id == id).unwrap();
    assert_eq!(updated.record.status, Some(PolicyStatus::Enacted));
    assert!(updated.record.latest_update.is_some());
}

#[tokio::test]
async fn rescan_skips_insignificant_changes() {
    let store = Arc::new(MemoryPolicyStore::new());
    let mut existing = record("Stable AI Framework", "https://example.gov/stable");
    existing.status = Some(PolicyStatus::Enacted);
    existing.key_provisions = Some("annual audits".to_string());
    let id = store.seed(existing).await;
    let before = store.all().await[0].updated_at;

    let documents = vec![doc(
        "Stable AI Framework reminder",
        "The Stable AI Framework remains in force. stable-doc",
        "https://example.gov/stable-news",
    )];
    // Same status and provisions as stored, nothing else material.
    let model = MockLanguageModel::new().with_response(
        "stable-doc",
        r#"{"policy_name": "Stable AI Framework", "risk_classification": "Medium",
            "status": "Enacted", "key_provisions": "annual audits", "confidence_score": 90}"#,
    );

    let processor = processor_with(documents, model, store.clone());
    processor.update_existing().await;

    let rows = store.all().await;
    let stored = rows.iter().find(|p| p.id == id).unwrap();
    assert_eq!(stored.updated_at, before);
    assert_eq!(stored.record.latest_update, None);
}

#[test]
fn significance_requires_a_non_null_differing_value() {
    let existing = {
        let mut r = record("Policy", "https://example.gov/p");
        r.status = Some(PolicyStatus::Proposed);
        r.key_provisions = Some("old provisions".to_string());
        r
    };

    // Identical values: not significant.
    assert!(!has_significant_changes(&existing, &existing.clone()));

    // Extracted value missing: not significant even though it differs.
    let mut nulled = existing.clone();
    nulled.status = None;
    nulled.key_provisions = None;
    assert!(!has_significant_changes(&existing, &nulled));

    // Each watched field flips significance on its own.
    let mut status_change = existing.clone();
    status_change.status = Some(PolicyStatus::Enacted);
    assert!(has_significant_changes(&existing, &status_change));

    let mut date_change = existing.clone();
    date_change.date_enacted = chrono::NaiveDate::from_ymd_opt(2025, 1, 1);
    assert!(has_significant_changes(&existing, &date_change));

    let mut provisions_change = existing.clone();
    provisions_change.key_provisions = Some("new provisions".to_string());
    assert!(has_significant_changes(&existing, &provisions_change));

    let mut penalties_change = existing.clone();
    penalties_change.penalties_fines = Some("new fines".to_string());
    assert!(has_significant_changes(&existing, &penalties_change));
}

#[test]
fn update_search_matches_name_case_insensitively_and_caps_results() {
    let documents = vec![
        doc("THE AI ACT advances", "body", "https://example.gov/1"),
        doc("Unrelated notice", "mentions the ai act in passing", "https://example.gov/2"),
        doc("Other news", "nothing relevant", "https://example.gov/3"),
        doc("ai act hearing", "body", "https://example.gov/4"),
        doc("AI Act vote", "body", "https://example.gov/5"),
        doc("AI Act signed", "body", "https://example.gov/6"),
    ];

    let matches = search_for_updates("AI Act", documents);
    assert_eq!(matches.len(), 3);
    for m in &matches {
        let haystack = format!("{} {}", m.title, m.content).to_lowercase();
        assert!(haystack.contains("ai act"));
    }
}
