use crate::types::{
    PolicyError, PolicyRecord, PolicyStatus, ProcessingStats, Result, RiskLevel, StoredPolicy,
};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use std::collections::{HashMap, HashSet};
use tokio::sync::RwLock;
use tracing::info;
use uuid::Uuid;

/// Store contract the pipeline writes through. The natural key for
/// duplicate detection is `policy_name` OR `source_reference_link`;
/// either match counts.
#[async_trait]
pub trait PolicyStore: Send + Sync {
    /// True when a stored record matches the candidate's natural key.
    async fn find_duplicate(&self, record: &PolicyRecord) -> Result<bool>;

    async fn insert(&self, record: &PolicyRecord) -> Result<Uuid>;

    /// Replace a record's fields, stamping `latest_update` with the
    /// current date and `updated_at` with the current timestamp.
    async fn update(&self, id: Uuid, record: &PolicyRecord) -> Result<()>;

    /// Records worth re-scanning: created within the last 30 days, or
    /// carrying a review date that has not passed yet.
    async fn reviewable(&self) -> Result<Vec<StoredPolicy>>;

    async fn recent(&self, limit: i64) -> Result<Vec<StoredPolicy>>;

    async fn status_counts(&self) -> Result<HashMap<String, i64>>;

    async fn risk_counts(&self) -> Result<HashMap<String, i64>>;

    async fn stats(&self) -> Result<ProcessingStats>;
}

pub struct PgPolicyStore {
    db: PgPool,
}

impl PgPolicyStore {
    pub async fn connect(database_url: &str) -> Result<Self> {
        let db = PgPool::connect(database_url).await?;
        Ok(Self { db })
    }

    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.db)
            .await
            .map_err(|e| PolicyError::General(format!("migration failed: {}", e)))?;
        info!("Database migrations applied");
        Ok(())
    }
}

#[async_trait]
impl PolicyStore for PgPolicyStore {
    async fn find_duplicate(&self, record: &PolicyRecord) -> Result<bool> {
        let row = sqlx::query(
            "SELECT id FROM ai_policies WHERE policy_name = $1 OR source_reference_link = $2 LIMIT 1",
        )
        .bind(&record.policy_name)
        .bind(&record.source_reference_link)
        .fetch_optional(&self.db)
        .await?;

        Ok(row.is_some())
    }

    async fn insert(&self, record: &PolicyRecord) -> Result<Uuid> {
        let id = Uuid::new_v4();
        let now = Utc::now();

        sqlx::query(
            r#"
            INSERT INTO ai_policies (
                id, policy_name, jurisdiction, issuing_body, date_introduced, date_enacted,
                status, policy_type, scope_coverage, key_provisions, risk_classification,
                company_obligations, penalties_fines, affected_stakeholders, implementation_notes,
                latest_update, source_reference_link, monitoring_org, notes_commentary,
                next_review_date, confidence_score, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17,
                    $18, $19, $20, $21, $22, $23)
            "#,
        )
        .bind(id)
        .bind(&record.policy_name)
        .bind(&record.jurisdiction)
        .bind(&record.issuing_body)
        .bind(record.date_introduced)
        .bind(record.date_enacted)
        .bind(record.status.map(|s| s.as_str()))
        .bind(&record.policy_type)
        .bind(&record.scope_coverage)
        .bind(&record.key_provisions)
        .bind(record.risk_classification.as_str())
        .bind(&record.company_obligations)
        .bind(&record.penalties_fines)
        .bind(&record.affected_stakeholders)
        .bind(&record.implementation_notes)
        .bind(record.latest_update)
        .bind(&record.source_reference_link)
        .bind(&record.monitoring_org)
        .bind(&record.notes_commentary)
        .bind(record.next_review_date)
        .bind(record.confidence_score)
        .bind(now)
        .bind(now)
        .execute(&self.db)
        .await?;

        info!("Inserted policy {}: {}", id, record.policy_name);
        Ok(id)
    }

    async fn update(&self, id: Uuid, record: &PolicyRecord) -> Result<()> {
        let now = Utc::now();

        sqlx::query(
            r#"
            UPDATE ai_policies SET
                policy_name = $1, jurisdiction = $2, issuing_body = $3, date_introduced = $4,
                date_enacted = $5, status = $6, policy_type = $7, scope_coverage = $8,
                key_provisions = $9, risk_classification = $10, company_obligations = $11,
                penalties_fines = $12, affected_stakeholders = $13, implementation_notes = $14,
                source_reference_link = $15, monitoring_org = $16, notes_commentary = $17,
                next_review_date = $18, confidence_score = $19,
                latest_update = $20, updated_at = $21
            WHERE id = $22
            "#,
        )
        .bind(&record.policy_name)
        .bind(&record.jurisdiction)
        .bind(&record.issuing_body)
        .bind(record.date_introduced)
        .bind(record.date_enacted)
        .bind(record.status.map(|s| s.as_str()))
        .bind(&record.policy_type)
        .bind(&record.scope_coverage)
        .bind(&record.key_provisions)
        .bind(record.risk_classification.as_str())
        .bind(&record.company_obligations)
        .bind(&record.penalties_fines)
        .bind(&record.affected_stakeholders)
        .bind(&record.implementation_notes)
        .bind(&record.source_reference_link)
        .bind(&record.monitoring_org)
        .bind(&record.notes_commentary)
        .bind(record.next_review_date)
        .bind(record.confidence_score)
        .bind(now.date_naive())
        .bind(now)
        .bind(id)
        .execute(&self.db)
        .await?;

        info!("Updated policy {}: {}", id, record.policy_name);
        Ok(())
    }

    async fn reviewable(&self) -> Result<Vec<StoredPolicy>> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM ai_policies
            WHERE created_at >= now() - interval '30 days'
               OR next_review_date >= CURRENT_DATE
            ORDER BY created_at DESC
            "#,
        )
        .fetch_all(&self.db)
        .await?;

        rows.iter().map(row_to_policy).collect()
    }

    async fn recent(&self, limit: i64) -> Result<Vec<StoredPolicy>> {
        let rows = sqlx::query("SELECT * FROM ai_policies ORDER BY created_at DESC LIMIT $1")
            .bind(limit)
            .fetch_all(&self.db)
            .await?;

        rows.iter().map(row_to_policy).collect()
    }

    async fn status_counts(&self) -> Result<HashMap<String, i64>> {
        let rows = sqlx::query(
            "SELECT COALESCE(status, 'Unknown') AS status, COUNT(*) AS count \
             FROM ai_policies GROUP BY 1",
        )
        .fetch_all(&self.db)
        .await?;

        let mut counts = HashMap::new();
        for row in rows {
            counts.insert(row.try_get("status")?, row.try_get("count")?);
        }
        Ok(counts)
    }

    async fn risk_counts(&self) -> Result<HashMap<String, i64>> {
        let rows = sqlx::query(
            "SELECT risk_classification AS risk, COUNT(*) AS count \
             FROM ai_policies GROUP BY 1",
        )
        .fetch_all(&self.db)
        .await?;

        let mut counts = HashMap::new();
        for row in rows {
            counts.insert(row.try_get("risk")?, row.try_get("count")?);
        }
        Ok(counts)
    }

    async fn stats(&self) -> Result<ProcessingStats> {
        let row = sqlx::query(
            r#"
            SELECT
                COUNT(*) AS total,
                COUNT(*) FILTER (WHERE created_at >= date_trunc('day', now())) AS added_today,
                COUNT(*) FILTER (WHERE created_at >= now() - interval '7 days') AS added_this_week,
                MAX(updated_at) AS last_update
            FROM ai_policies
            "#,
        )
        .fetch_one(&self.db)
        .await?;

        Ok(ProcessingStats {
            total: row.try_get("total")?,
            added_today: row.try_get("added_today")?,
            added_this_week: row.try_get("added_this_week")?,
            last_update: row.try_get("last_update")?,
        })
    }
}

fn row_to_policy(row: &PgRow) -> Result<StoredPolicy> {
    let status: Option<String> = row.try_get("status")?;
    let risk: String = row.try_get("risk_classification")?;

    Ok(StoredPolicy {
        id: row.try_get("id")?,
        record: PolicyRecord {
            policy_name: row.try_get("policy_name")?,
            jurisdiction: row.try_get("jurisdiction")?,
            issuing_body: row.try_get("issuing_body")?,
            date_introduced: row.try_get("date_introduced")?,
            date_enacted: row.try_get("date_enacted")?,
            status: status.as_deref().and_then(PolicyStatus::parse),
            policy_type: row.try_get("policy_type")?,
            scope_coverage: row.try_get("scope_coverage")?,
            key_provisions: row.try_get("key_provisions")?,
            risk_classification: RiskLevel::parse(&risk).unwrap_or(RiskLevel::Medium),
            company_obligations: row.try_get("company_obligations")?,
            penalties_fines: row.try_get("penalties_fines")?,
            affected_stakeholders: row.try_get("affected_stakeholders")?,
            implementation_notes: row.try_get("implementation_notes")?,
            latest_update: row.try_get("latest_update")?,
            source_reference_link: row.try_get("source_reference_link")?,
            monitoring_org: row.try_get("monitoring_org")?,
            notes_commentary: row.try_get("notes_commentary")?,
            next_review_date: row.try_get("next_review_date")?,
            confidence_score: row.try_get("confidence_score")?,
        },
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

/// In-memory store for development and testing, with failure injection
/// hooks for exercising the pipeline's error accounting.
pub struct MemoryPolicyStore {
    rows: RwLock<Vec<StoredPolicy>>,
    fail_insert_names: RwLock<HashSet<String>>,
    fail_duplicate_checks: RwLock<bool>,
}

impl MemoryPolicyStore {
    pub fn new() -> Self {
        Self {
            rows: RwLock::new(Vec::new()),
            fail_insert_names: RwLock::new(HashSet::new()),
            fail_duplicate_checks: RwLock::new(false),
        }
    }

    /// Make `insert` fail for a specific policy name.
    pub async fn fail_insert_for(&self, policy_name: impl Into<String>) {
        self.fail_insert_names.write().await.insert(policy_name.into());
    }

    /// Make every duplicate lookup fail, to exercise the fail-open path.
    pub async fn fail_duplicate_checks(&self) {
        *self.fail_duplicate_checks.write().await = true;
    }

    pub async fn all(&self) -> Vec<StoredPolicy> {
        self.rows.read().await.clone()
    }

    /// Seed a record directly, bypassing the pipeline.
    pub async fn seed(&self, record: PolicyRecord) -> Uuid {
        let id = Uuid::new_v4();
        let now = Utc::now();
        self.rows.write().await.push(StoredPolicy {
            id,
            record,
            created_at: now,
            updated_at: now,
        });
        id
    }
}

impl Default for MemoryPolicyStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PolicyStore for MemoryPolicyStore {
    async fn find_duplicate(&self, record: &PolicyRecord) -> Result<bool> {
        if *self.fail_duplicate_checks.read().await {
            return Err(PolicyError::General("injected duplicate check failure".to_string()));
        }

        let rows = self.rows.read().await;
        Ok(rows.iter().any(|stored| {
            stored.record.policy_name == record.policy_name
                || stored.record.source_reference_link == record.source_reference_link
        }))
    }

    async fn insert(&self, record: &PolicyRecord) -> Result<Uuid> {
        if self.fail_insert_names.read().await.contains(&record.policy_name) {
            return Err(PolicyError::General("injected insert failure".to_string()));
        }

        let id = Uuid::new_v4();
        let now = Utc::now();
        self.rows.write().await.push(StoredPolicy {
            id,
            record: record.clone(),
            created_at: now,
            updated_at: now,
        });
        Ok(id)
    }

    async fn update(&self, id: Uuid, record: &PolicyRecord) -> Result<()> {
        let now = Utc::now();
        let mut rows = self.rows.write().await;
        let stored = rows
            .iter_mut()
            .find(|stored| stored.id == id)
            .ok_or_else(|| PolicyError::General(format!("policy not found: {}", id)))?;

        stored.record = record.clone();
        stored.record.latest_update = Some(now.date_naive());
        stored.updated_at = now;
        Ok(())
    }

    async fn reviewable(&self) -> Result<Vec<StoredPolicy>> {
        let now = Utc::now();
        let today = now.date_naive();
        let cutoff = now - Duration::days(30);

        let rows = self.rows.read().await;
        Ok(rows
            .iter()
            .filter(|stored| {
                stored.created_at >= cutoff
                    || stored
                        .record
                        .next_review_date
                        .map(|d| d >= today)
                        .unwrap_or(false)
            })
            .cloned()
            .collect())
    }

    async fn recent(&self, limit: i64) -> Result<Vec<StoredPolicy>> {
        let mut rows = self.rows.read().await.clone();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        rows.truncate(limit as usize);
        Ok(rows)
    }

    async fn status_counts(&self) -> Result<HashMap<String, i64>> {
        let rows = self.rows.read().await;
        let mut counts = HashMap::new();
        for stored in rows.iter() {
            let key = stored
                .record
                .status
                .map(|s| s.as_str().to_string())
                .unwrap_or_else(|| "Unknown".to_string());
            *counts.entry(key).or_insert(0) += 1;
        }
        Ok(counts)
    }

    async fn risk_counts(&self) -> Result<HashMap<String, i64>> {
        let rows = self.rows.read().await;
        let mut counts = HashMap::new();
        for stored in rows.iter() {
            let key = stored.record.risk_classification.as_str().to_string();
            *counts.entry(key).or_insert(0) += 1;
        }
        Ok(counts)
    }

    async fn stats(&self) -> Result<ProcessingStats> {
        let now = Utc::now();
        let today = now.date_naive();
        let week_cutoff = now - Duration::days(7);

        let rows = self.rows.read().await;
        Ok(ProcessingStats {
            total: rows.len() as i64,
            added_today: rows
                .iter()
                .filter(|s| s.created_at.date_naive() == today)
                .count() as i64,
            added_this_week: rows.iter().filter(|s| s.created_at >= week_cutoff).count() as i64,
            last_update: rows.iter().map(|s| s.updated_at).max(),
        })
    }
}
