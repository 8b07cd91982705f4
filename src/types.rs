use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Default ingestion window in days.
pub const DEFAULT_DAYS_BACK: i64 = 7;

/// Minimum confidence score an extracted policy needs to be kept.
pub const CONFIDENCE_THRESHOLD: i32 = 40;

/// Which family of government sources a document came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    FederalRegister,
    WhiteHouse,
    Congress,
    EuCommission,
    AgencyRss,
}

impl std::fmt::Display for SourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SourceType::FederalRegister => "federal_register",
            SourceType::WhiteHouse => "white_house",
            SourceType::Congress => "congress",
            SourceType::EuCommission => "eu_commission",
            SourceType::AgencyRss => "agency_rss",
        };
        write!(f, "{}", name)
    }
}

/// A publication fetched from a government source, before extraction.
///
/// Connectors drop anything without a title or URL, so both are always
/// non-empty past the connector boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawDocument {
    pub title: String,
    pub description: String,
    pub content: String,
    pub url: String,
    pub published_at: DateTime<Utc>,
    pub source_name: String,
    pub source_type: SourceType,
    pub document_type: Option<String>,
    pub agency: Option<String>,
}

/// Lifecycle status of a policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PolicyStatus {
    Proposed,
    #[serde(rename = "Under Review")]
    UnderReview,
    Enacted,
    Amended,
    Repealed,
    Expired,
}

impl PolicyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PolicyStatus::Proposed => "Proposed",
            PolicyStatus::UnderReview => "Under Review",
            PolicyStatus::Enacted => "Enacted",
            PolicyStatus::Amended => "Amended",
            PolicyStatus::Repealed => "Repealed",
            PolicyStatus::Expired => "Expired",
        }
    }

    /// Parse a status string from the model or the store. Unknown values
    /// map to `None` rather than an error.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "Proposed" => Some(PolicyStatus::Proposed),
            "Under Review" => Some(PolicyStatus::UnderReview),
            "Enacted" => Some(PolicyStatus::Enacted),
            "Amended" => Some(PolicyStatus::Amended),
            "Repealed" => Some(PolicyStatus::Repealed),
            "Expired" => Some(PolicyStatus::Expired),
            _ => None,
        }
    }
}

impl std::fmt::Display for PolicyStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Business/societal impact classification. Always populated on a stored
/// policy; the extractor applies a fallback rule when the model omits it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "Low",
            RiskLevel::Medium => "Medium",
            RiskLevel::High => "High",
            RiskLevel::Critical => "Critical",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "Low" => Some(RiskLevel::Low),
            "Medium" => Some(RiskLevel::Medium),
            "High" => Some(RiskLevel::High),
            "Critical" => Some(RiskLevel::Critical),
            _ => None,
        }
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Structured AI policy record produced by the extraction engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyRecord {
    pub policy_name: String,
    pub jurisdiction: Option<String>,
    pub issuing_body: Option<String>,
    pub date_introduced: Option<NaiveDate>,
    pub date_enacted: Option<NaiveDate>,
    pub status: Option<PolicyStatus>,
    pub policy_type: Option<String>,
    pub scope_coverage: Option<String>,
    pub key_provisions: Option<String>,
    pub risk_classification: RiskLevel,
    pub company_obligations: Option<String>,
    pub penalties_fines: Option<String>,
    pub affected_stakeholders: Option<String>,
    pub implementation_notes: Option<String>,
    pub latest_update: Option<NaiveDate>,
    pub source_reference_link: String,
    pub monitoring_org: Option<String>,
    pub notes_commentary: Option<String>,
    pub next_review_date: Option<NaiveDate>,
    pub confidence_score: i32,
}

/// A policy row as it exists in the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredPolicy {
    pub id: Uuid,
    #[serde(flatten)]
    pub record: PolicyRecord,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Per-run counters returned to the caller of an ingestion run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessingResult {
    pub processed: u32,
    pub added: u32,
    pub duplicates: u32,
    pub errors: u32,
}

/// Aggregate store statistics reported alongside run results.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingStats {
    pub total: i64,
    pub added_today: i64,
    pub added_this_week: i64,
    pub last_update: Option<DateTime<Utc>>,
}

#[derive(Debug, thiserror::Error)]
pub enum PolicyError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Feed parse error: {0}")]
    Parse(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Language model error: {0}")]
    Model(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("General error: {0}")]
    General(String),
}

pub type Result<T> = std::result::Result<T, PolicyError>;
