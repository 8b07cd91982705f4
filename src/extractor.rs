use crate::llm::LanguageModel;
use crate::types::{PolicyRecord, PolicyStatus, RiskLevel, CONFIDENCE_THRESHOLD};
use chrono::NaiveDate;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

const SYSTEM_PROMPT: &str = "You are an expert AI policy analyst. Extract structured information \
from policy documents and news articles. Return valid JSON only.";

const SUMMARY_SYSTEM_PROMPT: &str = "You are an AI policy expert. Provide concise, accurate \
summaries of AI policies and regulations.";

/// Extraction engine: turns free document text into a [`PolicyRecord`]
/// via the language model, or nothing when the document fails the
/// confidence gate or the response cannot be used.
pub struct PolicyExtractor {
    model: Arc<dyn LanguageModel>,
}

impl PolicyExtractor {
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self { model }
    }

    /// Extract an AI policy record from document text.
    ///
    /// Returns `None` when the model call fails, the response does not
    /// parse as JSON, the confidence score is below the gate, or no
    /// policy name was produced. None of those outcomes is retried.
    pub async fn extract(&self, document_text: &str, source_url: &str) -> Option<PolicyRecord> {
        let prompt = build_prompt(document_text, source_url);

        let raw = match self.model.complete(SYSTEM_PROMPT, &prompt).await {
            Ok(content) => content,
            Err(e) => {
                warn!("Model extraction call failed: {}", e);
                return None;
            }
        };

        let cleaned = strip_code_fences(&raw);
        let extraction: ModelExtraction = match serde_json::from_str(cleaned) {
            Ok(extraction) => extraction,
            Err(e) => {
                error!("Failed to parse model response: {}", e);
                debug!("Raw model content: {}", raw);
                return None;
            }
        };

        if extraction.confidence_score < CONFIDENCE_THRESHOLD {
            info!(
                "Low confidence policy ({}%): {}",
                extraction.confidence_score,
                extraction.policy_name.as_deref().unwrap_or("Unknown")
            );
            return None;
        }

        let policy_name = match extraction.policy_name.as_deref() {
            Some(name) if !name.trim().is_empty() => name.trim().to_string(),
            _ => {
                warn!("Model response passed the confidence gate without a policy name");
                return None;
            }
        };

        let status = extraction
            .status
            .as_deref()
            .and_then(PolicyStatus::parse);

        let risk_classification = match extraction
            .risk_classification
            .as_deref()
            .and_then(RiskLevel::parse)
        {
            Some(risk) => risk,
            None => {
                let fallback = fallback_risk(
                    extraction.penalties_fines.as_deref(),
                    status,
                    extraction.company_obligations.as_deref(),
                    extraction.policy_type.as_deref(),
                );
                info!(
                    "Applied fallback risk classification {} for policy: {}",
                    fallback, policy_name
                );
                fallback
            }
        };

        info!(
            "Found policy ({}% confidence): {}",
            extraction.confidence_score, policy_name
        );

        Some(PolicyRecord {
            policy_name,
            jurisdiction: extraction.jurisdiction,
            issuing_body: extraction.issuing_body,
            date_introduced: parse_date(extraction.date_introduced.as_deref()),
            date_enacted: parse_date(extraction.date_enacted.as_deref()),
            status,
            policy_type: extraction.policy_type,
            scope_coverage: extraction.scope_coverage,
            key_provisions: extraction.key_provisions,
            risk_classification,
            company_obligations: extraction.company_obligations,
            penalties_fines: extraction.penalties_fines,
            affected_stakeholders: extraction.affected_stakeholders,
            implementation_notes: extraction.implementation_notes,
            latest_update: parse_date(extraction.latest_update.as_deref()),
            // The caller-supplied URL is authoritative over whatever the
            // model echoed back for this field.
            source_reference_link: source_url.to_string(),
            monitoring_org: extraction.monitoring_org,
            notes_commentary: extraction.notes_commentary,
            next_review_date: parse_date(extraction.next_review_date.as_deref()),
            confidence_score: extraction.confidence_score,
        })
    }

    /// Produce a short prose summary of a policy text. Failures degrade to
    /// a placeholder rather than an error.
    pub async fn summarize_policy(&self, policy_text: &str) -> String {
        let prompt = format!(
            "Summarize this AI policy in 2-3 sentences, focusing on key requirements and impact:\n\n{}",
            policy_text
        );

        match self.model.complete(SUMMARY_SYSTEM_PROMPT, &prompt).await {
            Ok(summary) if !summary.trim().is_empty() => summary.trim().to_string(),
            Ok(_) => "Summary not available".to_string(),
            Err(e) => {
                warn!("Model summarization call failed: {}", e);
                "Summary not available".to_string()
            }
        }
    }
}

/// Deterministic risk assignment used when the model omits the field or
/// returns something outside {Low, Medium, High, Critical}.
pub fn fallback_risk(
    penalties_fines: Option<&str>,
    status: Option<PolicyStatus>,
    company_obligations: Option<&str>,
    policy_type: Option<&str>,
) -> RiskLevel {
    let penalties = penalties_fines.map(|p| p.to_lowercase()).unwrap_or_default();
    if penalties.contains("fine") || penalties.contains("penalty") {
        return RiskLevel::High;
    }

    if status == Some(PolicyStatus::Enacted) && company_obligations.is_some() {
        return RiskLevel::Medium;
    }

    let is_guideline = policy_type
        .map(|t| t.to_lowercase().contains("guideline"))
        .unwrap_or(false);
    if status == Some(PolicyStatus::Proposed) || is_guideline {
        return RiskLevel::Low;
    }

    RiskLevel::Medium
}

/// Strip a Markdown code fence (``` or ```json) wrapping a model response.
pub fn strip_code_fences(content: &str) -> &str {
    let trimmed = content.trim();
    if let Some(rest) = trimmed.strip_prefix("```") {
        let rest = rest.strip_prefix("json").unwrap_or(rest);
        let rest = rest.strip_suffix("```").unwrap_or(rest);
        return rest.trim();
    }
    trimmed
}

fn parse_date(value: Option<&str>) -> Option<NaiveDate> {
    value.and_then(|v| NaiveDate::parse_from_str(v.trim(), "%Y-%m-%d").ok())
}

fn build_prompt(article_text: &str, source_url: &str) -> String {
    format!(
        r#"You are an AI policy analyst. Extract AI policy information from the following government document or policy announcement.

IMPORTANT: This document should be about AI/artificial intelligence policies, regulations, legislation, or government initiatives. Look for:
- Government regulations about AI systems
- AI safety frameworks and guidelines
- AI ethics policies and principles
- Algorithmic accountability measures
- AI governance frameworks
- Government AI funding or initiatives
- AI compliance requirements
- AI oversight and monitoring policies

If this document mentions AI but is primarily about other topics (like general cybersecurity, media funding, or non-AI research), still extract it but give it a lower confidence score.

Document Text:
{article_text}

Source URL: {source_url}

Extract the following information and return as JSON:
{{
  "policy_name": "Full name/title of the AI policy or regulation",
  "jurisdiction": "Country, state, or region (e.g., 'United States', 'European Union', 'California')",
  "issuing_body": "Organization or authority issuing the policy (e.g., 'FTC', 'European Commission', 'NIST')",
  "date_introduced": "Date policy was first introduced (YYYY-MM-DD format, null if unknown)",
  "date_enacted": "Date policy became effective (YYYY-MM-DD format, null if unknown)",
  "status": "Current status: 'Proposed', 'Under Review', 'Enacted', 'Amended', 'Repealed', or 'Expired'",
  "policy_type": "Type of policy (e.g., 'Regulation', 'Executive Order', 'Guidelines', 'Framework')",
  "scope_coverage": "What areas, industries, or AI applications this policy covers",
  "key_provisions": "Main requirements, rules, or provisions of the policy",
  "risk_classification": "REQUIRED: Impact level based on potential business/societal impact. Must be exactly one of: 'Low', 'Medium', 'High', or 'Critical'. Guidelines: Low=guidance/recommendations, Medium=compliance requirements, High=significant penalties/restrictions, Critical=major regulatory changes",
  "company_obligations": "What companies are required to do under this policy",
  "penalties_fines": "Consequences for non-compliance, including fines or penalties",
  "affected_stakeholders": "Who is affected (e.g., 'AI companies', 'researchers', 'consumers')",
  "implementation_notes": "Timeline, challenges, or implementation requirements",
  "latest_update": "Most recent update date (YYYY-MM-DD format, null if unknown)",
  "source_reference_link": "{source_url}",
  "monitoring_org": "Organization responsible for monitoring compliance",
  "notes_commentary": "Additional analysis or important notes about this policy",
  "next_review_date": "Scheduled review or sunset date (YYYY-MM-DD format, null if unknown)",
  "confidence_score": "Number between 0-100 indicating confidence this is a legitimate AI policy"
}}

Rules:
1. Only extract if confidence_score >= 70 (clearly about AI policy)
2. Use null for unknown/missing information
3. Be precise and factual
4. Focus on AI-specific policies, not general tech regulations
5. If not about AI policy, return: {{"confidence_score": 0}}
"#
    )
}

/// Wire shape of the model's JSON response. Text fields deserialize
/// leniently: a JSON string is taken as-is, while arrays and objects are
/// re-encoded to their JSON text and left for the normalizer to render.
#[derive(Debug, Default, Deserialize)]
struct ModelExtraction {
    #[serde(default, deserialize_with = "de_opt_text")]
    policy_name: Option<String>,
    #[serde(default, deserialize_with = "de_opt_text")]
    jurisdiction: Option<String>,
    #[serde(default, deserialize_with = "de_opt_text")]
    issuing_body: Option<String>,
    #[serde(default, deserialize_with = "de_opt_text")]
    date_introduced: Option<String>,
    #[serde(default, deserialize_with = "de_opt_text")]
    date_enacted: Option<String>,
    #[serde(default, deserialize_with = "de_opt_text")]
    status: Option<String>,
    #[serde(default, deserialize_with = "de_opt_text")]
    policy_type: Option<String>,
    #[serde(default, deserialize_with = "de_opt_text")]
    scope_coverage: Option<String>,
    #[serde(default, deserialize_with = "de_opt_text")]
    key_provisions: Option<String>,
    #[serde(default, deserialize_with = "de_opt_text")]
    risk_classification: Option<String>,
    #[serde(default, deserialize_with = "de_opt_text")]
    company_obligations: Option<String>,
    #[serde(default, deserialize_with = "de_opt_text")]
    penalties_fines: Option<String>,
    #[serde(default, deserialize_with = "de_opt_text")]
    affected_stakeholders: Option<String>,
    #[serde(default, deserialize_with = "de_opt_text")]
    implementation_notes: Option<String>,
    #[serde(default, deserialize_with = "de_opt_text")]
    latest_update: Option<String>,
    #[serde(default, deserialize_with = "de_opt_text")]
    monitoring_org: Option<String>,
    #[serde(default, deserialize_with = "de_opt_text")]
    notes_commentary: Option<String>,
    #[serde(default, deserialize_with = "de_opt_text")]
    next_review_date: Option<String>,
    #[serde(default, deserialize_with = "de_confidence")]
    confidence_score: i32,
}

fn de_opt_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.and_then(value_to_text))
}

fn value_to_text(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s),
        other => Some(other.to_string()),
    }
}

fn de_confidence<'de, D>(deserializer: D) -> Result<i32, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    let score = match value {
        Some(Value::Number(n)) => n.as_i64().unwrap_or(0) as i32,
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0),
        _ => 0,
    };
    Ok(score)
}
