//! Generic ATS adapters (Greenhouse, Lever). Both speak public JSON APIs,
//! need no browser, and read their tenant list from the source catalogue.

use async_trait::async_trait;
use serde_json::{Value, json};

use crate::error::AppError;
use crate::models::posting::RawPayload;
use crate::models::source::CatalogueSource;
use crate::scrapers::{RawPosting, ScrapeContext, SourceAdapter};

const SPAIN_KEYWORDS: &[&str] = &[
    "spain", "españa", "madrid", "barcelona", "remote", "remoto", "híbrido", "hibrido",
    "valencia", "sevilla", "bilbao", "zaragoza",
];

const HTTP_TIMEOUT_SECS: u64 = 30;

fn http_client() -> Result<reqwest::Client, AppError> {
    reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(HTTP_TIMEOUT_SECS))
        .user_agent(
            "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
        )
        .build()
        .map_err(|e| AppError::Internal(format!("Failed to build HTTP client: {e}")))
}

/// Tenant slugs for one adapter kind, from the catalogue. The slug comes
/// from `extra_config.slug` or is derived from the company name.
async fn catalogue_slugs(
    cx: &ScrapeContext,
    kind: &str,
) -> Result<Vec<(String, String, String)>, AppError> {
    let sources = CatalogueSource::list_kind(cx.pool(), kind).await?;
    Ok(sources
        .into_iter()
        .map(|s| {
            let slug = s
                .extra_config
                .as_ref()
                .and_then(|c| c.0.get("slug"))
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| s.company_name.to_lowercase().replace(' ', ""));
            (slug, s.company_name, s.cv_profile)
        })
        .collect())
}

fn is_spain_or_remote(location: &str) -> bool {
    let loc = location.to_lowercase();
    loc.is_empty() || SPAIN_KEYWORDS.iter().any(|kw| loc.contains(kw))
}

/// Refine the catalogue profile from the posting title.
fn assign_cv_profile(title: &str, default: &str) -> String {
    let t = title.to_lowercase();
    const FRONTEND: &[&str] = &["frontend", "front-end", "react", "vue", "angular", "css", "ui engineer"];
    const FULLSTACK: &[&str] = &[
        "fullstack", "full stack", "full-stack", "backend", "software engineer", "developer",
        "python", "java", "node",
    ];
    if FRONTEND.iter().any(|kw| t.contains(kw)) {
        return "frontend_dev".to_string();
    }
    if FULLSTACK.iter().any(|kw| t.contains(kw)) {
        return "fullstack_dev".to_string();
    }
    default.to_string()
}

fn dedup_by_external_id(postings: Vec<RawPosting>) -> Vec<RawPosting> {
    let mut seen = std::collections::HashSet::new();
    postings
        .into_iter()
        .filter(|p| seen.insert(p.external_id.clone()))
        .collect()
}

// ---------------------------------------------------------------------------
// Greenhouse
// ---------------------------------------------------------------------------

pub struct GreenhouseAdapter;

#[async_trait]
impl SourceAdapter for GreenhouseAdapter {
    fn source_id(&self) -> &'static str {
        "greenhouse"
    }

    async fn scrape(&self, cx: &ScrapeContext) -> Result<Vec<RawPosting>, AppError> {
        let client = http_client()?;
        let tenants = catalogue_slugs(cx, "greenhouse").await?;
        if tenants.is_empty() {
            tracing::info!("no greenhouse tenants configured");
            return Ok(Vec::new());
        }

        let mut all = Vec::new();
        let mut title_digest = String::new();

        for (slug, company, profile) in tenants {
            let url =
                format!("https://boards-api.greenhouse.io/v1/boards/{slug}/jobs?content=true");
            match fetch_json(&client, &url).await {
                Ok(Some(data)) => {
                    let jobs = data
                        .get("jobs")
                        .and_then(Value::as_array)
                        .cloned()
                        .unwrap_or_default();
                    for raw in &jobs {
                        if let Some(posting) = parse_greenhouse_job(raw, &slug, &company, &profile)
                        {
                            title_digest.push_str(&posting.title);
                            all.push(posting);
                        }
                    }
                    tracing::info!(slug = %slug, found = jobs.len(), "greenhouse tenant done");
                }
                // 404/403 on a tenant is a permanently-gone board, treated
                // as an empty result.
                Ok(None) => tracing::debug!(slug = %slug, "greenhouse tenant not found"),
                Err(e) => tracing::warn!(slug = %slug, "greenhouse fetch error: {e}"),
            }
            cx.save_checkpoint(&json!({ "last_slug": slug })).await?;
            cx.pause().await;
        }

        cx.check_structure(&title_digest).await?;
        Ok(dedup_by_external_id(all))
    }
}

fn parse_greenhouse_job(
    raw: &Value,
    slug: &str,
    company: &str,
    default_profile: &str,
) -> Option<RawPosting> {
    let external_id = match raw.get("id") {
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::String(s)) => s.clone(),
        _ => return None,
    };

    let location = raw
        .get("location")
        .and_then(|l| l.get("name"))
        .and_then(Value::as_str)
        .unwrap_or_default();
    if !is_spain_or_remote(location) {
        return None;
    }

    let title = raw.get("title").and_then(Value::as_str)?.to_string();
    let url = raw
        .get("absolute_url")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| format!("https://boards.greenhouse.io/{slug}/jobs/{external_id}"));
    let description = raw
        .get("content")
        .and_then(Value::as_str)
        .map(str::to_string);

    Some(RawPosting {
        source_id: None,
        external_id: format!("{slug}_{external_id}"),
        url,
        cv_profile: Some(assign_cv_profile(&title, default_profile)),
        title,
        company: company.to_string(),
        location: Some(if location.is_empty() {
            "España".to_string()
        } else {
            location.to_string()
        }),
        description,
        salary_raw: None,
        contract_type: None,
        posted_at: None,
        raw_data: raw.as_object().cloned().map(RawPayload::Structured),
    })
}

// ---------------------------------------------------------------------------
// Lever
// ---------------------------------------------------------------------------

pub struct LeverAdapter;

#[async_trait]
impl SourceAdapter for LeverAdapter {
    fn source_id(&self) -> &'static str {
        "lever"
    }

    async fn scrape(&self, cx: &ScrapeContext) -> Result<Vec<RawPosting>, AppError> {
        let client = http_client()?;
        let tenants = catalogue_slugs(cx, "lever").await?;
        if tenants.is_empty() {
            tracing::info!("no lever tenants configured");
            return Ok(Vec::new());
        }

        let mut all = Vec::new();
        let mut title_digest = String::new();

        for (slug, company, profile) in tenants {
            let url = format!("https://api.lever.co/v0/postings/{slug}?mode=json");
            match fetch_json(&client, &url).await {
                Ok(Some(Value::Array(jobs))) => {
                    for raw in &jobs {
                        if let Some(posting) = parse_lever_job(raw, &slug, &company, &profile) {
                            title_digest.push_str(&posting.title);
                            all.push(posting);
                        }
                    }
                    tracing::info!(slug = %slug, found = jobs.len(), "lever tenant done");
                }
                Ok(Some(_)) => tracing::warn!(slug = %slug, "unexpected lever payload shape"),
                Ok(None) => tracing::debug!(slug = %slug, "lever tenant not found"),
                Err(e) => tracing::warn!(slug = %slug, "lever fetch error: {e}"),
            }
            cx.save_checkpoint(&json!({ "last_slug": slug })).await?;
            cx.pause().await;
        }

        cx.check_structure(&title_digest).await?;
        Ok(dedup_by_external_id(all))
    }
}

fn parse_lever_job(
    raw: &Value,
    slug: &str,
    company: &str,
    default_profile: &str,
) -> Option<RawPosting> {
    let external_id = raw.get("id").and_then(Value::as_str)?.to_string();
    let title = raw.get("text").and_then(Value::as_str)?.to_string();

    let categories = raw.get("categories").cloned().unwrap_or(Value::Null);
    let location = categories
        .get("location")
        .and_then(Value::as_str)
        .unwrap_or_default();
    if !is_spain_or_remote(location) {
        return None;
    }

    let url = raw
        .get("hostedUrl")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| format!("https://jobs.lever.co/{slug}/{external_id}"));
    let description = raw
        .get("descriptionPlain")
        .and_then(Value::as_str)
        .map(str::to_string);
    let contract_type = categories
        .get("commitment")
        .and_then(Value::as_str)
        .map(str::to_string);

    Some(RawPosting {
        source_id: None,
        external_id: format!("{slug}_{external_id}"),
        url,
        cv_profile: Some(assign_cv_profile(&title, default_profile)),
        title,
        company: company.to_string(),
        location: Some(if location.is_empty() {
            "España".to_string()
        } else {
            location.to_string()
        }),
        description,
        salary_raw: None,
        contract_type,
        posted_at: None,
        raw_data: raw.as_object().cloned().map(RawPayload::Structured),
    })
}

// ---------------------------------------------------------------------------
// Shared fetch
// ---------------------------------------------------------------------------

/// GET a JSON document. `Ok(None)` covers tenants that are gone (404) or
/// forbidden (401/403) — source-permanent conditions the caller counts as
/// empty results.
async fn fetch_json(client: &reqwest::Client, url: &str) -> Result<Option<Value>, AppError> {
    let resp = client
        .get(url)
        .header("Accept", "application/json")
        .header("Accept-Language", "es-ES,es;q=0.9,en;q=0.8")
        .send()
        .await
        .map_err(|e| AppError::Internal(format!("request failed: {e}")))?;

    match resp.status().as_u16() {
        401 | 403 | 404 => return Ok(None),
        _ => {}
    }
    let resp = resp
        .error_for_status()
        .map_err(|e| AppError::Internal(format!("bad status: {e}")))?;
    let data = resp
        .json()
        .await
        .map_err(|e| AppError::Internal(format!("invalid JSON: {e}")))?;
    Ok(Some(data))
}
