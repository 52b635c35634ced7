//! Rubric-based quality scoring of an adapted CV. A low score never blocks
//! the pipeline; it is recorded on the application for the reviewer.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::documents::CvDocument;
use crate::llm::LlmClient;
use crate::prompts;

const WEIGHT_ATS: f64 = 0.40;
const WEIGHT_RELEVANCE: f64 = 0.40;
const WEIGHT_LANGUAGE: f64 = 0.20;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityRubric {
    pub ats_keyword_match: f64,
    pub relevance: f64,
    pub language_consistency: f64,
    pub overall: f64,
    pub passed: bool,
    pub notes: String,
}

pub async fn score_cv(
    llm: &dyn LlmClient,
    adapted: &CvDocument,
    job_description: &str,
    minimum: f64,
) -> QualityRubric {
    let cv_json = serde_json::to_string_pretty(adapted).unwrap_or_default();
    let cv_excerpt: String = cv_json.chars().take(3000).collect();
    let jd = if job_description.is_empty() {
        "(no job description provided)"
    } else {
        job_description
    };

    let mut rubric = match llm
        .generate_json(&prompts::quality_rubric(jd, &cv_excerpt), 0.1)
        .await
    {
        Ok(raw) => parse_rubric(&raw),
        Err(e) => {
            tracing::error!("quality scoring failed: {e}");
            fallback_rubric(&e.to_string())
        }
    };

    rubric.passed = rubric.overall >= minimum;
    tracing::info!(
        ats = rubric.ats_keyword_match,
        relevance = rubric.relevance,
        language = rubric.language_consistency,
        overall = rubric.overall,
        passed = rubric.passed,
        "cv quality scored"
    );
    if !rubric.passed {
        tracing::warn!(overall = rubric.overall, minimum, "quality below threshold");
    }
    rubric
}

fn parse_rubric(raw: &Value) -> QualityRubric {
    let ats = score_field(raw, "ats_keyword_match");
    let relevance = score_field(raw, "relevance");
    let language = score_field(raw, "language_consistency");

    // The model may offer its own overall; clamp it, else use our weights.
    let overall = raw
        .get("overall")
        .and_then(Value::as_f64)
        .map(clamp_score)
        .unwrap_or_else(|| weighted_average(ats, relevance, language));

    let notes: String = raw
        .get("notes")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .trim()
        .chars()
        .take(500)
        .collect();

    QualityRubric {
        ats_keyword_match: ats,
        relevance,
        language_consistency: language,
        overall,
        passed: false,
        notes,
    }
}

fn score_field(raw: &Value, field: &str) -> f64 {
    match raw.get(field).and_then(Value::as_f64) {
        Some(score) => clamp_score(score),
        None => {
            tracing::warn!(field, "missing or invalid rubric score");
            5.0
        }
    }
}

fn clamp_score(score: f64) -> f64 {
    score.clamp(0.0, 10.0)
}

fn weighted_average(ats: f64, relevance: f64, language: f64) -> f64 {
    let total = ats * WEIGHT_ATS + relevance * WEIGHT_RELEVANCE + language * WEIGHT_LANGUAGE;
    (total * 100.0).round() / 100.0
}

/// Below-threshold rubric used when the scoring call fails.
fn fallback_rubric(error_note: &str) -> QualityRubric {
    let note: String = error_note.chars().take(200).collect();
    QualityRubric {
        ats_keyword_match: 0.0,
        relevance: 0.0,
        language_consistency: 0.0,
        overall: 0.0,
        passed: false,
        notes: format!("Quality check failed due to AI error: {note}"),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn weighted_average_uses_spec_weights() {
        // 8*0.4 + 6*0.4 + 10*0.2 = 7.6
        assert_eq!(weighted_average(8.0, 6.0, 10.0), 7.6);
    }

    #[test]
    fn scores_are_clamped_to_valid_range() {
        let rubric = parse_rubric(&json!({
            "ats_keyword_match": 14.0,
            "relevance": -3.0,
            "language_consistency": 7.0,
        }));
        assert_eq!(rubric.ats_keyword_match, 10.0);
        assert_eq!(rubric.relevance, 0.0);
        assert_eq!(rubric.language_consistency, 7.0);
        // 10*0.4 + 0*0.4 + 7*0.2 = 5.4
        assert_eq!(rubric.overall, 5.4);
    }

    #[test]
    fn missing_fields_default_to_midpoint() {
        let rubric = parse_rubric(&json!({ "relevance": 9.0 }));
        assert_eq!(rubric.ats_keyword_match, 5.0);
        assert_eq!(rubric.language_consistency, 5.0);
    }

    #[test]
    fn model_supplied_overall_is_clamped_and_respected() {
        let rubric = parse_rubric(&json!({
            "ats_keyword_match": 8.0,
            "relevance": 8.0,
            "language_consistency": 8.0,
            "overall": 42.0,
        }));
        assert_eq!(rubric.overall, 10.0);
    }
}
