//! Validation gate for adapted CVs: field-level diff, fabrication
//! detection, and language consistency. The gate passes iff the error list
//! is empty; warnings are logged and carried along.

use std::collections::{BTreeSet, HashMap};
use std::sync::LazyLock;

use regex::Regex;
use whatlang::Lang;

use crate::documents::CvDocument;
use crate::llm::LlmClient;
use crate::prompts;

#[derive(Debug, Default)]
pub struct ValidationReport {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationReport {
    pub fn passed(&self) -> bool {
        self.errors.is_empty()
    }
}

pub async fn validate_cv(
    original: &CvDocument,
    adapted: &CvDocument,
    job_description: &str,
    llm: &dyn LlmClient,
) -> ValidationReport {
    let mut report = ValidationReport::default();

    check_pii_integrity(original, adapted, &mut report);
    check_experience_integrity(original, adapted, &mut report);
    check_fabrication(original, adapted, llm, &mut report).await;
    check_language_consistency(adapted, job_description, &mut report);

    tracing::info!(
        passed = report.passed(),
        error_count = report.errors.len(),
        warning_count = report.warnings.len(),
        "cv validation finished"
    );
    report
}

/// Name, email, and phone must be byte-for-byte identical after trimming.
fn check_pii_integrity(original: &CvDocument, adapted: &CvDocument, report: &mut ValidationReport) {
    let pairs = [
        ("name", &original.name, &adapted.name),
        ("email", &original.email, &adapted.email),
        ("phone", &original.phone, &adapted.phone),
    ];
    for (field, orig, adap) in pairs {
        let orig = orig.trim();
        let adap = adap.trim();
        if !orig.is_empty() && !adap.is_empty() && orig != adap {
            tracing::error!(field, original = orig, adapted = adap, "PII mismatch");
            report.errors.push(format!(
                "PII mismatch: field '{field}' changed from '{orig}' to '{adap}'"
            ));
        } else if !orig.is_empty() && adap.is_empty() {
            tracing::error!(field, "PII removed");
            report.errors.push(format!(
                "PII removed: field '{field}' was present in original but missing in adapted CV"
            ));
        }
    }
}

/// Every original company must survive, the adapted CV must not grow extra
/// entries, and the year extremes per company must stay within ±1.
fn check_experience_integrity(
    original: &CvDocument,
    adapted: &CvDocument,
    report: &mut ValidationReport,
) {
    let orig_companies: BTreeSet<String> = original
        .experience
        .iter()
        .filter(|e| !e.company.is_empty())
        .map(|e| normalise_company(&e.company))
        .collect();
    let adap_companies: BTreeSet<String> = adapted
        .experience
        .iter()
        .filter(|e| !e.company.is_empty())
        .map(|e| normalise_company(&e.company))
        .collect();

    let removed: Vec<&String> = orig_companies.difference(&adap_companies).collect();
    if !removed.is_empty() {
        tracing::error!(?removed, "companies removed from adapted CV");
        report.errors.push(format!(
            "Experience integrity: companies removed from adapted CV: {removed:?}"
        ));
    }

    if adapted.experience.len() > original.experience.len() {
        report.errors.push(format!(
            "Experience integrity: adapted CV has {} entries but original has only {} — possible fabricated jobs",
            adapted.experience.len(),
            original.experience.len()
        ));
    }

    let orig_by_company: HashMap<String, &crate::documents::ExperienceEntry> = original
        .experience
        .iter()
        .map(|e| (normalise_company(&e.company), e))
        .collect();

    for adap_entry in &adapted.experience {
        let key = normalise_company(&adap_entry.company);
        let Some(orig_entry) = orig_by_company.get(&key) else {
            continue;
        };
        let orig_years = extract_years(&orig_entry.start_date, &orig_entry.end_date);
        let adap_years = extract_years(&adap_entry.start_date, &adap_entry.end_date);
        if let (Some((o_min, o_max)), Some((a_min, a_max))) =
            (min_max(&orig_years), min_max(&adap_years))
            && ((o_min - a_min).abs() > 1 || (o_max - a_max).abs() > 1)
        {
            tracing::error!(
                company = %key,
                original_years = ?orig_years,
                adapted_years = ?adap_years,
                "date drift"
            );
            report.errors.push(format!(
                "Date drift at '{key}': original years {orig_years:?} vs adapted years {adap_years:?}"
            ));
        }
    }
}

async fn check_fabrication(
    original: &CvDocument,
    adapted: &CvDocument,
    llm: &dyn LlmClient,
    report: &mut ValidationReport,
) {
    let prompt = prompts::fabrication_detector(&original.to_plain_text(), &adapted.to_plain_text());
    match llm.generate_json(&prompt, 0.1).await {
        Ok(result) => {
            let has_fabrication = result
                .get("has_fabrication")
                .and_then(|v| v.as_bool())
                .unwrap_or(false);
            let fabricated: Vec<String> = result
                .get("fabricated_skills")
                .and_then(|v| v.as_array())
                .map(|a| {
                    a.iter()
                        .filter_map(|v| v.as_str())
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default();

            if has_fabrication && !fabricated.is_empty() {
                tracing::error!(?fabricated, "fabrication detected");
                report.errors.push(format!(
                    "Fabrication detected: adapted CV contains skills/items not in original: {}",
                    fabricated.join(", ")
                ));
            } else if has_fabrication {
                report.errors.push(
                    "Fabrication detected: model flagged the adapted CV but could not list specific items"
                        .to_string(),
                );
            }
        }
        Err(e) => {
            // A broken detector must not block generation.
            tracing::warn!("fabrication check failed: {e}");
            report
                .warnings
                .push(format!("Fabrication check unavailable: {e}"));
        }
    }
}

/// Spanish-market languages the adapted CV may be written in without a
/// warning.
const MARKET_LANGS: &[Lang] = &[Lang::Spa, Lang::Cat];

fn check_language_consistency(
    adapted: &CvDocument,
    job_description: &str,
    report: &mut ValidationReport,
) {
    let adapted_text = adapted.to_plain_text();
    if adapted_text.len() < 50 {
        tracing::warn!("language check skipped: adapted text too short");
        return;
    }

    let Some(adapted_info) = whatlang::detect(&adapted_text) else {
        tracing::warn!("language detection failed for adapted CV");
        return;
    };

    if job_description.len() >= 50
        && let Some(jd_info) = whatlang::detect(job_description)
        && adapted_info.lang() != jd_info.lang()
    {
        let msg = format!(
            "Language mismatch: adapted CV is '{}' (confidence={:.2}) but job description is '{}' (confidence={:.2})",
            adapted_info.lang().code(),
            adapted_info.confidence(),
            jd_info.lang().code(),
            jd_info.confidence()
        );
        if adapted_info.confidence() > 0.9 && jd_info.confidence() > 0.9 {
            tracing::error!("{msg}");
            report.errors.push(msg);
        } else {
            tracing::warn!("{msg}");
            report.warnings.push(msg);
        }
    }

    if !MARKET_LANGS.contains(&adapted_info.lang()) && adapted_info.confidence() > 0.9 {
        report.warnings.push(format!(
            "Adapted CV appears to be in '{}' with high confidence ({:.2}); Spanish is expected for the Spanish job market",
            adapted_info.lang().code(),
            adapted_info.confidence()
        ));
    }
}

fn normalise_company(name: &str) -> String {
    name.to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '_')
        .collect()
}

static YEAR_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(?:19|20)\d{2}\b").expect("year pattern"));

fn extract_years(start_date: &str, end_date: &str) -> Vec<i32> {
    let text = format!("{start_date} {end_date}");
    YEAR_PATTERN
        .find_iter(&text)
        .filter_map(|m| m.as_str().parse().ok())
        .collect()
}

fn min_max(years: &[i32]) -> Option<(i32, i32)> {
    let min = *years.iter().min()?;
    let max = *years.iter().max()?;
    Some((min, max))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::documents::ExperienceEntry;

    fn base_cv() -> CvDocument {
        CvDocument {
            name: "Ana Ruiz".to_string(),
            email: "ana@example.com".to_string(),
            phone: "+34 600 000 000".to_string(),
            experience: vec![ExperienceEntry {
                company: "Flowence S.L.".to_string(),
                title: "Desarrolladora".to_string(),
                start_date: "2021-03".to_string(),
                end_date: "2024-01".to_string(),
                bullets: vec!["Desarrollé la plataforma interna".to_string()],
            }],
            ..Default::default()
        }
    }

    #[test]
    fn pii_change_is_an_error() {
        let original = base_cv();
        let mut adapted = base_cv();
        adapted.email = "otro@example.com".to_string();

        let mut report = ValidationReport::default();
        check_pii_integrity(&original, &adapted, &mut report);
        assert_eq!(report.errors.len(), 1);
        assert!(report.errors[0].contains("email"));
    }

    #[test]
    fn pii_removal_is_an_error() {
        let original = base_cv();
        let mut adapted = base_cv();
        adapted.phone = String::new();

        let mut report = ValidationReport::default();
        check_pii_integrity(&original, &adapted, &mut report);
        assert_eq!(report.errors.len(), 1);
        assert!(report.errors[0].contains("removed"));
    }

    #[test]
    fn removed_company_is_an_error() {
        let original = base_cv();
        let mut adapted = base_cv();
        adapted.experience.clear();

        let mut report = ValidationReport::default();
        check_experience_integrity(&original, &adapted, &mut report);
        assert!(report.errors.iter().any(|e| e.contains("companies removed")));
    }

    #[test]
    fn extra_entries_are_an_error() {
        let original = base_cv();
        let mut adapted = base_cv();
        adapted.experience.push(ExperienceEntry {
            company: "Invented Corp".to_string(),
            title: "CTO".to_string(),
            ..Default::default()
        });

        let mut report = ValidationReport::default();
        check_experience_integrity(&original, &adapted, &mut report);
        assert!(report.errors.iter().any(|e| e.contains("fabricated jobs")));
    }

    #[test]
    fn company_rename_with_same_normalisation_passes() {
        let original = base_cv();
        let mut adapted = base_cv();
        adapted.experience[0].company = "flowence-s.l".to_string();

        let mut report = ValidationReport::default();
        check_experience_integrity(&original, &adapted, &mut report);
        assert!(report.errors.is_empty(), "errors: {:?}", report.errors);
    }

    #[test]
    fn one_year_drift_is_tolerated_two_is_not() {
        let original = base_cv();

        let mut adapted = base_cv();
        adapted.experience[0].start_date = "2022".to_string();
        let mut report = ValidationReport::default();
        check_experience_integrity(&original, &adapted, &mut report);
        assert!(report.errors.is_empty());

        let mut adapted = base_cv();
        adapted.experience[0].start_date = "2019".to_string();
        let mut report = ValidationReport::default();
        check_experience_integrity(&original, &adapted, &mut report);
        assert!(report.errors.iter().any(|e| e.contains("Date drift")));
    }

    #[test]
    fn year_extraction_ignores_noise() {
        assert_eq!(extract_years("marzo 2021", "presente"), vec![2021]);
        assert_eq!(extract_years("2021-03", "2024-01"), vec![2021, 2024]);
        assert!(extract_years("actualidad", "").is_empty());
    }
}
