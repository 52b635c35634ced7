use std::path::Path;
use std::time::Duration;

use rand::Rng;
use serde_json::{Value, json};

use crate::documents::CvDocument;
use crate::error::AppError;
use crate::forms::detector::{FieldKind, FormField};
use crate::forms::page::Page;
use crate::forms::{FieldValue, SnapshotFields};

/// Label/name patterns mapped to semantic keys, scanned in order: an exact
/// label hit wins, then the first substring hit on label or name.
const FIELD_MAP: &[(&str, &str)] = &[
    // Name
    ("nombre", "name"),
    ("name", "name"),
    ("apellido", "name"),
    ("apellidos", "name"),
    ("full name", "name"),
    ("nombre completo", "name"),
    ("nombre y apellidos", "name"),
    // Email
    ("email", "email"),
    ("correo", "email"),
    ("correo electrónico", "email"),
    ("e-mail", "email"),
    ("mail", "email"),
    // Phone
    ("telefono", "phone"),
    ("teléfono", "phone"),
    ("phone", "phone"),
    ("móvil", "phone"),
    ("movil", "phone"),
    ("mobile", "phone"),
    ("celular", "phone"),
    ("tel", "phone"),
    // Cover letter
    ("carta", "cover_letter"),
    ("carta de presentación", "cover_letter"),
    ("motivacion", "cover_letter"),
    ("motivación", "cover_letter"),
    ("presentacion", "cover_letter"),
    ("presentación", "cover_letter"),
    ("cover letter", "cover_letter"),
    ("cover_letter", "cover_letter"),
    ("por qué", "cover_letter"),
    ("why", "cover_letter"),
    // CV file
    ("cv", "cv_file"),
    ("curriculum", "cv_file"),
    ("currículum", "cv_file"),
    ("resume", "cv_file"),
    ("adjuntar cv", "cv_file"),
    ("upload cv", "cv_file"),
    ("upload resume", "cv_file"),
    // Links
    ("linkedin", "linkedin"),
    ("github", "github"),
    // Location
    ("ubicacion", "location"),
    ("ubicación", "location"),
    ("ciudad", "location"),
    ("city", "location"),
    ("location", "location"),
    ("lugar de residencia", "location"),
    // Salary
    ("salario", "salary_expectation"),
    ("pretensión salarial", "salary_expectation"),
    ("salary", "salary_expectation"),
    // Availability
    ("disponibilidad", "availability"),
    ("availability", "availability"),
    ("start date", "availability"),
    ("fecha de incorporación", "availability"),
];

const DEFAULT_SALARY_EXPECTATION: &str = "según convenio";
const DEFAULT_AVAILABILITY: &str = "inmediata";

pub struct FillData<'a> {
    pub cv: &'a CvDocument,
    pub cover_letter: Option<&'a str>,
    pub cv_pdf_path: Option<&'a Path>,
}

/// Fill the detected fields with human-like pacing. Returns the
/// `ref → value written` mapping for persistence.
pub async fn fill_form(
    page: &dyn Page,
    fields: &[FormField],
    data: &FillData<'_>,
) -> Result<SnapshotFields, AppError> {
    let mut filled = SnapshotFields::new();

    for field in fields {
        if !field.visible {
            tracing::debug!(selector = %field.selector, "skipping hidden field");
            continue;
        }

        let semantic_key = resolve_semantic_key(field);
        let Some(value) = lookup_value(&semantic_key, data) else {
            tracing::debug!(label = %field.label, key = %semantic_key, "no value for field");
            continue;
        };

        match fill_field(page, field, &value, data.cv_pdf_path).await {
            Ok(Some(written)) => {
                tracing::info!(
                    label = %field.label,
                    kind = ?field.kind,
                    semantic = %semantic_key,
                    "field filled"
                );
                filled.insert(field.selector.clone(), written);
            }
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(label = %field.label, selector = %field.selector, "fill failed: {e}");
            }
        }

        pause(0.3, 1.5).await;
    }

    tracing::info!(
        filled_count = filled.len(),
        total_fields = fields.len(),
        url = %page.url(),
        "form fill complete"
    );
    Ok(filled)
}

/// Map a field to a semantic key: exact label, then substring on label or
/// name, then a type-based fallback.
pub fn resolve_semantic_key(field: &FormField) -> String {
    let label = field.label.to_lowercase().trim().to_string();
    let name = field.name.to_lowercase().trim().to_string();

    for (pattern, key) in FIELD_MAP {
        if label == *pattern {
            return (*key).to_string();
        }
    }
    for (pattern, key) in FIELD_MAP {
        if label.contains(pattern) || name.contains(pattern) {
            return (*key).to_string();
        }
    }

    match field.kind {
        FieldKind::Email => "email".to_string(),
        FieldKind::Tel => "phone".to_string(),
        FieldKind::File => "cv_file".to_string(),
        _ if !label.is_empty() => label,
        _ if !name.is_empty() => name,
        _ => "unknown".to_string(),
    }
}

fn lookup_value(semantic_key: &str, data: &FillData<'_>) -> Option<String> {
    let cv = data.cv;
    let value = match semantic_key {
        "name" => cv.name.clone(),
        "email" => cv.email.clone(),
        "phone" => cv.phone.clone(),
        "location" => cv.location.clone().unwrap_or_default(),
        "linkedin" => cv.linkedin.clone().unwrap_or_default(),
        "github" => cv.github.clone().unwrap_or_default(),
        "cover_letter" => data
            .cover_letter
            .map(str::to_string)
            .or_else(|| cv.summary.clone())
            .unwrap_or_default(),
        "cv_file" => data
            .cv_pdf_path
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or_default(),
        "salary_expectation" => DEFAULT_SALARY_EXPECTATION.to_string(),
        "availability" => DEFAULT_AVAILABILITY.to_string(),
        _ => String::new(),
    };
    if value.is_empty() { None } else { Some(value) }
}

async fn fill_field(
    page: &dyn Page,
    field: &FormField,
    value: &str,
    cv_pdf_path: Option<&Path>,
) -> Result<Option<FieldValue>, AppError> {
    let selector = field.selector.as_str();

    // Bring the element into view before touching it.
    let _ = page
        .evaluate(SCROLL_FOCUS_JS, Value::String(selector.to_string()))
        .await;
    pause(0.1, 0.3).await;

    match field.kind {
        FieldKind::File => {
            let Some(path) = cv_pdf_path else {
                return Ok(None);
            };
            if !path.exists() {
                tracing::warn!(path = %path.display(), "CV file missing, skipping upload");
                return Ok(None);
            }
            page.set_input_files(selector, path).await?;
            Ok(Some(FieldValue::Text(path.to_string_lossy().into_owned())))
        }

        FieldKind::Text | FieldKind::Email | FieldKind::Tel | FieldKind::Number => {
            page.click(selector).await?;
            pause(0.05, 0.15).await;
            page.fill(selector, "").await?;
            // Keyed typing for fields where bot-shaped input is most visible.
            let important =
                matches!(field.kind, FieldKind::Email | FieldKind::Tel) || value.len() > 30;
            if important {
                page.type_text(selector, value, jitter_ms(40, 100)).await?;
            } else {
                page.fill(selector, value).await?;
            }
            pause(0.1, 0.3).await;
            Ok(Some(FieldValue::Text(value.to_string())))
        }

        FieldKind::Textarea => {
            page.click(selector).await?;
            pause(0.1, 0.2).await;
            page.fill(selector, "").await?;
            page.type_text(selector, value, jitter_ms(20, 60)).await?;
            pause(0.2, 0.5).await;
            Ok(Some(FieldValue::Text(value.to_string())))
        }

        FieldKind::Select => {
            let Some(matched) = match_select_option(field, value) else {
                return Ok(None);
            };
            page.click(selector).await?;
            pause(0.2, 0.5).await;
            page.select_option(selector, &matched).await?;
            pause(0.1, 0.3).await;
            Ok(Some(FieldValue::Text(matched)))
        }

        FieldKind::Radio => {
            if is_truthy(value) {
                pause(0.2, 0.4).await;
                page.click(selector).await?;
                pause(0.1, 0.2).await;
                Ok(Some(FieldValue::Flag(true)))
            } else {
                Ok(None)
            }
        }

        FieldKind::Checkbox => {
            let desired = is_truthy(value) || value.eq_ignore_ascii_case("on");
            let current = page.is_checked(selector).await?;
            if current != desired {
                pause(0.2, 0.4).await;
                page.click(selector).await?;
                pause(0.1, 0.2).await;
            }
            Ok(Some(FieldValue::Flag(desired)))
        }

        FieldKind::Date => {
            page.fill(selector, value).await?;
            Ok(Some(FieldValue::Text(value.to_string())))
        }

        FieldKind::Range => {
            page.evaluate(SET_RANGE_JS, json!({ "ref": selector, "value": value }))
                .await?;
            Ok(Some(FieldValue::Text(value.to_string())))
        }
    }
}

/// Exact match on option value or text (lowercased), then substring.
fn match_select_option(field: &FormField, value: &str) -> Option<String> {
    let needle = value.to_lowercase();

    for opt in &field.options {
        if needle == opt.text.to_lowercase() || needle == opt.value.to_lowercase() {
            return Some(opt.value.clone());
        }
    }
    for opt in &field.options {
        if opt.text.to_lowercase().contains(&needle) || opt.value.to_lowercase().contains(&needle)
        {
            return Some(opt.value.clone());
        }
    }
    None
}

fn is_truthy(value: &str) -> bool {
    matches!(value.to_lowercase().as_str(), "true" | "yes" | "sí" | "si" | "1")
}

async fn pause(lo: f64, hi: f64) {
    let secs = rand::rng().random_range(lo..=hi);
    tokio::time::sleep(Duration::from_secs_f64(secs)).await;
}

fn jitter_ms(lo: u64, hi: u64) -> u64 {
    rand::rng().random_range(lo..=hi)
}

pub const SCROLL_FOCUS_JS: &str = r#"
(ref) => {
    const el = document.querySelector(ref);
    if (el) {
        el.scrollIntoView({ behavior: 'smooth', block: 'center' });
        el.focus();
    }
}
"#;

pub const SET_RANGE_JS: &str = r#"
(arg) => {
    const el = document.querySelector(arg.ref);
    if (el) {
        el.value = arg.value;
        el.dispatchEvent(new Event('input', { bubbles: true }));
        el.dispatchEvent(new Event('change', { bubbles: true }));
    }
}
"#;
