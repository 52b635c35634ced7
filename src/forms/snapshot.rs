use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::AppError;
use crate::forms::page::Page;
use crate::forms::{FieldValue, SnapshotFields};

/// Everything the human reviewer and the authorized replay need: the form
/// URL, the exact field values, and the full-page screenshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormSnapshot {
    pub url: String,
    pub fields: SnapshotFields,
    pub screenshot_path: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
pub struct FieldMismatch {
    pub selector: String,
    pub expected: String,
    pub actual: String,
}

/// Re-read every interactive field's current value from the live DOM.
/// File inputs cannot be reflected, so they carry the path recorded at
/// upload time (a data attribute set by the fill pass).
pub async fn serialize_fields(page: &dyn Page) -> Result<SnapshotFields, AppError> {
    let raw = page.evaluate(SERIALIZE_FIELDS_JS, Value::Null).await?;
    let fields: SnapshotFields = serde_json::from_value(raw)
        .map_err(|e| AppError::Browser(format!("field serialization returned bad shape: {e}")))?;
    Ok(fields)
}

/// Screenshot + field serialization + URL, persisted verbatim before the
/// application parks for review.
pub async fn take_snapshot(
    page: &dyn Page,
    screenshot_path: &Path,
) -> Result<FormSnapshot, AppError> {
    let screenshot = match page.screenshot(screenshot_path, true).await {
        Ok(()) => Some(screenshot_path.to_path_buf()),
        Err(e) => {
            tracing::warn!("snapshot screenshot failed: {e}");
            None
        }
    };

    let fields = serialize_fields(page).await?;
    tracing::info!(field_count = fields.len(), url = %page.url(), "form snapshot taken");

    Ok(FormSnapshot {
        url: page.url(),
        fields,
        screenshot_path: screenshot,
    })
}

/// Fast-fill all snapshot fields, no human-like pacing. Missing selectors
/// are tolerated; returns the number of fields written.
pub async fn refill_fast(page: &dyn Page, fields: &SnapshotFields) -> usize {
    let mut filled = 0;

    for (selector, value) in fields {
        if selector.is_empty() || value.is_empty() {
            continue;
        }
        match refill_one(page, selector, value).await {
            Ok(true) => filled += 1,
            Ok(false) => {}
            Err(e) => {
                tracing::debug!(selector = %selector, "replay fill failed: {e}");
            }
        }
    }

    filled
}

async fn refill_one(
    page: &dyn Page,
    selector: &str,
    value: &FieldValue,
) -> Result<bool, AppError> {
    let tag = page
        .evaluate(FIELD_TAG_JS, Value::String(selector.to_string()))
        .await?;
    let Some(tag) = tag.as_str() else {
        return Ok(false);
    };

    match tag {
        "input" | "textarea" => {
            let kind = page
                .evaluate(FIELD_TYPE_JS, Value::String(selector.to_string()))
                .await?;
            let kind = kind.as_str().unwrap_or("text");
            match kind {
                "file" => {
                    let FieldValue::Text(path) = value else {
                        return Ok(false);
                    };
                    let path = Path::new(path);
                    if path.exists() {
                        page.set_input_files(selector, path).await?;
                        return Ok(true);
                    }
                    Ok(false)
                }
                "checkbox" | "radio" => {
                    let desired = matches!(value, FieldValue::Flag(true));
                    let current = page.is_checked(selector).await?;
                    if current != desired {
                        page.click(selector).await?;
                    }
                    Ok(true)
                }
                _ => {
                    page.fill(selector, &value.as_comparable()).await?;
                    Ok(true)
                }
            }
        }
        "select" => {
            page.select_option(selector, &value.as_comparable()).await?;
            Ok(true)
        }
        _ => Ok(false),
    }
}

/// Compare current field values against the snapshot. Mismatches are
/// reported, never fatal — the click is still attempted.
pub async fn verify_fields(page: &dyn Page, expected: &SnapshotFields) -> Vec<FieldMismatch> {
    let mut mismatches = Vec::new();

    for (selector, expected_value) in expected {
        if selector.is_empty() {
            continue;
        }
        let Ok(actual) = page
            .evaluate(FIELD_VALUE_JS, Value::String(selector.to_string()))
            .await
        else {
            continue;
        };
        let actual = match actual {
            Value::String(s) => s,
            Value::Bool(b) => b.to_string(),
            Value::Null => continue,
            other => other.to_string(),
        };
        let expected_str = expected_value.as_comparable();
        if actual.trim() != expected_str {
            mismatches.push(FieldMismatch {
                selector: selector.clone(),
                expected: truncated(&expected_str, 50),
                actual: truncated(actual.trim(), 50),
            });
        }
    }

    mismatches
}

fn truncated(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

pub const SERIALIZE_FIELDS_JS: &str = r#"
() => {
    const result = {};

    function getSelector(el) {
        if (el.id) return `#${CSS.escape(el.id)}`;
        if (el.name) {
            const tag = el.tagName.toLowerCase();
            const matches = document.querySelectorAll(`${tag}[name="${el.name}"]`);
            if (matches.length === 1) return `${tag}[name="${CSS.escape(el.name)}"]`;
            const idx = Array.from(matches).indexOf(el);
            return `${tag}[name="${CSS.escape(el.name)}"]:nth-of-type(${idx + 1})`;
        }
        const tag = el.tagName.toLowerCase();
        const siblings = Array.from(el.parentElement
            ? el.parentElement.querySelectorAll(tag)
            : document.querySelectorAll(tag));
        const idx = siblings.indexOf(el);
        return idx >= 0 ? `${tag}:nth-of-type(${idx + 1})` : tag;
    }

    document.querySelectorAll('input, textarea, select').forEach(el => {
        const type = (el.type || '').toLowerCase();
        if (type === 'hidden' || type === 'submit' || type === 'button' || type === 'image') return;
        const ref = getSelector(el);
        if (!ref) return;

        if (type === 'checkbox' || type === 'radio') {
            result[ref] = el.checked;
        } else if (type === 'file') {
            result[ref] = el.getAttribute('data-filled-path') || '';
        } else {
            result[ref] = el.value || '';
        }
    });

    return result;
}
"#;

pub const FIELD_TAG_JS: &str = r#"
(ref) => {
    const el = document.querySelector(ref);
    return el ? el.tagName.toLowerCase() : null;
}
"#;

pub const FIELD_TYPE_JS: &str = r#"
(ref) => {
    const el = document.querySelector(ref);
    return el ? (el.type || 'text').toLowerCase() : 'text';
}
"#;

pub const FIELD_VALUE_JS: &str = r#"
(ref) => {
    const el = document.querySelector(ref);
    if (!el) return null;
    const type = (el.type || '').toLowerCase();
    if (type === 'checkbox' || type === 'radio') return el.checked;
    if (type === 'file') return el.getAttribute('data-filled-path') || '';
    return el.value || '';
}
"#;
