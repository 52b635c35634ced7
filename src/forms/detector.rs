use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::AppError;
use crate::forms::page::Page;

/// Normalised field classification. Exotic input types collapse into this
/// closed set before any fill logic runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    Text,
    Email,
    Tel,
    Number,
    Date,
    Range,
    File,
    Radio,
    Checkbox,
    Textarea,
    Select,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectOption {
    pub value: String,
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormField {
    pub tag: String,
    #[serde(rename = "type")]
    pub kind: FieldKind,
    pub name: String,
    pub label: String,
    pub required: bool,
    #[serde(default)]
    pub options: Vec<SelectOption>,
    #[serde(rename = "ref")]
    pub selector: String,
    pub visible: bool,
    #[serde(default)]
    pub value: String,
}

/// Enumerate and classify every interactive field on the current page.
pub async fn detect_fields(page: &dyn Page) -> Result<Vec<FormField>, AppError> {
    let raw = page.evaluate(DETECT_FIELDS_JS, Value::Null).await?;
    let fields: Vec<FormField> = serde_json::from_value(raw)
        .map_err(|e| AppError::Browser(format!("field detection returned bad shape: {e}")))?;
    tracing::info!(field_count = fields.len(), url = %page.url(), "form fields detected");
    Ok(fields)
}

// Label resolution order: aria-label → aria-labelledby → <label for> →
// wrapping <label> minus the value → placeholder → nearest preceding
// sibling under 80 chars (3 hops) → name/id. Ref prefers #id, then
// tag[name=..] with :nth-of-type only when the name is ambiguous.
pub const DETECT_FIELDS_JS: &str = r#"
() => {
    const fields = [];
    const seen = new Set();

    function getLabel(el) {
        const ariaLabel = el.getAttribute('aria-label');
        if (ariaLabel && ariaLabel.trim()) return ariaLabel.trim();

        const labelledById = el.getAttribute('aria-labelledby');
        if (labelledById) {
            const labelEl = document.getElementById(labelledById);
            if (labelEl) return labelEl.textContent.trim();
        }

        if (el.id) {
            const labelEl = document.querySelector(`label[for="${el.id}"]`);
            if (labelEl) return labelEl.textContent.trim();
        }

        const parentLabel = el.closest('label');
        if (parentLabel) {
            const text = parentLabel.textContent.replace(el.value || '', '').trim();
            if (text) return text;
        }

        const placeholder = el.getAttribute('placeholder');
        if (placeholder && placeholder.trim()) return placeholder.trim();

        let prev = el.previousElementSibling;
        for (let i = 0; i < 3 && prev; i++) {
            const text = prev.textContent.trim();
            if (text && text.length < 80) return text;
            prev = prev.previousElementSibling;
        }

        return el.name || el.id || '';
    }

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

    function isVisible(el) {
        const style = window.getComputedStyle(el);
        if (style.display === 'none' || style.visibility === 'hidden') return false;
        if (parseFloat(style.opacity) === 0) return false;
        const rect = el.getBoundingClientRect();
        return rect.width > 0 && rect.height > 0;
    }

    function normaliseType(type) {
        switch (type) {
            case 'email': return 'email';
            case 'tel': return 'tel';
            case 'number': return 'number';
            case 'date': case 'month': case 'week': case 'time':
            case 'datetime-local': return 'date';
            case 'range': return 'range';
            case 'file': return 'file';
            case 'radio': return 'radio';
            case 'checkbox': return 'checkbox';
            default: return 'text';
        }
    }

    document.querySelectorAll('input').forEach(el => {
        const type = (el.type || 'text').toLowerCase();
        if (type === 'hidden' || type === 'submit' || type === 'button' || type === 'image') return;
        const ref = getSelector(el);
        if (seen.has(ref)) return;
        seen.add(ref);
        fields.push({
            tag: 'input',
            type: normaliseType(type),
            name: el.name || el.id || '',
            label: getLabel(el),
            required: el.required || el.getAttribute('aria-required') === 'true',
            options: [],
            ref: ref,
            visible: isVisible(el),
            value: type !== 'password' ? (el.value || '') : '',
        });
    });

    document.querySelectorAll('textarea').forEach(el => {
        const ref = getSelector(el);
        if (seen.has(ref)) return;
        seen.add(ref);
        fields.push({
            tag: 'textarea',
            type: 'textarea',
            name: el.name || el.id || '',
            label: getLabel(el),
            required: el.required || el.getAttribute('aria-required') === 'true',
            options: [],
            ref: ref,
            visible: isVisible(el),
            value: el.value || '',
        });
    });

    document.querySelectorAll('select').forEach(el => {
        const ref = getSelector(el);
        if (seen.has(ref)) return;
        seen.add(ref);
        const options = Array.from(el.options)
            .filter(opt => opt.value !== '')
            .map(opt => ({ value: opt.value, text: opt.text.trim() }));
        fields.push({
            tag: 'select',
            type: 'select',
            name: el.name || el.id || '',
            label: getLabel(el),
            required: el.required || el.getAttribute('aria-required') === 'true',
            options: options,
            ref: ref,
            visible: isVisible(el),
            value: el.value || '',
        });
    });

    return fields;
}
"#;
