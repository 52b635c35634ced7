//! Shared test doubles: an in-memory store, a scripted LLM, and a
//! simulated browser page that records the protocol's operations.
#![allow(dead_code)]

use std::path::Path;
use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{Value, json};
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

use jobbot::error::AppError;
use jobbot::forms::detector::DETECT_FIELDS_JS;
use jobbot::forms::filler::{SCROLL_FOCUS_JS, SET_RANGE_JS};
use jobbot::forms::page::{ElementInfo, Page, PageFactory, RouteAction, Wait};
use jobbot::forms::snapshot::{FIELD_TAG_JS, FIELD_TYPE_JS, FIELD_VALUE_JS, SERIALIZE_FIELDS_JS};
use jobbot::forms::confirm::{FORM_COUNT_JS, PAGE_TEXT_JS};
use jobbot::llm::LlmClient;
use jobbot::models::application::{Application, ApplicationPatch, ApplicationStatus};
use jobbot::models::posting::{NewPosting, PostingStatus};
use jobbot::scrapers::{RawPosting, ScrapeContext, SourceAdapter};

pub async fn test_pool() -> SqlitePool {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")
        .expect("options")
        .create_if_missing(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await
        .expect("pool");
    sqlx::migrate!("./migrations").run(&pool).await.expect("migrations");
    pool
}

pub fn sample_posting(source_id: &str, external_id: &str) -> NewPosting {
    NewPosting {
        source_id: source_id.to_string(),
        external_id: external_id.to_string(),
        url: format!("https://example.com/jobs/{external_id}"),
        title: "Frontend Developer React/Next.js".to_string(),
        company: "Acme".to_string(),
        location: Some("Madrid".to_string()),
        description: Some("40h semanales remoto".to_string()),
        salary_raw: Some("35.000€/año".to_string()),
        contract_type: Some("indefinido".to_string()),
        posted_at: None,
        status: PostingStatus::Scraped,
        cv_profile: Some("frontend_dev".to_string()),
        raw_data: None,
    }
}

/// Walk an application through the gate one status at a time.
pub async fn drive_to(pool: &SqlitePool, id: i64, chain: &[ApplicationStatus]) {
    for status in chain {
        Application::transition(pool, id, *status, "system", None, ApplicationPatch::default())
            .await
            .unwrap_or_else(|e| panic!("transition to {}: {e}", status.as_str()));
    }
}

// ---------------------------------------------------------------------------
// Scripted LLM
// ---------------------------------------------------------------------------

/// Returns canned responses keyed by prompt markers; everything unmatched
/// gets a benign default so non-fatal steps stay quiet.
pub struct MockLlm {
    pub fail_all: bool,
    pub fabrication: Value,
    pub rubric: Value,
}

impl Default for MockLlm {
    fn default() -> Self {
        Self {
            fail_all: false,
            fabrication: json!({ "has_fabrication": false, "fabricated_skills": [] }),
            rubric: json!({
                "ats_keyword_match": 8.0,
                "relevance": 8.0,
                "language_consistency": 9.0,
                "notes": "ok",
            }),
        }
    }
}

#[async_trait]
impl LlmClient for MockLlm {
    async fn generate_json(&self, prompt: &str, _temperature: f32) -> Result<Value, AppError> {
        if self.fail_all {
            return Err(AppError::Llm("mock backend down".to_string()));
        }
        if prompt.contains("has_fabrication") {
            return Ok(self.fabrication.clone());
        }
        if prompt.contains("ats_keyword_match") {
            return Ok(self.rubric.clone());
        }
        if prompt.contains("cartas de presentación") {
            return Ok(json!({ "letter": "Estimados señores, les escribo con gran interés." }));
        }
        if prompt.contains("resumen profesional") || prompt.contains("\"summary\"") {
            return Ok(json!({ "summary": "Profesional con experiencia relevante." }));
        }
        Ok(json!({}))
    }
}

// ---------------------------------------------------------------------------
// Simulated browser page
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct SimField {
    pub selector: String,
    pub tag: String,
    pub kind: String,
    pub name: String,
    pub label: String,
    pub required: bool,
    pub options: Vec<(String, String)>,
    pub visible: bool,
    pub value: String,
    pub checked: bool,
    pub filled_path: String,
}

impl SimField {
    pub fn input(selector: &str, kind: &str, name: &str, label: &str) -> Self {
        Self {
            selector: selector.to_string(),
            tag: "input".to_string(),
            kind: kind.to_string(),
            name: name.to_string(),
            label: label.to_string(),
            required: false,
            options: Vec::new(),
            visible: true,
            value: String::new(),
            checked: false,
            filled_path: String::new(),
        }
    }

    pub fn textarea(selector: &str, name: &str, label: &str) -> Self {
        Self {
            tag: "textarea".to_string(),
            kind: "textarea".to_string(),
            ..Self::input(selector, "textarea", name, label)
        }
    }

    pub fn select(selector: &str, name: &str, label: &str, options: &[(&str, &str)]) -> Self {
        Self {
            tag: "select".to_string(),
            kind: "select".to_string(),
            options: options
                .iter()
                .map(|(v, t)| (v.to_string(), t.to_string()))
                .collect(),
            ..Self::input(selector, "select", name, label)
        }
    }
}

#[derive(Debug, Default)]
pub struct SimPageState {
    pub urls: Vec<String>,
    pub url_reads: usize,
    pub texts: Vec<String>,
    pub text_reads: usize,
    pub form_counts: Vec<u64>,
    pub form_count_reads: usize,
    pub fields: Vec<SimField>,
    pub submit_selector: Option<String>,
    pub url_after_submit: Option<String>,
    pub text_after_submit: Option<String>,
    pub form_count_after_submit: Option<u64>,
    pub submit_clicked: bool,
    pub closed: bool,
    pub ops: Vec<String>,
}

impl SimPageState {
    pub fn with_url(url: &str) -> Self {
        Self {
            urls: vec![url.to_string()],
            texts: vec![String::new()],
            form_counts: vec![1],
            ..Default::default()
        }
    }
}

#[derive(Clone)]
pub struct SimPage(pub Arc<Mutex<SimPageState>>);

impl SimPage {
    pub fn new(state: SimPageState) -> Self {
        Self(Arc::new(Mutex::new(state)))
    }

    fn read_seq<'a, T: Clone>(seq: &'a [T], reads: &mut usize) -> Option<T> {
        let item = seq.get((*reads).min(seq.len().saturating_sub(1))).cloned();
        *reads += 1;
        item
    }

    fn field_mut<'a>(state: &'a mut SimPageState, selector: &str) -> Option<&'a mut SimField> {
        state.fields.iter_mut().find(|f| f.selector == selector)
    }
}

#[async_trait]
impl Page for SimPage {
    fn url(&self) -> String {
        let mut state = self.0.lock().expect("sim lock");
        let mut reads = state.url_reads;
        let url = Self::read_seq(&state.urls, &mut reads).unwrap_or_default();
        state.url_reads = reads;
        url
    }

    async fn goto(&self, url: &str, _wait: Wait, _timeout_secs: u64) -> Result<(), AppError> {
        let mut state = self.0.lock().expect("sim lock");
        state.urls = vec![url.to_string()];
        state.url_reads = 0;
        state.ops.push(format!("goto {url}"));
        Ok(())
    }

    async fn screenshot(&self, path: &Path, _full_page: bool) -> Result<(), AppError> {
        if let Some(parent) = path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        std::fs::write(path, b"png")
            .map_err(|e| AppError::Browser(format!("screenshot write failed: {e}")))?;
        self.0
            .lock()
            .expect("sim lock")
            .ops
            .push(format!("screenshot {}", path.display()));
        Ok(())
    }

    async fn fill(&self, selector: &str, value: &str) -> Result<(), AppError> {
        let mut state = self.0.lock().expect("sim lock");
        let field = Self::field_mut(&mut state, selector)
            .ok_or_else(|| AppError::Browser(format!("no element {selector}")))?;
        field.value = value.to_string();
        state.ops.push(format!("fill {selector}"));
        Ok(())
    }

    async fn click(&self, selector: &str) -> Result<(), AppError> {
        let mut state = self.0.lock().expect("sim lock");
        if state.submit_selector.as_deref() == Some(selector) {
            state.submit_clicked = true;
            if let Some(url) = state.url_after_submit.clone() {
                state.urls = vec![url];
                state.url_reads = 0;
            }
            if let Some(text) = state.text_after_submit.clone() {
                state.texts = vec![text];
                state.text_reads = 0;
            }
            if let Some(count) = state.form_count_after_submit {
                state.form_counts = vec![count];
                state.form_count_reads = 0;
            }
        } else if let Some(field) = Self::field_mut(&mut state, selector)
            && (field.kind == "checkbox" || field.kind == "radio")
        {
            field.checked = !field.checked;
        }
        state.ops.push(format!("click {selector}"));
        Ok(())
    }

    async fn type_text(
        &self,
        selector: &str,
        value: &str,
        _delay_ms: u64,
    ) -> Result<(), AppError> {
        let mut state = self.0.lock().expect("sim lock");
        let field = Self::field_mut(&mut state, selector)
            .ok_or_else(|| AppError::Browser(format!("no element {selector}")))?;
        field.value.push_str(value);
        state.ops.push(format!("type {selector}"));
        Ok(())
    }

    async fn select_option(&self, selector: &str, value: &str) -> Result<(), AppError> {
        let mut state = self.0.lock().expect("sim lock");
        let field = Self::field_mut(&mut state, selector)
            .ok_or_else(|| AppError::Browser(format!("no element {selector}")))?;
        field.value = value.to_string();
        state.ops.push(format!("select {selector}"));
        Ok(())
    }

    async fn set_input_files(&self, selector: &str, path: &Path) -> Result<(), AppError> {
        let mut state = self.0.lock().expect("sim lock");
        let field = Self::field_mut(&mut state, selector)
            .ok_or_else(|| AppError::Browser(format!("no element {selector}")))?;
        field.filled_path = path.display().to_string();
        state.ops.push(format!("set_input_files {selector}"));
        Ok(())
    }

    async fn is_checked(&self, selector: &str) -> Result<bool, AppError> {
        let mut state = self.0.lock().expect("sim lock");
        Ok(Self::field_mut(&mut state, selector)
            .map(|f| f.checked)
            .unwrap_or(false))
    }

    async fn evaluate(&self, script: &str, arg: Value) -> Result<Value, AppError> {
        let mut state = self.0.lock().expect("sim lock");

        if script == DETECT_FIELDS_JS {
            let fields: Vec<Value> = state
                .fields
                .iter()
                .map(|f| {
                    json!({
                        "tag": f.tag,
                        "type": f.kind,
                        "name": f.name,
                        "label": f.label,
                        "required": f.required,
                        "options": f.options.iter().map(|(v, t)| json!({"value": v, "text": t})).collect::<Vec<_>>(),
                        "ref": f.selector,
                        "visible": f.visible,
                        "value": f.value,
                    })
                })
                .collect();
            return Ok(Value::Array(fields));
        }

        if script == SERIALIZE_FIELDS_JS {
            let mut map = serde_json::Map::new();
            for f in &state.fields {
                let value = match f.kind.as_str() {
                    "checkbox" | "radio" => Value::Bool(f.checked),
                    "file" => Value::String(f.filled_path.clone()),
                    _ => Value::String(f.value.clone()),
                };
                map.insert(f.selector.clone(), value);
            }
            return Ok(Value::Object(map));
        }

        if script == FIELD_TAG_JS {
            let selector = arg.as_str().unwrap_or_default();
            return Ok(Self::field_mut(&mut state, selector)
                .map(|f| Value::String(f.tag.clone()))
                .unwrap_or(Value::Null));
        }

        if script == FIELD_TYPE_JS {
            let selector = arg.as_str().unwrap_or_default();
            return Ok(Self::field_mut(&mut state, selector)
                .map(|f| Value::String(f.kind.clone()))
                .unwrap_or_else(|| Value::String("text".to_string())));
        }

        if script == FIELD_VALUE_JS {
            let selector = arg.as_str().unwrap_or_default();
            return Ok(match Self::field_mut(&mut state, selector) {
                Some(f) => match f.kind.as_str() {
                    "checkbox" | "radio" => Value::Bool(f.checked),
                    "file" => Value::String(f.filled_path.clone()),
                    _ => Value::String(f.value.clone()),
                },
                None => Value::Null,
            });
        }

        if script == SCROLL_FOCUS_JS {
            return Ok(Value::Null);
        }

        if script == SET_RANGE_JS {
            let selector = arg
                .get("ref")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            let value = arg
                .get("value")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            if let Some(field) = Self::field_mut(&mut state, &selector) {
                field.value = value;
            }
            return Ok(Value::Null);
        }

        if script == PAGE_TEXT_JS {
            let mut reads = state.text_reads;
            let text = Self::read_seq(&state.texts, &mut reads).unwrap_or_default();
            state.text_reads = reads;
            return Ok(Value::String(text));
        }

        if script == FORM_COUNT_JS {
            let mut reads = state.form_count_reads;
            let count = Self::read_seq(&state.form_counts, &mut reads).unwrap_or(0);
            state.form_count_reads = reads;
            return Ok(json!(count));
        }

        Err(AppError::Browser(format!("unscripted evaluate: {script}")))
    }

    async fn query_selector(&self, selector: &str) -> Result<Option<ElementInfo>, AppError> {
        let mut state = self.0.lock().expect("sim lock");
        if state.submit_selector.as_deref() == Some(selector) {
            return Ok(Some(ElementInfo { visible: true }));
        }
        Ok(Self::field_mut(&mut state, selector).map(|f| ElementInfo { visible: f.visible }))
    }

    async fn scroll_into_view(&self, _selector: &str) -> Result<(), AppError> {
        Ok(())
    }

    async fn route(&self, _pattern: &str, _action: RouteAction) -> Result<(), AppError> {
        Ok(())
    }

    async fn unroute(&self, _pattern: &str) -> Result<(), AppError> {
        Ok(())
    }

    async fn close(&self) {
        self.0.lock().expect("sim lock").closed = true;
    }
}

/// Hands out pages that all share one underlying state so tests can set up
/// the form once and inspect it after the protocol ran.
pub struct SimPageFactory {
    pub state: Arc<Mutex<SimPageState>>,
}

impl SimPageFactory {
    pub fn new(state: SimPageState) -> Self {
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }
}

#[async_trait]
impl PageFactory for SimPageFactory {
    async fn open(&self) -> Result<Box<dyn Page>, AppError> {
        Ok(Box::new(SimPage(self.state.clone())))
    }
}

// ---------------------------------------------------------------------------
// Scripted source adapter
// ---------------------------------------------------------------------------

/// Yields a scripted batch per call and counts invocations.
pub struct ScriptedAdapter {
    pub tag: &'static str,
    pub batches: Vec<Vec<RawPosting>>,
    pub calls: AtomicUsize,
}

impl ScriptedAdapter {
    pub fn repeating(tag: &'static str, batch: Vec<RawPosting>) -> Self {
        Self {
            tag,
            batches: vec![batch],
            calls: AtomicUsize::new(0),
        }
    }

    pub fn sequence(tag: &'static str, batches: Vec<Vec<RawPosting>>) -> Self {
        Self {
            tag,
            batches,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SourceAdapter for ScriptedAdapter {
    fn source_id(&self) -> &'static str {
        self.tag
    }

    async fn scrape(&self, _cx: &ScrapeContext) -> Result<Vec<RawPosting>, AppError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        let index = call.min(self.batches.len().saturating_sub(1));
        Ok(self.batches.get(index).cloned().unwrap_or_default())
    }
}

pub fn raw_posting(external_id: &str, title: &str, salary_raw: &str) -> RawPosting {
    RawPosting {
        source_id: None,
        external_id: external_id.to_string(),
        url: format!("https://example.com/{external_id}"),
        title: title.to_string(),
        company: "Acme".to_string(),
        location: Some("Madrid".to_string()),
        description: Some("Jornada completa".to_string()),
        salary_raw: Some(salary_raw.to_string()),
        contract_type: Some("indefinido".to_string()),
        posted_at: None,
        cv_profile: None,
        raw_data: None,
    }
}

