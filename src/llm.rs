use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};

use crate::error::AppError;

/// The only surface the orchestration sees of the model backend.
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn generate_json(&self, prompt: &str, temperature: f32) -> Result<Value, AppError>;
}

/// Ollama-backed client. Long calls get a 120 s default timeout and at most
/// one automatic retry after a backend restart.
pub struct OllamaClient {
    http: reqwest::Client,
    host: String,
    model: String,
}

impl OllamaClient {
    pub fn new(host: &str, model: &str, timeout_secs: u64) -> Result<Self, AppError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self {
            http,
            host: host.trim_end_matches('/').to_string(),
            model: model.to_string(),
        })
    }

    pub async fn health_check(&self) -> bool {
        let url = format!("{}/api/tags", self.host);
        match self.http.get(&url).timeout(Duration::from_secs(5)).send().await {
            Ok(resp) => resp.status().is_success(),
            Err(_) => false,
        }
    }

    async fn generate(&self, prompt: &str, temperature: f32) -> Result<String, AppError> {
        let payload = json!({
            "model": self.model,
            "prompt": prompt,
            "stream": false,
            "format": "json",
            "options": { "temperature": temperature },
        });
        let url = format!("{}/api/generate", self.host);

        for attempt in 0..2 {
            match self.http.post(&url).json(&payload).send().await {
                Ok(resp) => {
                    let resp = resp
                        .error_for_status()
                        .map_err(|e| AppError::Llm(format!("ollama returned {e}")))?;
                    let data: Value = resp
                        .json()
                        .await
                        .map_err(|e| AppError::Llm(format!("invalid ollama response: {e}")))?;
                    return Ok(data
                        .get("response")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string());
                }
                Err(e) if e.is_timeout() && attempt == 0 => {
                    tracing::warn!(model = %self.model, "ollama timed out, restarting backend");
                    self.restart_backend().await;
                }
                Err(e) => return Err(AppError::Llm(format!("ollama request failed: {e}"))),
            }
        }
        Err(AppError::Llm("ollama retries exhausted".to_string()))
    }

    /// Last-resort recovery for a hung local backend: kill and respawn
    /// `ollama serve`, then give it a moment to come up.
    async fn restart_backend(&self) {
        let _ = tokio::process::Command::new("pkill")
            .args(["-f", "ollama serve"])
            .output()
            .await;
        tokio::time::sleep(Duration::from_secs(2)).await;
        match tokio::process::Command::new("ollama")
            .arg("serve")
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .spawn()
        {
            Ok(_) => {
                tokio::time::sleep(Duration::from_secs(5)).await;
                tracing::info!("ollama backend restarted");
            }
            Err(e) => tracing::error!("ollama restart failed: {e}"),
        }
    }
}

#[async_trait]
impl LlmClient for OllamaClient {
    async fn generate_json(&self, prompt: &str, temperature: f32) -> Result<Value, AppError> {
        let raw = self.generate(prompt, temperature).await?;
        extract_json_object(&raw)
            .ok_or_else(|| AppError::Llm(format!("no JSON object in response: {}", truncate(&raw, 200))))
    }
}

/// Models occasionally wrap the object in prose; take the outermost braces.
fn extract_json_object(raw: &str) -> Option<Value> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    if end < start {
        return None;
    }
    serde_json::from_str(&raw[start..=end]).ok()
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_object_from_prose_wrapped_response() {
        let raw = "Sure! Here is the JSON:\n{\"summary\": \"hola\"}\nDone.";
        let value = extract_json_object(raw).expect("object");
        assert_eq!(value["summary"], "hola");
    }

    #[test]
    fn rejects_response_without_object() {
        assert!(extract_json_object("no json here").is_none());
        assert!(extract_json_object("} backwards {").is_none());
    }
}
