use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::AppError;
use crate::forms::page::Page;

/// Classified submission outcome, ordered by detection precedence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfirmationSignal {
    UrlChange,
    SuccessText,
    FormGone,
    ErrorDetected,
    SubmittedAmbiguous,
}

impl ConfirmationSignal {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConfirmationSignal::UrlChange => "url_change",
            ConfirmationSignal::SuccessText => "success_text",
            ConfirmationSignal::FormGone => "form_gone",
            ConfirmationSignal::ErrorDetected => "error_detected",
            ConfirmationSignal::SubmittedAmbiguous => "submitted_ambiguous",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Confirmation {
    pub confirmed: bool,
    pub signal: ConfirmationSignal,
    pub screenshot_path: Option<PathBuf>,
}

const SUCCESS_PATTERNS: &[&str] = &[
    "gracias",
    "solicitud recibida",
    "application submitted",
    "thank you",
    "hemos recibido",
    "confirmación",
    "confirmacion",
    "éxito",
    "exito",
    "your application",
    "tu solicitud",
    "candidatura recibida",
    "candidatura enviada",
    "successfully submitted",
    "sent successfully",
    "we have received",
    "su candidatura",
    "enhorabuena",
    "felicidades",
    "proceso de selección",
    "nos pondremos en contacto",
    "we will be in touch",
    "we'll be in touch",
    "review your application",
    "application complete",
    "solicitud completada",
    "inscripción realizada",
    "inscripcion realizada",
];

const ERROR_PATTERNS: &[&str] = &[
    "error",
    "inténtalo de nuevo",
    "intentalo de nuevo",
    "try again",
    "failed",
    "falló",
    "fallo",
    "something went wrong",
    "algo salió mal",
    "algo salio mal",
    "vuelve a intentar",
    "hubo un problema",
    "no se pudo",
    "could not submit",
    "submission failed",
    "por favor revisa",
    "please review",
    "invalid",
    "inválido",
    "invalido",
    "required field",
    "campo requerido",
    "campo obligatorio",
];

// A single hit on one of these is enough; any other error pattern needs a
// second distinct hit ("error" alone appears in too many benign contexts).
const CRITICAL_ERRORS: &[&str] = &["failed", "submission failed", "could not submit", "fallo"];

const CHECK_INTERVAL: Duration = Duration::from_millis(500);

/// Watch the page after the submit click and classify the outcome.
///
/// Per tick, in order: URL change (with an error re-check on the new page),
/// error text, success text, form disappearance. Timer expiry yields
/// `submitted_ambiguous`. The URL check running first each tick is a
/// documented invariant the tests pin down.
pub async fn detect_confirmation(
    page: &dyn Page,
    artifacts_dir: &Path,
    timeout: Duration,
) -> Confirmation {
    if let Err(e) = tokio::fs::create_dir_all(artifacts_dir).await {
        tracing::warn!("could not create artifacts dir: {e}");
    }

    let initial_screenshot = artifacts_dir.join("confirmation_start.png");
    if let Err(e) = page.screenshot(&initial_screenshot, true).await {
        tracing::warn!("initial confirmation screenshot failed: {e}");
    }

    let initial_url = page.url();
    let form_present_initially = form_exists(page).await;

    let mut result = Confirmation {
        confirmed: false,
        signal: ConfirmationSignal::SubmittedAmbiguous,
        screenshot_path: None,
    };

    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        tokio::time::sleep(CHECK_INTERVAL).await;

        let current_url = page.url();
        if current_url != initial_url {
            tracing::info!(from = %initial_url, to = %current_url, "url changed after submit");
            let text = page_text(page).await;
            if has_error_pattern(&text) {
                result.confirmed = false;
                result.signal = ConfirmationSignal::ErrorDetected;
            } else {
                result.confirmed = true;
                result.signal = ConfirmationSignal::UrlChange;
            }
            break;
        }

        let text = page_text(page).await;
        if has_error_pattern(&text) {
            tracing::warn!("error text found after submit");
            result.confirmed = false;
            result.signal = ConfirmationSignal::ErrorDetected;
            break;
        }
        if has_success_pattern(&text) {
            tracing::info!("success text found after submit");
            result.confirmed = true;
            result.signal = ConfirmationSignal::SuccessText;
            break;
        }

        if form_present_initially && !form_exists(page).await {
            tracing::info!("form disappeared after submit");
            result.confirmed = true;
            result.signal = ConfirmationSignal::FormGone;
            break;
        }
    }

    let final_screenshot = artifacts_dir.join("confirmation.png");
    match page.screenshot(&final_screenshot, true).await {
        Ok(()) => result.screenshot_path = Some(final_screenshot),
        Err(e) => {
            tracing::warn!("final confirmation screenshot failed: {e}");
            result.screenshot_path = Some(initial_screenshot);
        }
    }

    tracing::info!(
        confirmed = result.confirmed,
        signal = result.signal.as_str(),
        "confirmation classified"
    );
    result
}

async fn page_text(page: &dyn Page) -> String {
    match page.evaluate(PAGE_TEXT_JS, Value::Null).await {
        Ok(Value::String(text)) => text.to_lowercase(),
        _ => String::new(),
    }
}

async fn form_exists(page: &dyn Page) -> bool {
    match page.evaluate(FORM_COUNT_JS, Value::Null).await {
        Ok(count) => count.as_u64().unwrap_or(0) > 0,
        Err(_) => false,
    }
}

pub fn has_success_pattern(text: &str) -> bool {
    SUCCESS_PATTERNS.iter().any(|p| text.contains(p))
}

pub fn has_error_pattern(text: &str) -> bool {
    if CRITICAL_ERRORS.iter().any(|p| text.contains(p)) {
        return true;
    }
    ERROR_PATTERNS.iter().filter(|p| text.contains(*p)).count() >= 2
}

pub const PAGE_TEXT_JS: &str =
    "() => document.body ? document.body.innerText : ''";

pub const FORM_COUNT_JS: &str =
    "() => document.querySelectorAll('form').length";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_patterns_match_spanish_and_english() {
        assert!(has_success_pattern("¡gracias por tu candidatura!"));
        assert!(has_success_pattern("application submitted successfully"));
        assert!(!has_success_pattern("rellena el formulario"));
    }

    #[test]
    fn single_generic_error_hit_is_not_enough() {
        assert!(!has_error_pattern("si hay un error de red, recarga"));
    }

    #[test]
    fn critical_term_alone_is_an_error() {
        assert!(has_error_pattern("submission failed"));
        assert!(has_error_pattern("fallo en el servidor"));
    }

    #[test]
    fn two_distinct_patterns_are_an_error() {
        assert!(has_error_pattern("error: campo requerido"));
        assert!(has_error_pattern("invalid input, try again"));
    }

    #[test]
    fn success_and_single_error_text_is_not_an_error() {
        // The scenario behind url_change precedence: "gracias" + a lone
        // non-critical "error" mention must not read as a failure.
        let text = "gracias por tu solicitud. si ves un error, contáctanos";
        assert!(!has_error_pattern(text));
        assert!(has_success_pattern(text));
    }
}
