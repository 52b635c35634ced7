mod common;

use std::time::Duration;

use jobbot::documents::CvDocument;
use jobbot::forms::confirm::{ConfirmationSignal, detect_confirmation};
use jobbot::forms::detector::detect_fields;
use jobbot::forms::filler::{FillData, fill_form};
use jobbot::forms::snapshot::{refill_fast, serialize_fields, take_snapshot};
use jobbot::forms::FieldValue;

use common::{SimField, SimPage, SimPageState};

fn application_form() -> Vec<SimField> {
    vec![
        SimField::input("#name", "text", "name", "Nombre completo"),
        SimField::input("#email", "email", "email", "Correo electrónico"),
        SimField::input("#phone", "tel", "phone", "Teléfono"),
        SimField::textarea("#letter", "motivation", "Carta de presentación"),
        SimField::select(
            "#availability",
            "availability",
            "Disponibilidad",
            &[("1", "Inmediata"), ("2", "En un mes")],
        ),
        SimField::input("#terms", "checkbox", "accept_terms", "Acepto los términos si"),
    ]
}

fn cv() -> CvDocument {
    CvDocument {
        name: "Ana Ruiz".to_string(),
        email: "ana@example.com".to_string(),
        phone: "+34 600 000 000".to_string(),
        summary: Some("Desarrolladora frontend.".to_string()),
        ..Default::default()
    }
}

#[tokio::test(start_paused = true)]
async fn detect_fill_snapshot_replay_round_trips() {
    let mut state = SimPageState::with_url("https://example.com/apply");
    state.fields = application_form();
    let page = SimPage::new(state);

    let fields = detect_fields(&page).await.expect("detect");
    assert_eq!(fields.len(), 6);

    let document = cv();
    let data = FillData {
        cv: &document,
        cover_letter: Some("Estimados señores, me dirijo a ustedes."),
        cv_pdf_path: None,
    };
    let written = fill_form(&page, &fields, &data).await.expect("fill");
    assert!(written.contains_key("#name"));
    assert!(written.contains_key("#email"));
    assert!(written.contains_key("#letter"));
    assert_eq!(
        written.get("#availability"),
        Some(&FieldValue::Text("1".to_string()))
    );

    let dir = tempfile::tempdir().expect("tempdir");
    let snapshot = take_snapshot(&page, &dir.path().join("form.png"))
        .await
        .expect("snapshot");
    assert_eq!(snapshot.url, "https://example.com/apply");
    assert_eq!(
        snapshot.fields.get("#email"),
        Some(&FieldValue::Text("ana@example.com".to_string()))
    );

    // Replay into a pristine copy of the same form.
    let mut fresh = SimPageState::with_url("https://example.com/apply");
    fresh.fields = application_form();
    let replay_page = SimPage::new(fresh);

    refill_fast(&replay_page, &snapshot.fields).await;
    let after_replay = serialize_fields(&replay_page).await.expect("serialize");
    assert_eq!(after_replay, snapshot.fields, "replayed reads equal the snapshot");
}

#[tokio::test(start_paused = true)]
async fn replay_tolerates_selectors_that_disappeared() {
    let mut state = SimPageState::with_url("https://example.com/apply");
    state.fields = vec![SimField::input("#email", "email", "email", "Email")];
    let page = SimPage::new(state);

    let mut fields = jobbot::forms::SnapshotFields::new();
    fields.insert("#email".to_string(), FieldValue::Text("ana@example.com".to_string()));
    fields.insert("#gone".to_string(), FieldValue::Text("lost".to_string()));

    let filled = refill_fast(&page, &fields).await;
    assert_eq!(filled, 1);
}

#[tokio::test(start_paused = true)]
async fn url_change_wins_over_success_and_error_text() {
    // After submit the URL moves and the new page says both "gracias" and a
    // lone non-critical "error": the URL check runs first per tick.
    let state = SimPageState {
        urls: vec![
            "https://example.com/apply".to_string(),
            "https://example.com/thanks".to_string(),
        ],
        texts: vec!["gracias por tu solicitud. si ves un error, contáctanos".to_string()],
        form_counts: vec![1],
        ..Default::default()
    };
    let page = SimPage::new(state);

    let dir = tempfile::tempdir().expect("tempdir");
    let result = detect_confirmation(&page, dir.path(), Duration::from_secs(10)).await;
    assert!(result.confirmed);
    assert_eq!(result.signal, ConfirmationSignal::UrlChange);
}

#[tokio::test(start_paused = true)]
async fn url_change_onto_an_error_page_is_a_failure() {
    let state = SimPageState {
        urls: vec![
            "https://example.com/apply".to_string(),
            "https://example.com/apply?retry=1".to_string(),
        ],
        texts: vec!["submission failed".to_string()],
        form_counts: vec![1],
        ..Default::default()
    };
    let page = SimPage::new(state);

    let dir = tempfile::tempdir().expect("tempdir");
    let result = detect_confirmation(&page, dir.path(), Duration::from_secs(10)).await;
    assert!(!result.confirmed);
    assert_eq!(result.signal, ConfirmationSignal::ErrorDetected);
}

#[tokio::test(start_paused = true)]
async fn success_text_confirms_without_url_change() {
    let state = SimPageState {
        urls: vec!["https://example.com/apply".to_string()],
        texts: vec!["hemos recibido tu candidatura".to_string()],
        form_counts: vec![1],
        ..Default::default()
    };
    let page = SimPage::new(state);

    let dir = tempfile::tempdir().expect("tempdir");
    let result = detect_confirmation(&page, dir.path(), Duration::from_secs(10)).await;
    assert!(result.confirmed);
    assert_eq!(result.signal, ConfirmationSignal::SuccessText);
}

#[tokio::test(start_paused = true)]
async fn form_disappearance_confirms() {
    let state = SimPageState {
        urls: vec!["https://example.com/apply".to_string()],
        texts: vec![String::new()],
        form_counts: vec![1, 0],
        ..Default::default()
    };
    let page = SimPage::new(state);

    let dir = tempfile::tempdir().expect("tempdir");
    let result = detect_confirmation(&page, dir.path(), Duration::from_secs(10)).await;
    assert!(result.confirmed);
    assert_eq!(result.signal, ConfirmationSignal::FormGone);
}

#[tokio::test(start_paused = true)]
async fn silence_until_the_deadline_is_ambiguous() {
    let state = SimPageState {
        urls: vec!["https://example.com/apply".to_string()],
        texts: vec!["rellena el formulario".to_string()],
        form_counts: vec![1],
        ..Default::default()
    };
    let page = SimPage::new(state);

    let dir = tempfile::tempdir().expect("tempdir");
    let result = detect_confirmation(&page, dir.path(), Duration::from_secs(3)).await;
    assert!(!result.confirmed);
    assert_eq!(result.signal, ConfirmationSignal::SubmittedAmbiguous);
    assert!(result.screenshot_path.expect("screenshot").ends_with("confirmation.png"));
}
