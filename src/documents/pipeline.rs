//! Orchestrates canonical-parse → structural rewrite → AI rewrite →
//! validation → summary → quality score → PDF render for one application.
//! The driver is stateless; every step runs against external capabilities.

use std::path::PathBuf;
use std::sync::Arc;

use serde_json::json;
use sqlx::SqlitePool;

use crate::documents::pdf::PdfRenderer;
use crate::documents::{CvDocument, cover_letter, profiles, quality, validator};
use crate::error::AppError;
use crate::events::{EventBus, Topic};
use crate::llm::LlmClient;
use crate::models::application::{Application, ApplicationPatch, ApplicationStatus};
use crate::models::posting::Posting;
use crate::prompts;

#[derive(Debug)]
pub struct PipelineOutcome {
    pub passed: bool,
    pub quality_score: Option<f64>,
    pub pdf_path: Option<PathBuf>,
    pub errors: Vec<String>,
}

pub struct DocumentPipeline {
    pool: SqlitePool,
    bus: Arc<EventBus>,
    llm: Arc<dyn LlmClient>,
    renderer: Arc<dyn PdfRenderer>,
    rewrite_temperature: f32,
    summary_temperature: f32,
    quality_minimum: f64,
}

impl DocumentPipeline {
    pub fn new(
        pool: SqlitePool,
        bus: Arc<EventBus>,
        llm: Arc<dyn LlmClient>,
        renderer: Arc<dyn PdfRenderer>,
        rewrite_temperature: f32,
        summary_temperature: f32,
        quality_minimum: f64,
    ) -> Self {
        Self {
            pool,
            bus,
            llm,
            renderer,
            rewrite_temperature,
            summary_temperature,
            quality_minimum,
        }
    }

    pub async fn run(&self, application_id: i64) -> Result<PipelineOutcome, AppError> {
        let app = Application::get(&self.pool, application_id).await?;
        let posting = Posting::get(&self.pool, app.posting_id).await?;
        let canonical = app
            .cv_canonical
            .as_ref()
            .map(|j| j.0.clone())
            .ok_or_else(|| {
                AppError::BadRequest(format!(
                    "Application {application_id} has no canonical CV"
                ))
            })?;
        let profile = app.cv_profile.clone();

        self.bus.emit(
            Topic::CvGenerationStarted,
            json!({ "application_id": application_id, "profile": profile }),
        );
        Application::transition(
            &self.pool,
            application_id,
            ApplicationStatus::CvGenerating,
            "cv_adapter",
            None,
            ApplicationPatch::default(),
        )
        .await?;

        let job_description = posting
            .description
            .clone()
            .unwrap_or_else(|| posting.title.clone());

        // Step 1: rule-based reframe, no model involved.
        let mut adapted = structural_transform(&canonical, &profile);
        tracing::info!(application_id, profile = %profile, "structural transform done");

        // Step 2: AI experience rewrite. A failure leaves step 1's output.
        self.ai_rewrite_experience(&mut adapted, &profile).await;

        // Step 3: hard validation gate.
        let report =
            validator::validate_cv(&canonical, &adapted, &job_description, &*self.llm).await;
        if !report.passed() {
            tracing::error!(application_id, errors = ?report.errors, "cv validation failed");
            Application::transition(
                &self.pool,
                application_id,
                ApplicationStatus::CvFailedValidation,
                "cv_adapter",
                Some(&report.errors.join("; ")),
                ApplicationPatch::default(),
            )
            .await?;
            self.bus.emit(
                Topic::CvGenerationError,
                json!({ "application_id": application_id, "errors": report.errors }),
            );
            return Ok(PipelineOutcome {
                passed: false,
                quality_score: None,
                pdf_path: None,
                errors: report.errors,
            });
        }

        // Step 4: AI summary, also non-fatal.
        self.ai_generate_summary(&mut adapted, &posting.company, &posting.title)
            .await;

        // Step 5: rubric score. Recorded, never blocking.
        let rubric =
            quality::score_cv(&*self.llm, &adapted, &job_description, self.quality_minimum).await;

        // Supplementary: Spanish cover letter for the form filler.
        let letter = match cover_letter::generate_cover_letter(
            &*self.llm,
            &posting.company,
            &posting.title,
            &job_description,
            &adapted,
        )
        .await
        {
            Ok(letter) => Some(letter),
            Err(e) => {
                tracing::warn!(application_id, "cover letter generation failed: {e}");
                None
            }
        };

        let quality_score = rubric.overall;
        Application::transition(
            &self.pool,
            application_id,
            ApplicationStatus::CvReady,
            "cv_adapter",
            None,
            ApplicationPatch {
                cv_adapted: Some(adapted.clone()),
                quality_score: Some(quality_score),
                quality_rubric: serde_json::to_value(&rubric).ok(),
                cover_letter_text: letter,
                ..Default::default()
            },
        )
        .await?;

        // Step 6: render the PDF and record its path.
        let pdf_path = self
            .renderer
            .render(application_id, &adapted, &profile)
            .await?;
        Application::set_pdf_path(&self.pool, application_id, &pdf_path).await?;

        self.bus.emit(
            Topic::CvGenerationComplete,
            json!({
                "application_id": application_id,
                "quality_score": quality_score,
                "pdf_path": pdf_path.display().to_string(),
            }),
        );

        Ok(PipelineOutcome {
            passed: true,
            quality_score: Some(quality_score),
            pdf_path: Some(pdf_path),
            errors: Vec::new(),
        })
    }

    async fn ai_rewrite_experience(&self, adapted: &mut CvDocument, profile: &str) {
        let role_context = profiles::reframe_for(profile)
            .map(|r| r.role_context)
            .unwrap_or(profile);
        let experience_json = serde_json::to_string(&adapted.experience).unwrap_or_default();
        let skills = adapted
            .skills
            .iter()
            .take(15)
            .cloned()
            .collect::<Vec<_>>()
            .join(", ");

        let prompt = prompts::cv_rewrite_experience(role_context, &experience_json, &skills);
        match self.llm.generate_json(&prompt, self.rewrite_temperature).await {
            Ok(result) => {
                if let Some(experience) = result.get("experience").and_then(|v| v.as_array())
                    && let Ok(entries) = serde_json::from_value(serde_json::Value::Array(
                        experience.clone(),
                    ))
                {
                    adapted.experience = entries;
                    tracing::info!(entry_count = adapted.experience.len(), "experience rewritten");
                }
                if let Some(section) = result.get("skills_section").and_then(|v| v.as_str()) {
                    adapted.skills_section_text = Some(section.to_string());
                }
            }
            Err(e) => {
                tracing::warn!(profile, "experience rewrite failed, keeping structural output: {e}");
            }
        }
    }

    async fn ai_generate_summary(&self, adapted: &mut CvDocument, company: &str, job_title: &str) {
        let skills = adapted
            .skills
            .iter()
            .take(10)
            .cloned()
            .collect::<Vec<_>>()
            .join(", ");
        let experience_summary = adapted
            .experience
            .first()
            .map(|e| e.title.clone())
            .unwrap_or_default();

        let prompt = prompts::cv_generate_summary(
            company,
            job_title,
            &adapted.name,
            &skills,
            &experience_summary,
        );
        match self.llm.generate_json(&prompt, self.summary_temperature).await {
            Ok(result) => match result.get("summary").and_then(|v| v.as_str()) {
                Some(summary) if !summary.is_empty() => {
                    adapted.summary = Some(summary.to_string());
                }
                _ => tracing::warn!("summary response was empty"),
            },
            Err(e) => {
                tracing::warn!("summary generation failed, keeping existing summary: {e}");
            }
        }
    }
}

/// Rule-based reframe: no omissions, only recontextualization. Title-map
/// substitutions run over every bullet; profile-emphasised skills move to
/// the front without reordering the rest.
pub fn structural_transform(canonical: &CvDocument, profile: &str) -> CvDocument {
    let mut adapted = canonical.clone();
    let Some(reframe) = profiles::reframe_for(profile) else {
        return adapted;
    };

    for exp in &mut adapted.experience {
        for bullet in &mut exp.bullets {
            for (original, replacement) in reframe.title_map {
                *bullet = bullet.replace(original, replacement);
            }
        }
    }

    let (emphasized, others): (Vec<String>, Vec<String>) =
        adapted.skills.iter().cloned().partition(|skill| {
            reframe
                .skills_emphasis
                .iter()
                .any(|e| skill.to_lowercase().contains(&e.to_lowercase()))
        });
    adapted.skills = emphasized.into_iter().chain(others).collect();

    adapted
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::documents::ExperienceEntry;

    fn canonical() -> CvDocument {
        CvDocument {
            name: "Ana Ruiz".to_string(),
            email: "ana@example.com".to_string(),
            phone: "+34 600 000 000".to_string(),
            skills: vec![
                "React".to_string(),
                "cash handling".to_string(),
                "PostgreSQL".to_string(),
                "customer service".to_string(),
            ],
            experience: vec![ExperienceEntry {
                company: "Flowence".to_string(),
                title: "Desarrolladora".to_string(),
                start_date: "2021".to_string(),
                end_date: "2024".to_string(),
                bullets: vec![
                    "Construí Flowence desde cero".to_string(),
                    "Mantuve el software de facturación".to_string(),
                ],
            }],
            ..Default::default()
        }
    }

    #[test]
    fn title_map_rewrites_bullets_without_dropping_any() {
        let adapted = structural_transform(&canonical(), "cashier");
        let bullets = &adapted.experience[0].bullets;
        assert_eq!(bullets.len(), 2);
        assert!(bullets[0].contains("retail customer service platform"));
        assert!(bullets[1].contains("business application"));
    }

    #[test]
    fn emphasised_skills_move_to_the_front() {
        let adapted = structural_transform(&canonical(), "cashier");
        assert_eq!(
            adapted.skills,
            vec![
                "cash handling".to_string(),
                "customer service".to_string(),
                "React".to_string(),
                "PostgreSQL".to_string(),
            ]
        );
    }

    #[test]
    fn unknown_profile_is_a_no_op() {
        let adapted = structural_transform(&canonical(), "astronaut");
        assert_eq!(adapted, canonical());
    }

    #[test]
    fn developer_profiles_keep_technical_skills_first() {
        let adapted = structural_transform(&canonical(), "fullstack_dev");
        assert_eq!(adapted.skills[0], "React");
        assert_eq!(adapted.skills[1], "PostgreSQL");
    }
}
