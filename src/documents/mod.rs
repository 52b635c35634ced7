//! CV documents and the adaptation pipeline that turns a canonical CV into
//! a posting-specific one.

pub mod cover_letter;
pub mod pdf;
pub mod pipeline;
pub mod profiles;
pub mod quality;
pub mod validator;

use serde::{Deserialize, Serialize};

pub use pdf::{CommandRenderer, PdfRenderer};
pub use pipeline::{DocumentPipeline, PipelineOutcome};
pub use profiles::{ProfileReframe, reframe_for};
pub use quality::QualityRubric;
pub use validator::ValidationReport;

/// Structured CV. The canonical document is parsed once per profile; the
/// adapted document is what the pipeline produces per application.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CvDocument {
    pub name: String,
    pub email: String,
    pub phone: String,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub linkedin: Option<String>,
    #[serde(default)]
    pub github: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub skills: Vec<String>,
    #[serde(default)]
    pub skills_section_text: Option<String>,
    #[serde(default)]
    pub experience: Vec<ExperienceEntry>,
    #[serde(default)]
    pub education: Vec<EducationEntry>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExperienceEntry {
    pub company: String,
    pub title: String,
    #[serde(default)]
    pub start_date: String,
    #[serde(default)]
    pub end_date: String,
    #[serde(default)]
    pub bullets: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EducationEntry {
    pub degree: String,
    pub institution: String,
    #[serde(default)]
    pub year: Option<String>,
}

impl CvDocument {
    /// Flatten to a text block for language detection and prompt building.
    pub fn to_plain_text(&self) -> String {
        let mut parts: Vec<String> = Vec::new();

        if !self.name.is_empty() {
            parts.push(self.name.clone());
        }
        if let Some(summary) = &self.summary {
            parts.push(summary.clone());
        }
        for exp in &self.experience {
            if !exp.title.is_empty() {
                parts.push(exp.title.clone());
            }
            if !exp.company.is_empty() {
                parts.push(exp.company.clone());
            }
            parts.extend(exp.bullets.iter().cloned());
        }
        for edu in &self.education {
            if !edu.degree.is_empty() {
                parts.push(edu.degree.clone());
            }
            if !edu.institution.is_empty() {
                parts.push(edu.institution.clone());
            }
        }
        if !self.skills.is_empty() {
            parts.push(self.skills.join(", "));
        }
        if let Some(text) = &self.skills_section_text {
            parts.push(text.clone());
        }

        parts.retain(|p| !p.is_empty());
        parts.join("\n")
    }
}
