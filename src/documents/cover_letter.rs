use crate::documents::CvDocument;
use crate::error::AppError;
use crate::llm::LlmClient;
use crate::prompts;

const MAX_WORDS: usize = 300;

/// Generate a formal Spanish cover letter tailored to the posting. The
/// caller treats a failure as non-fatal.
pub async fn generate_cover_letter(
    llm: &dyn LlmClient,
    company: &str,
    job_title: &str,
    job_description: &str,
    cv: &CvDocument,
) -> Result<String, AppError> {
    let company = if company.is_empty() { "la empresa" } else { company };
    let description: String = job_description.chars().take(1000).collect();
    let description = if description.is_empty() {
        "(sin descripción)".to_string()
    } else {
        description
    };

    let skills = cv
        .skills
        .iter()
        .take(10)
        .cloned()
        .collect::<Vec<_>>()
        .join(", ");
    let experience_summary = cv
        .experience
        .first()
        .map(|e| format!("{} en {}", e.title, e.company))
        .unwrap_or_default();

    let prompt = prompts::cover_letter(
        company,
        job_title,
        &description,
        &cv.name,
        &skills,
        &experience_summary,
    );

    let result = llm.generate_json(&prompt, 0.4).await?;
    let letter = result
        .get("letter")
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .trim()
        .to_string();

    if letter.is_empty() {
        return Err(AppError::Llm("empty cover letter response".to_string()));
    }
    Ok(cap_words(&letter, MAX_WORDS))
}

fn cap_words(text: &str, max_words: usize) -> String {
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.len() <= max_words {
        text.to_string()
    } else {
        words[..max_words].join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_letters_pass_through_untouched() {
        let text = "Estimados señores,\n\nLes escribo con interés.";
        assert_eq!(cap_words(text, 300), text);
    }

    #[test]
    fn long_letters_are_capped() {
        let text = "palabra ".repeat(400);
        let capped = cap_words(&text, 300);
        assert_eq!(capped.split_whitespace().count(), 300);
    }
}
