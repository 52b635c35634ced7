//! Versioned prompt builders for every generation step. The orchestration
//! treats prompt content as data; callers only see `String`s.

pub const PROMPT_VERSION: &str = "1.0.0";

pub fn cv_rewrite_experience(role_context: &str, experience: &str, skills: &str) -> String {
    format!(
        "Eres un experto redactor de currículums en español especializado en adaptar \
perfiles técnicos para puestos en comercio minorista, logística y desarrollo de software. \
Reescribe los puntos de experiencia laboral del candidato para el puesto objetivo.\n\n\
PUESTO OBJETIVO: {role_context}\n\n\
EXPERIENCIA ACTUAL DEL CANDIDATO:\n{experience}\n\n\
HABILIDADES DEL CANDIDATO:\n{skills}\n\n\
INSTRUCCIONES ESTRICTAS:\n\
1. Reescribe TODOS los puntos en español formal y profesional.\n\
2. Enfatiza las habilidades transferibles relevantes para {role_context}.\n\
3. Usa verbos de acción en pasado (gestioné, coordiné, optimicé, implementé).\n\
4. NO inventes logros ni empresas. Recontextualiza los existentes.\n\
5. NO elimines ningún puesto ni empresa. Mantén todas las entradas.\n\
6. Mantén las fechas exactas tal como aparecen en la fuente.\n\
7. Cada punto debe tener máximo 20 palabras.\n\n\
Devuelve ÚNICAMENTE un objeto JSON con esta estructura exacta:\n\
{{\"experience\": [{{\"company\": \"...\", \"title\": \"...\", \"start_date\": \"...\", \
\"end_date\": \"...\", \"bullets\": [\"...\"]}}], \
\"skills_section\": \"habilidades separadas por comas, ordenadas por relevancia\"}}"
    )
}

pub fn cv_generate_summary(
    company: &str,
    job_title: &str,
    candidate_name: &str,
    skills: &str,
    experience_summary: &str,
) -> String {
    format!(
        "Eres un redactor profesional de currículums en español. Crea un resumen \
profesional breve y convincente para un candidato que solicita un puesto concreto.\n\n\
EMPRESA: {company}\n\
PUESTO SOLICITADO: {job_title}\n\
NOMBRE DEL CANDIDATO: {candidate_name}\n\
HABILIDADES PRINCIPALES: {skills}\n\
EXPERIENCIA MÁS RECIENTE: {experience_summary}\n\n\
INSTRUCCIONES:\n\
1. Escribe 2-3 frases en español formal, máximo 60 palabras.\n\
2. La primera frase presenta al candidato y su perfil principal.\n\
3. La segunda menciona explícitamente la empresa \"{company}\" y por qué encaja.\n\
4. NO uses frases genéricas como \"profesional dinámico\".\n\n\
Devuelve ÚNICAMENTE un objeto JSON: {{\"summary\": \"...\"}}"
    )
}

pub fn fabrication_detector(original_cv: &str, adapted_cv: &str) -> String {
    format!(
        "Compara el CV original con el CV adaptado y detecta si el adaptado contiene \
habilidades, tecnologías, títulos o logros que NO aparecen en el original.\n\n\
CV ORIGINAL:\n{original_cv}\n\n\
CV ADAPTADO:\n{adapted_cv}\n\n\
Reformulaciones y sinónimos del mismo contenido NO son fabricación. Solo cuenta \
contenido nuevo que el candidato no podría justificar en una entrevista.\n\n\
Devuelve ÚNICAMENTE un objeto JSON: \
{{\"has_fabrication\": true|false, \"fabricated_skills\": [\"...\"]}}"
    )
}

pub fn quality_rubric(job_description: &str, adapted_cv: &str) -> String {
    format!(
        "Evalúa este CV adaptado frente a la oferta de trabajo. Puntúa de 0 a 10 cada \
criterio.\n\n\
OFERTA:\n{job_description}\n\n\
CV ADAPTADO:\n{adapted_cv}\n\n\
CRITERIOS:\n\
- ats_keyword_match: cobertura de las palabras clave de la oferta.\n\
- relevance: ajuste de la experiencia al puesto.\n\
- language_consistency: idioma y registro coherentes con la oferta.\n\n\
Devuelve ÚNICAMENTE un objeto JSON: \
{{\"ats_keyword_match\": 0-10, \"relevance\": 0-10, \"language_consistency\": 0-10, \
\"notes\": \"...\"}}"
    )
}

pub fn cover_letter(
    company: &str,
    job_title: &str,
    job_description: &str,
    candidate_name: &str,
    skills: &str,
    experience_summary: &str,
) -> String {
    format!(
        "Eres un redactor profesional especializado en cartas de presentación en español \
para el mercado laboral español. Redacta una carta formal, personalizada y convincente.\n\n\
DATOS DEL PUESTO:\n\
- Empresa: {company}\n\
- Puesto: {job_title}\n\
- Descripción: {job_description}\n\n\
DATOS DEL CANDIDATO:\n\
- Nombre: {candidate_name}\n\
- Habilidades: {skills}\n\
- Experiencia reciente: {experience_summary}\n\n\
INSTRUCCIONES:\n\
1. Formato de carta comercial española: saludo, 2-3 párrafos, despedida.\n\
2. Máximo 300 palabras.\n\
3. Menciona la empresa y el puesto por su nombre.\n\
4. NO inventes experiencia ni logros.\n\n\
Devuelve ÚNICAMENTE un objeto JSON: {{\"letter\": \"...\"}}"
    )
}
