//! Visa eligibility filter for the "canje" (student stay → work authorization).
//!
//! A posting is skipped only when it *explicitly* declares a disqualifying
//! condition: a temporal contract, part-time hours, or a stated salary
//! entirely below the SMI. Ambiguity lets the posting through.

use std::sync::LazyLock;

use regex::Regex;

// SMI 2024-2025: €1,134/month × 14 pays = €15,876/year. Monthly figures are
// compared against the 14-pays monthly basis, annual figures against the
// annual one, so 12-pay vs 14-pay postings are compared like with like.
pub const SMI_MONTHLY_GROSS: f64 = 1_134.0;
pub const SMI_ANNUAL_GROSS: f64 = 15_876.0;

const TEMPORAL_KEYWORDS: &[&str] = &[
    "temporal",
    "por obra",
    "obra y servicio",
    "obra o servicio",
    "eventual",
    "interinidad",
    "interino",
    "interina",
    "sustitución",
    "sustitucion",
    "fijo discontinuo",
    "fijo-discontinuo",
    "fixed-term",
    "fixed term",
    "temporary contract",
    "contrato de duración determinada",
];

const PARTTIME_KEYWORDS: &[&str] = &[
    "media jornada",
    "medio jornada",
    "tiempo parcial",
    "part time",
    "part-time",
    "jornada parcial",
    "jornada reducida",
];

// "20 horas", "25h/semana", "30h semanales" — anything under 35h/week is
// treated as part-time.
static HOUR_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(\d{1,2})\s*(?:h(?:oras?)?|hrs?)(?:/semana|semanales|\s+semana|\s+semanales|/week)?\b",
    )
    .expect("hour pattern")
});

static SALARY_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(\d[\d.,]*)(?:\s*[-–]\s*(\d[\d.,]*))?\s*(?:€|eur(?:os?)?)?\s*/?\s*(mes(?:es)?|month|año|ano|anual(?:es)?|year|annual)?",
    )
    .expect("salary pattern")
});

static CURRENCY_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)€|eur").expect("currency marker"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SalaryPeriod {
    Monthly,
    Annual,
}

/// The posting fields the filter reads. Missing fields mean
/// "not mentioned", which never disqualifies.
#[derive(Debug, Default, Clone, Copy)]
pub struct PostingFacts<'a> {
    pub title: &'a str,
    pub description: &'a str,
    pub contract_type: &'a str,
    pub salary_raw: &'a str,
}

/// Returns `(true, None)` when the posting passes all checks, or
/// `(false, Some(reason))` on the first explicit disqualification.
pub fn is_eligible(facts: &PostingFacts<'_>) -> (bool, Option<String>) {
    let title = facts.title.to_lowercase();
    let description = facts.description.to_lowercase();
    let contract_raw = facts.contract_type.to_lowercase();
    let salary_raw = facts.salary_raw.to_lowercase();

    let full_text = format!(
        "{title} {} {description}",
        expand_contract_code(&contract_raw)
    );

    if let Some(kw) = find_keyword(&full_text, TEMPORAL_KEYWORDS) {
        return (false, Some(format!("temporal contract detected: '{kw}'")));
    }

    if let Some(kw) = find_keyword(&full_text, PARTTIME_KEYWORDS) {
        return (false, Some(format!("part-time detected: '{kw}'")));
    }

    if let Some(reason) = check_hours(&full_text) {
        return (false, Some(reason));
    }

    if let Some(reason) = check_salary(&salary_raw, &description) {
        return (false, Some(reason));
    }

    (true, None)
}

/// Map common contract-type short codes to full phrases so the keyword scan
/// catches them.
fn expand_contract_code(raw: &str) -> &str {
    match raw.trim() {
        "td" => "temporal",
        "ti" => "indefinido",
        "fp" => "formación profesional",
        "p" => "practicas",
        other => other,
    }
}

fn find_keyword<'k>(text: &str, keywords: &[&'k str]) -> Option<&'k str> {
    keywords.iter().copied().find(|kw| text.contains(kw))
}

fn check_hours(text: &str) -> Option<String> {
    for caps in HOUR_PATTERN.captures_iter(text) {
        let hours: u32 = caps[1].parse().ok()?;
        if hours < 35 {
            return Some(format!("part-time hours detected: {hours}h/week"));
        }
    }
    None
}

/// Parse salary figures from `salary_raw` (primary) or `description`
/// (fallback). Disqualifies only when at least one figure parsed and none
/// reaches its period's threshold.
fn check_salary(salary_raw: &str, description: &str) -> Option<String> {
    let text = if salary_raw.is_empty() {
        description
    } else {
        salary_raw
    };
    if text.is_empty() {
        return None;
    }

    let candidates = parse_salary_amounts(text);
    if candidates.is_empty() {
        return None;
    }

    let any_passing = candidates.iter().any(|(amount, period)| match period {
        SalaryPeriod::Annual => *amount >= SMI_ANNUAL_GROSS,
        SalaryPeriod::Monthly => *amount >= SMI_MONTHLY_GROSS,
    });
    if any_passing {
        return None;
    }

    // All below threshold — report the most informative candidate.
    let (best_amount, best_period) = candidates
        .iter()
        .cloned()
        .max_by(|a, b| a.0.total_cmp(&b.0))?;
    match best_period {
        SalaryPeriod::Annual => Some(format!(
            "salary too low for canje: €{best_amount:.0}/year (minimum: €{SMI_ANNUAL_GROSS:.0}/year)"
        )),
        SalaryPeriod::Monthly => Some(format!(
            "salary too low for canje: ~€{best_amount:.0}/month (minimum: €{SMI_MONTHLY_GROSS:.0}/month)"
        )),
    }
}

/// Extract every `(amount, period)` salary mention in a single pass.
/// A match with neither a nearby currency marker nor a period keyword is
/// discarded — bare numbers are a false-positive risk.
pub fn parse_salary_amounts(text: &str) -> Vec<(f64, SalaryPeriod)> {
    let mut results = Vec::new();

    for caps in SALARY_PATTERN.captures_iter(text) {
        let whole = caps.get(0).expect("match");
        let period_kw = caps.get(3).map(|m| m.as_str().to_lowercase());

        if period_kw.is_none() {
            let window = char_window(text, whole.start(), whole.end(), 5);
            if !CURRENCY_MARKER.is_match(window) {
                continue;
            }
        }

        let mut amounts = Vec::with_capacity(2);
        if let Some(a) = parse_number(&caps[1]) {
            amounts.push(a);
        }
        if let Some(raw2) = caps.get(2)
            && let Some(a) = parse_number(raw2.as_str())
        {
            amounts.push(a);
        }

        for amount in amounts.into_iter().filter(|a| *a > 0.0) {
            let period = match period_kw.as_deref() {
                Some("año" | "ano" | "anual" | "anuales" | "year" | "annual") => {
                    SalaryPeriod::Annual
                }
                Some("mes" | "meses" | "month") => SalaryPeriod::Monthly,
                // No period label: amounts over €2k read as annual.
                _ if amount > 2_000.0 => SalaryPeriod::Annual,
                _ => SalaryPeriod::Monthly,
            };
            let in_range = match period {
                SalaryPeriod::Annual => amount > 5_000.0 && amount < 500_000.0,
                SalaryPeriod::Monthly => amount > 300.0 && amount < 30_000.0,
            };
            if in_range {
                results.push((amount, period));
            }
        }
    }

    results
}

/// Convert "1.200,50", "1,200.50" or "1200" to a float. A lone comma is a
/// decimal separator (Spanish convention): "1,200" → 1.2.
pub fn parse_number(raw: &str) -> Option<f64> {
    if raw.is_empty() {
        return None;
    }
    let s: String = raw.chars().filter(|c| !c.is_whitespace()).collect();

    let has_comma = s.contains(',');
    let has_dot = s.contains('.');

    let normalised = if !has_comma && has_thousands_dot(&s) {
        s.replace('.', "")
    } else if has_comma && has_dot {
        let comma = s.find(',').expect("comma");
        let dot = s.find('.').expect("dot");
        if comma < dot {
            s.replace(',', "")
        } else {
            s.replace('.', "").replace(',', ".")
        }
    } else if has_comma {
        s.replace(',', ".")
    } else {
        s
    };

    normalised.parse().ok()
}

/// True when the string contains a digit, a dot, then three digits —
/// the European thousands convention.
fn has_thousands_dot(s: &str) -> bool {
    let bytes = s.as_bytes();
    bytes.windows(5).any(|w| {
        w[0].is_ascii_digit()
            && w[1] == b'.'
            && w[2].is_ascii_digit()
            && w[3].is_ascii_digit()
            && w[4].is_ascii_digit()
    })
}

/// Slice `text` from `start - pad` to `end + pad`, clamped to char
/// boundaries (the € sign is multi-byte).
fn char_window(text: &str, start: usize, end: usize, pad: usize) -> &str {
    let lo = floor_boundary(text, start.saturating_sub(pad));
    let hi = ceil_boundary(text, (end + pad).min(text.len()));
    &text[lo..hi]
}

fn floor_boundary(text: &str, mut idx: usize) -> usize {
    while idx > 0 && !text.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}

fn ceil_boundary(text: &str, mut idx: usize) -> usize {
    while idx < text.len() && !text.is_char_boundary(idx) {
        idx += 1;
    }
    idx
}
