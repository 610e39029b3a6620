//! Prompt construction.

/// Builds a single-pass extraction prompt: exhaustive extraction
/// instruction, the full output schema, profession-agnostic
/// interpretive guidance, and a reminder to emit valid JSON only.
pub fn build_prompt(cleaned_text: &str) -> String {
    format!(
        "You are extracting structured data from a résumé. Read the entire \
document below and extract every relevant detail exhaustively — do not \
stop at the first section or skip entries that seem minor.

Interpret \"technical\" broadly: it means domain expertise relevant to the \
person's profession, not only software or programming skills. A chef's \
knife skills, a nurse's triage protocols, and a lawyer's case law research \
are all \"technical\" in this sense.

Return a single JSON object with exactly this shape (omit nothing; use \
empty strings \"\" or empty arrays [] for anything not present, never null):

{{
  \"personalInfo\": {{ \"name\": \"\", \"email\": \"\", \"phone\": \"\", \"location\": \"\", \"summary\": \"\", \"aboutMe\": \"\" }},
  \"experience\": [ {{ \"title\": \"\", \"company\": \"\", \"location\": \"\", \"startDate\": \"\", \"endDate\": \"\", \"description\": \"\", \"achievements\": [] }} ],
  \"skills\": {{ \"technical\": [], \"soft\": [], \"languages\": [] }},
  \"education\": [ {{ \"degree\": \"\", \"institution\": \"\", \"location\": \"\", \"graduationDate\": \"\", \"gpa\": \"\", \"achievements\": [] }} ],
  \"projects\": [ {{ \"name\": \"\", \"description\": \"\", \"technologies\": [], \"url\": \"\" }} ],
  \"certifications\": [ {{ \"name\": \"\", \"issuer\": \"\", \"date\": \"\", \"url\": \"\" }} ]
}}

Respond with valid JSON only. Do not include commentary, markdown code \
fences, or any text before or after the JSON object.

RÉSUMÉ TEXT:
{cleaned_text}"
    )
}

/// Rough token estimate for quota recording: the provider's own usage
/// accounting is the source of truth when available, but a
/// conservative heuristic covers providers (and the
/// fixture backend) that don't return one.
pub fn estimate_tokens(prompt: &str, response: &str) -> i64 {
    ((prompt.len() + response.len()) / 4) as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_contains_schema_anchors_and_text() {
        let prompt = build_prompt("Jane Smith, Chef");
        assert!(prompt.contains("personalInfo"));
        assert!(prompt.contains("achievements"));
        assert!(prompt.contains("Jane Smith, Chef"));
    }

    #[test]
    fn token_estimate_is_positive_for_nonempty_input() {
        assert!(estimate_tokens("hello", "world") > 0);
    }
}
