//! The normalized Extraction Record: every string field present
//! (possibly empty), every array field present (possibly empty), no
//! `null` anywhere.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonalInfo {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub about_me: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Experience {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub company: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub start_date: String,
    #[serde(default)]
    pub end_date: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub achievements: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Skills {
    #[serde(default)]
    pub technical: Vec<String>,
    #[serde(default)]
    pub soft: Vec<String>,
    #[serde(default)]
    pub languages: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Education {
    #[serde(default)]
    pub degree: String,
    #[serde(default)]
    pub institution: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub graduation_date: String,
    #[serde(default)]
    pub gpa: String,
    #[serde(default)]
    pub achievements: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Project {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub technologies: Vec<String>,
    #[serde(default)]
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Certification {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub issuer: String,
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionRecord {
    #[serde(default)]
    pub personal_info: PersonalInfo,
    #[serde(default)]
    pub experience: Vec<Experience>,
    #[serde(default)]
    pub skills: Skills,
    #[serde(default)]
    pub education: Vec<Education>,
    #[serde(default)]
    pub projects: Vec<Project>,
    #[serde(default)]
    pub certifications: Vec<Certification>,
}

fn collapse_whitespace(s: &str) -> String {
    s.trim()
        .trim_matches(|c| c == '"' || c == '\'')
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

impl ExtractionRecord {
    /// Idempotent normalization: strips surrounding quotes and collapses
    /// whitespace on scalar string fields. Arrays and structural shape
    /// are already guaranteed present by `serde(default)` at
    /// deserialization time, so `normalize(normalize(r)) == normalize(r)`.
    pub fn normalize(mut self) -> Self {
        self.personal_info.name = collapse_whitespace(&self.personal_info.name);
        self.personal_info.email = collapse_whitespace(&self.personal_info.email);
        self.personal_info.phone = collapse_whitespace(&self.personal_info.phone);
        self.personal_info.location = collapse_whitespace(&self.personal_info.location);
        self.personal_info.summary = collapse_whitespace(&self.personal_info.summary);
        self.personal_info.about_me = collapse_whitespace(&self.personal_info.about_me);

        for exp in &mut self.experience {
            exp.title = collapse_whitespace(&exp.title);
            exp.company = collapse_whitespace(&exp.company);
            exp.location = collapse_whitespace(&exp.location);
            exp.start_date = collapse_whitespace(&exp.start_date);
            exp.end_date = collapse_whitespace(&exp.end_date);
            exp.description = collapse_whitespace(&exp.description);
        }
        for edu in &mut self.education {
            edu.degree = collapse_whitespace(&edu.degree);
            edu.institution = collapse_whitespace(&edu.institution);
            edu.location = collapse_whitespace(&edu.location);
            edu.graduation_date = collapse_whitespace(&edu.graduation_date);
            edu.gpa = collapse_whitespace(&edu.gpa);
        }
        for proj in &mut self.projects {
            proj.name = collapse_whitespace(&proj.name);
            proj.description = collapse_whitespace(&proj.description);
            proj.url = collapse_whitespace(&proj.url);
        }
        for cert in &mut self.certifications {
            cert.name = collapse_whitespace(&cert.name);
            cert.issuer = collapse_whitespace(&cert.issuer);
            cert.date = collapse_whitespace(&cert.date);
            cert.url = collapse_whitespace(&cert.url);
        }

        self
    }

    /// Required structural anchor a successfully-extracted record must
    /// have: at minimum the top-level object must have been parsed into
    /// this shape at all. Anything that reaches this point already
    /// satisfies that by construction; callers check shape before
    /// constructing the record from raw JSON (see `client::parse_with_repair`).
    pub fn has_any_content(&self) -> bool {
        !self.personal_info.name.is_empty()
            || !self.experience.is_empty()
            || !self.skills.technical.is_empty()
            || !self.skills.soft.is_empty()
            || !self.education.is_empty()
            || !self.projects.is_empty()
            || !self.certifications.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_is_idempotent() {
        let record = ExtractionRecord {
            personal_info: PersonalInfo {
                name: "  \"Jane   Smith\"  ".to_string(),
                ..Default::default()
            },
            ..Default::default()
        };
        let once = record.normalize();
        let twice = once.clone().normalize();
        assert_eq!(once, twice);
        assert_eq!(once.personal_info.name, "Jane Smith");
    }

    #[test]
    fn default_record_has_no_nulls_by_construction() {
        let record = ExtractionRecord::default();
        assert_eq!(record.personal_info.name, "");
        assert!(record.experience.is_empty());
        assert!(record.skills.technical.is_empty());
    }

    #[test]
    fn deserializing_partial_json_fills_defaults() {
        let json = serde_json::json!({
            "personalInfo": { "name": "Jane Smith" },
            "experience": [{ "title": "Chef", "company": "X" }]
        });
        let record: ExtractionRecord = serde_json::from_value(json).unwrap();
        assert_eq!(record.personal_info.name, "Jane Smith");
        assert_eq!(record.personal_info.email, "");
        assert_eq!(record.experience[0].achievements, Vec::<String>::new());
        assert!(record.skills.technical.is_empty());
    }
}
