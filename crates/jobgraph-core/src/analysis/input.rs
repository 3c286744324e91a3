//! Inputs to one analysis run

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};

use crate::graph::slug;

/// One entry of a person's work history, as supplied by the relational store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobExperienceInput {
    pub id: String,
    #[serde(default)]
    pub resume_id: Option<String>,
    #[serde(alias = "jobTitle")]
    pub title: String,
    #[serde(default, alias = "companyName")]
    pub company: Option<String>,
    #[serde(default, deserialize_with = "lenient_date")]
    pub start_date: Option<NaiveDate>,
    #[serde(default, deserialize_with = "lenient_date")]
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub description: Option<String>,
}

impl JobExperienceInput {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            resume_id: None,
            title: title.into(),
            company: None,
            start_date: None,
            end_date: None,
            description: None,
        }
    }

    pub fn with_company(mut self, company: impl Into<String>) -> Self {
        self.company = Some(company.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Normalized title and occupation classification of a job
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedJob {
    #[serde(default)]
    pub normalized_title: Option<String>,
    #[serde(default)]
    pub seniority: Option<String>,
    /// 1-10 scale
    #[serde(default)]
    pub technical_depth: Option<f64>,
    #[serde(default)]
    pub has_leadership: Option<bool>,
    /// Best match first
    #[serde(default, alias = "socCodes")]
    pub occupations: Vec<NormalizedOccupation>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedOccupation {
    pub code: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub confidence: f64,
}

impl NormalizedOccupation {
    pub fn new(code: impl Into<String>, title: impl Into<String>, confidence: f64) -> Self {
        Self {
            code: code.into(),
            title: title.into(),
            confidence,
        }
    }
}

/// A skill extracted from a job description
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedSkill {
    pub name: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub subcategory: Option<String>,
    #[serde(default = "default_proficiency")]
    pub proficiency_level: u8,
    #[serde(default = "default_true")]
    pub is_technical: bool,
    #[serde(default)]
    pub is_primary: bool,
    #[serde(default = "default_mentioned")]
    pub mentioned_count: u32,
}

impl ExtractedSkill {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            category: None,
            subcategory: None,
            proficiency_level: default_proficiency(),
            is_technical: true,
            is_primary: false,
            mentioned_count: default_mentioned(),
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn primary(mut self) -> Self {
        self.is_primary = true;
        self
    }

    pub fn soft(mut self) -> Self {
        self.is_technical = false;
        self
    }

    /// Graph key of the skill node this maps to
    pub fn id(&self) -> String {
        slug(&self.name)
    }
}

fn default_proficiency() -> u8 {
    70
}

fn default_true() -> bool {
    true
}

fn default_mentioned() -> u32 {
    1
}

/// Accepts `YYYY-MM-DD`, `YYYY-MM` and `YYYY`; anything else (including
/// "Present") is no date
fn lenient_date<'de, D>(deserializer: D) -> std::result::Result<Option<NaiveDate>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.and_then(|s| parse_partial_date(&s)))
}

pub(crate) fn parse_partial_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Some(date);
    }
    let mut parts = s.splitn(2, '-');
    let year: i32 = parts.next()?.parse().ok()?;
    let month: u32 = match parts.next() {
        Some(m) => m.parse().ok()?,
        None => 1,
    };
    NaiveDate::from_ymd_opt(year, month, 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_input_from_camel_case() {
        let job: JobExperienceInput = serde_json::from_str(
            r#"{"id": "exp-1", "jobTitle": "Backend Engineer", "companyName": "Acme",
                "startDate": "2019-03", "endDate": "Present"}"#,
        )
        .unwrap();
        assert_eq!(job.title, "Backend Engineer");
        assert_eq!(job.company.as_deref(), Some("Acme"));
        assert_eq!(job.start_date, NaiveDate::from_ymd_opt(2019, 3, 1));
        assert_eq!(job.end_date, None);
    }

    #[test]
    fn test_partial_dates() {
        assert_eq!(parse_partial_date("2021-07-15"), NaiveDate::from_ymd_opt(2021, 7, 15));
        assert_eq!(parse_partial_date("2021"), NaiveDate::from_ymd_opt(2021, 1, 1));
        assert_eq!(parse_partial_date("2021-13"), None);
        assert_eq!(parse_partial_date("current"), None);
    }

    #[test]
    fn test_extracted_skill_defaults() {
        let skill: ExtractedSkill = serde_json::from_str(r#"{"name": "Spring Boot"}"#).unwrap();
        assert_eq!(skill.proficiency_level, 70);
        assert!(skill.is_technical);
        assert!(!skill.is_primary);
        assert_eq!(skill.mentioned_count, 1);
        assert_eq!(skill.id(), "spring-boot");
    }

    #[test]
    fn test_normalized_job_accepts_soc_codes() {
        let job: NormalizedJob = serde_json::from_str(
            r#"{"normalizedTitle": "Software Developer", "technicalDepth": 8,
                "socCodes": [
                    {"code": "15-1252.00", "title": "Software Developers", "confidence": 0.9}
                ]}"#,
        )
        .unwrap();
        assert_eq!(job.occupations.len(), 1);
        assert_eq!(job.technical_depth, Some(8.0));
    }
}
