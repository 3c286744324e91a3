//! Skill extraction from job descriptions

use std::sync::Arc;

use serde::Deserialize;
use tracing::{debug, info};

use crate::analysis::{ExtractedSkill, JobExperienceInput};
use crate::error::Result;
use crate::graph::slug;
use crate::llm::{TextCompletion, parse_completion};

/// Upper bound on skills kept from one extraction
const MAX_SKILLS_PER_JOB: usize = 20;

/// Extracts a job's skills with a single completion call
#[derive(Clone)]
pub struct SkillExtractor {
    completion: Arc<dyn TextCompletion>,
}

impl SkillExtractor {
    pub fn new(completion: Arc<dyn TextCompletion>) -> Self {
        Self { completion }
    }

    /// Skills in the order the completion returned them, de-duplicated by
    /// graph key. Nameless entries are dropped.
    pub async fn extract(&self, job: &JobExperienceInput) -> Result<Vec<ExtractedSkill>> {
        let prompt = build_extraction_prompt(job);
        let response = self.completion.complete(&prompt).await?;
        let skills = parse_extraction_response(&response)?;

        info!(
            experience_id = %job.id,
            skill_count = skills.len(),
            "Extracted skills from job description"
        );
        Ok(skills)
    }
}

fn build_extraction_prompt(job: &JobExperienceInput) -> String {
    format!(
        r#"Extract all technical and soft skills from this job description.

Job Title: {title}
Company: {company}
Description:
{description}

For each skill:
1. Normalize the name (e.g., "React.js" -> "React", "Java 8" -> "Java")
2. Categorize (Programming Language, Framework, Cloud Platform, Database, DevOps Tool, Soft Skill, etc.)
3. Estimate proficiency level (0-100) based on context
4. Mark whether it is a core skill for this role

Return ONLY a JSON object whose "skills" field is an array:
{{"skills": [
  {{
    "name": "Java",
    "category": "Programming Language",
    "subcategory": "Backend",
    "proficiencyLevel": 90,
    "isTechnical": true,
    "isPrimary": true,
    "mentionedCount": 3
  }}
]}}

Include both explicit and implied skills. Limit to the {max} most relevant."#,
        title = job.title,
        company = job.company.as_deref().unwrap_or(""),
        description = job.description.as_deref().unwrap_or(""),
        max = MAX_SKILLS_PER_JOB,
    )
}

/// One array entry as the completion may phrase it
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSkill {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    subcategory: Option<String>,
    #[serde(default)]
    proficiency_level: Option<f64>,
    #[serde(default)]
    is_technical: Option<bool>,
    #[serde(default)]
    is_primary: Option<bool>,
    #[serde(default)]
    mentioned_count: Option<f64>,
}

/// JSON-mode providers wrap the array in an object
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SkillList {
    Bare(Vec<RawSkill>),
    Wrapped { skills: Vec<RawSkill> },
}

fn parse_extraction_response(response: &str) -> Result<Vec<ExtractedSkill>> {
    let raw = match parse_completion::<SkillList>(response, "skill extraction array")? {
        SkillList::Bare(raw) | SkillList::Wrapped { skills: raw } => raw,
    };

    let mut seen = std::collections::HashSet::new();
    let mut skills = Vec::new();
    for entry in raw {
        let Some(name) = entry.name.map(|n| n.trim().to_string()) else {
            continue;
        };
        let key = slug(&name);
        if key.is_empty() || !seen.insert(key) {
            debug!(name = %name, "Dropping unusable or repeated skill");
            continue;
        }

        let mut skill = ExtractedSkill::new(name);
        skill.category = entry.category.filter(|c| !c.trim().is_empty());
        skill.subcategory = entry.subcategory.filter(|c| !c.trim().is_empty());
        if let Some(level) = entry.proficiency_level {
            skill.proficiency_level = level.round().clamp(0.0, 100.0) as u8;
        }
        skill.is_technical = entry.is_technical.unwrap_or(true);
        skill.is_primary = entry.is_primary.unwrap_or(false);
        if let Some(count) = entry.mentioned_count {
            skill.mentioned_count = count.round().max(1.0) as u32;
        }
        skills.push(skill);

        if skills.len() == MAX_SKILLS_PER_JOB {
            break;
        }
    }
    Ok(skills)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct Canned(&'static str);

    #[async_trait]
    impl TextCompletion for Canned {
        async fn complete(&self, _prompt: &str) -> Result<String> {
            Ok(self.0.to_string())
        }
    }

    #[test]
    fn test_parse_applies_defaults() {
        let skills = parse_extraction_response(
            r#"[{"name": "Java", "proficiencyLevel": 92.6, "isPrimary": true, "mentionedCount": 3},
                {"name": "Communication", "isTechnical": false},
                {"name": "  "},
                {"category": "Framework"},
                {"name": "java"}]"#,
        )
        .unwrap();

        assert_eq!(skills.len(), 2);
        assert_eq!(skills[0].proficiency_level, 93);
        assert!(skills[0].is_primary);
        assert_eq!(skills[0].mentioned_count, 3);
        assert_eq!(skills[1].proficiency_level, 70);
        assert!(!skills[1].is_technical);
        assert_eq!(skills[1].mentioned_count, 1);
    }

    #[test]
    fn test_parse_accepts_wrapped_array() {
        let skills = parse_extraction_response(
            r#"{"skills": [{"name": "Kubernetes", "category": "DevOps Tool"}]}"#,
        )
        .unwrap();
        assert_eq!(skills.len(), 1);
        assert_eq!(skills[0].category.as_deref(), Some("DevOps Tool"));
    }

    #[test]
    fn test_parse_clamps_proficiency() {
        let skills =
            parse_extraction_response(r#"[{"name": "Rust", "proficiencyLevel": 400}]"#).unwrap();
        assert_eq!(skills[0].proficiency_level, 100);
    }

    #[test]
    fn test_malformed_response_is_error() {
        let err = parse_extraction_response("I could not find any skills").unwrap_err();
        assert_eq!(err.code(), "E300");
    }

    #[tokio::test]
    async fn test_extract_through_completion() {
        let extractor = SkillExtractor::new(Arc::new(Canned(
            "```json\n[{\"name\": \"Spring Boot\", \"category\": \"Framework\"}]\n```",
        )));
        let job = JobExperienceInput::new("exp-1", "Backend Engineer")
            .with_description("Built services with Spring Boot");

        let skills = extractor.extract(&job).await.unwrap();
        assert_eq!(skills.len(), 1);
        assert_eq!(skills[0].id(), "spring-boot");
        assert_eq!(skills[0].category.as_deref(), Some("Framework"));
    }

    #[test]
    fn test_prompt_mentions_job() {
        let job = JobExperienceInput::new("exp-1", "Data Engineer").with_company("Acme");
        let prompt = build_extraction_prompt(&job);
        assert!(prompt.contains("Job Title: Data Engineer"));
        assert!(prompt.contains("Company: Acme"));
        assert!(prompt.contains("\"proficiencyLevel\": 90"));
    }
}
