//! Job-title normalization and occupation classification

use std::sync::Arc;

use tracing::info;

use crate::analysis::{JobExperienceInput, NormalizedJob};
use crate::error::Result;
use crate::llm::{TextCompletion, parse_completion};

/// Most occupations kept per job
const MAX_OCCUPATIONS: usize = 3;

#[derive(Clone)]
pub struct JobNormalizer {
    completion: Arc<dyn TextCompletion>,
}

impl JobNormalizer {
    pub fn new(completion: Arc<dyn TextCompletion>) -> Self {
        Self { completion }
    }

    /// Normalize the title and classify the job, best occupation first
    pub async fn normalize(&self, job: &JobExperienceInput) -> Result<NormalizedJob> {
        let prompt = build_normalization_prompt(job);
        let response = self.completion.complete(&prompt).await?;
        let normalized = parse_normalization_response(&response)?;

        info!(
            experience_id = %job.id,
            normalized_title = ?normalized.normalized_title,
            occupations = normalized.occupations.len(),
            "Normalized job"
        );
        Ok(normalized)
    }
}

fn build_normalization_prompt(job: &JobExperienceInput) -> String {
    let date = |d: Option<chrono::NaiveDate>| {
        d.map(|d| d.format("%Y-%m").to_string())
            .unwrap_or_default()
    };
    format!(
        r#"Normalize this job and classify it against the O*NET-SOC occupation taxonomy.

Job Title: {title}
Company: {company}
Dates: {start} - {end}
Description:
{description}

Return ONLY a JSON object:
{{
  "normalizedTitle": "Software Developer",
  "seniority": "Entry | Mid | Senior | Lead | Principal",
  "technicalDepth": 7,
  "hasLeadership": false,
  "occupations": [
    {{"code": "15-1252.00", "title": "Software Developers", "confidence": 0.92}}
  ]
}}

List at most {max} occupations, best match first. technicalDepth is 1-10.
Confidence is 0.0-1.0."#,
        title = job.title,
        company = job.company.as_deref().unwrap_or(""),
        start = date(job.start_date),
        end = date(job.end_date),
        description = job.description.as_deref().unwrap_or(""),
        max = MAX_OCCUPATIONS,
    )
}

fn parse_normalization_response(response: &str) -> Result<NormalizedJob> {
    let mut normalized: NormalizedJob = parse_completion(response, "job normalization object")?;
    normalized.occupations.retain(|o| !o.code.trim().is_empty());
    normalized.occupations.truncate(MAX_OCCUPATIONS);
    for occupation in &mut normalized.occupations {
        occupation.code = occupation.code.trim().to_string();
    }
    Ok(normalized)
}
