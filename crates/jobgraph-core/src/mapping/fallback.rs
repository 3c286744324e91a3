//! Completion-backed skill mapping and the adapter that validates its output
//!
//! Nothing the completion service proposes is written as-is. A proposal
//! survives only if it names one of this job's skills, a target from the
//! lists it was shown, a target node that exists in the graph, and (for
//! technologies) a relationship kind it is allowed to propose.

use std::collections::HashSet;

use serde::Deserialize;
use tracing::debug;

use crate::error::Result;
use crate::graph::{NodeLabel, NodeRef, SqliteGraphStore, TechRelationship, slug};
use crate::llm::parse_completion;
use crate::taxonomy::OccupationTaxonomy;

pub const DEFAULT_PROPOSED_CONFIDENCE: f64 = 0.8;

/// Taxonomy names shown to the completion service
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FallbackLists {
    pub skills: Vec<String>,
    pub technologies: Vec<String>,
}

impl FallbackLists {
    /// Names from the given payloads, de-duplicated case-insensitively in
    /// first-seen order
    pub fn from_payloads<'a>(payloads: impl IntoIterator<Item = &'a OccupationTaxonomy>) -> Self {
        let mut lists = Self::default();
        let mut seen_skills = HashSet::new();
        let mut seen_technologies = HashSet::new();
        for payload in payloads {
            for name in payload.skill_names() {
                if seen_skills.insert(name.to_lowercase()) {
                    lists.skills.push(name);
                }
            }
            for name in payload.technology_names() {
                if seen_technologies.insert(name.to_lowercase()) {
                    lists.technologies.push(name);
                }
            }
        }
        lists
    }

    pub fn is_empty(&self) -> bool {
        self.skills.is_empty() && self.technologies.is_empty()
    }
}

pub fn build_fallback_prompt(job_skills: &[String], lists: &FallbackLists) -> String {
    format!(
        r#"You are an expert at mapping job skills to O*NET soft/cognitive skills and technology skills.

Job Skills (from job description):
{job_skills}

O*NET Soft/Cognitive Skills (available for this occupation):
{skills}

O*NET Technology Skills (available for this occupation):
{technologies}

For each job skill, determine:
1. Which O*NET soft skills it demonstrates (e.g., "Java" demonstrates "Programming")
2. Which O*NET technologies it is related to (e.g., "Spring Boot" is related to "Java")

Relationship types for technologies:
- "similar": nearly the same tool (e.g., PostgreSQL ~ Oracle Database)
- "subset": the skill is part of a larger category (e.g., Spring Boot is a subset of Java)
- "uses": the skill uses the technology (e.g., Kubernetes uses Docker)
- "alternative": different tools for the same purpose (e.g., Jenkins ~ GitHub Actions)

Return JSON:
{{
  "soft_skill_mappings": [
    {{"job_skill": "Java", "onet_skill": "Programming", "confidence": 0.95}}
  ],
  "technology_mappings": [
    {{"job_skill": "Spring Boot", "onet_technology": "Java", "confidence": 0.90, "relationship_type": "subset"}}
  ]
}}

Only map to O*NET skills and technologies that appear in the lists above.
Confidence is 0.0-1.0 (higher = stronger relationship)."#,
        job_skills = job_skills.join(", "),
        skills = lists.skills.join(", "),
        technologies = lists.technologies.join(", "),
    )
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FallbackResponse {
    #[serde(default)]
    pub soft_skill_mappings: Vec<SoftSkillProposal>,
    #[serde(default)]
    pub technology_mappings: Vec<TechnologyProposal>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SoftSkillProposal {
    #[serde(default)]
    pub job_skill: String,
    #[serde(default)]
    pub onet_skill: String,
    #[serde(default = "default_confidence")]
    pub confidence: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TechnologyProposal {
    #[serde(default)]
    pub job_skill: String,
    #[serde(default)]
    pub onet_technology: String,
    #[serde(default = "default_confidence")]
    pub confidence: f64,
    #[serde(default = "default_relationship")]
    pub relationship_type: String,
}

fn default_confidence() -> f64 {
    DEFAULT_PROPOSED_CONFIDENCE
}

fn default_relationship() -> String {
    TechRelationship::Similar.as_str().to_string()
}

pub fn parse_fallback_response(response: &str) -> Result<FallbackResponse> {
    parse_completion(response, "skill mapping object")
}

/// A DEMONSTRATES edge cleared for writing
#[derive(Debug, Clone, PartialEq)]
pub struct ValidDemonstration {
    pub skill_id: String,
    pub taxonomy_skill_id: String,
    pub confidence: f64,
}

/// A RELATED_TO edge cleared for writing
#[derive(Debug, Clone, PartialEq)]
pub struct ValidRelation {
    pub skill_id: String,
    pub technology_id: String,
    pub confidence: f64,
    pub relationship: TechRelationship,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidatedMappings {
    pub demonstrates: Vec<ValidDemonstration>,
    pub related: Vec<ValidRelation>,
    pub rejected: usize,
}

/// Checks proposals against the job, the offered lists and the graph.
/// Graph reads go to the pool, so run it before opening a write transaction.
pub struct MappingValidator<'a> {
    store: &'a SqliteGraphStore,
    job_skill_ids: HashSet<String>,
    offered_skills: HashSet<String>,
    offered_technologies: HashSet<String>,
}

impl<'a> MappingValidator<'a> {
    pub fn new(
        store: &'a SqliteGraphStore,
        job_skill_ids: &[String],
        lists: &FallbackLists,
    ) -> Self {
        Self {
            store,
            job_skill_ids: job_skill_ids.iter().cloned().collect(),
            offered_skills: lists.skills.iter().map(|s| s.trim().to_lowercase()).collect(),
            offered_technologies: lists
                .technologies
                .iter()
                .map(|s| s.trim().to_lowercase())
                .collect(),
        }
    }

    pub async fn validate(&self, response: &FallbackResponse) -> Result<ValidatedMappings> {
        let mut validated = ValidatedMappings::default();
        let mut seen = HashSet::new();

        for proposal in &response.soft_skill_mappings {
            match self
                .check(
                    &proposal.job_skill,
                    &proposal.onet_skill,
                    &self.offered_skills,
                    NodeLabel::TaxonomySkill,
                )
                .await?
            {
                Some((skill_id, target_id)) => {
                    let key = (NodeLabel::TaxonomySkill, skill_id.clone(), target_id.clone());
                    if seen.insert(key) {
                        validated.demonstrates.push(ValidDemonstration {
                            skill_id,
                            taxonomy_skill_id: target_id,
                            confidence: proposal.confidence,
                        });
                    }
                }
                None => {
                    debug!(
                        job_skill = %proposal.job_skill,
                        target = %proposal.onet_skill,
                        "Rejected proposed skill mapping"
                    );
                    validated.rejected += 1;
                }
            }
        }

        for proposal in &response.technology_mappings {
            let Some(relationship) = TechRelationship::parse_proposed(&proposal.relationship_type)
            else {
                debug!(
                    job_skill = %proposal.job_skill,
                    relationship = %proposal.relationship_type,
                    "Rejected proposed technology mapping with unknown relationship"
                );
                validated.rejected += 1;
                continue;
            };
            match self
                .check(
                    &proposal.job_skill,
                    &proposal.onet_technology,
                    &self.offered_technologies,
                    NodeLabel::Technology,
                )
                .await?
            {
                Some((skill_id, target_id)) => {
                    let key = (NodeLabel::Technology, skill_id.clone(), target_id.clone());
                    if seen.insert(key) {
                        validated.related.push(ValidRelation {
                            skill_id,
                            technology_id: target_id,
                            confidence: proposal.confidence,
                            relationship,
                        });
                    }
                }
                None => {
                    debug!(
                        job_skill = %proposal.job_skill,
                        target = %proposal.onet_technology,
                        "Rejected proposed technology mapping"
                    );
                    validated.rejected += 1;
                }
            }
        }

        Ok(validated)
    }

    async fn check(
        &self,
        job_skill: &str,
        target_name: &str,
        offered: &HashSet<String>,
        label: NodeLabel,
    ) -> Result<Option<(String, String)>> {
        let skill_id = slug(job_skill);
        if !self.job_skill_ids.contains(&skill_id) {
            return Ok(None);
        }
        if !offered.contains(&target_name.trim().to_lowercase()) {
            return Ok(None);
        }
        let target_id = slug(target_name);
        if target_id.is_empty() {
            return Ok(None);
        }
        let target = NodeRef::new(label, target_id.as_str());
        if !self.store.node_exists(&target).await? {
            return Ok(None);
        }
        Ok(Some((skill_id, target_id)))
    }
}
