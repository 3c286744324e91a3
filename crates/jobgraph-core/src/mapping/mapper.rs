//! Maps a job's skills onto the taxonomy vocabulary

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info};

use crate::analysis::ExtractedSkill;
use crate::error::Result;
use crate::graph::{
    Demonstration, MappedBy, SqliteGraphStore, TechRelationship, TechnologyRelation,
};
use crate::llm::TextCompletion;
use crate::taxonomy::OccupationTaxonomy;

use super::fallback::{
    FallbackLists, MappingValidator, ValidatedMappings, build_fallback_prompt,
    parse_fallback_response,
};
use super::rules::{MatchKind, RuleMatcher};

/// How a run's mappings were produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MappingStrategy {
    /// String matching against taxonomy already in the graph
    RuleBased,
    /// Completion service, validated against the graph
    Fallback,
    /// No taxonomy to map against, or fallback disabled
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MappingOutcome {
    pub strategy: MappingStrategy,
    /// DEMONSTRATES edges written
    pub demonstrates: usize,
    /// RELATED_TO edges written
    pub related: usize,
    /// Completion proposals that failed validation
    pub rejected: usize,
    /// Previous mappings removed before writing
    pub cleared: u64,
}

impl MappingOutcome {
    fn new(strategy: MappingStrategy) -> Self {
        Self {
            strategy,
            demonstrates: 0,
            related: 0,
            rejected: 0,
            cleared: 0,
        }
    }
}

#[derive(Clone)]
pub struct SkillMapper {
    store: SqliteGraphStore,
    completion: Arc<dyn TextCompletion>,
    llm_fallback: bool,
}

impl SkillMapper {
    pub fn new(store: SqliteGraphStore, completion: Arc<dyn TextCompletion>) -> Self {
        Self {
            store,
            completion,
            llm_fallback: true,
        }
    }

    pub fn with_llm_fallback(mut self, enabled: bool) -> Self {
        self.llm_fallback = enabled;
        self
    }

    /// Replace the DEMONSTRATES / RELATED_TO edges of this job's skills.
    ///
    /// Rule-based matching is used whenever any of `occupation_codes` has
    /// taxonomy skills or technologies in the graph. Otherwise the names in
    /// `fetched` (payloads retrieved during this run) are offered to the
    /// completion service.
    pub async fn map(
        &self,
        experience_id: &str,
        skills: &[ExtractedSkill],
        occupation_codes: &[String],
        fetched: &[OccupationTaxonomy],
    ) -> Result<MappingOutcome> {
        let names = self.store.taxonomy_names(occupation_codes).await?;
        let mut outcome;
        let mut tx;

        if !names.is_empty() {
            outcome = MappingOutcome::new(MappingStrategy::RuleBased);
            let matcher = RuleMatcher::new(&names);

            tx = self.store.begin().await?;
            outcome.cleared = tx.delete_skill_mappings(experience_id).await?;
            let now = tx.now();

            for skill in skills {
                let skill_id = skill.id();
                if skill_id.is_empty() {
                    continue;
                }
                let matches = matcher.match_skill(&skill.name);

                if let Some(hit) = matches.technology {
                    let relation = TechnologyRelation {
                        confidence: hit.kind.confidence(),
                        relationship: match hit.kind {
                            MatchKind::Exact => TechRelationship::Exact,
                            MatchKind::Partial => TechRelationship::Partial,
                        },
                        mapped_by: MappedBy::Rule,
                        mapped_at: now,
                    };
                    if tx.link_skill_related(&skill_id, &hit.target.id, &relation).await? {
                        outcome.related += 1;
                        debug!(
                            skill = %skill.name,
                            technology = %hit.target.name,
                            kind = ?hit.kind,
                            "Matched technology"
                        );
                    }
                }

                if let Some(hit) = matches.skill {
                    let demonstration = Demonstration {
                        confidence: hit.kind.confidence(),
                        mapped_by: MappedBy::Rule,
                        mapped_at: now,
                    };
                    if tx
                        .link_skill_demonstrates(&skill_id, &hit.target.id, &demonstration)
                        .await?
                    {
                        outcome.demonstrates += 1;
                        debug!(
                            skill = %skill.name,
                            taxonomy_skill = %hit.target.name,
                            kind = ?hit.kind,
                            "Matched skill"
                        );
                    }
                }
            }
        } else {
            let lists = FallbackLists::from_payloads(fetched);
            let validated = if lists.is_empty() || !self.llm_fallback || skills.is_empty() {
                outcome = MappingOutcome::new(MappingStrategy::Skipped);
                ValidatedMappings::default()
            } else {
                outcome = MappingOutcome::new(MappingStrategy::Fallback);
                self.propose(skills, &lists).await?
            };
            outcome.rejected = validated.rejected;

            tx = self.store.begin().await?;
            outcome.cleared = tx.delete_skill_mappings(experience_id).await?;
            let now = tx.now();

            for mapping in &validated.demonstrates {
                let demonstration = Demonstration {
                    confidence: mapping.confidence,
                    mapped_by: MappedBy::Llm,
                    mapped_at: now,
                };
                if tx
                    .link_skill_demonstrates(
                        &mapping.skill_id,
                        &mapping.taxonomy_skill_id,
                        &demonstration,
                    )
                    .await?
                {
                    outcome.demonstrates += 1;
                }
            }
            for mapping in &validated.related {
                let relation = TechnologyRelation {
                    confidence: mapping.confidence,
                    relationship: mapping.relationship,
                    mapped_by: MappedBy::Llm,
                    mapped_at: now,
                };
                if tx
                    .link_skill_related(&mapping.skill_id, &mapping.technology_id, &relation)
                    .await?
                {
                    outcome.related += 1;
                }
            }
        }

        tx.commit().await?;

        info!(
            experience_id = %experience_id,
            strategy = ?outcome.strategy,
            demonstrates = outcome.demonstrates,
            related = outcome.related,
            rejected = outcome.rejected,
            "Mapped skills to taxonomy"
        );
        Ok(outcome)
    }

    /// Ask the completion service and keep only proposals that validate
    async fn propose(
        &self,
        skills: &[ExtractedSkill],
        lists: &FallbackLists,
    ) -> Result<ValidatedMappings> {
        let names: Vec<String> = skills.iter().map(|s| s.name.clone()).collect();
        let ids: Vec<String> = skills.iter().map(ExtractedSkill::id).collect();

        let response = self
            .completion
            .complete(&build_fallback_prompt(&names, lists))
            .await?;
        let response = parse_fallback_response(&response)?;

        MappingValidator::new(&self.store, &ids, lists)
            .validate(&response)
            .await
    }
}
