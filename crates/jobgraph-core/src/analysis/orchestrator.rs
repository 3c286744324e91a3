//! Per-job analysis pipeline
//!
//! ```text
//! CLEANUP -> INGEST_TAXONOMY -> WRITE_OCCUPATIONS_AND_EXPERIENCE -> WRITE_SKILLS
//!         -> MAP_OCCUPATION_RANKS -> MAP_SKILLS_TO_TAXONOMY -> DECOMPOSE_DESCRIPTION
//! ```
//!
//! Each step commits its own transaction. CLEANUP removes every edge incident
//! to the job experience and commits before anything else is written, which is
//! what makes re-analysis replace rather than accumulate. The run as a whole is
//! not atomic: a required step that fails ends the run with
//! [`Error::AnalysisFailed`] and leaves earlier steps' writes in place.

use std::collections::HashSet;
use std::sync::Arc;

use futures_util::future::join_all;
use tracing::{error, info, warn};

use crate::config::AnalysisConfig;
use crate::description::{DescriptionDecomposer, LineMapper};
use crate::error::{Error, Result};
use crate::graph::{
    JobExperienceNode, NodeRef, OccupationMapping, OccupationNode, SkillNode, SkillRequirement,
    SqliteGraphStore, StalenessPolicy,
};
use crate::llm::TextCompletion;
use crate::mapping::{MappingStrategy, SkillMapper};
use crate::taxonomy::{OccupationTaxonomy, TaxonomyIngestor, TaxonomySource};

use super::input::{ExtractedSkill, JobExperienceInput, NormalizedJob, NormalizedOccupation};
use super::report::{AnalysisReport, AnalysisStep, StepOutcome};

pub struct AnalysisOrchestrator {
    store: SqliteGraphStore,
    taxonomy: Arc<dyn TaxonomySource>,
    config: AnalysisConfig,
    staleness: StalenessPolicy,
    ingestor: TaxonomyIngestor,
    mapper: SkillMapper,
    decomposer: DescriptionDecomposer,
    line_mapper: LineMapper,
}

impl AnalysisOrchestrator {
    pub fn new(
        store: SqliteGraphStore,
        taxonomy: Arc<dyn TaxonomySource>,
        completion: Arc<dyn TextCompletion>,
        config: AnalysisConfig,
    ) -> Self {
        Self {
            staleness: StalenessPolicy::new(store.clone(), config.staleness_days),
            ingestor: TaxonomyIngestor::new(store.clone()),
            mapper: SkillMapper::new(store.clone(), completion.clone())
                .with_llm_fallback(config.llm_fallback),
            decomposer: DescriptionDecomposer::new(store.clone()),
            line_mapper: LineMapper::new(store.clone(), completion),
            store,
            taxonomy,
            config,
        }
    }

    pub fn store(&self) -> &SqliteGraphStore {
        &self.store
    }

    /// Whether the occupation's taxonomy needs refreshing
    pub async fn is_occupation_stale(&self, code: &str, threshold_days: u32) -> bool {
        self.staleness.is_stale_with_threshold(code, threshold_days).await
    }

    /// Analyze one job experience into the graph.
    ///
    /// `normalized.occupations` is taken best-first: the first occurrence of
    /// each code gets the next rank and rank 1 is primary. Optional steps that
    /// fail are recorded in the returned report and the run continues.
    pub async fn analyze(
        &self,
        job: &JobExperienceInput,
        normalized: &NormalizedJob,
        skills: &[ExtractedSkill],
    ) -> Result<AnalysisReport> {
        let experience_id = job.id.trim();
        if experience_id.is_empty() {
            return Err(Error::InvalidInput("job experience id is empty".to_string()));
        }

        let occupations = dedupe_occupations(&normalized.occupations);
        let skills = dedupe_skills(skills);
        let codes: Vec<String> = occupations.iter().map(|o| o.code.clone()).collect();

        let mut report = AnalysisReport::new(experience_id);
        info!(
            run_id = %report.run_id,
            experience_id = %experience_id,
            occupations = occupations.len(),
            skills = skills.len(),
            "Starting job analysis"
        );

        // CLEANUP
        match self.cleanup(experience_id).await {
            Ok(cleared) => {
                report.edges_cleared = cleared;
                report.record(AnalysisStep::Cleanup, StepOutcome::Completed);
            }
            Err(e) => return Err(self.abort(&mut report, AnalysisStep::Cleanup, e)),
        }

        // INGEST_TAXONOMY
        let fetched = self.refresh_taxonomy(&codes, &mut report).await;

        // WRITE_OCCUPATIONS_AND_EXPERIENCE
        if let Err(e) = self.write_occupations_and_experience(job, normalized, &occupations).await {
            return Err(self.abort(&mut report, AnalysisStep::WriteOccupationsAndExperience, e));
        }
        report.record(AnalysisStep::WriteOccupationsAndExperience, StepOutcome::Completed);

        // WRITE_SKILLS
        match self.write_skills(experience_id, &skills).await {
            Ok(written) => {
                report.skills_written = written;
                report.record(AnalysisStep::WriteSkills, StepOutcome::Completed);
            }
            Err(e) => return Err(self.abort(&mut report, AnalysisStep::WriteSkills, e)),
        }

        // MAP_OCCUPATION_RANKS
        match self.map_occupation_ranks(experience_id, &occupations).await {
            Ok(mapped) => {
                report.occupations_mapped = mapped;
                report.record(AnalysisStep::MapOccupationRanks, StepOutcome::Completed);
            }
            Err(e) => return Err(self.abort(&mut report, AnalysisStep::MapOccupationRanks, e)),
        }

        // MAP_SKILLS_TO_TAXONOMY
        if skills.is_empty() {
            report.record(
                AnalysisStep::MapSkillsToTaxonomy,
                StepOutcome::Skipped("no skills".to_string()),
            );
        } else {
            match self.mapper.map(experience_id, &skills, &codes, &fetched).await {
                Ok(outcome) => {
                    let step_outcome = match outcome.strategy {
                        MappingStrategy::Skipped => {
                            StepOutcome::Skipped("no taxonomy to map against".to_string())
                        }
                        _ => StepOutcome::Completed,
                    };
                    report.mapping = Some(outcome);
                    report.record(AnalysisStep::MapSkillsToTaxonomy, step_outcome);
                }
                Err(e) => self.note_failure(&mut report, AnalysisStep::MapSkillsToTaxonomy, e),
            }
        }

        // DECOMPOSE_DESCRIPTION
        self.decompose_description(job, &codes, &mut report).await;

        report.finish();
        info!(
            run_id = %report.run_id,
            experience_id = %experience_id,
            complete = report.is_complete(),
            failed_steps = report.failed_steps().len(),
            "Finished job analysis"
        );
        Ok(report)
    }

    async fn cleanup(&self, experience_id: &str) -> Result<u64> {
        let mut tx = self.store.begin().await?;
        let cleared = tx.delete_incident_edges(&NodeRef::experience(experience_id)).await?;
        tx.commit().await?;
        info!(experience_id = %experience_id, cleared, "Cleared previous analysis edges");
        Ok(cleared)
    }

    /// Refresh stale occupations. Payloads are fetched concurrently and
    /// ingested one transaction at a time; the payloads fetched are returned
    /// for the mapping fallback.
    async fn refresh_taxonomy(
        &self,
        codes: &[String],
        report: &mut AnalysisReport,
    ) -> Vec<OccupationTaxonomy> {
        let mut stale = Vec::new();
        for code in codes {
            if self.staleness.is_stale(code).await {
                stale.push(code.clone());
            }
        }

        if stale.is_empty() {
            report.record(
                AnalysisStep::IngestTaxonomy,
                StepOutcome::Skipped("taxonomy is fresh".to_string()),
            );
            return Vec::new();
        }

        let results = join_all(stale.iter().map(|code| self.taxonomy.fetch_occupation(code))).await;

        let mut fetched = Vec::new();
        for (code, result) in stale.iter().zip(results) {
            let payload = match result {
                Ok(payload) => payload,
                Err(e) => {
                    warn!(code = %code, error = %e, "Taxonomy fetch failed");
                    let outcome = StepOutcome::Failed(e.to_string());
                    report.record_for(AnalysisStep::IngestTaxonomy, code, outcome);
                    continue;
                }
            };

            match self.ingestor.ingest(code, &payload).await {
                Ok(summary) => {
                    report.ingested.push(summary);
                    report.record_for(AnalysisStep::IngestTaxonomy, code, StepOutcome::Completed);
                }
                Err(e) => {
                    warn!(code = %code, error = %e, "Taxonomy ingestion failed");
                    let outcome = StepOutcome::Failed(e.to_string());
                    report.record_for(AnalysisStep::IngestTaxonomy, code, outcome);
                }
            }
            fetched.push(payload);
        }
        fetched
    }

    async fn write_occupations_and_experience(
        &self,
        job: &JobExperienceInput,
        normalized: &NormalizedJob,
        occupations: &[NormalizedOccupation],
    ) -> Result<()> {
        let mut tx = self.store.begin().await?;
        let now = tx.now();

        for occupation in occupations {
            tx.merge_occupation(&OccupationNode {
                code: occupation.code.clone(),
                title: occupation.title.clone(),
                confidence: Some(occupation.confidence),
                seniority_level: normalized.seniority.clone(),
                technical_depth: normalized.technical_depth,
                has_leadership: normalized.has_leadership,
            })
            .await?;
        }

        tx.merge_job_experience(&JobExperienceNode {
            id: job.id.trim().to_string(),
            resume_id: job.resume_id.clone(),
            original_title: job.title.clone(),
            normalized_title: normalized.normalized_title.clone(),
            company: job.company.clone(),
            start_date: job.start_date,
            end_date: job.end_date,
            seniority: normalized.seniority.clone(),
            description: job.description.clone(),
            analyzed_at: Some(now),
        })
        .await?;

        tx.commit().await
    }

    async fn write_skills(&self, experience_id: &str, skills: &[ExtractedSkill]) -> Result<usize> {
        let mut tx = self.store.begin().await?;
        let mut written = 0;

        for skill in skills {
            let node = SkillNode {
                name: skill.name.trim().to_string(),
                category: skill.category.clone(),
                subcategory: skill.subcategory.clone(),
                is_technical: skill.is_technical,
            };
            let Some(node) = tx.merge_skill(&node).await? else {
                continue;
            };
            let requirement = SkillRequirement {
                proficiency_level: skill.proficiency_level,
                is_primary: skill.is_primary,
                mentioned_count: skill.mentioned_count,
            };
            if tx.link_skill(experience_id, &node.id, &requirement).await? {
                written += 1;
            }
        }

        tx.commit().await?;
        Ok(written)
    }

    async fn map_occupation_ranks(
        &self,
        experience_id: &str,
        occupations: &[NormalizedOccupation],
    ) -> Result<usize> {
        let mut tx = self.store.begin().await?;
        let mut mapped = 0;

        for (index, occupation) in occupations.iter().enumerate() {
            let mapping = OccupationMapping {
                confidence: occupation.confidence,
                is_primary: index == 0,
                rank: index as u32 + 1,
            };
            if tx.link_occupation(experience_id, &occupation.code, &mapping).await? {
                mapped += 1;
            }
        }

        tx.commit().await?;
        Ok(mapped)
    }

    async fn decompose_description(
        &self,
        job: &JobExperienceInput,
        codes: &[String],
        report: &mut AnalysisReport,
    ) {
        let experience_id = job.id.trim();
        let lines = match self
            .decomposer
            .decompose(experience_id, job.description.as_deref())
            .await
        {
            Ok(lines) => lines,
            Err(e) => {
                self.note_failure(report, AnalysisStep::DecomposeDescription, e);
                return;
            }
        };
        report.description_lines = lines.len();

        if lines.is_empty() {
            report.record(
                AnalysisStep::DecomposeDescription,
                StepOutcome::Skipped("description has no lines".to_string()),
            );
            return;
        }
        if !self.config.line_mapping {
            report.record(AnalysisStep::DecomposeDescription, StepOutcome::Completed);
            return;
        }

        match self.line_mapper.map_lines(experience_id, &lines, codes).await {
            Ok(outcome) => {
                report.line_mapping = Some(outcome);
                report.record(AnalysisStep::DecomposeDescription, StepOutcome::Completed);
            }
            Err(e) => self.note_failure(report, AnalysisStep::DecomposeDescription, e),
        }
    }

    /// Record an optional step's failure and carry on
    fn note_failure(&self, report: &mut AnalysisReport, step: AnalysisStep, e: Error) {
        warn!(
            run_id = %report.run_id,
            experience_id = %report.experience_id,
            step = %step,
            error = %e,
            "Analysis step failed, continuing"
        );
        report.record(step, StepOutcome::Failed(e.to_string()));
    }

    /// Record a required step's failure and build the error ending the run
    fn abort(&self, report: &mut AnalysisReport, step: AnalysisStep, e: Error) -> Error {
        error!(
            run_id = %report.run_id,
            experience_id = %report.experience_id,
            step = %step,
            error = %e,
            "Analysis aborted"
        );
        report.record(step, StepOutcome::Failed(e.to_string()));
        Error::AnalysisFailed {
            experience_id: report.experience_id.clone(),
            step: step.to_string(),
            message: e.to_string(),
        }
    }
}

/// Trimmed, non-empty codes; first occurrence of each code wins
fn dedupe_occupations(occupations: &[NormalizedOccupation]) -> Vec<NormalizedOccupation> {
    let mut seen = HashSet::new();
    occupations
        .iter()
        .filter_map(|o| {
            let code = o.code.trim();
            (!code.is_empty() && seen.insert(code.to_string())).then(|| NormalizedOccupation {
                code: code.to_string(),
                ..o.clone()
            })
        })
        .collect()
}

/// First occurrence of each graph key wins; unkeyable names are dropped
fn dedupe_skills(skills: &[ExtractedSkill]) -> Vec<ExtractedSkill> {
    let mut seen = HashSet::new();
    skills
        .iter()
        .filter(|s| {
            let id = s.id();
            !id.is_empty() && seen.insert(id)
        })
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dedupe_occupations_keeps_first() {
        let occupations = vec![
            NormalizedOccupation::new("15-1252.00", "Software Developers", 0.9),
            NormalizedOccupation::new(" 15-1252.00", "Duplicate", 0.2),
            NormalizedOccupation::new("", "No code", 0.5),
            NormalizedOccupation::new("15-1253.00", "QA Analysts", 0.4),
        ];
        let deduped = dedupe_occupations(&occupations);
        assert_eq!(deduped.len(), 2);
        assert_eq!(deduped[0].title, "Software Developers");
        assert_eq!(deduped[1].code, "15-1253.00");
    }

    #[test]
    fn test_dedupe_skills_by_key() {
        let skills = vec![
            ExtractedSkill::new("Spring Boot").primary(),
            ExtractedSkill::new("spring-boot"),
            ExtractedSkill::new("***"),
            ExtractedSkill::new("Java"),
        ];
        let deduped = dedupe_skills(&skills);
        assert_eq!(deduped.len(), 2);
        assert!(deduped[0].is_primary);
    }
}
