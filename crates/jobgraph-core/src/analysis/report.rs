//! Per-run record of what each pipeline step did

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::description::LineMappingOutcome;
use crate::mapping::MappingOutcome;
use crate::taxonomy::IngestionSummary;

/// Pipeline steps, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AnalysisStep {
    Cleanup,
    IngestTaxonomy,
    WriteOccupationsAndExperience,
    WriteSkills,
    MapOccupationRanks,
    MapSkillsToTaxonomy,
    DecomposeDescription,
}

impl AnalysisStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisStep::Cleanup => "CLEANUP",
            AnalysisStep::IngestTaxonomy => "INGEST_TAXONOMY",
            AnalysisStep::WriteOccupationsAndExperience => "WRITE_OCCUPATIONS_AND_EXPERIENCE",
            AnalysisStep::WriteSkills => "WRITE_SKILLS",
            AnalysisStep::MapOccupationRanks => "MAP_OCCUPATION_RANKS",
            AnalysisStep::MapSkillsToTaxonomy => "MAP_SKILLS_TO_TAXONOMY",
            AnalysisStep::DecomposeDescription => "DECOMPOSE_DESCRIPTION",
        }
    }

    /// A failed required step ends the run with an error
    pub fn is_required(&self) -> bool {
        matches!(
            self,
            AnalysisStep::Cleanup
                | AnalysisStep::WriteOccupationsAndExperience
                | AnalysisStep::WriteSkills
                | AnalysisStep::MapOccupationRanks
        )
    }
}

impl std::fmt::Display for AnalysisStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum StepOutcome {
    Completed,
    Skipped(String),
    Failed(String),
}

impl StepOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, StepOutcome::Failed(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepRecord {
    pub step: AnalysisStep,
    /// What the step ran for, e.g. the occupation code of a taxonomy refresh
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(flatten)]
    pub outcome: StepOutcome,
}

/// Everything one `analyze` call did, including steps that failed without
/// ending the run
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
    pub run_id: Uuid,
    pub experience_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub steps: Vec<StepRecord>,
    /// Edges removed by CLEANUP
    pub edges_cleared: u64,
    pub ingested: Vec<IngestionSummary>,
    pub occupations_mapped: usize,
    pub skills_written: usize,
    pub mapping: Option<MappingOutcome>,
    pub description_lines: usize,
    pub line_mapping: Option<LineMappingOutcome>,
}

impl AnalysisReport {
    pub fn new(experience_id: impl Into<String>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            experience_id: experience_id.into(),
            started_at: Utc::now(),
            finished_at: None,
            steps: Vec::new(),
            edges_cleared: 0,
            ingested: Vec::new(),
            occupations_mapped: 0,
            skills_written: 0,
            mapping: None,
            description_lines: 0,
            line_mapping: None,
        }
    }

    pub fn record(&mut self, step: AnalysisStep, outcome: StepOutcome) {
        self.steps.push(StepRecord {
            step,
            subject: None,
            outcome,
        });
    }

    pub fn record_for(
        &mut self,
        step: AnalysisStep,
        subject: impl Into<String>,
        outcome: StepOutcome,
    ) {
        self.steps.push(StepRecord {
            step,
            subject: Some(subject.into()),
            outcome,
        });
    }

    /// True when no step failed
    pub fn is_complete(&self) -> bool {
        !self.steps.iter().any(|s| s.outcome.is_failed())
    }

    pub fn failed_steps(&self) -> Vec<&StepRecord> {
        self.steps.iter().filter(|s| s.outcome.is_failed()).collect()
    }

    pub fn outcome_of(&self, step: AnalysisStep) -> Option<&StepOutcome> {
        self.steps.iter().find(|s| s.step == step).map(|s| &s.outcome)
    }

    pub(crate) fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_success_is_visible() {
        let mut report = AnalysisReport::new("exp-1");
        report.record(AnalysisStep::Cleanup, StepOutcome::Completed);
        report.record_for(
            AnalysisStep::IngestTaxonomy,
            "15-1252.00",
            StepOutcome::Failed("taxonomy API unreachable".to_string()),
        );
        report.record(
            AnalysisStep::DecomposeDescription,
            StepOutcome::Skipped("no description".to_string()),
        );

        assert!(!report.is_complete());
        let failed = report.failed_steps();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].subject.as_deref(), Some("15-1252.00"));
        assert_eq!(report.outcome_of(AnalysisStep::Cleanup), Some(&StepOutcome::Completed));
        assert_eq!(report.outcome_of(AnalysisStep::WriteSkills), None);
    }

    #[test]
    fn test_required_steps() {
        assert!(AnalysisStep::Cleanup.is_required());
        assert!(AnalysisStep::MapOccupationRanks.is_required());
        assert!(!AnalysisStep::IngestTaxonomy.is_required());
        assert!(!AnalysisStep::DecomposeDescription.is_required());
    }

    #[test]
    fn test_step_record_json() {
        let record = StepRecord {
            step: AnalysisStep::MapSkillsToTaxonomy,
            subject: None,
            outcome: StepOutcome::Skipped("no taxonomy".to_string()),
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["step"], "MAP_SKILLS_TO_TAXONOMY");
        assert_eq!(json["status"], "skipped");
        assert_eq!(json["detail"], "no taxonomy");
    }
}
