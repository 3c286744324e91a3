//! Linking description lines to taxonomy activities and tasks

use std::collections::HashSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::Result;
use crate::graph::{
    EvidenceCandidates, ImpactLevel, LineEvidence, LineMetadata, NodeLabel, NodeRef, Scope,
    SqliteGraphStore, TaxonomyEntry, slug, task_slug,
};
use crate::llm::{TextCompletion, parse_completion};

use super::split::SplitLine;

const DEFAULT_EVIDENCE_CONFIDENCE: f64 = 0.5;

/// What one line-mapping pass wrote
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LineMappingOutcome {
    /// Whether the completion service was asked at all
    pub requested: bool,
    pub lines_annotated: usize,
    pub activity_links: usize,
    pub task_links: usize,
    /// Proposals naming a line or target that doesn't exist
    pub missed: usize,
}

#[derive(Debug, Default, Deserialize)]
struct LineMappingResponse {
    #[serde(default, alias = "lineMappings")]
    line_mappings: Vec<LineMappingEntry>,
}

#[derive(Debug, Deserialize)]
struct LineMappingEntry {
    sequence: u32,
    #[serde(default, alias = "impactMetrics")]
    impact_metrics: Option<String>,
    #[serde(default, alias = "hasQuantifiableImpact")]
    has_quantifiable_impact: bool,
    #[serde(default, alias = "impactLevel")]
    impact_level: Option<String>,
    #[serde(default)]
    scope: Option<String>,
    #[serde(default)]
    activities: Vec<EvidenceProposal>,
    #[serde(default)]
    tasks: Vec<EvidenceProposal>,
}

#[derive(Debug, Deserialize)]
struct EvidenceProposal {
    #[serde(alias = "activity_id", alias = "activityId", alias = "task_id", alias = "taskId")]
    id: String,
    #[serde(default = "default_confidence")]
    confidence: f64,
    #[serde(default)]
    reasoning: Option<String>,
}

fn default_confidence() -> f64 {
    DEFAULT_EVIDENCE_CONFIDENCE
}

impl LineMappingEntry {
    fn metadata(&self) -> LineMetadata {
        LineMetadata {
            impact_metrics: self
                .impact_metrics
                .as_deref()
                .map(str::trim)
                .filter(|m| !m.is_empty())
                .map(str::to_string),
            has_quantifiable_impact: self.has_quantifiable_impact,
            impact_level: self.impact_level.as_deref().and_then(ImpactLevel::parse),
            scope: self.scope.as_deref().and_then(Scope::parse),
        }
    }
}

#[derive(Clone)]
pub struct LineMapper {
    store: SqliteGraphStore,
    completion: Arc<dyn TextCompletion>,
}

impl LineMapper {
    pub fn new(store: SqliteGraphStore, completion: Arc<dyn TextCompletion>) -> Self {
        Self { store, completion }
    }

    /// Annotate `lines` with impact metadata and link them to the activities
    /// and tasks of `occupation_codes`
    pub async fn map_lines(
        &self,
        experience_id: &str,
        lines: &[SplitLine],
        occupation_codes: &[String],
    ) -> Result<LineMappingOutcome> {
        let mut outcome = LineMappingOutcome::default();
        if lines.is_empty() {
            return Ok(outcome);
        }

        let candidates = self.store.evidence_candidates(occupation_codes).await?;
        if candidates.is_empty() {
            debug!(experience_id = %experience_id, "No activities or tasks to link lines to");
            return Ok(outcome);
        }

        outcome.requested = true;
        let prompt = build_line_mapping_prompt(lines, &candidates);
        let response = self.completion.complete(&prompt).await?;
        let response: LineMappingResponse = parse_completion(&response, "line mapping object")?;

        let sequences: HashSet<u32> = lines.iter().map(|l| l.sequence).collect();
        let mut tx = self.store.begin().await?;

        for entry in &response.line_mappings {
            if !sequences.contains(&entry.sequence) {
                outcome.missed += entry.activities.len() + entry.tasks.len();
                continue;
            }
            if tx
                .update_description_line_metadata(experience_id, entry.sequence, &entry.metadata())
                .await?
            {
                outcome.lines_annotated += 1;
            }

            let line = NodeRef::description_line(experience_id, entry.sequence);
            let proposals = entry
                .activities
                .iter()
                .map(|p| (NodeRef::new(NodeLabel::Activity, slug(&p.id)), p))
                .chain(
                    entry
                        .tasks
                        .iter()
                        .map(|p| (NodeRef::new(NodeLabel::Task, task_slug(&p.id)), p)),
                );

            for (target, proposal) in proposals {
                let evidence = LineEvidence {
                    confidence: proposal.confidence,
                    reasoning: proposal.reasoning.clone(),
                };
                if !target.id.is_empty()
                    && tx.link_line_evidence(&line, &target, &evidence).await?
                {
                    match target.label {
                        NodeLabel::Activity => outcome.activity_links += 1,
                        _ => outcome.task_links += 1,
                    }
                } else {
                    debug!(line = %line, target = %target, "Evidence target not found");
                    outcome.missed += 1;
                }
            }
        }
        tx.commit().await?;

        info!(
            experience_id = %experience_id,
            annotated = outcome.lines_annotated,
            activities = outcome.activity_links,
            tasks = outcome.task_links,
            missed = outcome.missed,
            "Mapped description lines"
        );
        Ok(outcome)
    }
}

fn candidate_list(entries: &[TaxonomyEntry]) -> String {
    entries
        .iter()
        .map(|e| format!("{}|{}", e.id, e.name))
        .collect::<Vec<_>>()
        .join("\n")
}

fn build_line_mapping_prompt(lines: &[SplitLine], candidates: &EvidenceCandidates) -> String {
    let numbered = lines
        .iter()
        .map(|l| format!("{}. {}", l.sequence, l.text))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"Map each line of this job description to the O*NET work activities and tasks it demonstrates.

Description lines:
{numbered}

Work activities (id|name):
{activities}

Tasks (id|name):
{tasks}

For each line, report:
- impact_metrics: the quantified result stated in the line, if any
- has_quantifiable_impact: true if the line states a measurable result
- impact_level: Low, Medium, High or Critical
- scope: Individual, Team, Department, Company or Industry
- the activities and tasks it demonstrates, by id, with confidence 0.0-1.0 and a short reasoning

Return JSON:
{{
  "line_mappings": [
    {{
      "sequence": 1,
      "impact_metrics": "reduced latency by 40%",
      "has_quantifiable_impact": true,
      "impact_level": "High",
      "scope": "Team",
      "activities": [{{"activity_id": "<id>", "confidence": 0.9, "reasoning": "..."}}],
      "tasks": [{{"task_id": "<id>", "confidence": 0.8, "reasoning": "..."}}]
    }}
  ]
}}

Only use ids from the lists above."#,
        activities = candidate_list(&candidates.activities),
        tasks = candidate_list(&candidates.tasks),
    )
}
