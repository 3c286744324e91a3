//! Typed upserts for every node and edge kind of the career graph
//!
//! Shared vocabulary nodes are keyed through [`slug`] / [`task_slug`]; a name
//! that slugs to nothing is skipped and reported as `None`.

use chrono::{DateTime, Utc};
use serde_json::json;

use crate::error::{Error, Result};

use super::identity::{slug, task_slug};
use super::model::{
    ActivityNode, Demonstration, DescriptionLineNode, JobExperienceNode, LineEvidence,
    LineMetadata, LineSequence, NodeLabel, NodeRef, OccupationMapping, OccupationNode,
    RelationshipType, SkillNode, SkillRequirement, TaskNode, TaxonomyRequirement,
    TaxonomySkillNode, TechnologyNode, TechnologyRelation,
};
use super::store::GraphTransaction;

impl GraphTransaction {
    // ========== Nodes ==========

    pub async fn merge_occupation(&mut self, occupation: &OccupationNode) -> Result<NodeRef> {
        if occupation.code.trim().is_empty() {
            return Err(Error::InvalidInput("occupation code is empty".to_string()));
        }
        let node = NodeRef::occupation(occupation.code.trim());
        self.merge_node(&node, occupation).await?;
        Ok(node)
    }

    /// Refresh an occupation's title and description from taxonomy data
    /// without touching job-specific attributes
    pub async fn merge_occupation_summary(
        &mut self,
        code: &str,
        title: Option<&str>,
        description: Option<&str>,
    ) -> Result<NodeRef> {
        let node = NodeRef::occupation(code);
        let mut properties = json!({ "code": code });
        if let Some(title) = title.filter(|t| !t.trim().is_empty()) {
            properties["title"] = json!(title);
        }
        if let Some(description) = description.filter(|d| !d.trim().is_empty()) {
            properties["description"] = json!(description);
        }
        self.merge_node(&node, &properties).await?;
        Ok(node)
    }

    pub async fn merge_job_experience(
        &mut self,
        experience: &JobExperienceNode,
    ) -> Result<NodeRef> {
        if experience.id.trim().is_empty() {
            return Err(Error::InvalidInput("job experience id is empty".to_string()));
        }
        let node = NodeRef::experience(&experience.id);
        self.merge_node(&node, experience).await?;
        Ok(node)
    }

    pub async fn stamp_analyzed_at(
        &mut self,
        experience_id: &str,
        at: DateTime<Utc>,
    ) -> Result<bool> {
        self.set_timestamp_property(&NodeRef::experience(experience_id), "analyzed_at", at)
            .await
    }

    pub async fn merge_skill(&mut self, skill: &SkillNode) -> Result<Option<NodeRef>> {
        self.merge_named(NodeLabel::Skill, slug(&skill.name), skill).await
    }

    pub async fn merge_taxonomy_skill(
        &mut self,
        skill: &TaxonomySkillNode,
    ) -> Result<Option<NodeRef>> {
        self.merge_named(NodeLabel::TaxonomySkill, slug(&skill.name), skill)
            .await
    }

    pub async fn merge_technology(
        &mut self,
        technology: &TechnologyNode,
    ) -> Result<Option<NodeRef>> {
        self.merge_named(NodeLabel::Technology, slug(&technology.name), technology)
            .await
    }

    pub async fn merge_technology_category(&mut self, name: &str) -> Result<Option<NodeRef>> {
        self.merge_named(NodeLabel::TechnologyCategory, slug(name), &json!({ "name": name }))
            .await
    }

    pub async fn merge_task(&mut self, task: &TaskNode) -> Result<Option<NodeRef>> {
        self.merge_named(NodeLabel::Task, task_slug(&task.name), task).await
    }

    pub async fn merge_activity(&mut self, activity: &ActivityNode) -> Result<Option<NodeRef>> {
        self.merge_named(NodeLabel::Activity, slug(&activity.name), activity)
            .await
    }

    async fn merge_named<P: serde::Serialize>(
        &mut self,
        label: NodeLabel,
        id: String,
        properties: &P,
    ) -> Result<Option<NodeRef>> {
        if id.is_empty() {
            return Ok(None);
        }
        let node = NodeRef::new(label, id);
        self.merge_node(&node, properties).await?;
        Ok(Some(node))
    }

    pub async fn merge_description_line(&mut self, line: &DescriptionLineNode) -> Result<NodeRef> {
        let node = NodeRef::description_line(&line.experience_id, line.sequence);
        self.merge_node(&node, line).await?;
        Ok(node)
    }

    /// Attach impact annotations; `false` if the line doesn't exist
    pub async fn update_description_line_metadata(
        &mut self,
        experience_id: &str,
        sequence: u32,
        metadata: &LineMetadata,
    ) -> Result<bool> {
        self.patch_node(&NodeRef::description_line(experience_id, sequence), metadata)
            .await
    }

    /// Stamp the occupation as freshly ingested
    pub async fn stamp_taxonomy_updated_at(
        &mut self,
        code: &str,
        at: DateTime<Utc>,
    ) -> Result<bool> {
        self.set_timestamp_property(&NodeRef::occupation(code), "taxonomy_updated_at", at)
            .await
    }

    // ========== Edges ==========

    /// MAPS_TO from a job experience to an occupation
    pub async fn link_occupation(
        &mut self,
        experience_id: &str,
        code: &str,
        mapping: &OccupationMapping,
    ) -> Result<bool> {
        let mapping = OccupationMapping {
            confidence: clamp_confidence(mapping.confidence),
            ..mapping.clone()
        };
        self.merge_edge(
            RelationshipType::MapsTo,
            &NodeRef::experience(experience_id),
            &NodeRef::occupation(code),
            &mapping,
        )
        .await
    }

    /// REQUIRES_SKILL from a job experience to a free-text skill
    pub async fn link_skill(
        &mut self,
        experience_id: &str,
        skill_id: &str,
        requirement: &SkillRequirement,
    ) -> Result<bool> {
        let requirement = SkillRequirement {
            proficiency_level: requirement.proficiency_level.min(100),
            ..requirement.clone()
        };
        self.merge_edge(
            RelationshipType::RequiresSkill,
            &NodeRef::experience(experience_id),
            &NodeRef::skill(skill_id),
            &requirement,
        )
        .await
    }

    /// Occupation -> taxonomy node edge carrying the payload's importance
    pub async fn link_occupation_requirement(
        &mut self,
        code: &str,
        target: &NodeRef,
        requirement: &TaxonomyRequirement,
    ) -> Result<bool> {
        let rel_type = match target.label {
            NodeLabel::TaxonomySkill => RelationshipType::RequiresSkill,
            NodeLabel::Technology => RelationshipType::UsesTechnology,
            NodeLabel::Task => RelationshipType::RequiresTask,
            NodeLabel::Activity => RelationshipType::RequiresActivity,
            other => {
                return Err(Error::InvalidInput(format!(
                    "occupations cannot require a {} node",
                    other
                )));
            }
        };
        self.merge_edge(rel_type, &NodeRef::occupation(code), target, requirement)
            .await
    }

    pub async fn link_technology_category(
        &mut self,
        technology_id: &str,
        category_id: &str,
    ) -> Result<bool> {
        self.merge_edge(
            RelationshipType::BelongsToCategory,
            &NodeRef::new(NodeLabel::Technology, technology_id),
            &NodeRef::new(NodeLabel::TechnologyCategory, category_id),
            &json!({}),
        )
        .await
    }

    /// DEMONSTRATES from a skill to a taxonomy skill
    pub async fn link_skill_demonstrates(
        &mut self,
        skill_id: &str,
        taxonomy_skill_id: &str,
        demonstration: &Demonstration,
    ) -> Result<bool> {
        let demonstration = Demonstration {
            confidence: clamp_confidence(demonstration.confidence),
            ..demonstration.clone()
        };
        self.merge_edge(
            RelationshipType::Demonstrates,
            &NodeRef::skill(skill_id),
            &NodeRef::new(NodeLabel::TaxonomySkill, taxonomy_skill_id),
            &demonstration,
        )
        .await
    }

    /// RELATED_TO from a skill to a technology
    pub async fn link_skill_related(
        &mut self,
        skill_id: &str,
        technology_id: &str,
        relation: &TechnologyRelation,
    ) -> Result<bool> {
        let relation = TechnologyRelation {
            confidence: clamp_confidence(relation.confidence),
            ..relation.clone()
        };
        self.merge_edge(
            RelationshipType::RelatedTo,
            &NodeRef::skill(skill_id),
            &NodeRef::new(NodeLabel::Technology, technology_id),
            &relation,
        )
        .await
    }

    pub async fn link_description_line(
        &mut self,
        experience_id: &str,
        sequence: u32,
    ) -> Result<bool> {
        self.merge_edge(
            RelationshipType::HasDescriptionLine,
            &NodeRef::experience(experience_id),
            &NodeRef::description_line(experience_id, sequence),
            &LineSequence { sequence },
        )
        .await
    }

    /// DEMONSTRATES_ACTIVITY or DEMONSTRATES_TASK, chosen by the target's label.
    /// A missing target is a per-edge no-op reported as `false`.
    pub async fn link_line_evidence(
        &mut self,
        line: &NodeRef,
        target: &NodeRef,
        evidence: &LineEvidence,
    ) -> Result<bool> {
        let rel_type = match target.label {
            NodeLabel::Activity => RelationshipType::DemonstratesActivity,
            NodeLabel::Task => RelationshipType::DemonstratesTask,
            other => {
                return Err(Error::InvalidInput(format!(
                    "description lines cannot demonstrate a {} node",
                    other
                )));
            }
        };
        let evidence = LineEvidence {
            confidence: clamp_confidence(evidence.confidence),
            ..evidence.clone()
        };
        self.merge_edge(rel_type, line, target, &evidence).await
    }

    // ========== Scoped deletes ==========

    /// Remove DEMONSTRATES and RELATED_TO edges leaving the skills this job
    /// currently requires. Other skills' mappings are left alone.
    pub async fn delete_skill_mappings(&mut self, experience_id: &str) -> Result<u64> {
        let result = sqlx::query(
            r#"
            DELETE FROM graph_edges
            WHERE source_label = 'Skill'
              AND rel_type IN ('DEMONSTRATES', 'RELATED_TO')
              AND source_id IN (
                  SELECT target_id FROM graph_edges
                  WHERE rel_type = 'REQUIRES_SKILL'
                    AND source_label = 'JobExperience' AND source_id = ?
                    AND target_label = 'Skill'
              )
            "#,
        )
        .bind(experience_id)
        .execute(self.connection())
        .await?;

        Ok(result.rows_affected())
    }

    /// Detach-delete every DescriptionLine owned by the job experience.
    /// Lines are found by their `experience_id` property, not through edges.
    pub async fn delete_description_lines(&mut self, experience_id: &str) -> Result<u64> {
        sqlx::query(
            r#"
            DELETE FROM graph_edges
            WHERE (source_label = 'DescriptionLine' AND source_id IN (
                      SELECT id FROM graph_nodes
                      WHERE label = 'DescriptionLine'
                        AND json_extract(properties, '$.experience_id') = ?))
               OR (target_label = 'DescriptionLine' AND target_id IN (
                      SELECT id FROM graph_nodes
                      WHERE label = 'DescriptionLine'
                        AND json_extract(properties, '$.experience_id') = ?))
            "#,
        )
        .bind(experience_id)
        .bind(experience_id)
        .execute(self.connection())
        .await?;

        let result = sqlx::query(
            r#"
            DELETE FROM graph_nodes
            WHERE label = 'DescriptionLine'
              AND json_extract(properties, '$.experience_id') = ?
            "#,
        )
        .bind(experience_id)
        .execute(self.connection())
        .await?;

        Ok(result.rows_affected())
    }
}

fn clamp_confidence(confidence: f64) -> f64 {
    if confidence.is_nan() {
        0.0
    } else {
        confidence.clamp(0.0, 1.0)
    }
}
