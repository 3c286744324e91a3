//! Writes one occupation's taxonomy payload into the graph

use serde::Serialize;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::graph::{
    ActivityNode, GraphTransaction, NodeRef, SqliteGraphStore, TaskNode, TaxonomyRequirement,
    TaxonomySkillNode, TechnologyNode,
};

use super::payload::{OccupationTaxonomy, TaxonomyRecord};

/// Task category used when the payload doesn't give one
pub const DEFAULT_TASK_CATEGORY: &str = "Core";

/// What a single ingestion wrote
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IngestionSummary {
    pub code: String,
    pub skills: usize,
    pub technologies: usize,
    pub categories: usize,
    pub tasks: usize,
    pub activities: usize,
    /// Records without a usable name
    pub skipped: usize,
}

impl IngestionSummary {
    pub fn total_written(&self) -> usize {
        self.skills + self.technologies + self.tasks + self.activities
    }
}

#[derive(Debug, Clone)]
pub struct TaxonomyIngestor {
    store: SqliteGraphStore,
}

impl TaxonomyIngestor {
    pub fn new(store: SqliteGraphStore) -> Self {
        Self { store }
    }

    /// Upsert every record of the payload and its Occupation edge, then stamp
    /// `taxonomy_updated_at`. Runs as one transaction.
    pub async fn ingest(
        &self,
        code: &str,
        taxonomy: &OccupationTaxonomy,
    ) -> Result<IngestionSummary> {
        let code = code.trim();
        if code.is_empty() {
            return Err(Error::InvalidInput("occupation code is empty".to_string()));
        }

        let mut tx = self.store.begin().await?;
        let mut summary = IngestionSummary {
            code: code.to_string(),
            ..Default::default()
        };

        tx.merge_occupation_summary(
            code,
            taxonomy.title.as_deref(),
            taxonomy.description.as_deref(),
        )
        .await?;

        for record in &taxonomy.skills {
            let Some(name) = record.clean_name() else {
                summary.skipped += 1;
                continue;
            };
            let node = TaxonomySkillNode {
                name,
                importance: record.score(),
            };
            match tx.merge_taxonomy_skill(&node).await? {
                Some(target) => {
                    require(&mut tx, code, &target, record, None).await?;
                    summary.skills += 1;
                }
                None => summary.skipped += 1,
            }
        }

        for record in &taxonomy.technologies {
            let Some(name) = record.clean_name() else {
                summary.skipped += 1;
                continue;
            };
            let category = record.clean_category();
            let node = TechnologyNode {
                name,
                category: category.clone(),
            };
            let Some(target) = tx.merge_technology(&node).await? else {
                summary.skipped += 1;
                continue;
            };
            require(&mut tx, code, &target, record, None).await?;
            summary.technologies += 1;

            if let Some(category) = category
                && let Some(category_node) = tx.merge_technology_category(&category).await?
            {
                tx.link_technology_category(&target.id, &category_node.id).await?;
                summary.categories += 1;
            }
        }

        for record in &taxonomy.tasks {
            let Some(name) = record.clean_name() else {
                summary.skipped += 1;
                continue;
            };
            let category = record
                .clean_category()
                .unwrap_or_else(|| DEFAULT_TASK_CATEGORY.to_string());
            let node = TaskNode {
                name,
                importance: record.score(),
                category: category.clone(),
            };
            match tx.merge_task(&node).await? {
                Some(target) => {
                    require(&mut tx, code, &target, record, Some(category)).await?;
                    summary.tasks += 1;
                }
                None => summary.skipped += 1,
            }
        }

        for record in &taxonomy.activities {
            let Some(name) = record.clean_name() else {
                summary.skipped += 1;
                continue;
            };
            let node = ActivityNode {
                name,
                importance: record.score(),
            };
            match tx.merge_activity(&node).await? {
                Some(target) => {
                    require(&mut tx, code, &target, record, None).await?;
                    summary.activities += 1;
                }
                None => summary.skipped += 1,
            }
        }

        let now = tx.now();
        tx.stamp_taxonomy_updated_at(code, now).await?;
        tx.commit().await?;

        info!(
            code = %code,
            skills = summary.skills,
            technologies = summary.technologies,
            tasks = summary.tasks,
            activities = summary.activities,
            skipped = summary.skipped,
            "Ingested occupation taxonomy"
        );

        Ok(summary)
    }
}

async fn require(
    tx: &mut GraphTransaction,
    code: &str,
    target: &NodeRef,
    record: &TaxonomyRecord,
    category: Option<String>,
) -> Result<()> {
    let requirement = TaxonomyRequirement {
        importance: record.score(),
        category,
    };
    tx.link_occupation_requirement(code, target, &requirement).await?;
    debug!(code = %code, target = %target, "Linked taxonomy requirement");
    Ok(())
}
