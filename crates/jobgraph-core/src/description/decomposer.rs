//! Persisting description lines

use tracing::{debug, info};

use crate::error::Result;
use crate::graph::{DescriptionLineNode, SqliteGraphStore};

use super::split::{SplitLine, split_description};

#[derive(Debug, Clone)]
pub struct DescriptionDecomposer {
    store: SqliteGraphStore,
}

impl DescriptionDecomposer {
    pub fn new(store: SqliteGraphStore) -> Self {
        Self { store }
    }

    /// Replace the job's DescriptionLine nodes with the lines of
    /// `description` and return them in order. A missing or empty
    /// description still removes the previous lines.
    pub async fn decompose(
        &self,
        experience_id: &str,
        description: Option<&str>,
    ) -> Result<Vec<SplitLine>> {
        let lines = description.map(split_description).unwrap_or_default();

        let mut tx = self.store.begin().await?;
        let removed = tx.delete_description_lines(experience_id).await?;

        for line in &lines {
            tx.merge_description_line(&DescriptionLineNode {
                experience_id: experience_id.to_string(),
                sequence: line.sequence,
                text: line.text.clone(),
            })
            .await?;
            tx.link_description_line(experience_id, line.sequence).await?;
            debug!(
                experience_id = %experience_id,
                sequence = line.sequence,
                "Wrote description line"
            );
        }
        tx.commit().await?;

        info!(
            experience_id = %experience_id,
            lines = lines.len(),
            removed,
            "Decomposed job description"
        );
        Ok(lines)
    }
}
