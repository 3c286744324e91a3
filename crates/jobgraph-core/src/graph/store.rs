//! SQLite-backed property graph
//!
//! Nodes live in `graph_nodes` keyed by `(label, id)` with a JSON property
//! bag; edges live in `graph_edges` keyed by type and both endpoints, so
//! there is at most one edge of a type between two nodes.
//!
//! Reads go straight to the pool. Writes go through [`GraphTransaction`],
//! one per pipeline step; dropping it without [`GraphTransaction::commit`]
//! rolls the step back.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use sqlx::{FromRow, Sqlite, SqlitePool, Transaction};
use tracing::debug;

use crate::error::{Error, Result};

use super::model::{NodeLabel, NodeRef, RelationshipType};

/// A stored node with its raw property bag
#[derive(Debug, Clone)]
pub struct NodeRecord {
    pub node: NodeRef,
    pub properties: Value,
    pub created_at: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
}

impl NodeRecord {
    /// Deserialize the property bag into a typed node
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_value(self.properties.clone())
            .map_err(|e| Error::CorruptNode(self.node.to_string(), e.to_string()))
    }
}

/// A stored edge with its raw property bag
#[derive(Debug, Clone)]
pub struct EdgeRecord {
    pub rel_type: RelationshipType,
    pub source: NodeRef,
    pub target: NodeRef,
    pub properties: Value,
}

impl EdgeRecord {
    /// Deserialize the property bag into a typed payload
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_value(self.properties.clone()).map_err(|e| {
            Error::CorruptNode(
                format!("{} -[{}]-> {}", self.source, self.rel_type, self.target),
                e.to_string(),
            )
        })
    }

    /// Read a single numeric property
    pub fn number(&self, key: &str) -> Option<f64> {
        self.properties.get(key).and_then(Value::as_f64)
    }

    /// Read a single string property
    pub fn text(&self, key: &str) -> Option<&str> {
        self.properties.get(key).and_then(Value::as_str)
    }
}

/// A taxonomy node offered as a match candidate
#[derive(Debug, Clone, PartialEq)]
pub struct TaxonomyEntry {
    pub id: String,
    pub name: String,
}

/// Taxonomy vocabulary reachable from a set of occupations, in match order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaxonomyNames {
    /// Ordered by importance (highest first), then name
    pub skills: Vec<TaxonomyEntry>,
    /// Ordered by name
    pub technologies: Vec<TaxonomyEntry>,
}

impl TaxonomyNames {
    pub fn is_empty(&self) -> bool {
        self.skills.is_empty() && self.technologies.is_empty()
    }
}

/// Activities and tasks a description line may be linked to
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EvidenceCandidates {
    pub activities: Vec<TaxonomyEntry>,
    pub tasks: Vec<TaxonomyEntry>,
}

impl EvidenceCandidates {
    pub fn is_empty(&self) -> bool {
        self.activities.is_empty() && self.tasks.is_empty()
    }
}

/// Node and edge counts
#[derive(Debug, Clone, Default, Serialize)]
pub struct GraphStats {
    pub nodes: Vec<(String, u64)>,
    pub edges: Vec<(String, u64)>,
}

impl GraphStats {
    pub fn total_nodes(&self) -> u64 {
        self.nodes.iter().map(|(_, n)| n).sum()
    }

    pub fn total_edges(&self) -> u64 {
        self.edges.iter().map(|(_, n)| n).sum()
    }
}

/// SQLite property graph store
#[derive(Debug, Clone)]
pub struct SqliteGraphStore {
    pool: SqlitePool,
}

impl SqliteGraphStore {
    /// Create a store over an already-migrated pool
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Start a write transaction for one pipeline step
    pub async fn begin(&self) -> Result<GraphTransaction> {
        let tx = self.pool.begin().await?;
        Ok(GraphTransaction {
            tx,
            now: Utc::now(),
        })
    }

    // ========== Node reads ==========

    pub async fn get_node(&self, node: &NodeRef) -> Result<Option<NodeRecord>> {
        let row: Option<NodeRow> = sqlx::query_as(
            r#"
            SELECT label, id, properties, created_at, last_updated
            FROM graph_nodes
            WHERE label = ? AND id = ?
            "#,
        )
        .bind(node.label.as_str())
        .bind(&node.id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(NodeRow::into_record).transpose()
    }

    pub async fn node_exists(&self, node: &NodeRef) -> Result<bool> {
        let (exists,): (bool,) = sqlx::query_as(
            "SELECT EXISTS(SELECT 1 FROM graph_nodes WHERE label = ? AND id = ?)",
        )
        .bind(node.label.as_str())
        .bind(&node.id)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    pub async fn list_nodes(&self, label: NodeLabel) -> Result<Vec<NodeRecord>> {
        let rows: Vec<NodeRow> = sqlx::query_as(
            r#"
            SELECT label, id, properties, created_at, last_updated
            FROM graph_nodes
            WHERE label = ?
            ORDER BY id
            "#,
        )
        .bind(label.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(NodeRow::into_record).collect()
    }

    /// When the occupation's taxonomy subgraph was last ingested
    pub async fn taxonomy_updated_at(&self, code: &str) -> Result<Option<DateTime<Utc>>> {
        let row: Option<(Option<String>,)> = sqlx::query_as(
            r#"
            SELECT json_extract(properties, '$.taxonomy_updated_at')
            FROM graph_nodes
            WHERE label = 'Occupation' AND id = ?
            "#,
        )
        .bind(code)
        .fetch_optional(&self.pool)
        .await?;

        match row.and_then(|(ts,)| ts) {
            Some(ts) => Ok(Some(parse_timestamp(&ts)?)),
            None => Ok(None),
        }
    }

    pub async fn count_nodes(&self, label: NodeLabel) -> Result<u64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM graph_nodes WHERE label = ?")
            .bind(label.as_str())
            .fetch_one(&self.pool)
            .await?;
        Ok(count as u64)
    }

    // ========== Edge reads ==========

    /// Outgoing edges of a node, optionally restricted to one type
    pub async fn edges_from(
        &self,
        node: &NodeRef,
        rel_type: Option<RelationshipType>,
    ) -> Result<Vec<EdgeRecord>> {
        let rows: Vec<EdgeRow> = sqlx::query_as(
            r#"
            SELECT rel_type, source_label, source_id, target_label, target_id, properties
            FROM graph_edges
            WHERE source_label = ? AND source_id = ? AND (? IS NULL OR rel_type = ?)
            ORDER BY rel_type, target_label, target_id
            "#,
        )
        .bind(node.label.as_str())
        .bind(&node.id)
        .bind(rel_type.map(|r| r.as_str()))
        .bind(rel_type.map(|r| r.as_str()))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(EdgeRow::into_record).collect()
    }

    /// Incoming edges of a node, optionally restricted to one type
    pub async fn edges_to(
        &self,
        node: &NodeRef,
        rel_type: Option<RelationshipType>,
    ) -> Result<Vec<EdgeRecord>> {
        let rows: Vec<EdgeRow> = sqlx::query_as(
            r#"
            SELECT rel_type, source_label, source_id, target_label, target_id, properties
            FROM graph_edges
            WHERE target_label = ? AND target_id = ? AND (? IS NULL OR rel_type = ?)
            ORDER BY rel_type, source_label, source_id
            "#,
        )
        .bind(node.label.as_str())
        .bind(&node.id)
        .bind(rel_type.map(|r| r.as_str()))
        .bind(rel_type.map(|r| r.as_str()))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(EdgeRow::into_record).collect()
    }

    pub async fn count_edges(&self, rel_type: RelationshipType) -> Result<u64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM graph_edges WHERE rel_type = ?")
            .bind(rel_type.as_str())
            .fetch_one(&self.pool)
            .await?;
        Ok(count as u64)
    }

    // ========== Taxonomy reads ==========

    /// Taxonomy skills and technologies of the given occupations, de-duplicated
    /// in first-seen order across occupations
    pub async fn taxonomy_names(&self, codes: &[String]) -> Result<TaxonomyNames> {
        let mut names = TaxonomyNames::default();

        for code in codes {
            let skills = self
                .occupation_targets(
                    code,
                    RelationshipType::RequiresSkill,
                    NodeLabel::TaxonomySkill,
                    true,
                )
                .await?;
            push_unique(&mut names.skills, skills);

            let technologies = self
                .occupation_targets(
                    code,
                    RelationshipType::UsesTechnology,
                    NodeLabel::Technology,
                    false,
                )
                .await?;
            push_unique(&mut names.technologies, technologies);
        }

        Ok(names)
    }

    /// Activities and tasks of the given occupations, most important first
    pub async fn evidence_candidates(&self, codes: &[String]) -> Result<EvidenceCandidates> {
        let mut candidates = EvidenceCandidates::default();

        for code in codes {
            let activities = self
                .occupation_targets(
                    code,
                    RelationshipType::RequiresActivity,
                    NodeLabel::Activity,
                    true,
                )
                .await?;
            push_unique(&mut candidates.activities, activities);

            let tasks = self
                .occupation_targets(code, RelationshipType::RequiresTask, NodeLabel::Task, true)
                .await?;
            push_unique(&mut candidates.tasks, tasks);
        }

        Ok(candidates)
    }

    async fn occupation_targets(
        &self,
        code: &str,
        rel_type: RelationshipType,
        label: NodeLabel,
        by_importance: bool,
    ) -> Result<Vec<TaxonomyEntry>> {
        let rows: Vec<(String, Option<String>)> = sqlx::query_as(
            r#"
            SELECT n.id, json_extract(n.properties, '$.name') AS name
            FROM graph_edges e
            JOIN graph_nodes n ON n.label = e.target_label AND n.id = e.target_id
            WHERE e.source_label = 'Occupation' AND e.source_id = ?
              AND e.rel_type = ? AND e.target_label = ?
            ORDER BY
                CASE WHEN ?
                    THEN COALESCE(json_extract(e.properties, '$.importance'), 0)
                    ELSE 0
                END DESC,
                name
            "#,
        )
        .bind(code)
        .bind(rel_type.as_str())
        .bind(label.as_str())
        .bind(by_importance)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .filter_map(|(id, name)| name.map(|name| TaxonomyEntry { id, name }))
            .collect())
    }

    /// Node and edge counts by label and type
    pub async fn stats(&self) -> Result<GraphStats> {
        let mut stats = GraphStats::default();
        for label in NodeLabel::ALL {
            stats
                .nodes
                .push((label.to_string(), self.count_nodes(label).await?));
        }
        for rel_type in RelationshipType::ALL {
            stats
                .edges
                .push((rel_type.to_string(), self.count_edges(rel_type).await?));
        }
        Ok(stats)
    }
}

fn push_unique(into: &mut Vec<TaxonomyEntry>, entries: Vec<TaxonomyEntry>) {
    for entry in entries {
        if !into.iter().any(|e| e.id == entry.id) {
            into.push(entry);
        }
    }
}

/// Write transaction scoped to one pipeline step
pub struct GraphTransaction {
    tx: Transaction<'static, Sqlite>,
    now: DateTime<Utc>,
}

impl GraphTransaction {
    /// Timestamp stamped on everything this transaction touches
    pub fn now(&self) -> DateTime<Utc> {
        self.now
    }

    /// Upsert a node. Supplied properties replace stored ones key by key;
    /// keys not supplied are kept, keys supplied as `null` are removed.
    pub async fn merge_node<P: Serialize>(
        &mut self,
        node: &NodeRef,
        properties: &P,
    ) -> Result<()> {
        let properties = object_json(properties)?;
        let now = self.now.to_rfc3339();

        // The update patches with the bound bag, not `excluded.properties`:
        // the insert side has already stripped its nulls.
        sqlx::query(
            r#"
            INSERT INTO graph_nodes (label, id, properties, created_at, last_updated)
            VALUES (?, ?, json_patch('{}', ?), ?, ?)
            ON CONFLICT(label, id) DO UPDATE SET
                properties = json_patch(graph_nodes.properties, ?),
                last_updated = excluded.last_updated
            "#,
        )
        .bind(node.label.as_str())
        .bind(&node.id)
        .bind(&properties)
        .bind(&now)
        .bind(&now)
        .bind(&properties)
        .execute(&mut *self.tx)
        .await?;

        debug!(node = %node, "Node merged");
        Ok(())
    }

    /// Merge properties into an existing node; returns `false` if it doesn't exist
    pub async fn patch_node<P: Serialize>(
        &mut self,
        node: &NodeRef,
        properties: &P,
    ) -> Result<bool> {
        let properties = object_json(properties)?;

        let result = sqlx::query(
            r#"
            UPDATE graph_nodes
            SET properties = json_patch(properties, ?), last_updated = ?
            WHERE label = ? AND id = ?
            "#,
        )
        .bind(&properties)
        .bind(self.now.to_rfc3339())
        .bind(node.label.as_str())
        .bind(&node.id)
        .execute(&mut *self.tx)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Upsert an edge between two existing nodes.
    ///
    /// Returns `false` without writing when either endpoint is missing.
    /// On conflict the edge's properties are replaced.
    pub async fn merge_edge<P: Serialize>(
        &mut self,
        rel_type: RelationshipType,
        source: &NodeRef,
        target: &NodeRef,
        properties: &P,
    ) -> Result<bool> {
        let properties = object_json(properties)?;
        let now = self.now.to_rfc3339();

        let result = sqlx::query(
            r#"
            INSERT INTO graph_edges (
                rel_type, source_label, source_id, target_label, target_id,
                properties, created_at, updated_at
            )
            SELECT ?, ?, ?, ?, ?, ?, ?, ?
            WHERE EXISTS (SELECT 1 FROM graph_nodes WHERE label = ? AND id = ?)
              AND EXISTS (SELECT 1 FROM graph_nodes WHERE label = ? AND id = ?)
            ON CONFLICT(rel_type, source_label, source_id, target_label, target_id) DO UPDATE SET
                properties = excluded.properties,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(rel_type.as_str())
        .bind(source.label.as_str())
        .bind(&source.id)
        .bind(target.label.as_str())
        .bind(&target.id)
        .bind(&properties)
        .bind(&now)
        .bind(&now)
        .bind(source.label.as_str())
        .bind(&source.id)
        .bind(target.label.as_str())
        .bind(&target.id)
        .execute(&mut *self.tx)
        .await?;

        let written = result.rows_affected() > 0;
        if written {
            debug!(rel = %rel_type, source = %source, target = %target, "Edge merged");
        } else {
            debug!(
                rel = %rel_type,
                source = %source,
                target = %target,
                "Edge endpoint missing, skipped"
            );
        }
        Ok(written)
    }

    pub async fn node_exists(&mut self, node: &NodeRef) -> Result<bool> {
        let (exists,): (bool,) = sqlx::query_as(
            "SELECT EXISTS(SELECT 1 FROM graph_nodes WHERE label = ? AND id = ?)",
        )
        .bind(node.label.as_str())
        .bind(&node.id)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(exists)
    }

    /// Delete every edge touching the node, in either direction
    pub async fn delete_incident_edges(&mut self, node: &NodeRef) -> Result<u64> {
        let result = sqlx::query(
            r#"
            DELETE FROM graph_edges
            WHERE (source_label = ? AND source_id = ?)
               OR (target_label = ? AND target_id = ?)
            "#,
        )
        .bind(node.label.as_str())
        .bind(&node.id)
        .bind(node.label.as_str())
        .bind(&node.id)
        .execute(&mut *self.tx)
        .await?;

        Ok(result.rows_affected())
    }

    /// Delete the node and every edge touching it
    pub async fn detach_delete(&mut self, node: &NodeRef) -> Result<bool> {
        self.delete_incident_edges(node).await?;

        let result = sqlx::query("DELETE FROM graph_nodes WHERE label = ? AND id = ?")
            .bind(node.label.as_str())
            .bind(&node.id)
            .execute(&mut *self.tx)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Set a top-level timestamp property on an existing node
    pub(crate) async fn set_timestamp_property(
        &mut self,
        node: &NodeRef,
        key: &str,
        at: DateTime<Utc>,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE graph_nodes
            SET properties = json_set(properties, '$.' || ?, ?), last_updated = ?
            WHERE label = ? AND id = ?
            "#,
        )
        .bind(key)
        .bind(at.to_rfc3339())
        .bind(self.now.to_rfc3339())
        .bind(node.label.as_str())
        .bind(&node.id)
        .execute(&mut *self.tx)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    pub(crate) fn connection(&mut self) -> &mut sqlx::SqliteConnection {
        &mut self.tx
    }

    pub async fn commit(self) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }

    pub async fn rollback(self) -> Result<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}

fn object_json<P: Serialize>(properties: &P) -> Result<String> {
    let value = serde_json::to_value(properties)?;
    if !value.is_object() {
        return Err(Error::InvalidInput(
            "graph properties must serialize to a JSON object".to_string(),
        ));
    }
    Ok(value.to_string())
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::Other(format!("Invalid timestamp '{}': {}", s, e)))
}

#[derive(FromRow)]
struct NodeRow {
    label: String,
    id: String,
    properties: String,
    created_at: String,
    last_updated: String,
}

impl NodeRow {
    fn into_record(self) -> Result<NodeRecord> {
        let label = NodeLabel::parse(&self.label).ok_or_else(|| {
            Error::CorruptNode(self.id.clone(), format!("unknown label {}", self.label))
        })?;
        Ok(NodeRecord {
            properties: serde_json::from_str(&self.properties)?,
            created_at: parse_timestamp(&self.created_at)?,
            last_updated: parse_timestamp(&self.last_updated)?,
            node: NodeRef::new(label, self.id),
        })
    }
}

#[derive(FromRow)]
struct EdgeRow {
    rel_type: String,
    source_label: String,
    source_id: String,
    target_label: String,
    target_id: String,
    properties: String,
}

impl EdgeRow {
    fn into_record(self) -> Result<EdgeRecord> {
        let corrupt = |what: &str| Error::CorruptNode(self.source_id.clone(), what.to_string());
        let rel_type = RelationshipType::parse(&self.rel_type)
            .ok_or_else(|| corrupt("unknown relationship type"))?;
        let source_label = NodeLabel::parse(&self.source_label)
            .ok_or_else(|| corrupt("unknown source label"))?;
        let target_label = NodeLabel::parse(&self.target_label)
            .ok_or_else(|| corrupt("unknown target label"))?;

        Ok(EdgeRecord {
            rel_type,
            properties: serde_json::from_str(&self.properties)?,
            source: NodeRef::new(source_label, self.source_id),
            target: NodeRef::new(target_label, self.target_id),
        })
    }
}
