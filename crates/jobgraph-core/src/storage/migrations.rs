//! Database migrations
//!
//! Schema versions for the property-graph tables. Migrations are applied
//! in order on connection and recorded in `_migrations`.

use sqlx::SqlitePool;
use tracing::{debug, info};

pub const CURRENT_VERSION: i32 = 2;

const CREATE_MIGRATIONS_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS _migrations (
        version INTEGER PRIMARY KEY NOT NULL,
        applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
    );
"#;

/// Migration 1: Node and edge tables
const MIGRATION_V1: &str = r#"
    -- Nodes are keyed by (label, id); properties hold a JSON object
    CREATE TABLE IF NOT EXISTS graph_nodes (
        label TEXT NOT NULL,
        id TEXT NOT NULL,
        properties TEXT NOT NULL DEFAULT '{}',
        created_at TEXT NOT NULL,
        last_updated TEXT NOT NULL,
        PRIMARY KEY (label, id)
    );

    CREATE INDEX IF NOT EXISTS idx_graph_nodes_label ON graph_nodes(label);

    -- At most one edge of a type between two nodes
    CREATE TABLE IF NOT EXISTS graph_edges (
        rel_type TEXT NOT NULL,
        source_label TEXT NOT NULL,
        source_id TEXT NOT NULL,
        target_label TEXT NOT NULL,
        target_id TEXT NOT NULL,
        properties TEXT NOT NULL DEFAULT '{}',
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        PRIMARY KEY (rel_type, source_label, source_id, target_label, target_id),
        FOREIGN KEY (source_label, source_id)
            REFERENCES graph_nodes(label, id) ON DELETE CASCADE,
        FOREIGN KEY (target_label, target_id)
            REFERENCES graph_nodes(label, id) ON DELETE CASCADE
    );

    CREATE INDEX IF NOT EXISTS idx_graph_edges_source ON graph_edges(source_label, source_id);
    CREATE INDEX IF NOT EXISTS idx_graph_edges_target ON graph_edges(target_label, target_id);
"#;

/// Migration 2: Lookups on node properties used by the pipeline
const MIGRATION_V2: &str = r#"
    -- Description lines are found by owning experience after CLEANUP removed their edges
    CREATE INDEX IF NOT EXISTS idx_graph_nodes_line_owner
        ON graph_nodes(json_extract(properties, '$.experience_id'))
        WHERE label = 'DescriptionLine';

    CREATE INDEX IF NOT EXISTS idx_graph_edges_type ON graph_edges(rel_type);
"#;

/// Ordered schema steps: (version, summary, SQL)
const MIGRATIONS: &[(i32, &str, &str)] = &[
    (1, "property graph tables", MIGRATION_V1),
    (2, "property lookup indexes", MIGRATION_V2),
];

async fn applied_version(pool: &SqlitePool) -> anyhow::Result<i32> {
    sqlx::raw_sql(CREATE_MIGRATIONS_TABLE).execute(pool).await?;
    let (version,): (Option<i32>,) = sqlx::query_as("SELECT MAX(version) FROM _migrations")
        .fetch_one(pool)
        .await?;
    Ok(version.unwrap_or(0))
}

/// Apply every migration newer than the recorded version. Each one runs in
/// its own transaction together with its `_migrations` row.
pub async fn run_migrations(pool: &SqlitePool) -> anyhow::Result<()> {
    let applied = applied_version(pool).await?;
    if applied >= CURRENT_VERSION {
        debug!(version = applied, "Graph schema is current");
        return Ok(());
    }

    for &(version, summary, sql) in MIGRATIONS.iter().filter(|(v, _, _)| *v > applied) {
        info!(version, summary, "Applying graph schema migration");
        let mut tx = pool.begin().await?;
        sqlx::raw_sql(sql).execute(&mut *tx).await?;
        sqlx::query("INSERT INTO _migrations (version) VALUES (?)")
            .bind(version)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
    }
    Ok(())
}

pub async fn migration_status(pool: &SqlitePool) -> anyhow::Result<MigrationStatus> {
    let current_version = applied_version(pool).await?;
    Ok(MigrationStatus {
        current_version,
        target_version: CURRENT_VERSION,
        needs_migration: current_version < CURRENT_VERSION,
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationStatus {
    pub current_version: i32,
    pub target_version: i32,
    pub needs_migration: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn create_test_pool() -> SqlitePool {
        SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .expect("Failed to create test pool")
    }

    #[tokio::test]
    async fn test_run_migrations() {
        let pool = create_test_pool().await;

        let status = migration_status(&pool).await.unwrap();
        assert_eq!(status.current_version, 0);
        assert!(status.needs_migration);

        run_migrations(&pool).await.unwrap();

        let status = migration_status(&pool).await.unwrap();
        assert_eq!(status.current_version, CURRENT_VERSION);
        assert!(!status.needs_migration);
        assert_eq!(status.target_version, CURRENT_VERSION);
    }

    #[tokio::test]
    async fn test_migrations_idempotent() {
        let pool = create_test_pool().await;

        run_migrations(&pool).await.unwrap();
        run_migrations(&pool).await.unwrap();

        let status = migration_status(&pool).await.unwrap();
        assert_eq!(status.current_version, CURRENT_VERSION);
    }

    #[tokio::test]
    async fn test_tables_created() {
        let pool = create_test_pool().await;
        run_migrations(&pool).await.unwrap();

        for table in ["graph_nodes", "graph_edges"] {
            let result: (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM {}", table))
                .fetch_one(&pool)
                .await
                .unwrap_or_else(|_| panic!("Table {} should exist", table));
            assert_eq!(result.0, 0, "Table {} should be empty", table);
        }
    }
}
