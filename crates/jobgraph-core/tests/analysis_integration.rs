//! End-to-end analysis runs against an in-memory graph

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::Duration;
use jobgraph_core::analysis::{
    AnalysisOrchestrator, AnalysisStep, ExtractedSkill, JobExperienceInput, NormalizedJob,
    NormalizedOccupation, StepOutcome,
};
use jobgraph_core::config::AnalysisConfig;
use jobgraph_core::graph::{
    JobExperienceNode, NodeLabel, NodeRef, RelationshipType, SqliteGraphStore, slug,
};
use jobgraph_core::llm::TextCompletion;
use jobgraph_core::mapping::MappingStrategy;
use jobgraph_core::storage::Database;
use jobgraph_core::taxonomy::{OccupationTaxonomy, StaticTaxonomySource, TaxonomyRecord};
use jobgraph_core::{Error, Result};

const DEVELOPERS: &str = "15-1252.00";
const QA_ANALYSTS: &str = "15-1253.00";
const DATA_SCIENTISTS: &str = "15-2051.00";

/// Completion service that answers every prompt with the same text
struct Scripted {
    response: Option<&'static str>,
    calls: AtomicUsize,
}

impl Scripted {
    fn answering(response: &'static str) -> Arc<Self> {
        Arc::new(Self {
            response: Some(response),
            calls: AtomicUsize::new(0),
        })
    }

    fn unreachable() -> Arc<Self> {
        Arc::new(Self {
            response: None,
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TextCompletion for Scripted {
    async fn complete(&self, _prompt: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.response
            .map(str::to_string)
            .ok_or_else(|| Error::LLMError("completion service unreachable".to_string()))
    }
}

fn taxonomy() -> StaticTaxonomySource {
    StaticTaxonomySource::new()
        .with_occupation(
            DEVELOPERS,
            OccupationTaxonomy {
                title: Some("Software Developers".to_string()),
                skills: vec![
                    TaxonomyRecord::named("Programming").with_importance(4.1),
                    TaxonomyRecord::named("Critical Thinking").with_importance(3.9),
                ],
                technologies: vec![
                    TaxonomyRecord::named("Java")
                        .with_category("Object oriented development software"),
                    TaxonomyRecord::named("JavaScript")
                        .with_category("Web platform development software"),
                    TaxonomyRecord::named("PostgreSQL"),
                ],
                tasks: vec![
                    TaxonomyRecord::named("Modify existing software to correct errors")
                        .with_importance(4.4),
                ],
                activities: vec![
                    TaxonomyRecord::named("Working with Computers").with_importance(4.6),
                ],
                ..Default::default()
            },
        )
        .with_occupation(
            QA_ANALYSTS,
            OccupationTaxonomy {
                title: Some("Software Quality Assurance Analysts and Testers".to_string()),
                technologies: vec![TaxonomyRecord::named("Selenium")],
                ..Default::default()
            },
        )
        .with_occupation(
            DATA_SCIENTISTS,
            OccupationTaxonomy {
                title: Some("Data Scientists".to_string()),
                technologies: vec![TaxonomyRecord::named("Python")],
                ..Default::default()
            },
        )
}

fn offline_config() -> AnalysisConfig {
    AnalysisConfig {
        staleness_days: 30,
        llm_fallback: false,
        line_mapping: false,
    }
}

async fn setup(completion: Arc<Scripted>, config: AnalysisConfig) -> AnalysisOrchestrator {
    let db = Database::in_memory().await.unwrap();
    let store = SqliteGraphStore::new(db.pool().clone());
    AnalysisOrchestrator::new(store, Arc::new(taxonomy()), completion, config)
}

fn job() -> JobExperienceInput {
    JobExperienceInput::new("exp-1", "Backend Engineer")
        .with_company("Acme")
        .with_description("- Built payment services in Java\n- Fixed production defects\n")
}

fn normalized(codes: &[&str]) -> NormalizedJob {
    NormalizedJob {
        normalized_title: Some("Software Engineer".to_string()),
        seniority: Some("senior".to_string()),
        occupations: codes
            .iter()
            .enumerate()
            .map(|(i, code)| {
                let confidence = 0.9 - i as f64 * 0.1;
                NormalizedOccupation::new(*code, format!("Occupation {}", i + 1), confidence)
            })
            .collect(),
        ..Default::default()
    }
}

async fn targets(
    store: &SqliteGraphStore,
    node: &NodeRef,
    rel_type: RelationshipType,
) -> Vec<String> {
    store
        .edges_from(node, Some(rel_type))
        .await
        .unwrap()
        .into_iter()
        .map(|e| e.target.id)
        .collect()
}

#[tokio::test]
async fn test_analysis_builds_graph() {
    let orchestrator = setup(Scripted::unreachable(), offline_config()).await;
    let skills = vec![
        ExtractedSkill::new("Java").primary(),
        ExtractedSkill::new("Critical Thinking").soft(),
    ];

    let report = orchestrator
        .analyze(&job(), &normalized(&[DEVELOPERS, QA_ANALYSTS]), &skills)
        .await
        .unwrap();

    assert!(report.is_complete(), "failed steps: {:?}", report.failed_steps());
    assert!(report.finished_at.is_some());
    assert_eq!(report.occupations_mapped, 2);
    assert_eq!(report.skills_written, 2);
    assert_eq!(report.ingested.len(), 2);
    assert_eq!(report.description_lines, 2);
    assert_eq!(report.steps.first().map(|s| s.step), Some(AnalysisStep::Cleanup));

    let store = orchestrator.store();
    let experience = NodeRef::experience("exp-1");

    let record = store.get_node(&experience).await.unwrap().unwrap();
    let node: JobExperienceNode = record.decode().unwrap();
    assert_eq!(node.normalized_title.as_deref(), Some("Software Engineer"));
    assert!(node.analyzed_at.is_some());

    assert_eq!(
        targets(store, &experience, RelationshipType::RequiresSkill).await,
        vec!["critical-thinking".to_string(), "java".to_string()]
    );
    assert_eq!(store.count_edges(RelationshipType::HasDescriptionLine).await.unwrap(), 2);
}

#[tokio::test]
async fn test_occupation_ranks() {
    let orchestrator = setup(Scripted::unreachable(), offline_config()).await;
    orchestrator
        .analyze(
            &job(),
            &normalized(&[QA_ANALYSTS, DEVELOPERS, QA_ANALYSTS, DATA_SCIENTISTS]),
            &[],
        )
        .await
        .unwrap();

    let mut edges = orchestrator
        .store()
        .edges_from(&NodeRef::experience("exp-1"), Some(RelationshipType::MapsTo))
        .await
        .unwrap();
    edges.sort_by_key(|e| e.number("rank").map(|r| r as u32));

    let ranked: Vec<(String, u32, bool)> = edges
        .iter()
        .map(|e| {
            (
                e.target.id.clone(),
                e.number("rank").unwrap() as u32,
                e.properties["is_primary"].as_bool().unwrap(),
            )
        })
        .collect();
    assert_eq!(
        ranked,
        vec![
            (QA_ANALYSTS.to_string(), 1, true),
            (DEVELOPERS.to_string(), 2, false),
            (DATA_SCIENTISTS.to_string(), 3, false),
        ]
    );
}

#[tokio::test]
async fn test_reanalysis_replaces_edges_and_keeps_shared_nodes() {
    let orchestrator = setup(Scripted::unreachable(), offline_config()).await;
    let store = orchestrator.store().clone();
    let experience = NodeRef::experience("exp-1");

    orchestrator
        .analyze(
            &job(),
            &normalized(&[DEVELOPERS, QA_ANALYSTS]),
            &[ExtractedSkill::new("Java"), ExtractedSkill::new("Selenium")],
        )
        .await
        .unwrap();

    let report = orchestrator
        .analyze(
            &job().with_description("Trained models"),
            &normalized(&[DATA_SCIENTISTS]),
            &[ExtractedSkill::new("Python")],
        )
        .await
        .unwrap();
    assert!(report.edges_cleared > 0);

    assert_eq!(
        targets(&store, &experience, RelationshipType::MapsTo).await,
        vec![DATA_SCIENTISTS.to_string()]
    );
    assert_eq!(
        targets(&store, &experience, RelationshipType::RequiresSkill).await,
        vec!["python".to_string()]
    );
    assert_eq!(store.count_edges(RelationshipType::HasDescriptionLine).await.unwrap(), 1);
    assert_eq!(store.count_nodes(NodeLabel::DescriptionLine).await.unwrap(), 1);

    // Shared vocabulary survives
    assert_eq!(store.count_nodes(NodeLabel::Occupation).await.unwrap(), 3);
    assert!(store.node_exists(&NodeRef::skill("java")).await.unwrap());
    assert!(
        store
            .node_exists(&NodeRef::new(NodeLabel::Technology, "selenium"))
            .await
            .unwrap()
    );
}

#[tokio::test]
async fn test_reanalysis_overwrites_node_properties() {
    let orchestrator = setup(Scripted::unreachable(), offline_config()).await;
    let store = orchestrator.store().clone();
    let experience = NodeRef::experience("exp-1");
    let occupation = NodeRef::occupation(DEVELOPERS);

    let mut first_job = job();
    first_job.start_date = chrono::NaiveDate::from_ymd_opt(2018, 3, 1);
    first_job.end_date = chrono::NaiveDate::from_ymd_opt(2021, 1, 1);
    let first = NormalizedJob {
        technical_depth: Some(8.0),
        has_leadership: Some(true),
        ..normalized(&[DEVELOPERS])
    };
    orchestrator.analyze(&first_job, &first, &[]).await.unwrap();

    let stored = store.get_node(&experience).await.unwrap().unwrap();
    assert_eq!(stored.properties["end_date"], "2021-01-01");
    assert_eq!(stored.properties["seniority"], "senior");

    // Still employed, no company or description, no seniority signal
    let second = NormalizedJob {
        occupations: vec![NormalizedOccupation::new(DEVELOPERS, "Software Developers", 0.6)],
        ..Default::default()
    };
    let report = orchestrator
        .analyze(&JobExperienceInput::new("exp-1", "Backend Engineer"), &second, &[])
        .await
        .unwrap();
    assert!(report.is_complete(), "failed steps: {:?}", report.failed_steps());

    let stored = store.get_node(&experience).await.unwrap().unwrap();
    for key in [
        "company",
        "start_date",
        "end_date",
        "description",
        "seniority",
        "normalized_title",
    ] {
        assert!(stored.properties.get(key).is_none(), "stale experience key {}", key);
    }
    let node: JobExperienceNode = stored.decode().unwrap();
    assert_eq!(node.original_title, "Backend Engineer");
    assert!(node.analyzed_at.is_some());

    let stored = store.get_node(&occupation).await.unwrap().unwrap();
    for key in ["seniority_level", "technical_depth", "has_leadership"] {
        assert!(stored.properties.get(key).is_none(), "stale occupation key {}", key);
    }
    assert_eq!(stored.properties["confidence"], 0.6);
    assert_eq!(stored.properties["title"], "Software Developers");
    assert!(store.taxonomy_updated_at(DEVELOPERS).await.unwrap().is_some());

    assert_eq!(store.count_nodes(NodeLabel::DescriptionLine).await.unwrap(), 0);
}

#[tokio::test]
async fn test_same_input_twice_gives_same_edges() {
    let orchestrator = setup(Scripted::unreachable(), offline_config()).await;
    let skills = [ExtractedSkill::new("Java"), ExtractedSkill::new("Programming")];

    orchestrator.analyze(&job(), &normalized(&[DEVELOPERS]), &skills).await.unwrap();
    let first = orchestrator.store().stats().await.unwrap();
    let report = orchestrator.analyze(&job(), &normalized(&[DEVELOPERS]), &skills).await.unwrap();
    let second = orchestrator.store().stats().await.unwrap();

    assert_eq!(first.nodes, second.nodes);
    assert_eq!(first.edges, second.edges);
    assert_eq!(
        report.outcome_of(AnalysisStep::IngestTaxonomy),
        Some(&StepOutcome::Skipped("taxonomy is fresh".to_string()))
    );
}

#[tokio::test]
async fn test_rule_mapping_prefers_exact_match() {
    let orchestrator = setup(Scripted::unreachable(), offline_config()).await;
    let report = orchestrator
        .analyze(
            &job(),
            &normalized(&[DEVELOPERS]),
            &[ExtractedSkill::new("Java"), ExtractedSkill::new("SQL")],
        )
        .await
        .unwrap();

    let mapping = report.mapping.unwrap();
    assert_eq!(mapping.strategy, MappingStrategy::RuleBased);
    assert_eq!(mapping.related, 2);

    let store = orchestrator.store();
    let java = store
        .edges_from(&NodeRef::skill("java"), Some(RelationshipType::RelatedTo))
        .await
        .unwrap();
    assert_eq!(java.len(), 1);
    assert_eq!(java[0].target.id, "java");
    assert_eq!(java[0].text("relationship"), Some("exact"));
    assert_eq!(java[0].number("confidence"), Some(1.0));
    assert_eq!(java[0].text("mapped_by"), Some("rule"));

    let sql = store
        .edges_from(&NodeRef::skill("sql"), Some(RelationshipType::RelatedTo))
        .await
        .unwrap();
    assert_eq!(sql.len(), 1);
    assert_eq!(sql[0].target.id, slug("PostgreSQL"));
    assert_eq!(sql[0].text("relationship"), Some("partial"));
    assert_eq!(sql[0].number("confidence"), Some(0.85));
}

#[tokio::test]
async fn test_staleness_follows_ingestion() {
    let orchestrator = setup(Scripted::unreachable(), offline_config()).await;
    assert!(orchestrator.is_occupation_stale(DEVELOPERS, 30).await);

    orchestrator.analyze(&job(), &normalized(&[DEVELOPERS]), &[]).await.unwrap();
    assert!(!orchestrator.is_occupation_stale(DEVELOPERS, 30).await);
    assert!(orchestrator.is_occupation_stale(QA_ANALYSTS, 30).await);

    let mut tx = orchestrator.store().begin().await.unwrap();
    let old = tx.now() - Duration::days(45);
    tx.stamp_taxonomy_updated_at(DEVELOPERS, old).await.unwrap();
    tx.commit().await.unwrap();

    assert!(orchestrator.is_occupation_stale(DEVELOPERS, 30).await);
    assert!(!orchestrator.is_occupation_stale(DEVELOPERS, 60).await);
}

#[tokio::test]
async fn test_taxonomy_failure_is_partial_success() {
    let orchestrator = setup(Scripted::unreachable(), offline_config()).await;
    let report = orchestrator
        .analyze(
            &job(),
            &normalized(&[DEVELOPERS, "99-9999.00"]),
            &[ExtractedSkill::new("Java")],
        )
        .await
        .unwrap();

    assert!(!report.is_complete());
    let failed = report.failed_steps();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].step, AnalysisStep::IngestTaxonomy);
    assert_eq!(failed[0].subject.as_deref(), Some("99-9999.00"));

    // Later steps still ran
    assert_eq!(report.occupations_mapped, 2);
    assert_eq!(
        report.outcome_of(AnalysisStep::MapSkillsToTaxonomy),
        Some(&StepOutcome::Completed)
    );
    assert_eq!(report.description_lines, 2);
}

#[tokio::test]
async fn test_empty_experience_id_is_rejected() {
    let orchestrator = setup(Scripted::unreachable(), offline_config()).await;
    let result = orchestrator
        .analyze(&JobExperienceInput::new("  ", "Engineer"), &normalized(&[DEVELOPERS]), &[])
        .await;

    assert!(matches!(result, Err(Error::InvalidInput(_))));
    assert_eq!(orchestrator.store().stats().await.unwrap().total_nodes(), 0);
}

#[tokio::test]
async fn test_no_skills_skips_mapping() {
    let orchestrator = setup(Scripted::unreachable(), offline_config()).await;
    let report = orchestrator
        .analyze(&job(), &normalized(&[DEVELOPERS]), &[])
        .await
        .unwrap();

    assert!(report.mapping.is_none());
    assert_eq!(
        report.outcome_of(AnalysisStep::MapSkillsToTaxonomy),
        Some(&StepOutcome::Skipped("no skills".to_string()))
    );
}

#[tokio::test]
async fn test_description_lines_linked_to_evidence() {
    let completion = Scripted::answering(
        r#"```json
        {
          "line_mappings": [
            {
              "sequence": 1,
              "impact_level": "high",
              "scope": "team",
              "activities": [{"id": "working-with-computers", "confidence": 0.9}]
            },
            {
              "sequence": 2,
              "tasks": [{"id": "Modify existing software to correct errors", "confidence": 0.8}],
              "activities": [{"id": "Juggling"}]
            }
          ]
        }
        ```"#,
    );
    let config = AnalysisConfig {
        line_mapping: true,
        ..offline_config()
    };
    let orchestrator = setup(completion.clone(), config).await;

    let report = orchestrator
        .analyze(&job(), &normalized(&[DEVELOPERS]), &[ExtractedSkill::new("Java")])
        .await
        .unwrap();

    assert!(report.is_complete(), "failed steps: {:?}", report.failed_steps());
    assert_eq!(completion.calls(), 1);
    let outcome = report.line_mapping.unwrap();
    assert!(outcome.requested);
    assert_eq!(outcome.lines_annotated, 2);
    assert_eq!(outcome.activity_links, 1);
    assert_eq!(outcome.task_links, 1);
    assert_eq!(outcome.missed, 1);

    let store = orchestrator.store();
    assert_eq!(
        targets(
            store,
            &NodeRef::description_line("exp-1", 1),
            RelationshipType::DemonstratesActivity
        )
        .await,
        vec!["working-with-computers".to_string()]
    );
    assert_eq!(store.count_edges(RelationshipType::DemonstratesTask).await.unwrap(), 1);

    let line = store
        .get_node(&NodeRef::description_line("exp-1", 1))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(line.properties["text"], "Built payment services in Java");
    assert_eq!(line.properties["impact_level"], "High");
}

#[tokio::test]
async fn test_line_mapping_failure_keeps_lines() {
    let config = AnalysisConfig {
        line_mapping: true,
        ..offline_config()
    };
    let orchestrator = setup(Scripted::unreachable(), config).await;

    let report = orchestrator
        .analyze(&job(), &normalized(&[DEVELOPERS]), &[])
        .await
        .unwrap();

    assert!(report.outcome_of(AnalysisStep::DecomposeDescription).unwrap().is_failed());
    assert_eq!(report.description_lines, 2);
    assert_eq!(
        orchestrator
            .store()
            .count_nodes(NodeLabel::DescriptionLine)
            .await
            .unwrap(),
        2
    );
}
