//! Jobgraph Core Library
//!
//! This crate provides the core functionality for Jobgraph, including:
//! - Career knowledge graph (SQLite property graph, typed upserts, staleness)
//! - Occupation taxonomy ingestion (O*NET Web Services or static payloads)
//! - Skill-to-taxonomy mapping (rule-based with validated LLM fallback)
//! - Description-line decomposition and activity/task evidence
//! - The per-job analysis pipeline
//! - LLM integration (OpenRouter / OpenAI-compatible API)

pub mod analysis;
pub mod config;
pub mod description;
pub mod error;
pub mod extraction;
pub mod graph;
pub mod llm;
pub mod mapping;
pub mod storage;
pub mod taxonomy;

pub use error::{Error, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::analysis::{
        AnalysisOrchestrator, AnalysisReport, ExtractedSkill, JobExperienceInput, NormalizedJob,
        NormalizedOccupation,
    };
    pub use crate::config::Config;
    pub use crate::error::{Error, Result};
    pub use crate::graph::SqliteGraphStore;
    pub use crate::llm::TextCompletion;
    pub use crate::storage::Database;
    pub use crate::taxonomy::TaxonomySource;
}
