//! Career knowledge graph
//!
//! A property graph linking job experiences to occupations, extracted skills
//! and the occupation taxonomy:
//!
//! ```text
//!                       MAPS_TO            REQUIRES_SKILL / USES_TECHNOLOGY
//!   JobExperience ───────────────> Occupation ─────────────> TaxonomySkill / Technology
//!     │      │                                  REQUIRES_TASK / REQUIRES_ACTIVITY
//!     │      │ REQUIRES_SKILL                              ──> Task / Activity
//!     │      v
//!     │    Skill ──DEMONSTRATES──> TaxonomySkill
//!     │      └────RELATED_TO────> Technology ──BELONGS_TO_CATEGORY──> TechnologyCategory
//!     │
//!     │ HAS_DESCRIPTION_LINE
//!     v
//!   DescriptionLine ──DEMONSTRATES_ACTIVITY / DEMONSTRATES_TASK──> Activity / Task
//! ```
//!
//! Every write is an upsert. Shared nodes (occupations, skills, taxonomy
//! vocabulary) are never removed by re-analysing a job; only edges incident to
//! that job experience are.

mod identity;
mod model;
mod staleness;
mod store;
mod writer;

pub use identity::{TASK_KEY_MAX_CHARS, description_line_id, slug, task_slug};
pub use model::{
    ActivityNode, Demonstration, DescriptionLineNode, ImpactLevel, JobExperienceNode,
    LineEvidence, LineMetadata, LineSequence, MappedBy, NodeLabel, NodeRef, OccupationMapping,
    OccupationNode, RelationshipType, Scope, SkillNode, SkillRequirement, TaskNode,
    TaxonomyRequirement, TaxonomySkillNode, TechRelationship, TechnologyNode, TechnologyRelation,
};
pub use staleness::{DEFAULT_STALENESS_DAYS, StalenessPolicy, is_stale_at};
pub use store::{
    EdgeRecord, EvidenceCandidates, GraphStats, GraphTransaction, NodeRecord, SqliteGraphStore,
    TaxonomyEntry, TaxonomyNames,
};
