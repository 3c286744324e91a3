//! Skill-to-taxonomy mapping
//!
//! Rule-based string matching when the graph already holds the occupation's
//! taxonomy, a validated completion-service fallback when it doesn't.

mod fallback;
mod mapper;
mod rules;

pub use fallback::{
    DEFAULT_PROPOSED_CONFIDENCE, FallbackLists, FallbackResponse, MappingValidator,
    SoftSkillProposal, TechnologyProposal, ValidDemonstration, ValidRelation, ValidatedMappings,
    build_fallback_prompt, parse_fallback_response,
};
pub use mapper::{MappingOutcome, MappingStrategy, SkillMapper};
pub use rules::{
    EXACT_CONFIDENCE, MatchKind, PARTIAL_CONFIDENCE, RuleMatch, RuleMatcher, SkillMatches,
    first_match,
};
