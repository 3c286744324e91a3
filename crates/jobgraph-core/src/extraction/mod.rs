//! Completion-backed extraction of analysis inputs from raw job data
//!
//! Used when the caller has only the job experience itself and no
//! pre-computed occupations or skills.

mod normalizer;
mod skills;

pub use normalizer::JobNormalizer;
pub use skills::SkillExtractor;
