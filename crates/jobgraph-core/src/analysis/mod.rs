//! Analysis of one job experience into the career graph

mod input;
mod orchestrator;
mod report;

pub use input::{ExtractedSkill, JobExperienceInput, NormalizedJob, NormalizedOccupation};
pub use orchestrator::AnalysisOrchestrator;
pub use report::{AnalysisReport, AnalysisStep, StepOutcome, StepRecord};
