//! Description-line decomposition
//!
//! [`split_description`] cleans and numbers lines, [`DescriptionDecomposer`]
//! stores them as DescriptionLine nodes, and [`LineMapper`] links each line to
//! the activities and tasks it evidences.

mod decomposer;
mod line_mapper;
mod split;

pub use decomposer::DescriptionDecomposer;
pub use line_mapper::{LineMapper, LineMappingOutcome};
pub use split::{SplitLine, split_description};
