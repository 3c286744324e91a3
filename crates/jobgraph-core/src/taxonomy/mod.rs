//! Occupation taxonomy
//!
//! Payload types, the [`TaxonomySource`] collaborator seam with its O*NET and
//! in-memory implementations, and the ingestor that writes a payload into the
//! graph.

mod ingestor;
mod onet;
mod payload;
mod source;

pub use ingestor::{DEFAULT_TASK_CATEGORY, IngestionSummary, TaxonomyIngestor};
pub use onet::OnetClient;
pub use payload::{OccupationTaxonomy, TaxonomyRecord};
pub use source::{StaticTaxonomySource, TaxonomySource};
