//! Error types for Jobgraph

use thiserror::Error;

/// Result type alias using Jobgraph's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Jobgraph error types with helpful messages and suggestions
#[derive(Error, Debug)]
pub enum Error {
    // Graph errors (E001-E099)
    #[error("Occupation '{0}' not found in the graph. Run `jobgraph ingest {0}` to load it.")]
    OccupationNotFound(String),

    #[error("Job experience '{0}' not found in the graph.")]
    ExperienceNotFound(String),

    #[error("Malformed graph properties for {0}: {1}")]
    CorruptNode(String, String),

    // Network errors (E100-E199)
    #[error("Network error: {0}. Check your internet connection.")]
    NetworkError(#[from] reqwest::Error),

    #[error("LLM API error: {0}. Check your API key with `jobgraph config get llm.api_key`.")]
    LLMError(String),

    #[error("Rate limited. Waiting {0} seconds before retry.")]
    RateLimited(u64),

    #[error("No suitable model available: {0}")]
    NoSuitableModel(String),

    // Taxonomy errors (E200-E299)
    #[error("Taxonomy API error for occupation '{0}': {1}")]
    TaxonomyApi(String, String),

    #[error("Taxonomy data for occupation '{0}' is not available from this source.")]
    TaxonomyUnavailable(String),

    // Completion payload errors (E300-E399)
    #[error("Malformed completion response ({0}): {1}")]
    MalformedResponse(&'static str, String),

    // Database errors (E400-E499)
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    // Analysis errors (E500-E599)
    #[error("Analysis of job experience '{experience_id}' failed at step {step}: {message}")]
    AnalysisFailed {
        experience_id: String,
        step: String,
        message: String,
    },

    // Config errors (E600-E699)
    #[error("Configuration error: {0}")]
    ConfigError(String),

    // Input errors (E800-E899)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // Generic errors
    #[error("{0}")]
    Other(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Get error code for this error type
    pub fn code(&self) -> &'static str {
        match self {
            Self::OccupationNotFound(_) => "E001",
            Self::ExperienceNotFound(_) => "E002",
            Self::CorruptNode(..) => "E003",
            Self::NetworkError(_) => "E100",
            Self::LLMError(_) => "E101",
            Self::RateLimited(_) => "E102",
            Self::NoSuitableModel(_) => "E103",
            Self::TaxonomyApi(..) => "E200",
            Self::TaxonomyUnavailable(_) => "E201",
            Self::MalformedResponse(..) => "E300",
            Self::DatabaseError(_) => "E400",
            Self::AnalysisFailed { .. } => "E500",
            Self::ConfigError(_) => "E600",
            Self::InvalidInput(_) => "E800",
            Self::Json(_) => "E801",
            Self::Other(_) | Self::Io(_) => "E9999",
        }
    }

    /// Get suggestion for how to fix this error
    pub fn suggestion(&self) -> Option<String> {
        match self {
            Self::OccupationNotFound(code) => Some(format!("jobgraph ingest {}", code)),
            Self::NetworkError(_) => Some("Check internet connection".to_string()),
            Self::LLMError(_) => Some("jobgraph config get llm.api_key".to_string()),
            Self::TaxonomyApi(..) => {
                Some("Set ONET_USERNAME and ONET_PASSWORD, or pass --taxonomy-file".to_string())
            }
            Self::ConfigError(_) => Some("jobgraph config list".to_string()),
            _ => None,
        }
    }

    /// Whether this error came from an external collaborator rather than the graph store
    pub fn is_collaborator_failure(&self) -> bool {
        matches!(
            self,
            Self::NetworkError(_)
                | Self::LLMError(_)
                | Self::RateLimited(_)
                | Self::NoSuitableModel(_)
                | Self::TaxonomyApi(..)
                | Self::TaxonomyUnavailable(_)
                | Self::MalformedResponse(..)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes_are_stable() {
        assert_eq!(Error::OccupationNotFound("15-1252.00".into()).code(), "E001");
        assert_eq!(Error::LLMError("boom".into()).code(), "E101");
        assert_eq!(Error::MalformedResponse("line mapping", "eof".into()).code(), "E300");
        assert_eq!(
            Error::AnalysisFailed {
                experience_id: "exp-1".into(),
                step: "WRITE_SKILLS".into(),
                message: "disk full".into(),
            }
            .code(),
            "E500"
        );
    }

    #[test]
    fn test_suggestions() {
        let err = Error::OccupationNotFound("15-1252.00".into());
        assert_eq!(err.suggestion().as_deref(), Some("jobgraph ingest 15-1252.00"));
        assert!(Error::InvalidInput("x".into()).suggestion().is_none());
    }

    #[test]
    fn test_collaborator_classification() {
        assert!(Error::LLMError("down".into()).is_collaborator_failure());
        assert!(Error::TaxonomyApi("x".into(), "500".into()).is_collaborator_failure());
        assert!(!Error::InvalidInput("x".into()).is_collaborator_failure());
        assert!(!Error::Other("x".into()).is_collaborator_failure());
    }

    #[test]
    fn test_analysis_failed_message() {
        let err = Error::AnalysisFailed {
            experience_id: "exp-9".into(),
            step: "CLEANUP".into(),
            message: "locked".into(),
        };
        let text = err.to_string();
        assert!(text.contains("exp-9"));
        assert!(text.contains("CLEANUP"));
    }
}
