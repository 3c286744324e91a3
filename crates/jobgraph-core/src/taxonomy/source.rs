//! Where taxonomy payloads come from

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::{Error, Result};

use super::payload::OccupationTaxonomy;

/// Occupation-taxonomy collaborator
#[async_trait]
pub trait TaxonomySource: Send + Sync {
    /// Fetch the taxonomy of one occupation. Missing sub-lists come back empty.
    async fn fetch_occupation(&self, code: &str) -> Result<OccupationTaxonomy>;
}

/// Fixed set of payloads held in memory, for offline runs and tests
#[derive(Debug, Clone, Default)]
pub struct StaticTaxonomySource {
    occupations: HashMap<String, OccupationTaxonomy>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum TaxonomyFile {
    ByCode(HashMap<String, OccupationTaxonomy>),
    List(Vec<OccupationTaxonomy>),
}

impl StaticTaxonomySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_occupation(
        mut self,
        code: impl Into<String>,
        taxonomy: OccupationTaxonomy,
    ) -> Self {
        self.insert(code, taxonomy);
        self
    }

    pub fn insert(&mut self, code: impl Into<String>, mut taxonomy: OccupationTaxonomy) {
        let code = code.into();
        taxonomy.code.get_or_insert_with(|| code.clone());
        self.occupations.insert(code, taxonomy);
    }

    /// Parse either `{ "<code>": payload, ... }` or `[ payload-with-code, ... ]`
    pub fn from_json(json: &str) -> Result<Self> {
        let mut source = Self::new();
        match serde_json::from_str::<TaxonomyFile>(json)? {
            TaxonomyFile::ByCode(map) => {
                for (code, taxonomy) in map {
                    source.insert(code, taxonomy);
                }
            }
            TaxonomyFile::List(list) => {
                for taxonomy in list {
                    let code = taxonomy.code.clone().ok_or_else(|| {
                        Error::InvalidInput("taxonomy list entries need a \"code\"".to_string())
                    })?;
                    source.insert(code, taxonomy);
                }
            }
        }
        Ok(source)
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    pub fn len(&self) -> usize {
        self.occupations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.occupations.is_empty()
    }
}

#[async_trait]
impl TaxonomySource for StaticTaxonomySource {
    async fn fetch_occupation(&self, code: &str) -> Result<OccupationTaxonomy> {
        self.occupations
            .get(code)
            .cloned()
            .ok_or_else(|| Error::TaxonomyUnavailable(code.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::taxonomy::TaxonomyRecord;

    #[tokio::test]
    async fn test_static_source_lookup() {
        let source = StaticTaxonomySource::new().with_occupation(
            "15-1252.00",
            OccupationTaxonomy {
                title: Some("Software Developers".to_string()),
                technologies: vec![TaxonomyRecord::named("Java")],
                ..Default::default()
            },
        );

        let payload = source.fetch_occupation("15-1252.00").await.unwrap();
        assert_eq!(payload.code.as_deref(), Some("15-1252.00"));
        assert_eq!(payload.technology_names(), vec!["Java"]);

        let missing = source.fetch_occupation("11-1021.00").await.unwrap_err();
        assert!(missing.is_collaborator_failure());
    }

    #[test]
    fn test_from_json_map_and_list() {
        let by_code = StaticTaxonomySource::from_json(
            r#"{"15-1252.00": {"title": "Software Developers", "technology_skills": ["Java"]}}"#,
        )
        .unwrap();
        assert_eq!(by_code.len(), 1);

        let list = StaticTaxonomySource::from_json(
            r#"[{"code": "15-1252.00", "title": "Software Developers"},
                {"code": "11-1021.00", "title": "General and Operations Managers"}]"#,
        )
        .unwrap();
        assert_eq!(list.len(), 2);

        assert!(StaticTaxonomySource::from_json(r#"[{"title": "No code"}]"#).is_err());
    }
}
