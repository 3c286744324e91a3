//! Occupation taxonomy payload
//!
//! Lenient by construction: missing or `null` lists are empty, records may be
//! bare strings or objects, and records of any other shape deserialize to an
//! empty record that the ingestor skips.

use serde::{Deserialize, Deserializer, Serialize};

/// Everything the taxonomy knows about one occupation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OccupationTaxonomy {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub skills: Vec<TaxonomyRecord>,
    #[serde(default, alias = "technology_skills", deserialize_with = "null_as_empty")]
    pub technologies: Vec<TaxonomyRecord>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub tasks: Vec<TaxonomyRecord>,
    #[serde(
        default,
        alias = "detailed_work_activities",
        alias = "work_activities",
        deserialize_with = "null_as_empty"
    )]
    pub activities: Vec<TaxonomyRecord>,
}

impl OccupationTaxonomy {
    pub fn record_count(&self) -> usize {
        self.skills.len() + self.technologies.len() + self.tasks.len() + self.activities.len()
    }

    /// Names of all skill records, in payload order
    pub fn skill_names(&self) -> Vec<String> {
        self.skills.iter().filter_map(TaxonomyRecord::clean_name).collect()
    }

    /// Names of all technology records, in payload order
    pub fn technology_names(&self) -> Vec<String> {
        self.technologies
            .iter()
            .filter_map(TaxonomyRecord::clean_name)
            .collect()
    }
}

/// One skill, technology, task or activity entry
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawRecord")]
pub struct TaxonomyRecord {
    pub name: Option<String>,
    pub level: Option<f64>,
    pub importance: Option<f64>,
    pub category: Option<String>,
}

impl TaxonomyRecord {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Default::default()
        }
    }

    pub fn with_importance(mut self, importance: f64) -> Self {
        self.importance = Some(importance);
        self
    }

    pub fn with_level(mut self, level: f64) -> Self {
        self.level = Some(level);
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    /// Trimmed name, or `None` when missing or blank
    pub fn clean_name(&self) -> Option<String> {
        self.name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_string)
    }

    /// Importance, falling back to level
    pub fn score(&self) -> Option<f64> {
        self.importance.or(self.level)
    }

    pub fn clean_category(&self) -> Option<String> {
        self.category
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::to_string)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawRecord {
    Bare(String),
    Detailed {
        #[serde(default, alias = "statement", alias = "element_name", alias = "example")]
        name: Option<String>,
        #[serde(default)]
        level: Option<f64>,
        #[serde(default)]
        importance: Option<f64>,
        #[serde(default)]
        category: Option<String>,
    },
    Malformed(serde_json::Value),
}

impl From<RawRecord> for TaxonomyRecord {
    fn from(raw: RawRecord) -> Self {
        match raw {
            RawRecord::Bare(name) => TaxonomyRecord::named(name),
            RawRecord::Detailed {
                name,
                level,
                importance,
                category,
            } => TaxonomyRecord {
                name,
                level,
                importance,
                category,
            },
            RawRecord::Malformed(_) => TaxonomyRecord::default(),
        }
    }
}

fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}
