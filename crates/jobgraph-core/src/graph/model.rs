//! Node labels, relationship types and their property payloads

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::identity::description_line_id;

/// Label of a node in the career graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeLabel {
    /// Standardized occupation classification
    Occupation,
    /// One entry of a person's work history
    JobExperience,
    /// Free-text skill extracted from job descriptions
    Skill,
    /// Controlled-vocabulary skill from the taxonomy API
    TaxonomySkill,
    Technology,
    TechnologyCategory,
    Task,
    /// Superseded by Task, still ingested for line evidence
    Activity,
    DescriptionLine,
}

impl NodeLabel {
    pub const ALL: [NodeLabel; 9] = [
        NodeLabel::Occupation,
        NodeLabel::JobExperience,
        NodeLabel::Skill,
        NodeLabel::TaxonomySkill,
        NodeLabel::Technology,
        NodeLabel::TechnologyCategory,
        NodeLabel::Task,
        NodeLabel::Activity,
        NodeLabel::DescriptionLine,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            NodeLabel::Occupation => "Occupation",
            NodeLabel::JobExperience => "JobExperience",
            NodeLabel::Skill => "Skill",
            NodeLabel::TaxonomySkill => "TaxonomySkill",
            NodeLabel::Technology => "Technology",
            NodeLabel::TechnologyCategory => "TechnologyCategory",
            NodeLabel::Task => "Task",
            NodeLabel::Activity => "Activity",
            NodeLabel::DescriptionLine => "DescriptionLine",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|label| label.as_str() == s)
    }
}

impl std::fmt::Display for NodeLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Type of a directed edge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RelationshipType {
    /// JobExperience -> Occupation
    MapsTo,
    /// JobExperience -> Skill, or Occupation -> TaxonomySkill
    RequiresSkill,
    RequiresTask,
    RequiresActivity,
    UsesTechnology,
    /// Skill -> TaxonomySkill
    Demonstrates,
    /// Skill -> Technology
    RelatedTo,
    BelongsToCategory,
    HasDescriptionLine,
    DemonstratesActivity,
    DemonstratesTask,
}

impl RelationshipType {
    pub const ALL: [RelationshipType; 11] = [
        RelationshipType::MapsTo,
        RelationshipType::RequiresSkill,
        RelationshipType::RequiresTask,
        RelationshipType::RequiresActivity,
        RelationshipType::UsesTechnology,
        RelationshipType::Demonstrates,
        RelationshipType::RelatedTo,
        RelationshipType::BelongsToCategory,
        RelationshipType::HasDescriptionLine,
        RelationshipType::DemonstratesActivity,
        RelationshipType::DemonstratesTask,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RelationshipType::MapsTo => "MAPS_TO",
            RelationshipType::RequiresSkill => "REQUIRES_SKILL",
            RelationshipType::RequiresTask => "REQUIRES_TASK",
            RelationshipType::RequiresActivity => "REQUIRES_ACTIVITY",
            RelationshipType::UsesTechnology => "USES_TECHNOLOGY",
            RelationshipType::Demonstrates => "DEMONSTRATES",
            RelationshipType::RelatedTo => "RELATED_TO",
            RelationshipType::BelongsToCategory => "BELONGS_TO_CATEGORY",
            RelationshipType::HasDescriptionLine => "HAS_DESCRIPTION_LINE",
            RelationshipType::DemonstratesActivity => "DEMONSTRATES_ACTIVITY",
            RelationshipType::DemonstratesTask => "DEMONSTRATES_TASK",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|rel| rel.as_str() == s)
    }
}

impl std::fmt::Display for RelationshipType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Address of a node: label plus key
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NodeRef {
    pub label: NodeLabel,
    pub id: String,
}

impl NodeRef {
    pub fn new(label: NodeLabel, id: impl Into<String>) -> Self {
        Self {
            label,
            id: id.into(),
        }
    }

    pub fn occupation(code: impl Into<String>) -> Self {
        Self::new(NodeLabel::Occupation, code)
    }

    pub fn experience(id: impl Into<String>) -> Self {
        Self::new(NodeLabel::JobExperience, id)
    }

    pub fn skill(id: impl Into<String>) -> Self {
        Self::new(NodeLabel::Skill, id)
    }

    pub fn description_line(experience_id: &str, sequence: u32) -> Self {
        Self::new(
            NodeLabel::DescriptionLine,
            description_line_id(experience_id, sequence),
        )
    }
}

impl std::fmt::Display for NodeRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.label, self.id)
    }
}

// ========== Node properties ==========

/// Occupation attributes written when a job maps to it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OccupationNode {
    pub code: String,
    pub title: String,
    pub confidence: Option<f64>,
    pub seniority_level: Option<String>,
    pub technical_depth: Option<f64>,
    pub has_leadership: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobExperienceNode {
    pub id: String,
    pub resume_id: Option<String>,
    pub original_title: String,
    pub normalized_title: Option<String>,
    pub company: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub seniority: Option<String>,
    pub description: Option<String>,
    pub analyzed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillNode {
    pub name: String,
    pub category: Option<String>,
    pub subcategory: Option<String>,
    pub is_technical: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaxonomySkillNode {
    pub name: String,
    pub importance: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TechnologyNode {
    pub name: String,
    pub category: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskNode {
    pub name: String,
    pub importance: Option<f64>,
    pub category: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityNode {
    pub name: String,
    pub importance: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DescriptionLineNode {
    pub experience_id: String,
    pub sequence: u32,
    pub text: String,
}

/// Impact annotations attached to a description line after mapping
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LineMetadata {
    pub impact_metrics: Option<String>,
    pub has_quantifiable_impact: bool,
    pub impact_level: Option<ImpactLevel>,
    pub scope: Option<Scope>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImpactLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl ImpactLevel {
    /// Case-insensitive parse; unknown values give `None`
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Some(Self::Low),
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            "critical" => Some(Self::Critical),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Scope {
    Individual,
    Team,
    Department,
    Company,
    Industry,
}

impl Scope {
    /// Case-insensitive parse; unknown values give `None`
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "individual" => Some(Self::Individual),
            "team" => Some(Self::Team),
            "department" => Some(Self::Department),
            "company" => Some(Self::Company),
            "industry" => Some(Self::Industry),
            _ => None,
        }
    }
}

// ========== Edge properties ==========

/// MAPS_TO properties
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OccupationMapping {
    pub confidence: f64,
    pub is_primary: bool,
    pub rank: u32,
}

/// REQUIRES_SKILL properties on JobExperience -> Skill
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillRequirement {
    pub proficiency_level: u8,
    pub is_primary: bool,
    pub mentioned_count: u32,
}

/// Properties on Occupation -> taxonomy node edges
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaxonomyRequirement {
    pub importance: Option<f64>,
    pub category: Option<String>,
}

/// Who proposed a skill-to-taxonomy mapping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MappedBy {
    Rule,
    Llm,
}

/// How a Skill relates to a Technology
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TechRelationship {
    Exact,
    Partial,
    Similar,
    Subset,
    Uses,
    Alternative,
}

impl TechRelationship {
    pub fn as_str(&self) -> &'static str {
        match self {
            TechRelationship::Exact => "exact",
            TechRelationship::Partial => "partial",
            TechRelationship::Similar => "similar",
            TechRelationship::Subset => "subset",
            TechRelationship::Uses => "uses",
            TechRelationship::Alternative => "alternative",
        }
    }

    /// Relationship kinds a completion service may propose.
    /// `exact` and `partial` are reserved for the rule matcher.
    pub fn parse_proposed(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "similar" => Some(Self::Similar),
            "subset" => Some(Self::Subset),
            "uses" => Some(Self::Uses),
            "alternative" => Some(Self::Alternative),
            _ => None,
        }
    }
}

/// DEMONSTRATES properties
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Demonstration {
    pub confidence: f64,
    pub mapped_by: MappedBy,
    pub mapped_at: DateTime<Utc>,
}

/// RELATED_TO properties
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TechnologyRelation {
    pub confidence: f64,
    pub relationship: TechRelationship,
    pub mapped_by: MappedBy,
    pub mapped_at: DateTime<Utc>,
}

/// HAS_DESCRIPTION_LINE properties
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineSequence {
    pub sequence: u32,
}

/// DEMONSTRATES_ACTIVITY / DEMONSTRATES_TASK properties
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineEvidence {
    pub confidence: f64,
    pub reasoning: Option<String>,
}
