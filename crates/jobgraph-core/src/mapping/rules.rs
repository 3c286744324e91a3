//! Deterministic string matching of job skills against taxonomy names
//!
//! Policy: candidates are tried in the order given, once for a
//! case-insensitive exact match and then once for substring containment in
//! either direction. The first candidate that matches wins; later candidates
//! are never consulted, even if they would match "better". Callers control
//! the outcome by controlling candidate order.

use crate::graph::{TaxonomyEntry, TaxonomyNames};

pub const EXACT_CONFIDENCE: f64 = 1.0;
pub const PARTIAL_CONFIDENCE: f64 = 0.85;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchKind {
    Exact,
    Partial,
}

impl MatchKind {
    pub fn confidence(&self) -> f64 {
        match self {
            MatchKind::Exact => EXACT_CONFIDENCE,
            MatchKind::Partial => PARTIAL_CONFIDENCE,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RuleMatch<'a> {
    pub target: &'a TaxonomyEntry,
    pub kind: MatchKind,
}

/// At most one technology and one taxonomy skill per job skill
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SkillMatches<'a> {
    pub technology: Option<RuleMatch<'a>>,
    pub skill: Option<RuleMatch<'a>>,
}

#[derive(Debug, Clone, Copy)]
pub struct RuleMatcher<'a> {
    names: &'a TaxonomyNames,
}

impl<'a> RuleMatcher<'a> {
    pub fn new(names: &'a TaxonomyNames) -> Self {
        Self { names }
    }

    pub fn match_skill(&self, skill_name: &str) -> SkillMatches<'a> {
        SkillMatches {
            technology: first_match(skill_name, &self.names.technologies),
            skill: first_match(skill_name, &self.names.skills),
        }
    }
}

/// First exact hit, else first substring hit, over `candidates` in order
pub fn first_match<'a>(name: &str, candidates: &'a [TaxonomyEntry]) -> Option<RuleMatch<'a>> {
    let needle = name.trim().to_lowercase();
    if needle.is_empty() {
        return None;
    }

    let lowered: Vec<String> = candidates.iter().map(|c| c.name.trim().to_lowercase()).collect();

    if let Some(i) = lowered.iter().position(|c| *c == needle) {
        return Some(RuleMatch {
            target: &candidates[i],
            kind: MatchKind::Exact,
        });
    }

    lowered
        .iter()
        .position(|c| !c.is_empty() && (c.contains(&needle) || needle.contains(c.as_str())))
        .map(|i| RuleMatch {
            target: &candidates[i],
            kind: MatchKind::Partial,
        })
}
