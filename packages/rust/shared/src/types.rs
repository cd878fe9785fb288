//! Core domain types for keyplan content strategies.
//!
//! JSON field names follow the camelCase shape used by the generative model
//! and by strategy files (`groupTitle`, `monthlySearches`, ...).

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// CompetitionLevel
// ---------------------------------------------------------------------------

/// Advertiser competition tier for a keyword.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CompetitionLevel {
    #[default]
    Low,
    Medium,
    High,
}

impl CompetitionLevel {
    /// Map a provider competition string onto a tier.
    ///
    /// Only `HIGH` and `MEDIUM` (any case) are recognized; everything else,
    /// `UNKNOWN_COMPETITION_LEVEL` included, collapses to `Low`. This conflates
    /// "known low" with "unknown" and is kept as-is so results stay comparable
    /// with existing strategies.
    pub fn from_provider(level: &str) -> Self {
        let level = level.trim();
        if level.eq_ignore_ascii_case("HIGH") {
            Self::High
        } else if level.eq_ignore_ascii_case("MEDIUM") {
            Self::Medium
        } else {
            Self::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
        }
    }
}

impl std::fmt::Display for CompetitionLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Populated strategy
// ---------------------------------------------------------------------------

/// A keyword with resolved search metrics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Keyword {
    /// Keyword text exactly as authored by the generator.
    pub keyword: String,
    /// Average monthly searches reported by the provider (0 when unknown).
    pub monthly_searches: u64,
    /// Competition tier (LOW when unknown).
    pub competition: CompetitionLevel,
}

/// A populated keyword group: one article topic in the content strategy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeywordGroup {
    /// Unique within a strategy; lower is more important.
    pub priority: u32,
    pub group_title: String,
    pub description: String,
    pub keywords: Vec<Keyword>,
}

// ---------------------------------------------------------------------------
// Skeletons (generator output, before metrics enrichment)
// ---------------------------------------------------------------------------

/// A keyword as proposed by the generator, without metrics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkeletonKeyword {
    pub keyword: String,
}

/// A keyword group as proposed by the generator, without metrics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupSkeleton {
    pub priority: u32,
    pub group_title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub keywords: Vec<SkeletonKeyword>,
}

impl GroupSkeleton {
    /// Iterate over the raw keyword texts in authored order.
    pub fn keyword_texts(&self) -> impl Iterator<Item = &str> {
        self.keywords.iter().map(|k| k.keyword.as_str())
    }
}

// ---------------------------------------------------------------------------
// Other generator outputs
// ---------------------------------------------------------------------------

/// A proposed content axis for a blog concept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThematicDirection {
    pub title: String,
}

/// A generated blog article for one keyword group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedArticle {
    pub title: String,
    /// Markdown body, without the title.
    pub content: String,
    /// Short hook meant for the thumbnail image.
    pub thumbnail_catchphrase: String,
}
