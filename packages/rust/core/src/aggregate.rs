//! Keyword metrics aggregation: skeleton groups in, populated groups out.
//!
//! 1. Collect the unique, non-empty keyword texts across all groups
//! 2. Fetch provider metrics for them (batched, concurrent, fail-fast)
//! 3. Index the provider records by whitespace-stripped key
//! 4. Rebuild every group with one resolved [`Keyword`] per skeleton keyword
//!
//! The provider tokenizes keys (`"自己 肯定 感"`) while generated keywords are
//! usually unspaced (`"自己肯定感"`), hence the normalized index.

use std::collections::{HashMap, HashSet};

use tracing::{debug, info, instrument};

use keyplan_metrics::{MetricsClient, MetricsMap, MetricsRecord};
use keyplan_shared::{CompetitionLevel, GroupSkeleton, Keyword, KeywordGroup, Result};

// ---------------------------------------------------------------------------
// Deduplication
// ---------------------------------------------------------------------------

/// Every distinct non-empty keyword text across `skeletons`, in first-seen order.
pub fn collect_unique_keywords(skeletons: &[GroupSkeleton]) -> Vec<String> {
    let mut seen = HashSet::new();
    skeletons
        .iter()
        .flat_map(GroupSkeleton::keyword_texts)
        .filter(|text| !text.is_empty() && seen.insert(*text))
        .map(str::to_string)
        .collect()
}

// ---------------------------------------------------------------------------
// Normalization
// ---------------------------------------------------------------------------

/// Remove every whitespace character, including full-width spaces.
pub fn normalize_keyword(text: &str) -> String {
    text.chars().filter(|c| !c.is_whitespace()).collect()
}

/// Provider records keyed by whitespace-stripped keyword text.
///
/// Built fresh for each run and dropped afterwards.
#[derive(Debug, Default)]
pub struct NormalizedIndex {
    entries: HashMap<String, MetricsRecord>,
}

impl NormalizedIndex {
    /// Build the index. When two provider keys strip to the same text the one
    /// later in provider order wins; both describe the same search phrase.
    pub fn from_records(records: MetricsMap) -> Self {
        let mut entries = HashMap::with_capacity(records.len());
        for (key, record) in records {
            let normalized = normalize_keyword(&key);
            if entries.insert(normalized, record).is_some() {
                debug!(%key, "normalized key collision, keeping latest record");
            }
        }
        Self { entries }
    }

    /// Look up the record for a generated keyword, normalizing it first.
    pub fn get(&self, keyword: &str) -> Option<&MetricsRecord> {
        self.entries.get(&normalize_keyword(keyword))
    }
}

// ---------------------------------------------------------------------------
// Population
// ---------------------------------------------------------------------------

/// Resolve one keyword text against the index.
///
/// Without a matching record the keyword gets 0 searches and LOW competition.
pub fn resolve_keyword(text: &str, index: &NormalizedIndex) -> Keyword {
    let (monthly_searches, competition) = match index.get(text) {
        Some(record) => (
            record.avg_monthly_searches.unwrap_or(0),
            record
                .competition_level
                .as_deref()
                .map(CompetitionLevel::from_provider)
                .unwrap_or_default(),
        ),
        None => (0, CompetitionLevel::Low),
    };

    Keyword {
        keyword: text.to_string(),
        monthly_searches,
        competition,
    }
}

/// Rebuild each skeleton as a populated group.
///
/// Group order, priority, title and description are kept; keywords map
/// one-to-one in their original order, duplicates and empty texts included.
pub fn populate_groups(skeletons: &[GroupSkeleton], index: &NormalizedIndex) -> Vec<KeywordGroup> {
    skeletons
        .iter()
        .map(|skeleton| KeywordGroup {
            priority: skeleton.priority,
            group_title: skeleton.group_title.clone(),
            description: skeleton.description.clone(),
            keywords: skeleton
                .keyword_texts()
                .map(|text| resolve_keyword(text, index))
                .collect(),
        })
        .collect()
}

/// Run the whole aggregation for one set of skeletons.
///
/// Either every group comes back populated or the call fails; a failed
/// metrics batch never yields partially populated output.
#[instrument(skip_all, fields(groups = skeletons.len()))]
pub async fn aggregate_metrics(
    skeletons: &[GroupSkeleton],
    metrics: &MetricsClient,
) -> Result<Vec<KeywordGroup>> {
    let keywords = collect_unique_keywords(skeletons);
    let records = metrics.fetch_metrics(&keywords).await?;
    let index = NormalizedIndex::from_records(records);

    let groups = populate_groups(skeletons, &index);

    let matched = keywords.iter().filter(|k| index.get(k).is_some()).count();
    info!(
        unique_keywords = keywords.len(),
        matched,
        unmatched = keywords.len() - matched,
        "keyword metrics attached"
    );

    Ok(groups)
}
