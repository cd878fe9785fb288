//! End-to-end strategy pipeline: concept → keyword group skeletons → populated groups.
//!
//! Generating a fresh strategy and expanding an existing one run through the
//! same routine; they differ only in the [`StrategyRequest`] variant handed to
//! the [`SkeletonProducer`].

use std::collections::HashSet;
use std::future::Future;
use std::time::Instant;

use tracing::{info, instrument};

use keyplan_generative::GeminiClient;
use keyplan_metrics::MetricsClient;
use keyplan_shared::{GroupSkeleton, KeyplanError, KeywordGroup, Result, ThematicDirection};

use crate::aggregate::aggregate_metrics;
use crate::priority::{
    base_priority, check_proposed_priorities, continue_priorities, next_priority,
};

/// What the pipeline is asked to produce.
#[derive(Debug, Clone, Copy)]
pub enum StrategyRequest<'a> {
    /// A brand-new strategy for the concept.
    Generate {
        concept: &'a str,
        directions: &'a [ThematicDirection],
    },
    /// New groups appended after `existing`.
    Expand {
        concept: &'a str,
        directions: &'a [ThematicDirection],
        existing: &'a [KeywordGroup],
    },
}

impl StrategyRequest<'_> {
    /// Highest priority already taken; new groups start right after it.
    pub fn base_priority(&self) -> u32 {
        match self {
            Self::Generate { .. } => 0,
            Self::Expand { existing, .. } => base_priority(existing),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Generate { .. } => "generate",
            Self::Expand { .. } => "expand",
        }
    }
}

/// Source of keyword group skeletons (title, description, keyword texts).
pub trait SkeletonProducer: Send + Sync {
    fn propose(
        &self,
        request: &StrategyRequest<'_>,
    ) -> impl Future<Output = Result<Vec<GroupSkeleton>>> + Send;
}

impl SkeletonProducer for GeminiClient {
    async fn propose(&self, request: &StrategyRequest<'_>) -> Result<Vec<GroupSkeleton>> {
        match request {
            StrategyRequest::Generate {
                concept,
                directions,
            } => self.strategy_skeleton(concept, directions).await,
            StrategyRequest::Expand {
                concept,
                directions,
                existing,
            } => {
                let titles: Vec<String> = existing.iter().map(|g| g.group_title.clone()).collect();
                self.expansion_skeleton(concept, directions, &titles, request.base_priority())
                    .await
            }
        }
    }
}

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called once the skeleton is known, before metrics are fetched.
    fn skeleton_ready(&self, groups: usize, keywords: usize);
    /// Called when the pipeline completes.
    fn done(&self, groups: &[KeywordGroup]);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn skeleton_ready(&self, _groups: usize, _keywords: usize) {}
    fn done(&self, _groups: &[KeywordGroup]) {}
}

/// Run the strategy pipeline.
///
/// 1. Ask the producer for skeletons
/// 2. Generate: reject zero or repeated priorities. Expand: renumber after
///    the existing ones
/// 3. Fetch and attach keyword metrics
///
/// Returns only the groups produced by this run. For an expansion, use
/// [`append_groups`] to merge them into the existing strategy.
#[instrument(skip_all, fields(kind = request.kind()))]
pub async fn run_strategy<P: SkeletonProducer>(
    request: &StrategyRequest<'_>,
    producer: &P,
    metrics: &MetricsClient,
    progress: &dyn ProgressReporter,
) -> Result<Vec<KeywordGroup>> {
    let start = Instant::now();

    if let StrategyRequest::Expand { .. } = request {
        next_priority(request.base_priority())?;
    }

    progress.phase("Proposing keyword groups");
    let mut skeletons = producer.propose(request).await?;

    match request {
        StrategyRequest::Generate { .. } => check_proposed_priorities(&skeletons)?,
        StrategyRequest::Expand { .. } => {
            continue_priorities(&mut skeletons, request.base_priority())?
        }
    }

    let keyword_count: usize = skeletons.iter().map(|s| s.keywords.len()).sum();
    progress.skeleton_ready(skeletons.len(), keyword_count);

    progress.phase("Fetching keyword metrics");
    let groups = aggregate_metrics(&skeletons, metrics).await?;

    progress.done(&groups);

    info!(
        groups = groups.len(),
        keywords = keyword_count,
        elapsed_ms = start.elapsed().as_millis(),
        "strategy pipeline complete"
    );

    Ok(groups)
}

/// Append expansion groups to an existing strategy.
///
/// Fails if a new group reuses a priority already present.
pub fn append_groups(
    mut existing: Vec<KeywordGroup>,
    new: Vec<KeywordGroup>,
) -> Result<Vec<KeywordGroup>> {
    let mut taken: HashSet<u32> = existing.iter().map(|g| g.priority).collect();
    for group in &new {
        if !taken.insert(group.priority) {
            return Err(KeyplanError::validation(format!(
                "priority {} is already used by another group",
                group.priority
            )));
        }
    }

    existing.extend(new);
    Ok(existing)
}

/// Groups ordered for display, most important first.
pub fn sorted_by_priority(groups: &[KeywordGroup]) -> Vec<&KeywordGroup> {
    let mut sorted: Vec<&KeywordGroup> = groups.iter().collect();
    sorted.sort_by_key(|g| g.priority);
    sorted
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Mutex;

    use keyplan_shared::{AppConfig, CompetitionLevel, Keyword, MetricsOptions, SkeletonKeyword};
    use serde_json::json;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    /// Producer returning canned skeletons and remembering the requested base priority.
    struct CannedProducer {
        skeletons: Vec<GroupSkeleton>,
        seen_base: Mutex<Option<u32>>,
    }

    impl CannedProducer {
        fn new(skeletons: Vec<GroupSkeleton>) -> Self {
            Self {
                skeletons,
                seen_base: Mutex::new(None),
            }
        }
    }

    impl SkeletonProducer for CannedProducer {
        async fn propose(&self, request: &StrategyRequest<'_>) -> Result<Vec<GroupSkeleton>> {
            *self.seen_base.lock().unwrap() = Some(request.base_priority());
            Ok(self.skeletons.clone())
        }
    }

    struct FailingProducer;

    impl SkeletonProducer for FailingProducer {
        async fn propose(&self, _request: &StrategyRequest<'_>) -> Result<Vec<GroupSkeleton>> {
            Err(KeyplanError::decode("received invalid format", "<html>"))
        }
    }

    fn skeleton(priority: u32, title: &str, keywords: &[&str]) -> GroupSkeleton {
        GroupSkeleton {
            priority,
            group_title: title.into(),
            description: String::new(),
            keywords: keywords
                .iter()
                .map(|k| SkeletonKeyword {
                    keyword: (*k).into(),
                })
                .collect(),
        }
    }

    fn populated(priority: u32, title: &str) -> KeywordGroup {
        KeywordGroup {
            priority,
            group_title: title.into(),
            description: String::new(),
            keywords: vec![Keyword {
                keyword: format!("{title} keyword"),
                monthly_searches: 10,
                competition: CompetitionLevel::High,
            }],
        }
    }

    async fn metrics_server(body: serde_json::Value) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&server)
            .await;
        server
    }

    fn metrics_client(server: &MockServer) -> MetricsClient {
        let mut config = AppConfig::default();
        config.metrics.endpoint = format!("{}/volumes", server.uri());
        MetricsClient::new(MetricsOptions::try_from(&config).unwrap()).unwrap()
    }

    #[test]
    fn request_base_priority() {
        let existing = vec![populated(1, "a"), populated(5, "b")];
        let generate = StrategyRequest::Generate {
            concept: "c",
            directions: &[],
        };
        let expand = StrategyRequest::Expand {
            concept: "c",
            directions: &[],
            existing: &existing,
        };
        assert_eq!(generate.base_priority(), 0);
        assert_eq!(expand.base_priority(), 5);
        assert_eq!(expand.kind(), "expand");
    }

    #[test]
    fn append_keeps_existing_first() {
        let merged =
            append_groups(vec![populated(1, "a"), populated(2, "b")], vec![populated(3, "c")])
                .unwrap();
        let titles: Vec<&str> = merged.iter().map(|g| g.group_title.as_str()).collect();
        assert_eq!(titles, vec!["a", "b", "c"]);
    }

    #[test]
    fn append_rejects_priority_collision() {
        let err = append_groups(vec![populated(1, "a")], vec![populated(1, "dup")]).unwrap_err();
        assert!(err.to_string().contains("priority 1"));
    }

    #[test]
    fn sorted_by_priority_orders_ascending() {
        let groups = vec![populated(3, "c"), populated(1, "a"), populated(2, "b")];
        let sorted = sorted_by_priority(&groups);
        assert_eq!(
            sorted.iter().map(|g| g.priority).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
    }

    #[tokio::test]
    async fn test_generate_keeps_proposed_priorities() {
        let server = metrics_server(json!({
            "朝活": {"avgMonthlySearches": 9900, "competitionLevel": "HIGH"}
        }))
        .await;
        let producer = CannedProducer::new(vec![
            skeleton(1, "朝の習慣", &["朝活", "朝 ルーティン"]),
            skeleton(2, "夜の習慣", &["夜 ルーティン"]),
        ]);

        let request = StrategyRequest::Generate {
            concept: "習慣ブログ",
            directions: &[],
        };
        let groups = run_strategy(&request, &producer, &metrics_client(&server), &SilentProgress)
            .await
            .unwrap();

        assert_eq!(groups.iter().map(|g| g.priority).collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(groups[0].keywords[0].monthly_searches, 9900);
        assert_eq!(groups[0].keywords[0].competition, CompetitionLevel::High);
        assert_eq!(groups[0].keywords[1].monthly_searches, 0);
        assert_eq!(*producer.seen_base.lock().unwrap(), Some(0));
    }

    #[tokio::test]
    async fn test_expand_continues_priorities() {
        let server = metrics_server(json!({})).await;
        let existing = vec![populated(1, "a"), populated(2, "b"), populated(3, "c")];
        let producer = CannedProducer::new(
            (0..5)
                .map(|i| skeleton(1, &format!("new {i}"), &["kw"]))
                .collect(),
        );

        let request = StrategyRequest::Expand {
            concept: "concept",
            directions: &[],
            existing: &existing,
        };
        let new = run_strategy(&request, &producer, &metrics_client(&server), &SilentProgress)
            .await
            .unwrap();

        assert_eq!(
            new.iter().map(|g| g.priority).collect::<Vec<_>>(),
            vec![4, 5, 6, 7, 8]
        );
        assert_eq!(*producer.seen_base.lock().unwrap(), Some(3));

        let merged = append_groups(existing, new).unwrap();
        assert_eq!(merged.len(), 8);
    }

    #[tokio::test]
    async fn test_generate_rejects_missing_priorities() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(0)
            .mount(&server)
            .await;
        let producer = CannedProducer::new(vec![skeleton(0, "A", &["a"]), skeleton(0, "B", &["b"])]);

        let request = StrategyRequest::Generate {
            concept: "concept",
            directions: &[],
        };
        let err = run_strategy(&request, &producer, &metrics_client(&server), &SilentProgress)
            .await
            .unwrap_err();
        assert!(matches!(err, KeyplanError::Decode { .. }));
    }

    #[tokio::test]
    async fn test_expand_after_max_priority_fails_before_generation() {
        let server = MockServer::start().await;
        let existing = vec![populated(u32::MAX, "last")];
        let producer = CannedProducer::new(vec![skeleton(1, "new", &["kw"])]);

        let request = StrategyRequest::Expand {
            concept: "concept",
            directions: &[],
            existing: &existing,
        };
        let err = run_strategy(&request, &producer, &metrics_client(&server), &SilentProgress)
            .await
            .unwrap_err();
        assert!(matches!(err, KeyplanError::Validation { .. }));
        assert!(producer.seen_base.lock().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_expand_of_empty_strategy_starts_at_one() {
        let server = metrics_server(json!({})).await;
        let producer = CannedProducer::new(vec![skeleton(7, "a", &["x"]), skeleton(7, "b", &["y"])]);

        let request = StrategyRequest::Expand {
            concept: "concept",
            directions: &[],
            existing: &[],
        };
        let new = run_strategy(&request, &producer, &metrics_client(&server), &SilentProgress)
            .await
            .unwrap();
        assert_eq!(new.iter().map(|g| g.priority).collect::<Vec<_>>(), vec![1, 2]);
    }

    #[tokio::test]
    async fn test_producer_failure_skips_metrics() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(0)
            .mount(&server)
            .await;

        let request = StrategyRequest::Generate {
            concept: "concept",
            directions: &[],
        };
        let err = run_strategy(&request, &FailingProducer, &metrics_client(&server), &SilentProgress)
            .await
            .unwrap_err();
        assert!(matches!(err, KeyplanError::Decode { .. }));
    }
}
