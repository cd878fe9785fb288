//! Article generation for a single keyword group.

use std::future::Future;

use tracing::{info, instrument};

use keyplan_generative::{ArticleBrief, GeminiClient};
use keyplan_shared::{GeneratedArticle, KeyplanError, Keyword, KeywordGroup, Result};

/// Writes an article from a brief.
pub trait ArticleWriter: Send + Sync {
    fn write(&self, brief: &ArticleBrief) -> impl Future<Output = Result<GeneratedArticle>> + Send;
}

impl ArticleWriter for GeminiClient {
    async fn write(&self, brief: &ArticleBrief) -> Result<GeneratedArticle> {
        self.article(brief).await
    }
}

/// Keyword with the most monthly searches. Ties go to the earlier keyword;
/// a group without keywords falls back to its title.
pub fn main_keyword(group: &KeywordGroup) -> &str {
    group
        .keywords
        .iter()
        .fold(None, |best: Option<&Keyword>, kw| match best {
            Some(b) if b.monthly_searches >= kw.monthly_searches => Some(b),
            _ => Some(kw),
        })
        .map(|kw| kw.keyword.as_str())
        .unwrap_or(&group.group_title)
}

pub fn article_brief(concept: &str, group: &KeywordGroup) -> ArticleBrief {
    ArticleBrief {
        blog_concept: concept.to_string(),
        group_title: group.group_title.clone(),
        group_description: group.description.clone(),
        keywords: group.keywords.iter().map(|k| k.keyword.clone()).collect(),
        main_keyword: main_keyword(group).to_string(),
    }
}

/// Look up a group by priority.
pub fn find_group(groups: &[KeywordGroup], priority: u32) -> Result<&KeywordGroup> {
    groups
        .iter()
        .find(|g| g.priority == priority)
        .ok_or_else(|| KeyplanError::validation(format!("no keyword group with priority {priority}")))
}

/// Generate an article for `group`.
#[instrument(skip_all, fields(priority = group.priority))]
pub async fn write_article<W: ArticleWriter>(
    concept: &str,
    group: &KeywordGroup,
    writer: &W,
) -> Result<GeneratedArticle> {
    let brief = article_brief(concept, group);
    info!(main_keyword = %brief.main_keyword, keywords = brief.keywords.len(), "writing article");
    writer.write(&brief).await
}

/// Markdown document with the title as a level-one heading.
pub fn render_markdown(article: &GeneratedArticle) -> String {
    format!("# {}\n\n{}\n", article.title, article.content.trim_end())
}
