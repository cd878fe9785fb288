//! Prompt text and response schemas for each generation task.

use serde_json::{Value, json};

use keyplan_shared::ThematicDirection;

/// Everything the article writer needs to know about one keyword group.
#[derive(Debug, Clone)]
pub struct ArticleBrief {
    pub blog_concept: String,
    pub group_title: String,
    pub group_description: String,
    /// All target keywords of the group, in strategy order.
    pub keywords: Vec<String>,
    /// Keyword that must appear in the article title.
    pub main_keyword: String,
}

fn join_titles(directions: &[ThematicDirection]) -> String {
    directions
        .iter()
        .map(|d| d.title.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

// ---------------------------------------------------------------------------
// Prompts
// ---------------------------------------------------------------------------

pub(crate) fn directions_prompt(concept: &str) -> String {
    format!(
        "Blog concept: \"{concept}\"\n\n\
         Propose 10 to 15 thematic directions that could anchor content for this blog.\n\
         Cover the concept from as many different angles as possible.\n\
         Each direction must be a short, concrete keyword or phrase (for example \
         \"getting started\", \"saving tips\", \"recommended tools\"), not a sentence.\n\
         Write the directions in the same language as the blog concept.\n\
         Return a JSON array of objects with a \"title\" key."
    )
}

pub(crate) fn strategy_prompt(concept: &str, directions: &[ThematicDirection]) -> String {
    format!(
        "Blog concept: \"{concept}\"\n\
         Thematic directions: {titles}\n\n\
         Based on the concept and directions, create a content strategy with 8 to 10 keyword groups.\n\
         Each group needs a unique, clear title, a brief description, and 3 to 5 related search keywords.\n\
         Number the group priorities starting from 1.\n\
         Write titles, descriptions and keywords in the same language as the blog concept.\n\
         Return a JSON array of objects. \"keywords\" is an array of objects with a single \"keyword\" string.",
        titles = join_titles(directions),
    )
}

pub(crate) fn expansion_prompt(
    concept: &str,
    directions: &[ThematicDirection],
    existing_titles: &[String],
    base_priority: u32,
) -> String {
    let existing = existing_titles
        .iter()
        .map(|t| format!("- {t}"))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "Blog concept: \"{concept}\"\n\
         Thematic directions: {titles}\n\n\
         You are expanding an existing content strategy. These keyword groups already exist:\n\
         {existing}\n\n\
         Generate 5 new keyword groups that are distinct from every group listed above.\n\
         Each group needs a unique, clear title, a brief description, and 3 to 5 related search keywords.\n\
         Number the priorities of the new groups starting from {next}.\n\
         Write titles, descriptions and keywords in the same language as the blog concept.\n\
         Return a JSON array of objects. \"keywords\" is an array of objects with a single \"keyword\" string.",
        titles = join_titles(directions),
        next = base_priority.saturating_add(1),
    )
}

pub(crate) fn article_prompt(brief: &ArticleBrief) -> String {
    format!(
        "Blog concept: \"{concept}\"\n\
         Keyword group: \"{title}\"\n\
         Group description: \"{description}\"\n\
         Target keywords: {keywords}\n\
         Main keyword for the title: \"{main}\"\n\n\
         Write a high-quality blog post from this information, in the language of the blog concept.\n\n\
         Most important:\n\
         1. Sound like a real person, not an AI. Use casual, everyday wording, share honest \
         feelings, keep paragraphs short and the rhythm conversational.\n\
         2. Weave one concrete first-person story through the whole post: a (fictional) failure \
         related to the topic and how it was overcome, with vivid detail. This lived experience \
         is the core value of the article.\n\n\
         Also:\n\
         - Follow the tone and first-person voice implied by the blog concept.\n\
         - The title must naturally contain \"{main}\" and be catchy but human.\n\
         - Write one very short, click-worthy thumbnail catchphrase (ideally 15 characters or \
         fewer), separate from the title.\n\
         - Use every target keyword in the body, especially in ## and ### headings. Reorder words \
         or add particles where a keyword would otherwise read unnaturally.\n\
         - Use Markdown. Make it long enough to cover all target keywords, finish with a short \
         summary and a light invitation to follow the blog.\n\n\
         Return a single JSON object with \"title\", \"content\" (Markdown body without the title) \
         and \"thumbnailCatchphrase\".",
        concept = brief.blog_concept,
        title = brief.group_title,
        description = brief.group_description,
        keywords = brief.keywords.join(", "),
        main = brief.main_keyword,
    )
}

/// Background image for an article thumbnail. The caption is composited
/// later, so the image itself must stay free of text.
pub(crate) fn thumbnail_prompt(title: &str) -> String {
    format!(
        "Create a background image for the thumbnail of a blog post about \"{title}\".\n\
         Use a simple wallpaper in soft, pale colours. Place one small illustration related to \
         the theme unobtrusively in a single corner.\n\
         Most important: leave a large empty space in the centre, where text will be added later.\n\
         Keep the overall style clean and minimal.\n\
         The image must not contain any text, letters or words."
    )
}

// ---------------------------------------------------------------------------
// Response schemas
// ---------------------------------------------------------------------------

pub(crate) fn directions_schema() -> Value {
    json!({
        "type": "ARRAY",
        "items": {
            "type": "OBJECT",
            "properties": {
                "title": { "type": "STRING", "description": "The title of the thematic direction." }
            },
            "required": ["title"]
        }
    })
}

pub(crate) fn group_skeletons_schema() -> Value {
    json!({
        "type": "ARRAY",
        "items": {
            "type": "OBJECT",
            "properties": {
                "priority": { "type": "INTEGER" },
                "groupTitle": { "type": "STRING" },
                "description": { "type": "STRING" },
                "keywords": {
                    "type": "ARRAY",
                    "items": {
                        "type": "OBJECT",
                        "properties": { "keyword": { "type": "STRING" } },
                        "required": ["keyword"]
                    }
                }
            },
            "required": ["priority", "groupTitle", "description", "keywords"]
        }
    })
}

pub(crate) fn article_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "title": { "type": "STRING" },
            "content": { "type": "STRING" },
            "thumbnailCatchphrase": { "type": "STRING" }
        },
        "required": ["title", "content", "thumbnailCatchphrase"]
    })
}
