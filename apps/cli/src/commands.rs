//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Parser, Subcommand};
use color_eyre::eyre::Result;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use keyplan_core::article::{find_group, render_markdown, write_article};
use keyplan_core::strategy::{
    ProgressReporter, StrategyRequest, append_groups, run_strategy, sorted_by_priority,
};
use keyplan_generative::GeminiClient;
use keyplan_metrics::MetricsClient;
use keyplan_shared::{
    AppConfig, KeywordGroup, MetricsOptions, ThematicDirection, init_config, load_config,
    load_config_from, resolve_api_key,
};

use crate::files;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// keyplan: keyword strategies for a blog concept.
#[derive(Parser)]
#[command(
    name = "keyplan",
    version,
    about = "Plan blog content: keyword groups with search volume and competition, plus article drafts.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Config file to use instead of ~/.keyplan/keyplan.toml.
    #[arg(long, global = true, env = "KEYPLAN_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Propose thematic directions for a blog concept.
    Directions {
        /// Blog concept, e.g. "a blog about raising self-esteem".
        concept: String,
    },

    /// Generate a new keyword strategy.
    Generate {
        #[arg(short, long)]
        concept: String,

        /// Thematic direction (repeatable). Proposed automatically when omitted.
        #[arg(short, long = "direction")]
        directions: Vec<String>,

        /// Write the strategy JSON here.
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Print the strategy as JSON instead of a table.
        #[arg(long)]
        json: bool,
    },

    /// Add new keyword groups to an existing strategy.
    Expand {
        #[arg(short, long)]
        concept: String,

        /// Thematic direction (repeatable).
        #[arg(short, long = "direction")]
        directions: Vec<String>,

        /// Existing strategy JSON file.
        #[arg(short, long)]
        strategy: PathBuf,

        /// Write the merged strategy here (defaults to overwriting --strategy).
        #[arg(short, long)]
        out: Option<PathBuf>,

        #[arg(long)]
        json: bool,
    },

    /// Write an article for one keyword group of a strategy.
    Article {
        #[arg(short, long)]
        concept: String,

        #[arg(short, long)]
        strategy: PathBuf,

        /// Priority of the group to write about.
        #[arg(short, long)]
        priority: u32,

        /// Markdown output file (prints to stdout when omitted).
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Also generate a thumbnail background and write the JPEG here.
        #[arg(long)]
        thumbnail: Option<PathBuf>,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "keyplan=info",
        1 => "keyplan=debug",
        _ => "keyplan=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config.as_deref();
    match cli.command {
        Command::Directions { concept } => cmd_directions(config_path, &concept).await,
        Command::Generate {
            concept,
            directions,
            out,
            json,
        } => cmd_generate(config_path, &concept, directions, out.as_deref(), json).await,
        Command::Expand {
            concept,
            directions,
            strategy,
            out,
            json,
        } => {
            let out = out.unwrap_or_else(|| strategy.clone());
            cmd_expand(config_path, &concept, directions, &strategy, &out, json).await
        }
        Command::Article {
            concept,
            strategy,
            priority,
            out,
            thumbnail,
        } => {
            let outputs = ArticleOutputs {
                markdown: out.as_deref(),
                thumbnail: thumbnail.as_deref(),
            };
            cmd_article(config_path, &concept, &strategy, priority, outputs).await
        }
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(config_path),
        },
    }
}

// ---------------------------------------------------------------------------
// Clients
// ---------------------------------------------------------------------------

fn app_config(path: Option<&Path>) -> Result<AppConfig> {
    Ok(match path {
        Some(p) => load_config_from(p)?,
        None => load_config()?,
    })
}

/// Both service clients, built once per invocation.
struct Clients {
    gemini: GeminiClient,
    metrics: MetricsClient,
}

impl Clients {
    fn from_config(config: &AppConfig) -> Result<Self> {
        let api_key = resolve_api_key(config)?;
        Ok(Self {
            gemini: GeminiClient::new(&config.gemini, api_key)?,
            metrics: MetricsClient::new(MetricsOptions::try_from(config)?)?,
        })
    }
}

fn to_directions(titles: Vec<String>) -> Vec<ThematicDirection> {
    titles
        .into_iter()
        .map(|title| ThematicDirection { title })
        .collect()
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_directions(config_path: Option<&Path>, concept: &str) -> Result<()> {
    let config = app_config(config_path)?;
    let gemini = GeminiClient::new(&config.gemini, resolve_api_key(&config)?)?;

    let spinner = CliProgress::new();
    spinner.phase("Proposing thematic directions");
    let directions = gemini.thematic_directions(concept).await;
    spinner.finish();

    for direction in directions? {
        println!("  {}", direction.title);
    }
    Ok(())
}

async fn cmd_generate(
    config_path: Option<&Path>,
    concept: &str,
    directions: Vec<String>,
    out: Option<&Path>,
    json: bool,
) -> Result<()> {
    let config = app_config(config_path)?;
    let clients = Clients::from_config(&config)?;
    let reporter = CliProgress::new();

    let directions = if directions.is_empty() {
        reporter.phase("Proposing thematic directions");
        let proposed = clients.gemini.thematic_directions(concept).await?;
        info!(count = proposed.len(), "using proposed thematic directions");
        proposed
    } else {
        to_directions(directions)
    };

    info!(concept, directions = directions.len(), "generating strategy");

    let request = StrategyRequest::Generate {
        concept,
        directions: &directions,
    };
    let groups = run_strategy(&request, &clients.gemini, &clients.metrics, &reporter).await?;

    if let Some(path) = out {
        files::write_json(path, &groups)?;
        info!(path = %path.display(), groups = groups.len(), "strategy saved");
    }
    print_strategy(&groups, json)
}

async fn cmd_expand(
    config_path: Option<&Path>,
    concept: &str,
    directions: Vec<String>,
    strategy: &Path,
    out: &Path,
    json: bool,
) -> Result<()> {
    let config = app_config(config_path)?;
    let existing = files::read_strategy(strategy)?;
    let clients = Clients::from_config(&config)?;
    let directions = to_directions(directions);

    info!(concept, existing = existing.len(), "expanding strategy");

    let reporter = CliProgress::new();
    let request = StrategyRequest::Expand {
        concept,
        directions: &directions,
        existing: &existing,
    };
    let new = run_strategy(&request, &clients.gemini, &clients.metrics, &reporter).await?;
    let added = new.len();
    let merged = append_groups(existing, new)?;

    files::write_json(out, &merged)?;
    info!(path = %out.display(), added, total = merged.len(), "strategy saved");

    print_strategy(&merged, json)
}

/// Where `article` writes its results.
struct ArticleOutputs<'a> {
    markdown: Option<&'a Path>,
    thumbnail: Option<&'a Path>,
}

async fn cmd_article(
    config_path: Option<&Path>,
    concept: &str,
    strategy: &Path,
    priority: u32,
    outputs: ArticleOutputs<'_>,
) -> Result<()> {
    let config = app_config(config_path)?;
    let groups = files::read_strategy(strategy)?;
    let group = find_group(&groups, priority)?;
    let gemini = GeminiClient::new(&config.gemini, resolve_api_key(&config)?)?;

    let spinner = CliProgress::new();
    spinner.phase(&format!("Writing article for \"{}\"", group.group_title));
    let article = write_article(concept, group, &gemini).await?;

    // A failed thumbnail is reported only after the article is saved.
    let image = match outputs.thumbnail {
        Some(_) => {
            spinner.phase("Generating thumbnail background");
            Some(gemini.thumbnail(&article.title).await)
        }
        None => None,
    };
    spinner.finish();

    let markdown = render_markdown(&article);
    match outputs.markdown {
        Some(path) => {
            files::write_text(path, &markdown)?;
            println!("  Article written to {}", path.display());
        }
        None => println!("{markdown}"),
    }

    if let (Some(path), Some(image)) = (outputs.thumbnail, image) {
        files::write_bytes(path, &image?)?;
        println!("  Thumbnail written to {}", path.display());
    }

    println!("  Title:       {}", article.title);
    println!("  Catchphrase: {}", article.thumbnail_catchphrase);
    Ok(())
}

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show(config_path: Option<&Path>) -> Result<()> {
    let config = app_config(config_path)?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

fn print_strategy(groups: &[KeywordGroup], json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(groups)?);
        return Ok(());
    }

    for group in sorted_by_priority(groups) {
        println!();
        println!("  [{}] {}", group.priority, group.group_title);
        if !group.description.is_empty() {
            println!("      {}", group.description);
        }
        for kw in &group.keywords {
            println!(
                "      {:<32} {:>9}  {}",
                kw.keyword, kw.monthly_searches, kw.competition
            );
        }
    }
    println!();
    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {msg}") {
            spinner.set_style(
                style.tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
            );
        }
        spinner.enable_steady_tick(Duration::from_millis(80));
        Self { spinner }
    }

    fn finish(&self) {
        self.spinner.finish_and_clear();
    }
}

impl Drop for CliProgress {
    fn drop(&mut self) {
        if !self.spinner.is_finished() {
            self.spinner.finish_and_clear();
        }
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn skeleton_ready(&self, groups: usize, keywords: usize) {
        self.spinner
            .set_message(format!("Fetching metrics for {keywords} keywords in {groups} groups"));
    }

    fn done(&self, _groups: &[KeywordGroup]) {
        self.finish();
    }
}
