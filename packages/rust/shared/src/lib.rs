//! Shared types, error model, and configuration for keyplan.
//!
//! This crate is the foundation depended on by all other keyplan crates.
//! It provides:
//! - [`KeyplanError`]: the unified error type
//! - Domain types ([`KeywordGroup`], [`Keyword`], [`GroupSkeleton`], [`CompetitionLevel`])
//! - Configuration ([`AppConfig`], [`MetricsOptions`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, GeminiConfig, MetricsConfig, MetricsOptions, config_dir, config_file_path,
    init_config, load_config, load_config_from, resolve_api_key,
};
pub use error::{KeyplanError, Result};
pub use types::{
    CompetitionLevel, GeneratedArticle, GroupSkeleton, Keyword, KeywordGroup, SkeletonKeyword,
    ThematicDirection,
};
