//! Keyword strategy orchestration for keyplan.
//!
//! Ties the generative and metrics clients together: skeleton groups from the
//! model, search metrics from the provider, priorities for expansions, and
//! article generation for a chosen group.

pub mod aggregate;
pub mod article;
pub mod priority;
pub mod strategy;
