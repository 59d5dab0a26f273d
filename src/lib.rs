//! Hybrid FAQ search: spelling correction, normalization, fuzzy token
//! matching and embedding similarity fused into one ranked result list.

pub mod cli;
pub mod config;
pub mod corpus;
pub mod search;
pub mod web;

#[cfg(test)]
mod tests;

pub use config::Config;
pub use corpus::{Corpus, FaqEntry};
pub use search::{FaqEngine, SearchResult};
