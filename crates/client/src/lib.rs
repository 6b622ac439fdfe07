//! Retrieval client for sift.
//!
//! This crate provides the search provider adapters, provider fallback,
//! the crawl policy gate, page fetching and extraction, relevance scoring
//! and ranking. [`Pipeline`] ties them together for the server.

pub mod dates;
pub mod extract;
pub mod fetch;
pub mod orchestrator;
pub mod pipeline;
pub mod policy;
pub mod providers;
pub mod rank;
pub mod retriever;
pub mod scoring;

pub use extract::{Extraction, Extractor, HtmlExtractor};
pub use fetch::{FetchConfig, FetchTransport, HttpTransport, RawResponse, canonicalize};
pub use orchestrator::{FallbackState, Orchestrator, Resolved};
pub use pipeline::{Pipeline, PurgeReport, Resolution};
pub use policy::{PolicyConfig, PolicyGate, PolicyRecord, PolicySource};
pub use providers::SearchProvider;
pub use retriever::ContentRetriever;
pub use scoring::{KeywordScorer, RelevanceScorer};
