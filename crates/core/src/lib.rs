//! Core types and shared functionality for sift.
//!
//! This crate provides:
//! - Request, result and document types
//! - Error types for providers, fetches and the workspace
//! - Layered configuration
//! - The per-provider rate limiter
//! - In-memory and SQLite cache tiers
//! - Overflow-safe instant arithmetic

pub mod cache;
pub mod config;
pub mod error;
pub mod ratelimit;
pub mod time;
pub mod types;

pub use cache::{CacheDb, CacheKey, CacheStore, DocumentCache, SearchCache};
pub use config::{AppConfig, ConfigError};
pub use error::{Error, FetchError, ProviderError};
pub use ratelimit::{Acquire, RateLimitConfig, RateLimiter};
pub use types::{
    Document, DomainHint, FailureSummary, ProviderFailure, ProviderId, ProviderResult, SearchRequest,
};
