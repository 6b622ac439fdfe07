//! MCP tool implementations.
//!
//! This module contains all tools exposed by the sift server.

pub mod cache;
pub mod research;

pub use research::WebResearchParams;
