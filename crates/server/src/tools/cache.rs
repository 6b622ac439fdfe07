//! cache_purge tool implementation.
//!
//! Evicts expired entries from every cache tier.

use rmcp::{ErrorData as McpError, model::*};
use sift_client::Pipeline;
use sift_core::Error;

/// Implementation of the cache_purge tool.
pub async fn purge_impl(pipeline: &Pipeline) -> Result<CallToolResult, McpError> {
    let report = pipeline.purge_expired().await?;
    let json = serde_json::to_string_pretty(&report)
        .map_err(|e| Error::InvalidInput(format!("Failed to serialize output: {e}")))?;

    Ok(CallToolResult::success(vec![Content::text(json)]))
}
