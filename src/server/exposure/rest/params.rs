//! Query string parsing for the table routes
//!
//! Supports the subset of filter syntax the pages use: `limit=N` on selects
//! and `id=neq.<sentinel>` on bulk deletes.

use crate::core::error::RequestError;
use crate::core::row::Row;
use std::collections::HashMap;

/// Upper bound on `limit`
pub const MAX_LIMIT: usize = 1000;

/// Parse `limit`, falling back to `default`
pub fn parse_limit(
    params: &HashMap<String, String>,
    default: Option<usize>,
) -> Result<Option<usize>, RequestError> {
    let Some(raw) = params.get("limit") else {
        return Ok(default);
    };

    let limit: usize = raw.trim().parse().map_err(|_| RequestError::InvalidQuery {
        name: "limit".to_string(),
        message: format!("'{}' is not a non-negative integer", raw),
    })?;

    Ok(Some(limit.min(MAX_LIMIT)))
}

/// Parse a row identity from its textual form
///
/// Numeric ids parse as JSON numbers; UUIDs as JSON strings.
pub fn parse_id<T: Row>(raw: &str) -> Result<T::Id, RequestError> {
    let raw = raw.trim();
    serde_json::from_str::<T::Id>(raw)
        .or_else(|_| serde_json::from_value::<T::Id>(serde_json::Value::String(raw.to_string())))
        .map_err(|_| RequestError::InvalidRowId {
            id: raw.to_string(),
        })
}

/// Parse the mandatory `id=neq.<sentinel>` filter of a bulk delete
pub fn parse_bulk_filter<T: Row>(params: &HashMap<String, String>) -> Result<T::Id, RequestError> {
    let raw = params.get("id").ok_or_else(|| RequestError::InvalidQuery {
        name: "id".to_string(),
        message: "bulk delete requires a filter such as 'id=neq.0'".to_string(),
    })?;

    let value = raw
        .strip_prefix("neq.")
        .ok_or_else(|| RequestError::InvalidQuery {
            name: "id".to_string(),
            message: format!("unsupported filter '{}', expected 'neq.<id>'", raw),
        })?;

    parse_id::<T>(value)
}
