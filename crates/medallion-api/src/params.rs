// SPDX-License-Identifier: Apache-2.0

use crate::errors::ApiError;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LimitBounds {
    pub default: usize,
    pub max: usize,
}

impl LimitBounds {
    pub const MESSAGES: Self = Self {
        default: 50,
        max: 500,
    };
    pub const DEBUG_ROWS: Self = Self {
        default: 100,
        max: 1000,
    };
    pub const TABLE_ROWS: Self = Self {
        default: 500,
        max: 5000,
    };
    pub const EVENTS: Self = Self {
        default: 100,
        max: 1000,
    };
}

/// Reads `limit` from the query string; absent means the default, zero is
/// rejected and anything above max is clamped to it.
pub fn parse_limit(
    query: &BTreeMap<String, String>,
    bounds: LimitBounds,
) -> Result<usize, ApiError> {
    let Some(raw) = query.get("limit") else {
        return Ok(bounds.default);
    };
    let value = raw
        .trim()
        .parse::<usize>()
        .map_err(|_| ApiError::invalid_param("limit", raw))?;
    if value == 0 {
        return Err(ApiError::invalid_param("limit", raw));
    }
    Ok(value.min(bounds.max))
}
