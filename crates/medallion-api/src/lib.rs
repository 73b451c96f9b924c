// SPDX-License-Identifier: Apache-2.0

#![forbid(unsafe_code)]

mod errors;
mod openapi;
pub mod params;

pub use errors::{ApiError, ApiErrorCode, API_ERROR_CODES};
pub use openapi::openapi_v1_spec;
pub use params::{parse_limit, LimitBounds};

pub const CRATE_NAME: &str = "medallion-api";
