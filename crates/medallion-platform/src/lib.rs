// SPDX-License-Identifier: Apache-2.0

#![forbid(unsafe_code)]
//! Clients for the data platform behind the medallion demo.
//!
//! Each platform surface sits behind a trait so the HTTP service can run
//! against the live cluster or against the in-memory doubles in [`fake`]:
//! [`Prober`] for port discovery, [`ObjectStore`] for the S3 gateway,
//! [`EventStream`] for the Kafka REST proxy and [`TableCatalog`] for the
//! Iceberg catalog.

pub mod catalog;
mod connector;
pub mod credentials;
mod error;
pub mod event_stream;
pub mod fake;
mod http;
mod probe;
mod retry;
pub mod s3;
mod settings;
pub mod sigv4;

pub use catalog::{table_location, PolarisCatalog, PolarisConfig, SqliteCatalog, TableCatalog};
pub use connector::PlatformConnector;
pub use credentials::{generate_temp_keys, resolve_s3_keys, ResolvedKeys};
pub use error::{PlatformError, PlatformErrorCode};
pub use event_stream::{CommittedOffsets, EventStream, KafkaRestClient, PartitionOffsets};
pub use http::build_client;
pub use probe::{NetworkProber, ProbeTarget, Prober};
pub use retry::{BackoffPolicy, RetryPolicy};
pub use s3::{ObjectStore, S3Client};
pub use settings::{CatalogBackend, PlatformSettings};

pub const CRATE_NAME: &str = "medallion-platform";
