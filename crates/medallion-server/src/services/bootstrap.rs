// SPDX-License-Identifier: Apache-2.0

use super::ServiceError;
use crate::store::state_db::StateDb;
use medallion_model::{
    cleansed_schema, kpi_schema, BootstrapResult, Layer, ProvisionKind, ProvisionResult,
    ProvisionStatus, TableIdent, TableSchema, CLEANSED_TABLE, GOLD_BUCKET, KPI_TABLE, RAW_TOPIC,
    RAW_TOPIC_PARTITIONS, RAW_TOPIC_REPLICATION, SILVER_BUCKET,
};
use medallion_platform::{table_location, PlatformConnector, PlatformError};
use tracing::{info, warn};

pub(crate) const BOOTSTRAP_CATEGORY: &str = "bootstrap";
const BOOTSTRAP_STARTED: &str = "Starting demo environment bootstrap...";
const BOOTSTRAP_COMPLETED: &str = "✓ Demo environment bootstrap completed successfully";
const BOOTSTRAP_PARTIAL: &str = "⚠ Demo environment bootstrap completed with errors";

fn provision_outcome(
    kind: ProvisionKind,
    name: &str,
    outcome: Result<ProvisionStatus, PlatformError>,
) -> ProvisionResult {
    match outcome {
        Ok(ProvisionStatus::Created) => ProvisionResult::created(kind, name),
        Ok(ProvisionStatus::Skipped) => ProvisionResult::skipped(kind, name),
        Ok(ProvisionStatus::Failed) => ProvisionResult::failed(kind, name, "creation failed"),
        Err(err) => {
            warn!(kind = kind.as_str(), name, error = %err, "provisioning failed");
            ProvisionResult::failed(kind, name, err.message)
        }
    }
}

fn bootstrap_tables() -> [(&'static str, &'static str, TableSchema); 2] {
    [
        (CLEANSED_TABLE, SILVER_BUCKET, cleansed_schema()),
        (KPI_TABLE, GOLD_BUCKET, kpi_schema()),
    ]
}

/// Creates every medallion resource that does not exist yet. Existing
/// resources are skipped, failures are reported per resource, and the
/// environment is marked bootstrapped only when nothing failed.
pub(crate) async fn bootstrap(
    db: &StateDb,
    connector: &PlatformConnector,
    profile_id: &str,
) -> Result<BootstrapResult, ServiceError> {
    let mut logs = vec![BOOTSTRAP_STARTED.to_string()];

    let mut buckets = Vec::new();
    for layer in Layer::ALL {
        let name = layer.bucket();
        logs.push(ProvisionResult::checking_line(ProvisionKind::Bucket, name));
        let result = provision_outcome(
            ProvisionKind::Bucket,
            name,
            connector.objects.create_bucket(name).await,
        );
        logs.push(result.log_line());
        buckets.push(result);
    }

    logs.push(ProvisionResult::checking_line(ProvisionKind::Topic, RAW_TOPIC));
    let topic = provision_outcome(
        ProvisionKind::Topic,
        RAW_TOPIC,
        connector
            .events
            .create_topic(RAW_TOPIC, RAW_TOPIC_PARTITIONS, RAW_TOPIC_REPLICATION)
            .await,
    );
    logs.push(topic.log_line());
    let topics = vec![topic];

    let mut tables = Vec::new();
    for (name, bucket, schema) in bootstrap_tables() {
        logs.push(ProvisionResult::checking_line(ProvisionKind::Table, name));
        let outcome = match TableIdent::parse(name) {
            Ok(ident) => {
                connector
                    .catalog
                    .create_table(&ident, &schema, &table_location(bucket, &ident))
                    .await
            }
            Err(err) => Err(err.into()),
        };
        let result = provision_outcome(ProvisionKind::Table, name, outcome);
        logs.push(result.log_line());
        tables.push(result);
    }

    let ok = |r: &&ProvisionResult| r.outcome != ProvisionStatus::Failed;
    let topics_ready = topics.iter().filter(ok).count() as u32;
    let tables_ready = tables.iter().filter(ok).count() as u32;
    let mut result = BootstrapResult::new(buckets, topics, tables, logs);
    if result.status == "success" {
        db.mark_bootstrapped(topics_ready, tables_ready)?;
        result.logs.push(BOOTSTRAP_COMPLETED.to_string());
    } else {
        result.logs.push(BOOTSTRAP_PARTIAL.to_string());
    }
    db.append_events(profile_id, BOOTSTRAP_CATEGORY, &result.logs)?;
    info!(status = %result.status, "bootstrap finished");
    Ok(result)
}
