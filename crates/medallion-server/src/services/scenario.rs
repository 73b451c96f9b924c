// SPDX-License-Identifier: Apache-2.0

use super::ServiceError;
use crate::config::ApiConfig;
use crate::store::state_db::StateDb;
use chrono::Utc;
use medallion_model::{
    compute_kpis, generate_events, sort_rows_recent_first, validate_telemetry, KpiRecord,
    ScenarioKind, ScenarioResult, TableIdent, TelemetryRecord, CLEANSED_TABLE, CONSUMER_GROUP,
    KPI_TABLE, RAW_TOPIC,
};
use medallion_platform::event_stream::ops::{self, DEFAULT_PUBLISH_LIMIT};
use medallion_platform::{EventStream, PlatformConnector, TableCatalog};
use serde_json::{json, Map, Value};
use tracing::{debug, info};

pub(crate) const SCENARIO_CATEGORY: &str = "scenario";

#[derive(Default)]
struct Run {
    logs: Vec<String>,
    data: Map<String, Value>,
    invalidated: u64,
}

impl Run {
    fn log(&mut self, line: impl Into<String>) {
        self.logs.push(line.into());
    }
}

async fn simulate_ingestion(
    events: &dyn EventStream,
    count: usize,
    run: &mut Run,
) -> Result<usize, ServiceError> {
    run.log(format!("Generating {count} telemetry events..."));
    let values: Vec<Value> = {
        let mut rng = rand::thread_rng();
        generate_events(&mut rng, count, Utc::now())
            .iter()
            .map(|record| json!(record))
            .collect()
    };
    let mut sent = 0;
    for batch in values.chunks(DEFAULT_PUBLISH_LIMIT) {
        sent += ops::publish(events, RAW_TOPIC, batch, DEFAULT_PUBLISH_LIMIT).await?;
    }
    run.log(format!("✓ Published {sent} events to {RAW_TOPIC}"));
    run.data.insert("events_published".into(), json!(sent));
    Ok(sent)
}

/// Consumes new raw records, keeps the ones that pass validation and writes
/// them to the cleansed table.
async fn process_data(
    connector: &PlatformConnector,
    max_records: usize,
    run: &mut Run,
) -> Result<Vec<TelemetryRecord>, ServiceError> {
    run.log(format!("Consuming from {RAW_TOPIC} as {CONSUMER_GROUP}..."));
    let consumed =
        ops::consume_and_commit(connector.events.as_ref(), RAW_TOPIC, CONSUMER_GROUP, max_records)
            .await?;
    run.log(format!("Consumed {} records", consumed.len()));

    let mut valid = Vec::new();
    let mut invalid = 0u64;
    for message in &consumed {
        match validate_telemetry(&message.value) {
            Ok(record) => valid.push(record),
            Err(issues) => {
                invalid += 1;
                debug!(
                    partition = message.partition,
                    offset = message.offset,
                    issues = ?issues.iter().map(ToString::to_string).collect::<Vec<_>>(),
                    "record discarded by validation"
                );
            }
        }
    }

    if valid.is_empty() {
        run.log("No valid records to write");
    } else {
        let ident = TableIdent::parse(CLEANSED_TABLE)?;
        let rows: Vec<Value> = valid.iter().map(|record| json!(record)).collect();
        let written = connector.catalog.append(&ident, &rows).await?;
        run.log(format!("✓ Wrote {written} records to {CLEANSED_TABLE}"));
    }
    if invalid > 0 {
        run.log(format!("⚠ Discarded {invalid} invalid records"));
    }
    run.invalidated += invalid;
    run.data.insert("records_consumed".into(), json!(consumed.len()));
    run.data.insert("records_valid".into(), json!(valid.len()));
    run.data.insert("records_invalid".into(), json!(invalid));
    Ok(valid)
}

async fn curate_records(
    catalog: &dyn TableCatalog,
    records: &[TelemetryRecord],
    run: &mut Run,
) -> Result<Option<KpiRecord>, ServiceError> {
    run.log(format!("Aggregating {} cleansed records...", records.len()));
    let Some(kpi) = compute_kpis(records) else {
        run.log("No cleansed records to aggregate");
        return Ok(None);
    };
    let ident = TableIdent::parse(KPI_TABLE)?;
    catalog.append(&ident, &[json!(kpi)]).await?;
    run.log(format!(
        "✓ KPI window {} to {}: {} events, avg temp {}, {} anomalies",
        kpi.window_start, kpi.window_end, kpi.total_events, kpi.avg_temp, kpi.anomaly_count
    ));
    run.log(format!("✓ Wrote KPI record to {KPI_TABLE}"));
    run.data.insert("kpi".into(), json!(kpi));
    Ok(Some(kpi))
}

/// Aggregates the newest `window` rows of the cleansed table.
async fn curate_data(
    catalog: &dyn TableCatalog,
    window: usize,
    run: &mut Run,
) -> Result<Option<KpiRecord>, ServiceError> {
    let ident = TableIdent::parse(CLEANSED_TABLE)?;
    let mut rows = catalog.scan(&ident).await?;
    sort_rows_recent_first(&mut rows);
    rows.truncate(window);
    let records: Vec<TelemetryRecord> = rows
        .iter()
        .filter_map(|row| validate_telemetry(row).ok())
        .collect();
    curate_records(catalog, &records, run).await
}

pub(crate) async fn run_scenario(
    db: &StateDb,
    connector: &PlatformConnector,
    api: &ApiConfig,
    profile_id: &str,
    kind: ScenarioKind,
) -> Result<ScenarioResult, ServiceError> {
    let mut run = Run::default();
    run.log(format!("Running scenario {kind}..."));
    match kind {
        ScenarioKind::SimulateIngestion => {
            simulate_ingestion(connector.events.as_ref(), api.ingest_batch_size, &mut run).await?;
        }
        ScenarioKind::ProcessData => {
            process_data(connector, api.consume_max_records, &mut run).await?;
        }
        ScenarioKind::CurateData => {
            curate_data(connector.catalog.as_ref(), api.curate_window_rows, &mut run).await?;
        }
        ScenarioKind::IotStreaming => {
            simulate_ingestion(connector.events.as_ref(), api.ingest_batch_size, &mut run).await?;
            let cleansed = process_data(connector, api.consume_max_records, &mut run).await?;
            curate_records(connector.catalog.as_ref(), &cleansed, &mut run).await?;
        }
    }
    let result = ScenarioResult::completed(kind, run.logs, run.data, run.invalidated);
    db.append_events(profile_id, SCENARIO_CATEGORY, &result.logs)?;
    info!(scenario = %kind, invalidated = result.invalidated_count, "scenario finished");
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use medallion_model::{cleansed_schema, kpi_schema, ProvisionStatus, SILVER_BUCKET};
    use medallion_platform::fake::{FakeCatalog, FakeEventStream, FakeObjectStore, FakeProber};
    use medallion_platform::table_location;
    use std::sync::Arc;

    async fn bootstrapped() -> (Arc<FakeEventStream>, Arc<FakeCatalog>, PlatformConnector) {
        let events = Arc::new(FakeEventStream::new());
        events.add_topic(RAW_TOPIC, 1).await;
        let catalog = Arc::new(FakeCatalog::new());
        for (name, schema) in [(CLEANSED_TABLE, cleansed_schema()), (KPI_TABLE, kpi_schema())] {
            let ident = TableIdent::parse(name).expect("ident");
            let status = catalog
                .create_table(&ident, &schema, &table_location(SILVER_BUCKET, &ident))
                .await
                .expect("table");
            assert_eq!(status, ProvisionStatus::Created);
        }
        let connector = PlatformConnector::new(
            "df.local",
            None,
            None,
            Arc::new(FakeProber::all_available()),
            Arc::new(FakeObjectStore::new()),
            Arc::clone(&events) as Arc<dyn EventStream>,
            Arc::clone(&catalog) as Arc<dyn TableCatalog>,
        );
        (events, catalog, connector)
    }

    fn ident(name: &str) -> TableIdent {
        TableIdent::parse(name).expect("ident")
    }

    #[tokio::test]
    async fn iot_streaming_runs_the_whole_pipeline() {
        let db = StateDb::in_memory().expect("db");
        let (_events, catalog, connector) = bootstrapped().await;
        let api = ApiConfig::default();
        let result = run_scenario(&db, &connector, &api, "default", ScenarioKind::IotStreaming)
            .await
            .expect("scenario");
        assert_eq!(result.status, "success");
        assert_eq!(result.message, "Scenario iot_streaming completed successfully");
        assert_eq!(result.data_generated["events_published"], 100);
        assert_eq!(result.data_generated["records_consumed"], 100);
        assert_eq!(result.invalidated_count, 0);

        let cleansed = catalog.scan(&ident(CLEANSED_TABLE)).await.expect("scan");
        assert_eq!(cleansed.len(), 100);
        let kpis = catalog.scan(&ident(KPI_TABLE)).await.expect("scan");
        assert_eq!(kpis.len(), 1);
        assert_eq!(kpis[0]["total_events"], 100);
        assert_eq!(
            db.recent_events(500).expect("events").len(),
            result.logs.len()
        );
    }

    #[tokio::test]
    async fn processing_discards_invalid_records_and_commits() {
        let db = StateDb::in_memory().expect("db");
        let (events, catalog, connector) = bootstrapped().await;
        let good = json!({
            "event_id": "a", "device_id": "CNC-001", "timestamp": "2024-05-01T10:00:00Z",
            "temperature": 70.0, "vibration": 1.0, "status": "OK"
        });
        let too_hot = json!({
            "event_id": "b", "device_id": "CNC-001", "timestamp": "2024-05-01T10:00:01Z",
            "temperature": 120.0, "vibration": 1.0, "status": "OK"
        });
        events
            .produce(RAW_TOPIC, &[good, too_hot, json!({"event_id": "c"})])
            .await
            .expect("produce");

        let api = ApiConfig::default();
        let result = run_scenario(&db, &connector, &api, "default", ScenarioKind::ProcessData)
            .await
            .expect("scenario");
        assert_eq!(result.invalidated_count, 2);
        assert_eq!(result.data_generated["records_valid"], 1);
        assert!(result.logs.contains(&"⚠ Discarded 2 invalid records".to_string()));
        assert_eq!(catalog.scan(&ident(CLEANSED_TABLE)).await.expect("scan").len(), 1);

        let again = run_scenario(&db, &connector, &api, "default", ScenarioKind::ProcessData)
            .await
            .expect("scenario");
        assert_eq!(again.data_generated["records_consumed"], 0);
        assert!(again.logs.contains(&"No valid records to write".to_string()));
    }

    #[tokio::test]
    async fn curation_aggregates_the_cleansed_table() {
        let db = StateDb::in_memory().expect("db");
        let (_events, catalog, connector) = bootstrapped().await;
        let rows = vec![
            json!({"event_id": "a", "device_id": "CNC-001", "timestamp": "2024-05-01T10:00:00Z",
                   "temperature": 70.0, "vibration": 1.0, "status": "OK"}),
            json!({"event_id": "b", "device_id": "ROBOT-A", "timestamp": "2024-05-01T10:05:00Z",
                   "temperature": 80.0, "vibration": 2.0, "status": "WARNING"}),
        ];
        catalog
            .append(&ident(CLEANSED_TABLE), &rows)
            .await
            .expect("append");

        let api = ApiConfig::default();
        let result = run_scenario(&db, &connector, &api, "default", ScenarioKind::CurateData)
            .await
            .expect("scenario");
        let kpi = &result.data_generated["kpi"];
        assert_eq!(kpi["total_events"], 2);
        assert_eq!(kpi["avg_temp"], 75.0);
        assert_eq!(kpi["anomaly_count"], 1);
        assert_eq!(kpi["window_start"], "2024-05-01T10:00:00Z");
    }

    #[tokio::test]
    async fn curation_of_an_empty_table_writes_nothing() {
        let db = StateDb::in_memory().expect("db");
        let (_events, catalog, connector) = bootstrapped().await;
        let api = ApiConfig::default();
        let result = run_scenario(&db, &connector, &api, "default", ScenarioKind::CurateData)
            .await
            .expect("scenario");
        assert!(result.logs.contains(&"No cleansed records to aggregate".to_string()));
        assert!(catalog.scan(&ident(KPI_TABLE)).await.expect("scan").is_empty());
    }
}
