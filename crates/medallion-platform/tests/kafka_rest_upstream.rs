// SPDX-License-Identifier: Apache-2.0

mod support;

use medallion_model::ProvisionStatus;
use medallion_platform::event_stream::ops;
use medallion_platform::{CommittedOffsets, EventStream, KafkaRestClient, RetryPolicy};
use serde_json::json;
use support::{MockUpstream, Recorded, Reply};

const TOPIC: &str = "manufacturing.telemetry.raw";

fn handle(req: &Recorded) -> Reply {
    let path = req.path();
    match req.method.as_str() {
        "GET" if path == "/topics" => Reply::json(200, json!([TOPIC, "__consumer_offsets"])),
        "GET" if path.ends_with("/partitions") => {
            Reply::json(200, json!([{"partition": 0, "leader": 1, "replicas": []}]))
        }
        "GET" if path.ends_with("/offsets") && path.starts_with("/topics/") => {
            Reply::json(200, json!({"beginning_offset": 0, "end_offset": 2}))
        }
        "GET" if path == "/v3/clusters" => Reply::json(200, json!({"data": [{"cluster_id": "c1"}]})),
        "POST" if path == "/v3/clusters/c1/topics" => {
            if req.body.contains("race.topic") {
                Reply::json(400, json!({"error_code": 40002, "message": "Topic already exists"}))
            } else {
                Reply::json(201, json!({"topic_name": "new.topic"}))
            }
        }
        "POST" if path.starts_with("/consumers/") && !path.contains("/instances/") => {
            Reply::json(200, json!({"instance_id": "i", "base_uri": "http://elsewhere"}))
        }
        "POST" if path.ends_with("/assignments") || path.ends_with("/positions") => {
            Reply::empty(204)
        }
        "POST" if path.ends_with("/offsets") => Reply::empty(204),
        "GET" if path.ends_with("/records") => Reply::json(
            200,
            json!([
                {"topic": TOPIC, "partition": 0, "offset": 0, "key": null,
                 "value": {"event_id": "a", "timestamp": "2024-05-01T10:00:00Z"}},
                {"topic": TOPIC, "partition": 0, "offset": 1, "key": null,
                 "value": {"event_id": "b", "timestamp": "2024-05-01T10:00:01Z"}}
            ]),
        ),
        "GET" if path.ends_with("/offsets") => Reply::json(
            200,
            json!({"offsets": [{"topic": TOPIC, "partition": 0, "offset": 1, "metadata": ""}]}),
        ),
        "DELETE" => Reply::empty(204),
        "POST" if path == format!("/topics/{TOPIC}") => Reply::json(
            200,
            json!({"offsets": [{"partition": 0, "offset": 2}, {"partition": 0, "offset": 3}]}),
        ),
        _ => Reply::empty(404),
    }
}

async fn client() -> (MockUpstream, KafkaRestClient) {
    let upstream = MockUpstream::start(handle).await;
    let kafka = KafkaRestClient::new(reqwest::Client::new(), &upstream.endpoint(), "mapr", "pw")
        .with_retry(RetryPolicy::single_attempt());
    (upstream, kafka)
}

#[tokio::test]
async fn topics_skip_internal_names() {
    let (_upstream, kafka) = client().await;
    let topics = kafka.list_topics().await.expect("topics");
    assert_eq!(topics.len(), 1);
    assert_eq!(topics[0].name, TOPIC);
    assert_eq!(topics[0].partitions, 1);
}

#[tokio::test]
async fn topic_creation_uses_v3_admin_api() {
    let (upstream, kafka) = client().await;
    assert_eq!(
        kafka.create_topic(TOPIC, 1, 1).await.expect("existing"),
        ProvisionStatus::Skipped
    );
    assert_eq!(
        kafka.create_topic("new.topic", 1, 1).await.expect("new"),
        ProvisionStatus::Created
    );
    assert_eq!(
        kafka.create_topic("race.topic", 1, 1).await.expect("race"),
        ProvisionStatus::Skipped
    );
    let create = upstream
        .recorded()
        .into_iter()
        .find(|r| r.method == "POST" && r.path() == "/v3/clusters/c1/topics")
        .expect("create request");
    let body: serde_json::Value = serde_json::from_str(&create.body).expect("json body");
    assert_eq!(body["partitions_count"], 1);
    assert_eq!(body["replication_factor"], 1);
}

#[tokio::test]
async fn fetch_reads_through_a_temporary_consumer() {
    let (upstream, kafka) = client().await;
    let records = kafka.fetch(TOPIC, 0, 0, 2).await.expect("records");
    assert_eq!(records.len(), 2);
    assert_eq!(records[1].value["event_id"], "b");
    assert_eq!(records[0].timestamp.as_deref(), Some("2024-05-01T10:00:00Z"));

    let seen = upstream.recorded();
    let records_call = seen
        .iter()
        .find(|r| r.path().ends_with("/records"))
        .expect("records call");
    assert_eq!(
        records_call.header("accept"),
        Some("application/vnd.kafka.json.v2+json")
    );
    assert!(seen.iter().any(|r| r.method == "DELETE"));
}

#[tokio::test]
async fn committed_offsets_and_commit_round_trip() {
    let (upstream, kafka) = client().await;
    let committed = kafka
        .committed_offsets("manufacturing-consumer-group", TOPIC)
        .await
        .expect("committed");
    assert_eq!(committed.get(&0), Some(&1));

    let mut next = CommittedOffsets::new();
    next.insert(0, 2);
    kafka
        .commit("manufacturing-consumer-group", TOPIC, &next)
        .await
        .expect("commit");
    let commit = upstream
        .recorded()
        .into_iter()
        .find(|r| r.method == "POST" && r.path().ends_with("/offsets"))
        .expect("commit call");
    assert!(commit.path().starts_with("/consumers/manufacturing-consumer-group/instances/"));
    let body: serde_json::Value = serde_json::from_str(&commit.body).expect("json");
    assert_eq!(body["offsets"][0]["partition"], 0);
    assert_eq!(body["offsets"][0]["offset"], 1, "wire carries the last consumed offset");
}

#[tokio::test]
async fn commit_without_consumed_records_sends_nothing() {
    let (upstream, kafka) = client().await;
    let mut next = CommittedOffsets::new();
    next.insert(0, 0);
    kafka
        .commit("manufacturing-consumer-group", TOPIC, &next)
        .await
        .expect("commit");
    assert!(upstream
        .recorded()
        .into_iter()
        .all(|r| !(r.method == "POST" && r.path().ends_with("/offsets"))));
}

#[tokio::test]
async fn produce_uses_embedded_json_format() {
    let (upstream, kafka) = client().await;
    let sent = ops::publish(&kafka, TOPIC, &[json!({"a": 1}), json!({"a": 2})], 100)
        .await
        .expect("produce");
    assert_eq!(sent, 2);
    let produce = upstream
        .recorded()
        .into_iter()
        .find(|r| r.method == "POST" && r.path() == format!("/topics/{TOPIC}"))
        .expect("produce call");
    assert_eq!(
        produce.header("content-type"),
        Some("application/vnd.kafka.json.v2+json")
    );
    let body: serde_json::Value = serde_json::from_str(&produce.body).expect("json");
    assert_eq!(body["records"][1]["value"]["a"], 2);
}
