// SPDX-License-Identifier: Apache-2.0

use crate::errors::API_ERROR_CODES;
use serde_json::{json, Map, Value};

const ERROR_REF: &str = "#/components/schemas/ApiError";

fn error_response(description: &str) -> Value {
    json!({
        "description": description,
        "content": {"application/json": {"schema": {"$ref": ERROR_REF}}}
    })
}

fn op(summary: &str, ok: &str) -> Value {
    json!({
        "summary": summary,
        "responses": {
            "200": {"description": ok},
            "400": error_response("profile not configured or invalid request"),
            "502": error_response("platform call failed")
        }
    })
}

fn with_params(mut operation: Value, params: Value) -> Value {
    operation["parameters"] = params;
    operation
}

fn name_param() -> Value {
    json!({"name": "name", "in": "path", "required": true, "schema": {"type": "string"}})
}

fn limit_param(default: usize) -> Value {
    json!({"name": "limit", "in": "query", "schema": {"type": "integer", "minimum": 1, "default": default}})
}

#[must_use]
pub fn openapi_v1_spec() -> Value {
    let mut paths = Map::new();
    paths.insert(
        "/health".into(),
        json!({"get": {"summary": "liveness", "responses": {"200": {"description": "healthy"}}}}),
    );
    paths.insert(
        "/openapi.json".into(),
        json!({"get": {"summary": "this document", "responses": {"200": {"description": "OpenAPI v1 spec"}}}}),
    );
    paths.insert(
        "/profile".into(),
        json!({
            "get": op("read the connection profile", "stored or default profile"),
            "put": op("save the connection profile", "saved profile"),
            "delete": op("delete the connection profile", "deleted")
        }),
    );
    paths.insert(
        "/profile/test".into(),
        json!({"post": op("test REST API connectivity", "connection test result")}),
    );
    paths.insert(
        "/profile/services".into(),
        json!({"get": op("probe every platform service", "discovery report")}),
    );
    paths.insert(
        "/profile/readiness".into(),
        json!({"get": op("score required services", "readiness score")}),
    );
    paths.insert(
        "/profile/s3credentials".into(),
        json!({"get": op("regenerate temporary object store keys", "key metadata")}),
    );
    paths.insert(
        "/profile/events".into(),
        json!({"get": with_params(op("recent bootstrap and scenario output", "events"), json!([limit_param(100)]))}),
    );
    paths.insert(
        "/profile/bootstrap".into(),
        json!({"post": op("create buckets, topic and tables", "bootstrap result")}),
    );
    paths.insert(
        "/profile/bootstrap/status".into(),
        json!({"get": op("bootstrap state", "bootstrap state")}),
    );
    paths.insert(
        "/profile/scenarios/run".into(),
        json!({"post": op("run a pipeline scenario", "scenario result")}),
    );
    paths.insert(
        "/dashboard/data".into(),
        json!({"get": op("aggregated medallion status", "dashboard data")}),
    );
    paths.insert(
        "/buckets/{name}/objects".into(),
        json!({"get": with_params(op("list bucket objects", "bucket detail"), json!([name_param()]))}),
    );
    paths.insert(
        "/topics/{name}/metrics".into(),
        json!({"get": with_params(op("topic metrics", "topic metrics"), json!([name_param()]))}),
    );
    paths.insert(
        "/topics/{name}/messages".into(),
        json!({"get": with_params(op("recent topic messages", "messages"), json!([name_param(), limit_param(50)]))}),
    );
    paths.insert(
        "/topics/{name}/queue".into(),
        json!({"get": with_params(op("unprocessed topic messages", "messages"), json!([name_param(), limit_param(50)]))}),
    );
    paths.insert(
        "/topics/{name}/detailed-metrics".into(),
        json!({"get": with_params(op("topic lag and throughput", "detailed metrics"), json!([name_param()]))}),
    );
    paths.insert(
        "/tables/{name}/data".into(),
        json!({"get": with_params(op("table rows and metrics", "table data"), json!([name_param(), limit_param(500)]))}),
    );
    paths.insert(
        "/tables/{name}/metrics".into(),
        json!({"get": with_params(op("table metrics", "table metrics"), json!([name_param()]))}),
    );
    paths.insert(
        "/llm/chat".into(),
        json!({"post": op("forward a chat completion request", "upstream completion")}),
    );
    paths.insert(
        "/debug/tables".into(),
        json!({"get": op("local state tables", "table list")}),
    );
    paths.insert(
        "/debug/table/{name}".into(),
        json!({"get": with_params(op("local state rows", "rows"), json!([name_param(), limit_param(100)]))}),
    );

    json!({
      "openapi": "3.0.3",
      "info": {
        "title": "medallion demo API",
        "version": "v1"
      },
      "paths": paths,
      "components": {
        "schemas": {
          "ApiErrorCode": {
            "type": "string",
            "enum": API_ERROR_CODES
          },
          "ApiError": {
            "type": "object",
            "required": ["code", "message", "details"],
            "additionalProperties": false,
            "properties": {
              "code": {"$ref": "#/components/schemas/ApiErrorCode"},
              "message": {"type": "string"},
              "details": {"type": "object"}
            }
          }
        }
      }
    })
}
