//! Full-pipeline scenarios: HTTP request in, backend HTTP requests out.

use std::{collections::HashMap, time::Duration};

use axum::{Router, body::Body, routing::get};
use http::{Request, StatusCode, header};
use rstest::rstest;
use serde_json::{Value, json};
use tower::ServiceExt;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{method, path},
};

use crate::{AppState, api, config::GraviolaConfig};

fn single_backend_config(address: &str, on_query_fail: &str, max_concurrent: usize) -> String {
    format!(
        r#"
query:
  max_concurrent_queries: {max_concurrent}
storages:
  merge_strategy:
    type: always_merge
  groups:
    - name: the-group
      on_query_fail: {on_query_fail}
      remotes:
        - name: the-remote
          address: {address}
"#
    )
}

fn app_for(yaml: &str) -> Router {
    let config = GraviolaConfig::from_yaml(yaml).unwrap();
    let state = AppState::new(config).unwrap();
    api::router(state)
}

fn form_body(pairs: &[(&str, &str)]) -> String {
    let mut serializer = url::form_urlencoded::Serializer::new(String::new());
    for (key, value) in pairs {
        serializer.append_pair(key, value);
    }
    serializer.finish()
}

fn post_form(uri: &str, pairs: &[(&str, &str)]) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(form_body(pairs)))
        .unwrap()
}

fn get_request(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, body)
}

async fn recorded_form_fields(server: &MockServer) -> HashMap<String, String> {
    let requests = server.received_requests().await.unwrap();
    assert!(!requests.is_empty(), "backend received no request");
    url::form_urlencoded::parse(&requests[0].body)
        .into_owned()
        .collect()
}

fn vector_response(entries: Value) -> Value {
    json!({
        "status": "success",
        "data": {"resultType": "vector", "result": entries}
    })
}

fn empty_vector_response() -> Value {
    vector_response(json!([]))
}

#[tokio::test]
async fn single_backend_passthrough() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/query_range"))
        .respond_with(ResponseTemplate::new(200).set_body_json(vector_response(json!([
            {
                "metric": {"__name__": "up", "instance": "a"},
                "value": [1702174837.0, "1"]
            }
        ]))))
        .mount(&server)
        .await;

    let app = app_for(&single_backend_config(&server.uri(), "fail_all", 10));
    let (status, body) = send(
        app,
        post_form("/api/v1/query", &[("query", "up"), ("time", "1702174837")]),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "success");
    assert_eq!(body["data"]["resultType"], "vector");
    assert_eq!(
        body["data"]["result"][0]["metric"],
        json!({"__name__": "up", "instance": "a"})
    );
    assert_eq!(
        body["data"]["result"][0]["value"],
        json!([1702174837.0, "1"])
    );
    assert_eq!(body["data"]["result"].as_array().unwrap().len(), 1);
}

#[rstest]
#[case(400)]
#[case(403)]
#[case(404)]
#[case(429)]
#[case(500)]
#[case(502)]
#[case(503)]
#[tokio::test]
async fn backend_failure_under_fail_all_answers_422(#[case] backend_status: u16) {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(backend_status))
        .mount(&server)
        .await;

    let app = app_for(&single_backend_config(&server.uri(), "fail_all", 10));
    let (status, body) = send(
        app,
        post_form("/api/v1/query", &[("query", r#"{lbl1="val1"}"#)]),
    )
    .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(
        body,
        json!({
            "status": "error",
            "errorType": "execution",
            "error": format!(
                "expanding series: server answered with non-succesful status code {backend_status}"
            ),
        })
    );
}

async fn boom_handler() {
    panic!("kaboom")
}

#[tokio::test]
async fn a_panicking_handler_answers_500_with_an_empty_body() {
    let server = MockServer::start().await;
    let config = GraviolaConfig::from_yaml(&single_backend_config(&server.uri(), "fail_all", 10))
        .unwrap();
    let state = AppState::new(config).unwrap();

    let app = api::with_middleware(
        api::base_router(state).route("/boom", get(boom_handler)),
    );

    let response = app
        .clone()
        .oneshot(get_request("/boom"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert!(bytes.is_empty());

    // The router keeps serving after the panic.
    let (status, _) = send(app, get_request("/healthy")).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn instant_queries_are_rewritten_to_a_lookback_range() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/query_range"))
        .respond_with(ResponseTemplate::new(200).set_body_json(empty_vector_response()))
        .expect(1)
        .mount(&server)
        .await;

    let before_secs = chrono::Utc::now().timestamp();
    let app = app_for(&single_backend_config(&server.uri(), "fail_all", 10));
    let (status, _) = send(
        app,
        post_form("/api/v1/query", &[("query", r#"{lbl1="val1"}"#)]),
    )
    .await;
    let after_secs = chrono::Utc::now().timestamp();

    assert_eq!(status, StatusCode::OK);

    let fields = recorded_form_fields(&server).await;
    assert_eq!(fields["query"], r#"{lbl1="val1",}"#);
    assert_eq!(fields["step"], "30");

    let start: i64 = fields["start"].parse().unwrap();
    let end: i64 = fields["end"].parse().unwrap();
    // The default lookback delta is five minutes.
    assert!(start >= before_secs - 300 - 1 && start <= after_secs - 300 + 1);
    assert!(end >= before_secs - 1 && end <= after_secs + 1);
}

#[tokio::test]
async fn range_queries_preserve_the_requested_step() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/query_range"))
        .respond_with(ResponseTemplate::new(200).set_body_json(empty_vector_response()))
        .expect(1)
        .mount(&server)
        .await;

    let app = app_for(&single_backend_config(&server.uri(), "fail_all", 10));
    let (status, _) = send(
        app,
        post_form(
            "/api/v1/query_range",
            &[
                ("query", r#"{lbl1="val1"}"#),
                ("start", "12145"),
                ("end", "12595"),
                ("step", "11"),
            ],
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);

    let fields = recorded_form_fields(&server).await;
    assert_eq!(fields["query"], r#"{lbl1="val1",}"#);
    // Start is widened by the five-minute staleness window.
    assert_eq!(fields["start"], "11845");
    assert_eq!(fields["end"], "12595");
    assert_eq!(fields["step"], "11");
}

#[tokio::test]
async fn the_admission_gate_serializes_queries_beyond_capacity() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(empty_vector_response())
                .set_delay(Duration::from_millis(200)),
        )
        .mount(&server)
        .await;

    let app = app_for(&single_backend_config(&server.uri(), "fail_all", 1));

    let started = std::time::Instant::now();
    let (first, second) = tokio::join!(
        send(app.clone(), post_form("/api/v1/query", &[("query", "up")])),
        send(app.clone(), post_form("/api/v1/query", &[("query", "up")])),
    );
    let elapsed = started.elapsed();

    assert_eq!(first.0, StatusCode::OK);
    assert_eq!(second.0, StatusCode::OK);
    assert!(
        elapsed >= Duration::from_millis(400),
        "queries overlapped: {elapsed:?}"
    );
}

#[tokio::test]
async fn partial_response_group_survives_one_failing_backend() {
    let healthy = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(vector_response(json!([
            {"metric": {"__name__": "up"}, "value": [1702174837.0, "1"]}
        ]))))
        .mount(&healthy)
        .await;

    let broken = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&broken)
        .await;

    let yaml = format!(
        r#"
storages:
  merge_strategy:
    type: always_merge
  groups:
    - name: mixed
      on_query_fail: partial_response
      remotes:
        - name: healthy
          address: {healthy}
        - name: broken
          address: {broken}
"#,
        healthy = healthy.uri(),
        broken = broken.uri(),
    );

    let (status, body) = send(
        app_for(&yaml),
        post_form("/api/v1/query", &[("query", "up"), ("time", "1702174837")]),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "success");
    assert_eq!(body["data"]["result"].as_array().unwrap().len(), 1);
    // The backend failure was swallowed entirely: the merge strategy carries
    // select errors in the error slot, not the annotations, so nothing of it
    // survives the downgrade.
    assert!(body.get("warnings").is_none());
}

#[tokio::test]
async fn fail_all_group_fails_when_one_backend_fails() {
    let healthy = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(vector_response(json!([
            {"metric": {"__name__": "up"}, "value": [1702174837.0, "1"]}
        ]))))
        .mount(&healthy)
        .await;

    let broken = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&broken)
        .await;

    let yaml = format!(
        r#"
storages:
  merge_strategy:
    type: always_merge
  groups:
    - name: mixed
      on_query_fail: fail_all
      remotes:
        - name: healthy
          address: {healthy}
        - name: broken
          address: {broken}
"#,
        healthy = healthy.uri(),
        broken = broken.uri(),
    );

    let (status, body) = send(
        app_for(&yaml),
        post_form("/api/v1/query", &[("query", "up"), ("time", "1702174837")]),
    )
    .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["errorType"], "execution");
}

#[tokio::test]
async fn series_from_two_groups_are_merged_at_the_root() {
    let first = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(vector_response(json!([
            {"metric": {"__name__": "up", "instance": "a"}, "value": [1702174837.0, "1"]}
        ]))))
        .mount(&first)
        .await;

    let second = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(vector_response(json!([
            {"metric": {"__name__": "up", "instance": "b"}, "value": [1702174837.0, "2"]}
        ]))))
        .mount(&second)
        .await;

    let yaml = format!(
        r#"
storages:
  merge_strategy:
    type: always_merge
  groups:
    - name: g1
      remotes:
        - name: r
          address: {first}
    - name: g2
      remotes:
        - name: r
          address: {second}
"#,
        first = first.uri(),
        second = second.uri(),
    );

    let (status, body) = send(
        app_for(&yaml),
        post_form("/api/v1/query", &[("query", "up"), ("time", "1702174837")]),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let result = body["data"]["result"].as_array().unwrap();
    assert_eq!(result.len(), 2);
    assert_eq!(result[0]["metric"]["instance"], "a");
    assert_eq!(result[1]["metric"]["instance"], "b");
}

#[tokio::test]
async fn label_names_are_unioned_sorted_and_deduped() {
    let first = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/labels"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "success",
            "data": ["__name__", "job"]
        })))
        .mount(&first)
        .await;

    let second = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/labels"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "success",
            "data": ["__name__", "instance"]
        })))
        .mount(&second)
        .await;

    let yaml = format!(
        r#"
storages:
  groups:
    - name: g
      remotes:
        - name: r1
          address: {first}
        - name: r2
          address: {second}
"#,
        first = first.uri(),
        second = second.uri(),
    );

    let (status, body) = send(app_for(&yaml), get_request("/api/v1/labels")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"], json!(["__name__", "instance", "job"]));
}

#[tokio::test]
async fn label_values_pass_matchers_through() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/label/job/values"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "success",
            "data": ["worker", "api"]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let app = app_for(&single_backend_config(&server.uri(), "fail_all", 10));
    let (status, body) = send(
        app,
        get_request("/api/v1/label/job/values?match[]=%7Blbl1%3D%22val1%22%7D"),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"], json!(["api", "worker"]));

    let requests = server.received_requests().await.unwrap();
    let query = requests[0].url.query().unwrap();
    assert!(query.contains("match%5B%5D") || query.contains("match[]"));
}

#[tokio::test]
async fn malformed_promql_answers_400_bad_data() {
    let server = MockServer::start().await;
    let app = app_for(&single_backend_config(&server.uri(), "fail_all", 10));

    let (status, body) = send(
        app,
        post_form("/api/v1/query", &[("query", "up{")]),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], "error");
    assert_eq!(body["errorType"], "bad_data");
}

#[tokio::test]
async fn missing_query_parameter_answers_400() {
    let server = MockServer::start().await;
    let app = app_for(&single_backend_config(&server.uri(), "fail_all", 10));

    let (status, body) = send(app, get_request("/api/v1/query")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("query"));
}

#[tokio::test]
async fn operational_endpoints_answer_200() {
    crate::observability::metrics::init_metrics().unwrap();

    let server = MockServer::start().await;
    let app = app_for(&single_backend_config(&server.uri(), "fail_all", 10));

    for endpoint in ["/healthy", "/ready"] {
        let response = app
            .clone()
            .oneshot(get_request(endpoint))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK, "{endpoint}");
    }

    let response = app.oneshot(get_request("/metrics")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "text/plain; version=0.0.4"
    );
}

#[tokio::test]
async fn backend_warnings_reach_the_api_response() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "success",
            "warnings": ["results may be incomplete"],
            "data": {"resultType": "vector", "result": [
                {"metric": {"__name__": "up"}, "value": [1702174837.0, "1"]}
            ]}
        })))
        .mount(&server)
        .await;

    let app = app_for(&single_backend_config(&server.uri(), "fail_all", 10));
    let (status, body) = send(
        app,
        post_form("/api/v1/query", &[("query", "up"), ("time", "1702174837")]),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["warnings"], json!(["results may be incomplete"]));
}

#[tokio::test]
async fn nan_values_survive_the_whole_pipeline() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(vector_response(json!([
            {"metric": {"__name__": "up"}, "value": [1702174837.0, "NaN"]}
        ]))))
        .mount(&server)
        .await;

    let app = app_for(&single_backend_config(&server.uri(), "fail_all", 10));
    let (status, body) = send(
        app,
        post_form("/api/v1/query", &[("query", "up"), ("time", "1702174837")]),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["result"][0]["value"][1], "NaN");
}
