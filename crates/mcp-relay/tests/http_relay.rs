//! Integration tests: the HTTP relay in front of scripted MCP servers.
//!
//! Each test binds the router on an ephemeral port and drives it with a real
//! HTTP client, so routing, extraction, bridge serialization, and process
//! recovery are exercised together.

use std::sync::Arc;

use serde_json::{Value, json};
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use mcp_relay::transport::http::routes::routes;
use mcp_relay::{Bridge, ServerCommand};

/// Answers every request with the request's own id and the full request line
/// under `result.echo`.
const REFLECT: &str = r##"while read -r line; do
  id=${line#*\"id\":}
  id=${id%%,*}
  printf '{"jsonrpc":"2.0","id":%s,"result":{"echo":%s}}\n' "$id" "$line"
done
"##;

fn scripted_bridge(dir: &TempDir, name: &str, body: &str) -> Arc<Bridge> {
    let path = dir.path().join(name);
    std::fs::write(&path, body).unwrap();
    Arc::new(Bridge::new(ServerCommand::new(
        "sh",
        [path.to_str().unwrap()],
    )))
}

/// Binds the relay on 127.0.0.1:0 and returns its base URL. The server task
/// lives until the test's runtime shuts down.
async fn start_relay(bridge: Arc<Bridge>) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, routes(bridge)).await.unwrap();
    });
    format!("http://{addr}")
}

async fn get_json(client: &reqwest::Client, url: String) -> (reqwest::StatusCode, Value) {
    let response = client.get(url).send().await.unwrap();
    let status = response.status();
    (status, response.json().await.unwrap())
}

async fn post_json(
    client: &reqwest::Client,
    url: String,
    body: &Value,
) -> (reqwest::StatusCode, Value) {
    let response = client.post(url).json(body).send().await.unwrap();
    let status = response.status();
    (status, response.json().await.unwrap())
}

#[tokio::test]
async fn full_relay_flow_over_http() {
    let dir = TempDir::new().unwrap();
    let base = start_relay(scripted_bridge(&dir, "reflect.sh", REFLECT)).await;
    let client = reqwest::Client::new();

    let (status, health) = get_json(&client, format!("{base}/health")).await;
    assert_eq!(status, reqwest::StatusCode::OK);
    assert_eq!(health["status"], "healthy");

    let response = client
        .post(format!("{base}/mcp/initialize"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);
    let init: Value = response.json().await.unwrap();
    assert_eq!(init["id"], 1);
    assert_eq!(init["result"]["echo"]["method"], "initialize");
    assert_eq!(
        init["result"]["echo"]["params"]["protocolVersion"],
        "2024-11-05"
    );

    let (status, tools) = get_json(&client, format!("{base}/mcp/tools/list")).await;
    assert_eq!(status, reqwest::StatusCode::OK);
    assert_eq!(tools["id"], 2);
    assert_eq!(tools["result"]["echo"]["method"], "tools/list");

    let (status, call) = post_json(
        &client,
        format!("{base}/mcp/tools/call"),
        &json!({"name": "get_job_info", "arguments": {"job_name": "sample-job"}}),
    )
    .await;
    assert_eq!(status, reqwest::StatusCode::OK);
    assert_eq!(call["id"], 3);
    assert_eq!(call["result"]["echo"]["params"]["name"], "get_job_info");
    assert_eq!(
        call["result"]["echo"]["params"]["arguments"]["job_name"],
        "sample-job"
    );

    let (status, resources) = get_json(&client, format!("{base}/mcp/resources/list")).await;
    assert_eq!(status, reqwest::StatusCode::OK);
    assert_eq!(resources["id"], 4);
    assert_eq!(resources["result"]["echo"]["method"], "resources/list");

    let (status, read) = post_json(
        &client,
        format!("{base}/mcp/resources/read"),
        &json!({"uri": "jenkins://jobs/sample-job"}),
    )
    .await;
    assert_eq!(status, reqwest::StatusCode::OK);
    assert_eq!(read["id"], 5);
    assert_eq!(
        read["result"]["echo"]["params"]["uri"],
        "jenkins://jobs/sample-job"
    );
}

#[tokio::test]
async fn crash_surfaces_then_the_relay_recovers() {
    let dir = TempDir::new().unwrap();
    let marker = dir.path().join("crashed-once");
    let body = format!(
        "if [ ! -f {marker} ]; then\n  touch {marker}\n  read -r line\n  exit 0\nfi\n{REFLECT}",
        marker = marker.display(),
    );
    let base = start_relay(scripted_bridge(&dir, "fail-once.sh", &body)).await;
    let client = reqwest::Client::new();

    let (status, error) = post_json(
        &client,
        format!("{base}/mcp/tools/call"),
        &json!({"name": "x"}),
    )
    .await;
    assert_eq!(status, reqwest::StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(error["error"], "communication");

    // The HTTP layer stayed up and the respawned server answers the next
    // call, with the id counter carried over.
    let (status, tools) = get_json(&client, format!("{base}/mcp/tools/list")).await;
    assert_eq!(status, reqwest::StatusCode::OK);
    assert_eq!(tools["id"], 2);
}

#[tokio::test]
async fn relay_health_is_independent_of_the_server() {
    let bridge = Arc::new(Bridge::new(ServerCommand::new(
        "/nonexistent/mcp-server",
        Vec::<String>::new(),
    )));
    let base = start_relay(bridge).await;
    let client = reqwest::Client::new();

    let (status, health) = get_json(&client, format!("{base}/health")).await;
    assert_eq!(status, reqwest::StatusCode::OK);
    assert_eq!(health["status"], "healthy");

    let (status, error) = get_json(&client, format!("{base}/mcp/tools/list")).await;
    assert_eq!(status, reqwest::StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(error["error"], "startup");

    // Still healthy after the failed call.
    let (status, _) = get_json(&client, format!("{base}/health")).await;
    assert_eq!(status, reqwest::StatusCode::OK);
}

/// The build system the deployed MCP server talks to, doubled with wiremock
/// the way a full-stack environment wires one in.
async fn mock_jenkins() -> MockServer {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "description": "Test Jenkins Instance",
            "mode": "NORMAL",
            "nodeDescription": "the master Jenkins node",
        })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/me/api/json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "test_user",
            "fullName": "Test User",
        })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/job/sample-job/api/json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": "sample-job",
            "nextBuildNumber": 42,
        })))
        .mount(&server)
        .await;

    server
}

#[tokio::test]
async fn jenkins_double_answers_like_the_real_thing() {
    let jenkins = mock_jenkins().await;
    let client = reqwest::Client::new();

    let (status, root) = get_json(&client, format!("{}/api/json", jenkins.uri())).await;
    assert_eq!(status, reqwest::StatusCode::OK);
    assert_eq!(root["description"], "Test Jenkins Instance");
    assert_eq!(root["mode"], "NORMAL");

    let (_, me) = get_json(&client, format!("{}/me/api/json", jenkins.uri())).await;
    assert_eq!(me["id"], "test_user");

    let (_, job) = get_json(&client, format!("{}/job/sample-job/api/json", jenkins.uri())).await;
    assert_eq!(job["name"], "sample-job");
    assert_eq!(job["nextBuildNumber"], 42);
}

#[tokio::test]
async fn tool_arguments_carry_build_system_urls_intact() {
    let jenkins = mock_jenkins().await;
    let dir = TempDir::new().unwrap();
    let base = start_relay(scripted_bridge(&dir, "reflect.sh", REFLECT)).await;
    let client = reqwest::Client::new();

    let (status, response) = post_json(
        &client,
        format!("{base}/mcp/tools/call"),
        &json!({"name": "server_info", "arguments": {"url": jenkins.uri()}}),
    )
    .await;
    assert_eq!(status, reqwest::StatusCode::OK);

    // The url survived the trip through the relay and the stdio server, and
    // the double is reachable at exactly that address.
    let echoed = response["result"]["echo"]["params"]["arguments"]["url"]
        .as_str()
        .unwrap();
    let (status, info) = get_json(&client, format!("{echoed}/api/json")).await;
    assert_eq!(status, reqwest::StatusCode::OK);
    assert_eq!(info["description"], "Test Jenkins Instance");
}
