use hearth_rest::{
    routes, ExecutionPool, HttpRequester, Requester, RestAction, RestClient, RestConfig, RestError,
};
use serde_json::json;
use std::sync::Arc;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn requester_for(server: &MockServer) -> HttpRequester {
    HttpRequester::new(RestConfig {
        api_base_url: format!("{}/api/", server.uri()),
        token: "Bot secret".to_string(),
        ..Default::default()
    })
    .unwrap()
}

// ── Config ──────────────────────────────────────────────────────

#[test]
fn rest_config_default() {
    let cfg = RestConfig::default();
    assert_eq!(cfg.api_base_url, "https://discord.com/api/v10");
    assert!(cfg.token.is_empty());
    assert!(cfg.user_agent.starts_with("hearth"));
    assert_eq!(cfg.timeout_secs, 30);
}

#[test]
fn rest_config_serde_roundtrip() {
    let cfg = RestConfig {
        token: "t".to_string(),
        timeout_secs: 5,
        ..Default::default()
    };
    let json = serde_json::to_string(&cfg).unwrap();
    let back: RestConfig = serde_json::from_str(&json).unwrap();
    assert_eq!(back.token, "t");
    assert_eq!(back.timeout_secs, 5);
    assert_eq!(back.api_base_url, cfg.api_base_url);
}

// ── Requests ────────────────────────────────────────────────────

#[tokio::test]
async fn get_decodes_json_body() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/channels/42/invites"))
        .and(header("Authorization", "Bot secret"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "code": "abc" }])))
        .expect(1)
        .mount(&server)
        .await;

    let route = routes::invites::GET_CHANNEL_INVITES.compile(&["42"]).unwrap();
    let response = requester_for(&server).execute(&route).await.unwrap();

    assert_eq!(response.status, 200);
    assert_eq!(response.array().unwrap().len(), 1);
}

#[tokio::test]
async fn no_content_has_no_body() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/api/channels/42"))
        .and(header("X-Audit-Log-Reason", "tidy%20up"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let route = routes::channels::DELETE_CHANNEL
        .compile(&["42"])
        .unwrap()
        .with_reason("tidy up");
    let response = requester_for(&server).execute(&route).await.unwrap();

    assert!(response.is_success());
    assert!(response.body.is_none());
}

#[tokio::test]
async fn put_sends_json_body() {
    let server = MockServer::start().await;
    let body = json!({ "allow": "16", "deny": "0", "type": 1 });
    Mock::given(method("PUT"))
        .and(path("/api/channels/42/permissions/7"))
        .and(body_json(body.clone()))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let route = routes::channels::CREATE_PERM_OVERRIDE
        .compile(&["42", "7"])
        .unwrap()
        .with_body(body);
    let response = requester_for(&server).execute(&route).await.unwrap();
    assert_eq!(response.status, 204);
}

#[tokio::test]
async fn error_status_becomes_remote_failure() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .respond_with(ResponseTemplate::new(403).set_body_string(r#"{"message":"Missing Access"}"#))
        .mount(&server)
        .await;

    let route = routes::channels::DELETE_CHANNEL.compile(&["42"]).unwrap();
    let failure = requester_for(&server).execute(&route).await.unwrap_err();

    assert_eq!(failure.status, Some(403));
    assert!(failure.message.contains("Missing Access"));
}

#[tokio::test]
async fn unreachable_server_is_a_transport_failure() {
    let requester = HttpRequester::new(RestConfig {
        api_base_url: "http://127.0.0.1:9".to_string(),
        timeout_secs: 2,
        ..Default::default()
    })
    .unwrap();
    let route = routes::channels::DELETE_CHANNEL.compile(&["42"]).unwrap();
    let failure = requester.execute(&route).await.unwrap_err();
    assert_eq!(failure.status, None);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn action_runs_through_http_requester() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/channels/42/invites"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "code": "a" }, { "code": "b" }])))
        .mount(&server)
        .await;

    let client = RestClient::new(ExecutionPool::current(), Arc::new(requester_for(&server)));
    let route = routes::invites::GET_CHANNEL_INVITES.compile(&["42"]).unwrap();
    let action = RestAction::new(client, route, |response| {
        Ok(response
            .array()?
            .iter()
            .filter_map(|v| v["code"].as_str().map(str::to_string))
            .collect::<Vec<_>>())
    });

    assert_eq!(action.submit().await.unwrap(), vec!["a", "b"]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn action_failure_surfaces_through_submit() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let client = RestClient::new(ExecutionPool::current(), Arc::new(requester_for(&server)));
    let route = routes::channels::DELETE_CHANNEL.compile(&["42"]).unwrap();
    let err = RestAction::discarding(client, route).submit().await.unwrap_err();

    assert!(matches!(err, RestError::Remote(ref f) if f.status == Some(500)));
}
