use anyhow::{Result, anyhow};
use push_dispatch::{
    Dispatcher, ErrorKind, Message, Provider, clients::fcm::FcmProvider,
};
use serde_json::{Value, json};
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{body_partial_json, header, method, path},
};

use crate::common::payload;

fn fcm(server: &MockServer) -> FcmProvider {
    FcmProvider::new(
        "server-key".to_string(),
        Some(format!("{}/fcm/send", server.uri())),
    )
}

async fn flush(provider: &mut FcmProvider, message: Message) -> push_dispatch::FlushResult {
    provider.init();
    provider.send(message);
    provider.finalize().await
}

/// Test: Per-recipient errors are grouped by kind and rotations reported
#[tokio::test]
async fn test_results_grouped_by_error_kind() -> Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/fcm/send"))
        .and(header("authorization", "key=server-key"))
        .and(body_partial_json(json!({
            "registration_ids": ["a", "b", "c", "d", "e"],
            "data": {"k": "v"}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "multicast_id": 1,
            "success": 2,
            "failure": 3,
            "canonical_ids": 1,
            "results": [
                {"message_id": "1"},
                {"error": "NotRegistered"},
                {"message_id": "3", "registration_id": "c2"},
                {"error": "InvalidRegistration"},
                {"error": "NotRegistered"}
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let mut dispatcher = Dispatcher::new();
    dispatcher.register("fcm", Box::new(fcm(&server)));
    dispatcher.enqueue(
        Message::new("fcm", ["a", "b", "c", "d", "e"]).attach(payload(json!({"k": "v"}))),
    )?;

    let result = dispatcher.flush().await;

    let failed: Vec<(ErrorKind, Vec<String>)> = result
        .failed_messages
        .iter()
        .map(|f| (f.kind, f.receivers.clone()))
        .collect();
    assert_eq!(
        failed,
        vec![
            (
                ErrorKind::Unregistered,
                vec!["b".to_string(), "e".to_string()]
            ),
            (ErrorKind::BadDeviceToken, vec!["d".to_string()]),
        ]
    );
    assert!(result.failed_messages.iter().all(|f| f.provider == "fcm"));

    assert_eq!(result.new_token_messages.len(), 1);
    assert_eq!(result.new_token_messages[0].token, "c");
    assert_eq!(result.new_token_messages[0].new_token, "c2");

    server.verify().await;
    Ok(())
}

/// Test: A fully successful response yields nothing to report
#[tokio::test]
async fn test_success_is_clean() -> Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({"to": "only", "time_to_live": 60})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": 1, "failure": 0, "canonical_ids": 0,
            "results": [{"message_id": "1"}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let mut provider = fcm(&server);
    let result = flush(&mut provider, Message::new("fcm", ["only"]).with_time_to_live(60)).await;

    assert!(result.is_clean());
    server.verify().await;
    Ok(())
}

/// Test: Server errors fail every recipient of the request
#[tokio::test]
async fn test_server_error_fails_all_receivers() -> Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let mut provider = fcm(&server);
    let result = flush(&mut provider, Message::new("fcm", ["a", "b"])).await;

    assert_eq!(result.failed_messages.len(), 1);
    assert_eq!(result.failed_messages[0].kind, ErrorKind::InternalServerError);
    assert_eq!(
        result.failed_messages[0].receivers,
        vec!["a".to_string(), "b".to_string()]
    );

    Ok(())
}

/// Test: A rejected API key is reported as an authentication failure
#[tokio::test]
async fn test_unauthorized_key() -> Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let mut provider = fcm(&server);
    let result = flush(&mut provider, Message::new("fcm", ["a"])).await;

    assert_eq!(result.failed_messages.len(), 1);
    assert_eq!(result.failed_messages[0].kind, ErrorKind::NotAuthenticated);

    Ok(())
}

/// Test: Unexpected statuses keep their code
#[tokio::test]
async fn test_other_status_kept() -> Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let mut provider = fcm(&server);
    let result = flush(&mut provider, Message::new("fcm", ["a"])).await;

    assert_eq!(result.failed_messages[0].kind, ErrorKind::HttpStatus(404));
    assert_eq!(result.failed_messages[0].kind.to_string(), "http_status_404");

    Ok(())
}

/// Test: An unreachable endpoint fails every recipient with a transport error
#[tokio::test]
async fn test_unreachable_endpoint() -> Result<()> {
    let mut provider = FcmProvider::new(
        "server-key".to_string(),
        Some("http://127.0.0.1:1/fcm/send".to_string()),
    );

    let result = flush(&mut provider, Message::new("fcm", ["a", "b"])).await;

    assert_eq!(result.failed_messages.len(), 1);
    assert_eq!(result.failed_messages[0].kind, ErrorKind::Transport);
    assert_eq!(result.failed_messages[0].receivers.len(), 2);

    Ok(())
}

async fn sent_body(message: Message) -> Result<Value> {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": 1, "failure": 0, "canonical_ids": 0, "results": []
        })))
        .expect(1)
        .mount(&server)
        .await;

    let mut provider = fcm(&server);
    let result = flush(&mut provider, message).await;
    assert!(result.is_clean());

    let requests = server
        .received_requests()
        .await
        .ok_or_else(|| anyhow!("request recording disabled"))?;
    Ok(requests[0].body_json::<Value>()?)
}

/// Test: An explicit notification moves out of data; invalid ttl and collapse key are dropped
#[tokio::test]
async fn test_notification_lifted_out_of_data() -> Result<()> {
    let message = Message::new("fcm", ["a", "b"])
        .attach(payload(json!({"notification": {"title": "Hi"}, "k": 1})))
        .with_time_to_live(-5)
        .with_collapse_key("");

    let body = sent_body(message).await?;

    assert_eq!(body["registration_ids"], json!(["a", "b"]));
    assert_eq!(body["data"], json!({"k": 1}));
    assert_eq!(body["notification"], json!({"title": "Hi"}));
    assert!(body.get("to").is_none());
    assert!(body.get("time_to_live").is_none());
    assert!(body.get("collapse_key").is_none());

    Ok(())
}

/// Test: Without an explicit notification one is derived from the aps dictionary
#[tokio::test]
async fn test_notification_derived_from_aps() -> Result<()> {
    let message = Message::new("fcm", ["a"])
        .with_collapse_key("score")
        .attach(payload(json!({
            "aps": {"alert": {"title": "T", "body": "B", "subtitle": "S"}, "sound": "default"}
        })));

    let body = sent_body(message).await?;

    assert_eq!(body["to"], json!("a"));
    assert_eq!(
        body["notification"],
        json!({"title": "T", "body": "B", "sound": "default"})
    );
    assert_eq!(body["collapse_key"], json!("score"));
    assert!(body["data"].get("aps").is_some());

    Ok(())
}
