use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use serde_json::{json, Value};
use taskbreak::ai::{
    AiError, ChatMessage, CompletionClient, CompletionOptions, CompletionProvider,
};
use taskbreak::config::{AiConfig, Credential};

/// What the stub endpoint saw on its last request.
#[derive(Default)]
struct Captured {
    headers: Option<HeaderMap>,
    body: Option<Value>,
}

#[derive(Clone)]
struct Stub {
    status: StatusCode,
    body: String,
    delay: Option<Duration>,
    captured: Arc<Mutex<Captured>>,
}

impl Stub {
    fn new(status: StatusCode, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
            delay: None,
            captured: Arc::new(Mutex::new(Captured::default())),
        }
    }

    fn answering(text: &str) -> Self {
        Self::new(StatusCode::OK, completion_body(text))
    }
}

async fn stub_handler(
    State(stub): State<Stub>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> impl IntoResponse {
    {
        let mut captured = stub.captured.lock().unwrap();
        captured.headers = Some(headers);
        captured.body = Some(body);
    }
    if let Some(delay) = stub.delay {
        tokio::time::sleep(delay).await;
    }
    (stub.status, stub.body.clone())
}

/// Serve `stub` on a random local port and return the completion URL.
async fn spawn_stub(stub: Stub) -> String {
    let app = Router::new()
        .route("/completion", post(stub_handler))
        .with_state(stub);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}/completion", addr)
}

fn completion_body(text: &str) -> String {
    json!({
        "result": {
            "alternatives": [{
                "message": { "role": "assistant", "text": text },
                "status": "ALTERNATIVE_STATUS_FINAL"
            }],
            "usage": {
                "inputTextTokens": "42",
                "completionTokens": "17",
                "totalTokens": "59"
            },
            "modelVersion": "23.10.2024"
        }
    })
    .to_string()
}

fn config_for(endpoint: String, credential: Credential) -> AiConfig {
    AiConfig {
        endpoint: Some(endpoint),
        credential: Some(credential),
        catalog_id: Some("b1gcatalog".to_string()),
        timeout: Duration::from_secs(5),
        ..AiConfig::default()
    }
}

fn messages() -> Vec<ChatMessage> {
    vec![
        ChatMessage::system("You split tasks"),
        ChatMessage::user("Break this task down: Move house"),
    ]
}

async fn complete_with(config: &AiConfig) -> Result<String, AiError> {
    let client = CompletionClient::from_config(config).expect("valid config");
    client
        .complete(&messages(), CompletionOptions::default())
        .await
}

mod request_shape {
    use super::*;

    #[tokio::test]
    async fn sends_api_key_catalog_and_body() {
        let stub = Stub::answering("Pack boxes | high");
        let captured = stub.captured.clone();
        let url = spawn_stub(stub).await;
        let client = CompletionClient::from_config(&config_for(
            url,
            Credential::ApiKey("secret-key".to_string()),
        ))
        .unwrap();

        let text = client
            .complete(
                &messages(),
                CompletionOptions {
                    stream: true,
                    temperature: 0.3,
                    max_tokens: 250,
                },
            )
            .await
            .unwrap();
        assert_eq!(text, "Pack boxes | high");

        let captured = captured.lock().unwrap();
        let headers = captured.headers.as_ref().unwrap();
        assert_eq!(headers["authorization"], "Api-Key secret-key");
        assert_eq!(headers["x-folder-id"], "b1gcatalog");

        let body = captured.body.as_ref().unwrap();
        assert_eq!(body["modelUri"], "gpt://b1gcatalog/yandexgpt");
        assert_eq!(body["completionOptions"]["stream"], false);
        assert_eq!(body["completionOptions"]["maxTokens"], 250);
        let temperature = body["completionOptions"]["temperature"].as_f64().unwrap();
        assert!((temperature - 0.3).abs() < 1e-6);
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["role"], "user");
        assert_eq!(
            body["messages"][1]["text"],
            "Break this task down: Move house"
        );
    }

    #[tokio::test]
    async fn sends_iam_token_as_bearer() {
        let stub = Stub::answering("Anything");
        let captured = stub.captured.clone();
        let url = spawn_stub(stub).await;

        complete_with(&config_for(url, Credential::IamToken("t0ken".to_string())))
            .await
            .unwrap();

        let captured = captured.lock().unwrap();
        let headers = captured.headers.as_ref().unwrap();
        assert_eq!(headers["authorization"], "Bearer t0ken");
    }

    #[tokio::test]
    async fn uses_explicit_model_uri() {
        let stub = Stub::answering("Anything");
        let captured = stub.captured.clone();
        let url = spawn_stub(stub).await;
        let config = AiConfig {
            model_uri: Some("gpt://b1gcatalog/yandexgpt-lite".to_string()),
            ..config_for(url, Credential::ApiKey("k".to_string()))
        };

        complete_with(&config).await.unwrap();

        let captured = captured.lock().unwrap();
        assert_eq!(
            captured.body.as_ref().unwrap()["modelUri"],
            "gpt://b1gcatalog/yandexgpt-lite"
        );
    }

    #[tokio::test]
    async fn unreadable_usage_keeps_the_text() {
        let body = json!({
            "result": {
                "alternatives": [{
                    "message": { "role": "assistant", "text": "Pack boxes | high" },
                    "status": "ALTERNATIVE_STATUS_TRUNCATED_FINAL"
                }],
                "usage": {
                    "inputTextTokens": "n/a",
                    "completionTokens": "1.5e3",
                    "totalTokens": { "unexpected": true }
                }
            }
        })
        .to_string();
        let url = spawn_stub(Stub::new(StatusCode::OK, body)).await;

        let text = complete_with(&config_for(url, Credential::ApiKey("k".to_string())))
            .await
            .unwrap();

        assert_eq!(text, "Pack boxes | high");
    }
}

mod failures {
    use super::*;

    #[tokio::test]
    async fn unauthorized_is_auth_error() {
        let url = spawn_stub(Stub::new(StatusCode::UNAUTHORIZED, "bad key")).await;

        let err = complete_with(&config_for(url, Credential::ApiKey("k".to_string())))
            .await
            .unwrap_err();

        assert!(matches!(err, AiError::Auth { status: 401 }));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn forbidden_is_auth_error() {
        let url = spawn_stub(Stub::new(StatusCode::FORBIDDEN, "no access")).await;

        let err = complete_with(&config_for(url, Credential::ApiKey("k".to_string())))
            .await
            .unwrap_err();

        assert!(matches!(err, AiError::Auth { status: 403 }));
    }

    #[tokio::test]
    async fn server_error_is_unavailable() {
        let url = spawn_stub(Stub::new(StatusCode::INTERNAL_SERVER_ERROR, "boom")).await;

        let err = complete_with(&config_for(url, Credential::ApiKey("k".to_string())))
            .await
            .unwrap_err();

        match err {
            AiError::Unavailable(msg) => assert!(msg.contains("500")),
            other => panic!("expected Unavailable, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn non_json_body_is_malformed() {
        let url = spawn_stub(Stub::new(StatusCode::OK, "<html>oops</html>")).await;

        let err = complete_with(&config_for(url, Credential::ApiKey("k".to_string())))
            .await
            .unwrap_err();

        assert!(matches!(err, AiError::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn missing_alternatives_is_malformed() {
        let body = json!({ "result": { "alternatives": [] } }).to_string();
        let url = spawn_stub(Stub::new(StatusCode::OK, body)).await;

        let err = complete_with(&config_for(url, Credential::ApiKey("k".to_string())))
            .await
            .unwrap_err();

        assert!(matches!(err, AiError::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn slow_endpoint_times_out_as_unavailable() {
        let stub = Stub {
            delay: Some(Duration::from_secs(3)),
            ..Stub::answering("too late")
        };
        let url = spawn_stub(stub).await;
        let config = AiConfig {
            timeout: Duration::from_secs(1),
            ..config_for(url, Credential::ApiKey("k".to_string()))
        };

        let err = complete_with(&config).await.unwrap_err();

        assert!(matches!(err, AiError::Unavailable(_)));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn refused_connection_is_unavailable() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = complete_with(&config_for(
            format!("http://{}/completion", addr),
            Credential::ApiKey("k".to_string()),
        ))
        .await
        .unwrap_err();

        assert!(matches!(err, AiError::Unavailable(_)));
    }
}

mod configuration {
    use super::*;

    #[test]
    fn missing_credential_is_rejected_before_any_request() {
        let config = AiConfig {
            catalog_id: Some("b1g".to_string()),
            ..AiConfig::default()
        };

        let err = CompletionClient::from_config(&config).unwrap_err();

        assert!(matches!(err, AiError::Configuration(_)));
    }

    #[test]
    fn missing_catalog_is_rejected() {
        let config = AiConfig {
            credential: Some(Credential::ApiKey("k".to_string())),
            ..AiConfig::default()
        };

        let err = CompletionClient::from_config(&config).unwrap_err();

        match err {
            AiError::Configuration(msg) => assert!(msg.contains("catalog")),
            other => panic!("expected Configuration, got {:?}", other),
        }
    }
}
