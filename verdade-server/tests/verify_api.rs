//! Router tests driven through `tower::ServiceExt::oneshot`.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use serde_json::Value;
use tower::ServiceExt;
use verdade_common::Provider;
use verdade_config::MissingCredentialsPolicy;
use verdade_llm::traits::{ContentPart, LlmClient, LlmError, LlmRequest, LlmResponse};
use verdade_server::{create_router, AppState};
use verdade_verify::{Verifier, VerifierOptions};

const BOUNDARY: &str = "----verdade-test-boundary";

enum Part<'a> {
    Field(&'a str, &'a str),
    File {
        name: &'a str,
        filename: &'a str,
        content_type: &'a str,
        bytes: &'a [u8],
    },
}

fn multipart_body(parts: &[Part<'_>]) -> Vec<u8> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        match part {
            Part::Field(name, value) => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes(),
                );
                body.extend_from_slice(value.as_bytes());
            }
            Part::File {
                name,
                filename,
                content_type,
                bytes,
            } => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"\r\n\
                         Content-Type: {content_type}\r\n\r\n"
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(bytes);
            }
        }
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

fn verify_request(parts: &[Part<'_>]) -> Request<Body> {
    Request::post("/api/verify")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(multipart_body(parts)))
        .unwrap()
}

/// Model fake: replies with a fixed string or error, counts calls.
struct FakeLlm {
    reply: Result<&'static str, fn() -> LlmError>,
    calls: AtomicUsize,
    last: Mutex<Option<LlmRequest>>,
}

impl FakeLlm {
    fn replying(text: &'static str) -> Arc<Self> {
        Arc::new(Self {
            reply: Ok(text),
            calls: AtomicUsize::new(0),
            last: Mutex::new(None),
        })
    }

    fn failing(err: fn() -> LlmError) -> Arc<Self> {
        Arc::new(Self {
            reply: Err(err),
            calls: AtomicUsize::new(0),
            last: Mutex::new(None),
        })
    }
}

#[async_trait]
impl LlmClient for FakeLlm {
    async fn generate(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last.lock().unwrap() = Some(request.clone());
        match self.reply {
            Ok(text) => Ok(LlmResponse {
                text: text.to_string(),
                model: Some("fake".into()),
                tokens_used: Some(42),
                stop_reason: Some("end_turn".into()),
            }),
            Err(make) => Err(make()),
        }
    }

    fn model_name(&self) -> &str {
        "fake-model"
    }

    fn provider(&self) -> Provider {
        Provider::Anthropic
    }
}

fn app_with(llm: Option<Arc<FakeLlm>>, policy: MissingCredentialsPolicy) -> axum::Router {
    let verifier = llm.map(|llm| {
        Arc::new(Verifier::new(
            llm as Arc<dyn LlmClient + Send + Sync>,
            VerifierOptions::default(),
        ))
    });
    create_router(Arc::new(AppState {
        verifier,
        provider: Provider::Anthropic,
        model: "fake-model".into(),
        missing_credentials: policy,
        max_upload_bytes: 64 * 1024,
    }))
}

async fn send(app: axum::Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&body).unwrap())
}

#[tokio::test]
async fn text_claim_returns_normalized_verdict() {
    let llm = FakeLlm::replying(
        "```json\n{\"veredito\":\"FALSO\",\"confianca\":97,\"resumo\":\"Não há evidência científica.\"}\n```",
    );
    let app = app_with(Some(llm.clone()), MissingCredentialsPolicy::Unavailable);

    let (status, json) = send(
        app,
        verify_request(&[
            Part::Field("text", "A vacina contra a gripe causa autismo"),
            Part::Field("type", "text"),
        ]),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["veredito"], "FALSO");
    assert_eq!(json["confianca"], 97);
    assert_eq!(json["resumo"], "Não há evidência científica.");
    assert_eq!(json["analise"], "Análise detalhada não fornecida.");
    assert_eq!(json["fontes_consultadas"], serde_json::json!([]));
    assert_eq!(
        json["dicas"],
        serde_json::json!(["Verifique sempre em fontes oficiais."])
    );
    assert!(json.get("modo_demo").is_none());
    assert_eq!(llm.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn image_upload_reaches_model_with_declared_type() {
    let llm = FakeLlm::replying("{\"veredito\":\"ENGANOSO\",\"confianca\":80}");
    let app = app_with(Some(llm.clone()), MissingCredentialsPolicy::Unavailable);

    let (status, json) = send(
        app,
        verify_request(&[Part::File {
            name: "image",
            filename: "print.png",
            content_type: "image/png",
            bytes: b"\x89PNG fake",
        }]),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["veredito"], "ENGANOSO");

    let last = llm.last.lock().unwrap();
    let request = last.as_ref().unwrap();
    match &request.parts[0] {
        ContentPart::Image(image) => assert_eq!(image.media_type.as_mime(), "image/png"),
        other => panic!("expected image first, got {other:?}"),
    }
}

#[tokio::test]
async fn prose_reply_degrades_to_unverified() {
    let llm = FakeLlm::replying("Não consegui analisar este conteúdo.");
    let app = app_with(Some(llm), MissingCredentialsPolicy::Unavailable);

    let (status, json) = send(app, verify_request(&[Part::Field("text", "boato")])).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["veredito"], "SEM_EVIDENCIAS");
    assert_eq!(json["confianca"], 50);
    assert_eq!(json["analise"], "Não consegui analisar este conteúdo.");
}

#[tokio::test]
async fn missing_input_is_rejected_without_calling_model() {
    let llm = FakeLlm::replying("{}");
    let app = app_with(Some(llm.clone()), MissingCredentialsPolicy::Unavailable);

    let (status, json) = send(
        app,
        verify_request(&[Part::Field("text", "   "), Part::Field("type", "url")]),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "MISSING_INPUT");
    assert!(json["error"].is_string());
    assert_eq!(llm.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn unknown_fields_are_ignored() {
    let llm = FakeLlm::replying("{\"veredito\":\"VERDADEIRO\",\"confianca\":90}");
    let app = app_with(Some(llm), MissingCredentialsPolicy::Unavailable);

    let (status, json) = send(
        app,
        verify_request(&[
            Part::Field("source", "whatsapp"),
            Part::Field("text", "O Brasil tem 26 estados e um Distrito Federal"),
        ]),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["veredito"], "VERDADEIRO");
}

#[tokio::test]
async fn non_multipart_body_is_invalid_request() {
    let app = app_with(None, MissingCredentialsPolicy::Unavailable);
    let request = Request::post("/api/verify")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(r#"{"text":"x"}"#))
        .unwrap();

    let (status, json) = send(app, request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "INVALID_REQUEST");
}

#[tokio::test]
async fn missing_credentials_is_service_unavailable() {
    let app = app_with(None, MissingCredentialsPolicy::Unavailable);

    let (status, json) = send(app, verify_request(&[Part::Field("text", "x")])).await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json["code"], "MISSING_CREDENTIALS");
}

#[tokio::test]
async fn demo_policy_returns_flagged_record() {
    let app = app_with(None, MissingCredentialsPolicy::Demo);

    let (status, json) = send(app, verify_request(&[Part::Field("text", "x")])).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["veredito"], "SEM_EVIDENCIAS");
    assert_eq!(json["confianca"], 0);
    assert_eq!(json["modo_demo"], true);
}

#[tokio::test]
async fn upstream_auth_failure_passes_through_as_401() {
    let llm = FakeLlm::failing(|| LlmError::Unauthorized("invalid x-api-key".into()));
    let app = app_with(Some(llm), MissingCredentialsPolicy::Unavailable);

    let (status, json) = send(app, verify_request(&[Part::Field("text", "x")])).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["code"], "UPSTREAM_AUTH");
    assert!(!json["error"].as_str().unwrap().contains("x-api-key"));
}

#[tokio::test]
async fn upstream_rate_limit_passes_through_as_429() {
    let llm = FakeLlm::failing(|| LlmError::RateLimited("slow down".into()));
    let app = app_with(Some(llm), MissingCredentialsPolicy::Unavailable);

    let (status, json) = send(app, verify_request(&[Part::Field("text", "x")])).await;

    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(json["code"], "UPSTREAM_RATE_LIMITED");
    assert_eq!(json["recoverable"], true);
}

#[tokio::test]
async fn transport_failure_is_generic_500() {
    let llm = FakeLlm::failing(|| LlmError::Transport("dns error: api.anthropic.com".into()));
    let app = app_with(Some(llm), MissingCredentialsPolicy::Unavailable);

    let (status, json) = send(app, verify_request(&[Part::Field("text", "x")])).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["code"], "UPSTREAM_FAILURE");
    assert!(!json["error"].as_str().unwrap().contains("anthropic"));
}

#[tokio::test]
async fn oversized_upload_is_rejected() {
    let llm = FakeLlm::replying("{}");
    let app = app_with(Some(llm.clone()), MissingCredentialsPolicy::Unavailable);
    let big = vec![0u8; 128 * 1024];

    let response = app
        .oneshot(verify_request(&[Part::File {
            name: "image",
            filename: "big.jpg",
            content_type: "image/jpeg",
            bytes: &big,
        }]))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(llm.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn health_reports_provider_and_credentials() {
    let (status, json) = send(
        app_with(None, MissingCredentialsPolicy::Unavailable),
        Request::get("/health").body(Body::empty()).unwrap(),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
    assert_eq!(json["provider"], "anthropic");
    assert_eq!(json["model"], "fake-model");
    assert_eq!(json["credentials"], false);

    let (_, json) = send(
        app_with(Some(FakeLlm::replying("{}")), MissingCredentialsPolicy::Unavailable),
        Request::get("/health").body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(json["credentials"], true);
}
