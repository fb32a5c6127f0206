//! Request handlers

use std::sync::Arc;

use axum::{
    extract::{multipart::MultipartRejection, Multipart, State},
    Json,
};
use serde::Serialize;
use uuid::Uuid;
use verdade_common::Provider;
use verdade_config::MissingCredentialsPolicy;
use verdade_verify::{demo_record, ImageUpload, InputKind, VerdictRecord, VerificationRequest};

use crate::error::ApiError;
use crate::state::AppState;

/// Fields pulled out of the multipart form.
#[derive(Debug, Default)]
struct VerifyForm {
    text: Option<String>,
    kind: Option<String>,
    image: Option<ImageUpload>,
}

async fn read_form(mut multipart: Multipart) -> Result<VerifyForm, ApiError> {
    let mut form = VerifyForm::default();

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().map(str::to_owned);
        match name.as_deref() {
            Some("text") => form.text = Some(field.text().await?),
            Some("type") => form.kind = Some(field.text().await?),
            Some("image") => {
                let content_type = field.content_type().map(str::to_owned);
                let bytes = field.bytes().await?;
                form.image = Some(ImageUpload {
                    bytes: bytes.to_vec(),
                    content_type,
                });
            }
            _ => {}
        }
    }

    Ok(form)
}

/// POST /api/verify - verify text, a link and/or an image
pub async fn verify(
    State(state): State<Arc<AppState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<VerdictRecord>, ApiError> {
    let request_id = Uuid::new_v4();
    let form = read_form(multipart?).await.inspect_err(|err| {
        tracing::warn!(%request_id, error=%err, "verify.invalid_form");
    })?;

    let kind = InputKind::from_hint(form.kind.as_deref());
    tracing::info!(
        %request_id,
        ?kind,
        text_len = form.text.as_ref().map_or(0, |t| t.len()),
        image_bytes = form.image.as_ref().map_or(0, |i| i.bytes.len()),
        image_type = form.image.as_ref().and_then(|i| i.content_type.as_deref()),
        "verify.received"
    );

    let request = VerificationRequest::new(form.text, form.image, kind)?;

    let Some(verifier) = state.verifier.as_ref() else {
        return match state.missing_credentials {
            MissingCredentialsPolicy::Demo => {
                tracing::info!(%request_id, "verify.demo_mode");
                Ok(Json(demo_record()))
            }
            MissingCredentialsPolicy::Unavailable => {
                tracing::warn!(%request_id, provider=%state.provider, "verify.missing_credentials");
                Err(ApiError::MissingCredentials)
            }
        };
    };

    match verifier.verify(&request).await {
        Ok(record) => {
            tracing::info!(
                %request_id,
                verdict=%record.verdict,
                confidence=record.confidence,
                "verify.completed"
            );
            Ok(Json(record))
        }
        Err(err) => {
            tracing::error!(%request_id, error=%err, "verify.failed");
            Err(err.into())
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub provider: Provider,
    pub model: String,
    pub credentials: bool,
}

/// GET /health
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        provider: state.provider,
        model: state.model.clone(),
        credentials: state.has_credentials(),
    })
}
