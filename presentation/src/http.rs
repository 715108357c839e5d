//! HTTP surface: multipart decoding, the two assist routes, and the
//! single place where classified pipeline errors become status codes.

use std::sync::Arc;

use application::assistant_service::AssistantService;
use axum::body::Body;
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::header::HeaderName;
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::Router;
use domain::error::{PipelineError, PipelineResult};
use domain::models::{
    AssistantInput, AssistantReply, AssistantRequest, AudioUpload, CallerContext, ConversationTurn,
};
use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use shared::telemetry::Telemetry;

/// Generous enough for a voice clip; multipart bodies above this are
/// rejected by axum before the pipeline runs.
const MAX_BODY_BYTES: usize = 25 * 1024 * 1024;

const X_TRANSCRIPT: HeaderName = HeaderName::from_static("x-transcript");
const X_RESPONSE: HeaderName = HeaderName::from_static("x-response");

pub fn router(service: Arc<AssistantService>) -> Router {
    Router::new()
        .route("/api/assist", post(assist))
        .route("/api/assist/voice", post(assist_voice))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .with_state(service)
}

/// Text variant: 200 body is the reply text.
async fn assist(
    State(service): State<Arc<AssistantService>>,
    headers: HeaderMap,
    multipart: Multipart,
) -> Response {
    let telemetry = Telemetry::new();
    let request = match decode_request(multipart, &headers).await {
        Ok(request) => request,
        Err(err) => return error_response(&err, None),
    };
    match service.handle(request).await {
        Ok(reply) => {
            tracing::info!(elapsed_ms = telemetry.elapsed_ms() as u64, "assist complete");
            let mut response = (StatusCode::OK, reply.reply.clone()).into_response();
            attach_reply_headers(response.headers_mut(), &reply);
            response
        }
        Err(err) => error_response(&err, None),
    }
}

/// Voice variant: 200 body is the raw PCM stream from the speech API,
/// forwarded unmodified. The transcript and reply still travel in headers,
/// even when synthesis itself fails after a successful completion.
async fn assist_voice(
    State(service): State<Arc<AssistantService>>,
    headers: HeaderMap,
    multipart: Multipart,
) -> Response {
    let telemetry = Telemetry::new();
    let request = match decode_request(multipart, &headers).await {
        Ok(request) => request,
        Err(err) => return error_response(&err, None),
    };
    let reply = match service.handle(request).await {
        Ok(reply) => reply,
        Err(err) => return error_response(&err, None),
    };
    match service.voice(&reply.reply).await {
        Ok(stream) => {
            tracing::info!(elapsed_ms = telemetry.elapsed_ms() as u64, "voice assist complete");
            let mut response = Response::new(Body::from_stream(stream));
            response
                .headers_mut()
                .insert("content-type", HeaderValue::from_static("audio/pcm"));
            attach_reply_headers(response.headers_mut(), &reply);
            response
        }
        Err(err) => error_response(&err, Some(&reply)),
    }
}

/// Pull `input` and the repeated `message` fields out of the multipart
/// form. Any malformed part fails the request before the pipeline starts.
async fn decode_request(
    mut multipart: Multipart,
    headers: &HeaderMap,
) -> PipelineResult<AssistantRequest> {
    let mut input: Option<AssistantInput> = None;
    let mut history: Option<Vec<ConversationTurn>> = None;

    loop {
        let field = multipart
            .next_field()
            .await
            .map_err(|err| PipelineError::InvalidRequest(err.to_string()))?;
        let Some(field) = field else { break };
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("input") => {
                let file_name = field.file_name().map(str::to_string);
                let content_type = field.content_type().map(str::to_string);
                if let Some(file_name) = file_name {
                    let bytes = field
                        .bytes()
                        .await
                        .map_err(|err| PipelineError::InvalidRequest(err.to_string()))?;
                    input = Some(AssistantInput::Audio(AudioUpload {
                        bytes,
                        file_name,
                        content_type: content_type
                            .unwrap_or_else(|| "application/octet-stream".to_string()),
                    }));
                } else {
                    let text = field
                        .text()
                        .await
                        .map_err(|err| PipelineError::InvalidRequest(err.to_string()))?;
                    input = Some(AssistantInput::Text(text));
                }
            }
            Some("message") => {
                let raw = field
                    .text()
                    .await
                    .map_err(|err| PipelineError::InvalidRequest(err.to_string()))?;
                let turns = parse_message_field(&raw)?;
                history.get_or_insert_with(Vec::new).extend(turns);
            }
            _ => {}
        }
    }

    let input = input.ok_or_else(|| PipelineError::InvalidRequest("missing input".to_string()))?;
    let history =
        history.ok_or_else(|| PipelineError::InvalidRequest("missing message".to_string()))?;
    Ok(AssistantRequest {
        input,
        history,
        caller: caller_context(headers),
    })
}

/// Each `message` value is a JSON turn object. A JSON array of turns is
/// also accepted so a caller can send an explicitly empty history as `[]`.
fn parse_message_field(raw: &str) -> PipelineResult<Vec<ConversationTurn>> {
    let value: serde_json::Value = serde_json::from_str(raw)
        .map_err(|err| PipelineError::InvalidRequest(format!("bad message field: {err}")))?;
    let turns = if value.is_array() {
        serde_json::from_value::<Vec<ConversationTurn>>(value)
    } else {
        serde_json::from_value::<ConversationTurn>(value).map(|turn| vec![turn])
    };
    turns.map_err(|err| PipelineError::InvalidRequest(format!("bad message field: {err}")))
}

/// Advisory geo/timezone hints; absent headers fall back to "unknown".
fn caller_context(headers: &HeaderMap) -> CallerContext {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .filter(|value| !value.trim().is_empty())
            .unwrap_or("unknown")
            .to_string()
    };
    CallerContext {
        city: header("x-city"),
        timezone: header("x-timezone"),
    }
}

fn attach_reply_headers(headers: &mut HeaderMap, reply: &AssistantReply) {
    headers.insert(X_TRANSCRIPT, encoded_header(&reply.transcript));
    headers.insert(X_RESPONSE, encoded_header(&reply.reply));
}

/// Header values must be ASCII-safe, so both copies travel percent-encoded
/// and decode back to the exact internal strings.
fn encoded_header(value: &str) -> HeaderValue {
    let encoded = utf8_percent_encode(value, NON_ALPHANUMERIC).to_string();
    HeaderValue::from_str(&encoded).unwrap_or_else(|_| HeaderValue::from_static(""))
}

/// The one place a classified failure turns into HTTP: fixed status, fixed
/// short body, logged with its stage. `reply` is present only when the
/// completion stage had already succeeded (voice synthesis failures).
fn error_response(err: &PipelineError, reply: Option<&AssistantReply>) -> Response {
    tracing::error!(stage = err.stage(), error = %err, "pipeline failed");
    let status = if err.is_client_fault() {
        StatusCode::BAD_REQUEST
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };
    let body = match err {
        PipelineError::InvalidRequest(_) => "Invalid request",
        PipelineError::InvalidAudio => "No transcript",
        PipelineError::Retrieval(_) => "Retrieval failed",
        PipelineError::Synthesis(_) => "Context synthesis failed",
        PipelineError::Completion(_) => "Completion failed",
        PipelineError::VoiceSynthesis(_) => "Voice synthesis failed",
    };
    let mut response = (status, body).into_response();
    if let Some(reply) = reply {
        attach_reply_headers(response.headers_mut(), reply);
    }
    response
}
