//! End-to-end tests: multipart request in, HTTP response out, with every
//! external service replaced by a scriptable fake.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use application::assistant_service::AssistantService;
use application::prompt::DEFAULT_PERSONA;
use application::retrieval_service::{KeywordFailurePolicy, RetrievalService, RetrievalStrategy};
use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use percent_encoding::percent_decode_str;
use tests::{FakeChat, FakeEmbedder, FakeIndex, FakeStt, FakeTts};
use tower::ServiceExt;

const BOUNDARY: &str = "assist-test-boundary";

struct Harness {
    chat: Arc<FakeChat>,
    index: Arc<FakeIndex>,
    stt: Arc<FakeStt>,
    tts: Arc<FakeTts>,
    router: Router,
}

fn harness(
    strategy: RetrievalStrategy,
    policy: KeywordFailurePolicy,
    chat: FakeChat,
    index: FakeIndex,
    stt: FakeStt,
    tts: FakeTts,
) -> Harness {
    let chat = Arc::new(chat);
    let index = Arc::new(index);
    let stt = Arc::new(stt);
    let tts = Arc::new(tts);
    let retrieval = RetrievalService::new(
        Arc::new(FakeEmbedder),
        index.clone(),
        chat.clone(),
        strategy,
        policy,
    );
    let service = AssistantService::new(
        stt.clone(),
        chat.clone(),
        tts.clone(),
        retrieval,
        DEFAULT_PERSONA.to_string(),
    );
    let router = presentation::http::router(Arc::new(service));
    Harness {
        chat,
        index,
        stt,
        tts,
        router,
    }
}

fn direct_harness(chat: FakeChat, index: FakeIndex, stt: FakeStt, tts: FakeTts) -> Harness {
    harness(
        RetrievalStrategy::Direct,
        KeywordFailurePolicy::Abort,
        chat,
        index,
        stt,
        tts,
    )
}

enum Part<'a> {
    Text { name: &'a str, value: &'a str },
    File {
        name: &'a str,
        file_name: &'a str,
        content_type: &'a str,
        bytes: &'a [u8],
    },
}

fn multipart_body(parts: &[Part<'_>]) -> Vec<u8> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        match part {
            Part::Text { name, value } => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes(),
                );
                body.extend_from_slice(value.as_bytes());
            }
            Part::File {
                name,
                file_name,
                content_type,
                bytes,
            } => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\n\
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

fn post(uri: &str, body: Vec<u8>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(
            "content-type",
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

fn text_question(question: &str) -> Vec<u8> {
    multipart_body(&[
        Part::Text {
            name: "input",
            value: question,
        },
        Part::Text {
            name: "message",
            value: "[]",
        },
    ])
}

async fn body_string(response: axum::response::Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

fn decoded_header(response: &axum::response::Response, name: &str) -> String {
    let raw = response
        .headers()
        .get(name)
        .expect("header missing")
        .to_str()
        .unwrap();
    percent_decode_str(raw).decode_utf8().unwrap().into_owned()
}

#[tokio::test]
async fn text_question_gets_reply_with_round_trip_headers() {
    let h = direct_harness(
        FakeChat::scripted(&["Asycd is a creative platform."]),
        FakeIndex::one_snippet("1", 0.9, "Asycd is a platform for X."),
        FakeStt::new("unused"),
        FakeTts::ok(),
    );
    let response = h
        .router
        .clone()
        .oneshot(post("/api/assist", text_question("What is Asycd?")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(decoded_header(&response, "x-transcript"), "What is Asycd?");
    assert_eq!(
        decoded_header(&response, "x-response"),
        "Asycd is a creative platform."
    );
    assert!(!decoded_header(&response, "x-response").is_empty());

    // The responder saw the question first, then the snippet text.
    let last = h.chat.last_messages();
    let user = last.last().unwrap();
    let question = user.content.find("What is Asycd?").unwrap();
    let snippet = user.content.find("Asycd is a platform for X.").unwrap();
    assert!(question < snippet);

    assert_eq!(body_string(response).await, "Asycd is a creative platform.");
    // Text input never touches the recognizer.
    assert_eq!(h.stt.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn whitespace_only_text_input_is_a_bad_request() {
    let h = direct_harness(
        FakeChat::scripted(&["reply"]),
        FakeIndex::one_snippet("1", 0.9, "text"),
        FakeStt::new("unused"),
        FakeTts::ok(),
    );
    let response = h
        .router
        .clone()
        .oneshot(post("/api/assist", text_question("   ")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_string(response).await, "Invalid request");
    assert_eq!(h.index.query_count(), 0);
    assert_eq!(h.chat.call_count(), 0);
}

#[tokio::test]
async fn missing_message_field_is_a_bad_request() {
    let h = direct_harness(
        FakeChat::scripted(&["reply"]),
        FakeIndex::one_snippet("1", 0.9, "text"),
        FakeStt::new("unused"),
        FakeTts::ok(),
    );
    let body = multipart_body(&[Part::Text {
        name: "input",
        value: "hello",
    }]);
    let response = h.router.clone().oneshot(post("/api/assist", body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_string(response).await, "Invalid request");
    assert_eq!(h.index.query_count(), 0);
    assert_eq!(h.chat.call_count(), 0);
}

#[tokio::test]
async fn missing_input_field_is_a_bad_request() {
    let h = direct_harness(
        FakeChat::scripted(&["reply"]),
        FakeIndex::one_snippet("1", 0.9, "text"),
        FakeStt::new("unused"),
        FakeTts::ok(),
    );
    let body = multipart_body(&[Part::Text {
        name: "message",
        value: "[]",
    }]);
    let response = h.router.clone().oneshot(post("/api/assist", body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_string(response).await, "Invalid request");
}

#[tokio::test]
async fn history_entries_can_repeat_as_objects() {
    let h = direct_harness(
        FakeChat::scripted(&["reply"]),
        FakeIndex::one_snippet("1", 0.9, "text"),
        FakeStt::new("unused"),
        FakeTts::ok(),
    );
    let body = multipart_body(&[
        Part::Text {
            name: "input",
            value: "next question",
        },
        Part::Text {
            name: "message",
            value: r#"{"role":"user","content":"first"}"#,
        },
        Part::Text {
            name: "message",
            value: r#"{"role":"assistant","content":"second"}"#,
        },
    ]);
    let response = h.router.clone().oneshot(post("/api/assist", body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let messages = h.chat.last_messages();
    assert_eq!(messages[1].role, "user");
    assert_eq!(messages[1].content, "first");
    assert_eq!(messages[2].role, "assistant");
    assert_eq!(messages[2].content, "second");
}

#[tokio::test]
async fn empty_transcription_short_circuits_downstream_calls() {
    let h = direct_harness(
        FakeChat::scripted(&["reply"]),
        FakeIndex::one_snippet("1", 0.9, "text"),
        FakeStt::new("   "),
        FakeTts::ok(),
    );
    let body = multipart_body(&[
        Part::File {
            name: "input",
            file_name: "clip.wav",
            content_type: "audio/wav",
            bytes: b"fake-wav-bytes",
        },
        Part::Text {
            name: "message",
            value: "[]",
        },
    ]);
    let response = h.router.clone().oneshot(post("/api/assist", body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_string(response).await, "No transcript");
    assert_eq!(h.stt.calls.load(Ordering::SeqCst), 1);
    assert_eq!(h.index.query_count(), 0);
    assert_eq!(h.chat.call_count(), 0);
}

#[tokio::test]
async fn keyword_index_failure_fails_fast_without_completion() {
    // Script holds only the keyword-extraction reply; the responder must
    // never run, so a second script entry would go unread anyway.
    let h = harness(
        RetrievalStrategy::Keyword,
        KeywordFailurePolicy::Abort,
        FakeChat::scripted(&["pricing, onboarding"]),
        FakeIndex::one_snippet("1", 0.9, "text").failing_from(2),
        FakeStt::new("unused"),
        FakeTts::ok(),
    );
    let response = h
        .router
        .clone()
        .oneshot(post("/api/assist", text_question("tell me about pricing")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body_string(response).await, "Retrieval failed");
    // Only the keyword extraction call happened.
    assert_eq!(h.chat.call_count(), 1);
}

#[tokio::test]
async fn skip_policy_continues_past_failed_keywords() {
    let h = harness(
        RetrievalStrategy::Keyword,
        KeywordFailurePolicy::Skip,
        FakeChat::scripted(&[
            "pricing, onboarding",
            "Digest of what survived.",
            "Final answer.",
        ]),
        FakeIndex::one_snippet("1", 0.8, "Pricing is per generation.").failing_from(2),
        FakeStt::new("unused"),
        FakeTts::ok(),
    );
    let response = h
        .router
        .clone()
        .oneshot(post("/api/assist", text_question("how much does it cost")))
        .await
        .unwrap();
    // One keyword's lookup failed, but the request completed on the rest.
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(h.chat.call_count(), 3);
    assert_eq!(body_string(response).await, "Final answer.");
}

#[tokio::test]
async fn keyword_strategy_digests_before_responding() {
    let h = harness(
        RetrievalStrategy::Keyword,
        KeywordFailurePolicy::Abort,
        FakeChat::scripted(&[
            "pricing, onboarding",
            "Asycd charges per generation.",
            "It costs a little per generation.",
        ]),
        FakeIndex::one_snippet("1", 0.8, "Pricing is per generation."),
        FakeStt::new("unused"),
        FakeTts::ok(),
    );
    let response = h
        .router
        .clone()
        .oneshot(post("/api/assist", text_question("how much does it cost")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(h.chat.call_count(), 3);

    // The responder's user message carries the digest, not the raw snippets.
    let user = h.chat.last_messages().last().cloned().unwrap();
    assert!(user.content.contains("Asycd charges per generation."));
}

#[tokio::test]
async fn voice_variant_streams_pcm_with_headers() {
    let h = direct_harness(
        FakeChat::scripted(&["Here is your answer."]),
        FakeIndex::one_snippet("1", 0.9, "text"),
        FakeStt::new("unused"),
        FakeTts::ok(),
    );
    let response = h
        .router
        .clone()
        .oneshot(post("/api/assist/voice", text_question("hello")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("content-type").unwrap(),
        "audio/pcm"
    );
    assert_eq!(decoded_header(&response, "x-transcript"), "hello");
    assert_eq!(decoded_header(&response, "x-response"), "Here is your answer.");
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(bytes.as_ref(), &[1, 2, 3, 4, 5, 6, 7, 8]);
}

#[tokio::test]
async fn voice_failure_keeps_completed_transcript_headers() {
    let h = direct_harness(
        FakeChat::scripted(&["Here is your answer."]),
        FakeIndex::one_snippet("1", 0.9, "text"),
        FakeStt::new("unused"),
        FakeTts::failing(),
    );
    let response = h
        .router
        .clone()
        .oneshot(post("/api/assist/voice", text_question("hello")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(h.tts.calls.load(Ordering::SeqCst), 1);
    // Completion had already succeeded, so the headers still carry it.
    assert_eq!(decoded_header(&response, "x-transcript"), "hello");
    assert_eq!(decoded_header(&response, "x-response"), "Here is your answer.");
    assert_eq!(body_string(response).await, "Voice synthesis failed");
}
