//! End-to-end exchanges through the gateway on a loopback transport, with
//! an axum router standing in for the local pipeline.

use std::collections::HashMap;
use std::sync::Arc;

use axum::body::{Body, Bytes};
use axum::http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode, Uri};
use axum::routing::{get, post};
use axum::{Form, Router};
use relay_gateway::config::PipelineConfig;
use relay_gateway::dispatch::{ExchangeFault, ExchangeOutcome};
use relay_gateway::http::BufferingPolicy;
use relay_gateway::pipeline::UpstreamPipeline;
use relay_gateway::relay::{OutboundReply, Payload, XmlElement};

mod common;

const BUFFERED: BufferingPolicy = BufferingPolicy::Buffered { max_bytes: 64 * 1024 };

fn values(map: &HeaderMap, name: &str) -> Vec<String> {
    map.get_all(name)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .map(str::to_string)
        .collect()
}

fn complete(outcome: ExchangeOutcome) -> OutboundReply {
    match outcome {
        ExchangeOutcome::Completed(reply) => reply,
        other => panic!("exchange did not complete: {other:?}"),
    }
}

#[tokio::test]
async fn test_get_without_body() {
    let router = Router::new().route("/test", get(|| async { "eureka" }));
    let (_gateway, transport) =
        common::loopback_gateway(router, BufferingPolicy::Streaming).await;

    let outcome = transport.send(common::envelope("GET", "/test")).unwrap().await;
    let reply = complete(outcome);

    assert_eq!(reply.envelope.status(), StatusCode::OK);
    assert_eq!(reply.envelope.reason_phrase(), "OK");
    assert_eq!(reply.body.as_deref(), Some(&b"eureka"[..]));
}

#[tokio::test]
async fn test_post_form_encoded_body() {
    async fn check_form(Form(form): Form<HashMap<String, String>>) -> StatusCode {
        let expected = (1..=4).all(|i| {
            form.get(&format!("key{i}")).map(String::as_str) == Some(format!("value{i}").as_str())
        });
        if expected && form.len() == 4 {
            StatusCode::OK
        } else {
            StatusCode::BAD_REQUEST
        }
    }

    for policy in [BufferingPolicy::Streaming, BUFFERED] {
        let router = Router::new().route("/test", post(check_form));
        let (_gateway, transport) = common::loopback_gateway(router, policy).await;

        let envelope = common::envelope("POST", "/test")
            .with_header(
                header::CONTENT_TYPE,
                HeaderValue::from_static("application/x-www-form-urlencoded"),
            )
            .with_payload(Payload::Raw(Body::from(
                "key1=value1&key2=value2&key3=value3&key4=value4",
            )));

        let reply = complete(transport.send(envelope).unwrap().await);
        assert_eq!(reply.envelope.status(), StatusCode::OK, "policy {policy:?}");
    }
}

#[tokio::test]
async fn test_post_with_repeated_headers() {
    async fn check_headers(headers: HeaderMap) -> StatusCode {
        if values(&headers, "content-language") == ["en-gb", "en-us"]
            && values(&headers, "x-customheader") == ["value1", "value2"]
        {
            StatusCode::OK
        } else {
            StatusCode::BAD_REQUEST
        }
    }

    let router = Router::new().route("/test", post(check_headers));
    let (_gateway, transport) =
        common::loopback_gateway(router, BufferingPolicy::Streaming).await;

    let custom = HeaderName::from_static("x-customheader");
    let envelope = common::envelope("POST", "/test")
        .with_header(header::CONTENT_LANGUAGE, HeaderValue::from_static("en-gb"))
        .with_header(header::CONTENT_LANGUAGE, HeaderValue::from_static("en-us"))
        .with_header(custom.clone(), HeaderValue::from_static("value1"))
        .with_header(custom, HeaderValue::from_static("value2"))
        .with_payload(Payload::Raw(Body::from("eureka")));

    let reply = complete(transport.send(envelope).unwrap().await);
    assert_eq!(reply.envelope.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_no_content_suppresses_body() {
    let router = Router::new().route("/test", get(|| async { StatusCode::NO_CONTENT }));
    let (_gateway, transport) =
        common::loopback_gateway(router, BufferingPolicy::Streaming).await;

    let reply = complete(transport.send(common::envelope("GET", "/test")).unwrap().await);

    assert_eq!(reply.envelope.status(), StatusCode::NO_CONTENT);
    assert_eq!(reply.envelope.reason_phrase(), "No Content");
    assert!(reply.envelope.suppress_body());
    assert!(reply.body.is_none());
    assert!(reply.envelope.headers().get_all("content-type").is_empty());
}

#[tokio::test]
async fn test_post_body_is_transformed() {
    async fn uppercase(body: Bytes) -> Vec<u8> {
        body.to_ascii_uppercase()
    }

    for policy in [BufferingPolicy::Streaming, BUFFERED] {
        let router = Router::new().route("/test", post(uppercase));
        let (_gateway, transport) = common::loopback_gateway(router, policy).await;

        let envelope = common::envelope("POST", "/test")
            .with_header(header::CONTENT_TYPE, HeaderValue::from_static("text/plain"))
            .with_payload(Payload::Raw(Body::from("eureka")));

        let reply = complete(transport.send(envelope).unwrap().await);
        assert_eq!(reply.body.as_deref(), Some(&b"EUREKA"[..]), "policy {policy:?}");
        assert_eq!(
            reply.envelope.headers().get_all("content-type"),
            ["application/octet-stream"]
        );
    }
}

#[tokio::test]
async fn test_structured_payload_reaches_pipeline_as_xml() {
    async fn echo(headers: HeaderMap, body: Bytes) -> (HeaderMap, Bytes) {
        let mut reply = HeaderMap::new();
        if let Some(ct) = headers.get(header::CONTENT_TYPE) {
            reply.insert(header::CONTENT_TYPE, ct.clone());
        }
        (reply, body)
    }

    let router = Router::new().route("/test", post(echo));
    let (_gateway, transport) =
        common::loopback_gateway(router, BufferingPolicy::Streaming).await;

    let message = XmlElement::new("order")
        .attr("id", "7")
        .child(XmlElement::new("item").text("tea & cake"));
    let envelope = common::envelope("POST", "/test")
        .with_header(header::CONTENT_TYPE, HeaderValue::from_static("application/xml"))
        .with_payload(Payload::Structured(message));

    let reply = complete(transport.send(envelope).unwrap().await);
    assert_eq!(
        reply.body.as_deref(),
        Some(&br#"<order id="7"><item>tea &amp; cake</item></order>"#[..])
    );
    assert_eq!(reply.envelope.headers().get_all("Content-Type"), ["application/xml"]);
}

#[tokio::test]
async fn test_pipeline_errors_fault_the_exchange() {
    // Nothing listens on the discard port.
    let pipeline = UpstreamPipeline::new(&PipelineConfig {
        upstream_address: "127.0.0.1:9".to_string(),
        connect_timeout_secs: 1,
    })
    .unwrap();
    let (_gateway, transport) =
        common::loopback_gateway_with(Arc::new(pipeline), BufferingPolicy::Streaming).await;

    let outcome = transport.send(common::envelope("GET", "/test")).unwrap().await;
    assert!(matches!(outcome, ExchangeOutcome::Faulted(ExchangeFault::Pipeline(_))));
}

#[tokio::test]
async fn test_malformed_envelope_faults_before_invoking() {
    let router = Router::new().route("/test", get(|| async { "unreachable" }));
    let (_gateway, transport) =
        common::loopback_gateway(router, BufferingPolicy::Streaming).await;

    let outcome = transport.send(common::envelope("", "/test")).unwrap().await;
    assert!(matches!(outcome, ExchangeOutcome::Faulted(ExchangeFault::Translation(_))));
}

#[tokio::test]
async fn test_upstream_reason_phrase_is_kept() {
    let backend = common::start_raw_backend(concat!(
        "HTTP/1.1 299 Mostly Fine\r\n",
        "Content-Type: text/plain\r\n",
        "Content-Length: 2\r\n",
        "Connection: close\r\n\r\nok",
    ))
    .await;
    let pipeline = UpstreamPipeline::new(&PipelineConfig {
        upstream_address: backend.to_string(),
        connect_timeout_secs: 1,
    })
    .unwrap();
    let (_gateway, transport) =
        common::loopback_gateway_with(Arc::new(pipeline), BufferingPolicy::Streaming).await;

    let reply = complete(transport.send(common::envelope("GET", "/status")).unwrap().await);

    assert_eq!(reply.envelope.status().as_u16(), 299);
    assert_eq!(reply.envelope.reason_phrase(), "Mostly Fine");
    assert_eq!(reply.envelope.headers().get_all("content-length"), ["2"]);
    assert_eq!(reply.body.as_deref(), Some(&b"ok"[..]));
}

#[tokio::test]
async fn test_target_path_and_query_reach_the_route() {
    async fn echo_uri(uri: Uri) -> String {
        uri.path_and_query().map(|pq| pq.to_string()).unwrap_or_default()
    }

    let router = Router::new().route("/orders/{id}", get(echo_uri));
    let (_gateway, transport) =
        common::loopback_gateway(router, BufferingPolicy::Streaming).await;

    let reply = complete(
        transport
            .send(common::envelope("GET", "/orders/7?expand=items"))
            .unwrap()
            .await,
    );

    assert_eq!(reply.envelope.status(), StatusCode::OK);
    assert_eq!(reply.body.as_deref(), Some(&b"/orders/7?expand=items"[..]));
}

#[tokio::test]
async fn test_panicking_handler_faults_the_exchange() {
    async fn explode() -> &'static str {
        if true {
            panic!("handler exploded");
        }
        "unreachable"
    }

    let router = Router::new().route("/test", get(explode));
    let (_gateway, transport) =
        common::loopback_gateway(router, BufferingPolicy::Streaming).await;

    let outcome = transport.send(common::envelope("GET", "/test")).unwrap().await;
    assert!(
        matches!(outcome, ExchangeOutcome::Faulted(ExchangeFault::Pipeline(_))),
        "unexpected outcome: {outcome:?}"
    );

    // The gateway keeps serving after the fault.
    let outcome = transport.send(common::envelope("GET", "/test")).unwrap().await;
    assert!(matches!(outcome, ExchangeOutcome::Faulted(ExchangeFault::Pipeline(_))));
}

#[tokio::test]
async fn test_oversized_response_body_faults_the_exchange() {
    let router = Router::new().route("/test", get(|| async { "eureka" }));
    let mut settings = common::settings(BufferingPolicy::Streaming);
    settings.max_response_bytes = 4;
    let transport = relay_gateway::relay::LoopbackTransport::new();
    let mut gateway = relay_gateway::lifecycle::RelayGateway::new(
        settings,
        Arc::new(relay_gateway::pipeline::ServicePipeline::new(router)),
        Arc::new(transport.clone()),
    );
    gateway.open().await.unwrap();

    let outcome = transport.send(common::envelope("GET", "/test")).unwrap().await;
    assert!(
        matches!(outcome, ExchangeOutcome::Faulted(ExchangeFault::Pipeline(_))),
        "unexpected outcome: {outcome:?}"
    );
}
