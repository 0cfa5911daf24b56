//! End-to-end transactions against a helper bound to a loopback port.

use std::time::Duration;

use meek_http_helper::net::ConnectionSettings;
use meek_http_helper::protocol::Response;
use meek_http_helper::proxy::{ProxyDescriptor, ProxyKind};
use meek_http_helper::transport::TransportError;

mod common;

use common::{framed, send_chunked, send_raw, start_helper, StubReply, StubTransport};

const EXAMPLE: &str = r#"{"method":"POST","url":"https://example.com/","body":"aGVsbG8="}"#;

fn ok_stub() -> std::sync::Arc<StubTransport> {
    StubTransport::new(StubReply::Respond(200, b"ok".to_vec()))
}

fn decode_reply(bytes: &[u8]) -> Response {
    assert!(bytes.len() >= 4, "no response frame: {bytes:?}");
    let len = u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as usize;
    assert_eq!(bytes.len(), 4 + len, "exactly one frame expected");
    Response::from_json(&bytes[4..]).unwrap()
}

#[tokio::test]
async fn test_example_transaction() {
    let transport = ok_stub();
    let helper = start_helper(transport.clone(), ConnectionSettings::default()).await;

    let request = framed(EXAMPLE);
    assert_eq!(&request[..4], &[0x00, 0x00, 0x00, 0x40]);

    let reply = send_raw(helper.addr, &request).await;
    assert_eq!(&reply[4..], br#"{"status":200,"body":"b2s="}"#);
    assert_eq!(decode_reply(&reply), Response::success(200, b"ok".to_vec()));

    let seen = transport.seen();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].method, "POST");
    assert_eq!(seen[0].url, "https://example.com/");
    assert_eq!(seen[0].body.as_deref(), Some(&b"hello"[..]));
    assert_eq!(seen[0].proxy, ProxyDescriptor::Direct);
}

#[tokio::test]
async fn test_chunked_delivery_matches_single_write() {
    let transport = ok_stub();
    let helper = start_helper(transport.clone(), ConnectionSettings::default()).await;
    let request = framed(EXAMPLE);

    // Split inside the length prefix and twice inside the payload.
    let reply = send_chunked(helper.addr, &request, &[1, 3, 10, 40]).await;
    assert_eq!(decode_reply(&reply), Response::success(200, b"ok".to_vec()));

    // Byte at a time.
    let splits: Vec<usize> = (1..request.len()).collect();
    let reply = send_chunked(helper.addr, &request, &splits).await;
    assert_eq!(decode_reply(&reply), Response::success(200, b"ok".to_vec()));

    let seen = transport.seen();
    assert_eq!(seen.len(), 2);
    assert_eq!(seen[0], seen[1]);
}

#[tokio::test]
async fn test_oversized_frame_gets_no_reply() {
    let transport = ok_stub();
    let helper = start_helper(transport.clone(), ConnectionSettings::default()).await;

    let mut request = 1_000_001u32.to_be_bytes().to_vec();
    request.extend_from_slice(b"{}");
    let reply = send_raw(helper.addr, &request).await;

    assert!(reply.is_empty());
    assert!(transport.seen().is_empty());
}

#[tokio::test]
async fn test_rejected_requests_get_validation_error() {
    let transport = ok_stub();
    let helper = start_helper(transport.clone(), ConnectionSettings::default()).await;

    for json in [
        r#"{"method":"GET","url":"https://a"}"#,
        r#"{"method":"POST","url":"http://a"}"#,
        r#"{"url":"https://a"}"#,
        r#"{"method":"POST"}"#,
    ] {
        let reply = send_raw(helper.addr, &framed(json)).await;
        assert_eq!(decode_reply(&reply), Response::error("request failed validation"), "{json}");
    }
    assert!(transport.seen().is_empty());
}

#[tokio::test]
async fn test_bad_proxy_gets_proxy_error() {
    let transport = ok_stub();
    let helper = start_helper(transport.clone(), ConnectionSettings::default()).await;

    for proxy in [
        r#"{"type":"ftp","host":"h","port":1}"#,
        r#"{"type":"socks5","host":"h","port":70000}"#,
        r#"{"type":"http","port":8080}"#,
        r#"{"type":"http","host":"h","port":"8080"}"#,
        r#"{"type":5,"host":"h","port":1}"#,
        r#"{"type":"http","host":1,"port":1}"#,
        r#"{"type":"http","host":"h","port":8080.5}"#,
        r#""socks5://127.0.0.1:9050""#,
    ] {
        let json = format!(r#"{{"method":"POST","url":"https://a/","proxy":{proxy}}}"#);
        let reply = send_raw(helper.addr, &framed(&json)).await;
        assert_eq!(decode_reply(&reply), Response::error("invalid proxy specification"), "{proxy}");
    }
    assert!(transport.seen().is_empty());
}

#[tokio::test]
async fn test_socks4a_descriptor_reaches_transport() {
    let transport = ok_stub();
    let helper = start_helper(transport.clone(), ConnectionSettings::default()).await;

    let json = r#"{"method":"POST","url":"https://front.example/","header":{"Host":"hidden.example"},"proxy":{"type":"socks4a","host":"10.0.0.1","port":1080}}"#;
    let reply = send_raw(helper.addr, &framed(json)).await;
    assert_eq!(decode_reply(&reply), Response::success(200, b"ok".to_vec()));

    let seen = transport.seen();
    let proxy = &seen[0].proxy;
    assert_eq!(
        *proxy,
        ProxyDescriptor::Proxied { kind: ProxyKind::Socks4a, host: "10.0.0.1".into(), port: 1080 }
    );
    assert!(proxy.resolves_remotely());
    assert_eq!(proxy.proxy_url().as_deref(), Some("socks4a://10.0.0.1:1080"));
    assert_eq!(seen[0].header.get("Host").map(String::as_str), Some("hidden.example"));
}

#[tokio::test]
async fn test_transport_failure_is_named() {
    let cases = [
        (TransportError::ConnectionRefused, "ConnectionRefused"),
        (TransportError::UnknownHost, "UnknownHost"),
        (TransportError::ResponseTooLarge { limit: 10 }, "ResponseTooLarge"),
        (TransportError::Os(113), "error 113"),
        (TransportError::Unrecognized("tls".into()), "error unknown"),
    ];
    for (err, name) in cases {
        let helper = start_helper(StubTransport::new(StubReply::Fail(err)), ConnectionSettings::default()).await;
        let reply = send_raw(helper.addr, &framed(EXAMPLE)).await;
        assert_eq!(decode_reply(&reply), Response::error(name));
    }
}

#[tokio::test]
async fn test_upstream_status_is_relayed_verbatim() {
    let transport = StubTransport::new(StubReply::Respond(302, Vec::new()));
    let helper = start_helper(transport, ConnectionSettings::default()).await;
    let reply = send_raw(helper.addr, &framed(EXAMPLE)).await;
    assert_eq!(&reply[4..], br#"{"status":302,"body":""}"#);
}

#[tokio::test]
async fn test_malformed_json_closes_without_reply() {
    let transport = ok_stub();
    let helper = start_helper(transport.clone(), ConnectionSettings::default()).await;

    assert!(send_raw(helper.addr, &framed("{\"method\":")).await.is_empty());
    assert!(send_raw(helper.addr, &framed(r#"{"method":"POST","url":"https://a","body":"!!"}"#)).await.is_empty());
    assert!(transport.seen().is_empty());
}

#[tokio::test]
async fn test_silent_client_is_dropped_at_read_deadline() {
    let settings = ConnectionSettings {
        read_timeout: Duration::from_millis(100),
        ..ConnectionSettings::default()
    };
    let transport = ok_stub();
    let helper = start_helper(transport.clone(), settings).await;

    // Half a length prefix, then nothing.
    let started = std::time::Instant::now();
    let reply = send_chunked(helper.addr, &[0x00, 0x00], &[]).await;
    assert!(reply.is_empty());
    assert!(started.elapsed() < Duration::from_secs(2));
    assert!(transport.seen().is_empty());
}

#[tokio::test]
async fn test_reloaded_settings_apply_to_new_connections() {
    let transport = ok_stub();
    let helper = start_helper(transport.clone(), ConnectionSettings::default()).await;

    helper.settings.store(std::sync::Arc::new(ConnectionSettings {
        max_request_bytes: 16,
        ..ConnectionSettings::default()
    }));

    let reply = send_raw(helper.addr, &framed(EXAMPLE)).await;
    assert!(reply.is_empty());
    assert!(transport.seen().is_empty());
}

#[tokio::test]
async fn test_connections_are_independent() {
    let transport = ok_stub();
    let helper = start_helper(transport.clone(), ConnectionSettings::default()).await;

    let mut tasks = Vec::new();
    for _ in 0..8 {
        let addr = helper.addr;
        tasks.push(tokio::spawn(async move { send_raw(addr, &framed(EXAMPLE)).await }));
    }
    for task in tasks {
        assert_eq!(decode_reply(&task.await.unwrap()), Response::success(200, b"ok".to_vec()));
    }
    assert_eq!(transport.seen().len(), 8);
}

#[tokio::test]
async fn test_shutdown_aborts_in_flight_transactions() {
    let transport = StubTransport::new(StubReply::Hang);
    let helper = start_helper(transport.clone(), ConnectionSettings::default()).await;

    let addr = helper.addr;
    let pending = tokio::spawn(async move { send_raw(addr, &framed(EXAMPLE)).await });
    while transport.seen().is_empty() {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    helper.shutdown.trigger();
    let reply = pending.await.unwrap();
    assert!(reply.is_empty());
}
