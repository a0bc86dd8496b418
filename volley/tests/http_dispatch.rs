use std::time::Duration;

use http::header::CONTENT_ENCODING;
use http::StatusCode;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use volley::report::write_report;
use volley::{
    dispatch, AttemptState, DispatchConfig, FailureKind, HttpTransport, PacingScheduler,
    RequestDescriptor, TransportOptions,
};
use volley_test_util::{refused_url, CreatedUser, StubServer, UserPage};

fn scheduler(config: DispatchConfig) -> PacingScheduler<HttpTransport> {
    PacingScheduler::new(HttpTransport::default(), config)
}

#[tokio::test(flavor = "multi_thread")]
async fn always_ok_endpoint_three_per_second_in_pairs() {
    let server = StubServer::spawn().await.unwrap();
    let desc = RequestDescriptor::get(&server.url("/api/users")).unwrap();
    let records = scheduler(DispatchConfig::new(3, 2, 1).unwrap())
        .dispatch(desc)
        .await;

    assert_eq!(records.len(), 3);
    assert_eq!(server.hits(), 3);
    for (i, record) in records.iter().enumerate() {
        assert_eq!(record.index, i);
        assert_eq!(record.state(), AttemptState::Succeeded);
        let resp = record.response().unwrap();
        assert_eq!(resp.status, StatusCode::OK);
        assert!(resp.body.is_none());
        assert!(record.failure().is_none());
    }
    // Third attempt waits one 500ms tick.
    let gap = records[2].timestamp - records[0].timestamp;
    assert!(gap >= chrono::Duration::milliseconds(450), "gap was {gap}");
}

#[tokio::test(flavor = "multi_thread")]
async fn response_body_is_kept_on_request() {
    let server = StubServer::spawn().await.unwrap();
    let desc = RequestDescriptor::get(&server.url("/api/users")).unwrap();
    let cfg = DispatchConfig::new(2, 2, 1).unwrap().with_response_body(true);
    let records = scheduler(cfg).dispatch(desc).await;

    for record in &records {
        let body = record.response().unwrap().body.as_ref().unwrap();
        let page: UserPage = serde_json::from_slice(body).unwrap();
        assert_eq!(page.page, 1);
        assert_eq!(page.data.len(), 2);
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn headers_reach_the_target() {
    let server = StubServer::spawn().await.unwrap();
    let desc = RequestDescriptor::get(&server.url("/headers"))
        .unwrap()
        .with_header("Authorization", "Bearer xyz")
        .unwrap();
    let cfg = DispatchConfig::new(1, 1, 1).unwrap().with_response_body(true);
    let records = scheduler(cfg).dispatch(desc).await;

    let body = records[0].response().unwrap().body.clone().unwrap();
    let echoed: std::collections::BTreeMap<String, String> =
        serde_json::from_slice(&body).unwrap();
    assert_eq!(echoed["authorization"], "Bearer xyz");
}

#[tokio::test(flavor = "multi_thread")]
async fn json_post_is_created() {
    let server = StubServer::spawn().await.unwrap();
    let desc = RequestDescriptor::post(&server.url("/api/users"))
        .unwrap()
        .with_json(&serde_json::json!({"id": 1, "name": "Test"}))
        .unwrap();
    let cfg = DispatchConfig::new(2, 1, 1).unwrap().with_response_body(true);
    let records = scheduler(cfg).dispatch(desc).await;

    assert_eq!(records.len(), 2);
    for record in &records {
        let resp = record.response().unwrap();
        assert_eq!(resp.status, StatusCode::CREATED);
        let created: CreatedUser = serde_json::from_slice(resp.body.as_ref().unwrap()).unwrap();
        assert_eq!(created.name, "Test");
        assert_eq!(created.content_type.as_deref(), Some("application/json"));
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn multipart_upload_is_created() {
    let server = StubServer::spawn().await.unwrap();
    let desc = RequestDescriptor::post(&server.url("/upload"))
        .unwrap()
        .with_multipart([b"Test file\n".as_slice()])
        .unwrap();
    let records = scheduler(DispatchConfig::new(1, 1, 1).unwrap())
        .dispatch(desc)
        .await;
    assert_eq!(records[0].status(), Some(StatusCode::CREATED));
}

#[tokio::test(flavor = "multi_thread")]
async fn gzip_bodies_are_decoded_when_enabled() {
    let server = StubServer::spawn().await.unwrap();
    let cfg = DispatchConfig::new(1, 1, 1).unwrap().with_response_body(true);

    let desc = RequestDescriptor::get(&server.url("/gzip")).unwrap();
    let records = scheduler(cfg.clone()).dispatch(desc.clone()).await;
    let resp = records[0].response().unwrap();
    assert!(resp.headers.get(CONTENT_ENCODING).is_none());
    let page: UserPage = serde_json::from_slice(resp.body.as_ref().unwrap()).unwrap();
    assert_eq!(page.data[0].name, "George");

    let raw = HttpTransport::new(&TransportOptions {
        decompress: false,
        ..TransportOptions::default()
    });
    let records = PacingScheduler::new(raw, cfg).dispatch(desc).await;
    let resp = records[0].response().unwrap();
    assert_eq!(resp.headers[CONTENT_ENCODING], "gzip");
    assert_eq!(&resp.body.as_ref().unwrap()[..2], &[0x1f_u8, 0x8b]);
}

#[tokio::test(flavor = "multi_thread")]
async fn discarded_gzip_bodies_keep_their_headers() {
    let server = StubServer::spawn().await.unwrap();
    let desc = RequestDescriptor::get(&server.url("/gzip")).unwrap();
    let records = scheduler(DispatchConfig::new(1, 1, 1).unwrap())
        .dispatch(desc)
        .await;
    let resp = records[0].response().unwrap();
    assert!(resp.body.is_none());
    assert_eq!(resp.headers[CONTENT_ENCODING], "gzip");
}

/// Answers every connection with `head` followed by `body`, then hangs up.
async fn spawn_raw_target(head: String, body: &'static [u8]) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        while let Ok((mut stream, _)) = listener.accept().await {
            let head = head.clone();
            tokio::spawn(async move {
                let mut request = Vec::new();
                let mut buf = [0u8; 1024];
                while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                    match stream.read(&mut buf).await {
                        Ok(0) | Err(_) => return,
                        Ok(n) => request.extend_from_slice(&buf[..n]),
                    }
                }
                let _ = stream.write_all(head.as_bytes()).await;
                let _ = stream.write_all(body).await;
                let _ = stream.shutdown().await;
            });
        }
    });
    format!("http://{addr}/")
}

#[tokio::test(flavor = "multi_thread")]
async fn absurd_content_length_fails_the_attempt_not_the_run() {
    for length in ["400000000000", "9000000000000000000"] {
        let head = format!("HTTP/1.1 200 OK\r\nContent-Length: {length}\r\n\r\n");
        let url = spawn_raw_target(head, b"hi").await;
        let cfg = DispatchConfig::new(2, 2, 1)
            .unwrap()
            .with_response_body(true)
            .with_timeout_seconds(5)
            .unwrap();
        let records = scheduler(cfg)
            .dispatch(RequestDescriptor::get(&url).unwrap())
            .await;

        assert_eq!(records.len(), 2);
        for record in &records {
            assert_eq!(record.state(), AttemptState::Errored, "{length}: {record:?}");
            assert_eq!(record.elapsed_millis, 0);
        }
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn error_statuses_are_still_responses() {
    let server = StubServer::spawn().await.unwrap();
    let desc = RequestDescriptor::get(&server.url("/status/503")).unwrap();
    let records = scheduler(DispatchConfig::new(2, 2, 1).unwrap())
        .dispatch(desc)
        .await;
    assert!(records.iter().all(|r| r.state() == AttemptState::Succeeded
        && r.status() == Some(StatusCode::SERVICE_UNAVAILABLE)));
}

#[tokio::test(flavor = "multi_thread")]
async fn refused_connections_are_errored_records() {
    let desc = RequestDescriptor::get(&refused_url().unwrap()).unwrap();
    let records = scheduler(DispatchConfig::new(3, 3, 2).unwrap())
        .dispatch(desc)
        .await;

    assert_eq!(records.len(), 6);
    for record in &records {
        assert_eq!(record.state(), AttemptState::Errored);
        assert_eq!(record.elapsed_millis, 0);
        assert!(record.response().is_none());
        let failure = record.failure().unwrap();
        assert_eq!(failure.kind, FailureKind::TransportError);
        assert!(!failure.message.is_empty());
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn slow_target_times_out() {
    let server = StubServer::spawn().await.unwrap();
    let desc = RequestDescriptor::get(&server.url("/slow?ms=5000")).unwrap();
    let cfg = DispatchConfig::new(2, 2, 1)
        .unwrap()
        .with_timeout_seconds(1)
        .unwrap();
    let started = std::time::Instant::now();
    let records = scheduler(cfg).dispatch(desc).await;

    assert!(started.elapsed() < Duration::from_secs(4));
    assert_eq!(records.len(), 2);
    for record in &records {
        assert_eq!(record.state(), AttemptState::TimedOut);
        assert_eq!(record.elapsed_millis, 1000);
        assert_eq!(record.failure().unwrap().kind, FailureKind::Timeout);
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn one_shot_dispatch_and_report() {
    let server = StubServer::spawn().await.unwrap();
    let desc = RequestDescriptor::get(&server.url("/api/users")).unwrap();
    let cfg = DispatchConfig::new(2, 1, 1)
        .unwrap()
        .with_correlation_id("report-check");
    let records = dispatch(desc.clone(), cfg).await;
    assert_eq!(records.len(), 2);

    let mut out = Vec::new();
    write_report(&mut out, &desc, &records).unwrap();
    let text = String::from_utf8(out).unwrap();
    assert_eq!(text.lines().count(), 2);
    assert!(text
        .lines()
        .all(|l| l.contains(",200,GET,http://") && l.ends_with(",report-check")));
}
