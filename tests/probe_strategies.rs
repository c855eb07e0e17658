//! Probe strategies against loopback listeners

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use iptv_ranker::{
    errors::ProbeError,
    services::{
        ProbeStrategy,
        stream_prober::{HttpStatusProbe, TcpConnectProbe},
    },
};

const PROBE_TIMEOUT: Duration = Duration::from_secs(2);

/// Read one request head from the socket and return `(method, path)`
async fn read_request(socket: &mut tokio::net::TcpStream) -> (String, String) {
    let mut buf = vec![0u8; 4096];
    let mut read = 0;
    while read < buf.len() {
        match socket.read(&mut buf[read..]).await {
            Ok(0) | Err(_) => break,
            Ok(n) => read += n,
        }
        if buf[..read].windows(4).any(|w| w == b"\r\n\r\n") {
            break;
        }
    }

    let request = String::from_utf8_lossy(&buf[..read]);
    let mut parts = request.split_whitespace();
    let method = parts.next().unwrap_or_default().to_string();
    let path = parts.next().unwrap_or_default().to_string();
    (method, path)
}

/// Minimal HTTP/1.1 responder:
/// `/ok` answers 200, `/no-head` rejects HEAD with 405 and answers GET with 206,
/// `/moved` redirects to `/ok`, everything else is 404.
async fn spawn_http_server() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                break;
            };
            tokio::spawn(async move {
                let (method, path) = read_request(&mut socket).await;

                let (status, extra) = match (method.as_str(), path.as_str()) {
                    (_, "/ok") => ("200 OK", ""),
                    ("HEAD", "/no-head") => ("405 Method Not Allowed", ""),
                    ("GET", "/no-head") => ("206 Partial Content", ""),
                    (_, "/moved") => ("302 Found", "Location: /ok\r\n"),
                    _ => ("404 Not Found", ""),
                };
                let response = format!(
                    "HTTP/1.1 {status}\r\n{extra}Content-Length: 0\r\nConnection: close\r\n\r\n"
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    addr
}

/// Accepts connections, reads the request and hangs up without answering.
/// Returns the address and a counter of accepted connections.
async fn spawn_hangup_server() -> (SocketAddr, Arc<AtomicUsize>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let accepted = Arc::new(AtomicUsize::new(0));

    let counter = accepted.clone();
    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            counter.fetch_add(1, Ordering::SeqCst);
            tokio::spawn(async move {
                let _ = read_request(&mut socket).await;
                drop(socket);
            });
        }
    });

    (addr, accepted)
}

#[tokio::test]
async fn test_tcp_probe_reaches_open_port() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    let outcome = TcpConnectProbe::new()
        .probe(&format!("udp://@127.0.0.1:{port}"), PROBE_TIMEOUT)
        .await;
    assert!(outcome.is_success(), "unexpected outcome {outcome:?}");
    assert!(outcome.latency_millis().is_finite());
}

#[tokio::test]
async fn test_tcp_probe_reports_refused_connection() {
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap().port()
    };

    let outcome = TcpConnectProbe::new()
        .probe(&format!("http://127.0.0.1:{port}/live"), PROBE_TIMEOUT)
        .await;
    assert!(!outcome.is_success());
    assert!(outcome.latency_millis().is_infinite());
}

#[tokio::test]
async fn test_tcp_probe_gives_up_on_unroutable_host_within_timeout() {
    let timeout = Duration::from_millis(200);
    let started = Instant::now();

    let outcome = TcpConnectProbe::new()
        .probe("rtp://10.255.255.1:81", timeout)
        .await;

    // a blackholed route times out; a host without any route fails fast
    assert!(
        matches!(
            outcome.failure(),
            Some(ProbeError::TimedOut) | Some(ProbeError::Connect(_))
        ),
        "unexpected outcome {outcome:?}"
    );
    assert!(outcome.latency_millis().is_infinite());
    assert!(started.elapsed() < timeout + Duration::from_millis(300));
}

#[tokio::test]
async fn test_tcp_probe_rejects_url_without_host() {
    let outcome = TcpConnectProbe::new()
        .probe("not a url", PROBE_TIMEOUT)
        .await;
    assert!(matches!(outcome.failure(), Some(ProbeError::InvalidUrl(_))));
}

#[tokio::test]
async fn test_http_probe_accepts_success_status() {
    let addr = spawn_http_server().await;
    let probe = HttpStatusProbe::new("iptv-ranker-test").unwrap();

    let outcome = probe.probe(&format!("http://{addr}/ok"), PROBE_TIMEOUT).await;
    assert!(outcome.is_success(), "unexpected outcome {outcome:?}");
}

#[tokio::test]
async fn test_http_probe_reports_error_status() {
    let addr = spawn_http_server().await;
    let probe = HttpStatusProbe::new("iptv-ranker-test").unwrap();

    let outcome = probe
        .probe(&format!("http://{addr}/missing"), PROBE_TIMEOUT)
        .await;
    assert_eq!(outcome.failure(), Some(&ProbeError::HttpStatus(404)));
}

#[tokio::test]
async fn test_http_probe_falls_back_to_ranged_get() {
    let addr = spawn_http_server().await;
    let probe = HttpStatusProbe::new("iptv-ranker-test").unwrap();

    let outcome = probe
        .probe(&format!("http://{addr}/no-head"), PROBE_TIMEOUT)
        .await;
    assert!(outcome.is_success(), "unexpected outcome {outcome:?}");
}

#[tokio::test]
async fn test_http_probe_follows_redirects() {
    let addr = spawn_http_server().await;
    let probe = HttpStatusProbe::new("iptv-ranker-test").unwrap();

    let outcome = probe
        .probe(&format!("http://{addr}/moved"), PROBE_TIMEOUT)
        .await;
    assert!(outcome.is_success(), "unexpected outcome {outcome:?}");
}

#[tokio::test]
async fn test_http_probe_opens_one_connection_when_head_fails() {
    let (addr, accepted) = spawn_hangup_server().await;
    let probe = HttpStatusProbe::new("iptv-ranker-test").unwrap();

    let outcome = probe
        .probe(&format!("http://{addr}/live"), PROBE_TIMEOUT)
        .await;
    assert!(!outcome.is_success());
    assert!(!matches!(outcome.failure(), Some(ProbeError::TimedOut)));

    // give a stray second request time to arrive before counting
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(accepted.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_http_probe_rejects_multicast_scheme() {
    let probe = HttpStatusProbe::new("iptv-ranker-test").unwrap();
    let outcome = probe.probe("rtp://239.1.1.1:5000", PROBE_TIMEOUT).await;
    assert!(matches!(
        outcome.failure(),
        Some(ProbeError::UnsupportedScheme(_))
    ));
}
