// tests/fetch_retry.rs
//! HttpFetcher against a throw-away local HTTP server.

use news_digest::ingest::fetch::{FetchError, HttpFetcher, USER_AGENT};
use news_digest::ingest::types::PageFetcher;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

struct Server {
    url: String,
    hits: Arc<AtomicUsize>,
    user_agents: Arc<Mutex<Vec<String>>>,
}

/// Answer the n-th request with `script[n]`; the last entry repeats.
/// `None` means hold the connection open without answering.
async fn serve(script: Vec<Option<u16>>) -> Server {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}/news/", listener.local_addr().unwrap());
    let hits = Arc::new(AtomicUsize::new(0));
    let user_agents = Arc::new(Mutex::new(Vec::new()));

    let (h, ua) = (hits.clone(), user_agents.clone());
    tokio::spawn(async move {
        loop {
            let Ok((mut sock, _)) = listener.accept().await else { return };
            let n = h.fetch_add(1, Ordering::SeqCst);
            let step = script[n.min(script.len() - 1)];
            let ua = ua.clone();
            tokio::spawn(async move {
                let mut buf = vec![0u8; 4096];
                let mut req = Vec::new();
                while !req.windows(4).any(|w| w == b"\r\n\r\n") {
                    match sock.read(&mut buf).await {
                        Ok(0) | Err(_) => return,
                        Ok(k) => req.extend_from_slice(&buf[..k]),
                    }
                }
                let head = String::from_utf8_lossy(&req).to_string();
                for line in head
                    .lines()
                    .filter(|l| l.to_ascii_lowercase().starts_with("user-agent:"))
                {
                    ua.lock().unwrap().push(line[11..].trim().to_string());
                }

                let Some(code) = step else {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    return;
                };
                let body = if code == 200 {
                    r#"<h3 class="title"><a href="/a">Economy grows 6% this quarter</a></h3>"#
                } else {
                    "error"
                };
                let rsp = format!(
                    "HTTP/1.1 {code} X\r\nContent-Type: text/html\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                );
                let _ = sock.write_all(rsp.as_bytes()).await;
                let _ = sock.shutdown().await;
            });
        }
    });

    Server {
        url,
        hits,
        user_agents,
    }
}

fn fetcher() -> HttpFetcher {
    let client = reqwest::Client::builder().no_proxy().build().unwrap();
    HttpFetcher::with_client(client).with_backoff(Duration::from_millis(10))
}

#[tokio::test]
async fn transient_statuses_are_retried_until_success() {
    let srv = serve(vec![Some(503), Some(502), Some(200)]).await;
    let body = fetcher().fetch(&srv.url).await.unwrap();
    assert!(body.contains("Economy grows"));
    assert_eq!(srv.hits.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn rate_limit_is_transient() {
    let srv = serve(vec![Some(429), Some(200)]).await;
    assert!(fetcher().fetch(&srv.url).await.is_ok());
    assert_eq!(srv.hits.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn permanent_status_fails_without_retry() {
    let srv = serve(vec![Some(404)]).await;
    let err = fetcher().fetch(&srv.url).await.unwrap_err();
    assert_eq!(err, FetchError::Status(404));
    assert_eq!(srv.hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn gives_up_after_three_attempts() {
    let srv = serve(vec![Some(503)]).await;
    let err = fetcher().fetch(&srv.url).await.unwrap_err();
    assert_eq!(err, FetchError::Status(503));
    assert_eq!(srv.hits.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn slow_server_times_out() {
    let srv = serve(vec![None]).await;
    let err = fetcher()
        .with_timeout(Duration::from_millis(200))
        .with_retries(2)
        .fetch(&srv.url)
        .await
        .unwrap_err();
    assert_eq!(err, FetchError::Timeout);
    assert_eq!(srv.hits.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn refused_connection_is_a_connect_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let err = fetcher()
        .fetch(&format!("http://{addr}/"))
        .await
        .unwrap_err();
    assert!(matches!(err, FetchError::Connect(_)), "{err:?}");
    assert!(err.is_transient());
}

#[tokio::test]
async fn sends_the_browser_user_agent() {
    let srv = serve(vec![Some(200)]).await;
    fetcher().fetch(&srv.url).await.unwrap();
    assert_eq!(srv.user_agents.lock().unwrap().as_slice(), [USER_AGENT.to_string()]);
}

#[tokio::test]
async fn user_agent_header_appears_once_per_attempt() {
    let srv = serve(vec![Some(503), Some(200)]).await;
    fetcher().fetch(&srv.url).await.unwrap();
    assert_eq!(
        srv.user_agents.lock().unwrap().as_slice(),
        [USER_AGENT.to_string(), USER_AGENT.to_string()]
    );
}
