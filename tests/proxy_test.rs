//! Proxy tests
//!
//! End-to-end tests of the fixed TCP proxy over loopback, with a plain TCP
//! dialer standing in for SSH.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

use tcp_over_ssh::proxy::{dialer_fn, Proxy, RemoteDialer};
use tcp_over_ssh::{ProxyError, SshClientConfig};

const TEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Start a TCP echo server and return its address
async fn start_echo_server() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((mut stream, _)) = listener.accept().await {
            tokio::spawn(async move {
                let (mut reader, mut writer) = stream.split();
                let _ = tokio::io::copy(&mut reader, &mut writer).await;
            });
        }
    });

    addr
}

/// Dialer that connects directly over TCP
fn tcp_dialer() -> Arc<dyn RemoteDialer> {
    Arc::new(dialer_fn(|addr: String| async move {
        TcpStream::connect(addr).await.map_err(ProxyError::from)
    }))
}

async fn start_proxy(token: &CancellationToken, remote: SocketAddr) -> Proxy {
    Proxy::bind(token, "127.0.0.1:0", &remote.to_string(), tcp_dialer())
        .await
        .expect("Failed to start proxy")
}

async fn round_trip(client: &mut TcpStream, payload: &[u8]) -> Vec<u8> {
    client.write_all(payload).await.unwrap();
    let mut buf = vec![0u8; payload.len()];
    timeout(TEST_TIMEOUT, client.read_exact(&mut buf))
        .await
        .expect("Timed out waiting for echo")
        .unwrap();
    buf
}

/// Poll until `cond` holds or the test timeout expires
async fn wait_until(cond: impl Fn() -> bool) {
    timeout(TEST_TIMEOUT, async {
        while !cond() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("Condition not reached in time");
}

/// Read until the peer closes; a reset counts as closed
async fn expect_closed(client: &mut TcpStream) {
    let mut buf = Vec::new();
    let result = timeout(TEST_TIMEOUT, client.read_to_end(&mut buf))
        .await
        .expect("Connection was not closed");
    if let Ok(n) = result {
        assert_eq!(n, 0, "Unexpected data: {:?}", &buf);
    }
}

#[tokio::test]
async fn test_ping_echo() {
    let token = CancellationToken::new();
    let echo = start_echo_server().await;
    let proxy = start_proxy(&token, echo).await;

    let mut client = TcpStream::connect(proxy.local_addr()).await.unwrap();
    assert_eq!(round_trip(&mut client, b"ping").await, b"ping");

    token.cancel();
    timeout(TEST_TIMEOUT, proxy.wait()).await.expect("wait() did not return");
}

#[tokio::test]
async fn test_large_transfer() {
    let token = CancellationToken::new();
    let echo = start_echo_server().await;
    let proxy = start_proxy(&token, echo).await;

    // Several times the pump buffer
    let payload: Vec<u8> = (0..300_000u32).map(|i| (i % 251) as u8).collect();

    let client = TcpStream::connect(proxy.local_addr()).await.unwrap();
    let (mut reader, mut writer) = client.into_split();
    let expected = payload.clone();
    let sender = tokio::spawn(async move {
        writer.write_all(&payload).await.unwrap();
        writer
    });

    let mut received = vec![0u8; expected.len()];
    timeout(TEST_TIMEOUT, reader.read_exact(&mut received))
        .await
        .expect("Timed out reading echo")
        .unwrap();
    assert_eq!(received, expected);
    drop(sender.await.unwrap());

    token.cancel();
    timeout(TEST_TIMEOUT, proxy.wait()).await.expect("wait() did not return");
}

#[tokio::test]
async fn test_concurrent_sessions() {
    let token = CancellationToken::new();
    let echo = start_echo_server().await;
    let proxy = Arc::new(start_proxy(&token, echo).await);

    let mut tasks = Vec::new();
    for i in 0..8 {
        let addr = proxy.local_addr();
        tasks.push(tokio::spawn(async move {
            let mut client = TcpStream::connect(addr).await.unwrap();
            let payload = format!("session {}", i);
            let echoed = round_trip(&mut client, payload.as_bytes()).await;
            assert_eq!(echoed, payload.as_bytes());
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    // Every client was dropped, so every leg is eventually deregistered
    wait_until(|| proxy.live_legs() == 0).await;

    token.cancel();
    timeout(TEST_TIMEOUT, proxy.wait()).await.expect("wait() did not return");
}

#[tokio::test]
async fn test_failed_dial_does_not_stop_proxy() {
    let token = CancellationToken::new();
    let echo = start_echo_server().await;
    let attempts = Arc::new(AtomicUsize::new(0));

    let counter = Arc::clone(&attempts);
    let dialer = dialer_fn(move |addr: String| {
        let attempt = counter.fetch_add(1, Ordering::SeqCst);
        async move {
            if attempt == 0 {
                return Err(ProxyError::Dial("first attempt refused".to_string()));
            }
            TcpStream::connect(addr).await.map_err(ProxyError::from)
        }
    });
    let proxy = Proxy::bind(&token, "127.0.0.1:0", &echo.to_string(), Arc::new(dialer))
        .await
        .unwrap();

    // First client is dropped without any data
    let mut first = TcpStream::connect(proxy.local_addr()).await.unwrap();
    expect_closed(&mut first).await;

    // Second client is served
    let mut second = TcpStream::connect(proxy.local_addr()).await.unwrap();
    assert_eq!(round_trip(&mut second, b"ping").await, b"ping");
    assert_eq!(attempts.load(Ordering::SeqCst), 2);

    token.cancel();
    timeout(TEST_TIMEOUT, proxy.wait()).await.expect("wait() did not return");
}

#[tokio::test]
async fn test_cancel_closes_all_sessions() {
    let token = CancellationToken::new();
    let echo = start_echo_server().await;
    let proxy = start_proxy(&token, echo).await;

    let mut clients = Vec::new();
    for _ in 0..4 {
        let mut client = TcpStream::connect(proxy.local_addr()).await.unwrap();
        assert_eq!(round_trip(&mut client, b"hello").await, b"hello");
        clients.push(client);
    }
    wait_until(|| proxy.live_legs() == 8).await;

    token.cancel();
    timeout(TEST_TIMEOUT, proxy.wait()).await.expect("wait() did not return");

    assert_eq!(proxy.live_legs(), 0);
    for client in &mut clients {
        expect_closed(client).await;
    }
    assert!(TcpStream::connect(proxy.local_addr()).await.is_err());
}

#[tokio::test]
async fn test_close_and_wait_lets_sessions_finish() {
    let token = CancellationToken::new();
    let echo = start_echo_server().await;
    let proxy = Arc::new(start_proxy(&token, echo).await);
    let addr = proxy.local_addr();

    let mut client = TcpStream::connect(addr).await.unwrap();
    assert_eq!(round_trip(&mut client, b"before").await, b"before");

    let closer = {
        let proxy = Arc::clone(&proxy);
        tokio::spawn(async move { proxy.close_and_wait().await })
    };

    // The listener goes away
    timeout(TEST_TIMEOUT, async {
        while TcpStream::connect(addr).await.is_ok() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("Listener still accepting");

    // The established session keeps working
    assert_eq!(round_trip(&mut client, b"after").await, b"after");
    assert!(!closer.is_finished());

    // Ending the last session completes close_and_wait
    drop(client);
    timeout(TEST_TIMEOUT, closer).await.expect("close_and_wait() did not return").unwrap();
    assert_eq!(proxy.live_legs(), 0);
}

#[tokio::test]
async fn test_client_eof_ends_session() {
    let token = CancellationToken::new();
    let echo = start_echo_server().await;
    let proxy = start_proxy(&token, echo).await;

    let mut client = TcpStream::connect(proxy.local_addr()).await.unwrap();
    assert_eq!(round_trip(&mut client, b"ping").await, b"ping");

    client.shutdown().await.unwrap();
    expect_closed(&mut client).await;
    wait_until(|| proxy.live_legs() == 0).await;

    token.cancel();
    timeout(TEST_TIMEOUT, proxy.wait()).await.expect("wait() did not return");
}

#[tokio::test]
async fn test_remote_close_reaches_client() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let remote = listener.local_addr().unwrap();
    tokio::spawn(async move {
        if let Ok((mut stream, _)) = listener.accept().await {
            let _ = stream.write_all(b"bye").await;
        }
    });

    let token = CancellationToken::new();
    let proxy = start_proxy(&token, remote).await;

    let mut client = TcpStream::connect(proxy.local_addr()).await.unwrap();
    let mut received = Vec::new();
    timeout(TEST_TIMEOUT, client.read_to_end(&mut received))
        .await
        .expect("Session did not end")
        .unwrap();
    assert_eq!(received, b"bye");

    token.cancel();
    timeout(TEST_TIMEOUT, proxy.wait()).await.expect("wait() did not return");
}

#[tokio::test]
async fn test_half_closed_client_receives_response() {
    // The remote answers only after the request is complete
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let remote = listener.local_addr().unwrap();
    tokio::spawn(async move {
        if let Ok((mut stream, _)) = listener.accept().await {
            let mut request = Vec::new();
            stream.read_to_end(&mut request).await.unwrap();
            assert_eq!(request, b"request");
            stream.write_all(b"response").await.unwrap();
        }
    });

    let token = CancellationToken::new();
    let proxy = start_proxy(&token, remote).await;

    let mut client = TcpStream::connect(proxy.local_addr()).await.unwrap();
    client.write_all(b"request").await.unwrap();
    client.shutdown().await.unwrap();

    let mut received = Vec::new();
    timeout(TEST_TIMEOUT, client.read_to_end(&mut received))
        .await
        .expect("Session did not end")
        .unwrap();
    assert_eq!(received, b"response");
    wait_until(|| proxy.live_legs() == 0).await;

    token.cancel();
    timeout(TEST_TIMEOUT, proxy.wait()).await.expect("wait() did not return");
}

#[tokio::test]
async fn test_cancel_abandons_pending_dial() {
    let token = CancellationToken::new();
    let dials = Arc::new(AtomicUsize::new(0));

    let counter = Arc::clone(&dials);
    let dialer = dialer_fn(move |_addr: String| {
        counter.fetch_add(1, Ordering::SeqCst);
        futures::future::pending::<tcp_over_ssh::Result<TcpStream>>()
    });
    let proxy = Proxy::bind(&token, "127.0.0.1:0", "intranet:6379", Arc::new(dialer))
        .await
        .unwrap();

    let mut client = TcpStream::connect(proxy.local_addr()).await.unwrap();
    wait_until(|| dials.load(Ordering::SeqCst) == 1).await;

    token.cancel();
    timeout(TEST_TIMEOUT, proxy.wait()).await.expect("wait() did not return");

    assert_eq!(proxy.live_legs(), 0);
    expect_closed(&mut client).await;
}

#[tokio::test]
async fn test_shared_parent_token() {
    let parent = CancellationToken::new();
    let echo = start_echo_server().await;
    let first = start_proxy(&parent, echo).await;
    let second = start_proxy(&parent, echo).await;

    // Cancelling one proxy leaves the other running
    first.cancel();
    timeout(TEST_TIMEOUT, first.wait()).await.expect("wait() did not return");

    let mut client = TcpStream::connect(second.local_addr()).await.unwrap();
    assert_eq!(round_trip(&mut client, b"ping").await, b"ping");

    parent.cancel();
    timeout(TEST_TIMEOUT, second.wait()).await.expect("wait() did not return");
    expect_closed(&mut client).await;
}

#[tokio::test]
async fn test_bind_over_ssh_without_credentials() {
    let token = CancellationToken::new();
    let ssh = SshClientConfig {
        user: "root".to_string(),
        host: "127.0.0.1".to_string(),
        keys: vec!["/nonexistent/id_ed25519".into()],
        ..Default::default()
    };

    let result = Proxy::bind_over_ssh(&token, "127.0.0.1:0", "redis:6379", ssh).await;
    assert!(matches!(result, Err(ProxyError::Dialer(_))));
}
