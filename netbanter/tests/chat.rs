use std::net::SocketAddr;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use netbanter::config::{ServerConfig, ServerConfigCli};
use netbanter::server::{BanterServer, ServerHandle};
use serde_json::{json, Value};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn start_server_with(
    cli: ServerConfigCli,
) -> (SocketAddr, ServerHandle, JoinHandle<netbanter::error::Result<()>>) {
    let cli = ServerConfigCli {
        bind: Some("127.0.0.1:0".to_string()),
        config: Some("banter-test-missing.toml".to_string()),
        ..cli
    };
    let config = ServerConfig::new(&cli).unwrap();
    let server = BanterServer::setup(config).await.unwrap();
    let addr = server.local_addr().unwrap();
    let handle = server.handle();
    let join = tokio::spawn(server.run());
    (addr, handle, join)
}

async fn start_server() -> (SocketAddr, ServerHandle, JoinHandle<netbanter::error::Result<()>>) {
    start_server_with(ServerConfigCli::default()).await
}

async fn participants(addr: SocketAddr) -> u64 {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream
        .write_all(b"GET /health HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
        .await
        .unwrap();
    let mut response = String::new();
    stream.read_to_string(&mut response).await.unwrap();
    assert!(response.starts_with("HTTP/1.1 200"));
    let (_, body) = response.split_once("\r\n\r\n").unwrap();
    let body: Value = serde_json::from_str(body).unwrap();
    assert_eq!(body["status"], "ok");
    body["participants"].as_u64().unwrap()
}

async fn connect(addr: SocketAddr) -> Client {
    let (client, _) = connect_async(format!("ws://{}/ws", addr)).await.unwrap();
    client
}

async fn send(client: &mut Client, frame: Value) {
    client.send(Message::text(frame.to_string())).await.unwrap();
}

async fn next_event(client: &mut Client) -> Value {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(5), client.next())
            .await
            .expect("timed out waiting for an event")
            .expect("connection ended")
            .unwrap();
        if let Message::Text(text) = msg {
            return serde_json::from_str(text.as_str()).unwrap();
        }
    }
}

async fn expect_closed(client: &mut Client) {
    loop {
        match tokio::time::timeout(Duration::from_secs(5), client.next())
            .await
            .expect("timed out waiting for close")
        {
            None | Some(Err(_)) | Some(Ok(Message::Close(_))) => return,
            Some(Ok(Message::Text(text))) => panic!("unexpected event {}", text.as_str()),
            Some(Ok(_)) => {}
        }
    }
}

#[tokio::test]
async fn test_chat_lifecycle() {
    let (addr, handle, join) = start_server().await;

    let mut bob = connect(addr).await;
    send(&mut bob, json!({"type": "identify", "name": "bob"})).await;
    assert_eq!(
        next_event(&mut bob).await,
        json!({"type": "user_joined", "name": "bob"})
    );

    let mut alice = connect(addr).await;
    send(&mut alice, json!({"type": "identify", "name": "alice"})).await;
    let joined = json!({"type": "user_joined", "name": "alice"});
    assert_eq!(next_event(&mut alice).await, joined);
    assert_eq!(next_event(&mut bob).await, joined);

    send(&mut alice, json!({"type": "chat_message", "text": "hello"})).await;
    let hello = json!({"type": "chat_message", "text": "alice: hello"});
    assert_eq!(next_event(&mut alice).await, hello);
    assert_eq!(next_event(&mut bob).await, hello);

    alice.close(None).await.unwrap();
    assert_eq!(
        next_event(&mut bob).await,
        json!({"type": "user_left", "name": "alice"})
    );

    handle.shutdown();
    join.await.unwrap().unwrap();
    expect_closed(&mut bob).await;
}

#[tokio::test]
async fn test_anonymous_peer_is_never_announced() {
    let (addr, handle, join) = start_server().await;

    let mut bob = connect(addr).await;
    send(&mut bob, json!({"type": "identify", "name": "bob"})).await;
    next_event(&mut bob).await;

    let mut ghost = connect(addr).await;
    send(&mut ghost, json!({"type": "identify", "name": "   "})).await;
    ghost.close(None).await.unwrap();

    // The next thing bob sees is his own message, not a join or leave
    send(&mut bob, json!({"type": "chat_message", "text": "anyone?"})).await;
    assert_eq!(
        next_event(&mut bob).await,
        json!({"type": "chat_message", "text": "bob: anyone?"})
    );

    handle.shutdown();
    join.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_malformed_event_closes_only_sender() {
    let (addr, handle, join) = start_server().await;

    let mut bob = connect(addr).await;
    send(&mut bob, json!({"type": "identify", "name": "bob"})).await;
    next_event(&mut bob).await;

    let mut mallory = connect(addr).await;
    send(&mut mallory, json!({"type": "identify", "name": "mallory"})).await;
    next_event(&mut mallory).await;
    next_event(&mut bob).await;

    mallory.send(Message::text("not an event")).await.unwrap();
    expect_closed(&mut mallory).await;
    assert_eq!(
        next_event(&mut bob).await,
        json!({"type": "user_left", "name": "mallory"})
    );

    send(&mut bob, json!({"type": "chat_message", "text": "still here"})).await;
    assert_eq!(
        next_event(&mut bob).await,
        json!({"type": "chat_message", "text": "bob: still here"})
    );

    handle.shutdown();
    join.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_health_reports_participants() {
    let (addr, handle, join) = start_server().await;

    let mut alice = connect(addr).await;
    send(&mut alice, json!({"type": "identify", "name": "alice"})).await;
    next_event(&mut alice).await;

    assert_eq!(participants(addr).await, 1);

    handle.shutdown();
    join.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_slow_reader_is_disconnected_and_announced() {
    let (addr, handle, join) = start_server_with(ServerConfigCli {
        outbound_queue_capacity: Some(2),
        ..Default::default()
    })
    .await;

    let mut alice = connect(addr).await;
    send(&mut alice, json!({"type": "identify", "name": "alice"})).await;
    next_event(&mut alice).await;

    // Never read from again, so its socket buffers and then its queue fill up
    let mut slow = connect(addr).await;
    send(&mut slow, json!({"type": "identify", "name": "slow"})).await;
    assert_eq!(
        next_event(&mut alice).await,
        json!({"type": "user_joined", "name": "slow"})
    );
    assert_eq!(participants(addr).await, 2);

    let filler = "x".repeat(32 * 1024);
    let mut left = false;
    for i in 0..4096 {
        let text = format!("{} {}", i, filler);
        send(&mut alice, json!({"type": "chat_message", "text": text})).await;
        let echo = json!({"type": "chat_message", "text": format!("alice: {}", text)});
        loop {
            let event = next_event(&mut alice).await;
            if event == echo {
                break;
            }
            assert_eq!(event, json!({"type": "user_left", "name": "slow"}));
            assert!(!left, "slow peer announced twice");
            left = true;
        }
        if left {
            break;
        }
    }
    assert!(left, "slow peer was never disconnected");
    assert_eq!(participants(addr).await, 1);

    send(&mut alice, json!({"type": "chat_message", "text": "bye"})).await;
    assert_eq!(
        next_event(&mut alice).await,
        json!({"type": "chat_message", "text": "alice: bye"})
    );

    drop(slow);
    handle.shutdown();
    join.await.unwrap().unwrap();
}
