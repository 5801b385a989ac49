//! End-to-end tests for the chat relay.
//!
//! These tests serve the real application on an ephemeral port and drive it
//! with WebSocket clients:
//! 1. Chat messages reach every connected client, sender included
//! 2. A client that left receives nothing further
//! 3. Bursts reach prompt readers intact, stalled readers are dropped
//! 4. The handshake origin policy is enforced
//! 5. Shutdown closes open sockets

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures::{stream::SplitStream, SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_tungstenite::{
    connect_async,
    tungstenite::{client::IntoClientRequest, Error as WsError, Message},
    MaybeTlsStream, WebSocketStream,
};

use livechat::adapters::websocket::BroadcastHub;
use livechat::config::AppConfig;
use livechat::server::{Server, ServerError};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

// =============================================================================
// Test Infrastructure
// =============================================================================

struct TestServer {
    addr: SocketAddr,
    hub: Arc<BroadcastHub>,
    shutdown: Option<oneshot::Sender<()>>,
    handle: JoinHandle<Result<(), ServerError>>,
}

impl TestServer {
    async fn start() -> Self {
        Self::start_with(AppConfig::default()).await
    }

    async fn start_with(config: AppConfig) -> Self {
        let server = Server::new(config);
        let hub = server.hub();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = oneshot::channel::<()>();

        let handle = tokio::spawn(server.serve(listener, async {
            let _ = rx.await;
        }));

        Self {
            addr,
            hub,
            shutdown: Some(tx),
            handle,
        }
    }

    fn url(&self) -> String {
        format!("ws://{}/ws", self.addr)
    }

    /// Connect and consume the `connected` notice, returning the assigned id.
    async fn connect(&self) -> (Client, String) {
        let (mut client, _) = connect_async(self.url()).await.unwrap();
        let notice = next_event(&mut client).await;
        assert_eq!(notice["event"], "connected");
        let id = notice["data"]["id"].as_str().unwrap().to_string();
        (client, id)
    }

    async fn wait_for_connections(&self, expected: usize) {
        self.wait_for_connections_within(expected, Duration::from_secs(5))
            .await;
    }

    async fn wait_for_connections_within(&self, expected: usize, deadline: Duration) {
        tokio::time::timeout(deadline, async {
            while self.hub.connection_count().await != expected {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("hub did not reach expected connection count");
    }

    async fn stop(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        tokio::time::timeout(Duration::from_secs(5), self.handle)
            .await
            .expect("server did not stop")
            .unwrap()
            .unwrap();
    }
}

async fn send_chat(client: &mut Client, data: Value) {
    let frame = json!({ "event": "chat-message", "data": data });
    client.send(Message::Text(frame.to_string())).await.unwrap();
}

/// Next text frame as JSON, skipping protocol frames.
async fn next_event(client: &mut Client) -> Value {
    let deadline = Duration::from_secs(5);
    loop {
        let message = tokio::time::timeout(deadline, client.next())
            .await
            .expect("timed out waiting for frame")
            .expect("stream ended")
            .unwrap();
        if let Message::Text(text) = message {
            return serde_json::from_str(&text).unwrap();
        }
    }
}

fn chat_frame(data: Value) -> Message {
    Message::Text(json!({ "event": "chat-message", "data": data }).to_string())
}

/// Read until `count` chat messages have arrived, returning their data.
///
/// Panics if the socket closes first.
async fn collect_chat(mut stream: SplitStream<Client>, count: usize) -> Vec<Value> {
    let mut received = Vec::with_capacity(count);
    while received.len() < count {
        let message = tokio::time::timeout(Duration::from_secs(10), stream.next())
            .await
            .expect("timed out waiting for chat message");
        match message {
            Some(Ok(Message::Text(text))) => {
                let event: Value = serde_json::from_str(&text).unwrap();
                if event["event"] == "chat-message" {
                    received.push(event["data"].clone());
                }
            }
            Some(Ok(Message::Close(frame))) => {
                panic!("closed after {} messages: {:?}", received.len(), frame)
            }
            Some(Ok(_)) => {}
            Some(Err(e)) => panic!("socket error after {} messages: {}", received.len(), e),
            None => panic!("stream ended after {} messages", received.len()),
        }
    }
    received
}

/// Assert no text frame arrives within a short window.
async fn assert_silent(client: &mut Client) {
    let result = tokio::time::timeout(Duration::from_millis(200), client.next()).await;
    match result {
        Err(_) => {}
        Ok(Some(Ok(Message::Text(text)))) => panic!("unexpected frame: {}", text),
        Ok(_) => {}
    }
}

// =============================================================================
// Relay
// =============================================================================

#[tokio::test]
async fn hi_reaches_both_then_bye_reaches_remaining_client() {
    let server = TestServer::start().await;
    let (mut c1, _) = server.connect().await;
    let (mut c2, _) = server.connect().await;
    server.wait_for_connections(2).await;

    send_chat(&mut c1, json!({ "text": "hi" })).await;

    let expected = json!({ "event": "chat-message", "data": { "text": "hi" } });
    assert_eq!(next_event(&mut c1).await, expected);
    assert_eq!(next_event(&mut c2).await, expected);

    c2.close(None).await.unwrap();
    server.wait_for_connections(1).await;

    send_chat(&mut c1, json!({ "text": "bye" })).await;

    assert_eq!(
        next_event(&mut c1).await,
        json!({ "event": "chat-message", "data": { "text": "bye" } })
    );

    server.stop().await;
}

#[tokio::test]
async fn lone_client_receives_its_own_message() {
    let server = TestServer::start().await;
    let (mut c1, _) = server.connect().await;

    send_chat(&mut c1, json!("echo")).await;

    assert_eq!(
        next_event(&mut c1).await,
        json!({ "event": "chat-message", "data": "echo" })
    );

    server.stop().await;
}

#[tokio::test]
async fn clients_get_distinct_ids() {
    let server = TestServer::start().await;
    let (_c1, id1) = server.connect().await;
    let (_c2, id2) = server.connect().await;

    assert_ne!(id1, id2);

    server.stop().await;
}

#[tokio::test]
async fn unrecognized_and_malformed_frames_are_ignored() {
    let server = TestServer::start().await;
    let (mut c1, _) = server.connect().await;
    let (mut c2, _) = server.connect().await;
    server.wait_for_connections(2).await;

    c1.send(Message::Text(r#"{"event":"typing","data":{}}"#.to_string()))
        .await
        .unwrap();
    c1.send(Message::Text("not json".to_string())).await.unwrap();
    c1.send(Message::Binary(vec![1, 2, 3])).await.unwrap();
    send_chat(&mut c1, json!({ "n": 1 })).await;

    // The first frame each client sees is the chat message
    assert_eq!(next_event(&mut c2).await["data"], json!({ "n": 1 }));
    assert_eq!(next_event(&mut c1).await["data"], json!({ "n": 1 }));
    assert_eq!(server.hub.connection_count().await, 2);

    server.stop().await;
}

#[tokio::test]
async fn messages_from_one_sender_arrive_in_order() {
    let server = TestServer::start().await;
    let (mut sender, _) = server.connect().await;
    let (mut peer, _) = server.connect().await;
    server.wait_for_connections(2).await;

    for i in 0..20 {
        send_chat(&mut sender, json!(i)).await;
    }

    for i in 0..20 {
        assert_eq!(next_event(&mut peer).await["data"], json!(i));
    }

    server.stop().await;
}

#[tokio::test]
async fn departed_client_receives_nothing_further() {
    let server = TestServer::start().await;
    let (mut stays, _) = server.connect().await;
    let (mut leaves, _) = server.connect().await;
    server.wait_for_connections(2).await;

    leaves.close(None).await.unwrap();
    server.wait_for_connections(1).await;
    send_chat(&mut stays, json!("after")).await;

    assert_eq!(next_event(&mut stays).await["data"], json!("after"));
    assert_silent(&mut leaves).await;

    server.stop().await;
}

// =============================================================================
// Backpressure
// =============================================================================

#[tokio::test]
async fn burst_reaches_prompt_readers_in_order() {
    const BURST: usize = 500;

    let server = TestServer::start().await;
    let (sender, _) = server.connect().await;
    let (peer, _) = server.connect().await;
    server.wait_for_connections(2).await;

    let (mut sender_tx, sender_rx) = sender.split();
    let (_peer_tx, peer_rx) = peer.split();
    let sender_reader = tokio::spawn(collect_chat(sender_rx, BURST));
    let peer_reader = tokio::spawn(collect_chat(peer_rx, BURST));

    for i in 0..BURST {
        sender_tx.send(chat_frame(json!(i))).await.unwrap();
    }

    let expected: Vec<Value> = (0..BURST).map(|i| json!(i)).collect();
    assert_eq!(sender_reader.await.unwrap(), expected);
    assert_eq!(peer_reader.await.unwrap(), expected);
    assert_eq!(server.hub.connection_count().await, 2);

    server.stop().await;
}

#[tokio::test]
async fn stalled_reader_is_dropped_without_affecting_others() {
    let mut config = AppConfig::default();
    config.socket.send_timeout_secs = 1;
    let server = TestServer::start_with(config).await;
    let (talker, talker_id) = server.connect().await;
    // Never read from again
    let (_stalled, _) = server.connect().await;
    server.wait_for_connections(2).await;

    let (mut talker_tx, talker_rx) = talker.split();
    let talker_reader = tokio::spawn(collect_chat(talker_rx, 201));

    // Large frames fill the stalled socket's kernel buffers quickly
    let blob = "x".repeat(256 * 1024);
    for i in 0..200 {
        talker_tx
            .send(chat_frame(json!({ "i": i, "blob": blob.as_str() })))
            .await
            .unwrap();
    }

    server
        .wait_for_connections_within(1, Duration::from_secs(20))
        .await;
    let remaining: Vec<String> = server
        .hub
        .connection_ids()
        .await
        .iter()
        .map(|id| id.to_string())
        .collect();
    assert_eq!(remaining, vec![talker_id]);

    // The talker keeps receiving after the stalled peer is gone
    talker_tx.send(chat_frame(json!("after"))).await.unwrap();
    let received = talker_reader.await.unwrap();
    assert_eq!(received.len(), 201);
    assert_eq!(received[200], json!("after"));

    server.stop().await;
}

// =============================================================================
// Handshake Policy
// =============================================================================

#[tokio::test]
async fn disallowed_origin_is_rejected() {
    let server = TestServer::start().await;
    let mut request = server.url().into_client_request().unwrap();
    request
        .headers_mut()
        .insert("Origin", "http://evil.example.com".parse().unwrap());

    let result = connect_async(request).await;

    match result {
        Err(WsError::Http(response)) => assert_eq!(response.status(), 403),
        other => panic!("expected HTTP 403, got {:?}", other.map(|_| ())),
    }
    assert_eq!(server.hub.connection_count().await, 0);

    server.stop().await;
}

#[tokio::test]
async fn configured_origin_is_accepted() {
    let server = TestServer::start().await;
    let mut request = server.url().into_client_request().unwrap();
    request
        .headers_mut()
        .insert("Origin", "http://localhost:5173".parse().unwrap());

    let (mut client, _) = connect_async(request).await.unwrap();

    assert_eq!(next_event(&mut client).await["event"], "connected");

    server.stop().await;
}

// =============================================================================
// Shutdown
// =============================================================================

#[tokio::test]
async fn shutdown_closes_open_sockets() {
    let server = TestServer::start().await;
    let hub = server.hub.clone();
    let (mut client, _) = server.connect().await;
    server.wait_for_connections(1).await;

    server.stop().await;

    assert_eq!(hub.connection_count().await, 0);
    let ended = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            match client.next().await {
                None | Some(Err(_)) | Some(Ok(Message::Close(_))) => break,
                Some(Ok(_)) => {}
            }
        }
    })
    .await;
    assert!(ended.is_ok(), "socket was not closed on shutdown");
}
