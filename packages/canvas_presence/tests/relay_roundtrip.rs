//! End-to-end runs against a minimal relay over loopback.

use futures::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tokio_tungstenite::tungstenite::Message;

use canvas_presence::{ChannelConfig, ConnectionState, PresenceChannel};
use presence_core::OutboundMessage;

const WAIT: Duration = Duration::from_secs(5);

fn fast_config(endpoint: String) -> ChannelConfig {
    ChannelConfig {
        endpoint,
        reconnect_delay: Duration::from_millis(100),
        emit_interval: Duration::from_millis(20),
        min_send_interval: Duration::from_millis(20),
        ..ChannelConfig::default()
    }
}

/// Relays every pointer report to all clients, tagged with a per-connection source.
fn spawn_relay(listener: TcpListener) -> tokio::task::JoinHandle<()> {
    let (tx, _) = broadcast::channel::<String>(256);
    tokio::spawn(async move {
        let mut next_id = 0u32;
        while let Ok((stream, _)) = listener.accept().await {
            next_id += 1;
            tokio::spawn(serve(stream, format!("client-{next_id}"), tx.clone()));
        }
    })
}

async fn serve(stream: TcpStream, source: String, tx: broadcast::Sender<String>) {
    let Ok(ws) = tokio_tungstenite::accept_async(stream).await else {
        return;
    };
    let (mut write, mut read) = ws.split();
    let mut rx = tx.subscribe();

    loop {
        tokio::select! {
            msg = read.next() => match msg {
                Some(Ok(Message::Text(text))) => {
                    if let Ok(OutboundMessage::MouseMove { x, y, .. }) = serde_json::from_str(text.as_str()) {
                        let relayed = serde_json::json!({
                            "status": "success",
                            "x": x,
                            "y": y,
                            "source": source,
                        });
                        let _ = tx.send(relayed.to_string());
                    }
                }
                Some(Ok(_)) => {}
                _ => break,
            },
            relayed = rx.recv() => match relayed {
                Ok(text) => {
                    if write.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(_)) => {}
                Err(_) => break,
            },
        }
    }
}

async fn wait_connected(channel: &PresenceChannel) {
    tokio::time::timeout(
        WAIT,
        channel
            .watch_state()
            .wait_for(|s| *s == ConnectionState::Connected),
    )
    .await
    .expect("timed out waiting for connection")
    .expect("channel alive");
}

#[tokio::test]
async fn two_clients_see_each_other() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let endpoint = format!("ws://{}", listener.local_addr().unwrap());
    let relay = spawn_relay(listener);

    let alice = PresenceChannel::connect(fast_config(endpoint.clone()));
    let bob = PresenceChannel::connect(fast_config(endpoint));
    wait_connected(&alice).await;
    wait_connected(&bob).await;

    alice.move_pointer(100, 200);
    bob.move_pointer(300, 400);

    let seen = tokio::time::timeout(
        WAIT,
        alice.watch_presence().wait_for(|snap| {
            snap.entries.len() == 2
                && snap.entries.iter().any(|e| (e.x, e.y) == (100, 200))
                && snap.entries.iter().any(|e| (e.x, e.y) == (300, 400))
        }),
    )
    .await
    .expect("timed out waiting for presence")
    .expect("channel alive")
    .clone();

    // one entry per connection, never duplicated
    let mut sources: Vec<&str> = seen.entries.iter().map(|e| e.source.as_str()).collect();
    sources.dedup();
    assert_eq!(sources.len(), 2);

    alice.teardown().await;
    bob.teardown().await;
    relay.abort();
}

#[tokio::test]
async fn reconnects_when_relay_appears() {
    // reserve a port, then leave it closed
    let probe = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = probe.local_addr().unwrap();
    drop(probe);

    let channel = PresenceChannel::connect(fast_config(format!("ws://{addr}")));
    tokio::time::sleep(Duration::from_millis(250)).await;
    assert_ne!(channel.current_state(), ConnectionState::Connected);
    assert!(!channel.is_sendable());

    let listener = TcpListener::bind(addr).await.unwrap();
    let relay = spawn_relay(listener);

    wait_connected(&channel).await;
    assert!(channel.is_sendable());

    channel.teardown().await;
    relay.abort();
}

#[tokio::test]
async fn relay_shutdown_drops_to_disconnected() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let endpoint = format!("ws://{}", listener.local_addr().unwrap());
    let (stream_tx, mut stream_rx) = tokio::sync::mpsc::channel(1);
    let acceptor = tokio::spawn(async move {
        if let Ok((stream, _)) = listener.accept().await {
            if let Ok(ws) = tokio_tungstenite::accept_async(stream).await {
                let _ = stream_tx.send(ws).await;
            }
        }
    });

    let channel = PresenceChannel::connect(fast_config(endpoint));
    wait_connected(&channel).await;

    let mut server_side = stream_rx.recv().await.expect("accepted connection");
    server_side.close(None).await.unwrap();

    tokio::time::timeout(
        WAIT,
        channel
            .watch_state()
            .wait_for(|s| *s != ConnectionState::Connected),
    )
    .await
    .expect("timed out waiting for disconnect")
    .expect("channel alive");

    channel.teardown().await;
    acceptor.abort();
}
