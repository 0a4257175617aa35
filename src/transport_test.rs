use super::*;
use crate::test_support::message_payload;
use tokio::net::TcpListener;
use tokio::time::{Duration, timeout};
use wire::Op;

/// Spawn a scripted websocket peer: acknowledges the handshake, then echoes
/// every publish back as an event on the given topic.
async fn spawn_ws_peer(topic: &'static str) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");

    tokio::spawn(async move {
        let Ok((stream, _)) = listener.accept().await else {
            return;
        };
        let Ok(mut ws) = tokio_tungstenite::accept_async(stream).await else {
            return;
        };

        let mut next_id = 1_i64;
        while let Some(Ok(message)) = ws.next().await {
            let Message::Text(text) = message else {
                continue;
            };
            let Ok(frame) = wire::decode_frame(text.as_str()) else {
                continue;
            };
            match frame.op {
                Op::Connect => {
                    let reply = wire::encode_frame(&Frame::connected());
                    if ws.send(Message::Text(reply.into())).await.is_err() {
                        return;
                    }
                }
                Op::Publish => {
                    let mut payload = message_payload(next_id);
                    payload["content"] =
                        serde_json::json!(frame.content().unwrap_or_default());
                    next_id += 1;
                    let event = wire::encode_frame(&Frame::event(topic, payload));
                    if ws.send(Message::Text(event.into())).await.is_err() {
                        return;
                    }
                }
                _ => {}
            }
        }
    });

    format!("ws://{addr}")
}

#[tokio::test]
async fn ws_conduit_round_trips_frames_over_a_real_socket() {
    let url = spawn_ws_peer("chat.7").await;
    let mut conduit = WsConnector.connect(&url).await.expect("connect");

    conduit
        .send(Frame::connect("token"))
        .await
        .expect("send connect");
    let reply = timeout(Duration::from_secs(1), conduit.recv())
        .await
        .expect("handshake timed out")
        .expect("stream ended")
        .expect("decode");
    assert_eq!(reply.op, Op::Connected);

    conduit
        .send(Frame::publish("chat.7.send", "over the wire"))
        .await
        .expect("send publish");
    let event = timeout(Duration::from_secs(1), conduit.recv())
        .await
        .expect("event timed out")
        .expect("stream ended")
        .expect("decode");
    assert_eq!(event.op, Op::Event);
    assert_eq!(event.topic.as_deref(), Some("chat.7"));
    assert_eq!(
        event.data.get("content").and_then(serde_json::Value::as_str),
        Some("over the wire")
    );
}

#[tokio::test]
async fn ws_connector_reports_failed_dials() {
    // Nothing listens on this port long enough to upgrade.
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);

    let err = WsConnector
        .connect(&format!("ws://{addr}"))
        .await
        .map(|_| ())
        .expect_err("dial should fail");
    assert!(matches!(err, TransportError::Connect(_)));
}

#[tokio::test]
async fn live_channel_runs_over_the_real_websocket_transport() {
    use crate::auth::Credential;
    use crate::channel::{ConnectionStatus, LiveChannel};
    use std::sync::Arc;
    use wire::RoomId;

    let url = spawn_ws_peer("chat.7").await;
    let mut channel = LiveChannel::new(
        Arc::new(WsConnector),
        url,
        RoomId(7),
        std::time::Duration::from_secs(1),
    );

    channel
        .open(&Credential::new("token"))
        .await
        .expect("open");
    assert_eq!(channel.status(), ConnectionStatus::Connected);

    channel.publish("end to end").expect("publish");
    let echoed = timeout(Duration::from_secs(1), channel.next_message())
        .await
        .expect("echo timed out")
        .expect("channel ended");
    assert_eq!(echoed.content, "end to end");

    channel.close();
    assert_eq!(channel.status(), ConnectionStatus::Disconnected);
}
