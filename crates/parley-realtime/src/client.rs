use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use parley_core::{ClientEvent, ServerEvent};
use serde_json::{Value, json};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use url::Url;

use crate::error::{Error, Result};
use crate::packet::{EnginePacket, SocketPacket, refusal_message};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// A connected realtime session.
///
/// The socket is split into a reader task, which decodes incoming frames
/// into [`ServerEvent`]s and answers pings, and a writer task, which drains
/// the outgoing frame queue. Dropping the client tears both down.
#[derive(Debug)]
pub struct RealtimeClient {
    outgoing: mpsc::UnboundedSender<String>,
    events: mpsc::UnboundedReceiver<ServerEvent>,
    reader: Option<JoinHandle<()>>,
    writer: Option<JoinHandle<()>>,
}

impl RealtimeClient {
    /// Opens the WebSocket, completes the Engine.IO and Socket.IO handshakes
    /// and starts the background tasks. `token` is sent as the Socket.IO
    /// auth payload.
    pub async fn connect(server_url: &str, token: Option<&str>) -> Result<Self> {
        let url = socket_url(server_url)?;
        tracing::debug!(url = %url, "connecting realtime socket");
        let (mut socket, _) = connect_async(url.as_str()).await?;

        let early_events = handshake(&mut socket, token).await?;

        let (outgoing_tx, outgoing_rx) = mpsc::unbounded_channel::<String>();
        let (event_tx, event_rx) = mpsc::unbounded_channel::<ServerEvent>();
        for event in early_events {
            let _ = event_tx.send(event);
        }

        let (sink, stream) = socket.split();
        let writer = tokio::spawn(write_frames(sink, outgoing_rx));
        let reader = tokio::spawn(read_frames(stream, outgoing_tx.clone(), event_tx));

        Ok(Self {
            outgoing: outgoing_tx,
            events: event_rx,
            reader: Some(reader),
            writer: Some(writer),
        })
    }

    pub fn emit(&self, event: &ClientEvent) -> Result<()> {
        let frame = SocketPacket::event(event.name(), event.payload()?).to_frame()?;
        tracing::debug!(event = event.name(), "emitting realtime event");
        self.outgoing.send(frame).map_err(|_| Error::Closed)
    }

    /// Next decoded server event. `None` once the connection is gone.
    pub async fn next_event(&mut self) -> Option<ServerEvent> {
        self.events.recv().await
    }

    /// Sends a Socket.IO disconnect and stops the background tasks.
    pub async fn close(mut self) {
        if let Ok(frame) = SocketPacket::Disconnect.to_frame() {
            let _ = self.outgoing.send(frame);
        }
        let _ = self.outgoing.send(EnginePacket::Close.encode());
        if let Some(reader) = self.reader.take() {
            reader.abort();
            let _ = reader.await;
        }
        if let Some(writer) = self.writer.take() {
            let _ = writer.await;
        }
    }
}

impl Drop for RealtimeClient {
    fn drop(&mut self) {
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
        if let Some(writer) = self.writer.take() {
            writer.abort();
        }
    }
}

/// Maps an http(s) server address onto its Socket.IO WebSocket endpoint.
pub(crate) fn socket_url(server_url: &str) -> Result<Url> {
    let mut url = Url::parse(server_url)?;
    let scheme = match url.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => return Err(Error::UnsupportedScheme(other.to_string())),
    };
    url.set_scheme(scheme)
        .map_err(|_| Error::UnsupportedScheme(scheme.to_string()))?;
    url.set_path("/socket.io/");
    url.set_query(Some("EIO=4&transport=websocket"));
    Ok(url)
}

async fn handshake(socket: &mut Socket, token: Option<&str>) -> Result<Vec<ServerEvent>> {
    let mut early_events = Vec::new();
    let mut opened = false;

    while let Some(message) = socket.next().await {
        let text = match message? {
            Message::Text(text) => text,
            Message::Close(_) => return Err(Error::Closed),
            _ => continue,
        };

        match EnginePacket::decode(&text)? {
            EnginePacket::Open(info) => {
                tracing::debug!(%info, "engine.io session opened");
                opened = true;
                let auth = token.map(|token| json!({ "token": token }));
                socket
                    .send(Message::Text(SocketPacket::Connect(auth).to_frame()?))
                    .await?;
            }
            EnginePacket::Ping(payload) => {
                socket
                    .send(Message::Text(EnginePacket::Pong(payload).encode()))
                    .await?;
            }
            EnginePacket::Message(payload) if opened => match SocketPacket::decode(&payload)? {
                SocketPacket::Connect(_) => return Ok(early_events),
                SocketPacket::ConnectError(data) => {
                    return Err(Error::Refused(refusal_message(&data)));
                }
                SocketPacket::Disconnect => return Err(Error::Closed),
                SocketPacket::Event { name, data } => {
                    if let Some(event) = to_server_event(&name, data) {
                        early_events.push(event);
                    }
                }
            },
            EnginePacket::Close => return Err(Error::Closed),
            other => tracing::debug!(?other, "ignoring packet during handshake"),
        }
    }

    Err(Error::Closed)
}

async fn write_frames(
    mut sink: SplitSink<Socket, Message>,
    mut outgoing: mpsc::UnboundedReceiver<String>,
) {
    while let Some(frame) = outgoing.recv().await {
        let closing = frame == EnginePacket::Close.encode();
        if let Err(err) = sink.send(Message::Text(frame)).await {
            tracing::debug!(error = %err, "realtime writer stopped");
            break;
        }
        if closing {
            let _ = sink.close().await;
            break;
        }
    }
}

async fn read_frames(
    mut stream: SplitStream<Socket>,
    outgoing: mpsc::UnboundedSender<String>,
    events: mpsc::UnboundedSender<ServerEvent>,
) {
    while let Some(message) = stream.next().await {
        let text = match message {
            Ok(Message::Text(text)) => text,
            Ok(Message::Close(_)) => break,
            Ok(_) => continue,
            Err(err) => {
                tracing::warn!(error = %err, "realtime connection failed");
                break;
            }
        };

        let packet = match EnginePacket::decode(&text) {
            Ok(packet) => packet,
            Err(err) => {
                tracing::warn!(error = %err, "dropping malformed frame");
                continue;
            }
        };

        match packet {
            EnginePacket::Ping(payload) => {
                if outgoing.send(EnginePacket::Pong(payload).encode()).is_err() {
                    break;
                }
            }
            EnginePacket::Message(payload) => match SocketPacket::decode(&payload) {
                Ok(SocketPacket::Event { name, data }) => {
                    if let Some(event) = to_server_event(&name, data)
                        && events.send(event).is_err()
                    {
                        break;
                    }
                }
                Ok(SocketPacket::Disconnect) => {
                    tracing::debug!("server closed the socket.io session");
                    break;
                }
                Ok(other) => tracing::debug!(?other, "ignoring socket.io packet"),
                Err(err) => tracing::warn!(error = %err, "dropping malformed socket.io packet"),
            },
            EnginePacket::Close => break,
            _ => {}
        }
    }
    tracing::debug!("realtime reader stopped");
}

fn to_server_event(name: &str, data: Value) -> Option<ServerEvent> {
    match ServerEvent::from_parts(name, data) {
        Ok(event) => Some(event),
        Err(parley_core::Error::UnknownEvent(name)) => {
            tracing::debug!(%name, "ignoring unknown event");
            None
        }
        Err(err) => {
            tracing::warn!(event = name, error = %err, "dropping event with unexpected payload");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use futures_util::{SinkExt, StreamExt};
    use parley_core::{ClientEvent, JoinChannel, SendMessage, ServerEvent};
    use tokio::net::{TcpListener, TcpStream};
    use tokio::sync::oneshot;
    use tokio_tungstenite::tungstenite::Message;
    use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
    use tokio_tungstenite::{WebSocketStream, accept_hdr_async};

    use super::{RealtimeClient, socket_url};
    use crate::error::Error;

    const OPEN: &str = r#"0{"sid":"s1","upgrades":[],"pingInterval":25000,"pingTimeout":20000}"#;

    struct Accepted {
        ws: WebSocketStream<TcpStream>,
        uri: String,
        connect_frame: String,
    }

    async fn listener() -> (TcpListener, String) {
        let listener = TcpListener::bind(("127.0.0.1", 0)).await.unwrap();
        let addr = listener.local_addr().unwrap();
        (listener, format!("http://{addr}"))
    }

    /// Accepts one client and runs the server side of the handshake, leaving
    /// the socket.io connect acknowledgement to the caller.
    async fn accept(listener: &TcpListener) -> Accepted {
        let (stream, _) = listener.accept().await.unwrap();
        let (uri_tx, uri_rx) = oneshot::channel();
        let callback = move |request: &Request, response: Response| {
            let _ = uri_tx.send(request.uri().to_string());
            Ok::<Response, ErrorResponse>(response)
        };
        let mut ws = accept_hdr_async(stream, callback).await.unwrap();
        let uri = uri_rx.await.unwrap();

        ws.send(Message::Text(OPEN.to_string())).await.unwrap();
        let connect_frame = next_text(&mut ws).await;
        Accepted {
            ws,
            uri,
            connect_frame,
        }
    }

    async fn next_text(ws: &mut WebSocketStream<TcpStream>) -> String {
        loop {
            let message = tokio::time::timeout(Duration::from_secs(5), ws.next())
                .await
                .expect("frame in time")
                .expect("stream open")
                .expect("valid frame");
            if let Message::Text(text) = message {
                return text;
            }
        }
    }

    async fn next_event(client: &mut RealtimeClient) -> Option<ServerEvent> {
        tokio::time::timeout(Duration::from_secs(5), client.next_event())
            .await
            .expect("event in time")
    }

    #[test]
    fn socket_url_maps_schemes() {
        assert_eq!(
            socket_url("http://127.0.0.1:5000/").unwrap().as_str(),
            "ws://127.0.0.1:5000/socket.io/?EIO=4&transport=websocket"
        );
        assert_eq!(
            socket_url("https://chat.example.com").unwrap().as_str(),
            "wss://chat.example.com/socket.io/?EIO=4&transport=websocket"
        );
        assert!(matches!(
            socket_url("ftp://example.com"),
            Err(Error::UnsupportedScheme(_))
        ));
    }

    #[tokio::test]
    async fn handshake_sends_token_and_delivers_events() {
        let (listener, url) = listener().await;
        let server = tokio::spawn(async move {
            let mut accepted = accept(&listener).await;
            accepted
                .ws
                .send(Message::Text(r#"40{"sid":"a"}"#.to_string()))
                .await
                .unwrap();
            accepted
                .ws
                .send(Message::Text(
                    r#"42["new_mention",{"message_id":9,"content":"hey @bob","author_id":1,"channel_id":2,"timestamp":"2024-01-01T00:00:00"}]"#
                        .to_string(),
                ))
                .await
                .unwrap();
            (accepted.uri, accepted.connect_frame, accepted.ws)
        });

        let mut client = RealtimeClient::connect(&url, Some("tok")).await.unwrap();
        let event = next_event(&mut client).await.expect("event");
        let ServerEvent::NewMention(mention) = event else {
            panic!("expected new_mention, got {event:?}");
        };
        assert_eq!(mention.message_id, Some(9));
        assert_eq!(mention.content, "hey @bob");

        let (uri, connect_frame, _ws) = server.await.unwrap();
        assert_eq!(uri, "/socket.io/?EIO=4&transport=websocket");
        assert_eq!(connect_frame, r#"40{"token":"tok"}"#);
    }

    #[tokio::test]
    async fn answers_pings_and_emits_events() {
        let (listener, url) = listener().await;
        let server = tokio::spawn(async move {
            let mut accepted = accept(&listener).await;
            let ws = &mut accepted.ws;
            ws.send(Message::Text("40".to_string())).await.unwrap();
            ws.send(Message::Text("2".to_string())).await.unwrap();
            let pong = next_text(ws).await;
            let first = next_text(ws).await;
            let second = next_text(ws).await;
            (accepted.connect_frame, pong, first, second)
        });

        let client = RealtimeClient::connect(&url, None).await.unwrap();
        // Give the reader a moment to answer the ping before emitting.
        tokio::time::sleep(Duration::from_millis(50)).await;
        client
            .emit(&ClientEvent::JoinChannel(JoinChannel { channel_id: 3 }))
            .unwrap();
        client
            .emit(&ClientEvent::SendMessage(SendMessage {
                content: "hi".to_string(),
                channel_id: 3,
                user_id: Some(1),
            }))
            .unwrap();

        let (connect_frame, pong, first, second) = server.await.unwrap();
        assert_eq!(connect_frame, "40");
        assert_eq!(pong, "3");
        assert_eq!(first, r#"42["join_channel",{"channel_id":3}]"#);
        assert_eq!(
            second,
            r#"42["send_message",{"content":"hi","channel_id":3,"user_id":1}]"#
        );
    }

    #[tokio::test]
    async fn connect_error_is_refusal() {
        let (listener, url) = listener().await;
        let server = tokio::spawn(async move {
            let mut accepted = accept(&listener).await;
            accepted
                .ws
                .send(Message::Text(r#"44{"message":"Not authorized"}"#.to_string()))
                .await
                .unwrap();
            accepted.ws
        });

        let err = RealtimeClient::connect(&url, None).await.unwrap_err();
        assert!(matches!(err, Error::Refused(ref message) if message == "Not authorized"));
        drop(server.await.unwrap());
    }

    #[tokio::test]
    async fn malformed_and_unknown_frames_are_skipped() {
        let (listener, url) = listener().await;
        let server = tokio::spawn(async move {
            let mut accepted = accept(&listener).await;
            for frame in [
                "40",
                "not a packet",
                "42[oops",
                r#"42["something_else",{}]"#,
                r#"42["reaction_added",{"message_id":"x"}]"#,
                r#"42["reaction_added",{"message_id":4,"emoji":"👍","count":2,"user_id":1}]"#,
            ] {
                accepted
                    .ws
                    .send(Message::Text(frame.to_string()))
                    .await
                    .unwrap();
            }
            accepted.ws
        });

        let mut client = RealtimeClient::connect(&url, None).await.unwrap();
        let event = next_event(&mut client).await.expect("event");
        let ServerEvent::ReactionAdded(reaction) = event else {
            panic!("expected reaction_added, got {event:?}");
        };
        assert_eq!(reaction.message_id, 4);
        assert_eq!(reaction.count, 2);
        drop(server.await.unwrap());
    }

    #[tokio::test]
    async fn server_close_ends_event_stream() {
        let (listener, url) = listener().await;
        let server = tokio::spawn(async move {
            let mut accepted = accept(&listener).await;
            accepted
                .ws
                .send(Message::Text("40".to_string()))
                .await
                .unwrap();
            accepted.ws.close(None).await.unwrap();
        });

        let mut client = RealtimeClient::connect(&url, None).await.unwrap();
        server.await.unwrap();
        assert!(next_event(&mut client).await.is_none());
    }
}
