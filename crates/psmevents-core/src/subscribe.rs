//! Event filter subscription handshake.
//!
//! A subscription is a single JSON-RPC request written to the connection,
//! answered by a single reply object. The endpoint may already be pushing
//! notifications on the same stream, so anything that arrives before the
//! reply has to be read and dropped.
//!
//! Replies are not matched to requests by id. The first value starting with
//! `{` after the request is taken as the reply, and every request reuses
//! id 1. An object notification that overtakes the reply would be mistaken
//! for it; the endpoint is relied on to answer before pushing more objects.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tracing::debug;

use crate::decoder::PeekingDecoder;
use crate::error::Error;

/// Object events requested for every category.
pub const OBJECT_EVENTS: [&str; 3] = ["created", "updated", "deleted"];

const SET_FILTER_METHOD: &str = "events.setObjectEventFilter";
const REQUEST_ID: u32 = 1;

/// Object category an event filter applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Session,
    Subscriber,
    Group,
}

impl Category {
    /// All categories, in subscription order.
    pub const ALL: [Self; 3] = [Self::Session, Self::Subscriber, Self::Group];

    /// Wire name of the category.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Session => "session",
            Self::Subscriber => "subscriber",
            Self::Group => "group",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Serialize)]
struct FilterRequest<'a> {
    id: u32,
    method: &'static str,
    params: (Category, &'a [&'a str]),
}

/// Subscription handshake errors.
#[derive(Debug, Error)]
pub enum HandshakeError {
    /// The endpoint answered with an `error` member.
    #[error("{0}")]
    Rejected(String),

    #[error("Connection closed before the subscription reply arrived")]
    Closed,

    #[error(transparent)]
    Stream(#[from] Error),
}

/// Subscribe to `events` of `category` and wait for the reply.
///
/// The request goes out on `writer`; the reply is read from `decoder`,
/// which must wrap the read side of the same connection.
pub async fn subscribe<W, R>(
    writer: &mut W,
    decoder: &mut PeekingDecoder<R>,
    category: Category,
    events: &[&str],
) -> Result<(), HandshakeError>
where
    W: AsyncWrite + Unpin,
    R: AsyncRead + Unpin,
{
    let request = FilterRequest {
        id: REQUEST_ID,
        method: SET_FILTER_METHOD,
        params: (category, events),
    };
    let mut line = serde_json::to_vec(&request).map_err(Error::from)?;
    line.push(b'\n');
    writer.write_all(&line).await.map_err(Error::from)?;
    writer.flush().await.map_err(Error::from)?;
    debug!(%category, "Sent event filter request");

    loop {
        match decoder.peek_byte().await? {
            None => return Err(HandshakeError::Closed),
            Some(b'{') => break,
            Some(_) => {
                let skipped = decoder.decode_next().await?;
                debug!(%category, ?skipped, "Skipping value ahead of subscription reply");
            }
        }
    }

    let reply = decoder
        .decode_next()
        .await?
        .ok_or(HandshakeError::Closed)?;
    match reply.get("error") {
        None | Some(Value::Null) => {
            debug!(%category, "Event filter accepted");
            Ok(())
        }
        Some(error) => Err(HandshakeError::Rejected(error_message(error))),
    }
}

fn error_message(error: &Value) -> String {
    error
        .get("message")
        .and_then(Value::as_str)
        .map_or_else(|| error.to_string(), str::to_owned)
}

#[cfg(test)]
#[allow(clippy::panic, clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    async fn run(category: Category, incoming: &[u8]) -> (Result<(), HandshakeError>, Vec<u8>) {
        let mut sent = Vec::new();
        let mut decoder = PeekingDecoder::new(incoming);
        let result = subscribe(&mut sent, &mut decoder, category, &OBJECT_EVENTS).await;
        (result, sent)
    }

    #[tokio::test]
    async fn writes_filter_request_line() {
        let (result, sent) = run(Category::Session, br#"{"id":1,"result":true}"#).await;
        result.unwrap();
        assert_eq!(
            String::from_utf8(sent).unwrap(),
            "{\"id\":1,\"method\":\"events.setObjectEventFilter\",\"params\":[\"session\",[\"created\",\"updated\",\"deleted\"]]}\n"
        );
    }

    #[tokio::test]
    async fn every_category_reuses_request_id_one() {
        for category in Category::ALL {
            let (result, sent) = run(category, br#"{"result":true}"#).await;
            result.unwrap();
            let request: Value = serde_json::from_slice(&sent).unwrap();
            assert_eq!(request["id"], json!(1));
            assert_eq!(request["params"][0], json!(category.as_str()));
        }
    }

    #[tokio::test]
    async fn reply_without_error_succeeds() {
        let (result, _) = run(Category::Subscriber, b"\n  {\"id\":1,\"result\":true}\n").await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn null_error_member_counts_as_success() {
        let (result, _) = run(Category::Group, br#"{"id":1,"result":true,"error":null}"#).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn error_reply_surfaces_message() {
        let (result, _) = run(Category::Group, br#"{"error":{"message":"denied"}}"#).await;
        match result {
            Err(HandshakeError::Rejected(message)) => assert_eq!(message, "denied"),
            other => panic!("expected rejection, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn error_without_message_is_rendered_whole() {
        let (result, _) = run(Category::Group, br#"{"error":{"code":-32601}}"#).await;
        match result {
            Err(HandshakeError::Rejected(message)) => assert_eq!(message, r#"{"code":-32601}"#),
            other => panic!("expected rejection, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn non_object_values_ahead_of_reply_are_skipped() {
        let incoming = br#"[{"method":"object.created","params":{}}] 7 "noise"
            {"id":1,"result":true}
            {"method":"object.deleted","params":{}}"#;
        let mut sent = Vec::new();
        let mut decoder = PeekingDecoder::new(&incoming[..]);
        subscribe(&mut sent, &mut decoder, Category::Session, &OBJECT_EVENTS)
            .await
            .unwrap();

        // The event after the reply stays on the stream.
        let next = decoder.decode_next().await.unwrap().unwrap();
        assert_eq!(next["method"], json!("object.deleted"));
    }

    #[tokio::test]
    async fn first_object_is_taken_as_reply() {
        // No id correlation: an object notification in front of the reply
        // is consumed as the reply, and the real reply stays queued.
        let incoming = br#"{"method":"object.updated","params":{}} {"error":{"message":"late"}}"#;
        let mut sent = Vec::new();
        let mut decoder = PeekingDecoder::new(&incoming[..]);
        subscribe(&mut sent, &mut decoder, Category::Session, &OBJECT_EVENTS)
            .await
            .unwrap();
        let queued = decoder.decode_next().await.unwrap().unwrap();
        assert_eq!(queued["error"]["message"], json!("late"));
    }

    #[tokio::test]
    async fn stream_ending_before_reply_is_closed() {
        let (result, _) = run(Category::Session, b"[1,2]\n").await;
        assert!(matches!(result, Err(HandshakeError::Closed)));
    }

    #[tokio::test]
    async fn malformed_reply_is_stream_error() {
        let (result, _) = run(Category::Session, br#"{"id":1,"#).await;
        assert!(matches!(
            result,
            Err(HandshakeError::Stream(Error::Decode(_)))
        ));
    }

    #[tokio::test]
    async fn sequential_handshakes_share_one_stream() {
        let (client, server) = tokio::io::duplex(1024);
        let (read_half, mut write_half) = tokio::io::split(client);
        let mut decoder = PeekingDecoder::new(read_half);

        let endpoint = tokio::spawn(async move {
            use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
            let (server_read, mut server_write) = tokio::io::split(server);
            let mut lines = BufReader::new(server_read).lines();
            let mut categories = Vec::new();
            while let Some(line) = lines.next_line().await.unwrap() {
                let request: Value = serde_json::from_str(&line).unwrap();
                categories.push(request["params"][0].as_str().unwrap().to_string());
                server_write
                    .write_all(b"[{\"method\":\"object.created\"}]\n{\"id\":1,\"result\":true}\n")
                    .await
                    .unwrap();
                if categories.len() == 2 {
                    break;
                }
            }
            categories
        });

        for category in [Category::Session, Category::Subscriber] {
            subscribe(&mut write_half, &mut decoder, category, &OBJECT_EVENTS)
                .await
                .unwrap();
        }
        assert_eq!(endpoint.await.unwrap(), ["session", "subscriber"]);
    }
}
