//! Length-delimited frames over short-lived TCP connections.
//!
//! Every exchange opens its own connection. The caller writes one request
//! frame, half-closes its write side, and (unless firing and forgetting) reads
//! one reply frame. A stream that ends without a reply frame reads as
//! [`Reply::Empty`].

use crate::{Address, Reply, Request};
use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use lion_error::{TalkError, TalkErrorKind, TalkResult};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio_util::codec::{Framed, LengthDelimitedCodec};
use tracing::{debug, instrument, trace};

/// Maximum frame body: 1 MiB.
pub const MAX_FRAME_LENGTH: usize = 1_048_576;

/// A TCP stream speaking length-delimited frames.
pub type FramedStream = Framed<TcpStream, LengthDelimitedCodec>;

/// Wrap an accepted or dialled stream in the frame codec.
pub fn frame(stream: TcpStream) -> FramedStream {
    let codec = LengthDelimitedCodec::builder()
        .max_frame_length(MAX_FRAME_LENGTH)
        .new_codec();
    Framed::new(stream, codec)
}

/// Dial an address.
pub async fn connect(address: &Address) -> TalkResult<FramedStream> {
    let stream = TcpStream::connect((address.host.as_str(), address.port))
        .await
        .map_err(|e| {
            TalkError::new(TalkErrorKind::Connect {
                address: address.to_string(),
                message: e.to_string(),
            })
        })?;
    trace!(%address, "Connected");
    Ok(frame(stream))
}

/// Write one frame.
pub async fn send_frame(framed: &mut FramedStream, body: Bytes) -> TalkResult<()> {
    framed.send(body).await?;
    Ok(())
}

/// Read one frame. `None` means the peer closed without sending one.
pub async fn read_frame(framed: &mut FramedStream) -> TalkResult<Option<Bytes>> {
    match framed.next().await {
        Some(Ok(body)) => Ok(Some(body.freeze())),
        Some(Err(e)) => Err(e.into()),
        None => Ok(None),
    }
}

/// Half-close the write side so the peer sees end-of-stream.
pub async fn finish(framed: &mut FramedStream) -> TalkResult<()> {
    framed.get_mut().shutdown().await?;
    Ok(())
}

/// Read one request frame.
pub async fn read_request(framed: &mut FramedStream) -> TalkResult<Option<Request>> {
    read_frame(framed)
        .await?
        .map(|body| Request::from_bytes(&body))
        .transpose()
}

/// Read one reply frame; end-of-stream is `Empty`.
pub async fn read_reply(framed: &mut FramedStream) -> TalkResult<Reply> {
    match read_frame(framed).await? {
        Some(body) => Reply::from_bytes(&body),
        None => Ok(Reply::Empty),
    }
}

/// Write one reply frame and half-close.
pub async fn write_reply(framed: &mut FramedStream, reply: &Reply) -> TalkResult<()> {
    send_frame(framed, reply.to_bytes()).await?;
    finish(framed).await
}

/// Block until the peer closes the connection or it errors.
///
/// Frames received in the meantime are discarded.
pub async fn wait_for_close(mut framed: FramedStream) -> TalkResult<()> {
    while let Some(frame) = framed.next().await {
        let body = frame?;
        debug!(len = body.len(), "Ignoring frame on held connection");
    }
    Ok(())
}

/// Deliver one request on a fresh connection.
///
/// With `wait_for_reply` false this returns `Ok(None)` as soon as the request
/// is written, without waiting for the handler.
#[instrument(skip(request), fields(route = %request.route))]
pub async fn send_request(
    address: &Address,
    request: &Request,
    wait_for_reply: bool,
) -> TalkResult<Option<Reply>> {
    let mut framed = connect(address).await?;
    send_frame(&mut framed, request.to_bytes()?).await?;
    finish(&mut framed).await?;
    if !wait_for_reply {
        return Ok(None);
    }
    read_reply(&mut framed).await.map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Args;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_request_reply_exchange() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = Address::from(listener.local_addr().unwrap());

        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut framed = frame(stream);
            let request = read_request(&mut framed).await.unwrap().unwrap();
            assert_eq!(request.route, "echo");
            let reply = Reply::json(&request.args.args).unwrap();
            write_reply(&mut framed, &reply).await.unwrap();
        });

        let request = Request::new("echo", Args::new().arg(7));
        let reply = send_request(&address, &request, true).await.unwrap().unwrap();
        let echoed: Vec<u32> = reply.parse_json().unwrap().unwrap();
        assert_eq!(echoed, vec![7]);
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_silent_close_reads_as_empty() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = Address::from(listener.local_addr().unwrap());

        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut framed = frame(stream);
            let _ = read_request(&mut framed).await;
            finish(&mut framed).await.unwrap();
        });

        let reply = send_request(&address, &Request::new("nothing", Args::new()), true)
            .await
            .unwrap();
        assert_eq!(reply, Some(Reply::Empty));
    }

    #[tokio::test]
    async fn test_unreachable_address_is_connect_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = Address::from(listener.local_addr().unwrap());
        drop(listener);

        let err = send_request(&address, &Request::new("ping", Args::new()), true)
            .await
            .unwrap_err();
        assert!(matches!(err.kind, TalkErrorKind::Connect { .. }));
    }
}
