/*! Outbound side of the transport.

Every frame is written to a fresh TCP connection whose writing half is closed
right after the frame. Frames queued into [`Tx`] are fire-and-forget: nobody
waits for them and a failed delivery is only logged. A key exchange is the
only exchange that expects an answer on the same connection, see
[`request`].
*/

use std::io::Error as IoError;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use futures::channel::mpsc;
use ringchat_packet::frame::Frame;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio_util::codec::Framed;

use crate::net::codec::*;

/// Channel size for outbound frames.
pub const OUTBOUND_CHANNEL_SIZE: usize = 64;

/// Sink of frames to deliver, paired with the `host:port` of the receiver.
pub type Tx = mpsc::Sender<(Frame, String)>;

/// Error that can happen when delivering a frame.
#[derive(Debug, Error)]
pub enum SendError {
    /// Failed to connect to the receiver.
    #[error("Failed to connect to the receiver: {}", _0)]
    Connect(IoError),
    /// Failed to write the frame.
    #[error("Failed to write frame: {}", _0)]
    Encode(EncodeError),
    /// Failed to close the writing half of the connection.
    #[error("Failed to close connection: {}", _0)]
    Shutdown(IoError),
    /// Failed to read the reply.
    #[error("Failed to read reply: {}", _0)]
    Decode(DecodeError),
    /// Receiver closed the connection without a reply.
    #[error("Connection closed without a reply")]
    NoReply,
    /// Receiver didn't reply in time.
    #[error("Timeout while waiting for a reply")]
    Timeout,
}

async fn connect_and_send(addr: &str, frame: Frame) -> Result<Framed<TcpStream, FrameCodec>, SendError> {
    let socket = TcpStream::connect(addr).await
        .map_err(SendError::Connect)?;
    let mut framed = Framed::new(socket, FrameCodec);
    framed.send(frame).await
        .map_err(SendError::Encode)?;
    framed.get_mut().shutdown().await
        .map_err(SendError::Shutdown)?;
    Ok(framed)
}

/// Deliver one frame to `addr` on a new connection.
pub async fn send_frame(addr: &str, frame: Frame) -> Result<(), SendError> {
    connect_and_send(addr, frame).await.map(drop)
}

/// Deliver one frame to `addr` and wait for the frame it replies with.
pub async fn request(addr: &str, frame: Frame, timeout: Duration) -> Result<Frame, SendError> {
    let exchange = async {
        let mut framed = connect_and_send(addr, frame).await?;
        match framed.next().await {
            Some(Ok(reply)) => Ok(reply),
            Some(Err(e)) => Err(SendError::Decode(e)),
            None => Err(SendError::NoReply),
        }
    };

    tokio::time::timeout(timeout, exchange).await
        .map_err(|_| SendError::Timeout)?
}

/// Deliver frames received from `rx` until all senders are gone. Frames are
/// delivered concurrently, each by its own task.
pub async fn run_outbound(mut rx: mpsc::Receiver<(Frame, String)>) {
    while let Some((frame, addr)) = rx.next().await {
        trace!("Sending {} frame to {}", frame.kind(), addr);
        tokio::spawn(async move {
            if let Err(e) = send_frame(&addr, frame).await {
                warn!("Failed to deliver frame to {}: {}", addr, e);
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn send_frame_closes_after_frame() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();

        let server = async {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut data = Vec::new();
            socket.read_to_end(&mut data).await.unwrap();
            data
        };
        let client = send_frame(&addr, Frame::KeyReceived);

        let (data, res) = futures::join!(server, client);
        res.unwrap();
        assert_eq!(data, b"==KEYRECIEVED==");
    }

    #[tokio::test]
    async fn request_reads_reply() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();

        let server = async {
            let (socket, _) = listener.accept().await.unwrap();
            let mut framed = Framed::new(socket, FrameCodec);
            let frame = framed.next().await.unwrap().unwrap();
            framed.send(Frame::KeyReceived).await.unwrap();
            framed.get_mut().shutdown().await.unwrap();
            frame
        };
        let client = request(&addr, Frame::Onion(vec![1, 2, 3]), Duration::from_secs(5));

        let (received, reply) = futures::join!(server, client);
        assert_eq!(received, Frame::Onion(vec![1, 2, 3]));
        assert_eq!(reply.unwrap(), Frame::KeyReceived);
    }

    #[tokio::test]
    async fn request_without_reply() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();

        let server = async {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut data = Vec::new();
            socket.read_to_end(&mut data).await.unwrap();
        };
        let client = request(&addr, Frame::KeyReceived, Duration::from_secs(5));

        let (_, reply) = futures::join!(server, client);
        assert!(matches!(reply, Err(SendError::NoReply)));
    }

    #[tokio::test]
    async fn send_frame_connection_refused() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        drop(listener);

        assert!(matches!(send_frame(&addr, Frame::KeyReceived).await, Err(SendError::Connect(_))));
    }
}
