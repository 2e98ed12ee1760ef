//! Running a `Node` on a `TcpListener`.

use std::io::Error as IoError;
use std::net::SocketAddr;

use futures::{FutureExt, SinkExt, StreamExt};
use futures::channel::mpsc::Receiver;
use ringchat_packet::frame::Frame;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio_util::codec::Framed;

use crate::net::{run_outbound, DecodeError, EncodeError, FrameCodec};
use crate::node::{HandleFrameError, Node};

/// Error that can happen while serving one inbound connection.
#[derive(Debug, Error)]
pub enum ConnectionError {
    /// Received data is not a valid frame.
    #[error("Failed to read frame: {}", _0)]
    Decode(DecodeError),
    /// Frame handler failed.
    #[error("Failed to handle frame: {}", _0)]
    Handle(HandleFrameError),
    /// Failed to write the reply.
    #[error("Failed to write reply: {}", _0)]
    Encode(EncodeError),
    /// Failed to close the connection after the reply.
    #[error("Failed to close connection: {}", _0)]
    Shutdown(IoError),
}

async fn handle_connection(node: &Node, socket: TcpStream, peer: SocketAddr) -> Result<(), ConnectionError> {
    let mut framed = Framed::new(socket, FrameCodec);

    let frame = match framed.next().await {
        Some(frame) => frame.map_err(ConnectionError::Decode)?,
        None => return Ok(()),
    };
    trace!("Received {} frame from {}", frame.kind(), peer);

    let reply = node.handle_frame(frame, peer).await
        .map_err(ConnectionError::Handle)?;

    if let Some(reply) = reply {
        framed.send(reply).await
            .map_err(ConnectionError::Encode)?;
        framed.get_mut().shutdown().await
            .map_err(ConnectionError::Shutdown)?;
    }

    Ok(())
}

async fn accept_loop(node: &Node, listener: TcpListener) -> Result<(), IoError> {
    loop {
        let (socket, peer) = listener.accept().await?;
        let node = node.clone();
        tokio::spawn(async move {
            if let Err(e) = handle_connection(&node, socket, peer).await {
                warn!("Dropped frame from {}: {}", peer, e);
            }
        });
    }
}

/// Run `node` on `listener`, delivering frames queued into the transmit half
/// paired with `rx`. Every inbound connection is served by its own task.
pub async fn node_run(node: &Node, listener: TcpListener, rx: Receiver<(Frame, String)>) -> Result<(), IoError> {
    if let Ok(addr) = listener.local_addr() {
        info!("Listening on {}", addr);
    }

    futures::select! {
        accept = accept_loop(node, listener).fuse() => accept,
        outbound = run_outbound(rx).fuse() => Ok(outbound),
    }
}
