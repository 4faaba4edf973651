//! Acceptor side: handshake, request fan-out, and response writing.

use std::sync::Arc;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_util::codec::{Framed, LengthDelimitedCodec};
use tracing::{debug, trace, warn};

use crate::error::{DispatchError, RpcError};
use crate::frame::{Frame, PROTOCOL_VERSION, decode, encode};

/// Depth of the response queue feeding the socket writer.
const REPLY_QUEUE_DEPTH: usize = 64;

/// Service-side request handler.
///
/// Implemented by the service definition layer; the transport hands it the
/// raw method id and payload and writes whatever it returns back to the
/// caller under the same request id.
#[async_trait]
pub trait ServiceDispatcher: Send + Sync + 'static {
    async fn dispatch(&self, method: u16, payload: Vec<u8>) -> Result<Vec<u8>, DispatchError>;
}

/// Owns the accepted socket and serves requests until the peer goes away.
pub struct ServerDriver {
    framed: Framed<TcpStream, LengthDelimitedCodec>,
    dispatcher: Arc<dyn ServiceDispatcher>,
}

impl ServerDriver {
    /// Serve the session until the peer disconnects.
    ///
    /// Each request is dispatched on its own task so a slow handler cannot
    /// stall unrelated calls on the same session.
    pub async fn run(self) -> Result<(), RpcError> {
        let (mut sink, mut stream) = self.framed.split();
        let (reply_tx, mut reply_rx) = mpsc::channel::<Frame>(REPLY_QUEUE_DEPTH);

        let writer = tokio::spawn(async move {
            while let Some(frame) = reply_rx.recv().await {
                let buf = match encode(&frame) {
                    Ok(buf) => buf,
                    Err(e) => {
                        warn!(error = %e, "dropping unencodable reply frame");
                        continue;
                    }
                };
                if sink.send(buf).await.is_err() {
                    break;
                }
            }
        });

        let result = async {
            while let Some(inbound) = stream.next().await {
                let buf = inbound?;
                match decode(&buf)? {
                    Frame::Request { id, method, payload } => {
                        trace!(id, method, "dispatching request");
                        let dispatcher = Arc::clone(&self.dispatcher);
                        let reply_tx = reply_tx.clone();
                        tokio::spawn(async move {
                            let reply = match dispatcher.dispatch(method, payload).await {
                                Ok(payload) => Frame::Response { id, payload },
                                Err(e) => Frame::Error {
                                    id,
                                    message: e.to_string(),
                                },
                            };
                            // Fails only if the session already ended.
                            let _ = reply_tx.send(reply).await;
                        });
                    }
                    other => {
                        debug!(frame = ?other, "ignoring unexpected frame");
                    }
                }
            }
            Ok(())
        }
        .await;

        drop(reply_tx);
        let _ = writer.await;
        result
    }
}

/// Perform the acceptor handshake on an accepted stream.
pub async fn accept(
    stream: TcpStream,
    dispatcher: Arc<dyn ServiceDispatcher>,
) -> Result<ServerDriver, RpcError> {
    let mut framed = Framed::new(stream, LengthDelimitedCodec::new());

    let hello = framed
        .next()
        .await
        .ok_or_else(|| RpcError::Handshake("peer closed during handshake".into()))??;
    match decode(&hello)? {
        Frame::Hello { version } if version == PROTOCOL_VERSION => {}
        Frame::Hello { version } => {
            return Err(RpcError::Handshake(format!(
                "protocol version mismatch: ours {PROTOCOL_VERSION}, peer {version}"
            )));
        }
        other => {
            return Err(RpcError::Handshake(format!("expected Hello, got {other:?}")));
        }
    }
    framed
        .send(encode(&Frame::HelloAck {
            version: PROTOCOL_VERSION,
        })?)
        .await?;

    Ok(ServerDriver { framed, dispatcher })
}
