//! Initiator side: connection establishment, call multiplexing, and the
//! session driver.

use std::collections::HashMap;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio_util::codec::{Framed, LengthDelimitedCodec};
use tracing::{debug, trace};

use crate::error::RpcError;
use crate::frame::{Frame, PROTOCOL_VERSION, decode, encode};

/// Depth of the outbound call queue. Callers block (asynchronously) when the
/// driver falls this far behind.
const CALL_QUEUE_DEPTH: usize = 64;

/// How often the driver sweeps pending calls whose caller has gone away.
const PENDING_SWEEP_INTERVAL: Duration = Duration::from_secs(30);

struct Outbound {
    method: u16,
    payload: Vec<u8>,
    reply: oneshot::Sender<Result<Vec<u8>, RpcError>>,
}

/// Handle for issuing calls over an established session.
///
/// Cloneable and cheap; all clones feed the same [`ConnectionDriver`]. The
/// handle stays usable only while the driver runs — once it exits, every
/// call fails with [`RpcError::ConnectionClosed`].
#[derive(Clone)]
pub struct CallHandle {
    tx: mpsc::Sender<Outbound>,
}

impl CallHandle {
    /// Send one request and wait for the matching response.
    ///
    /// There is no deadline here; callers that need one race this future
    /// against a timer and drop it on loss, which releases the pending slot.
    pub async fn call(&self, method: u16, payload: Vec<u8>) -> Result<Vec<u8>, RpcError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        let outbound = Outbound {
            method,
            payload,
            reply: reply_tx,
        };
        self.tx
            .send(outbound)
            .await
            .map_err(|_| RpcError::ConnectionClosed)?;
        reply_rx.await.map_err(|_| RpcError::ConnectionClosed)?
    }
}

/// Owns the socket for one session and pumps it until the peer goes away.
///
/// Dropping the driver (or aborting its task) tears the session down; every
/// pending call then resolves with [`RpcError::ConnectionClosed`].
pub struct ConnectionDriver {
    framed: Framed<TcpStream, LengthDelimitedCodec>,
    rx: mpsc::Receiver<Outbound>,
    pending: HashMap<u64, oneshot::Sender<Result<Vec<u8>, RpcError>>>,
    next_id: u64,
}

impl ConnectionDriver {
    /// Pump the session until it ends.
    ///
    /// Returns `Ok(())` when the peer closes the connection cleanly or all
    /// call handles are dropped, `Err` on a socket or framing failure.
    pub async fn run(mut self) -> Result<(), RpcError> {
        let mut sweep = tokio::time::interval(PENDING_SWEEP_INTERVAL);
        loop {
            tokio::select! {
                _ = sweep.tick() => self.prune_abandoned(),
                outbound = self.rx.recv() => match outbound {
                    Some(out) => self.send_request(out).await?,
                    // Every CallHandle is gone; nothing can use this session.
                    None => return Ok(()),
                },
                inbound = self.framed.next() => match inbound {
                    Some(Ok(buf)) => self.route_frame(&buf)?,
                    Some(Err(e)) => return Err(RpcError::Io(e)),
                    None => {
                        debug!("peer closed the connection");
                        return Ok(());
                    }
                },
            }
        }
    }

    async fn send_request(&mut self, out: Outbound) -> Result<(), RpcError> {
        // The caller may already have given up (timeout) while the request
        // sat in the queue; don't send it or track a reply no one wants.
        if out.reply.is_closed() {
            trace!(method = out.method, "dropping request abandoned before dispatch");
            return Ok(());
        }
        let id = self.next_id;
        self.next_id += 1;
        trace!(id, method = out.method, len = out.payload.len(), "sending request");
        let frame = Frame::Request {
            id,
            method: out.method,
            payload: out.payload,
        };
        self.pending.insert(id, out.reply);
        self.framed.send(encode(&frame)?).await?;
        Ok(())
    }

    /// Drop pending entries whose caller has gone away. A peer that never
    /// answers an abandoned call would otherwise pin its slot until the
    /// session ends.
    fn prune_abandoned(&mut self) {
        let before = self.pending.len();
        self.pending.retain(|_, reply| !reply.is_closed());
        let pruned = before - self.pending.len();
        if pruned > 0 {
            debug!(pruned, "dropped abandoned pending calls");
        }
    }

    fn route_frame(&mut self, buf: &[u8]) -> Result<(), RpcError> {
        match decode(buf)? {
            Frame::Response { id, payload } => {
                trace!(id, len = payload.len(), "received response");
                if let Some(reply) = self.pending.remove(&id) {
                    // The caller may have given up (timeout); discarding the
                    // response is the correct outcome then.
                    let _ = reply.send(Ok(payload));
                }
            }
            Frame::Error { id, message } => {
                if let Some(reply) = self.pending.remove(&id) {
                    let _ = reply.send(Err(RpcError::Peer(message)));
                }
            }
            other => {
                debug!(frame = ?other, "ignoring unexpected frame");
            }
        }
        Ok(())
    }
}

/// Connect to `addr` (`host:port`) and perform the handshake.
pub async fn connect(addr: &str) -> Result<(CallHandle, ConnectionDriver), RpcError> {
    let stream = TcpStream::connect(addr).await?;
    establish_initiator(stream).await
}

/// Perform the initiator handshake on an already-connected stream.
pub async fn establish_initiator(
    stream: TcpStream,
) -> Result<(CallHandle, ConnectionDriver), RpcError> {
    let mut framed = Framed::new(stream, LengthDelimitedCodec::new());

    framed
        .send(encode(&Frame::Hello {
            version: PROTOCOL_VERSION,
        })?)
        .await?;

    let ack = framed
        .next()
        .await
        .ok_or_else(|| RpcError::Handshake("peer closed during handshake".into()))??;
    match decode(&ack)? {
        Frame::HelloAck { version } if version == PROTOCOL_VERSION => {}
        Frame::HelloAck { version } => {
            return Err(RpcError::Handshake(format!(
                "protocol version mismatch: ours {PROTOCOL_VERSION}, peer {version}"
            )));
        }
        other => {
            return Err(RpcError::Handshake(format!(
                "expected HelloAck, got {other:?}"
            )));
        }
    }

    let (tx, rx) = mpsc::channel(CALL_QUEUE_DEPTH);
    Ok((
        CallHandle { tx },
        ConnectionDriver {
            framed,
            rx,
            pending: HashMap::new(),
            next_id: 1,
        },
    ))
}
