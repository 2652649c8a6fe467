// src/connection/handler.rs

//! Defines the `ConnectionHandler` which manages the full lifecycle of a client connection.

use super::guard::ConnectionGuard;
use super::session::{ClientSession, Control};
use crate::core::handler::{DispatchOutcome, Dispatcher};
use crate::core::handshake::{self, HandshakeError};
use crate::core::protocol::{CommandType, Packet, PacketCodec, send_within};
use crate::core::state::HubState;
use crate::core::HubError;
use crate::server::AnyStream;
use futures::StreamExt;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::sync::{broadcast, mpsc};
use tokio_util::codec::Framed;
use tracing::{debug, info, warn};

const SHUTDOWN_REASON: &str = "ServerHub is shutting down";

/// Manages the full lifecycle of a client connection: handshake, admission,
/// the sequential read loop and teardown.
pub struct ConnectionHandler<S = AnyStream> {
    framed: Framed<S, PacketCodec>,
    addr: SocketAddr,
    state: Arc<HubState>,
    global_shutdown_rx: broadcast::Receiver<()>,
}

impl<S> ConnectionHandler<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    /// Creates a new `ConnectionHandler`.
    pub fn new(
        socket: S,
        addr: SocketAddr,
        state: Arc<HubState>,
        global_shutdown_rx: broadcast::Receiver<()>,
    ) -> Self {
        let codec = PacketCodec::new(state.config.max_frame_size, state.stats.clone());
        Self {
            framed: Framed::new(socket, codec),
            addr,
            state,
            global_shutdown_rx,
        }
    }

    /// Drives the connection until it terminates. Rejected handshakes are not
    /// errors; they are logged and the socket is closed.
    pub async fn run(mut self) -> Result<(), HubError> {
        let identity = match handshake::perform(&mut self.framed, self.addr, &self.state).await {
            Ok(identity) => identity,
            Err(e) => {
                self.reject(e);
                self.close_transport().await;
                return Ok(());
            }
        };

        let (control_tx, control_rx) = mpsc::unbounded_channel();
        let session = ClientSession::new(
            self.state.next_session_id(),
            self.addr,
            identity,
            control_tx,
            self.state.clone(),
        );
        let guard = ConnectionGuard::new(session);

        let result = self.serve(guard.session(), control_rx).await;

        drop(guard);
        self.close_transport().await;
        result
    }

    fn reject(&self, e: HandshakeError) {
        self.state.stats.increment_rejected_handshakes();
        match &e {
            HandshakeError::Closed => {
                debug!("{} closed the connection before the handshake.", self.addr);
            }
            HandshakeError::Transport(inner) if inner.is_normal_disconnect() => {
                debug!("{} went away during the handshake: {}", self.addr, inner);
            }
            _ => warn!("Unable to admit client {}: {}", self.addr, e),
        }
    }

    /// Admits the session and runs the read loop until a terminal condition.
    async fn serve(
        &mut self,
        session: &Arc<ClientSession>,
        mut control_rx: mpsc::UnboundedReceiver<Control>,
    ) -> Result<(), HubError> {
        if let Err(e) = self.admit(session).await {
            return Self::transport_fault(self.addr, e);
        }

        let state = self.state.clone();
        let send_timeout = state.config.send_timeout;
        let dispatcher = Dispatcher::new(session, &state);
        let framed = &mut self.framed;
        let global_shutdown_rx = &mut self.global_shutdown_rx;

        loop {
            tokio::select! {
                biased;
                _ = global_shutdown_rx.recv() => {
                    debug!("Connection handler for {} received global shutdown signal.", self.addr);
                    let notice = Packet::disconnect_with_reason(SHUTDOWN_REASON);
                    if let Err(e) = send_within(framed, notice, send_timeout).await {
                        debug!("Shutdown notice to {} was not delivered: {}", self.addr, e);
                    }
                    return Ok(());
                }
                Some(control) = control_rx.recv() => {
                    match control {
                        Control::Kick(reason) => {
                            let notice = match reason {
                                Some(reason) => Packet::disconnect_with_reason(&reason),
                                None => Packet::empty(CommandType::Disconnect),
                            };
                            if let Err(e) = send_within(framed, notice, send_timeout).await {
                                debug!("Kick notice to {} was not delivered: {}", self.addr, e);
                            }
                            return Ok(());
                        }
                        Control::Close => return Ok(()),
                    }
                }
                result = framed.next() => {
                    match result {
                        Some(Ok(packet)) => match dispatcher.dispatch(packet).await {
                            DispatchOutcome::Continue => {}
                            DispatchOutcome::Reply(reply) => {
                                if let Err(e) = send_within(framed, reply, send_timeout).await {
                                    return Self::transport_fault(self.addr, e);
                                }
                            }
                            DispatchOutcome::Disconnect => {
                                debug!("{} asked to disconnect.", session.name());
                                return Ok(());
                            }
                        },
                        Some(Err(e)) => return Self::transport_fault(self.addr, e),
                        None => {
                            debug!("Connection from {} closed by peer.", self.addr);
                            return Ok(());
                        }
                    }
                }
            }
        }
    }

    /// Registers the session, acknowledges the handshake and logs the arrival.
    async fn admit(&mut self, session: &Arc<ClientSession>) -> Result<(), HubError> {
        session.activate();
        let ack = Packet::empty(CommandType::Connect);
        send_within(&mut self.framed, ack, self.state.config.send_timeout).await?;
        info!("{} connected!", session.name());
        Ok(())
    }

    /// Transport faults end the connection but are never surfaced to the peer.
    fn transport_fault(addr: SocketAddr, e: HubError) -> Result<(), HubError> {
        if e.is_normal_disconnect() {
            debug!("Connection from {} closed by peer: {}", addr, e);
        } else {
            warn!("Connection error for {}: {}", addr, e);
        }
        Ok(())
    }

    async fn close_transport(&mut self) {
        let limit = self.state.config.send_timeout;
        match tokio::time::timeout(limit, self.framed.get_mut().shutdown()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => debug!("Closing the transport of {} failed: {}", self.addr, e),
            Err(_) => debug!("Closing the transport of {} timed out after {:?}", self.addr, limit),
        }
    }
}
