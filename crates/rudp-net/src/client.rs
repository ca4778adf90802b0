//! One endpoint, one peer: the initiating side of a connection

use std::net::SocketAddr;
use std::time::Instant;

use rudp_core::{Address, Timeouts};
use rudp_protocol::{LinkInfo, Peer, PeerEvent, Role, HEADER_SIZE, RECV_BUFFER_SIZE};
use tokio::time::sleep_until;

use crate::endpoint::Endpoint;
use crate::error::Result;

/// Application callbacks driven by a [`Client`]'s run loop
pub trait ClientHandler {
    /// An application payload arrived
    fn handle_packet(&mut self, app_cmd: u8, data: &[u8]);
    /// A fresh RTT sample updated the link estimate
    fn link_info(&mut self, info: LinkInfo);
    /// The peer was declared dead; the client must not be used again
    fn server_lost(&mut self);
    /// The handshake completed
    fn connected(&mut self);
}

/// One endpoint, one peer, initiating a connection to a remote server
pub struct Client {
    endpoint: Endpoint,
    peer: Peer,
    remote: SocketAddr,
    connected: bool,
}

impl Client {
    /// Resolve `remote`, bind an any-address endpoint of the matching
    /// family, and enqueue the initial CONN_REQ
    pub async fn connect(remote: Address, timeouts: Timeouts, now: Instant) -> Result<Self> {
        let remote_addr = remote.as_socket_addr();
        let endpoint = Endpoint::bind_for(remote_addr).await?;
        let mut peer = Peer::new(timeouts, remote_addr, Role::Initiator, now);
        peer.send_connect(now)?;

        let mut client = Self {
            endpoint,
            peer,
            remote: remote_addr,
            connected: false,
        };
        client.flush(now).await?;
        Ok(client)
    }

    /// Enqueue an application send; delivered on the next flush
    pub fn send(&mut self, now: Instant, reliable: bool, app_cmd: u8, payload: &[u8]) -> Result<()> {
        self.peer.send(now, reliable, app_cmd, payload)?;
        Ok(())
    }

    async fn flush(&mut self, now: Instant) -> Result<()> {
        let (_events, datagrams) = self.peer.on_timer(now);
        for datagram in datagrams {
            if let Err(err) = self.endpoint.send_to(self.remote, &datagram).await {
                self.peer.note_send_error(err);
            }
        }
        Ok(())
    }

    fn dispatch(&mut self, events: Vec<PeerEvent>, handler: &mut dyn ClientHandler) -> bool {
        let mut dropped = false;
        for event in events {
            match event {
                PeerEvent::Connected => {
                    if !self.connected {
                        self.connected = true;
                        handler.connected();
                    }
                }
                PeerEvent::Delivered { app_cmd, payload } => {
                    handler.handle_packet(app_cmd, &payload);
                }
                PeerEvent::Acked { .. } => {}
                PeerEvent::LinkInfo(info) => handler.link_info(info),
                PeerEvent::Dropped => {
                    dropped = true;
                }
            }
        }
        dropped
    }

    /// Drive the socket-recv / timer-service loop until the peer drops
    pub async fn run(&mut self, handler: &mut dyn ClientHandler) -> Result<()> {
        self.run_with_input(handler, None).await
    }

    /// Drive the socket-recv / timer-service loop until the peer drops,
    /// additionally forwarding anything received on `input` as a
    /// reliable `app_cmd`-tagged send
    ///
    /// Used by the `test-client` reference binary to forward operator
    /// stdin lines without coupling this crate to terminal I/O.
    pub async fn run_with_input(
        &mut self,
        handler: &mut dyn ClientHandler,
        mut input: Option<(u8, tokio::sync::mpsc::Receiver<Vec<u8>>)>,
    ) -> Result<()> {
        let mut buf = vec![0u8; RECV_BUFFER_SIZE];
        loop {
            let now = Instant::now();
            let deadline = self.peer.next_deadline(now);

            tokio::select! {
                res = self.endpoint.recv(&mut buf) => {
                    let (len, from) = res?;
                    if from != self.remote || len < HEADER_SIZE {
                        tracing::debug!(%from, len, "dropping datagram from unexpected source");
                        continue;
                    }
                    let now = Instant::now();
                    match self.peer.on_datagram(now, &buf[..len]) {
                        Ok(events) => {
                            if self.dispatch(events, handler) {
                                handler.server_lost();
                                return Ok(());
                            }
                        }
                        Err(err) => tracing::debug!(error = %err, "dropping malformed datagram"),
                    }
                    self.flush(now).await?;
                }
                _ = sleep_until(tokio::time::Instant::from_std(deadline)) => {
                    let now = Instant::now();
                    let (events, datagrams) = self.peer.on_timer(now);
                    let dropped = self.dispatch(events, handler);
                    for datagram in datagrams {
                        if let Err(err) = self.endpoint.send_to(self.remote, &datagram).await {
                            self.peer.note_send_error(err);
                        }
                    }
                    if dropped {
                        handler.server_lost();
                        return Ok(());
                    }
                }
                line = recv_or_pending(&mut input) => {
                    if let Some((app_cmd, payload)) = line {
                        let now = Instant::now();
                        if let Err(err) = self.peer.send(now, true, app_cmd, &payload) {
                            tracing::warn!(error = %err, "enqueueing stdin line failed");
                        }
                        self.flush(now).await?;
                    }
                }
            }
        }
    }
}

async fn recv_or_pending(slot: &mut Option<(u8, tokio::sync::mpsc::Receiver<Vec<u8>>)>) -> Option<(u8, Vec<u8>)> {
    match slot {
        Some((app_cmd, rx)) => rx.recv().await.map(|payload| (*app_cmd, payload)),
        None => std::future::pending().await,
    }
}
