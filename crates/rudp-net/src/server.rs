//! One endpoint, a set of peers keyed by remote address

use std::any::Any;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Instant;

use rudp_core::{Address, Timeouts};
use rudp_protocol::{Command, LinkInfo, Peer, PeerEvent, Role, HEADER_SIZE, RECV_BUFFER_SIZE};
use tokio::time::sleep_until;

use crate::endpoint::Endpoint;
use crate::error::Result;

/// Application callbacks driven by a [`Server`]'s run loop
pub trait ServerHandler {
    /// An application payload arrived from `peer`
    fn handle_packet(&mut self, peer: SocketAddr, app_cmd: u8, data: &[u8]);
    /// A fresh RTT sample updated the link estimate for `peer`
    fn link_info(&mut self, peer: SocketAddr, info: LinkInfo);
    /// `peer` was declared dead and removed from the peer set
    fn peer_dropped(&mut self, peer: SocketAddr);
    /// `peer` completed the handshake and was added to the peer set
    fn peer_new(&mut self, peer: SocketAddr);
}

struct PeerSlot {
    peer: Peer,
    data: Option<Box<dyn Any + Send>>,
}

/// One endpoint accepting connections from many remotes
pub struct Server {
    endpoint: Endpoint,
    peers: HashMap<SocketAddr, PeerSlot>,
    timeouts: Timeouts,
}

impl Server {
    /// Bind to `addr` and start with an empty peer set
    ///
    /// Unlike [`Client::connect`][crate::Client::connect], which is happy
    /// with an ephemeral any-address socket, a server has nothing for
    /// clients to connect to without a fixed, known address.
    pub async fn bind(addr: Option<Address>, timeouts: Timeouts) -> Result<Self> {
        let addr = addr.ok_or(rudp_core::Error::AddressRequired)?;
        let endpoint = Endpoint::bind(Some(addr)).await?;
        Ok(Self {
            endpoint,
            peers: HashMap::new(),
            timeouts,
        })
    }

    /// The locally bound address
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.endpoint.local_addr()
    }

    /// Fetch the opaque per-peer user slot
    pub fn peer_data_get(&self, peer: SocketAddr) -> Option<&(dyn Any + Send)> {
        self.peers.get(&peer).and_then(|slot| slot.data.as_deref())
    }

    /// Set the opaque per-peer user slot
    pub fn peer_data_set(&mut self, peer: SocketAddr, data: Box<dyn Any + Send>) {
        if let Some(slot) = self.peers.get_mut(&peer) {
            slot.data = Some(data);
        }
    }

    /// Enqueue an application send to one peer
    pub fn send(&mut self, now: Instant, peer: SocketAddr, reliable: bool, app_cmd: u8, payload: &[u8]) -> Result<()> {
        if let Some(slot) = self.peers.get_mut(&peer) {
            slot.peer.send(now, reliable, app_cmd, payload)?;
        }
        Ok(())
    }

    /// Enqueue an application send to every peer currently in the set
    ///
    /// Takes a snapshot of addresses first so a peer dropped mid-loop
    /// (by this same send failing) does not invalidate the iteration.
    pub fn send_all(&mut self, now: Instant, reliable: bool, app_cmd: u8, payload: &[u8]) {
        let addrs: Vec<SocketAddr> = self.peers.keys().copied().collect();
        for addr in addrs {
            if let Some(slot) = self.peers.get_mut(&addr) {
                if let Err(err) = slot.peer.send(now, reliable, app_cmd, payload) {
                    tracing::debug!(peer = %addr, error = %err, "send_all enqueue failed");
                }
            }
        }
    }

    async fn flush_one(endpoint: &Endpoint, addr: SocketAddr, peer: &mut Peer, now: Instant) {
        let (_events, datagrams) = peer.on_timer(now);
        for datagram in datagrams {
            if let Err(err) = endpoint.send_to(addr, &datagram).await {
                peer.note_send_error(err);
            }
        }
    }

    fn dispatch(events: Vec<PeerEvent>, addr: SocketAddr, handler: &mut dyn ServerHandler) -> bool {
        let mut dropped = false;
        for event in events {
            match event {
                PeerEvent::Connected => {}
                PeerEvent::Delivered { app_cmd, payload } => {
                    handler.handle_packet(addr, app_cmd, &payload);
                }
                PeerEvent::Acked { .. } => {}
                PeerEvent::LinkInfo(info) => handler.link_info(addr, info),
                PeerEvent::Dropped => dropped = true,
            }
        }
        dropped
    }

    async fn on_recv(&mut self, now: Instant, from: SocketAddr, buf: &[u8], handler: &mut dyn ServerHandler) {
        if let Some(slot) = self.peers.get_mut(&from) {
            match slot.peer.on_datagram(now, buf) {
                Ok(events) => {
                    if Self::dispatch(events, from, handler) {
                        self.peers.remove(&from);
                        handler.peer_dropped(from);
                        return;
                    }
                }
                Err(err) => {
                    tracing::debug!(peer = %from, error = %err, "dropping malformed datagram");
                    return;
                }
            }
            Self::flush_one(&self.endpoint, from, &mut slot.peer, now).await;
            return;
        }

        if buf.len() != HEADER_SIZE {
            tracing::debug!(peer = %from, len = buf.len(), "dropping garbage datagram from unknown peer");
            return;
        }
        let Ok(header) = rudp_protocol::PacketHeader::parse(buf) else {
            tracing::debug!(peer = %from, "dropping garbage datagram from unknown peer");
            return;
        };
        if header.command() != Command::ConnReq {
            tracing::debug!(peer = %from, "dropping garbage datagram from unknown peer");
            return;
        }

        let mut peer = Peer::new(self.timeouts, from, Role::Acceptor, now);
        match peer.on_datagram(now, buf) {
            Ok(_events) => {
                Self::flush_one(&self.endpoint, from, &mut peer, now).await;
                self.peers.insert(from, PeerSlot { peer, data: None });
                handler.peer_new(from);
            }
            Err(err) => {
                tracing::debug!(peer = %from, error = %err, "rejecting connection request");
            }
        }
    }

    async fn on_timer_tick(&mut self, now: Instant, handler: &mut dyn ServerHandler) {
        let addrs: Vec<SocketAddr> = self.peers.keys().copied().collect();
        for addr in addrs {
            let Some(slot) = self.peers.get_mut(&addr) else {
                continue;
            };
            let (events, datagrams) = slot.peer.on_timer(now);
            let dropped = Self::dispatch(events, addr, handler);
            for datagram in datagrams {
                if let Err(err) = self.endpoint.send_to(addr, &datagram).await {
                    slot.peer.note_send_error(err);
                }
            }
            if dropped {
                self.peers.remove(&addr);
                handler.peer_dropped(addr);
            }
        }
    }

    fn next_deadline(&self, now: Instant) -> Instant {
        self.peers
            .values()
            .map(|slot| slot.peer.next_deadline(now))
            .min()
            .unwrap_or_else(|| now + self.timeouts.action)
    }

    /// Drive the socket-recv / timer-service loop forever
    pub async fn run(&mut self, handler: &mut dyn ServerHandler) -> Result<()> {
        self.run_with_broadcast(handler, None).await
    }

    /// Drive the socket-recv / timer-service loop forever, additionally
    /// broadcasting any message received on `broadcast` to every peer as
    /// a reliable `app_cmd`-tagged send
    ///
    /// Used by the `test-server` reference binary to forward operator
    /// stdin lines without coupling this crate to terminal I/O.
    pub async fn run_with_broadcast(
        &mut self,
        handler: &mut dyn ServerHandler,
        mut broadcast: Option<(u8, tokio::sync::mpsc::Receiver<Vec<u8>>)>,
    ) -> Result<()> {
        let mut buf = vec![0u8; RECV_BUFFER_SIZE];
        loop {
            let now = Instant::now();
            let deadline = self.next_deadline(now);

            tokio::select! {
                res = self.endpoint.recv(&mut buf) => {
                    let (len, from) = res?;
                    let now = Instant::now();
                    self.on_recv(now, from, &buf[..len], handler).await;
                }
                _ = sleep_until(tokio::time::Instant::from_std(deadline)) => {
                    let now = Instant::now();
                    self.on_timer_tick(now, handler).await;
                }
                line = recv_or_pending(&mut broadcast) => {
                    if let Some((app_cmd, payload)) = line {
                        let now = Instant::now();
                        self.send_all(now, true, app_cmd, &payload);
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
