//! The per-peer reliability state machine
//!
//! Owns the send queue, sequence counters, RTO estimator, reassembly
//! buffer, and connection state for one remote. Every method takes
//! `now: Instant` explicitly rather than reading a clock itself, so the
//! state machine stays free of any async-runtime dependency; the owning
//! `Client`/`Server` in `rudp-net` supplies `now` and drives the actual
//! socket I/O.

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

use bytes::{Bytes, BytesMut};
use rand::Rng;

use crate::command::Command;
use crate::error::{ProtocolError, Result};
use crate::header::{opt, PacketHeader, HEADER_SIZE, USEFUL_SIZE};
use crate::reassembly::Reassembly;
use crate::rto::RtoEstimator;
use crate::seq;
use rudp_core::Timeouts;

/// Which side of the handshake this peer plays
///
/// Does not change state-machine branching (that is driven entirely by
/// `state` and the incoming command), but is carried for diagnostics and
/// to mirror the original constructor's signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// This peer initiates the connection (the client side)
    Initiator,
    /// This peer accepts an incoming connection request (the server side)
    Acceptor,
}

/// Connection lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerState {
    /// Just constructed, no datagram sent or received yet
    New,
    /// `send_connect` has been called (initiator) or a CONN_REQ answered
    /// (acceptor is never in this state: it jumps straight to `Run`)
    Connecting,
    /// Handshake complete, normal traffic flows
    Run,
    /// Torn down; the owner must not call any method on this peer again
    Dead,
}

/// Round-trip/link quality snapshot, emitted after a fresh RTT sample
#[derive(Debug, Clone, Copy)]
pub struct LinkInfo {
    /// Current retransmission timeout
    pub rto: Duration,
    /// Smoothed RTT, if at least one sample has been taken
    pub srtt: Option<Duration>,
}

/// Observable outcomes of driving the state machine
#[derive(Debug, Clone)]
pub enum PeerEvent {
    /// The handshake completed; this fires exactly once per peer
    Connected,
    /// A complete application message arrived
    Delivered {
        /// Application command (`n` in `App(n)`)
        app_cmd: u8,
        /// Reassembled payload
        payload: Bytes,
    },
    /// A queued reliable send was acknowledged and removed from the queue
    Acked {
        /// The reliable sequence number that was acknowledged
        seq: u16,
    },
    /// Updated RTT/RTO information
    LinkInfo(LinkInfo),
    /// The peer died (timeout or CLOSE); fires exactly once
    Dropped,
}

struct QueueEntry {
    reliable: bool,
    seq: u16,
    unreliable_seq: u16,
    command: u8,
    segment_index: u16,
    segments_size: u16,
    payload: Bytes,
    retransmitted: bool,
}

/// The per-peer reliability state machine
pub struct Peer {
    remote: SocketAddr,
    role: Role,
    state: PeerState,

    in_seq_reliable: u16,
    in_seq_unreliable: u16,
    out_seq_reliable: u16,
    out_seq_unreliable: u16,
    out_seq_acked: u16,

    sendq: VecDeque<QueueEntry>,
    must_ack: bool,
    reassembly: Option<Reassembly>,

    rto: RtoEstimator,
    timeouts: Timeouts,
    abs_timeout_deadline: Instant,
    last_out_time: Instant,
    created_at: Instant,

    sendto_err: Option<rudp_core::Error>,
}

impl Peer {
    /// Construct a new peer in state `New`
    ///
    /// `out_seq_reliable` is seeded from the thread-local CSPRNG, the
    /// same stand-in for `rudp_random` the rest of this workspace uses.
    pub fn new(timeouts: Timeouts, remote: SocketAddr, role: Role, now: Instant) -> Self {
        let out_seq_reliable: u16 = rand::thread_rng().gen();
        Self {
            remote,
            role,
            state: PeerState::New,
            in_seq_reliable: 0xFFFF,
            in_seq_unreliable: 0,
            out_seq_reliable,
            out_seq_unreliable: 0,
            out_seq_acked: out_seq_reliable.wrapping_sub(1),
            sendq: VecDeque::new(),
            must_ack: false,
            reassembly: None,
            rto: RtoEstimator::new(timeouts.min_rto, timeouts.max_rto),
            timeouts,
            abs_timeout_deadline: now + timeouts.drop,
            last_out_time: now,
            created_at: now,
            sendto_err: None,
        }
    }

    /// The peer's remote address
    pub fn remote(&self) -> SocketAddr {
        self.remote
    }

    /// Which side of the handshake this peer plays
    pub fn role(&self) -> Role {
        self.role
    }

    /// Current lifecycle state
    pub fn state(&self) -> PeerState {
        self.state
    }

    /// Upper RTO clamp
    pub fn max_rto(&self) -> Duration {
        self.timeouts.max_rto
    }

    /// Absolute silence duration before this peer is declared dead
    pub fn drop_timeout(&self) -> Duration {
        self.timeouts.drop
    }

    /// Idle duration before a keepalive PING is due
    pub fn action_timeout(&self) -> Duration {
        self.timeouts.action
    }

    /// Report that the owner's actual `sendto` failed
    ///
    /// Latched and surfaced by the next enqueue-triggered call
    /// (`send`/`send_connect`); `last_out_time` is left untouched by the
    /// caller regardless, preserving retransmit backoff timing across
    /// transient send failures.
    pub fn note_send_error(&mut self, err: std::io::Error) {
        self.sendto_err = Some(err.into());
    }

    fn take_latched_error(&mut self) -> Result<()> {
        match self.sendto_err.take() {
            Some(err) => Err(ProtocolError::Core(err)),
            None => Ok(()),
        }
    }

    fn enqueue_reliable_fragment(&mut self, command: u8, segment_index: u16, segments_size: u16, payload: Bytes) {
        self.out_seq_unreliable = 0;
        self.out_seq_reliable = self.out_seq_reliable.wrapping_add(1);
        self.sendq.push_back(QueueEntry {
            reliable: true,
            seq: self.out_seq_reliable,
            unreliable_seq: 0,
            command,
            segment_index,
            segments_size,
            payload,
            retransmitted: false,
        });
    }

    fn enqueue_unreliable_fragment(&mut self, command: u8, segment_index: u16, segments_size: u16, payload: Bytes) {
        self.out_seq_unreliable = self.out_seq_unreliable.wrapping_add(1);
        self.sendq.push_back(QueueEntry {
            reliable: false,
            seq: self.out_seq_reliable,
            unreliable_seq: self.out_seq_unreliable,
            command,
            segment_index,
            segments_size,
            payload,
            retransmitted: false,
        });
    }

    /// Enqueue a reliable CONN_REQ and move to `Connecting`
    ///
    /// Enqueues before checking for a latched prior `sendto` failure, so
    /// the failure is reported without dropping the CONN_REQ itself —
    /// it still sits in the queue to be sent on the next flush.
    pub fn send_connect(&mut self, now: Instant) -> Result<()> {
        let command = Command::ConnReq.to_byte()?;
        self.enqueue_reliable_fragment(command, 0, 1, Bytes::new());
        self.state = PeerState::Connecting;
        self.last_out_time = now;
        self.take_latched_error()
    }

    /// Application-level send, segmenting payloads larger than one
    /// datagram
    ///
    /// Enqueues every fragment before checking for a latched prior
    /// `sendto` failure, so that failure is reported without silently
    /// discarding this payload — it still sits in the queue to be sent
    /// on the next flush.
    pub fn send(&mut self, _now: Instant, reliable: bool, app_cmd: u8, payload: &[u8]) -> Result<()> {
        if payload.is_empty() {
            return Err(ProtocolError::InvalidArgument("payload must not be empty".into()));
        }
        let command = Command::app(app_cmd)?.to_byte()?;

        let n = payload.len().div_ceil(USEFUL_SIZE) as u16;
        for i in 0..n {
            let start = i as usize * USEFUL_SIZE;
            let end = (start + USEFUL_SIZE).min(payload.len());
            let fragment = Bytes::copy_from_slice(&payload[start..end]);
            if reliable {
                self.enqueue_reliable_fragment(command, i, n, fragment);
            } else {
                self.enqueue_unreliable_fragment(command, i, n, fragment);
            }
        }
        self.take_latched_error()
    }

    /// Build a single CLOSE datagram bypassing the queue
    ///
    /// The caller is responsible for transmitting the returned buffer;
    /// no retransmission is attempted. The unreliable sequence is
    /// pre-incremented even though the peer is about to be torn down,
    /// matching the reference framing so a remote that receives this
    /// datagram can still classify it against the current frame.
    pub fn send_close_noqueue(&mut self, now: Instant) -> Bytes {
        self.out_seq_unreliable = self.out_seq_unreliable.wrapping_add(1);
        let mut opt_flags = 0u8;
        let mut reliable_ack = 0u16;
        if self.must_ack {
            opt_flags |= opt::ACK;
            reliable_ack = self.in_seq_reliable;
        }
        let header = PacketHeader {
            command: Command::Close.to_byte().expect("CLOSE always fits"),
            opt: opt_flags,
            reliable: self.out_seq_reliable,
            unreliable: self.out_seq_unreliable,
            reliable_ack,
            segment_index: 0,
            segments_size: 1,
        };
        let mut buf = BytesMut::with_capacity(HEADER_SIZE);
        header.write(&mut buf);
        self.last_out_time = now;
        buf.freeze()
    }

    fn handle_ack(&mut self, a: u16) -> Result<Vec<PeerEvent>> {
        let ack_delta = seq::delta(a, self.out_seq_acked);
        if ack_delta < 0 {
            return Ok(Vec::new());
        }
        if seq::is_ahead(a, self.out_seq_reliable) {
            return Err(ProtocolError::BrokenAck(format!(
                "ack {a} is ahead of last sent reliable seq {}",
                self.out_seq_reliable
            )));
        }

        self.out_seq_acked = a;
        let mut events = Vec::new();
        while let Some(front) = self.sendq.front() {
            if !front.reliable || !front.retransmitted || seq::delta(front.seq, a) > 0 {
                break;
            }
            let entry = self.sendq.pop_front().expect("front checked above");
            events.push(PeerEvent::Acked { seq: entry.seq });
        }
        Ok(events)
    }

    /// Drive the state machine with one decoded incoming datagram
    pub fn on_datagram(&mut self, now: Instant, buf: &[u8]) -> Result<Vec<PeerEvent>> {
        if self.state == PeerState::Dead {
            return Err(ProtocolError::Core(rudp_core::Error::PeerDead));
        }

        let header = PacketHeader::parse(buf)?;
        let payload = &buf[HEADER_SIZE..];

        let mut events = if header.has_ack() {
            self.handle_ack(header.reliable_ack)?
        } else {
            Vec::new()
        };

        enum Classification {
            Sequenced,
            Retransmitted,
            Unsequenced,
        }

        let classification = if header.is_reliable() {
            if header.reliable == self.in_seq_reliable {
                Classification::Retransmitted
            } else if seq::is_next(header.reliable, self.in_seq_reliable) {
                self.in_seq_reliable = header.reliable;
                self.in_seq_unreliable = 0;
                Classification::Sequenced
            } else {
                Classification::Unsequenced
            }
        } else if header.reliable != self.in_seq_reliable {
            Classification::Unsequenced
        } else if seq::delta(header.unreliable, self.in_seq_unreliable) > 0 {
            self.in_seq_unreliable = header.unreliable;
            Classification::Sequenced
        } else {
            Classification::Unsequenced
        };

        match classification {
            Classification::Unsequenced => {
                if self.state == PeerState::New && header.command() == Command::ConnReq {
                    self.in_seq_reliable = header.reliable;
                    self.in_seq_unreliable = 0;
                    self.state = PeerState::Run;
                    let rsp = Command::ConnRsp.to_byte()?;
                    self.enqueue_reliable_fragment(rsp, 0, 1, Bytes::new());
                    events.push(PeerEvent::Connected);
                } else if self.state == PeerState::Connecting && header.command() == Command::ConnRsp {
                    self.in_seq_reliable = header.reliable;
                    self.in_seq_unreliable = 0;
                    events.extend(self.handle_ack(header.reliable_ack)?);
                    self.state = PeerState::Run;
                    events.push(PeerEvent::Connected);
                } else {
                    tracing::debug!(remote = %self.remote, command = %header.command(), "dropping unsequenced datagram");
                }
            }
            Classification::Retransmitted => {
                self.abs_timeout_deadline = now + self.timeouts.drop;
            }
            Classification::Sequenced => {
                self.abs_timeout_deadline = now + self.timeouts.drop;
                match header.command() {
                    Command::Close => {
                        self.state = PeerState::Dead;
                        events.push(PeerEvent::Dropped);
                        return Ok(events);
                    }
                    Command::Ping if self.state == PeerState::Run => {
                        let echo = Bytes::copy_from_slice(&payload[..payload.len().min(8)]);
                        let pong = Command::Pong.to_byte()?;
                        self.enqueue_unreliable_fragment(pong, 0, 1, echo);
                    }
                    Command::Pong if self.state == PeerState::Run => {
                        if payload.len() >= 8 {
                            let ts = u64::from_be_bytes(payload[..8].try_into().unwrap());
                            let elapsed = now.saturating_duration_since(self.created_at);
                            let ts_duration = Duration::from_nanos(ts);
                            if elapsed >= ts_duration {
                                self.rto.sample(elapsed - ts_duration);
                                events.push(PeerEvent::LinkInfo(LinkInfo {
                                    rto: self.rto.rto(),
                                    srtt: self.rto.srtt(),
                                }));
                            }
                        }
                    }
                    Command::Noop | Command::ConnReq | Command::ConnRsp | Command::Ping | Command::Pong => {}
                    Command::App(app_cmd) if self.state == PeerState::Run => {
                        if header.segments_size <= 1 {
                            events.push(PeerEvent::Delivered {
                                app_cmd,
                                payload: Bytes::copy_from_slice(payload),
                            });
                        } else if header.segment_index == 0 {
                            self.reassembly = Some(Reassembly::start(header.command, header.segments_size, payload));
                        } else if let Some(reassembly) = self.reassembly.as_mut() {
                            if reassembly.append(header.segment_index, payload) && reassembly.is_complete() {
                                let reassembly = self.reassembly.take().expect("checked Some above");
                                events.push(PeerEvent::Delivered {
                                    app_cmd: reassembly.command() - Command::APP_BASE,
                                    payload: reassembly.finish(),
                                });
                            }
                        }
                    }
                    _ => {}
                }
            }
        }

        if header.is_reliable() {
            self.must_ack = true;
            if self.sendq.is_empty() {
                let noop = Command::Noop.to_byte()?;
                self.enqueue_unreliable_fragment(noop, 0, 1, Bytes::new());
            }
        }

        Ok(events)
    }

    /// Service tick: retransmit/flush the queue, emit a keepalive PING if
    /// idle, and report whether the peer died of silence.
    pub fn on_timer(&mut self, now: Instant) -> (Vec<PeerEvent>, Vec<Bytes>) {
        let mut events = Vec::new();
        let mut datagrams = Vec::new();

        if now > self.abs_timeout_deadline {
            self.state = PeerState::Dead;
            events.push(PeerEvent::Dropped);
            return (events, datagrams);
        }

        if self.sendq.is_empty() && now.saturating_duration_since(self.last_out_time) > self.timeouts.action {
            let ts = now.saturating_duration_since(self.created_at).as_nanos() as u64;
            let ping = Command::Ping.to_byte().expect("PING always fits");
            self.enqueue_reliable_fragment(ping, 0, 1, Bytes::copy_from_slice(&ts.to_be_bytes()));
        }

        let had_must_ack = self.must_ack;
        let ack_of = self.in_seq_reliable;

        // Walks the queue from the head, sending every never-before-sent
        // entry in one pass. A reliable entry is kept in place (advancing
        // `idx`) so a later tick can find it still at its position; an
        // unreliable entry is removed at `idx` so the next entry slides
        // into its slot. Hitting a reliable entry that was already sent
        // in an earlier tick is the RTO-gated retransmit case: it stops
        // the flush for this tick, resending only once `rto` has actually
        // elapsed since it last went out (otherwise the tick does nothing
        // further — a not-yet-due head must not be resent early).
        let mut idx = 0usize;
        loop {
            let Some(front) = self.sendq.get_mut(idx) else {
                break;
            };

            if front.reliable
                && front.retransmitted
                && now.saturating_duration_since(self.last_out_time) < self.rto.rto()
            {
                break;
            }

            let mut opt_flags = 0u8;
            let mut reliable_ack = 0u16;
            if had_must_ack {
                opt_flags |= opt::ACK;
                reliable_ack = ack_of;
            }
            if front.reliable {
                opt_flags |= opt::RELIABLE;
            }
            if front.retransmitted {
                opt_flags |= opt::RETRANSMITTED;
            }

            let header = PacketHeader {
                command: front.command,
                opt: opt_flags,
                reliable: front.seq,
                unreliable: front.unreliable_seq,
                reliable_ack,
                segment_index: front.segment_index,
                segments_size: front.segments_size,
            };
            let mut buf = BytesMut::with_capacity(HEADER_SIZE + front.payload.len());
            header.write(&mut buf);
            buf.extend_from_slice(&front.payload);
            datagrams.push(buf.freeze());
            self.last_out_time = now;

            if front.reliable && front.retransmitted {
                self.rto.backoff();
                break;
            } else if front.reliable {
                front.retransmitted = true;
                idx += 1;
            } else {
                self.sendq.remove(idx);
            }
        }

        if had_must_ack {
            self.must_ack = false;
        }

        (events, datagrams)
    }

    /// When the owner should next call [`Peer::on_timer`]
    pub fn next_deadline(&self, now: Instant) -> Instant {
        let delta = match self.sendq.front() {
            Some(front) if front.reliable && front.retransmitted => {
                let target = self.last_out_time + self.rto.rto();
                target.saturating_duration_since(now)
            }
            Some(_) => Duration::ZERO,
            None => self.timeouts.action,
        };
        let max_delta = self.abs_timeout_deadline.saturating_duration_since(now);
        now + delta.min(max_delta)
    }
}
