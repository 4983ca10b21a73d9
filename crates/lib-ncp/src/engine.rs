use tracing::{debug, info, trace, warn};

use crate::constants::{
    CONNECTIONS, CTL_BYTE_SIZE, ECHO_OK, FIRST_LOCAL_SOCKET, LINK_CTL, LINK_ECHO, LINK_MAX,
    LINK_MIN, OPEN_FAILED,
};
use crate::error::CodecError;
use crate::table::{ClientAddr, Half, Table};
use crate::types::{
    host_dead_reason, incomplete_reason, leader_error_reason, Control, ErrCode, Frame, Leader,
    LeaderKind, NcpKind, ERR_DATA,
};
use crate::wire::{Command, Reply};

/// Output produced by the engine, delivered by the reactor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Hand a message to the IMP driver.
    SendImp(Frame),
    /// Send a reply frame to an application endpoint.
    Reply { to: ClientAddr, frame: Vec<u8> },
}

/// The NCP protocol state machine.
///
/// The engine is synchronous and free of I/O: every IMP message and every
/// application request runs to completion against the connection table and
/// leaves the traffic it generated in an outbox the caller drains. No two
/// handlers ever run concurrently.
pub struct Engine {
    table: Table,
    /// Next even local socket handed to an application open.
    next_socket: u32,
    imp_up: bool,
    actions: Vec<Action>,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine {
    pub fn new() -> Self {
        Self {
            table: Table::new(),
            next_socket: FIRST_LOCAL_SOCKET,
            imp_up: false,
            actions: Vec::new(),
        }
    }

    pub fn table(&self) -> &Table {
        &self.table
    }

    /// Drain the traffic generated since the last call.
    pub fn take_actions(&mut self) -> Vec<Action> {
        std::mem::take(&mut self.actions)
    }

    /// Record an IMP link readiness transition.
    pub fn imp_ready(&mut self, up: bool) {
        if up && !self.imp_up {
            info!("IMP going up");
        } else if !up && self.imp_up {
            info!("IMP going down");
        }
        self.imp_up = up;
    }

    // ------------------------------------------------------------------
    // IMP side
    // ------------------------------------------------------------------

    /// Process one framed message from the IMP driver, leader first.
    pub fn handle_frame(&mut self, frame: &[u8]) {
        trace!(len = frame.len(), "IMP message");

        let leader = match Leader::parse(frame) {
            Ok(leader) => leader,
            Err(CodecError::Truncated(len)) => {
                warn!(len, "leader too short");
                self.actions.push(Action::SendImp(Frame::leader_error(1)));
                return;
            }
            Err(err) => {
                warn!(%err, "bad leader");
                self.actions.push(Action::SendImp(Frame::leader_error(2)));
                return;
            }
        };

        match leader.kind {
            LeaderKind::Regular => self.regular(leader, frame),
            LeaderKind::LeaderError => {
                warn!(
                    reason = leader_error_reason(leader.subtype),
                    "error in leader"
                );
            }
            LeaderKind::Down => info!("IMP going down"),
            LeaderKind::Blocked => warn!(host = leader.host, link = leader.link, "blocked link"),
            LeaderKind::Nop => debug!("IMP NOP"),
            LeaderKind::Rfnm => debug!(
                host = leader.host,
                link = leader.link,
                "ready for next message"
            ),
            LeaderKind::Full => warn!("link table full"),
            LeaderKind::HostDead => self.host_dead(leader),
            LeaderKind::DataError => warn!(host = leader.host, "error in data"),
            LeaderKind::Incomplete => warn!(
                host = leader.host,
                reason = incomplete_reason(leader.subtype),
                "incomplete transmission"
            ),
            LeaderKind::Reset => info!("IMP reset"),
        }
    }

    fn regular(&mut self, leader: Leader, frame: &[u8]) {
        let payload = &frame[4..];
        if leader.link == LINK_CTL {
            // Five header bytes precede the batched control messages; the
            // count covers the batch only.
            if payload.len() < 5 {
                warn!(len = payload.len(), "control message without a header");
                return;
            }
            let count = u16::from_be_bytes([payload[2], payload[3]]) as usize;
            let batch = &payload[5..payload.len().min(5 + count)];
            self.process_ncp(leader.host, batch);
        } else {
            debug!(host = leader.host, link = leader.link, "regular message");
            match self.table.find_link(leader.host, leader.link) {
                None => debug!(link = leader.link, "link not connected"),
                Some(i) => {
                    debug!(slot = i, len = payload.len(), "delivering data");
                    let client = self.table.slot(i).client.clone();
                    self.reply_to(
                        client.as_ref(),
                        Reply::Read {
                            conn: i as u8,
                            payload: payload.to_vec(),
                        },
                    );
                }
            }
        }
    }

    /// Run a batch of control messages in arrival order. A batch stops at
    /// the first unknown opcode or truncated parameter region.
    fn process_ncp(&mut self, source: u8, batch: &[u8]) {
        let mut at = 0;
        while at < batch.len() {
            let kind = match NcpKind::try_from(batch[at]) {
                Ok(kind) => kind,
                Err(err) => {
                    warn!(host = source, %err, "stopping batch");
                    let context = &batch[at..batch.len().min(at + ERR_DATA)];
                    self.send_ncp(source, Control::err(ErrCode::Opcode, context));
                    return;
                }
            };
            let context = &batch[at..batch.len().min(at + 1 + kind.param_len())];
            let msg = match Control::decode(kind, &batch[at + 1..]) {
                Ok(msg) => msg,
                Err(err) => {
                    warn!(host = source, %err, "stopping batch");
                    self.send_ncp(source, Control::err(ErrCode::Short, context));
                    return;
                }
            };
            at += msg.wire_len();
            self.dispatch(source, msg, context);
        }
    }

    fn dispatch(&mut self, source: u8, msg: Control, context: &[u8]) {
        // Socket fields arrive from the sender's point of view; our local
        // socket is the rsock it named.
        match msg {
            Control::Nop => {}
            Control::Rts { lsock, rsock, link } => {
                self.process_rts(source, rsock, lsock, link, context)
            }
            Control::Str { lsock, rsock, size } => {
                self.process_str(source, rsock, lsock, size, context)
            }
            Control::Cls { lsock, rsock } => self.process_cls(source, rsock, lsock, context),
            Control::All { link, .. } => self.flow(source, link, NcpKind::All, context),
            Control::Gvb { link, .. } => self.flow(source, link, NcpKind::Gvb, context),
            Control::Ret { link, .. } => self.flow(source, link, NcpKind::Ret, context),
            Control::Inr { link } => self.flow(source, link, NcpKind::Inr, context),
            Control::Ins { link } => self.flow(source, link, NcpKind::Ins, context),
            Control::Eco { data } => {
                debug!(host = source, data, "echo request");
                self.send_ncp(source, Control::Erp { data });
            }
            Control::Erp { data } => self.erp(source, data),
            Control::Err { code, data } => self.peer_err(source, code, data),
            Control::Rst => self.rst(source),
            Control::Rrp => debug!(host = source, "reset reply"),
        }
    }

    /// The remote wants to receive: it asks us to send from our `lsock` to
    /// its `rsock` over the link it picked.
    fn process_rts(&mut self, source: u8, lsock: u32, rsock: u32, link: u8, context: &[u8]) {
        debug!(host = source, lsock, rsock, link, "received RTS");
        if !(LINK_MIN..=LINK_MAX).contains(&link) {
            warn!(link, "RTS link out of range");
            self.send_ncp(source, Control::err(ErrCode::Param, context));
            return;
        }
        let Some(i) = self.rfc_slot(source, lsock, rsock, true, context) else {
            return;
        };

        let answer = {
            let slot = self.table.slot_mut(i);
            slot.snd.link = Some(link);
            if slot.rcv.size.is_none() {
                slot.rcv.size = Some(CTL_BYTE_SIZE);
                true
            } else {
                false
            }
        };
        if answer {
            // Our STR answers for the same simplex channel.
            self.send_ncp(
                source,
                Control::Str {
                    lsock,
                    rsock,
                    size: CTL_BYTE_SIZE,
                },
            );
            if self.table.slot(i).rcv.link.is_some() {
                debug!(slot = i, "incoming request complete");
                self.notify_listen(i, lsock, source);
            }
        } else if self.table.slot(i).snd.size.is_some() {
            debug!(slot = i, "outgoing request complete");
            self.notify_open(i, source);
        }
    }

    /// The remote wants to send: it announces the byte size it will use
    /// toward our `lsock`, and expects an RTS naming the link.
    fn process_str(&mut self, source: u8, lsock: u32, rsock: u32, size: u8, context: &[u8]) {
        debug!(host = source, lsock, rsock, size, "received STR");
        // The byte size shares the validity window of a data link.
        if !(LINK_MIN..=LINK_MAX).contains(&size) {
            warn!(size, "STR byte size out of range");
            self.send_ncp(source, Control::err(ErrCode::Param, context));
            return;
        }
        let Some(i) = self.rfc_slot(source, lsock, rsock, false, context) else {
            return;
        };

        let assign_link = {
            let slot = self.table.slot_mut(i);
            slot.snd.size = Some(size);
            slot.rcv.link.is_none()
        };
        if assign_link {
            let Some(link) = self.free_link(source) else {
                warn!(host = source, "no free data link");
                return;
            };
            self.table.slot_mut(i).rcv.link = Some(link);
            self.send_ncp(source, Control::Rts { lsock, rsock, link });
            if self.table.slot(i).rcv.size.is_some() {
                debug!(slot = i, "incoming request complete");
                self.notify_listen(i, lsock, source);
            }
        } else if self.table.slot(i).snd.link.is_some() {
            debug!(slot = i, "outgoing request complete");
            self.notify_open(i, source);
        }
    }

    /// Find the slot an incoming RTS/STR belongs to, opening one when it
    /// targets a listened-to socket. `snd_half` selects where the remote
    /// pair lands: an RTS names our send half, an STR our receive half.
    fn rfc_slot(
        &mut self,
        source: u8,
        lsock: u32,
        rsock: u32,
        snd_half: bool,
        context: &[u8],
    ) -> Option<usize> {
        let Some(listener) = self.table.find_listen(lsock) else {
            // Not listening: this must answer a request we sent earlier.
            return match self.table.find_sockets(source, lsock, rsock) {
                Some(i) => {
                    debug!(lsock, slot = i, "matches an outgoing request");
                    Some(i)
                }
                None => {
                    warn!(host = source, lsock, "not listening, no outgoing request");
                    self.send_ncp(source, Control::err(ErrCode::Connect, context));
                    None
                }
            };
        };

        // The other member of the even-aligned pair may already hold the
        // slot opened by the first message of this exchange.
        if let Some(i) = self.table.find_socket(source, lsock ^ 1) {
            debug!(lsock, slot = i, "second half of a listened-to connection");
            self.set_remote_pair(i, snd_half, lsock, rsock);
            return Some(i);
        }

        // First message of the exchange: open a connection for the
        // listener, preferably in the listener's own slot.
        let i = if self.table.slot(listener).host.is_none() {
            listener
        } else {
            let client = self.table.slot(listener).client.clone();
            let Some(i) = self.table.allocate() else {
                warn!("table full");
                return None;
            };
            self.table.slot_mut(i).client = client;
            i
        };
        self.table.slot_mut(i).host = Some(source);
        self.set_remote_pair(i, snd_half, lsock, rsock);
        info!(host = source, lsock, slot = i, "new listened-to connection");
        Some(i)
    }

    fn set_remote_pair(&mut self, i: usize, snd_half: bool, lsock: u32, rsock: u32) {
        let slot = self.table.slot_mut(i);
        let half = if snd_half { &mut slot.snd } else { &mut slot.rcv };
        half.lsock = lsock;
        half.rsock = rsock;
    }

    fn process_cls(&mut self, source: u8, lsock: u32, rsock: u32, context: &[u8]) {
        debug!(host = source, lsock, rsock, "received CLS");
        let Some(i) = self.table.find_sockets(source, lsock, rsock) else {
            warn!(host = source, lsock, rsock, "CLS for an unknown connection");
            self.send_ncp(source, Control::err(ErrCode::Socket, context));
            return;
        };

        let (locally_initiated, both_closed) = {
            let slot = self.table.slot_mut(i);
            if slot.rcv.matches_pair(lsock, rsock) {
                slot.rcv.clear_sockets();
            }
            if slot.snd.matches_pair(lsock, rsock) {
                slot.snd.clear_sockets();
            }
            (
                slot.snd.size.is_none(),
                slot.rcv.is_closed() && slot.snd.is_closed(),
            )
        };

        if !locally_initiated {
            // The remote is closing; acknowledge the half it named.
            self.send_ncp(source, Control::Cls { lsock, rsock });
        }
        if both_closed {
            if locally_initiated {
                info!(slot = i, "connection confirmed closed");
            } else {
                info!(slot = i, "connection closed by remote");
            }
            let client = self.table.slot(i).client.clone();
            self.table.destroy_listen(i);
            self.table.destroy(i);
            self.reply_to(client.as_ref(), Reply::Close { conn: i as u8 });
        }
    }

    /// ALL, GVB, RET, INR and INS all validate the link and keep no
    /// further state; credit accounting is not maintained.
    fn flow(&mut self, source: u8, link: u8, kind: NcpKind, context: &[u8]) {
        debug!(host = source, link, kind = %kind, "flow control message");
        if self.table.find_link(source, link).is_none() {
            self.send_ncp(source, Control::err(ErrCode::Socket, context));
        }
    }

    fn erp(&mut self, source: u8, data: u8) {
        debug!(host = source, data, "echo reply");
        let Some(i) = self.table.find_link(source, LINK_ECHO) else {
            debug!(host = source, "no outstanding echo");
            return;
        };
        let client = self.table.slot(i).client.clone();
        self.table.destroy(i);
        self.reply_to(
            client.as_ref(),
            Reply::Echo {
                host: source,
                data,
                error: ECHO_OK,
            },
        );
    }

    fn peer_err(&mut self, source: u8, code: u8, data: [u8; ERR_DATA]) {
        warn!(
            host = source,
            code,
            meaning = ErrCode::describe(code),
            context = ?data,
            "received ERR"
        );

        // A rejection of our RTS or STR fails the pending open.
        if code != u8::from(ErrCode::Socket) && code != u8::from(ErrCode::Connect) {
            return;
        }
        if !matches!(NcpKind::try_from(data[0]), Ok(NcpKind::Rts | NcpKind::Str)) {
            return;
        }
        let lsock = u32::from_be_bytes([data[1], data[2], data[3], data[4]]);
        let rsock = u32::from_be_bytes([data[5], data[6], data[7], data[8]]);
        if let Some(i) = self.table.find_sockets(source, lsock, rsock) {
            info!(slot = i, "peer rejected our request");
            let client = self.table.slot(i).client.clone();
            self.table.destroy(i);
            self.reply_to(
                client.as_ref(),
                Reply::Open {
                    host: source,
                    socket: even_socket(rsock),
                    conn: OPEN_FAILED,
                },
            );
        }
    }

    fn rst(&mut self, source: u8) {
        info!(host = source, "reset");
        for i in 0..CONNECTIONS {
            if self.table.slot(i).host == Some(source) {
                self.table.destroy(i);
            }
        }
        self.send_ncp(source, Control::Rrp);
    }

    fn host_dead(&mut self, leader: Leader) {
        warn!(
            host = leader.host,
            reason = host_dead_reason(leader.subtype),
            "host dead"
        );
        // An outstanding echo to that host will never come back.
        if let Some(i) = self.table.find_link(leader.host, LINK_ECHO) {
            let client = self.table.slot(i).client.clone();
            self.table.destroy(i);
            self.reply_to(
                client.as_ref(),
                Reply::Echo {
                    host: leader.host,
                    data: 0,
                    error: leader.subtype,
                },
            );
        }
    }

    // ------------------------------------------------------------------
    // Application side
    // ------------------------------------------------------------------

    /// Process one request frame from an application endpoint.
    pub fn handle_command(&mut self, client: &ClientAddr, frame: &[u8]) {
        let cmd = match Command::parse(frame) {
            Ok(cmd) => cmd,
            Err(err) => {
                warn!(%err, "bad application request");
                return;
            }
        };
        match cmd {
            Command::Echo { host, data } => self.app_echo(client, host, data),
            Command::Open { host, socket } => self.app_open(client, host, socket),
            Command::Listen { socket } => self.app_listen(client, socket),
            Command::Read { conn, octets } => self.app_read(conn, octets),
            Command::Write { conn, payload } => self.app_write(client, conn, &payload),
            Command::Interrupt { conn } => self.app_interrupt(conn),
            Command::Close { conn } => self.app_close(conn),
        }
    }

    fn app_echo(&mut self, client: &ClientAddr, host: u8, data: u8) {
        info!(host, "application echo");
        let Some(i) = self.table.allocate() else {
            warn!("table full");
            return;
        };
        let slot = self.table.slot_mut(i);
        slot.host = Some(host);
        slot.rcv.link = Some(LINK_ECHO);
        slot.client = Some(client.clone());
        self.send_ncp(host, Control::Eco { data });
    }

    fn app_open(&mut self, client: &ClientAddr, host: u8, socket: u32) {
        info!(host, socket, "application open");
        let Some(i) = self.table.allocate() else {
            warn!("table full");
            self.reply_to(
                Some(client),
                Reply::Open {
                    host,
                    socket,
                    conn: OPEN_FAILED,
                },
            );
            return;
        };
        let Some(link) = self.free_link(host) else {
            warn!(host, "no free data link");
            self.reply_to(
                Some(client),
                Reply::Open {
                    host,
                    socket,
                    conn: OPEN_FAILED,
                },
            );
            return;
        };
        let lsock = self.next_socket;
        self.next_socket += 2;
        let remote_odd = socket.wrapping_add(1);

        // Local even receives from the remote odd; local odd sends to the
        // remote even.
        let slot = self.table.slot_mut(i);
        slot.host = Some(host);
        slot.rcv = Half {
            link: Some(link),
            size: Some(CTL_BYTE_SIZE),
            lsock,
            rsock: remote_odd,
        };
        slot.snd = Half {
            link: None,
            size: None,
            lsock: lsock + 1,
            rsock: socket,
        };
        slot.client = Some(client.clone());

        self.send_ncp(
            host,
            Control::Rts {
                lsock,
                rsock: remote_odd,
                link,
            },
        );
        self.send_ncp(
            host,
            Control::Str {
                lsock: lsock + 1,
                rsock: socket,
                size: CTL_BYTE_SIZE,
            },
        );
    }

    fn app_listen(&mut self, client: &ClientAddr, socket: u32) {
        info!(socket, "application listen");
        if self.table.find_listen(socket).is_some() {
            warn!(socket, "already listening");
            self.reply_to(
                Some(client),
                Reply::Listen {
                    host: 0,
                    socket,
                    conn: 0,
                },
            );
            return;
        }
        let Some(i) = self.table.allocate() else {
            warn!("table full");
            self.reply_to(
                Some(client),
                Reply::Listen {
                    host: 0,
                    socket,
                    conn: 0,
                },
            );
            return;
        };
        let slot = self.table.slot_mut(i);
        slot.listen = socket;
        slot.client = Some(client.clone());
        debug!(socket, slot = i, "listening");
    }

    fn app_read(&mut self, conn: u8, octets: u8) {
        debug!(conn, octets, "application read");
        let Some(i) = self.connection(conn) else {
            return;
        };
        let slot = self.table.slot(i);
        let (Some(host), Some(link)) = (slot.host, slot.rcv.link) else {
            warn!(conn, "receive half not established");
            return;
        };
        self.send_ncp(
            host,
            Control::All {
                link,
                msg_space: 1,
                bit_space: 8 * octets as u32,
            },
        );
    }

    fn app_write(&mut self, client: &ClientAddr, conn: u8, payload: &[u8]) {
        debug!(conn, len = payload.len(), "application write");
        let Some(i) = self.connection(conn) else {
            return;
        };
        let slot = self.table.slot(i);
        let (Some(host), Some(link)) = (slot.host, slot.snd.link) else {
            warn!(conn, "send half not established");
            return;
        };
        self.actions
            .push(Action::SendImp(Frame::data(host, link, payload)));
        self.reply_to(Some(client), Reply::Write { conn });
    }

    fn app_interrupt(&mut self, conn: u8) {
        debug!(conn, "application interrupt");
        let Some(i) = self.connection(conn) else {
            return;
        };
        let slot = self.table.slot(i);
        let (Some(host), Some(link)) = (slot.host, slot.snd.link) else {
            warn!(conn, "send half not established");
            return;
        };
        self.send_ncp(host, Control::Ins { link });
    }

    fn app_close(&mut self, conn: u8) {
        info!(conn, "application close");
        let Some(i) = self.connection(conn) else {
            return;
        };
        // Dropping both byte sizes marks the close as locally initiated;
        // the remote's CLS echoes then confirm it.
        let (host, rcv, snd) = {
            let slot = self.table.slot_mut(i);
            slot.rcv.size = None;
            slot.snd.size = None;
            (slot.host, slot.rcv.clone(), slot.snd.clone())
        };
        let Some(host) = host else { return };
        if !rcv.is_closed() {
            self.send_ncp(
                host,
                Control::Cls {
                    lsock: rcv.lsock,
                    rsock: rcv.rsock,
                },
            );
        }
        if !snd.is_closed() {
            self.send_ncp(
                host,
                Control::Cls {
                    lsock: snd.lsock,
                    rsock: snd.rsock,
                },
            );
        }
    }

    // ------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------

    fn send_ncp(&mut self, dest: u8, msg: Control) {
        debug!(host = dest, kind = %msg.kind(), "send control message");
        self.actions.push(Action::SendImp(Frame::control(dest, &msg)));
    }

    fn reply_to(&mut self, client: Option<&ClientAddr>, reply: Reply) {
        match client {
            Some(to) => self.actions.push(Action::Reply {
                to: to.clone(),
                frame: reply.encode(),
            }),
            None => warn!("no application endpoint recorded for reply"),
        }
    }

    fn notify_listen(&mut self, i: usize, lsock: u32, host: u8) {
        let slot = self.table.slot(i);
        let socket = if slot.listen != 0 {
            slot.listen
        } else {
            lsock & !1
        };
        let client = slot.client.clone();
        self.reply_to(
            client.as_ref(),
            Reply::Listen {
                host,
                socket,
                conn: i as u8,
            },
        );
    }

    fn notify_open(&mut self, i: usize, host: u8) {
        let slot = self.table.slot(i);
        let socket = even_socket(slot.rcv.rsock);
        let client = slot.client.clone();
        self.reply_to(
            client.as_ref(),
            Reply::Open {
                host,
                socket,
                conn: i as u8,
            },
        );
    }

    /// Lowest data link not yet in use toward `host`.
    fn free_link(&self, host: u8) -> Option<u8> {
        (LINK_MIN..=LINK_MAX).find(|&link| self.table.find_link(host, link).is_none())
    }

    /// Application-supplied connection index, when it names an active slot.
    fn connection(&self, conn: u8) -> Option<usize> {
        let i = conn as usize;
        if i < CONNECTIONS && self.table.slot(i).host.is_some() {
            Some(i)
        } else {
            warn!(conn, "no such connection");
            None
        }
    }
}

/// The even member of a socket pair names the connection to applications.
fn even_socket(socket: u32) -> u32 {
    socket & !1
}
