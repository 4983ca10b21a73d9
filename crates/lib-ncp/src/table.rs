use std::path::PathBuf;

use crate::constants::CONNECTIONS;

/// Return address of the application that owns a slot.
pub type ClientAddr = PathBuf;

/// One direction of a connection.
///
/// `lsock == 0` is the on-wire marker for an inactive half; link and byte
/// size stay unset until the RFC exchange fills them in.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Half {
    pub link: Option<u8>,
    pub size: Option<u8>,
    pub lsock: u32,
    pub rsock: u32,
}

impl Half {
    pub fn is_closed(&self) -> bool {
        self.lsock == 0
    }

    pub fn clear_sockets(&mut self) {
        self.lsock = 0;
        self.rsock = 0;
    }

    fn matches(&self, lsock: u32) -> bool {
        self.lsock != 0 && self.lsock == lsock
    }

    pub fn matches_pair(&self, lsock: u32, rsock: u32) -> bool {
        self.matches(lsock) && self.rsock == rsock
    }
}

/// A connection slot together with the listening state sharing its index.
#[derive(Debug, Clone, Default)]
pub struct Slot {
    pub host: Option<u8>,
    pub rcv: Half,
    pub snd: Half,
    /// Base socket this slot listens on; 0 when it does not listen.
    pub listen: u32,
    pub client: Option<ClientAddr>,
}

impl Slot {
    pub fn is_free(&self) -> bool {
        self.host.is_none() && self.listen == 0
    }
}

/// Fixed-capacity registry of connections and listening sockets.
pub struct Table {
    slots: Vec<Slot>,
}

impl Default for Table {
    fn default() -> Self {
        Self::new()
    }
}

impl Table {
    pub fn new() -> Self {
        Self {
            slots: vec![Slot::default(); CONNECTIONS],
        }
    }

    pub fn slot(&self, i: usize) -> &Slot {
        &self.slots[i]
    }

    pub fn slot_mut(&mut self, i: usize) -> &mut Slot {
        &mut self.slots[i]
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &Slot)> {
        self.slots.iter().enumerate()
    }

    /// Slot owning either half of the (host, link) pair.
    pub fn find_link(&self, host: u8, link: u8) -> Option<usize> {
        self.slots.iter().position(|s| {
            s.host == Some(host)
                && (s.rcv.link == Some(link) || s.snd.link == Some(link))
        })
    }

    /// Slot where either half uses `lsock` as its local socket.
    pub fn find_socket(&self, host: u8, lsock: u32) -> Option<usize> {
        self.slots.iter().position(|s| {
            s.host == Some(host) && (s.rcv.matches(lsock) || s.snd.matches(lsock))
        })
    }

    /// Slot where either half matches the full local/remote socket pair.
    pub fn find_sockets(&self, host: u8, lsock: u32, rsock: u32) -> Option<usize> {
        self.slots.iter().position(|s| {
            s.host == Some(host)
                && (s.rcv.matches_pair(lsock, rsock) || s.snd.matches_pair(lsock, rsock))
        })
    }

    /// Slot listening on `socket`, covering both halves of the pair.
    pub fn find_listen(&self, socket: u32) -> Option<usize> {
        self.slots.iter().position(|s| {
            s.listen != 0 && (s.listen == socket || s.listen.wrapping_add(1) == socket)
        })
    }

    /// Index of a fully free slot. A listening slot is not free: its
    /// connection half is reserved for the request that will open it.
    pub fn allocate(&self) -> Option<usize> {
        self.slots.iter().position(Slot::is_free)
    }

    /// Reset the connection part of a slot; listening state survives.
    pub fn destroy(&mut self, i: usize) {
        let slot = &mut self.slots[i];
        slot.host = None;
        slot.rcv = Half::default();
        slot.snd = Half::default();
        if slot.listen == 0 {
            slot.client = None;
        }
    }

    /// Stop listening on a slot; connection state survives.
    pub fn destroy_listen(&mut self, i: usize) {
        let slot = &mut self.slots[i];
        slot.listen = 0;
        if slot.host.is_none() {
            slot.client = None;
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn occupied(host: u8) -> Slot {
        Slot {
            host: Some(host),
            rcv: Half {
                link: Some(42),
                size: Some(8),
                lsock: 1002,
                rsock: 101,
            },
            snd: Half {
                link: Some(5),
                size: Some(8),
                lsock: 1003,
                rsock: 100,
            },
            listen: 0,
            client: Some(ClientAddr::from("/tmp/app")),
        }
    }

    #[test]
    fn lookups_cover_both_halves() {
        let mut table = Table::new();
        *table.slot_mut(3) = occupied(5);

        assert_eq!(table.find_link(5, 42), Some(3));
        assert_eq!(table.find_link(5, 5), Some(3));
        assert_eq!(table.find_link(6, 42), None);

        assert_eq!(table.find_socket(5, 1002), Some(3));
        assert_eq!(table.find_socket(5, 1003), Some(3));
        assert_eq!(table.find_socket(5, 1004), None);

        assert_eq!(table.find_sockets(5, 1003, 100), Some(3));
        assert_eq!(table.find_sockets(5, 1003, 101), None);
    }

    #[test]
    fn inactive_halves_never_match() {
        let mut table = Table::new();
        let mut slot = occupied(5);
        slot.rcv.clear_sockets();
        slot.snd.clear_sockets();
        *table.slot_mut(0) = slot;

        assert_eq!(table.find_socket(5, 0), None);
        assert_eq!(table.find_sockets(5, 0, 0), None);
    }

    #[test]
    fn listen_matches_either_member_of_the_pair() {
        let mut table = Table::new();
        table.slot_mut(2).listen = 32;

        assert_eq!(table.find_listen(32), Some(2));
        assert_eq!(table.find_listen(33), Some(2));
        assert_eq!(table.find_listen(34), None);
        // A free slot must not answer for socket 0 or 1.
        assert_eq!(table.find_listen(0), None);
        assert_eq!(table.find_listen(1), None);
    }

    #[test]
    fn allocate_skips_listening_and_occupied_slots() {
        let mut table = Table::new();
        *table.slot_mut(0) = occupied(5);
        table.slot_mut(1).listen = 32;

        assert_eq!(table.allocate(), Some(2));

        for i in 2..CONNECTIONS {
            table.slot_mut(i).host = Some(9);
        }
        assert_eq!(table.allocate(), None);
    }

    #[test]
    fn destroy_is_idempotent_and_leaves_free_shape() {
        let mut table = Table::new();
        *table.slot_mut(4) = occupied(5);

        table.destroy(4);
        table.destroy(4);

        let slot = table.slot(4);
        assert!(slot.is_free());
        assert_eq!(slot.host, None);
        assert_eq!(slot.rcv, Half::default());
        assert_eq!(slot.snd, Half::default());
        assert_eq!(slot.client, None);
    }

    #[test]
    fn destroying_a_connection_keeps_its_listener() {
        let mut table = Table::new();
        *table.slot_mut(0) = occupied(5);
        table.slot_mut(0).listen = 32;

        table.destroy(0);
        assert_eq!(table.find_listen(32), Some(0));
        assert!(table.slot(0).client.is_some());

        table.destroy_listen(0);
        assert!(table.slot(0).is_free());
        assert!(table.slot(0).client.is_none());
    }
}
