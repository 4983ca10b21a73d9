use crate::constants::{CTL_BYTE_SIZE, LINK_CTL};

use super::{Control, LeaderKind};

/// Bytes of driver scratch preceding the leader of every outbound message.
pub const SCRATCH: usize = 12;

/// An outbound host-to-IMP message: 12 bytes of driver scratch, the
/// two-word leader, then the payload, zero-padded to a whole word count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    buf: Vec<u8>,
    words: usize,
}

impl Frame {
    fn leader(kind: LeaderKind, dest: u8, link: u8, id: u8, subtype: u8) -> Vec<u8> {
        let mut buf = vec![0u8; SCRATCH];
        buf.push(u8::from(kind));
        buf.push(dest);
        buf.push(link);
        buf.push(id << 4 | subtype);
        buf
    }

    fn finish(mut buf: Vec<u8>, words: usize) -> Self {
        buf.resize(SCRATCH + 2 * words, 0);
        Self { buf, words }
    }

    /// A control message to `dest` on link 0. The payload starts with the
    /// fixed five-byte header: a zero, the byte size, the big-endian count
    /// of the message bytes that follow, and another zero.
    pub fn control(dest: u8, msg: &Control) -> Self {
        let count = msg.wire_len();
        let mut buf = Self::leader(LeaderKind::Regular, dest, LINK_CTL, 0, 0);
        buf.push(0);
        buf.push(CTL_BYTE_SIZE);
        buf.extend_from_slice(&(count as u16).to_be_bytes());
        buf.push(0);
        msg.encode_into(&mut buf);
        Self::finish(buf, (count + 9 + 1) / 2)
    }

    /// A data message to `dest` on `link`; the payload travels untouched.
    pub fn data(dest: u8, link: u8, payload: &[u8]) -> Self {
        let mut buf = Self::leader(LeaderKind::Regular, dest, link, 0, 0);
        buf.extend_from_slice(payload);
        Self::finish(buf, 2 + (payload.len() + 1) / 2)
    }

    /// A bare NOP leader.
    pub fn nop() -> Self {
        Self::finish(Self::leader(LeaderKind::Nop, 0, 0, 0, 0), 2)
    }

    /// An error-in-leader report back to the IMP.
    pub fn leader_error(subtype: u8) -> Self {
        Self::finish(Self::leader(LeaderKind::LeaderError, 0, 0, 0, subtype), 2)
    }

    /// The whole buffer, scratch included; the driver transmits from byte 12.
    pub fn bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Transmission size in 16-bit words, counted from the leader.
    pub fn words(&self) -> usize {
        self.words
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn control_frame_matches_the_wire_layout() {
        let frame = Frame::control(
            5,
            &Control::Str {
                lsock: 33,
                rsock: 32,
                size: 8,
            },
        );

        assert_eq!(frame.words(), 10);
        assert_eq!(frame.bytes().len(), SCRATCH + 20);
        assert!(frame.bytes()[..SCRATCH].iter().all(|&b| b == 0));
        assert_eq!(
            &frame.bytes()[SCRATCH..],
            [
                0, 5, 0, 0, // leader: regular, host 5, link 0
                0, 8, 0, 10, 0, // byte size 8, count 10
                2, 0, 0, 0, 33, 0, 0, 0, 32, 8, // STR
                0, // pad to a whole word
            ]
        );
    }

    #[test]
    fn short_control_messages_still_fill_whole_words() {
        let frame = Frame::control(3, &Control::Eco { data: 0x42 });
        assert_eq!(frame.words(), 6);
        assert_eq!(
            &frame.bytes()[SCRATCH..],
            [0, 3, 0, 0, 0, 8, 0, 2, 0, 9, 0x42, 0]
        );
    }

    #[test]
    fn data_frame_counts_leader_words() {
        let frame = Frame::data(7, 42, b"abc");
        assert_eq!(frame.words(), 4);
        assert_eq!(&frame.bytes()[SCRATCH..], [0, 7, 42, 0, b'a', b'b', b'c', 0]);
    }

    #[test]
    fn nop_is_a_bare_leader() {
        let frame = Frame::nop();
        assert_eq!(frame.words(), 2);
        assert_eq!(&frame.bytes()[SCRATCH..], [4, 0, 0, 0]);
    }

    #[test]
    fn leader_error_carries_the_subtype() {
        let frame = Frame::leader_error(2);
        assert_eq!(&frame.bytes()[SCRATCH..], [1, 0, 0, 2]);
    }
}
