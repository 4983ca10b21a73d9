use std::fmt::Display;

use crate::error::CodecError;

/// Host-IMP message types, the bottom nibble of the first leader byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaderKind {
    Regular,
    LeaderError,
    Down,
    Blocked,
    Nop,
    Rfnm,
    Full,
    HostDead,
    DataError,
    Incomplete,
    Reset,
}

impl TryFrom<u8> for LeaderKind {
    type Error = CodecError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Regular),
            1 => Ok(Self::LeaderError),
            2 => Ok(Self::Down),
            3 => Ok(Self::Blocked),
            4 => Ok(Self::Nop),
            5 => Ok(Self::Rfnm),
            6 => Ok(Self::Full),
            7 => Ok(Self::HostDead),
            8 => Ok(Self::DataError),
            9 => Ok(Self::Incomplete),
            10 => Ok(Self::Reset),
            _ => Err(CodecError::Leader(value)),
        }
    }
}

impl From<LeaderKind> for u8 {
    fn from(kind: LeaderKind) -> Self {
        match kind {
            LeaderKind::Regular => 0,
            LeaderKind::LeaderError => 1,
            LeaderKind::Down => 2,
            LeaderKind::Blocked => 3,
            LeaderKind::Nop => 4,
            LeaderKind::Rfnm => 5,
            LeaderKind::Full => 6,
            LeaderKind::HostDead => 7,
            LeaderKind::DataError => 8,
            LeaderKind::Incomplete => 9,
            LeaderKind::Reset => 10,
        }
    }
}

impl Display for LeaderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LeaderKind::Regular => write!(f, "regular"),
            LeaderKind::LeaderError => write!(f, "leader error"),
            LeaderKind::Down => write!(f, "IMP going down"),
            LeaderKind::Blocked => write!(f, "blocked"),
            LeaderKind::Nop => write!(f, "NOP"),
            LeaderKind::Rfnm => write!(f, "RFNM"),
            LeaderKind::Full => write!(f, "full"),
            LeaderKind::HostDead => write!(f, "host dead"),
            LeaderKind::DataError => write!(f, "data error"),
            LeaderKind::Incomplete => write!(f, "incomplete"),
            LeaderKind::Reset => write!(f, "reset"),
        }
    }
}

/// The first two 16-bit words of every message exchanged with the IMP.
///
/// On a received message the host field names the source; on a transmitted
/// one it names the destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Leader {
    pub flags: u8,
    pub kind: LeaderKind,
    pub host: u8,
    pub link: u8,
    pub id: u8,
    pub subtype: u8,
}

impl Leader {
    pub fn parse(frame: &[u8]) -> Result<Self, CodecError> {
        if frame.len() < 4 {
            return Err(CodecError::Truncated(frame.len()));
        }
        let kind = LeaderKind::try_from(frame[0] & 0x0f)?;
        Ok(Self {
            flags: frame[0] >> 4,
            kind,
            host: frame[1],
            link: frame[2],
            id: frame[3] >> 4,
            subtype: frame[3] & 0x0f,
        })
    }
}

/// Reason text for a host-dead leader subtype.
pub fn host_dead_reason(subtype: u8) -> &'static str {
    match subtype {
        0 => "IMP cannot be reached",
        1 => "is not up",
        3 => "communication administratively prohibited",
        _ => "dead, unknown reason",
    }
}

/// Reason text for an incomplete-transmission leader subtype.
pub fn incomplete_reason(subtype: u8) -> &'static str {
    match subtype {
        0 => "host did not accept message quickly enough",
        1 => "message too long",
        2 => "message took too long in transmission",
        3 => "message lost in network",
        4 => "resources unavailable",
        5 => "I/O failure during reception",
        _ => "unknown reason",
    }
}

/// Reason text for a leader-error subtype.
pub fn leader_error_reason(subtype: u8) -> &'static str {
    match subtype {
        0 => "IMP error during leader",
        1 => "message less than 32 bits",
        2 => "illegal type",
        _ => "unknown reason",
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parses_a_host_dead_leader() {
        let leader = Leader::parse(&[0x07, 5, 0, 0x01]).unwrap();
        assert_eq!(leader.kind, LeaderKind::HostDead);
        assert_eq!(leader.host, 5);
        assert_eq!(leader.subtype, 1);
        assert_eq!(leader.flags, 0);
    }

    #[test]
    fn splits_flags_and_id_nibbles() {
        let leader = Leader::parse(&[0x20, 3, 7, 0x42]).unwrap();
        assert_eq!(leader.flags, 2);
        assert_eq!(leader.kind, LeaderKind::Regular);
        assert_eq!(leader.link, 7);
        assert_eq!(leader.id, 4);
        assert_eq!(leader.subtype, 2);
    }

    #[test]
    fn rejects_bad_leaders() {
        assert_eq!(Leader::parse(&[0, 0]), Err(CodecError::Truncated(2)));
        assert_eq!(
            Leader::parse(&[0x0b, 0, 0, 0]),
            Err(CodecError::Leader(11))
        );
    }
}
