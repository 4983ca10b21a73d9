//! Frames exchanged with applications over the local datagram socket.
//!
//! Requests carry odd identifiers; the matching reply is the request
//! identifier plus one. Interrupt is the one request without a reply.

use crate::error::WireError;

pub const ECHO: u8 = 1;
pub const OPEN: u8 = 3;
pub const LISTEN: u8 = 5;
pub const READ: u8 = 7;
pub const WRITE: u8 = 9;
pub const CLOSE: u8 = 11;
pub const INTERRUPT: u8 = 13;

/// True when `len` is legal for the request `id`.
pub fn valid_length(id: u8, len: usize) -> bool {
    match id {
        ECHO => len == 3,
        OPEN => len == 6,
        LISTEN => len == 5,
        READ => len == 3,
        WRITE => len >= 2,
        INTERRUPT => len == 2,
        CLOSE => len == 2,
        _ => false,
    }
}

/// A request from an application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Echo { host: u8, data: u8 },
    Open { host: u8, socket: u32 },
    Listen { socket: u32 },
    Read { conn: u8, octets: u8 },
    Write { conn: u8, payload: Vec<u8> },
    Interrupt { conn: u8 },
    Close { conn: u8 },
}

impl Command {
    pub fn parse(frame: &[u8]) -> Result<Self, WireError> {
        let id = *frame.first().ok_or(WireError::Empty)?;
        if !valid_length(id, frame.len()) {
            return match id {
                ECHO | OPEN | LISTEN | READ | WRITE | INTERRUPT | CLOSE => {
                    Err(WireError::BadLength {
                        id,
                        len: frame.len(),
                    })
                }
                _ => Err(WireError::UnknownRequest(id)),
            };
        }
        Ok(match id {
            ECHO => Self::Echo {
                host: frame[1],
                data: frame[2],
            },
            OPEN => Self::Open {
                host: frame[1],
                socket: u32::from_be_bytes([frame[2], frame[3], frame[4], frame[5]]),
            },
            LISTEN => Self::Listen {
                socket: u32::from_be_bytes([frame[1], frame[2], frame[3], frame[4]]),
            },
            READ => Self::Read {
                conn: frame[1],
                octets: frame[2],
            },
            WRITE => Self::Write {
                conn: frame[1],
                payload: frame[2..].to_vec(),
            },
            INTERRUPT => Self::Interrupt { conn: frame[1] },
            CLOSE => Self::Close { conn: frame[1] },
            _ => unreachable!("valid_length admits known requests only"),
        })
    }
}

/// A reply to an application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Echo { host: u8, data: u8, error: u8 },
    Open { host: u8, socket: u32, conn: u8 },
    Listen { host: u8, socket: u32, conn: u8 },
    Read { conn: u8, payload: Vec<u8> },
    Write { conn: u8 },
    Close { conn: u8 },
}

impl Reply {
    pub fn encode(&self) -> Vec<u8> {
        match *self {
            Self::Echo { host, data, error } => vec![ECHO + 1, host, data, error],
            Self::Open { host, socket, conn } => {
                let mut buf = vec![OPEN + 1, host];
                buf.extend_from_slice(&socket.to_be_bytes());
                buf.push(conn);
                buf
            }
            Self::Listen { host, socket, conn } => {
                let mut buf = vec![LISTEN + 1, host];
                buf.extend_from_slice(&socket.to_be_bytes());
                buf.push(conn);
                buf
            }
            Self::Read { conn, ref payload } => {
                let mut buf = vec![READ + 1, conn];
                buf.extend_from_slice(payload);
                buf
            }
            Self::Write { conn } => vec![WRITE + 1, conn],
            Self::Close { conn } => vec![CLOSE + 1, conn],
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parses_every_request() {
        assert_eq!(
            Command::parse(&[1, 5, 0x42]),
            Ok(Command::Echo {
                host: 5,
                data: 0x42,
            })
        );
        assert_eq!(
            Command::parse(&[3, 5, 0, 0, 0, 100]),
            Ok(Command::Open {
                host: 5,
                socket: 100,
            })
        );
        assert_eq!(
            Command::parse(&[5, 0, 0, 0, 32]),
            Ok(Command::Listen { socket: 32 })
        );
        assert_eq!(
            Command::parse(&[7, 2, 80]),
            Ok(Command::Read {
                conn: 2,
                octets: 80,
            })
        );
        assert_eq!(
            Command::parse(&[9, 2, b'h', b'i']),
            Ok(Command::Write {
                conn: 2,
                payload: b"hi".to_vec(),
            })
        );
        assert_eq!(Command::parse(&[13, 2]), Ok(Command::Interrupt { conn: 2 }));
        assert_eq!(Command::parse(&[11, 2]), Ok(Command::Close { conn: 2 }));
    }

    #[test]
    fn enforces_the_length_table() {
        assert_eq!(Command::parse(&[]), Err(WireError::Empty));
        assert_eq!(Command::parse(&[2, 0]), Err(WireError::UnknownRequest(2)));
        assert_eq!(
            Command::parse(&[1, 5]),
            Err(WireError::BadLength { id: 1, len: 2 })
        );
        assert_eq!(
            Command::parse(&[3, 5, 0, 0, 100]),
            Err(WireError::BadLength { id: 3, len: 5 })
        );
        assert_eq!(
            Command::parse(&[9]),
            Err(WireError::BadLength { id: 9, len: 1 })
        );
    }

    #[test]
    fn encodes_replies_bit_exactly() {
        assert_eq!(
            Reply::Echo {
                host: 5,
                data: 0x42,
                error: 0x10,
            }
            .encode(),
            [2, 5, 0x42, 0x10]
        );
        assert_eq!(
            Reply::Open {
                host: 5,
                socket: 100,
                conn: 255,
            }
            .encode(),
            [4, 5, 0, 0, 0, 100, 255]
        );
        assert_eq!(
            Reply::Listen {
                host: 7,
                socket: 32,
                conn: 0,
            }
            .encode(),
            [6, 7, 0, 0, 0, 32, 0]
        );
        assert_eq!(
            Reply::Read {
                conn: 1,
                payload: b"ok".to_vec(),
            }
            .encode(),
            [8, 1, b'o', b'k']
        );
        assert_eq!(Reply::Write { conn: 1 }.encode(), [10, 1]);
        assert_eq!(Reply::Close { conn: 1 }.encode(), [12, 1]);
    }

    #[test]
    fn an_empty_write_payload_is_legal() {
        assert_eq!(
            Command::parse(&[9, 0]),
            Ok(Command::Write {
                conn: 0,
                payload: Vec::new(),
            })
        );
    }
}
