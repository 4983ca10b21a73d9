use crate::error::CodecError;

use super::{ErrCode, NcpKind};

/// Size of the echoed-context field of an ERR message.
pub const ERR_DATA: usize = 10;

/// One decoded NCP control message.
///
/// Socket fields are always from the originator's point of view: `lsock` is
/// the sender's local socket, `rsock` the socket it names on the other host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Control {
    Nop,
    Rts { lsock: u32, rsock: u32, link: u8 },
    Str { lsock: u32, rsock: u32, size: u8 },
    Cls { lsock: u32, rsock: u32 },
    All { link: u8, msg_space: u16, bit_space: u32 },
    Gvb { link: u8, fm: u8, fb: u8 },
    Ret { link: u8, msg_space: u16, bit_space: u32 },
    Inr { link: u8 },
    Ins { link: u8 },
    Eco { data: u8 },
    Erp { data: u8 },
    Err { code: u8, data: [u8; ERR_DATA] },
    Rst,
    Rrp,
}

impl Control {
    pub fn kind(&self) -> NcpKind {
        match self {
            Self::Nop => NcpKind::Nop,
            Self::Rts { .. } => NcpKind::Rts,
            Self::Str { .. } => NcpKind::Str,
            Self::Cls { .. } => NcpKind::Cls,
            Self::All { .. } => NcpKind::All,
            Self::Gvb { .. } => NcpKind::Gvb,
            Self::Ret { .. } => NcpKind::Ret,
            Self::Inr { .. } => NcpKind::Inr,
            Self::Ins { .. } => NcpKind::Ins,
            Self::Eco { .. } => NcpKind::Eco,
            Self::Erp { .. } => NcpKind::Erp,
            Self::Err { .. } => NcpKind::Err,
            Self::Rst => NcpKind::Rst,
            Self::Rrp => NcpKind::Rrp,
        }
    }

    /// Size on the wire: the type tag plus the parameter region.
    pub fn wire_len(&self) -> usize {
        1 + self.kind().param_len()
    }

    /// Build an ERR carrying up to ten bytes of the offending message.
    pub fn err(code: ErrCode, context: &[u8]) -> Self {
        let mut data = [0u8; ERR_DATA];
        let n = context.len().min(ERR_DATA);
        data[..n].copy_from_slice(&context[..n]);
        Self::Err {
            code: code.into(),
            data,
        }
    }

    /// Decode the parameter region of a message of the given kind.
    pub fn decode(kind: NcpKind, params: &[u8]) -> Result<Self, CodecError> {
        let want = kind.param_len();
        if params.len() < want {
            return Err(CodecError::Short {
                kind,
                want,
                have: params.len(),
            });
        }
        Ok(match kind {
            NcpKind::Nop => Self::Nop,
            NcpKind::Rts => Self::Rts {
                lsock: be32(&params[0..4]),
                rsock: be32(&params[4..8]),
                link: params[8],
            },
            NcpKind::Str => Self::Str {
                lsock: be32(&params[0..4]),
                rsock: be32(&params[4..8]),
                size: params[8],
            },
            NcpKind::Cls => Self::Cls {
                lsock: be32(&params[0..4]),
                rsock: be32(&params[4..8]),
            },
            NcpKind::All => Self::All {
                link: params[0],
                msg_space: be16(&params[1..3]),
                bit_space: be32(&params[3..7]),
            },
            NcpKind::Gvb => Self::Gvb {
                link: params[0],
                fm: params[1],
                fb: params[2],
            },
            NcpKind::Ret => Self::Ret {
                link: params[0],
                msg_space: be16(&params[1..3]),
                bit_space: be32(&params[3..7]),
            },
            NcpKind::Inr => Self::Inr { link: params[0] },
            NcpKind::Ins => Self::Ins { link: params[0] },
            NcpKind::Eco => Self::Eco { data: params[0] },
            NcpKind::Erp => Self::Erp { data: params[0] },
            NcpKind::Err => {
                let mut data = [0u8; ERR_DATA];
                data.copy_from_slice(&params[1..11]);
                Self::Err {
                    code: params[0],
                    data,
                }
            }
            NcpKind::Rst => Self::Rst,
            NcpKind::Rrp => Self::Rrp,
        })
    }

    /// Append the type tag and big-endian parameters.
    pub fn encode_into(&self, buf: &mut Vec<u8>) {
        buf.push(self.kind().into());
        match *self {
            Self::Nop | Self::Rst | Self::Rrp => {}
            Self::Rts { lsock, rsock, link } => {
                buf.extend_from_slice(&lsock.to_be_bytes());
                buf.extend_from_slice(&rsock.to_be_bytes());
                buf.push(link);
            }
            Self::Str { lsock, rsock, size } => {
                buf.extend_from_slice(&lsock.to_be_bytes());
                buf.extend_from_slice(&rsock.to_be_bytes());
                buf.push(size);
            }
            Self::Cls { lsock, rsock } => {
                buf.extend_from_slice(&lsock.to_be_bytes());
                buf.extend_from_slice(&rsock.to_be_bytes());
            }
            Self::All {
                link,
                msg_space,
                bit_space,
            }
            | Self::Ret {
                link,
                msg_space,
                bit_space,
            } => {
                buf.push(link);
                buf.extend_from_slice(&msg_space.to_be_bytes());
                buf.extend_from_slice(&bit_space.to_be_bytes());
            }
            Self::Gvb { link, fm, fb } => {
                buf.push(link);
                buf.push(fm);
                buf.push(fb);
            }
            Self::Inr { link } | Self::Ins { link } => buf.push(link),
            Self::Eco { data } | Self::Erp { data } => buf.push(data),
            Self::Err { code, ref data } => {
                buf.push(code);
                buf.extend_from_slice(data);
            }
        }
    }
}

fn be16(bytes: &[u8]) -> u16 {
    u16::from_be_bytes([bytes[0], bytes[1]])
}

fn be32(bytes: &[u8]) -> u32 {
    u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

#[cfg(test)]
mod test {
    use super::*;

    fn round_trip(msg: Control) {
        let mut buf = Vec::new();
        msg.encode_into(&mut buf);
        assert_eq!(buf.len(), msg.wire_len());

        let kind = NcpKind::try_from(buf[0]).unwrap();
        let decoded = Control::decode(kind, &buf[1..]).unwrap();
        assert_eq!(decoded, msg);
    }

    #[test]
    fn messages_round_trip() {
        round_trip(Control::Nop);
        round_trip(Control::Rts {
            lsock: 1002,
            rsock: 101,
            link: 42,
        });
        round_trip(Control::Str {
            lsock: 33,
            rsock: 32,
            size: 8,
        });
        round_trip(Control::Cls {
            lsock: 0xdead_beef,
            rsock: 1,
        });
        round_trip(Control::All {
            link: 3,
            msg_space: 1,
            bit_space: 8 * 80,
        });
        round_trip(Control::Gvb {
            link: 3,
            fm: 1,
            fb: 2,
        });
        round_trip(Control::Ret {
            link: 3,
            msg_space: 1,
            bit_space: 640,
        });
        round_trip(Control::Inr { link: 7 });
        round_trip(Control::Ins { link: 7 });
        round_trip(Control::Eco { data: 0x42 });
        round_trip(Control::Erp { data: 0x42 });
        round_trip(Control::Err {
            code: 4,
            data: [1, 0, 0, 3, 234, 0, 0, 0, 101, 0],
        });
        round_trip(Control::Rst);
        round_trip(Control::Rrp);
    }

    #[test]
    fn rts_layout_is_big_endian() {
        let mut buf = Vec::new();
        Control::Rts {
            lsock: 1002,
            rsock: 101,
            link: 42,
        }
        .encode_into(&mut buf);
        assert_eq!(buf, [1, 0, 0, 0x03, 0xea, 0, 0, 0, 0x65, 42]);
    }

    #[test]
    fn truncated_parameters_are_rejected() {
        assert_eq!(
            Control::decode(NcpKind::Str, &[0, 0]),
            Err(CodecError::Short {
                kind: NcpKind::Str,
                want: 9,
                have: 2,
            })
        );
        assert_eq!(
            Control::decode(NcpKind::Err, &[4; 10]),
            Err(CodecError::Short {
                kind: NcpKind::Err,
                want: 11,
                have: 10,
            })
        );
    }

    #[test]
    fn err_context_is_zero_padded() {
        let msg = Control::err(ErrCode::Opcode, &[99]);
        assert_eq!(
            msg,
            Control::Err {
                code: 1,
                data: [99, 0, 0, 0, 0, 0, 0, 0, 0, 0],
            }
        );

        // Long context is cut at ten bytes.
        let msg = Control::err(ErrCode::Param, &[9; 12]);
        match msg {
            Control::Err { code: 3, data } => assert_eq!(data, [9; 10]),
            other => panic!("unexpected message {other:?}"),
        }
    }
}
