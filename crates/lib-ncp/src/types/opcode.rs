use std::fmt::Display;

use crate::error::CodecError;

/// Control-message codes carried on link 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NcpKind {
    Nop,
    Rts,
    Str,
    Cls,
    All,
    Gvb,
    Ret,
    Inr,
    Ins,
    Eco,
    Erp,
    Err,
    Rst,
    Rrp,
}

impl NcpKind {
    /// Size in bytes of the parameter region following the type tag.
    pub fn param_len(&self) -> usize {
        match self {
            Self::Nop | Self::Rst | Self::Rrp => 0,
            Self::Rts | Self::Str => 9,
            Self::Cls => 8,
            Self::All | Self::Ret => 7,
            Self::Gvb => 3,
            Self::Inr | Self::Ins | Self::Eco | Self::Erp => 1,
            Self::Err => 11,
        }
    }
}

impl TryFrom<u8> for NcpKind {
    type Error = CodecError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Nop),
            1 => Ok(Self::Rts),
            2 => Ok(Self::Str),
            3 => Ok(Self::Cls),
            4 => Ok(Self::All),
            5 => Ok(Self::Gvb),
            6 => Ok(Self::Ret),
            7 => Ok(Self::Inr),
            8 => Ok(Self::Ins),
            9 => Ok(Self::Eco),
            10 => Ok(Self::Erp),
            11 => Ok(Self::Err),
            12 => Ok(Self::Rst),
            13 => Ok(Self::Rrp),
            _ => Err(CodecError::Opcode(value)),
        }
    }
}

impl From<NcpKind> for u8 {
    fn from(kind: NcpKind) -> Self {
        match kind {
            NcpKind::Nop => 0,
            NcpKind::Rts => 1,
            NcpKind::Str => 2,
            NcpKind::Cls => 3,
            NcpKind::All => 4,
            NcpKind::Gvb => 5,
            NcpKind::Ret => 6,
            NcpKind::Inr => 7,
            NcpKind::Ins => 8,
            NcpKind::Eco => 9,
            NcpKind::Erp => 10,
            NcpKind::Err => 11,
            NcpKind::Rst => 12,
            NcpKind::Rrp => 13,
        }
    }
}

impl Display for NcpKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NcpKind::Nop => write!(f, "NOP"),
            NcpKind::Rts => write!(f, "RTS"),
            NcpKind::Str => write!(f, "STR"),
            NcpKind::Cls => write!(f, "CLS"),
            NcpKind::All => write!(f, "ALL"),
            NcpKind::Gvb => write!(f, "GVB"),
            NcpKind::Ret => write!(f, "RET"),
            NcpKind::Inr => write!(f, "INR"),
            NcpKind::Ins => write!(f, "INS"),
            NcpKind::Eco => write!(f, "ECO"),
            NcpKind::Erp => write!(f, "ERP"),
            NcpKind::Err => write!(f, "ERR"),
            NcpKind::Rst => write!(f, "RST"),
            NcpKind::Rrp => write!(f, "RRP"),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn codes_round_trip() {
        for code in 0..=13u8 {
            let kind = NcpKind::try_from(code).unwrap();
            assert_eq!(u8::from(kind), code);
        }
    }

    #[test]
    fn unknown_code_is_rejected() {
        assert_eq!(NcpKind::try_from(14), Err(CodecError::Opcode(14)));
        assert_eq!(NcpKind::try_from(99), Err(CodecError::Opcode(99)));
    }
}
