use thiserror::Error;

use crate::types::NcpKind;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodecError {
    #[error("Illegal NCP opcode ({0})")]
    Opcode(u8),

    #[error("Short parameter space for {kind}: want {want} bytes, have {have}")]
    Short {
        kind: NcpKind,
        want: usize,
        have: usize,
    },

    #[error("Illegal leader type ({0})")]
    Leader(u8),

    #[error("Message too short for a leader ({0} bytes)")]
    Truncated(usize),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum WireError {
    #[error("Empty application request")]
    Empty,

    #[error("Unknown application request ({0})")]
    UnknownRequest(u8),

    #[error("Bad length {len} for application request {id}")]
    BadLength { id: u8, len: usize },
}
