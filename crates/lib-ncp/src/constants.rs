/// Number of connection slots; the table never grows.
pub const CONNECTIONS: usize = 20;

/// Link carrying NCP control messages.
pub const LINK_CTL: u8 = 0;
/// Lowest link number usable for data.
pub const LINK_MIN: u8 = 2;
/// Highest link number usable for data.
pub const LINK_MAX: u8 = 71;
/// Link reserved for the echo facility.
pub const LINK_ECHO: u8 = 72;

/// Byte size announced in the header of every control message.
pub const CTL_BYTE_SIZE: u8 = 8;

/// First local socket handed to an application open; advanced in
/// even-aligned pairs so every open gets a fresh receive/send pair.
pub const FIRST_LOCAL_SOCKET: u32 = 1002;

/// Error field of an echo reply when the round trip succeeded.
pub const ECHO_OK: u8 = 0x10;

/// Connection index reported to an application whose open failed.
pub const OPEN_FAILED: u8 = 255;
