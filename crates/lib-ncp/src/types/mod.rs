mod control;
mod err_code;
mod frame;
mod leader;
mod opcode;

pub use control::{Control, ERR_DATA};
pub use err_code::ErrCode;
pub use frame::{Frame, SCRATCH};
pub use leader::{
    host_dead_reason, incomplete_reason, leader_error_reason, Leader, LeaderKind,
};
pub use opcode::NcpKind;
