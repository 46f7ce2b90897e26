use cloudlock_core::constants::{
    OP_LOCK, OP_UNLOCK, OPCODE_CONNECT, OPCODE_QUERY_STATUS, OPCODE_SET_STATE, OPERAND_CONNECT,
    OPERAND_QUERY_STATUS, SET_STATE_PREFIX, SET_STATE_SUFFIX,
};
use cloudlock_core::types::LockState;
use std::fmt;

/// Direction of a set-state command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockOp {
    /// Drive the bolt closed.
    Lock,
    /// Drive the bolt open.
    Unlock,
}

impl LockOp {
    /// The one-byte op code embedded in the set-state operand.
    #[must_use]
    pub fn op_code(self) -> &'static str {
        match self {
            LockOp::Lock => OP_LOCK,
            LockOp::Unlock => OP_UNLOCK,
        }
    }

    /// The lock state this operation requests.
    #[must_use]
    pub fn target_state(self) -> LockState {
        match self {
            LockOp::Lock => LockState::Secured,
            LockOp::Unlock => LockState::Unsecured,
        }
    }

    /// Derive the operation from a requested target state.
    ///
    /// `Unknown` maps to `Lock`: a caller that cannot name a target gets
    /// the fail-safe direction.
    #[must_use]
    pub fn for_target(target: LockState) -> Self {
        match target {
            LockState::Unsecured => LockOp::Unlock,
            LockState::Secured | LockState::Unknown => LockOp::Lock,
        }
    }
}

impl fmt::Display for LockOp {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            LockOp::Lock => write!(f, "lock"),
            LockOp::Unlock => write!(f, "unlock"),
        }
    }
}

/// The three frame kinds the controller issues, each a fixed
/// opcode/operand pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    /// Open a bridge session toward the lock.
    Connect,
    /// Ask the lock to echo its bolt status.
    QueryStatus,
    /// Drive the bolt in the given direction.
    SetState(LockOp),
}

impl CommandKind {
    /// Two-byte opcode of this frame kind.
    #[must_use]
    pub fn opcode(self) -> &'static str {
        match self {
            CommandKind::Connect => OPCODE_CONNECT,
            CommandKind::QueryStatus => OPCODE_QUERY_STATUS,
            CommandKind::SetState(_) => OPCODE_SET_STATE,
        }
    }

    /// Operand that follows the nonce in the command code.
    #[must_use]
    pub fn operand(self) -> String {
        match self {
            CommandKind::Connect => OPERAND_CONNECT.to_string(),
            CommandKind::QueryStatus => OPERAND_QUERY_STATUS.to_string(),
            CommandKind::SetState(op) => {
                format!("{SET_STATE_PREFIX}{}{SET_STATE_SUFFIX}", op.op_code())
            }
        }
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            CommandKind::Connect => write!(f, "connect"),
            CommandKind::QueryStatus => write!(f, "query-status"),
            CommandKind::SetState(op) => write!(f, "set-state({op})"),
        }
    }
}
