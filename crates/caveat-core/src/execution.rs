//! # Execution Payloads and Modes
//!
//! An *action* is a `(target, value, calldata)` triple, or a batch of them.
//! The coordinator hands each hook the encoded action payload together with
//! an execution mode; policies decode only what they need.
//!
//! ## Encodings
//!
//! - **Mode code** — 32 bytes: byte 0 is the call type (`0x00` single,
//!   `0x01` batch), byte 1 the execution type (`0x00` default/revert,
//!   `0x01` try). Remaining bytes are zero.
//! - **Single** — packed `target(20) ‖ value(32) ‖ calldata`.
//! - **Batch** — canonical JSON array of executions.

use serde::{Deserialize, Serialize};

use crate::address::{amount_string, hex_bytes, Address};
use crate::canonical::{decode_structured, CanonicalBytes};
use crate::error::{CanonicalizationError, CodecError};
use crate::terms::{read_word, write_word};

/// Call shape of a redemption.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CallType {
    /// Exactly one action.
    Single,
    /// An ordered array of actions.
    Batch,
}

/// Execution semantics of a redemption.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExecType {
    /// Every action must succeed.
    Default,
    /// Best effort: individual action failures are ignored.
    Try,
}

impl CallType {
    /// The mode-code byte.
    pub fn code(&self) -> u8 {
        match self {
            Self::Single => 0x00,
            Self::Batch => 0x01,
        }
    }

    /// Parse a mode-code byte.
    pub fn from_code(code: u8) -> Result<Self, CodecError> {
        match code {
            0x00 => Ok(Self::Single),
            0x01 => Ok(Self::Batch),
            _ => Err(CodecError::UnsupportedMode {
                field: "call type",
                code,
            }),
        }
    }
}

impl ExecType {
    /// The mode-code byte.
    pub fn code(&self) -> u8 {
        match self {
            Self::Default => 0x00,
            Self::Try => 0x01,
        }
    }

    /// Parse a mode-code byte.
    pub fn from_code(code: u8) -> Result<Self, CodecError> {
        match code {
            0x00 => Ok(Self::Default),
            0x01 => Ok(Self::Try),
            _ => Err(CodecError::UnsupportedMode {
                field: "exec type",
                code,
            }),
        }
    }
}

/// Call shape × execution semantics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExecutionMode {
    /// Single or batch.
    pub call_type: CallType,
    /// Default (revert) or try.
    pub exec_type: ExecType,
}

impl ExecutionMode {
    /// Single action, must succeed.
    pub const SINGLE_DEFAULT: Self = Self {
        call_type: CallType::Single,
        exec_type: ExecType::Default,
    };
    /// Single action, best effort.
    pub const SINGLE_TRY: Self = Self {
        call_type: CallType::Single,
        exec_type: ExecType::Try,
    };
    /// Batch of actions, all must succeed.
    pub const BATCH_DEFAULT: Self = Self {
        call_type: CallType::Batch,
        exec_type: ExecType::Default,
    };
    /// Batch of actions, best effort.
    pub const BATCH_TRY: Self = Self {
        call_type: CallType::Batch,
        exec_type: ExecType::Try,
    };

    /// Encode as a 32-byte mode code.
    pub fn to_bytes(&self) -> [u8; 32] {
        let mut out = [0u8; 32];
        out[0] = self.call_type.code();
        out[1] = self.exec_type.code();
        out
    }

    /// Decode a 32-byte mode code.
    pub fn from_bytes(bytes: &[u8; 32]) -> Result<Self, CodecError> {
        Ok(Self {
            call_type: CallType::from_code(bytes[0])?,
            exec_type: ExecType::from_code(bytes[1])?,
        })
    }
}

impl std::fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let call = match self.call_type {
            CallType::Single => "single",
            CallType::Batch => "batch",
        };
        let exec = match self.exec_type {
            ExecType::Default => "default",
            ExecType::Try => "try",
        };
        write!(f, "{call}/{exec}")
    }
}

/// One action executed on behalf of the principal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Execution {
    /// Contract or account being called.
    pub target: Address,
    /// Native value attached to the call.
    #[serde(with = "amount_string")]
    pub value: u128,
    /// Call data.
    #[serde(with = "hex_bytes")]
    pub calldata: Vec<u8>,
}

/// Length of the packed single-execution header.
pub const SINGLE_HEADER_LEN: usize = 20 + 32;

impl Execution {
    /// Construct an execution.
    pub fn new(target: Address, value: u128, calldata: Vec<u8>) -> Self {
        Self {
            target,
            value,
            calldata,
        }
    }

    /// Encode as a packed single-execution payload.
    pub fn encode_single(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(SINGLE_HEADER_LEN + self.calldata.len());
        out.extend_from_slice(self.target.as_bytes());
        write_word(&mut out, self.value);
        out.extend_from_slice(&self.calldata);
        out
    }
}

/// Borrowed view of a packed single-execution payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SingleExecution<'a> {
    /// Call target.
    pub target: Address,
    /// Attached native value.
    pub value: u128,
    /// Call data (may be empty).
    pub calldata: &'a [u8],
}

impl SingleExecution<'_> {
    /// Copy into an owned [`Execution`].
    pub fn to_execution(&self) -> Execution {
        Execution::new(self.target, self.value, self.calldata.to_vec())
    }
}

/// Decode a packed single-execution payload.
pub fn decode_single(payload: &[u8]) -> Result<SingleExecution<'_>, CodecError> {
    if payload.len() < SINGLE_HEADER_LEN {
        return Err(CodecError::Length {
            field: "single execution",
            expected: SINGLE_HEADER_LEN,
            actual: payload.len(),
        });
    }
    let target = Address::from_slice(&payload[..20])?;
    let value = read_word(&payload[20..52], "execution value")?;
    Ok(SingleExecution {
        target,
        value,
        calldata: &payload[52..],
    })
}

/// Encode a batch of executions.
pub fn encode_batch(executions: &[Execution]) -> Result<Vec<u8>, CanonicalizationError> {
    Ok(CanonicalBytes::new(&executions)?.into_bytes())
}

/// Decode a batch payload.
pub fn decode_batch(payload: &[u8]) -> Result<Vec<Execution>, CodecError> {
    decode_structured(payload, "batch execution")
}

/// Decode a payload of either shape into owned executions.
pub fn decode_executions(
    call_type: CallType,
    payload: &[u8],
) -> Result<Vec<Execution>, CodecError> {
    match call_type {
        CallType::Single => Ok(vec![decode_single(payload)?.to_execution()]),
        CallType::Batch => decode_batch(payload),
    }
}
