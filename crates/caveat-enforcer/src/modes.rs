//! # Execution-Mode Gates
//!
//! Guards a policy calls first to declare which call shapes and execution
//! semantics it supports. A mismatch fails closed.

use caveat_core::{CallType, EnforcerError, ExecType, ExecutionMode};

/// Origin of gate failures.
pub const GATE_ORIGIN: &str = "CaveatEnforcer";

fn invalid_call_type() -> EnforcerError {
    EnforcerError::violation(GATE_ORIGIN, "invalid-call-type")
}

fn invalid_execution_type() -> EnforcerError {
    EnforcerError::violation(GATE_ORIGIN, "invalid-execution-type")
}

/// Require a single action.
pub fn only_single_call_type_mode(mode: ExecutionMode) -> Result<(), EnforcerError> {
    match mode.call_type {
        CallType::Single => Ok(()),
        CallType::Batch => Err(invalid_call_type()),
    }
}

/// Require a batch of actions.
pub fn only_batch_call_type_mode(mode: ExecutionMode) -> Result<(), EnforcerError> {
    match mode.call_type {
        CallType::Batch => Ok(()),
        CallType::Single => Err(invalid_call_type()),
    }
}

/// Require must-succeed semantics.
pub fn only_default_execution_mode(mode: ExecutionMode) -> Result<(), EnforcerError> {
    match mode.exec_type {
        ExecType::Default => Ok(()),
        ExecType::Try => Err(invalid_execution_type()),
    }
}

/// Require best-effort semantics.
pub fn only_try_execution_mode(mode: ExecutionMode) -> Result<(), EnforcerError> {
    match mode.exec_type {
        ExecType::Try => Ok(()),
        ExecType::Default => Err(invalid_execution_type()),
    }
}

/// Single action with must-succeed semantics.
pub fn only_single_default(mode: ExecutionMode) -> Result<(), EnforcerError> {
    only_single_call_type_mode(mode)?;
    only_default_execution_mode(mode)
}
