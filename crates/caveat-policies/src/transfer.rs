//! Extraction of the transferred amount from a single-action payload, shared
//! by the periodic and streaming allowances.

use caveat_core::calldata::{decode_erc20_transfer, selector, ERC20_TRANSFER, ERC20_TRANSFER_LEN};
use caveat_core::{Address, EnforcerError};
use caveat_enforcer::HookCall;

/// Amount of an ERC20 `transfer` to `token`.
pub(crate) fn erc20_transfer_amount(
    policy: &str,
    call: &HookCall<'_>,
    token: Address,
) -> Result<u128, EnforcerError> {
    let exec = call.single_execution(policy)?;
    if exec.calldata.len() != ERC20_TRANSFER_LEN {
        return Err(EnforcerError::malformed(policy, "invalid-execution-length"));
    }
    if exec.target != token {
        return Err(EnforcerError::violation(policy, "invalid-contract"));
    }
    if selector(exec.calldata) != Some(ERC20_TRANSFER) {
        return Err(EnforcerError::violation(policy, "invalid-method"));
    }
    let (_, amount) = decode_erc20_transfer(exec.calldata)
        .map_err(|e| e.attribute(policy, "invalid-execution-calldata"))?;
    Ok(amount)
}

/// Native value attached to a single action.
pub(crate) fn native_transfer_amount(policy: &str, call: &HookCall<'_>) -> Result<u128, EnforcerError> {
    Ok(call.single_execution(policy)?.value)
}
