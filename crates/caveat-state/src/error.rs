//! # Accounting Errors
//!
//! Every table reports failures through [`AccountingError`]. The tables do
//! not know which policy they serve, so the error carries only the reason;
//! the calling policy attaches its name with [`AccountingError::attribute`].

use caveat_core::EnforcerError;
use thiserror::Error;

/// Failure of an accounting operation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AccountingError {
    /// A snapshot lock is already held for this key.
    #[error("enforcer-is-locked")]
    Locked,

    /// An after-hook found no snapshot opened by its before-hook.
    #[error("unpaired-after-hook")]
    NotLocked,

    /// The measured quantity fell further than the allowed decrease.
    #[error("exceeded-balance-decrease")]
    ExceededDecrease,

    /// The measured quantity rose by less than the required increase.
    #[error("insufficient-balance-increase")]
    InsufficientIncrease,

    /// The first contribution to a tracker came from someone other than the
    /// recipient.
    #[error("invalid-delegator")]
    InvalidDelegator,

    /// A re-delegation tried to raise an aggregated decrease bound.
    #[error("decrease-must-not-loosen")]
    DecreaseLoosened,

    /// A re-delegation tried to lower an aggregated increase requirement.
    #[error("increase-must-not-loosen")]
    IncreaseLoosened,

    /// A settlement found no open tracker.
    #[error("missing-balance-tracker")]
    MissingTracker,

    /// A periodic allowance was used before its start.
    #[error("transfer-not-started")]
    NotStarted,

    /// A periodic allowance was overspent in the current period.
    #[error("transfer-amount-exceeded")]
    PeriodExceeded,

    /// A streaming allowance was overspent.
    #[error("allowance-exceeded")]
    AllowanceExceeded,

    /// A call counter reached its limit.
    #[error("limit-exceeded")]
    LimitExceeded,

    /// An id was already consumed.
    #[error("id-already-used")]
    IdUsed,

    /// No group selection is pinned for this key.
    #[error("missing-group-selection")]
    MissingSelection,

    /// Allowance terms fail validation (reason is the kebab-case cause).
    #[error("{0}")]
    InvalidTerms(&'static str),

    /// An accumulator would exceed 128 bits.
    #[error("amount-overflow")]
    Overflow,
}

impl AccountingError {
    /// Attribute this failure to `policy`, choosing the error category.
    pub fn attribute(self, policy: &str) -> EnforcerError {
        let reason = self.to_string();
        match self {
            Self::InvalidTerms(_) | Self::Overflow => EnforcerError::malformed(policy, reason),
            Self::Locked
            | Self::NotLocked
            | Self::InvalidDelegator
            | Self::DecreaseLoosened
            | Self::IncreaseLoosened
            | Self::MissingTracker
            | Self::MissingSelection => EnforcerError::state(policy, reason),
            Self::ExceededDecrease
            | Self::InsufficientIncrease
            | Self::NotStarted
            | Self::PeriodExceeded
            | Self::AllowanceExceeded
            | Self::LimitExceeded
            | Self::IdUsed => EnforcerError::violation(policy, reason),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use caveat_core::ErrorKind;

    #[test]
    fn test_attribute_categories() {
        let err = AccountingError::Locked.attribute("ERC20BalanceChangeEnforcer");
        assert_eq!(err.kind(), ErrorKind::StateConsistency);
        assert_eq!(err.to_string(), "ERC20BalanceChangeEnforcer:enforcer-is-locked");

        let err = AccountingError::AllowanceExceeded.attribute("ERC20StreamingEnforcer");
        assert_eq!(err.kind(), ErrorKind::Violation);

        let err = AccountingError::InvalidTerms("invalid-zero-period-duration")
            .attribute("ERC20PeriodTransferEnforcer");
        assert_eq!(err.kind(), ErrorKind::MalformedInput);
        assert_eq!(err.reason(), "invalid-zero-period-duration");
    }
}
