//! # Error Types — Structured Error Hierarchy
//!
//! Defines the error types shared by every enforcer. All errors use
//! `thiserror` for derive-based `Display` and `Error` implementations.
//!
//! ## Design
//!
//! Enforcer failures fall into four categories:
//!
//! - **Malformed input** — terms or args of the wrong length or shape.
//!   Raised before any state mutation.
//! - **Violation** — the policy check itself failed (amount exceeded,
//!   wrong target, outside the time window, balance not met).
//! - **State consistency** — a composite key is locked when it must not be,
//!   an after-hook has no matching before-hook, or a re-delegation attempted
//!   to loosen an aggregated bound.
//! - **External** — a nested redemption or oracle call failed. Propagated
//!   unchanged.
//!
//! Every variant renders as `"<Policy>:<reason>"` so the caller sees which
//! policy and which invariant rejected the redemption.

use thiserror::Error;

/// The category of an [`EnforcerError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Terms or args could not be decoded.
    MalformedInput,
    /// The policy rejected the action.
    Violation,
    /// Accounting state is inconsistent with the call sequence.
    StateConsistency,
    /// A collaborator outside the enforcer failed.
    External,
}

/// Failure of a policy hook. Any error aborts the whole redemption.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EnforcerError {
    /// Terms or args of the wrong length or shape.
    #[error("{policy}:{reason}")]
    MalformedInput {
        /// Policy that rejected the input.
        policy: String,
        /// Kebab-case reason.
        reason: String,
    },

    /// The semantic check failed.
    #[error("{policy}:{reason}")]
    Violation {
        /// Policy that rejected the action.
        policy: String,
        /// Kebab-case reason.
        reason: String,
    },

    /// Accounting state does not match the hook sequence.
    #[error("{policy}:{reason}")]
    StateConsistency {
        /// Policy whose state was inconsistent.
        policy: String,
        /// Kebab-case reason.
        reason: String,
    },

    /// A nested redemption, oracle, or coordinator step failed.
    #[error("{origin}:{reason}")]
    External {
        /// Component that failed (e.g. `DelegationManager`).
        origin: String,
        /// Kebab-case reason.
        reason: String,
    },
}

impl EnforcerError {
    /// Malformed terms or args.
    pub fn malformed(policy: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedInput {
            policy: policy.into(),
            reason: reason.into(),
        }
    }

    /// Policy violation.
    pub fn violation(policy: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Violation {
            policy: policy.into(),
            reason: reason.into(),
        }
    }

    /// State-consistency violation.
    pub fn state(policy: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::StateConsistency {
            policy: policy.into(),
            reason: reason.into(),
        }
    }

    /// External collaborator failure.
    pub fn external(origin: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::External {
            origin: origin.into(),
            reason: reason.into(),
        }
    }

    /// The error category.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MalformedInput { .. } => ErrorKind::MalformedInput,
            Self::Violation { .. } => ErrorKind::Violation,
            Self::StateConsistency { .. } => ErrorKind::StateConsistency,
            Self::External { .. } => ErrorKind::External,
        }
    }

    /// The policy (or external component) that produced the error.
    pub fn origin(&self) -> &str {
        match self {
            Self::MalformedInput { policy, .. }
            | Self::Violation { policy, .. }
            | Self::StateConsistency { policy, .. } => policy,
            Self::External { origin, .. } => origin,
        }
    }

    /// The kebab-case reason.
    pub fn reason(&self) -> &str {
        match self {
            Self::MalformedInput { reason, .. }
            | Self::Violation { reason, .. }
            | Self::StateConsistency { reason, .. }
            | Self::External { reason, .. } => reason,
        }
    }
}

/// Error during canonical serialization.
#[derive(Error, Debug)]
pub enum CanonicalizationError {
    /// Float values are not permitted in canonical representations.
    /// Amounts must be strings or integers.
    #[error("float values are not permitted in canonical representations; use string or integer for amount: {0}")]
    FloatRejected(f64),

    /// JSON serialization failed.
    #[error("serialization failed: {0}")]
    SerializationFailed(#[from] serde_json::Error),
}

/// Error decoding a packed or structured payload.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// A fixed-width field or payload had the wrong length.
    #[error("{field}: expected {expected} bytes, got {actual}")]
    Length {
        /// Field being decoded.
        field: &'static str,
        /// Required length.
        expected: usize,
        /// Observed length.
        actual: usize,
    },

    /// A hex string could not be decoded.
    #[error("{field}: invalid hex ({reason})")]
    Hex {
        /// Field being decoded.
        field: &'static str,
        /// Decoder message.
        reason: String,
    },

    /// A 32-byte word does not fit in 128 bits.
    #[error("{field}: value exceeds 128 bits")]
    AmountOverflow {
        /// Field being decoded.
        field: &'static str,
    },

    /// An ABI-encoded address word had non-zero padding.
    #[error("{field}: address word has dirty upper bytes")]
    DirtyAddress {
        /// Field being decoded.
        field: &'static str,
    },

    /// A mode byte did not name a known call or execution type.
    #[error("unsupported {field} code 0x{code:02x}")]
    UnsupportedMode {
        /// `call type` or `exec type`.
        field: &'static str,
        /// The unrecognized byte.
        code: u8,
    },

    /// A structured (JSON) payload could not be parsed.
    #[error("{field}: {reason}")]
    Structured {
        /// Payload being decoded.
        field: &'static str,
        /// Parser message.
        reason: String,
    },
}

impl CodecError {
    /// Attribute this decoding failure to a policy as malformed input.
    pub fn attribute(self, policy: &str, reason: &str) -> EnforcerError {
        EnforcerError::malformed(policy, reason)
    }
}

impl From<CanonicalizationError> for EnforcerError {
    fn from(err: CanonicalizationError) -> Self {
        EnforcerError::malformed("Canonicalization", err.to_string())
    }
}
