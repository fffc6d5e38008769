//! # Enforcer Registry
//!
//! Maps deployment addresses to policy instances so coordinators and
//! composition enforcers can dispatch by address.
//!
//! A registry is usually built from a YAML deployment manifest:
//!
//! ```yaml
//! delegation_manager: "0x00000000000000000000000000000000000000dd"
//! enforcers:
//!   - address: "0x0000000000000000000000000000000000000101"
//!     kind: allowed-targets
//!   - address: "0x0000000000000000000000000000000000000140"
//!     kind: args-equality-check
//!   - address: "0x0000000000000000000000000000000000000150"
//!     kind: native-token-payment
//!     args_equality_enforcer: "0x0000000000000000000000000000000000000140"
//! ```
//!
//! Payment enforcers receive the manifest's `delegation_manager` and must
//! name the `args_equality_enforcer` whose caveats they rebind.

use std::collections::BTreeMap;
use std::sync::Arc;

use caveat_core::Address;
use caveat_enforcer::CaveatEnforcer;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::balance_change::{AssetStandard, BalanceChangeEnforcer, TotalBalanceChangeEnforcer};
use crate::call_filters::{
    AllowedCalldataEnforcer, AllowedMethodsEnforcer, AllowedTargetsEnforcer, ExactCalldataEnforcer,
    ValueLteEnforcer,
};
use crate::context_filters::{
    ArgsEqualityCheckEnforcer, IdEnforcer, LimitedCallsEnforcer, RedeemerEnforcer, TimestampEnforcer,
};
use crate::logical_or::{AnyOfGroupsEnforcer, LogicalOrWrapperEnforcer};
use crate::payment::PaymentEnforcer;
use crate::periodic::PeriodTransferEnforcer;
use crate::streaming::{ChunkedStreamingEnforcer, StreamingEnforcer};

/// Errors building a registry.
#[derive(Error, Debug)]
pub enum RegistryError {
    /// The manifest is not valid YAML or names an unknown kind.
    #[error("invalid deployment manifest: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Two policies were registered at one address.
    #[error("duplicate enforcer address {0}")]
    DuplicateAddress(Address),

    /// A payment enforcer entry lacks `args_equality_enforcer`.
    #[error("enforcer {0} requires args_equality_enforcer")]
    MissingArgsEqualityEnforcer(Address),
}

/// Every built-in policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EnforcerKind {
    /// [`AllowedTargetsEnforcer`].
    AllowedTargets,
    /// [`AllowedMethodsEnforcer`].
    AllowedMethods,
    /// [`AllowedCalldataEnforcer`].
    AllowedCalldata,
    /// [`ExactCalldataEnforcer`].
    ExactCalldata,
    /// [`ValueLteEnforcer`].
    ValueLte,
    /// [`TimestampEnforcer`].
    Timestamp,
    /// [`LimitedCallsEnforcer`].
    LimitedCalls,
    /// [`IdEnforcer`].
    Id,
    /// [`RedeemerEnforcer`].
    Redeemer,
    /// [`ArgsEqualityCheckEnforcer`].
    ArgsEqualityCheck,
    /// Native lock-and-snapshot guardrail.
    NativeTokenBalanceChange,
    /// ERC20 lock-and-snapshot guardrail.
    Erc20BalanceChange,
    /// ERC721 lock-and-snapshot guardrail.
    Erc721BalanceChange,
    /// ERC1155 lock-and-snapshot guardrail.
    Erc1155BalanceChange,
    /// Native aggregating guardrail.
    NativeTokenTotalBalanceChange,
    /// ERC20 aggregating guardrail.
    Erc20TotalBalanceChange,
    /// ERC721 aggregating guardrail.
    Erc721TotalBalanceChange,
    /// ERC1155 aggregating guardrail.
    Erc1155TotalBalanceChange,
    /// ERC20 periodic allowance.
    Erc20PeriodTransfer,
    /// Native periodic allowance.
    NativeTokenPeriodTransfer,
    /// ERC20 linear stream.
    Erc20Streaming,
    /// Native linear stream.
    NativeTokenStreaming,
    /// ERC20 chunked stream.
    Erc20ChunkedStreaming,
    /// Native chunked stream.
    NativeTokenChunkedStreaming,
    /// [`LogicalOrWrapperEnforcer`].
    LogicalOrWrapper,
    /// [`AnyOfGroupsEnforcer`].
    AnyOfGroups,
    /// Native payment.
    NativeTokenPayment,
    /// ERC20 payment.
    Erc20Payment,
}

impl EnforcerKind {
    /// Whether instances need a delegation manager and args-equality address.
    pub fn is_payment(&self) -> bool {
        matches!(self, Self::NativeTokenPayment | Self::Erc20Payment)
    }

    /// Instantiate a non-payment policy. Payment kinds return `None`.
    pub fn instantiate(&self) -> Option<Arc<dyn CaveatEnforcer>> {
        let policy: Arc<dyn CaveatEnforcer> = match self {
            Self::AllowedTargets => Arc::new(AllowedTargetsEnforcer),
            Self::AllowedMethods => Arc::new(AllowedMethodsEnforcer),
            Self::AllowedCalldata => Arc::new(AllowedCalldataEnforcer),
            Self::ExactCalldata => Arc::new(ExactCalldataEnforcer),
            Self::ValueLte => Arc::new(ValueLteEnforcer),
            Self::Timestamp => Arc::new(TimestampEnforcer),
            Self::LimitedCalls => Arc::new(LimitedCallsEnforcer),
            Self::Id => Arc::new(IdEnforcer),
            Self::Redeemer => Arc::new(RedeemerEnforcer),
            Self::ArgsEqualityCheck => Arc::new(ArgsEqualityCheckEnforcer),
            Self::NativeTokenBalanceChange => Arc::new(BalanceChangeEnforcer::new(AssetStandard::Native)),
            Self::Erc20BalanceChange => Arc::new(BalanceChangeEnforcer::new(AssetStandard::Erc20)),
            Self::Erc721BalanceChange => Arc::new(BalanceChangeEnforcer::new(AssetStandard::Erc721)),
            Self::Erc1155BalanceChange => Arc::new(BalanceChangeEnforcer::new(AssetStandard::Erc1155)),
            Self::NativeTokenTotalBalanceChange => {
                Arc::new(TotalBalanceChangeEnforcer::new(AssetStandard::Native))
            }
            Self::Erc20TotalBalanceChange => Arc::new(TotalBalanceChangeEnforcer::new(AssetStandard::Erc20)),
            Self::Erc721TotalBalanceChange => Arc::new(TotalBalanceChangeEnforcer::new(AssetStandard::Erc721)),
            Self::Erc1155TotalBalanceChange => {
                Arc::new(TotalBalanceChangeEnforcer::new(AssetStandard::Erc1155))
            }
            Self::Erc20PeriodTransfer => Arc::new(PeriodTransferEnforcer::erc20()),
            Self::NativeTokenPeriodTransfer => Arc::new(PeriodTransferEnforcer::native()),
            Self::Erc20Streaming => Arc::new(StreamingEnforcer::erc20()),
            Self::NativeTokenStreaming => Arc::new(StreamingEnforcer::native()),
            Self::Erc20ChunkedStreaming => Arc::new(ChunkedStreamingEnforcer::erc20()),
            Self::NativeTokenChunkedStreaming => Arc::new(ChunkedStreamingEnforcer::native()),
            Self::LogicalOrWrapper => Arc::new(LogicalOrWrapperEnforcer),
            Self::AnyOfGroups => Arc::new(AnyOfGroupsEnforcer),
            Self::NativeTokenPayment | Self::Erc20Payment => return None,
        };
        Some(policy)
    }
}

/// One manifest entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    /// Deployment address.
    pub address: Address,
    /// Policy kind.
    pub kind: EnforcerKind,
    /// For payment kinds: the equality policy whose caveats are rebound.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub args_equality_enforcer: Option<Address>,
}

/// A deployment of policies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentManifest {
    /// Coordinator allowed to trigger payment enforcers.
    pub delegation_manager: Address,
    /// Deployed policies.
    #[serde(default)]
    pub enforcers: Vec<ManifestEntry>,
}

impl DeploymentManifest {
    /// Parse a YAML manifest.
    pub fn from_yaml(yaml: &str) -> Result<Self, RegistryError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Render as YAML.
    pub fn to_yaml(&self) -> Result<String, RegistryError> {
        Ok(serde_yaml::to_string(self)?)
    }
}

/// Address-to-policy map.
#[derive(Debug, Clone, Default)]
pub struct EnforcerRegistry {
    enforcers: BTreeMap<Address, Arc<dyn CaveatEnforcer>>,
}

impl EnforcerRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `enforcer` at `address`.
    pub fn register(
        &mut self,
        address: Address,
        enforcer: Arc<dyn CaveatEnforcer>,
    ) -> Result<(), RegistryError> {
        if self.enforcers.contains_key(&address) {
            return Err(RegistryError::DuplicateAddress(address));
        }
        tracing::debug!(address = %address, policy = enforcer.name(), "enforcer registered");
        self.enforcers.insert(address, enforcer);
        Ok(())
    }

    /// The policy at `address`.
    pub fn get(&self, address: &Address) -> Option<Arc<dyn CaveatEnforcer>> {
        self.enforcers.get(address).cloned()
    }

    /// Number of registered policies.
    pub fn len(&self) -> usize {
        self.enforcers.len()
    }

    /// Whether nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.enforcers.is_empty()
    }

    /// Registered addresses with their policy names, in address order.
    pub fn entries(&self) -> impl Iterator<Item = (Address, &'static str)> + '_ {
        self.enforcers.iter().map(|(address, policy)| (*address, policy.name()))
    }

    /// Instantiate every manifest entry.
    pub fn from_manifest(manifest: &DeploymentManifest) -> Result<Self, RegistryError> {
        let mut registry = Self::new();
        for entry in &manifest.enforcers {
            let policy: Arc<dyn CaveatEnforcer> = match entry.kind {
                EnforcerKind::NativeTokenPayment | EnforcerKind::Erc20Payment => {
                    let equality = entry
                        .args_equality_enforcer
                        .ok_or(RegistryError::MissingArgsEqualityEnforcer(entry.address))?;
                    if entry.kind == EnforcerKind::Erc20Payment {
                        Arc::new(PaymentEnforcer::erc20(manifest.delegation_manager, equality))
                    } else {
                        Arc::new(PaymentEnforcer::native(manifest.delegation_manager, equality))
                    }
                }
                kind => match kind.instantiate() {
                    Some(policy) => policy,
                    None => continue,
                },
            };
            registry.register(entry.address, policy)?;
        }
        tracing::info!(enforcers = registry.len(), "registry loaded from manifest");
        Ok(registry)
    }
}
