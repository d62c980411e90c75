//! Payment policies: predicates deciding which offered requirements the
//! wallet is willing to pay.

use std::collections::HashMap;
use std::sync::Arc;

use alloy_primitives::U256;

use super::scheme::NetworkPattern;
use super::types::PaymentRequirements;

/// Smallest asset units per minor currency unit for a 6-decimal asset
/// pegged 1:1 with a budget expressed in cents.
pub const DEFAULT_MINOR_UNIT_SCALE: u64 = 10_000;

/// Decides whether a single payment requirement is acceptable.
///
/// Any `Fn(&PaymentRequirements) -> bool` closure is a policy.
pub trait PaymentPolicy: Send + Sync {
    fn accepts(&self, requirements: &PaymentRequirements) -> bool;
}

impl<F> PaymentPolicy for F
where
    F: Fn(&PaymentRequirements) -> bool + Send + Sync,
{
    fn accepts(&self, requirements: &PaymentRequirements) -> bool {
        self(requirements)
    }
}

pub type SharedPolicy = Arc<dyn PaymentPolicy>;

/// Keep the requirements every policy accepts, preserving their order.
pub fn apply_policies(
    policies: &[SharedPolicy],
    requirements: &[PaymentRequirements],
) -> Vec<PaymentRequirements> {
    requirements
        .iter()
        .filter(|req| policies.iter().all(|policy| policy.accepts(req)))
        .cloned()
        .collect()
}

// ============================================================================
// Budget
// ============================================================================

/// Spending cap for a single payment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyConfig {
    /// Cap in minor currency units (cents). `None` or `0` disables the cap.
    pub max_payment: Option<u64>,
    /// Scale applied to assets without an explicit entry
    pub default_scale: U256,
    /// Per-asset scales, keyed by lowercase asset address
    asset_scales: HashMap<String, U256>,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            max_payment: None,
            default_scale: U256::from(DEFAULT_MINOR_UNIT_SCALE),
            asset_scales: HashMap::new(),
        }
    }
}

impl PolicyConfig {
    pub fn with_max_payment(mut self, max_payment: Option<u64>) -> Self {
        self.max_payment = max_payment;
        self
    }

    /// Override the minor-unit scale for one asset contract
    pub fn with_asset_scale(mut self, asset: &str, scale: U256) -> Self {
        self.asset_scales.insert(asset.to_lowercase(), scale);
        self
    }

    pub fn scale_for(&self, asset: &str) -> U256 {
        self.asset_scales
            .get(&asset.to_lowercase())
            .copied()
            .unwrap_or(self.default_scale)
    }

    /// Largest acceptable amount for `asset`, or `None` when unlimited
    pub fn budget_for(&self, asset: &str) -> Option<U256> {
        match self.max_payment {
            None | Some(0) => None,
            Some(max) => Some(U256::from(max).saturating_mul(self.scale_for(asset))),
        }
    }

    pub fn is_limited(&self) -> bool {
        !matches!(self.max_payment, None | Some(0))
    }
}

/// Rejects requirements whose amount exceeds the configured budget.
#[derive(Debug, Clone, Default)]
pub struct MaxPaymentPolicy {
    config: PolicyConfig,
}

impl MaxPaymentPolicy {
    pub fn new(config: PolicyConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PolicyConfig {
        &self.config
    }
}

impl PaymentPolicy for MaxPaymentPolicy {
    fn accepts(&self, requirements: &PaymentRequirements) -> bool {
        match self.config.budget_for(&requirements.asset) {
            None => true,
            Some(budget) => requirements.amount.0 <= budget,
        }
    }
}

// ============================================================================
// Network allow-list
// ============================================================================

/// Accepts only requirements on the listed networks.
#[derive(Debug, Clone)]
pub struct NetworkAllowList {
    patterns: Vec<NetworkPattern>,
}

impl NetworkAllowList {
    pub fn new(patterns: Vec<NetworkPattern>) -> Self {
        Self { patterns }
    }
}

impl PaymentPolicy for NetworkAllowList {
    fn accepts(&self, requirements: &PaymentRequirements) -> bool {
        self.patterns
            .iter()
            .any(|pattern| pattern.matches(&requirements.network))
    }
}
