use serde::{Deserialize, Serialize};

use super::bucketing::{bucket, clamp_percentage};

/// Allow list, block list and rollout percentage for one identity dimension
/// (users or tenants).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccessControl {
    pub allowed: Vec<String>,
    pub blocked: Vec<String>,
    pub rollout_percentage: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessDecision {
    Allow,
    Block,
    /// No identifier was supplied, so the gate cannot run.
    Undetermined,
}

/// Why an access decision came out the way it did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessBasis {
    BlockList,
    AllowList,
    InRollout,
    OutsideRollout,
    MissingIdentifier,
}

impl AccessBasis {
    pub fn as_str(self) -> &'static str {
        match self {
            AccessBasis::BlockList => "block-list",
            AccessBasis::AllowList => "allow-list",
            AccessBasis::InRollout => "in-rollout",
            AccessBasis::OutsideRollout => "outside-rollout",
            AccessBasis::MissingIdentifier => "missing-identifier",
        }
    }
}

impl AccessControl {
    pub fn unrestricted() -> Self {
        Self {
            allowed: Vec::new(),
            blocked: Vec::new(),
            rollout_percentage: 100,
        }
    }

    pub fn with_allowed(mut self, id: impl Into<String>) -> Self {
        self.allowed.push(id.into());
        self
    }

    pub fn with_blocked(mut self, id: impl Into<String>) -> Self {
        self.blocked.push(id.into());
        self
    }

    pub fn with_rollout_percentage(mut self, percentage: i32) -> Self {
        self.rollout_percentage = percentage;
        self
    }

    pub fn is_unrestricted(&self) -> bool {
        *self == Self::unrestricted()
    }

    pub fn effective_percentage(&self) -> u8 {
        if !(0..=100).contains(&self.rollout_percentage) {
            tracing::warn!(
                rollout_percentage = self.rollout_percentage,
                "rollout percentage out of range, clamping"
            );
        }
        clamp_percentage(self.rollout_percentage)
    }

    /// Block list, then allow list, then rollout bucket. Absent identifiers
    /// are undetermined.
    pub fn decide(
        &self,
        identifier: Option<&str>,
        flag_key: &str,
    ) -> (AccessDecision, AccessBasis) {
        let Some(id) = identifier.filter(|id| !id.is_empty()) else {
            return (AccessDecision::Undetermined, AccessBasis::MissingIdentifier);
        };

        if self.blocked.iter().any(|b| b == id) {
            return (AccessDecision::Block, AccessBasis::BlockList);
        }
        if self.allowed.iter().any(|a| a == id) {
            return (AccessDecision::Allow, AccessBasis::AllowList);
        }
        if bucket(id, flag_key) < self.effective_percentage() {
            (AccessDecision::Allow, AccessBasis::InRollout)
        } else {
            (AccessDecision::Block, AccessBasis::OutsideRollout)
        }
    }

    /// Rollout check alone, ignoring both lists. Returns the bucket that was
    /// computed, if any.
    pub fn admits_by_rollout(
        &self,
        identifier: Option<&str>,
        flag_key: &str,
    ) -> (bool, Option<u8>) {
        match identifier.filter(|id| !id.is_empty()) {
            Some(id) => {
                let b = bucket(id, flag_key);
                (b < self.effective_percentage(), Some(b))
            }
            None => (false, None),
        }
    }
}

impl Default for AccessControl {
    fn default() -> Self {
        Self::unrestricted()
    }
}
