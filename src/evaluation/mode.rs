use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// A single gating concern a flag can have switched on.
///
/// The ordinals are persisted by the flag store, so variants must only ever be
/// appended, never reordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum EvaluationMode {
    Off = 0,
    On = 1,
    Scheduled = 2,
    TimeWindow = 3,
    UserTargeted = 4,
    UserRolloutPercentage = 5,
    TenantRolloutPercentage = 6,
    TenantTargeted = 7,
    TargetingRules = 8,
}

impl EvaluationMode {
    pub const ALL: [EvaluationMode; 9] = [
        EvaluationMode::Off,
        EvaluationMode::On,
        EvaluationMode::Scheduled,
        EvaluationMode::TimeWindow,
        EvaluationMode::UserTargeted,
        EvaluationMode::UserRolloutPercentage,
        EvaluationMode::TenantRolloutPercentage,
        EvaluationMode::TenantTargeted,
        EvaluationMode::TargetingRules,
    ];

    /// Order in which the pipeline consults gating modes.
    pub const GATE_ORDER: [EvaluationMode; 7] = [
        EvaluationMode::Scheduled,
        EvaluationMode::TimeWindow,
        EvaluationMode::TargetingRules,
        EvaluationMode::UserTargeted,
        EvaluationMode::UserRolloutPercentage,
        EvaluationMode::TenantTargeted,
        EvaluationMode::TenantRolloutPercentage,
    ];

    pub fn ordinal(self) -> u8 {
        self as u8
    }

    pub fn from_ordinal(ordinal: u8) -> Option<Self> {
        Self::ALL.get(ordinal as usize).copied()
    }

    /// Everything except `Off` and `On` gates enablement.
    pub fn is_gating(self) -> bool {
        !matches!(self, EvaluationMode::Off | EvaluationMode::On)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EvaluationMode::Off => "Off",
            EvaluationMode::On => "On",
            EvaluationMode::Scheduled => "Scheduled",
            EvaluationMode::TimeWindow => "TimeWindow",
            EvaluationMode::UserTargeted => "UserTargeted",
            EvaluationMode::UserRolloutPercentage => "UserRolloutPercentage",
            EvaluationMode::TenantRolloutPercentage => "TenantRolloutPercentage",
            EvaluationMode::TenantTargeted => "TenantTargeted",
            EvaluationMode::TargetingRules => "TargetingRules",
        }
    }
}

impl fmt::Display for EvaluationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The set of modes active on a flag. An empty set behaves like `{Off}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModeSet(BTreeSet<EvaluationMode>);

impl ModeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, mode: EvaluationMode) -> Self {
        self.0.insert(mode);
        self
    }

    pub fn contains(&self, mode: EvaluationMode) -> bool {
        self.0.contains(&mode)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_off(&self) -> bool {
        self.contains(EvaluationMode::Off)
    }

    pub fn has_gating_modes(&self) -> bool {
        self.0.iter().any(|m| m.is_gating())
    }

    /// Gating modes present in the set, in pipeline order.
    pub fn gates(&self) -> impl Iterator<Item = EvaluationMode> + '_ {
        EvaluationMode::GATE_ORDER
            .into_iter()
            .filter(|m| self.contains(*m))
    }

    pub fn iter(&self) -> impl Iterator<Item = EvaluationMode> + '_ {
        self.0.iter().copied()
    }
}

impl FromIterator<EvaluationMode> for ModeSet {
    fn from_iter<I: IntoIterator<Item = EvaluationMode>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<const N: usize> From<[EvaluationMode; N]> for ModeSet {
    fn from(modes: [EvaluationMode; N]) -> Self {
        modes.into_iter().collect()
    }
}
