use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};

use super::access::AccessControl;
use super::mode::{EvaluationMode, ModeSet};
use super::schedule::UtcSchedule;
use super::targeting::TargetingRule;
use super::window::UtcTimeWindow;

/// Named values a flag can serve.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Variations {
    pub values: HashMap<String, Value>,
    pub default_variation: String,
}

impl Variations {
    pub fn new(default_variation: impl Into<String>) -> Self {
        Self {
            values: HashMap::new(),
            default_variation: default_variation.into(),
        }
    }

    pub fn with_value(mut self, name: impl Into<String>, value: Value) -> Self {
        self.values.insert(name.into(), value);
        self
    }

    /// `None` when the name has no entry, which is tolerated.
    pub fn value_of(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn has_default(&self) -> bool {
        !self.default_variation.is_empty()
    }
}

/// Everything the engine needs to know about one flag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluationOptions {
    pub key: String,
    pub mode_set: ModeSet,
    pub schedule: UtcSchedule,
    pub operational_window: UtcTimeWindow,
    pub targeting_rules: Vec<TargetingRule>,
    pub user_access_control: AccessControl,
    pub tenant_access_control: AccessControl,
    pub variations: Variations,
}

impl EvaluationOptions {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            ..Self::default()
        }
    }

    pub fn with_mode(mut self, mode: EvaluationMode) -> Self {
        self.mode_set = self.mode_set.with(mode);
        self
    }

    pub fn with_schedule(mut self, schedule: UtcSchedule) -> Self {
        self.schedule = schedule;
        self
    }

    pub fn with_window(mut self, window: UtcTimeWindow) -> Self {
        self.operational_window = window;
        self
    }

    pub fn with_rule(mut self, rule: TargetingRule) -> Self {
        self.targeting_rules.push(rule);
        self
    }

    pub fn with_user_access(mut self, control: AccessControl) -> Self {
        self.user_access_control = control;
        self
    }

    pub fn with_tenant_access(mut self, control: AccessControl) -> Self {
        self.tenant_access_control = control;
        self
    }

    pub fn with_variations(mut self, variations: Variations) -> Self {
        self.variations = variations;
        self
    }
}

impl Default for EvaluationOptions {
    fn default() -> Self {
        Self {
            key: String::new(),
            mode_set: ModeSet::new(),
            schedule: UtcSchedule::unscheduled(),
            operational_window: UtcTimeWindow::always_open(),
            targeting_rules: Vec::new(),
            user_access_control: AccessControl::unrestricted(),
            tenant_access_control: AccessControl::unrestricted(),
            variations: Variations::default(),
        }
    }
}

/// Who is asking. Supplied per call by the SDK or request handler.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluationContext {
    pub user_id: Option<String>,
    pub tenant_id: Option<String>,
    pub attributes: Option<HashMap<String, Value>>,
}

impl EvaluationContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_tenant_id(mut self, tenant_id: impl Into<String>) -> Self {
        self.tenant_id = Some(tenant_id.into());
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes
            .get_or_insert_with(HashMap::new)
            .insert(key.into(), value.into());
        self
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    pub fn tenant_id(&self) -> Option<&str> {
        self.tenant_id.as_deref()
    }
}

/// Outcome of one evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub is_enabled: bool,
    /// Empty when the flag is disabled.
    pub variation: String,
    pub value: Option<Value>,
    pub reason: String,
    pub metadata: BTreeMap<String, Value>,
}

impl EvaluationResult {
    pub fn disabled(reason: impl Into<String>, metadata: BTreeMap<String, Value>) -> Self {
        Self {
            is_enabled: false,
            variation: String::new(),
            value: None,
            reason: reason.into(),
            metadata,
        }
    }

    pub fn enabled(
        variation: impl Into<String>,
        value: Option<Value>,
        reason: impl Into<String>,
        metadata: BTreeMap<String, Value>,
    ) -> Self {
        Self {
            is_enabled: true,
            variation: variation.into(),
            value,
            reason: reason.into(),
            metadata,
        }
    }
}
