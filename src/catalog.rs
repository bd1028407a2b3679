use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;

use crate::evaluation::{
    AccessControl, EvaluationOptions, ModeSet, TargetingRule, UtcSchedule, UtcTimeWindow,
    Variations,
};

// MODELS

/// A flag as written in the catalog file. Every gating field may be omitted
/// or null, in which case it takes its "not configured" value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlagDefinition {
    pub key: String,
    pub name: Option<String>,
    pub description: Option<String>,
    pub modes: Option<ModeSet>,
    pub schedule: Option<UtcSchedule>,
    pub operational_window: Option<UtcTimeWindow>,
    pub targeting_rules: Option<Vec<TargetingRule>>,
    pub user_access_control: Option<AccessControl>,
    pub tenant_access_control: Option<AccessControl>,
    pub variations: Option<Variations>,
}

#[derive(Debug, Deserialize)]
struct CatalogFile {
    #[serde(default)]
    flags: Vec<FlagDefinition>,
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("failed to read flag catalog: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse flag catalog: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid flag '{key}': {message}")]
    Invalid { key: String, message: String },
    #[error("flag key '{0}' is defined more than once")]
    Duplicate(String),
}

impl FlagDefinition {
    pub fn into_options(self) -> EvaluationOptions {
        EvaluationOptions {
            key: self.key,
            mode_set: self.modes.unwrap_or_default(),
            schedule: self.schedule.unwrap_or_else(UtcSchedule::unscheduled),
            operational_window: self
                .operational_window
                .unwrap_or_else(UtcTimeWindow::always_open),
            targeting_rules: self.targeting_rules.unwrap_or_default(),
            user_access_control: self
                .user_access_control
                .unwrap_or_else(AccessControl::unrestricted),
            tenant_access_control: self
                .tenant_access_control
                .unwrap_or_else(AccessControl::unrestricted),
            variations: self.variations.unwrap_or_default(),
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        validate_flag_key(&self.key)?;
        for control in [&self.user_access_control, &self.tenant_access_control]
            .into_iter()
            .flatten()
        {
            validate_rollout_percentage(control.rollout_percentage)?;
        }
        Ok(())
    }
}

/// Read-only set of flags the service evaluates, keyed by flag key.
#[derive(Debug, Clone, Default)]
pub struct FlagCatalog {
    flags: BTreeMap<String, EvaluationOptions>,
}

impl FlagCatalog {
    pub fn from_definitions(definitions: Vec<FlagDefinition>) -> Result<Self, CatalogError> {
        let mut flags = BTreeMap::new();
        for definition in definitions {
            definition.validate().map_err(|message| CatalogError::Invalid {
                key: definition.key.clone(),
                message,
            })?;
            if flags.contains_key(&definition.key) {
                return Err(CatalogError::Duplicate(definition.key));
            }
            let options = definition.into_options();
            flags.insert(options.key.clone(), options);
        }
        Ok(Self { flags })
    }

    pub fn from_json(raw: &str) -> Result<Self, CatalogError> {
        let file: CatalogFile = serde_json::from_str(raw)?;
        Self::from_definitions(file.flags)
    }

    pub async fn load(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let path = path.as_ref();
        let raw = tokio::fs::read_to_string(path).await?;
        let catalog = Self::from_json(&raw)?;
        tracing::info!(path = %path.display(), flags = catalog.len(), "flag catalog loaded");
        Ok(catalog)
    }

    pub fn get(&self, key: &str) -> Option<&EvaluationOptions> {
        self.flags.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = &EvaluationOptions> {
        self.flags.values()
    }

    pub fn len(&self) -> usize {
        self.flags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flags.is_empty()
    }
}

// HELPER FUNCTIONS

// Validating the flag key
pub fn validate_flag_key(key: &str) -> Result<(), String> {
    let Some(first) = key.chars().next() else {
        return Err("Flag key cannot be empty".to_string());
    };

    if key.len() > 64 {
        return Err("Flag key is too long (Max: 64 characters)".to_string());
    }

    if !first.is_ascii_alphabetic() {
        return Err("Flag must start with an alphabet".to_string());
    }

    if !key.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-') {
        return Err(
            "flag can only be \n - lowercase letters\n - numbers\n - underscores\n - and hypens."
                .to_string(),
        );
    }

    Ok(())
}

// Checks if percentage number is between the number 0 to 100
pub fn validate_rollout_percentage(percentage: i32) -> Result<(), String> {
    if !(0..=100).contains(&percentage) {
        return Err("Rollout percentage must be between 0 to 100".to_string());
    }

    Ok(())
}
