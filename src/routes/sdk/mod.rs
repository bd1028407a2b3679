pub mod routes;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::evaluation::{EvaluationContext, EvaluationOptions, EvaluationResult};

#[derive(Debug, Deserialize)]
pub struct EvaluateRequest {
    #[serde(default)]
    pub context: EvaluationContext,
}

#[derive(Debug, Deserialize)]
pub struct PreviewRequest {
    pub options: EvaluationOptions,
    #[serde(default)]
    pub context: EvaluationContext,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct EvaluateResponse {
    pub evaluation_id: Uuid,
    pub flags: BTreeMap<String, FlagState>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FlagState {
    pub enabled: bool,
    pub variation: String,
    pub reason: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FlagEvaluationResponse {
    pub evaluation_id: Uuid,
    #[serde(flatten)]
    pub result: EvaluationResult,
}

/// Reported for a flag whose evaluation hit a caller contract violation
/// during a bulk evaluation.
pub const MISSING_ATTRIBUTES_REASON: &str = "missing-attributes";
