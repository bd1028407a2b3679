use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::evaluation::EvaluationError;
use crate::state::AppState;
use super::{
    EvaluateRequest, EvaluateResponse, FlagEvaluationResponse, FlagState, PreviewRequest,
    MISSING_ATTRIBUTES_REASON,
};

fn contract_violation(e: EvaluationError) -> (StatusCode, String) {
    tracing::warn!(error = %e, "evaluation rejected");
    (StatusCode::BAD_REQUEST, e.to_string())
}

/// Evaluate every catalog flag for the given context
pub async fn evaluate(
    State(state): State<AppState>,
    Json(request): Json<EvaluateRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let evaluation_id = Uuid::new_v4();
    let now = state.evaluator.now();
    let context = request.context;

    let mut flags = BTreeMap::new();
    for options in state.catalog.iter() {
        let flag_state = match state.evaluator.evaluate_at(options, &context, now) {
            Ok(result) => FlagState {
                enabled: result.is_enabled,
                variation: result.variation,
                reason: result.reason,
            },
            // A contract violation on one flag does not fail the whole batch.
            Err(e) => {
                tracing::warn!(%evaluation_id, error = %e, "flag skipped in bulk evaluation");
                FlagState {
                    enabled: false,
                    variation: String::new(),
                    reason: MISSING_ATTRIBUTES_REASON.to_string(),
                }
            }
        };
        flags.insert(options.key.clone(), flag_state);
    }

    tracing::info!(%evaluation_id, flags = flags.len(), "bulk evaluation served");

    Ok(Json(EvaluateResponse {
        evaluation_id,
        flags,
    }))
}

/// Evaluate a single catalog flag
pub async fn evaluate_flag(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Json(request): Json<EvaluateRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let options = state
        .catalog
        .get(&key)
        .ok_or_else(|| (StatusCode::NOT_FOUND, format!("Flag '{}' not found", key)))?;

    let result = state
        .evaluator
        .evaluate(options, &request.context)
        .map_err(contract_violation)?;

    Ok(Json(FlagEvaluationResponse {
        evaluation_id: Uuid::new_v4(),
        result,
    }))
}

/// Evaluate a flag configuration supplied in the request body, without it
/// being in the catalog
pub async fn preview(
    State(state): State<AppState>,
    Json(request): Json<PreviewRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let result = state
        .evaluator
        .evaluate(&request.options, &request.context)
        .map_err(contract_violation)?;

    Ok(Json(FlagEvaluationResponse {
        evaluation_id: Uuid::new_v4(),
        result,
    }))
}
